//! Service discovery with a static-table fallback, grounded on the original
//! `service_registry.py`: a dynamic overlay (there, Redis; here, an
//! in-process map any health-checked registrar can update) takes priority,
//! falling back to a fixed URL table when nothing has been dynamically
//! registered (SPEC_FULL.md §C.4).

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub url: String,
    pub registered_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
}

impl ServiceInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>, url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            version: version.into(),
            url: url.into(),
            registered_at: now,
            last_heartbeat: now,
        }
    }
}

pub struct ServiceRegistry {
    static_table: HashMap<String, String>,
    dynamic: RwLock<HashMap<String, ServiceInfo>>,
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::with_static_defaults()
    }
}

impl ServiceRegistry {
    /// The original's hard-coded fallback table (`gis`, `ros`, `scada`,
    /// `weather`, `sensor-data`, `auth`), each overridable via env at
    /// construction time by the caller before passing in `overrides`.
    pub fn with_static_defaults() -> Self {
        Self::new(HashMap::new())
    }

    pub fn new(overrides: HashMap<String, String>) -> Self {
        let mut static_table = HashMap::from([
            ("gis".to_string(), "http://localhost:3007".to_string()),
            ("ros".to_string(), "http://localhost:3047".to_string()),
            ("scada".to_string(), "http://localhost:3008".to_string()),
            ("weather".to_string(), "http://localhost:3009".to_string()),
            ("sensor-data".to_string(), "http://localhost:3003".to_string()),
            ("auth".to_string(), "http://localhost:3001".to_string()),
        ]);
        static_table.extend(overrides);
        Self {
            static_table,
            dynamic: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, info: ServiceInfo) {
        self.dynamic.write().insert(info.name.clone(), info);
    }

    pub fn deregister(&self, name: &str) {
        self.dynamic.write().remove(name);
    }

    pub fn heartbeat(&self, name: &str) {
        if let Some(info) = self.dynamic.write().get_mut(name) {
            info.last_heartbeat = Utc::now();
        }
    }

    /// Dynamic registration wins; otherwise the static table; `None` if
    /// neither knows the service.
    pub fn discover(&self, name: &str) -> Option<String> {
        if let Some(info) = self.dynamic.read().get(name) {
            return Some(info.url.clone());
        }
        self.static_table.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_static_table_when_unregistered() {
        let registry = ServiceRegistry::with_static_defaults();
        assert_eq!(registry.discover("scada"), Some("http://localhost:3008".to_string()));
    }

    #[test]
    fn dynamic_registration_overrides_the_static_entry() {
        let registry = ServiceRegistry::with_static_defaults();
        registry.register(ServiceInfo::new("scada", "2.0.0", "http://scada-prod:8080"));
        assert_eq!(registry.discover("scada"), Some("http://scada-prod:8080".to_string()));
    }

    #[test]
    fn unknown_service_returns_none() {
        let registry = ServiceRegistry::with_static_defaults();
        assert_eq!(registry.discover("nonexistent"), None);
    }
}
