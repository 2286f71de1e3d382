//! The conceptual persistent stores of spec §6 (delivery records, deficit
//! ledgers, carry-forward windows): kept behind a trait so a real backend
//! (Postgres/Timescale) can be swapped in without touching the operation
//! modules, and backed by an in-memory default that is enough for
//! local/offline runs and the CLI's smoke-testing mode — the same narrow
//! collaborator-trait shape as `irrigation_adapters::collaborators`.

use async_trait::async_trait;
use irrigation_core::{CarryForward, DeficitRecord, DeliveryId, DeliveryRecord, SectionId};
use parking_lot::RwLock;
use std::collections::HashMap;

#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn put_delivery(&self, record: DeliveryRecord);
    async fn get_delivery(&self, id: DeliveryId) -> Option<DeliveryRecord>;
    async fn deliveries_for_week(&self, week: u32, year: i32) -> Vec<DeliveryRecord>;
    async fn recent_deliveries(&self, section_id: &SectionId, limit: usize) -> Vec<DeliveryRecord>;

    async fn put_deficit(&self, record: DeficitRecord);
    async fn latest_deficit(&self, section_id: &SectionId) -> Option<DeficitRecord>;

    async fn get_carry_forward(&self, section_id: &SectionId, window_weeks: u32) -> CarryForward;
    async fn put_carry_forward(&self, carry: CarryForward);
}

#[derive(Default)]
struct Tables {
    deliveries: HashMap<DeliveryId, DeliveryRecord>,
    deficits: HashMap<SectionId, Vec<DeficitRecord>>,
    carry_forward: HashMap<SectionId, CarryForward>,
}

/// Process-local store: everything lives in a `parking_lot::RwLock`-guarded
/// map for the lifetime of the service. Sufficient for the CLI and for
/// integration tests; a real deployment swaps in a `MetadataStore` backed
/// by whatever time-series/metadata database the operator already runs.
#[derive(Default)]
pub struct InMemoryMetadataStore {
    tables: RwLock<Tables>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn put_delivery(&self, record: DeliveryRecord) {
        self.tables.write().deliveries.insert(record.id, record);
    }

    async fn get_delivery(&self, id: DeliveryId) -> Option<DeliveryRecord> {
        self.tables.read().deliveries.get(&id).cloned()
    }

    async fn deliveries_for_week(&self, week: u32, year: i32) -> Vec<DeliveryRecord> {
        self.tables
            .read()
            .deliveries
            .values()
            .filter(|d| {
                let iso = d.scheduled_start.iso_week();
                iso.week() == week && iso.year() == year
            })
            .cloned()
            .collect()
    }

    async fn recent_deliveries(&self, section_id: &SectionId, limit: usize) -> Vec<DeliveryRecord> {
        let mut matching: Vec<DeliveryRecord> = self
            .tables
            .read()
            .deliveries
            .values()
            .filter(|d| &d.section_id == section_id)
            .cloned()
            .collect();
        matching.sort_by_key(|d| std::cmp::Reverse(d.scheduled_start));
        matching.truncate(limit);
        matching
    }

    async fn put_deficit(&self, record: DeficitRecord) {
        self.tables.write().deficits.entry(record.section_id.clone()).or_default().push(record);
    }

    async fn latest_deficit(&self, section_id: &SectionId) -> Option<DeficitRecord> {
        self.tables.read().deficits.get(section_id).and_then(|v| v.last().cloned())
    }

    async fn get_carry_forward(&self, section_id: &SectionId, window_weeks: u32) -> CarryForward {
        self.tables.read().carry_forward.get(section_id).cloned().unwrap_or_else(|| CarryForward {
            section_id: section_id.clone(),
            window_weeks,
            active: Vec::new(),
            history: Vec::new(),
        })
    }

    async fn put_carry_forward(&self, carry: CarryForward) {
        self.tables.write().carry_forward.insert(carry.section_id.clone(), carry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use irrigation_core::{DeliveryId as Id, DeliveryPath, DeliveryStatus};

    fn sample(section: &str) -> DeliveryRecord {
        DeliveryRecord {
            id: Id::new_v4(),
            section_id: SectionId::from(section),
            scheduled_start: Utc::now(),
            scheduled_end: Utc::now(),
            scheduled_volume_m3: 100.0,
            actual_start: None,
            actual_end: None,
            status: DeliveryStatus::Scheduled,
            gate_outflow_m3: 0.0,
            section_inflow_m3: 0.0,
            transit_loss_m3: 0.0,
            flow_trace: Vec::new(),
            path: DeliveryPath { gates: Vec::new(), sections: Vec::new() },
            travel_time_s: 0.0,
            adjusted: false,
            gate_id: None,
        }
    }

    #[tokio::test]
    async fn round_trips_a_delivery_by_id() {
        let store = InMemoryMetadataStore::new();
        let record = sample("s1");
        let id = record.id;
        store.put_delivery(record).await;
        assert!(store.get_delivery(id).await.is_some());
    }

    #[tokio::test]
    async fn recent_deliveries_filters_by_section_and_caps_the_limit() {
        let store = InMemoryMetadataStore::new();
        for _ in 0..5 {
            store.put_delivery(sample("s1")).await;
        }
        store.put_delivery(sample("s2")).await;
        let recent = store.recent_deliveries(&SectionId::from("s1"), 3).await;
        assert_eq!(recent.len(), 3);
    }
}
