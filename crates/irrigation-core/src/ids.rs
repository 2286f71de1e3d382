use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

// The physical network is a fixed asset catalog (gates, nodes, sections are
// provisioned once, not spawned at runtime), so ids are human-assigned
// strings rather than generated UUIDs.
string_id!(NodeId);
string_id!(GateId);
string_id!(SectionId);
string_id!(ChannelId);
string_id!(ZoneId);

// Records created during operation (deliveries, reconciliation runs,
// snapshots) get synthesized UUIDs.
pub type DeliveryId = uuid::Uuid;
pub type SnapshotId = uuid::Uuid;
