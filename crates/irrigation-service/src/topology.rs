use irrigation_core::{GateId, NodeId, SectionId, ZoneId};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
struct ZoneEntry {
    node: NodeId,
    gate: GateId,
    section: SectionId,
}

/// Maps delivery zones onto the physical network: the node a zone's demand
/// attaches to, the gate that serves it, and the canal section its
/// inflow/outflow accounting is kept against. The original network is a
/// fixed asset catalog (spec §3), provisioned once and read many times, so
/// this is populated at startup from the GIS provider (or by hand for a
/// local/offline deployment) and read far more often than it is written.
#[derive(Default)]
pub struct TopologyRegistry {
    zones: RwLock<HashMap<ZoneId, ZoneEntry>>,
}

impl TopologyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_zone(&self, zone_id: ZoneId, node_id: NodeId, gate_id: GateId, section_id: SectionId) {
        self.zones.write().insert(
            zone_id,
            ZoneEntry {
                node: node_id,
                gate: gate_id,
                section: section_id,
            },
        );
    }

    pub fn zone_nodes(&self) -> HashMap<ZoneId, NodeId> {
        self.zones.read().iter().map(|(z, e)| (z.clone(), e.node.clone())).collect()
    }

    pub fn zone_gate(&self) -> HashMap<ZoneId, GateId> {
        self.zones.read().iter().map(|(z, e)| (z.clone(), e.gate.clone())).collect()
    }

    pub fn section_for_zone(&self, zone_id: &ZoneId) -> Option<SectionId> {
        self.zones.read().get(zone_id).map(|e| e.section.clone())
    }

    pub fn gate_for_zone(&self, zone_id: &ZoneId) -> Option<GateId> {
        self.zones.read().get(zone_id).map(|e| e.gate.clone())
    }

    pub fn node_for_zone(&self, zone_id: &ZoneId) -> Option<NodeId> {
        self.zones.read().get(zone_id).map(|e| e.node.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_zone_resolves_every_mapping() {
        let topo = TopologyRegistry::new();
        topo.register_zone("z1".into(), "n1".into(), "g1".into(), "s1".into());
        assert_eq!(topo.node_for_zone(&"z1".into()), Some(NodeId::from("n1")));
        assert_eq!(topo.gate_for_zone(&"z1".into()), Some(GateId::from("g1")));
        assert_eq!(topo.section_for_zone(&"z1".into()), Some(SectionId::from("s1")));
    }
}
