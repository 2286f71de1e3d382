use irrigation_core::{CanalSection, Gate, Node, NodeId};
use std::collections::HashMap;

/// Static description of the network graph (spec §3): nodes, canal
/// sections and gates, each carrying its own upstream/downstream node ids.
/// Built once from the persistent asset catalog and handed to the solver
/// as a read-only reference; mutating it mid-solve is never done (spec §5
/// treats a solve as atomic with respect to the registry).
#[derive(Debug, Clone, Default)]
pub struct Network {
    pub nodes: HashMap<NodeId, Node>,
    pub sections: HashMap<irrigation_core::SectionId, CanalSection>,
    pub gates: HashMap<irrigation_core::GateId, Gate>,
}

/// One inflow/outflow edge incident on a node, carrying enough information
/// for the solver to dispatch to the right flow equation.
#[derive(Debug, Clone, Copy)]
pub enum Edge {
    Gate(irrigation_core::GateId),
    Section(irrigation_core::SectionId),
}

impl Network {
    pub fn edges_from(&self, node: &NodeId) -> Vec<Edge> {
        let mut edges = Vec::new();
        for gate in self.gates.values() {
            if &gate.upstream_node == node {
                edges.push(Edge::Gate(gate.id.clone()));
            }
        }
        for section in self.sections.values() {
            if &section.upstream_node == node {
                edges.push(Edge::Section(section.id.clone()));
            }
        }
        edges
    }

    pub fn edges_to(&self, node: &NodeId) -> Vec<Edge> {
        let mut edges = Vec::new();
        for gate in self.gates.values() {
            if &gate.downstream_node == node {
                edges.push(Edge::Gate(gate.id.clone()));
            }
        }
        for section in self.sections.values() {
            if &section.downstream_node == node {
                edges.push(Edge::Section(section.id.clone()));
            }
        }
        edges
    }

    pub fn edge_nodes(&self, edge: &Edge) -> Option<(NodeId, NodeId)> {
        match edge {
            Edge::Gate(id) => self
                .gates
                .get(id)
                .map(|g| (g.upstream_node.clone(), g.downstream_node.clone())),
            Edge::Section(id) => self
                .sections
                .get(id)
                .map(|s| (s.upstream_node.clone(), s.downstream_node.clone())),
        }
    }

    /// Breadth-first reachability search used by the optimizer's elevation
    /// feasibility check (spec §4.4.1) to find the downstream path from the
    /// source to a zone's delivery node.
    pub fn shortest_path(&self, from: &NodeId, to: &NodeId) -> Option<Vec<Edge>> {
        use std::collections::VecDeque;
        let mut visited = std::collections::HashSet::new();
        let mut queue = VecDeque::new();
        let mut came_from: HashMap<NodeId, (NodeId, Edge)> = HashMap::new();
        queue.push_back(from.clone());
        visited.insert(from.clone());
        while let Some(current) = queue.pop_front() {
            if &current == to {
                let mut path = Vec::new();
                let mut cursor = current;
                while let Some((prev, edge)) = came_from.get(&cursor) {
                    path.push(*edge);
                    cursor = prev.clone();
                }
                path.reverse();
                return Some(path);
            }
            for edge in self.edges_from(&current) {
                if let Some((_, down)) = self.edge_nodes(&edge) {
                    if visited.insert(down.clone()) {
                        came_from.insert(down.clone(), (current.clone(), edge));
                        queue.push_back(down);
                    }
                }
            }
        }
        None
    }
}
