//! Node->Role

use ahash::AHashMap as HashMap;
use commatrix_core::NodeRole;
use commatrix_k8s_api::{self as k8s, Labels, ResourceExt};
use tracing::{debug, trace};

/// Maps node names to the role derived from their labels.
///
/// Nodes that carry neither a worker nor a master label have no role and are not indexed.
#[derive(Clone, Debug, Default)]
pub struct NodeRoles {
    index: HashMap<String, NodeRole>,
}

// === impl NodeRoles ===

impl NodeRoles {
    pub fn from_nodes<'n>(nodes: impl IntoIterator<Item = &'n k8s::Node>) -> Self {
        let mut index = HashMap::default();
        for node in nodes {
            let name = node.name_any();
            match Self::role_of(&Labels::from(node.metadata.labels.clone())) {
                Some(role) => {
                    debug!(%name, %role, "Resolved node role");
                    index.insert(name, role);
                }
                None => trace!(%name, "Node has no role"),
            }
        }
        Self { index }
    }

    fn role_of(labels: &Labels) -> Option<NodeRole> {
        let worker = labels.contains_key(k8s::WORKER_ROLE_LABEL);
        let master = k8s::MASTER_ROLE_LABELS
            .iter()
            .any(|l| labels.contains_key(l));
        match (master, worker) {
            (true, true) => Some(NodeRole::MasterWorker),
            (true, false) => Some(NodeRole::Master),
            (false, true) => Some(NodeRole::Worker),
            (false, false) => None,
        }
    }

    pub fn get(&self, node: &str) -> Option<NodeRole> {
        self.index.get(node).copied()
    }

    /// Returns the node's role as a matrix row label; empty when the node has no role.
    pub fn label(&self, node: &str) -> &'static str {
        self.get(node).map(|r| r.as_str()).unwrap_or_default()
    }

    /// Picks a node with the given role, preferring the lexically first name so that repeated
    /// runs choose the same node.
    pub fn node_with_role(&self, role: &str) -> Option<&str> {
        self.index
            .iter()
            .filter(|(_, r)| r.as_str() == role)
            .map(|(name, _)| name.as_str())
            .min()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
