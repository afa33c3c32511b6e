//! Loaded protocol graphs, shared read-only.
//!
//! A graph is loaded once per id and handed out as `Arc<ProtocolGraph>`.
//! Redefining a protocol replaces the entry; sessions already holding the
//! old `Arc` keep using it until they are reopened.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use pathway_core::ProtocolGraph;
use tracing::info;

use crate::error::SessionError;

#[derive(Debug, Default)]
pub struct GraphRegistry {
    graphs: RwLock<HashMap<String, Arc<ProtocolGraph>>>,
}

impl GraphRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Graph for `graph_id`, or `UnknownProtocol`.
    pub fn get(&self, graph_id: &str) -> Result<Arc<ProtocolGraph>, SessionError> {
        self.graphs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(graph_id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownProtocol {
                graph_id: graph_id.to_string(),
            })
    }

    /// Register a graph unless one with the same id is already loaded, in
    /// which case the loaded one is returned and `graph` is discarded.
    pub fn load(&self, graph: ProtocolGraph) -> Arc<ProtocolGraph> {
        let mut graphs = self.graphs.write().unwrap_or_else(PoisonError::into_inner);
        graphs
            .entry(graph.id().to_string())
            .or_insert_with(|| {
                info!(protocol = %graph.id(), steps = graph.steps().len(), "protocol loaded");
                Arc::new(graph)
            })
            .clone()
    }

    /// Validate definition JSON and load it. Invalid definitions never
    /// reach the registry.
    pub fn load_json(
        &self,
        definition: &serde_json::Value,
        fallback_id: Option<&str>,
    ) -> Result<Arc<ProtocolGraph>, SessionError> {
        let graph = pathway_core::from_json(definition, fallback_id)?;
        Ok(self.load(graph))
    }

    /// Replace whatever is loaded under the graph's id.
    pub fn redefine(&self, graph: ProtocolGraph) -> Arc<ProtocolGraph> {
        let graph = Arc::new(graph);
        let previous = self
            .graphs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(graph.id().to_string(), graph.clone());
        info!(
            protocol = %graph.id(),
            replaced = previous.is_some(),
            "protocol redefined"
        );
        graph
    }

    /// Drop a graph. Returns whether one was loaded.
    pub fn invalidate(&self, graph_id: &str) -> bool {
        let removed = self
            .graphs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(graph_id)
            .is_some();
        if removed {
            info!(protocol = %graph_id, "protocol invalidated");
        }
        removed
    }

    /// Loaded ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .graphs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}
