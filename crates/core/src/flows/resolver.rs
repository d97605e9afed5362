use std::sync::Arc;

use tracing::debug;

use crate::domain::ids::{FlowId, TenantId};
use crate::errors::{DefinitionError, FlowError};
use crate::flows::graph::FlowGraph;
use crate::ports::DefinitionRepository;

/// Loads and parses a tenant's flow definition. Every call is a fresh read.
#[derive(Clone)]
pub struct FlowDefinitionResolver {
    definitions: Arc<dyn DefinitionRepository>,
}

impl FlowDefinitionResolver {
    pub fn new(definitions: Arc<dyn DefinitionRepository>) -> Self {
        Self { definitions }
    }

    pub async fn resolve(
        &self,
        tenant_id: &TenantId,
        flow_id: &FlowId,
    ) -> Result<FlowGraph, FlowError> {
        let stored = self.definitions.get_flow_definition(tenant_id, flow_id).await?.ok_or_else(
            || DefinitionError::NotFound {
                tenant_id: tenant_id.0.clone(),
                flow_id: flow_id.0.clone(),
            },
        )?;

        let graph = FlowGraph::from_documents(&stored.screen_graph_json, &stored.navigation_json)?;
        debug!(
            event_name = "flow.definition.resolved",
            tenant_id = %tenant_id,
            flow_id = %flow_id,
            screens = graph.screens.len(),
            options = graph.navigate.len(),
            "resolved flow definition"
        );
        Ok(graph)
    }
}
