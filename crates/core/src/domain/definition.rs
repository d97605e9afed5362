use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::{FlowId, TenantId};

/// Raw flow definition as persisted: the screen graph document and the
/// option navigation table, both kept as JSON text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFlowDefinition {
    pub tenant_id: TenantId,
    pub flow_id: FlowId,
    pub screen_graph_json: String,
    pub navigation_json: String,
    pub description: String,
    pub updated_at: DateTime<Utc>,
}
