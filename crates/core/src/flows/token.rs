use crate::domain::ids::{FlowId, SubjectId, TenantId};
use crate::errors::NavigationError;

/// Opaque per-run token issued when a flow is sent to a subject:
/// `tenant_subject_flow_createdAtMillis`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowToken {
    pub raw: String,
    pub tenant_id: TenantId,
    pub subject_id: SubjectId,
    pub flow_id: FlowId,
    pub created_at_millis: i64,
}

impl FlowToken {
    pub fn parse(raw: Option<&str>) -> Result<Self, NavigationError> {
        let raw = raw.map(str::trim).filter(|raw| !raw.is_empty()).ok_or_else(|| {
            NavigationError::MissingToken("flow_token is required".to_owned())
        })?;

        let parts: Vec<&str> = raw.split('_').collect();
        let [tenant, subject, flow, created_at] = parts.as_slice() else {
            return Err(NavigationError::MissingToken(format!(
                "expected 4 `_`-separated parts, found {}",
                parts.len()
            )));
        };
        if [tenant, subject, flow, created_at].iter().any(|part| part.is_empty()) {
            return Err(NavigationError::MissingToken("token parts must be non-empty".to_owned()));
        }
        let created_at_millis = created_at.parse::<i64>().map_err(|_| {
            NavigationError::MissingToken("token timestamp must be numeric".to_owned())
        })?;

        Ok(Self {
            raw: raw.to_owned(),
            tenant_id: TenantId((*tenant).to_owned()),
            subject_id: SubjectId((*subject).to_owned()),
            flow_id: FlowId((*flow).to_owned()),
            created_at_millis,
        })
    }
}
