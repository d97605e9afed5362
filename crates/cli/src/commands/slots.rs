use std::sync::Arc;

use chrono::{DateTime, Utc};
use flowgate_core::flows::FlowDefinitionResolver;
use flowgate_core::{AvailabilityConfig, DefinitionError, FlowError, FlowId, SlotScheduler, TenantId};
use flowgate_db::{SqlBookingRepository, SqlDefinitionRepository};
use serde_json::json;

use crate::commands::{load_config, open_pool, runtime, CommandResult, Failure};

const COMMAND: &str = "slots";

pub fn run(tenant_id: &str, flow_id: &str, screen: Option<&str>, at: Option<&str>) -> CommandResult {
    let now = match at.map(parse_instant).transpose() {
        Ok(instant) => instant.unwrap_or_else(Utc::now),
        Err(failure) => return CommandResult::from_failure(COMMAND, failure),
    };
    let tenant_id = TenantId(tenant_id.to_string());
    let flow_id = FlowId(flow_id.to_string());

    let result = load_config().and_then(|config| {
        runtime()?.block_on(async move {
            let pool = open_pool(&config).await?;
            let resolver =
                FlowDefinitionResolver::new(Arc::new(SqlDefinitionRepository::new(pool.clone())));
            let graph = resolver
                .resolve(&tenant_id, &flow_id)
                .await
                .map_err(resolve_failure)?;

            let (screen_id, screen_config) = match screen {
                Some(id) => graph.config_for(id).map(|config| (id, config)),
                None => graph.appointment_screen(),
            }
            .ok_or_else(|| {
                (
                    "screen_not_configured",
                    format!("flow `{flow_id}` has no slot configuration for the requested screen"),
                    9u8,
                )
            })?;
            let availability = AvailabilityConfig::from_value(&screen_config.config)
                .map_err(|error| ("definition_invalid", format!("screen `{screen_id}`: {error}"), 7u8))?;

            let scheduler = SlotScheduler::new(Arc::new(SqlBookingRepository::new(pool.clone())));
            let slots = scheduler
                .available_slots(&tenant_id, &availability, now)
                .await
                .map_err(|error| ("persistence", error.to_string(), 5u8))?;
            pool.close().await;

            Ok::<_, Failure>(json!({
                "tenant_id": tenant_id,
                "flow_id": flow_id,
                "screen": screen_id,
                "evaluated_at": now.to_rfc3339(),
                "slots": slots,
            }))
        })
    });

    match result {
        Ok(data) => {
            let count = data["slots"].as_array().map(Vec::len).unwrap_or_default();
            CommandResult::success_with_data(COMMAND, format!("{count} slots available"), Some(data))
        }
        Err(failure) => CommandResult::from_failure(COMMAND, failure),
    }
}

fn resolve_failure(error: FlowError) -> Failure {
    match error {
        FlowError::Definition(DefinitionError::NotFound { .. }) => {
            ("definition_not_found", error.to_string(), 8)
        }
        FlowError::Definition(_) => ("definition_invalid", error.to_string(), 7),
        other => ("persistence", other.to_string(), 5),
    }
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>, Failure> {
    DateTime::parse_from_rfc3339(raw)
        .map(|instant| instant.with_timezone(&Utc))
        .map_err(|error| ("invalid_argument", format!("`--at {raw}` is not RFC 3339: {error}"), 10))
}
