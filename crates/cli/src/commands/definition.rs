use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use flowgate_core::flows::states::DataSourceTrigger;
use flowgate_core::ports::DefinitionRepository;
use flowgate_core::{AvailabilityConfig, FlowGraph, FlowId, StoredFlowDefinition, TenantId};
use flowgate_db::SqlDefinitionRepository;
use serde_json::{json, Value};

use crate::commands::{load_config, open_pool, runtime, CommandResult, Failure};

#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub tenant_id: String,
    pub flow_id: String,
    pub screens_path: PathBuf,
    pub navigation_path: PathBuf,
    pub description: String,
}

pub fn import(request: ImportRequest) -> CommandResult {
    const COMMAND: &str = "definition.import";

    let (screens_json, navigation_json) =
        match read_document(&request.screens_path).and_then(|screens| {
            read_document(&request.navigation_path).map(|navigation| (screens, navigation))
        }) {
            Ok(documents) => documents,
            Err(error) => {
                return CommandResult::failure(COMMAND, "input_read", format!("{error:#}"), 6)
            }
        };

    let graph = match validate(&screens_json, &navigation_json) {
        Ok(graph) => graph,
        Err(message) => return CommandResult::failure(COMMAND, "definition_invalid", message, 7),
    };

    let definition = StoredFlowDefinition {
        tenant_id: TenantId(request.tenant_id),
        flow_id: FlowId(request.flow_id),
        screen_graph_json: screens_json,
        navigation_json,
        description: request.description,
        updated_at: Utc::now(),
    };
    let message = format!(
        "stored flow `{}` for tenant `{}` ({} screens, {} options)",
        definition.flow_id,
        definition.tenant_id,
        graph.screens.len(),
        graph.navigate.len()
    );

    let result = load_config().and_then(|config| {
        runtime()?.block_on(async move {
            let pool = open_pool(&config).await?;
            let repository = SqlDefinitionRepository::new(pool.clone());
            repository
                .save_flow_definition(definition)
                .await
                .map_err(|error| ("persistence", error.to_string(), 5u8))?;
            pool.close().await;
            Ok::<(), Failure>(())
        })
    });

    match result {
        Ok(()) => CommandResult::success(COMMAND, message),
        Err(failure) => CommandResult::from_failure(COMMAND, failure),
    }
}

pub fn show(tenant_id: &str, flow_id: &str) -> CommandResult {
    const COMMAND: &str = "definition.show";

    let result = load_config().and_then(|config| {
        runtime()?.block_on(async move {
            let pool = open_pool(&config).await?;
            let stored = SqlDefinitionRepository::new(pool.clone())
                .get_flow_definition(&TenantId(tenant_id.to_string()), &FlowId(flow_id.to_string()))
                .await
                .map_err(|error| ("persistence", error.to_string(), 5u8))?;
            pool.close().await;
            stored.ok_or_else(|| {
                (
                    "definition_not_found",
                    format!("no flow `{flow_id}` stored for tenant `{tenant_id}`"),
                    8u8,
                )
            })
        })
    });

    let stored = match result {
        Ok(stored) => stored,
        Err(failure) => return CommandResult::from_failure(COMMAND, failure),
    };

    match FlowGraph::from_documents(&stored.screen_graph_json, &stored.navigation_json) {
        Ok(graph) => CommandResult::success_with_data(
            COMMAND,
            format!("flow `{flow_id}` for tenant `{tenant_id}`"),
            Some(outline(&stored, &graph)),
        ),
        Err(error) => CommandResult::failure(COMMAND, "definition_invalid", error.to_string(), 7),
    }
}

fn read_document(path: &Path) -> anyhow::Result<String> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading `{}`", path.display()))?;
    serde_json::from_str::<Value>(&raw)
        .with_context(|| format!("`{}` is not valid JSON", path.display()))?;
    Ok(raw)
}

/// Parses the graph and every slot-generating screen's availability block.
fn validate(screens_json: &str, navigation_json: &str) -> Result<FlowGraph, String> {
    let graph =
        FlowGraph::from_documents(screens_json, navigation_json).map_err(|error| error.to_string())?;

    for (option_id, entry) in &graph.navigate {
        if !graph.contains_screen(&entry.screen) {
            return Err(format!("option `{option_id}` targets unknown screen `{}`", entry.screen));
        }
    }
    for (screen_id, config) in &graph.screen_config {
        let Some(trigger) = &config.data_source_trigger else { continue };
        if DataSourceTrigger::from_name(trigger) == DataSourceTrigger::AvailableSlots {
            AvailabilityConfig::from_value(&config.config)
                .map_err(|error| format!("screen `{screen_id}`: {error}"))?;
        }
    }

    Ok(graph)
}

fn outline(stored: &StoredFlowDefinition, graph: &FlowGraph) -> Value {
    let screens: Vec<Value> = graph
        .screens
        .iter()
        .map(|screen| {
            json!({
                "id": screen.id,
                "kind": graph.kind_of(&screen.id),
                "next": graph.routing_model.get(&screen.id).cloned().unwrap_or_default(),
                "fields": screen.fields.iter().map(|field| field.name.as_str()).collect::<Vec<_>>(),
            })
        })
        .collect();
    let options: Vec<Value> = graph
        .navigate
        .iter()
        .map(|(id, entry)| json!({"id": id, "screen": entry.screen, "label": entry.value}))
        .collect();

    json!({
        "tenant_id": stored.tenant_id,
        "flow_id": stored.flow_id,
        "description": stored.description,
        "updated_at": stored.updated_at.to_rfc3339(),
        "initial_screen": graph.initial_screen(),
        "screens": screens,
        "options": options,
    })
}

#[cfg(test)]
mod tests {
    use super::validate;

    const SCREENS: &str = r#"{
        "routing_model": {"MENU": ["SLOTS"], "SLOTS": []},
        "screens": [{"id": "MENU"}, {"id": "SLOTS", "terminal": true}],
        "screen_config": {
            "SLOTS": {
                "type": "appointmentNode",
                "dataSourceTrigger": "available_slots",
                "config": {"daysAvailable": [1], "startTime": "09:00", "endTime": "08:00", "intervalMinutes": 30}
            }
        }
    }"#;

    #[test]
    fn rejects_options_pointing_at_unknown_screens() {
        let error = validate(
            r#"{"routing_model": {"MENU": []}, "screens": [{"id": "MENU"}]}"#,
            r#"{"opcion_x": {"pantalla": "NOWHERE", "valor": "X"}}"#,
        )
        .expect_err("dangling option");

        assert!(error.contains("NOWHERE"));
    }

    #[test]
    fn rejects_invalid_availability_on_slot_screens() {
        let error = validate(SCREENS, "{}").expect_err("end before start");

        assert!(error.starts_with("screen `SLOTS`"));
    }
}
