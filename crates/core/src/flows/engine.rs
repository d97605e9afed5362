use serde_json::{Map, Value};

use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use crate::errors::NavigationError;
use crate::flows::graph::{is_option_id, FieldRole, FlowGraph, ScreenKind};
use crate::flows::states::Transition;

/// Interprets a [`FlowGraph`] to pick the screen that follows a submission.
#[derive(Clone, Copy, Debug, Default)]
pub struct NavigationEngine;

impl NavigationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Resolution order: submitted option id, reload node, default successor, terminal.
    /// A current screen the graph does not know is rejected before anything else.
    pub fn resolve(
        &self,
        graph: &FlowGraph,
        current_screen: &str,
        incoming: &Map<String, Value>,
    ) -> Result<Transition, NavigationError> {
        ensure_screen(graph, current_screen)?;

        if let Some(option_id) = submitted_option(graph, incoming) {
            let entry = graph.option(&option_id).ok_or_else(|| NavigationError::UnknownOption {
                option_id: option_id.clone(),
                screen: current_screen.to_owned(),
            })?;
            ensure_screen(graph, &entry.screen)?;
            return Ok(Transition::OptionLookup { option_id, target: entry.screen.clone() });
        }

        if graph.kind_of(current_screen) == ScreenKind::ReloadNode {
            return Ok(Transition::Stay { screen: current_screen.to_owned() });
        }

        match graph.default_next(current_screen) {
            Some(target) => {
                ensure_screen(graph, target)?;
                Ok(Transition::DefaultNext { target: target.to_owned() })
            }
            None => Ok(Transition::Terminal),
        }
    }

    pub fn resolve_with_audit<S>(
        &self,
        graph: &FlowGraph,
        current_screen: &str,
        incoming: &Map<String, Value>,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<Transition, NavigationError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.resolve(graph, current_screen, incoming);
        match &result {
            Ok(transition) => sink.emit(
                audit
                    .event("flow.transition_applied", AuditCategory::Flow, AuditOutcome::Success)
                    .with_metadata("from", current_screen)
                    .with_metadata("to", transition.target().unwrap_or("SUCCESS"))
                    .with_metadata("transition", transition.kind()),
            ),
            Err(error) => sink.emit(
                audit
                    .event("flow.transition_rejected", AuditCategory::Flow, AuditOutcome::Rejected)
                    .with_metadata("from", current_screen)
                    .with_metadata("error", error.to_string()),
            ),
        }
        result
    }
}

/// First option-shaped value in key order. Declared selectors always count,
/// declared inputs never do, undeclared fields follow the prefix convention.
/// Only single-value (string) fields navigate; multi-select arrays such as
/// `CheckboxGroup` answers are kept as session data and never pick a route.
fn submitted_option(graph: &FlowGraph, incoming: &Map<String, Value>) -> Option<String> {
    let mut keys: Vec<&String> = incoming.keys().collect();
    keys.sort();

    keys.into_iter().find_map(|key| {
        let value = incoming.get(key)?.as_str()?.trim();
        if value.is_empty() {
            return None;
        }
        let selected = match graph.field(key).and_then(|field| field.role) {
            Some(FieldRole::Selector) => true,
            Some(FieldRole::Input) => false,
            None => is_option_id(value),
        };
        selected.then(|| value.to_owned())
    })
}

fn ensure_screen(graph: &FlowGraph, screen: &str) -> Result<(), NavigationError> {
    if graph.contains_screen(screen) {
        Ok(())
    } else {
        Err(NavigationError::UnknownScreen(screen.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Value};

    use crate::audit::{AuditContext, InMemoryAuditSink};
    use crate::errors::NavigationError;
    use crate::flows::engine::NavigationEngine;
    use crate::flows::graph::FlowGraph;
    use crate::flows::states::Transition;

    fn data(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn graph(screens: Value, navigate: Value) -> FlowGraph {
        FlowGraph::from_documents(&screens.to_string(), &navigate.to_string()).expect("graph")
    }

    #[test]
    fn falls_back_to_first_routing_successor() {
        let graph = graph(json!({"routing_model": {"FORM_A": ["FORM_B"], "FORM_B": []}}), json!({}));

        let transition = NavigationEngine::new()
            .resolve(&graph, "FORM_A", &data(json!({"name": "Ana"})))
            .expect("transition");

        assert_eq!(transition, Transition::DefaultNext { target: "FORM_B".to_owned() });
    }

    #[test]
    fn option_ids_route_through_navigate_table() {
        let graph = graph(
            json!({"routing_model": {"MENU": ["OTHER"], "SCREEN_Y": [], "OTHER": []}}),
            json!({"opcion_x": {"pantalla": "SCREEN_Y", "valor": "Plan X"}}),
        );

        let transition = NavigationEngine::new()
            .resolve(&graph, "MENU", &data(json!({"choice": "opcion_x"})))
            .expect("transition");

        assert_eq!(
            transition,
            Transition::OptionLookup { option_id: "opcion_x".to_owned(), target: "SCREEN_Y".to_owned() }
        );
    }

    #[test]
    fn unknown_option_is_an_error_not_a_fallback() {
        let graph = graph(
            json!({"routing_model": {"MENU": ["NEXT"], "NEXT": []}}),
            json!({"opcion_x": {"pantalla": "NEXT", "valor": "X"}}),
        );

        let result =
            NavigationEngine::new().resolve(&graph, "MENU", &data(json!({"choice": "opcion_unknown"})));

        assert_eq!(
            result,
            Err(NavigationError::UnknownOption {
                option_id: "opcion_unknown".to_owned(),
                screen: "MENU".to_owned(),
            })
        );
    }

    #[test]
    fn declared_roles_override_the_prefix_convention() {
        let graph = graph(
            json!({
                "routing_model": {"MENU": ["NEXT"], "NEXT": [], "GOLD": []},
                "screens": [{"id": "MENU", "layout": {"children": [
                    {"type": "Dropdown", "name": "tier", "role": "selector"},
                    {"type": "TextInput", "name": "note", "role": "input"}
                ]}}]
            }),
            json!({"gold": {"pantalla": "GOLD", "valor": "Gold"}}),
        );
        let engine = NavigationEngine::new();

        let by_selector = engine
            .resolve(&graph, "MENU", &data(json!({"tier": "gold"})))
            .expect("selector transition");
        assert_eq!(by_selector.target(), Some("GOLD"));

        let input_only = engine
            .resolve(&graph, "MENU", &data(json!({"note": "opcion_looks_like_an_option"})))
            .expect("input transition");
        assert_eq!(input_only, Transition::DefaultNext { target: "NEXT".to_owned() });
    }

    #[test]
    fn reload_nodes_stay_and_exhausted_routes_terminate() {
        let graph = graph(
            json!({
                "routing_model": {"CART": ["DONE"], "DONE": []},
                "screen_config": {"CART": {"type": "reloadNode"}}
            }),
            json!({}),
        );
        let engine = NavigationEngine::new();

        assert_eq!(
            engine.resolve(&graph, "CART", &Map::new()),
            Ok(Transition::Stay { screen: "CART".to_owned() })
        );
        assert_eq!(engine.resolve(&graph, "DONE", &Map::new()), Ok(Transition::Terminal));
    }

    #[test]
    fn targets_outside_the_graph_are_rejected() {
        let graph = graph(
            json!({"routing_model": {"MENU": ["GHOST"]}}),
            json!({"opcion_a": {"pantalla": "NOWHERE"}}),
        );
        let engine = NavigationEngine::new();

        assert_eq!(
            engine.resolve(&graph, "MENU", &data(json!({"pick": "opcion_a"}))),
            Err(NavigationError::UnknownScreen("NOWHERE".to_owned()))
        );
        assert_eq!(
            engine.resolve(&graph, "MENU", &Map::new()),
            Err(NavigationError::UnknownScreen("GHOST".to_owned()))
        );
    }

    #[test]
    fn unknown_current_screen_is_rejected_instead_of_terminating() {
        let graph = graph(json!({"routing_model": {"MENU": ["DONE"], "DONE": []}}), json!({}));

        assert_eq!(
            NavigationEngine::new().resolve(&graph, "NO_SUCH_SCREEN", &Map::new()),
            Err(NavigationError::UnknownScreen("NO_SUCH_SCREEN".to_owned()))
        );
    }

    #[test]
    fn multi_select_answers_do_not_pick_a_route() {
        let graph = graph(
            json!({
                "routing_model": {"MENU": ["NEXT"], "NEXT": [], "GOLD": []},
                "screens": [{"id": "MENU", "layout": {"children": [
                    {"type": "CheckboxGroup", "name": "extras", "role": "selector"}
                ]}}]
            }),
            json!({"gold": {"pantalla": "GOLD", "valor": "Gold"}}),
        );

        let transition = NavigationEngine::new()
            .resolve(&graph, "MENU", &data(json!({"extras": ["gold", "opcion_x"]})))
            .expect("transition");

        assert_eq!(transition, Transition::DefaultNext { target: "NEXT".to_owned() });
    }

    #[test]
    fn audited_resolution_records_applied_and_rejected_transitions() {
        let graph = graph(json!({"routing_model": {"A": ["B"], "B": []}}), json!({}));
        let sink = InMemoryAuditSink::default();
        let audit = AuditContext::new(None, None, "req-1", "flow-engine");
        let engine = NavigationEngine::new();

        engine.resolve_with_audit(&graph, "A", &Map::new(), &sink, &audit).expect("applied");
        let _ = engine.resolve_with_audit(
            &graph,
            "A",
            &data(json!({"x": "opcion_missing"})),
            &sink,
            &audit,
        );

        assert_eq!(sink.event_types(), vec!["flow.transition_applied", "flow.transition_rejected"]);
        assert_eq!(sink.events()[0].metadata.get("to").map(String::as_str), Some("B"));
    }
}
