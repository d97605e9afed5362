//! Parsed, immutable view of one tenant flow definition.
//!
//! A definition is stored as two JSON documents: the screen document
//! (`routing_model`, `screens`, `screen_config`) and the navigation table
//! mapping option ids to `{ "pantalla": <screen>, "valor": <display text> }`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::DefinitionError;

/// Values carrying one of these prefixes are option ids unless the field says otherwise.
pub const OPTION_ID_PREFIXES: [&str; 2] = ["opcion_", "option_"];

const DATE_COMPONENTS: [&str; 2] = ["DatePicker", "CalendarPicker"];
const CHOICE_COMPONENTS: [&str; 4] =
    ["Dropdown", "RadioButtonsGroup", "CheckboxGroup", "ChipsSelector"];
const TEXT_COMPONENTS: [&str; 3] = ["TextInput", "TextArea", "OptIn"];

pub fn is_option_id(value: &str) -> bool {
    OPTION_ID_PREFIXES.iter().any(|prefix| value.starts_with(prefix) && value.len() > prefix.len())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    Date,
    Choice,
    Text,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRole {
    Input,
    Selector,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    pub label: Option<String>,
    pub kind: FieldKind,
    pub role: Option<FieldRole>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screen {
    pub id: String,
    pub title: Option<String>,
    pub terminal: bool,
    pub fields: Vec<FormField>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScreenKind {
    #[default]
    Plain,
    AppointmentNode,
    ConfirmationNode,
    ReloadNode,
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreenConfig {
    #[serde(rename = "type", default)]
    pub kind: ScreenKind,
    #[serde(rename = "dataSourceTrigger", default, skip_serializing_if = "Option::is_none")]
    pub data_source_trigger: Option<String>,
    #[serde(default)]
    pub config: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigateEntry {
    #[serde(rename = "pantalla", alias = "screen")]
    pub screen: String,
    #[serde(rename = "valor", alias = "value", default)]
    pub value: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FlowGraph {
    initial_screen: String,
    pub routing_model: IndexMap<String, Vec<String>>,
    pub screens: Vec<Screen>,
    pub screen_config: IndexMap<String, ScreenConfig>,
    pub navigate: IndexMap<String, NavigateEntry>,
}

#[derive(Deserialize)]
struct ScreenDocument {
    #[serde(default)]
    initial_screen: Option<String>,
    routing_model: IndexMap<String, Vec<String>>,
    #[serde(default)]
    screens: Vec<ScreenEntry>,
    #[serde(default)]
    screen_config: IndexMap<String, ScreenConfig>,
}

#[derive(Deserialize)]
struct ScreenEntry {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    terminal: bool,
    #[serde(default)]
    layout: Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NavigationDocument {
    Wrapped { navigate: IndexMap<String, NavigateEntry> },
    Bare(IndexMap<String, NavigateEntry>),
}

impl FlowGraph {
    pub fn from_documents(screens_json: &str, navigation_json: &str) -> Result<Self, DefinitionError> {
        let document: ScreenDocument = serde_json::from_str(screens_json)
            .map_err(|error| DefinitionError::Malformed(format!("screen document: {error}")))?;
        let navigate = match serde_json::from_str::<NavigationDocument>(navigation_json) {
            Ok(NavigationDocument::Wrapped { navigate }) | Ok(NavigationDocument::Bare(navigate)) => {
                navigate
            }
            Err(error) => {
                return Err(DefinitionError::Malformed(format!("navigation document: {error}")))
            }
        };

        let initial_screen = match document.initial_screen {
            Some(screen) => screen,
            None => document.routing_model.keys().next().cloned().ok_or_else(|| {
                DefinitionError::Malformed("routing_model must declare at least one screen".into())
            })?,
        };

        let screens = document
            .screens
            .into_iter()
            .map(|entry| {
                let mut fields = Vec::new();
                collect_fields(&entry.layout, &mut fields);
                Screen { id: entry.id, title: entry.title, terminal: entry.terminal, fields }
            })
            .collect();

        Ok(Self {
            initial_screen,
            routing_model: document.routing_model,
            screens,
            screen_config: document.screen_config,
            navigate,
        })
    }

    pub fn initial_screen(&self) -> &str {
        &self.initial_screen
    }

    pub fn contains_screen(&self, screen_id: &str) -> bool {
        self.routing_model.contains_key(screen_id)
            || self.screens.iter().any(|screen| screen.id == screen_id)
    }

    pub fn screen(&self, screen_id: &str) -> Option<&Screen> {
        self.screens.iter().find(|screen| screen.id == screen_id)
    }

    pub fn config_for(&self, screen_id: &str) -> Option<&ScreenConfig> {
        self.screen_config.get(screen_id)
    }

    pub fn kind_of(&self, screen_id: &str) -> ScreenKind {
        self.config_for(screen_id).map(|config| config.kind).unwrap_or_default()
    }

    /// First screen, in config order, configured as an appointment node.
    pub fn appointment_screen(&self) -> Option<(&str, &ScreenConfig)> {
        self.screen_config
            .iter()
            .find(|(_, config)| config.kind == ScreenKind::AppointmentNode)
            .map(|(id, config)| (id.as_str(), config))
    }

    /// First declaration of `name` across screens in definition order.
    pub fn field(&self, name: &str) -> Option<&FormField> {
        self.screens.iter().flat_map(|screen| screen.fields.iter()).find(|field| field.name == name)
    }

    pub fn option(&self, option_id: &str) -> Option<&NavigateEntry> {
        self.navigate.get(option_id)
    }

    pub fn default_next(&self, screen_id: &str) -> Option<&str> {
        self.routing_model.get(screen_id).and_then(|next| next.first()).map(String::as_str)
    }
}

fn collect_fields(node: &Value, fields: &mut Vec<FormField>) {
    match node {
        Value::Array(items) => items.iter().for_each(|item| collect_fields(item, fields)),
        Value::Object(object) => {
            let component = object.get("type").and_then(Value::as_str).unwrap_or_default();
            let name = object.get("name").and_then(Value::as_str);
            if let (Some(kind), Some(name)) = (field_kind(component), name) {
                let label = object
                    .get("label")
                    .and_then(Value::as_str)
                    .filter(|label| !label.trim().is_empty() && !label.starts_with("${"))
                    .map(str::to_owned);
                let role = object
                    .get("role")
                    .and_then(|role| serde_json::from_value::<FieldRole>(role.clone()).ok());
                fields.push(FormField { name: name.to_owned(), label, kind, role });
            }
            if let Some(children) = object.get("children") {
                collect_fields(children, fields);
            }
        }
        _ => {}
    }
}

fn field_kind(component: &str) -> Option<FieldKind> {
    if DATE_COMPONENTS.contains(&component) {
        Some(FieldKind::Date)
    } else if CHOICE_COMPONENTS.contains(&component) {
        Some(FieldKind::Choice)
    } else if TEXT_COMPONENTS.contains(&component) {
        Some(FieldKind::Text)
    } else {
        None
    }
}


#[cfg(test)]
mod tests {
    use crate::errors::DefinitionError;
    use crate::flows::graph::fixtures::{navigation_document, screen_document};
    use crate::flows::graph::{is_option_id, FieldKind, FieldRole, FlowGraph, ScreenKind};

    fn graph() -> FlowGraph {
        FlowGraph::from_documents(
            &screen_document().to_string(),
            &navigation_document().to_string(),
        )
        .expect("fixture graph")
    }

    #[test]
    fn parses_routing_screens_fields_and_navigation() {
        let graph = graph();

        assert_eq!(graph.initial_screen(), "MENU");
        assert_eq!(graph.default_next("MENU"), Some("DETAILS"));
        assert_eq!(graph.default_next("CONFIRM"), None);
        assert_eq!(graph.kind_of("CONFIRM"), ScreenKind::ConfirmationNode);
        assert_eq!(graph.kind_of("MENU"), ScreenKind::Plain);
        assert_eq!(graph.appointment_screen().map(|(id, _)| id), Some("SLOTS"));
        assert_eq!(graph.option("option_basic").map(|entry| entry.screen.as_str()), Some("DETAILS"));

        let details = graph.screen("DETAILS").expect("details screen");
        let names: Vec<&str> = details.fields.iter().map(|field| field.name.as_str()).collect();
        assert_eq!(names, vec!["full_name", "email", "visit_date", "extras"]);
        assert_eq!(details.fields[0].label, None);
        assert_eq!(details.fields[1].role, Some(FieldRole::Input));
        assert_eq!(details.fields[2].kind, FieldKind::Date);
        assert_eq!(details.fields[3].kind, FieldKind::Choice);
        assert!(graph.screen("CONFIRM").is_some_and(|screen| screen.terminal));
    }

    #[test]
    fn wrapped_navigation_document_is_accepted() {
        let graph = FlowGraph::from_documents(
            r#"{"routing_model": {"A": []}}"#,
            r#"{"navigate": {"opcion_a": {"pantalla": "A", "valor": "A"}}}"#,
        )
        .expect("graph");

        assert!(graph.option("opcion_a").is_some());
        assert!(graph.contains_screen("A"));
        assert!(!graph.contains_screen("B"));
    }

    #[test]
    fn malformed_documents_are_rejected() {
        let bad_screens = FlowGraph::from_documents("{not json", "{}");
        assert!(matches!(bad_screens, Err(DefinitionError::Malformed(_))));

        let bad_navigation = FlowGraph::from_documents(r#"{"routing_model": {"A": []}}"#, "[1, 2]");
        assert!(matches!(bad_navigation, Err(DefinitionError::Malformed(_))));

        let empty_routing = FlowGraph::from_documents(r#"{"routing_model": {}}"#, "{}");
        assert!(matches!(empty_routing, Err(DefinitionError::Malformed(_))));
    }

    #[test]
    fn option_id_convention_requires_a_suffix() {
        assert!(is_option_id("opcion_x"));
        assert!(is_option_id("option_basic"));
        assert!(!is_option_id("opcion_"));
        assert!(!is_option_id("Plan X"));
    }
}
