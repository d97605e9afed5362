use serde::{Deserialize, Serialize};

/// `action` values accepted from the messaging platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowAction {
    Ping,
    Init,
    Back,
    DataExchange,
    Complete,
}

impl FlowAction {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ping" => Some(Self::Ping),
            "init" => Some(Self::Init),
            "back" => Some(Self::Back),
            "data_exchange" => Some(Self::DataExchange),
            "complete" => Some(Self::Complete),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Init => "INIT",
            Self::Back => "BACK",
            Self::DataExchange => "data_exchange",
            Self::Complete => "complete",
        }
    }
}

/// Outcome of resolving the next screen after a `data_exchange`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition {
    /// A submitted option id was found in the navigate table.
    OptionLookup { option_id: String, target: String },
    /// Reload node: re-render the current screen.
    Stay { screen: String },
    /// First successor in `routing_model`.
    DefaultNext { target: String },
    /// No successor; the flow completes.
    Terminal,
}

impl Transition {
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::OptionLookup { target, .. } | Self::DefaultNext { target } => Some(target),
            Self::Stay { screen } => Some(screen),
            Self::Terminal => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::OptionLookup { .. } => "option_lookup",
            Self::Stay { .. } => "stay",
            Self::DefaultNext { .. } => "default_next",
            Self::Terminal => "terminal",
        }
    }
}

/// Named generators that fill screen data on entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DataSourceTrigger {
    AvailableSlots,
    Unknown(String),
}

impl DataSourceTrigger {
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "available_slots" | "availableSlots" | "getAvailableSlots" | "slots" => {
                Self::AvailableSlots
            }
            other => Self::Unknown(other.to_owned()),
        }
    }
}
