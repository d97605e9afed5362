pub mod engine;
pub mod graph;
pub mod handler;
pub mod protocol;
pub mod resolver;
pub mod states;
pub mod summary;
pub mod token;

pub use engine::NavigationEngine;
pub use graph::{FieldKind, FieldRole, FlowGraph, FormField, NavigateEntry, Screen, ScreenConfig, ScreenKind};
pub use handler::{FlowCollaborators, FlowRequestHandler};
pub use protocol::{DecryptedRequest, FlowResponse};
pub use resolver::FlowDefinitionResolver;
pub use states::{DataSourceTrigger, FlowAction, Transition};
pub use summary::build_summary;
pub use token::FlowToken;
