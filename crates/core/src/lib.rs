pub mod audit;
pub mod config;
pub mod crypto;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod ports;
pub mod scheduling;
pub mod session;

pub use crypto::{EncryptedEnvelope, FlowCodec, PeerCipher};
pub use domain::{BookingRecord, FlowId, NewBooking, StoredFlowDefinition, SubjectId, TenantId};
pub use errors::{
    CryptoError, DefinitionError, FlowError, InterfaceError, NavigationError, RepositoryError,
};
pub use flows::{FlowCollaborators, FlowGraph, FlowRequestHandler, FlowToken, NavigationEngine};
pub use scheduling::{generate_candidates, AvailabilityConfig, SlotCandidate, SlotScheduler};
pub use session::{InMemorySessionStore, SessionSnapshot, SessionStore};
