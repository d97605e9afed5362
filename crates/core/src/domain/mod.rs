pub mod booking;
pub mod definition;
pub mod ids;

pub use booking::{BookingId, BookingRecord, NewBooking};
pub use definition::StoredFlowDefinition;
pub use ids::{FlowId, SubjectId, TenantId};
