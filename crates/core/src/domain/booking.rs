use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::ids::{SubjectId, TenantId};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookingId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBooking {
    pub tenant_id: TenantId,
    pub slot_id: String,
    pub subject_id: SubjectId,
    pub title: String,
    pub duration_minutes: u32,
    pub attendee_email: Option<String>,
    pub external_event_id: Option<String>,
}

/// A confirmed appointment. Written once at flow completion and never
/// mutated by the flow engine afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub id: BookingId,
    pub tenant_id: TenantId,
    pub slot_id: String,
    pub subject_id: SubjectId,
    pub title: String,
    pub duration_minutes: u32,
    pub attendee_email: Option<String>,
    pub external_event_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BookingRecord {
    pub fn from_new(booking: NewBooking, created_at: DateTime<Utc>) -> Self {
        Self {
            id: BookingId(format!("BK-{}", Uuid::new_v4().simple())),
            tenant_id: booking.tenant_id,
            slot_id: booking.slot_id,
            subject_id: booking.subject_id,
            title: booking.title,
            duration_minutes: booking.duration_minutes,
            attendee_email: booking.attendee_email,
            external_event_id: booking.external_event_id,
            created_at,
        }
    }
}
