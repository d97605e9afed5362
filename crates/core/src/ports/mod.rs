//! Collaborator seams of the flow engine.
//!
//! Persistence lives in `flowgate-db`, outbound HTTP clients in
//! `flowgate-server`. The in-memory implementations in [`memory`] back tests
//! and local runs.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::booking::{BookingRecord, NewBooking};
use crate::domain::definition::StoredFlowDefinition;
use crate::domain::ids::{FlowId, SubjectId, TenantId};
use crate::errors::RepositoryError;

pub mod memory;

#[async_trait]
pub trait DefinitionRepository: Send + Sync {
    async fn get_flow_definition(
        &self,
        tenant_id: &TenantId,
        flow_id: &FlowId,
    ) -> Result<Option<StoredFlowDefinition>, RepositoryError>;

    async fn save_flow_definition(
        &self,
        definition: StoredFlowDefinition,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Slot ids already booked for the tenant whose start lies in `[from, to]`.
    async fn busy_slot_ids(
        &self,
        tenant_id: &TenantId,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<BTreeSet<String>, RepositoryError>;

    async fn save_booking(&self, booking: NewBooking) -> Result<BookingRecord, RepositoryError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEventRequest {
    pub tenant_id: TenantId,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub title: String,
    pub duration_minutes: u32,
    pub attendee_emails: Vec<String>,
    pub scheduling_tool: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub external_event_id: String,
}

#[async_trait]
pub trait CalendarIntegration: Send + Sync {
    async fn create_event(
        &self,
        request: CalendarEventRequest,
    ) -> Result<CalendarEvent, RepositoryError>;
}

#[async_trait]
pub trait ConversationLog: Send + Sync {
    async fn save_summary(
        &self,
        tenant_id: &TenantId,
        subject_id: &SubjectId,
        summary: &str,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait RealtimeNotifier: Send + Sync {
    async fn notify(
        &self,
        tenant_id: &TenantId,
        subject_id: &SubjectId,
        event: Value,
    ) -> Result<(), RepositoryError>;
}
