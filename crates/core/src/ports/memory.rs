use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use serde_json::Value;

use crate::domain::booking::{BookingRecord, NewBooking};
use crate::domain::definition::StoredFlowDefinition;
use crate::domain::ids::{FlowId, SubjectId, TenantId};
use crate::errors::RepositoryError;
use crate::ports::{
    BookingRepository, CalendarEvent, CalendarEventRequest, CalendarIntegration, ConversationLog,
    DefinitionRepository, RealtimeNotifier,
};
use crate::scheduling::parse_slot_id;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[derive(Default)]
pub struct InMemoryDefinitionRepository {
    definitions: Mutex<HashMap<(String, String), StoredFlowDefinition>>,
}

#[async_trait]
impl DefinitionRepository for InMemoryDefinitionRepository {
    async fn get_flow_definition(
        &self,
        tenant_id: &TenantId,
        flow_id: &FlowId,
    ) -> Result<Option<StoredFlowDefinition>, RepositoryError> {
        let definitions = lock(&self.definitions);
        Ok(definitions.get(&(tenant_id.0.clone(), flow_id.0.clone())).cloned())
    }

    async fn save_flow_definition(
        &self,
        definition: StoredFlowDefinition,
    ) -> Result<(), RepositoryError> {
        let key = (definition.tenant_id.0.clone(), definition.flow_id.0.clone());
        lock(&self.definitions).insert(key, definition);
        Ok(())
    }
}

/// `failing()` keeps reads working and rejects every insert.
#[derive(Clone, Default)]
pub struct InMemoryBookingRepository {
    bookings: Arc<Mutex<Vec<BookingRecord>>>,
    fail: bool,
}

impl InMemoryBookingRepository {
    pub fn failing() -> Self {
        Self { bookings: Arc::default(), fail: true }
    }

    pub fn bookings(&self) -> Vec<BookingRecord> {
        lock(&self.bookings).clone()
    }
}

#[async_trait]
impl BookingRepository for InMemoryBookingRepository {
    async fn busy_slot_ids(
        &self,
        tenant_id: &TenantId,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<BTreeSet<String>, RepositoryError> {
        let bookings = lock(&self.bookings);
        Ok(bookings
            .iter()
            .filter(|booking| &booking.tenant_id == tenant_id)
            .filter(|booking| {
                parse_slot_id(&booking.slot_id).is_some_and(|at| at >= from && at <= to)
            })
            .map(|booking| booking.slot_id.clone())
            .collect())
    }

    async fn save_booking(&self, booking: NewBooking) -> Result<BookingRecord, RepositoryError> {
        if self.fail {
            return Err(RepositoryError::Database("booking table unavailable".to_owned()));
        }
        let record = BookingRecord::from_new(booking, Utc::now());
        lock(&self.bookings).push(record.clone());
        Ok(record)
    }
}

/// Records requests and hands back sequential event ids; `failing()` rejects every call.
#[derive(Clone, Default)]
pub struct InMemoryCalendar {
    requests: Arc<Mutex<Vec<CalendarEventRequest>>>,
    fail: bool,
}

impl InMemoryCalendar {
    pub fn failing() -> Self {
        Self { requests: Arc::default(), fail: true }
    }

    pub fn requests(&self) -> Vec<CalendarEventRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl CalendarIntegration for InMemoryCalendar {
    async fn create_event(
        &self,
        request: CalendarEventRequest,
    ) -> Result<CalendarEvent, RepositoryError> {
        let mut requests = lock(&self.requests);
        requests.push(request);
        if self.fail {
            return Err(RepositoryError::Integration("calendar unavailable".to_owned()));
        }
        Ok(CalendarEvent { external_event_id: format!("evt-{}", requests.len()) })
    }
}

#[derive(Clone, Default)]
pub struct InMemoryConversationLog {
    summaries: Arc<Mutex<Vec<(TenantId, SubjectId, String)>>>,
    fail: bool,
}

impl InMemoryConversationLog {
    pub fn failing() -> Self {
        Self { summaries: Arc::default(), fail: true }
    }

    pub fn summaries(&self) -> Vec<(TenantId, SubjectId, String)> {
        lock(&self.summaries).clone()
    }
}

#[async_trait]
impl ConversationLog for InMemoryConversationLog {
    async fn save_summary(
        &self,
        tenant_id: &TenantId,
        subject_id: &SubjectId,
        summary: &str,
    ) -> Result<(), RepositoryError> {
        if self.fail {
            return Err(RepositoryError::Database("conversation log unavailable".to_owned()));
        }
        lock(&self.summaries).push((tenant_id.clone(), subject_id.clone(), summary.to_owned()));
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryNotifier {
    events: Arc<Mutex<Vec<(TenantId, SubjectId, Value)>>>,
}

impl InMemoryNotifier {
    pub fn events(&self) -> Vec<(TenantId, SubjectId, Value)> {
        lock(&self.events).clone()
    }
}

#[async_trait]
impl RealtimeNotifier for InMemoryNotifier {
    async fn notify(
        &self,
        tenant_id: &TenantId,
        subject_id: &SubjectId,
        event: Value,
    ) -> Result<(), RepositoryError> {
        lock(&self.events).push((tenant_id.clone(), subject_id.clone(), event));
        Ok(())
    }
}
