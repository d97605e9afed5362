//! Endpoint-level orchestration: decrypt, dispatch on `action`, navigate,
//! run completion side effects, encrypt.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use crate::crypto::{EncryptedEnvelope, FlowCodec};
use crate::domain::booking::NewBooking;
use crate::errors::{CryptoError, DefinitionError, FlowError, InterfaceError};
use crate::flows::engine::NavigationEngine;
use crate::flows::graph::{FlowGraph, ScreenConfig, ScreenKind};
use crate::flows::protocol::{DecryptedRequest, FlowResponse};
use crate::flows::resolver::FlowDefinitionResolver;
use crate::flows::states::{DataSourceTrigger, FlowAction, Transition};
use crate::flows::summary::{build_summary, EMPTY_SUMMARY};
use crate::flows::token::FlowToken;
use crate::ports::{
    BookingRepository, CalendarEventRequest, CalendarIntegration, ConversationLog,
    DefinitionRepository, RealtimeNotifier,
};
use crate::scheduling::{parse_slot_id, AvailabilityConfig, SlotScheduler};
use crate::session::SessionStore;

const ACTOR: &str = "flow-endpoint";
const DEFAULT_SLOTS_OUTPUT_KEY: &str = "available_slots";

/// External collaborators the handler depends on.
#[derive(Clone)]
pub struct FlowCollaborators {
    pub definitions: Arc<dyn DefinitionRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub calendar: Arc<dyn CalendarIntegration>,
    pub conversations: Arc<dyn ConversationLog>,
    pub notifier: Arc<dyn RealtimeNotifier>,
}

/// Completion settings read from an appointment node's `config`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppointmentSettings {
    #[serde(default = "default_slot_field")]
    slot_field: String,
    #[serde(default = "default_email_field")]
    email_field: String,
    #[serde(default = "default_title")]
    title: String,
    #[serde(default = "default_duration")]
    duration_minutes: u32,
    #[serde(default)]
    scheduling_tool: Option<String>,
}

fn default_slot_field() -> String {
    "selected_slot".to_owned()
}

fn default_email_field() -> String {
    "email".to_owned()
}

fn default_title() -> String {
    "Appointment".to_owned()
}

fn default_duration() -> u32 {
    30
}

pub struct FlowRequestHandler {
    codec: Arc<FlowCodec>,
    sessions: Arc<dyn SessionStore>,
    resolver: FlowDefinitionResolver,
    scheduler: SlotScheduler,
    engine: NavigationEngine,
    calendar: Arc<dyn CalendarIntegration>,
    bookings: Arc<dyn BookingRepository>,
    conversations: Arc<dyn ConversationLog>,
    notifier: Arc<dyn RealtimeNotifier>,
    audit: Arc<dyn AuditSink>,
}

impl FlowRequestHandler {
    pub fn new(
        codec: Arc<FlowCodec>,
        sessions: Arc<dyn SessionStore>,
        collaborators: FlowCollaborators,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            codec,
            sessions,
            resolver: FlowDefinitionResolver::new(collaborators.definitions),
            scheduler: SlotScheduler::new(Arc::clone(&collaborators.bookings)),
            engine: NavigationEngine::new(),
            calendar: collaborators.calendar,
            bookings: collaborators.bookings,
            conversations: collaborators.conversations,
            notifier: collaborators.notifier,
            audit,
        }
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    pub async fn handle(&self, envelope: &EncryptedEnvelope) -> Result<String, InterfaceError> {
        self.handle_at(envelope, Utc::now()).await
    }

    /// Full request cycle at a fixed instant; returns the base64 encrypted response.
    pub async fn handle_at(
        &self,
        envelope: &EncryptedEnvelope,
        now: DateTime<Utc>,
    ) -> Result<String, InterfaceError> {
        let correlation_id = Uuid::new_v4().to_string();

        let decrypted = self.codec.decrypt(envelope).map_err(|error| {
            warn!(
                event_name = "flow.request.decrypt_failed",
                correlation_id = %correlation_id,
                error = %error,
                "flow request could not be decrypted"
            );
            FlowError::from(error).into_interface(&correlation_id)
        })?;
        info!(
            event_name = "flow.request.decrypted",
            correlation_id = %correlation_id,
            "flow request decrypted"
        );

        let response = match serde_json::from_value::<DecryptedRequest>(decrypted.body) {
            Ok(request) => self.process_request(request, now, &correlation_id).await,
            Err(error) => Err(CryptoError::MalformedPayload(error.to_string()).into()),
        }
        .map_err(|failure| {
            error!(
                event_name = "flow.request.failed",
                correlation_id = %correlation_id,
                error = %failure,
                "flow request failed"
            );
            failure.into_interface(&correlation_id)
        })?;

        decrypted
            .key
            .encrypt(&response)
            .map_err(|error| FlowError::from(error).into_interface(&correlation_id))
    }

    pub async fn process_request(
        &self,
        request: DecryptedRequest,
        now: DateTime<Utc>,
        correlation_id: &str,
    ) -> Result<FlowResponse, FlowError> {
        let action = FlowAction::parse(&request.action).ok_or_else(|| {
            CryptoError::MalformedPayload(format!("unsupported action `{}`", request.action))
        })?;

        if action == FlowAction::Ping {
            return Ok(FlowResponse::pong());
        }
        if action == FlowAction::DataExchange && request.is_error_notification() {
            warn!(
                event_name = "flow.request.client_error",
                correlation_id,
                "platform reported a client-side flow error"
            );
            return Ok(FlowResponse::acknowledged());
        }

        let token = FlowToken::parse(request.flow_token.as_deref())?;
        let audit = AuditContext::new(
            Some(token.tenant_id.clone()),
            Some(token.flow_id.clone()),
            correlation_id,
            ACTOR,
        );
        info!(
            event_name = "flow.request.dispatched",
            correlation_id,
            tenant_id = %token.tenant_id,
            flow_id = %token.flow_id,
            action = action.as_str(),
            "dispatching flow request"
        );

        match action {
            FlowAction::Ping => Ok(FlowResponse::pong()),
            FlowAction::Init => self.initialize(&request, &token, &audit, now).await,
            FlowAction::Back => self.go_back(&request, &token, now).await,
            FlowAction::DataExchange => self.exchange(&request, &token, &audit, now).await,
            FlowAction::Complete => {
                self.sessions.merge(&token.raw, &incoming_data(&request), now);
                let graph = self.resolve_best_effort(&token, &audit).await;
                Ok(self.complete(&token, graph.as_ref(), &audit, now).await)
            }
        }
    }

    async fn initialize(
        &self,
        request: &DecryptedRequest,
        token: &FlowToken,
        audit: &AuditContext,
        now: DateTime<Utc>,
    ) -> Result<FlowResponse, FlowError> {
        self.sessions.start(&token.raw, now);
        let graph = self.resolver.resolve(&token.tenant_id, &token.flow_id).await?;
        self.audit.emit(
            audit
                .event("flow.initialized", AuditCategory::Flow, AuditOutcome::Success)
                .with_metadata("screen", graph.initial_screen()),
        );
        Ok(FlowResponse::screen(request.version(), graph.initial_screen(), Map::new()))
    }

    async fn go_back(
        &self,
        request: &DecryptedRequest,
        token: &FlowToken,
        now: DateTime<Utc>,
    ) -> Result<FlowResponse, FlowError> {
        let graph = self.resolver.resolve(&token.tenant_id, &token.flow_id).await?;
        let screen = request.screen.clone().unwrap_or_else(|| graph.initial_screen().to_owned());
        let session = self.sessions.get(&token.raw).map(|session| session.data).unwrap_or_default();
        let data = self.render_screen(&graph, &screen, token, &session, now).await?;
        Ok(FlowResponse::screen(request.version(), screen, data))
    }

    async fn exchange(
        &self,
        request: &DecryptedRequest,
        token: &FlowToken,
        audit: &AuditContext,
        now: DateTime<Utc>,
    ) -> Result<FlowResponse, FlowError> {
        let incoming = incoming_data(request);
        let session = self.sessions.merge(&token.raw, &incoming, now);

        if request.flow_completed() {
            let graph = self.resolve_best_effort(token, audit).await;
            return Ok(self.complete(token, graph.as_ref(), audit, now).await);
        }

        let graph = self.resolver.resolve(&token.tenant_id, &token.flow_id).await?;
        let current = request.screen.clone().unwrap_or_else(|| graph.initial_screen().to_owned());
        let transition = self.engine.resolve_with_audit(
            &graph,
            &current,
            &incoming,
            self.audit.as_ref(),
            audit,
        )?;

        let Some(next) = transition.target().map(str::to_owned) else {
            return Ok(self.complete(token, Some(&graph), audit, now).await);
        };
        if matches!(transition, Transition::Stay { .. }) {
            info!(
                event_name = "flow.screen.reloaded",
                correlation_id = %audit.correlation_id,
                tenant_id = %token.tenant_id,
                flow_id = %token.flow_id,
                screen = %next,
                "reload node kept the current screen"
            );
        }
        let data = self.render_screen(&graph, &next, token, &session.data, now).await?;
        Ok(FlowResponse::screen(request.version(), next, data))
    }

    /// Screen payload: data-source trigger output plus the summary on confirmation nodes.
    async fn render_screen(
        &self,
        graph: &FlowGraph,
        screen: &str,
        token: &FlowToken,
        session: &Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Result<Map<String, Value>, FlowError> {
        let mut data = Map::new();
        let Some(config) = graph.config_for(screen) else {
            return Ok(data);
        };

        if let Some(trigger) = &config.data_source_trigger {
            match DataSourceTrigger::from_name(trigger) {
                DataSourceTrigger::AvailableSlots => {
                    let availability = AvailabilityConfig::from_value(&config.config)
                        .map_err(|error| DefinitionError::Malformed(error.to_string()))?;
                    let slots =
                        self.scheduler.available_slots(&token.tenant_id, &availability, now).await?;
                    let output_key = config
                        .config
                        .get("outputKey")
                        .and_then(Value::as_str)
                        .unwrap_or(DEFAULT_SLOTS_OUTPUT_KEY);
                    let options = slots
                        .into_iter()
                        .map(|slot| json!({"id": slot.id, "title": slot.label}))
                        .collect();
                    data.insert(output_key.to_owned(), Value::Array(options));
                }
                DataSourceTrigger::Unknown(name) => {
                    warn!(
                        event_name = "flow.trigger.unknown",
                        tenant_id = %token.tenant_id,
                        flow_id = %token.flow_id,
                        screen,
                        trigger = %name,
                        "ignoring unknown data source trigger"
                    );
                }
            }
        }

        if config.kind == ScreenKind::ConfirmationNode {
            data.insert("summary".to_owned(), Value::String(build_summary(session, graph).join("\n")));
        }
        Ok(data)
    }

    async fn resolve_best_effort(&self, token: &FlowToken, audit: &AuditContext) -> Option<FlowGraph> {
        match self.resolver.resolve(&token.tenant_id, &token.flow_id).await {
            Ok(graph) => Some(graph),
            Err(error) => {
                warn!(
                    event_name = "flow.completion.definition_unavailable",
                    correlation_id = %audit.correlation_id,
                    tenant_id = %token.tenant_id,
                    flow_id = %token.flow_id,
                    error = %error,
                    "completing flow without its definition"
                );
                None
            }
        }
    }

    /// Side-effect failures are logged and never block cleanup or the acknowledgment.
    async fn complete(
        &self,
        token: &FlowToken,
        graph: Option<&FlowGraph>,
        audit: &AuditContext,
        now: DateTime<Utc>,
    ) -> FlowResponse {
        let session = self.sessions.get(&token.raw).map(|session| session.data).unwrap_or_default();

        let mut booked_slot = None;
        if let Some((screen, config)) = graph.and_then(FlowGraph::appointment_screen) {
            booked_slot = self.book_appointment(token, screen, config, &session, audit).await;
        }

        let summary = graph
            .map(|graph| build_summary(&session, graph))
            .unwrap_or_else(|| vec![EMPTY_SUMMARY.to_owned()])
            .join("\n");

        if let Err(error) =
            self.conversations.save_summary(&token.tenant_id, &token.subject_id, &summary).await
        {
            warn!(
                event_name = "flow.completion.summary_failed",
                correlation_id = %audit.correlation_id,
                tenant_id = %token.tenant_id,
                flow_id = %token.flow_id,
                error = %error,
                "conversation summary was not persisted"
            );
        }

        let event = json!({
            "type": "flow_completed",
            "flow_id": token.flow_id.0,
            "summary": summary,
            "slot_id": booked_slot,
            "completed_at": now.to_rfc3339(),
        });
        if let Err(error) = self.notifier.notify(&token.tenant_id, &token.subject_id, event).await {
            warn!(
                event_name = "flow.completion.notify_failed",
                correlation_id = %audit.correlation_id,
                tenant_id = %token.tenant_id,
                flow_id = %token.flow_id,
                error = %error,
                "realtime notification failed"
            );
        }

        self.sessions.delete(&token.raw);
        self.audit.emit(
            audit
                .event("flow.completed", AuditCategory::Flow, AuditOutcome::Success)
                .with_metadata("booked", booked_slot.is_some().to_string()),
        );
        info!(
            event_name = "flow.completed",
            correlation_id = %audit.correlation_id,
            tenant_id = %token.tenant_id,
            flow_id = %token.flow_id,
            "flow completed"
        );
        FlowResponse::success(&token.raw)
    }

    /// Returns the booked slot id when a booking was persisted.
    async fn book_appointment(
        &self,
        token: &FlowToken,
        screen: &str,
        config: &ScreenConfig,
        session: &Map<String, Value>,
        audit: &AuditContext,
    ) -> Option<String> {
        let settings = match serde_json::from_value::<AppointmentSettings>(config.config.clone()) {
            Ok(settings) => settings,
            Err(error) => {
                warn!(
                    event_name = "flow.booking.invalid_config",
                    correlation_id = %audit.correlation_id,
                    tenant_id = %token.tenant_id,
                    screen,
                    error = %error,
                    "appointment node config is invalid"
                );
                return None;
            }
        };

        let slot_id = session.get(&settings.slot_field).and_then(Value::as_str)?.trim().to_owned();
        let tool = settings
            .scheduling_tool
            .clone()
            .or_else(|| session.get("scheduling_tool").and_then(Value::as_str).map(str::to_owned))
            .filter(|tool| !tool.trim().is_empty())?;
        let Some(slot_at) = parse_slot_id(&slot_id) else {
            warn!(
                event_name = "flow.booking.invalid_slot",
                correlation_id = %audit.correlation_id,
                tenant_id = %token.tenant_id,
                slot_id = %slot_id,
                "selected slot id is not a date-time"
            );
            return None;
        };
        let attendee_email = session
            .get(&settings.email_field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .map(str::to_owned);

        let external_event_id = match self
            .calendar
            .create_event(CalendarEventRequest {
                tenant_id: token.tenant_id.clone(),
                date: slot_at.date(),
                time: slot_at.time(),
                title: settings.title.clone(),
                duration_minutes: settings.duration_minutes,
                attendee_emails: attendee_email.iter().cloned().collect(),
                scheduling_tool: tool,
            })
            .await
        {
            Ok(event) => Some(event.external_event_id),
            Err(error) => {
                warn!(
                    event_name = "flow.booking.calendar_failed",
                    correlation_id = %audit.correlation_id,
                    tenant_id = %token.tenant_id,
                    slot_id = %slot_id,
                    error = %error,
                    "calendar event creation failed"
                );
                self.audit.emit(
                    audit
                        .event("flow.calendar_failed", AuditCategory::Integration, AuditOutcome::Failed)
                        .with_metadata("slot_id", slot_id.clone())
                        .with_metadata("error", error.to_string()),
                );
                None
            }
        };

        let booking = NewBooking {
            tenant_id: token.tenant_id.clone(),
            slot_id: slot_id.clone(),
            subject_id: token.subject_id.clone(),
            title: settings.title,
            duration_minutes: settings.duration_minutes,
            attendee_email,
            external_event_id,
        };
        match self.bookings.save_booking(booking).await {
            Ok(record) => {
                self.audit.emit(
                    audit
                        .event("flow.booking_created", AuditCategory::Scheduling, AuditOutcome::Success)
                        .with_metadata("booking_id", record.id.0)
                        .with_metadata("slot_id", slot_id.clone()),
                );
                Some(slot_id)
            }
            Err(error) => {
                warn!(
                    event_name = "flow.booking.persist_failed",
                    correlation_id = %audit.correlation_id,
                    tenant_id = %token.tenant_id,
                    slot_id = %slot_id,
                    error = %error,
                    "booking was not persisted"
                );
                self.audit.emit(
                    audit
                        .event("flow.booking_failed", AuditCategory::Persistence, AuditOutcome::Failed)
                        .with_metadata("slot_id", slot_id)
                        .with_metadata("error", error.to_string()),
                );
                None
            }
        }
    }
}

fn incoming_data(request: &DecryptedRequest) -> Map<String, Value> {
    let mut data = request.data();
    data.remove("flow_completed");
    data
}
