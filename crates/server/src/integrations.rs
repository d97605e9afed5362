//! Outbound HTTP collaborators: the calendar gateway and the realtime
//! notifier webhook. Both degrade to log-only implementations when not
//! configured.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use flowgate_core::config::{CalendarConfig, NotifierConfig};
use flowgate_core::domain::ids::{SubjectId, TenantId};
use flowgate_core::errors::RepositoryError;
use flowgate_core::ports::{
    CalendarEvent, CalendarEventRequest, CalendarIntegration, RealtimeNotifier,
};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

const USER_AGENT: &str = concat!("flowgate/", env!("CARGO_PKG_VERSION"));
const NOTIFIER_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("could not build http client for {target}: {source}")]
    Client { target: &'static str, source: reqwest::Error },
    #[error("calendar integration is enabled but `{0}` is not configured")]
    MissingSetting(&'static str),
}

pub fn calendar_from_config(
    config: &CalendarConfig,
) -> Result<Arc<dyn CalendarIntegration>, IntegrationError> {
    if !config.enabled {
        return Ok(Arc::new(DisabledCalendar));
    }
    let base_url = config.base_url.clone().ok_or(IntegrationError::MissingSetting("calendar.base_url"))?;
    let api_key = config.api_key.clone().ok_or(IntegrationError::MissingSetting("calendar.api_key"))?;
    let client = http_client("calendar", Duration::from_secs(config.timeout_secs))?;

    Ok(Arc::new(HttpCalendarClient::new(client, base_url, api_key)))
}

pub fn notifier_from_config(
    config: &NotifierConfig,
) -> Result<Arc<dyn RealtimeNotifier>, IntegrationError> {
    match &config.webhook_url {
        Some(url) => {
            let client = http_client("notifier", Duration::from_secs(NOTIFIER_TIMEOUT_SECS))?;
            Ok(Arc::new(WebhookNotifier::new(client, url.clone())))
        }
        None => Ok(Arc::new(LoggingNotifier)),
    }
}

fn http_client(target: &'static str, timeout: Duration) -> Result<Client, IntegrationError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|source| IntegrationError::Client { target, source })
}

#[derive(Debug, Serialize)]
struct CreateEventBody<'a> {
    tenant_id: &'a str,
    date: String,
    time: String,
    title: &'a str,
    duration_minutes: u32,
    attendees: &'a [String],
    scheduling_tool: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreatedEvent {
    #[serde(alias = "id")]
    external_event_id: String,
}

/// Calendar gateway reached at `POST {base_url}/events`.
pub struct HttpCalendarClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

impl HttpCalendarClient {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: SecretString) -> Self {
        Self { client, base_url: base_url.into(), api_key }
    }

    fn events_url(&self) -> String {
        format!("{}/events", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CalendarIntegration for HttpCalendarClient {
    async fn create_event(
        &self,
        request: CalendarEventRequest,
    ) -> Result<CalendarEvent, RepositoryError> {
        let body = CreateEventBody {
            tenant_id: &request.tenant_id.0,
            date: request.date.format("%Y-%m-%d").to_string(),
            time: request.time.format("%H:%M").to_string(),
            title: &request.title,
            duration_minutes: request.duration_minutes,
            attendees: &request.attendee_emails,
            scheduling_tool: &request.scheduling_tool,
        };

        let response = self
            .client
            .post(self.events_url())
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|error| RepositoryError::Integration(format!("calendar request failed: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RepositoryError::Integration(format!(
                "calendar gateway answered {}",
                status.as_u16()
            )));
        }

        let created: CreatedEvent = response.json().await.map_err(|error| {
            RepositoryError::Integration(format!("calendar response is not valid: {error}"))
        })?;
        Ok(CalendarEvent { external_event_id: created.external_event_id })
    }
}

/// Used when `calendar.enabled = false`.
pub struct DisabledCalendar;

#[async_trait]
impl CalendarIntegration for DisabledCalendar {
    async fn create_event(
        &self,
        request: CalendarEventRequest,
    ) -> Result<CalendarEvent, RepositoryError> {
        info!(
            event_name = "integration.calendar.skipped",
            correlation_id = "calendar",
            tenant_id = %request.tenant_id,
            "calendar integration disabled; event not created"
        );
        Err(RepositoryError::Integration("calendar integration is disabled".to_string()))
    }
}

pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self { client, url: url.into() }
    }
}

#[derive(Debug, Serialize)]
struct NotificationBody {
    tenant_id: String,
    subject_id: String,
    event: Value,
}

/// Delivery runs on a detached task; `notify` returns once the POST is queued.
#[async_trait]
impl RealtimeNotifier for WebhookNotifier {
    async fn notify(
        &self,
        tenant_id: &TenantId,
        subject_id: &SubjectId,
        event: Value,
    ) -> Result<(), RepositoryError> {
        let body =
            NotificationBody { tenant_id: tenant_id.0.clone(), subject_id: subject_id.0.clone(), event };
        let request = self.client.post(&self.url).json(&body);

        tokio::spawn(async move {
            let delivered = match request.send().await {
                Ok(response) => response.error_for_status().map(|_| ()),
                Err(error) => Err(error),
            };
            if let Err(error) = delivered {
                warn!(
                    event_name = "integration.notifier.delivery_failed",
                    correlation_id = "notifier",
                    tenant_id = %body.tenant_id,
                    subject_id = %body.subject_id,
                    error = %error,
                    "realtime notification was not delivered"
                );
            }
        });
        Ok(())
    }
}

pub struct LoggingNotifier;

#[async_trait]
impl RealtimeNotifier for LoggingNotifier {
    async fn notify(
        &self,
        tenant_id: &TenantId,
        subject_id: &SubjectId,
        event: Value,
    ) -> Result<(), RepositoryError> {
        let event_type = event.get("type").and_then(Value::as_str).unwrap_or("unknown");
        info!(
            event_name = "integration.notifier.logged",
            correlation_id = "notifier",
            tenant_id = %tenant_id,
            subject_id = %subject_id,
            notification_type = event_type,
            "realtime notification recorded"
        );
        Ok(())
    }
}
