//! Provider webhook translation
//!
//! Turns SendGrid- and Mailgun-shaped callback payloads into status
//! updates and tracking events on the email log. Unknown message ids and
//! unrecognized event kinds are dropped quietly; a webhook replay must
//! never error.

use chrono::{DateTime, Utc};
use revupulse_common::types::{DeliveryStatus, EngagementEvent};
use revupulse_storage::models::EventData;
use revupulse_storage::EmailLogRepository;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Translates provider webhook payloads into log mutations
pub struct WebhookProcessor {
    log: Arc<EmailLogRepository>,
}

impl WebhookProcessor {
    pub fn new(log: Arc<EmailLogRepository>) -> Self {
        Self { log }
    }

    /// Process a SendGrid event webhook body
    ///
    /// SendGrid posts an array of `{event, sg_message_id, timestamp}`
    /// objects; a bare object is accepted too.
    pub async fn process_sendgrid(&self, payload: &Value) {
        let events: Vec<&Value> = match payload.as_array() {
            Some(events) => events.iter().collect(),
            None => vec![payload],
        };

        for event in events {
            let Some(kind) = event.get("event").and_then(Value::as_str) else {
                debug!("SendGrid event without an event field");
                continue;
            };
            let Some(message_id) = event.get("sg_message_id").and_then(Value::as_str) else {
                debug!("SendGrid {} event without a message id", kind);
                continue;
            };
            let timestamp = unix_timestamp(event.get("timestamp"));

            match kind {
                "delivered" => {
                    self.log
                        .update_status(message_id, DeliveryStatus::Delivered, timestamp)
                        .await;
                }
                "open" => {
                    self.track(message_id, EngagementEvent::Opened, event, timestamp)
                        .await;
                }
                "click" => {
                    self.track(message_id, EngagementEvent::Clicked, event, timestamp)
                        .await;
                }
                "bounce" | "blocked" | "dropped" => {
                    self.track(message_id, EngagementEvent::Bounced, event, timestamp)
                        .await;
                }
                other => debug!("Ignoring SendGrid event kind {}", other),
            }
        }
    }

    /// Process a Mailgun event webhook body
    ///
    /// Mailgun posts one `{event, message: {headers: {"message-id"}},
    /// timestamp}` object per callback.
    pub async fn process_mailgun(&self, payload: &Value) {
        let Some(kind) = payload.get("event").and_then(Value::as_str) else {
            debug!("Mailgun event without an event field");
            return;
        };
        let Some(message_id) = payload
            .pointer("/message/headers/message-id")
            .and_then(Value::as_str)
        else {
            debug!("Mailgun {} event without a message id", kind);
            return;
        };
        let timestamp = unix_timestamp(payload.get("timestamp"));

        match kind {
            "delivered" => {
                self.log
                    .update_status(message_id, DeliveryStatus::Delivered, timestamp)
                    .await;
            }
            "opened" => {
                self.track(message_id, EngagementEvent::Opened, payload, timestamp)
                    .await;
            }
            "clicked" => {
                self.track(message_id, EngagementEvent::Clicked, payload, timestamp)
                    .await;
            }
            "bounced" | "failed" => {
                self.track(message_id, EngagementEvent::Bounced, payload, timestamp)
                    .await;
            }
            other => debug!("Ignoring Mailgun event kind {}", other),
        }
    }

    async fn track(
        &self,
        message_id: &str,
        event: EngagementEvent,
        raw: &Value,
        timestamp: DateTime<Utc>,
    ) {
        let data = EventData {
            url: raw.get("url").and_then(Value::as_str).map(str::to_string),
            device_type: None,
            location: None,
            user_agent: raw
                .get("useragent")
                .and_then(Value::as_str)
                .map(str::to_string),
        };
        self.log.track_event(message_id, event, data, timestamp).await;
    }
}

/// Webhook timestamps are unix seconds; anything unparseable means now
fn unix_timestamp(value: Option<&Value>) -> DateTime<Utc> {
    value
        .and_then(Value::as_i64)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now)
}
