//! Run notifications.
//!
//! The pipeline only sees the `Notifier` trait, so the delivery channel can
//! change without touching report logic.

use serde::Serialize;
use std::io::Write;
use std::time::Duration;
use tracing::info;

use crate::error::NotifyError;

pub trait Notifier {
    fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// Prints notifications to stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        writeln!(out)?;
        writeln!(out, "NOTIFICATION: {subject}")?;
        writeln!(out, "{body}")?;
        out.flush()?;
        Ok(())
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
}

/// Posts `{"text": ...}` to a chat webhook (Slack/Mattermost/Teams style)
pub struct WebhookNotifier {
    agent: ureq::Agent,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        WebhookNotifier {
            agent: ureq::Agent::new_with_config(config),
            url: url.to_string(),
        }
    }
}

pub fn webhook_text(subject: &str, body: &str) -> String {
    format!("*{subject}*\n\n{}", body.trim())
}

impl Notifier for WebhookNotifier {
    fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        let text = webhook_text(subject, body);
        self.agent
            .post(&self.url)
            .send_json(&WebhookPayload { text: &text })
            .map_err(|e| NotifyError::Webhook {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;
        info!(url = %self.url, "webhook notification delivered");
        Ok(())
    }
}

/// Console always; the webhook too when one is configured
pub fn notifier_for(webhook_url: Option<&str>, timeout: Duration) -> Box<dyn Notifier> {
    match webhook_url.map(str::trim).filter(|u| !u.is_empty()) {
        Some(url) => Box::new(FanoutNotifier::new(vec![
            Box::new(ConsoleNotifier),
            Box::new(WebhookNotifier::new(url, timeout)),
        ])),
        None => Box::new(ConsoleNotifier),
    }
}

/// Delivers to every configured channel; succeeds if at least one does
pub struct FanoutNotifier {
    channels: Vec<Box<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new(channels: Vec<Box<dyn Notifier>>) -> Self {
        FanoutNotifier { channels }
    }
}

impl Notifier for FanoutNotifier {
    fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        let mut last_err = None;
        let mut delivered = false;
        for channel in &self.channels {
            match channel.send(subject, body) {
                Ok(()) => delivered = true,
                Err(e) => {
                    tracing::warn!(error = %e, "notification channel failed");
                    last_err = Some(e);
                }
            }
        }
        match last_err {
            Some(e) if !delivered => Err(e),
            _ => Ok(()),
        }
    }
}
