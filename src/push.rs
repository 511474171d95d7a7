use crate::config::PushConfig;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info, warn};

/// Status message shown to the user while the research runs
pub const SEARCHING_MESSAGE: &str = "Searching for material for the report.";

/// Body posted to the push server
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub agent: String,
    pub session_id: String,
    pub user_id: String,
    pub timestamp: String,
}

impl PushMessage {
    pub fn agent_status(agent: &str, message: &str, session_id: &str, user_id: &str) -> Self {
        Self {
            kind: "agent_status".to_string(),
            message: message.to_string(),
            agent: agent.to_string(),
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            timestamp: chrono::Local::now().naive_local().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
        }
    }
}

/// Best-effort status pushes to the websocket relay
///
/// Failures are logged and never reach the caller.
#[derive(Clone)]
pub struct PushNotifier {
    client: Client,
    config: PushConfig,
    agent: String,
}

impl PushNotifier {
    pub fn new(client: Client, config: PushConfig, agent: impl Into<String>) -> Self {
        Self {
            client,
            config,
            agent: agent.into(),
        }
    }

    /// Returns whether the push server accepted the message
    pub async fn notify(&self, session_id: &str, user_id: &str, message: &str) -> bool {
        if !self.config.enabled {
            return false;
        }

        let body = PushMessage::agent_status(&self.agent, message, session_id, user_id);
        let result = self
            .client
            .post(&self.config.url)
            .timeout(Duration::from_secs(self.config.timeout_seconds))
            .json(&body)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                info!(session_id = %session_id, "Status push delivered");
                true
            }
            Ok(response) => {
                warn!(status = response.status().as_u16(), "Status push rejected");
                false
            }
            Err(e) => {
                error!(error = %e, "Status push failed");
                false
            }
        }
    }
}
