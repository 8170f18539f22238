use crate::config::AuditConfig;
use crate::domain::model::DispatchOutcome;
use crate::domain::ports::AuditSink;
use crate::utils::error::{MailerError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

const INSERT_PATH: &str = "/rest/v1/email_disparo_logs";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Append-only audit store client (Supabase REST insert). Failures are
/// reported back but the pipeline never acts on them beyond a warning; an
/// unconfigured sink is a silent no-op.
pub struct SupabaseAuditSink {
    client: Client,
    config: Option<AuditConfig>,
}

impl SupabaseAuditSink {
    pub fn new(client: Client, config: Option<AuditConfig>) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl AuditSink for SupabaseAuditSink {
    async fn record(&self, outcome: &DispatchOutcome) -> Result<()> {
        let Some(config) = &self.config else {
            tracing::debug!("[AUDIT] Sink not configured; skipping outcome record.");
            return Ok(());
        };

        let url = format!("{}{}", config.base_url.trim_end_matches('/'), INSERT_PATH);
        let response = self
            .client
            .post(&url)
            .header("apikey", &config.api_key)
            .bearer_auth(&config.api_key)
            .header("Prefer", "return=minimal")
            .json(outcome)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(300).collect();
            return Err(MailerError::AuditSinkError {
                message: format!("{} {}", status, snippet),
            });
        }
        Ok(())
    }
}
