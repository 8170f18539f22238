use crate::config::AppConfig;
use crate::core::directory::DirectoryIndex;
use crate::core::retry::{Attempt, RetryError, RetryPolicy};
use crate::domain::model::{
    CustomerRecord, Installment, LedgerSystem, Period, PeriodBuckets, ReminderEntry,
};
use crate::utils::error::Result;
use chrono::{Duration as ChronoDuration, NaiveDate};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

pub const BATCH_SIZE: usize = 100;
pub const PENDING_STATUSES: [i64; 3] = [1, 3, 5];

const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

/// Buckets one installment by exact due-date equality against `today`.
/// Non-pending statuses, malformed dates and dates outside the three-day
/// window are discarded (`None`), never surfaced as errors.
pub fn classify(due_date: &str, status: i64, today: NaiveDate) -> Option<Period> {
    if !PENDING_STATUSES.contains(&status) {
        return None;
    }
    let due = NaiveDate::parse_from_str(due_date, "%Y-%m-%d").ok()?;
    if due == today - ChronoDuration::days(1) {
        Some(Period::DueYesterday)
    } else if due == today {
        Some(Period::DueToday)
    } else if due == today + ChronoDuration::days(1) {
        Some(Period::DueTomorrow)
    } else {
        None
    }
}

#[derive(Debug, Deserialize)]
struct LedgerResponse {
    #[serde(default)]
    data: Vec<AccountRecord>,
}

#[derive(Debug, Deserialize)]
struct AccountRecord {
    #[serde(default)]
    id_cliente: serde_json::Value,
    #[serde(default)]
    parcelas: Vec<RawInstallment>,
}

#[derive(Debug, Deserialize)]
struct RawInstallment {
    #[serde(default)]
    valor: serde_json::Value,
    #[serde(default)]
    data_vencimento: String,
    #[serde(default)]
    status: i64,
    #[serde(default)]
    pdf_url: String,
}

fn value_as_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

fn value_as_amount(value: &serde_json::Value) -> f64 {
    match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => s.parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

pub struct LedgerClient<'a> {
    client: Client,
    config: &'a AppConfig,
    retry: RetryPolicy,
}

impl<'a> LedgerClient<'a> {
    pub fn new(client: Client, config: &'a AppConfig) -> Self {
        Self {
            client,
            config,
            retry: RetryPolicy::standard(),
        }
    }

    /// Fetches all pending installments for one ledger system and returns
    /// them classified into period buckets. "Today" is captured once at the
    /// start of this invocation.
    pub async fn fetch_due_installments(
        &self,
        index: &DirectoryIndex,
        system: LedgerSystem,
    ) -> Result<PeriodBuckets> {
        tracing::info!("🔍 Fetching installments from {}...", system);
        let today = chrono::Local::now().date_naive();
        let endpoint = self.config.ledger(system);
        let ids = index.external_ids(system);
        tracing::info!("  → {} customers to check in {}", ids.len(), system);

        let mut buckets = PeriodBuckets::default();
        let batch_total = ids.len().div_ceil(BATCH_SIZE);

        for (batch_number, batch) in ids.chunks(BATCH_SIZE).enumerate() {
            tracing::debug!(
                "Processing batch {}/{} for {}",
                batch_number + 1,
                batch_total,
                system
            );

            let accounts = match self.fetch_batch(&endpoint.base_url, &endpoint.api_key, batch).await {
                Some(accounts) => accounts,
                None => {
                    tracing::warn!(
                        "Batch {}/{} skipped for {} due to upstream failure",
                        batch_number + 1,
                        batch_total,
                        system
                    );
                    continue;
                }
            };

            for account in accounts {
                let external_id = value_as_string(&account.id_cliente);
                let Some(customer) = index.resolve(system, &external_id) else {
                    continue;
                };
                for raw in account.parcelas {
                    let Some(period) = classify(&raw.data_vencimento, raw.status, today) else {
                        continue;
                    };
                    buckets.push(
                        period,
                        ReminderEntry {
                            installment: Installment {
                                amount: value_as_amount(&raw.valor),
                                due_date: raw.data_vencimento.clone(),
                                status: raw.status,
                                payment_link: raw.pdf_url.clone(),
                            },
                            customer: customer.clone(),
                            external_id: external_id.clone(),
                            system,
                        },
                    );
                }
            }

            // Flat pacing between batches; the upstream has no adaptive
            // rate-limit signalling worth honoring here.
            if batch_number + 1 < batch_total {
                tokio::time::sleep(self.config.batch_pause).await;
            }
        }

        for period in Period::ALL {
            tracing::info!("  → {} installments in '{}'", buckets.get(period).len(), period);
        }
        Ok(buckets)
    }

    /// One batched query, retried on network timeout/connect failures only.
    /// Non-success statuses and exhausted retries yield `None`; the caller
    /// skips the batch.
    async fn fetch_batch(
        &self,
        base_url: &str,
        api_key: &str,
        batch: &[(String, Arc<CustomerRecord>)],
    ) -> Option<Vec<AccountRecord>> {
        let query: Vec<(&str, &str)> = batch
            .iter()
            .map(|(id, _)| ("id_cliente", id.as_str()))
            .collect();

        let outcome = self
            .retry
            .run(|attempt| {
                let query = query.clone();
                async move {
                    let result = self
                        .client
                        .get(base_url)
                        .basic_auth(api_key, Some(""))
                        .query(&query)
                        .timeout(REQUEST_TIMEOUT)
                        .send()
                        .await;
                    match result {
                        Ok(response) => Attempt::Done(response),
                        Err(err) if err.is_timeout() || err.is_connect() => {
                            tracing::warn!(
                                "Ledger request failed on attempt {}: {}. Retrying...",
                                attempt,
                                err
                            );
                            Attempt::Retry { wait_hint: None }
                        }
                        Err(err) => Attempt::Fatal(err),
                    }
                }
            })
            .await;

        let response = match outcome {
            Ok(response) => response,
            Err(RetryError::Exhausted) => {
                tracing::error!("Exceeded maximum retry attempts calling the ledger API");
                return None;
            }
            Err(RetryError::Fatal(err)) => {
                tracing::error!("Unexpected error calling the ledger API: {}", err);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::error!("❌ Ledger batch fetch failed: {}", response.status());
            return None;
        }

        match response.json::<LedgerResponse>().await {
            Ok(parsed) => Some(parsed.data),
            Err(err) => {
                tracing::error!("❌ Ledger response body could not be parsed: {}", err);
                None
            }
        }
    }
}
