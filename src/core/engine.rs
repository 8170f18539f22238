use crate::config::AppConfig;
use crate::core::audit::SupabaseAuditSink;
use crate::core::compose::{compose, ReminderData};
use crate::core::directory::DirectoryClient;
use crate::core::dispatch::SendGridMailer;
use crate::core::ledger::LedgerClient;
use crate::core::processor::PeriodProcessor;
use crate::domain::model::{
    DispatchOutcome, DispatchStatus, LedgerSystem, Period, PeriodBuckets, ReminderEntry,
    RunReport,
};
use crate::domain::ports::{AuditSink, Mailer};
use crate::utils::error::{MailerError, Result};
use crate::utils::format::format_date_br;
use rand::seq::SliceRandom;
use reqwest::Client;
use std::time::Instant;

/// Drives one full run: directory index → ledger fetches → per-period
/// processing → final report → completion signal.
pub struct ReminderEngine {
    config: AppConfig,
    client: Client,
}

impl ReminderEngine {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// True when the current local hour falls inside the configured window.
    pub fn within_allowed_hours(&self) -> bool {
        use chrono::Timelike;
        let hour = chrono::Local::now().hour();
        self.config.allowed_hours.contains(hour)
    }

    pub async fn run(&self) -> Result<RunReport> {
        let started = Instant::now();
        tracing::info!("{}", "=".repeat(60));
        tracing::info!("📧 INSTALLMENT REMINDER RUN");
        tracing::info!(
            "🔧 Mode: {}",
            if self.config.test_mode { "TEST" } else { "PRODUCTION" }
        );
        tracing::info!(
            "📊 Systems: {}",
            self.config
                .enabled_systems()
                .iter()
                .map(|s| s.tag())
                .collect::<Vec<_>>()
                .join(", ")
        );
        tracing::info!("{}", "=".repeat(60));

        let directory = DirectoryClient::new(self.client.clone(), &self.config.directory);
        let index = directory.build_index().await?;
        if index.is_empty() {
            tracing::error!("❌ No customers found in the directory service");
            return Err(MailerError::EmptyDirectory);
        }

        let ledger = LedgerClient::new(self.client.clone(), &self.config);
        let mut all_buckets = PeriodBuckets::default();
        for system in self.config.enabled_systems() {
            let buckets = ledger.fetch_due_installments(&index, system).await?;
            all_buckets.merge(buckets);
        }

        let mailer = SendGridMailer::new(
            self.client.clone(),
            self.config.mail.clone(),
            self.config.test_mode,
        );
        let sink = SupabaseAuditSink::new(self.client.clone(), self.config.audit.clone());
        let processor = PeriodProcessor::new(
            &self.config.mail,
            &mailer,
            &sink,
            self.config.send_pause,
        );

        let mut report = RunReport::default();
        for period in Period::ALL {
            let entries = all_buckets.take(period);
            let limit = self.config.limits.for_period(period);
            let stats = processor.process(period, entries, limit).await;
            report.set_stats(period, stats);
        }
        report.elapsed_seconds = started.elapsed().as_secs_f64();

        self.log_report(&report);

        if self.config.test_mode {
            tracing::info!("⚠️ Executed in TEST mode - no emails were actually sent");
        } else {
            self.send_completion_notification().await;
        }

        Ok(report)
    }

    /// One synthetic reminder to a chosen recipient, bypassing the directory
    /// and ledger systems. Used to verify templates and credentials.
    pub async fn send_single_test(&self, recipient: &str, period: Period) -> Result<()> {
        let today = chrono::Local::now().date_naive().format("%Y-%m-%d").to_string();
        let data = ReminderData {
            customer_name: "Teste".to_string(),
            amount: 123.45,
            due_date_iso: today.clone(),
            payment_link: "https://exemplo.com/pagar".to_string(),
        };

        let composed = compose(&self.config.mail, recipient, "Teste", &data, period);
        let mailer = SendGridMailer::new(
            self.client.clone(),
            self.config.mail.clone(),
            self.config.test_mode,
        );
        let result = mailer.send(&composed.payload).await;

        let sink = SupabaseAuditSink::new(self.client.clone(), self.config.audit.clone());
        let outcome = DispatchOutcome {
            sistema: LedgerSystem::Credilly,
            periodo: period,
            cliente_diretorio_id: None,
            cliente_sistema_id: None,
            nome: "Teste".to_string(),
            email: Some(recipient.to_string()),
            valor_parcela: data.amount,
            data_vencimento: Some(today),
            link_pagamento: Some(data.payment_link.clone()),
            status: if result.success {
                DispatchStatus::Sent
            } else {
                DispatchStatus::Error
            },
            provider_status: result.status_code,
            provider_message_id: result.message_id.clone(),
            error_message: result.error_message.clone(),
            bcc_aplicado: composed.bcc_applied,
            bcc_email: composed
                .bcc_applied
                .then(|| self.config.mail.bcc_archive_email.clone())
                .flatten(),
            bcc_sample_percent: (self.config.mail.bcc_sample_percent > 0.0)
                .then_some(self.config.mail.bcc_sample_percent),
            request_summary: Some(composed.request_summary),
        };
        if let Err(err) = sink.record(&outcome).await {
            tracing::warn!("[AUDIT] Failed to record test dispatch: {}", err);
        }

        if result.success {
            tracing::info!("[SINGLE-TEST] Sent to {} (period={})", recipient, period);
            Ok(())
        } else {
            let message = result
                .error_message
                .unwrap_or_else(|| "unknown error".to_string());
            tracing::error!("[SINGLE-TEST] Failed to send to {}: {}", recipient, message);
            Err(MailerError::DispatchError { message })
        }
    }

    /// One reminder built from live directory and ledger data, delivered to
    /// an override address. Picks a random eligible installment from the
    /// preferred period, or from today/yesterday/tomorrow in that order when
    /// no preference is given. Only the Credilly system is consulted.
    pub async fn send_real_data_test(
        &self,
        recipient: &str,
        preferred_period: Option<Period>,
    ) -> Result<()> {
        let directory = DirectoryClient::new(self.client.clone(), &self.config.directory);
        let index = directory.build_index().await?;
        if index.is_empty() {
            tracing::error!("[REAL-DATA-TEST] No customers found in the directory service");
            return Err(MailerError::EmptyDirectory);
        }

        let ledger = LedgerClient::new(self.client.clone(), &self.config);
        let mut buckets = ledger
            .fetch_due_installments(&index, LedgerSystem::Credilly)
            .await?;

        let order: Vec<Period> = match preferred_period {
            Some(period) => vec![period],
            None => vec![Period::DueToday, Period::DueYesterday, Period::DueTomorrow],
        };
        let mut chosen: Option<(Period, ReminderEntry)> = None;
        for period in order {
            let entries = buckets.take(period);
            if let Some(entry) = entries.choose(&mut rand::thread_rng()) {
                chosen = Some((period, entry.clone()));
                break;
            }
        }
        let Some((period, entry)) = chosen else {
            let message = "no eligible installments in the three-day window".to_string();
            tracing::error!("[REAL-DATA-TEST] {}", message);
            return Err(MailerError::DispatchError { message });
        };

        let customer = &entry.customer;
        let data = ReminderData {
            customer_name: customer.display_name().to_string(),
            amount: entry.installment.amount,
            due_date_iso: entry.installment.due_date.clone(),
            payment_link: entry.installment.payment_link.clone(),
        };
        let composed = compose(
            &self.config.mail,
            recipient,
            customer.display_name(),
            &data,
            period,
        );
        let mailer = SendGridMailer::new(
            self.client.clone(),
            self.config.mail.clone(),
            self.config.test_mode,
        );
        let result = mailer.send(&composed.payload).await;

        let sink = SupabaseAuditSink::new(self.client.clone(), self.config.audit.clone());
        let outcome = DispatchOutcome {
            sistema: entry.system,
            periodo: period,
            cliente_diretorio_id: Some(customer.record_id.clone()),
            cliente_sistema_id: Some(entry.external_id.clone()),
            nome: customer.display_name().to_string(),
            email: Some(recipient.to_string()),
            valor_parcela: entry.installment.amount,
            data_vencimento: Some(entry.installment.due_date.clone()),
            link_pagamento: Some(entry.installment.payment_link.clone()),
            status: if result.success {
                DispatchStatus::Sent
            } else {
                DispatchStatus::Error
            },
            provider_status: result.status_code,
            provider_message_id: result.message_id.clone(),
            error_message: result.error_message.clone(),
            bcc_aplicado: composed.bcc_applied,
            bcc_email: composed
                .bcc_applied
                .then(|| self.config.mail.bcc_archive_email.clone())
                .flatten(),
            bcc_sample_percent: (self.config.mail.bcc_sample_percent > 0.0)
                .then_some(self.config.mail.bcc_sample_percent),
            request_summary: Some(composed.request_summary),
        };
        if let Err(err) = sink.record(&outcome).await {
            tracing::warn!("[AUDIT] Failed to record real-data test dispatch: {}", err);
        }

        if result.success {
            tracing::info!("[REAL-DATA-TEST] Sent to {} (period={})", recipient, period);
            Ok(())
        } else {
            let message = result
                .error_message
                .unwrap_or_else(|| "unknown error".to_string());
            tracing::error!("[REAL-DATA-TEST] Failed to send to {}: {}", recipient, message);
            Err(MailerError::DispatchError { message })
        }
    }

    fn log_report(&self, report: &RunReport) {
        tracing::info!("{}", "=".repeat(60));
        tracing::info!("📊 FINAL REPORT");
        tracing::info!("⏱️ Elapsed: {:.2}s", report.elapsed_seconds);
        for period in Period::ALL {
            let stats = report.stats(period);
            if stats.total == 0 {
                continue;
            }
            tracing::info!("📅 {} ({})", period, format_date_br(&period_date(period)));
            tracing::info!("   Total: {}", stats.total);
            tracing::info!("   ✅ Sent: {}", stats.sent);
            tracing::info!("   📵 No email: {}", stats.no_email);
            tracing::info!("   ❌ Errors: {}", stats.errors);
        }
        tracing::info!(
            "📊 TOTALS: {} installments processed, {} emails sent",
            report.total_processed(),
            report.total_sent()
        );
        tracing::info!("{}", "=".repeat(60));
    }

    /// Fire-and-forget completion signal; failures are logged and ignored.
    async fn send_completion_notification(&self) {
        let Some(url) = &self.config.notification_url else {
            tracing::warn!("⚠️ No completion notification URL configured; signal disabled");
            return;
        };
        match self.client.get(url).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::info!("✅ Completion notification sent");
            }
            Ok(response) => {
                tracing::error!(
                    "❌ Completion notification failed: {}",
                    response.status()
                );
            }
            Err(err) => {
                tracing::error!("❌ Completion notification failed: {}", err);
            }
        }
    }
}

fn period_date(period: Period) -> String {
    let today = chrono::Local::now().date_naive();
    let date = match period {
        Period::DueYesterday => today - chrono::Duration::days(1),
        Period::DueToday => today,
        Period::DueTomorrow => today + chrono::Duration::days(1),
    };
    date.format("%Y-%m-%d").to_string()
}
