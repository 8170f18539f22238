use crate::config::MailConfig;
use crate::core::compose::{compose, ReminderData};
use crate::domain::model::{
    DispatchOutcome, DispatchStatus, Period, PeriodStats, ReminderEntry,
};
use crate::domain::ports::{AuditSink, Mailer};
use std::time::Duration;

/// Drives compose → dispatch → audit over one period's entries, sequentially
/// and with flat pacing between sends.
pub struct PeriodProcessor<'a, M: Mailer, A: AuditSink> {
    mail_config: &'a MailConfig,
    mailer: &'a M,
    sink: &'a A,
    send_pause: Duration,
}

impl<'a, M: Mailer, A: AuditSink> PeriodProcessor<'a, M, A> {
    pub fn new(
        mail_config: &'a MailConfig,
        mailer: &'a M,
        sink: &'a A,
        send_pause: Duration,
    ) -> Self {
        Self {
            mail_config,
            mailer,
            sink,
            send_pause,
        }
    }

    pub async fn process(
        &self,
        period: Period,
        mut entries: Vec<ReminderEntry>,
        limit: Option<usize>,
    ) -> PeriodStats {
        let mut stats = PeriodStats {
            total: entries.len(),
            ..PeriodStats::default()
        };

        if let Some(limit) = limit {
            if entries.len() > limit {
                tracing::info!("📋 Limiting {} to {} emails", period, limit);
                entries.truncate(limit);
            }
        }

        for entry in entries {
            let customer = &entry.customer;
            let Some(email) = customer.email.as_deref().filter(|e| !e.is_empty()) else {
                tracing::warn!(
                    "⚠️ Customer {} has no email, directory id: {}",
                    customer.display_name(),
                    customer.record_id
                );
                stats.no_email += 1;
                self.record_outcome(self.no_email_outcome(period, &entry)).await;
                continue;
            };

            let composed = compose(
                self.mail_config,
                email,
                customer.display_name(),
                &ReminderData {
                    customer_name: customer.display_name().to_string(),
                    amount: entry.installment.amount,
                    due_date_iso: entry.installment.due_date.clone(),
                    payment_link: entry.installment.payment_link.clone(),
                },
                period,
            );
            let result = self.mailer.send(&composed.payload).await;
            if result.success {
                stats.sent += 1;
            } else {
                stats.errors += 1;
                tracing::error!(
                    "❌ Failed to process installment for {} ({}): {}",
                    customer.display_name(),
                    entry.external_id,
                    result.error_message.as_deref().unwrap_or("unknown error")
                );
            }

            let sample_percent = if self.mail_config.bcc_sample_percent > 0.0 {
                Some(self.mail_config.bcc_sample_percent)
            } else {
                None
            };
            self.record_outcome(DispatchOutcome {
                sistema: entry.system,
                periodo: period,
                cliente_diretorio_id: Some(customer.record_id.clone()),
                cliente_sistema_id: Some(entry.external_id.clone()),
                nome: customer.display_name().to_string(),
                email: Some(email.to_string()),
                valor_parcela: entry.installment.amount,
                data_vencimento: Some(entry.installment.due_date.clone()),
                link_pagamento: Some(entry.installment.payment_link.clone()),
                status: if result.success {
                    DispatchStatus::Sent
                } else {
                    DispatchStatus::Error
                },
                provider_status: result.status_code,
                provider_message_id: result.message_id,
                error_message: result.error_message,
                bcc_aplicado: composed.bcc_applied,
                bcc_email: composed
                    .bcc_applied
                    .then(|| self.mail_config.bcc_archive_email.clone())
                    .flatten(),
                bcc_sample_percent: sample_percent,
                request_summary: Some(composed.request_summary),
            })
            .await;

            if !self.send_pause.is_zero() {
                tokio::time::sleep(self.send_pause).await;
            }
        }

        stats
    }

    fn no_email_outcome(&self, period: Period, entry: &ReminderEntry) -> DispatchOutcome {
        DispatchOutcome {
            sistema: entry.system,
            periodo: period,
            cliente_diretorio_id: Some(entry.customer.record_id.clone()),
            cliente_sistema_id: Some(entry.external_id.clone()),
            nome: entry.customer.display_name().to_string(),
            email: None,
            valor_parcela: entry.installment.amount,
            data_vencimento: Some(entry.installment.due_date.clone()),
            link_pagamento: Some(entry.installment.payment_link.clone()),
            status: DispatchStatus::NoEmail,
            provider_status: None,
            provider_message_id: None,
            error_message: Some("cliente_sem_email".to_string()),
            bcc_aplicado: false,
            bcc_email: None,
            bcc_sample_percent: None,
            request_summary: None,
        }
    }

    /// Best-effort: a sink failure is logged and otherwise ignored.
    async fn record_outcome(&self, outcome: DispatchOutcome) {
        if let Err(err) = self.sink.record(&outcome).await {
            tracing::warn!("[AUDIT] Failed to record dispatch outcome: {}", err);
        }
    }
}
