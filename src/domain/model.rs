use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One customer identity from the directory service. Built once per run and
/// shared read-only by everything downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub record_id: String,
    pub name: String,
    pub email: Option<String>,
}

impl CustomerRecord {
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "Sem nome"
        } else {
            &self.name
        }
    }
}

/// External system of record for installments. Two independent instances
/// speak the same protocol behind different base URLs and credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerSystem {
    Credilly,
    Turing,
}

impl LedgerSystem {
    pub const ALL: [LedgerSystem; 2] = [LedgerSystem::Credilly, LedgerSystem::Turing];

    /// Prefix used in the composite directory-index key, e.g. `CRED-12345`.
    pub fn prefix(&self) -> &'static str {
        match self {
            LedgerSystem::Credilly => "CRED",
            LedgerSystem::Turing => "TUR",
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            LedgerSystem::Credilly => "credilly",
            LedgerSystem::Turing => "turing",
        }
    }

    pub fn composite_key(&self, external_id: &str) -> String {
        format!("{}-{}", self.prefix(), external_id)
    }
}

impl std::fmt::Display for LedgerSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// One payable obligation as returned by a ledger system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Installment {
    pub amount: f64,
    pub due_date: String,
    pub status: i64,
    pub payment_link: String,
}

/// Due-date proximity bucket, computed by exact calendar-date equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "venceu_ontem")]
    DueYesterday,
    #[serde(rename = "vence_hoje")]
    DueToday,
    #[serde(rename = "vence_amanha")]
    DueTomorrow,
}

impl Period {
    pub const ALL: [Period; 3] = [Period::DueYesterday, Period::DueToday, Period::DueTomorrow];

    pub fn tag(&self) -> &'static str {
        match self {
            Period::DueYesterday => "venceu_ontem",
            Period::DueToday => "vence_hoje",
            Period::DueTomorrow => "vence_amanha",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Period> {
        match tag {
            "venceu_ontem" => Some(Period::DueYesterday),
            "vence_hoje" => Some(Period::DueToday),
            "vence_amanha" => Some(Period::DueTomorrow),
            _ => None,
        }
    }

    /// Human label embedded in the message body and template data.
    pub fn status_label(&self) -> &'static str {
        match self {
            Period::DueYesterday => "venceu ontem",
            Period::DueToday => "vence hoje",
            Period::DueTomorrow => "vence amanhã",
        }
    }

    pub fn subject(&self, formatted_amount: &str) -> String {
        match self {
            Period::DueYesterday => {
                format!("Parcela vencida - ação necessária ({})", formatted_amount)
            }
            Period::DueToday => {
                format!("Lembrete: sua parcela vence hoje ({})", formatted_amount)
            }
            Period::DueTomorrow => {
                format!("Lembrete: sua parcela vence amanhã ({})", formatted_amount)
            }
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// One classified installment joined to its customer. Always carries the
/// originating system tag.
#[derive(Debug, Clone)]
pub struct ReminderEntry {
    pub installment: Installment,
    pub customer: Arc<CustomerRecord>,
    pub external_id: String,
    pub system: LedgerSystem,
}

/// The three period-keyed lists produced by classification.
#[derive(Debug, Clone, Default)]
pub struct PeriodBuckets {
    pub due_yesterday: Vec<ReminderEntry>,
    pub due_today: Vec<ReminderEntry>,
    pub due_tomorrow: Vec<ReminderEntry>,
}

impl PeriodBuckets {
    pub fn get(&self, period: Period) -> &Vec<ReminderEntry> {
        match period {
            Period::DueYesterday => &self.due_yesterday,
            Period::DueToday => &self.due_today,
            Period::DueTomorrow => &self.due_tomorrow,
        }
    }

    pub fn get_mut(&mut self, period: Period) -> &mut Vec<ReminderEntry> {
        match period {
            Period::DueYesterday => &mut self.due_yesterday,
            Period::DueToday => &mut self.due_today,
            Period::DueTomorrow => &mut self.due_tomorrow,
        }
    }

    pub fn push(&mut self, period: Period, entry: ReminderEntry) {
        self.get_mut(period).push(entry);
    }

    /// Appends another fetch's buckets, preserving arrival order.
    pub fn merge(&mut self, other: PeriodBuckets) {
        self.due_yesterday.extend(other.due_yesterday);
        self.due_today.extend(other.due_today);
        self.due_tomorrow.extend(other.due_tomorrow);
    }

    pub fn take(&mut self, period: Period) -> Vec<ReminderEntry> {
        std::mem::take(self.get_mut(period))
    }
}

/// Final disposition of one processed installment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchStatus {
    #[serde(rename = "enviado")]
    Sent,
    #[serde(rename = "erro")]
    Error,
    #[serde(rename = "sem_email")]
    NoEmail,
}

/// One audit row, written once per processed installment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub sistema: LedgerSystem,
    pub periodo: Period,
    pub cliente_diretorio_id: Option<String>,
    pub cliente_sistema_id: Option<String>,
    pub nome: String,
    pub email: Option<String>,
    pub valor_parcela: f64,
    pub data_vencimento: Option<String>,
    pub link_pagamento: Option<String>,
    pub status: DispatchStatus,
    pub provider_status: Option<u16>,
    pub provider_message_id: Option<String>,
    pub error_message: Option<String>,
    pub bcc_aplicado: bool,
    pub bcc_email: Option<String>,
    pub bcc_sample_percent: Option<f64>,
    pub request_summary: Option<String>,
}

/// Result of one dispatch attempt sequence (after retries).
#[derive(Debug, Clone)]
pub struct SendResult {
    pub success: bool,
    pub status_code: Option<u16>,
    pub message_id: Option<String>,
    pub error_message: Option<String>,
}

impl SendResult {
    pub fn sent(status_code: u16, message_id: Option<String>) -> Self {
        Self {
            success: true,
            status_code: Some(status_code),
            message_id,
            error_message: None,
        }
    }

    pub fn failed(status_code: Option<u16>, error_message: impl Into<String>) -> Self {
        Self {
            success: false,
            status_code,
            message_id: None,
            error_message: Some(error_message.into()),
        }
    }
}

/// Per-period counters accumulated by the processor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PeriodStats {
    pub total: usize,
    pub sent: usize,
    pub no_email: usize,
    pub errors: usize,
}

/// Aggregated counters for a whole run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub due_yesterday: PeriodStats,
    pub due_today: PeriodStats,
    pub due_tomorrow: PeriodStats,
    pub elapsed_seconds: f64,
}

impl RunReport {
    pub fn stats(&self, period: Period) -> PeriodStats {
        match period {
            Period::DueYesterday => self.due_yesterday,
            Period::DueToday => self.due_today,
            Period::DueTomorrow => self.due_tomorrow,
        }
    }

    pub fn set_stats(&mut self, period: Period, stats: PeriodStats) {
        match period {
            Period::DueYesterday => self.due_yesterday = stats,
            Period::DueToday => self.due_today = stats,
            Period::DueTomorrow => self.due_tomorrow = stats,
        }
    }

    pub fn total_processed(&self) -> usize {
        self.due_yesterday.total + self.due_today.total + self.due_tomorrow.total
    }

    pub fn total_sent(&self) -> usize {
        self.due_yesterday.sent + self.due_today.sent + self.due_tomorrow.sent
    }
}
