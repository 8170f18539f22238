#[cfg(feature = "cli")]
pub mod cli;

use crate::domain::model::{LedgerSystem, Period};
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_hour_window, validate_percentage, validate_url, Validate,
};
use std::env;
use std::time::Duration;

const DEFAULT_DIRECTORY_BASE: &str = "https://api.airtable.com/v0";
const DEFAULT_CREDILLY_URL: &str = "https://credilly.tenex.com.br/api/v2/vendas/";
const DEFAULT_TURING_URL: &str = "https://turing.tenex.com.br/api/v2/vendas/";
const DEFAULT_MAIL_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";

/// Immutable run configuration, built once at startup and passed explicitly
/// to every component.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub directory: DirectoryConfig,
    pub credilly: LedgerEndpoint,
    pub turing: LedgerEndpoint,
    pub mail: MailConfig,
    pub audit: Option<AuditConfig>,
    pub limits: PeriodLimits,
    pub allowed_hours: HourWindow,
    pub send_pause: Duration,
    pub batch_pause: Duration,
    pub notification_url: Option<String>,
    pub test_mode: bool,
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub api_key: String,
    /// Full URL of the customer table, e.g.
    /// `https://api.airtable.com/v0/<base>/<table>`.
    pub table_url: String,
}

#[derive(Debug, Clone)]
pub struct LedgerEndpoint {
    pub base_url: String,
    pub api_key: String,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_key: String,
    pub endpoint: String,
    pub from_email: String,
    pub from_name: String,
    pub reply_email: Option<String>,
    pub template_due_yesterday: Option<String>,
    pub template_due_today: Option<String>,
    pub template_due_tomorrow: Option<String>,
    /// Optional JSON object remapping canonical template fields to
    /// provider-specific placeholder names.
    pub template_field_map: Option<String>,
    pub bcc_archive_email: Option<String>,
    pub bcc_sample_percent: f64,
}

impl MailConfig {
    pub fn template_for(&self, period: Period) -> Option<&str> {
        let template = match period {
            Period::DueYesterday => &self.template_due_yesterday,
            Period::DueToday => &self.template_due_today,
            Period::DueTomorrow => &self.template_due_tomorrow,
        };
        template.as_deref().filter(|t| !t.is_empty())
    }

    pub fn bcc_enabled(&self) -> bool {
        self.bcc_archive_email.as_deref().is_some_and(|e| !e.is_empty())
            && self.bcc_sample_percent > 0.0
    }
}

#[derive(Debug, Clone)]
pub struct AuditConfig {
    pub base_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PeriodLimits {
    pub due_yesterday: Option<usize>,
    pub due_today: Option<usize>,
    pub due_tomorrow: Option<usize>,
}

impl PeriodLimits {
    pub fn for_period(&self, period: Period) -> Option<usize> {
        match period {
            Period::DueYesterday => self.due_yesterday,
            Period::DueToday => self.due_today,
            Period::DueTomorrow => self.due_tomorrow,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HourWindow {
    pub start: u32,
    pub end: u32,
}

impl HourWindow {
    pub fn contains(&self, hour: u32) -> bool {
        self.start <= hour && hour < self.end
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let base_id = env_or("AIRTABLE_BASE_ID", "app3SiNzJv7q5BDkV");
        let table_id = env_or("CLIENTES_TABLE_ID", "tbl8YhBey4l9cOqLT");
        let table_url = env::var("DIRECTORY_TABLE_URL")
            .unwrap_or_else(|_| format!("{}/{}/{}", DEFAULT_DIRECTORY_BASE, base_id, table_id));

        Ok(Self {
            directory: DirectoryConfig {
                api_key: env_or("AIRTABLE_API_KEY", ""),
                table_url,
            },
            credilly: LedgerEndpoint {
                base_url: env_or("TENEX_URL_CREDILLY", DEFAULT_CREDILLY_URL),
                api_key: env_or("TENEX_API_KEY_CREDILLY", ""),
                enabled: env_flag("PROCESSAR_CREDILLY", true),
            },
            turing: LedgerEndpoint {
                base_url: env_or("TENEX_URL_TURING", DEFAULT_TURING_URL),
                api_key: env_or("TENEX_API_KEY_TURING", ""),
                enabled: env_flag("PROCESSAR_TURING", true),
            },
            mail: MailConfig {
                api_key: env_or("SENDGRID_API_KEY", ""),
                endpoint: env_or("SENDGRID_ENDPOINT", DEFAULT_MAIL_ENDPOINT),
                from_email: env_or("SENDGRID_FROM_EMAIL", "no-reply@example.com"),
                from_name: env_or("SENDGRID_FROM_NAME", "Credilly Cobrança"),
                reply_email: env_opt("SENDGRID_REPLY_EMAIL"),
                template_due_yesterday: env_opt("SENDGRID_TEMPLATE_VENCEU"),
                template_due_today: env_opt("SENDGRID_TEMPLATE_VENCE_HOJE"),
                template_due_tomorrow: env_opt("SENDGRID_TEMPLATE_VENCE_AMANHA"),
                template_field_map: env_opt("SENDGRID_TEMPLATE_FIELD_MAP"),
                bcc_archive_email: env_opt("BCC_ARQUIVO_EMAIL"),
                bcc_sample_percent: env_parse("BCC_SAMPLE_PERCENT", 0.0),
            },
            audit: match (env_opt("SUPABASE_URL"), env_opt("SUPABASE_KEY")) {
                (Some(base_url), Some(api_key)) => Some(AuditConfig { base_url, api_key }),
                _ => None,
            },
            limits: PeriodLimits {
                due_yesterday: env_opt("LIMITE_VENCIDAS").and_then(|v| v.parse().ok()),
                due_today: env_opt("LIMITE_HOJE").and_then(|v| v.parse().ok()),
                due_tomorrow: env_opt("LIMITE_AMANHA").and_then(|v| v.parse().ok()),
            },
            allowed_hours: HourWindow {
                start: env_parse("HORARIO_INICIO", 9),
                end: env_parse("HORARIO_FIM", 20),
            },
            send_pause: Duration::from_millis(env_parse("PAUSAR_ENTRE_ENVIO_MS", 50)),
            batch_pause: Duration::from_millis(env_parse("PAUSAR_ENTRE_LOTES_MS", 100)),
            notification_url: env_opt("NOTIFICATION_FINALIZADO_URL"),
            test_mode: env_flag("MODO_TESTE", false),
        })
    }

    pub fn ledger(&self, system: LedgerSystem) -> &LedgerEndpoint {
        match system {
            LedgerSystem::Credilly => &self.credilly,
            LedgerSystem::Turing => &self.turing,
        }
    }

    pub fn enabled_systems(&self) -> Vec<LedgerSystem> {
        LedgerSystem::ALL
            .into_iter()
            .filter(|system| self.ledger(*system).enabled)
            .collect()
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        validate_url("directory.table_url", &self.directory.table_url)?;
        validate_url("mail.endpoint", &self.mail.endpoint)?;
        for system in self.enabled_systems() {
            let field = format!("{}.base_url", system.tag());
            validate_url(&field, &self.ledger(system).base_url)?;
        }
        if let Some(audit) = &self.audit {
            validate_url("audit.base_url", &audit.base_url)?;
        }
        if let Some(url) = &self.notification_url {
            validate_url("notification_url", url)?;
        }
        validate_percentage("mail.bcc_sample_percent", self.mail.bcc_sample_percent)?;
        validate_hour_window(
            "allowed_hours",
            self.allowed_hours.start,
            self.allowed_hours.end,
        )?;
        Ok(())
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_flag(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| v.to_lowercase() == "true")
        .unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_config() -> AppConfig {
        AppConfig {
            directory: DirectoryConfig {
                api_key: "key".to_string(),
                table_url: "https://api.example.com/v0/base/table".to_string(),
            },
            credilly: LedgerEndpoint {
                base_url: "https://credilly.example.com/api/v2/vendas/".to_string(),
                api_key: "ck".to_string(),
                enabled: true,
            },
            turing: LedgerEndpoint {
                base_url: "https://turing.example.com/api/v2/vendas/".to_string(),
                api_key: "tk".to_string(),
                enabled: false,
            },
            mail: MailConfig {
                api_key: "sg".to_string(),
                endpoint: "https://mail.example.com/v3/mail/send".to_string(),
                from_email: "no-reply@example.com".to_string(),
                from_name: "Cobrança".to_string(),
                reply_email: None,
                template_due_yesterday: None,
                template_due_today: None,
                template_due_tomorrow: None,
                template_field_map: None,
                bcc_archive_email: None,
                bcc_sample_percent: 0.0,
            },
            audit: None,
            limits: PeriodLimits::default(),
            allowed_hours: HourWindow { start: 9, end: 20 },
            send_pause: Duration::from_millis(0),
            batch_pause: Duration::from_millis(0),
            notification_url: None,
            test_mode: true,
        }
    }

    #[test]
    fn test_validate_accepts_minimal_config() {
        assert!(minimal_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_ledger_url() {
        let mut config = minimal_config();
        config.credilly.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_skips_disabled_ledger() {
        let mut config = minimal_config();
        config.turing.base_url = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_enabled_systems_respects_flags() {
        let config = minimal_config();
        assert_eq!(
            config.enabled_systems(),
            vec![crate::domain::model::LedgerSystem::Credilly]
        );
    }

    #[test]
    fn test_template_for_ignores_empty_string() {
        let mut config = minimal_config();
        config.mail.template_due_today = Some(String::new());
        assert!(config.mail.template_for(Period::DueToday).is_none());
        config.mail.template_due_today = Some("d-123".to_string());
        assert_eq!(config.mail.template_for(Period::DueToday), Some("d-123"));
    }

    #[test]
    fn test_hour_window_contains() {
        let window = HourWindow { start: 9, end: 20 };
        assert!(!window.contains(8));
        assert!(window.contains(9));
        assert!(window.contains(19));
        assert!(!window.contains(20));
    }
}
