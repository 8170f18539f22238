use crate::config::MailConfig;
use crate::domain::model::Period;
use crate::utils::format::{format_currency_brl, format_date_br};
use serde::Serialize;
use std::collections::HashMap;

/// Delivery-provider send payload (SendGrid v3 `mail/send` shape).
#[derive(Debug, Clone, Serialize)]
pub struct MailPayload {
    pub from: EmailAddress,
    pub personalizations: Vec<Personalization>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<EmailAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<Content>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmailAddress {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl EmailAddress {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
        }
    }

    pub fn named(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: Some(name.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Personalization {
    pub to: Vec<EmailAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bcc: Option<Vec<EmailAddress>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamic_template_data: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Content {
    #[serde(rename = "type")]
    pub content_type: String,
    pub value: String,
}

/// Per-installment data the composer renders into the message.
#[derive(Debug, Clone)]
pub struct ReminderData {
    pub customer_name: String,
    pub amount: f64,
    pub due_date_iso: String,
    pub payment_link: String,
}

/// A composed payload plus facts the audit trail needs about how it was
/// built.
#[derive(Debug, Clone)]
pub struct ComposedMail {
    pub payload: MailPayload,
    pub bcc_applied: bool,
    /// Template id or plaintext subject, recorded in the audit row.
    pub request_summary: String,
}

/// Default mapping from canonical field names to the template placeholders
/// shipped with the production templates. Canonical keys missing from the
/// map keep their own name.
fn default_field_map() -> HashMap<String, String> {
    [
        ("nome", "nome"),
        ("valor_parcela", "valor"),
        ("data_vencimento", "vencimento"),
        ("link_pagamento", "link"),
        ("subject", "subject"),
        ("assunto", "assunto"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn resolve_field_map(config: &MailConfig) -> HashMap<String, String> {
    let Some(raw) = config.template_field_map.as_deref() else {
        return default_field_map();
    };
    match serde_json::from_str::<HashMap<String, String>>(raw) {
        Ok(map) if !map.is_empty() => map,
        Ok(_) => default_field_map(),
        Err(err) => {
            tracing::warn!(
                "[TEMPLATE_MAP] Invalid JSON in template field map: {}. Using default names.",
                err
            );
            default_field_map()
        }
    }
}

/// Decides whether this message gets the archival BCC. Sampling is
/// per-message and independent; 100 always attaches, 0 is handled by the
/// caller gate (`bcc_enabled`).
fn draw_bcc_sample(sample_percent: f64) -> bool {
    sample_percent >= 100.0 || (rand::random::<f64>() * 100.0) < sample_percent
}

/// Builds the provider payload for one reminder. Template mode when the
/// period has a configured template id, plaintext otherwise.
pub fn compose(
    config: &MailConfig,
    recipient_email: &str,
    recipient_name: &str,
    data: &ReminderData,
    period: Period,
) -> ComposedMail {
    let formatted_amount = format_currency_brl(data.amount);
    let formatted_due_date = format_date_br(&data.due_date_iso);
    let subject = period.subject(&formatted_amount);

    let mut personalization = Personalization {
        to: vec![EmailAddress::named(recipient_email, recipient_name)],
        bcc: None,
        subject: None,
        dynamic_template_data: None,
    };

    let mut payload = MailPayload {
        from: EmailAddress::named(&config.from_email, &config.from_name),
        personalizations: Vec::new(),
        reply_to: config
            .reply_email
            .as_deref()
            .filter(|e| !e.is_empty())
            .map(|e| EmailAddress::named(e, &config.from_name)),
        template_id: None,
        subject: None,
        content: None,
        headers: None,
    };

    let mut bcc_applied = false;
    if config.bcc_enabled() && draw_bcc_sample(config.bcc_sample_percent) {
        let archive = config.bcc_archive_email.as_deref().unwrap_or_default();
        personalization.bcc = Some(vec![EmailAddress::new(archive)]);
        // Archived copies must remain attributable to the real recipient.
        payload.headers = Some(HashMap::from([(
            "X-Original-To".to_string(),
            recipient_email.to_string(),
        )]));
        bcc_applied = true;
    }

    let request_summary;
    if let Some(template_id) = config.template_for(period) {
        payload.template_id = Some(template_id.to_string());
        request_summary = template_id.to_string();

        let canonical: HashMap<String, String> = HashMap::from([
            ("nome".to_string(), recipient_name.to_string()),
            ("cliente".to_string(), data.customer_name.clone()),
            ("valor_parcela".to_string(), formatted_amount.clone()),
            ("data_vencimento".to_string(), formatted_due_date.clone()),
            ("link_pagamento".to_string(), data.payment_link.clone()),
            (
                "status_vencimento".to_string(),
                period.status_label().to_string(),
            ),
            ("subject".to_string(), subject.clone()),
            ("assunto".to_string(), subject.clone()),
        ]);

        let field_map = resolve_field_map(config);
        let mapped: HashMap<String, String> = canonical
            .into_iter()
            .map(|(key, value)| {
                let target = field_map.get(&key).cloned().unwrap_or(key);
                (target, value)
            })
            .collect();
        personalization.dynamic_template_data = Some(mapped);

        // Subject at both levels: some templates expect {{subject}}, others
        // rely on the payload-level value.
        personalization.subject = Some(subject.clone());
        payload.subject = Some(subject);
    } else {
        let link = if data.payment_link.is_empty() {
            "—"
        } else {
            &data.payment_link
        };
        let body = [
            format!("Olá {},", recipient_name),
            String::new(),
            format!("Identificamos que sua parcela {}.", period.status_label()),
            format!("- Valor: {}", formatted_amount),
            format!("- Vencimento: {}", formatted_due_date),
            format!("- Link para pagamento: {}", link),
            String::new(),
            "Se já realizou o pagamento, desconsidere este e-mail.".to_string(),
            String::new(),
            "Atenciosamente,".to_string(),
            config.from_name.clone(),
        ]
        .join("\n");

        personalization.subject = Some(subject.clone());
        payload.content = Some(vec![Content {
            content_type: "text/plain".to_string(),
            value: body,
        }]);
        request_summary = subject;
    }

    payload.personalizations.push(personalization);
    ComposedMail {
        payload,
        bcc_applied,
        request_summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail_config() -> MailConfig {
        MailConfig {
            api_key: "sg-key".to_string(),
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
        }
    }

    fn reminder_data() -> ReminderData {
        ReminderData {
            customer_name: "Ana Souza".to_string(),
            amount: 1234.56,
            due_date_iso: "2025-08-30".to_string(),
            payment_link: "https://pay.example.com/abc".to_string(),
        }
    }

    #[test]
    fn test_plaintext_mode_when_no_template_configured() {
        let composed = compose(
            &mail_config(),
            "ana@example.com",
            "Ana Souza",
            &reminder_data(),
            Period::DueToday,
        );

        assert!(composed.payload.template_id.is_none());
        let content = composed.payload.content.as_ref().unwrap();
        assert_eq!(content[0].content_type, "text/plain");
        assert!(content[0].value.contains("Olá Ana Souza,"));
        assert!(content[0].value.contains("vence hoje"));
        assert!(content[0].value.contains("R$ 1.234,56"));
        assert!(content[0].value.contains("30/08/2025"));
        assert_eq!(
            composed.payload.personalizations[0].subject.as_deref(),
            Some("Lembrete: sua parcela vence hoje (R$ 1.234,56)")
        );
    }

    #[test]
    fn test_template_mode_when_template_configured() {
        let mut config = mail_config();
        config.template_due_tomorrow = Some("d-template-1".to_string());

        let composed = compose(
            &config,
            "ana@example.com",
            "Ana Souza",
            &reminder_data(),
            Period::DueTomorrow,
        );

        assert_eq!(composed.payload.template_id.as_deref(), Some("d-template-1"));
        assert!(composed.payload.content.is_none());
        assert_eq!(composed.request_summary, "d-template-1");

        let template_data = composed.payload.personalizations[0]
            .dynamic_template_data
            .as_ref()
            .unwrap();
        // Default field map renames the canonical keys.
        assert_eq!(template_data.get("valor").unwrap(), "R$ 1.234,56");
        assert_eq!(template_data.get("vencimento").unwrap(), "30/08/2025");
        assert_eq!(template_data.get("link").unwrap(), "https://pay.example.com/abc");
        assert_eq!(template_data.get("nome").unwrap(), "Ana Souza");
        // Unmapped canonical keys keep their own name.
        assert_eq!(template_data.get("cliente").unwrap(), "Ana Souza");
        assert_eq!(template_data.get("status_vencimento").unwrap(), "vence amanhã");

        // Subject is set at both the personalization and payload root.
        let subject = "Lembrete: sua parcela vence amanhã (R$ 1.234,56)";
        assert_eq!(
            composed.payload.personalizations[0].subject.as_deref(),
            Some(subject)
        );
        assert_eq!(composed.payload.subject.as_deref(), Some(subject));
    }

    #[test]
    fn test_template_mode_selection_is_per_period() {
        let mut config = mail_config();
        config.template_due_today = Some("d-hoje".to_string());

        let with_template = compose(
            &config,
            "a@example.com",
            "A",
            &reminder_data(),
            Period::DueToday,
        );
        let without_template = compose(
            &config,
            "a@example.com",
            "A",
            &reminder_data(),
            Period::DueYesterday,
        );

        assert!(with_template.payload.template_id.is_some());
        assert!(without_template.payload.template_id.is_none());
        assert!(without_template.payload.content.is_some());
    }

    #[test]
    fn test_custom_field_map_overrides_default() {
        let mut config = mail_config();
        config.template_due_today = Some("d-1".to_string());
        config.template_field_map =
            Some(r#"{"valor_parcela": "amount_due", "nome": "first_name"}"#.to_string());

        let composed = compose(
            &config,
            "a@example.com",
            "Ana",
            &reminder_data(),
            Period::DueToday,
        );
        let template_data = composed.payload.personalizations[0]
            .dynamic_template_data
            .as_ref()
            .unwrap();
        assert_eq!(template_data.get("amount_due").unwrap(), "R$ 1.234,56");
        assert_eq!(template_data.get("first_name").unwrap(), "Ana");
        // Keys absent from the custom map keep their canonical names.
        assert_eq!(template_data.get("data_vencimento").unwrap(), "30/08/2025");
    }

    #[test]
    fn test_invalid_field_map_falls_back_to_default() {
        let mut config = mail_config();
        config.template_due_today = Some("d-1".to_string());
        config.template_field_map = Some("{not json".to_string());

        let composed = compose(
            &config,
            "a@example.com",
            "Ana",
            &reminder_data(),
            Period::DueToday,
        );
        let template_data = composed.payload.personalizations[0]
            .dynamic_template_data
            .as_ref()
            .unwrap();
        assert!(template_data.contains_key("valor"));
        assert!(template_data.contains_key("vencimento"));
    }

    #[test]
    fn test_bcc_sample_zero_never_attaches() {
        let mut config = mail_config();
        config.bcc_archive_email = Some("arquivo@example.com".to_string());
        config.bcc_sample_percent = 0.0;

        for _ in 0..200 {
            let composed = compose(
                &config,
                "a@example.com",
                "Ana",
                &reminder_data(),
                Period::DueToday,
            );
            assert!(!composed.bcc_applied);
            assert!(composed.payload.personalizations[0].bcc.is_none());
            assert!(composed.payload.headers.is_none());
        }
    }

    #[test]
    fn test_bcc_sample_hundred_always_attaches() {
        let mut config = mail_config();
        config.bcc_archive_email = Some("arquivo@example.com".to_string());
        config.bcc_sample_percent = 100.0;

        for _ in 0..200 {
            let composed = compose(
                &config,
                "ana@example.com",
                "Ana",
                &reminder_data(),
                Period::DueToday,
            );
            assert!(composed.bcc_applied);
            let bcc = composed.payload.personalizations[0].bcc.as_ref().unwrap();
            assert_eq!(bcc[0].email, "arquivo@example.com");
            let headers = composed.payload.headers.as_ref().unwrap();
            assert_eq!(headers.get("X-Original-To").unwrap(), "ana@example.com");
        }
    }

    #[test]
    fn test_bcc_without_archive_address_never_attaches() {
        let mut config = mail_config();
        config.bcc_sample_percent = 100.0;

        let composed = compose(
            &config,
            "a@example.com",
            "Ana",
            &reminder_data(),
            Period::DueToday,
        );
        assert!(!composed.bcc_applied);
    }

    #[test]
    fn test_missing_payment_link_renders_placeholder() {
        let mut data = reminder_data();
        data.payment_link = String::new();

        let composed = compose(
            &mail_config(),
            "a@example.com",
            "Ana",
            &data,
            Period::DueYesterday,
        );
        let content = composed.payload.content.as_ref().unwrap();
        assert!(content[0].value.contains("- Link para pagamento: —"));
    }

    #[test]
    fn test_payload_serialization_omits_empty_options() {
        let composed = compose(
            &mail_config(),
            "a@example.com",
            "Ana",
            &reminder_data(),
            Period::DueToday,
        );
        let json = serde_json::to_value(&composed.payload).unwrap();
        assert!(json.get("template_id").is_none());
        assert!(json.get("reply_to").is_none());
        assert!(json.get("headers").is_none());
        assert!(json["personalizations"][0].get("bcc").is_none());
        assert_eq!(json["from"]["email"], "no-reply@example.com");
    }
}
