use crate::utils::error::{MailerError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(MailerError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(MailerError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(MailerError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_percentage(field_name: &str, value: f64) -> Result<()> {
    if !(0.0..=100.0).contains(&value) {
        return Err(MailerError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Percentage must be between 0 and 100".to_string(),
        });
    }
    Ok(())
}

pub fn validate_hour_window(field_name: &str, start: u32, end: u32) -> Result<()> {
    if start >= 24 || end > 24 || start >= end {
        return Err(MailerError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: format!("{}-{}", start, end),
            reason: "Hour window must satisfy 0 <= start < end <= 24".to_string(),
        });
    }
    Ok(())
}
