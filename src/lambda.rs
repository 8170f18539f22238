#[cfg(feature = "lambda")]
use installment_reminder::utils::{logger, validation::Validate};
#[cfg(feature = "lambda")]
use installment_reminder::{AppConfig, Period, ReminderEngine};
#[cfg(feature = "lambda")]
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
#[cfg(feature = "lambda")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "lambda")]
#[derive(Deserialize, Default)]
pub struct Request {
    /// Optional single-send override: compose one synthetic reminder for
    /// this address instead of running the full pipeline.
    pub test_recipient: Option<String>,
    /// Like `test_recipient`, but built from live directory and ledger data.
    pub real_data_recipient: Option<String>,
    pub test_period: Option<String>,
}

#[cfg(feature = "lambda")]
#[derive(Serialize)]
pub struct Response {
    pub message: String,
    pub installments_processed: usize,
    pub emails_sent: usize,
}

#[cfg(feature = "lambda")]
async fn function_handler(event: LambdaEvent<Request>) -> Result<Response, Error> {
    tracing::info!("Starting reminder Lambda function");

    let config =
        AppConfig::from_env().map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;
    config
        .validate()
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;
    let engine = ReminderEngine::new(config);

    let period = match event.payload.test_period.as_deref() {
        Some(tag) => Some(Period::from_tag(tag).ok_or_else(|| {
            Box::<dyn std::error::Error + Send + Sync>::from(format!(
                "invalid test_period '{}'",
                tag
            ))
        })?),
        None => None,
    };

    if let Some(recipient) = &event.payload.real_data_recipient {
        engine
            .send_real_data_test(recipient, period)
            .await
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;
        return Ok(Response {
            message: format!("Real-data test reminder sent to {}", recipient),
            installments_processed: 1,
            emails_sent: 1,
        });
    }

    if let Some(recipient) = &event.payload.test_recipient {
        engine
            .send_single_test(recipient, period.unwrap_or(Period::DueToday))
            .await
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;
        return Ok(Response {
            message: format!("Test reminder sent to {}", recipient),
            installments_processed: 1,
            emails_sent: 1,
        });
    }

    if !engine.config().test_mode && !engine.within_allowed_hours() {
        let window = engine.config().allowed_hours;
        tracing::warn!(
            "⚠️ Outside allowed hours ({}h-{}h); skipping run",
            window.start,
            window.end
        );
        return Ok(Response {
            message: "Outside allowed hours".to_string(),
            installments_processed: 0,
            emails_sent: 0,
        });
    }

    let report = engine
        .run()
        .await
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;

    tracing::info!("Reminder Lambda function completed successfully");
    Ok(Response {
        message: "Reminder run completed".to_string(),
        installments_processed: report.total_processed(),
        emails_sent: report.total_sent(),
    })
}

#[cfg(feature = "lambda")]
#[tokio::main]
async fn main() -> Result<(), Error> {
    logger::init_lambda_logger();
    run(service_fn(function_handler)).await
}
