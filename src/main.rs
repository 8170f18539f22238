use clap::Parser;
use installment_reminder::utils::{logger, validation::Validate};
use installment_reminder::{AppConfig, CliArgs, Period, ReminderEngine};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    logger::init_cli_logger(args.verbose);
    tracing::info!("Starting installment-reminder CLI");
    if args.verbose {
        tracing::debug!("CLI args: {:?}", args);
    }

    let mut config = AppConfig::from_env()?;
    if args.test_mode {
        config.test_mode = true;
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }

    let engine = ReminderEngine::new(config);

    // One-off test flows, both exiting before the full pipeline.
    if args.test_recipient.is_some() || args.real_data_recipient.is_some() {
        let period = match args.test_period.as_deref() {
            Some(tag) => match Period::from_tag(tag) {
                Some(period) => Some(period),
                None => {
                    eprintln!(
                        "❌ Invalid --test-period '{}'. Use: venceu_ontem | vence_hoje | vence_amanha",
                        tag
                    );
                    std::process::exit(1);
                }
            },
            None => None,
        };

        // Synthetic send, bypassing directory and ledger systems.
        if let Some(recipient) = &args.test_recipient {
            engine
                .send_single_test(recipient, period.unwrap_or(Period::DueToday))
                .await?;
            println!("✅ Test reminder sent to {}", recipient);
            return Ok(());
        }

        // Real-data send: live directory and ledger, override recipient.
        if let Some(recipient) = &args.real_data_recipient {
            engine.send_real_data_test(recipient, period).await?;
            println!("✅ Real-data test reminder sent to {}", recipient);
            return Ok(());
        }
    }

    if !args.ignore_schedule && !engine.config().test_mode && !engine.within_allowed_hours() {
        let window = engine.config().allowed_hours;
        tracing::warn!(
            "⚠️ Outside allowed hours ({}h-{}h); skipping run",
            window.start,
            window.end
        );
        return Ok(());
    }

    match engine.run().await {
        Ok(report) => {
            tracing::info!("✅ Reminder run completed successfully");
            println!(
                "✅ Run completed: {} installments processed, {} emails sent",
                report.total_processed(),
                report.total_sent()
            );
        }
        Err(e) => {
            tracing::error!("❌ Reminder run failed: {}", e);
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
