use clap::Parser;

/// CLI surface. Everything else comes from environment variables, matching
/// the hosted deployment.
#[derive(Debug, Clone, Parser)]
#[command(name = "installment-reminder")]
#[command(about = "Reconciles customer installments and dispatches reminder emails")]
pub struct CliArgs {
    /// Simulate dispatches without calling the delivery provider
    #[arg(long)]
    pub test_mode: bool,

    /// Skip the allowed-hours gate
    #[arg(long)]
    pub ignore_schedule: bool,

    /// Send a single synthetic reminder to this address and exit
    #[arg(long)]
    pub test_recipient: Option<String>,

    /// Send one reminder built from live directory/ledger data to this
    /// address and exit
    #[arg(long)]
    pub real_data_recipient: Option<String>,

    /// Period for --test-recipient / --real-data-recipient:
    /// venceu_ontem | vence_hoje | vence_amanha
    #[arg(long)]
    pub test_period: Option<String>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}
