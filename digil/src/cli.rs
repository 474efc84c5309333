//! `digil-reset` command line

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use digil_core::constants::DEFAULT_QUEUE_HOURS;
use digil_transport::{Gateway, HttpGateway};
use digil_types::DeviceRole;

use crate::config::{Overrides, Settings};
use crate::export::{
    CsvRow, QUEUE_EXPORT_PREFIX, RESET_EXPORT_PREFIX, STATUS_EXPORT_PREFIX, VERIFY_EXPORT_PREFIX,
    export_rows, export_summary, summary_path, timestamped_name,
};
use crate::input::{Rejection, load_devices, load_verify_targets};
use crate::observer::TracingObserver;
use crate::orchestrator::{Orchestrator, PhaseOutput, PhaseReport, Workflow};
use crate::queue::QueueWorkflow;
use crate::reset::ResetWorkflow;
use crate::status::StatusWorkflow;
use crate::summary::PhaseSummary;
use crate::verify::VerifyWorkflow;

#[derive(Parser)]
#[command(name = "digil-reset")]
#[command(about = "Inclinometer reset and verification for DIGIL devices", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML settings file
    #[arg(short, long, env = "DIGIL_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(flatten)]
    backend: BackendArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct BackendArgs {
    #[arg(long, env = "BASE_URL", global = true)]
    base_url: Option<String>,

    #[arg(long, env = "AUTH_URL", global = true)]
    auth_url: Option<String>,

    #[arg(long, env = "CLIENT_ID", global = true)]
    client_id: Option<String>,

    #[arg(long, env = "CLIENT_SECRET", global = true, hide_env_values = true)]
    client_secret: Option<String>,

    /// Concurrent device workers
    #[arg(short, long, env = "MAX_THREADS", global = true)]
    workers: Option<usize>,

    #[arg(long, env = "RETRY_INTERVAL_SECONDS", global = true)]
    retry_interval: Option<u64>,

    #[arg(long, env = "MAX_RETRY_MINUTES_MASTER", global = true)]
    master_window: Option<u64>,

    #[arg(long, env = "MAX_RETRY_MINUTES_SLAVE", global = true)]
    slave_window: Option<u64>,

    /// Max |avg| accepted on each inclination axis
    #[arg(long, env = "INCL_TOLERANCE", global = true)]
    tolerance: Option<f64>,
}

impl From<BackendArgs> for Overrides {
    fn from(args: BackendArgs) -> Self {
        Self {
            base_url: args.base_url,
            auth_url: args.auth_url,
            client_id: args.client_id,
            client_secret: args.client_secret,
            workers: args.workers,
            retry_interval_secs: args.retry_interval,
            master_window_mins: args.master_window,
            slave_window_mins: args.slave_window,
            tolerance: args.tolerance,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Phase 1: maintenance ON, inclinometer reset, maintenance OFF
    Reset {
        /// CSV with a `deviceid` column
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Role for rows without a `tipo`/`role` value
        #[arg(long, default_value = "slave")]
        default_role: DeviceRole,
    },

    /// Phase 2: check alarm, inclination and data freshness
    Verify {
        /// Phase 1 export
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long, default_value = "slave")]
        default_role: DeviceRole,
    },

    /// Read the maintenance mode of every device
    Status {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List pending and sent commands of every device
    Queue {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Hours of command history to read
        #[arg(long, default_value_t = DEFAULT_QUEUE_HOURS)]
        hours: u32,
    },
}

/// Run using the current process arguments
pub async fn run() -> anyhow::Result<()> {
    run_with_args(std::env::args_os()).await
}

/// Run using the provided argument iterator
pub async fn run_with_args<I, T>(args: I) -> anyhow::Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut settings = Settings::load(cli.config.as_deref())
        .with_context(|| format!("loading settings from {:?}", cli.config))?;
    settings.apply(cli.backend.into());
    settings.validate().context("invalid settings")?;

    let gateway: Arc<dyn Gateway> = Arc::new(
        HttpGateway::builder(&settings.base_url, settings.credentials())
            .with_command_timeout(settings.command_timeout())
            .with_read_timeout(settings.read_timeout())
            .with_accept_invalid_certs(settings.accept_invalid_certs)
            .build()
            .context("building HTTP client")?,
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight devices");
            on_signal.cancel();
        }
    });

    gateway.authenticate().await.context("authentication failed")?;
    info!("Authenticated against {}", settings.base_url);

    let orchestrator = Orchestrator::new(settings.workers, cancel);

    match cli.command {
        Commands::Reset {
            input,
            output,
            default_role,
        } => {
            let list = load_devices(&input, default_role)
                .with_context(|| format!("reading {}", input.display()))?;
            let skipped = list.rejected.len();
            log_rejections(&list.rejected);

            let workflow = ResetWorkflow::new(gateway, settings.retry_policies()?);
            let output = output.unwrap_or_else(|| timestamped_name(RESET_EXPORT_PREFIX, Local::now()));
            run_phase(&orchestrator, "reset", list.devices, workflow, &output, skipped).await
        }
        Commands::Verify {
            input,
            output,
            default_role,
        } => {
            let targets = load_verify_targets(&input, default_role)
                .with_context(|| format!("reading {}", input.display()))?;
            for device in &targets.excluded {
                info!(device = %device, "No reset timestamp, excluded from verification");
            }
            let skipped = targets.rejected.len() + targets.excluded.len();
            log_rejections(&targets.rejected);

            let workflow = VerifyWorkflow::new(gateway, settings.tolerance()?);
            let output = output.unwrap_or_else(|| timestamped_name(VERIFY_EXPORT_PREFIX, Local::now()));
            run_phase(&orchestrator, "verify", targets.targets, workflow, &output, skipped).await
        }
        Commands::Status { input, output } => {
            let list = load_devices(&input, DeviceRole::Slave)
                .with_context(|| format!("reading {}", input.display()))?;
            let skipped = list.rejected.len();
            log_rejections(&list.rejected);

            let workflow = StatusWorkflow::new(gateway);
            let output = output.unwrap_or_else(|| timestamped_name(STATUS_EXPORT_PREFIX, Local::now()));
            run_phase(&orchestrator, "status", list.devices, workflow, &output, skipped).await
        }
        Commands::Queue {
            input,
            output,
            hours,
        } => {
            let list = load_devices(&input, DeviceRole::Slave)
                .with_context(|| format!("reading {}", input.display()))?;
            let skipped = list.rejected.len();
            log_rejections(&list.rejected);

            let workflow = QueueWorkflow::hours_back(gateway, hours);
            let output = output.unwrap_or_else(|| timestamped_name(QUEUE_EXPORT_PREFIX, Local::now()));
            run_phase(&orchestrator, "queue", list.devices, workflow, &output, skipped).await
        }
    }
}

fn log_rejections(rejected: &[Rejection]) {
    if !rejected.is_empty() {
        warn!("{} input rows rejected", rejected.len());
    }
}

/// Run one phase, export what was produced, then report how it ended
async fn run_phase<W>(
    orchestrator: &Orchestrator,
    phase: &'static str,
    inputs: Vec<W::Input>,
    workflow: W,
    output: &Path,
    skipped: usize,
) -> anyhow::Result<()>
where
    W: Workflow,
    W::Output: CsvRow,
{
    let observer = TracingObserver::new(phase);
    let report: PhaseReport<W::Input, W::Output> = orchestrator
        .run_phase(inputs, Arc::new(workflow), &observer)
        .await;

    export_rows(output, &report.results)
        .with_context(|| format!("writing {}", output.display()))?;

    let summary = PhaseSummary::from_report(phase, &report, skipped);
    summary.log();
    export_summary(&summary_path(output), &summary).context("writing summary")?;

    for input in &report.not_dispatched {
        warn!(device = %crate::orchestrator::PhaseInput::device_id(input), "Not dispatched");
    }

    if let Some(fatal) = report.fatal {
        bail!("{} phase stopped: {}", phase, fatal);
    }
    if report.cancelled {
        bail!("{} phase cancelled", phase);
    }

    let failed = report.results.iter().filter(|r| !r.is_success()).count();
    if failed > 0 {
        warn!("{} devices need follow-up, see {}", failed, output.display());
    }

    Ok(())
}
