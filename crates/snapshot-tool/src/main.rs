//! snapshot-tool: cluster snapshot lifecycle automation
//!
//! Run one pass per scheduled invocation. A non-zero exit status tells the
//! scheduler that work is still pending and the mode should run again.

use anyhow::Result;
use chrono::Utc;
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use snapshot_tool::aws::{
    FromAwsContext, KmsClient, RdsClient, RegionContexts, get_current_account_id,
};
use snapshot_tool::config::{
    self, ConfigError, CreationConfig, KmsConfig, Mode, RegionConfig, RuntimeFlags,
    ScheduleConfig, SelectionConfig, SharingConfig, ToolConfig,
};
use snapshot_tool::reconcile::{PassReport, Reconciler};
use snapshot_tool_common::defaults::{
    DEFAULT_BACKUP_INTERVAL_HOURS, DEFAULT_MAX_IN_FLIGHT, DEFAULT_RETENTION_DAYS,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "snapshot-tool")]
#[command(about = "Take, share, copy and expire RDS cluster snapshots")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    pass: PassArgs,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Snapshot clusters whose last backup is older than the interval
    Take,
    /// Share flagged snapshots with the destination account
    Share,
    /// Copy snapshots flagged for re-encryption under the source key
    Reencrypt,
    /// Copy snapshots shared with this account locally, then to the destination region
    CopyShared,
    /// Copy this account's snapshots to the destination region
    CopyOwn,
    /// Delete tool-created snapshots past retention
    Expire,
    /// Delete tool-made copies past retention in the destination region
    ExpireDest,
}

impl From<Command> for Mode {
    fn from(command: Command) -> Self {
        match command {
            Command::Take => Mode::Take,
            Command::Share => Mode::Share,
            Command::Reencrypt => Mode::Reencrypt,
            Command::CopyShared => Mode::CopyShared,
            Command::CopyOwn => Mode::CopyOwn,
            Command::Expire => Mode::Expire,
            Command::ExpireDest => Mode::ExpireDest,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum ReportFormat {
    Table,
    Json,
}

/// Options shared by every mode
#[derive(clap::Args, Debug)]
struct PassArgs {
    /// Identifier regex, or ALL_CLUSTERS / ALL_SNAPSHOTS to select everything
    #[arg(long, global = true, env = "PATTERN")]
    pattern: Option<String>,

    #[arg(long, global = true, hide = true, env = "SNAPSHOT_PATTERN")]
    snapshot_pattern: Option<String>,

    /// Days a tool-managed snapshot is kept
    #[arg(long, global = true, env = "RETENTION_DAYS", default_value_t = DEFAULT_RETENTION_DAYS)]
    retention_days: u32,

    /// Hours between backups of the same cluster
    #[arg(long, global = true, env = "INTERVAL", default_value_t = DEFAULT_BACKUP_INTERVAL_HOURS)]
    interval: u32,

    /// Source region
    #[arg(long, global = true, env = "REGION_OVERRIDE")]
    region: Option<String>,

    #[arg(long, global = true, hide = true, env = "AWS_DEFAULT_REGION")]
    default_region: Option<String>,

    /// Destination region (defaults to the source region)
    #[arg(long, global = true, env = "DEST_REGION")]
    dest_region: Option<String>,

    /// Account snapshots are shared with
    #[arg(long, global = true, env = "DEST_ACCOUNT")]
    dest_account: Option<String>,

    /// KMS key for copies made in the source region
    #[arg(long, global = true, env = "KMS_KEY_SOURCE_REGION")]
    source_kms_key: Option<String>,

    /// KMS key for copies made in the destination region
    #[arg(long, global = true, env = "KMS_KEY_DEST_REGION")]
    dest_kms_key: Option<String>,

    /// Prefix for new snapshot identifiers
    #[arg(long, global = true, env = "ADD_NAME")]
    name_prefix: Option<String>,

    /// Create snapshots from the latest automated backup
    #[arg(long, global = true, env = "USE_AUTOMATED_BACKUP", action = ArgAction::Set,
          num_args = 0..=1, default_value_t = false, default_missing_value = "true",
          value_parser = BoolishValueParser::new())]
    use_automated_backup: bool,

    /// Flag new snapshots for the re-encrypt pass
    #[arg(long, global = true, env = "MARK_REENCRYPT", action = ArgAction::Set,
          num_args = 0..=1, default_value_t = false, default_missing_value = "true",
          value_parser = BoolishValueParser::new())]
    mark_reencrypt: bool,

    /// Re-encrypt snapshots not under the source key before sharing them
    #[arg(long, global = true, env = "REENCRYPT_BEFORE_SHARE", action = ArgAction::Set,
          num_args = 0..=1, default_value_t = false, default_missing_value = "true",
          value_parser = BoolishValueParser::new())]
    reencrypt_before_share: bool,

    /// Comma-separated cluster engines to manage
    #[arg(
        long,
        global = true,
        env = "SUPPORTED_ENGINES",
        value_delimiter = ',',
        default_value = "aurora,aurora-mysql,aurora-postgresql,neptune"
    )]
    engines: Vec<String>,

    /// Provider mutations in flight at once
    #[arg(long, global = true, env = "MAX_IN_FLIGHT", default_value_t = DEFAULT_MAX_IN_FLIGHT)]
    max_in_flight: usize,

    /// Classify and report without changing anything
    #[arg(long, global = true, env = "DRY_RUN", action = ArgAction::Set,
          num_args = 0..=1, default_value_t = false, default_missing_value = "true",
          value_parser = BoolishValueParser::new())]
    dry_run: bool,

    /// Log verbosity (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "error")]
    log_level: String,

    #[arg(long, global = true, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Pass report format on stdout
    #[arg(long, global = true, env = "REPORT_FORMAT", value_enum, default_value_t = ReportFormat::Table)]
    format: ReportFormat,
}

impl PassArgs {
    fn into_config(self, mode: Mode) -> Result<ToolConfig, ConfigError> {
        let pattern = self
            .pattern
            .or(self.snapshot_pattern)
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| mode.default_pattern().to_string());

        let source = config::optional_setting_or(self.region, config::REGION_UNSET)
            .or_else(|| config::optional_setting(self.default_region))
            .ok_or(ConfigError::MissingRegion)?;
        let destination = config::optional_setting(self.dest_region).unwrap_or_else(|| source.clone());

        let engines = self
            .engines
            .into_iter()
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect();

        Ok(ToolConfig {
            mode,
            selection: SelectionConfig { pattern, engines },
            schedule: ScheduleConfig {
                retention_days: self.retention_days,
                interval_hours: self.interval,
            },
            regions: RegionConfig {
                source,
                destination,
            },
            sharing: SharingConfig {
                destination_account: config::parse_account(self.dest_account.as_deref())?,
                reencrypt_before_share: self.reencrypt_before_share,
            },
            keys: KmsConfig {
                source_key: config::optional_setting_or(self.source_kms_key, config::VALUE_UNSET),
                destination_key: config::optional_setting_or(self.dest_kms_key, config::VALUE_UNSET),
            },
            creation: CreationConfig {
                name_prefix: config::optional_setting_or(self.name_prefix, config::VALUE_UNSET),
                use_automated_backup: self.use_automated_backup,
                mark_reencrypt: self.mark_reencrypt,
            },
            flags: RuntimeFlags {
                dry_run: self.dry_run,
                max_in_flight: self.max_in_flight,
            },
        })
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&e);
        std::process::exit(1);
    }
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();

    let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");

    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }

    if let Some(hint) = snapshot_tool::aws::find_aws_error(e).and_then(|err| err.suggestion()) {
        let _ = writeln!(stderr, "\n\x1b[2mHint: {hint}\x1b[0m");
    }

    if std::env::var("RUST_BACKTRACE").is_ok() {
        let backtrace = e.backtrace();
        if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            let _ = writeln!(stderr, "\n\x1b[2mBacktrace:\x1b[0m\n{backtrace}");
        }
    }
}

fn init_tracing(log_level: &str, format: LogFormat) {
    let level: tracing::Level = log_level.trim().parse().unwrap_or(tracing::Level::ERROR);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{level},aws_config=warn,aws_sdk_rds=warn,aws_smithy_runtime=warn"
        ))
    });

    match format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.pass.log_level, args.pass.log_format);

    let mode = Mode::from(args.command);
    let format = args.pass.format;
    let config = args.pass.into_config(mode)?;
    config.validate()?;

    let report = handle_pass(&config).await?;
    print_report(&report, format)?;
    report.check()?;
    Ok(())
}

/// Build the region clients and run one pass
async fn handle_pass(config: &ToolConfig) -> Result<PassReport> {
    let contexts = RegionContexts::load(config.region(), config.destination_region()).await;
    let source = &contexts.source;
    let (source_rds, destination_rds) = contexts.clients::<RdsClient>();

    let mut backup_key = None;
    if config.mode == Mode::Share {
        let account = get_current_account_id(source).await?;
        config.check_share_target(&account)?;

        if let (true, Some(key)) = (
            config.sharing.reencrypt_before_share,
            &config.keys.source_key,
        ) {
            let arn = KmsClient::from_context(source).resolve_key_arn(key).await?;
            info!(key_arn = %arn, "Sharing only snapshots under the backup key");
            backup_key = Some(arn);
        }
    }

    let reconciler = Reconciler::new(
        config,
        &source_rds,
        destination_rds.as_ref().unwrap_or(&source_rds),
        Utc::now(),
    )?
    .with_backup_key(backup_key);
    reconciler.run().await
}

fn print_report(report: &PassReport, format: ReportFormat) -> Result<()> {
    match format {
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        ReportFormat::Table => {
            println!("\n=== {} ===\n", report.summary());
            println!("{}", report.to_table());
        }
    }
    Ok(())
}
