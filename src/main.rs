#![warn(clippy::all, rust_2018_idioms)]

use anyhow::{Context, Result};
use awsscan::app::audit_log::{CsvScanLog, ScanLog};
use awsscan::app::cloudtrail::{trail_table, CloudTrailChecker, SdkTrailApi};
use awsscan::app::config::parse_account_list;
use awsscan::app::scanner::completion_message;
use awsscan::app::{ScanConfig, ScanService, ScanSettings};
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::prelude::*;

/// Inventory billable AWS resources in one account or across an organization
#[derive(Debug, Parser)]
#[command(
    name = "awsscan",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_COMMIT"), ")")
)]
struct Cli {
    /// Role assumed at startup to obtain the initial credentials
    #[arg(long, alias = "AWS_ROLE_ARN", value_name = "ARN")]
    role_arn: Option<String>,

    /// Scan only this account instead of the whole organization
    #[arg(long, alias = "AWS_ACCOUNT_ID", value_name = "ID")]
    account_id: Option<String>,

    /// Scan only this region instead of every enabled region
    #[arg(long, alias = "AWS_REGION")]
    region: Option<String>,

    /// Role assumed in each scanned account [default: resource-discovery-role]
    #[arg(long, alias = "AWS_ROLE_NAME", value_name = "NAME")]
    role_name: Option<String>,

    /// Print CloudTrail trail, bucket and topic ARNs after the scan
    #[arg(long, alias = "AWS_TRAIL")]
    trail: bool,

    /// Comma separated account ids to skip
    #[arg(long, alias = "EXCLUDE", value_name = "IDS")]
    exclude: Option<String>,

    /// Audit log path [default: aws-resource-discovery.csv]
    #[arg(long, value_name = "CSV")]
    output: Option<PathBuf>,

    /// Seconds each resource counter may run [default: 300]
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    counter_timeout: Option<u64>,

    /// Settings file [default: <config dir>/awsscan/config.toml]
    #[arg(long, value_name = "TOML")]
    config: Option<PathBuf>,
}

impl Cli {
    fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            role_arn: self.role_arn.clone(),
            account_id: self.account_id.clone(),
            region: self.region.clone(),
            role_name: self.role_name.clone(),
            trail: self.trail,
            exclude_accounts: self
                .exclude
                .as_deref()
                .map(parse_account_list)
                .unwrap_or_default(),
        }
    }

    /// Settings file values overridden by the flags that were given
    fn apply_overrides(&self, mut settings: ScanSettings) -> ScanSettings {
        if let Some(output) = &self.output {
            settings.output = output.clone();
        }
        if let Some(secs) = self.counter_timeout {
            settings.counter_timeout_secs = secs;
        }
        settings
    }
}

fn log_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "", "awsscan")
        .map(|proj_dirs| proj_dirs.data_dir().join("logs"))
}

fn init_logging() -> Result<()> {
    // To enable: TOKIO_CONSOLE=1 RUSTFLAGS="--cfg tokio_unstable" cargo run
    let use_tokio_console = std::env::var("TOKIO_CONSOLE")
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(false);

    if use_tokio_console {
        console_subscriber::init();
        eprintln!("tokio-console profiling enabled - connect with: tokio-console");
        eprintln!("NOTE: File logging disabled when using tokio-console");
        return Ok(());
    }

    let Some(log_dir) = log_dir() else {
        return Ok(());
    };
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let log_path = log_dir.join("awsscan.log");

    let file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    // Owner read/write only
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = file.metadata() {
            let mut perms = metadata.permissions();
            perms.set_mode(0o600);
            if let Err(e) = std::fs::set_permissions(&log_path, perms) {
                eprintln!("[SECURITY] Failed to set log file permissions: {}", e);
            }
        }
    }

    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.is_empty() => {
            tracing_subscriber::EnvFilter::builder().parse(directives)
        }
        _ => tracing_subscriber::EnvFilter::builder().parse(
            "awsscan=info,aws_config=warn,aws_sigv4=warn,aws_smithy_runtime=warn,aws_smithy_runtime_api=warn,hyper=warn,aws_smithy_http=warn,aws_endpoint=warn",
        ),
    }
    .context("Failed to parse log filter")?;

    let subscriber = tracing_subscriber::registry().with(filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false),
    );
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    tracing::info!("Logging initialized to: {:?}", log_path);
    Ok(())
}

fn setup_panic_handler() {
    // Installed before logging so early crashes are captured too
    std::panic::set_hook(Box::new(|panic_info| {
        let crash_msg = format!(
            "awsscan crashed!\n\
             Panic occurred at: {}\n\
             Details: {}\n\
             Backtrace:\n{:?}\n",
            panic_info
                .location()
                .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
                .unwrap_or_else(|| "unknown location".to_string()),
            panic_info
                .payload()
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| panic_info.payload().downcast_ref::<String>().map(|s| s.as_str()))
                .unwrap_or("unknown panic"),
            std::backtrace::Backtrace::force_capture()
        );

        eprintln!("\n{}", crash_msg);

        if let Some(log_dir) = log_dir() {
            let _ = std::fs::create_dir_all(&log_dir);
            let crash_log_path = log_dir.join("crash.log");

            if let Ok(mut file) = std::fs::OpenOptions::new()
                .append(true)
                .create(true)
                .open(&crash_log_path)
            {
                use std::io::Write;
                let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
                let _ = writeln!(file, "\n=== CRASH at {} ===\n{}", timestamp, crash_msg);
                eprintln!("Crash log written to: {:?}", crash_log_path);
            }
        }
    }));
}

async fn run(cli: Cli) -> Result<()> {
    let settings = cli.apply_overrides(ScanSettings::load(cli.config.as_deref())?);
    let config = cli.scan_config().with_settings(&settings);
    tracing::info!("Starting scan: {:?}", config);

    let log = Arc::new(CsvScanLog::create(&settings.output)?);
    let service = ScanService::from_sdk(log.clone(), &settings);

    let started = Instant::now();
    if config.is_single_account() {
        println!("{}", "Single account scan selected.".bold());
    } else {
        println!("{}", "Organization scan selected.".bold());
    }

    let result = service
        .scan(&config)
        .await
        .context("Failed to perform scan")?;

    println!("{}", completion_message(started.elapsed()).as_str().green());
    println!("Audit log written to {}", log.path().display());

    if config.trail {
        let trail_api = SdkTrailApi::new(&result.session.management_config());
        let account = config.account_id.as_deref().unwrap_or("caller");
        let trails = CloudTrailChecker::new(&trail_api)
            .check(account)
            .await
            .context("CloudTrail check failed")?;
        println!();
        println!("{}", trail_table(&trails));
    }

    log.close()?;
    Ok(())
}

fn main() -> Result<()> {
    setup_panic_handler();

    if let Err(e) = init_logging() {
        eprintln!("Logging disabled: {:#}", e);
    }

    let cli = Cli::parse();
    tracing::info!("awsscan starting, args: {:?}", cli);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    let outcome = runtime.block_on(run(cli));
    if let Err(e) = &outcome {
        tracing::error!("Scan aborted: {:#}", e);
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_timeout_must_be_positive() {
        assert!(Cli::try_parse_from(["awsscan", "--counter-timeout", "0"]).is_err());

        let cli = Cli::try_parse_from(["awsscan", "--counter-timeout", "30"]).unwrap();
        let settings = cli.apply_overrides(ScanSettings::default());
        assert_eq!(settings.counter_timeout_secs, 30);
    }

    #[test]
    fn test_legacy_flag_aliases() {
        let cli = Cli::try_parse_from([
            "awsscan",
            "--AWS_ACCOUNT_ID",
            "111111111111",
            "--EXCLUDE",
            "222222222222, 333333333333",
        ])
        .unwrap();
        let config = cli.scan_config();
        assert!(config.is_single_account());
        assert_eq!(config.exclude_accounts, vec!["222222222222", "333333333333"]);
    }
}
