mod models;
mod repo;
mod service;
mod utils;

use crate::models::config::{setup_config, Config};
use crate::models::dry_run_mode::DryRunMode;
use crate::models::secrets::Secrets;
use crate::repo::report_file::write_report;
use crate::service::moodle::MoodleClient;
use crate::service::notify::{ci_run_url, failure_message, ConsoleNotifier, Notifier};
use crate::service::run::{load_baseline, publish, RunContext};
use crate::service::scan::{discover_candidates, probe_candidates, select_updates};
use crate::service::telegram::TelegramNotifier;
use crate::utils::progress::{create_progress_bar, create_spinner};
use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use indicatif::MultiProgress;
use log::{debug, error, info, warn};
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "moodle_scan")]
#[command(
    about = "Checks Moodle courses for new or changed files and sends a Telegram alert",
    long_about = None
)]
struct Cli {
    #[arg(short = 'c', long = "config", env = "MOODLE_SCAN_CONFIG")]
    config_file: Option<String>,

    #[arg(
        short = 'l',
        long = "log-level",
        default_value = "info",
        env = "LOG_LEVEL"
    )]
    log_level: String,

    #[arg(short = 'q', long = "quiet")]
    quiet: bool,

    #[arg(short = 'v', long = "validate-only")]
    validate_only: bool,

    #[arg(short = 'd', long = "dry-run", conflicts_with = "dry_run_full")]
    dry_run: bool,

    #[arg(short = 'f', long = "dry-run-full", conflicts_with = "dry_run")]
    dry_run_full: bool,

    #[arg(short = 'o', long = "once")]
    once: bool,

    #[arg(long = "username", env = "MOODLE_USERNAME", hide_env_values = true)]
    username: Option<String>,

    #[arg(long = "user-id", env = "MOODLE_USER_ID", hide_env_values = true)]
    user_id: Option<String>,

    #[arg(long = "password", env = "MOODLE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[arg(long = "session-cookie", env = "MOODLE_SESSION", hide_env_values = true)]
    session_cookie: Option<String>,

    #[arg(long = "telegram-token", env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    telegram_token: Option<String>,

    #[arg(
        long = "telegram-chat-id",
        env = "TELEGRAM_CHAT_ID",
        allow_hyphen_values = true
    )]
    telegram_chat_id: Option<String>,
}

fn main() -> Result<()> {
    let args = Cli::parse();

    env_logger::Builder::from_default_env()
        .filter_level(parse_log_level(&args.log_level))
        .format_timestamp_secs()
        .init();

    info!("moodle_scan starting...");
    let config = setup_config(args.config_file).context("Failed to load configuration")?;
    debug!("Loaded config: {:?}", &config);

    if args.validate_only {
        info!("Configuration is valid. Exiting (--validate-only mode).");
        return Ok(());
    }

    let dry_run_mode = DryRunMode::from_flags(args.dry_run, args.dry_run_full);
    if dry_run_mode.is_dry_run() {
        info!("Running in {} mode", dry_run_mode.describe());
        info!("Nothing will be sent to Telegram and the state file will not be written");
    }

    let secrets = Secrets::new(
        args.username,
        args.user_id,
        args.password,
        args.session_cookie,
        args.telegram_token,
        args.telegram_chat_id,
    );
    secrets.validate()?;
    if secrets.telegram.is_none() && dry_run_mode.should_notify() {
        warn!("TELEGRAM_BOT_TOKEN / TELEGRAM_CHAT_ID not set; alerts will only be logged");
    }

    rayon::ThreadPoolBuilder::new()
        .num_threads(config.max_threads)
        .build_global()
        .context("Failed to build thread pool")?;

    let run_once = args.once || config.schedule.is_none();

    if run_once {
        run_and_report(&config, &secrets, dry_run_mode, args.quiet)
    } else {
        run_scheduled(&config, &secrets, dry_run_mode, args.quiet)
    }
}

fn parse_log_level(level: &str) -> log::LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        "off" => log::LevelFilter::Off,
        _ => log::LevelFilter::Info,
    }
}

/// Runs one scan; on failure also tries to deliver a failure alert before returning the error.
fn run_and_report(
    config: &Config,
    secrets: &Secrets,
    dry_run_mode: DryRunMode,
    quiet: bool,
) -> Result<()> {
    let result = run_scan(config, secrets, dry_run_mode, quiet);
    if let Err(e) = &result {
        error!("Scan failed: {:#}", e);
        send_failure_alert(config, secrets, dry_run_mode, e);
    }
    result
}

fn run_scan(
    config: &Config,
    secrets: &Secrets,
    dry_run_mode: DryRunMode,
    quiet: bool,
) -> Result<()> {
    let prefix = dry_run_mode.progress_prefix();
    let tz = config.tz()?;
    let run_id = Uuid::new_v4();
    let run_start = Utc::now().with_timezone(&tz);
    info!("Scan run {} started at {}", run_id, run_start.to_rfc3339());

    let state_path = Path::new(&config.state_file);
    let baseline = load_baseline(state_path, &tz, run_start, config.fallback_lookback_hours);

    let multi_progress = if !quiet {
        Some(MultiProgress::new())
    } else {
        None
    };

    // Phase 1: login and course list
    let login_progress = multi_progress
        .as_ref()
        .map(|mp| mp.add(create_spinner(&format!("{}[1/3] Logging in to Moodle...", prefix))));

    let client = MoodleClient::new(config, secrets)?;
    let courses = client.courses().context("Failed to list Moodle courses")?;
    info!("Found {} courses", courses.len());

    if let Some(progress) = login_progress {
        progress.finish_with_message(format!("{}[1/3] Found {} courses", prefix, courses.len()));
    }

    // Phase 2: discovery
    let course_progress = multi_progress.as_ref().map(|mp| {
        mp.add(create_progress_bar(
            courses.len() as u64,
            &format!("{}[2/3] Scanning courses", prefix),
            "courses",
        ))
    });
    let candidates = discover_candidates(&client, &courses, course_progress.as_ref());
    if let Some(progress) = course_progress {
        progress.finish_with_message(format!("{} candidate files", candidates.len()));
    }

    if !dry_run_mode.should_probe() {
        for candidate in &candidates {
            println!(
                "{}\t | {}\t | {}",
                candidate.course_name_display, candidate.file_name, candidate.link
            );
        }
        info!(
            "DRY RUN completed - {} candidate files listed, nothing probed or sent",
            candidates.len()
        );
        return Ok(());
    }

    // Phase 3: Last-Modified probes
    let probe_progress = multi_progress.as_ref().map(|mp| {
        mp.add(create_progress_bar(
            candidates.len() as u64,
            &format!("{}[3/3] Checking files", prefix),
            "files",
        ))
    });
    let probed = probe_candidates(&client, candidates, probe_progress.as_ref());
    if let Some(progress) = probe_progress {
        progress.finish();
    }

    let outcome = select_updates(
        probed,
        &baseline.seen_files,
        baseline.cutoff.fixed_offset(),
        &tz,
    );

    if let Some(report_file) = &config.report_file {
        write_report(Path::new(report_file), &outcome.updates)
            .context("Failed to write report file")?;
    }

    let telegram;
    let notifier: Option<&dyn Notifier> = if !dry_run_mode.should_notify() {
        Some(&ConsoleNotifier)
    } else if let Some(target) = &secrets.telegram {
        telegram = TelegramNotifier::new(
            &config.telegram_api_base,
            target,
            Duration::from_secs(config.request_timeout_secs),
        )?;
        Some(&telegram)
    } else {
        None
    };

    let context = RunContext {
        state_path,
        run_start,
        run_id,
        mode: dry_run_mode,
        max_message_chars: config.max_message_chars,
    };
    publish(&context, &baseline.cutoff, outcome, notifier)
        .context("Failed to publish scan results")?;

    Ok(())
}

fn send_failure_alert(
    config: &Config,
    secrets: &Secrets,
    dry_run_mode: DryRunMode,
    error: &anyhow::Error,
) {
    if !dry_run_mode.should_notify() {
        return;
    }
    let Some(target) = &secrets.telegram else {
        warn!("Telegram secrets missing; failure alert not sent");
        return;
    };

    let message = failure_message(
        &format!("{:?}", error),
        ci_run_url().as_deref(),
        config.max_message_chars,
    );
    let sent = TelegramNotifier::new(
        &config.telegram_api_base,
        target,
        Duration::from_secs(config.request_timeout_secs),
    )
    .and_then(|notifier| notifier.send(&message));

    match sent {
        Ok(()) => info!("Failure alert sent"),
        Err(e) => error!("Failed to send failure alert: {}", e),
    }
}

fn run_scheduled(
    config: &Config,
    secrets: &Secrets,
    dry_run_mode: DryRunMode,
    quiet: bool,
) -> Result<()> {
    use cron::Schedule;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    let expression = config
        .schedule
        .as_deref()
        .context("Scheduled mode needs a schedule in the config")?;
    let schedule = Schedule::from_str(expression).context("Invalid cron expression")?;
    let tz = config.tz()?;

    info!("Starting scheduled mode with schedule: {}", expression);

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        info!("Received shutdown signal, stopping scheduler...");
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    if config.run_on_startup {
        info!("Running initial scan on startup...");
        if let Err(e) = run_and_report(config, secrets, dry_run_mode, quiet) {
            warn!("Initial scan failed: {:#}", e);
        }
    }

    while running.load(Ordering::SeqCst) {
        let Some(next) = schedule.upcoming(tz).next() else {
            warn!("No upcoming scheduled times found");
            break;
        };
        let next_utc = next.with_timezone(&Utc);

        info!(
            "Next scan scheduled for: {}",
            next.format("%Y-%m-%d %H:%M:%S %Z")
        );

        // Wake up every second so Ctrl+C is honoured promptly
        while running.load(Ordering::SeqCst) {
            let remaining = (next_utc - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            if remaining.is_zero() {
                break;
            }
            std::thread::sleep(remaining.min(Duration::from_secs(1)));
        }

        if running.load(Ordering::SeqCst) {
            info!("Running scheduled scan...");
            if let Err(e) = run_and_report(config, secrets, dry_run_mode, quiet) {
                warn!("Scheduled scan failed: {:#}", e);
            }
        }
    }

    info!("Scheduler stopped");
    Ok(())
}
