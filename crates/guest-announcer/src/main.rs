//! guest-announcer hook binary
//!
//! Invoked as `guest-announcer <DOMAIN> <ACTION>` by the virtualization host.
//!
//! # NIST 800-53 Rev 5 Control Mappings
//! - AU-3: Content of Audit Records - Structured logging
//! - AU-12: Audit Record Generation - Log every invocation
//! - SI-11: Error Handling - Exit codes reflect failure class

use clap::Parser;
use guest_announcer::{
    execute, interface_index, load_domain, AnnounceError, DryRunGateway, HookPhase,
    NetlinkGateway, Result, DEFAULT_CONFIG_DIR,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Announce a guest domain's addresses on the host
#[derive(Parser, Debug)]
#[command(name = "guest-announcer")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Domain identifier; selects <CONFIG_DIR>/<DOMAIN>.json
    domain: String,

    /// Lifecycle action (pre-start, post-start, pre-stop, post-stop)
    action: String,

    /// Directory holding the per-domain network documents
    #[arg(long, default_value = DEFAULT_CONFIG_DIR)]
    config_dir: PathBuf,

    /// Log filter directive (error, warn, info, debug, trace)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Log what would be applied without touching the kernel
    #[arg(long)]
    dry_run: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(domain = %args.domain, action = %args.action, error = %e, "Hook failed");
            ExitCode::from(e.exit_code())
        }
    }
}

/// Install a stderr subscriber; stdout belongs to the host
fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("guest-announcer: failed to set logger: {}", e);
    }
}

fn run(args: &Args) -> Result<()> {
    let phase: HookPhase = args.action.parse()?;
    let Some(mode) = phase.mode() else {
        info!(domain = %args.domain, phase = %phase, "Nothing to do");
        return Ok(());
    };

    let config = load_domain(&args.config_dir, &args.domain)?;
    info!(
        domain = config.domain_id,
        interface = %config.interface,
        entries = config.entry_count(),
        phase = %phase,
        "Loaded domain configuration"
    );

    let link_index = match interface_index(&config.interface) {
        Ok(index) => index,
        Err(e @ AnnounceError::InterfaceNotFound { .. }) if args.dry_run => {
            warn!(error = %e, "Continuing dry run with link index 0");
            0
        }
        Err(e) => return Err(e),
    };

    let report = if args.dry_run {
        execute(&config, link_index, mode, DryRunGateway::new())?
    } else {
        execute(&config, link_index, mode, NetlinkGateway::new()?)?
    };

    info!(
        applied = report.applied,
        settled = report.settled,
        "Domain {} {} complete",
        config.domain_id,
        phase
    );
    Ok(())
}
