use std::time::Duration;

use savesync_core::models::ResolutionChoice;
use savesync_core::sync::{cancel_pair, FixedPrompt};
use savesync_core::{ConflictResolution, SyncOrchestrator, SyncOutcome, SyncReport, SyncRequest};

use crate::commands::common::{describe_outcome, format_conflict_lines, Context};
use crate::error::CliError;
use crate::prompt::{CliPrompt, TerminalPrompt};

/// Flags of `savesync sync`
#[derive(Debug, Clone, Default)]
pub struct SyncArgs {
    pub choose: Option<ConflictResolution>,
    pub remember: bool,
    pub cloud_timeout: Option<u64>,
    pub resolution_timeout: Option<u64>,
    pub json: bool,
}

pub fn build_prompt(args: &SyncArgs) -> CliPrompt {
    match args.choose {
        Some(resolution) => CliPrompt::Fixed(FixedPrompt::new(Some(ResolutionChoice {
            resolution,
            remember: args.remember,
        }))),
        None => CliPrompt::Terminal(TerminalPrompt::new(args.remember)),
    }
}

pub fn build_request(context: &Context, args: &SyncArgs) -> Result<SyncRequest, CliError> {
    let mut request = SyncRequest::from_config(&context.config);
    if let Some(seconds) = args.cloud_timeout {
        request = request.with_cloud_timeout(Some(positive_seconds("--cloud-timeout", seconds)?));
    }
    if let Some(seconds) = args.resolution_timeout {
        request = request.with_resolution_timeout(Some(positive_seconds(
            "--resolution-timeout",
            seconds,
        )?));
    }
    Ok(request)
}

fn positive_seconds(flag: &str, seconds: u64) -> Result<Duration, CliError> {
    if seconds == 0 {
        return Err(CliError::InvalidArgument(format!(
            "{flag} must be at least one second"
        )));
    }
    Ok(Duration::from_secs(seconds))
}

pub async fn run_sync(context: &Context, args: &SyncArgs) -> Result<(), CliError> {
    let (cancel, signal) = cancel_pair();
    let request = build_request(context, args)?.with_cancel(signal);

    // Ctrl-C cancels the cycle; an open conflict is deferred
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted; cancelling sync");
            cancel.cancel();
        }
    });

    let report = sync_once(context, args, &request).await;
    interrupt.abort();
    let report = report?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.recovered_from_backup {
        println!("Local save was unreadable and has been restored from a backup.");
    }
    println!("{}", describe_outcome(&report.outcome));
    if let SyncOutcome::Deferred { conflict } | SyncOutcome::ResolutionTimedOut { conflict } =
        &report.outcome
    {
        for line in format_conflict_lines(&conflict.local, &conflict.cloud) {
            println!("{line}");
        }
    }
    Ok(())
}

/// One cycle against the configured stores.
pub async fn sync_once(
    context: &Context,
    args: &SyncArgs,
    request: &SyncRequest,
) -> Result<SyncReport, CliError> {
    let orchestrator = SyncOrchestrator::new(
        context.open_local()?,
        context.open_cloud()?,
        context.open_preferences(),
        build_prompt(args),
    );
    Ok(orchestrator.sync(request).await?)
}
