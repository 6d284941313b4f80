//! Build subprocess execution
//!
//! Runs one recipe build step as a child process. The exit code is the
//! only signal trusted; output is passed through in verbose mode and
//! discarded otherwise.

use std::process::Stdio;

use tokio::process::Command;

use crate::core::hook::BuildContext;
use crate::core::recipe::BuildStep;
use crate::error::FailureCause;

/// Run a single build step inside the context's build directory.
///
/// With a timeout configured, a step that overruns is killed and
/// reported as [`FailureCause::Timeout`].
pub async fn run_step(step: &BuildStep, ctx: &BuildContext) -> Result<(), FailureCause> {
    tracing::debug!(
        spec = %ctx.spec,
        run = %step.run,
        args = ?step.args,
        "running build step"
    );

    let mut command = Command::new(&step.run);
    command
        .args(&step.args)
        .current_dir(&ctx.build_dir)
        .envs(ctx.env())
        .kill_on_drop(true);

    if ctx.verbose {
        command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
    } else {
        command.stdout(Stdio::null()).stderr(Stdio::null());
    }

    let mut child = command.spawn().map_err(|e| FailureCause::Io {
        message: format!("failed to spawn '{}': {e}", step.run),
    })?;

    let status = match ctx.timeout {
        None => child.wait().await,
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                child.kill().await.ok();
                return Err(FailureCause::Timeout {
                    limit_secs: limit.as_secs(),
                });
            }
        },
    }
    .map_err(|e| FailureCause::Io {
        message: format!("failed to wait for '{}': {e}", step.run),
    })?;

    if status.success() {
        return Ok(());
    }
    match status.code() {
        Some(code) => Err(FailureCause::Exit { code }),
        None => Err(FailureCause::Terminated),
    }
}
