//! Bounded invocation of OS device tooling.

use crate::devices::error::{DeviceError, DeviceResult};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Run `program` to completion, failing closed after `limit`.
///
/// The child is killed if the deadline passes. A missing executable, a
/// timeout and a non-zero exit all surface as `ToolInvocationFailed`.
pub(crate) async fn run_tool(program: &str, args: &[String], limit: Duration) -> DeviceResult<Output> {
    let resolved = which::which(program).map_err(|e| DeviceError::ToolInvocationFailed {
        tool: program.to_string(),
        reason: format!("not found on PATH: {e}"),
    })?;

    let child = Command::new(resolved)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let output = match timeout(limit, child).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return Err(DeviceError::ToolInvocationFailed {
                tool: program.to_string(),
                reason: e.to_string(),
            })
        }
        Err(_) => {
            return Err(DeviceError::ToolInvocationFailed {
                tool: program.to_string(),
                reason: format!("timed out after {}s", limit.as_secs()),
            })
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DeviceError::ToolInvocationFailed {
            tool: program.to_string(),
            reason: format!("exited with {}: {}", output.status, stderr.trim()),
        });
    }

    Ok(output)
}
