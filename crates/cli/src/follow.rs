//! Following a supervised process from the terminal.

use crate::render;
use color_eyre::eyre::bail;
use color_eyre::Result;
use fd_core::supervisor::{Supervisor, SupervisorError};
use fd_protocol::{Event, ProcessRole};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Everything observed while following one process.
pub struct Run {
    pub events: Vec<Event>,
    pub exit_code: Option<i32>,

    /// The process outlived its time limit and was stopped.
    pub timed_out: bool,
}

/// Print events until `role` exits.
///
/// Ctrl-C stops the process instead of abandoning it. With a `limit`, the
/// process is stopped once it has run that long.
pub async fn until_exit(
    supervisor: &Supervisor,
    events: &mut broadcast::Receiver<Event>,
    role: ProcessRole,
    limit: Option<Duration>,
) -> Result<Run> {
    let deadline = limit.map(|limit| Instant::now() + limit);
    let mut collected = Vec::new();
    let mut timed_out = false;
    let mut interrupted = false;

    loop {
        let expiry = async {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            received = events.recv() => match received {
                Ok(event) => {
                    render::event(&event, role);
                    let exit_code = match &event {
                        Event::ProcessExited { role: r, exit_code, .. } if *r == role => Some(*exit_code),
                        _ => None,
                    };
                    collected.push(event);
                    if let Some(exit_code) = exit_code {
                        return Ok(Run {
                            events: collected,
                            exit_code,
                            timed_out,
                        });
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Fell behind the process output; some lines were dropped");
                }
                Err(RecvError::Closed) => bail!("event channel closed before {role} exited"),
            },
            _ = expiry, if !timed_out => {
                timed_out = true;
                warn!(role = %role, "Maximum runtime reached; stopping");
                stop(supervisor, role).await?;
            }
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                warn!(role = %role, "Interrupted; stopping");
                stop(supervisor, role).await?;
            }
        }
    }
}

async fn stop(supervisor: &Supervisor, role: ProcessRole) -> Result<()> {
    match supervisor.stop(role).await {
        // Exited on its own in the meantime; the exit event is on its way.
        Err(SupervisorError::NotRunning(_)) => {
            debug!(role = %role, "Already exited");
            Ok(())
        }
        Err(e) => Err(e.into()),
        Ok(()) => Ok(()),
    }
}
