//! Event collection and assertion helpers.

use fd_protocol::{Event, HistoryKind, ProcessRole};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};

/// Upper bound on how long any test waits for a child process.
const EXIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Collect events until `role` reports `ProcessExited`, inclusive.
///
/// Panics if the exit is not observed within the timeout.
#[allow(dead_code)]
pub async fn collect_until_exit(rx: &mut broadcast::Receiver<Event>, role: ProcessRole) -> Vec<Event> {
    let mut events = Vec::new();
    let collected = tokio::time::timeout(EXIT_TIMEOUT, async {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let done = matches!(&event, Event::ProcessExited { role: r, .. } if *r == role);
                    events.push(event);
                    if done {
                        break;
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    })
    .await;
    assert!(collected.is_ok(), "Timed out waiting for {role} to exit");
    events
}

/// The `ProcessExited` event for `role`, if any.
#[allow(dead_code)]
pub fn exit_of(events: &[Event], role: ProcessRole) -> Option<(Option<i32>, bool)> {
    events.iter().find_map(|e| match e {
        Event::ProcessExited {
            role: r,
            exit_code,
            stopped,
        } if *r == role => Some((*exit_code, *stopped)),
        _ => None,
    })
}

/// Output broadcast for `role`, joined in order.
#[allow(dead_code)]
pub fn output_text(events: &[Event], role: ProcessRole) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            Event::ProcessOutput { role: r, text } if *r == role => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

/// Whether a history entry of `kind` was broadcast.
#[allow(dead_code)]
pub fn has_history(events: &[Event], kind: HistoryKind) -> bool {
    events
        .iter()
        .any(|e| matches!(e, Event::History(entry) if entry.kind == kind))
}
