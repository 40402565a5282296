//! Poll an uploaded file until remote processing finishes.

use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use ontask_gemini::{InferenceClient, InferenceError, RemoteFile, RemoteFileState};

use crate::clock::Clock;

#[derive(Debug, Error)]
pub enum PollError {
    #[error("Remote processing still running after {0:?}")]
    TimedOut(Duration),

    #[error("State check failed: {0}")]
    Client(#[from] InferenceError),
}

/// Poll `file` every `interval` until it leaves `Processing`.
///
/// The state is checked once before the first sleep. Returns the terminal
/// state, or [`PollError::TimedOut`] once `timeout` has been waited.
pub async fn poll_until_terminal(
    client: &dyn InferenceClient,
    file: &RemoteFile,
    clock: &dyn Clock,
    interval: Duration,
    timeout: Duration,
) -> Result<RemoteFileState, PollError> {
    let mut waited = Duration::ZERO;

    loop {
        let state = client.get_state(file).await?;
        if state.is_terminal() {
            debug!(name = %file.name, ?state, ?waited, "Remote processing finished");
            return Ok(state);
        }

        if waited >= timeout {
            return Err(PollError::TimedOut(waited));
        }

        clock.sleep(interval).await;
        waited += interval;
    }
}
