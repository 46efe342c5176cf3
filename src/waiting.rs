//! Bounded polling primitive
//!
//! Every "wait for condition, else timeout" in the workflow goes through
//! `poll_until`: probe the page on a fixed interval until the predicate
//! holds or the ceiling elapses.

use crate::error::WorkflowError;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Probe interval between condition checks.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Poll `probe` until it returns `true` or `ceiling` elapses.
///
/// A probe error propagates immediately; the ceiling converts into
/// `WorkflowError::WaitTimeout` tagged with `what`.
pub async fn poll_until<F, Fut>(
    what: &str,
    ceiling: Duration,
    mut probe: F,
) -> Result<(), WorkflowError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, WorkflowError>>,
{
    let started = Instant::now();

    loop {
        if probe().await? {
            return Ok(());
        }

        if started.elapsed() >= ceiling {
            return Err(WorkflowError::timeout(
                what,
                started.elapsed().as_millis() as u64,
            ));
        }

        sleep(POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn resolves_once_predicate_holds() {
        let calls = Arc::new(AtomicU32::new(0));
        let probe_calls = calls.clone();

        let result = poll_until("counter", Duration::from_secs(5), move || {
            let calls = probe_calls.clone();
            async move { Ok(calls.fetch_add(1, Ordering::SeqCst) >= 3) }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn converts_ceiling_into_wait_timeout() {
        let result = poll_until("never", Duration::from_secs(1), || async { Ok(false) }).await;

        match result {
            Err(WorkflowError::WaitTimeout { what, .. }) => assert_eq!(what, "never"),
            other => panic!("expected WaitTimeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn probe_errors_propagate_immediately() {
        let result = poll_until("broken", Duration::from_secs(30), || async {
            Err(WorkflowError::Browser("connection closed".into()))
        })
        .await;

        assert!(matches!(result, Err(WorkflowError::Browser(_))));
    }
}
