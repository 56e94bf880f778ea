//! SIGUSR1 acknowledges the alerts like focus coming back to the terminal.
//! SIGINT/SIGTERM start a graceful shutdown; a SIGINT during it aborts.

use futures::future;
use futures::stream::{Stream, StreamExt as _};
use signal_hook::consts::{SIGINT, SIGTERM, SIGUSR1};

use crate::poller::PollerControl;

pub const HANDLED: [i32; 3] = [SIGINT, SIGTERM, SIGUSR1];

/// Returns once a shutdown signal arrives.
pub async fn wait_for_shutdown<S>(signals: &mut S, poller: &(dyn PollerControl + Sync))
where
    S: Stream<Item = i32> + Unpin,
{
    while let Some(signal) = signals.next().await {
        if signal == SIGUSR1 {
            poller.focus();
        } else {
            log::info!("Shutting down...");
            return;
        }
    }

    future::pending::<()>().await;
}

/// Fails on the next SIGINT, never resolves otherwise.
pub async fn abort_on_interrupt<S>(signals: &mut S) -> anyhow::Result<()>
where
    S: Stream<Item = i32> + Unpin,
{
    while let Some(signal) = signals.next().await {
        if signal == SIGINT {
            anyhow::bail!("Didn't have time to gracefully disconnect and cleanup");
        }
    }

    future::pending().await
}

#[cfg(test)]
mod tests {
    use core::sync::atomic::{AtomicU32, Ordering};
    use core::time::Duration;

    use futures::stream;
    use tokio::time;

    use super::*;

    #[derive(Default)]
    struct Focus(AtomicU32);

    impl PollerControl for Focus {
        fn check_now(&self) {}
        fn play(&self) {}
        fn unlock(&self) {}

        fn focus(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_usr1_focuses_until_terminated() {
        let focus = Focus::default();
        let mut signals = stream::iter([SIGUSR1, SIGUSR1, SIGTERM, SIGINT]);

        wait_for_shutdown(&mut signals, &focus).await;
        assert_eq!(focus.0.load(Ordering::SeqCst), 2);

        // The signal after the shutdown one is left for the teardown phase.
        assert_eq!(signals.next().await, Some(SIGINT));
    }

    #[tokio::test]
    async fn test_second_interrupt_aborts() {
        let focus = Focus::default();
        let mut signals = stream::iter([SIGINT, SIGUSR1, SIGTERM, SIGINT]);

        wait_for_shutdown(&mut signals, &focus).await;
        let err = abort_on_interrupt(&mut signals).await.unwrap_err();
        assert!(err.to_string().contains("gracefully"));
        assert_eq!(focus.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_waits_without_interrupt() {
        let mut signals = stream::iter([SIGTERM, SIGUSR1]);

        let pending = time::timeout(Duration::from_secs(60), abort_on_interrupt(&mut signals));
        assert!(pending.await.is_err());
    }
}
