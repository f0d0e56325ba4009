//! Periodic liveness refresh.
//!
//! A failed heartbeat is logged and the loop carries on. It never
//! re-registers: an endpoint whose heartbeats keep failing drops out of
//! discovery once its TTL lapses.

use std::future::Future;
use std::time::Duration;

use log::{debug, warn};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::client::SignalClient;
use crate::error::{ClientError, ClientResult};

/// Something that can refresh this endpoint's registration.
pub trait HeartbeatSink {
    fn send_heartbeat(&self, client_id: &str) -> impl Future<Output = ClientResult<()>> + Send;
}

impl HeartbeatSink for SignalClient {
    fn send_heartbeat(&self, client_id: &str) -> impl Future<Output = ClientResult<()>> + Send {
        self.heartbeat(client_id)
    }
}

/// Send a heartbeat every `period`, starting one period from now, forever.
pub async fn heartbeat_loop<H>(sink: H, client_id: String, period: Duration)
where
    H: HeartbeatSink,
{
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match sink.send_heartbeat(&client_id).await {
            Ok(()) => debug!("Heartbeat ok for {}", client_id),
            Err(ClientError::NotFound(_)) => warn!(
                "Heartbeat failed: signalling server no longer tracks {}",
                client_id
            ),
            Err(e) => warn!("Heartbeat failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Counts calls; fails every other one.
    #[derive(Clone, Default)]
    struct FlakySink {
        calls: Arc<AtomicUsize>,
    }

    impl HeartbeatSink for FlakySink {
        fn send_heartbeat(&self, client_id: &str) -> impl Future<Output = ClientResult<()>> + Send {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let id = client_id.to_string();
            async move {
                if n % 2 == 0 {
                    Err(ClientError::NotFound(id))
                } else {
                    Ok(())
                }
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_on_interval_and_survives_failures() {
        let sink = FlakySink::default();
        let calls = sink.calls.clone();
        let handle = tokio::spawn(heartbeat_loop(sink, "abc".to_string(), Duration::from_secs(30)));

        // Nothing before the first full interval
        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(90)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(!handle.is_finished());

        handle.abort();
    }
}
