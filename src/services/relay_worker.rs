//! Relay worker - forwards admitted trips to the backend off the hot path
//!
//! The controller enqueues one [`RelayRequest`] per admitted trip with a
//! non-blocking `try_send`; the worker performs the network call. When the
//! queue is full the newest request is dropped. Failures are logged and
//! counted, never retried, and never reach the occupancy state.

use crate::domain::types::{BackendLevelId, Direction};
use crate::infra::metrics::Metrics;
use crate::io::backend::{EventRelay, RelayError};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{error, info, warn};

/// One admitted trip to forward
#[derive(Debug, Clone)]
pub struct RelayRequest {
    pub level_id: BackendLevelId,
    pub direction: Direction,
    /// When the request was enqueued (for queue delay measurement)
    pub enqueued_at: Instant,
}

/// Producer handle held by the controller
#[derive(Clone)]
pub struct RelaySender {
    tx: mpsc::Sender<RelayRequest>,
}

impl RelaySender {
    pub fn new(tx: mpsc::Sender<RelayRequest>) -> Self {
        Self { tx }
    }

    /// Enqueue without blocking. Full queue drops this (newest) request.
    pub fn submit(&self, level_id: BackendLevelId, direction: Direction) -> Result<(), RelayError> {
        let request = RelayRequest { level_id, direction, enqueued_at: Instant::now() };
        self.tx.try_send(request).map_err(|e| match e {
            TrySendError::Full(_) => RelayError::QueueFull,
            TrySendError::Closed(_) => RelayError::QueueClosed,
        })
    }
}

/// Worker that drains the relay queue
pub struct RelayWorker {
    relay: Arc<dyn EventRelay>,
    rx: mpsc::Receiver<RelayRequest>,
    metrics: Arc<Metrics>,
}

impl RelayWorker {
    pub fn new(
        relay: Arc<dyn EventRelay>,
        rx: mpsc::Receiver<RelayRequest>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { relay, rx, metrics }
    }

    /// Run until every sender is dropped
    pub async fn run(mut self) {
        info!("relay_worker_started");

        while let Some(request) = self.rx.recv().await {
            self.process(request).await;
        }

        info!("relay_worker_stopped");
    }

    async fn process(&self, request: RelayRequest) {
        let queue_delay_ms = request.enqueued_at.elapsed().as_millis() as u64;
        let send_start = Instant::now();

        match self.relay.relay(request.level_id, request.direction).await {
            Ok(response) => {
                let latency_ms = send_start.elapsed().as_millis() as u64;
                self.metrics.record_relay_sent(latency_ms);
                info!(
                    level_id = %request.level_id,
                    sensor_type = %request.direction.as_str(),
                    queue_delay_ms = %queue_delay_ms,
                    latency_ms = %latency_ms,
                    response = %response,
                    "relay_ok"
                );
            }
            Err(e) => {
                self.metrics.record_relay_failed();
                error!(
                    level_id = %request.level_id,
                    sensor_type = %request.direction.as_str(),
                    queue_delay_ms = %queue_delay_ms,
                    error = %e,
                    "relay_failed"
                );
            }
        }

        if queue_delay_ms > 1000 {
            warn!(queue_delay_ms = %queue_delay_ms, "relay_queue_delay_high");
        }
    }
}

/// Create a relay queue and its worker
///
/// Returns the sender (for the controller) and the worker (to be spawned)
pub fn create_relay_worker(
    relay: Arc<dyn EventRelay>,
    metrics: Arc<Metrics>,
    queue_size: usize,
) -> (RelaySender, RelayWorker) {
    let (tx, rx) = mpsc::channel(queue_size);
    (RelaySender::new(tx), RelayWorker::new(relay, rx, metrics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::backend::RelayResponse;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Records calls; fails every call when `fail` is set
    struct ScriptedRelay {
        calls: Mutex<Vec<(BackendLevelId, Direction)>>,
        fail: bool,
    }

    #[async_trait]
    impl EventRelay for ScriptedRelay {
        async fn relay(
            &self,
            level_id: BackendLevelId,
            direction: Direction,
        ) -> Result<RelayResponse, RelayError> {
            self.calls.lock().push((level_id, direction));
            if self.fail {
                Err(RelayError::Status { status: 503, body: "down".into() })
            } else {
                Ok(RelayResponse(serde_json::json!({"ok": true})))
            }
        }
    }

    fn scripted(fail: bool) -> Arc<ScriptedRelay> {
        Arc::new(ScriptedRelay { calls: Mutex::new(Vec::new()), fail })
    }

    #[tokio::test]
    async fn test_worker_forwards_in_order() {
        let relay = scripted(false);
        let metrics = Arc::new(Metrics::new());
        let (sender, worker) = create_relay_worker(relay.clone(), metrics.clone(), 8);

        sender.submit(BackendLevelId(101), Direction::Entry).unwrap();
        sender.submit(BackendLevelId(102), Direction::Exit).unwrap();
        drop(sender);
        worker.run().await;

        assert_eq!(
            *relay.calls.lock(),
            vec![(BackendLevelId(101), Direction::Entry), (BackendLevelId(102), Direction::Exit)]
        );
        assert_eq!(metrics.relays_sent(), 2);
        assert_eq!(metrics.relays_failed(), 0);
    }

    #[tokio::test]
    async fn test_worker_swallows_failures() {
        let relay = scripted(true);
        let metrics = Arc::new(Metrics::new());
        let (sender, worker) = create_relay_worker(relay.clone(), metrics.clone(), 8);

        sender.submit(BackendLevelId(101), Direction::Entry).unwrap();
        sender.submit(BackendLevelId(101), Direction::Exit).unwrap();
        drop(sender);
        worker.run().await;

        // Each request attempted exactly once
        assert_eq!(relay.calls.lock().len(), 2);
        assert_eq!(metrics.relays_failed(), 2);
        assert_eq!(metrics.relays_sent(), 0);
    }

    #[test]
    fn test_full_queue_drops_newest() {
        let (tx, mut rx) = mpsc::channel(1);
        let sender = RelaySender::new(tx);
        sender.submit(BackendLevelId(101), Direction::Entry).unwrap();
        let err = sender.submit(BackendLevelId(102), Direction::Exit).unwrap_err();
        assert!(matches!(err, RelayError::QueueFull));

        let kept = rx.try_recv().unwrap();
        assert_eq!(kept.level_id, BackendLevelId(101));
    }

    #[test]
    fn test_closed_queue_reported() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = RelaySender::new(tx);
        let err = sender.submit(BackendLevelId(101), Direction::Entry).unwrap_err();
        assert!(matches!(err, RelayError::QueueClosed));
    }

    /// Log sink for asserting which lines a relay emits
    #[derive(Clone, Default)]
    struct LogCapture(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_successful_backend_relay_logs_once() {
        use crate::io::backend::BackendClient;
        use std::time::Duration;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let body = r#"{"ok":true}"#;
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });

        let capture = LogCapture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let client =
            BackendClient::new(&format!("http://{addr}/"), Duration::from_secs(2)).unwrap();
        let metrics = Arc::new(Metrics::new());
        let (sender, worker) = create_relay_worker(Arc::new(client), metrics.clone(), 8);
        sender.submit(BackendLevelId(101), Direction::Entry).unwrap();
        drop(sender);
        worker.run().await;

        assert_eq!(metrics.relays_sent(), 1);
        let logs = String::from_utf8(capture.0.lock().clone()).unwrap();
        let relay_lines: Vec<&str> = logs.lines().filter(|l| l.contains("level_id=101")).collect();
        assert_eq!(relay_lines.len(), 1, "{logs}");
        assert!(relay_lines[0].contains("relay_ok"));
    }
}
