//! Polling readiness waiter for newly provisioned sessions.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::debug;

use crate::error_handling::ProvisionError;

/// Path probed on the workload's HTTP surface.
const HEALTH_PATH: &str = "/v1/health";

/// Per-request timeout for a single probe.
const PROBE_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Blocks until an endpoint answers its health check, or the deadline
/// passes. Implemented as a trait so lifecycle tests can substitute an
/// instant or never-ready probe.
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    async fn wait_until_ready(
        &self,
        address: &str,
        timeout: Duration,
    ) -> Result<(), ProvisionError>;
}

/// HTTP readiness waiter. Polls `GET http://<address>/v1/health` at a
/// fixed interval; any 2xx answer counts as ready.
pub struct ReadinessWaiter {
    client: reqwest::Client,
    poll_interval: Duration,
}

impl ReadinessWaiter {
    pub fn new(poll_interval: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(PROBE_REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        ReadinessWaiter {
            client,
            poll_interval,
        }
    }
}

#[async_trait]
impl ReadinessProbe for ReadinessWaiter {
    async fn wait_until_ready(
        &self,
        address: &str,
        timeout: Duration,
    ) -> Result<(), ProvisionError> {
        let url = format!("http://{}{}", address, HEALTH_PATH);
        let deadline = Instant::now() + timeout;
        let mut last_error = "no probe attempted".to_string();

        loop {
            if Instant::now() >= deadline {
                debug!("Readiness deadline passed for {}: {}", address, last_error);
                return Err(ProvisionError::ReadinessTimeout(last_error));
            }

            match self.client.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!("Endpoint {} is ready", address);
                    return Ok(());
                }
                Ok(response) => {
                    last_error = format!("unexpected HTTP status {}", response.status());
                }
                Err(e) => {
                    last_error = e.to_string();
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    async fn serve_once(status_line: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let response = format!("{}\r\ncontent-length: 0\r\n\r\n", status_line);
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        address
    }

    #[tokio::test]
    async fn resolves_when_health_answers_2xx() {
        let address = serve_once("HTTP/1.1 200 OK").await;
        let waiter = ReadinessWaiter::new(Duration::from_millis(50));
        waiter
            .wait_until_ready(&address, Duration::from_secs(5))
            .await
            .expect("must become ready");
    }

    #[tokio::test]
    async fn times_out_and_reports_the_last_failure() {
        let address = serve_once("HTTP/1.1 503 Service Unavailable").await;
        let waiter = ReadinessWaiter::new(Duration::from_millis(20));
        let err = waiter
            .wait_until_ready(&address, Duration::from_millis(150))
            .await
            .expect_err("must time out");
        match err {
            ProvisionError::ReadinessTimeout(reason) => {
                assert!(reason.contains("503"), "reason was: {}", reason)
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn times_out_against_an_unreachable_address() {
        let waiter = ReadinessWaiter::new(Duration::from_millis(20));
        let err = waiter
            .wait_until_ready("127.0.0.1:1", Duration::from_millis(120))
            .await
            .expect_err("must time out");
        assert!(matches!(err, ProvisionError::ReadinessTimeout(_)));
    }
}
