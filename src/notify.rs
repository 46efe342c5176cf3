//! Outcome notifier
//!
//! Relays the final success/failure signal to PushPlus. Without a configured
//! token there is nothing to do; the process exit status already carries the
//! outcome.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

const PUSHPLUS_ENDPOINT: &str = "https://www.pushplus.plus/send/";
const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

const SUCCESS_NOTICE: &str = "八点打卡成功";
const FAILURE_NOTICE: &str = "八点打卡失败";

/// Pushes the run outcome to PushPlus when a token is configured.
pub struct Notifier {
    token: Option<String>,
    endpoint: String,
}

impl Notifier {
    pub fn new(token: Option<String>) -> Self {
        Self::with_endpoint(token, PUSHPLUS_ENDPOINT)
    }

    /// Endpoint override, for tests.
    pub fn with_endpoint(token: Option<String>, endpoint: impl Into<String>) -> Self {
        Self {
            token,
            endpoint: endpoint.into(),
        }
    }

    /// Deliver the outcome. Delivery is judged solely by receiving any
    /// response within the timeout; a non-2xx status is logged, not fatal.
    pub async fn notify(&self, failed: bool) -> Result<()> {
        let Some(token) = &self.token else {
            info!("no push token configured, skipping notification");
            return Ok(());
        };

        let notice = if failed { FAILURE_NOTICE } else { SUCCESS_NOTICE };
        info!(notice, "pushing outcome notification");

        let client = reqwest::Client::builder()
            .timeout(NOTIFY_TIMEOUT)
            .build()
            .context("building http client")?;

        let response = client
            .post(&self.endpoint)
            .form(&[
                ("token", token.as_str()),
                ("title", notice),
                ("content", notice),
            ])
            .send()
            .await
            .context("posting push notification")?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status.is_success() {
            info!(%status, %body, "push notification delivered");
        } else {
            warn!(%status, %body, "push endpoint returned an error status");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Accept one request, capture it, answer with the given status line.
    async fn one_shot_server(status_line: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept");
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];

            // Read headers, then the declared body length.
            loop {
                let n = stream.read(&mut buf).await.expect("read");
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text
                        .lines()
                        .find_map(|line| line.strip_prefix("content-length: "))
                        .or_else(|| {
                            text.lines()
                                .find_map(|line| line.strip_prefix("Content-Length: "))
                        })
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }

            let body = "{\"code\":200,\"msg\":\"ok\"}";
            let response = format!(
                "{status_line}\r\ncontent-length: {}\r\ncontent-type: application/json\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.expect("write");
            stream.shutdown().await.ok();

            String::from_utf8_lossy(&request).into_owned()
        });

        (format!("http://{addr}/send/"), handle)
    }

    #[tokio::test]
    async fn no_token_means_no_network_call() {
        // Port 0 is unroutable: any attempted request would error out.
        let notifier = Notifier::with_endpoint(None, "http://127.0.0.1:0/send/");
        notifier.notify(true).await.expect("skips delivery");
        notifier.notify(false).await.expect("skips delivery");
    }

    #[tokio::test]
    async fn posts_the_fixed_payload_shape() {
        let (endpoint, server) = one_shot_server("HTTP/1.1 200 OK").await;
        let notifier = Notifier::with_endpoint(Some("tok123".into()), endpoint);

        notifier.notify(false).await.expect("delivers");

        let request = server.await.expect("server task");
        assert!(request.starts_with("POST /send/"));
        assert!(request.contains("token=tok123"));
        assert!(request.contains("title="));
        assert!(request.contains("content="));
    }

    #[tokio::test]
    async fn non_2xx_response_is_not_fatal() {
        let (endpoint, server) = one_shot_server("HTTP/1.1 500 Internal Server Error").await;
        let notifier = Notifier::with_endpoint(Some("tok123".into()), endpoint);

        notifier.notify(true).await.expect("logged, not fatal");
        server.await.expect("server task");
    }
}
