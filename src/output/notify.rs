//! Registration notification.
//!
//! One POST, fire and forget: a failure here must never undo a successful
//! provisioning run, so every error is logged as a warning and swallowed.
//! No retry.

use crate::config::NotifyConfig;
use crate::models::RegistrationPayload;
use colored::Colorize;

/// What happened to the registration call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    Sent,
    /// No endpoint configured for this run.
    Skipped,
    /// The POST failed; the run still counts as successful.
    Failed,
}

/// POST the registration payload with a bearer token.
pub async fn send_registration(
    http: &reqwest::Client,
    cfg: &NotifyConfig,
    payload: &RegistrationPayload,
) -> NotifyOutcome {
    log::info!(
        "Posting registration for {workspace} to {url}",
        workspace = payload.workspace_name,
        url = cfg.url
    );

    let result = http
        .post(&cfg.url)
        .bearer_auth(&cfg.token)
        .json(payload)
        .send()
        .await;

    match result {
        Ok(response) if response.status().is_success() => {
            log::info!("Registration accepted ({})", response.status());
            NotifyOutcome::Sent
        }
        Ok(response) => {
            log::warn!(
                "{failed}: registration endpoint returned {status}",
                failed = "Registration failed".on_red(),
                status = response.status()
            );
            NotifyOutcome::Failed
        }
        Err(e) => {
            log::warn!(
                "{failed}: {e}",
                failed = "Registration failed".on_red()
            );
            NotifyOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;

    fn test_payload() -> RegistrationPayload {
        RegistrationPayload {
            tenant_id: "tenant-1".to_string(),
            subscription_id: "sub-1".to_string(),
            resource_group_name: "rg-test".to_string(),
            workspace_name: "law-rg-test".to_string(),
            workspace_id: "/subscriptions/sub-1/resourceGroups/rg-test".to_string(),
            customer_id: "customer-guid".to_string(),
            table_name: "OnboardingEvents_CL".to_string(),
            dcr_immutable_id: "dcr-immutable-guid".to_string(),
            logs_ingestion_endpoint: "https://dce.ingest.monitor.azure.com".to_string(),
        }
    }

    /// Answer one request with the given status line, handing the raw request
    /// back for assertions.
    fn serve_once(status_line: &'static str) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = stream.read(&mut buf).expect("read");
                request.extend_from_slice(&buf[..n]);
                if n == 0 || request_complete(&request) {
                    break;
                }
            }
            let response =
                format!("{status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            stream.write_all(response.as_bytes()).expect("write");
            tx.send(String::from_utf8_lossy(&request).to_string())
                .expect("send");
        });
        (format!("http://{addr}"), rx)
    }

    /// Headers received and, if content-length says so, the full body too.
    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some((head, body)) = text.split_once("\r\n\r\n") else {
            return false;
        };
        let content_length = head
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())?
            })
            .unwrap_or(0);
        body.len() >= content_length
    }

    #[tokio::test]
    async fn test_success_posts_payload_with_bearer_token() {
        let (url, rx) = serve_once("HTTP/1.1 200 OK");
        let cfg = NotifyConfig {
            url,
            token: "secret-token".to_string(),
        };
        let outcome = send_registration(&reqwest::Client::new(), &cfg, &test_payload()).await;
        assert_eq!(outcome, NotifyOutcome::Sent);

        let request = rx.recv().expect("request");
        assert!(request.starts_with("POST "), "got: {request}");
        assert!(request.contains("authorization: Bearer secret-token")
            || request.contains("Authorization: Bearer secret-token"));
        assert!(request.contains("application/json"));
        assert!(request.contains("\"tenantId\":\"tenant-1\""));
        assert!(request.contains("\"dcrImmutableId\":\"dcr-immutable-guid\""));
    }

    #[tokio::test]
    async fn test_non_2xx_is_swallowed() {
        let (url, _rx) = serve_once("HTTP/1.1 500 Internal Server Error");
        let cfg = NotifyConfig {
            url,
            token: "secret-token".to_string(),
        };
        let outcome = send_registration(&reqwest::Client::new(), &cfg, &test_payload()).await;
        assert_eq!(outcome, NotifyOutcome::Failed);
    }

    #[tokio::test]
    async fn test_connection_failure_is_swallowed() {
        // Nothing listens here; the connection is refused.
        let cfg = NotifyConfig {
            url: "http://127.0.0.1:9/register".to_string(),
            token: "secret-token".to_string(),
        };
        let outcome = send_registration(&reqwest::Client::new(), &cfg, &test_payload()).await;
        assert_eq!(outcome, NotifyOutcome::Failed);
    }
}
