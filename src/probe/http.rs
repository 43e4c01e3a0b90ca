//! HTTP probe implementation.

use std::error::Error as _;
use std::time::{Duration, Instant};

use super::classify::classify_http_error;
use super::{ErrorKind, Outcome, Payload};

/// Issue a GET against `address` and report the status of the first response.
///
/// Latency ends when the response head arrives; the body is not read.
/// Redirects are not followed and the connection is never pooled.
pub async fn run_http_probe(address: &str, timeout: Duration) -> Outcome {
    let url = normalize_url(address);

    let client = match reqwest::Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::none())
        .pool_max_idle_per_host(0)
        .build()
    {
        Ok(client) => client,
        Err(e) => return Outcome::failure(ErrorKind::Unclassified, e.to_string()),
    };

    let request = match client.get(&url).build() {
        Ok(request) => request,
        Err(e) => return Outcome::failure(ErrorKind::Unclassified, format!("invalid URL {}: {}", url, e)),
    };

    let start = Instant::now();

    match client.execute(request).await {
        Ok(response) => {
            let latency = start.elapsed();
            Outcome::success(
                latency,
                Payload::Status {
                    code: response.status().as_u16(),
                },
            )
        }
        Err(e) => {
            let kind = classify_http_error(&e);
            if kind == ErrorKind::Unclassified {
                tracing::warn!("HTTP probe to {} failed with unexpected error: {}", url, e);
            }
            Outcome::failure(kind, error_chain(&e))
        }
    }
}

/// Prefix a bare host with `http://`.
pub fn normalize_url(address: &str) -> String {
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    }
}

/// reqwest's top-level message hides the cause ("error sending request").
fn error_chain(err: &reqwest::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one connection with a canned reply, after reading the request head.
    async fn serve_once(reply: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf).await;
                let _ = stream.write_all(reply).await;
                let _ = stream.shutdown().await;
            }
        });
        format!("http://{}/", addr)
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("example.com"), "http://example.com");
        assert_eq!(normalize_url("https://example.com"), "https://example.com");
    }

    #[tokio::test]
    async fn test_http_probe_ok() {
        let url = serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok").await;
        let outcome = run_http_probe(&url, Duration::from_secs(5)).await;
        assert_eq!(outcome.payload(), Some(&Payload::Status { code: 200 }));
    }

    #[tokio::test]
    async fn test_http_probe_error_status_is_success() {
        let url = serve_once(b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n").await;
        let outcome = run_http_probe(&url, Duration::from_secs(5)).await;
        assert!(outcome.is_success(), "unexpected outcome: {}", outcome);
        assert_eq!(outcome.payload(), Some(&Payload::Status { code: 503 }));
    }

    #[tokio::test]
    async fn test_http_probe_does_not_follow_redirects() {
        let url = serve_once(
            b"HTTP/1.1 301 Moved Permanently\r\nLocation: http://127.0.0.1:1/\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;
        let outcome = run_http_probe(&url, Duration::from_secs(5)).await;
        assert_eq!(outcome.payload(), Some(&Payload::Status { code: 301 }));
    }

    #[tokio::test]
    async fn test_http_probe_malformed_response() {
        let url = serve_once(b"this is not http\r\n\r\n").await;
        let outcome = run_http_probe(&url, Duration::from_secs(5)).await;
        assert_eq!(outcome.error_kind(), Some(ErrorKind::ProtocolError), "{}", outcome);
    }

    #[tokio::test]
    async fn test_http_probe_connection_refused() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let outcome = run_http_probe(&format!("http://127.0.0.1:{}/", port), Duration::from_secs(5)).await;
        assert_eq!(outcome.error_kind(), Some(ErrorKind::ConnectFailure), "{}", outcome);
    }

    #[tokio::test]
    async fn test_http_probe_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            // Accept and hold the connection without answering
            let _held = listener.accept().await;
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let outcome = run_http_probe(&format!("http://{}/", addr), Duration::from_millis(200)).await;
        assert_eq!(outcome.error_kind(), Some(ErrorKind::Timeout), "{}", outcome);
    }

    #[tokio::test]
    async fn test_http_probe_invalid_url() {
        let outcome = run_http_probe("http://exa mple.com/", Duration::from_millis(100)).await;
        assert_eq!(outcome.error_kind(), Some(ErrorKind::Unclassified));
    }
}
