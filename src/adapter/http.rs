//! Shared "send one mapped payload to one URL, with retry" logic used by
//! every adapter strategy.

use std::time::Duration;

use reqwest::{Client, Method, StatusCode};

use crate::order::MappedOrder;

const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Sends `mapped` to `url` via `method`, retrying up to `max_retries` times
/// on 429/5xx/timeout. Returns `Ok(())` on HTTP 200, `Err(reason)` otherwise.
pub async fn send_with_retry(
    client: &Client,
    method: Method,
    url: &str,
    mapped: &MappedOrder,
    max_retries: u32,
) -> Result<(), String> {
    let mut attempt = 0u32;
    loop {
        let result = send_once(client, method.clone(), url, mapped).await;
        match result {
            Attempt::Success => return Ok(()),
            Attempt::RateLimited(retry_after) => {
                if attempt >= max_retries {
                    return Err("Rate limit exceeded".to_string());
                }
                tokio::time::sleep(retry_after).await;
            }
            Attempt::ServerError(status) => {
                if attempt >= max_retries {
                    return Err(format!("Server error: {status}"));
                }
            }
            Attempt::Timeout => {
                if attempt >= max_retries {
                    return Err("Max retries exceeded".to_string());
                }
            }
            Attempt::ClientError(status, body) => {
                return Err(format!("HTTP {status}: {body}"));
            }
            Attempt::TransportError(msg) => {
                return Err(msg);
            }
        }
        attempt += 1;
    }
}

enum Attempt {
    Success,
    RateLimited(Duration),
    ServerError(StatusCode),
    Timeout,
    ClientError(StatusCode, String),
    TransportError(String),
}

async fn send_once(client: &Client, method: Method, url: &str, mapped: &MappedOrder) -> Attempt {
    let request = match method {
        Method::GET => client.get(url).query(mapped.as_query_pairs()),
        Method::POST => {
            let body = mapped.get("payload").unwrap_or_default().to_string();
            client
                .post(url)
                .header(reqwest::header::CONTENT_TYPE, "text/plain")
                .body(body)
        }
        _ => unreachable!("adapters only use GET or POST"),
    };

    let response = match request.send().await {
        Ok(r) => r,
        Err(e) if e.is_timeout() => return Attempt::Timeout,
        Err(e) => return Attempt::TransportError(e.to_string()),
    };

    let status = response.status();
    if status.is_success() {
        return Attempt::Success;
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_RETRY_AFTER);
        return Attempt::RateLimited(retry_after);
    }
    if status.is_server_error() {
        return Attempt::ServerError(status);
    }
    let body = response.text().await.unwrap_or_default();
    Attempt::ClientError(status, body)
}
