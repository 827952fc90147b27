use backon::{ExponentialBuilder, Retryable};
use reqwest::header::HeaderMap;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::{IsRetryable, LlmError};

/// Upstream error bodies are truncated to this many characters in errors and logs.
pub const UPSTREAM_BODY_PREVIEW_CHARS: usize = 500;

pub fn retry_policy(max_times: usize) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(200))
        .with_max_delay(Duration::from_secs(2))
        .with_max_times(max_times)
        .with_jitter()
}

/// POST `body` as JSON, retrying transport failures, 5xx and 429.
///
/// Any other non-2xx status is returned as [`LlmError::UpstreamStatus`] straight away.
pub async fn post_json_with_retry<T>(
    provider: &'static str,
    client: &reqwest::Client,
    retry: ExponentialBuilder,
    url: &Url,
    headers: HeaderMap,
    body: &T,
) -> Result<reqwest::Response, LlmError>
where
    T: serde::Serialize + Sync,
{
    (|| {
        let client = client.clone();
        let url = url.clone();
        let headers = headers.clone();

        async move {
            let resp = client
                .post(url.clone())
                .headers(headers)
                .json(body)
                .send()
                .await?;

            let status = resp.status();
            if status.is_success() {
                return Ok(resp);
            }

            let body_preview = match resp.bytes().await {
                Ok(bytes) => {
                    let raw_body = String::from_utf8_lossy(&bytes);
                    format!("{:.len$}", raw_body, len = UPSTREAM_BODY_PREVIEW_CHARS)
                }
                Err(e) => format!("<failed to read body: {e}>"),
            };

            debug!(
                provider,
                %status,
                url = %url,
                body = %body_preview,
                "[{provider}] Upstream returned non-success status"
            );

            Err(LlmError::UpstreamStatus {
                status,
                body: body_preview,
            })
        }
    })
    .retry(retry)
    .when(|e: &LlmError| e.is_retryable())
    .notify(|err, dur: Duration| {
        warn!(
            provider,
            "[{provider}] retrying after error {} (sleeping {:?})",
            err.public_message(),
            dur
        );
    })
    .await
}
