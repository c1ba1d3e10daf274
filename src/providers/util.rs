use anyhow::Error;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retries an async operation with configurable attempts and delays
///
/// # Parameters
/// - `operation`: Closure returning a future
/// - `retries`: Number of retry attempts (total runs = 1 initial + retries)
/// - `delay_ms`: Milliseconds between retry attempts
///
/// # Returns
/// Either the successful result or the error after all attempts
pub async fn with_retry<F, Fut, T>(
    mut operation: F,
    retries: usize,
    delay_ms: u64,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, reqwest::Error>>,
{
    let mut attempt = 1;
    loop {
        match operation().await.map_err(anyhow::Error::from) {
            Ok(val) => return Ok(val),
            Err(err) => {
                if attempt > retries {
                    return Err(err);
                }
                debug!(
                    "Attempt {}/{} failed: {}. Retrying...",
                    attempt, retries, err
                );
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

/// GETs a URL with retries and returns the body text, failing on non-2xx.
pub async fn get_text(client: &reqwest::Client, url: &str) -> Result<String, Error> {
    let response = with_retry(
        || async { client.get(url).send().await?.error_for_status() },
        3,
        500,
    )
    .await?;
    Ok(response.text().await?)
}

/// A numeric field that venues send either as a JSON number or a string.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RawNumber {
    Number(f64),
    Text(String),
}

impl RawNumber {
    /// Parses the value; `field` only labels the warning for bad strings.
    pub fn value(&self, field: &str) -> Option<f64> {
        match self {
            RawNumber::Number(n) => Some(*n),
            RawNumber::Text(s) => match s.trim().trim_end_matches('%').trim().parse::<f64>() {
                Ok(n) if n.is_finite() => Some(n),
                _ => {
                    warn!("Ignoring unparseable {field} value '{s}'");
                    None
                }
            },
        }
    }
}

/// Percentage (5.0 means 5%) to fraction, absent values become zero.
pub fn percent_to_fraction(value: Option<f64>) -> f64 {
    value.map_or(0.0, |v| v / 100.0)
}

/// Basis points (480 means 4.8%) to fraction, absent values become zero.
pub fn bps_to_fraction(value: Option<f64>) -> f64 {
    value.map_or(0.0, |v| v / 10_000.0)
}
