use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const AGENT: &str = "hoops-oracle/0.1";

static CLIENT: OnceCell<Client> = OnceCell::new();

/// Builds the shared client with `timeout`. Only the first initialization
/// counts; afterwards the existing client is returned unchanged.
pub fn init_http_client(timeout: Duration) -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")
    })
}

/// Shared client, built with [`DEFAULT_TIMEOUT`] if nothing configured it first.
pub fn http_client() -> Result<&'static Client> {
    init_http_client(DEFAULT_TIMEOUT)
}

/// GETs `url` and returns the body, treating any non-2xx status as an error.
/// Timeouts surface as ordinary request errors.
pub fn get_text(url: &str, query: &[(&str, &str)]) -> Result<String> {
    let client = http_client()?;
    let resp = client
        .get(url)
        .query(query)
        .header(USER_AGENT, AGENT)
        .send()
        .with_context(|| format!("request to {url} failed"))?;
    let status = resp.status();
    let body = resp.text().context("failed reading body")?;
    if !status.is_success() {
        return Err(anyhow::anyhow!("http {}: {}", status, snippet(&body)));
    }
    Ok(body)
}

pub(crate) fn snippet(body: &str) -> String {
    body.trim()
        .replace(['\n', '\r'], " ")
        .chars()
        .take(220)
        .collect()
}
