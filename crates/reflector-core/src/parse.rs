//! Boundary parser: response bodies to domain address values
//!
//! The only place HTTP oracle bytes cross into `IpAddr` values. Oracle
//! bodies are tiny: either a bare IP token in plain text or a small
//! JSON object with an `ip`/`address` field.

use std::net::IpAddr;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::Result;

/// Upper bound on how much body is read; real oracle bodies are a
/// single token or a one-line JSON object
const MAX_BODY_BYTES: u64 = 4096;

/// Extract an IP address from an oracle's response body
///
/// Reads the body to EOF (bounded), then tries a plain-text token
/// first and a JSON object field second. Returns `Ok(None)` when the
/// body holds no parseable address.
pub async fn parse_simple_address<R>(mut body: R) -> Result<Option<IpAddr>>
where
    R: AsyncRead + Unpin,
{
    let mut text = String::new();
    (&mut body).take(MAX_BODY_BYTES).read_to_string(&mut text).await?;
    Ok(extract_address(&text))
}

/// Pull an IP token out of plain text or a JSON object
fn extract_address(body: &str) -> Option<IpAddr> {
    let trimmed = body.trim();
    if let Ok(address) = trimmed.parse() {
        return Some(address);
    }

    let value: serde_json::Value = serde_json::from_str(trimmed).ok()?;
    for field in ["ip", "address"] {
        if let Some(token) = value.get(field).and_then(|v| v.as_str())
            && let Ok(address) = token.trim().parse()
        {
            return Some(address);
        }
    }
    None
}
