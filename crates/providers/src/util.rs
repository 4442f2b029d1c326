//! Shared helpers for the HTTP adapters.

use dg_domain::error::{Error, Result};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeout errors map to [`Error::Timeout`]; everything else maps to
/// [`Error::Http`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Read the body of a response, failing with [`Error::Remote`] (status and
/// body) when the status is not 2xx.
pub(crate) async fn success_body(resp: reqwest::Response) -> Result<String> {
    let status = resp.status();
    let body = resp.text().await.map_err(from_reqwest)?;
    if !status.is_success() {
        return Err(Error::Remote {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

/// Extract the `id` field every create-style endpoint returns.
pub(crate) fn parse_id(body: &str) -> Result<String> {
    #[derive(serde::Deserialize)]
    struct IdOnly {
        id: String,
    }
    let parsed: IdOnly = serde_json::from_str(body)?;
    Ok(parsed.id)
}
