use reqwest::Response;

use crate::errors::{Error, RequestError, Result};

/// Convert non-2xx responses into a structured error that includes the server body.
///
/// If the status is successful (2xx), the original response is returned.
/// Otherwise the body is consumed into `RequestError::Server` so callers can
/// inspect both the status and whatever detail the server sent back.
pub(crate) async fn check_http_status(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let message = match response.text().await {
        Ok(body) if !body.is_empty() => body,
        _ => status
            .canonical_reason()
            .unwrap_or("Unknown Error")
            .to_string(),
    };

    Err(Error::from(RequestError::Server { status, message }))
}

#[inline]
pub(crate) fn invalid(message: impl Into<String>) -> Error {
    RequestError::Invalid {
        message: message.into(),
    }
    .into()
}
