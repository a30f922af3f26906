use reqwest::multipart::{Form, Part};
use reqwest::Response;
use url::Url;

use crate::errors::Result;
use crate::request::{Body, RequestDescriptor};
use crate::util::{check_http_status, invalid};
use crate::DeepJsonClient;

impl DeepJsonClient {
    /// Join a server-absolute `path` (already percent-encoded) onto the base URL,
    /// keeping any path prefix the base URL carries.
    pub(crate) fn url_for(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        let prefix = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{prefix}{path}"));
        url.set_query(None);
        url
    }

    /// Finalize `desc` with the current token, send it and check the status.
    ///
    /// Non-2xx responses become [`RequestError::Server`](crate::errors::RequestError::Server)
    /// carrying the response body.
    pub async fn dispatch(&self, desc: RequestDescriptor) -> Result<Response> {
        let desc = desc.finalize(self.token.get().as_deref())?;

        let mut url = self.url_for(&desc.path);
        if !desc.query.is_empty() {
            url.query_pairs_mut().extend_pairs(desc.query.iter());
        }
        tracing::debug!(method = %desc.method, %url, "dispatching request");

        let rb = self
            .http
            .request(desc.method, url)
            .headers(desc.headers);

        let rb = match desc.body {
            Body::Empty => rb,
            Body::Text(text) => rb.body(text),
            Body::Bytes(bytes) => rb.body(bytes),
            Body::Multipart(file) => {
                let part = Part::bytes(file.bytes)
                    .file_name(file.file_name)
                    .mime_str("application/octet-stream")
                    .map_err(|e| invalid(format!("invalid multipart content type: {e}")))?;
                rb.multipart(Form::new().part(file.field, part))
            }
        };

        let resp = rb.send().await?;
        check_http_status(resp).await
    }
}
