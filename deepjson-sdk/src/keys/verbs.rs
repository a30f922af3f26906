use std::path::Path;

use reqwest::Response;

use crate::errors::{RequestError, Result};
use crate::request::{
    self, Body, FilePart, GetOptions, KeyFilter, PostOptions, PutOptions,
};
use crate::DeepJsonClient;

//
// Flag-consuming verbs: each call takes the pending transmission flags first,
// so they are cleared before the request is even built.
//

impl DeepJsonClient {
    /// `GET /keys/{key}` honoring the pending `binary` and `get_body` flags.
    ///
    /// `value` is sent as the body (only meaningful together with `get_body`).
    ///
    /// # Example
    /// ```no_run
    /// # async fn ex(client: deepjson::DeepJsonClient) -> deepjson::Result<()> {
    /// let raw = client.set_binary(true).get("images/logo", "").await?.bytes().await?;
    /// assert!(!client.is_binary());
    /// # Ok(()) }
    /// ```
    pub async fn get<B: Into<Body>>(&self, key: &str, value: B) -> Result<Response> {
        let opts = self.take_flags().get_options();
        self.send_get(key, value.into(), &opts).await
    }

    /// `POST /keys/{key}` honoring the pending `overwrite_key` flag.
    pub async fn post<B: Into<Body>>(&self, key: &str, value: B) -> Result<Response> {
        let opts = self.take_flags().post_options();
        self.send_post(key, value.into(), &opts).await
    }

    /// `PUT /keys/{key}`.
    pub async fn put<B: Into<Body>>(&self, key: &str, value: B) -> Result<Response> {
        self.take_flags();
        self.send_put(key, value.into(), &PutOptions::default()).await
    }

    /// `DELETE /keys/{key}`.
    pub async fn delete(&self, key: &str) -> Result<Response> {
        self.take_flags();
        self.dispatch(request::build_delete(key)?).await
    }

    /// Rename `from` to `to` on the server (`POST /cmd/move`).
    pub async fn move_key(&self, from: &str, to: &str) -> Result<Response> {
        self.take_flags();
        self.dispatch(request::build_move(from, to)?).await
    }

    /// Upload the file at `path` under `key` as a multipart form.
    ///
    /// The part's file name is the final component of `path`.
    pub async fn upload_file<P: AsRef<Path>>(
        &self,
        key: &str,
        path: P,
        overwrite: bool,
    ) -> Result<Response> {
        self.take_flags();
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| RequestError::File {
                path: path.display().to_string(),
                source,
            })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        self.send_upload(key, file_name, bytes, overwrite).await
    }

    /// Upload in-memory `bytes` under `key` as a multipart form named `file_name`.
    pub async fn upload_bytes<N: Into<String>>(
        &self,
        key: &str,
        file_name: N,
        bytes: Vec<u8>,
        overwrite: bool,
    ) -> Result<Response> {
        self.take_flags();
        self.send_upload(key, file_name.into(), bytes, overwrite).await
    }

    async fn send_upload(
        &self,
        key: &str,
        file_name: String,
        bytes: Vec<u8>,
        overwrite: bool,
    ) -> Result<Response> {
        let file = FilePart {
            field: "file".to_string(),
            file_name,
            bytes,
        };
        self.dispatch(request::build_upload(key, file, overwrite)?)
            .await
    }

    /// List keys (`GET /cmd/keys`), optionally filtered.
    ///
    /// Accepts `KeyFilter::None`, plain text, a delimited pattern literal or a
    /// [`regex::Regex`]; returns the server's JSON body.
    ///
    /// # Example
    /// ```no_run
    /// # async fn ex(client: deepjson::DeepJsonClient) -> deepjson::Result<()> {
    /// let re = regex::Regex::new("^users/").unwrap();
    /// let keys = client.list_keys(&re).await?;
    /// println!("{keys}");
    /// # Ok(()) }
    /// ```
    pub async fn list_keys<F: Into<KeyFilter>>(&self, filter: F) -> Result<serde_json::Value> {
        self.take_flags();
        let resp = self
            .dispatch(request::build_list_keys(&filter.into()))
            .await?;
        Ok(resp.json().await?)
    }
}

//
// Explicit-option verbs: the options travel with the call. Pending flags are
// still taken (and dropped) so none of them outlives this request.
//

impl DeepJsonClient {
    /// `GET /keys/{key}` with explicit [`GetOptions`].
    pub async fn get_with<B: Into<Body>>(
        &self,
        key: &str,
        value: B,
        opts: &GetOptions,
    ) -> Result<Response> {
        self.take_flags();
        self.send_get(key, value.into(), opts).await
    }

    /// `POST /keys/{key}` with explicit [`PostOptions`].
    pub async fn post_with<B: Into<Body>>(
        &self,
        key: &str,
        value: B,
        opts: &PostOptions,
    ) -> Result<Response> {
        self.take_flags();
        self.send_post(key, value.into(), opts).await
    }

    /// `PUT /keys/{key}` with explicit [`PutOptions`].
    pub async fn put_with<B: Into<Body>>(
        &self,
        key: &str,
        value: B,
        opts: &PutOptions,
    ) -> Result<Response> {
        self.take_flags();
        self.send_put(key, value.into(), opts).await
    }

    async fn send_get(&self, key: &str, value: Body, opts: &GetOptions) -> Result<Response> {
        let token = self.token.get();
        let desc = request::build_get(key, value, opts, token.as_deref())?;
        self.dispatch(desc).await
    }

    async fn send_post(&self, key: &str, value: Body, opts: &PostOptions) -> Result<Response> {
        self.dispatch(request::build_post(key, value, opts)?).await
    }

    async fn send_put(&self, key: &str, value: Body, opts: &PutOptions) -> Result<Response> {
        self.dispatch(request::build_put(key, value, opts)?).await
    }

    /// GET and deserialize JSON.
    ///
    /// # Examples
    /// ```no_run
    /// # use serde::Deserialize;
    /// # #[derive(Deserialize)] struct Profile { name: String }
    /// # async fn ex(client: deepjson::DeepJsonClient) -> deepjson::Result<()> {
    /// let profile: Profile = client.get_json("users/alice").await?;
    /// # Ok(()) }
    /// ```
    pub async fn get_json<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let resp = self.get(key, Body::Empty).await?;
        Ok(resp.json::<T>().await?)
    }

    /// Serialize `value` as JSON and `POST` it under `key`, honoring the
    /// pending `overwrite_key` flag.
    pub async fn post_json<T>(&self, key: &str, value: &T) -> Result<Response>
    where
        T: serde::Serialize + ?Sized,
    {
        let body = serde_json::to_string(value).map_err(|e| RequestError::Invalid {
            message: format!("failed to encode JSON body: {e}"),
        })?;
        self.post(key, body).await
    }
}
