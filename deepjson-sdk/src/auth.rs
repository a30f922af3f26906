//! Bearer-token handling and the `/auth/login` exchange.
//!
//! # Design
//! - The token lives in a [`TokenStore`] backed by `ArcSwapOption<String>`.
//! - **Reads are lock-free**: request building and session connects do a single
//!   atomic load of whatever token is current at that moment.
//! - Every clone of a [`DeepJsonClient`] (and every [`SessionChannel`] built
//!   from one) shares the same store, so a successful login is visible to all
//!   of them at once.
//!
//! [`SessionChannel`]: crate::SessionChannel

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::{errors::Result, util::check_http_status, DeepJsonClient};

/// Path of the credential exchange.
pub const LOGIN_PATH: &str = "/auth/login";

/// Shared, thread-safe slot holding the optional bearer token.
#[derive(Clone, Debug, Default)]
pub struct TokenStore {
    slot: Arc<ArcSwapOption<String>>,
}

impl TokenStore {
    /// A store seeded with `token`.
    pub fn new(token: Option<String>) -> Self {
        Self {
            slot: Arc::new(ArcSwapOption::from(token.map(Arc::new))),
        }
    }

    /// Current token, if any.
    pub fn get(&self) -> Option<String> {
        self.slot.load_full().map(|t| t.as_ref().clone())
    }

    /// Replace the token.
    pub fn set(&self, token: Option<String>) {
        self.slot.store(token.map(Arc::new));
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// Successful `/auth/login` response.
///
/// The server may send more than the token; everything else is kept in `extra`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoginResponse {
    /// Fresh bearer token.
    pub token: String,
    /// Any other fields of the response body.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DeepJsonClient {
    /// Exchange credentials for a bearer token.
    ///
    /// On success the token is stored and used by every subsequent request of
    /// this client and its clones. A live [`SessionChannel`](crate::SessionChannel)
    /// only picks it up on its next connect; use
    /// [`SessionChannel::login`](crate::SessionChannel::login) to rejoin right away.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        let url = self.url_for(LOGIN_PATH);
        tracing::debug!(%url, username, "logging in");

        let resp = self
            .http
            .request(Method::POST, url)
            .json(&LoginRequest { username, password })
            .send()
            .await?;
        let resp = check_http_status(resp).await?;
        let login: LoginResponse = resp.json().await?;

        self.token.set(Some(login.token.clone()));
        tracing::info!(username, "login succeeded, token refreshed");
        Ok(login)
    }

    /// The bearer token currently in use.
    pub fn token(&self) -> Option<String> {
        self.token.get()
    }

    /// Replace the bearer token (e.g. one persisted from an earlier login).
    pub fn set_token<S: Into<String>>(&self, token: S) -> &Self {
        self.token.set(Some(token.into()));
        self
    }

    /// Forget the bearer token; later requests go out unauthenticated.
    pub fn clear_token(&self) -> &Self {
        self.token.set(None);
        self
    }
}
