//! Per-call transmission options.
//!
//! The DeepJSON server understands three behavior toggles (binary transport,
//! overwrite of an existing key, GET-with-body). They are modelled here as
//! explicit option structs passed to a single call, plus [`TransmissionFlags`],
//! the one-shot flag set the client keeps for the chained-setter API.

/// Options for a `GET /keys/{key}` request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use]
pub struct GetOptions {
    /// Ask for binary transport semantics; the token is embedded in the query.
    pub binary: bool,
    /// Send GET semantics over `POST` with `X-Method-Override: GET` so a body can travel.
    pub get_body: bool,
    /// Optional server-side script wrapped around the request body.
    pub script: Option<String>,
}

impl GetOptions {
    /// Request binary transport semantics.
    pub fn binary(mut self, binary: bool) -> Self {
        self.binary = binary;
        self
    }

    /// Send the GET as a `POST` with a method-override header.
    pub fn get_body(mut self, get_body: bool) -> Self {
        self.get_body = get_body;
        self
    }

    /// Wrap the body with a script for the server to evaluate.
    pub fn script<S: Into<String>>(mut self, script: S) -> Self {
        self.script = Some(script.into());
        self
    }
}

/// Options for a `POST /keys/{key}` request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use]
pub struct PostOptions {
    /// Replace the value if the key already exists (`X-Override-Existing: true`).
    pub overwrite_key: bool,
    /// Optional server-side script wrapped around the request body.
    pub script: Option<String>,
}

impl PostOptions {
    /// Replace an existing key instead of failing.
    pub fn overwrite_key(mut self, overwrite_key: bool) -> Self {
        self.overwrite_key = overwrite_key;
        self
    }

    /// Wrap the body with a script for the server to evaluate.
    pub fn script<S: Into<String>>(mut self, script: S) -> Self {
        self.script = Some(script.into());
        self
    }
}

/// Options for a `PUT /keys/{key}` request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use]
pub struct PutOptions {
    /// Optional server-side script wrapped around the request body.
    pub script: Option<String>,
}

impl PutOptions {
    /// Wrap the body with a script for the server to evaluate.
    pub fn script<S: Into<String>>(mut self, script: S) -> Self {
        self.script = Some(script.into());
        self
    }
}

/// Flags that apply to the *next* CRUD call only.
///
/// The client takes (and thereby resets) the whole set when a call builds its
/// request, whether or not that request later succeeds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransmissionFlags {
    /// See `GetOptions::binary`.
    pub binary: bool,
    /// See `PostOptions::overwrite_key`.
    pub overwrite_key: bool,
    /// See `GetOptions::get_body`.
    pub get_body: bool,
}

impl TransmissionFlags {
    /// `true` when no flag is set.
    pub fn is_clear(&self) -> bool {
        *self == Self::default()
    }

    pub(crate) fn get_options(self) -> GetOptions {
        GetOptions {
            binary: self.binary,
            get_body: self.get_body,
            script: None,
        }
    }

    pub(crate) fn post_options(self) -> PostOptions {
        PostOptions {
            overwrite_key: self.overwrite_key,
            script: None,
        }
    }
}
