#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

mod auth;
mod client;
pub mod errors;
mod keys;
pub mod request;
pub mod session;
mod util;

pub mod prelude;

// --- PUBLIC API EXPORTS ---
// Transport
pub use client::core::{
    ConnectionConfig, DeepJsonClient, DeepJsonClientBuilder, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_STORAGE_MODE,
};
// Authentication
pub use auth::{LoginResponse, TokenStore, LOGIN_PATH};
// Request shaping
pub use request::{
    Body, FilePart, GetOptions, KeyFilter, PostOptions, PutOptions, RequestDescriptor,
    TransmissionFlags,
};
// Real-time sessions
pub use session::connection::{ConnectParams, SessionAction};
pub use session::core::{SessionChannel, SessionState};
pub use session::events::{handler, typed_handler, Handler, SessionEvent};

// Error types
pub use errors::{BuildError, Error, Result};

// Re-exports
pub use reqwest::{Method, Response, StatusCode};
