//! Common imports for quick starts.

// Common
pub use crate::{BuildError, Error, Result};

// Transport and configuration
pub use crate::{ConnectionConfig, DeepJsonClient, DeepJsonClientBuilder};

// Per-call options and listing filters
pub use crate::{GetOptions, KeyFilter, PostOptions, PutOptions};

// Real-time sessions
pub use crate::{handler, Handler, SessionChannel, SessionEvent, SessionState};
