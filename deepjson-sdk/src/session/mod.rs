//! Real-time session channel over Socket.IO.

pub mod connection;
pub mod core;
pub mod events;
pub mod wire;
