//! Utilities shared by database drivers.

pub mod tls;

pub use tls::{SslMode, TlsBuilder};
