//! Local IPC surface
//!
//! Newline-delimited JSON over a Unix domain socket: one [`protocol::Request`]
//! per line in, one [`protocol::Response`] per line out, in order, per
//! connection.

pub mod dispatch;
pub mod protocol;
pub mod server;
