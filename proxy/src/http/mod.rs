//! HTTP surface of the proxy: the query API and the server around it.

pub mod api;
pub mod server;

pub(crate) use server::*;
