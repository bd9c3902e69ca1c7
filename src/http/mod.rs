//! HTTP transport module
//!
//! The fuzzer only needs "send this request, tell me what came back"; the
//! `Transport` trait is that seam and `ReqwestTransport` the real client.

mod client;
mod request;
mod response;

pub use client::{ReqwestTransport, Transport, TransportSettings};
pub use request::FuzzRequest;
pub use response::Response;
