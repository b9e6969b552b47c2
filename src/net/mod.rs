//! Network access for the proxy.
//!
//! The proxy only ever talks to the network through the [`Network`] trait so
//! that interception can be driven without a live server.

mod client;
#[cfg(test)]
pub(crate) mod stub;
mod types;

use color_eyre::Result;
use futures::future::BoxFuture;

pub use client::HttpNetwork;
pub use types::{Destination, Request, RequestMode, Response};

/// Fetch-by-request, yielding a response or a network failure.
pub trait Network: Send + Sync {
  fn fetch<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response>>;
}
