//! Request identity for cache keys.
//!
//! A snapshot is keyed by (method, URL). Stores hold at most one entry per
//! identity; overwrite is last-write-wins.

use sha2::{Digest, Sha256};

use crate::http::{Method, Request};

/// The identity of a request for cache purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestIdentity {
  pub method: Method,
  pub url: String,
}

impl RequestIdentity {
  pub fn new(method: Method, url: impl Into<String>) -> Self {
    Self {
      method,
      url: url.into(),
    }
  }

  /// Stable, fixed-length store key (SHA256 hex of "METHOD url").
  pub fn key(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.method.as_str().as_bytes());
    hasher.update(b" ");
    hasher.update(self.url.as_bytes());
    hex::encode(hasher.finalize())
  }
}

impl From<&Request> for RequestIdentity {
  fn from(request: &Request) -> Self {
    Self::new(request.method, request.url.as_str())
  }
}
