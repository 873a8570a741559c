//! Request/response types and the network seam.
//!
//! Everything the cache layer sees goes through these types rather than raw
//! reqwest ones, so strategies and the router can be exercised against a
//! scripted fetcher in tests. The `Fetcher` trait is the only place a real
//! network call happens.

use std::future::Future;

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// HTTP method of an intercepted request. Only GET participates in caching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
  Get,
  Head,
  Post,
  Put,
  Patch,
  Delete,
  Options,
}

impl Method {
  pub fn is_get(&self) -> bool {
    matches!(self, Method::Get)
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Method::Get => "GET",
      Method::Head => "HEAD",
      Method::Post => "POST",
      Method::Put => "PUT",
      Method::Patch => "PATCH",
      Method::Delete => "DELETE",
      Method::Options => "OPTIONS",
    }
  }
}

impl std::fmt::Display for Method {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// What kind of resource a request is loading, as reported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Destination {
  Document,
  Script,
  Style,
  Image,
  Font,
  #[default]
  Other,
}

impl Destination {
  /// Static assets that get the cache-first treatment.
  pub fn is_static_asset(&self) -> bool {
    matches!(
      self,
      Destination::Script | Destination::Style | Destination::Image | Destination::Font
    )
  }
}

/// An intercepted outbound request.
#[derive(Debug, Clone)]
pub struct Request {
  pub method: Method,
  pub url: Url,
  pub destination: Destination,
  /// True for top-level navigations (the client loading a page).
  pub is_navigation: bool,
}

impl Request {
  pub fn get(url: Url) -> Self {
    Self {
      method: Method::Get,
      url,
      destination: Destination::Other,
      is_navigation: false,
    }
  }

  pub fn post(url: Url) -> Self {
    Self {
      method: Method::Post,
      url,
      destination: Destination::Other,
      is_navigation: false,
    }
  }

  /// A top-level navigation request for a document.
  pub fn navigate(url: Url) -> Self {
    Self {
      method: Method::Get,
      url,
      destination: Destination::Document,
      is_navigation: true,
    }
  }

  pub fn with_destination(mut self, destination: Destination) -> Self {
    self.destination = destination;
    self
  }
}

/// A response as seen by the cache layer.
#[derive(Debug, Clone)]
pub struct Response {
  pub status: u16,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
}

impl Response {
  /// Build a synthetic JSON response (used for the offline placeholder).
  pub fn json(status: u16, value: &serde_json::Value) -> Self {
    Self {
      status,
      headers: vec![("content-type".to_string(), "application/json".to_string())],
      body: value.to_string().into_bytes(),
    }
  }

  /// Exactly 200 - the only status worth caching.
  pub fn is_ok(&self) -> bool {
    self.status == 200
  }

  /// Any 2xx.
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// Case-insensitive header lookup.
  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(k, _)| k.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }
}

/// An immutable captured copy of a successful response.
///
/// Snapshots carry no expiry: staleness is repaired only by overwrite or by
/// store deletion at activation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
  pub status: u16,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
  /// When the snapshot was captured. Metadata only, never consulted for expiry.
  pub cached_at: DateTime<Utc>,
}

impl Snapshot {
  /// Capture a response. Caller is responsible for only capturing 200s.
  pub fn capture(response: &Response) -> Self {
    Self {
      status: response.status,
      headers: response.headers.clone(),
      body: response.body.clone(),
      cached_at: Utc::now(),
    }
  }

  /// Replay the snapshot as a response.
  pub fn into_response(self) -> Response {
    Response {
      status: self.status,
      headers: self.headers,
      body: self.body,
    }
  }
}

/// The network seam. Strategies call this; tests substitute a scripted fake.
pub trait Fetcher: Send + Sync + 'static {
  fn fetch(&self, request: Request) -> impl Future<Output = Result<Response>> + Send;
}

/// Live fetcher backed by reqwest.
#[derive(Clone)]
pub struct HttpFetcher {
  client: reqwest::Client,
}

impl HttpFetcher {
  pub fn new() -> Result<Self> {
    let client = reqwest::Client::builder()
      .user_agent(concat!("finsync/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to build HTTP client: {}", e))?;

    Ok(Self { client })
  }

  fn method_for(method: Method) -> reqwest::Method {
    match method {
      Method::Get => reqwest::Method::GET,
      Method::Head => reqwest::Method::HEAD,
      Method::Post => reqwest::Method::POST,
      Method::Put => reqwest::Method::PUT,
      Method::Patch => reqwest::Method::PATCH,
      Method::Delete => reqwest::Method::DELETE,
      Method::Options => reqwest::Method::OPTIONS,
    }
  }
}

impl Fetcher for HttpFetcher {
  fn fetch(&self, request: Request) -> impl Future<Output = Result<Response>> + Send {
    let client = self.client.clone();
    async move {
      // No explicit timeout: transport failure is the offline signal.
      let response = client
        .request(Self::method_for(request.method), request.url.clone())
        .send()
        .await
        .map_err(|e| eyre!("Fetch failed for {}: {}", request.url, e))?;

      let status = response.status().as_u16();
      let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
          value
            .to_str()
            .ok()
            .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

      let body = response
        .bytes()
        .await
        .map_err(|e| eyre!("Failed to read response body from {}: {}", request.url, e))?
        .to_vec();

      Ok(Response {
        status,
        headers,
        body,
      })
    }
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn snapshot_round_trips_a_response() {
    let response = Response {
      status: 200,
      headers: vec![("content-type".to_string(), "text/css".to_string())],
      body: b"body { color: red }".to_vec(),
    };

    let replayed = Snapshot::capture(&response).into_response();
    assert_eq!(replayed.status, 200);
    assert_eq!(replayed.header("Content-Type"), Some("text/css"));
    assert_eq!(replayed.body, response.body);
  }

  #[test]
  fn only_exactly_200_is_cacheable() {
    let partial = Response {
      status: 206,
      headers: Vec::new(),
      body: Vec::new(),
    };
    assert!(partial.is_success());
    assert!(!partial.is_ok());
  }

  #[test]
  fn static_asset_destinations() {
    assert!(Destination::Script.is_static_asset());
    assert!(Destination::Font.is_static_asset());
    assert!(!Destination::Document.is_static_asset());
    assert!(!Destination::Other.is_static_asset());
  }

  #[tokio::test]
  async fn fake_fetcher_records_calls() {
    use testing::FakeFetcher;

    let fetcher = FakeFetcher::new();
    let url = Url::parse("https://finny.app/app.js").unwrap();
    fetcher.respond_ok(Method::Get, url.as_str(), b"js");

    let response = fetcher.fetch(Request::get(url.clone())).await.unwrap();
    assert!(response.is_ok());
    assert_eq!(fetcher.calls(), vec![format!("GET {}", url)]);

    // Unscripted requests fail like a dead network.
    let other = Url::parse("https://finny.app/missing.js").unwrap();
    assert!(fetcher.fetch(Request::get(other)).await.is_err());
  }
}
