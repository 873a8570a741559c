//! Request router.
//!
//! A state-free classifier: an explicit ordered list of (predicate, route)
//! rules evaluated top-down, first match wins. The order is the contract:
//! non-GET and hashed chunks bypass before anything else gets a say.

use crate::config::Config;
use crate::http::Request;

/// Where a classified request is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
  /// Straight to the network; no store is read or written.
  Bypass,
  /// Resolve to the cached app-shell entry document.
  AppShell,
  /// Cache-first with background refresh (static assets).
  CacheFirst,
  /// Network-first with cache fallback and offline placeholder.
  NetworkFirstData,
  /// Network-first with cache fallback, no placeholder (default).
  NetworkFirst,
}

type Predicate = fn(&Router, &Request) -> bool;

struct Rule {
  name: &'static str,
  matches: Predicate,
  route: Route,
}

/// Classifies intercepted requests. Built once from config; holds no
/// per-request state.
pub struct Router {
  app_origin: String,
  data_backends: Vec<String>,
  chunk_patterns: Vec<String>,
}

/// Precedence order per the interception contract. The trailing `always`
/// rule makes network-first the explicit default.
const RULES: &[Rule] = &[
  Rule {
    name: "non-get",
    matches: |_, req| !req.method.is_get(),
    route: Route::Bypass,
  },
  Rule {
    name: "hashed-chunk",
    matches: Router::is_hashed_chunk,
    route: Route::Bypass,
  },
  Rule {
    name: "navigation",
    matches: |_, req| req.is_navigation,
    route: Route::AppShell,
  },
  Rule {
    name: "data-backend",
    matches: Router::is_data_request,
    route: Route::NetworkFirstData,
  },
  Rule {
    name: "static-asset",
    matches: |_, req| req.destination.is_static_asset(),
    route: Route::CacheFirst,
  },
  Rule {
    name: "default",
    matches: |_, _| true,
    route: Route::NetworkFirst,
  },
];

impl Router {
  pub fn new(config: &Config) -> Self {
    Self {
      app_origin: normalize_origin(&config.origin),
      data_backends: config.data_backends.iter().map(|o| normalize_origin(o)).collect(),
      chunk_patterns: config.chunk_patterns.clone(),
    }
  }

  /// Classify a request, first matching rule wins.
  pub fn classify(&self, request: &Request) -> Route {
    for rule in RULES {
      if (rule.matches)(self, request) {
        tracing::trace!(rule = rule.name, url = %request.url, "Routed request");
        return rule.route;
      }
    }
    // RULES ends with a catch-all.
    unreachable!("router rule table has no catch-all")
  }

  /// Content-hashed build artifacts from the bundler. Serving one of these
  /// stale from a prior deployment breaks the page, so they are never
  /// cached here.
  pub fn is_hashed_chunk(&self, request: &Request) -> bool {
    let path = request.url.path();
    self.chunk_patterns.iter().any(|p| path.contains(p.as_str()))
  }

  /// Data request: origin is a configured hosted backend, or an `/api/`
  /// path on the app's own origin.
  pub fn is_data_request(&self, request: &Request) -> bool {
    let origin = request.url.origin().ascii_serialization();
    if self.data_backends.iter().any(|b| *b == origin) {
      return true;
    }
    origin == self.app_origin && request.url.path().starts_with("/api/")
  }
}

/// Normalize a configured origin to url's ascii serialization so string
/// comparison works ("https://x.app/" == "https://x.app").
fn normalize_origin(origin: &str) -> String {
  url::Url::parse(origin)
    .map(|u| u.origin().ascii_serialization())
    .unwrap_or_else(|_| origin.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::test_config;
  use crate::http::{Destination, Method, Request};
  use url::Url;

  fn router() -> Router {
    Router::new(&test_config())
  }

  fn get(url: &str) -> Request {
    Request::get(Url::parse(url).unwrap())
  }

  #[test]
  fn non_get_bypasses_regardless_of_destination() {
    let router = router();
    let mut request = get("https://backend.finny.app/rest/v1/expenses");
    request.method = Method::Post;
    assert_eq!(router.classify(&request), Route::Bypass);

    request.method = Method::Delete;
    assert_eq!(router.classify(&request), Route::Bypass);
  }

  #[test]
  fn hashed_chunks_bypass_even_as_script_destination() {
    let router = router();
    let request =
      get("https://finny.app/assets/index-BfT3xq.js").with_destination(Destination::Script);
    assert!(router.is_hashed_chunk(&request));
    assert_eq!(router.classify(&request), Route::Bypass);
  }

  #[test]
  fn navigations_resolve_to_the_app_shell() {
    let router = router();
    let request = Request::navigate(Url::parse("https://finny.app/budgets/march").unwrap());
    assert_eq!(router.classify(&request), Route::AppShell);
  }

  #[test]
  fn configured_backend_origin_is_a_data_request() {
    let router = router();
    let request = get("https://backend.finny.app/rest/v1/expenses?select=*");
    assert!(router.is_data_request(&request));
    assert_eq!(router.classify(&request), Route::NetworkFirstData);
  }

  #[test]
  fn api_path_on_app_origin_is_a_data_request() {
    let router = router();
    let request = get("https://finny.app/api/sync/expenses");
    assert!(router.is_data_request(&request));
    assert_eq!(router.classify(&request), Route::NetworkFirstData);
  }

  #[test]
  fn unlisted_origin_is_not_a_data_request() {
    let router = router();
    let request = get("https://cdn.example.com/rest/v1/expenses");
    assert!(!router.is_data_request(&request));
  }

  #[test]
  fn asset_destinations_are_cache_first() {
    let router = router();
    for destination in [
      Destination::Script,
      Destination::Style,
      Destination::Image,
      Destination::Font,
    ] {
      let request = get("https://finny.app/static/logo.png").with_destination(destination);
      assert_eq!(router.classify(&request), Route::CacheFirst);
    }
  }

  #[test]
  fn everything_else_defaults_to_network_first() {
    let router = router();
    let request = get("https://thirdparty.example/widget.json");
    assert_eq!(router.classify(&request), Route::NetworkFirst);
  }

  #[test]
  fn data_backend_wins_over_asset_destination() {
    // An image served by the hosted backend (receipt scan) is still a data
    // request: precedence is part of the contract.
    let router = router();
    let request =
      get("https://backend.finny.app/storage/receipt.png").with_destination(Destination::Image);
    assert_eq!(router.classify(&request), Route::NetworkFirstData);
  }
}
