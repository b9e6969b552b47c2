//! Request and response types seen by the proxy.

use url::Url;

/// How the page issued a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RequestMode {
  /// Top-level page navigation
  Navigate,
  #[default]
  Cors,
  NoCors,
  SameOrigin,
}

/// What the requested resource will be used as.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Destination {
  Document,
  Script,
  Style,
  Image,
  Font,
  Manifest,
  #[default]
  Empty,
}

/// An outgoing request intercepted by the proxy.
#[derive(Debug, Clone)]
pub struct Request {
  pub method: String,
  pub url: Url,
  pub headers: Vec<(String, String)>,
  pub mode: RequestMode,
  pub destination: Destination,
}

impl Request {
  /// A plain GET for a subresource.
  pub fn get(url: Url) -> Self {
    Self {
      method: "GET".to_string(),
      url,
      headers: Vec::new(),
      mode: RequestMode::default(),
      destination: Destination::default(),
    }
  }

  /// A GET issued by a top-level page navigation.
  pub fn navigate(url: Url) -> Self {
    Self::get(url)
      .with_mode(RequestMode::Navigate)
      .with_destination(Destination::Document)
      .with_header("Accept", "text/html")
  }

  pub fn with_method(mut self, method: &str) -> Self {
    self.method = method.to_uppercase();
    self
  }

  pub fn with_header(mut self, name: &str, value: &str) -> Self {
    self.headers.push((name.to_string(), value.to_string()));
    self
  }

  pub fn with_mode(mut self, mode: RequestMode) -> Self {
    self.mode = mode;
    self
  }

  pub fn with_destination(mut self, destination: Destination) -> Self {
    self.destination = destination;
    self
  }

  pub fn is_get(&self) -> bool {
    self.method.eq_ignore_ascii_case("GET")
  }

  /// Look up a header value (case-insensitive name).
  pub fn header(&self, name: &str) -> Option<&str> {
    find_header(&self.headers, name)
  }

  /// Whether this request loads a page document.
  ///
  /// Any of the navigation mode, a document destination, or an `Accept`
  /// header asking for HTML marks the request as a navigation.
  pub fn is_navigation(&self) -> bool {
    self.mode == RequestMode::Navigate
      || self.destination == Destination::Document
      || self
        .header("accept")
        .is_some_and(|accept| accept.contains("text/html"))
  }
}

/// A response from the network or the cache store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
  pub status: u16,
  pub status_text: String,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
}

impl Response {
  pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
    let status_text = reqwest::StatusCode::from_u16(status)
      .ok()
      .and_then(|s| s.canonical_reason())
      .unwrap_or_default()
      .to_string();

    Self {
      status,
      status_text,
      headers: Vec::new(),
      body: body.into(),
    }
  }

  /// A 200 response with the given body.
  pub fn ok(body: impl Into<Vec<u8>>) -> Self {
    Self::new(200, body)
  }

  /// The response synthesized when a subresource can't be reached offline.
  pub fn offline() -> Self {
    Self::new(503, "Offline").with_header("Content-Type", "text/plain")
  }

  pub fn with_header(mut self, name: &str, value: &str) -> Self {
    self.headers.push((name.to_string(), value.to_string()));
    self
  }

  /// Look up a header value (case-insensitive name).
  pub fn header(&self, name: &str) -> Option<&str> {
    find_header(&self.headers, name)
  }

  /// Status in the 2xx range.
  pub fn is_ok(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
  headers
    .iter()
    .find(|(k, _)| k.eq_ignore_ascii_case(name))
    .map(|(_, v)| v.as_str())
}
