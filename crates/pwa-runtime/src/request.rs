//! Request and response model seen by the fetch handler.

use hashbrown::HashMap;
use http::{Method, StatusCode};
use url::{Position, Url};

use crate::cache::CacheEntry;

/// Request mode, as exposed by `Request.mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Full document load.
    Navigate,
    SameOrigin,
    #[default]
    NoCors,
    Cors,
}

/// Request destination, as exposed by `Request.destination`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Destination {
    /// `""`, used by `fetch()` and XHR.
    #[default]
    Empty,
    Document,
    Script,
    Style,
    Worker,
    Image,
    Font,
    Manifest,
    Other,
}

impl Destination {
    /// The DOM string for this destination.
    pub fn as_str(&self) -> &'static str {
        match self {
            Destination::Empty => "",
            Destination::Document => "document",
            Destination::Script => "script",
            Destination::Style => "style",
            Destination::Worker => "worker",
            Destination::Image => "image",
            Destination::Font => "font",
            Destination::Manifest => "manifest",
            Destination::Other => "other",
        }
    }

    /// Code and styles that make up the app shell.
    pub fn is_static(&self) -> bool {
        matches!(
            self,
            Destination::Style | Destination::Script | Destination::Worker
        )
    }

    /// Images and fonts.
    pub fn is_media(&self) -> bool {
        matches!(self, Destination::Image | Destination::Font)
    }
}

/// An intercepted request.
#[derive(Debug, Clone)]
pub struct Request {
    pub url: Url,
    pub method: Method,
    pub mode: RequestMode,
    pub destination: Destination,
    pub headers: HashMap<String, String>,
}

impl Request {
    /// A plain `fetch(url)` GET.
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: Method::GET,
            mode: RequestMode::Cors,
            destination: Destination::Empty,
            headers: HashMap::new(),
        }
    }

    /// A top-level document navigation.
    pub fn navigate(url: Url) -> Self {
        Self {
            mode: RequestMode::Navigate,
            destination: Destination::Document,
            ..Self::get(url)
        }
    }

    /// A subresource load for the given destination.
    pub fn subresource(url: Url, destination: Destination) -> Self {
        Self {
            mode: RequestMode::NoCors,
            destination,
            ..Self::get(url)
        }
    }

    /// Replace the method.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Add a header.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    /// Key under which responses to this request are stored. The fragment
    /// never leaves the page, so it is not part of the key.
    pub fn cache_key(&self) -> &str {
        &self.url[..Position::AfterQuery]
    }
}

/// Response handed back to the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// Status code.
    pub status: u16,

    /// Status text.
    pub status_text: String,

    /// Response headers.
    pub headers: HashMap<String, String>,

    /// Response body.
    pub body: Vec<u8>,

    /// Whether from cache.
    pub from_cache: bool,
}

impl FetchResponse {
    /// Create a network response with the canonical status text.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            status_text: status_text(status),
            headers: HashMap::new(),
            body: body.into(),
            from_cache: false,
        }
    }

    /// Create a network error response.
    pub fn network_error() -> Self {
        Self {
            status: 0,
            status_text: "Network Error".to_string(),
            headers: HashMap::new(),
            body: Vec::new(),
            from_cache: false,
        }
    }

    /// The synthesized response served when neither network nor cache can answer.
    pub fn offline() -> Self {
        Self {
            status: 503,
            status_text: "Service Unavailable".to_string(),
            headers: HashMap::new(),
            body: b"Offline".to_vec(),
            from_cache: false,
        }
        .with_header("content-type", "text/plain")
    }

    /// Create a response from cache entry.
    pub fn from_cache(entry: &CacheEntry) -> Self {
        Self {
            status: entry.status,
            status_text: status_text(entry.status),
            headers: entry.headers.clone(),
            body: entry.body.clone(),
            from_cache: true,
        }
    }

    /// Add a header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    /// Check if the response was successful (2xx).
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as UTF-8 text, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

fn status_text(status: u16) -> String {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("")
        .to_string()
}
