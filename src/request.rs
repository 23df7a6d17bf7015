//! Request options and outcomes for [`SessionClient::authenticated_request`].
//!
//! [`SessionClient::authenticated_request`]: crate::SessionClient::authenticated_request

use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// How to issue one request: method, optional JSON body, extra headers.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<serde_json::Value>,
    pub headers: HeaderMap,
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            body: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    /// A POST without a body.
    pub fn post_empty() -> Self {
        Self::new(Method::POST)
    }

    pub fn post(body: serde_json::Value) -> Self {
        Self::new(Method::POST).with_body(body)
    }

    pub fn put(body: serde_json::Value) -> Self {
        Self::new(Method::PUT).with_body(body)
    }

    /// Serializes `body` into a POST.
    pub fn post_json<B: Serialize + ?Sized>(body: &B) -> Result<Self> {
        Ok(Self::post(serde_json::to_value(body)?))
    }

    /// Serializes `body` into a PUT.
    pub fn put_json<B: Serialize + ?Sized>(body: &B) -> Result<Self> {
        Ok(Self::put(serde_json::to_value(body)?))
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Adds a header.  Headers set here win over the client's defaults.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::get()
    }
}

/// A successful response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// The response declared a JSON content type.
    Json(serde_json::Value),
    /// Anything else, as text.
    Text(String),
}

impl ResponseBody {
    /// Decodes the body into `T`.  Text bodies are parsed as JSON too, for
    /// servers that forget the content type.
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T> {
        match self {
            ResponseBody::Json(value) => serde_json::from_value(value).map_err(|err| {
                Error::serialization(
                    format!("Failed to parse response: {err}"),
                    Some(Box::new(err)),
                )
            }),
            ResponseBody::Text(text) => serde_json::from_str(&text).map_err(|err| {
                Error::serialization(
                    format!("Failed to parse response: {err}"),
                    Some(Box::new(err)),
                )
            }),
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Json(_) => None,
            ResponseBody::Text(text) => Some(text),
        }
    }
}

/// The three ways an authenticated request can end.
///
/// `Unauthenticated` means the session expired and could not be refreshed;
/// stored credentials have already been cleared and the caller decides where
/// to send the user next.
#[derive(Debug, Clone)]
pub enum RequestOutcome<T> {
    Success(T),
    Unauthenticated,
    Failed(Error),
}

impl<T> RequestOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, RequestOutcome::Success(_))
    }

    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, RequestOutcome::Unauthenticated)
    }

    /// Collapses the outcome into a `Result`, mapping `Unauthenticated` to
    /// [`Error::Unauthenticated`].
    pub fn into_result(self) -> Result<T> {
        match self {
            RequestOutcome::Success(value) => Ok(value),
            RequestOutcome::Unauthenticated => Err(Error::Unauthenticated),
            RequestOutcome::Failed(err) => Err(err),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RequestOutcome<U> {
        match self {
            RequestOutcome::Success(value) => RequestOutcome::Success(f(value)),
            RequestOutcome::Unauthenticated => RequestOutcome::Unauthenticated,
            RequestOutcome::Failed(err) => RequestOutcome::Failed(err),
        }
    }
}

impl<T> From<Result<T>> for RequestOutcome<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => RequestOutcome::Success(value),
            Err(Error::Unauthenticated) => RequestOutcome::Unauthenticated,
            Err(err) => RequestOutcome::Failed(err),
        }
    }
}
