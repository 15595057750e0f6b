//! The request capability set every host framework is adapted to.

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, COOKIE};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};
use percent_encoding::percent_decode_str;
use serde_json::{Map, Value};

use crate::media;

/// Uniform, read-only view over a host framework's request.
///
/// Every getter is async: some frameworks hand over already-buffered data,
/// others need to read a stream first. Callers always await.
///
/// Getters never fail. Missing data is an empty object or `None`; deciding
/// whether that is acceptable is the schema's job.
///
/// Implementations that read the body lazily must buffer it on first access
/// and serve every later call (including `json`, `form` and `text`) from
/// that buffer.
#[async_trait]
pub trait RequestAdapter: Send + Sync {
    /// Full request URI as received.
    async fn url(&self) -> String;

    async fn method(&self) -> Method;

    /// Header name (lowercase) → value.
    async fn headers(&self) -> Map<String, Value>;

    /// Query parameters; repeated keys become arrays.
    async fn query(&self) -> Map<String, Value>;

    /// Path parameters captured by the host router.
    async fn params(&self) -> Map<String, Value>;

    /// Raw body bytes.
    async fn body(&self) -> Bytes;

    /// Cookies parsed from the `cookie` header.
    async fn cookies(&self) -> Map<String, Value> {
        self.headers()
            .await
            .get(COOKIE.as_str())
            .and_then(Value::as_str)
            .map(parse_cookies)
            .unwrap_or_default()
    }

    async fn content_type(&self) -> Option<String> {
        self.headers()
            .await
            .get(CONTENT_TYPE.as_str())
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Body parsed as JSON; `None` when empty or malformed.
    async fn json(&self) -> Option<Value> {
        let body = self.body().await;
        if body.is_empty() {
            return None;
        }
        match serde_json::from_slice(&body) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(error = %e, "request body is not valid JSON");
                None
            }
        }
    }

    /// Body decoded as an urlencoded form.
    async fn form(&self) -> Map<String, Value> {
        let multipart = self
            .content_type()
            .await
            .is_some_and(|ct| media::is_multipart(&ct));
        if multipart {
            tracing::debug!("multipart body not supported by this adapter");
            return Map::new();
        }
        parse_form(&self.body().await)
    }

    /// Body as UTF-8 text; `None` when empty.
    async fn text(&self) -> Option<String> {
        let body = self.body().await;
        if body.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&body).into_owned())
        }
    }
}

// ── Helpers shared by adapters ─────────────────────────────

/// Fold key/value pairs into an object, turning repeated keys into arrays.
pub fn pairs_to_object(pairs: impl IntoIterator<Item = (String, String)>) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in pairs {
        match out.get_mut(&key) {
            None => {
                out.insert(key, Value::String(value));
            }
            Some(Value::Array(items)) => items.push(Value::String(value)),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(value)]);
            }
        }
    }
    out
}

/// Parse a query string into an object.
pub fn parse_query_string(query: Option<&str>) -> Map<String, Value> {
    match query {
        Some(q) => pairs_to_object(
            form_urlencoded::parse(q.as_bytes()).map(|(k, v)| (k.into_owned(), v.into_owned())),
        ),
        None => Map::new(),
    }
}

/// Decode an `application/x-www-form-urlencoded` body.
pub fn parse_form(body: &[u8]) -> Map<String, Value> {
    pairs_to_object(form_urlencoded::parse(body).map(|(k, v)| (k.into_owned(), v.into_owned())))
}

/// Parse a `cookie` header value (`a=1; b=2`). The first occurrence of a
/// name wins; values are percent-decoded and unquoted.
pub fn parse_cookies(header: &str) -> Map<String, Value> {
    let mut out = Map::new();
    for pair in header.split(';') {
        let Some((name, value)) = pair.split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() || out.contains_key(name) {
            continue;
        }
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        let decoded = percent_decode_str(value).decode_utf8_lossy().into_owned();
        out.insert(name.to_string(), Value::String(decoded));
    }
    out
}

/// Convert a header map into an object of lowercase names. Repeated headers
/// are joined with `", "` (`"; "` for cookies); non-UTF-8 values are skipped.
pub fn headers_to_object(headers: &HeaderMap) -> Map<String, Value> {
    let mut out = Map::new();
    for name in headers.keys() {
        let separator = if name == COOKIE { "; " } else { ", " };
        let values: Vec<&str> = headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        if !values.is_empty() {
            out.insert(name.as_str().to_string(), Value::String(values.join(separator)));
        }
    }
    out
}

pub fn params_to_object<'a>(params: impl IntoIterator<Item = (&'a str, &'a str)>) -> Map<String, Value> {
    params
        .into_iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect()
}

// ── Buffered adapter ───────────────────────────────────────

/// Adapter over an owned, fully buffered request.
///
/// Used by binders whose framework buffers the payload up front, and handy
/// for driving a [`Pipeline`](crate::Pipeline) directly in tests.
#[derive(Debug, Clone)]
pub struct BufferedRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    params: Vec<(String, String)>,
    body: Bytes,
    form: Option<Map<String, Value>>,
}

impl BufferedRequest {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            params: Vec::new(),
            body: Bytes::new(),
            form: None,
        }
    }

    pub fn get(uri: &str) -> Self {
        Self::new(Method::GET, uri.parse().unwrap_or_default())
    }

    pub fn post(uri: &str) -> Self {
        Self::new(Method::POST, uri.parse().unwrap_or_default())
    }

    pub fn from_parts(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        params: Vec<(String, String)>,
        body: Bytes,
    ) -> Self {
        Self {
            method,
            uri,
            headers,
            params,
            body,
            form: None,
        }
    }

    /// Append a header; invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Form fields decoded by the host framework, e.g. the text parts of a
    /// multipart body. Served by `form()` instead of the raw body.
    pub fn with_form(mut self, form: Map<String, Value>) -> Self {
        self.form = Some(form);
        self
    }

    /// Set a JSON body along with its content type.
    pub fn with_json(self, value: &Value) -> Self {
        self.with_header(CONTENT_TYPE.as_str(), media::APPLICATION_JSON)
            .with_body(value.to_string())
    }
}

#[async_trait]
impl RequestAdapter for BufferedRequest {
    async fn url(&self) -> String {
        self.uri.to_string()
    }

    async fn method(&self) -> Method {
        self.method.clone()
    }

    async fn headers(&self) -> Map<String, Value> {
        headers_to_object(&self.headers)
    }

    async fn query(&self) -> Map<String, Value> {
        parse_query_string(self.uri.query())
    }

    async fn params(&self) -> Map<String, Value> {
        params_to_object(self.params.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    async fn body(&self) -> Bytes {
        self.body.clone()
    }

    async fn form(&self) -> Map<String, Value> {
        if let Some(form) = &self.form {
            return form.clone();
        }
        let multipart = self
            .headers
            .get(CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .is_some_and(media::is_multipart);
        if multipart {
            tracing::debug!("multipart body was not decoded by the host framework");
            return Map::new();
        }
        parse_form(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn repeated_query_keys_become_arrays() {
        let q = parse_query_string(Some("tag=a&tag=b&page=2&name=hello%20world"));
        assert_eq!(Value::Object(q), json!({ "tag": ["a", "b"], "page": "2", "name": "hello world" }));
    }

    #[tokio::test]
    async fn decoded_form_fields_take_precedence_over_the_body() {
        let req = BufferedRequest::post("/items")
            .with_header("content-type", "multipart/form-data; boundary=XX")
            .with_body("--XX--\r\n");
        assert!(req.form().await.is_empty());

        let mut fields = Map::new();
        fields.insert("name".into(), json!("lamp"));
        let req = req.with_form(fields);
        assert_eq!(Value::Object(req.form().await), json!({ "name": "lamp" }));
    }

    #[test]
    fn cookies_are_split_and_decoded() {
        let c = parse_cookies("sessionId=abc123; theme=dark; quoted=\"x%20y\"; theme=light");
        assert_eq!(
            Value::Object(c),
            json!({ "sessionId": "abc123", "theme": "dark", "quoted": "x y" })
        );
    }
}
