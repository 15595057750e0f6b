use axum::body::Body;
use axum::Router;
use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, COOKIE};
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tower::util::ServiceExt;

/// In-process HTTP client over an axum [`Router`].
///
/// Requests go through `tower::ServiceExt::oneshot`; nothing binds a port.
///
/// ```ignore
/// let app = TestApp::new(router);
/// app.get("/items/1").send().await.assert_ok().assert_json_path("name", "lamp");
/// ```
#[derive(Clone)]
pub struct TestApp {
    router: Router,
}

impl TestApp {
    pub fn new(router: Router) -> Self {
        Self { router }
    }

    pub fn get(&self, path: &str) -> TestRequest<'_> {
        self.request(Method::GET, path)
    }

    pub fn post(&self, path: &str) -> TestRequest<'_> {
        self.request(Method::POST, path)
    }

    pub fn put(&self, path: &str) -> TestRequest<'_> {
        self.request(Method::PUT, path)
    }

    pub fn patch(&self, path: &str) -> TestRequest<'_> {
        self.request(Method::PATCH, path)
    }

    pub fn delete(&self, path: &str) -> TestRequest<'_> {
        self.request(Method::DELETE, path)
    }

    pub fn request(&self, method: Method, path: &str) -> TestRequest<'_> {
        TestRequest {
            app: self,
            method,
            path: path.to_string(),
            query: Vec::new(),
            cookies: Vec::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }
}

/// A request under construction. Finish with [`send`](TestRequest::send).
pub struct TestRequest<'a> {
    app: &'a TestApp,
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    cookies: Vec<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
}

impl TestRequest<'_> {
    /// Append a header. Panics on an invalid name or value.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        let name = HeaderName::from_bytes(name.as_bytes())
            .unwrap_or_else(|e| panic!("invalid header name {name:?}: {e}"));
        let value = HeaderValue::from_str(value)
            .unwrap_or_else(|e| panic!("invalid header value {value:?}: {e}"));
        self.headers.append(name, value);
        self
    }

    /// Append a query parameter; values are urlencoded on send.
    pub fn query(mut self, name: &str, value: impl ToString) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    /// Add a cookie; all cookies are sent in one `cookie` header.
    pub fn cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.push((name.to_string(), value.to_string()));
        self
    }

    /// JSON body with `content-type: application/json`.
    pub fn json(self, body: &impl Serialize) -> Self {
        let bytes = serde_json::to_vec(body).unwrap_or_else(|e| panic!("unserializable body: {e}"));
        self.body(bytes).content_type("application/json")
    }

    /// Urlencoded form body.
    pub fn form(self, fields: &[(&str, &str)]) -> Self {
        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        self.body(encoded).content_type("application/x-www-form-urlencoded")
    }

    /// Plain text body.
    pub fn text(self, text: &str) -> Self {
        self.body(text.to_string()).content_type("text/plain")
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    fn content_type(mut self, value: &'static str) -> Self {
        self.headers.insert(CONTENT_TYPE, HeaderValue::from_static(value));
        self
    }

    fn uri(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&self.query)
            .finish();
        let separator = if self.path.contains('?') { '&' } else { '?' };
        format!("{}{separator}{query}", self.path)
    }

    pub async fn send(mut self) -> TestResponse {
        if !self.cookies.is_empty() {
            let header = self
                .cookies
                .iter()
                .map(|(name, value)| format!("{name}={}", utf8_percent_encode(value, NON_ALPHANUMERIC)))
                .collect::<Vec<_>>()
                .join("; ");
            let value = HeaderValue::from_str(&header)
                .unwrap_or_else(|e| panic!("invalid cookie header {header:?}: {e}"));
            self.headers.insert(COOKIE, value);
        }

        let mut request = Request::builder()
            .method(self.method.clone())
            .uri(self.uri())
            .body(Body::from(self.body.clone()))
            .unwrap_or_else(|e| panic!("invalid request {} {}: {e}", self.method, self.path));
        *request.headers_mut() = self.headers;

        let response = self
            .app
            .router
            .clone()
            .oneshot(request)
            .await
            .unwrap_or_else(|e| match e {});

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .unwrap_or_else(|e| panic!("failed to read response body: {e}"))
            .to_bytes();

        TestResponse { status, headers, body }
    }
}

// ── Paths into JSON bodies ─────────────────────────────────

/// Resolve a dotted path such as `errors.body[0]` or `items.len()`.
///
/// Missing members resolve to `Value::Null`.
pub fn lookup(root: &Value, path: &str) -> Value {
    let (path, want_len) = match path.strip_suffix("len()") {
        Some(rest) => (rest.trim_end_matches('.'), true),
        None => (path, false),
    };

    let mut pointer = String::new();
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        let (field, indices) = match segment.find('[') {
            Some(at) => segment.split_at(at),
            None => (segment, ""),
        };
        if !field.is_empty() {
            pointer.push('/');
            pointer.push_str(&field.replace('~', "~0").replace('/', "~1"));
        }
        for index in indices.split(['[', ']']).filter(|s| !s.is_empty()) {
            pointer.push('/');
            pointer.push_str(index);
        }
    }

    let found = root.pointer(&pointer).cloned().unwrap_or(Value::Null);
    if !want_len {
        return found;
    }
    match &found {
        Value::Array(items) => Value::from(items.len()),
        Value::Object(map) => Value::from(map.len()),
        Value::String(s) => Value::from(s.chars().count()),
        other => panic!("len() of non-collection at {path:?}: {other}"),
    }
}

// ── Responses ──────────────────────────────────────────────

/// A fully buffered response with chainable assertions.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn assert_ok(self) -> Self {
        self.assert_status(StatusCode::OK)
    }

    pub fn assert_created(self) -> Self {
        self.assert_status(StatusCode::CREATED)
    }

    pub fn assert_bad_request(self) -> Self {
        self.assert_status(StatusCode::BAD_REQUEST)
    }

    pub fn assert_not_found(self) -> Self {
        self.assert_status(StatusCode::NOT_FOUND)
    }

    pub fn assert_server_error(self) -> Self {
        self.assert_status(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn assert_status(self, expected: StatusCode) -> Self {
        assert_eq!(
            self.status,
            expected,
            "unexpected status {} (wanted {expected})\nbody: {}",
            self.status,
            self.text()
        );
        self
    }

    /// Assert the value at `path` (see [`lookup`]) equals `expected`.
    pub fn assert_json_path(self, path: &str, expected: impl Into<Value>) -> Self {
        let root: Value = self.json();
        let actual = lookup(&root, path);
        let expected = expected.into();
        assert_eq!(actual, expected, "at {path:?} in {root}");
        self
    }

    pub fn assert_json_path_fn(self, path: &str, check: impl FnOnce(&Value) -> bool) -> Self {
        let root: Value = self.json();
        let actual = lookup(&root, path);
        assert!(check(&actual), "check failed at {path:?}: {actual}\nbody: {root}");
        self
    }

    pub fn assert_header(self, name: &str, expected: &str) -> Self {
        assert_eq!(self.header(name), Some(expected), "header {name}");
        self
    }

    pub fn json_path<T: DeserializeOwned>(&self, path: &str) -> T {
        let value = lookup(&self.json(), path);
        serde_json::from_value(value.clone())
            .unwrap_or_else(|e| panic!("cannot deserialize {path:?} ({value}): {e}"))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json<T: DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body)
            .unwrap_or_else(|e| panic!("body is not the expected JSON: {e}\nbody: {}", self.text()))
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
