use std::sync::Mutex;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::{FromRequestParts, RawPathParams, Request};
use bytes::Bytes;
use http::request::Parts;
use http::Method;
use oar_core::adapter::{headers_to_object, params_to_object, parse_query_string};
use oar_core::RequestAdapter;
use serde_json::{Map, Value};
use tokio::sync::OnceCell;

/// Default cap on buffered request bodies: 2 MiB.
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// [`RequestAdapter`] over an axum request.
///
/// The body stream is taken on the first [`body`](RequestAdapter::body)
/// call and buffered; every later read is served from the buffer.
pub struct AxumRequest {
    parts: Parts,
    params: Vec<(String, String)>,
    body: Mutex<Option<Body>>,
    buffered: OnceCell<Bytes>,
    limit: usize,
}

impl AxumRequest {
    /// Split `req` and capture the path parameters matched by the router.
    pub async fn from_request(req: Request, limit: usize) -> Self {
        let (mut parts, body) = req.into_parts();
        let params = match RawPathParams::from_request_parts(&mut parts, &()).await {
            Ok(raw) => raw
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            Err(rejection) => {
                tracing::trace!(%rejection, "no path parameters");
                Vec::new()
            }
        };
        Self {
            parts,
            params,
            body: Mutex::new(Some(body)),
            buffered: OnceCell::new(),
            limit,
        }
    }

    pub fn parts(&self) -> &Parts {
        &self.parts
    }

    pub fn into_parts(self) -> Parts {
        self.parts
    }

    fn take_body(&self) -> Option<Body> {
        self.body.lock().ok().and_then(|mut body| body.take())
    }
}

#[async_trait]
impl RequestAdapter for AxumRequest {
    async fn url(&self) -> String {
        self.parts.uri.to_string()
    }

    async fn method(&self) -> Method {
        self.parts.method.clone()
    }

    async fn headers(&self) -> Map<String, Value> {
        headers_to_object(&self.parts.headers)
    }

    async fn query(&self) -> Map<String, Value> {
        parse_query_string(self.parts.uri.query())
    }

    async fn params(&self) -> Map<String, Value> {
        params_to_object(self.params.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    async fn body(&self) -> Bytes {
        self.buffered
            .get_or_init(|| async {
                let Some(body) = self.take_body() else {
                    return Bytes::new();
                };
                match axum::body::to_bytes(body, self.limit).await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::warn!(error = %e, limit = self.limit, "failed to buffer request body");
                        Bytes::new()
                    }
                }
            })
            .await
            .clone()
    }

    /// Urlencoded bodies as usual; `multipart/form-data` keeps its text
    /// fields.
    async fn form(&self) -> Map<String, Value> {
        let content_type = self.content_type().await;
        let body = self.body().await;
        match content_type {
            Some(ct) if oar_core::media::is_multipart(&ct) => multipart::text_fields(ct, body).await,
            _ => oar_core::adapter::parse_form(&body),
        }
    }
}

mod multipart {
    use axum::body::Body;
    use axum::extract::{FromRequest, Multipart, Request};
    use bytes::Bytes;
    use http::header::CONTENT_TYPE;
    use oar_core::adapter::pairs_to_object;
    use serde_json::{Map, Value};

    /// Collect the text fields of a multipart body. File parts are skipped.
    pub(super) async fn text_fields(content_type: String, body: Bytes) -> Map<String, Value> {
        let request = match Request::builder()
            .header(CONTENT_TYPE, content_type)
            .body(Body::from(body))
        {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(error = %e, "invalid multipart content type");
                return Map::new();
            }
        };
        let mut multipart = match Multipart::from_request(request, &()).await {
            Ok(multipart) => multipart,
            Err(rejection) => {
                tracing::debug!(%rejection, "rejected multipart body");
                return Map::new();
            }
        };

        let mut pairs = Vec::new();
        loop {
            match multipart.next_field().await {
                Ok(Some(field)) => {
                    let Some(name) = field.name().map(str::to_string) else {
                        continue;
                    };
                    if field.file_name().is_some() {
                        tracing::trace!(field = %name, "skipping file part");
                        continue;
                    }
                    match field.text().await {
                        Ok(text) => pairs.push((name, text)),
                        Err(e) => {
                            tracing::debug!(field = %name, error = %e, "unreadable multipart field");
                            break;
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(error = %e, "malformed multipart body");
                    break;
                }
            }
        }
        pairs_to_object(pairs)
    }
}
