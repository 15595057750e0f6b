use actix_multipart::Multipart;
use actix_web::error::PayloadError;
use actix_web::http::header::{self as actix_header, HeaderMap as ActixHeaderMap};
use actix_web::{web, HttpRequest};
use bytes::{Bytes, BytesMut};
use futures_util::{stream, StreamExt};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};
use oar_core::adapter::pairs_to_object;
use oar_core::{media, BufferedRequest};
use serde_json::{Map, Value};

/// Bodies larger than this are dropped unless the factory says otherwise.
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Snapshot an actix request into a [`BufferedRequest`].
///
/// `HttpRequest` is tied to its worker thread, while the validation pipeline
/// needs a `Send + Sync` adapter, so the head is copied into `http` types and
/// the body is read up front. Text fields of a `multipart/form-data` body
/// are decoded here as well.
pub async fn snapshot(req: &HttpRequest, payload: web::Payload, limit: usize) -> BufferedRequest {
    let method = Method::from_bytes(req.method().as_str().as_bytes()).unwrap_or_default();
    let uri: Uri = req.uri().to_string().parse().unwrap_or_default();
    let params = req
        .match_info()
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();

    let body = read_body(payload, limit).await;
    let multipart = req
        .headers()
        .get(actix_header::CONTENT_TYPE)
        .and_then(|ct| ct.to_str().ok())
        .is_some_and(media::is_multipart);
    let form = if multipart {
        Some(text_fields(req.headers(), body.clone()).await)
    } else {
        None
    };

    let request = BufferedRequest::from_parts(method, uri, copy_headers(req), params, body);
    match form {
        Some(form) => request.with_form(form),
        None => request,
    }
}

/// Collect the text fields of a buffered multipart body. File parts are
/// skipped.
pub async fn text_fields(headers: &ActixHeaderMap, body: Bytes) -> Map<String, Value> {
    let mut multipart = Multipart::new(headers, stream::once(async move { Ok::<_, PayloadError>(body) }));

    let mut pairs = Vec::new();
    while let Some(field) = multipart.next().await {
        let mut field = match field {
            Ok(field) => field,
            Err(e) => {
                tracing::debug!(error = %e, "malformed multipart body");
                break;
            }
        };
        let Some(disposition) = field.content_disposition() else {
            continue;
        };
        let Some(name) = disposition.get_name().map(str::to_string) else {
            continue;
        };
        let is_file = disposition.get_filename().is_some();

        let mut value = BytesMut::new();
        while let Some(chunk) = field.next().await {
            match chunk {
                Ok(chunk) => value.extend_from_slice(&chunk),
                Err(e) => {
                    tracing::debug!(field = %name, error = %e, "unreadable multipart field");
                    return pairs_to_object(pairs);
                }
            }
        }
        if is_file {
            tracing::trace!(field = %name, "skipping file part");
            continue;
        }
        pairs.push((name, String::from_utf8_lossy(&value).into_owned()));
    }
    pairs_to_object(pairs)
}

fn copy_headers(req: &HttpRequest) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(req.headers().len());
    for (name, value) in req.headers().iter() {
        let name = HeaderName::from_bytes(name.as_str().as_bytes());
        let value = HeaderValue::from_bytes(value.as_bytes());
        if let (Ok(name), Ok(value)) = (name, value) {
            headers.append(name, value);
        }
    }
    headers
}

/// Drain `payload`, giving up (empty body) past `limit` bytes or on a
/// transport error.
pub async fn read_body(mut payload: web::Payload, limit: usize) -> Bytes {
    let mut buf = BytesMut::new();
    while let Some(chunk) = payload.next().await {
        match chunk {
            Ok(chunk) => {
                if buf.len() + chunk.len() > limit {
                    tracing::warn!(limit, "request body exceeds limit, treating it as empty");
                    return Bytes::new();
                }
                buf.extend_from_slice(&chunk);
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to read request body");
                return Bytes::new();
            }
        }
    }
    buf.freeze()
}
