use std::future::Future;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, on, MethodFilter, MethodRouter};
use axum::{Json, Router};
use http::request::Parts;
use http::StatusCode;
use oar_core::{
    merge_path, to_brace, Error, FactoryOptions, Helper, Input, OpenApiConfig, OpenApiRegistry, PathStyle,
    Payload, Pipeline, RouteFactory, RouteSpec,
};

use crate::adapter::{AxumRequest, DEFAULT_BODY_LIMIT};
use crate::error::ApiError;

/// Everything a handler receives: the validated input, the router state,
/// a response helper bound to the route and the request head.
pub struct Context<S> {
    pub input: Input,
    pub state: S,
    pub helper: Helper<Response>,
    pub parts: Parts,
}

/// Render a helper payload as an axum response.
pub fn render(payload: Payload, status: StatusCode) -> Response {
    match payload {
        Payload::Json(value) => (status, Json(value)).into_response(),
        Payload::Text(text) => (status, text).into_response(),
    }
}

/// Builds an axum [`Router`] whose routes are validated against, and
/// documented from, their [`RouteSpec`].
///
/// ```ignore
/// let app = AxumFactory::new()
///     .route(RouteSpec::get("/items/{id}").params(Schema::of::<ItemParams>()), get_item)
///     .doc("/doc", OpenApiConfig::new("Items", "1.0.0"))
///     .into_router()
///     .with_state(state);
/// ```
pub struct AxumFactory<S = ()> {
    core: RouteFactory,
    routes: Vec<(String, MethodRouter<S>)>,
    docs: Vec<(String, OpenApiConfig)>,
    body_limit: usize,
}

impl<S> Default for AxumFactory<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S> AxumFactory<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::with_options(FactoryOptions::default())
    }

    pub fn with_options(options: FactoryOptions) -> Self {
        Self {
            core: RouteFactory::with_options(options),
            routes: Vec::new(),
            docs: Vec::new(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Maximum number of body bytes buffered per request.
    pub fn body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn core(&self) -> &RouteFactory {
        &self.core
    }

    /// Access to the underlying factory, e.g. to register components.
    pub fn core_mut(&mut self) -> &mut RouteFactory {
        &mut self.core
    }

    pub fn registry(&self) -> &OpenApiRegistry {
        self.core.registry()
    }

    /// Register `handler` for `spec`.
    ///
    /// # Panics
    ///
    /// Panics if the path template is malformed or the method cannot be
    /// routed, like [`Router::route`] does for invalid paths.
    pub fn route<H, Fut, R, E>(self, spec: RouteSpec, handler: H) -> Self
    where
        H: Fn(Context<S>) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: IntoResponse,
        E: From<Error> + IntoResponse,
    {
        match self.try_route(spec, handler) {
            Ok(factory) => factory,
            Err(e) => panic!("invalid route: {e}"),
        }
    }

    pub fn try_route<H, Fut, R, E>(mut self, spec: RouteSpec, handler: H) -> Result<Self, Error>
    where
        H: Fn(Context<S>) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: IntoResponse,
        E: From<Error> + IntoResponse,
    {
        let filter = MethodFilter::try_from(spec.method.clone()).map_err(|_| Error::UnsupportedMethod {
            method: spec.method.to_string(),
            path: spec.path.clone(),
        })?;
        let pipeline = Arc::new(self.core.route(spec)?);
        let path = pipeline.spec().routing_path(PathStyle::Brace).to_string();
        let limit = self.body_limit;

        let endpoint = move |State(state): State<S>, req: Request| {
            let pipeline = pipeline.clone();
            let handler = handler.clone();
            async move { dispatch(pipeline, handler, state, req, limit).await }
        };
        self.routes.push((path, on(filter, endpoint)));
        Ok(self)
    }

    /// Mount `child` under `prefix`, merging its documentation.
    /// `prefix` may use any placeholder style.
    ///
    /// Child routes are re-mounted at the same merged paths the document
    /// lists, so `"/api/"` + `"/"` is served at `/api/`.
    pub fn router(mut self, prefix: &str, child: AxumFactory<S>) -> Self {
        self.core.merge(&child.core, prefix);
        if !child.docs.is_empty() {
            tracing::debug!(prefix, "document endpoints of nested factories are not mounted");
        }

        let prefix = to_brace(prefix);
        for (path, route) in child.routes {
            self.routes.push((merge_path(&prefix, &path), route));
        }
        self
    }

    /// Compose `child` at the root.
    pub fn merge(self, child: AxumFactory<S>) -> Self {
        self.router("/", child)
    }

    /// Serve the OpenAPI document at `path`.
    pub fn doc(mut self, path: &str, config: OpenApiConfig) -> Self {
        self.docs.push((path.to_string(), config));
        self
    }

    /// Finish the router. The registry is frozen here; document endpoints
    /// render from this snapshot.
    pub fn into_router(self) -> Router<S> {
        let registry = Arc::new(self.core.into_registry());
        let mut router = Router::new();
        for (path, route) in self.routes {
            router = router.route(&path, route);
        }
        for (path, config) in self.docs {
            let registry = registry.clone();
            let config = Arc::new(config);
            router = router.route(
                &path,
                get(move || {
                    let registry = registry.clone();
                    let config = config.clone();
                    async move { serve_document(&config, &registry) }
                }),
            );
        }
        router
    }
}

async fn dispatch<S, H, Fut, R, E>(
    pipeline: Arc<Pipeline>,
    handler: H,
    state: S,
    req: Request,
    limit: usize,
) -> Response
where
    H: Fn(Context<S>) -> Fut,
    Fut: Future<Output = Result<R, E>>,
    R: IntoResponse,
    E: From<Error> + IntoResponse,
{
    let adapter = AxumRequest::from_request(req, limit).await;
    let input = match pipeline.run(&adapter).await {
        Ok(input) => input,
        Err(e) => return E::from(Error::from(e)).into_response(),
    };

    let ctx = Context {
        input,
        state,
        helper: pipeline.helper(render),
        parts: adapter.into_parts(),
    };
    match handler(ctx).await {
        Ok(response) => response.into_response(),
        Err(e) => e.into_response(),
    }
}

fn serve_document(config: &OpenApiConfig, registry: &OpenApiRegistry) -> Response {
    match oar_core::build_document(config, registry) {
        Ok(document) => Json(document).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to build OpenAPI document");
            ApiError::from(Error::from(e)).into_response()
        }
    }
}
