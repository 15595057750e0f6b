use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use actix_web::http::Method as ActixMethod;
use actix_web::{web, HttpRequest, HttpResponse, Responder, ResponseError};
use http::StatusCode;
use oar_core::{
    merge_path, to_brace, Error, FactoryOptions, Helper, Input, OpenApiConfig, OpenApiRegistry,
    PathStyle, Payload, Pipeline, RouteFactory, RouteSpec,
};

use crate::adapter::{snapshot, DEFAULT_BODY_LIMIT};
use crate::error::{actix_status, ApiError};

/// What an actix handler receives. App data is reachable through
/// [`Context::data`].
pub struct Context {
    pub input: Input,
    pub helper: Helper<HttpResponse>,
    pub request: HttpRequest,
}

impl Context {
    pub fn data<T: 'static>(&self) -> Option<&web::Data<T>> {
        self.request.app_data::<web::Data<T>>()
    }
}

/// Render a helper payload as an actix response.
pub fn render(payload: Payload, status: StatusCode) -> HttpResponse {
    HttpResponse::build(actix_status(status))
        .content_type(payload.content_type())
        .body(payload.into_bytes())
}

type Endpoint = Arc<
    dyn Fn(HttpRequest, web::Payload) -> Pin<Box<dyn Future<Output = HttpResponse>>> + Send + Sync,
>;

struct Mounted {
    method: ActixMethod,
    path: String,
    endpoint: Endpoint,
}

/// Collects validated, documented routes for an actix-web `App`.
///
/// Routes are registered through a [`ServiceConfig`](web::ServiceConfig), so
/// the finished [`OarService`] is cloned into every worker:
///
/// ```ignore
/// let service = ActixFactory::new()
///     .route(RouteSpec::get("/items/{id}").params(Schema::of::<ItemParams>()), get_item)
///     .doc("/doc", OpenApiConfig::new("Items", "1.0.0"))
///     .build();
/// HttpServer::new(move || {
///     let service = service.clone();
///     App::new().configure(move |cfg| service.configure(cfg))
/// })
/// ```
pub struct ActixFactory {
    core: RouteFactory,
    routes: Vec<Mounted>,
    docs: Vec<(String, OpenApiConfig)>,
    body_limit: usize,
}

impl Default for ActixFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ActixFactory {
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

    pub fn body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn core(&self) -> &RouteFactory {
        &self.core
    }

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
    /// Panics if the path template is malformed.
    pub fn route<H, Fut, R, E>(self, spec: RouteSpec, handler: H) -> Self
    where
        H: Fn(Context) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + 'static,
        R: Responder + 'static,
        E: From<Error> + ResponseError + 'static,
    {
        match self.try_route(spec, handler) {
            Ok(factory) => factory,
            Err(e) => panic!("invalid route: {e}"),
        }
    }

    pub fn try_route<H, Fut, R, E>(mut self, spec: RouteSpec, handler: H) -> Result<Self, Error>
    where
        H: Fn(Context) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + 'static,
        R: Responder + 'static,
        E: From<Error> + ResponseError + 'static,
    {
        let method = ActixMethod::from_bytes(spec.method.as_str().as_bytes()).map_err(|_| {
            Error::UnsupportedMethod {
                method: spec.method.to_string(),
                path: spec.path.clone(),
            }
        })?;
        let pipeline = Arc::new(self.core.route(spec)?);
        let path = pipeline.spec().routing_path(PathStyle::Brace).to_string();
        let limit = self.body_limit;

        let endpoint: Endpoint = Arc::new(
            move |req: HttpRequest, payload: web::Payload| -> Pin<Box<dyn Future<Output = HttpResponse>>> {
                Box::pin(dispatch(pipeline.clone(), handler.clone(), req, payload, limit))
            },
        );
        self.routes.push(Mounted {
            method,
            path,
            endpoint,
        });
        Ok(self)
    }

    /// Mount `child` under `prefix`, merging its documentation.
    pub fn scope(mut self, prefix: &str, child: ActixFactory) -> Self {
        self.core.merge(&child.core, prefix);
        if !child.docs.is_empty() {
            tracing::debug!(prefix, "document endpoints of nested factories are not mounted");
        }

        let prefix = to_brace(prefix);
        for mut route in child.routes {
            route.path = merge_path(&prefix, &route.path);
            self.routes.push(route);
        }
        self
    }

    pub fn merge(self, child: ActixFactory) -> Self {
        self.scope("/", child)
    }

    /// Serve the OpenAPI document at `path`.
    pub fn doc(mut self, path: &str, config: OpenApiConfig) -> Self {
        self.docs.push((path.to_string(), config));
        self
    }

    /// Freeze the registry and the route table.
    pub fn build(self) -> OarService {
        OarService {
            routes: Arc::new(self.routes),
            docs: Arc::new(
                self.docs
                    .into_iter()
                    .map(|(path, config)| (path, Arc::new(config)))
                    .collect(),
            ),
            registry: Arc::new(self.core.into_registry()),
        }
    }
}

/// The finished route table; cheap to clone into each worker.
#[derive(Clone)]
pub struct OarService {
    routes: Arc<Vec<Mounted>>,
    docs: Arc<Vec<(String, Arc<OpenApiConfig>)>>,
    registry: Arc<OpenApiRegistry>,
}

impl OarService {
    pub fn registry(&self) -> &OpenApiRegistry {
        &self.registry
    }

    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        for route in self.routes.iter() {
            let endpoint = route.endpoint.clone();
            cfg.route(
                &route.path,
                web::method(route.method.clone())
                    .to(move |req: HttpRequest, payload: web::Payload| endpoint(req, payload)),
            );
        }

        for (path, config) in self.docs.iter() {
            let registry = self.registry.clone();
            let config = config.clone();
            cfg.route(
                path,
                web::get().to(move || {
                    let registry = registry.clone();
                    let config = config.clone();
                    async move { serve_document(&config, &registry) }
                }),
            );
        }
    }
}

async fn dispatch<H, Fut, R, E>(
    pipeline: Arc<Pipeline>,
    handler: H,
    req: HttpRequest,
    payload: web::Payload,
    limit: usize,
) -> HttpResponse
where
    H: Fn(Context) -> Fut,
    Fut: Future<Output = Result<R, E>>,
    R: Responder,
    E: From<Error> + ResponseError,
{
    let adapter = snapshot(&req, payload, limit).await;
    let input = match pipeline.run(&adapter).await {
        Ok(input) => input,
        Err(e) => return E::from(Error::from(e)).error_response(),
    };

    let ctx = Context {
        input,
        helper: pipeline.helper(render),
        request: req.clone(),
    };
    match handler(ctx).await {
        Ok(response) => response.respond_to(&req).map_into_boxed_body(),
        Err(e) => e.error_response(),
    }
}

fn serve_document(config: &OpenApiConfig, registry: &OpenApiRegistry) -> HttpResponse {
    match oar_core::build_document(config, registry) {
        Ok(document) => HttpResponse::Ok().json(document),
        Err(e) => {
            tracing::warn!(error = %e, "failed to build OpenAPI document");
            ApiError::from(Error::from(e)).error_response()
        }
    }
}
