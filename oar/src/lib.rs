//! oar: OpenAPI-described routes for Rust web frameworks.
//!
//! Each route is declared once as a [`RouteSpec`]: its parameters, body and
//! responses are schemas. The same declaration validates incoming requests,
//! optionally checks outgoing responses, and feeds the generated OpenAPI 3.1
//! document.
//!
//! ```ignore
//! use oar::prelude::*;
//! ```
//!
//! # Feature flags
//!
//! | Feature     | Default | Crate                    |
//! |-------------|---------|--------------------------|
//! | `axum`      | **yes** | `oar-axum`               |
//! | `actix`     | no      | `oar-actix`              |
//! | `full`      | no      | Both binders             |

// Everything from oar-core at the top level.
pub use oar_core::*;

#[cfg(feature = "axum")]
pub use oar_axum as axum;

#[cfg(feature = "actix")]
pub use oar_actix as actix;

/// Unified prelude, `use oar::prelude::*`.
///
/// Binder types are not glob-exported since both binders name their
/// handler context `Context`; reach them as `oar::axum::*` or
/// `oar::actix::*`.
pub mod prelude {
    pub use oar_core::{
        FactoryOptions, HandlerResponse, HttpError, Input, OarConfig, OpenApiConfig, RouteSpec,
        Schema, ServerConfig, StatusKey, Target,
    };

    #[cfg(feature = "axum")]
    pub use oar_axum::{ApiResult, AxumFactory};

    #[cfg(feature = "actix")]
    pub use oar_actix::ActixFactory;
}
