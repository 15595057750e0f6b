mod app;

pub use app::{lookup, TestApp, TestRequest, TestResponse};
