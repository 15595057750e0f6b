use std::sync::Arc;

use axum::http::StatusCode;
use axum::Router;
use oar::axum::{ApiResult, AxumFactory, Context};
use oar::{Error, HttpError, OarConfig, RouteSpec, Schema, StatusKey};
use serde_json::json;

use crate::models::{ApiKey, Item, ItemId, ItemList, ListQuery, NewItem};
use crate::store::ItemStore;

#[derive(Clone)]
pub struct AppState {
    pub store: ItemStore,
    pub api_key: Arc<str>,
}

impl AppState {
    pub fn new(api_key: &str) -> Self {
        Self {
            store: ItemStore::new(),
            api_key: Arc::from(api_key),
        }
    }
}

async fn health(ctx: Context<AppState>) -> ApiResult {
    Ok(ctx.helper.text("ok")?)
}

async fn list_items(ctx: Context<AppState>) -> ApiResult {
    let query = ctx.input.query::<ListQuery>();
    let tag = query.and_then(|q| q.tag.as_deref());
    let limit = query.and_then(|q| q.limit);

    let items = ctx.state.store.list(tag, limit).await;
    let total = items.len();
    Ok(ctx.helper.json(&ItemList { items, total })?)
}

async fn get_item(ctx: Context<AppState>) -> ApiResult {
    let id = path_id(&ctx)?;
    match ctx.state.store.get(id).await {
        Some(item) => Ok(ctx.helper.json(&item)?),
        None => Err(HttpError::not_found(format!("item {id} not found")).into()),
    }
}

async fn create_item(mut ctx: Context<AppState>) -> ApiResult {
    let new: NewItem = ctx
        .input
        .take_body()
        .ok_or_else(|| HttpError::internal("item body missing"))?;
    let item = ctx.state.store.create(new).await;
    tracing::info!(id = item.id, name = %item.name, "item created");
    Ok(ctx.helper.json_with_status(StatusCode::CREATED, &item)?)
}

async fn delete_item(ctx: Context<AppState>) -> ApiResult<StatusCode> {
    let key = ctx.input.headers::<ApiKey>().map(|h| h.key.as_str());
    if key != Some(&*ctx.state.api_key) {
        return Err(HttpError::unauthorized("invalid api key").into());
    }

    let id = path_id(&ctx)?;
    if ctx.state.store.delete(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(HttpError::not_found(format!("item {id} not found")).into())
    }
}

fn path_id(ctx: &Context<AppState>) -> Result<u64, HttpError> {
    ctx.input
        .params::<ItemId>()
        .map(|p| p.id)
        .ok_or_else(|| HttpError::internal("path parameters missing"))
}

/// Routes under `/api`.
fn items(config: &OarConfig) -> Result<AxumFactory<AppState>, Error> {
    let mut factory = AxumFactory::with_options(config.factory.clone());
    let item = factory.core_mut().schema::<Item>();
    factory.core_mut().component(
        "securitySchemes",
        "apiKey",
        json!({ "type": "apiKey", "in": "header", "name": "x-api-key" }),
    );
    factory.core_mut().webhook(
        "itemCreated",
        RouteSpec::post("/item-created")
            .summary("Sent after an item is created")
            .json_body(item.clone())
            .response(200, "Acknowledged"),
    )?;

    Ok(factory
        .route(
            RouteSpec::get("/items")
                .operation_id("listItems")
                .tag("items")
                .query(Schema::of::<ListQuery>())
                .json_response(200, "Matching items", Schema::of::<ItemList>()),
            list_items,
        )
        .route(
            RouteSpec::post("/items")
                .operation_id("createItem")
                .tag("items")
                .json_body(Schema::validated::<NewItem>())
                .json_response(201, "Created item", item.clone())
                .response(StatusKey::Class(4), "Invalid item"),
            create_item,
        )
        .route(
            RouteSpec::get("/items/{id}")
                .operation_id("getItem")
                .tag("items")
                .params(Schema::of::<ItemId>())
                .json_response(200, "The item", item)
                .response(404, "No such item"),
            get_item,
        )
        .route(
            RouteSpec::delete("/items/{id}")
                .operation_id("deleteItem")
                .tag("items")
                .params(Schema::of::<ItemId>())
                .headers(Schema::of::<ApiKey>())
                .security("apiKey", &[])
                .response(204, "Deleted")
                .response(401, "Missing or wrong api key")
                .response(404, "No such item"),
            delete_item,
        ))
}

/// The complete application router.
pub fn app(config: &OarConfig, state: AppState) -> Result<Router, Error> {
    Ok(AxumFactory::with_options(config.factory.clone())
        .route(
            RouteSpec::get("/health")
                .operation_id("health")
                .text_response(200, "Service is up", Schema::of::<String>()),
            health,
        )
        .router("/api", items(config)?)
        .doc("/doc", config.openapi.clone())
        .into_router()
        .with_state(state))
}
