//! HTTP surface. One generic set of handlers serves every [`CRUDResource`]; each request
//! runs in its own session on the resource's backend.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use utoipa::OpenApi;

use crate::binding::{SchemaBinding, Strictness};
use crate::config::Settings;
use crate::core::{BulkResult, CRUDResource, CrudEngine};
use crate::errors::ApiError;
use crate::filter::{FilterSet, FilterSpec, NamedFilter, NamedFilters};
use crate::models::{BatchUpdateParams, IndexResponse, ListParams};
use crate::pagination::calculate_content_range;
use crate::resources::{Car, CarCreate, CarUpdate};
use crate::session::{BackendId, SessionProvider};

pub const INDEX_MESSAGE: &str = "API is up";

#[derive(OpenApi)]
#[openapi(
    info(title = "crudbase", description = "Generic CRUD API"),
    components(schemas(
        Car,
        CarCreate,
        CarUpdate,
        BulkResult,
        FilterSpec,
        NamedFilter,
        IndexResponse
    ))
)]
pub struct ApiDoc;

/// Everything a resource's handlers need.
pub struct ResourceState<R: CRUDResource> {
    pub provider: SessionProvider,
    pub engine: CrudEngine<R>,
    pub binding: SchemaBinding,
    pub backend: BackendId,
}

impl<R: CRUDResource> Clone for ResourceState<R> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
            engine: self.engine.clone(),
            binding: self.binding,
            backend: self.backend,
        }
    }
}

impl<R: CRUDResource> ResourceState<R> {
    #[must_use]
    pub fn new(provider: SessionProvider, binding: SchemaBinding, backend: BackendId) -> Self {
        Self {
            provider,
            engine: CrudEngine::new(),
            binding,
            backend,
        }
    }
}

/// The whole application: liveness, API document and the car resource.
pub fn app(settings: &Settings, provider: SessionProvider) -> Router {
    let binding = SchemaBinding::new(Strictness::from(settings.strict_payloads));
    let root = settings.root_path.trim_end_matches('/');

    Router::new()
        .route(&format!("{root}/"), get(index))
        .route(&format!("{root}/openapi.json"), get(openapi))
        .merge(resource_router::<Car>(
            &settings.api_base(),
            ResourceState::new(provider, binding, BackendId::Primary),
        ))
}

/// Routes of one resource under `{base}/{plural}`.
pub fn resource_router<R: CRUDResource>(base: &str, state: ResourceState<R>) -> Router {
    let collection = format!("{base}/{}", R::RESOURCE_NAME_PLURAL);
    Router::new()
        .route(&collection, get(get_all::<R>).post(create_one::<R>))
        .route(
            &format!("{collection}/batch"),
            post(create_many::<R>).put(update_many::<R>),
        )
        .route(&format!("{collection}/search"), post(search::<R>))
        .route(&format!("{collection}/last"), post(get_last::<R>))
        .route(
            &format!("{collection}/{{id}}"),
            get(get_one::<R>)
                .put(update_one::<R>)
                .delete(delete_one::<R>),
        )
        .with_state(state)
}

pub async fn index() -> Json<IndexResponse> {
    Json(IndexResponse {
        msg: INDEX_MESSAGE.to_string(),
    })
}

pub async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub async fn get_all<R: CRUDResource>(
    State(state): State<ResourceState<R>>,
    Query(params): Query<ListParams>,
) -> Result<(HeaderMap, Json<Vec<R>>), ApiError> {
    let ListParams {
        skip,
        limit,
        order_by,
    } = params;
    let engine = state.engine.clone();
    let (items, total) = state
        .provider
        .scope(state.backend, move |session| {
            Box::pin(async move {
                let items = engine
                    .list(session, skip, limit, order_by.as_deref())
                    .await?;
                let total = engine.count(session, &[]).await?;
                Ok::<_, ApiError>((items, total))
            })
        })
        .await?;

    let offset = u64::try_from(skip).unwrap_or_default();
    let limit = u64::try_from(limit).unwrap_or_default();
    let headers = calculate_content_range(offset, limit, total, R::RESOURCE_NAME_PLURAL);
    Ok((headers, Json(items)))
}

pub async fn get_one<R: CRUDResource>(
    State(state): State<ResourceState<R>>,
    Path(id): Path<i32>,
) -> Result<Json<R>, ApiError> {
    let engine = state.engine.clone();
    let item = state
        .provider
        .scope(state.backend, move |session| {
            Box::pin(async move { Ok::<_, ApiError>(engine.get(session, id).await?) })
        })
        .await?;
    item.map(Json)
        .ok_or_else(|| ApiError::not_found(R::RESOURCE_NAME_SINGULAR, Some(id.to_string())))
}

pub async fn create_one<R: CRUDResource>(
    State(state): State<ResourceState<R>>,
    Json(payload): Json<JsonValue>,
) -> Result<(StatusCode, Json<R>), ApiError> {
    let input = state.binding.create_from_json::<R>(payload)?;
    let engine = state.engine.clone();
    let created = state
        .provider
        .scope(state.backend, move |session| {
            Box::pin(async move { Ok::<_, ApiError>(engine.create(session, input).await?) })
        })
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn create_many<R: CRUDResource>(
    State(state): State<ResourceState<R>>,
    Json(payload): Json<JsonValue>,
) -> Result<(StatusCode, Json<BulkResult>), ApiError> {
    let inputs = state.binding.create_many_from_json::<R>(payload)?;
    let engine = state.engine.clone();
    let result = state
        .provider
        .scope(state.backend, move |session| {
            Box::pin(async move { Ok::<_, ApiError>(engine.create_many(session, inputs).await?) })
        })
        .await?;
    Ok((StatusCode::CREATED, Json(result)))
}

pub async fn update_one<R: CRUDResource>(
    State(state): State<ResourceState<R>>,
    Path(id): Path<i32>,
    Json(payload): Json<JsonValue>,
) -> Result<Json<R>, ApiError> {
    let input = state.binding.update_from_json::<R>(payload)?;
    let engine = state.engine.clone();
    let updated = state
        .provider
        .scope(state.backend, move |session| {
            Box::pin(async move {
                let existing = engine.get(session, id).await?.ok_or_else(|| {
                    ApiError::not_found(R::RESOURCE_NAME_SINGULAR, Some(id.to_string()))
                })?;
                Ok::<_, ApiError>(engine.update(session, existing, input).await?)
            })
        })
        .await?;
    Ok(Json(updated))
}

pub async fn update_many<R: CRUDResource>(
    State(state): State<ResourceState<R>>,
    Query(params): Query<BatchUpdateParams>,
    Json(payload): Json<JsonValue>,
) -> Result<Json<Vec<R>>, ApiError> {
    let inputs = state
        .binding
        .update_many_from_json::<R>(payload, &params.key)?;
    let engine = state.engine.clone();
    let updated = state
        .provider
        .scope(state.backend, move |session| {
            Box::pin(async move {
                Ok::<_, ApiError>(engine.update_many(session, inputs, &params.key).await?)
            })
        })
        .await?;
    Ok(Json(updated))
}

pub async fn delete_one<R: CRUDResource>(
    State(state): State<ResourceState<R>>,
    Path(id): Path<i32>,
) -> Result<Json<R>, ApiError> {
    let engine = state.engine.clone();
    let removed = state
        .provider
        .scope(state.backend, move |session| {
            Box::pin(async move { Ok::<_, ApiError>(engine.remove(session, id).await?) })
        })
        .await?;
    Ok(Json(removed))
}

pub async fn search<R: CRUDResource>(
    State(state): State<ResourceState<R>>,
    Json(payload): Json<JsonValue>,
) -> Result<Json<Vec<R>>, ApiError> {
    let filters: FilterSet = filter_body(payload)?;
    let engine = state.engine.clone();
    let items = state
        .provider
        .scope(state.backend, move |session| {
            Box::pin(async move {
                Ok::<_, ApiError>(engine.list_by_filter_set(session, &filters).await?)
            })
        })
        .await?;
    Ok(Json(items))
}

pub async fn get_last<R: CRUDResource>(
    State(state): State<ResourceState<R>>,
    Json(payload): Json<JsonValue>,
) -> Result<Json<R>, ApiError> {
    let filters: NamedFilters = filter_body(payload)?;
    let engine = state.engine.clone();
    let item = state
        .provider
        .scope(state.backend, move |session| {
            Box::pin(async move {
                Ok::<_, ApiError>(engine.last_by_filters(session, &filters).await?)
            })
        })
        .await?;
    item.map(Json)
        .ok_or_else(|| ApiError::not_found(R::RESOURCE_NAME_SINGULAR, None))
}

/// Malformed filter bodies are filter errors (400), not unprocessable entities.
fn filter_body<T: DeserializeOwned>(payload: JsonValue) -> Result<T, ApiError> {
    serde_json::from_value(payload)
        .map_err(|err| ApiError::bad_request(format!("invalid filter body: {err}")))
}
