//! User CRUD handlers. Each request runs in its own session, committed when the handler
//! succeeds and rolled back when it fails.

use crate::dto::{BasePageQueryReq, BaseQueryReq};
use crate::entity::user_table;
use crate::error::AppError;
use crate::intercept::ExecutionOptions;
use crate::response::success;
use crate::service::{CrudService, DEFAULT_BATCH_SIZE};
use crate::session::with_session;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

/// Largest number of items accepted by the batch endpoints.
pub const MAX_BATCH_ITEMS: usize = 1000;

fn users() -> CrudService {
    CrudService::new(user_table())
}

fn body_to_map(value: Value) -> Result<Map<String, Value>, AppError> {
    match value {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

fn batch(items: Vec<Value>) -> Result<Vec<Map<String, Value>>, AppError> {
    if items.len() > MAX_BATCH_ITEMS {
        return Err(AppError::BadRequest(format!(
            "batch limited to {} items",
            MAX_BATCH_ITEMS
        )));
    }
    items.into_iter().map(body_to_map).collect()
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    pub hard: bool,
}

#[derive(Debug, Deserialize)]
pub struct DeleteIdsReq {
    pub ids: Vec<Value>,
    #[serde(default)]
    pub hard: bool,
}

fn not_found(id: &Value) -> AppError {
    match id {
        Value::String(s) => AppError::NotFound(format!("user {}", s)),
        other => AppError::NotFound(format!("user {}", other)),
    }
}

fn delete_opts(hard: bool) -> ExecutionOptions {
    ExecutionOptions {
        skip_soft_delete: hard,
    }
}

pub async fn page(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let req = BasePageQueryReq::from_params(params)?;
    let svc = users();
    let page = with_session(state.sessions.as_ref(), move |s| {
        Box::pin(async move { svc.get_by_page(s, &req).await })
    })
    .await?;
    Ok(success(page))
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let req = BaseQueryReq::from_params(params);
    let svc = users();
    let rows = with_session(state.sessions.as_ref(), move |s| {
        Box::pin(async move { svc.get_list(s, &req).await })
    })
    .await?;
    Ok(success(rows))
}

pub async fn id_list(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let req = BaseQueryReq::from_params(params);
    let svc = users();
    let ids = with_session(state.sessions.as_ref(), move |s| {
        Box::pin(async move { svc.get_id_list(s, &req).await })
    })
    .await?;
    Ok(success(ids))
}

pub async fn count(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let filters: Map<String, Value> = params.into_iter().map(|(k, v)| (k, Value::String(v))).collect();
    let svc = users();
    let n = with_session(state.sessions.as_ref(), move |s| {
        Box::pin(async move { svc.get_data_count(s, &filters).await })
    })
    .await?;
    Ok(success(n))
}

pub async fn read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let svc = users();
    let row = with_session(state.sessions.as_ref(), move |s| {
        Box::pin(async move {
            svc.get_by_id(s, &Value::String(id.clone()))
                .await?
                .ok_or_else(|| AppError::NotFound(format!("user {}", id)))
        })
    })
    .await?;
    Ok(success(row))
}

pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let values = body_to_map(body)?;
    let svc = users();
    let row = with_session(state.sessions.as_ref(), move |s| {
        Box::pin(async move { svc.save(s, values).await })
    })
    .await?;
    Ok(success(row))
}

/// Body must carry `id`; the user must exist and not be deleted.
pub async fn update(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let values = body_to_map(body)?;
    let id = values
        .get("id")
        .filter(|v| !v.is_null())
        .cloned()
        .ok_or_else(|| AppError::Validation("id is required".into()))?;
    let svc = users();
    let row = with_session(state.sessions.as_ref(), move |s| {
        Box::pin(async move {
            if svc.get_by_id(s, &id).await?.is_none() {
                return Err(not_found(&id));
            }
            svc.update_by_id(s, &id, values).await?;
            svc.get_by_id(s, &id).await?.ok_or_else(|| not_found(&id))
        })
    })
    .await?;
    Ok(success(row))
}

/// `?hard=true` removes the row instead of marking it deleted, including rows that are
/// already marked.
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Result<impl IntoResponse, AppError> {
    let svc = users();
    let hard = params.hard;
    let n = with_session(state.sessions.as_ref(), move |s| {
        Box::pin(async move {
            let id = Value::String(id);
            if !hard && svc.get_by_id(s, &id).await?.is_none() {
                return Err(not_found(&id));
            }
            let n = svc.delete_by_id(s, &id, delete_opts(hard)).await?;
            if n == 0 {
                return Err(not_found(&id));
            }
            Ok(n)
        })
    })
    .await?;
    tracing::info!(deleted = n, hard = params.hard, "user delete");
    Ok(success(json!({ "deleted": n })))
}

pub async fn batch_create(
    State(state): State<AppState>,
    Json(items): Json<Vec<Value>>,
) -> Result<impl IntoResponse, AppError> {
    let rows = batch(items)?;
    let svc = users();
    let n = with_session(state.sessions.as_ref(), move |s| {
        Box::pin(async move { svc.insert_many(s, rows, DEFAULT_BATCH_SIZE).await })
    })
    .await?;
    Ok(success(json!({ "inserted": n })))
}

pub async fn batch_update(
    State(state): State<AppState>,
    Json(items): Json<Vec<Value>>,
) -> Result<impl IntoResponse, AppError> {
    let rows = batch(items)?;
    let svc = users();
    let n = with_session(state.sessions.as_ref(), move |s| {
        Box::pin(async move { svc.update_many_by_id(s, rows).await })
    })
    .await?;
    Ok(success(json!({ "updated": n })))
}

pub async fn delete_many(
    State(state): State<AppState>,
    Json(req): Json<DeleteIdsReq>,
) -> Result<impl IntoResponse, AppError> {
    if req.ids.is_empty() {
        return Err(AppError::BadRequest("ids must not be empty".into()));
    }
    if req.ids.len() > MAX_BATCH_ITEMS {
        return Err(AppError::BadRequest(format!(
            "batch limited to {} items",
            MAX_BATCH_ITEMS
        )));
    }
    let svc = users();
    let opts = delete_opts(req.hard);
    let ids = req.ids;
    let n = with_session(state.sessions.as_ref(), move |s| {
        Box::pin(async move { svc.delete_by_ids(s, &ids, opts).await })
    })
    .await?;
    Ok(success(json!({ "deleted": n })))
}
