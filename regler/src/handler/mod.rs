//! The admin HTTP API.
//!
//! Thin glue between the (external) settings UI and the
//! [`SettingStore`]: every handler validates nothing itself, the store
//! owns the rules and the handlers translate its errors into responses.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::extract::State;
use axum::routing::get;
use axum::routing::post;
use axum::routing::put;
use regler_core::SettingStore;
use regler_core::store::CreateSetting;
use regler_core::store::UpdateSetting;

use crate::api_error::ApiResult;
use crate::handler::schema::FieldTypesResponse;
use crate::handler::schema::MoveSettingRequest;
use crate::handler::schema::SaveValueRequest;
use crate::handler::schema::SettingResponse;
use crate::handler::schema::SettingsList;
use crate::handler::schema::to_setting_value;

pub mod schema;

/// Assembles the admin API router.
pub fn router(store: Arc<SettingStore>) -> Router {
    Router::new()
        .route("/settings", get(list_settings).post(create_setting))
        .route("/settings/field-types", get(list_field_types))
        .route(
            "/settings/{key}",
            get(get_setting).put(update_setting).delete(delete_setting),
        )
        .route("/settings/{key}/value", put(save_value))
        .route("/settings/{key}/move", post(move_setting))
        .with_state(store)
}

/// `GET /settings` — every setting with its rendered field, in display order.
async fn list_settings(State(store): State<Arc<SettingStore>>) -> ApiResult<Json<SettingsList>> {
    let settings = store.list().await?;
    Ok(Json(SettingsList::new(store.registry(), settings)))
}

/// `GET /settings/field-types` — the catalog, for the type dropdown and the
/// options editor.
async fn list_field_types(
    State(store): State<Arc<SettingStore>>,
) -> ApiResult<Json<FieldTypesResponse>> {
    Ok(Json(FieldTypesResponse {
        types: store.registry().types(None),
    }))
}

/// `GET /settings/{key}` — one setting, for the edit modal.
async fn get_setting(
    State(store): State<Arc<SettingStore>>,
    Path(key): Path<String>,
) -> ApiResult<Json<SettingResponse>> {
    let setting = store.get(&key).await?;
    Ok(Json(SettingResponse::new(store.registry(), setting)))
}

/// `POST /settings` — create a setting at the end of the order.
async fn create_setting(
    State(store): State<Arc<SettingStore>>,
    Json(request): Json<CreateSetting>,
) -> ApiResult<Json<SettingResponse>> {
    let setting = store.create(request).await?;
    Ok(Json(SettingResponse::new(store.registry(), setting)))
}

/// `PUT /settings/{key}` — update metadata; the path names the prior key.
async fn update_setting(
    State(store): State<Arc<SettingStore>>,
    Path(key): Path<String>,
    Json(request): Json<UpdateSetting>,
) -> ApiResult<Json<SettingResponse>> {
    let setting = store.update(&key, request).await?;
    Ok(Json(SettingResponse::new(store.registry(), setting)))
}

/// `PUT /settings/{key}/value` — save the value only.
async fn save_value(
    State(store): State<Arc<SettingStore>>,
    Path(key): Path<String>,
    Json(request): Json<SaveValueRequest>,
) -> ApiResult<Json<SettingResponse>> {
    let setting = store
        .set_value(&key, to_setting_value(request.value))
        .await?;
    Ok(Json(SettingResponse::new(store.registry(), setting)))
}

/// `POST /settings/{key}/move` — swap with the neighbour in the given
/// direction; at the boundary this is a successful no-op.
async fn move_setting(
    State(store): State<Arc<SettingStore>>,
    Path(key): Path<String>,
    Json(request): Json<MoveSettingRequest>,
) -> ApiResult<()> {
    store.swap(&key, request.direction).await?;
    Ok(())
}

/// `DELETE /settings/{key}` — delete the setting and its attachments.
async fn delete_setting(
    State(store): State<Arc<SettingStore>>,
    Path(key): Path<String>,
) -> ApiResult<()> {
    store.delete(&key).await?;
    Ok(())
}
