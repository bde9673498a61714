//! HTTP endpoint handlers. These are thin wrappers that forward to the services.
//! Each handler is instrumented; failures render through `AppError`.

use std::sync::Arc;
use axum::{
  body::Bytes,
  extract::{Path, Query, State},
  http::{header, StatusCode},
  response::IntoResponse,
  Json,
};
use chrono::Utc;
use tracing::{info, instrument};

use crate::error::Result;
use crate::modules::{self, HallOfFameQuery, ModuleInput};
use crate::portability;
use crate::protocol::*;
use crate::quests;
use crate::shop;
use crate::state::AppState;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

// ---- modules ----

#[instrument(level = "info", skip(state))]
pub async fn http_list_modules(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
  Ok(Json(modules::list_modules(&state)?))
}

#[instrument(level = "info", skip(state, body), fields(title = %body.title))]
pub async fn http_create_module(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ModuleInput>,
) -> Result<impl IntoResponse> {
  let outcome = modules::create_module(&state, body)?;
  info!(target: "uniquest", id = %outcome.module.id, "HTTP module created");
  Ok((StatusCode::CREATED, Json(outcome)))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_module(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<impl IntoResponse> {
  Ok(Json(modules::get_module(&state, &id)?))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_update_module(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<ModuleInput>,
) -> Result<impl IntoResponse> {
  Ok(Json(modules::update_module(&state, &id, body)?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_module(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<impl IntoResponse> {
  modules::delete_module(&state, &id)?;
  Ok(StatusCode::NO_CONTENT)
}

#[instrument(level = "info", skip(state, body), fields(path = %body.path))]
pub async fn http_attach_document(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<DocumentIn>,
) -> Result<impl IntoResponse> {
  Ok(Json(modules::attach_document(&state, &id, &body.path).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_hall_of_fame(
  State(state): State<Arc<AppState>>,
  Query(q): Query<HallOfFameQuery>,
) -> Result<impl IntoResponse> {
  Ok(Json(modules::hall_of_fame(&state, &q)?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_reset_hall_of_fame(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
  Ok(Json(modules::reset_hall_of_fame(&state)?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_stats(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
  Ok(Json(modules::stats(&state)?))
}

// ---- quests ----

#[instrument(level = "info", skip(state))]
pub async fn http_open_quests(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
  Ok(Json(QuestsOut { quests: quests::list_open_quests(&state)? }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_quest_archive(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
  Ok(Json(QuestsOut { quests: quests::quest_archive(&state)? }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_clear_quests(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
  Ok(Json(ClearedOut { removed: quests::clear_quests(&state)? }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_generate_quests(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
  let quests = quests::generate_quests(&state).await?;
  info!(target: "quest", count = quests.len(), "HTTP quests generated");
  Ok(Json(QuestsOut { quests }))
}

#[instrument(level = "info", skip(state, body), fields(answer_len = body.answer.len()))]
pub async fn http_save_draft(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<AnswerIn>,
) -> Result<impl IntoResponse> {
  Ok(Json(quests::save_draft(&state, &id, &body.answer)?))
}

#[instrument(level = "info", skip(state, body), fields(answer_len = body.answer.len()))]
pub async fn http_review_answer(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<AnswerIn>,
) -> Result<impl IntoResponse> {
  Ok(Json(quests::review_answer(&state, &id, &body.answer).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_complete_quest(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<impl IntoResponse> {
  Ok(Json(quests::complete_quest(&state, &id)?))
}

// ---- profile & shop ----

#[instrument(level = "info", skip(state))]
pub async fn http_profile(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
  Ok(Json(shop::get_profile(&state)?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_login(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
  Ok(Json(shop::record_login(&state)?))
}

#[instrument(level = "info", skip(state), fields(persona = %body.persona))]
pub async fn http_set_persona(
  State(state): State<Arc<AppState>>,
  Json(body): Json<PersonaIn>,
) -> Result<impl IntoResponse> {
  Ok(Json(shop::set_persona(&state, &body.persona)?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_shop(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
  Ok(Json(shop::shop(&state)?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_purchase(
  State(state): State<Arc<AppState>>,
  Path(item): Path<String>,
) -> Result<impl IntoResponse> {
  Ok(Json(shop::purchase(&state, &item)?))
}

// ---- backup ----

#[instrument(level = "info", skip(state))]
pub async fn http_export(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
  let file = portability::export(&state.store, Utc::now())?;
  let disposition = format!("attachment; filename=\"{}\"", file.file_name);
  Ok((
    [(header::CONTENT_TYPE, "application/json".to_string()), (header::CONTENT_DISPOSITION, disposition)],
    file.bytes,
  ))
}

#[instrument(level = "info", skip(state, body), fields(bytes = body.len()))]
pub async fn http_import(State(state): State<Arc<AppState>>, body: Bytes) -> Result<impl IntoResponse> {
  Ok(Json(portability::import(&state.store, &body)?))
}
