// src/web/account_handlers.rs
use crate::{
    error::{ApiResult, AppError, AppResult},
    services::account_service::{self, DeleteAccountRequest},
    state::AppState,
    web::{
        form_data::{self, FormData},
        mw_auth::{self, CurrentUser},
    },
};
use axum::{
    extract::{Extension, Form, FromRequest, Multipart, Request, State},
    http::header::CONTENT_TYPE,
    Json,
};
use serde_json::json;
use std::collections::HashMap;
use tower_sessions::Session;

// O modal envia JSON; formulários simples chegam urlencoded ou multipart
async fn read_delete_request(state: &AppState, request: Request) -> AppResult<DeleteAccountRequest> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if content_type.starts_with("application/json") {
        let Json(body) = Json::<DeleteAccountRequest>::from_request(request, state)
            .await
            .map_err(|e| {
                tracing::warn!("Pedido de exclusão com JSON inválido: {}", e);
                AppError::field("form", "JSON inválido")
            })?;
        Ok(body)
    } else if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, state).await.map_err(|e| {
            tracing::warn!("Pedido de exclusão com multipart inválido: {}", e);
            AppError::field("form", "Não foi possível ler o formulário enviado")
        })?;
        FormData::from_multipart(multipart).await?.decode()
    } else {
        let Form(fields) = Form::<HashMap<String, String>>::from_request(request, state)
            .await
            .map_err(|e| {
                tracing::warn!("Pedido de exclusão com formulário inválido: {}", e);
                AppError::field("form", "Dados do formulário inválidos")
            })?;
        form_data::decode_fields(&fields)
    }
}

// POST /account/delete
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    session: Session,
    request: Request,
) -> ApiResult {
    let body = read_delete_request(&state, request).await?;
    account_service::delete_account(&state.db_pool, &state.storage, &user, &body).await?;
    mw_auth::sign_out(&session).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Cadastro excluído com sucesso. Esta ação é irreversível.",
        "redirect_url": "/login",
    })))
}
