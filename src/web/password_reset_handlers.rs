// src/web/password_reset_handlers.rs
use crate::{
    error::{AppError, AppResult},
    services::password_reset_service,
    state::AppState,
    templates::{render, FormState, PasswordResetPage},
    web::flash,
};
use axum::{
    extract::{Form, Path, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_cookies::Cookies;

#[derive(Debug, Deserialize)]
pub struct ResetForm {
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

fn reset_page(token: String, valid: bool, form: FormState) -> AppResult<Response> {
    let page = PasswordResetPage { nav: None, flash: None, token, valid, form };
    Ok(render(&page)?.into_response())
}

// GET /password-reset/{token}
pub async fn show_reset_form(State(state): State<AppState>, Path(token): Path<String>) -> AppResult<Response> {
    let valid = match password_reset_service::check_token(&state.db_pool, &token).await {
        Ok(_) => true,
        Err(AppError::NotFound(_)) => false,
        Err(e) => return Err(e),
    };
    reset_page(token, valid, FormState::default())
}

// POST /password-reset/{token}
pub async fn handle_reset_form(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(token): Path<String>,
    Form(form): Form<ResetForm>,
) -> AppResult<Response> {
    match password_reset_service::confirm_reset(&state.db_pool, &token, &form.password1, &form.password2).await {
        Ok(()) => {
            flash::success(&cookies, &state.cookie_key, "Senha alterada com sucesso. Faça login com a nova senha.");
            Ok(Redirect::to("/login").into_response())
        }
        Err(AppError::NotFound(_)) => reset_page(token, false, FormState::default()),
        Err(AppError::Validation(errors)) => {
            let form = FormState { errors, ..Default::default() };
            reset_page(token, true, form)
        }
        Err(e) => Err(e),
    }
}
