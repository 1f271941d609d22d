// src/web/api_auth_handlers.rs
//! Endpoints JSON de autenticação usados pelo front-end SPA.
use crate::{
    error::{ApiResult, AppError, AppResult},
    models::{
        registration::BasicRegistration,
        user::{LoginForm, MeResponse, Role},
    },
    services::{auth_service, password_reset_service, registration_service::{self, RegistrationUploads}},
    state::AppState,
    web::{form_data::FormData, mw_auth::{self, CurrentUser}},
};
use axum::{
    extract::{Extension, FromRequest, Multipart, Path, Request, State},
    http::header::CONTENT_TYPE,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;

// Aceita JSON ou multipart/form-data (quando vem com foto)
async fn read_registration(
    state: &AppState,
    request: Request,
) -> AppResult<(BasicRegistration, RegistrationUploads)> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    if is_multipart {
        let multipart = Multipart::from_request(request, state).await.map_err(|e| {
            tracing::warn!("Registo API com multipart inválido: {}", e);
            AppError::field("form", "Não foi possível ler o formulário enviado")
        })?;
        let mut data = FormData::from_multipart(multipart).await?;
        let uploads = RegistrationUploads {
            photo: data.take_file("photo"),
            document: data.take_file("document"),
        };
        Ok((data.decode()?, uploads))
    } else {
        let Json(form) = Json::<BasicRegistration>::from_request(request, state)
            .await
            .map_err(|e| {
                tracing::warn!("Registo API com JSON inválido: {}", e);
                AppError::field("form", "JSON inválido")
            })?;
        Ok((form, RegistrationUploads::default()))
    }
}

// POST /auth/api/register/{role}
pub async fn api_register(
    State(state): State<AppState>,
    session: Session,
    Path(role): Path<String>,
    request: Request,
) -> ApiResult {
    let role = Role::from_slug(&role)
        .ok_or_else(|| AppError::NotFound(format!("Tipo de conta desconhecido: {}", role)))?;
    let (form, uploads) = read_registration(&state, request).await?;

    let user = registration_service::register_basic(&state.db_pool, &state.storage, role, &form, &uploads).await?;
    mw_auth::sign_in(&session, &user).await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("{} cadastrado com sucesso!", user.role.label()),
        "user": MeResponse::from(&user),
        "redirect_url": user.role.dashboard_path(),
    })))
}

// POST /auth/api/login
pub async fn api_login(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<LoginForm>,
) -> ApiResult {
    let password = payload.password.trim();
    if payload.email.trim().is_empty() || password.is_empty() {
        let mut errors = crate::error::FieldErrors::new();
        if payload.email.trim().is_empty() {
            errors.add("email", "Email é obrigatório");
        }
        if password.is_empty() {
            errors.add("password", "Senha é obrigatória");
        }
        return Err(AppError::Validation(errors).into());
    }

    let user = auth_service::authenticate(&state.db_pool, &payload.email, password).await?;
    mw_auth::sign_in(&session, &user).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Login realizado com sucesso!",
        "user": MeResponse::from(&user),
        "redirect_url": user.role.dashboard_path(),
    })))
}

// POST /auth/api/logout
pub async fn api_logout(session: Session) -> ApiResult {
    mw_auth::sign_out(&session).await?;
    Ok(Json(json!({ "success": true, "message": "Sessão terminada." })))
}

// GET /auth/api/me
pub async fn api_me(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Json<MeResponse> {
    Json(MeResponse::from(&user))
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    #[serde(default)]
    pub email: String,
}

// POST /auth/api/password-reset
pub async fn api_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<PasswordResetRequest>,
) -> ApiResult {
    password_reset_service::request_reset(
        &state.db_pool,
        state.mailer.as_ref(),
        &state.config.public_base_url,
        &payload.email,
    )
    .await?;
    Ok(Json(json!({
        "success": true,
        "message": "Se o email estiver cadastrado, enviaremos um link para redefinir a senha.",
    })))
}
