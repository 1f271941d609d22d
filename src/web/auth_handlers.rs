// src/web/auth_handlers.rs
use crate::{
    error::{AppError, AppResult},
    models::user::LoginForm,
    services::auth_service,
    state::AppState,
    templates::{render, ChoicePage, LoginPage},
    web::{
        flash,
        mw_auth::{self, session_user},
    },
};
use axum::{
    extract::{Form, State},
    response::{IntoResponse, Redirect, Response},
};
use tower_cookies::Cookies;
use tower_sessions::Session;

// GET /
pub async fn root(State(state): State<AppState>, session: Session) -> AppResult<Redirect> {
    Ok(match session_user(&state.db_pool, &session).await? {
        Some(user) => Redirect::to(user.role.dashboard_path()),
        None => Redirect::to("/login"),
    })
}

// GET /login
pub async fn show_login_form(
    State(state): State<AppState>,
    session: Session,
    cookies: Cookies,
) -> AppResult<Response> {
    if let Some(user) = session_user(&state.db_pool, &session).await? {
        tracing::debug!("GET /login: {} já autenticado, redirecionando", user.email);
        return Ok(Redirect::to(user.role.dashboard_path()).into_response());
    }

    let page = LoginPage {
        nav: None,
        flash: flash::take(&cookies, &state.cookie_key),
        error: None,
        email: String::new(),
    };
    Ok(render(&page)?.into_response())
}

// POST /login
pub async fn handle_login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    tracing::info!("Tentativa de login para: {}", form.email);

    match auth_service::authenticate(&state.db_pool, &form.email, &form.password).await {
        Ok(user) => {
            mw_auth::sign_in(&session, &user).await?;
            Ok(Redirect::to(user.role.dashboard_path()).into_response())
        }
        Err(AppError::InvalidCredentials) => {
            let page = LoginPage {
                nav: None,
                flash: None,
                error: Some(AppError::InvalidCredentials.user_message()),
                email: form.email,
            };
            Ok(render(&page)?.into_response())
        }
        Err(e) => Err(e),
    }
}

// GET /logout
pub async fn handle_logout(session: Session) -> AppResult<Redirect> {
    let user_id: Option<i64> = session.get(mw_auth::SESSION_USER_KEY).await.ok().flatten();
    mw_auth::sign_out(&session).await?;

    match user_id {
        Some(id) => tracing::info!("🚪 Utilizador {} desligado.", id),
        None => tracing::info!("🚪 Sessão anónima desligada."),
    }
    Ok(Redirect::to("/login"))
}

// GET /register
pub async fn register_redirect() -> Redirect {
    Redirect::to("/choice")
}

// GET /choice
pub async fn show_choice(State(state): State<AppState>, cookies: Cookies) -> AppResult<Response> {
    let page = ChoicePage {
        nav: None,
        flash: flash::take(&cookies, &state.cookie_key),
    };
    Ok(render(&page)?.into_response())
}
