// src/web/dashboard_handlers.rs
use crate::{
    error::{AppError, AppResult},
    models::profile::InstructorStatus,
    services::{lesson_service, profile_service},
    state::AppState,
    templates::{render, EmployeeDashboardPage, InstructorDashboardPage, StudentDashboardPage},
    web::{flash, mw_auth::CurrentUser, nav_for, today},
};
use axum::{
    extract::{Extension, Form, Path, State},
    response::{Html, Redirect},
};
use serde::Deserialize;
use tower_cookies::Cookies;

// GET /dashboard/aluno
pub async fn student_dashboard(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    cookies: Cookies,
) -> AppResult<Html<String>> {
    let dashboard = lesson_service::student_dashboard(&state.db_pool, user.id, today()).await?;
    let page = StudentDashboardPage {
        nav: Some(nav_for(&state.db_pool, &user).await?),
        flash: flash::take(&cookies, &state.cookie_key),
        dashboard,
        time_slots: lesson_service::TIME_SLOTS,
    };
    render(&page)
}

// GET /dashboard/instrutor
pub async fn instructor_dashboard(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    cookies: Cookies,
) -> AppResult<Html<String>> {
    // Garante o perfil de contas criadas pela API mínima
    let nav = nav_for(&state.db_pool, &user).await?;
    let dashboard = lesson_service::instructor_dashboard(&state.db_pool, user.id, today()).await?;
    let page = InstructorDashboardPage {
        nav: Some(nav),
        flash: flash::take(&cookies, &state.cookie_key),
        dashboard,
    };
    render(&page)
}

// GET /dashboard/funcionario
pub async fn employee_dashboard(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    cookies: Cookies,
) -> AppResult<Html<String>> {
    let dashboard = lesson_service::employee_dashboard(&state.db_pool, today()).await?;
    let page = EmployeeDashboardPage {
        nav: Some(nav_for(&state.db_pool, &user).await?),
        flash: flash::take(&cookies, &state.cookie_key),
        dashboard,
    };
    render(&page)
}

#[derive(Debug, Deserialize)]
pub struct StatusForm {
    #[serde(default)]
    pub status: String,
}

// POST /employee/instructors/{id}/status
pub async fn update_instructor_status(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    cookies: Cookies,
    Path(instructor_id): Path<i64>,
    Form(form): Form<StatusForm>,
) -> AppResult<Redirect> {
    let redirect = Redirect::to("/dashboard/funcionario");
    let Some(status) = InstructorStatus::from_slug(form.status.trim()) else {
        flash::error(&cookies, &state.cookie_key, "Situação inválida.");
        return Ok(redirect);
    };

    match profile_service::set_instructor_status(&state.db_pool, instructor_id, status).await {
        Ok(()) => {
            tracing::info!(
                "{} mudou o instrutor {} para '{}'",
                user.email,
                instructor_id,
                status.as_str()
            );
            let message = match status {
                InstructorStatus::Ativo => "Instrutor aprovado.",
                InstructorStatus::Inativo => "Instrutor desativado.",
                InstructorStatus::Pendente => "Instrutor voltou a pendente.",
            };
            flash::success(&cookies, &state.cookie_key, message);
        }
        Err(AppError::NotFound(message)) => flash::error(&cookies, &state.cookie_key, message),
        Err(e) => return Err(e),
    }
    Ok(redirect)
}
