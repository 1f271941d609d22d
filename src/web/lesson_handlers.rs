// src/web/lesson_handlers.rs
//! Agendamento (página do aluno) e ações JSON sobre aulas.
use crate::{
    error::{ApiResult, AppError, AppResult, FieldErrors},
    models::{
        lesson::{lenient_string, InstructorFilter, LessonForm, VehicleFilter},
        profile::Profile,
        user::User,
    },
    services::{lesson_service, profile_service},
    state::AppState,
    templates::{render, AgendamentoPage, FormState},
    web::{flash, flash::Flash, form_data::FormData, mw_auth::CurrentUser, nav_with, today},
};
use axum::{
    extract::{Extension, Form, Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use tower_cookies::Cookies;

fn now() -> chrono::NaiveDateTime {
    chrono::Local::now().naive_local()
}

// Ponto de encontro sugerido: a morada do aluno
fn default_lesson_values(profile: &Profile) -> HashMap<String, String> {
    let mut values = HashMap::from([("vehicle_type".to_string(), "B".to_string())]);
    if let Profile::Aluno(student) = profile {
        let address = &student.address;
        for (field, value) in [
            ("cep", &address.cep),
            ("rua", &address.address),
            ("numero", &address.address_number),
            ("bairro", &address.neighborhood),
            ("cidade", &address.city),
            ("estado", &address.state),
        ] {
            values.insert(field.to_string(), value.clone());
        }
        if student.license_categories == "A" {
            values.insert("vehicle_type".to_string(), "A".to_string());
        }
    }
    values
}

async fn agendamento_page(
    state: &AppState,
    user: &User,
    profile: &Profile,
    flash: Option<Flash>,
    form: FormState,
) -> AppResult<Html<String>> {
    let instructors = lesson_service::filter_instructors(&state.db_pool, &InstructorFilter::default()).await?;
    let lessons = lesson_service::lessons_for(&state.db_pool, user).await?;
    let page = AgendamentoPage {
        nav: Some(nav_with(user, profile)),
        flash,
        form,
        time_slots: lesson_service::TIME_SLOTS,
        instructors,
        lessons,
        min_date: today().format("%Y-%m-%d").to_string(),
    };
    render(&page)
}

// GET /agendamento
pub async fn show_agendamento(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    cookies: Cookies,
) -> AppResult<Html<String>> {
    let profile = profile_service::load(&state.db_pool, &user).await?;
    let form = FormState::new(default_lesson_values(&profile));
    agendamento_page(&state, &user, &profile, flash::take(&cookies, &state.cookie_key), form).await
}

// POST /agendamento
pub async fn handle_agendamento(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    cookies: Cookies,
    Form(fields): Form<HashMap<String, String>>,
) -> AppResult<Response> {
    let data = FormData::from_fields(fields);
    let result = match data.decode::<LessonForm>() {
        Ok(form) => lesson_service::schedule(&state.db_pool, user.id, &form, now()).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(view) => {
            flash::success(
                &cookies,
                &state.cookie_key,
                format!(
                    "Aula #{} solicitada para {} às {}. Aguarde a confirmação do instrutor.",
                    view.lesson.lesson_number,
                    view.date_label(),
                    view.time_label()
                ),
            );
            Ok(Redirect::to("/dashboard/aluno").into_response())
        }
        Err(err) => {
            let form = FormState::from_error(data.echo(), err)?;
            let profile = profile_service::load(&state.db_pool, &user).await?;
            Ok(agendamento_page(&state, &user, &profile, None, form).await?.into_response())
        }
    }
}

// GET /api/filter-instructors
pub async fn filter_instructors(
    State(state): State<AppState>,
    Query(filter): Query<InstructorFilter>,
) -> ApiResult {
    let instructors = lesson_service::filter_instructors(&state.db_pool, &filter).await?;
    tracing::debug!("Filtro de instrutores: {} resultados", instructors.len());
    Ok(Json(json!({ "success": true, "instructors": instructors })))
}

// GET /api/filter-vehicles
pub async fn filter_vehicles(State(state): State<AppState>, Query(filter): Query<VehicleFilter>) -> ApiResult {
    let vehicles = lesson_service::filter_vehicles(&state.db_pool, &filter).await?;
    Ok(Json(json!({ "success": true, "vehicles": vehicles })))
}

// GET /api/lessons
pub async fn list_lessons(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult {
    let lessons = lesson_service::lessons_for(&state.db_pool, &user).await?;
    Ok(Json(json!({ "success": true, "lessons": lessons })))
}

// --- Ações do instrutor ---

// POST /api/accept-lesson/{id}
pub async fn accept_lesson(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(lesson_id): Path<i64>,
) -> ApiResult {
    let view = lesson_service::accept(&state.db_pool, user.id, lesson_id).await?;
    Ok(Json(json!({ "success": true, "message": "Aula aceita!", "lesson": view })))
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: String,
}

// POST /api/reject-lesson/{id}
pub async fn reject_lesson(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(lesson_id): Path<i64>,
    Json(payload): Json<RejectRequest>,
) -> ApiResult {
    let view = lesson_service::reject(&state.db_pool, user.id, lesson_id, &payload.reason).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Aula recusada. O aluno foi informado do motivo.",
        "lesson": view,
    })))
}

// POST /api/start-lesson/{id}
pub async fn start_lesson(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(lesson_id): Path<i64>,
) -> ApiResult {
    let view = lesson_service::start(&state.db_pool, user.id, lesson_id).await?;
    Ok(Json(json!({ "success": true, "message": "Aula iniciada.", "lesson": view })))
}

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    #[serde(default)]
    pub score: String,
    #[serde(default)]
    pub notes: String,
}

// POST /api/complete-lesson/{id}
pub async fn complete_lesson(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(lesson_id): Path<i64>,
    Json(payload): Json<CompleteRequest>,
) -> ApiResult {
    let view = lesson_service::complete(&state.db_pool, user.id, lesson_id, &payload.score, &payload.notes).await?;
    Ok(Json(json!({ "success": true, "message": "Aula concluída!", "lesson": view })))
}

// --- Ações do aluno ---

// POST /api/reschedule-lesson/{id}
pub async fn reschedule_lesson(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(lesson_id): Path<i64>,
    Json(form): Json<LessonForm>,
) -> ApiResult {
    let view = lesson_service::reschedule(&state.db_pool, user.id, lesson_id, &form, now()).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Aula remarcada para {} às {}.", view.date_label(), view.time_label()),
        "lesson": view,
    })))
}

// POST /api/cancel-lesson/{id}
pub async fn cancel_lesson(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(lesson_id): Path<i64>,
) -> ApiResult {
    lesson_service::cancel(&state.db_pool, user.id, lesson_id).await?;
    Ok(Json(json!({ "success": true, "message": "Aula cancelada." })))
}

// POST /api/cancel-rejected-lesson/{id}
pub async fn cancel_rejected_lesson(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(lesson_id): Path<i64>,
) -> ApiResult {
    lesson_service::cancel_rejected(&state.db_pool, user.id, lesson_id).await?;
    Ok(Json(json!({ "success": true, "message": "Aula recusada cancelada." })))
}

/// Corpo de `/api/submit-lesson-rating`; aceita números ou texto (FormData).
#[derive(Debug, Deserialize)]
pub struct RatingRequest {
    #[serde(default, deserialize_with = "lenient_string")]
    pub lesson_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub rating: String,
    #[serde(default)]
    pub feedback: String,
}

impl RatingRequest {
    fn parse(&self) -> AppResult<(i64, f64)> {
        let mut errors = FieldErrors::new();
        let lesson_id = self.lesson_id.trim().parse::<i64>().ok();
        if lesson_id.is_none() {
            errors.add("lesson_id", "Aula inválida");
        }
        let rating = self.rating.trim().replace(',', ".").parse::<f64>().ok();
        if rating.is_none() {
            errors.add("rating", "Avaliação inválida");
        }
        match (lesson_id, rating) {
            (Some(lesson_id), Some(rating)) => Ok((lesson_id, rating)),
            _ => Err(AppError::Validation(errors)),
        }
    }
}

// POST /api/submit-lesson-rating
pub async fn submit_lesson_rating(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<RatingRequest>,
) -> ApiResult {
    let (lesson_id, rating) = payload.parse()?;
    lesson_service::rate(&state.db_pool, user.id, lesson_id, rating, &payload.feedback).await?;
    Ok(Json(json!({ "success": true, "message": "Obrigado pela avaliação!" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_accepts_numbers_and_text() {
        let payload: RatingRequest =
            serde_json::from_value(json!({ "lesson_id": 7, "rating": "4,5" })).unwrap();
        assert_eq!(payload.parse().unwrap(), (7, 4.5));

        let payload: RatingRequest = serde_json::from_value(json!({ "rating": 3 })).unwrap();
        match payload.parse().unwrap_err() {
            AppError::Validation(errors) => {
                assert!(errors.contains("lesson_id"));
                assert!(!errors.contains("rating"));
            }
            other => panic!("esperava validação, veio {:?}", other),
        }
    }
}
