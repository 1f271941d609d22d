// src/web/registration_handlers.rs
//! Formulários completos de cadastro (multipart, com foto e documento).
use crate::{
    error::AppResult,
    models::{
        registration::{EmployeeRegistration, InstructorRegistration, StudentRegistration},
        user::{Role, User},
    },
    services::registration_service::{self, RegistrationUploads},
    state::AppState,
    templates::{render, FormState, RegisterEmployeePage, RegisterInstructorPage, RegisterStudentPage},
    web::{flash, form_data::FormData, mw_auth},
};
use axum::{
    extract::{Multipart, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use std::collections::HashMap;
use tower_cookies::Cookies;
use tower_sessions::Session;

fn take_uploads(data: &mut FormData) -> RegistrationUploads {
    RegistrationUploads {
        photo: data.take_file("photo"),
        document: data.take_file("document"),
    }
}

// Conta criada: entra logo e segue para o painel
async fn signed_up(state: &AppState, session: &Session, cookies: &Cookies, user: &User) -> AppResult<Response> {
    mw_auth::sign_in(session, user).await?;
    let message = match user.role {
        Role::Instrutor => "Cadastro enviado! A secretaria vai analisar os seus dados antes de liberar as aulas.",
        _ => "Cadastro realizado com sucesso!",
    };
    flash::success(cookies, &state.cookie_key, message);
    Ok(Redirect::to(user.role.dashboard_path()).into_response())
}

fn student_page(form: FormState) -> AppResult<Html<String>> {
    render(&RegisterStudentPage { nav: None, flash: None, form })
}

fn instructor_page(form: FormState) -> AppResult<Html<String>> {
    render(&RegisterInstructorPage { nav: None, flash: None, form })
}

fn employee_page(form: FormState) -> AppResult<Html<String>> {
    render(&RegisterEmployeePage { nav: None, flash: None, form })
}

// GET /register/student
pub async fn show_student_form() -> AppResult<Html<String>> {
    let values = HashMap::from([("license_categories".to_string(), "B".to_string())]);
    student_page(FormState::new(values))
}

// POST /register/student
pub async fn handle_student_registration(
    State(state): State<AppState>,
    session: Session,
    cookies: Cookies,
    multipart: Multipart,
) -> AppResult<Response> {
    let mut data = FormData::from_multipart(multipart).await?;
    let uploads = take_uploads(&mut data);
    let result = match data.decode::<StudentRegistration>() {
        Ok(form) => registration_service::register_student(&state.db_pool, &state.storage, &form, &uploads).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(user) => signed_up(&state, &session, &cookies, &user).await,
        Err(err) => {
            let form = FormState::from_error(data.echo(), err)?;
            Ok(student_page(form)?.into_response())
        }
    }
}

// GET /register/instructor
pub async fn show_instructor_form() -> AppResult<Html<String>> {
    let values = HashMap::from([
        ("cnh_categories".to_string(), "B".to_string()),
        ("category".to_string(), "B".to_string()),
    ]);
    instructor_page(FormState::new(values))
}

// POST /register/instructor
pub async fn handle_instructor_registration(
    State(state): State<AppState>,
    session: Session,
    cookies: Cookies,
    multipart: Multipart,
) -> AppResult<Response> {
    let mut data = FormData::from_multipart(multipart).await?;
    let uploads = take_uploads(&mut data);
    let result = match data.decode::<InstructorRegistration>() {
        Ok(form) => {
            registration_service::register_instructor(&state.db_pool, &state.storage, &form, &uploads).await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(user) => signed_up(&state, &session, &cookies, &user).await,
        Err(err) => {
            let form = FormState::from_error(data.echo(), err)?;
            Ok(instructor_page(form)?.into_response())
        }
    }
}

// GET /register/employee
pub async fn show_employee_form() -> AppResult<Html<String>> {
    employee_page(FormState::default())
}

// POST /register/employee
pub async fn handle_employee_registration(
    State(state): State<AppState>,
    session: Session,
    cookies: Cookies,
    multipart: Multipart,
) -> AppResult<Response> {
    let mut data = FormData::from_multipart(multipart).await?;
    let uploads = take_uploads(&mut data);
    let result = match data.decode::<EmployeeRegistration>() {
        Ok(form) => registration_service::register_employee(&state.db_pool, &state.storage, &form, &uploads).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(user) => signed_up(&state, &session, &cookies, &user).await,
        Err(err) => {
            let form = FormState::from_error(data.echo(), err)?;
            Ok(employee_page(form)?.into_response())
        }
    }
}
