// src/web/profile_handlers.rs
use crate::{
    error::{AppError, AppResult},
    models::{
        profile::{
            Address, EmployeeProfileForm, InstructorProfileForm, Profile, StudentProfileForm,
        },
        user::{Role, User},
        vehicle::{InstructorVehicle, VehicleForm},
    },
    services::{account_service::DELETE_CONFIRMATION_WORD, profile_service},
    state::AppState,
    templates::{render, FormState, ProfilePage},
    web::{flash, flash::Flash, form_data::FormData, mw_auth::CurrentUser, nav_with},
};
use axum::{
    extract::{Extension, Form, Multipart, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use chrono::NaiveDate;
use std::collections::HashMap;
use tower_cookies::Cookies;

fn date_value(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default()
}

fn put_address(values: &mut HashMap<String, String>, address: &Address) {
    for (field, value) in [
        ("cep", &address.cep),
        ("address", &address.address),
        ("address_number", &address.address_number),
        ("complement", &address.complement),
        ("neighborhood", &address.neighborhood),
        ("city", &address.city),
        ("state", &address.state),
    ] {
        values.insert(field.to_string(), value.clone());
    }
}

// Valores atuais para preencher o formulário de dados pessoais
fn profile_values(user: &User, profile: &Profile) -> HashMap<String, String> {
    let mut values = HashMap::from([
        ("full_name".to_string(), user.full_name.clone()),
        ("phone".to_string(), user.phone.clone()),
        ("cpf".to_string(), profile.cpf().unwrap_or_default().to_string()),
    ]);
    match profile {
        Profile::Aluno(p) => {
            values.insert("rg".into(), p.rg.clone().unwrap_or_default());
            values.insert("birth_date".into(), date_value(p.birth_date));
            values.insert("license_categories".into(), p.license_categories.clone());
            put_address(&mut values, &p.address);
        }
        Profile::Instrutor { profile: p, .. } => {
            values.insert("rg".into(), p.rg.clone().unwrap_or_default());
            values.insert("birth_date".into(), date_value(p.birth_date));
            values.insert("cnh".into(), p.cnh.clone().unwrap_or_default());
            values.insert("cnh_emission_date".into(), date_value(p.cnh_emission_date));
            values.insert("cnh_categories".into(), p.cnh_categories.clone());
            values.insert("credential".into(), p.credential.clone().unwrap_or_default());
            put_address(&mut values, &p.address);
        }
        Profile::Funcionario(p) => {
            values.insert("department".into(), p.department.clone());
            values.insert("position".into(), p.position.clone());
        }
    }
    values
}

fn vehicle_values(vehicle: Option<&InstructorVehicle>) -> HashMap<String, String> {
    let Some(v) = vehicle else {
        return HashMap::from([("category".to_string(), "B".to_string())]);
    };
    let flag = |on: bool| if on { "on".to_string() } else { String::new() };
    HashMap::from([
        ("plate".to_string(), v.plate.clone()),
        ("renavam".to_string(), v.renavam.clone()),
        ("make".to_string(), v.make.clone()),
        ("model".to_string(), v.model.clone()),
        ("color".to_string(), v.color.clone()),
        ("year".to_string(), v.year.to_string()),
        ("category".to_string(), v.category.as_str().to_string()),
        ("dual_control".to_string(), flag(v.dual_control)),
        ("adapted_pcd".to_string(), flag(v.adapted_pcd)),
        (
            "last_license_exercise".to_string(),
            v.last_license_exercise.map(|y| y.to_string()).unwrap_or_default(),
        ),
    ])
}

fn render_profile(
    user: &User,
    profile: &Profile,
    flash: Option<Flash>,
    form: Option<FormState>,
    vehicle_form: Option<FormState>,
) -> AppResult<Html<String>> {
    let (instructor_status, current_vehicle) = match profile {
        Profile::Instrutor { profile, vehicle } => (Some(profile.status), Some(vehicle.as_ref())),
        _ => (None, None),
    };
    let page = ProfilePage {
        nav: Some(nav_with(user, profile)),
        flash,
        email: user.email.clone(),
        role: user.role,
        form: form.unwrap_or_else(|| FormState::new(profile_values(user, profile))),
        vehicle_form: vehicle_form.or_else(|| current_vehicle.map(|v| FormState::new(vehicle_values(v)))),
        photo_url: profile_service::photo_url(profile),
        document_url: profile_service::document_url(profile),
        instructor_status,
        delete_word: DELETE_CONFIRMATION_WORD,
    };
    render(&page)
}

// GET /profile
pub async fn show_profile(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    cookies: Cookies,
) -> AppResult<Html<String>> {
    let profile = profile_service::load(&state.db_pool, &user).await?;
    render_profile(&user, &profile, flash::take(&cookies, &state.cookie_key), None, None)
}

async fn apply_profile_update(state: &AppState, user: &User, data: &FormData) -> AppResult<()> {
    match user.role {
        Role::Aluno => {
            let form: StudentProfileForm = data.decode()?;
            profile_service::update_student(&state.db_pool, user.id, &form).await
        }
        Role::Instrutor => {
            let form: InstructorProfileForm = data.decode()?;
            profile_service::update_instructor(&state.db_pool, user.id, &form).await
        }
        Role::Funcionario => {
            let form: EmployeeProfileForm = data.decode()?;
            profile_service::update_employee(&state.db_pool, user.id, &form).await
        }
    }
}

// POST /profile
pub async fn handle_profile_update(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    cookies: Cookies,
    Form(fields): Form<HashMap<String, String>>,
) -> AppResult<Response> {
    let data = FormData::from_fields(fields);
    match apply_profile_update(&state, &user, &data).await {
        Ok(()) => {
            flash::success(&cookies, &state.cookie_key, "Perfil atualizado com sucesso!");
            Ok(Redirect::to("/profile").into_response())
        }
        Err(err) => {
            let form = FormState::from_error(data.echo(), err)?;
            let profile = profile_service::load(&state.db_pool, &user).await?;
            Ok(render_profile(&user, &profile, None, Some(form), None)?.into_response())
        }
    }
}

// POST /profile/vehicle
pub async fn handle_vehicle_update(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    cookies: Cookies,
    Form(fields): Form<HashMap<String, String>>,
) -> AppResult<Response> {
    if user.role != Role::Instrutor {
        tracing::warn!("{} tentou editar veículo sem ser instrutor", user.email);
        return Ok(Redirect::to(user.role.dashboard_path()).into_response());
    }

    let data = FormData::from_fields(fields);
    let result = match data.decode::<VehicleForm>() {
        Ok(form) => profile_service::update_vehicle(&state.db_pool, user.id, &form).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => {
            flash::success(&cookies, &state.cookie_key, "Veículo atualizado com sucesso!");
            Ok(Redirect::to("/profile").into_response())
        }
        Err(err) => {
            let vehicle_form = FormState::from_error(data.echo(), err)?;
            let profile = profile_service::load(&state.db_pool, &user).await?;
            Ok(render_profile(&user, &profile, None, None, Some(vehicle_form))?.into_response())
        }
    }
}

#[derive(Clone, Copy)]
enum Upload {
    Photo,
    Document,
}

async fn handle_upload(
    state: &AppState,
    user: &User,
    cookies: &Cookies,
    multipart: Multipart,
    upload: Upload,
) -> AppResult<Redirect> {
    let (field, missing, done) = match upload {
        Upload::Photo => ("photo", "Selecione uma foto.", "Foto atualizada com sucesso!"),
        Upload::Document => ("document", "Selecione um documento.", "Documento enviado com sucesso!"),
    };
    let mut data = FormData::from_multipart(multipart).await?;
    let Some(file) = data.take_file(field) else {
        flash::error(cookies, &state.cookie_key, missing);
        return Ok(Redirect::to("/profile"));
    };

    let result = match upload {
        Upload::Photo => profile_service::replace_photo(&state.db_pool, &state.storage, user, &file).await,
        Upload::Document => profile_service::replace_document(&state.db_pool, &state.storage, user, &file).await,
    };
    match result {
        Ok(_) => flash::success(cookies, &state.cookie_key, done),
        Err(AppError::Validation(errors)) => {
            let message = errors
                .get(field)
                .or_else(|| errors.iter().next().map(|(_, m)| m.as_str()))
                .unwrap_or("Arquivo inválido.")
                .to_string();
            flash::error(cookies, &state.cookie_key, message);
        }
        Err(e) => return Err(e),
    }
    Ok(Redirect::to("/profile"))
}

// POST /profile/photo
pub async fn handle_photo_upload(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    cookies: Cookies,
    multipart: Multipart,
) -> AppResult<Redirect> {
    handle_upload(&state, &user, &cookies, multipart, Upload::Photo).await
}

// POST /profile/document
pub async fn handle_document_upload(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    cookies: Cookies,
    multipart: Multipart,
) -> AppResult<Redirect> {
    handle_upload(&state, &user, &cookies, multipart, Upload::Document).await
}
