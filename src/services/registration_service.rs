// src/services/registration_service.rs
//! Criação de contas: registo mínimo pela API e formulários completos por papel.
//! Conta, perfil e veículo são gravados numa só transação; os ficheiros só
//! são escritos depois do commit.

use crate::{
    error::{AppError, AppResult, FieldErrors},
    models::{
        registration::{
            BasicRegistration, EmployeeRegistration, InstructorRegistration, StudentRegistration,
        },
        user::{NewUser, Role, User},
    },
    services::{
        auth_service, profile_service,
        storage::{MediaStorage, UploadedFile},
        user_service,
    },
    validators::{self, UploadKind},
};
use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};
use validator::Validate;

/// Ficheiros opcionais enviados com o registo.
#[derive(Debug, Default, Clone)]
pub struct RegistrationUploads {
    pub photo: Option<UploadedFile>,
    pub document: Option<UploadedFile>,
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

// Email (obrigatório, único), senha, nome, telefone e confirmação da senha.
// Devolve a conta já sem espaços à volta, que é a que se grava.
async fn check_account(
    db_pool: &SqlitePool,
    account: &BasicRegistration,
    password_confirm: Option<&str>,
    errors: &mut FieldErrors,
) -> AppResult<BasicRegistration> {
    let account = account.normalized();
    if let Err(e) = account.validate() {
        errors.merge(e.into());
    }
    if !errors.contains("email") && user_service::email_exists(db_pool, &account.email).await? {
        errors.add("email", "Este email já está cadastrado");
    }
    if let Some(confirm) = password_confirm {
        if confirm.trim() != account.password {
            errors.add("password_confirm", "As senhas não coincidem");
        }
    }
    Ok(account)
}

async fn check_cpf(db_pool: &SqlitePool, cpf: &str, errors: &mut FieldErrors) -> AppResult<Option<String>> {
    match validators::validate_cpf(cpf) {
        Ok(cpf) => {
            if profile_service::cpf_in_use(db_pool, &cpf, None).await? {
                errors.add("cpf", "Este CPF já está cadastrado");
            }
            Ok(Some(cpf))
        }
        Err(_) => Ok(None),
    }
}

fn check_birth_date(value: &str, errors: &mut FieldErrors) -> Option<NaiveDate> {
    let date = validators::parse_form_date(value).ok()?;
    validators::validate_adult(date, today())
        .map_err(|m| errors.add("birth_date", m))
        .ok()
}

fn check_uploads(uploads: &RegistrationUploads, errors: &mut FieldErrors) {
    if let Some(photo) = &uploads.photo {
        if let Err(m) = photo.validate(UploadKind::Photo) {
            errors.add("photo", m);
        }
    }
    if let Some(document) = &uploads.document {
        if let Err(m) = document.validate(UploadKind::Document) {
            errors.add("document", m);
        }
    }
}

fn blank_to_none(value: &str) -> Option<String> {
    Some(value.trim().to_string()).filter(|v| !v.is_empty())
}

async fn insert_account(
    conn: &mut SqliteConnection,
    account: &BasicRegistration,
    password_hash: String,
    role: Role,
) -> AppResult<i64> {
    let username = user_service::generate_username(conn, &account.email).await?;
    user_service::create_user(
        conn,
        &NewUser {
            username,
            email: account.email.trim().to_string(),
            password_hash,
            full_name: account.full_name.trim().to_string(),
            phone: account.phone.trim().to_string(),
            role,
        },
    )
    .await
}

// Depois do commit: grava os ficheiros e guarda os caminhos no perfil.
// Os uploads já foram validados, por isso uma falha aqui é de E/S e só fica no log.
async fn store_uploads(
    db_pool: &SqlitePool,
    storage: &MediaStorage,
    user_id: i64,
    uploads: &RegistrationUploads,
) -> AppResult<User> {
    let user = user_service::find_user_by_id(db_pool, user_id)
        .await?
        .ok_or(AppError::InternalServerError)?;

    if let Some(photo) = &uploads.photo {
        if let Err(e) = profile_service::replace_photo(db_pool, storage, &user, photo).await {
            tracing::error!("Falha ao gravar foto do user {}: {:?}", user_id, e);
        }
    }
    if let Some(document) = &uploads.document {
        if user.role != Role::Funcionario {
            if let Err(e) = profile_service::replace_document(db_pool, storage, &user, document).await {
                tracing::error!("Falha ao gravar documento do user {}: {:?}", user_id, e);
            }
        }
    }
    Ok(user)
}

/// Registo mínimo (`/auth/api/register/<papel>`): conta + perfil vazio.
pub async fn register_basic(
    db_pool: &SqlitePool,
    storage: &MediaStorage,
    role: Role,
    form: &BasicRegistration,
    uploads: &RegistrationUploads,
) -> AppResult<User> {
    let mut errors = FieldErrors::new();
    let form = check_account(db_pool, form, None, &mut errors).await?;
    check_uploads(uploads, &mut errors);
    if !errors.is_empty() {
        tracing::warn!("Registo ({}) recusado: {:?}", role.as_str(), errors);
    }
    errors.into_result()?;

    let password_hash = auth_service::hash_password(&form.password).await?;
    let mut tx = db_pool.begin().await?;
    let user_id = insert_account(&mut tx, &form, password_hash, role).await?;
    profile_service::insert_minimal_profile(&mut tx, user_id, role).await?;
    tx.commit().await?;

    tracing::info!("✅ Conta {} criada pela API ({})", user_id, role.as_str());
    store_uploads(db_pool, storage, user_id, uploads).await
}

pub async fn register_student(
    db_pool: &SqlitePool,
    storage: &MediaStorage,
    form: &StudentRegistration,
    uploads: &RegistrationUploads,
) -> AppResult<User> {
    let mut errors = FieldErrors::new();
    let account = check_account(db_pool, &form.account, Some(&form.password_confirm), &mut errors).await?;
    if let Err(e) = form.validate() {
        errors.merge(e.into());
    }
    if let Err(e) = form.address.validate() {
        errors.merge(e.into());
    }
    let cpf = check_cpf(db_pool, &form.cpf, &mut errors).await?;
    let birth_date = check_birth_date(&form.birth_date, &mut errors);
    check_uploads(uploads, &mut errors);
    errors.into_result()?;

    let address = form.address.to_address();
    let categories = validators::normalize_categories(&form.license_categories)
        .map_err(|m| AppError::field("license_categories", m))?;

    let password_hash = auth_service::hash_password(&account.password).await?;
    let mut tx = db_pool.begin().await?;
    let user_id = insert_account(&mut tx, &account, password_hash, Role::Aluno).await?;
    sqlx::query(
        r#"
        INSERT INTO student_profiles
            (user_id, cpf, rg, birth_date, cep, address, address_number, complement,
             neighborhood, city, state, license_categories)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )
    .bind(user_id)
    .bind(&cpf)
    .bind(blank_to_none(&form.rg))
    .bind(birth_date)
    .bind(&address.cep)
    .bind(&address.address)
    .bind(&address.address_number)
    .bind(&address.complement)
    .bind(&address.neighborhood)
    .bind(&address.city)
    .bind(&address.state)
    .bind(&categories)
    .execute(&mut *tx)
    .await
    .map_err(|e| AppError::from_unique(e, &[("student_profiles.cpf", "cpf", "Este CPF já está cadastrado")]))?;
    tx.commit().await?;

    tracing::info!("✅ Aluno {} registado", user_id);
    store_uploads(db_pool, storage, user_id, uploads).await
}

pub async fn register_instructor(
    db_pool: &SqlitePool,
    storage: &MediaStorage,
    form: &InstructorRegistration,
    uploads: &RegistrationUploads,
) -> AppResult<User> {
    let mut errors = FieldErrors::new();
    let account = check_account(db_pool, &form.account, Some(&form.password_confirm), &mut errors).await?;
    if let Err(e) = form.validate() {
        errors.merge(e.into());
    }
    if let Err(e) = form.address.validate() {
        errors.merge(e.into());
    }
    let cpf = check_cpf(db_pool, &form.cpf, &mut errors).await?;
    let birth_date = check_birth_date(&form.birth_date, &mut errors);
    let emission = validators::parse_form_date(&form.cnh_emission_date).ok();
    if emission.is_some_and(|d| d > today()) {
        errors.add("cnh_emission_date", "Data de emissão da CNH no futuro");
    }
    let vehicle = match profile_service::parse_vehicle(&form.vehicle, today()) {
        Ok(vehicle) => Some(vehicle),
        Err(vehicle_errors) => {
            errors.merge(vehicle_errors);
            None
        }
    };
    check_uploads(uploads, &mut errors);
    errors.into_result()?;
    let vehicle = vehicle.ok_or(AppError::InternalServerError)?;

    let address = form.address.to_address();
    let categories = validators::normalize_categories(&form.cnh_categories)
        .map_err(|m| AppError::field("cnh_categories", m))?;
    if !categories.contains(vehicle.category.as_str()) {
        return Err(AppError::field(
            "category",
            "A categoria do veículo tem de constar das categorias da CNH",
        ));
    }

    let password_hash = auth_service::hash_password(&account.password).await?;
    let mut tx = db_pool.begin().await?;
    let user_id = insert_account(&mut tx, &account, password_hash, Role::Instrutor).await?;
    sqlx::query(
        r#"
        INSERT INTO instructor_profiles
            (user_id, cpf, rg, birth_date, cnh, cnh_emission_date, cnh_categories, credential,
             cep, address, address_number, complement, neighborhood, city, state, status)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, 'pendente')
        "#,
    )
    .bind(user_id)
    .bind(&cpf)
    .bind(blank_to_none(&form.rg))
    .bind(birth_date)
    .bind(validators::normalize_digits(&form.cnh))
    .bind(emission)
    .bind(&categories)
    .bind(form.credential.trim())
    .bind(&address.cep)
    .bind(&address.address)
    .bind(&address.address_number)
    .bind(&address.complement)
    .bind(&address.neighborhood)
    .bind(&address.city)
    .bind(&address.state)
    .execute(&mut *tx)
    .await
    .map_err(|e| AppError::from_unique(e, profile_service::INSTRUCTOR_UNIQUE_COLUMNS))?;
    profile_service::save_vehicle(&mut tx, user_id, &vehicle).await?;
    tx.commit().await?;

    tracing::info!("✅ Instrutor {} registado (pendente de aprovação)", user_id);
    store_uploads(db_pool, storage, user_id, uploads).await
}

pub async fn register_employee(
    db_pool: &SqlitePool,
    storage: &MediaStorage,
    form: &EmployeeRegistration,
    uploads: &RegistrationUploads,
) -> AppResult<User> {
    let mut errors = FieldErrors::new();
    let account = check_account(db_pool, &form.account, Some(&form.password_confirm), &mut errors).await?;
    if let Err(e) = form.validate() {
        errors.merge(e.into());
    }
    let cpf = check_cpf(db_pool, &form.cpf, &mut errors).await?;
    let uploads = RegistrationUploads {
        photo: uploads.photo.clone(),
        document: None,
    };
    check_uploads(&uploads, &mut errors);
    errors.into_result()?;

    let password_hash = auth_service::hash_password(&account.password).await?;
    let mut tx = db_pool.begin().await?;
    let user_id = insert_account(&mut tx, &account, password_hash, Role::Funcionario).await?;
    sqlx::query(
        "INSERT INTO employee_profiles (user_id, cpf, department, position) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(user_id)
    .bind(&cpf)
    .bind(form.department.trim())
    .bind(form.position.trim())
    .execute(&mut *tx)
    .await
    .map_err(|e| AppError::from_unique(e, &[("employee_profiles.cpf", "cpf", "Este CPF já está cadastrado")]))?;
    tx.commit().await?;

    tracing::info!("✅ Funcionário {} registado", user_id);
    store_uploads(db_pool, storage, user_id, &uploads).await
}
