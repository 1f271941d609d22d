// src/services/profile_service.rs
use crate::{
    error::{AppError, AppResult, FieldErrors},
    models::{
        lesson::{is_checked, VehicleType},
        profile::{
            EmployeeProfile, EmployeeProfileForm, InstructorProfile, InstructorProfileForm,
            InstructorStatus, InstructorSummary, Profile, StudentProfile, StudentProfileForm,
        },
        user::{Role, User},
        vehicle::{InstructorVehicle, VehicleData, VehicleForm},
    },
    services::{
        storage::{MediaStorage, UploadedFile},
        user_service,
    },
    validators::{self, UploadKind},
};
use chrono::NaiveDate;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use validator::Validate;

const VEHICLE_UNIQUE_COLUMNS: &[(&str, &str, &str)] = &[
    ("instructor_vehicles.plate", "plate", "Esta placa já está cadastrada"),
    ("instructor_vehicles.renavam", "renavam", "Este RENAVAM já está cadastrado"),
];

pub(crate) const INSTRUCTOR_UNIQUE_COLUMNS: &[(&str, &str, &str)] = &[
    ("instructor_profiles.cpf", "cpf", "Este CPF já está cadastrado"),
    ("instructor_profiles.cnh", "cnh", "Esta CNH já está cadastrada"),
    ("instructor_profiles.credential", "credential", "Esta credencial já está cadastrada"),
];

fn profile_table(role: Role) -> &'static str {
    match role {
        Role::Aluno => "student_profiles",
        Role::Instrutor => "instructor_profiles",
        Role::Funcionario => "employee_profiles",
    }
}

fn blank_to_none(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// O CPF já pertence a outro perfil (aluno, instrutor ou funcionário)?
pub async fn cpf_in_use<'e, E>(executor: E, cpf: &str, exclude_user: Option<i64>) -> AppResult<bool>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let in_use: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT user_id FROM student_profiles WHERE cpf = ?1 AND (?2 IS NULL OR user_id <> ?2)
            UNION ALL
            SELECT user_id FROM instructor_profiles WHERE cpf = ?1 AND (?2 IS NULL OR user_id <> ?2)
            UNION ALL
            SELECT user_id FROM employee_profiles WHERE cpf = ?1 AND (?2 IS NULL OR user_id <> ?2)
        )
        "#,
    )
    .bind(cpf)
    .bind(exclude_user)
    .fetch_one(executor)
    .await?;
    Ok(in_use)
}

/// Valida e normaliza os campos do veículo (placa, RENAVAM, ano...).
pub fn parse_vehicle(form: &VehicleForm, today: NaiveDate) -> Result<VehicleData, FieldErrors> {
    let mut errors = FieldErrors::new();

    let plate = validators::validate_plate(&form.plate)
        .map_err(|m| errors.add("plate", m))
        .ok();
    let renavam = validators::validate_renavam(&form.renavam)
        .map_err(|m| errors.add("renavam", m))
        .ok();

    let make = form.make.trim().to_string();
    if make.is_empty() {
        errors.add("make", "Marca é obrigatória");
    }
    let model = form.model.trim().to_string();
    if model.is_empty() {
        errors.add("model", "Modelo é obrigatório");
    }

    let year = match form.year.trim().parse::<i32>() {
        Ok(year) => validators::validate_vehicle_year(year, today)
            .map_err(|m| errors.add("year", m))
            .ok(),
        Err(_) => {
            errors.add("year", "Ano do veículo é obrigatório");
            None
        }
    };

    let category = VehicleType::parse(&form.category);
    if category.is_none() {
        errors.add("category", "Categoria do veículo deve ser A ou B");
    }

    let last_license_exercise = match form.last_license_exercise.trim() {
        "" => None,
        raw => match raw.parse::<i32>() {
            Ok(y) => validators::validate_vehicle_year(y, today)
                .map_err(|_| errors.add("last_license_exercise", "Exercício de licenciamento inválido"))
                .ok(),
            Err(_) => {
                errors.add("last_license_exercise", "Exercício de licenciamento inválido");
                None
            }
        },
    };

    match (plate, renavam, year, category) {
        (Some(plate), Some(renavam), Some(year), Some(category)) if errors.is_empty() => {
            Ok(VehicleData {
                plate,
                renavam,
                make,
                model,
                color: form.color.trim().to_string(),
                year,
                category,
                dual_control: is_checked(form.dual_control.as_deref()),
                adapted_pcd: is_checked(form.adapted_pcd.as_deref()),
                last_license_exercise,
            })
        }
        _ => Err(errors),
    }
}

/// Cria ou substitui o veículo do instrutor.
pub async fn save_vehicle(
    conn: &mut SqliteConnection,
    instructor_id: i64,
    vehicle: &VehicleData,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO instructor_vehicles
            (instructor_id, plate, renavam, make, model, color, year, category,
             dual_control, adapted_pcd, last_license_exercise)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        ON CONFLICT (instructor_id) DO UPDATE SET
            plate = excluded.plate,
            renavam = excluded.renavam,
            make = excluded.make,
            model = excluded.model,
            color = excluded.color,
            year = excluded.year,
            category = excluded.category,
            dual_control = excluded.dual_control,
            adapted_pcd = excluded.adapted_pcd,
            last_license_exercise = excluded.last_license_exercise,
            updated_at = datetime('now')
        "#,
    )
    .bind(instructor_id)
    .bind(&vehicle.plate)
    .bind(&vehicle.renavam)
    .bind(&vehicle.make)
    .bind(&vehicle.model)
    .bind(&vehicle.color)
    .bind(vehicle.year)
    .bind(vehicle.category)
    .bind(vehicle.dual_control)
    .bind(vehicle.adapted_pcd)
    .bind(vehicle.last_license_exercise)
    .execute(&mut *conn)
    .await
    .map_err(|e| AppError::from_unique(e, VEHICLE_UNIQUE_COLUMNS))?;
    Ok(())
}

pub async fn find_vehicle(db_pool: &SqlitePool, instructor_id: i64) -> AppResult<Option<InstructorVehicle>> {
    let vehicle = sqlx::query_as::<_, InstructorVehicle>(
        "SELECT * FROM instructor_vehicles WHERE instructor_id = ?1",
    )
    .bind(instructor_id)
    .fetch_optional(db_pool)
    .await?;
    Ok(vehicle)
}

/// Perfil vazio para contas criadas pela API (instrutores ficam pendentes).
pub async fn insert_minimal_profile(conn: &mut SqliteConnection, user_id: i64, role: Role) -> AppResult<()> {
    let sql = format!(
        "INSERT INTO {} (user_id) VALUES (?1) ON CONFLICT (user_id) DO NOTHING",
        profile_table(role)
    );
    sqlx::query(&sql).bind(user_id).execute(&mut *conn).await?;
    Ok(())
}

/// Carrega o perfil do utilizador, criando um perfil vazio se ainda não existir.
pub async fn load(db_pool: &SqlitePool, user: &User) -> AppResult<Profile> {
    {
        let mut conn = db_pool.acquire().await?;
        insert_minimal_profile(&mut conn, user.id, user.role).await?;
    }

    let profile = match user.role {
        Role::Aluno => Profile::Aluno(
            sqlx::query_as::<_, StudentProfile>("SELECT * FROM student_profiles WHERE user_id = ?1")
                .bind(user.id)
                .fetch_one(db_pool)
                .await?,
        ),
        Role::Instrutor => {
            let profile = sqlx::query_as::<_, InstructorProfile>(
                "SELECT * FROM instructor_profiles WHERE user_id = ?1",
            )
            .bind(user.id)
            .fetch_one(db_pool)
            .await?;
            let vehicle = find_vehicle(db_pool, user.id).await?;
            Profile::Instrutor { profile, vehicle }
        }
        Role::Funcionario => Profile::Funcionario(
            sqlx::query_as::<_, EmployeeProfile>("SELECT * FROM employee_profiles WHERE user_id = ?1")
                .bind(user.id)
                .fetch_one(db_pool)
                .await?,
        ),
    };
    Ok(profile)
}

pub async fn find_instructor(db_pool: &SqlitePool, user_id: i64) -> AppResult<Option<InstructorProfile>> {
    let profile = sqlx::query_as::<_, InstructorProfile>(
        "SELECT * FROM instructor_profiles WHERE user_id = ?1",
    )
    .bind(user_id)
    .fetch_optional(db_pool)
    .await?;
    Ok(profile)
}

/// URL da foto com `?v=<timestamp>` para o browser não mostrar a versão antiga.
pub fn photo_url(profile: &Profile) -> Option<String> {
    profile.photo().map(|photo| {
        format!(
            "{}?v={}",
            MediaStorage::public_url(photo),
            profile.updated_at().and_utc().timestamp()
        )
    })
}

pub fn document_url(profile: &Profile) -> Option<String> {
    profile.document().map(MediaStorage::public_url)
}

// Regras comuns: CPF único (excluindo o próprio) e idade mínima
async fn check_personal_data(
    db_pool: &SqlitePool,
    user_id: i64,
    cpf: &str,
    birth_date: &str,
    errors: &mut FieldErrors,
) -> AppResult<(Option<String>, Option<NaiveDate>)> {
    let today = chrono::Local::now().date_naive();
    let cpf = match validators::validate_cpf(cpf) {
        Ok(cpf) => {
            if cpf_in_use(db_pool, &cpf, Some(user_id)).await? {
                errors.add("cpf", "Este CPF já está cadastrado");
            }
            Some(cpf)
        }
        Err(_) => None,
    };
    let birth_date = validators::parse_form_date(birth_date)
        .ok()
        .and_then(|date| validators::validate_adult(date, today).map_err(|m| errors.add("birth_date", m)).ok());
    Ok((cpf, birth_date))
}

pub async fn update_student(db_pool: &SqlitePool, user_id: i64, form: &StudentProfileForm) -> AppResult<()> {
    let mut errors = FieldErrors::new();
    if let Err(e) = form.validate() {
        errors.merge(e.into());
    }
    if let Err(e) = form.address.validate() {
        errors.merge(e.into());
    }
    let (cpf, birth_date) = check_personal_data(db_pool, user_id, &form.cpf, &form.birth_date, &mut errors).await?;
    errors.into_result()?;

    let address = form.address.to_address();
    let categories = validators::normalize_categories(&form.license_categories)
        .map_err(|m| AppError::field("license_categories", m))?;

    let mut tx = db_pool.begin().await?;
    insert_minimal_profile(&mut tx, user_id, Role::Aluno).await?;
    user_service::update_contact(&mut tx, user_id, &form.full_name, &form.phone).await?;
    sqlx::query(
        r#"
        UPDATE student_profiles SET
            cpf = ?1, rg = ?2, birth_date = ?3, cep = ?4, address = ?5, address_number = ?6,
            complement = ?7, neighborhood = ?8, city = ?9, state = ?10,
            license_categories = ?11, updated_at = datetime('now')
        WHERE user_id = ?12
        "#,
    )
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
    .bind(user_id)
    .execute(&mut *tx)
    .await
    .map_err(|e| AppError::from_unique(e, &[("student_profiles.cpf", "cpf", "Este CPF já está cadastrado")]))?;
    tx.commit().await?;

    tracing::info!("✏️ Perfil do aluno {} atualizado", user_id);
    Ok(())
}

pub async fn update_instructor(
    db_pool: &SqlitePool,
    user_id: i64,
    form: &InstructorProfileForm,
) -> AppResult<()> {
    let mut errors = FieldErrors::new();
    if let Err(e) = form.validate() {
        errors.merge(e.into());
    }
    if let Err(e) = form.address.validate() {
        errors.merge(e.into());
    }
    let (cpf, birth_date) = check_personal_data(db_pool, user_id, &form.cpf, &form.birth_date, &mut errors).await?;
    let today = chrono::Local::now().date_naive();
    let emission = validators::parse_form_date(&form.cnh_emission_date).ok();
    if emission.is_some_and(|d| d > today) {
        errors.add("cnh_emission_date", "Data de emissão da CNH no futuro");
    }
    errors.into_result()?;

    let address = form.address.to_address();
    let categories = validators::normalize_categories(&form.cnh_categories)
        .map_err(|m| AppError::field("cnh_categories", m))?;
    let cnh = validators::normalize_digits(&form.cnh);

    let mut tx = db_pool.begin().await?;
    insert_minimal_profile(&mut tx, user_id, Role::Instrutor).await?;
    user_service::update_contact(&mut tx, user_id, &form.full_name, &form.phone).await?;
    sqlx::query(
        r#"
        UPDATE instructor_profiles SET
            cpf = ?1, rg = ?2, birth_date = ?3, cnh = ?4, cnh_emission_date = ?5,
            cnh_categories = ?6, credential = ?7, cep = ?8, address = ?9, address_number = ?10,
            complement = ?11, neighborhood = ?12, city = ?13, state = ?14,
            updated_at = datetime('now')
        WHERE user_id = ?15
        "#,
    )
    .bind(&cpf)
    .bind(blank_to_none(&form.rg))
    .bind(birth_date)
    .bind(&cnh)
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
    .bind(user_id)
    .execute(&mut *tx)
    .await
    .map_err(|e| AppError::from_unique(e, INSTRUCTOR_UNIQUE_COLUMNS))?;
    tx.commit().await?;

    tracing::info!("✏️ Perfil do instrutor {} atualizado", user_id);
    Ok(())
}

pub async fn update_employee(db_pool: &SqlitePool, user_id: i64, form: &EmployeeProfileForm) -> AppResult<()> {
    let mut errors = FieldErrors::new();
    if let Err(e) = form.validate() {
        errors.merge(e.into());
    }
    let cpf = match validators::validate_cpf(&form.cpf) {
        Ok(cpf) => {
            if cpf_in_use(db_pool, &cpf, Some(user_id)).await? {
                errors.add("cpf", "Este CPF já está cadastrado");
            }
            Some(cpf)
        }
        Err(_) => None,
    };
    errors.into_result()?;

    let mut tx = db_pool.begin().await?;
    insert_minimal_profile(&mut tx, user_id, Role::Funcionario).await?;
    user_service::update_contact(&mut tx, user_id, &form.full_name, &form.phone).await?;
    sqlx::query(
        r#"
        UPDATE employee_profiles SET cpf = ?1, department = ?2, position = ?3,
            updated_at = datetime('now')
        WHERE user_id = ?4
        "#,
    )
    .bind(&cpf)
    .bind(form.department.trim())
    .bind(form.position.trim())
    .bind(user_id)
    .execute(&mut *tx)
    .await
    .map_err(|e| AppError::from_unique(e, &[("employee_profiles.cpf", "cpf", "Este CPF já está cadastrado")]))?;
    tx.commit().await?;

    tracing::info!("✏️ Perfil do funcionário {} atualizado", user_id);
    Ok(())
}

/// O instrutor edita o veículo (mesmas regras do registo).
pub async fn update_vehicle(db_pool: &SqlitePool, instructor_id: i64, form: &VehicleForm) -> AppResult<()> {
    let today = chrono::Local::now().date_naive();
    let vehicle = parse_vehicle(form, today).map_err(AppError::Validation)?;

    let mut conn = db_pool.acquire().await?;
    save_vehicle(&mut conn, instructor_id, &vehicle).await?;
    tracing::info!("🚗 Veículo do instrutor {} atualizado ({})", instructor_id, vehicle.plate);
    Ok(())
}

// Grava o ficheiro novo, atualiza a coluna e remove o antigo
async fn replace_file(
    db_pool: &SqlitePool,
    storage: &MediaStorage,
    user: &User,
    file: &UploadedFile,
    kind: UploadKind,
) -> AppResult<String> {
    let column = match kind {
        UploadKind::Photo => "photo",
        UploadKind::Document => "document",
    };
    if kind == UploadKind::Document && user.role == Role::Funcionario {
        return Err(AppError::field("document", "Funcionários não enviam documentos"));
    }
    let table = profile_table(user.role);

    let mut conn = db_pool.acquire().await?;
    insert_minimal_profile(&mut conn, user.id, user.role).await?;
    let select = format!("SELECT {column} FROM {table} WHERE user_id = ?1");
    let previous: Option<String> = sqlx::query_scalar(&select)
        .bind(user.id)
        .fetch_one(&mut *conn)
        .await?;
    drop(conn);

    let relative = storage.save(kind, column, user.id, file).await?;
    sqlx::query(&format!(
        "UPDATE {table} SET {column} = ?1, updated_at = datetime('now') WHERE user_id = ?2"
    ))
    .bind(&relative)
    .bind(user.id)
    .execute(db_pool)
    .await?;

    if let Some(previous) = previous.filter(|p| *p != relative) {
        storage.remove(&previous).await;
    }
    Ok(relative)
}

pub async fn replace_photo(
    db_pool: &SqlitePool,
    storage: &MediaStorage,
    user: &User,
    file: &UploadedFile,
) -> AppResult<String> {
    replace_file(db_pool, storage, user, file, UploadKind::Photo).await
}

pub async fn replace_document(
    db_pool: &SqlitePool,
    storage: &MediaStorage,
    user: &User,
    file: &UploadedFile,
) -> AppResult<String> {
    replace_file(db_pool, storage, user, file, UploadKind::Document).await
}

/// Aprovação/desativação de instrutores pela secretaria.
pub async fn set_instructor_status(
    db_pool: &SqlitePool,
    instructor_id: i64,
    status: InstructorStatus,
) -> AppResult<()> {
    let rows_affected = sqlx::query(
        "UPDATE instructor_profiles SET status = ?1, updated_at = datetime('now') WHERE user_id = ?2",
    )
    .bind(status)
    .bind(instructor_id)
    .execute(db_pool)
    .await?
    .rows_affected();

    if rows_affected == 0 {
        return Err(AppError::NotFound("Instrutor não encontrado.".into()));
    }
    tracing::info!("Instrutor {} passou a {}", instructor_id, status.as_str());
    Ok(())
}

/// Instrutores à espera de aprovação (ou inativos), mais antigos primeiro.
pub async fn instructors_awaiting_review(db_pool: &SqlitePool) -> AppResult<Vec<InstructorSummary>> {
    let list = sqlx::query_as::<_, InstructorSummary>(
        r#"
        SELECT u.id AS user_id, u.full_name, u.email, u.phone, p.cnh_categories, p.status, u.created_at
        FROM instructor_profiles p
        JOIN users u ON u.id = p.user_id
        WHERE p.status <> 'ativo'
        ORDER BY p.status = 'inativo', u.created_at, u.id
        "#,
    )
    .fetch_all(db_pool)
    .await?;
    Ok(list)
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::{
        db::test_pool, models::profile::AddressForm, services::user_service::tests::insert_user,
    };
    use axum::body::Bytes;

    pub fn vehicle_form(plate: &str, renavam: &str, category: &str) -> VehicleForm {
        VehicleForm {
            plate: plate.into(),
            renavam: renavam.into(),
            make: "Volkswagen".into(),
            model: "Gol".into(),
            color: "Prata".into(),
            year: "2020".into(),
            category: category.into(),
            dual_control: Some("on".into()),
            adapted_pcd: None,
            last_license_exercise: "2025".into(),
        }
    }

    /// Instrutor aprovado, com CNH nas categorias dadas e veículo opcional.
    pub async fn insert_instructor(
        pool: &SqlitePool,
        email: &str,
        categories: &str,
        vehicle: Option<VehicleForm>,
    ) -> i64 {
        let id = insert_user(pool, email, "senha123", Role::Instrutor).await;
        let mut conn = pool.acquire().await.unwrap();
        insert_minimal_profile(&mut conn, id, Role::Instrutor).await.unwrap();
        sqlx::query("UPDATE instructor_profiles SET status = 'ativo', cnh_categories = ?1 WHERE user_id = ?2")
            .bind(categories)
            .bind(id)
            .execute(&mut *conn)
            .await
            .unwrap();
        if let Some(form) = vehicle {
            let data = parse_vehicle(&form, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()).unwrap();
            save_vehicle(&mut conn, id, &data).await.unwrap();
        }
        id
    }

    fn address() -> AddressForm {
        AddressForm {
            cep: "01001000".into(),
            address: "Praça da Sé".into(),
            address_number: "100".into(),
            complement: String::new(),
            neighborhood: "Sé".into(),
            city: "São Paulo".into(),
            state: "sp".into(),
        }
    }

    #[test]
    fn vehicle_fields_are_normalized() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let data = parse_vehicle(&vehicle_form("abc-1234", "639884962", "b"), today).unwrap();
        assert_eq!(data.plate, "ABC1234");
        assert_eq!(data.renavam, "00639884962");
        assert_eq!(data.category, VehicleType::B);
        assert!(data.dual_control);
        assert!(!data.adapted_pcd);
        assert_eq!(data.last_license_exercise, Some(2025));
    }

    #[test]
    fn vehicle_errors_are_collected() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let mut form = vehicle_form("12-ABCD", "00639884963", "C");
        form.year = "1900".into();
        form.make = " ".into();
        let errors = parse_vehicle(&form, today).unwrap_err();
        for field in ["plate", "renavam", "category", "year", "make"] {
            assert!(errors.contains(field), "faltou erro em {}", field);
        }
    }

    #[tokio::test]
    async fn cpf_is_unique_across_profile_tables() {
        let pool = test_pool().await;
        let student = insert_user(&pool, "aluno@email.com", "senha123", Role::Aluno).await;
        let employee = insert_user(&pool, "func@email.com", "senha123", Role::Funcionario).await;

        let form = StudentProfileForm {
            full_name: "Maria Silva".into(),
            phone: "(11) 98765-4321".into(),
            cpf: "529.982.247-25".into(),
            rg: "12.345.678-9".into(),
            birth_date: "2000-05-10".into(),
            license_categories: "B".into(),
            address: address(),
        };
        update_student(&pool, student, &form).await.unwrap();
        // Guardar de novo com o mesmo CPF não colide consigo próprio
        update_student(&pool, student, &form).await.unwrap();

        let err = update_employee(
            &pool,
            employee,
            &EmployeeProfileForm {
                full_name: "Ana Costa".into(),
                phone: "(11) 91234-5678".into(),
                cpf: "52998224725".into(),
                department: "Secretaria".into(),
                position: "Atendente".into(),
            },
        )
        .await
        .unwrap_err();
        match err {
            AppError::Validation(errors) => assert!(errors.contains("cpf")),
            other => panic!("esperava validação, veio {:?}", other),
        }

        let user = user_service::find_user_by_id(&pool, student).await.unwrap().unwrap();
        match load(&pool, &user).await.unwrap() {
            Profile::Aluno(p) => {
                assert_eq!(p.cpf.as_deref(), Some("52998224725"));
                assert_eq!(p.address.cep, "01001-000");
                assert_eq!(p.address.state, "SP");
            }
            other => panic!("perfil inesperado {:?}", other),
        }
    }

    #[tokio::test]
    async fn first_profile_save_creates_the_row() {
        let pool = test_pool().await;
        let employee = insert_user(&pool, "sec@email.com", "senha123", Role::Funcionario).await;

        update_employee(
            &pool,
            employee,
            &EmployeeProfileForm {
                full_name: "Ana Costa".into(),
                phone: "(11) 91234-5678".into(),
                cpf: "111.444.777-35".into(),
                department: "Secretaria".into(),
                position: "Atendente".into(),
            },
        )
        .await
        .unwrap();

        let (count, department): (i64, Option<String>) = sqlx::query_as(
            "SELECT COUNT(*), MAX(department) FROM employee_profiles WHERE user_id = ?1",
        )
        .bind(employee)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1);
        assert_eq!(department.as_deref(), Some("Secretaria"));
    }

    #[tokio::test]
    async fn minors_cannot_be_students() {
        let pool = test_pool().await;
        let student = insert_user(&pool, "novo@email.com", "senha123", Role::Aluno).await;
        let today = chrono::Local::now().date_naive();
        let form = StudentProfileForm {
            full_name: "Pedro".into(),
            phone: "(11) 98765-4321".into(),
            cpf: "11144477735".into(),
            birth_date: today.format("%Y-%m-%d").to_string(),
            license_categories: "A".into(),
            address: address(),
            ..Default::default()
        };
        let err = update_student(&pool, student, &form).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ref e) if e.contains("birth_date")));
    }

    #[tokio::test]
    async fn plate_must_be_unique() {
        let pool = test_pool().await;
        insert_instructor(&pool, "a@auto.com", "B", Some(vehicle_form("ABC1234", "00639884962", "B"))).await;
        let other = insert_instructor(&pool, "b@auto.com", "B", None).await;

        let err = update_vehicle(&pool, other, &vehicle_form("ABC-1234", "12345678900", "B"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref e) if e.contains("plate")));

        update_vehicle(&pool, other, &vehicle_form("BRA2E19", "12345678900", "B")).await.unwrap();
        let vehicle = find_vehicle(&pool, other).await.unwrap().unwrap();
        assert_eq!(vehicle.plate, "BRA2E19");
    }

    #[tokio::test]
    async fn photo_replacement_removes_old_file() {
        let pool = test_pool().await;
        let dir = tempfile::tempdir().unwrap();
        let storage = MediaStorage::new(dir.path());
        let id = insert_user(&pool, "foto@email.com", "senha123", Role::Aluno).await;
        let user = user_service::find_user_by_id(&pool, id).await.unwrap().unwrap();

        let file = UploadedFile {
            field: "photo".into(),
            file_name: "eu.png".into(),
            bytes: Bytes::from_static(b"png"),
        };
        let first = replace_photo(&pool, &storage, &user, &file).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = replace_photo(&pool, &storage, &user, &file).await.unwrap();
        assert_ne!(first, second);
        assert!(!dir.path().join(&first).exists());
        assert!(dir.path().join(&second).exists());

        let profile = load(&pool, &user).await.unwrap();
        let url = photo_url(&profile).unwrap();
        assert!(url.starts_with(&format!("/media/{}?v=", second)));
    }

    #[tokio::test]
    async fn employees_review_instructors() {
        let pool = test_pool().await;
        let id = insert_user(&pool, "novo@auto.com", "senha123", Role::Instrutor).await;
        {
            let mut conn = pool.acquire().await.unwrap();
            insert_minimal_profile(&mut conn, id, Role::Instrutor).await.unwrap();
        }
        let pending = instructors_awaiting_review(&pool).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].status, InstructorStatus::Pendente);

        set_instructor_status(&pool, id, InstructorStatus::Ativo).await.unwrap();
        assert!(instructors_awaiting_review(&pool).await.unwrap().is_empty());
        assert!(matches!(
            set_instructor_status(&pool, 9999, InstructorStatus::Ativo).await,
            Err(AppError::NotFound(_))
        ));
    }
}
