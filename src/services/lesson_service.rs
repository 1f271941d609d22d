// src/services/lesson_service.rs
use crate::{
    error::{AppError, AppResult, FieldErrors},
    models::{
        lesson::{
            is_checked, EmployeeStats, InstructorFilter, InstructorOption, InstructorStats, Lesson,
            LessonForm, LessonStatus, LessonView, NewLesson, StudentStats, VehicleFilter,
            VehicleType, BLOCKING_STATUSES,
        },
        profile::{InstructorStatus, InstructorSummary},
        user::{Role, User},
        vehicle::VehicleOption,
    },
    services::profile_service,
    validators,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use sqlx::{FromRow, Sqlite, SqlitePool};
use std::collections::HashSet;

pub const LESSON_DURATION_MINUTES: i64 = 50;
pub const REQUIRED_HOURS: i64 = 20;

/// Horários oferecidos no agendamento.
pub const TIME_SLOTS: &[&str] = &[
    "08:00", "09:00", "10:00", "11:00", "14:00", "15:00", "16:00", "17:00",
];

const LESSON_VIEW_SELECT: &str = r#"
    SELECT l.*,
           s.full_name AS student_name,
           i.full_name AS instructor_name,
           v.plate AS vehicle_plate,
           CASE WHEN v.id IS NULL THEN NULL ELSE v.make || ' ' || v.model END AS vehicle_description
    FROM lessons l
    JOIN users s ON s.id = l.student_id
    LEFT JOIN users i ON i.id = l.instructor_id
    LEFT JOIN instructor_vehicles v ON v.id = l.vehicle_id
"#;

/// Quem tem o horário ocupado: o aluno ou o instrutor da aula.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Student,
    Instructor,
}

impl Party {
    fn column(self) -> &'static str {
        match self {
            Party::Student => "student_id",
            Party::Instructor => "instructor_id",
        }
    }
}

// ('pending', 'scheduled', ...) para as cláusulas IN
fn blocking_statuses_sql() -> String {
    let list: Vec<String> = BLOCKING_STATUSES
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect();
    format!("({})", list.join(", "))
}

pub fn parse_slot(value: &str) -> Result<NaiveTime, &'static str> {
    let value = value.trim();
    let value = value.get(..5).unwrap_or(value);
    if !TIME_SLOTS.contains(&value) {
        return Err("Horário indisponível. Escolha um dos horários oferecidos");
    }
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|_| "Horário inválido")
}

/// Progresso do aluno: horas feitas sobre as 20 exigidas, limitado a 100.
pub fn progress_for(completed_lessons: i64) -> i64 {
    let hours = completed_lessons * LESSON_DURATION_MINUTES / 60;
    (hours * 100 / REQUIRED_HOURS).clamp(0, 100)
}

/// Existe aula num estado que ocupe o horário (data + hora) para esta pessoa?
pub async fn has_conflict<'e, E>(
    executor: E,
    party: Party,
    user_id: i64,
    date: NaiveDate,
    time: NaiveTime,
    exclude_lesson: Option<i64>,
) -> AppResult<bool>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM lessons
            WHERE {} = ?1 AND date = ?2 AND time = ?3
              AND status IN {}
              AND (?4 IS NULL OR id <> ?4)
        )
        "#,
        party.column(),
        blocking_statuses_sql()
    );
    let exists: bool = sqlx::query_scalar(&sql)
        .bind(user_id)
        .bind(date)
        .bind(time)
        .bind(exclude_lesson)
        .fetch_one(executor)
        .await?;
    Ok(exists)
}

pub async fn find_lesson(db_pool: &SqlitePool, lesson_id: i64) -> AppResult<Lesson> {
    sqlx::query_as::<_, Lesson>("SELECT * FROM lessons WHERE id = ?1")
        .bind(lesson_id)
        .fetch_optional(db_pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Aula não encontrada.".into()))
}

pub async fn find_lesson_view(db_pool: &SqlitePool, lesson_id: i64) -> AppResult<LessonView> {
    let sql = format!("{LESSON_VIEW_SELECT} WHERE l.id = ?1");
    let lesson = sqlx::query_as::<_, LessonView>(&sql)
        .bind(lesson_id)
        .fetch_optional(db_pool)
        .await?;
    lesson.ok_or_else(|| AppError::NotFound("Aula não encontrada.".into()))
}

fn parse_optional_id(value: &str, field: &str, errors: &mut FieldErrors) -> Option<i64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    match value.parse::<i64>() {
        Ok(id) => Some(id),
        Err(_) => {
            errors.add(field, "Seleção inválida");
            None
        }
    }
}

// Validação comum a agendar e remarcar
async fn validate_request(
    db_pool: &SqlitePool,
    student_id: i64,
    form: &LessonForm,
    exclude_lesson: Option<i64>,
    now: NaiveDateTime,
) -> AppResult<NewLesson> {
    let mut errors = FieldErrors::new();

    let date = match validators::parse_form_date(&form.date) {
        Ok(date) if date < now.date() => {
            errors.add("date", "Não é possível agendar aulas em datas passadas");
            None
        }
        Ok(date) => Some(date),
        Err(m) => {
            errors.add("date", m);
            None
        }
    };
    let time = parse_slot(&form.time).map_err(|m| errors.add("time", m)).ok();
    if let (Some(date), Some(time)) = (date, time) {
        if date == now.date() && time <= now.time() {
            errors.add("time", "Este horário já passou");
        }
    }

    let cep = validators::validate_cep(&form.cep).map_err(|m| errors.add("cep", m)).ok();
    if form.rua.trim().is_empty() {
        errors.add("rua", "Rua é obrigatória");
    }
    if form.numero.trim().is_empty() {
        errors.add("numero", "Número é obrigatório");
    }
    let vehicle_type = VehicleType::parse(&form.vehicle_type);
    if vehicle_type.is_none() {
        errors.add("vehicle_type", "Selecione a categoria (A ou B)");
    }

    let instructor_id = parse_optional_id(&form.instructor, "instructor", &mut errors);
    let vehicle_id = parse_optional_id(&form.vehicle, "vehicle", &mut errors);

    if let Some(instructor_id) = instructor_id {
        match profile_service::find_instructor(db_pool, instructor_id).await? {
            Some(p) if p.status == InstructorStatus::Ativo => {
                if let Some(t) = vehicle_type {
                    if !p.teaches(t.as_str()) {
                        errors.add("instructor", "Instrutor não dá aulas nesta categoria");
                    }
                }
            }
            _ => errors.add("instructor", "Instrutor indisponível"),
        }
    }

    if let Some(vehicle_id) = vehicle_id {
        let owner: Option<(i64, VehicleType)> =
            sqlx::query_as("SELECT instructor_id, category FROM instructor_vehicles WHERE id = ?1")
                .bind(vehicle_id)
                .fetch_optional(db_pool)
                .await?;
        match owner {
            None => errors.add("vehicle", "Veículo não encontrado"),
            Some((owner, category)) => {
                if instructor_id != Some(owner) {
                    errors.add("vehicle", "O veículo não pertence ao instrutor selecionado");
                } else if vehicle_type.is_some_and(|t| t != category) {
                    errors.add("vehicle", "O veículo não corresponde à categoria escolhida");
                }
            }
        }
    }

    if let (Some(date), Some(time)) = (date, time) {
        if has_conflict(db_pool, Party::Student, student_id, date, time, exclude_lesson).await? {
            errors.add("time", "Você já tem uma aula marcada neste horário");
        }
        if let Some(instructor_id) = instructor_id {
            if has_conflict(db_pool, Party::Instructor, instructor_id, date, time, exclude_lesson).await? {
                errors.add("instructor", "O instrutor já tem uma aula neste horário");
            }
        }
    }

    if !errors.is_empty() {
        tracing::warn!("Agendamento recusado para o aluno {}: {:?}", student_id, errors);
    }
    errors.into_result()?;

    match (date, time, cep, vehicle_type) {
        (Some(date), Some(time), Some(cep), Some(vehicle_type)) => Ok(NewLesson {
            instructor_id,
            vehicle_id,
            date,
            time,
            cep: validators::format_cep(&cep),
            street: form.rua.trim().to_string(),
            number: form.numero.trim().to_string(),
            neighborhood: form.bairro.trim().to_string(),
            city: form.cidade.trim().to_string(),
            state: form.estado.trim().to_ascii_uppercase(),
            vehicle_type,
            prefer_adapted_pcd: is_checked(form.prefer_adapted_pcd.as_deref()),
            prefer_dual_control: is_checked(form.prefer_dual_control.as_deref()),
        }),
        _ => Err(AppError::InternalServerError),
    }
}

fn location_text(lesson: &NewLesson) -> String {
    format!(
        "{}, {} - {}, {}/{}",
        lesson.street, lesson.number, lesson.neighborhood, lesson.city, lesson.state
    )
}

/// O aluno pede uma aula; fica pendente até um instrutor aceitar.
pub async fn schedule(
    db_pool: &SqlitePool,
    student_id: i64,
    form: &LessonForm,
    now: NaiveDateTime,
) -> AppResult<LessonView> {
    let new = validate_request(db_pool, student_id, form, None, now).await?;

    let mut tx = db_pool.begin().await?;
    let previous: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lessons WHERE student_id = ?1")
        .bind(student_id)
        .fetch_one(&mut *tx)
        .await?;
    let lesson_id = sqlx::query(
        r#"
        INSERT INTO lessons
            (student_id, instructor_id, vehicle_id, date, time, duration, cep, street, number,
             neighborhood, city, state, location, vehicle_type, status, lesson_number,
             prefer_adapted_pcd, prefer_dual_control)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
        "#,
    )
    .bind(student_id)
    .bind(new.instructor_id)
    .bind(new.vehicle_id)
    .bind(new.date)
    .bind(new.time)
    .bind(LESSON_DURATION_MINUTES)
    .bind(&new.cep)
    .bind(&new.street)
    .bind(&new.number)
    .bind(&new.neighborhood)
    .bind(&new.city)
    .bind(&new.state)
    .bind(location_text(&new))
    .bind(new.vehicle_type)
    .bind(LessonStatus::Pending)
    .bind(previous + 1)
    .bind(new.prefer_adapted_pcd)
    .bind(new.prefer_dual_control)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();
    tx.commit().await?;

    tracing::info!(
        "📅 Aula {} pedida pelo aluno {} para {} {}",
        lesson_id,
        student_id,
        new.date,
        new.time.format("%H:%M")
    );
    find_lesson_view(db_pool, lesson_id).await
}

// Só o dono da aula (aluno) pode mexer nela
fn ensure_student(lesson: &Lesson, student_id: i64) -> AppResult<()> {
    if lesson.student_id != student_id {
        tracing::warn!("Aluno {} tentou alterar a aula {} de outro aluno", student_id, lesson.id);
        return Err(AppError::Forbidden("Esta aula não é sua.".into()));
    }
    Ok(())
}

fn ensure_instructor(lesson: &Lesson, instructor_id: i64) -> AppResult<()> {
    if lesson.instructor_id != Some(instructor_id) {
        tracing::warn!("Instrutor {} sem acesso à aula {}", instructor_id, lesson.id);
        return Err(AppError::Forbidden("Esta aula não está atribuída a você.".into()));
    }
    Ok(())
}

// UPDATE de estado protegido pelo estado esperado (evita corridas entre pedidos)
async fn transition(
    db_pool: &SqlitePool,
    lesson_id: i64,
    from: &[LessonStatus],
    to: LessonStatus,
) -> AppResult<()> {
    let from_sql: Vec<String> = from.iter().map(|s| format!("'{}'", s.as_str())).collect();
    let sql = format!(
        "UPDATE lessons SET status = ?1, updated_at = datetime('now') WHERE id = ?2 AND status IN ({})",
        from_sql.join(", ")
    );
    let rows_affected = sqlx::query(&sql)
        .bind(to)
        .bind(lesson_id)
        .execute(db_pool)
        .await?
        .rows_affected();
    if rows_affected == 0 {
        return Err(AppError::Conflict("O estado da aula mudou entretanto.".into()));
    }
    Ok(())
}

/// O instrutor aceita uma aula atribuída a ele ou um pedido ainda sem instrutor.
pub async fn accept(db_pool: &SqlitePool, instructor_id: i64, lesson_id: i64) -> AppResult<LessonView> {
    let instructor = profile_service::find_instructor(db_pool, instructor_id)
        .await?
        .ok_or_else(|| AppError::Forbidden("Perfil de instrutor não encontrado.".into()))?;
    if instructor.status != InstructorStatus::Ativo {
        return Err(AppError::Forbidden(
            "Sua conta de instrutor ainda não foi aprovada.".into(),
        ));
    }

    let lesson = find_lesson(db_pool, lesson_id).await?;
    if !lesson.status.awaits_instructor() {
        return Err(AppError::Conflict("Esta aula não está à espera de confirmação.".into()));
    }
    if lesson.instructor_id.is_some_and(|id| id != instructor_id) {
        return Err(AppError::Forbidden("Esta aula está atribuída a outro instrutor.".into()));
    }
    if let Some(t) = lesson.vehicle_type {
        if !instructor.teaches(t.as_str()) {
            return Err(AppError::Conflict("Você não dá aulas nesta categoria.".into()));
        }
    }
    if has_conflict(db_pool, Party::Instructor, instructor_id, lesson.date, lesson.time, Some(lesson_id)).await? {
        return Err(AppError::Conflict("Você já tem uma aula neste horário.".into()));
    }

    let vehicle_id = match lesson.vehicle_id {
        Some(id) => Some(id),
        None => profile_service::find_vehicle(db_pool, instructor_id)
            .await?
            .filter(|v| lesson.vehicle_type.map_or(true, |t| t == v.category))
            .map(|v| v.id),
    };

    let rows_affected = sqlx::query(
        r#"
        UPDATE lessons SET instructor_id = ?1, vehicle_id = ?2, status = 'scheduled',
            rejection_reason = NULL, updated_at = datetime('now')
        WHERE id = ?3 AND status IN ('pending', 'rescheduled')
          AND (instructor_id IS NULL OR instructor_id = ?1)
        "#,
    )
    .bind(instructor_id)
    .bind(vehicle_id)
    .bind(lesson_id)
    .execute(db_pool)
    .await?
    .rows_affected();
    if rows_affected == 0 {
        return Err(AppError::Conflict("O estado da aula mudou entretanto.".into()));
    }

    tracing::info!("✅ Aula {} aceite pelo instrutor {}", lesson_id, instructor_id);
    find_lesson_view(db_pool, lesson_id).await
}

/// O instrutor recusa: a aula volta a ficar pendente, sem instrutor, com o motivo.
pub async fn reject(
    db_pool: &SqlitePool,
    instructor_id: i64,
    lesson_id: i64,
    reason: &str,
) -> AppResult<LessonView> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(AppError::field("reason", "Informe o motivo da recusa"));
    }
    let lesson = find_lesson(db_pool, lesson_id).await?;
    ensure_instructor(&lesson, instructor_id)?;

    // O estado é verificado no próprio UPDATE
    let rows_affected = sqlx::query(
        r#"
        UPDATE lessons SET instructor_id = NULL, vehicle_id = NULL, rejection_reason = ?1,
            status = 'pending', updated_at = datetime('now')
        WHERE id = ?2 AND instructor_id = ?3 AND status IN ('pending', 'rescheduled')
        "#,
    )
    .bind(reason)
    .bind(lesson_id)
    .bind(instructor_id)
    .execute(db_pool)
    .await?
    .rows_affected();
    if rows_affected == 0 {
        return Err(AppError::Conflict("Só é possível recusar aulas pendentes.".into()));
    }

    tracing::info!("❌ Aula {} recusada pelo instrutor {}: {}", lesson_id, instructor_id, reason);
    find_lesson_view(db_pool, lesson_id).await
}

/// O aluno muda data/hora/instrutor; a aula volta a esperar pelo instrutor.
pub async fn reschedule(
    db_pool: &SqlitePool,
    student_id: i64,
    lesson_id: i64,
    form: &LessonForm,
    now: NaiveDateTime,
) -> AppResult<LessonView> {
    let lesson = find_lesson(db_pool, lesson_id).await?;
    ensure_student(&lesson, student_id)?;
    if !matches!(
        lesson.status,
        LessonStatus::Pending | LessonStatus::Scheduled | LessonStatus::Rescheduled
    ) {
        return Err(AppError::Conflict("Esta aula já não pode ser remarcada.".into()));
    }

    let new = validate_request(db_pool, student_id, form, Some(lesson_id), now).await?;
    let rows_affected = sqlx::query(
        r#"
        UPDATE lessons SET
            instructor_id = ?1, vehicle_id = ?2, date = ?3, time = ?4, cep = ?5, street = ?6,
            number = ?7, neighborhood = ?8, city = ?9, state = ?10, location = ?11,
            vehicle_type = ?12, prefer_adapted_pcd = ?13, prefer_dual_control = ?14,
            rejection_reason = NULL, status = 'rescheduled', updated_at = datetime('now')
        WHERE id = ?15 AND student_id = ?16 AND status IN ('pending', 'scheduled', 'rescheduled')
        "#,
    )
    .bind(new.instructor_id)
    .bind(new.vehicle_id)
    .bind(new.date)
    .bind(new.time)
    .bind(&new.cep)
    .bind(&new.street)
    .bind(&new.number)
    .bind(&new.neighborhood)
    .bind(&new.city)
    .bind(&new.state)
    .bind(location_text(&new))
    .bind(new.vehicle_type)
    .bind(new.prefer_adapted_pcd)
    .bind(new.prefer_dual_control)
    .bind(lesson_id)
    .bind(student_id)
    .execute(db_pool)
    .await?
    .rows_affected();
    if rows_affected == 0 {
        return Err(AppError::Conflict("O estado da aula mudou entretanto.".into()));
    }

    tracing::info!("🔁 Aula {} remarcada para {} {}", lesson_id, new.date, new.time.format("%H:%M"));
    find_lesson_view(db_pool, lesson_id).await
}

pub async fn cancel(db_pool: &SqlitePool, student_id: i64, lesson_id: i64) -> AppResult<()> {
    let lesson = find_lesson(db_pool, lesson_id).await?;
    ensure_student(&lesson, student_id)?;
    const CANCELLABLE: &[LessonStatus] = &[
        LessonStatus::Pending,
        LessonStatus::Scheduled,
        LessonStatus::Rescheduled,
    ];
    if !CANCELLABLE.contains(&lesson.status) {
        return Err(AppError::Conflict("Esta aula já não pode ser cancelada.".into()));
    }
    transition(db_pool, lesson_id, CANCELLABLE, LessonStatus::Cancelled).await?;
    tracing::info!("Aula {} cancelada pelo aluno {}", lesson_id, student_id);
    Ok(())
}

/// Cancela um pedido que foi recusado pelo instrutor.
pub async fn cancel_rejected(db_pool: &SqlitePool, student_id: i64, lesson_id: i64) -> AppResult<()> {
    let lesson = find_lesson(db_pool, lesson_id).await?;
    ensure_student(&lesson, student_id)?;
    if lesson.rejection_reason.is_none() || lesson.status != LessonStatus::Pending {
        return Err(AppError::Conflict("Esta aula não foi recusada.".into()));
    }
    transition(db_pool, lesson_id, &[LessonStatus::Pending], LessonStatus::Cancelled).await?;
    tracing::info!("Aula recusada {} cancelada pelo aluno {}", lesson_id, student_id);
    Ok(())
}

pub async fn start(db_pool: &SqlitePool, instructor_id: i64, lesson_id: i64) -> AppResult<LessonView> {
    let lesson = find_lesson(db_pool, lesson_id).await?;
    ensure_instructor(&lesson, instructor_id)?;
    if lesson.status != LessonStatus::Scheduled {
        return Err(AppError::Conflict("Só aulas agendadas podem ser iniciadas.".into()));
    }
    transition(db_pool, lesson_id, &[LessonStatus::Scheduled], LessonStatus::InProgress).await?;
    tracing::info!("▶️ Aula {} iniciada", lesson_id);
    find_lesson_view(db_pool, lesson_id).await
}

/// Termina a aula e atualiza o progresso do aluno (na mesma transação).
pub async fn complete(
    db_pool: &SqlitePool,
    instructor_id: i64,
    lesson_id: i64,
    score: &str,
    notes: &str,
) -> AppResult<LessonView> {
    let lesson = find_lesson(db_pool, lesson_id).await?;
    ensure_instructor(&lesson, instructor_id)?;
    if lesson.status != LessonStatus::InProgress {
        return Err(AppError::Conflict("Só aulas em andamento podem ser concluídas.".into()));
    }

    let mut tx = db_pool.begin().await?;
    let rows_affected = sqlx::query(
        r#"
        UPDATE lessons SET status = 'completed', score = ?1, notes = ?2, updated_at = datetime('now')
        WHERE id = ?3 AND status = 'in-progress'
        "#,
    )
    .bind(score.trim())
    .bind(notes.trim())
    .bind(lesson_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();
    if rows_affected == 0 {
        return Err(AppError::Conflict("O estado da aula mudou entretanto.".into()));
    }

    profile_service::insert_minimal_profile(&mut tx, lesson.student_id, Role::Aluno).await?;
    let completed: i64 = sqlx::query_scalar(
        r#"
        UPDATE student_profiles SET completed_lessons = completed_lessons + 1,
            updated_at = datetime('now')
        WHERE user_id = ?1
        RETURNING completed_lessons
        "#,
    )
    .bind(lesson.student_id)
    .fetch_one(&mut *tx)
    .await?;
    sqlx::query("UPDATE student_profiles SET progress = ?1 WHERE user_id = ?2")
        .bind(progress_for(completed))
        .bind(lesson.student_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(
        "🏁 Aula {} concluída; aluno {} com {} aulas",
        lesson_id,
        lesson.student_id,
        completed
    );
    find_lesson_view(db_pool, lesson_id).await
}

/// Avaliação (1 a 5) de uma aula concluída, pelo próprio aluno.
pub async fn rate(
    db_pool: &SqlitePool,
    student_id: i64,
    lesson_id: i64,
    rating: f64,
    feedback: &str,
) -> AppResult<()> {
    if !(1.0..=5.0).contains(&rating) {
        return Err(AppError::field("rating", "A avaliação deve estar entre 1 e 5"));
    }
    let lesson = find_lesson(db_pool, lesson_id).await?;
    ensure_student(&lesson, student_id)?;
    if lesson.status != LessonStatus::Completed {
        return Err(AppError::Conflict("Só é possível avaliar aulas concluídas.".into()));
    }

    let rating = (rating * 10.0).round() / 10.0;
    sqlx::query(
        "UPDATE lessons SET student_rating = ?1, student_feedback = ?2, updated_at = datetime('now') WHERE id = ?3",
    )
    .bind(rating)
    .bind(feedback.trim())
    .bind(lesson_id)
    .execute(db_pool)
    .await?;
    tracing::info!("⭐ Aula {} avaliada com {}", lesson_id, rating);
    Ok(())
}

// --- Filtros do agendamento ---

#[derive(Debug, FromRow)]
struct InstructorRow {
    id: i64,
    full_name: String,
    cnh_categories: String,
    vehicle_id: Option<i64>,
    plate: Option<String>,
    make: Option<String>,
    model: Option<String>,
    color: Option<String>,
    year: Option<i64>,
    category: Option<VehicleType>,
    dual_control: Option<bool>,
    adapted_pcd: Option<bool>,
}

impl InstructorRow {
    fn into_option(self) -> InstructorOption {
        let vehicle = match (self.vehicle_id, self.plate, self.category) {
            (Some(id), Some(plate), Some(category)) => Some(VehicleOption {
                id,
                instructor_id: self.id,
                instructor_name: self.full_name.clone(),
                plate,
                make: self.make.unwrap_or_default(),
                model: self.model.unwrap_or_default(),
                color: self.color.unwrap_or_default(),
                year: self.year.unwrap_or_default(),
                category,
                dual_control: self.dual_control.unwrap_or(false),
                adapted_pcd: self.adapted_pcd.unwrap_or(false),
            }),
            _ => None,
        };
        InstructorOption {
            id: self.id,
            full_name: self.full_name,
            cnh_categories: self.cnh_categories,
            vehicle,
        }
    }
}

/// Instrutores ativos que servem para a categoria/preferências e, com data e
/// hora, que estejam livres nesse horário.
pub async fn filter_instructors(
    db_pool: &SqlitePool,
    filter: &InstructorFilter,
) -> AppResult<Vec<InstructorOption>> {
    let mut errors = FieldErrors::new();
    let vehicle_type = match filter.vehicle_type.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => VehicleType::parse(raw).or_else(|| {
            errors.add("vehicle_type", "Categoria inválida");
            None
        }),
    };
    let slot = match (filter.date.as_deref(), filter.time.as_deref()) {
        (Some(d), Some(t)) if !d.trim().is_empty() && !t.trim().is_empty() => {
            let date = validators::parse_form_date(d).map_err(|m| errors.add("date", m)).ok();
            let time = parse_slot(t).map_err(|m| errors.add("time", m)).ok();
            date.zip(time)
        }
        _ => None,
    };
    errors.into_result()?;

    let dual = is_checked(filter.prefer_dual_control.as_deref());
    let pcd = is_checked(filter.prefer_adapted_pcd.as_deref());

    let rows = sqlx::query_as::<_, InstructorRow>(
        r#"
        SELECT u.id, u.full_name, p.cnh_categories,
               v.id AS vehicle_id, v.plate, v.make, v.model, v.color, v.year, v.category,
               v.dual_control, v.adapted_pcd
        FROM instructor_profiles p
        JOIN users u ON u.id = p.user_id
        LEFT JOIN instructor_vehicles v ON v.instructor_id = p.user_id
        WHERE p.status = 'ativo' AND u.is_active = 1
        ORDER BY u.full_name, u.id
        "#,
    )
    .fetch_all(db_pool)
    .await?;

    let busy: HashSet<i64> = match slot {
        Some((date, time)) => {
            let sql = format!(
                "SELECT instructor_id FROM lessons WHERE instructor_id IS NOT NULL AND date = ?1 AND time = ?2 AND status IN {}",
                blocking_statuses_sql()
            );
            sqlx::query_scalar::<_, i64>(&sql)
                .bind(date)
                .bind(time)
                .fetch_all(db_pool)
                .await?
                .into_iter()
                .collect()
        }
        None => HashSet::new(),
    };

    let options = rows
        .into_iter()
        .map(InstructorRow::into_option)
        .filter(|o| !busy.contains(&o.id))
        .filter_map(|mut o| {
            if let Some(t) = vehicle_type {
                if !o.cnh_categories.contains(t.as_str()) {
                    return None;
                }
                // O veículo só é sugerido se for da categoria pedida
                o.vehicle = o.vehicle.filter(|v| v.category == t);
            }
            let vehicle_ok = |v: &VehicleOption| (!dual || v.dual_control) && (!pcd || v.adapted_pcd);
            if (dual || pcd) && !o.vehicle.as_ref().is_some_and(vehicle_ok) {
                return None;
            }
            Some(o)
        })
        .collect::<Vec<_>>();

    tracing::debug!("Filtro de instrutores devolveu {} resultados", options.len());
    Ok(options)
}

pub async fn filter_vehicles(db_pool: &SqlitePool, filter: &VehicleFilter) -> AppResult<Vec<VehicleOption>> {
    let vehicle_type = match filter.vehicle_type.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            VehicleType::parse(raw).ok_or_else(|| AppError::field("vehicle_type", "Categoria inválida"))?,
        ),
    };
    let vehicles = sqlx::query_as::<_, VehicleOption>(
        r#"
        SELECT v.id, v.instructor_id, u.full_name AS instructor_name, v.plate, v.make, v.model,
               v.color, v.year, v.category, v.dual_control, v.adapted_pcd
        FROM instructor_vehicles v
        JOIN instructor_profiles p ON p.user_id = v.instructor_id
        JOIN users u ON u.id = v.instructor_id
        WHERE p.status = 'ativo' AND u.is_active = 1
          AND (?1 IS NULL OR v.instructor_id = ?1)
          AND (?2 IS NULL OR v.category = ?2)
          AND (?3 = 0 OR v.dual_control = 1)
          AND (?4 = 0 OR v.adapted_pcd = 1)
        ORDER BY u.full_name, v.plate
        "#,
    )
    .bind(filter.instructor_id)
    .bind(vehicle_type)
    .bind(is_checked(filter.prefer_dual_control.as_deref()))
    .bind(is_checked(filter.prefer_adapted_pcd.as_deref()))
    .fetch_all(db_pool)
    .await?;
    Ok(vehicles)
}

// --- Listagens e painéis ---

/// Aulas visíveis para o utilizador, mais recentes primeiro.
pub async fn lessons_for(db_pool: &SqlitePool, user: &User) -> AppResult<Vec<LessonView>> {
    let filter = match user.role {
        Role::Aluno => "WHERE l.student_id = ?1",
        Role::Instrutor => "WHERE l.instructor_id = ?1",
        Role::Funcionario => "WHERE ?1 IS NOT NULL",
    };
    let lessons = sqlx::query_as::<_, LessonView>(&format!(
        "{LESSON_VIEW_SELECT} {filter} ORDER BY l.date DESC, l.time DESC, l.id DESC"
    ))
    .bind(user.id)
    .fetch_all(db_pool)
    .await?;
    Ok(lessons)
}

async fn fetch_views(
    db_pool: &SqlitePool,
    where_clause: &str,
    id: i64,
    day: NaiveDate,
    limit: i64,
) -> AppResult<Vec<LessonView>> {
    let lessons = sqlx::query_as::<_, LessonView>(&format!(
        "{LESSON_VIEW_SELECT} WHERE {where_clause} ORDER BY l.date, l.time, l.id LIMIT ?3"
    ))
    .bind(id)
    .bind(day)
    .bind(limit)
    .fetch_all(db_pool)
    .await?;
    Ok(lessons)
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentDashboard {
    pub stats: StudentStats,
    pub upcoming: Vec<LessonView>,
    pub awaiting: Vec<LessonView>,
    pub completed: Vec<LessonView>,
}

pub async fn student_dashboard(
    db_pool: &SqlitePool,
    student_id: i64,
    today: NaiveDate,
) -> AppResult<StudentDashboard> {
    let upcoming = fetch_views(
        db_pool,
        "l.student_id = ?1 AND l.status = 'scheduled' AND l.date >= ?2",
        student_id,
        today,
        3,
    )
    .await?;
    let awaiting = fetch_views(
        db_pool,
        "l.student_id = ?1 AND l.status IN ('pending', 'rescheduled') AND ?2 IS NOT NULL",
        student_id,
        today,
        50,
    )
    .await?;
    let mut completed = fetch_views(
        db_pool,
        "l.student_id = ?1 AND l.status = 'completed' AND ?2 IS NOT NULL",
        student_id,
        today,
        i64::MAX,
    )
    .await?;
    completed.reverse();

    let upcoming_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM lessons WHERE student_id = ?1 AND status = 'scheduled' AND date >= ?2",
    )
    .bind(student_id)
    .bind(today)
    .fetch_one(db_pool)
    .await?;

    let completed_count = completed.len() as i64;
    let total_hours = completed_count * LESSON_DURATION_MINUTES / 60;
    let stats = StudentStats {
        upcoming_lessons: upcoming_count,
        completed_lessons_count: completed_count,
        total_hours,
        hours_left: (REQUIRED_HOURS - total_hours).max(0),
        required_hours: REQUIRED_HOURS,
        progress_percentage: progress_for(completed_count),
    };
    Ok(StudentDashboard {
        stats,
        upcoming,
        awaiting,
        completed,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct InstructorDashboard {
    pub stats: InstructorStats,
    pub status: InstructorStatus,
    pub today: Vec<LessonView>,
    pub upcoming: Vec<LessonView>,
    pub requests: Vec<LessonView>,
}

impl InstructorDashboard {
    /// Aviso mostrado enquanto a conta não estiver aprovada.
    pub fn warning(&self) -> Option<&'static str> {
        match self.status {
            InstructorStatus::Ativo => None,
            InstructorStatus::Pendente => {
                Some("Sua conta aguarda aprovação da secretaria. Ainda não pode aceitar aulas.")
            }
            InstructorStatus::Inativo => Some("Sua conta de instrutor está inativa."),
        }
    }
}

pub async fn instructor_dashboard(
    db_pool: &SqlitePool,
    instructor_id: i64,
    today: NaiveDate,
) -> AppResult<InstructorDashboard> {
    let profile = profile_service::find_instructor(db_pool, instructor_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Perfil de instrutor não encontrado.".into()))?;

    let today_lessons = fetch_views(
        db_pool,
        "l.instructor_id = ?1 AND l.date = ?2 AND l.status <> 'cancelled'",
        instructor_id,
        today,
        50,
    )
    .await?;
    let tomorrow = today.succ_opt().unwrap_or(today);
    let upcoming = sqlx::query_as::<_, LessonView>(&format!(
        "{LESSON_VIEW_SELECT} WHERE l.instructor_id = ?1 AND l.status = 'scheduled' AND l.date BETWEEN ?2 AND ?3 ORDER BY l.date, l.time LIMIT 4"
    ))
    .bind(instructor_id)
    .bind(today)
    .bind(tomorrow)
    .fetch_all(db_pool)
    .await?;

    // Pedidos atribuídos a mim e pedidos abertos da minha categoria
    let requests = sqlx::query_as::<_, LessonView>(&format!(
        r#"{LESSON_VIEW_SELECT}
        WHERE l.status IN ('pending', 'rescheduled') AND l.date >= ?2
          AND (l.instructor_id = ?1
               OR (l.instructor_id IS NULL AND (l.vehicle_type IS NULL OR instr(?3, l.vehicle_type) > 0)))
        ORDER BY l.date, l.time"#
    ))
    .bind(instructor_id)
    .bind(today)
    .bind(&profile.cnh_categories)
    .fetch_all(db_pool)
    .await?;

    let month = today.format("%Y-%m").to_string();
    let (active_students, completed_lessons): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(DISTINCT CASE WHEN status <> 'cancelled' THEN student_id END),
               COUNT(CASE WHEN status = 'completed' THEN 1 END)
        FROM lessons
        WHERE instructor_id = ?1 AND strftime('%Y-%m', date) = ?2
        "#,
    )
    .bind(instructor_id)
    .bind(&month)
    .fetch_one(db_pool)
    .await?;

    let stats = InstructorStats {
        lessons_today: today_lessons
            .iter()
            .filter(|l| l.lesson.status == LessonStatus::Scheduled)
            .count() as i64,
        active_students,
        completed_lessons,
        hours_worked: completed_lessons * LESSON_DURATION_MINUTES / 60,
    };
    Ok(InstructorDashboard {
        stats,
        status: profile.status,
        today: today_lessons,
        upcoming,
        requests,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct EmployeeDashboard {
    pub stats: EmployeeStats,
    pub instructors: Vec<InstructorSummary>,
    pub today: Vec<LessonView>,
}

pub async fn employee_dashboard(db_pool: &SqlitePool, today: NaiveDate) -> AppResult<EmployeeDashboard> {
    let (students, active_instructors, pending_instructors): (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT (SELECT COUNT(*) FROM users WHERE role = 'aluno' AND is_active = 1),
               (SELECT COUNT(*) FROM instructor_profiles WHERE status = 'ativo'),
               (SELECT COUNT(*) FROM instructor_profiles WHERE status = 'pendente')
        "#,
    )
    .fetch_one(db_pool)
    .await?;
    let pending_lessons: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM lessons WHERE status IN ('pending', 'rescheduled')")
            .fetch_one(db_pool)
            .await?;

    let today_lessons = sqlx::query_as::<_, LessonView>(&format!(
        "{LESSON_VIEW_SELECT} WHERE l.date = ?1 AND l.status <> 'cancelled' ORDER BY l.time, l.id"
    ))
    .bind(today)
    .fetch_all(db_pool)
    .await?;

    let stats = EmployeeStats {
        students,
        active_instructors,
        pending_instructors,
        lessons_today: today_lessons.len() as i64,
        pending_lessons,
    };
    Ok(EmployeeDashboard {
        stats,
        instructors: profile_service::instructors_awaiting_review(db_pool).await?,
        today: today_lessons,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::test_pool,
        services::{
            profile_service::tests::{insert_instructor, vehicle_form},
            user_service::tests::insert_user,
        },
    };
    use chrono::Duration;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn day(offset: i64) -> String {
        (now().date() + Duration::days(offset)).format("%Y-%m-%d").to_string()
    }

    fn form(instructor: Option<i64>, vehicle: Option<i64>, date: &str, time: &str) -> LessonForm {
        LessonForm {
            instructor: instructor.map(|i| i.to_string()).unwrap_or_default(),
            vehicle: vehicle.map(|v| v.to_string()).unwrap_or_default(),
            date: date.into(),
            time: time.into(),
            cep: "01001-000".into(),
            rua: "Praça da Sé".into(),
            numero: "100".into(),
            bairro: "Sé".into(),
            cidade: "São Paulo".into(),
            estado: "sp".into(),
            vehicle_type: "B".into(),
            prefer_adapted_pcd: None,
            prefer_dual_control: None,
        }
    }

    struct Fixture {
        pool: SqlitePool,
        student: i64,
        instructor: i64,
        vehicle: i64,
    }

    async fn fixture() -> Fixture {
        let pool = test_pool().await;
        let student = insert_user(&pool, "aluno@email.com", "senha123", Role::Aluno).await;
        let instructor = insert_instructor(
            &pool,
            "carlos@auto.com",
            "AB",
            Some(vehicle_form("ABC1234", "00639884962", "B")),
        )
        .await;
        let vehicle = profile_service::find_vehicle(&pool, instructor).await.unwrap().unwrap().id;
        Fixture {
            pool,
            student,
            instructor,
            vehicle,
        }
    }

    fn field_error(err: AppError, field: &str) -> bool {
        matches!(err, AppError::Validation(ref e) if e.contains(field))
    }

    #[test]
    fn slots_and_progress() {
        assert_eq!(parse_slot("08:00").unwrap(), NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert!(parse_slot("14:00:00").is_ok());
        assert!(parse_slot("12:00").is_err());
        assert!(parse_slot("").is_err());

        assert_eq!(progress_for(0), 0);
        assert_eq!(progress_for(12), 50);
        assert_eq!(progress_for(24), 100);
        assert_eq!(progress_for(40), 100);
    }

    #[tokio::test]
    async fn schedule_creates_pending_lesson_with_number() {
        let f = fixture().await;
        let first = schedule(&f.pool, f.student, &form(Some(f.instructor), Some(f.vehicle), &day(1), "09:00"), now())
            .await
            .unwrap();
        assert_eq!(first.lesson.status, LessonStatus::Pending);
        assert_eq!(first.lesson.lesson_number, 1);
        assert_eq!(first.lesson.cep, "01001-000");
        assert_eq!(first.lesson.state, "SP");
        assert_eq!(first.vehicle_plate.as_deref(), Some("ABC1234"));

        let second = schedule(&f.pool, f.student, &form(None, None, &day(2), "10:00"), now())
            .await
            .unwrap();
        assert_eq!(second.lesson.lesson_number, 2);
        assert_eq!(second.instructor_label(), "A definir");
    }

    #[tokio::test]
    async fn schedule_rejects_past_dates_and_bad_slots() {
        let f = fixture().await;
        let err = schedule(&f.pool, f.student, &form(None, None, &day(-1), "09:00"), now()).await.unwrap_err();
        assert!(field_error(err, "date"));

        let err = schedule(&f.pool, f.student, &form(None, None, &day(1), "12:00"), now()).await.unwrap_err();
        assert!(field_error(err, "time"));

        // Hoje, mas às 09:00 quando já são 12:00
        let err = schedule(&f.pool, f.student, &form(None, None, &day(0), "09:00"), now()).await.unwrap_err();
        assert!(field_error(err, "time"));

        let mut bad = form(None, None, &day(1), "09:00");
        bad.cep = "123".into();
        bad.numero = " ".into();
        let err = schedule(&f.pool, f.student, &bad, now()).await.unwrap_err();
        match err {
            AppError::Validation(e) => assert!(e.contains("cep") && e.contains("numero")),
            other => panic!("esperava validação, veio {:?}", other),
        }
    }

    #[tokio::test]
    async fn vehicle_must_belong_to_instructor_and_match_category() {
        let f = fixture().await;
        let other = insert_instructor(&f.pool, "outro@auto.com", "B", None).await;

        let err = schedule(&f.pool, f.student, &form(Some(other), Some(f.vehicle), &day(1), "09:00"), now())
            .await
            .unwrap_err();
        assert!(field_error(err, "vehicle"));

        let mut moto = form(Some(f.instructor), Some(f.vehicle), &day(1), "09:00");
        moto.vehicle_type = "A".into();
        let err = schedule(&f.pool, f.student, &moto, now()).await.unwrap_err();
        assert!(field_error(err, "vehicle"));

        // Instrutor só com categoria B não dá aulas de moto
        let mut moto = form(Some(other), None, &day(1), "09:00");
        moto.vehicle_type = "A".into();
        let err = schedule(&f.pool, f.student, &moto, now()).await.unwrap_err();
        assert!(field_error(err, "instructor"));
    }

    #[tokio::test]
    async fn pending_instructor_cannot_be_chosen() {
        let f = fixture().await;
        let pending = insert_user(&f.pool, "novo@auto.com", "senha123", Role::Instrutor).await;
        {
            let mut conn = f.pool.acquire().await.unwrap();
            profile_service::insert_minimal_profile(&mut conn, pending, Role::Instrutor).await.unwrap();
        }
        let err = schedule(&f.pool, f.student, &form(Some(pending), None, &day(1), "09:00"), now())
            .await
            .unwrap_err();
        assert!(field_error(err, "instructor"));
    }

    #[tokio::test]
    async fn conflicts_for_student_and_instructor() {
        let f = fixture().await;
        schedule(&f.pool, f.student, &form(Some(f.instructor), None, &day(1), "09:00"), now())
            .await
            .unwrap();

        // Mesmo aluno, mesmo horário
        let err = schedule(&f.pool, f.student, &form(None, None, &day(1), "09:00"), now()).await.unwrap_err();
        assert!(field_error(err, "time"));

        // Outro aluno com o mesmo instrutor
        let other = insert_user(&f.pool, "outro@email.com", "senha123", Role::Aluno).await;
        let err = schedule(&f.pool, other, &form(Some(f.instructor), None, &day(1), "09:00"), now())
            .await
            .unwrap_err();
        assert!(field_error(err, "instructor"));

        // Outro horário está livre
        schedule(&f.pool, other, &form(Some(f.instructor), None, &day(1), "10:00"), now())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn cancelled_lessons_free_the_slot() {
        let f = fixture().await;
        let lesson = schedule(&f.pool, f.student, &form(Some(f.instructor), None, &day(1), "09:00"), now())
            .await
            .unwrap();
        let date = lesson.lesson.date;
        let time = lesson.lesson.time;
        assert!(has_conflict(&f.pool, Party::Instructor, f.instructor, date, time, None).await.unwrap());
        assert!(!has_conflict(&f.pool, Party::Instructor, f.instructor, date, time, Some(lesson.lesson.id))
            .await
            .unwrap());

        cancel(&f.pool, f.student, lesson.lesson.id).await.unwrap();
        assert!(!has_conflict(&f.pool, Party::Student, f.student, date, time, None).await.unwrap());
        assert!(matches!(
            cancel(&f.pool, f.student, lesson.lesson.id).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn full_lesson_lifecycle_updates_progress() {
        let f = fixture().await;
        let lesson = schedule(&f.pool, f.student, &form(Some(f.instructor), None, &day(1), "09:00"), now())
            .await
            .unwrap();
        let id = lesson.lesson.id;

        // Não se começa uma aula pendente
        assert!(matches!(start(&f.pool, f.instructor, id).await, Err(AppError::Conflict(_))));

        let accepted = accept(&f.pool, f.instructor, id).await.unwrap();
        assert_eq!(accepted.lesson.status, LessonStatus::Scheduled);
        // Sem veículo escolhido, fica o do instrutor (categoria B)
        assert_eq!(accepted.lesson.vehicle_id, Some(f.vehicle));

        start(&f.pool, f.instructor, id).await.unwrap();
        let done = complete(&f.pool, f.instructor, id, "8", "Boa condução").await.unwrap();
        assert_eq!(done.lesson.status, LessonStatus::Completed);
        assert_eq!(done.lesson.notes, "Boa condução");

        let (completed, progress): (i64, i64) =
            sqlx::query_as("SELECT completed_lessons, progress FROM student_profiles WHERE user_id = ?1")
                .bind(f.student)
                .fetch_one(&f.pool)
                .await
                .unwrap();
        assert_eq!(completed, 1);
        assert_eq!(progress, progress_for(1));

        assert!(field_error(rate(&f.pool, f.student, id, 6.0, "").await.unwrap_err(), "rating"));
        rate(&f.pool, f.student, id, 4.56, "Ótima aula").await.unwrap();
        let rated = find_lesson(&f.pool, id).await.unwrap();
        assert_eq!(rated.student_rating, Some(4.6));
        assert_eq!(rated.student_feedback, "Ótima aula");
    }

    #[tokio::test]
    async fn only_the_assigned_instructor_acts_on_a_lesson() {
        let f = fixture().await;
        let other = insert_instructor(&f.pool, "outro@auto.com", "B", None).await;
        let lesson = schedule(&f.pool, f.student, &form(Some(f.instructor), None, &day(1), "09:00"), now())
            .await
            .unwrap();
        let id = lesson.lesson.id;

        assert!(matches!(accept(&f.pool, other, id).await, Err(AppError::Forbidden(_))));
        assert!(matches!(reject(&f.pool, other, id, "não").await, Err(AppError::Forbidden(_))));

        let intruder = insert_user(&f.pool, "intruso@email.com", "senha123", Role::Aluno).await;
        assert!(matches!(cancel(&f.pool, intruder, id).await, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn rejected_lesson_can_be_claimed_rescheduled_or_cancelled() {
        let f = fixture().await;
        let lesson = schedule(&f.pool, f.student, &form(Some(f.instructor), Some(f.vehicle), &day(1), "09:00"), now())
            .await
            .unwrap();
        let id = lesson.lesson.id;

        assert!(field_error(reject(&f.pool, f.instructor, id, "  ").await.unwrap_err(), "reason"));
        let rejected = reject(&f.pool, f.instructor, id, "Veículo em manutenção").await.unwrap();
        assert_eq!(rejected.lesson.status, LessonStatus::Pending);
        assert!(rejected.lesson.instructor_id.is_none());
        assert!(rejected.lesson.vehicle_id.is_none());
        assert_eq!(rejected.rejection_label(), "Veículo em manutenção");

        // Remarcar limpa a recusa
        let other = insert_instructor(&f.pool, "outro@auto.com", "B", None).await;
        let moved = reschedule(&f.pool, f.student, id, &form(Some(other), None, &day(3), "15:00"), now())
            .await
            .unwrap();
        assert_eq!(moved.lesson.status, LessonStatus::Rescheduled);
        assert!(moved.lesson.rejection_reason.is_none());
        assert_eq!(moved.lesson.instructor_id, Some(other));

        // Sem recusa não há "cancelar recusada"
        assert!(matches!(cancel_rejected(&f.pool, f.student, id).await, Err(AppError::Conflict(_))));
        reject(&f.pool, other, id, "Indisponível").await.unwrap();
        cancel_rejected(&f.pool, f.student, id).await.unwrap();
        assert_eq!(find_lesson(&f.pool, id).await.unwrap().status, LessonStatus::Cancelled);
    }

    #[tokio::test]
    async fn lessons_past_confirmation_keep_their_state() {
        let f = fixture().await;
        let lesson = schedule(&f.pool, f.student, &form(Some(f.instructor), Some(f.vehicle), &day(1), "09:00"), now())
            .await
            .unwrap();
        let id = lesson.lesson.id;
        accept(&f.pool, f.instructor, id).await.unwrap();
        start(&f.pool, f.instructor, id).await.unwrap();

        assert!(matches!(
            reject(&f.pool, f.instructor, id, "Imprevisto").await,
            Err(AppError::Conflict(_))
        ));
        let current = find_lesson(&f.pool, id).await.unwrap();
        assert_eq!(current.status, LessonStatus::InProgress);
        assert_eq!(current.instructor_id, Some(f.instructor));
        assert!(current.rejection_reason.is_none());

        complete(&f.pool, f.instructor, id, "8", "Boa aula").await.unwrap();
        assert!(matches!(
            reschedule(&f.pool, f.student, id, &form(Some(f.instructor), None, &day(2), "10:00"), now()).await,
            Err(AppError::Conflict(_))
        ));
        assert_eq!(find_lesson(&f.pool, id).await.unwrap().status, LessonStatus::Completed);
    }

    #[tokio::test]
    async fn open_requests_are_claimed_by_any_qualified_instructor() {
        let f = fixture().await;
        let lesson = schedule(&f.pool, f.student, &form(None, None, &day(1), "09:00"), now())
            .await
            .unwrap();

        let dashboard = instructor_dashboard(&f.pool, f.instructor, now().date()).await.unwrap();
        assert_eq!(dashboard.requests.len(), 1);
        assert!(dashboard.warning().is_none());

        let claimed = accept(&f.pool, f.instructor, lesson.lesson.id).await.unwrap();
        assert_eq!(claimed.lesson.instructor_id, Some(f.instructor));
        assert_eq!(claimed.instructor_name.as_deref(), Some("carlos"));
    }

    #[tokio::test]
    async fn pending_instructor_cannot_accept() {
        let f = fixture().await;
        let lesson = schedule(&f.pool, f.student, &form(None, None, &day(1), "09:00"), now())
            .await
            .unwrap();
        profile_service::set_instructor_status(&f.pool, f.instructor, InstructorStatus::Pendente)
            .await
            .unwrap();
        assert!(matches!(
            accept(&f.pool, f.instructor, lesson.lesson.id).await,
            Err(AppError::Forbidden(_))
        ));
        let dashboard = instructor_dashboard(&f.pool, f.instructor, now().date()).await.unwrap();
        assert!(dashboard.warning().is_some());
    }

    #[tokio::test]
    async fn instructor_filter_respects_category_preferences_and_schedule() {
        let f = fixture().await;
        insert_instructor(&f.pool, "moto@auto.com", "A", Some(vehicle_form("MOT1A23", "12345678900", "A"))).await;

        let all = filter_instructors(&f.pool, &InstructorFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);

        let cars = filter_instructors(
            &f.pool,
            &InstructorFilter {
                vehicle_type: Some("B".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(cars.len(), 1);
        assert_eq!(cars[0].id, f.instructor);
        assert_eq!(cars[0].vehicle.as_ref().unwrap().plate, "ABC1234");

        let pcd = filter_instructors(
            &f.pool,
            &InstructorFilter {
                vehicle_type: Some("B".into()),
                prefer_adapted_pcd: Some("true".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(pcd.is_empty());

        schedule(&f.pool, f.student, &form(Some(f.instructor), None, &day(1), "09:00"), now())
            .await
            .unwrap();
        let busy = filter_instructors(
            &f.pool,
            &InstructorFilter {
                vehicle_type: Some("B".into()),
                date: Some(day(1)),
                time: Some("09:00".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(busy.is_empty());
    }

    #[tokio::test]
    async fn vehicle_filter() {
        let f = fixture().await;
        insert_instructor(&f.pool, "moto@auto.com", "A", Some(vehicle_form("MOT1A23", "12345678900", "A"))).await;

        let dual = filter_vehicles(
            &f.pool,
            &VehicleFilter {
                prefer_dual_control: Some("on".into()),
                vehicle_type: Some("b".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(dual.len(), 1);
        assert_eq!(dual[0].instructor_name, "carlos");

        let of_instructor = filter_vehicles(
            &f.pool,
            &VehicleFilter {
                instructor_id: Some(f.instructor),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(of_instructor.len(), 1);
        assert_eq!(of_instructor[0].id, f.vehicle);
    }

    #[tokio::test]
    async fn instructor_lessons_today_counts_only_scheduled() {
        let f = fixture().await;
        let first = schedule(&f.pool, f.student, &form(Some(f.instructor), None, &day(0), "14:00"), now())
            .await
            .unwrap();
        let second = schedule(&f.pool, f.student, &form(Some(f.instructor), None, &day(0), "16:00"), now())
            .await
            .unwrap();
        accept(&f.pool, f.instructor, first.lesson.id).await.unwrap();
        accept(&f.pool, f.instructor, second.lesson.id).await.unwrap();
        start(&f.pool, f.instructor, first.lesson.id).await.unwrap();

        let dashboard = instructor_dashboard(&f.pool, f.instructor, now().date()).await.unwrap();
        assert_eq!(dashboard.today.len(), 2);
        assert_eq!(dashboard.stats.lessons_today, 1);
    }

    #[tokio::test]
    async fn dashboards_count_lessons() {
        let f = fixture().await;
        let a = schedule(&f.pool, f.student, &form(Some(f.instructor), None, &day(0), "14:00"), now())
            .await
            .unwrap();
        schedule(&f.pool, f.student, &form(None, None, &day(1), "09:00"), now())
            .await
            .unwrap();
        accept(&f.pool, f.instructor, a.lesson.id).await.unwrap();

        let student = student_dashboard(&f.pool, f.student, now().date()).await.unwrap();
        assert_eq!(student.stats.upcoming_lessons, 1);
        assert_eq!(student.upcoming.len(), 1);
        assert_eq!(student.awaiting.len(), 1);
        assert_eq!(student.stats.hours_left, REQUIRED_HOURS);

        let instructor = instructor_dashboard(&f.pool, f.instructor, now().date()).await.unwrap();
        assert_eq!(instructor.stats.lessons_today, 1);
        assert_eq!(instructor.upcoming.len(), 1);
        assert_eq!(instructor.stats.active_students, 1);

        let employee = employee_dashboard(&f.pool, now().date()).await.unwrap();
        assert_eq!(employee.stats.students, 1);
        assert_eq!(employee.stats.active_instructors, 1);
        assert_eq!(employee.stats.lessons_today, 1);
        assert_eq!(employee.stats.pending_lessons, 1);

        let user = crate::services::user_service::find_user_by_id(&f.pool, f.student)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(lessons_for(&f.pool, &user).await.unwrap().len(), 2);
    }
}
