// src/services/seed_service.rs
use crate::{
    error::AppResult,
    models::{
        lesson::{LessonStatus, VehicleType},
        user::{NewUser, Role},
    },
    services::{auth_service, lesson_service::{progress_for, LESSON_DURATION_MINUTES}, user_service},
};
use chrono::{Duration, NaiveDate, NaiveTime};
use sqlx::SqlitePool;

const SAMPLE_PASSWORD: &str = "senha123";
const INSTRUCTOR_EMAIL: &str = "carlos@autoescola.com";

struct SampleStudent {
    email: &'static str,
    full_name: &'static str,
    phone: &'static str,
    cpf: &'static str,
}

const STUDENTS: &[SampleStudent] = &[
    SampleStudent { email: "maria@email.com", full_name: "Maria Silva", phone: "(11) 91234-5678", cpf: "52998224725" },
    SampleStudent { email: "joao@email.com", full_name: "João Santos", phone: "(11) 92345-6789", cpf: "11144477735" },
    SampleStudent { email: "ana@email.com", full_name: "Ana Costa", phone: "(11) 93456-7890", cpf: "12345678909" },
];

struct SampleLesson {
    student: usize,
    days_from_today: i64,
    hour: u32,
    location: &'static str,
    vehicle_type: VehicleType,
    status: LessonStatus,
    lesson_number: i64,
    score: &'static str,
}

const LESSONS: &[SampleLesson] = &[
    SampleLesson { student: 0, days_from_today: 0, hour: 8, location: "Centro - Av. Principal, 123", vehicle_type: VehicleType::B, status: LessonStatus::Scheduled, lesson_number: 12, score: "" },
    SampleLesson { student: 1, days_from_today: 0, hour: 9, location: "Zona Sul - Rua das Flores, 456", vehicle_type: VehicleType::B, status: LessonStatus::InProgress, lesson_number: 8, score: "" },
    SampleLesson { student: 2, days_from_today: 0, hour: 10, location: "Centro - Av. Principal, 123", vehicle_type: VehicleType::A, status: LessonStatus::Scheduled, lesson_number: 15, score: "" },
    SampleLesson { student: 0, days_from_today: -1, hour: 14, location: "Zona Norte - Av. Brasil, 789", vehicle_type: VehicleType::B, status: LessonStatus::Completed, lesson_number: 11, score: "Excelente" },
];

/// Dados de exemplo (instrutor, alunos e aulas de hoje/ontem). Não faz nada
/// se o instrutor de exemplo já existir.
pub async fn populate_sample_data(db_pool: &SqlitePool, today: NaiveDate) -> AppResult<()> {
    if user_service::email_exists(db_pool, INSTRUCTOR_EMAIL).await? {
        tracing::info!("Dados de exemplo já existem, nada a fazer.");
        return Ok(());
    }
    tracing::info!("🌱 Criando dados de exemplo...");

    let password_hash = auth_service::hash_password(SAMPLE_PASSWORD).await?;
    let mut tx = db_pool.begin().await?;

    let instructor_id = user_service::create_user(
        &mut tx,
        &NewUser {
            username: "carlos_mendes".into(),
            email: INSTRUCTOR_EMAIL.into(),
            password_hash: password_hash.clone(),
            full_name: "Carlos Mendes".into(),
            phone: "(11) 98765-4321".into(),
            role: Role::Instrutor,
        },
    )
    .await?;
    sqlx::query(
        r#"
        INSERT INTO instructor_profiles (user_id, cpf, cnh, cnh_categories, credential, status, city, state)
        VALUES (?1, '39053344705', '12345678901', 'AB', 'CRED-0001', 'ativo', 'São Paulo', 'SP')
        "#,
    )
    .bind(instructor_id)
    .execute(&mut *tx)
    .await?;
    let vehicle_id = sqlx::query(
        r#"
        INSERT INTO instructor_vehicles
            (instructor_id, plate, renavam, make, model, color, year, category, dual_control)
        VALUES (?1, 'ABC1D23', '00639884962', 'Volkswagen', 'Gol', 'Prata', 2021, 'B', 1)
        "#,
    )
    .bind(instructor_id)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    let mut student_ids = Vec::with_capacity(STUDENTS.len());
    for student in STUDENTS {
        let username = user_service::generate_username(&mut tx, student.email).await?;
        let id = user_service::create_user(
            &mut tx,
            &NewUser {
                username,
                email: student.email.into(),
                password_hash: password_hash.clone(),
                full_name: student.full_name.into(),
                phone: student.phone.into(),
                role: Role::Aluno,
            },
        )
        .await?;
        sqlx::query("INSERT INTO student_profiles (user_id, cpf, city, state) VALUES (?1, ?2, 'São Paulo', 'SP')")
            .bind(id)
            .bind(student.cpf)
            .execute(&mut *tx)
            .await?;
        student_ids.push(id);
    }

    for lesson in LESSONS {
        let student_id = student_ids[lesson.student];
        let vehicle = (lesson.vehicle_type == VehicleType::B).then_some(vehicle_id);
        sqlx::query(
            r#"
            INSERT INTO lessons
                (student_id, instructor_id, vehicle_id, date, time, duration, location,
                 vehicle_type, status, lesson_number, score)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(student_id)
        .bind(instructor_id)
        .bind(vehicle)
        .bind(today + Duration::days(lesson.days_from_today))
        .bind(NaiveTime::from_hms_opt(lesson.hour, 0, 0).unwrap_or_default())
        .bind(LESSON_DURATION_MINUTES)
        .bind(lesson.location)
        .bind(lesson.vehicle_type)
        .bind(lesson.status)
        .bind(lesson.lesson_number)
        .bind(lesson.score)
        .execute(&mut *tx)
        .await?;

        if lesson.status == LessonStatus::Completed {
            sqlx::query(
                "UPDATE student_profiles SET completed_lessons = completed_lessons + 1 WHERE user_id = ?1",
            )
            .bind(student_id)
            .execute(&mut *tx)
            .await?;
        }
    }

    for student_id in &student_ids {
        let completed: i64 =
            sqlx::query_scalar("SELECT completed_lessons FROM student_profiles WHERE user_id = ?1")
                .bind(student_id)
                .fetch_one(&mut *tx)
                .await?;
        sqlx::query("UPDATE student_profiles SET progress = ?1 WHERE user_id = ?2")
            .bind(progress_for(completed))
            .bind(student_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    tracing::info!(
        "🌱 Dados de exemplo criados. Instrutor: {} / {}; alunos: {}",
        INSTRUCTOR_EMAIL,
        SAMPLE_PASSWORD,
        STUDENTS.iter().map(|s| s.email).collect::<Vec<_>>().join(", ")
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::test_pool, services::lesson_service};

    #[tokio::test]
    async fn seeding_twice_is_harmless() {
        let pool = test_pool().await;
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        populate_sample_data(&pool, today).await.unwrap();
        populate_sample_data(&pool, today).await.unwrap();

        let lessons: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lessons")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(lessons, LESSONS.len() as i64);

        let carlos = user_service::find_user_by_email(&pool, INSTRUCTOR_EMAIL).await.unwrap().unwrap();
        let dashboard = lesson_service::instructor_dashboard(&pool, carlos.id, today).await.unwrap();
        assert_eq!(dashboard.today.len(), 3);
        assert!(dashboard.warning().is_none());

        let maria = user_service::find_user_by_email(&pool, "maria@email.com").await.unwrap().unwrap();
        let student = lesson_service::student_dashboard(&pool, maria.id, today).await.unwrap();
        assert_eq!(student.stats.completed_lessons_count, 1);
        assert_eq!(student.upcoming.len(), 1);
    }
}
