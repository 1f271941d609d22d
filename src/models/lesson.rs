// src/models/lesson.rs
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;

/// Estados possíveis de uma aula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "kebab-case")]
#[sqlx(rename_all = "kebab-case")]
pub enum LessonStatus {
    Pending,
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
    Rescheduled,
}

/// Estados que ocupam o horário do aluno e do instrutor.
pub const BLOCKING_STATUSES: &[LessonStatus] = &[
    LessonStatus::Pending,
    LessonStatus::Scheduled,
    LessonStatus::InProgress,
    LessonStatus::Rescheduled,
];

impl LessonStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LessonStatus::Pending => "pending",
            LessonStatus::Scheduled => "scheduled",
            LessonStatus::InProgress => "in-progress",
            LessonStatus::Completed => "completed",
            LessonStatus::Cancelled => "cancelled",
            LessonStatus::Rescheduled => "rescheduled",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LessonStatus::Pending => "Pendente de Confirmação",
            LessonStatus::Scheduled => "Agendada",
            LessonStatus::InProgress => "Em Andamento",
            LessonStatus::Completed => "Completada",
            LessonStatus::Cancelled => "Cancelada",
            LessonStatus::Rescheduled => "Remarcada",
        }
    }

    /// À espera de resposta do instrutor.
    pub fn awaits_instructor(&self) -> bool {
        matches!(self, LessonStatus::Pending | LessonStatus::Rescheduled)
    }
}

/// Categoria do veículo da aula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum VehicleType {
    A,
    B,
}

impl VehicleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleType::A => "A",
            VehicleType::B => "B",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            VehicleType::A => "Categoria A - Motocicleta",
            VehicleType::B => "Categoria B - Carro",
        }
    }

    pub fn parse(value: &str) -> Option<VehicleType> {
        match value.trim().to_ascii_uppercase().as_str() {
            "A" => Some(VehicleType::A),
            "B" => Some(VehicleType::B),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Lesson {
    pub id: i64,
    pub student_id: i64,
    pub instructor_id: Option<i64>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration: i64,
    pub cep: String,
    pub street: String,
    pub number: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub location: String,
    pub vehicle_type: Option<VehicleType>,
    pub vehicle_id: Option<i64>,
    pub status: LessonStatus,
    pub score: String,
    pub notes: String,
    pub lesson_number: i64,
    pub prefer_adapted_pcd: bool,
    pub prefer_dual_control: bool,
    pub rejection_reason: Option<String>,
    pub student_rating: Option<f64>,
    pub student_feedback: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Aula com os nomes do aluno/instrutor e o veículo, para páginas e JSON.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LessonView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub lesson: Lesson,
    pub student_name: String,
    pub instructor_name: Option<String>,
    pub vehicle_plate: Option<String>,
    pub vehicle_description: Option<String>,
}

impl LessonView {
    pub fn time_label(&self) -> String {
        self.lesson.time.format("%H:%M").to_string()
    }

    pub fn date_label(&self) -> String {
        self.lesson.date.format("%d/%m/%Y").to_string()
    }

    pub fn instructor_label(&self) -> &str {
        self.instructor_name.as_deref().unwrap_or("A definir")
    }

    pub fn status_label(&self) -> &'static str {
        self.lesson.status.label()
    }

    pub fn status_slug(&self) -> &'static str {
        self.lesson.status.as_str()
    }

    pub fn was_rejected(&self) -> bool {
        self.lesson.rejection_reason.is_some()
    }

    pub fn rejection_label(&self) -> &str {
        self.lesson.rejection_reason.as_deref().unwrap_or("")
    }

    pub fn vehicle_type_code(&self) -> &'static str {
        self.lesson.vehicle_type.map(|t| t.as_str()).unwrap_or("")
    }

    pub fn vehicle_label(&self) -> String {
        match (&self.vehicle_description, &self.vehicle_plate) {
            (Some(description), Some(plate)) => format!("{} ({})", description, plate),
            _ => self.lesson.vehicle_type.map(|t| t.label()).unwrap_or("-").to_string(),
        }
    }

    // Valor do <input hidden> do instrutor ao remarcar
    pub fn instructor_value(&self) -> String {
        self.lesson.instructor_id.map(|id| id.to_string()).unwrap_or_default()
    }

    pub fn rating_label(&self) -> String {
        self.lesson
            .student_rating
            .map(|r| format!("{:.1}", r))
            .unwrap_or_default()
    }

    pub fn is_rated(&self) -> bool {
        self.lesson.student_rating.is_some()
    }

    pub fn place_label(&self) -> String {
        let l = &self.lesson;
        if l.street.is_empty() {
            return l.location.clone();
        }
        format!("{}, {} - {}, {}/{}", l.street, l.number, l.neighborhood, l.city, l.state)
    }
}

/// Dados de agendamento já validados.
#[derive(Debug, Clone)]
pub struct NewLesson {
    pub instructor_id: Option<i64>,
    pub vehicle_id: Option<i64>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub cep: String,
    pub street: String,
    pub number: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub vehicle_type: VehicleType,
    pub prefer_adapted_pcd: bool,
    pub prefer_dual_control: bool,
}

// Aceita texto, números e booleanos (formulário HTML ou JSON) como texto
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s,
        Some(other) => other.to_string(),
    })
}

pub(crate) fn lenient_flag<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = lenient_string(deserializer)?;
    Ok(Some(value).filter(|v| !v.is_empty()))
}

/// Formulário de agendamento (HTML) e corpo JSON de remarcação: tudo texto.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LessonForm {
    #[serde(default, deserialize_with = "lenient_string")]
    pub instructor: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub vehicle: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub cep: String,
    #[serde(default)]
    pub rua: String,
    #[serde(default)]
    pub numero: String,
    #[serde(default)]
    pub bairro: String,
    #[serde(default)]
    pub cidade: String,
    #[serde(default)]
    pub estado: String,
    #[serde(default)]
    pub vehicle_type: String,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub prefer_adapted_pcd: Option<String>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub prefer_dual_control: Option<String>,
}

/// Instrutor disponível para o filtro de agendamento.
#[derive(Debug, Clone, Serialize)]
pub struct InstructorOption {
    pub id: i64,
    pub full_name: String,
    pub cnh_categories: String,
    pub vehicle: Option<crate::models::vehicle::VehicleOption>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstructorFilter {
    pub vehicle_type: Option<String>,
    #[serde(default)]
    pub prefer_dual_control: Option<String>,
    #[serde(default)]
    pub prefer_adapted_pcd: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VehicleFilter {
    pub instructor_id: Option<i64>,
    pub vehicle_type: Option<String>,
    #[serde(default)]
    pub prefer_dual_control: Option<String>,
    #[serde(default)]
    pub prefer_adapted_pcd: Option<String>,
}

/// Interpreta os valores de checkbox/JSON usados pelo site ("on", "true", "1", "sim").
pub fn is_checked(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "on" | "yes" | "sim")
    )
}

// --- Painéis ---

#[derive(Debug, Clone, Default, Serialize)]
pub struct StudentStats {
    pub upcoming_lessons: i64,
    pub completed_lessons_count: i64,
    pub total_hours: i64,
    pub hours_left: i64,
    pub required_hours: i64,
    pub progress_percentage: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct InstructorStats {
    pub lessons_today: i64,
    pub active_students: i64,
    pub completed_lessons: i64,
    pub hours_worked: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EmployeeStats {
    pub students: i64,
    pub active_instructors: i64,
    pub pending_instructors: i64,
    pub lessons_today: i64,
    pub pending_lessons: i64,
}
