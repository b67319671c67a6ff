use crate::schedule::ClockTime;
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Millisecond creation timestamp, as the records have always been keyed.
pub type EntityId = i64;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
}

/// A record with a stable identity stored inside an
/// [`EntityCollection`](crate::collection::EntityCollection).
pub trait Entity: Clone + Serialize + serde::de::DeserializeOwned {
    fn id(&self) -> EntityId;

    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// Entities with a display rank that drag-reordering rewrites.
pub trait Ordered: Entity {
    fn order(&self) -> usize;
    fn set_order(&mut self, order: usize);
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::EmptyField(field))
    } else {
        Ok(())
    }
}

fn default_created_at() -> DateTime<Utc> {
    Utc::now()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TaskCategory {
    #[default]
    Today,
    Backlog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Active,
    Done,
    Cancelled,
}

impl TaskStatus {
    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Active => "active",
            TaskStatus::Done => "done",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl TaskCategory {
    pub fn label(&self) -> &'static str {
        match self {
            TaskCategory::Today => "today",
            TaskCategory::Backlog => "backlog",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: TaskCategory,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default = "default_created_at")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

impl Task {
    pub fn new(
        id: EntityId,
        title: String,
        description: String,
        category: TaskCategory,
        date: NaiveDate,
    ) -> Self {
        Task {
            id,
            title,
            description,
            category,
            status: TaskStatus::Active,
            created_at: Utc::now(),
            date: Some(date),
        }
    }

    /// The stored planner date; records written before the field existed fall
    /// back to the local day they were created on.
    pub fn effective_date(&self) -> NaiveDate {
        self.date
            .unwrap_or_else(|| self.created_at.with_timezone(&Local).date_naive())
    }
}

impl Entity for Task {
    fn id(&self) -> EntityId {
        self.id
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require("title", &self.title)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickTask {
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default = "default_created_at")]
    pub created_at: DateTime<Utc>,
}

impl QuickTask {
    pub fn new(id: EntityId, title: String) -> Self {
        QuickTask {
            id,
            title,
            done: false,
            created_at: Utc::now(),
        }
    }
}

impl Entity for QuickTask {
    fn id(&self) -> EntityId {
        self.id
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require("title", &self.title)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub order: usize,
    #[serde(default = "default_created_at")]
    pub created_at: DateTime<Utc>,
}

impl Habit {
    pub fn new(id: EntityId, name: String, order: usize) -> Self {
        Habit {
            id,
            name,
            order,
            created_at: Utc::now(),
        }
    }
}

impl Entity for Habit {
    fn id(&self) -> EntityId {
        self.id
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require("name", &self.name)
    }
}

impl Ordered for Habit {
    fn order(&self) -> usize {
        self.order
    }

    fn set_order(&mut self, order: usize) {
        self.order = order;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Quadrant {
    #[default]
    UrgentImportant,
    NotUrgentImportant,
    UrgentNotImportant,
    NotUrgentNotImportant,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::UrgentImportant,
        Quadrant::NotUrgentImportant,
        Quadrant::UrgentNotImportant,
        Quadrant::NotUrgentNotImportant,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Quadrant::UrgentImportant => "Do First",
            Quadrant::NotUrgentImportant => "Schedule",
            Quadrant::UrgentNotImportant => "Delegate",
            Quadrant::NotUrgentNotImportant => "Eliminate",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Quadrant::UrgentImportant => "Urgent & Important",
            Quadrant::NotUrgentImportant => "Not Urgent & Important",
            Quadrant::UrgentNotImportant => "Urgent & Not Important",
            Quadrant::NotUrgentNotImportant => "Not Urgent & Not Important",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixTask {
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub quadrant: Quadrant,
    #[serde(default)]
    pub done: bool,
    #[serde(default = "default_created_at")]
    pub created_at: DateTime<Utc>,
}

impl MatrixTask {
    pub fn new(id: EntityId, title: String, notes: String, quadrant: Quadrant) -> Self {
        MatrixTask {
            id,
            title,
            notes,
            quadrant,
            done: false,
            created_at: Utc::now(),
        }
    }
}

impl Entity for MatrixTask {
    fn id(&self) -> EntityId {
        self.id
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require("title", &self.title)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    #[default]
    Work,
    Personal,
    Fitness,
    Meeting,
    Other,
}

impl EventCategory {
    pub const ALL: [EventCategory; 5] = [
        EventCategory::Work,
        EventCategory::Personal,
        EventCategory::Fitness,
        EventCategory::Meeting,
        EventCategory::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            EventCategory::Work => "Work",
            EventCategory::Personal => "Personal",
            EventCategory::Fitness => "Fitness",
            EventCategory::Meeting => "Meeting",
            EventCategory::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayEvent {
    pub id: EntityId,
    pub title: String,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    #[serde(default)]
    pub category: EventCategory,
    #[serde(default)]
    pub notes: String,
    pub date: NaiveDate,
    #[serde(default = "default_created_at")]
    pub created_at: DateTime<Utc>,
}

/// Caller-supplied fields for a new [`DayEvent`]; anything left unset takes
/// the planner's defaults (09:00 to 10:00, work).
#[derive(Debug, Clone, Default)]
pub struct EventDraft {
    pub title: String,
    pub start_time: Option<ClockTime>,
    pub end_time: Option<ClockTime>,
    pub category: Option<EventCategory>,
    pub notes: Option<String>,
}

impl EventDraft {
    pub fn build(self, id: EntityId, date: NaiveDate) -> DayEvent {
        DayEvent {
            id,
            title: self.title,
            start_time: self.start_time.unwrap_or(ClockTime::new_unchecked(9, 0)),
            end_time: self.end_time.unwrap_or(ClockTime::new_unchecked(10, 0)),
            category: self.category.unwrap_or_default(),
            notes: self.notes.unwrap_or_default(),
            date,
            created_at: Utc::now(),
        }
    }
}

impl Entity for DayEvent {
    fn id(&self) -> EntityId {
        self.id
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require("title", &self.title)?;
        if self.end_time <= self.start_time {
            // Reversed ranges are kept as entered; layout clamps their height.
            tracing::debug!(
                id = self.id,
                start = %self.start_time,
                end = %self.end_time,
                "event ends at or before it starts"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_reads_legacy_record_without_date() {
        let json = r#"{"id":1709630000000,"title":"Old","createdAt":"2024-03-05T10:00:00.000Z"}"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.status, TaskStatus::Active);
        assert_eq!(task.category, TaskCategory::Today);
        assert_eq!(task.description, "");
        assert!(task.date.is_none());
        let expected = task.created_at.with_timezone(&Local).date_naive();
        assert_eq!(task.effective_date(), expected);
    }

    #[test]
    fn task_serializes_with_original_field_names() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let task = Task::new(1, "Write report".into(), String::new(), TaskCategory::Today, date);
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["date"], "2024-03-05");
        assert_eq!(value["status"], "active");
        assert!(value.get("createdAt").is_some());
    }

    #[test]
    fn blank_titles_fail_validation() {
        let task = QuickTask::new(1, "   ".into());
        assert_eq!(task.validate(), Err(ValidationError::EmptyField("title")));
        let habit = Habit::new(1, "\t".into(), 0);
        assert_eq!(habit.validate(), Err(ValidationError::EmptyField("name")));
    }

    #[test]
    fn event_draft_fills_defaults() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let event = EventDraft {
            title: "Standup".into(),
            ..EventDraft::default()
        }
        .build(5, date);
        assert_eq!(event.start_time.to_string(), "09:00");
        assert_eq!(event.end_time.to_string(), "10:00");
        assert_eq!(event.category, EventCategory::Work);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["startTime"], "09:00");
        assert_eq!(value["date"], "2024-03-05");
    }

    #[test]
    fn reversed_event_range_is_accepted() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let event = EventDraft {
            title: "Late".into(),
            start_time: Some(ClockTime::new_unchecked(11, 0)),
            end_time: Some(ClockTime::new_unchecked(10, 0)),
            ..EventDraft::default()
        }
        .build(5, date);
        assert!(event.validate().is_ok());
    }

    #[test]
    fn quadrant_uses_snake_case_names() {
        let value = serde_json::to_value(Quadrant::NotUrgentImportant).unwrap();
        assert_eq!(value, "not_urgent_important");
    }
}
