use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::TodoRecord;

#[derive(Debug, Deserialize)]
pub struct CreateTodoRequest {
    pub text: String,
}

/// PATCH body. A patch always resolves the completion flag: leaving
/// `completed` out is the same as setting it to false, which also clears
/// the completion timestamp.
#[derive(Debug, Deserialize)]
pub struct UpdateTodoRequest {
    pub text: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoBody {
    pub id: Uuid,
    pub creator: Uuid,
    pub text: String,
    pub completed: bool,
    pub completed_at: Option<i64>,
}

impl From<TodoRecord> for TodoBody {
    fn from(todo: TodoRecord) -> Self {
        Self {
            id: todo.id,
            creator: todo.creator,
            text: todo.text,
            completed: todo.completed,
            completed_at: todo.completed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TodosEnvelope {
    pub todos: Vec<TodoBody>,
}

#[derive(Debug, Serialize)]
pub struct TodoEnvelope {
    pub todo: TodoBody,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    #[test]
    fn completed_at_serializes_camel_case() {
        let body = TodoBody::from(TodoRecord {
            id: Uuid::new_v4(),
            creator: Uuid::new_v4(),
            text: "walk the dog".into(),
            completed: true,
            completed_at: Some(1_507_972_380_851),
            created_at: OffsetDateTime::now_utc(),
        });
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["completedAt"], 1_507_972_380_851i64);
        assert_eq!(json["completed"], true);
    }

    #[test]
    fn update_request_defaults_completed_to_false() {
        let req: UpdateTodoRequest = serde_json::from_str(r#"{"text": "new text"}"#).unwrap();
        assert_eq!(req.text.as_deref(), Some("new text"));
        assert!(!req.completed);
    }
}
