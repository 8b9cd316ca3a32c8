use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// User document. The password only ever exists here as an argon2 hash,
/// and even the hash is excluded from serialization.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: OffsetDateTime,
}

/// Todo document. `creator` is set on insert and never updated.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TodoRecord {
    pub id: Uuid,
    pub creator: Uuid,
    pub text: String,
    pub completed: bool,
    pub completed_at: Option<i64>,
    pub created_at: OffsetDateTime,
}

/// Ownership scope for todo lookups and mutations.
///
/// The creator field is mandatory and private, so every query built from
/// this filter is constrained to the requesting user's own records. A todo
/// that exists but belongs to someone else matches nothing, which callers
/// surface as "not found".
#[derive(Debug, Clone, Copy)]
pub struct TodoFilter {
    creator: Uuid,
    id: Option<Uuid>,
}

impl TodoFilter {
    pub fn owned_by(creator: Uuid) -> Self {
        Self { creator, id: None }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn creator(&self) -> Uuid {
        self.creator
    }

    pub fn id(&self) -> Option<Uuid> {
        self.id
    }
}

/// Partial update for a todo.
///
/// `completed_at` is coupled to `completed`: marking a todo completed stamps
/// the current time in unix milliseconds, anything else clears the stamp.
#[derive(Debug, Clone)]
pub struct TodoPatch {
    pub text: Option<String>,
    pub completed: bool,
    pub completed_at: Option<i64>,
}

impl TodoPatch {
    pub fn new(text: Option<String>, completed: bool) -> Self {
        let completed_at = completed.then(now_millis);
        Self {
            text,
            completed,
            completed_at,
        }
    }
}

pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Collection interface for user documents and their token sub-collection.
///
/// Token membership is part of the user document: a token authenticates only
/// while it is present here, independent of its signature remaining valid.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, email: &str, password_hash: &str) -> anyhow::Result<UserRecord>;

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<UserRecord>>;

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<UserRecord>>;

    /// Resolve the user holding `token` under `purpose`, if any.
    async fn find_by_token(&self, purpose: &str, token: &str)
        -> anyhow::Result<Option<UserRecord>>;

    /// Append `token` unless the user already holds one for `purpose`.
    /// Returns the token that ended up active, so concurrent callers
    /// converge on a single value instead of racing read-then-write.
    async fn append_token_if_absent(
        &self,
        user_id: Uuid,
        purpose: &str,
        token: &str,
    ) -> anyhow::Result<String>;

    /// Remove a token from the user's active list. Idempotent.
    async fn remove_token(&self, user_id: Uuid, token: &str) -> anyhow::Result<()>;

    /// Delete the user document along with its tokens and todos.
    async fn delete_user(&self, user_id: Uuid) -> anyhow::Result<()>;
}

/// Collection interface for todo documents. Every read and write goes
/// through a [`TodoFilter`], so ownership scoping cannot be skipped.
#[async_trait]
pub trait TodoStore: Send + Sync {
    async fn insert_todo(&self, creator: Uuid, text: &str) -> anyhow::Result<TodoRecord>;

    async fn find_todos(&self, filter: TodoFilter) -> anyhow::Result<Vec<TodoRecord>>;

    async fn find_todo(&self, filter: TodoFilter) -> anyhow::Result<Option<TodoRecord>>;

    /// Apply `patch` to the matching todo, returning the updated record or
    /// `None` when the filter matches nothing.
    async fn update_todo(
        &self,
        filter: TodoFilter,
        patch: TodoPatch,
    ) -> anyhow::Result<Option<TodoRecord>>;

    /// Delete the matching todo, returning the removed record or `None`.
    async fn delete_todo(&self, filter: TodoFilter) -> anyhow::Result<Option<TodoRecord>>;
}
