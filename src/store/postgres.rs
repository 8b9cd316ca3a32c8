use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{TodoFilter, TodoPatch, TodoRecord, TodoStore, UserRecord, UserStore};

/// Production store backed by PostgreSQL. Token and todo mutations are
/// single statements, so the per-document atomicity the auth layer relies
/// on comes from the database rather than application-side locking.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, email: &str, password_hash: &str) -> anyhow::Result<UserRecord> {
        let user = sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO users (id, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, email, password_hash, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, email, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, email, password_hash, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_token(
        &self,
        purpose: &str,
        token: &str,
    ) -> anyhow::Result<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT u.id, u.email, u.password_hash, u.created_at
            FROM users u
            JOIN user_tokens t ON t.user_id = u.id
            WHERE t.purpose = $1 AND t.token = $2
            "#,
        )
        .bind(purpose)
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn append_token_if_absent(
        &self,
        user_id: Uuid,
        purpose: &str,
        token: &str,
    ) -> anyhow::Result<String> {
        // The (user_id, purpose) primary key makes this a conditional
        // append: on conflict the no-op update lets RETURNING hand back
        // the token that already won.
        let active = sqlx::query_scalar::<_, String>(
            r#"
            INSERT INTO user_tokens (user_id, purpose, token)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, purpose) DO UPDATE SET token = user_tokens.token
            RETURNING token
            "#,
        )
        .bind(user_id)
        .bind(purpose)
        .bind(token)
        .fetch_one(&self.pool)
        .await?;
        Ok(active)
    }

    async fn remove_token(&self, user_id: Uuid, token: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            DELETE FROM user_tokens
            WHERE user_id = $1 AND token = $2
            "#,
        )
        .bind(user_id)
        .bind(token)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_user(&self, user_id: Uuid) -> anyhow::Result<()> {
        // Tokens and todos go with the user via ON DELETE CASCADE.
        sqlx::query(r#"DELETE FROM users WHERE id = $1"#)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TodoStore for PgStore {
    async fn insert_todo(&self, creator: Uuid, text: &str) -> anyhow::Result<TodoRecord> {
        let todo = sqlx::query_as::<_, TodoRecord>(
            r#"
            INSERT INTO todos (id, creator, text)
            VALUES ($1, $2, $3)
            RETURNING id, creator, text, completed, completed_at, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(creator)
        .bind(text)
        .fetch_one(&self.pool)
        .await?;
        Ok(todo)
    }

    async fn find_todos(&self, filter: TodoFilter) -> anyhow::Result<Vec<TodoRecord>> {
        let rows = sqlx::query_as::<_, TodoRecord>(
            r#"
            SELECT id, creator, text, completed, completed_at, created_at
            FROM todos
            WHERE creator = $1 AND ($2::uuid IS NULL OR id = $2)
            ORDER BY created_at ASC
            "#,
        )
        .bind(filter.creator())
        .bind(filter.id())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find_todo(&self, filter: TodoFilter) -> anyhow::Result<Option<TodoRecord>> {
        let todo = sqlx::query_as::<_, TodoRecord>(
            r#"
            SELECT id, creator, text, completed, completed_at, created_at
            FROM todos
            WHERE creator = $1 AND ($2::uuid IS NULL OR id = $2)
            LIMIT 1
            "#,
        )
        .bind(filter.creator())
        .bind(filter.id())
        .fetch_optional(&self.pool)
        .await?;
        Ok(todo)
    }

    async fn update_todo(
        &self,
        filter: TodoFilter,
        patch: TodoPatch,
    ) -> anyhow::Result<Option<TodoRecord>> {
        let todo = sqlx::query_as::<_, TodoRecord>(
            r#"
            UPDATE todos
            SET text = COALESCE($3, text),
                completed = $4,
                completed_at = $5
            WHERE creator = $1 AND ($2::uuid IS NULL OR id = $2)
            RETURNING id, creator, text, completed, completed_at, created_at
            "#,
        )
        .bind(filter.creator())
        .bind(filter.id())
        .bind(patch.text)
        .bind(patch.completed)
        .bind(patch.completed_at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(todo)
    }

    async fn delete_todo(&self, filter: TodoFilter) -> anyhow::Result<Option<TodoRecord>> {
        let todo = sqlx::query_as::<_, TodoRecord>(
            r#"
            DELETE FROM todos
            WHERE creator = $1 AND ($2::uuid IS NULL OR id = $2)
            RETURNING id, creator, text, completed, completed_at, created_at
            "#,
        )
        .bind(filter.creator())
        .bind(filter.id())
        .fetch_optional(&self.pool)
        .await?;
        Ok(todo)
    }
}
