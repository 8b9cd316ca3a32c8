use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{TodoFilter, TodoPatch, TodoRecord, TodoStore, UserRecord, UserStore};

#[derive(Debug, Clone)]
struct TokenRow {
    user_id: Uuid,
    purpose: String,
    token: String,
}

#[derive(Default)]
struct Inner {
    users: Vec<UserRecord>,
    tokens: Vec<TokenRow>,
    todos: Vec<TodoRecord>,
}

/// In-memory store used by tests and local development. A single mutex
/// stands in for the per-document atomicity the real backend provides.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, email: &str, password_hash: &str) -> anyhow::Result<UserRecord> {
        let mut inner = self.inner.lock().unwrap();
        if inner.users.iter().any(|u| u.email == email) {
            anyhow::bail!("duplicate email: {email}");
        }
        let user = UserRecord {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<UserRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<UserRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_token(
        &self,
        purpose: &str,
        token: &str,
    ) -> anyhow::Result<Option<UserRecord>> {
        let inner = self.inner.lock().unwrap();
        let Some(row) = inner
            .tokens
            .iter()
            .find(|t| t.purpose == purpose && t.token == token)
        else {
            return Ok(None);
        };
        Ok(inner.users.iter().find(|u| u.id == row.user_id).cloned())
    }

    async fn append_token_if_absent(
        &self,
        user_id: Uuid,
        purpose: &str,
        token: &str,
    ) -> anyhow::Result<String> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner
            .tokens
            .iter()
            .find(|t| t.user_id == user_id && t.purpose == purpose)
        {
            return Ok(existing.token.clone());
        }
        inner.tokens.push(TokenRow {
            user_id,
            purpose: purpose.to_string(),
            token: token.to_string(),
        });
        Ok(token.to_string())
    }

    async fn remove_token(&self, user_id: Uuid, token: &str) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .tokens
            .retain(|t| !(t.user_id == user_id && t.token == token));
        Ok(())
    }

    async fn delete_user(&self, user_id: Uuid) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.users.retain(|u| u.id != user_id);
        inner.tokens.retain(|t| t.user_id != user_id);
        inner.todos.retain(|t| t.creator != user_id);
        Ok(())
    }
}

fn matches(todo: &TodoRecord, filter: &TodoFilter) -> bool {
    todo.creator == filter.creator() && filter.id().map_or(true, |id| todo.id == id)
}

#[async_trait]
impl TodoStore for MemoryStore {
    async fn insert_todo(&self, creator: Uuid, text: &str) -> anyhow::Result<TodoRecord> {
        let mut inner = self.inner.lock().unwrap();
        let todo = TodoRecord {
            id: Uuid::new_v4(),
            creator,
            text: text.to_string(),
            completed: false,
            completed_at: None,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.todos.push(todo.clone());
        Ok(todo)
    }

    async fn find_todos(&self, filter: TodoFilter) -> anyhow::Result<Vec<TodoRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .todos
            .iter()
            .filter(|t| matches(t, &filter))
            .cloned()
            .collect())
    }

    async fn find_todo(&self, filter: TodoFilter) -> anyhow::Result<Option<TodoRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.todos.iter().find(|t| matches(t, &filter)).cloned())
    }

    async fn update_todo(
        &self,
        filter: TodoFilter,
        patch: TodoPatch,
    ) -> anyhow::Result<Option<TodoRecord>> {
        let mut inner = self.inner.lock().unwrap();
        let Some(todo) = inner.todos.iter_mut().find(|t| matches(t, &filter)) else {
            return Ok(None);
        };
        if let Some(text) = patch.text {
            todo.text = text;
        }
        todo.completed = patch.completed;
        todo.completed_at = patch.completed_at;
        Ok(Some(todo.clone()))
    }

    async fn delete_todo(&self, filter: TodoFilter) -> anyhow::Result<Option<TodoRecord>> {
        let mut inner = self.inner.lock().unwrap();
        let Some(pos) = inner.todos.iter().position(|t| matches(t, &filter)) else {
            return Ok(None);
        };
        Ok(Some(inner.todos.remove(pos)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn token_append_is_first_writer_wins() {
        let store = MemoryStore::new();
        let user = store.insert_user("a@example.com", "hash").await.unwrap();

        let first = store
            .append_token_if_absent(user.id, "auth", "token-one")
            .await
            .unwrap();
        let second = store
            .append_token_if_absent(user.id, "auth", "token-two")
            .await
            .unwrap();

        assert_eq!(first, "token-one");
        assert_eq!(second, "token-one");
    }

    #[tokio::test]
    async fn removed_token_no_longer_resolves() {
        let store = MemoryStore::new();
        let user = store.insert_user("a@example.com", "hash").await.unwrap();
        store
            .append_token_if_absent(user.id, "auth", "tok")
            .await
            .unwrap();

        store.remove_token(user.id, "tok").await.unwrap();
        store.remove_token(user.id, "tok").await.unwrap(); // idempotent

        assert!(store.find_by_token("auth", "tok").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn filter_hides_other_users_todos() {
        let store = MemoryStore::new();
        let a = store.insert_user("a@example.com", "h").await.unwrap();
        let b = store.insert_user("b@example.com", "h").await.unwrap();
        let todo = store.insert_todo(a.id, "only for a").await.unwrap();

        let hit = store
            .find_todo(TodoFilter::owned_by(a.id).with_id(todo.id))
            .await
            .unwrap();
        let miss = store
            .find_todo(TodoFilter::owned_by(b.id).with_id(todo.id))
            .await
            .unwrap();

        assert!(hit.is_some());
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn deleting_a_user_cascades() {
        let store = MemoryStore::new();
        let user = store.insert_user("a@example.com", "h").await.unwrap();
        store
            .append_token_if_absent(user.id, "auth", "tok")
            .await
            .unwrap();
        store.insert_todo(user.id, "orphan-to-be").await.unwrap();

        store.delete_user(user.id).await.unwrap();

        assert!(store.find_by_id(user.id).await.unwrap().is_none());
        assert!(store.find_by_token("auth", "tok").await.unwrap().is_none());
        assert!(store
            .find_todos(TodoFilter::owned_by(user.id))
            .await
            .unwrap()
            .is_empty());
    }
}
