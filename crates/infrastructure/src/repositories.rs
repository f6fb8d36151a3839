use async_trait::async_trait;
use domain::{Todo, TodoId, UserId};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

/// 永続化層のエラー（呼び出し側では 500 として扱い、リトライしない）
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("DynamoDB error: {0}")]
    DynamoDb(String),

    #[error("Corrupt item: {0}")]
    CorruptItem(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// 更新対象がすでに存在しない（読み取り後に削除された場合など）
    #[error("no such todo: id={0}")]
    NotFound(TodoId),
}

/// Todo の保存先の抽象
///
/// 単一エンティティの読み書きはそれぞれアトミックであることだけを要求します。
#[async_trait]
pub trait TodoRepository: Send + Sync {
    /// 新規作成・更新の両方に使う（同じ ID なら上書き）
    async fn save(&self, todo: &Todo) -> Result<TodoId, RepositoryError>;

    /// 既存の Todo だけを上書きする。存在しなければ `RepositoryError::NotFound`
    async fn update(&self, todo: &Todo) -> Result<(), RepositoryError>;

    async fn get_by_id(&self, id: &TodoId) -> Result<Option<Todo>, RepositoryError>;

    /// 所有者と完了状態で絞り込み、作成日時の新しい順に返す。
    /// 作成日時が同じものは後から採番された ID が先
    async fn query_by_owner_and_finished(
        &self,
        user_id: &UserId,
        finished: bool,
    ) -> Result<Vec<Todo>, RepositoryError>;

    /// 存在しない ID の削除は何もしない
    async fn delete(&self, id: &TodoId) -> Result<(), RepositoryError>;
}

/// 簡易な InMemory 実装（開発/テスト用）
#[derive(Debug, Default)]
pub struct InMemoryTodoRepository {
    // 挿入順を保持する
    todos: Mutex<Vec<Todo>>,
}

impl InMemoryTodoRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 保存件数（テスト観測用）
    pub fn len(&self) -> usize {
        self.lock().map(|todos| todos.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Todo>>, RepositoryError> {
        self.todos
            .lock()
            .map_err(|_| RepositoryError::Unavailable("in-memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl TodoRepository for InMemoryTodoRepository {
    async fn save(&self, todo: &Todo) -> Result<TodoId, RepositoryError> {
        let mut todos = self.lock()?;
        match todos.iter_mut().find(|t| t.id == todo.id) {
            Some(existing) => *existing = todo.clone(),
            None => todos.push(todo.clone()),
        }
        Ok(todo.id.clone())
    }

    async fn update(&self, todo: &Todo) -> Result<(), RepositoryError> {
        let mut todos = self.lock()?;
        let existing = todos
            .iter_mut()
            .find(|t| t.id == todo.id)
            .ok_or_else(|| RepositoryError::NotFound(todo.id.clone()))?;
        *existing = todo.clone();
        Ok(())
    }

    async fn get_by_id(&self, id: &TodoId) -> Result<Option<Todo>, RepositoryError> {
        let todos = self.lock()?;
        Ok(todos.iter().find(|t| &t.id == id).cloned())
    }

    async fn query_by_owner_and_finished(
        &self,
        user_id: &UserId,
        finished: bool,
    ) -> Result<Vec<Todo>, RepositoryError> {
        let todos = self.lock()?;
        let mut out: Vec<Todo> = todos
            .iter()
            .filter(|t| t.is_owned_by(user_id) && t.finished == finished)
            .cloned()
            .collect();
        // DynamoDB の GSI1SK（<createdAt>#<id>）の降順と同じ並び
        out.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(out)
    }

    async fn delete(&self, id: &TodoId) -> Result<(), RepositoryError> {
        let mut todos = self.lock()?;
        todos.retain(|t| &t.id != id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    fn todo_at(owner: &str, body: &str, finished: bool, minutes_ago: i64) -> Todo {
        let mut todo = Todo::new(user(owner), body).unwrap();
        todo.set_finished(finished);
        todo.created_at = Utc::now() - Duration::minutes(minutes_ago);
        todo
    }

    #[tokio::test]
    async fn test_save_then_get_by_id() {
        let repo = InMemoryTodoRepository::new();
        let todo = todo_at("user01", "todo1", false, 0);

        let id = repo.save(&todo).await.unwrap();

        assert_eq!(id, todo.id);
        assert_eq!(repo.get_by_id(&id).await.unwrap(), Some(todo));
        assert_eq!(repo.get_by_id(&TodoId::new()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_existing_id_overwrites_in_place() {
        let repo = InMemoryTodoRepository::new();
        let mut todo = todo_at("user01", "todo1", false, 0);
        repo.save(&todo).await.unwrap();

        todo.set_finished(true);
        repo.save(&todo).await.unwrap();

        assert_eq!(repo.len(), 1);
        let stored = repo.get_by_id(&todo.id).await.unwrap().unwrap();
        assert!(stored.finished);
        assert!(stored.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_query_filters_by_owner_and_finished_newest_first() {
        let repo = InMemoryTodoRepository::new();
        for todo in [
            todo_at("user01", "todo1", false, 4),
            todo_at("user01", "todo2", false, 3),
            todo_at("user01", "todo3", true, 2),
            todo_at("user02", "todo5", false, 1),
        ] {
            repo.save(&todo).await.unwrap();
        }

        let unfinished = repo
            .query_by_owner_and_finished(&user("user01"), false)
            .await
            .unwrap();
        let bodies: Vec<&str> = unfinished.iter().map(|t| t.body.as_str()).collect();
        assert_eq!(bodies, vec!["todo2", "todo1"]);

        let finished = repo
            .query_by_owner_and_finished(&user("user01"), true)
            .await
            .unwrap();
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].body, "todo3");
    }

    #[tokio::test]
    async fn test_query_orders_equal_created_at_by_id_descending() {
        let repo = InMemoryTodoRepository::new();
        let created_at = Utc::now();
        for body in ["a", "b", "c"] {
            let mut todo = Todo::new(user("user01"), body).unwrap();
            todo.created_at = created_at;
            repo.save(&todo).await.unwrap();
        }

        let todos = repo
            .query_by_owner_and_finished(&user("user01"), false)
            .await
            .unwrap();
        let bodies: Vec<&str> = todos.iter().map(|t| t.body.as_str()).collect();
        assert_eq!(bodies, vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn test_update_overwrites_existing() {
        let repo = InMemoryTodoRepository::new();
        let mut todo = todo_at("user01", "todo1", false, 0);
        repo.save(&todo).await.unwrap();

        todo.set_finished(true);
        repo.update(&todo).await.unwrap();

        assert_eq!(repo.len(), 1);
        assert_eq!(repo.get_by_id(&todo.id).await.unwrap(), Some(todo));
    }

    #[tokio::test]
    async fn test_update_after_delete_does_not_resurrect() {
        let repo = InMemoryTodoRepository::new();
        let mut todo = todo_at("user01", "todo1", false, 0);
        repo.save(&todo).await.unwrap();
        repo.delete(&todo.id).await.unwrap();

        todo.set_finished(true);
        let err = repo.update(&todo).await.unwrap_err();

        assert!(matches!(err, RepositoryError::NotFound(id) if id == todo.id));
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_only_that_todo() {
        let repo = InMemoryTodoRepository::new();
        let keep = todo_at("user01", "keep", false, 1);
        let gone = todo_at("user01", "gone", false, 0);
        repo.save(&keep).await.unwrap();
        repo.save(&gone).await.unwrap();

        repo.delete(&gone.id).await.unwrap();
        // 2 回目は何もしない
        repo.delete(&gone.id).await.unwrap();

        assert_eq!(repo.len(), 1);
        assert_eq!(repo.get_by_id(&gone.id).await.unwrap(), None);
        assert!(repo.get_by_id(&keep.id).await.unwrap().is_some());
    }
}
