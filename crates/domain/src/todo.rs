use crate::errors::DomainError;
use chrono::{DateTime, SubsecRound, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;
use ulid::{Generator, Ulid};

// 同一ミリ秒内でも単調増加させるためプロセスで 1 つだけ持つ
static ID_GENERATOR: Lazy<Mutex<Generator>> = Lazy::new(|| Mutex::new(Generator::new()));

/// Todo の識別子（ULID 文字列）
///
/// 採番順に文字列として昇順になります（`Ord` も採番順）。
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TodoId(String);

impl TodoId {
    pub fn new() -> Self {
        let mut generator = ID_GENERATOR
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // 1 ミリ秒に 2^80 件を超えたときだけ失敗する
        let ulid = generator.generate().unwrap_or_else(|_| Ulid::new());
        Self(ulid.to_string())
    }

    /// 外部入力（URL パスなど）から ID を復元します。
    /// ULID として解釈できない文字列は拒否します。
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        Ulid::from_string(s)
            .map(|ulid| Self(ulid.to_string()))
            .map_err(|_| DomainError::InvalidTodoId(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn timestamp_ms(&self) -> Option<u64> {
        Ulid::from_string(&self.0)
            .ok()
            .map(|ulid| ulid.timestamp_ms())
    }
}

impl Default for TodoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 認証済みユーザーの識別子（IdP の `sub`）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DomainError::InvalidUserId(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 個人用 Todo
///
/// `finished_at` は `finished == true` のときに限り `Some` です。
/// この不変条件は [`Todo::set_finished`] を通じてのみ状態を変えることで保たれます。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: TodoId,
    pub user_id: UserId,
    pub body: String,
    pub finished: bool,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Todo {
    /// 未完了の Todo を作成します。本文が空白のみの場合はエラーです。
    pub fn new(user_id: UserId, body: impl Into<String>) -> Result<Self, DomainError> {
        let body = body.into();
        if body.trim().is_empty() {
            return Err(DomainError::EmptyBody);
        }

        Ok(Self {
            id: TodoId::new(),
            user_id,
            body,
            finished: false,
            created_at: now(),
            finished_at: None,
        })
    }

    /// 完了状態を切り替えます。完了にするたびに `finished_at` を現在時刻で打ち直します。
    pub fn set_finished(&mut self, finished: bool) {
        self.finished = finished;
        self.finished_at = if finished { Some(now()) } else { None };
    }

    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        &self.user_id == user_id
    }
}

/// 永続化層とのラウンドトリップで値が変わらないよう、ミリ秒に丸めた現在時刻
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    #[test]
    fn test_todo_id_new_generates_26_char_string() {
        let todo_id = TodoId::new();
        let id_str = todo_id.as_str();

        assert_eq!(id_str.len(), 26);
        let valid_chars = "0123456789ABCDEFGHJKMNPQRSTVWXYZ";
        for c in id_str.chars() {
            assert!(valid_chars.contains(c), "Invalid character: {c}");
        }
        assert!(todo_id.timestamp_ms().is_some());
    }

    #[test]
    fn test_todo_id_increases_in_creation_order() {
        // 同一ミリ秒に採番されるものも含めて常に昇順
        let ids: Vec<TodoId> = (0..2000).map(|_| TodoId::new()).collect();

        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
            assert!(pair[0].as_str() < pair[1].as_str());
        }
    }

    #[test]
    fn test_todo_id_parse_rejects_garbage() {
        let err = TodoId::parse("agx0ZXN0YmVkLXRlc3RyCgsSBFRvZG8YAQw").unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidTodoId("agx0ZXN0YmVkLXRlc3RyCgsSBFRvZG8YAQw".to_string())
        );

        let id = TodoId::new();
        assert_eq!(TodoId::parse(id.as_str()).unwrap(), id);
    }

    #[test]
    fn test_user_id_rejects_blank() {
        assert!(UserId::new("user01").is_ok());
        assert_eq!(
            UserId::new("  ").unwrap_err(),
            DomainError::InvalidUserId("  ".to_string())
        );
    }

    #[test]
    fn test_new_todo_is_unfinished() {
        // Arrange
        let owner = user("user01");

        // Act
        let todo = Todo::new(owner.clone(), "buy milk").unwrap();

        // Assert
        assert_eq!(todo.user_id, owner);
        assert_eq!(todo.body, "buy milk");
        assert!(!todo.finished);
        assert_eq!(todo.finished_at, None);
        assert!(todo.is_owned_by(&owner));
        assert!(!todo.is_owned_by(&user("user02")));
    }

    #[test]
    fn test_new_todo_rejects_blank_body() {
        assert_eq!(
            Todo::new(user("user01"), "").unwrap_err(),
            DomainError::EmptyBody
        );
        assert_eq!(
            Todo::new(user("user01"), " \t\n").unwrap_err(),
            DomainError::EmptyBody
        );
    }

    #[test]
    fn test_set_finished_round_trip_clears_finished_at() {
        let mut todo = Todo::new(user("user01"), "task").unwrap();

        todo.set_finished(true);
        assert!(todo.finished);
        assert!(todo.finished_at.is_some());

        todo.set_finished(false);
        assert!(!todo.finished);
        assert_eq!(todo.finished_at, None);
    }

    #[test]
    fn test_json_uses_camel_case_and_null_finished_at() {
        let todo = Todo::new(user("user01"), "何かする").unwrap();

        let json = serde_json::to_value(&todo).unwrap();

        assert_eq!(json["id"], todo.id.as_str());
        assert_eq!(json["userId"], "user01");
        assert_eq!(json["body"], "何かする");
        assert_eq!(json["finished"], false);
        assert!(json["createdAt"].is_string());
        assert!(json["finishedAt"].is_null());

        let back: Todo = serde_json::from_value(json).unwrap();
        assert_eq!(back, todo);
    }

    // プロパティベーステスト: 任意の切り替え列の後も finished と finished_at が一致する
    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn finished_at_is_some_iff_finished(toggles in proptest::collection::vec(any::<bool>(), 0..32)) {
                let mut todo = Todo::new(user("user01"), "task").unwrap();
                for finished in &toggles {
                    todo.set_finished(*finished);
                    prop_assert_eq!(todo.finished, *finished);
                    prop_assert_eq!(todo.finished_at.is_some(), todo.finished);
                }
            }
        }
    }
}
