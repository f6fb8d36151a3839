use crate::repositories::RepositoryError;
use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, SecondsFormat, Utc};
use domain::{Todo, TodoId, UserId};
use std::collections::HashMap;

/// DynamoDB Single Table Design のキー構造
///
/// 本体は `PK = TODO#<id>` / `SK = TODO` で ID 直引き、
/// 所有者ごとの一覧は GSI1（`GSI1PK = USER#<userId>`、`GSI1SK = <createdAt>#<id>`）で引く。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamoDbKeys {
    pub pk: String,
    pub sk: String,
    pub gsi1_pk: String,
    pub gsi1_sk: String,
}

impl DynamoDbKeys {
    pub fn for_todo(todo: &Todo) -> Self {
        Self {
            pk: Self::todo_pk(&todo.id),
            sk: Self::TODO_SK.to_string(),
            gsi1_pk: Self::owner_pk(&todo.user_id),
            // 同時刻は採番順（単調増加の ULID）。降順クエリで後から作成したものが先に来る
            gsi1_sk: format!("{}#{}", format_timestamp(&todo.created_at), todo.id),
        }
    }

    pub const TODO_SK: &'static str = "TODO";

    pub fn todo_pk(id: &TodoId) -> String {
        format!("TODO#{id}")
    }

    pub fn owner_pk(user_id: &UserId) -> String {
        format!("USER#{user_id}")
    }
}

/// 文字列比較で時系列順になるよう、ミリ秒固定・UTC `Z` 表記で書き出す
pub fn format_timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn todo_to_item(todo: &Todo) -> HashMap<String, AttributeValue> {
    let keys = DynamoDbKeys::for_todo(todo);
    let mut item = HashMap::from([
        ("PK".to_string(), AttributeValue::S(keys.pk)),
        ("SK".to_string(), AttributeValue::S(keys.sk)),
        ("GSI1PK".to_string(), AttributeValue::S(keys.gsi1_pk)),
        ("GSI1SK".to_string(), AttributeValue::S(keys.gsi1_sk)),
        ("id".to_string(), AttributeValue::S(todo.id.to_string())),
        ("user_id".to_string(), AttributeValue::S(todo.user_id.to_string())),
        ("body".to_string(), AttributeValue::S(todo.body.clone())),
        ("finished".to_string(), AttributeValue::Bool(todo.finished)),
        (
            "created_at".to_string(),
            AttributeValue::S(format_timestamp(&todo.created_at)),
        ),
    ]);
    if let Some(finished_at) = &todo.finished_at {
        item.insert(
            "finished_at".to_string(),
            AttributeValue::S(format_timestamp(finished_at)),
        );
    }
    item
}

pub fn item_to_todo(item: &HashMap<String, AttributeValue>) -> Result<Todo, RepositoryError> {
    let id = TodoId::parse(get_s(item, "id")?)
        .map_err(|e| RepositoryError::CorruptItem(e.to_string()))?;
    let user_id = UserId::new(get_s(item, "user_id")?)
        .map_err(|e| RepositoryError::CorruptItem(e.to_string()))?;
    let finished = *item
        .get("finished")
        .and_then(|v| v.as_bool().ok())
        .ok_or_else(|| RepositoryError::CorruptItem("missing attribute: finished".to_string()))?;
    let finished_at = match item.get("finished_at") {
        Some(AttributeValue::S(s)) => Some(parse_timestamp("finished_at", s)?),
        Some(AttributeValue::Null(_)) | None => None,
        Some(_) => {
            return Err(RepositoryError::CorruptItem(
                "unexpected type for finished_at".to_string(),
            ))
        }
    };

    Ok(Todo {
        id,
        user_id,
        body: get_s(item, "body")?.to_string(),
        finished,
        created_at: parse_timestamp("created_at", get_s(item, "created_at")?)?,
        finished_at,
    })
}

fn get_s<'a>(
    item: &'a HashMap<String, AttributeValue>,
    name: &str,
) -> Result<&'a str, RepositoryError> {
    item.get(name)
        .and_then(|v| v.as_s().ok())
        .map(String::as_str)
        .ok_or_else(|| RepositoryError::CorruptItem(format!("missing attribute: {name}")))
}

fn parse_timestamp(name: &str, s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| RepositoryError::CorruptItem(format!("{name}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(finished: bool) -> Todo {
        let mut todo = Todo::new(UserId::new("user01").unwrap(), "buy milk").unwrap();
        todo.set_finished(finished);
        todo
    }

    #[test]
    fn test_keys_for_todo() {
        let todo = sample(false);

        let keys = DynamoDbKeys::for_todo(&todo);

        assert_eq!(keys.pk, format!("TODO#{}", todo.id));
        assert_eq!(keys.sk, "TODO");
        assert_eq!(keys.gsi1_pk, "USER#user01");
        assert!(keys.gsi1_sk.ends_with(&format!("#{}", todo.id)));
        assert!(keys.gsi1_sk.starts_with(&format_timestamp(&todo.created_at)));
    }

    #[test]
    fn test_gsi1_sk_follows_creation_order_within_same_created_at() {
        for _ in 0..2000 {
            let first = sample(false);
            let mut second = sample(false);
            second.created_at = first.created_at;

            let first_sk = DynamoDbKeys::for_todo(&first).gsi1_sk;
            let second_sk = DynamoDbKeys::for_todo(&second).gsi1_sk;

            assert!(first_sk < second_sk, "{first_sk} !< {second_sk}");
        }
    }

    #[test]
    fn test_unfinished_item_has_no_finished_at() {
        let todo = sample(false);

        let item = todo_to_item(&todo);

        assert!(!item.contains_key("finished_at"));
        assert_eq!(item.get("finished"), Some(&AttributeValue::Bool(false)));
        assert_eq!(item_to_todo(&item).unwrap(), todo);
    }

    #[test]
    fn test_finished_item_keeps_finished_at() {
        let todo = sample(true);

        let restored = item_to_todo(&todo_to_item(&todo)).unwrap();

        assert!(restored.finished);
        assert_eq!(restored.finished_at, todo.finished_at);
    }

    #[test]
    fn test_timestamps_sort_lexicographically() {
        let earlier = DateTime::parse_from_rfc3339("2024-01-01T09:00:00.5+09:00")
            .unwrap()
            .with_timezone(&Utc);
        let later = DateTime::parse_from_rfc3339("2024-01-01T00:00:01Z")
            .unwrap()
            .with_timezone(&Utc);

        assert_eq!(format_timestamp(&earlier), "2024-01-01T00:00:00.500Z");
        assert!(format_timestamp(&earlier) < format_timestamp(&later));
    }

    #[test]
    fn test_missing_attribute_is_corrupt() {
        let mut item = todo_to_item(&sample(false));
        item.remove("body");

        let err = item_to_todo(&item).unwrap_err();

        assert!(matches!(err, RepositoryError::CorruptItem(msg) if msg.contains("body")));
    }
}
