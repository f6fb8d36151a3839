use crate::models::{item_to_todo, todo_to_item, DynamoDbKeys};
use crate::repositories::{RepositoryError, TodoRepository};
use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use domain::{Todo, TodoId, UserId};
use shared::Config;
use std::collections::HashMap;

#[derive(Clone)]
pub struct DynamoDbClient {
    client: Client,
    table_name: String,
    owner_index: String,
}

impl DynamoDbClient {
    pub async fn new(config: &Config) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        // DynamoDB Local など
        if let Some(endpoint) = &config.dynamodb_endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let aws_config = loader.load().await;

        Self {
            client: Client::new(&aws_config),
            table_name: config.dynamodb_table.clone(),
            owner_index: config.dynamodb_owner_index.clone(),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn owner_index(&self) -> &str {
        &self.owner_index
    }
}

fn sdk_error<E>(e: E) -> RepositoryError
where
    E: std::error::Error,
{
    let message = DisplayErrorContext(&e).to_string();
    // エラーレベルのログは呼び出し側（HTTP 層）で 1 回だけ出す
    tracing::debug!(error = %message, "DynamoDB request failed");
    RepositoryError::DynamoDb(message)
}

/// Todo を DynamoDB に保存するリポジトリ
pub struct DynamoDbTodoRepository {
    db: DynamoDbClient,
}

impl DynamoDbTodoRepository {
    pub fn new(db: DynamoDbClient) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TodoRepository for DynamoDbTodoRepository {
    async fn save(&self, todo: &Todo) -> Result<TodoId, RepositoryError> {
        self.db
            .client()
            .put_item()
            .table_name(self.db.table_name())
            .set_item(Some(todo_to_item(todo)))
            .send()
            .await
            .map_err(sdk_error)?;

        tracing::debug!(todo_id = %todo.id, "Todo saved");
        Ok(todo.id.clone())
    }

    async fn update(&self, todo: &Todo) -> Result<(), RepositoryError> {
        let result = self
            .db
            .client()
            .put_item()
            .table_name(self.db.table_name())
            .set_item(Some(todo_to_item(todo)))
            // 読み取り後に削除されたものを復活させない
            .condition_expression("attribute_exists(PK)")
            .send()
            .await;

        match result {
            Ok(_) => {
                tracing::debug!(todo_id = %todo.id, "Todo updated");
                Ok(())
            }
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception()) =>
            {
                Err(RepositoryError::NotFound(todo.id.clone()))
            }
            Err(e) => Err(sdk_error(e)),
        }
    }

    async fn get_by_id(&self, id: &TodoId) -> Result<Option<Todo>, RepositoryError> {
        let output = self
            .db
            .client()
            .get_item()
            .table_name(self.db.table_name())
            .key("PK", AttributeValue::S(DynamoDbKeys::todo_pk(id)))
            .key("SK", AttributeValue::S(DynamoDbKeys::TODO_SK.to_string()))
            .consistent_read(true)
            .send()
            .await
            .map_err(sdk_error)?;

        output.item().map(item_to_todo).transpose()
    }

    async fn query_by_owner_and_finished(
        &self,
        user_id: &UserId,
        finished: bool,
    ) -> Result<Vec<Todo>, RepositoryError> {
        let mut todos = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;

        // 1 ページ 1MB の上限があるため LastEvaluatedKey がなくなるまで読む
        loop {
            let output = self
                .db
                .client()
                .query()
                .table_name(self.db.table_name())
                .index_name(self.db.owner_index())
                .key_condition_expression("GSI1PK = :pk")
                .filter_expression("#finished = :finished")
                .expression_attribute_names("#finished", "finished")
                .expression_attribute_values(
                    ":pk",
                    AttributeValue::S(DynamoDbKeys::owner_pk(user_id)),
                )
                .expression_attribute_values(":finished", AttributeValue::Bool(finished))
                .scan_index_forward(false)
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(sdk_error)?;

            for item in output.items() {
                todos.push(item_to_todo(item)?);
            }

            match output.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        Ok(todos)
    }

    async fn delete(&self, id: &TodoId) -> Result<(), RepositoryError> {
        self.db
            .client()
            .delete_item()
            .table_name(self.db.table_name())
            .key("PK", AttributeValue::S(DynamoDbKeys::todo_pk(id)))
            .key("SK", AttributeValue::S(DynamoDbKeys::TODO_SK.to_string()))
            .send()
            .await
            .map_err(sdk_error)?;

        tracing::debug!(todo_id = %id, "Todo deleted");
        Ok(())
    }
}
