//! 個人用 Todo の HTTP API（axum）
//!
//! `/todos` 以下の CRUD と `/health` を提供します。
//! 同じルートを `/api` 配下にもマウントします。

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use infrastructure::{
    DynamoDbClient, DynamoDbTodoRepository, InMemoryTodoRepository, TodoRepository,
};
use serde::Serialize;
use shared::{AuthMode, Config, StorageBackend};
use std::{sync::Arc, time::Instant};

pub mod auth;
pub mod error;
pub mod handlers;
pub mod params;

use auth::{ApiGatewayAuthenticator, AuthResolver, JwtAuthenticator};

/// アプリケーションの共有状態（リクエスト間で共有するのはこの 2 つだけ）
#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<dyn TodoRepository>,
    pub auth: Arc<dyn AuthResolver>,
}

impl AppState {
    pub fn new(repository: Arc<dyn TodoRepository>, auth: Arc<dyn AuthResolver>) -> Self {
        Self { repository, auth }
    }

    /// 設定に従ってリポジトリと認証方式を組み立てます。
    pub async fn from_config(config: &Config) -> Self {
        let repository: Arc<dyn TodoRepository> = match config.storage_backend {
            StorageBackend::DynamoDb => {
                let db = DynamoDbClient::new(config).await;
                Arc::new(DynamoDbTodoRepository::new(db))
            }
            StorageBackend::Memory => Arc::new(InMemoryTodoRepository::new()),
        };

        let auth: Arc<dyn AuthResolver> = match &config.auth_mode {
            AuthMode::Jwt { secret } => Arc::new(JwtAuthenticator::new(secret.clone())),
            AuthMode::ApiGateway => Arc::new(ApiGatewayAuthenticator),
        };

        tracing::info!(
            storage = ?config.storage_backend,
            auth = ?config.auth_mode,
            table = %config.dynamodb_table,
            "application state ready"
        );

        Self::new(repository, auth)
    }
}

/// ルータを構築して返します。
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(todo_routes())
        .nest("/api", todo_routes())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

fn todo_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/todos",
            get(handlers::list_todos).post(handlers::create_todo),
        )
        .route(
            "/todos/:id",
            put(handlers::update_todo).delete(handlers::delete_todo),
        )
}

async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    tracing::info!(%method, %path, "Incoming request");
    let response = next.run(req).await;
    tracing::info!(
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Request finished"
    );

    response
}

#[derive(Debug, Serialize)]
struct HealthBody {
    /// サービスの簡易ステータス
    status: &'static str,
}

/// ヘルスチェック用ハンドラ（認証不要）
async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthBody { status: "ok" }))
}
