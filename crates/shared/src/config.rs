use std::env;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Missing required variable: {0}")]
    Missing(&'static str),
}

/// Todo の保存先
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    DynamoDb,
    /// プロセス内メモリ（ローカル開発用、再起動で消える）
    Memory,
}

/// リクエストの認証方式
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// `Authorization: Bearer` の HS256 トークンを自前で検証
    Jwt { secret: String },
    /// API Gateway の JWT オーソライザーが検証済みのクレームを使う
    ApiGateway,
}

// シークレットをログに出さない
impl std::fmt::Debug for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMode::Jwt { .. } => f.write_str("Jwt"),
            AuthMode::ApiGateway => f.write_str("ApiGateway"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub dynamodb_table: String,
    pub dynamodb_owner_index: String,
    pub dynamodb_endpoint: Option<String>,
    pub storage_backend: StorageBackend,
    pub auth_mode: AuthMode,
    pub log_format: LogFormat,
    pub port: u16,
    pub environment: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// 任意の変数ソースから読み込みます（テストではプロセス環境を汚さないためにこちらを使う）
    pub fn from_vars<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let storage_backend = match get("STORAGE_BACKEND").as_deref() {
            None | Some("dynamodb") => StorageBackend::DynamoDb,
            Some("memory") => StorageBackend::Memory,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "STORAGE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let auth_mode = match get("AUTH_MODE").as_deref() {
            None | Some("jwt") => {
                let secret = get("JWT_SECRET")
                    .filter(|s| !s.is_empty())
                    .ok_or(ConfigError::Missing("JWT_SECRET"))?;
                AuthMode::Jwt { secret }
            }
            Some("api-gateway") => AuthMode::ApiGateway,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "AUTH_MODE",
                    value: other.to_string(),
                })
            }
        };

        // Lambda 上では CloudWatch 向けに JSON を既定にする
        let log_format = match get("LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            Some("pretty") => LogFormat::Pretty,
            None if get("AWS_LAMBDA_FUNCTION_NAME").is_some() => LogFormat::Json,
            None => LogFormat::Pretty,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "LOG_FORMAT",
                    value: other.to_string(),
                })
            }
        };

        let port = match get("PORT") {
            Some(p) => p.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PORT",
                value: p.clone(),
            })?,
            None => 3000,
        };

        Ok(Config {
            dynamodb_table: get("DYNAMODB_TABLE")
                .unwrap_or_else(|| "personal-todo-dev".to_string()),
            dynamodb_owner_index: get("DYNAMODB_OWNER_INDEX").unwrap_or_else(|| "GSI1".to_string()),
            dynamodb_endpoint: get("DYNAMODB_ENDPOINT"),
            storage_backend,
            auth_mode,
            log_format,
            port,
            environment: get("ENVIRONMENT").unwrap_or_else(|| "dev".to_string()),
        })
    }
}
