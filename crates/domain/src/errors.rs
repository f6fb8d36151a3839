use thiserror::Error;

/// ドメイン層のバリデーションエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("Todo body must not be empty")]
    EmptyBody,

    #[error("Invalid TodoId: {0}")]
    InvalidTodoId(String),

    #[error("Invalid UserId: {0}")]
    InvalidUserId(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TodoError {
    /// 存在しない、または他ユーザーの Todo（区別しない）
    #[error("no such todo: id={0}")]
    NotFound(String),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}
