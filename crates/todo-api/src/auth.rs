//! リクエストから認証済みユーザーを解決する
//!
//! トークンやセッションの詳細は外部の IdP に任せ、ここでは
//! 「ユーザー ID が得られたかどうか」だけを判断します。

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use domain::UserId;
use lambda_http::request::RequestContext;

use crate::error::ApiError;
use crate::AppState;

/// 認証済みユーザー ID の解決
pub trait AuthResolver: Send + Sync {
    /// 認証されていなければ `None`
    fn resolve(&self, parts: &Parts) -> Option<UserId>;
}

/// `Authorization: Bearer <JWT>` を HS256 で検証し、`sub` をユーザー ID とする
pub struct JwtAuthenticator {
    secret: String,
}

impl JwtAuthenticator {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl AuthResolver for JwtAuthenticator {
    fn resolve(&self, parts: &Parts) -> Option<UserId> {
        let header = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
        // スキーム名は大文字小文字を区別しない（RFC 7235）
        let (scheme, token) = header.trim_start().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        let token = token.trim();

        match shared::decode_claims(token, &self.secret) {
            Ok(claims) => UserId::new(claims.sub).ok(),
            Err(e) => {
                tracing::debug!(error = %e, "Rejected bearer token");
                None
            }
        }
    }
}

/// API Gateway (HTTP API) の JWT オーソライザーが検証済みのクレームから `sub` を取り出す
///
/// `lambda_http` がリクエストの extensions に入れる `RequestContext` を参照するため、
/// Lambda 以外で動かした場合は常に未認証になります。
#[derive(Default)]
pub struct ApiGatewayAuthenticator;

impl AuthResolver for ApiGatewayAuthenticator {
    fn resolve(&self, parts: &Parts) -> Option<UserId> {
        let Some(RequestContext::ApiGatewayV2(ctx)) = parts.extensions.get::<RequestContext>()
        else {
            return None;
        };
        let jwt = ctx.authorizer.as_ref()?.jwt.as_ref()?;
        let sub = jwt.claims.get("sub")?;
        UserId::new(sub.clone()).ok()
    }
}

/// ハンドラ引数で使う認証済みユーザー
///
/// 他の引数より先に評価されるよう、ハンドラでは `State` の直後に置く。
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserId);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        state
            .auth
            .resolve(parts)
            .map(CurrentUser)
            .ok_or(ApiError::Unauthorized)
    }
}
