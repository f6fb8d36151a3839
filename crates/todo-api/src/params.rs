//! 名前付きリクエストパラメータ
//!
//! クエリ文字列と、フォーム (`application/x-www-form-urlencoded`) または
//! JSON オブジェクトのボディを名前で引けるようにまとめます。
//! 同じ名前が複数あればクエリ文字列、ボディの順で最初のものを使います。

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Query, Request},
    http::{header::CONTENT_TYPE, Method},
    Form,
};
use serde_json::Value;

use crate::error::ApiError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn required(&self, name: &str) -> Result<&str, ApiError> {
        self.get(name)
            .ok_or_else(|| ApiError::BadRequest(format!("missing parameter: {name}")))
    }

    /// `true` / `false`（大文字小文字は問わない）以外は BadRequest。既定値は使わない
    pub fn required_bool(&self, name: &str) -> Result<bool, ApiError> {
        parse_bool(name, self.required(name)?)
    }
}

impl<K, V> FromIterator<(K, V)> for Params
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

pub fn parse_bool(name: &str, value: &str) -> Result<bool, ApiError> {
    if value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(ApiError::BadRequest(format!(
            "parameter {name} must be true or false: {value}"
        )))
    }
}

#[async_trait]
impl<S> FromRequest<S> for Params
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Query(mut pairs) = Query::<Vec<(String, String)>>::try_from_uri(req.uri())
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;

        if req.method() == Method::GET || req.method() == Method::HEAD {
            return Ok(Self(pairs));
        }

        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(body) = Form::<Vec<(String, String)>>::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            pairs.extend(body);
        } else if content_type.starts_with("application/json") {
            let bytes = Bytes::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            if !bytes.is_empty() {
                pairs.extend(json_pairs(&bytes)?);
            }
        }

        Ok(Self(pairs))
    }
}

/// JSON オブジェクトのスカラー値を文字列として取り出す（null・配列・オブジェクトは無視）
fn json_pairs(bytes: &[u8]) -> Result<Vec<(String, String)>, ApiError> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON: {e}")))?;
    let Value::Object(map) = value else {
        return Err(ApiError::BadRequest(
            "JSON body must be an object".to_string(),
        ));
    };

    Ok(map
        .into_iter()
        .filter_map(|(k, v)| match v {
            Value::String(s) => Some((k, s)),
            Value::Bool(b) => Some((k, b.to_string())),
            Value::Number(n) => Some((k, n.to_string())),
            _ => None,
        })
        .collect())
}
