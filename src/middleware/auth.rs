use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Roles allowed to manage templates, distributions and responses.
const STAFF_ROLES: [&str; 2] = ["counselor", "admin"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub role: Option<String>,
}

#[derive(Clone)]
pub struct AuthKeys {
    decoding: Arc<DecodingKey>,
}

impl AuthKeys {
    pub fn from_secret(secret: &str) -> Self {
        Self {
            decoding: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
        }
    }

    fn verify(&self, token: &str) -> Option<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .ok()
    }
}

fn reject(status: StatusCode, error: &str) -> Response {
    (status, Json(json!({ "error": error, "code": error }))).into_response()
}

fn bearer_token(req: &Request) -> std::result::Result<&str, Response> {
    let Some(auth_header) = req.headers().get(axum::http::header::AUTHORIZATION) else {
        return Err(reject(StatusCode::UNAUTHORIZED, "missing_authorization"));
    };
    let Ok(auth_str) = auth_header.to_str() else {
        return Err(reject(StatusCode::UNAUTHORIZED, "bad_authorization"));
    };
    auth_str
        .strip_prefix("Bearer ")
        .ok_or_else(|| reject(StatusCode::UNAUTHORIZED, "unsupported_scheme"))
}

pub async fn require_counselor(
    State(keys): State<AuthKeys>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = match bearer_token(&req) {
        Ok(token) => token,
        Err(rejection) => return rejection,
    };
    let Some(claims) = keys.verify(token) else {
        return reject(StatusCode::UNAUTHORIZED, "invalid_token");
    };

    let role = claims.role.clone().unwrap_or_default();
    if !STAFF_ROLES.iter().any(|r| r.eq_ignore_ascii_case(&role)) {
        tracing::warn!(subject = %claims.sub, role = %role, "rejected non-staff token");
        return reject(StatusCode::FORBIDDEN, "forbidden");
    }
    req.extensions_mut().insert(claims);
    next.run(req).await
}
