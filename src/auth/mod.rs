//! Bearer-token authentication for the dispatch API.
//!
//! Tokens are seeded from `API_TOKENS` at startup and resolved once per
//! request to an operator identity and role. Handlers opt in by taking
//! [`AuthOperator`] as an extractor parameter.

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
        }
    }
}

/// A known API caller: a storefront admin or dispatch staff member.
#[derive(Debug, Clone)]
pub struct Operator {
    pub name: String,
    pub role: Role,
}

/// The authenticated caller of the current request.
#[derive(Debug, Clone)]
pub struct AuthOperator(pub Operator);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthOperator {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("missing authorization header".to_string()))?;

        let token = header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Unauthorized("expected authorization: Bearer <token>".to_string())
        })?;

        let operator = state
            .operators
            .get(token)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::Unauthorized("unknown api token".to_string()))?;

        Ok(AuthOperator(operator))
    }
}
