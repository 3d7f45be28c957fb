use std::env;

use crate::auth::{Operator, Role};
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    /// Reject status transitions outside the forward delivery chain
    /// (pickup -> transit -> delivered, plus failure/return) instead of
    /// accepting any target status.
    pub strict_transitions: bool,
    pub api_tokens: Vec<(String, Operator)>,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            strict_transitions: parse_or_default("STRICT_TRANSITIONS", false)?,
            api_tokens: parse_api_tokens(&env::var("API_TOKENS").unwrap_or_default())?,
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

/// `API_TOKENS` holds comma-separated `token=name:role` triples, e.g.
/// `s3cret=maria:admin,hunter2=tom:staff`.
fn parse_api_tokens(raw: &str) -> Result<Vec<(String, Operator)>, AppError> {
    let mut tokens = Vec::new();

    for entry in raw.split(',').filter(|e| !e.trim().is_empty()) {
        let (token, operator) = entry
            .split_once('=')
            .ok_or_else(|| AppError::Internal(format!("invalid API_TOKENS entry: {entry}")))?;
        let (name, role) = operator
            .split_once(':')
            .ok_or_else(|| AppError::Internal(format!("invalid API_TOKENS entry: {entry}")))?;

        let role = match role.trim() {
            "admin" => Role::Admin,
            "staff" => Role::Staff,
            other => {
                return Err(AppError::Internal(format!(
                    "invalid API_TOKENS role: {other}"
                )));
            }
        };

        tokens.push((
            token.trim().to_string(),
            Operator {
                name: name.trim().to_string(),
                role,
            },
        ));
    }

    Ok(tokens)
}
