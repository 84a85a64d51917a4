//! Credential resolution and the speculative login-pattern table.
//!
//! The vendor login API is undocumented; the request shapes and the token /
//! user-id response keys below are the ones observed to work. The pattern
//! list is data so that a fourth shape is a one-line change.

use std::fmt;
use std::sync::{Arc, Mutex};

use dialoguer::{Input, Password};
use serde_json::{Map, Value};

use crate::config::Settings;
use crate::utils::error::{ApiError, Result};

#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    /// Resolve email/password from the environment, prompting interactively
    /// for whichever half is missing. A cancelled prompt maps to the
    /// interrupted exit code.
    pub fn resolve(settings: &Settings) -> Result<Self> {
        let email = match &settings.email {
            Some(email) => email.clone(),
            None => Input::<String>::new()
                .with_prompt("Email")
                .interact_text()
                .map_err(|_| ApiError::Interrupted)?,
        };
        let password = match &settings.password {
            Some(password) => password.clone(),
            None => Password::new()
                .with_prompt("Password")
                .interact()
                .map_err(|_| ApiError::Interrupted)?,
        };

        let email = email.trim().to_string();
        if email.is_empty() || password.is_empty() {
            return Err(ApiError::Config("email and password are required".into()));
        }
        Ok(Self { email, password })
    }
}

/// Shared secret scrubber for debug output. Cloning shares the secret list,
/// so a token learned after login is redacted everywhere immediately.
#[derive(Clone, Default)]
pub struct Redactor {
    secrets: Arc<Mutex<Vec<String>>>,
}

impl Redactor {
    pub fn add_secret(&self, secret: &str) {
        if secret.is_empty() {
            return;
        }
        let mut secrets = self.secrets.lock().expect("redactor poisoned");
        if !secrets.iter().any(|s| s == secret) {
            secrets.push(secret.to_string());
        }
    }

    pub fn redact(&self, text: &str) -> String {
        let secrets = self.secrets.lock().expect("redactor poisoned");
        let mut out = text.to_string();
        for secret in secrets.iter() {
            out = out.replace(secret, "[REDACTED]");
        }
        out
    }
}

impl fmt::Debug for Redactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.secrets.lock().map(|s| s.len()).unwrap_or(0);
        write!(f, "Redactor({count} secrets)")
    }
}

/// How a login request body field is filled.
#[derive(Debug, Clone, Copy)]
pub enum CredentialField {
    Email,
    Password,
    Literal(&'static str),
}

/// One guessed login request shape.
#[derive(Debug, Clone, Copy)]
pub struct LoginPattern {
    pub endpoint: &'static str,
    pub fields: &'static [(&'static str, CredentialField)],
}

impl LoginPattern {
    pub fn body(&self, credentials: &Credentials) -> Value {
        let mut body = Map::new();
        for (name, field) in self.fields {
            let value = match field {
                CredentialField::Email => credentials.email.clone(),
                CredentialField::Password => credentials.password.clone(),
                CredentialField::Literal(literal) => literal.to_string(),
            };
            body.insert(name.to_string(), Value::String(value));
        }
        Value::Object(body)
    }
}

/// Login shapes tried in order against the vendor API.
pub const LOGIN_PATTERNS: &[LoginPattern] = &[
    LoginPattern {
        endpoint: "/auth/token",
        fields: &[
            ("platform_email", CredentialField::Email),
            ("platform_token", CredentialField::Password),
            ("grant_type", CredentialField::Literal("tractive")),
        ],
    },
    LoginPattern {
        endpoint: "/login",
        fields: &[
            ("email", CredentialField::Email),
            ("password", CredentialField::Password),
        ],
    },
    LoginPattern {
        endpoint: "/auth/login",
        fields: &[
            ("username", CredentialField::Email),
            ("password", CredentialField::Password),
        ],
    },
];

/// Candidate response keys for the access token.
pub const TOKEN_KEYS: &[&str] = &["access_token", "token", "auth_token", "jwt"];

/// Candidate response keys for the user id, plus the nested `user.id` shape.
pub const USER_ID_KEYS: &[&str] = &["user_id", "userId", "id"];

pub fn extract_token(data: &Value) -> Option<String> {
    TOKEN_KEYS
        .iter()
        .find_map(|key| data.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

pub fn extract_user_id(data: &Value) -> Option<String> {
    for key in USER_ID_KEYS {
        if let Some(id) = data.get(*key).and_then(value_as_id) {
            return Some(id);
        }
    }
    data.get("user")
        .and_then(|user| user.get("id"))
        .and_then(value_as_id)
}

fn value_as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
