//! Account sessions and role claims for the admin surface.
//!
//! Secrets are stored as Argon2id PHC strings; verification goes through the
//! hasher's own constant-time check.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::db::DocumentStore;
use crate::errors::AppError;
use crate::models::Document;

/// Header carrying the session token when no bearer token is sent.
pub const SESSION_HEADER: &str = "x-session-token";

/// Reserved collection holding account records, keyed by lowercase email.
pub const ACCOUNTS_COLLECTION: &str = "_accounts";

const MIN_SECRET_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Administrator,
    Editor,
    Viewer,
}

impl Role {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "administrator" | "admin" => Some(Role::Administrator),
            "editor" => Some(Role::Editor),
            "viewer" => Some(Role::Viewer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Administrator => "administrator",
            Role::Editor => "editor",
            Role::Viewer => "viewer",
        }
    }

    pub fn can_edit_content(&self) -> bool {
        matches!(self, Role::Administrator | Role::Editor)
    }

    pub fn can_manage_accounts(&self) -> bool {
        matches!(self, Role::Administrator)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub email: String,
    pub role: Role,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub email: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SignedIn(Session),
    SignedOut(Session),
    Expired(Session),
}

impl SessionEvent {
    pub fn session(&self) -> &Session {
        match self {
            SessionEvent::SignedIn(session)
            | SessionEvent::SignedOut(session)
            | SessionEvent::Expired(session) => session,
        }
    }
}

/// Issues and validates sessions against accounts in the document store.
pub struct AuthService {
    store: Arc<dyn DocumentStore>,
    sessions: RwLock<HashMap<String, Session>>,
    events: broadcast::Sender<SessionEvent>,
    ttl: chrono::Duration,
}

impl AuthService {
    pub fn new(store: Arc<dyn DocumentStore>, ttl: std::time::Duration) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            store,
            sessions: RwLock::new(HashMap::new()),
            events,
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(12)),
        }
    }

    /// Session lifecycle events, in the order they happen.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    pub async fn create_account(
        &self,
        email: &str,
        secret: &str,
        role: Role,
    ) -> Result<Account, AppError> {
        let email = normalize_email(email)?;
        if secret.len() < MIN_SECRET_LEN {
            return Err(AppError::Validation(format!(
                "Secret must be at least {} characters",
                MIN_SECRET_LEN
            )));
        }
        if self.store.get_doc(ACCOUNTS_COLLECTION, &email).await?.is_some() {
            return Err(AppError::Conflict(format!("Account {} already exists", email)));
        }

        let secret_hash = hash_secret(secret)?;
        let account = Account {
            email: email.clone(),
            role,
            created_at: Utc::now().to_rfc3339(),
        };
        let record = json!({
            "email": account.email,
            "role": role.as_str(),
            "secretHash": secret_hash,
            "createdAt": account.created_at,
        });
        if let Value::Object(record) = record {
            self.store
                .set_doc(ACCOUNTS_COLLECTION, &email, &record, false)
                .await?;
        }

        tracing::info!("Created {} account {}", role.as_str(), email);
        Ok(account)
    }

    /// Create the account unless one already exists for the email.
    /// Returns whether a new account was written.
    pub async fn ensure_account(
        &self,
        email: &str,
        secret: &str,
        role: Role,
    ) -> Result<bool, AppError> {
        let key = normalize_email(email)?;
        if self.store.get_doc(ACCOUNTS_COLLECTION, &key).await?.is_some() {
            return Ok(false);
        }
        self.create_account(email, secret, role).await?;
        Ok(true)
    }

    pub async fn list_accounts(&self) -> Result<Vec<Account>, AppError> {
        let mut accounts: Vec<Account> = self
            .store
            .get_all_docs(ACCOUNTS_COLLECTION)
            .await?
            .iter()
            .filter_map(account_from_record)
            .collect();
        accounts.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(accounts)
    }

    pub async fn sign_in(&self, email: &str, secret: &str) -> Result<Session, AppError> {
        let invalid = || AppError::Unauthorized("Invalid email or secret".to_string());

        let email = normalize_email(email).map_err(|_| invalid())?;
        let record = self
            .store
            .get_doc(ACCOUNTS_COLLECTION, &email)
            .await?
            .ok_or_else(invalid)?;

        let stored = record
            .get("secretHash")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if !verify_secret(secret, stored) {
            tracing::warn!("Rejected sign-in for {}", email);
            return Err(invalid());
        }

        let role = record
            .get("role")
            .and_then(Value::as_str)
            .and_then(Role::from_str)
            .ok_or_else(|| AppError::Internal(format!("Account {} has no valid role", email)))?;

        self.purge_expired().await;

        let session = Session {
            token: Uuid::new_v4().to_string(),
            email: email.clone(),
            role,
            expires_at: Utc::now() + self.ttl,
        };
        self.sessions
            .write()
            .await
            .insert(session.token.clone(), session.clone());

        tracing::info!("{} signed in as {}", email, role.as_str());
        self.emit(SessionEvent::SignedIn(session.clone()));
        Ok(session)
    }

    /// Drop every expired session, announcing each one. Returns how many went.
    pub async fn purge_expired(&self) -> usize {
        let expired: Vec<Session> = {
            let mut sessions = self.sessions.write().await;
            let tokens: Vec<String> = sessions
                .iter()
                .filter(|(_, session)| session.is_expired())
                .map(|(token, _)| token.clone())
                .collect();
            tokens
                .iter()
                .filter_map(|token| sessions.remove(token))
                .collect()
        };

        let count = expired.len();
        for session in expired {
            tracing::debug!("Session for {} expired", session.email);
            self.emit(SessionEvent::Expired(session));
        }
        count
    }

    /// Returns false when the token was not signed in.
    pub async fn sign_out(&self, token: &str) -> bool {
        let removed = self.sessions.write().await.remove(token);
        match removed {
            Some(session) => {
                self.emit(SessionEvent::SignedOut(session));
                true
            }
            None => false,
        }
    }

    /// The live session for a token. Expired sessions are dropped on lookup.
    pub async fn session(&self, token: &str) -> Option<Session> {
        let session = self.sessions.read().await.get(token).cloned()?;
        if !session.is_expired() {
            return Some(session);
        }

        if self.sessions.write().await.remove(token).is_some() {
            tracing::debug!("Session for {} expired", session.email);
            self.emit(SessionEvent::Expired(session));
        }
        None
    }
}

fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_ascii_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(AppError::Validation(format!("Invalid email address: {}", email))),
    }
}

/// Argon2id PHC string for a secret, salted from a fresh v4 uuid.
fn hash_secret(secret: &str) -> Result<String, AppError> {
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
        .map_err(|e| AppError::Internal(format!("Failed to salt secret: {}", e)))?;
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash secret: {}", e)))
}

/// A malformed stored hash never verifies.
fn verify_secret(secret: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(hash) => Argon2::default()
            .verify_password(secret.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}

fn account_from_record(record: &Document) -> Option<Account> {
    Some(Account {
        email: record.get("email")?.as_str()?.to_string(),
        role: Role::from_str(record.get("role")?.as_str()?)?,
        created_at: record
            .get("createdAt")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}

/// Session token from `Authorization: Bearer` or the session header.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .or_else(|| headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

async fn authorize(
    auth: &AuthService,
    mut request: Request,
    next: Next,
    allowed: fn(&Role) -> bool,
) -> Response {
    let Some(token) = token_from_headers(request.headers()) else {
        return AppError::Unauthorized("Missing session token".to_string()).into_response();
    };

    let Some(session) = auth.session(&token).await else {
        return AppError::Unauthorized("Invalid or expired session".to_string()).into_response();
    };

    if !allowed(&session.role) {
        return AppError::Forbidden(format!(
            "Role {} may not perform this action",
            session.role.as_str()
        ))
        .into_response();
    }

    request.extensions_mut().insert(session);
    next.run(request).await
}

/// Admits sessions whose role may edit site content.
pub async fn require_editor(
    State(auth): State<Arc<AuthService>>,
    request: Request,
    next: Next,
) -> Response {
    authorize(&auth, request, next, Role::can_edit_content).await
}

/// Admits administrator sessions only.
pub async fn require_admin(
    State(auth): State<Arc<AuthService>>,
    request: Request,
    next: Next,
) -> Response {
    authorize(&auth, request, next, Role::can_manage_accounts).await
}
