use axum::extract::{FromRequest, RequestParts};
use axum::headers::authorization::Bearer;
use axum::headers::Authorization;
use axum::{Extension, TypedHeader};
use chrono::{DateTime, Duration, Utc};
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::Pbkdf2;
use rand::{thread_rng, Rng};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::ops::Add;

use crate::config::Config;
use crate::models::{Session, User};
use crate::routes::Body;
use crate::store::{SharedStore, Store};
use crate::{breaks, proceeds, Error, Payload};

pub const ADMIN_ROLE: &str = "admin";

pub fn hash_password(password: &str) -> Result<String, Error> {
    Ok(Pbkdf2
        .hash_password(password.as_bytes(), &SaltString::generate(&mut OsRng))?
        .to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, Error> {
    let hash = PasswordHash::new(password_hash)?;
    Ok(Pbkdf2.verify_password(password.as_bytes(), &hash).is_ok())
}

fn new_ssid() -> String {
    let ssid_bytes: [u8; 32] = thread_rng().gen();

    let mut hasher: Sha256 = Digest::new();
    hasher.update(ssid_bytes);
    hex::encode(hasher.finalize())
}

/// Creates the configured staff account unless it already exists.
pub async fn seed_admin(store: &dyn Store, config: &Config) -> Result<(), Error> {
    if store.find_user(&config.admin_username).await?.is_some() {
        return Ok(());
    }
    let password_hash = hash_password(&config.admin_password)?;
    let user = store
        .create_user(&config.admin_username, &password_hash, ADMIN_ROLE)
        .await?;
    log::info!("Created staff account `{}` (id {})", user.username, user.id);
    Ok(())
}

/// An authenticated staff member, resolved from an `Authorization: Bearer`
/// header. Expired sessions are dropped on sight.
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub session: Session,
    pub user: User,
}

#[axum::async_trait]
impl<B: Send> FromRequest<B> for AdminSession {
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request(req)
                .await
                .map_err(|_| Error::unauthorized("Missing bearer token"))?;
        let Extension(store) = Extension::<SharedStore>::from_request(req)
            .await
            .map_err(|e| Error::InternalError {
                kind: "Unknown",
                message: e.to_string(),
            })?;

        let ssid = bearer.token();
        if ssid.is_empty() {
            return Err(Error::unauthorized("Missing bearer token"));
        }
        let session = match store.find_session(ssid).await? {
            Some(session) => session,
            None => return Err(Error::unauthorized("Invalid session")),
        };
        if session.expired() {
            store.drop_session(ssid).await?;
            return Err(Error::unauthorized("Session expired"));
        }
        match store.user_by_id(session.belongs_to).await? {
            Some(user) => Ok(AdminSession { session, user }),
            None => {
                store.drop_session(ssid).await?;
                Err(Error::unauthorized("Invalid session"))
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Login {
    username: String,
    password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggedIn {
    pub token: String,
    pub user_id: i32,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoggedOut {
    pub user_id: i32,
    pub drop_success: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Me {
    pub id: i32,
    pub username: String,
    pub role: String,
    pub expires_at: DateTime<Utc>,
}

pub async fn login(
    Extension(store): Extension<SharedStore>,
    Body(login): Body<Login>,
) -> Payload<LoggedIn> {
    if login.password.is_empty() {
        return breaks(Error::invalid("`password` parameter was empty"));
    }

    let user = match store.find_user(&login.username).await? {
        Some(user) => user,
        None => return breaks(Error::unauthorized("Invalid username or password")),
    };
    if !verify_password(&login.password, &user.password_hash)? {
        log::warn!("Failed login attempt for `{}`", user.username);
        return breaks(Error::unauthorized("Invalid username or password"));
    }

    if let Some(existing) = store.session_of(user.id).await? {
        if !existing.expired() {
            // already authenticated
            return proceeds(LoggedIn {
                token: existing.ssid,
                user_id: existing.belongs_to,
                expires_at: existing.expires_at,
            });
        }
        store.drop_session(&existing.ssid).await?;
    }

    let session = Session {
        ssid: new_ssid(),
        belongs_to: user.id,
        expires_at: Utc::now().add(Duration::days(2)),
    };
    store.open_session(&session).await?;
    log::info!("User `{}` logged in", user.username);

    proceeds(LoggedIn {
        token: session.ssid,
        user_id: user.id,
        expires_at: session.expires_at,
    })
}

pub async fn logout(
    admin: AdminSession,
    Extension(store): Extension<SharedStore>,
) -> Payload<LoggedOut> {
    let drop_success = store.drop_session(&admin.session.ssid).await?;
    proceeds(LoggedOut {
        user_id: admin.user.id,
        drop_success,
    })
}

pub async fn me(admin: AdminSession) -> Payload<Me> {
    proceeds(Me {
        id: admin.user.id,
        username: admin.user.username,
        role: admin.user.role,
        expires_at: admin.session.expires_at,
    })
}
