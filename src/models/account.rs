use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    pub ssid: String,
    pub belongs_to: i32,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}
