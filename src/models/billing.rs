use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::month::BillingMonth;
use crate::record::Table;
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Paid,
    Pending,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "paid",
            PaymentStatus::Pending => "pending",
        }
    }
}

/// One monetary event. Rows are append-only; balances are always derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: i32,
    pub student_id: i32,
    pub course_id: i32,
    pub amount: i64,
    pub month: BillingMonth,
    pub status: PaymentStatus,
    pub note: Option<String>,
    pub idempotency_key: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentDraft {
    pub student_id: i32,
    pub course_id: i32,
    pub amount: i64,
    pub month: BillingMonth,
    #[serde(default)]
    pub status: PaymentStatus,
    pub note: Option<String>,
}

impl Payment {
    pub const TABLE: &'static Table = &Table {
        name: "payments",
        label: "Payment",
        columns: &[
            "student_id",
            "course_id",
            "amount",
            "month",
            "status",
            "note",
            "idempotency_key",
        ],
        search: &[],
        has_status: true,
        newest_first: true,
    };
}

impl PaymentDraft {
    /// Largest single payment accepted, in so'm.
    pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

    pub fn check(&self) -> Result<(), Error> {
        if self.amount <= 0 {
            return Err(Error::invalid("`amount` must be positive"));
        }
        if self.amount > Self::MAX_AMOUNT {
            return Err(Error::invalid(format!(
                "`amount` must not exceed {}",
                Self::MAX_AMOUNT
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    pub student_id: Option<i32>,
    pub course_id: Option<i32>,
    pub month: Option<BillingMonth>,
    pub status: Option<PaymentStatus>,
}

impl PaymentFilter {
    pub fn matches(&self, payment: &Payment) -> bool {
        self.student_id.map_or(true, |id| payment.student_id == id)
            && self.course_id.map_or(true, |id| payment.course_id == id)
            && self.month.map_or(true, |month| payment.month == month)
            && self.status.map_or(true, |status| payment.status == status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractStatus {
    #[default]
    Active,
    Cancelled,
}

impl ContractStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::Active => "active",
            ContractStatus::Cancelled => "cancelled",
        }
    }
}

/// Paper trail emitted alongside a confirmed student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub id: String,
    pub student_id: i32,
    pub student_name: String,
    pub course_name: String,
    pub amount: i64,
    pub status: ContractStatus,
    pub file_url: String,
    pub created_at: DateTime<Utc>,
}

impl Contract {
    pub fn id_at(now: DateTime<Utc>) -> String {
        Self::id_for(now.timestamp_millis())
    }

    pub fn id_for(millis: i64) -> String {
        format!("CON-{}", millis)
    }

    /// Moves the id to the next millisecond, used when `id` is taken.
    pub fn bump_id(&mut self) {
        let millis = self
            .id
            .strip_prefix("CON-")
            .and_then(|millis| millis.parse::<i64>().ok())
            .unwrap_or_else(|| self.created_at.timestamp_millis());
        self.id = Self::id_for(millis.saturating_add(1));
    }
}
