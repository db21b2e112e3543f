//! Data access behind the [`Store`] trait.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::models::billing::PaymentFilter;
use crate::models::{
    Application, Contract, ContractStatus, GroupStudent, Payment, PaymentDraft, Session, Student,
    User,
};
use crate::record::{ListQuery, Record, Table};
use crate::Error;

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub type SharedStore = Arc<dyn Store>;

/// Identifies a group-student association for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    Relation(i32),
    Pair { group_id: i32, student_id: i32 },
}

/// Outcome of a successful application confirmation.
///
/// `contract` is `None` when the application had already produced a student
/// earlier (confirmed, moved back, confirmed again); the existing student is
/// returned and nothing new is created.
#[derive(Debug, Clone, PartialEq)]
pub struct Confirmation {
    pub application: Application,
    pub student: Student,
    pub contract: Option<Contract>,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> Result<(), Error>;

    async fn list_rows(&self, table: &'static Table, query: &ListQuery)
        -> Result<Vec<Value>, Error>;
    async fn rows_where(
        &self,
        table: &'static Table,
        column: &'static str,
        value: i32,
    ) -> Result<Vec<Value>, Error>;
    async fn find_row(&self, table: &'static Table, id: i32) -> Result<Option<Value>, Error>;
    async fn insert_row(&self, table: &'static Table, fields: Value) -> Result<Value, Error>;
    async fn update_row(
        &self,
        table: &'static Table,
        id: i32,
        fields: Value,
    ) -> Result<Option<Value>, Error>;
    async fn delete_row(&self, table: &'static Table, id: i32) -> Result<bool, Error>;
    async fn count_rows(&self, table: &'static Table, status: Option<&str>) -> Result<i64, Error>;
    async fn search_rows(
        &self,
        table: &'static Table,
        needle: &str,
        limit: i64,
    ) -> Result<Vec<Value>, Error>;

    /// Atomically turns a non-active application into a student plus
    /// contract. `None` when the application is missing or already active.
    async fn confirm_application(
        &self,
        id: i32,
        custom_id: String,
    ) -> Result<Option<Confirmation>, Error>;
    async fn contracts(&self, student_id: Option<i32>) -> Result<Vec<Contract>, Error>;
    async fn set_contract_status(
        &self,
        id: &str,
        status: ContractStatus,
    ) -> Result<Option<Contract>, Error>;
    async fn delete_contract(&self, id: &str) -> Result<bool, Error>;

    /// Idempotent: returns the existing relation when the pair is present.
    async fn join_group(&self, group_id: i32, student_id: i32) -> Result<GroupStudent, Error>;
    async fn leave_group(&self, membership: Membership) -> Result<bool, Error>;
    async fn group_members(&self, group_id: i32) -> Result<Vec<Student>, Error>;

    async fn payments(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, Error>;
    /// Appends a payment. A repeated `key` returns the row recorded first.
    async fn append_payment(
        &self,
        draft: &PaymentDraft,
        key: Option<Uuid>,
    ) -> Result<Payment, Error>;

    async fn find_user(&self, username: &str) -> Result<Option<User>, Error>;
    async fn user_by_id(&self, id: i32) -> Result<Option<User>, Error>;
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<User, Error>;
    async fn session_of(&self, user_id: i32) -> Result<Option<Session>, Error>;
    async fn find_session(&self, ssid: &str) -> Result<Option<Session>, Error>;
    async fn open_session(&self, session: &Session) -> Result<(), Error>;
    async fn drop_session(&self, ssid: &str) -> Result<bool, Error>;
}

pub fn decode<T: DeserializeOwned>(row: Value) -> Result<T, Error> {
    serde_json::from_value(row).map_err(Error::from)
}

fn decode_all<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, Error> {
    rows.into_iter().map(decode).collect()
}

/// Typed access to the generic row operations.
impl<'s> dyn Store + 's {
    pub async fn list<R: Record>(&self, query: &ListQuery) -> Result<Vec<R>, Error> {
        decode_all(self.list_rows(R::TABLE, query).await?)
    }

    pub async fn related<R: Record>(
        &self,
        column: &'static str,
        value: i32,
    ) -> Result<Vec<R>, Error> {
        decode_all(self.rows_where(R::TABLE, column, value).await?)
    }

    pub async fn get<R: Record>(&self, id: i32) -> Result<Option<R>, Error> {
        self.find_row(R::TABLE, id).await?.map(decode).transpose()
    }

    /// Like [`get`](Self::get) but a missing row is a `NotFound` error.
    pub async fn fetch<R: Record>(&self, id: i32) -> Result<R, Error> {
        self.get::<R>(id)
            .await?
            .ok_or_else(|| Error::not_found(R::TABLE.label, id))
    }

    pub async fn insert<R: Record>(&self, fields: Value) -> Result<R, Error> {
        decode(self.insert_row(R::TABLE, fields).await?)
    }

    pub async fn update<R: Record>(&self, id: i32, fields: Value) -> Result<R, Error> {
        match self.update_row(R::TABLE, id, fields).await? {
            Some(row) => decode(row),
            None => Err(Error::not_found(R::TABLE.label, id)),
        }
    }

    pub async fn delete<R: Record>(&self, id: i32) -> Result<(), Error> {
        if self.delete_row(R::TABLE, id).await? {
            Ok(())
        } else {
            Err(Error::not_found(R::TABLE.label, id))
        }
    }

    pub async fn payment(&self, id: i32) -> Result<Payment, Error> {
        match self.find_row(Payment::TABLE, id).await? {
            Some(row) => decode(row),
            None => Err(Error::not_found(Payment::TABLE.label, id)),
        }
    }

    pub async fn search<R: Record>(&self, needle: &str, limit: i64) -> Result<Vec<R>, Error> {
        decode_all(self.search_rows(R::TABLE, needle, limit).await?)
    }
}
