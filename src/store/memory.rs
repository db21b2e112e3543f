//! In-process [`Store`] used by tests. One lock guards every table.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::enrollment::{self, CONTRACT_URL};
use crate::models::billing::PaymentFilter;
use crate::models::{
    Application, Contract, ContractStatus, Course, GroupStudent, Payment, PaymentDraft,
    ReviewStatus, Session, Student, User,
};
use crate::record::{fields, ListQuery, Record, Table};
use crate::store::{decode, Confirmation, Membership, Store};
use crate::Error;

#[derive(Default)]
struct Tables {
    rows: HashMap<&'static str, Vec<Value>>,
    ids: HashMap<&'static str, i32>,
    contracts: Vec<Contract>,
    users: Vec<User>,
    sessions: Vec<Session>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

fn id_of(row: &Value) -> Option<i64> {
    row.get("id").and_then(Value::as_i64)
}

fn column_default(table: &str, column: &str) -> Option<Value> {
    match (table, column) {
        ("applications" | "vacancy_applications", "status") => Some(json!("pending")),
        ("payments", "status") => Some(json!("paid")),
        ("blogs", "status") => Some(json!("draft")),
        (_, "status") => Some(json!("active")),
        ("students", "joined_date") => Some(json!(Utc::now().naive_utc().date())),
        (_, "tags" | "requirements" | "certificates") => Some(json!([])),
        _ => None,
    }
}

fn unique_keys(table: &str) -> &'static [&'static [&'static str]] {
    match table {
        "students" => &[&["application_id"]],
        "group_students" => &[&["group_id", "student_id"]],
        "enrollments" => &[&["student_id", "course_id"]],
        "payments" => &[&["idempotency_key"]],
        _ => &[],
    }
}

fn text_matches(row: &Value, columns: &[&str], needle: &str) -> bool {
    columns.iter().any(|column| {
        row.get(*column)
            .and_then(Value::as_str)
            .map_or(false, |text| text.to_lowercase().contains(needle))
    })
}

impl Tables {
    fn rows(&self, table: &Table) -> &[Value] {
        self.rows.get(table.name).map(Vec::as_slice).unwrap_or(&[])
    }

    fn find(&self, table: &Table, id: i32) -> Option<Value> {
        self.rows(table)
            .iter()
            .find(|row| id_of(row) == Some(id as i64))
            .cloned()
    }

    fn conflicts(&self, table: &Table, row: &Map<String, Value>, own_id: Option<i64>) -> bool {
        unique_keys(table.name).iter().any(|key| {
            if key.iter().any(|column| row.get(*column).map_or(true, Value::is_null)) {
                return false;
            }
            self.rows(table).iter().any(|other| {
                id_of(other) != own_id && key.iter().all(|column| other.get(*column) == row.get(*column))
            })
        })
    }

    fn insert(&mut self, table: &'static Table, fields: &Value) -> Result<Value, Error> {
        let mut row = Map::new();
        for column in table.columns {
            let value = fields
                .get(*column)
                .cloned()
                .or_else(|| column_default(table.name, column))
                .unwrap_or(Value::Null);
            row.insert(column.to_string(), value);
        }
        if self.conflicts(table, &row, None) {
            return Err(Error::invalid(format!(
                "Record already exists in `{}`",
                table.name
            )));
        }
        let id = self.ids.entry(table.name).or_insert(0);
        *id += 1;
        let now = json!(Utc::now());
        row.insert("id".to_string(), json!(*id));
        row.insert("created_at".to_string(), now.clone());
        row.insert("updated_at".to_string(), now);
        let row = Value::Object(row);
        self.rows.entry(table.name).or_default().push(row.clone());
        Ok(row)
    }

    fn update(&mut self, table: &'static Table, id: i32, fields: &Value) -> Result<Option<Value>, Error> {
        let current = match self.find(table, id) {
            Some(Value::Object(current)) => current,
            _ => return Ok(None),
        };
        let mut row = current;
        for column in table.columns {
            if let Some(value) = fields.get(*column) {
                row.insert(column.to_string(), value.clone());
            }
        }
        if self.conflicts(table, &row, Some(id as i64)) {
            return Err(Error::invalid(format!(
                "Record already exists in `{}`",
                table.name
            )));
        }
        row.insert("updated_at".to_string(), json!(Utc::now()));
        let row = Value::Object(row);
        if let Some(slot) = self
            .rows
            .get_mut(table.name)
            .and_then(|rows| rows.iter_mut().find(|other| id_of(other) == Some(id as i64)))
        {
            *slot = row.clone();
        }
        Ok(Some(row))
    }

    fn delete(&mut self, table: &Table, keep: impl Fn(&Value) -> bool) -> bool {
        match self.rows.get_mut(table.name) {
            Some(rows) => {
                let before = rows.len();
                rows.retain(keep);
                rows.len() < before
            }
            None => false,
        }
    }

    fn add_contract(&mut self, contract: Contract) -> Result<(), Error> {
        if self.contracts.iter().any(|other| other.id == contract.id) {
            return Err(Error::invalid(format!(
                "Record already exists: contract `{}`",
                contract.id
            )));
        }
        self.contracts.push(contract);
        Ok(())
    }

    fn matching(&self, table: &Table, column: &str, value: i32) -> Vec<Value> {
        self.rows(table)
            .iter()
            .filter(|row| row.get(column).and_then(Value::as_i64) == Some(value as i64))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), Error> {
        Ok(())
    }

    async fn list_rows(&self, table: &'static Table, query: &ListQuery) -> Result<Vec<Value>, Error> {
        let tables = self.tables.lock().await;
        let status = query.status.as_deref().filter(|_| table.has_status);
        let mut rows: Vec<Value> = tables
            .rows(table)
            .iter()
            .filter(|row| status.map_or(true, |status| row.get("status") == Some(&json!(status))))
            .cloned()
            .collect();
        if table.newest_first {
            rows.reverse();
        }
        let skip = query.skip.max(0) as usize;
        let limit = query.limit.map_or(usize::MAX, |limit| limit.max(0) as usize);
        Ok(rows.into_iter().skip(skip).take(limit).collect())
    }

    async fn rows_where(
        &self,
        table: &'static Table,
        column: &'static str,
        value: i32,
    ) -> Result<Vec<Value>, Error> {
        Ok(self.tables.lock().await.matching(table, column, value))
    }

    async fn find_row(&self, table: &'static Table, id: i32) -> Result<Option<Value>, Error> {
        Ok(self.tables.lock().await.find(table, id))
    }

    async fn insert_row(&self, table: &'static Table, fields: Value) -> Result<Value, Error> {
        self.tables.lock().await.insert(table, &fields)
    }

    async fn update_row(
        &self,
        table: &'static Table,
        id: i32,
        fields: Value,
    ) -> Result<Option<Value>, Error> {
        self.tables.lock().await.update(table, id, &fields)
    }

    async fn delete_row(&self, table: &'static Table, id: i32) -> Result<bool, Error> {
        Ok(self
            .tables
            .lock()
            .await
            .delete(table, |row| id_of(row) != Some(id as i64)))
    }

    async fn count_rows(&self, table: &'static Table, status: Option<&str>) -> Result<i64, Error> {
        let tables = self.tables.lock().await;
        let status = status.filter(|_| table.has_status);
        Ok(tables
            .rows(table)
            .iter()
            .filter(|row| status.map_or(true, |status| row.get("status") == Some(&json!(status))))
            .count() as i64)
    }

    async fn search_rows(
        &self,
        table: &'static Table,
        needle: &str,
        limit: i64,
    ) -> Result<Vec<Value>, Error> {
        let needle = needle.to_lowercase();
        Ok(self
            .tables
            .lock()
            .await
            .rows(table)
            .iter()
            .filter(|row| text_matches(row, table.search, &needle))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn confirm_application(
        &self,
        id: i32,
        custom_id: String,
    ) -> Result<Option<Confirmation>, Error> {
        let mut tables = self.tables.lock().await;
        let application: Application = match tables.find(Application::TABLE, id) {
            Some(row) => decode(row)?,
            None => return Ok(None),
        };
        if application.status == ReviewStatus::Active {
            return Ok(None);
        }
        let course: Option<Course> = application
            .course_id
            .and_then(|course_id| tables.find(Course::TABLE, course_id))
            .map(decode)
            .transpose()?;

        let now = Utc::now();
        let existing = tables
            .matching(Student::TABLE, "application_id", id)
            .into_iter()
            .next();
        let (student, contract) = match existing {
            Some(row) => (decode::<Student>(row)?, None),
            None => {
                let new_student =
                    enrollment::student_from(&application, custom_id, now.naive_utc().date());
                let student: Student =
                    decode(tables.insert(Student::TABLE, &fields(&new_student)?)?)?;
                let mut contract = enrollment::contract_for(&student, course.as_ref(), now);
                while tables.contracts.iter().any(|other| other.id == contract.id) {
                    contract.bump_id();
                }
                tables.add_contract(contract.clone())?;
                (student, Some(contract))
            }
        };

        let contract_url = application
            .contract_url
            .clone()
            .unwrap_or_else(|| CONTRACT_URL.to_string());
        let row = tables.update(
            Application::TABLE,
            id,
            &json!({"status": "active", "contract_url": contract_url}),
        )?;
        let application = match row {
            Some(row) => decode(row)?,
            None => return Err(Error::not_found(Application::TABLE.label, id)),
        };
        Ok(Some(Confirmation {
            application,
            student,
            contract,
        }))
    }

    async fn contracts(&self, student_id: Option<i32>) -> Result<Vec<Contract>, Error> {
        let tables = self.tables.lock().await;
        Ok(tables
            .contracts
            .iter()
            .rev()
            .filter(|contract| student_id.map_or(true, |id| contract.student_id == id))
            .cloned()
            .collect())
    }

    async fn set_contract_status(
        &self,
        id: &str,
        status: ContractStatus,
    ) -> Result<Option<Contract>, Error> {
        let mut tables = self.tables.lock().await;
        Ok(tables
            .contracts
            .iter_mut()
            .find(|contract| contract.id == id)
            .map(|contract| {
                contract.status = status;
                contract.clone()
            }))
    }

    async fn delete_contract(&self, id: &str) -> Result<bool, Error> {
        let mut tables = self.tables.lock().await;
        let before = tables.contracts.len();
        tables.contracts.retain(|contract| contract.id != id);
        Ok(tables.contracts.len() < before)
    }

    async fn join_group(&self, group_id: i32, student_id: i32) -> Result<GroupStudent, Error> {
        let mut tables = self.tables.lock().await;
        let existing = tables
            .matching(GroupStudent::TABLE, "group_id", group_id)
            .into_iter()
            .find(|row| row.get("student_id").and_then(Value::as_i64) == Some(student_id as i64));
        let row = match existing {
            Some(row) => row,
            None => tables.insert(
                GroupStudent::TABLE,
                &json!({"group_id": group_id, "student_id": student_id}),
            )?,
        };
        decode(row)
    }

    async fn leave_group(&self, membership: Membership) -> Result<bool, Error> {
        let mut tables = self.tables.lock().await;
        Ok(match membership {
            Membership::Relation(id) => {
                tables.delete(GroupStudent::TABLE, |row| id_of(row) != Some(id as i64))
            }
            Membership::Pair {
                group_id,
                student_id,
            } => tables.delete(GroupStudent::TABLE, |row| {
                row.get("group_id").and_then(Value::as_i64) != Some(group_id as i64)
                    || row.get("student_id").and_then(Value::as_i64) != Some(student_id as i64)
            }),
        })
    }

    async fn group_members(&self, group_id: i32) -> Result<Vec<Student>, Error> {
        let tables = self.tables.lock().await;
        let relations = tables.matching(GroupStudent::TABLE, "group_id", group_id);
        let members = relations
            .iter()
            .filter_map(|relation| relation.get("student_id").and_then(Value::as_i64))
            .filter_map(|student_id| tables.find(Student::TABLE, student_id as i32))
            .map(decode)
            .collect();
        members
    }

    async fn payments(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, Error> {
        let tables = self.tables.lock().await;
        let mut payments = Vec::new();
        for row in tables.rows(Payment::TABLE).iter().rev() {
            let payment: Payment = decode(row.clone())?;
            if filter.matches(&payment) {
                payments.push(payment);
            }
        }
        Ok(payments)
    }

    async fn append_payment(
        &self,
        draft: &PaymentDraft,
        key: Option<Uuid>,
    ) -> Result<Payment, Error> {
        let mut tables = self.tables.lock().await;
        if let Some(key) = key {
            let replay = tables
                .rows(Payment::TABLE)
                .iter()
                .find(|row| row.get("idempotency_key") == Some(&json!(key)))
                .cloned();
            if let Some(row) = replay {
                return decode(row);
            }
        }
        let mut row = fields(draft)?;
        row["idempotency_key"] = json!(key);
        decode(tables.insert(Payment::TABLE, &row)?)
    }

    async fn find_user(&self, username: &str) -> Result<Option<User>, Error> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|user| user.username == username).cloned())
    }

    async fn user_by_id(&self, id: i32) -> Result<Option<User>, Error> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|user| user.id == id).cloned())
    }

    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<User, Error> {
        let mut tables = self.tables.lock().await;
        if tables.users.iter().any(|user| user.username == username) {
            return Err(Error::invalid("Record already exists in `users`"));
        }
        let user = User {
            id: tables.users.len() as i32 + 1,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            role: role.to_string(),
            created_at: Utc::now(),
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn session_of(&self, user_id: i32) -> Result<Option<Session>, Error> {
        let tables = self.tables.lock().await;
        Ok(tables
            .sessions
            .iter()
            .find(|session| session.belongs_to == user_id)
            .cloned())
    }

    async fn find_session(&self, ssid: &str) -> Result<Option<Session>, Error> {
        let tables = self.tables.lock().await;
        Ok(tables
            .sessions
            .iter()
            .find(|session| session.ssid == ssid)
            .cloned())
    }

    async fn open_session(&self, session: &Session) -> Result<(), Error> {
        self.tables.lock().await.sessions.push(session.clone());
        Ok(())
    }

    async fn drop_session(&self, ssid: &str) -> Result<bool, Error> {
        let mut tables = self.tables.lock().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|session| session.ssid != ssid);
        Ok(tables.sessions.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::models::{Group, StudentStatus};
    use crate::store::SharedStore;

    async fn seeded() -> SharedStore {
        let store: SharedStore = Arc::new(MemoryStore::default());
        store
            .insert_row(
                Course::TABLE,
                json!({"name": "Ingliz tili", "price": 450000, "duration": "6 oy", "audience": "7-11"}),
            )
            .await
            .unwrap();
        store
            .insert_row(
                Application::TABLE,
                json!({
                    "full_name": "Aziz Karimov",
                    "phone": "+998901112233",
                    "address": "Toshkent",
                    "school": "12-maktab",
                    "grade": "9",
                    "course_id": 1,
                    "course_name": "Ingliz tili"
                }),
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn inserted_rows_pick_up_column_defaults() {
        let store = seeded().await;
        let application = store.fetch::<Application>(1).await.unwrap();
        assert_eq!(application.status, ReviewStatus::Pending);
        assert_eq!(application.contract_url, None);
    }

    #[tokio::test]
    async fn second_confirmation_is_a_no_op() {
        let store = seeded().await;
        let first = store.confirm_application(1, "FL1000".to_string()).await.unwrap();
        let first = first.expect("first confirmation creates a student");
        assert_eq!(first.student.status, StudentStatus::Active);
        assert_eq!(first.contract.as_ref().map(|c| c.amount), Some(450000));
        assert!(store
            .confirm_application(1, "FL2000".to_string())
            .await
            .unwrap()
            .is_none());
        assert_eq!(store.count_rows(Student::TABLE, None).await.unwrap(), 1);
        assert_eq!(store.contracts(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_confirmations_create_one_student() {
        let store = seeded().await;
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .confirm_application(1, format!("FL{}", 1000 + n))
                        .await
                })
            })
            .collect();
        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().is_some() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(store.count_rows(Student::TABLE, None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn reconfirming_reuses_the_linked_student() {
        let store = seeded().await;
        let first = store
            .confirm_application(1, "FL1000".to_string())
            .await
            .unwrap()
            .unwrap();
        store
            .update_row(Application::TABLE, 1, json!({"status": "pending"}))
            .await
            .unwrap();
        let again = store
            .confirm_application(1, "FL2000".to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(again.student.id, first.student.id);
        assert!(again.contract.is_none());
        assert_eq!(store.count_rows(Student::TABLE, None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn back_to_back_confirmations_get_distinct_contract_ids() {
        let store = seeded().await;
        for n in 0..4 {
            store
                .insert_row(
                    Application::TABLE,
                    json!({
                        "full_name": format!("Talaba {}", n),
                        "phone": "+998901112233",
                        "address": "Toshkent",
                        "school": "12-maktab",
                        "grade": "9",
                        "course_id": 1,
                        "course_name": "Ingliz tili"
                    }),
                )
                .await
                .unwrap();
        }
        for id in 1..=5 {
            let confirmed = store
                .confirm_application(id, format!("FL{}", 1000 + id))
                .await
                .unwrap()
                .unwrap();
            assert!(confirmed.contract.is_some());
        }
        let contracts = store.contracts(None).await.unwrap();
        assert_eq!(contracts.len(), 5);
        let mut ids: Vec<&str> = contracts.iter().map(|contract| contract.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn duplicate_contract_ids_are_refused() {
        let mut tables = Tables::default();
        let contract = Contract {
            id: "CON-1760000000123".to_string(),
            student_id: 1,
            student_name: "Aziz Karimov".to_string(),
            course_name: "Ingliz tili".to_string(),
            amount: 450000,
            status: ContractStatus::Active,
            file_url: CONTRACT_URL.to_string(),
            created_at: Utc::now(),
        };
        tables.add_contract(contract.clone()).unwrap();
        assert!(matches!(
            tables.add_contract(contract),
            Err(Error::ValidationFailure { .. })
        ));
        assert_eq!(tables.contracts.len(), 1);
    }

    #[tokio::test]
    async fn joining_twice_keeps_one_relation() {
        let store = seeded().await;
        store
            .insert_row(
                Group::TABLE,
                json!({"name": "IELTS-1", "course_id": 1, "teacher_id": 1}),
            )
            .await
            .unwrap();
        let first = store.join_group(1, 5).await.unwrap();
        let second = store.join_group(1, 5).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.count_rows(GroupStudent::TABLE, None).await.unwrap(), 1);
        assert!(store
            .leave_group(Membership::Pair {
                group_id: 1,
                student_id: 5
            })
            .await
            .unwrap());
        assert!(!store.leave_group(Membership::Relation(first.id)).await.unwrap());
    }
}
