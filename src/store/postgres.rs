//! PostgreSQL [`Store`]. Only column names from a [`Table`] are spliced into SQL.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::config::Config;
use crate::enrollment::{self, CONTRACT_URL};
use crate::models::billing::PaymentFilter;
use crate::models::{
    Application, Contract, ContractStatus, Course, GroupStudent, Payment, PaymentDraft,
    ReviewStatus, Session, Student, User,
};
use crate::record::{fields, ListQuery, Record, Table};
use crate::store::{decode, Confirmation, Membership, Store};
use crate::Error;

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &Config) -> Result<Self, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Writable columns of `table` that are present in `fields`.
fn present<'a>(table: &'a Table, fields: &Value) -> Vec<&'a str> {
    table
        .columns
        .iter()
        .copied()
        .filter(|column| fields.get(column).is_some())
        .collect()
}

fn quoted(columns: &[&str], prefix: &str) -> String {
    columns
        .iter()
        .map(|column| format!(r#"{}"{}""#, prefix, column))
        .collect::<Vec<_>>()
        .join(", ")
}

fn status_clause(table: &Table) -> &'static str {
    if table.has_status {
        r#"($1::text IS NULL OR r."status" = $1)"#
    } else {
        "$1::text IS NULL OR TRUE"
    }
}

fn ordering(table: &Table) -> &'static str {
    if table.newest_first {
        r#"r."created_at" DESC, r."id" DESC"#
    } else {
        r#"r."id""#
    }
}

/// Escapes `%`, `_` and `\` so user input matches literally under `ILIKE`.
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

async fn insert_json<'e, E>(executor: E, table: &Table, fields: Value) -> Result<Value, Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let columns = present(table, &fields);
    let sql = if columns.is_empty() {
        format!(
            r#"WITH added AS (INSERT INTO "{}" DEFAULT VALUES RETURNING *) SELECT to_jsonb(added) FROM added"#,
            table.name
        )
    } else {
        format!(
            r#"WITH added AS (INSERT INTO "{table}" ({cols}) SELECT {values} FROM jsonb_populate_record(NULL::"{table}", $1) AS p RETURNING *) SELECT to_jsonb(added) FROM added"#,
            table = table.name,
            cols = quoted(&columns, ""),
            values = quoted(&columns, "p."),
        )
    };
    let row = sqlx::query_scalar::<_, Value>(&sql)
        .bind(fields)
        .fetch_one(executor)
        .await?;
    Ok(row)
}

async fn find_json<'e, E>(executor: E, table: &Table, id: i32) -> Result<Option<Value>, Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let sql = format!(
        r#"SELECT to_jsonb(r) FROM "{}" AS r WHERE r."id" = $1"#,
        table.name
    );
    let row = sqlx::query_scalar::<_, Value>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

/// Inserts `contract` unless its id is taken. Returns whether it was written.
async fn insert_contract<'e, E>(executor: E, contract: &Contract) -> Result<bool, Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let added = sqlx::query(
        r#"INSERT INTO "contracts" ("id", "student_id", "student_name", "course_name", "amount", "status", "file_url", "created_at") VALUES ($1, $2, $3, $4, $5, $6, $7, $8) ON CONFLICT ("id") DO NOTHING"#,
    )
    .bind(&contract.id)
    .bind(contract.student_id)
    .bind(&contract.student_name)
    .bind(&contract.course_name)
    .bind(contract.amount)
    .bind(contract.status.as_str())
    .bind(&contract.file_url)
    .bind(contract.created_at)
    .execute(executor)
    .await?;
    Ok(added.rows_affected() == 1)
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn list_rows(&self, table: &'static Table, query: &ListQuery) -> Result<Vec<Value>, Error> {
        let sql = format!(
            r#"SELECT to_jsonb(r) FROM "{}" AS r WHERE {} ORDER BY {} OFFSET $2 LIMIT $3"#,
            table.name,
            status_clause(table),
            ordering(table),
        );
        let status = query.status.as_deref().filter(|_| table.has_status);
        let rows = sqlx::query_scalar::<_, Value>(&sql)
            .bind(status)
            .bind(query.skip.max(0))
            .bind(query.limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn rows_where(
        &self,
        table: &'static Table,
        column: &'static str,
        value: i32,
    ) -> Result<Vec<Value>, Error> {
        let sql = format!(
            r#"SELECT to_jsonb(r) FROM "{}" AS r WHERE r."{}" = $1 ORDER BY r."id""#,
            table.name, column
        );
        let rows = sqlx::query_scalar::<_, Value>(&sql)
            .bind(value)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn find_row(&self, table: &'static Table, id: i32) -> Result<Option<Value>, Error> {
        find_json(&self.pool, table, id).await
    }

    async fn insert_row(&self, table: &'static Table, fields: Value) -> Result<Value, Error> {
        insert_json(&self.pool, table, fields).await
    }

    async fn update_row(
        &self,
        table: &'static Table,
        id: i32,
        fields: Value,
    ) -> Result<Option<Value>, Error> {
        let columns = present(table, &fields);
        let assignments = if columns.is_empty() {
            r#""updated_at" = now()"#.to_string()
        } else {
            format!(
                r#"({}) = (SELECT {} FROM jsonb_populate_record(r, $2) AS p), "updated_at" = now()"#,
                quoted(&columns, ""),
                quoted(&columns, "p."),
            )
        };
        let sql = format!(
            r#"WITH changed AS (UPDATE "{}" AS r SET {} WHERE r."id" = $1 RETURNING r.*) SELECT to_jsonb(changed) FROM changed"#,
            table.name, assignments
        );
        let row = sqlx::query_scalar::<_, Value>(&sql)
            .bind(id)
            .bind(fields)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn delete_row(&self, table: &'static Table, id: i32) -> Result<bool, Error> {
        let sql = format!(r#"DELETE FROM "{}" WHERE "id" = $1"#, table.name);
        let affected = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(affected.rows_affected() >= 1)
    }

    async fn count_rows(&self, table: &'static Table, status: Option<&str>) -> Result<i64, Error> {
        let sql = format!(
            r#"SELECT COUNT(*) FROM "{}" AS r WHERE {}"#,
            table.name,
            status_clause(table)
        );
        let status = status.filter(|_| table.has_status);
        let count = sqlx::query_scalar::<_, i64>(&sql)
            .bind(status)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn search_rows(
        &self,
        table: &'static Table,
        needle: &str,
        limit: i64,
    ) -> Result<Vec<Value>, Error> {
        if table.search.is_empty() {
            return Ok(Vec::new());
        }
        let matches = table
            .search
            .iter()
            .map(|column| format!(r#"r."{}" ILIKE $1"#, column))
            .collect::<Vec<_>>()
            .join(" OR ");
        let sql = format!(
            r#"SELECT to_jsonb(r) FROM "{}" AS r WHERE {} ORDER BY r."id" LIMIT $2"#,
            table.name, matches
        );
        let rows = sqlx::query_scalar::<_, Value>(&sql)
            .bind(like_pattern(needle))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn confirm_application(
        &self,
        id: i32,
        custom_id: String,
    ) -> Result<Option<Confirmation>, Error> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_scalar::<_, Value>(
            r#"SELECT to_jsonb(a) FROM "applications" AS a WHERE a."id" = $1 FOR UPDATE"#,
        )
        .bind(id)
        .fetch_optional(&mut tx)
        .await?;
        let application: Application = match row {
            Some(row) => decode(row)?,
            None => return Ok(None),
        };
        if application.status == ReviewStatus::Active {
            return Ok(None);
        }

        let course: Option<Course> = match application.course_id {
            Some(course_id) => find_json(&mut tx, Course::TABLE, course_id)
                .await?
                .map(decode)
                .transpose()?,
            None => None,
        };

        let existing = sqlx::query_scalar::<_, Value>(
            r#"SELECT to_jsonb(s) FROM "students" AS s WHERE s."application_id" = $1"#,
        )
        .bind(id)
        .fetch_optional(&mut tx)
        .await?;

        let now = Utc::now();
        let (student, contract) = match existing {
            Some(row) => (decode::<Student>(row)?, None),
            None => {
                let new_student =
                    enrollment::student_from(&application, custom_id, now.naive_utc().date());
                let student: Student =
                    decode(insert_json(&mut tx, Student::TABLE, fields(&new_student)?).await?)?;
                let mut contract = enrollment::contract_for(&student, course.as_ref(), now);
                // ids are per millisecond; move on until one is free
                while !insert_contract(&mut tx, &contract).await? {
                    contract.bump_id();
                }
                (student, Some(contract))
            }
        };

        let row = sqlx::query_scalar::<_, Value>(
            r#"WITH changed AS (UPDATE "applications" AS a SET "status" = 'active', "contract_url" = COALESCE(a."contract_url", $2), "updated_at" = now() WHERE a."id" = $1 RETURNING a.*) SELECT to_jsonb(changed) FROM changed"#,
        )
        .bind(id)
        .bind(CONTRACT_URL)
        .fetch_one(&mut tx)
        .await?;
        let application = decode(row)?;

        tx.commit().await?;
        Ok(Some(Confirmation {
            application,
            student,
            contract,
        }))
    }

    async fn contracts(&self, student_id: Option<i32>) -> Result<Vec<Contract>, Error> {
        let rows = sqlx::query_scalar::<_, Value>(
            r#"SELECT to_jsonb(c) FROM "contracts" AS c WHERE ($1::int4 IS NULL OR c."student_id" = $1) ORDER BY c."created_at" DESC"#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(decode).collect()
    }

    async fn set_contract_status(
        &self,
        id: &str,
        status: ContractStatus,
    ) -> Result<Option<Contract>, Error> {
        let row = sqlx::query_scalar::<_, Value>(
            r#"WITH changed AS (UPDATE "contracts" AS c SET "status" = $2 WHERE c."id" = $1 RETURNING c.*) SELECT to_jsonb(changed) FROM changed"#,
        )
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(decode).transpose()
    }

    async fn delete_contract(&self, id: &str) -> Result<bool, Error> {
        let affected = sqlx::query(r#"DELETE FROM "contracts" WHERE "id" = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(affected.rows_affected() >= 1)
    }

    async fn join_group(&self, group_id: i32, student_id: i32) -> Result<GroupStudent, Error> {
        let added = sqlx::query_scalar::<_, Value>(
            r#"WITH added AS (INSERT INTO "group_students" ("group_id", "student_id") VALUES ($1, $2) ON CONFLICT ("group_id", "student_id") DO NOTHING RETURNING *) SELECT to_jsonb(added) FROM added"#,
        )
        .bind(group_id)
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;
        if let Some(row) = added {
            return decode(row);
        }
        let existing = sqlx::query_scalar::<_, Value>(
            r#"SELECT to_jsonb(r) FROM "group_students" AS r WHERE r."group_id" = $1 AND r."student_id" = $2"#,
        )
        .bind(group_id)
        .bind(student_id)
        .fetch_one(&self.pool)
        .await?;
        decode(existing)
    }

    async fn leave_group(&self, membership: Membership) -> Result<bool, Error> {
        let affected = match membership {
            Membership::Relation(id) => {
                sqlx::query(r#"DELETE FROM "group_students" WHERE "id" = $1"#)
                    .bind(id)
                    .execute(&self.pool)
                    .await?
            }
            Membership::Pair {
                group_id,
                student_id,
            } => {
                sqlx::query(
                    r#"DELETE FROM "group_students" WHERE "group_id" = $1 AND "student_id" = $2"#,
                )
                .bind(group_id)
                .bind(student_id)
                .execute(&self.pool)
                .await?
            }
        };
        Ok(affected.rows_affected() >= 1)
    }

    async fn group_members(&self, group_id: i32) -> Result<Vec<Student>, Error> {
        let rows = sqlx::query_scalar::<_, Value>(
            r#"SELECT to_jsonb(s) FROM "students" AS s JOIN "group_students" AS gs ON gs."student_id" = s."id" WHERE gs."group_id" = $1 ORDER BY gs."id""#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(decode).collect()
    }

    async fn payments(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, Error> {
        let rows = sqlx::query_scalar::<_, Value>(
            r#"SELECT to_jsonb(r) FROM "payments" AS r
               WHERE ($1::int4 IS NULL OR r."student_id" = $1)
                 AND ($2::int4 IS NULL OR r."course_id" = $2)
                 AND ($3::text IS NULL OR r."month" = $3)
                 AND ($4::text IS NULL OR r."status" = $4)
               ORDER BY r."created_at" DESC, r."id" DESC"#,
        )
        .bind(filter.student_id)
        .bind(filter.course_id)
        .bind(filter.month.map(|month| month.to_string()))
        .bind(filter.status.map(|status| status.as_str()))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(decode).collect()
    }

    async fn append_payment(
        &self,
        draft: &PaymentDraft,
        key: Option<Uuid>,
    ) -> Result<Payment, Error> {
        let added = sqlx::query_scalar::<_, Value>(
            r#"WITH added AS (INSERT INTO "payments" ("student_id", "course_id", "amount", "month", "status", "note", "idempotency_key") VALUES ($1, $2, $3, $4, $5, $6, $7) ON CONFLICT ("idempotency_key") DO NOTHING RETURNING *) SELECT to_jsonb(added) FROM added"#,
        )
        .bind(draft.student_id)
        .bind(draft.course_id)
        .bind(draft.amount)
        .bind(draft.month.to_string())
        .bind(draft.status.as_str())
        .bind(&draft.note)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        if let Some(row) = added {
            return decode(row);
        }
        let key = key.ok_or_else(|| Error::InternalError {
            kind: "DatabaseError",
            message: "Payment was not recorded".to_string(),
        })?;
        log::info!("Replaying payment for idempotency key {}", key);
        let existing = sqlx::query_scalar::<_, Value>(
            r#"SELECT to_jsonb(r) FROM "payments" AS r WHERE r."idempotency_key" = $1"#,
        )
        .bind(key)
        .fetch_one(&self.pool)
        .await?;
        decode(existing)
    }

    async fn find_user(&self, username: &str) -> Result<Option<User>, Error> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1 LIMIT 1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn user_by_id(&self, id: i32) -> Result<Option<User>, Error> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 LIMIT 1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<User, Error> {
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (username, password_hash, role) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(username)
        .bind(password_hash)
        .bind(role)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn session_of(&self, user_id: i32) -> Result<Option<Session>, Error> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT * FROM user_sessions WHERE belongs_to = $1 LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn find_session(&self, ssid: &str) -> Result<Option<Session>, Error> {
        let session =
            sqlx::query_as::<_, Session>("SELECT * FROM user_sessions WHERE ssid = $1 LIMIT 1")
                .bind(ssid)
                .fetch_optional(&self.pool)
                .await?;
        Ok(session)
    }

    async fn open_session(&self, session: &Session) -> Result<(), Error> {
        let res = sqlx::query(
            "INSERT INTO user_sessions (ssid, belongs_to, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(&session.ssid)
        .bind(session.belongs_to)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await?;
        if res.rows_affected() < 1 {
            return Err(Error::InternalError {
                kind: "DatabaseError",
                message: "Could not save session to database!".to_string(),
            });
        }
        Ok(())
    }

    async fn drop_session(&self, ssid: &str) -> Result<bool, Error> {
        let affected = sqlx::query("DELETE FROM user_sessions WHERE ssid = $1")
            .bind(ssid)
            .execute(&self.pool)
            .await?;
        Ok(affected.rows_affected() >= 1)
    }
}
