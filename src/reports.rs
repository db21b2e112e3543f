use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;

use crate::models::billing::PaymentFilter;
use crate::models::{
    Application, Blog, Course, Enrollment, Group, GroupStudent, Payment, PaymentStatus, Student,
    StudentStatus, Teacher, Vacancy, VacancyApplication,
};
use crate::month::BillingMonth;
use crate::record::{ListQuery, Record, Table};
use crate::store::Store;
use crate::Error;

pub const SEARCH_LIMIT: i64 = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total_students: i64,
    pub active_students: i64,
    pub total_courses: i64,
    pub total_groups: i64,
    pub total_teachers: i64,
    pub pending_applications: i64,
    pub month: BillingMonth,
    pub monthly_revenue: i64,
    pub total_revenue: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyRow {
    pub month: BillingMonth,
    pub revenue: i64,
    pub new_students: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseStats {
    pub course_id: i32,
    pub course_name: String,
    pub price: i64,
    pub groups: usize,
    pub students: usize,
    pub revenue: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub students: Vec<Student>,
    pub applications: Vec<Application>,
    pub teachers: Vec<Teacher>,
    pub courses: Vec<Course>,
    pub blogs: Vec<Blog>,
    pub vacancies: Vec<Vacancy>,
}

/// Sum of `paid` payments, optionally restricted to one month.
pub fn revenue<'a, I>(payments: I, month: Option<BillingMonth>) -> i64
where
    I: IntoIterator<Item = &'a Payment>,
{
    payments
        .into_iter()
        .filter(|payment| payment.status == PaymentStatus::Paid)
        .filter(|payment| month.map_or(true, |month| payment.month == month))
        .map(|payment| payment.amount)
        .fold(0, i64::saturating_add)
}

pub fn monthly(year: i32, payments: &[Payment], students: &[Student]) -> Vec<MonthlyRow> {
    (1..=12)
        .filter_map(|month| BillingMonth::new(year, month))
        .map(|month| MonthlyRow {
            month,
            revenue: revenue(payments, Some(month)),
            new_students: students
                .iter()
                .filter(|student| BillingMonth::of(student.joined_date) == month)
                .count(),
        })
        .collect()
}

/// Per-course totals. A student counts towards a course through its own
/// course, an enrollment or a group of that course.
pub fn course_stats(
    courses: &[Course],
    groups: &[Group],
    relations: &[GroupStudent],
    enrollments: &[Enrollment],
    students: &[Student],
    payments: &[Payment],
) -> Vec<CourseStats> {
    courses
        .iter()
        .map(|course| {
            let course_groups: Vec<i32> = groups
                .iter()
                .filter(|group| group.course_id == course.id)
                .map(|group| group.id)
                .collect();
            let mut members: HashSet<i32> = students
                .iter()
                .filter(|student| student.course_id == Some(course.id))
                .map(|student| student.id)
                .collect();
            members.extend(
                enrollments
                    .iter()
                    .filter(|enrollment| enrollment.course_id == course.id)
                    .map(|enrollment| enrollment.student_id),
            );
            members.extend(
                relations
                    .iter()
                    .filter(|relation| course_groups.contains(&relation.group_id))
                    .map(|relation| relation.student_id),
            );
            CourseStats {
                course_id: course.id,
                course_name: course.name.clone(),
                price: course.price,
                groups: course_groups.len(),
                students: members.len(),
                revenue: revenue(
                    payments.iter().filter(|payment| payment.course_id == course.id),
                    None,
                ),
            }
        })
        .collect()
}

pub async fn dashboard(store: &dyn Store) -> Result<DashboardStats, Error> {
    let month = BillingMonth::current();
    let paid = store
        .payments(&PaymentFilter {
            status: Some(PaymentStatus::Paid),
            ..PaymentFilter::default()
        })
        .await?;
    Ok(DashboardStats {
        total_students: store.count_rows(Student::TABLE, None).await?,
        active_students: store
            .count_rows(Student::TABLE, Some(StudentStatus::Active.as_str()))
            .await?,
        total_courses: store.count_rows(Course::TABLE, None).await?,
        total_groups: store.count_rows(Group::TABLE, None).await?,
        total_teachers: store.count_rows(Teacher::TABLE, None).await?,
        pending_applications: store.count_rows(Application::TABLE, Some("pending")).await?,
        month,
        monthly_revenue: revenue(&paid, Some(month)),
        total_revenue: revenue(&paid, None),
    })
}

pub async fn monthly_report(store: &dyn Store, year: Option<i32>) -> Result<Vec<MonthlyRow>, Error> {
    let year = year.unwrap_or_else(|| BillingMonth::current().year());
    let payments = store.payments(&PaymentFilter::default()).await?;
    let students = store.list::<Student>(&ListQuery::all()).await?;
    Ok(monthly(year, &payments, &students))
}

pub async fn course_report(store: &dyn Store) -> Result<Vec<CourseStats>, Error> {
    let all = ListQuery::all();
    Ok(course_stats(
        &store.list::<Course>(&all).await?,
        &store.list::<Group>(&all).await?,
        &store.list::<GroupStudent>(&all).await?,
        &store.list::<Enrollment>(&all).await?,
        &store.list::<Student>(&all).await?,
        &store.payments(&PaymentFilter::default()).await?,
    ))
}

pub async fn search(store: &dyn Store, query: &str) -> Result<SearchResults, Error> {
    let needle = query.trim();
    if needle.is_empty() {
        return Err(Error::invalid("Search query must not be empty"));
    }
    Ok(SearchResults {
        students: store.search::<Student>(needle, SEARCH_LIMIT).await?,
        applications: store.search::<Application>(needle, SEARCH_LIMIT).await?,
        teachers: store.search::<Teacher>(needle, SEARCH_LIMIT).await?,
        courses: store.search::<Course>(needle, SEARCH_LIMIT).await?,
        blogs: store.search::<Blog>(needle, SEARCH_LIMIT).await?,
        vacancies: store.search::<Vacancy>(needle, SEARCH_LIMIT).await?,
    })
}

/// Resources that can be exported, keyed by their URL segment.
pub fn export_table(kind: &str) -> Option<&'static Table> {
    match kind {
        "students" => Some(Student::TABLE),
        "applications" => Some(Application::TABLE),
        "payments" => Some(Payment::TABLE),
        "vacancy-applications" => Some(VacancyApplication::TABLE),
        "teachers" => Some(Teacher::TABLE),
        "courses" => Some(Course::TABLE),
        _ => None,
    }
}

/// Accepted `format` values. Spreadsheet requests get CSV as well.
pub fn check_format(format: Option<&str>) -> Result<(), Error> {
    match format.unwrap_or("excel") {
        "excel" | "csv" => Ok(()),
        "pdf" => Err(Error::invalid("PDF export is not supported, use `excel` or `csv`")),
        other => Err(Error::invalid(format!("Unknown export format `{}`", other))),
    }
}

fn csv_cell(value: &Value) -> String {
    let text = match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Array(items) => items.iter().map(csv_cell).collect::<Vec<_>>().join("; "),
        other => other.to_string(),
    };
    if text.contains(|c: char| matches!(c, ',' | '"' | '\n' | '\r')) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text
    }
}

/// Renders rows as CSV with a byte-order mark so spreadsheets pick UTF-8.
pub fn to_csv(table: &Table, rows: &[Value]) -> String {
    let columns: Vec<&str> = std::iter::once("id")
        .chain(table.columns.iter().copied())
        .chain(std::iter::once("created_at"))
        .collect();
    let mut out = String::from("\u{feff}");
    out.push_str(&columns.join(","));
    out.push_str("\r\n");
    for row in rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|column| csv_cell(row.get(*column).unwrap_or(&Value::Null)))
            .collect();
        out.push_str(&cells.join(","));
        out.push_str("\r\n");
    }
    out
}

pub async fn export(store: &dyn Store, table: &'static Table) -> Result<String, Error> {
    let rows = store.list_rows(table, &ListQuery::all()).await?;
    Ok(to_csv(table, &rows))
}
