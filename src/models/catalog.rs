use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Student;
use crate::record::{require, Record, Table};
use crate::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: i32,
    pub name: String,
    /// Monthly price in so'm.
    pub price: i64,
    pub duration: String,
    pub audience: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseDraft {
    pub name: String,
    pub price: i64,
    pub duration: String,
    pub audience: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoursePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Record for Course {
    const TABLE: &'static Table = &Table {
        name: "courses",
        label: "Course",
        columns: &["name", "price", "duration", "audience", "description"],
        search: &["name", "audience", "description"],
        has_status: false,
        newest_first: false,
    };

    type Draft = CourseDraft;
    type Patch = CoursePatch;

    fn id(&self) -> i32 {
        self.id
    }

    fn check(draft: &CourseDraft) -> Result<(), Error> {
        require("name", &draft.name)?;
        if draft.price < 0 {
            return Err(Error::invalid("`price` must not be negative"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Teacher {
    pub id: i32,
    pub full_name: String,
    pub specialty: String,
    pub experience: String,
    pub phone: String,
    pub image: Option<String>,
    pub tags: Vec<String>,
    pub quote: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeacherDraft {
    pub full_name: String,
    pub specialty: String,
    pub experience: String,
    pub phone: String,
    pub image: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub quote: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeacherPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,
}

impl Record for Teacher {
    const TABLE: &'static Table = &Table {
        name: "teachers",
        label: "Teacher",
        columns: &[
            "full_name",
            "specialty",
            "experience",
            "phone",
            "image",
            "tags",
            "quote",
        ],
        search: &["full_name", "specialty", "phone"],
        has_status: false,
        newest_first: false,
    };

    type Draft = TeacherDraft;
    type Patch = TeacherPatch;

    fn id(&self) -> i32 {
        self.id
    }

    fn check(draft: &TeacherDraft) -> Result<(), Error> {
        require("full_name", &draft.full_name)?;
        require("phone", &draft.phone)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CohortStatus {
    #[default]
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: i32,
    pub name: String,
    pub course_id: i32,
    pub teacher_id: i32,
    pub schedule: Option<String>,
    pub room: Option<String>,
    pub status: CohortStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupDraft {
    pub name: String,
    pub course_id: i32,
    pub teacher_id: i32,
    pub schedule: Option<String>,
    pub room: Option<String>,
    #[serde(default)]
    pub status: CohortStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teacher_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CohortStatus>,
}

impl Record for Group {
    const TABLE: &'static Table = &Table {
        name: "groups",
        label: "Group",
        columns: &["name", "course_id", "teacher_id", "schedule", "room", "status"],
        search: &["name"],
        has_status: true,
        newest_first: false,
    };

    type Draft = GroupDraft;
    type Patch = GroupPatch;

    fn id(&self) -> i32 {
        self.id
    }

    fn check(draft: &GroupDraft) -> Result<(), Error> {
        require("name", &draft.name)
    }

    fn references(draft: &GroupDraft) -> Vec<(&'static Table, i32)> {
        vec![(Course::TABLE, draft.course_id), (Teacher::TABLE, draft.teacher_id)]
    }
}

/// Join row between a group and one of its students.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStudent {
    pub id: i32,
    pub group_id: i32,
    pub student_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GroupStudentDraft {
    pub group_id: i32,
    pub student_id: i32,
}

impl Record for GroupStudent {
    const TABLE: &'static Table = &Table {
        name: "group_students",
        label: "Group-student relation",
        columns: &["group_id", "student_id"],
        search: &[],
        has_status: false,
        newest_first: false,
    };

    type Draft = GroupStudentDraft;
    type Patch = GroupStudentDraft;

    fn id(&self) -> i32 {
        self.id
    }

    fn references(draft: &GroupStudentDraft) -> Vec<(&'static Table, i32)> {
        vec![(Group::TABLE, draft.group_id), (Student::TABLE, draft.student_id)]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: i32,
    pub student_id: i32,
    pub course_id: i32,
    pub status: CohortStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentDraft {
    pub student_id: i32,
    pub course_id: i32,
    #[serde(default)]
    pub status: CohortStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrollmentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CohortStatus>,
}

impl Record for Enrollment {
    const TABLE: &'static Table = &Table {
        name: "enrollments",
        label: "Enrollment",
        columns: &["student_id", "course_id", "status"],
        search: &[],
        has_status: true,
        newest_first: false,
    };

    type Draft = EnrollmentDraft;
    type Patch = EnrollmentPatch;

    fn id(&self) -> i32 {
        self.id
    }

    fn references(draft: &EnrollmentDraft) -> Vec<(&'static Table, i32)> {
        vec![(Student::TABLE, draft.student_id), (Course::TABLE, draft.course_id)]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VacancyStatus {
    #[default]
    #[serde(alias = "faol")]
    Active,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vacancy {
    pub id: i32,
    pub title: String,
    /// Employment type, e.g. `Full-time`, `Part-time` or `Remote`.
    #[serde(rename = "type")]
    pub kind: String,
    pub salary: String,
    pub location: String,
    pub description: Option<String>,
    pub requirements: Vec<String>,
    pub status: VacancyStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VacancyDraft {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub salary: String,
    pub location: String,
    pub description: Option<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub status: VacancyStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VacancyPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirements: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<VacancyStatus>,
}

impl Record for Vacancy {
    const TABLE: &'static Table = &Table {
        name: "vacancies",
        label: "Vacancy",
        columns: &[
            "title",
            "type",
            "salary",
            "location",
            "description",
            "requirements",
            "status",
        ],
        search: &["title", "location", "description"],
        has_status: true,
        newest_first: true,
    };

    type Draft = VacancyDraft;
    type Patch = VacancyPatch;

    fn id(&self) -> i32 {
        self.id
    }

    fn check(draft: &VacancyDraft) -> Result<(), Error> {
        require("title", &draft.title)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlogStatus {
    #[default]
    Draft,
    Published,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blog {
    pub id: i32,
    pub title: String,
    pub image: Option<String>,
    pub youtube_link: Option<String>,
    pub short_text: String,
    pub content: String,
    pub status: BlogStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogDraft {
    pub title: String,
    pub image: Option<String>,
    pub youtube_link: Option<String>,
    pub short_text: String,
    pub content: String,
    #[serde(default)]
    pub status: BlogStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlogPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub youtube_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<BlogStatus>,
}

impl Record for Blog {
    const TABLE: &'static Table = &Table {
        name: "blogs",
        label: "Blog post",
        columns: &[
            "title",
            "image",
            "youtube_link",
            "short_text",
            "content",
            "status",
        ],
        search: &["title", "short_text"],
        has_status: true,
        newest_first: true,
    };

    type Draft = BlogDraft;
    type Patch = BlogPatch;

    fn id(&self) -> i32 {
        self.id
    }

    fn check(draft: &BlogDraft) -> Result<(), Error> {
        require("title", &draft.title)?;
        require("content", &draft.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn vacancy_kind_travels_as_type() {
        let draft: VacancyDraft = serde_json::from_value(json!({
            "title": "Matematika o'qituvchisi",
            "type": "Full-time",
            "salary": "5 000 000",
            "location": "Toshkent",
            "status": "faol"
        }))
        .unwrap();
        assert_eq!(draft.kind, "Full-time");
        assert_eq!(draft.status, VacancyStatus::Active);
        let fields = serde_json::to_value(&draft).unwrap();
        assert_eq!(fields["type"], "Full-time");
        assert_eq!(fields["requirements"], json!([]));
    }

    #[test]
    fn negative_course_price_is_rejected() {
        let draft = CourseDraft {
            name: "IELTS".to_string(),
            price: -1,
            duration: "6 oy".to_string(),
            audience: "9-11".to_string(),
            description: None,
        };
        assert!(Course::check(&draft).is_err());
    }
}
