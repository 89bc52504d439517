use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::*;

pub const USER_CATEGORIES: &[&str] = &["student", "professor", "staff"];
pub const PROTOCOL_STATUSES: &[&str] = &["under_review", "approved", "finalized", "rejected"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserCategory {
    #[default]
    Student,
    Professor,
    Staff,
}

impl UserCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Professor => "professor",
            Self::Staff => "staff",
        }
    }
}

impl FromStr for UserCategory {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "student" => Ok(Self::Student),
            "professor" => Ok(Self::Professor),
            "staff" => Ok(Self::Staff),
            other => Err(format!(
                "category must be one of {}, got {other:?}",
                USER_CATEGORIES.join(", ")
            )),
        }
    }
}

impl fmt::Display for UserCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review state of a protocol. Any state may follow any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolStatus {
    #[default]
    UnderReview,
    Approved,
    Finalized,
    Rejected,
}

impl ProtocolStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnderReview => "under_review",
            Self::Approved => "approved",
            Self::Finalized => "finalized",
            Self::Rejected => "rejected",
        }
    }
}

impl FromStr for ProtocolStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "under_review" => Ok(Self::UnderReview),
            "approved" => Ok(Self::Approved),
            "finalized" => Ok(Self::Finalized),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!(
                "status must be one of {}, got {other:?}",
                PROTOCOL_STATUSES.join(", ")
            )),
        }
    }
}

impl fmt::Display for ProtocolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i32,
    pub full_name: String,
    pub email: String,
    pub registration_id: String,
    pub category: String,
    pub active: bool,
    pub validated: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub registration_id: String,
    pub category: String,
    pub active: bool,
    pub validated: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = protocols)]
#[diesel(belongs_to(User))]
pub struct Protocol {
    pub id: i32,
    pub protocol_number: String,
    pub user_id: i32,
    pub document_type: String,
    pub subject: String,
    pub destination: String,
    pub status: String,
    pub current_responsible: Option<String>,
    pub due_date: Option<NaiveDateTime>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = protocols)]
pub struct NewProtocol {
    pub protocol_number: String,
    pub user_id: i32,
    pub document_type: String,
    pub subject: String,
    pub destination: String,
    pub status: String,
    pub current_responsible: Option<String>,
    pub due_date: Option<NaiveDateTime>,
    pub notes: Option<String>,
}

/// Reduced user projection joined onto protocol reads.
#[derive(Debug, Clone, Queryable)]
pub struct ProtocolOwner {
    pub id: i32,
    pub full_name: String,
    pub email: String,
    pub registration_id: String,
    pub category: String,
}

/// Protocol projection nested under a user detail.
#[derive(Debug, Clone, Queryable)]
pub struct ProtocolSummary {
    pub id: i32,
    pub protocol_number: String,
    pub subject: String,
    pub status: String,
    pub created_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parses_case_insensitively() {
        assert_eq!(" Professor ".parse::<UserCategory>(), Ok(UserCategory::Professor));
        assert_eq!("staff".parse::<UserCategory>(), Ok(UserCategory::Staff));
        assert!("teacher".parse::<UserCategory>().is_err());
    }

    #[test]
    fn category_defaults_to_student() {
        assert_eq!(UserCategory::default().as_str(), "student");
    }

    #[test]
    fn status_strings_match_allowed_list() {
        for raw in PROTOCOL_STATUSES {
            let status: ProtocolStatus = raw.parse().unwrap();
            assert_eq!(status.as_str(), *raw);
        }
        assert_eq!(ProtocolStatus::default(), ProtocolStatus::UnderReview);
    }

    #[test]
    fn unknown_status_lists_allowed_values() {
        let err = "archived".parse::<ProtocolStatus>().unwrap_err();
        assert!(err.contains("under_review"));
        assert!(err.contains("archived"));
    }
}
