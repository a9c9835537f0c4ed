//! Library member (patron) model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Member model from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Member {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub membership_date: DateTime<Utc>,
}

impl Member {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Case-insensitive match against names and email
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.first_name.to_lowercase().contains(&needle)
            || self.last_name.to_lowercase().contains(&needle)
            || self.email.to_lowercase().contains(&needle)
    }
}

/// Fields for a member row about to be inserted
#[derive(Debug, Clone)]
pub struct NewMember {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub membership_date: DateTime<Utc>,
}

impl NewMember {
    /// Synthesize a member from an identity email that has no record yet.
    ///
    /// `jane.doe@x.org` becomes "Jane Doe"; a local part without a dot
    /// becomes the last name with "Member" as first name.
    pub fn from_email(email: &str, now: DateTime<Utc>) -> Self {
        let local = email.split('@').next().unwrap_or_default();

        let (first_name, last_name) = match local.split_once('.') {
            Some((first, last)) if !first.is_empty() && !last.is_empty() => {
                (capitalize(first), capitalize(last))
            }
            _ if !local.is_empty() => ("Member".to_string(), local.to_string()),
            _ => ("Member".to_string(), "User".to_string()),
        };

        Self {
            first_name,
            last_name,
            email: email.to_string(),
            membership_date: now,
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Member search parameters
#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
pub struct MemberQuery {
    /// Matched against first name, last name and email
    pub search: Option<String>,
}

/// Create member request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateMember {
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    /// Defaults to now
    pub membership_date: Option<DateTime<Utc>>,
}

/// Update member request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateMember {
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub membership_date: Option<DateTime<Utc>>,
}

impl UpdateMember {
    pub fn apply(&self, member: &Member) -> Member {
        Member {
            id: member.id,
            first_name: self.first_name.clone().unwrap_or_else(|| member.first_name.clone()),
            last_name: self.last_name.clone().unwrap_or_else(|| member.last_name.clone()),
            email: self.email.clone().unwrap_or_else(|| member.email.clone()),
            membership_date: self.membership_date.unwrap_or(member.membership_date),
        }
    }
}
