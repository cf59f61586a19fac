//! Core student record types for roster.
//!
//! This module defines the stored [`Student`] record, its typed identifier,
//! the wire-level [`StudentInput`] request schema, and the validation that
//! turns one into a normalized [`NewStudent`] ready for storage.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\S+@\S+\.\S+$").expect("valid email regex"));

/// Opaque, system-generated identifier of a student record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(Uuid);

impl StudentId {
    /// Generate a fresh identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for StudentId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| Error::invalid_identifier(s))
    }
}

/// A stored student record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    /// Identifier assigned by the store.
    pub id: StudentId,
    /// Full name.
    pub name: String,
    /// Lower-cased email address, unique across records.
    pub email: String,
    /// Roll number, unique across records.
    pub roll_number: String,
    /// Department name.
    pub department: String,
    /// Year of study, e.g. "2nd Year".
    pub year: String,
    /// Contact phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Postal address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last written.
    pub updated_at: DateTime<Utc>,
}

impl Student {
    /// Build a freshly created record from validated fields.
    #[must_use]
    pub fn create(fields: NewStudent, now: DateTime<Utc>) -> Self {
        Self {
            id: StudentId::generate(),
            name: fields.name,
            email: fields.email,
            roll_number: fields.roll_number,
            department: fields.department,
            year: fields.year,
            phone: fields.phone,
            address: fields.address,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Validated, normalized student fields.
///
/// Only [`StudentInput::validate`] produces these, so every value here is
/// trimmed, required fields are non-empty and the email is lower-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStudent {
    pub(crate) name: String,
    pub(crate) email: String,
    pub(crate) roll_number: String,
    pub(crate) department: String,
    pub(crate) year: String,
    pub(crate) phone: Option<String>,
    pub(crate) address: Option<String>,
}

impl NewStudent {
    /// Normalized email.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Normalized roll number.
    #[must_use]
    pub fn roll_number(&self) -> &str {
        &self.roll_number
    }
}

/// Request body for creating or updating a student.
///
/// Every attribute may be left out on the wire so that missing fields surface
/// as validation messages instead of deserialization failures. A required
/// attribute sent as `null` is rejected outright, since an update would
/// otherwise read it as "keep the stored value". Attributes the store
/// manages itself are accepted and ignored, so a client can send back a
/// record it fetched; anything else unknown is rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StudentInput {
    /// Full name.
    #[serde(default, deserialize_with = "present")]
    pub name: Option<String>,
    /// Email address.
    #[serde(default, deserialize_with = "present")]
    pub email: Option<String>,
    /// Roll number.
    #[serde(default, deserialize_with = "present")]
    pub roll_number: Option<String>,
    /// Department name.
    #[serde(default, deserialize_with = "present")]
    pub department: Option<String>,
    /// Year of study.
    #[serde(default, deserialize_with = "present")]
    pub year: Option<String>,
    /// Contact phone number.
    pub phone: Option<String>,
    /// Postal address.
    pub address: Option<String>,

    #[serde(default, rename = "id")]
    _id: Option<IgnoredAny>,
    #[serde(default, rename = "_id")]
    _object_id: Option<IgnoredAny>,
    #[serde(default, rename = "createdAt")]
    _created_at: Option<IgnoredAny>,
    #[serde(default, rename = "updatedAt")]
    _updated_at: Option<IgnoredAny>,
    #[serde(default, rename = "__v")]
    _version: Option<IgnoredAny>,
}

impl StudentInput {
    /// Create an input with every required field set.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        roll_number: impl Into<String>,
        department: impl Into<String>,
        year: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            email: Some(email.into()),
            roll_number: Some(roll_number.into()),
            department: Some(department.into()),
            year: Some(year.into()),
            ..Self::default()
        }
    }

    /// Set the phone number.
    #[must_use]
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    /// Set the address.
    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Fill every attribute missing from this input with the stored value.
    #[must_use]
    pub fn merged_over(self, existing: &Student) -> Self {
        Self {
            name: self.name.or_else(|| Some(existing.name.clone())),
            email: self.email.or_else(|| Some(existing.email.clone())),
            roll_number: self
                .roll_number
                .or_else(|| Some(existing.roll_number.clone())),
            department: self.department.or_else(|| Some(existing.department.clone())),
            year: self.year.or_else(|| Some(existing.year.clone())),
            phone: self.phone.or_else(|| existing.phone.clone()),
            address: self.address.or_else(|| existing.address.clone()),
            ..Self::default()
        }
    }

    /// Validate and normalize the input.
    ///
    /// All field problems are collected and reported together.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if a required field is missing or blank,
    /// or if the email does not look like an address.
    pub fn validate(self) -> Result<NewStudent> {
        let mut issues = Vec::new();

        let name = required(self.name, "name", "Name is required", &mut issues);
        let email = required(self.email, "email", "Email is required", &mut issues)
            .map(|email| email.to_lowercase());
        if let Some(email) = &email {
            if !EMAIL_RE.is_match(email) {
                issues.push("email: Please provide a valid email".to_string());
            }
        }
        let roll_number = required(
            self.roll_number,
            "rollNumber",
            "Roll number is required",
            &mut issues,
        );
        let department = required(
            self.department,
            "department",
            "Department is required",
            &mut issues,
        );
        let year = required(self.year, "year", "Year is required", &mut issues);

        match (name, email, roll_number, department, year) {
            (Some(name), Some(email), Some(roll_number), Some(department), Some(year))
                if issues.is_empty() =>
            {
                Ok(NewStudent {
                    name,
                    email,
                    roll_number,
                    department,
                    year,
                    phone: optional(self.phone),
                    address: optional(self.address),
                })
            }
            _ => Err(Error::validation(issues.join(", "))),
        }
    }
}

fn required(
    value: Option<String>,
    field: &str,
    message: &str,
    issues: &mut Vec<String>,
) -> Option<String> {
    match optional(value) {
        Some(v) => Some(v),
        None => {
            issues.push(format!("{field}: {message}"));
            None
        }
    }
}

/// A required attribute: absent is `None`, `null` is an error.
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(Some)
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
