//! Student model and RFID credential helpers

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::enums::Gender;
use crate::error::{AppError, AppResult};

static CONTACT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{10}$").expect("valid regex"));
static PHOTO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://.+\.(jpg|jpeg|png|webp)$").expect("valid regex"));

/// Physical access credential. Both forms identify the same card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Rfid {
    /// Upper-case hex without separators
    pub hex: String,
    pub decimal: String,
}

impl Rfid {
    /// Strip separators and upper-case a hex UID as read by the scanner
    pub fn normalize_hex(raw: &str) -> String {
        raw.chars()
            .filter(|c| !c.is_whitespace() && *c != ':' && *c != '-')
            .collect::<String>()
            .to_uppercase()
    }

    /// Build a credential from whichever halves were supplied, deriving the other.
    pub fn complete(hex: Option<&str>, decimal: Option<&str>) -> AppResult<Self> {
        let hex = hex.map(Self::normalize_hex).filter(|h| !h.is_empty());
        let decimal = decimal.map(|d| d.trim().to_string()).filter(|d| !d.is_empty());

        match (hex, decimal) {
            (Some(hex), Some(decimal)) => {
                Self::parse_hex(&hex)?;
                Self::parse_decimal(&decimal)?;
                Ok(Self { hex, decimal })
            }
            (Some(hex), None) => {
                let value = Self::parse_hex(&hex)?;
                Ok(Self {
                    hex,
                    decimal: value.to_string(),
                })
            }
            (None, Some(decimal)) => {
                let value = Self::parse_decimal(&decimal)?;
                Ok(Self {
                    hex: format!("{:X}", value),
                    decimal,
                })
            }
            (None, None) => Err(AppError::Validation(
                "RFID must include a hex or decimal value".to_string(),
            )),
        }
    }

    fn parse_hex(hex: &str) -> AppResult<u128> {
        u128::from_str_radix(hex, 16)
            .map_err(|_| AppError::Validation(format!("Invalid RFID hex value: {}", hex)))
    }

    fn parse_decimal(decimal: &str) -> AppResult<u128> {
        decimal
            .parse::<u128>()
            .map_err(|_| AppError::Validation(format!("Invalid RFID decimal value: {}", decimal)))
    }
}

/// Internal row structure (RFID columns are flat in the table)
#[derive(Debug, Clone, FromRow)]
pub struct StudentRow {
    id: Uuid,
    prn_number: String,
    name: String,
    class: String,
    section: String,
    roll_no: Option<i32>,
    gender: Gender,
    contact_number: String,
    email: String,
    photo: Option<String>,
    rfid_hex: String,
    rfid_decimal: String,
    is_active: bool,
    credits: i32,
    version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<StudentRow> for Student {
    fn from(row: StudentRow) -> Self {
        Student {
            id: row.id,
            prn_number: row.prn_number,
            name: row.name,
            class: row.class,
            section: row.section,
            roll_no: row.roll_no,
            gender: row.gender,
            contact_number: row.contact_number,
            email: row.email,
            photo: row.photo,
            rfid: Rfid {
                hex: row.rfid_hex,
                decimal: row.rfid_decimal,
            },
            is_active: row.is_active,
            credits: row.credits,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Enrolled student
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Student {
    pub id: Uuid,
    /// Personal registration number, upper-case and unique
    pub prn_number: String,
    pub name: String,
    pub class: String,
    pub section: String,
    pub roll_no: Option<i32>,
    pub gender: Gender,
    pub contact_number: String,
    pub email: String,
    pub photo: Option<String>,
    pub rfid: Rfid,
    pub is_active: bool,
    /// Remaining borrow credits
    pub credits: i32,
    /// Optimistic concurrency token, bumped on every credit change
    #[serde(skip_serializing)]
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Short student representation embedded in borrow requests and fines
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StudentShort {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub prn_number: String,
}

impl From<&Student> for StudentShort {
    fn from(s: &Student) -> Self {
        Self {
            id: s.id,
            name: s.name.clone(),
            email: s.email.clone(),
            prn_number: s.prn_number.clone(),
        }
    }
}

/// RFID as submitted on enrollment; at least one half is required
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RfidInput {
    pub hex: Option<String>,
    pub decimal: Option<String>,
}

/// Create student request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateStudent {
    #[validate(length(min = 1, message = "prn_number is required"))]
    pub prn_number: String,
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "class is required"))]
    pub class: String,
    #[validate(length(min = 1, message = "section is required"))]
    pub section: String,
    #[validate(range(min = 1, message = "Roll number must be a positive value"))]
    pub roll_no: Option<i32>,
    pub gender: Gender,
    pub contact_number: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    pub photo: Option<String>,
    pub rfid: RfidInput,
}

impl CreateStudent {
    /// Field checks the derive cannot express, then normalization
    pub fn into_new_student(self, credits: i32) -> AppResult<NewStudent> {
        self.validate()?;
        check_contact(&self.contact_number)?;
        if let Some(ref photo) = self.photo {
            check_photo(photo)?;
        }
        let rfid = Rfid::complete(self.rfid.hex.as_deref(), self.rfid.decimal.as_deref())?;

        Ok(NewStudent {
            prn_number: self.prn_number.trim().to_uppercase(),
            name: self.name.trim().to_string(),
            class: self.class.trim().to_string(),
            section: self.section.trim().to_uppercase(),
            roll_no: self.roll_no,
            gender: self.gender,
            contact_number: self.contact_number,
            email: self.email.trim().to_lowercase(),
            photo: self.photo,
            rfid,
            credits,
        })
    }
}

/// Normalized student ready to be stored
#[derive(Debug, Clone)]
pub struct NewStudent {
    pub prn_number: String,
    pub name: String,
    pub class: String,
    pub section: String,
    pub roll_no: Option<i32>,
    pub gender: Gender,
    pub contact_number: String,
    pub email: String,
    pub photo: Option<String>,
    pub rfid: Rfid,
    pub credits: i32,
}

/// Update student request. RFID and credits are not updatable.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateStudent {
    pub name: Option<String>,
    pub class: Option<String>,
    pub section: Option<String>,
    #[validate(range(min = 1, message = "Roll number must be a positive value"))]
    pub roll_no: Option<i32>,
    pub gender: Option<Gender>,
    pub contact_number: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub photo: Option<String>,
    pub is_active: Option<bool>,
}

impl UpdateStudent {
    pub fn check(&mut self) -> AppResult<()> {
        self.validate()?;
        if let Some(ref contact) = self.contact_number {
            check_contact(contact)?;
        }
        if let Some(ref photo) = self.photo {
            check_photo(photo)?;
        }
        if let Some(email) = self.email.as_mut() {
            *email = email.trim().to_lowercase();
        }
        if let Some(section) = self.section.as_mut() {
            *section = section.trim().to_uppercase();
        }
        Ok(())
    }
}

/// Lookup by PRN (`id`) or by RFID
#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyStudent {
    pub id: Option<String>,
    pub rfid: Option<String>,
}

fn check_contact(contact: &str) -> AppResult<()> {
    if CONTACT_RE.is_match(contact) {
        Ok(())
    } else {
        Err(AppError::Validation(
            "Contact number must be 10 digits".to_string(),
        ))
    }
}

fn check_photo(photo: &str) -> AppResult<()> {
    if PHOTO_RE.is_match(photo) {
        Ok(())
    } else {
        Err(AppError::Validation("Invalid photo URL".to_string()))
    }
}
