//! User account record
//!
//! The record carries the password credential (hash and salt) next to the
//! profile fields. The credential is never serialized.

use crate::{MunitError, Result, UserId};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use unicode_general_category::{get_general_category, GeneralCategory};

const MAX_DISPLAY_NAME: usize = 72;
const MAX_EMAIL: usize = 112;
const MIN_PASSWORD: usize = 8;
const MAX_PASSWORD: usize = 72;

/// User account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    pub email: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,

    /// Argon2id hash of the password
    #[serde(skip)]
    pub password_hash: Vec<u8>,

    /// Per-credential random salt
    #[serde(skip)]
    pub salt: Vec<u8>,
}

impl User {
    /// Create a new user record stamped with the current time
    pub fn new(
        id: UserId,
        display_name: impl Into<String>,
        email: impl Into<String>,
        password_hash: Vec<u8>,
        salt: Vec<u8>,
    ) -> Self {
        let now = now();
        Self {
            id,
            display_name: display_name.into(),
            email: email.into(),
            created: now,
            modified: now,
            password_hash,
            salt,
        }
    }

    /// Mark the record as modified now
    pub fn touch(&mut self) {
        self.modified = now();
    }

    /// Check the invariants a stored record must hold
    pub fn validate(&self) -> Result<()> {
        if self.display_name.len() > MAX_DISPLAY_NAME {
            return Err(MunitError::validation(format!(
                "user: displayname is too long, max {MAX_DISPLAY_NAME}"
            )));
        }
        if self.email.len() > MAX_EMAIL {
            return Err(MunitError::validation(format!(
                "user: email is too long, max {MAX_EMAIL}"
            )));
        }
        if !is_bare_address(&self.email) {
            return Err(MunitError::validation("user: email is invalid"));
        }
        if self.password_hash.is_empty() {
            return Err(MunitError::validation("user: password hash is empty"));
        }
        if self.salt.is_empty() {
            return Err(MunitError::validation("user: salt is empty"));
        }
        Ok(())
    }
}

/// Validate a plaintext password against the account password rules
///
/// Passwords are 8 to 72 bytes made of letters, decimal digits, punctuation
/// and whitespace (Unicode general categories L, Nd, P and White_Space), and
/// must contain at least one letter and one decimal digit.
pub fn validate_password(password: &str) -> Result<()> {
    if password.len() < MIN_PASSWORD {
        return Err(MunitError::validation(format!(
            "user: password is too short, min {MIN_PASSWORD}"
        )));
    }
    if password.len() > MAX_PASSWORD {
        return Err(MunitError::validation(format!(
            "user: password is too long, max {MAX_PASSWORD}"
        )));
    }
    let allowed =
        |c: char| is_letter(c) || is_decimal_digit(c) || is_punctuation(c) || c.is_whitespace();
    if !password.chars().all(allowed) {
        return Err(MunitError::validation(
            "user: password contains invalid symbol",
        ));
    }
    if !password.chars().any(is_letter) {
        return Err(MunitError::validation(
            "user: password must contain at least one letter",
        ));
    }
    if !password.chars().any(is_decimal_digit) {
        return Err(MunitError::validation(
            "user: password must contain at least one digit",
        ));
    }
    Ok(())
}

fn is_letter(c: char) -> bool {
    matches!(
        get_general_category(c),
        GeneralCategory::UppercaseLetter
            | GeneralCategory::LowercaseLetter
            | GeneralCategory::TitlecaseLetter
            | GeneralCategory::ModifierLetter
            | GeneralCategory::OtherLetter
    )
}

fn is_decimal_digit(c: char) -> bool {
    matches!(get_general_category(c), GeneralCategory::DecimalNumber)
}

fn is_punctuation(c: char) -> bool {
    matches!(
        get_general_category(c),
        GeneralCategory::ConnectorPunctuation
            | GeneralCategory::DashPunctuation
            | GeneralCategory::OpenPunctuation
            | GeneralCategory::ClosePunctuation
            | GeneralCategory::InitialPunctuation
            | GeneralCategory::FinalPunctuation
            | GeneralCategory::OtherPunctuation
    )
}

fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// Accepts `local@domain` only, rejecting display-name forms like `Name <a@b>`
fn is_bare_address(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '<' | '>' | '(' | ')' | ',' | ';' | '"'))
}
