//! Owner and document records as they are persisted, plus request-side metadata
//! and its validation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const MIN_TITLE_LEN: usize = 3;
const MIN_NAME_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OwnerStatus {
    Active,
    Inactive,
}

impl OwnerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerStatus::Active => "ACTIVE",
            OwnerStatus::Inactive => "INACTIVE",
        }
    }
}

impl fmt::Display for OwnerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OwnerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(OwnerStatus::Active),
            "INACTIVE" => Ok(OwnerStatus::Inactive),
            other => Err(format!("unknown owner status '{}'", other)),
        }
    }
}

/// Identity of a document submitter. The email is the unique key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub status: OwnerStatus,
}

impl Owner {
    pub fn active(
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            status: OwnerStatus::Active,
        }
    }
}

/// A notarized document. Created once, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Blob id returned by the blob store.
    pub doc_id: String,
    pub owner: Owner,
    pub title: String,
    pub description: Option<String>,
    pub file_name: String,
    /// Content fingerprint; unique across all records.
    pub fingerprint: String,
    /// Ledger token id, set once the mint is confirmed.
    pub token_id: Option<String>,
}

/// What a caller supplies alongside the document bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub owner_email: String,
    pub owner_first_name: String,
    pub owner_last_name: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub file_name: String,
}

impl DocumentMetadata {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_email(&self.owner_email)?;
        if self.title.trim().chars().count() < MIN_TITLE_LEN {
            return Err(ValidationError::Title(MIN_TITLE_LEN));
        }
        validate_name("owner first name", &self.owner_first_name)?;
        validate_name("owner last name", &self.owner_last_name)?;
        if self.file_name.trim().is_empty() {
            return Err(ValidationError::Missing("file name"));
        }
        Ok(())
    }

    pub fn owner(&self) -> Owner {
        Owner::active(
            self.owner_email.clone(),
            self.owner_first_name.clone(),
            self.owner_last_name.clone(),
        )
    }

    /// Builds the record that gets persisted once the mint is confirmed.
    /// An empty description is stored as absent.
    pub fn into_record(self, doc_id: String, fingerprint: String, token_id: String) -> DocumentRecord {
        let owner = self.owner();
        DocumentRecord {
            doc_id,
            owner,
            title: self.title,
            description: self.description.filter(|d| !d.is_empty()),
            file_name: self.file_name,
            fingerprint,
            token_id: Some(token_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("'{0}' is not a valid email address")]
    Email(String),
    #[error("title must be at least {0} characters")]
    Title(usize),
    #[error("{field} must be at least {min} alphabetic characters")]
    Name { field: &'static str, min: usize },
    #[error("document content is empty")]
    EmptyContent,
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Err(ValidationError::Missing("owner email"));
    }
    let invalid = || ValidationError::Email(email.to_string());
    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return Err(invalid());
    }
    Ok(())
}

fn validate_name(field: &'static str, value: &str) -> Result<(), ValidationError> {
    let ok = value.chars().count() >= MIN_NAME_LEN && value.chars().all(char::is_alphabetic);
    if ok {
        Ok(())
    } else {
        Err(ValidationError::Name {
            field,
            min: MIN_NAME_LEN,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> DocumentMetadata {
        DocumentMetadata {
            owner_email: "a@b.com".into(),
            owner_first_name: "Alice".into(),
            owner_last_name: "Brown".into(),
            title: "Lease".into(),
            description: Some(String::new()),
            file_name: "lease.pdf".into(),
        }
    }

    #[test]
    fn accepts_well_formed_metadata() {
        assert_eq!(metadata().validate(), Ok(()));
    }

    #[test]
    fn rejects_bad_emails() {
        for bad in ["", "ab.com", "@b.com", "a@b", "a@@b.com", "a @b.com", "a@b..com"] {
            let mut m = metadata();
            m.owner_email = bad.into();
            assert!(m.validate().is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn rejects_short_title_and_non_alphabetic_names() {
        let mut m = metadata();
        m.title = "ab".into();
        assert_eq!(m.validate(), Err(ValidationError::Title(3)));

        let mut m = metadata();
        m.owner_last_name = "Br0wn".into();
        assert!(matches!(m.validate(), Err(ValidationError::Name { field: "owner last name", .. })));
    }

    #[test]
    fn empty_description_is_dropped_from_the_record() {
        let rec = metadata().into_record("d1".into(), "h1".into(), "100".into());
        assert_eq!(rec.description, None);
        assert_eq!(rec.owner.status, OwnerStatus::Active);
        assert_eq!(rec.token_id.as_deref(), Some("100"));
    }

    #[test]
    fn owner_status_round_trips_through_its_column_value() {
        for s in [OwnerStatus::Active, OwnerStatus::Inactive] {
            assert_eq!(s.as_str().parse::<OwnerStatus>(), Ok(s));
        }
    }
}
