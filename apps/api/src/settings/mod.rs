//! User settings: the stored `UserRecord` that outreach messages are written from.
//!
//! Persistence sits behind `SettingsStore` so the HTTP layer does not care whether records
//! live in a file or in memory.

pub mod handlers;
pub mod store;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::records::UserRecord;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("missing required fields: {}", .0.join(", "))]
    Invalid(Vec<&'static str>),
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// The stored user, or `None` when nothing has been saved yet.
    async fn load_user(&self) -> Result<Option<UserRecord>, SettingsError>;

    /// Replaces the stored user. Callers validate first.
    async fn save_user(&self, user: &UserRecord) -> Result<(), SettingsError>;
}

/// Trims every field and checks the required ones.
pub fn validate_user(user: &UserRecord) -> Result<UserRecord, SettingsError> {
    let user = user.normalized();
    let missing = user.missing_fields();
    if missing.is_empty() {
        Ok(user)
    } else {
        Err(SettingsError::Invalid(missing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_trims_and_accepts() {
        let user = UserRecord {
            name: " Ada ".into(),
            current_role: "Engineer".into(),
            top_skills: "Rust ".into(),
            location: Some("  ".into()),
            ..Default::default()
        };
        let user = validate_user(&user).unwrap();
        assert_eq!(user.name, "Ada");
        assert_eq!(user.top_skills, "Rust");
        assert_eq!(user.location, None);
    }

    #[test]
    fn test_validate_lists_missing_fields() {
        let user = UserRecord {
            name: "Ada".into(),
            ..Default::default()
        };
        let err = validate_user(&user).unwrap_err();
        assert!(matches!(&err, SettingsError::Invalid(f) if *f == vec!["currentRole", "topSkills"]));
        assert_eq!(err.to_string(), "missing required fields: currentRole, topSkills");
    }
}
