use serde::{Deserialize, Deserializer, Serialize};

/// Skills list bounds shared by extraction and validation.
pub const MAX_SKILLS: usize = 10;
pub const MIN_SKILL_LEN: usize = 3;
pub const MAX_SKILL_LEN: usize = 49;

/// The user's own profile, supplied by the settings boundary.
/// Passed into generation as an immutable snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(default)]
    pub name: String,
    #[serde(alias = "years", default)]
    pub years_experience: u32,
    #[serde(default)]
    pub current_role: String,
    /// Comma-joined skill tokens, exactly as the user typed them.
    #[serde(default)]
    pub top_skills: String,
    #[serde(default, deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    pub key_achievement: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    pub portfolio_url: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl UserRecord {
    /// Returns a copy with every string field trimmed and blank optionals dropped.
    pub fn normalized(&self) -> Self {
        let opt = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Self {
            name: self.name.trim().to_string(),
            years_experience: self.years_experience,
            current_role: self.current_role.trim().to_string(),
            top_skills: self.top_skills.trim().to_string(),
            key_achievement: opt(&self.key_achievement),
            portfolio_url: opt(&self.portfolio_url),
            location: opt(&self.location),
        }
    }

    /// Names of required fields that are blank. Empty when the record is complete.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.name.trim().is_empty() {
            missing.push("name");
        }
        if self.current_role.trim().is_empty() {
            missing.push("currentRole");
        }
        if self.top_skills.trim().is_empty() {
            missing.push("topSkills");
        }
        missing
    }
}

/// Job posting data extracted from a page.
///
/// Produced whole by every extraction attempt; never merged across attempts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    #[serde(rename = "fullName", default)]
    pub full_name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(rename = "url", alias = "sourceUrl", default)]
    pub source_url: String,
}

impl ProfileRecord {
    /// A record is usable only when both role and company were found.
    pub fn is_usable(&self) -> bool {
        !self.role.trim().is_empty() && !self.company.trim().is_empty()
    }
}

/// Body of a generation call. Both parts are optional on the wire so that a missing one is
/// reported as a validation failure rather than a body rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationRequest {
    #[serde(default)]
    pub user: Option<UserRecord>,
    #[serde(default)]
    pub profile: Option<ProfileRecord>,
}

impl GenerationRequest {
    pub fn new(user: UserRecord, profile: ProfileRecord) -> Self {
        Self {
            user: Some(user),
            profile: Some(profile),
        }
    }
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}
