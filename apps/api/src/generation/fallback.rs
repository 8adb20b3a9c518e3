//! Deterministic fallback message, used when the model cannot produce any output.
//! Built purely from the request records; no I/O.

use crate::models::records::{ProfileRecord, UserRecord};

const FALLBACK_SKILL_COUNT: usize = 3;

pub fn fallback_message(user: &UserRecord, profile: &ProfileRecord) -> String {
    let skills_sentence = if profile.skills.is_empty() {
        String::new()
    } else {
        let named: Vec<&str> = profile
            .skills
            .iter()
            .take(FALLBACK_SKILL_COUNT)
            .map(String::as_str)
            .collect();
        format!("I noticed the role calls for {}. ", named.join(", "))
    };

    let achievement = user
        .key_achievement
        .as_deref()
        .map(|a| a.trim_end_matches(['.', '!', ' ']))
        .filter(|a| !a.is_empty())
        .map(|a| format!(" Most recently, {a}."))
        .unwrap_or_default();

    format!(
        "Hi,\n\n\
         My name is {name}, and I've been working as {current_role} for {years} years. \
         I came across the {role} position at {company} and I'm very interested in this opportunity.{achievement}\n\n\
         {skills_sentence}I believe my background and skills align well with what you're looking for.\n\n\
         I'd love to discuss how I can contribute to your team. Would you be available for a brief conversation?\n\n\
         Best regards,\n\
         {name}",
        name = user.name,
        current_role = user.current_role,
        years = user.years_experience,
        role = profile.role,
        company = profile.company,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserRecord {
        UserRecord {
            name: "Grace Hopper".into(),
            years_experience: 12,
            current_role: "Compiler Engineer".into(),
            top_skills: "COBOL".into(),
            ..Default::default()
        }
    }

    fn profile(skills: &[&str]) -> ProfileRecord {
        ProfileRecord {
            role: "Senior Rust Engineer".into(),
            company: "Acme Corp".into(),
            skills: skills.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_contains_name_role_company_verbatim() {
        let message = fallback_message(&user(), &profile(&[]));
        assert!(message.contains("Grace Hopper"));
        assert!(message.contains("Senior Rust Engineer"));
        assert!(message.contains("Acme Corp"));
        assert!(message.ends_with("Best regards,\nGrace Hopper"));
        assert!(!message.contains("I noticed"));
    }

    #[test]
    fn test_names_first_three_skills() {
        let message = fallback_message(&user(), &profile(&["Rust", "Tokio", "Kafka", "AWS"]));
        assert!(message.contains("I noticed the role calls for Rust, Tokio, Kafka. "));
        assert!(!message.contains("AWS"));
    }

    #[test]
    fn test_includes_achievement_when_present() {
        let mut u = user();
        u.key_achievement = Some("I cut build times in half".into());
        let message = fallback_message(&u, &profile(&[]));
        assert!(message.contains("Most recently, I cut build times in half."));
    }

    #[test]
    fn test_reads_cleanly_for_any_role_and_achievement() {
        let mut u = user();
        u.current_role = "Engineer".into();
        u.key_achievement = Some("I led the platform migration.".into());
        let message = fallback_message(&u, &profile(&[]));
        assert!(message.contains("working as Engineer for 12 years."));
        assert!(!message.contains(" a Engineer"));
        assert!(message.contains("Most recently, I led the platform migration.\n"));
        assert!(!message.contains(".."));
    }

    #[test]
    fn test_is_deterministic() {
        let (u, p) = (user(), profile(&["Rust"]));
        assert_eq!(fallback_message(&u, &p), fallback_message(&u, &p));
    }
}
