// Prompt composition for the Generation module.

use crate::models::records::{ProfileRecord, UserRecord};

/// Number of extracted skills named in the prompt.
pub const PROMPT_SKILL_COUNT: usize = 5;

/// Builds the outreach prompt. Deterministic: the same records always yield the same text.
///
/// Single pass: record text is inserted verbatim, braces included.
pub fn build_outreach_prompt(user: &UserRecord, profile: &ProfileRecord) -> String {
    format!(
        r#"You are a professional career coach helping write personalized LinkedIn outreach messages.

Write a professional, concise, and personalized outreach message for a LinkedIn connection request or direct message to a recruiter/hiring manager.

User Information:
{user_block}

Job Information:
- Role: {role}
- Company: {company}
- Required Skills: {skills}

Instructions:
1. Keep the message under 200 words
2. Be professional but friendly
3. Highlight relevant experience and skills that match the job requirements
4. If the user has a key achievement, subtly incorporate it if relevant
5. Show genuine interest in the role and company
6. Include a clear call to action
7. Do not use overly formal language
8. Make it personal, not templated
9. If portfolio URL is provided, consider mentioning it naturally
10. Sign off with just the user's name (already provided)

Generate the outreach message now:"#,
        user_block = user_block(user),
        role = profile.role,
        company = profile.company,
        skills = required_skills(profile),
    )
}

fn user_block(user: &UserRecord) -> String {
    let mut lines = vec![
        format!("- Name: {}", user.name),
        format!("- Current Role: {}", user.current_role),
        format!("- Years of Experience: {} years", user.years_experience),
        format!("- Top Skills: {}", user.top_skills),
    ];
    if let Some(achievement) = &user.key_achievement {
        lines.push(format!("- Key Achievement: {achievement}"));
    }
    if let Some(location) = &user.location {
        lines.push(format!("- Location: {location}"));
    }
    if let Some(portfolio) = &user.portfolio_url {
        lines.push(format!("- Portfolio: {portfolio}"));
    }
    lines.join("\n")
}

/// First five skills joined, or "not specified".
pub fn required_skills(profile: &ProfileRecord) -> String {
    if profile.skills.is_empty() {
        "not specified".to_string()
    } else {
        profile
            .skills
            .iter()
            .take(PROMPT_SKILL_COUNT)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}
