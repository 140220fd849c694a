// Instruction templates for the two LLM stages. Both can be replaced at startup
// from files (JD_PROMPT_PATH, MATCH_PROMPT_PATH); these are the built-in defaults.

use crate::analysis::requirements::RequirementSet;

/// Placeholder in the match template that receives the rendered requirements.
pub const REQUIREMENTS_PLACEHOLDER: &str = "{requirements}";

const EMPTY_SECTION: &str = "- NO SPECIFIC REQUIREMENT FOR SECTION";

/// Requirement extraction. Sent alongside the job description PDF.
pub const JD_EXTRACTION_PROMPT: &str = r#"You are an expert HR analyst. Analyze the attached Job Description document and extract its key requirements.
Focus on specific, actionable items for education, experience, and skills.

Return a JSON object with exactly three top-level keys: "education", "experience", and "skills".
Each key maps to a list of strings, one distinct requirement per string.
If a category has no specific items, use an empty list for that category.
Your entire response must be ONLY the JSON object, with no commentary and no Markdown formatting.

Example:
{
  "education": ["Bachelor's degree in Computer Science or related field"],
  "experience": ["5+ years of experience in software development", "Experience with Python and Django"],
  "skills": ["Proficiency in JavaScript", "Strong problem-solving abilities"]
}"#;

/// Candidate matching. `{requirements}` is replaced with `render_requirements`.
pub const MATCH_PROMPT_TEMPLATE: &str = r#"You are an expert HR assistant specializing in CV and Job Description matching.
Analyze the attached CV document against the Job Description requirements below.

{requirements}

Based on the CV and the requirements:
1. Decide "Match" or "No Match". A candidate is a "Match" ONLY IF they meet ALL explicitly testable requirements (a named degree, a minimum number of years of experience, a named mandatory skill). If any testable requirement is not clearly met or is absent from the CV, the candidate is "No Match". Ambiguity or missing information about a testable requirement means "No Match".
2. Give a numerical score between 0 and 100 for overall suitability, considering both testable and preferred requirements. 100 is perfect alignment, 0 is none. The score may be moderate even for "No Match".
3. Give a brief explanation citing the key factors from the CV and the specific requirements met or missed.

Respond with ONLY this JSON object, with no text before or after it:
{
  "match_status": "Match" or "No Match",
  "numerical_score": <integer between 0 and 100>,
  "explanation": "Your brief explanation here.",
  "detailed_match_info": {
    "education_met": ["..."],
    "education_missed": ["..."],
    "experience_met": ["..."],
    "experience_missed": ["..."],
    "skills_met": ["..."],
    "skills_missed": ["..."]
  }
}

Read the requirements literally. If the JD asks for "at least 3-5 years of experience" and the CV shows 2 years, that requirement is missed. If the JD requires a "bachelor's degree in business administration" and the CV shows a "bachelor's degree in marketing", that requirement is missed unless "related field" was specified and marketing is related."#;

/// Renders each category as a bulleted list under its heading.
pub fn render_requirements(requirements: &RequirementSet) -> String {
    let mut out = String::from("Job Description Requirements:");
    for (heading, items) in [
        ("Education", &requirements.education),
        ("Experience", &requirements.experience),
        ("Skills", &requirements.skills),
    ] {
        out.push_str("\n\n");
        out.push_str(heading);
        out.push_str(":\n");
        if items.is_empty() {
            out.push_str(EMPTY_SECTION);
        } else {
            let bullets: Vec<String> = items.iter().map(|item| format!("- {item}")).collect();
            out.push_str(&bullets.join("\n"));
        }
    }
    out
}

/// Substitutes the rendered requirements into a match template.
pub fn build_match_prompt(template: &str, requirements: &RequirementSet) -> String {
    template.replace(REQUIREMENTS_PLACEHOLDER, &render_requirements(requirements))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_requirements_bullets_and_placeholder() {
        let requirements = RequirementSet {
            education: vec!["BSc Computer Science".to_string()],
            experience: vec![],
            skills: vec!["Rust".to_string(), "PostgreSQL".to_string()],
        };

        assert_eq!(
            render_requirements(&requirements),
            "Job Description Requirements:\n\n\
             Education:\n- BSc Computer Science\n\n\
             Experience:\n- NO SPECIFIC REQUIREMENT FOR SECTION\n\n\
             Skills:\n- Rust\n- PostgreSQL"
        );
    }

    #[test]
    fn test_build_match_prompt_embeds_requirements() {
        let requirements = RequirementSet {
            skills: vec!["Kubernetes".to_string()],
            ..Default::default()
        };
        let prompt = build_match_prompt(MATCH_PROMPT_TEMPLATE, &requirements);

        assert!(!prompt.contains(REQUIREMENTS_PLACEHOLDER));
        assert!(prompt.contains("Skills:\n- Kubernetes"));
        assert!(prompt.contains("Education:\n- NO SPECIFIC REQUIREMENT FOR SECTION"));
    }

    #[test]
    fn test_default_templates() {
        assert!(MATCH_PROMPT_TEMPLATE.contains(REQUIREMENTS_PLACEHOLDER));
        for key in ["\"education\"", "\"experience\"", "\"skills\""] {
            assert!(JD_EXTRACTION_PROMPT.contains(key));
        }
    }
}
