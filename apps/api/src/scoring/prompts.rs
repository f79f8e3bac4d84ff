//! Prompt construction for the rubric evaluator.

use crate::models::job::Job;
use crate::models::profile::Profile;

pub const SCORING_SYSTEM_PROMPT: &str = "\
You are an expert career advisor who evaluates job fit for candidates.
Your goal is to objectively assess how well a job matches a candidate's profile.
Be honest and precise - don't inflate scores. A perfect match is rare.
Consider both hard requirements and soft preferences.";

fn join_or(values: &[String], fallback: &str) -> String {
    if values.is_empty() {
        fallback.to_string()
    } else {
        values.join(", ")
    }
}

fn format_salary_range(min: Option<i64>, max: Option<i64>) -> String {
    match (min, max) {
        (Some(min), Some(max)) => format!("${min} - ${max}"),
        (Some(min), None) => format!("${min}+"),
        (None, Some(max)) => format!("Up to ${max}"),
        (None, None) => "Not specified".to_string(),
    }
}

/// Builds the rubric evaluation prompt for one job against the profile.
/// Dealbreakers are intentionally absent: they are checked locally before the
/// evaluator is ever invoked.
pub fn build_scoring_prompt(job: &Job, profile: &Profile) -> String {
    let name = if profile.name.is_empty() {
        "Candidate"
    } else {
        &profile.name
    };
    let work_types = profile
        .work_types
        .iter()
        .map(|w| w.as_str().to_string())
        .collect::<Vec<_>>();
    let min_salary = profile
        .min_salary
        .map(|s| format!("${s}"))
        .unwrap_or_else(|| "Not specified".to_string());

    format!(
        "Evaluate how well this job matches the candidate's profile.

## Candidate Profile:
- Name: {name}
- Target Titles: {target_titles}
- Years of Experience: {experience_years}
- Skills:
  - Languages: {languages}
  - ML Tools: {ml_tools}
  - Platforms: {platforms}
  - Other: {other_skills}
- Preferred Locations: {locations}
- Preferred Work Types: {work_types}
- Preferred Industries: {industries}
- Minimum Salary: {min_salary}

## Job Posting:
- Title: {job_title}
- Company: {company}
- Location: {location}
- Work Type: {work_type}
- Salary Range: {salary_range}
- Description: {description}
- Requirements: {requirements}

## Scoring Rubric (100 points total):
1. Title Match (25 pts): How well does the job title align with target titles?
2. Skills Match (35 pts): How many required skills does the candidate have?
3. Location/Work Type (15 pts): Does location and work arrangement fit preferences?
4. Salary Fit (10 pts): Is the salary within acceptable range?
5. Experience Level (10 pts): Does the experience level requirement match?
6. Industry Preference (5 pts bonus): Is this in a preferred industry?

Provide your evaluation as JSON with these exact keys:
- \"title_match\": number 0-25
- \"skills_match\": number 0-35
- \"location_work_type\": number 0-15
- \"salary_fit\": number 0-10
- \"experience_level\": number 0-10
- \"industry_bonus\": number 0-5
- \"rationale\": string explaining the sub-scores (2-3 sentences)
- \"matching_skills\": array of skills the candidate has that match requirements
- \"missing_skills\": array of required skills the candidate lacks",
        name = name,
        target_titles = join_or(&profile.target_titles, "Any"),
        experience_years = profile.experience_years,
        languages = join_or(&profile.skills.languages, "Not specified"),
        ml_tools = join_or(&profile.skills.ml_tools, "Not specified"),
        platforms = join_or(&profile.skills.platforms, "Not specified"),
        other_skills = join_or(&profile.skills.other, "Not specified"),
        locations = join_or(&profile.locations, "Any"),
        work_types = join_or(&work_types, "Any"),
        industries = join_or(&profile.industries, "Any"),
        min_salary = min_salary,
        job_title = job.title,
        company = job.company,
        location = job.location.as_deref().unwrap_or("Not specified"),
        work_type = job.work_type.as_str(),
        salary_range = format_salary_range(job.salary_min, job.salary_max),
        description = job.description.as_deref().unwrap_or("Not provided"),
        requirements = job.requirements.as_deref().unwrap_or("Not specified"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn salary_range_formats_cover_all_cases() {
        assert_eq!(
            format_salary_range(Some(100_000), Some(150_000)),
            "$100000 - $150000"
        );
        assert_eq!(format_salary_range(Some(100_000), None), "$100000+");
        assert_eq!(format_salary_range(None, Some(150_000)), "Up to $150000");
        assert_eq!(format_salary_range(None, None), "Not specified");
    }
}
