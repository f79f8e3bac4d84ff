use serde::{Deserialize, Serialize};

use crate::models::job::WorkType;

/// Skills grouped the way the scoring rubric consumes them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Skills {
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub ml_tools: Vec<String>,
    #[serde(default)]
    pub platforms: Vec<String>,
    #[serde(default)]
    pub other: Vec<String>,
}

/// The user's search profile. Read-only input to the scorer; owned by the
/// user and edited only through the profile endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub target_titles: Vec<String>,
    #[serde(default)]
    pub skills: Skills,
    #[serde(default)]
    pub experience_years: u32,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub work_types: Vec<WorkType>,
    #[serde(default)]
    pub industries: Vec<String>,
    #[serde(default)]
    pub min_salary: Option<i64>,
    #[serde(default)]
    pub dealbreakers: Vec<String>,
}

impl Default for Profile {
    fn default() -> Self {
        Profile {
            name: String::new(),
            target_titles: vec![
                "Data Scientist".to_string(),
                "ML Engineer".to_string(),
                "AI Engineer".to_string(),
                "Data Engineer".to_string(),
            ],
            skills: Skills::default(),
            experience_years: 0,
            locations: vec![
                "San Antonio, TX".to_string(),
                "Austin, TX".to_string(),
                "Remote".to_string(),
            ],
            work_types: vec![WorkType::Remote, WorkType::Hybrid],
            industries: Vec::new(),
            min_salary: None,
            dealbreakers: Vec::new(),
        }
    }
}
