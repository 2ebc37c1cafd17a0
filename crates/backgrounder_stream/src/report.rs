//! Report payload carried by the terminal `result` event.
//!
//! Every field is optional and `null` is treated the same as a missing
//! key, so any JSON object decodes. Deciding what is worth showing is the
//! job of [`crate::view`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Deserialize `null` as the type's default.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accept a score sent as an integer, a float or a numeric string.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

/// Free-form text written by the extraction model. Numbers and bools are
/// stringified, string arrays are joined, anything else is absent.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(value_text))
}

/// List of free-form strings; entries that carry no text are skipped.
fn lenient_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items.into_iter().filter_map(value_text).collect(),
        Some(other) => value_text(other).into_iter().collect(),
        None => Vec::new(),
    })
}

/// List of model-written records; entries of the wrong shape are skipped.
fn lenient_items<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

fn value_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        Value::Null | Value::Object(_) => None,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundReport {
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    pub generated_at: Option<String>,
    pub linkedin_profile: Option<LinkedInProfile>,
    #[serde(deserialize_with = "nullable")]
    pub github_profiles: Vec<GitHubProfile>,
    pub resume_data: Option<ResumeData>,
    #[serde(deserialize_with = "nullable")]
    pub company_checks: Vec<CompanyCheck>,
    #[serde(deserialize_with = "nullable")]
    pub social_profiles: Vec<SocialProfile>,
    #[serde(deserialize_with = "nullable")]
    pub photo_matches: Vec<PhotoMatch>,
    #[serde(deserialize_with = "nullable")]
    pub reference_contacts: Vec<ReferenceContact>,
    pub identity_verification: Option<IdentityVerification>,
    pub verdict: Option<Verdict>,
    #[serde(deserialize_with = "nullable")]
    pub summary: String,
    #[serde(deserialize_with = "nullable")]
    pub professional_background: String,
    #[serde(deserialize_with = "nullable")]
    pub key_highlights: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub news_mentions: Vec<SearchResult>,
    #[serde(deserialize_with = "nullable")]
    pub sources_used: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub provider_used: String,
    #[serde(deserialize_with = "nullable")]
    pub confidence_note: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkedInProfile {
    #[serde(deserialize_with = "lenient_text")]
    pub url: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub headline: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub location: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub summary: Option<String>,
    #[serde(deserialize_with = "lenient_items")]
    pub experience: Vec<ExperienceItem>,
    #[serde(deserialize_with = "lenient_items")]
    pub education: Vec<EducationItem>,
    #[serde(deserialize_with = "lenient_strings")]
    pub skills: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub certifications: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResumeData {
    #[serde(deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub email: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub phone: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub location: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub company: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub linkedin_url: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub github_url: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub website: Option<String>,
    #[serde(deserialize_with = "lenient_strings")]
    pub skills: Vec<String>,
    #[serde(deserialize_with = "lenient_items")]
    pub experience: Vec<ExperienceItem>,
    #[serde(deserialize_with = "lenient_items")]
    pub education: Vec<EducationItem>,
    #[serde(deserialize_with = "lenient_strings")]
    pub certifications: Vec<String>,
    #[serde(deserialize_with = "lenient_strings")]
    pub key_search_terms: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperienceItem {
    #[serde(deserialize_with = "lenient_text")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub company: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub duration: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EducationItem {
    #[serde(deserialize_with = "lenient_text")]
    pub school: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub degree: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub field: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubProfile {
    #[serde(deserialize_with = "nullable")]
    pub username: String,
    #[serde(deserialize_with = "nullable")]
    pub url: String,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub blog: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub public_repos: u64,
    #[serde(deserialize_with = "nullable")]
    pub followers: u64,
    #[serde(deserialize_with = "nullable")]
    pub following: u64,
    #[serde(deserialize_with = "nullable")]
    pub top_repos: Vec<Repository>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Repository {
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub description: String,
    #[serde(deserialize_with = "nullable")]
    pub stars: u64,
    #[serde(deserialize_with = "nullable")]
    pub language: String,
    #[serde(deserialize_with = "nullable")]
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyCheck {
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub verified: bool,
    pub evidence_url: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocialProfile {
    #[serde(deserialize_with = "nullable")]
    pub platform: String,
    #[serde(deserialize_with = "nullable")]
    pub url: String,
    pub username: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub snippet: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotoMatch {
    #[serde(deserialize_with = "nullable")]
    pub url: String,
    #[serde(deserialize_with = "nullable")]
    pub title: String,
    #[serde(deserialize_with = "nullable")]
    pub source: String,
    #[serde(deserialize_with = "nullable")]
    pub thumbnail: String,
    pub platform: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceContact {
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub title: String,
    #[serde(deserialize_with = "nullable")]
    pub company: String,
    pub linkedin_url: Option<String>,
    /// "HR / People Ops", "Management", "Same Department", ...
    #[serde(deserialize_with = "nullable")]
    pub category: String,
    #[serde(deserialize_with = "nullable")]
    pub snippet: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityVerification {
    /// "high", "medium" or "low"
    #[serde(deserialize_with = "nullable")]
    pub confidence: String,
    #[serde(deserialize_with = "nullable")]
    pub reasoning: String,
    #[serde(deserialize_with = "nullable")]
    pub multiple_people_detected: bool,
    #[serde(deserialize_with = "lenient_items")]
    pub profiles_found: Vec<ProfileMention>,
    #[serde(deserialize_with = "lenient_strings")]
    pub cross_reference_notes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileMention {
    #[serde(deserialize_with = "lenient_text")]
    pub source: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Verdict {
    /// "clean", "caution" or "red_flags"; other values are kept verbatim.
    #[serde(deserialize_with = "nullable")]
    pub rating: String,
    #[serde(deserialize_with = "lenient_number")]
    pub score: Option<f64>,
    #[serde(deserialize_with = "nullable")]
    pub summary: String,
    #[serde(deserialize_with = "nullable")]
    pub resume_vs_online: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub red_flags: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub green_flags: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchResult {
    #[serde(deserialize_with = "nullable")]
    pub title: String,
    #[serde(deserialize_with = "nullable")]
    pub url: String,
    #[serde(deserialize_with = "nullable")]
    pub snippet: String,
    #[serde(deserialize_with = "nullable")]
    pub source: String,
}
