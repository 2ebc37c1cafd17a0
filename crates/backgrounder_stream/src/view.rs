//! Report materializer.
//!
//! Turns the sparse report payload into a view model where every facet
//! carries an explicit presence flag. Each section is evaluated on its
//! own; a missing or empty field hides that section and nothing else.

use crate::report::{
    BackgroundReport, CompanyCheck, EducationItem, ExperienceItem, GitHubProfile,
    IdentityVerification, PhotoMatch, ProfileMention, ReferenceContact, ResumeData,
    SearchResult, SocialProfile, Verdict,
};
use chrono::{DateTime, FixedOffset};
use serde::Serialize;

/// Presence-flagged section.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "presence", content = "data", rename_all = "snake_case")]
pub enum Section<T> {
    Hidden,
    Visible(T),
}

impl<T> Section<T> {
    pub fn is_visible(&self) -> bool {
        matches!(self, Section::Visible(_))
    }

    pub fn as_visible(&self) -> Option<&T> {
        match self {
            Section::Visible(value) => Some(value),
            Section::Hidden => None,
        }
    }

    fn from_option(value: Option<T>) -> Self {
        value.map_or(Section::Hidden, Section::Visible)
    }
}

impl<T> Section<Vec<T>> {
    fn from_list(items: Vec<T>) -> Self {
        if items.is_empty() {
            Section::Hidden
        } else {
            Section::Visible(items)
        }
    }
}

impl Section<String> {
    fn from_text(text: String) -> Self {
        if text.trim().is_empty() {
            Section::Hidden
        } else {
            Section::Visible(text)
        }
    }
}

/// Display tier shared by every colored element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Positive,
    Caution,
    Negative,
    Neutral,
}

impl Tier {
    /// >= 80 positive, >= 50 caution, else negative.
    pub fn from_score(score: u8) -> Self {
        if score >= 80 {
            Tier::Positive
        } else if score >= 50 {
            Tier::Caution
        } else {
            Tier::Negative
        }
    }
}

/// Verdict rating. Unknown ratings are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Clean,
    Caution,
    RedFlags,
    Other(String),
}

impl Rating {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "clean" => Rating::Clean,
            "caution" => Rating::Caution,
            "red_flags" => Rating::RedFlags,
            _ => Rating::Other(raw.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Rating::Clean => "Clean",
            Rating::Caution => "Caution",
            Rating::RedFlags => "Red Flags",
            Rating::Other(raw) => raw,
        }
    }
}

/// Resume-vs-online finding class, by message prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonKind {
    Verified,
    Contradicted,
    Unverified,
    Unclassified,
}

impl ComparisonKind {
    pub fn classify(entry: &str) -> Self {
        let entry = entry.trim_start();
        if entry.starts_with("VERIFIED") {
            ComparisonKind::Verified
        } else if entry.starts_with("CONTRADICTED") {
            ComparisonKind::Contradicted
        } else if entry.starts_with("UNVERIFIED") {
            ComparisonKind::Unverified
        } else {
            ComparisonKind::Unclassified
        }
    }

    pub fn tier(self) -> Tier {
        match self {
            ComparisonKind::Verified => Tier::Positive,
            ComparisonKind::Contradicted => Tier::Negative,
            ComparisonKind::Unverified => Tier::Caution,
            ComparisonKind::Unclassified => Tier::Neutral,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonEntry {
    pub text: String,
    pub kind: ComparisonKind,
    pub tier: Tier,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerdictView {
    pub rating: Rating,
    pub rating_label: String,
    /// Clamped to 0..=100.
    pub score: u8,
    pub tier: Tier,
    pub summary: String,
    pub comparisons: Vec<ComparisonEntry>,
    pub red_flags: Vec<String>,
    pub green_flags: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityView {
    pub confidence: String,
    pub tier: Tier,
    pub reasoning: String,
    pub multiple_people_detected: bool,
    pub profiles_found: Vec<ProfileMention>,
    pub cross_reference_notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResumeView {
    pub name: Option<String>,
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// (kind, url) for LinkedIn, GitHub and personal site.
    pub links: Vec<(String, String)>,
    pub certifications: Vec<String>,
    pub key_search_terms: Vec<String>,
}

impl ResumeView {
    /// Nothing worth a resume card.
    pub fn is_empty(&self) -> bool {
        [&self.name, &self.title, &self.company, &self.location, &self.email, &self.phone]
            .iter()
            .all(|field| field.is_none())
            && self.links.is_empty()
            && self.certifications.is_empty()
            && self.key_search_terms.is_empty()
    }
}

impl IdentityView {
    pub fn is_empty(&self) -> bool {
        self.confidence.trim().is_empty()
            && self.reasoning.trim().is_empty()
            && !self.multiple_people_detected
            && self.profiles_found.is_empty()
            && self.cross_reference_notes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FooterView {
    pub generated_at: Option<String>,
    pub sources_used: Vec<String>,
    pub provider_used: Option<String>,
    pub confidence_note: Option<String>,
}

/// Normalized, renderable report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportViewModel {
    pub name: String,
    pub verdict: Section<VerdictView>,
    pub summary: Section<String>,
    pub professional_background: Section<String>,
    pub resume: Section<ResumeView>,
    pub identity: Section<IdentityView>,
    pub highlights: Section<Vec<String>>,
    pub experience: Section<Vec<ExperienceItem>>,
    pub education: Section<Vec<EducationItem>>,
    pub skills: Section<Vec<String>>,
    pub photo_matches: Section<Vec<PhotoMatch>>,
    pub company_checks: Section<Vec<CompanyCheck>>,
    pub social_profiles: Section<Vec<SocialProfile>>,
    pub github_profiles: Section<Vec<GitHubProfile>>,
    pub news_mentions: Section<Vec<SearchResult>>,
    pub reference_contacts: Section<Vec<ReferenceContact>>,
    pub footer: Section<FooterView>,
}

impl ReportViewModel {
    /// Names of the sections currently visible, in display order.
    pub fn visible_sections(&self) -> Vec<&'static str> {
        [
            ("verdict", self.verdict.is_visible()),
            ("summary", self.summary.is_visible()),
            ("professional_background", self.professional_background.is_visible()),
            ("resume", self.resume.is_visible()),
            ("identity", self.identity.is_visible()),
            ("highlights", self.highlights.is_visible()),
            ("experience", self.experience.is_visible()),
            ("education", self.education.is_visible()),
            ("skills", self.skills.is_visible()),
            ("photo_matches", self.photo_matches.is_visible()),
            ("company_checks", self.company_checks.is_visible()),
            ("social_profiles", self.social_profiles.is_visible()),
            ("github_profiles", self.github_profiles.is_visible()),
            ("news_mentions", self.news_mentions.is_visible()),
            ("reference_contacts", self.reference_contacts.is_visible()),
            ("footer", self.footer.is_visible()),
        ]
        .into_iter()
        .filter_map(|(name, visible)| visible.then_some(name))
        .collect()
    }
}

/// Build the view model. Never fails; absent data hides sections.
pub fn materialize(report: BackgroundReport) -> ReportViewModel {
    let BackgroundReport {
        name,
        generated_at,
        linkedin_profile,
        github_profiles,
        resume_data,
        company_checks,
        social_profiles,
        photo_matches,
        reference_contacts,
        identity_verification,
        verdict,
        summary,
        professional_background,
        key_highlights,
        news_mentions,
        sources_used,
        provider_used,
        confidence_note,
    } = report;

    // LinkedIn lists take precedence; the resume fills in when they are empty.
    let linkedin = linkedin_profile.unwrap_or_default();
    let resume_lists = resume_data.as_ref();
    let experience = prefer_non_empty(linkedin.experience, || {
        resume_lists.map(|r| r.experience.clone()).unwrap_or_default()
    });
    let education = prefer_non_empty(linkedin.education, || {
        resume_lists.map(|r| r.education.clone()).unwrap_or_default()
    });
    let skills = prefer_non_empty(linkedin.skills, || {
        resume_lists.map(|r| r.skills.clone()).unwrap_or_default()
    });

    ReportViewModel {
        name,
        verdict: Section::from_option(verdict.map(verdict_view)),
        summary: Section::from_text(summary),
        professional_background: Section::from_text(professional_background),
        resume: Section::from_option(resume_data.map(resume_view).filter(|r| !r.is_empty())),
        identity: Section::from_option(
            identity_verification
                .map(identity_view)
                .filter(|i| !i.is_empty()),
        ),
        highlights: Section::from_list(non_blank(key_highlights)),
        experience: Section::from_list(experience),
        education: Section::from_list(education),
        skills: Section::from_list(non_blank(skills)),
        photo_matches: Section::from_list(photo_matches),
        company_checks: Section::from_list(company_checks),
        social_profiles: Section::from_list(social_profiles),
        github_profiles: Section::from_list(github_profiles),
        news_mentions: Section::from_list(news_mentions),
        reference_contacts: Section::from_list(reference_contacts),
        footer: Section::from_option(footer_view(
            generated_at,
            sources_used,
            provider_used,
            confidence_note,
        )),
    }
}

fn prefer_non_empty<T>(primary: Vec<T>, fallback: impl FnOnce() -> Vec<T>) -> Vec<T> {
    if primary.is_empty() {
        fallback()
    } else {
        primary
    }
}

fn non_blank(items: Vec<String>) -> Vec<String> {
    items.into_iter().filter(|s| !s.trim().is_empty()).collect()
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn clamp_score(score: Option<f64>) -> u8 {
    match score {
        Some(s) if s.is_finite() => s.round().clamp(0.0, 100.0) as u8,
        _ => 0,
    }
}

fn verdict_view(verdict: Verdict) -> VerdictView {
    let rating = Rating::parse(&verdict.rating);
    let score = clamp_score(verdict.score);
    VerdictView {
        rating_label: rating.label().to_string(),
        rating,
        score,
        tier: Tier::from_score(score),
        summary: verdict.summary,
        comparisons: verdict
            .resume_vs_online
            .into_iter()
            .map(|text| {
                let kind = ComparisonKind::classify(&text);
                ComparisonEntry {
                    text,
                    kind,
                    tier: kind.tier(),
                }
            })
            .collect(),
        red_flags: non_blank(verdict.red_flags),
        green_flags: non_blank(verdict.green_flags),
        recommendations: non_blank(verdict.recommendations),
    }
}

fn identity_view(identity: IdentityVerification) -> IdentityView {
    let tier = match identity.confidence.trim().to_ascii_lowercase().as_str() {
        "high" => Tier::Positive,
        "medium" => Tier::Caution,
        "low" => Tier::Negative,
        _ => Tier::Neutral,
    };
    IdentityView {
        confidence: identity.confidence,
        tier,
        reasoning: identity.reasoning,
        multiple_people_detected: identity.multiple_people_detected,
        profiles_found: identity.profiles_found,
        cross_reference_notes: non_blank(identity.cross_reference_notes),
    }
}

fn resume_view(resume: ResumeData) -> ResumeView {
    let links = [
        ("LinkedIn", resume.linkedin_url),
        ("GitHub", resume.github_url),
        ("Website", resume.website),
    ]
    .into_iter()
    .filter_map(|(kind, url)| present(url).map(|url| (kind.to_string(), url)))
    .collect();

    ResumeView {
        name: present(resume.name),
        title: present(resume.title),
        company: present(resume.company),
        location: present(resume.location),
        email: present(resume.email),
        phone: present(resume.phone),
        links,
        certifications: non_blank(resume.certifications),
        key_search_terms: non_blank(resume.key_search_terms),
    }
}

fn footer_view(
    generated_at: Option<String>,
    sources_used: Vec<String>,
    provider_used: String,
    confidence_note: String,
) -> Option<FooterView> {
    let footer = FooterView {
        generated_at: present(generated_at).map(|raw| format_timestamp(&raw)),
        sources_used: non_blank(sources_used),
        provider_used: present(Some(provider_used)),
        confidence_note: present(Some(confidence_note)),
    };
    let empty = footer.generated_at.is_none()
        && footer.sources_used.is_empty()
        && footer.provider_used.is_none()
        && footer.confidence_note.is_none();
    (!empty).then_some(footer)
}

/// Render a server timestamp as `YYYY-MM-DD HH:MM UTC`. The server may send
/// RFC 3339 or a space-separated form; anything else is shown verbatim.
fn format_timestamp(raw: &str) -> String {
    let parsed = DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::<FixedOffset>::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z"));
    match parsed {
        Ok(ts) => ts.naive_utc().format("%Y-%m-%d %H:%M UTC").to_string(),
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(json: &str) -> ReportViewModel {
        materialize(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_empty_report_hides_everything() {
        let model = view("{}");
        assert!(model.visible_sections().is_empty());
    }

    #[test]
    fn test_score_tiers() {
        assert_eq!(Tier::from_score(100), Tier::Positive);
        assert_eq!(Tier::from_score(80), Tier::Positive);
        assert_eq!(Tier::from_score(79), Tier::Caution);
        assert_eq!(Tier::from_score(50), Tier::Caution);
        assert_eq!(Tier::from_score(49), Tier::Negative);
        assert_eq!(Tier::from_score(0), Tier::Negative);
    }

    #[test]
    fn test_score_is_clamped() {
        assert_eq!(clamp_score(Some(140.0)), 100);
        assert_eq!(clamp_score(Some(-3.0)), 0);
        assert_eq!(clamp_score(Some(61.6)), 62);
        assert_eq!(clamp_score(Some(f64::NAN)), 0);
        assert_eq!(clamp_score(None), 0);
    }

    #[test]
    fn test_verdict_view() {
        let model = view(
            r#"{"verdict":{"rating":"caution","score":62,"summary":"Mostly consistent",
                "resume_vs_online":["VERIFIED: Title at Acme","CONTRADICTED: Start date",
                                     "UNVERIFIED: MBA","Some free-form note"],
                "red_flags":["", "Gap in 2019"]}}"#,
        );
        let verdict = model.verdict.as_visible().unwrap();
        assert_eq!(verdict.rating, Rating::Caution);
        assert_eq!(verdict.rating_label, "Caution");
        assert_eq!(verdict.score, 62);
        assert_eq!(verdict.tier, Tier::Caution);
        assert_eq!(verdict.red_flags, vec!["Gap in 2019".to_string()]);

        let tiers: Vec<_> = verdict.comparisons.iter().map(|c| c.tier).collect();
        assert_eq!(
            tiers,
            vec![Tier::Positive, Tier::Negative, Tier::Caution, Tier::Neutral]
        );
    }

    #[test]
    fn test_unknown_rating_passes_through() {
        let model = view(r#"{"verdict":{"rating":"mixed_signals","score":90}}"#);
        let verdict = model.verdict.as_visible().unwrap();
        assert_eq!(verdict.rating, Rating::Other("mixed_signals".to_string()));
        assert_eq!(verdict.rating_label, "mixed_signals");
        assert_eq!(verdict.tier, Tier::Positive);
    }

    #[test]
    fn test_rating_vocabulary() {
        assert_eq!(Rating::parse("red_flags").label(), "Red Flags");
        assert_eq!(Rating::parse("Clean"), Rating::Clean);
    }

    #[test]
    fn test_experience_falls_back_to_resume() {
        let model = view(
            r#"{"linkedin_profile":{"experience":[],"skills":["Rust"]},
                "resume_data":{"experience":[{"title":"Engineer","company":"Acme"}],
                               "skills":["Go"]}}"#,
        );
        let experience = model.experience.as_visible().unwrap();
        assert_eq!(experience[0].company.as_deref(), Some("Acme"));
        assert_eq!(model.skills.as_visible().unwrap(), &vec!["Rust".to_string()]);
        assert!(!model.education.is_visible());
    }

    #[test]
    fn test_blank_strings_hide_sections() {
        let model = view(r#"{"summary":"   ","professional_background":"Led teams."}"#);
        assert!(!model.summary.is_visible());
        assert!(model.professional_background.is_visible());
    }

    #[test]
    fn test_identity_tier() {
        let model = view(
            r#"{"identity_verification":{"confidence":"High","reasoning":"Matching photos",
                "multiple_people_detected":true}}"#,
        );
        let identity = model.identity.as_visible().unwrap();
        assert_eq!(identity.tier, Tier::Positive);
        assert!(identity.multiple_people_detected);
    }

    #[test]
    fn test_resume_links() {
        let model = view(
            r#"{"resume_data":{"name":"Jane","github_url":"https://github.com/jane","website":""}}"#,
        );
        let resume = model.resume.as_visible().unwrap();
        assert_eq!(
            resume.links,
            vec![("GitHub".to_string(), "https://github.com/jane".to_string())]
        );
    }

    #[test]
    fn test_footer() {
        let model = view(
            r#"{"generated_at":"2025-03-04 17:05:09.123456+00:00","sources_used":["Resume (uploaded)"],
                "provider_used":"PlaywrightProvider","confidence_note":""}"#,
        );
        let footer = model.footer.as_visible().unwrap();
        assert_eq!(footer.generated_at.as_deref(), Some("2025-03-04 17:05 UTC"));
        assert_eq!(footer.provider_used.as_deref(), Some("PlaywrightProvider"));
        assert!(footer.confidence_note.is_none());
    }

    #[test]
    fn test_timestamp_fallback() {
        assert_eq!(format_timestamp("2025-03-04T17:05:09Z"), "2025-03-04 17:05 UTC");
        assert_eq!(format_timestamp("yesterday"), "yesterday");
    }

    #[test]
    fn test_section_serialization() {
        let hidden: Section<Vec<String>> = Section::Hidden;
        assert_eq!(
            serde_json::to_value(&hidden).unwrap(),
            serde_json::json!({"presence": "hidden"})
        );
        let visible = Section::Visible(vec!["a".to_string()]);
        assert_eq!(
            serde_json::to_value(&visible).unwrap(),
            serde_json::json!({"presence": "visible", "data": ["a"]})
        );
    }

    #[test]
    fn test_empty_objects_hide_resume_and_identity() {
        let model = view(
            r#"{"resume_data":{"name":" ","skills":["Go"],"website":""},
                "identity_verification":{"confidence":"","profiles_found":[],"reasoning":null}}"#,
        );
        assert!(!model.resume.is_visible());
        assert!(!model.identity.is_visible());
        assert_eq!(model.visible_sections(), vec!["skills"]);

        let model = view(r#"{"identity_verification":{"multiple_people_detected":true}}"#);
        assert!(model.identity.is_visible());
    }
}
