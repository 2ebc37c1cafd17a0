//! Output formatting for check reports
//!
//! Text mode prints one block per visible section; list sections become
//! tables. JSON mode prints the view model as-is.

use backgrounder_stream::view::{IdentityView, ResumeView, VerdictView};
use backgrounder_stream::{ReportViewModel, Section, Tier};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use std::fmt::Write;

/// Format a file size in human-readable form
///
/// Examples:
/// - 500 -> "500 B"
/// - 1536 -> "1.5 KB"
/// - 10485760 -> "10.0 MB"
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

pub fn tier_color(tier: Tier) -> Color {
    match tier {
        Tier::Positive => Color::Green,
        Tier::Caution => Color::Yellow,
        Tier::Negative => Color::Red,
        Tier::Neutral => Color::Grey,
    }
}

/// Print the report to stdout.
pub fn print_report(report: &ReportViewModel, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", render_report(report));
    }
    Ok(())
}

/// Render every visible section as plain text.
pub fn render_report(report: &ReportViewModel) -> String {
    let mut out = String::new();
    let title = if report.name.is_empty() {
        "BACKGROUND CHECK".to_string()
    } else {
        format!("BACKGROUND CHECK: {}", report.name)
    };
    let _ = writeln!(out, "{}", title);
    let _ = writeln!(out, "{}", "=".repeat(title.chars().count()));

    if let Some(verdict) = report.verdict.as_visible() {
        render_verdict(&mut out, verdict);
    }
    if let Section::Visible(summary) = &report.summary {
        heading(&mut out, "Summary");
        let _ = writeln!(out, "{}", summary);
    }
    if let Section::Visible(background) = &report.professional_background {
        heading(&mut out, "Professional Background");
        let _ = writeln!(out, "{}", background);
    }
    if let Some(resume) = report.resume.as_visible() {
        render_resume(&mut out, resume);
    }
    if let Some(identity) = report.identity.as_visible() {
        render_identity(&mut out, identity);
    }
    if let Some(highlights) = report.highlights.as_visible() {
        heading(&mut out, "Key Highlights");
        bullets(&mut out, highlights);
    }
    if let Some(experience) = report.experience.as_visible() {
        heading(&mut out, "Experience");
        let rows = experience
            .iter()
            .map(|e| vec![text(&e.title), text(&e.company), text(&e.duration)])
            .collect();
        table(&mut out, &["Title", "Company", "Duration"], rows);
    }
    if let Some(education) = report.education.as_visible() {
        heading(&mut out, "Education");
        let rows = education
            .iter()
            .map(|e| vec![text(&e.school), text(&e.degree), text(&e.field)])
            .collect();
        table(&mut out, &["School", "Degree", "Field"], rows);
    }
    if let Some(skills) = report.skills.as_visible() {
        heading(&mut out, "Skills");
        let _ = writeln!(out, "{}", skills.join(", "));
    }
    if let Some(matches) = report.photo_matches.as_visible() {
        heading(&mut out, "Photo Matches");
        let rows = matches
            .iter()
            .map(|m| {
                let source = m.platform.clone().unwrap_or_else(|| m.source.clone());
                vec![m.title.clone(), source, m.url.clone()]
            })
            .collect();
        table(&mut out, &["Title", "Source", "URL"], rows);
    }
    if let Some(checks) = report.company_checks.as_visible() {
        heading(&mut out, "Company Verification");
        let mut t = new_table(&["Company", "Status", "Evidence"]);
        for check in checks {
            let (status, color) = if check.verified {
                ("Verified", Color::Green)
            } else {
                ("Unverified", Color::Red)
            };
            t.add_row(vec![
                Cell::new(&check.name),
                Cell::new(status).fg(color),
                Cell::new(check.evidence_url.as_deref().unwrap_or(&check.description)),
            ]);
        }
        let _ = writeln!(out, "{}", t);
    }
    if let Some(profiles) = report.social_profiles.as_visible() {
        heading(&mut out, "Social Profiles");
        let rows = profiles
            .iter()
            .map(|p| vec![p.platform.clone(), text(&p.username), p.url.clone()])
            .collect();
        table(&mut out, &["Platform", "Username", "URL"], rows);
    }
    if let Some(profiles) = report.github_profiles.as_visible() {
        heading(&mut out, "GitHub");
        let rows = profiles
            .iter()
            .map(|p| {
                vec![
                    p.username.clone(),
                    p.public_repos.to_string(),
                    p.followers.to_string(),
                    p.top_repos
                        .iter()
                        .map(|r| r.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                ]
            })
            .collect();
        table(&mut out, &["Username", "Repos", "Followers", "Top Repos"], rows);
    }
    if let Some(news) = report.news_mentions.as_visible() {
        heading(&mut out, "News Mentions");
        let rows = news
            .iter()
            .map(|n| vec![n.title.clone(), n.source.clone(), n.url.clone()])
            .collect();
        table(&mut out, &["Title", "Source", "URL"], rows);
    }
    if let Some(contacts) = report.reference_contacts.as_visible() {
        heading(&mut out, "Reference Contacts");
        let rows = contacts
            .iter()
            .map(|c| {
                vec![
                    c.name.clone(),
                    c.title.clone(),
                    c.company.clone(),
                    c.category.clone(),
                ]
            })
            .collect();
        table(&mut out, &["Name", "Title", "Company", "Category"], rows);
    }
    if let Some(footer) = report.footer.as_visible() {
        let _ = writeln!(out);
        let _ = writeln!(out, "---");
        if let Some(generated) = &footer.generated_at {
            let _ = writeln!(out, "Generated: {}", generated);
        }
        if !footer.sources_used.is_empty() {
            let _ = writeln!(out, "Sources:   {}", footer.sources_used.join(", "));
        }
        if let Some(provider) = &footer.provider_used {
            let _ = writeln!(out, "Provider:  {}", provider);
        }
        if let Some(note) = &footer.confidence_note {
            let _ = writeln!(out, "Note:      {}", note);
        }
    }

    out
}

fn render_verdict(out: &mut String, verdict: &VerdictView) {
    heading(out, "Verdict");
    let _ = writeln!(
        out,
        "{} ({}/100, {})",
        verdict.rating_label,
        verdict.score,
        tier_label(verdict.tier)
    );
    if !verdict.summary.is_empty() {
        let _ = writeln!(out, "{}", verdict.summary);
    }
    if !verdict.comparisons.is_empty() {
        let _ = writeln!(out);
        let mut t = new_table(&["Resume vs Online"]);
        for entry in &verdict.comparisons {
            t.add_row(vec![Cell::new(&entry.text).fg(tier_color(entry.tier))]);
        }
        let _ = writeln!(out, "{}", t);
    }
    for (label, items) in [
        ("Red flags", &verdict.red_flags),
        ("Green flags", &verdict.green_flags),
        ("Recommendations", &verdict.recommendations),
    ] {
        if !items.is_empty() {
            let _ = writeln!(out, "{}:", label);
            bullets(out, items);
        }
    }
}

fn render_resume(out: &mut String, resume: &ResumeView) {
    heading(out, "Resume");
    let fields = [
        ("Name", &resume.name),
        ("Title", &resume.title),
        ("Company", &resume.company),
        ("Location", &resume.location),
        ("Email", &resume.email),
        ("Phone", &resume.phone),
    ];
    for (label, value) in fields {
        if let Some(value) = value {
            let _ = writeln!(out, "{:<10}{}", format!("{}:", label), value);
        }
    }
    for (label, url) in &resume.links {
        let _ = writeln!(out, "{:<10}{}", format!("{}:", label), url);
    }
    if !resume.certifications.is_empty() {
        let _ = writeln!(out, "Certifications:");
        bullets(out, &resume.certifications);
    }
    if !resume.key_search_terms.is_empty() {
        let _ = writeln!(out, "Search terms: {}", resume.key_search_terms.join(", "));
    }
}

fn render_identity(out: &mut String, identity: &IdentityView) {
    heading(out, "Identity Verification");
    let confidence = if identity.confidence.is_empty() {
        "unknown"
    } else {
        identity.confidence.as_str()
    };
    let _ = writeln!(out, "Confidence: {} ({})", confidence, tier_label(identity.tier));
    if identity.multiple_people_detected {
        let _ = writeln!(out, "Multiple people share this name");
    }
    if !identity.reasoning.is_empty() {
        let _ = writeln!(out, "{}", identity.reasoning);
    }
    if !identity.profiles_found.is_empty() {
        let rows = identity
            .profiles_found
            .iter()
            .map(|p| vec![text(&p.source), text(&p.name), text(&p.description)])
            .collect();
        table(out, &["Source", "Name", "Description"], rows);
    }
    if !identity.cross_reference_notes.is_empty() {
        bullets(out, &identity.cross_reference_notes);
    }
}

fn tier_label(tier: Tier) -> &'static str {
    match tier {
        Tier::Positive => "positive",
        Tier::Caution => "caution",
        Tier::Negative => "negative",
        Tier::Neutral => "neutral",
    }
}

fn heading(out: &mut String, title: &str) {
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", title.to_uppercase());
}

fn bullets(out: &mut String, items: &[String]) {
    for item in items {
        let _ = writeln!(out, "  - {}", item);
    }
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn new_table(headers: &[&str]) -> Table {
    let mut t = Table::new();
    t.load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);
    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| Cell::new(h).fg(Color::Cyan))
        .collect();
    t.set_header(header_cells);
    t
}

fn table(out: &mut String, headers: &[&str], rows: Vec<Vec<String>>) {
    let mut t = new_table(headers);
    for row in rows {
        t.add_row(row);
    }
    let _ = writeln!(out, "{}", t);
}
