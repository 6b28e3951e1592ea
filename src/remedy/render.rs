//! Markdown rendering of remedy records
//!
//! Sections are emitted only when at least one of their fields is present.

use std::fmt::Write;

use super::record::{RemedyRecord, StructuredAdvice};
use super::table::RemedyLookup;

/// Shown when a prediction has no static advice
pub const NO_REMEDY_NOTICE: &str =
    "No specific static remedy information available for this prediction.";

fn field(out: &mut String, name: &str, value: Option<&str>) {
    if let Some(value) = value {
        let _ = writeln!(out, "**{name}:** {value}  ");
    }
}

fn bullets(out: &mut String, name: &str, items: Option<&[String]>) {
    if let Some(items) = items {
        let _ = writeln!(out, "**{name}:**");
        for item in items {
            let _ = writeln!(out, "- {item}");
        }
    }
}

fn overview(advice: &StructuredAdvice) -> String {
    let mut out = String::new();
    field(&mut out, "Cause", advice.cause());
    field(&mut out, "Key Symptoms", advice.symptoms());
    field(&mut out, "Severity", advice.severity_text());
    field(&mut out, "Impact on Yield", advice.impact());
    field(&mut out, "Typical Season", advice.season());
    field(&mut out, "Conditions Favoring", advice.conditions_favoring());
    field(&mut out, "Disease Cycle", advice.disease_cycle());
    out
}

fn treatment(advice: &StructuredAdvice) -> String {
    let mut out = String::new();
    field(&mut out, "General Advice", advice.mitigation());
    bullets(&mut out, "Organic/Biological Options", advice.organic_options());
    bullets(&mut out, "Chemical Options", advice.chemical_options());
    bullets(
        &mut out,
        "Recommended Resistant Varieties",
        advice.recommended_varieties(),
    );
    field(&mut out, "Specific Fertilizer", advice.fertilizer());
    field(&mut out, "Fertilizer Calendar Plan", advice.fertilizer_calendar());
    out
}

fn next_steps(advice: &StructuredAdvice) -> String {
    let mut out = String::new();
    for step in advice.next_steps().unwrap_or_default() {
        let _ = writeln!(out, "- [ ] {step}");
    }
    out
}

fn resources(advice: &StructuredAdvice) -> String {
    let mut out = String::new();
    for link in advice.external_links().unwrap_or_default() {
        let _ = writeln!(out, "- [{}]({})", link.title, link.url);
    }
    out
}

/// Markdown for one record
pub fn render_markdown(label: &str, record: &RemedyRecord) -> String {
    let mut out = format!("### For {label}:\n");

    match record {
        RemedyRecord::Plain(text) => {
            let _ = write!(out, "\n{}\n", text.trim());
        }
        RemedyRecord::Structured(advice) => {
            let sections = [
                ("Overview", overview(advice)),
                ("Treatment & Mitigation", treatment(advice)),
                ("Next Steps", next_steps(advice)),
                ("Further Resources", resources(advice)),
            ];
            for (title, body) in sections.iter().filter(|(_, body)| !body.is_empty()) {
                let _ = write!(out, "\n#### {title}\n\n{body}");
            }
        }
    }

    out
}

/// Markdown for a lookup result, including the notice for misses
pub fn render_lookup(label: &str, lookup: &RemedyLookup<'_>) -> String {
    match lookup {
        RemedyLookup::Available(record) => render_markdown(label, record),
        RemedyLookup::Unavailable => format!("{NO_REMEDY_NOTICE}\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remedy::ExternalLink;

    #[test]
    fn test_plain_record() {
        let md = render_markdown("Leafsmut", &RemedyRecord::Plain("  Use clean seed. ".into()));
        assert_eq!(md, "### For Leafsmut:\n\nUse clean seed.\n");
    }

    #[test]
    fn test_only_present_sections_are_rendered() {
        let advice = StructuredAdvice {
            cause: Some("Fungus".into()),
            severity: Some("High: spreads fast".into()),
            next_steps: Some(vec!["Scout weekly".into()]),
            ..Default::default()
        };
        let md = render_markdown("Brownspot", &RemedyRecord::Structured(advice));

        assert!(md.contains("#### Overview"));
        assert!(md.contains("**Cause:** Fungus"));
        assert!(md.contains("**Severity:** High: spreads fast"));
        assert!(md.contains("#### Next Steps\n\n- [ ] Scout weekly"));
        assert!(!md.contains("Treatment & Mitigation"));
        assert!(!md.contains("Further Resources"));
        assert!(!md.contains("Symptoms"));
    }

    #[test]
    fn test_lists_and_links() {
        let advice = StructuredAdvice {
            chemical_options: Some(vec!["Mancozeb".into(), "Captan".into()]),
            external_links: Some(vec![ExternalLink {
                title: "Extension guide".into(),
                url: "https://example.org/guide".into(),
            }]),
            ..Default::default()
        };
        let md = render_markdown("Black Rot", &RemedyRecord::Structured(advice));

        assert!(md.contains("**Chemical Options:**\n- Mancozeb\n- Captan\n"));
        assert!(md.contains("- [Extension guide](https://example.org/guide)"));
        assert!(!md.contains("Overview"));
    }

    #[test]
    fn test_unavailable_notice() {
        assert_eq!(
            render_lookup("Potato___healthy", &RemedyLookup::Unavailable).trim(),
            NO_REMEDY_NOTICE
        );
    }
}
