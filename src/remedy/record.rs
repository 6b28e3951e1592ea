//! Remedy record shapes

use std::fmt;

use serde::{Deserialize, Serialize};

/// Static advice for one crop + label
///
/// Either free text or a structured record in which every field is optional.
/// Consumers check which fields are present instead of assuming a shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemedyRecord {
    Plain(String),
    Structured(StructuredAdvice),
}

impl RemedyRecord {
    /// Free text, if this is a plain record
    pub fn as_plain(&self) -> Option<&str> {
        match self {
            RemedyRecord::Plain(text) => Some(text),
            RemedyRecord::Structured(_) => None,
        }
    }

    /// Structured fields, if this is a structured record
    pub fn as_structured(&self) -> Option<&StructuredAdvice> {
        match self {
            RemedyRecord::Plain(_) => None,
            RemedyRecord::Structured(advice) => Some(advice),
        }
    }

    /// Blank text, or a structured record without a single field
    pub fn is_empty(&self) -> bool {
        match self {
            RemedyRecord::Plain(text) => text.trim().is_empty(),
            RemedyRecord::Structured(advice) => advice.present_fields().is_empty(),
        }
    }

    /// Severity, when the record states one
    pub fn severity(&self) -> Option<Severity> {
        self.as_structured()
            .and_then(|a| a.severity.as_deref())
            .map(Severity::parse)
    }
}

/// A titled reference link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalLink {
    pub title: String,
    pub url: String,
}

/// Structured advice; every field may be absent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredAdvice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    /// Free text, conventionally `"<Level>: <explanation>"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symptoms: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions_favoring: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disease_cycle: Option<String>,
    /// Impact on yield
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<String>,
    /// General treatment advice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mitigation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organic_options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chemical_options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_varieties: Option<Vec<String>>,
    #[serde(default, alias = "Fertilizer", skip_serializing_if = "Option::is_none")]
    pub fertilizer: Option<String>,
    #[serde(
        default,
        alias = "Fertilizer_Calendar",
        skip_serializing_if = "Option::is_none"
    )]
    pub fertilizer_calendar: Option<String>,
    /// Actionable checklist items
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_steps: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_links: Option<Vec<ExternalLink>>,
}

fn text(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|t| !t.is_empty())
}

fn list(field: &Option<Vec<String>>) -> Option<&[String]> {
    field.as_deref().filter(|items| !items.is_empty())
}

impl StructuredAdvice {
    pub fn cause(&self) -> Option<&str> {
        text(&self.cause)
    }

    pub fn severity_text(&self) -> Option<&str> {
        text(&self.severity)
    }

    pub fn symptoms(&self) -> Option<&str> {
        text(&self.symptoms)
    }

    pub fn conditions_favoring(&self) -> Option<&str> {
        text(&self.conditions_favoring)
    }

    pub fn disease_cycle(&self) -> Option<&str> {
        text(&self.disease_cycle)
    }

    pub fn impact(&self) -> Option<&str> {
        text(&self.impact)
    }

    pub fn season(&self) -> Option<&str> {
        text(&self.season)
    }

    pub fn mitigation(&self) -> Option<&str> {
        text(&self.mitigation)
    }

    pub fn organic_options(&self) -> Option<&[String]> {
        list(&self.organic_options)
    }

    pub fn chemical_options(&self) -> Option<&[String]> {
        list(&self.chemical_options)
    }

    pub fn recommended_varieties(&self) -> Option<&[String]> {
        list(&self.recommended_varieties)
    }

    pub fn fertilizer(&self) -> Option<&str> {
        text(&self.fertilizer)
    }

    pub fn fertilizer_calendar(&self) -> Option<&str> {
        text(&self.fertilizer_calendar)
    }

    pub fn next_steps(&self) -> Option<&[String]> {
        list(&self.next_steps)
    }

    pub fn external_links(&self) -> Option<&[ExternalLink]> {
        self.external_links.as_deref().filter(|l| !l.is_empty())
    }

    /// Names of the fields carrying content, in schema order
    pub fn present_fields(&self) -> Vec<&'static str> {
        let checks: [(&'static str, bool); 15] = [
            ("cause", self.cause().is_some()),
            ("severity", self.severity_text().is_some()),
            ("symptoms", self.symptoms().is_some()),
            ("conditions_favoring", self.conditions_favoring().is_some()),
            ("disease_cycle", self.disease_cycle().is_some()),
            ("impact", self.impact().is_some()),
            ("season", self.season().is_some()),
            ("mitigation", self.mitigation().is_some()),
            ("organic_options", self.organic_options().is_some()),
            ("chemical_options", self.chemical_options().is_some()),
            ("recommended_varieties", self.recommended_varieties().is_some()),
            ("fertilizer", self.fertilizer().is_some()),
            ("fertilizer_calendar", self.fertilizer_calendar().is_some()),
            ("next_steps", self.next_steps().is_some()),
            ("external_links", self.external_links().is_some()),
        ];
        checks
            .iter()
            .filter(|(_, present)| *present)
            .map(|(name, _)| *name)
            .collect()
    }
}

/// Coarse severity level parsed from the severity text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
    Unspecified,
}

impl Severity {
    /// Level named before the first `:`. `"Medium to High: ..."` is High.
    pub fn parse(text: &str) -> Self {
        let level = text.split(':').next().unwrap_or_default().trim().to_lowercase();
        if level.contains("high") {
            Severity::High
        } else if level.contains("medium") {
            Severity::Medium
        } else if level.contains("low") {
            Severity::Low
        } else {
            Severity::Unspecified
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Unspecified => "unspecified",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_shapes() {
        let plain: RemedyRecord = serde_json::from_str("\"Spray neem oil weekly.\"").unwrap();
        assert_eq!(plain.as_plain(), Some("Spray neem oil weekly."));
        assert!(plain.as_structured().is_none());

        let structured: RemedyRecord =
            serde_json::from_str(r#"{"cause": "Fungus", "next_steps": ["Prune"]}"#).unwrap();
        let advice = structured.as_structured().unwrap();
        assert_eq!(advice.cause(), Some("Fungus"));
        assert_eq!(advice.present_fields(), vec!["cause", "next_steps"]);
        assert!(advice.chemical_options().is_none());
    }

    #[test]
    fn test_legacy_fertilizer_keys() {
        let record: RemedyRecord = serde_json::from_str(
            r#"{"Fertilizer": "Balanced NPK", "Fertilizer_Calendar": "Before flowering"}"#,
        )
        .unwrap();
        let advice = record.as_structured().unwrap();
        assert_eq!(advice.fertilizer(), Some("Balanced NPK"));
        assert_eq!(advice.fertilizer_calendar(), Some("Before flowering"));
    }

    #[test]
    fn test_is_empty() {
        assert!(RemedyRecord::Plain("   ".into()).is_empty());
        assert!(RemedyRecord::Structured(StructuredAdvice::default()).is_empty());

        let blank_fields = StructuredAdvice {
            cause: Some(String::new()),
            next_steps: Some(vec![]),
            ..Default::default()
        };
        assert!(RemedyRecord::Structured(blank_fields).is_empty());
        assert!(!RemedyRecord::Plain("Remove infected leaves".into()).is_empty());
    }

    #[test]
    fn test_severity_parsing() {
        assert_eq!(Severity::parse("High: total loss"), Severity::High);
        assert_eq!(Severity::parse("Medium to High: vine decline"), Severity::High);
        assert_eq!(Severity::parse("Varies (Low to Medium): depends"), Severity::Medium);
        assert_eq!(Severity::parse("low"), Severity::Low);
        assert_eq!(Severity::parse("Unknown: high spread"), Severity::Unspecified);
        assert_eq!(Severity::parse(""), Severity::Unspecified);
    }

    #[test]
    fn test_absent_fields_are_not_serialized() {
        let advice = StructuredAdvice {
            season: Some("Monsoon".into()),
            ..Default::default()
        };
        let json = serde_json::to_string(&RemedyRecord::Structured(advice)).unwrap();
        assert_eq!(json, r#"{"season":"Monsoon"}"#);
    }
}
