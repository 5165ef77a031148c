//! Parsing of the model's free-text answer into a structured report.
//!
//! Every field is optional on the wire; the model is asked for a schema but
//! not trusted to follow it. When no JSON object can be recovered the raw
//! text becomes an unstructured report instead of an error.

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::llm_client::{extract_json_object, strip_json_fences};
use crate::models::analysis::NewSolution;

pub const FALLBACK_TITLE: &str = "Technical error detected in screenshot";
const FALLBACK_CATEGORY: &str = "General";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisReport {
    #[serde(deserialize_with = "lenient_opt_text")]
    pub error_detected: Option<String>,
    #[serde(deserialize_with = "lenient_opt_text")]
    pub category: Option<String>,
    #[serde(deserialize_with = "lenient_number")]
    pub confidence: Option<f64>,
    #[serde(deserialize_with = "lenient_opt_text")]
    pub severity: Option<String>,
    #[serde(deserialize_with = "lenient_opt_text")]
    pub estimated_impact: Option<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub solutions: Vec<FixOption>,
    #[serde(deserialize_with = "lenient_texts")]
    pub prevention_tips: Vec<String>,
    #[serde(deserialize_with = "lenient_texts")]
    pub related_issues: Vec<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub additional_resources: Vec<Resource>,
    #[serde(deserialize_with = "lenient_texts")]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FixOption {
    #[serde(deserialize_with = "lenient_number")]
    pub id: Option<f64>,
    #[serde(deserialize_with = "lenient_text")]
    pub title: String,
    #[serde(deserialize_with = "lenient_text")]
    pub description: String,
    #[serde(deserialize_with = "lenient_texts")]
    pub steps: Vec<String>,
    #[serde(deserialize_with = "lenient_opt_text")]
    pub difficulty: Option<String>,
    #[serde(deserialize_with = "lenient_opt_text")]
    pub estimated_time: Option<String>,
    /// Kept as text: models answer `"85%"`, `85` or `0.85`.
    #[serde(deserialize_with = "lenient_opt_text")]
    pub success_rate: Option<String>,
    #[serde(deserialize_with = "lenient_texts")]
    pub requirements: Vec<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub sources: Vec<Source>,
    #[serde(deserialize_with = "lenient_texts")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Source {
    #[serde(deserialize_with = "lenient_text")]
    pub title: String,
    #[serde(deserialize_with = "lenient_text")]
    pub url: String,
    #[serde(rename = "type", deserialize_with = "lenient_opt_text")]
    pub source_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Resource {
    #[serde(deserialize_with = "lenient_text")]
    pub title: String,
    #[serde(deserialize_with = "lenient_text")]
    pub url: String,
    #[serde(deserialize_with = "lenient_opt_text")]
    pub description: Option<String>,
}

// Lenient field readers. A field of the wrong shape degrades to its default
// instead of failing the whole report.

/// Accepts `90`, `90.5`, `"90"` or `"90%"`; anything else becomes `None`.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    })
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lenient_opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(scalar_text))
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_opt_text(deserializer)?.unwrap_or_default())
}

/// A list of scalars, or a single scalar standing in for a one-item list.
fn lenient_texts<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items.into_iter().filter_map(scalar_text).collect(),
        Some(other) => scalar_text(other).into_iter().collect(),
        None => Vec::new(),
    })
}

/// A list of objects, or a single object. Items that do not fit are dropped.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let items = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items,
        Some(item @ Value::Object(_)) => vec![item],
        _ => Vec::new(),
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

/// Generic first steps offered when the model's answer has no usable fixes.
fn fallback_fixes() -> Vec<FixOption> {
    fn fix(id: f64, title: &str, description: &str, steps: &[&str], difficulty: &str) -> FixOption {
        FixOption {
            id: Some(id),
            title: title.to_string(),
            description: description.to_string(),
            steps: steps.iter().map(|s| s.to_string()).collect(),
            difficulty: Some(difficulty.to_string()),
            ..FixOption::default()
        }
    }

    vec![
        fix(
            1.0,
            "Restart the application",
            "Clears temporary state that often causes transient errors",
            &[
                "Save any open work",
                "Close and reopen the application that showed the error",
                "If the error persists, restart the computer",
                "Repeat the action that triggered the error",
            ],
            "Easy",
        ),
        fix(
            2.0,
            "Update or reinstall",
            "Replaces outdated or corrupted files behind the error",
            &[
                "Check for updates to the application and the operating system",
                "Install any pending updates and restart",
                "If the error persists, uninstall and reinstall the application",
            ],
            "Medium",
        ),
    ]
}

/// What the analyzer hands back to the route layer.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub report: AnalysisReport,
    /// False when the model's text had no parsable JSON object.
    pub structured: bool,
    pub raw_text: String,
}

pub fn parse_analysis_text(text: &str) -> AnalysisOutcome {
    let candidate = strip_json_fences(text);
    let parsed = extract_json_object(candidate)
        .and_then(|json| serde_json::from_str::<AnalysisReport>(json).ok());

    match parsed {
        Some(report) => AnalysisOutcome {
            report,
            structured: true,
            raw_text: text.to_string(),
        },
        None => AnalysisOutcome {
            report: AnalysisReport {
                error_detected: Some(FALLBACK_TITLE.to_string()),
                category: Some(FALLBACK_CATEGORY.to_string()),
                estimated_impact: Some(text.trim().to_string()),
                solutions: fallback_fixes(),
                ..AnalysisReport::default()
            },
            structured: false,
            raw_text: text.to_string(),
        },
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl AnalysisOutcome {
    pub fn to_new_solution(&self) -> Result<NewSolution, serde_json::Error> {
        let report = &self.report;
        let title = non_blank(&report.error_detected).unwrap_or_else(|| FALLBACK_TITLE.to_string());
        let explanation = non_blank(&report.estimated_impact)
            .unwrap_or_else(|| self.raw_text.trim().to_string());

        Ok(NewSolution {
            title: title.clone(),
            explanation,
            report: serde_json::to_value(report)?,
            structured: self.structured,
            error_type: Some(title),
            category: non_blank(&report.category),
            severity: non_blank(&report.severity),
            confidence: report.confidence,
        })
    }
}
