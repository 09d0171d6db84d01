//! Protocol metadata and literature extracts supplied by the host application.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A saved version of a study protocol.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolVersion {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub metadata: ProtocolMetadata,
    #[serde(default)]
    pub protocol_content: ProtocolContent,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub study_design: Option<String>,
    #[serde(default)]
    pub study_phase: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolContent {
    #[serde(default)]
    pub primary_objective: Option<String>,
    #[serde(default)]
    pub secondary_objectives: Option<String>,
    #[serde(default)]
    pub statistical_plan: Option<String>,
}

/// Population/Intervention/Comparison/Outcome framing of the research question.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pico {
    #[serde(default)]
    pub population: String,
    #[serde(default)]
    pub intervention: String,
    #[serde(default)]
    pub comparison: String,
    #[serde(default)]
    pub outcome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl Pico {
    /// Overlays every non-empty field of `other` onto `self`.
    pub fn overlay(&mut self, other: &Pico) {
        fn take(target: &mut String, source: &str) {
            if !source.trim().is_empty() {
                *target = source.to_string();
            }
        }
        take(&mut self.population, &other.population);
        take(&mut self.intervention, &other.intervention);
        take(&mut self.comparison, &other.comparison);
        take(&mut self.outcome, &other.outcome);
        if other.timeframe.is_some() {
            self.timeframe.clone_from(&other.timeframe);
        }
        if other.confidence.is_some() {
            self.confidence = other.confidence;
        }
    }
}

/// Normalised study design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StudyDesign {
    Rct,
    Cohort,
    CaseControl,
    CrossSectional,
    Diagnostic,
    SingleArm,
    Other,
}

impl StudyDesign {
    /// Human-readable name used in rationales.
    pub fn describe(&self) -> &'static str {
        match self {
            StudyDesign::Rct => "randomized controlled trial",
            StudyDesign::Cohort => "cohort study",
            StudyDesign::CaseControl => "case-control study",
            StudyDesign::CrossSectional => "cross-sectional study",
            StudyDesign::Diagnostic => "diagnostic accuracy study",
            StudyDesign::SingleArm => "single-arm study",
            StudyDesign::Other => "study",
        }
    }

    /// Returns true for designs that compare randomised arms.
    pub fn is_randomized(&self) -> bool {
        matches!(self, StudyDesign::Rct)
    }
}

impl Default for StudyDesign {
    fn default() -> Self {
        StudyDesign::Rct
    }
}

impl FromStr for StudyDesign {
    type Err = std::convert::Infallible;

    /// Parses free-form design labels; unrecognised labels map to `Other`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '_'], "-");
        Ok(match normalized.as_str() {
            "rct" | "randomized-controlled-trial" | "randomised-controlled-trial"
            | "randomized" | "randomised" => StudyDesign::Rct,
            "cohort" | "prospective-cohort" | "retrospective-cohort" => StudyDesign::Cohort,
            "case-control" => StudyDesign::CaseControl,
            "cross-sectional" => StudyDesign::CrossSectional,
            "diagnostic" | "diagnostic-accuracy" => StudyDesign::Diagnostic,
            "single-arm" => StudyDesign::SingleArm,
            _ => StudyDesign::Other,
        })
    }
}

/// Extract of a published paper the protocol builds on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoundationalPaper {
    pub title: String,
    #[serde(default)]
    pub authors: String,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub study_design: Option<String>,
    #[serde(default)]
    pub protocol_elements: PaperElements,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperElements {
    #[serde(default)]
    pub statistical_approach: Option<String>,
    #[serde(default)]
    pub sample_size: Option<String>,
    #[serde(default)]
    pub primary_endpoint: Option<String>,
}
