use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Three-tier severity attached to a flagged clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }

    /// CSS class used by the HTML highlighter.
    pub fn css_class(&self) -> &'static str {
        match self {
            RiskLevel::Low => "risk-low",
            RiskLevel::Medium => "risk-medium",
            RiskLevel::High => "risk-high",
        }
    }

    fn penalty(&self) -> u32 {
        match self {
            RiskLevel::Low => 8,
            RiskLevel::Medium => 20,
            RiskLevel::High => 35,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            other => Err(format!("unknown risk level: {:?}", other)),
        }
    }
}

impl TryFrom<String> for RiskLevel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A clause flagged by the analysis step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskClause {
    #[serde(rename = "clause")]
    pub clause_text: String,
    pub risk_level: RiskLevel,
    pub description: String,
}

impl RiskClause {
    pub fn new(clause: impl Into<String>, level: RiskLevel, description: impl Into<String>) -> Self {
        Self {
            clause_text: clause.into(),
            risk_level: level,
            description: description.into(),
        }
    }
}

/// Summary of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(rename = "summary")]
    pub bullets: Vec<String>,
    pub document_type: Option<String>,
    #[serde(rename = "flagged_risks")]
    pub risks: Vec<RiskClause>,
    /// Token count of the extracted text, never of model output.
    pub word_count: usize,
    pub questions_to_ask: Vec<String>,
}

impl Summary {
    pub fn risks_at_least(&self, level: RiskLevel) -> impl Iterator<Item = &RiskClause> {
        self.risks.iter().filter(move |r| r.risk_level >= level)
    }

    pub fn safety_score(&self) -> SafetyScore {
        SafetyScore::from_risks(&self.risks)
    }
}

/// 0-100 score where every flagged risk subtracts a level-dependent penalty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SafetyScore(pub u32);

impl SafetyScore {
    pub fn from_risks(risks: &[RiskClause]) -> Self {
        let penalty: u32 = risks.iter().map(|r| r.risk_level.penalty()).sum();
        SafetyScore(100u32.saturating_sub(penalty))
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    pub fn label(&self) -> &'static str {
        match self.0 {
            90.. => "Very safe to sign",
            70..=89 => "Generally safe",
            50..=69 => "Review flagged items",
            _ => "Exercise caution",
        }
    }
}

impl fmt::Display for SafetyScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/100 ({})", self.0, self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_parsing() {
        assert_eq!("HIGH".parse::<RiskLevel>().unwrap(), RiskLevel::High);
        assert_eq!(" medium ".parse::<RiskLevel>().unwrap(), RiskLevel::Medium);
        assert!("severe".parse::<RiskLevel>().is_err());
    }

    #[test]
    fn test_summary_wire_names() {
        let summary = Summary {
            bullets: vec!["Term is 12 months".to_string()],
            document_type: Some("Lease".to_string()),
            risks: vec![RiskClause::new("late fee of $500", RiskLevel::High, "Steep")],
            word_count: 42,
            questions_to_ask: vec![],
        };
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["summary"][0], "Term is 12 months");
        assert_eq!(value["flagged_risks"][0]["clause"], "late fee of $500");
        assert_eq!(value["flagged_risks"][0]["risk_level"], "high");
        assert_eq!(value["word_count"], 42);
    }

    #[test]
    fn test_safety_score() {
        assert_eq!(SafetyScore::from_risks(&[]).value(), 100);
        assert_eq!(SafetyScore::from_risks(&[]).label(), "Very safe to sign");

        let risks = vec![
            RiskClause::new("a", RiskLevel::Low, ""),
            RiskClause::new("b", RiskLevel::Medium, ""),
        ];
        let score = SafetyScore::from_risks(&risks);
        assert_eq!(score.value(), 72);
        assert_eq!(score.label(), "Generally safe");

        let many = vec![RiskClause::new("c", RiskLevel::High, ""); 4];
        assert_eq!(SafetyScore::from_risks(&many).value(), 0);
        assert_eq!(SafetyScore::from_risks(&many).label(), "Exercise caution");
    }

    #[test]
    fn test_risks_at_least() {
        let summary = Summary {
            risks: vec![
                RiskClause::new("a", RiskLevel::Low, ""),
                RiskClause::new("b", RiskLevel::High, ""),
                RiskClause::new("c", RiskLevel::Medium, ""),
            ],
            ..Summary::default()
        };
        let names: Vec<_> = summary
            .risks_at_least(RiskLevel::Medium)
            .map(|r| r.clause_text.as_str())
            .collect();
        assert_eq!(names, vec!["b", "c"]);
    }
}
