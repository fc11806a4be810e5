use crate::models::{AnalysisSnapshot, TextItem};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

static PRIORITY_SCHOOL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)to\s+([^,]+?)\s+in\s+([^,]+?)\s+with\s+([\d.]+)%").expect("valid priority school regex")
});
static GRADE_RISK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Grade\s+(\d+)[^\d]+?([\d.]+)%").expect("valid grade risk regex"));

const EMPTY_ITEM_TEXT: &str = "No content available";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InsightCategory {
    Predictive,
    Pattern,
    Behavioral,
    Tier,
    General,
}

impl InsightCategory {
    const ORDER: [InsightCategory; 5] = [
        InsightCategory::Predictive,
        InsightCategory::Pattern,
        InsightCategory::Behavioral,
        InsightCategory::Tier,
        InsightCategory::General,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Self::Predictive => "Predictive Analytics",
            Self::Pattern => "Pattern Recognition",
            Self::Behavioral => "Behavioral Analytics",
            Self::Tier => "Tier Analysis",
            Self::General => "General Insights",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredText {
    pub text: String,
    pub confidence: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizedInsights {
    pub category: InsightCategory,
    pub items: Vec<ScoredText>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizedRecommendations {
    pub priority: Priority,
    pub items: Vec<ScoredText>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrioritySchool {
    pub school_name: String,
    pub district: String,
    pub risk_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeLevelRisk {
    pub grade: u32,
    pub risk_percentage: f64,
}

/// Everything the insights panel shows for one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightsReport {
    pub insights: Vec<CategorizedInsights>,
    pub recommendations: Vec<CategorizedRecommendations>,
    pub priority_schools: Vec<PrioritySchool>,
    pub grade_level_risks: Vec<GradeLevelRisk>,
}

impl InsightsReport {
    pub fn from_snapshot(snapshot: &AnalysisSnapshot) -> Self {
        Self {
            insights: categorize_insights(&snapshot.key_insights),
            recommendations: categorize_recommendations(&snapshot.recommendations),
            priority_schools: extract_priority_schools(&snapshot.recommendations),
            grade_level_risks: extract_grade_level_risks(&snapshot.recommendations),
        }
    }
}

pub fn item_text(item: &TextItem) -> String {
    match item {
        TextItem::Plain(text) => text.clone(),
        TextItem::Structured {
            text,
            insight,
            recommendation,
        } => [text, insight, recommendation]
            .into_iter()
            .flatten()
            .find(|value| !value.is_empty())
            .cloned()
            .unwrap_or_else(|| EMPTY_ITEM_TEXT.to_string()),
    }
}

/// Heuristic display confidence in `[60, 95]`.
pub fn confidence_score(text: &str) -> u32 {
    let mut score = 70u32;
    if text.contains('%') {
        score += 10;
    }
    if text.contains("students") {
        score += 5;
    }
    if text.contains("data") || text.contains("analysis") {
        score += 8;
    }
    if text.chars().count() > 100 {
        score += 5;
    }
    if text.contains("recommend") || text.contains("suggest") {
        score += 7;
    }
    score.clamp(60, 95)
}

pub fn insight_priority(text: &str) -> Priority {
    let lower = text.to_lowercase();
    if contains_any(&lower, &["critical", "urgent", "risk"]) {
        Priority::High
    } else if contains_any(&lower, &["consider", "improve", "focus"]) {
        Priority::Medium
    } else {
        Priority::Low
    }
}

pub fn categorize_insights(items: &[TextItem]) -> Vec<CategorizedInsights> {
    let mut buckets: Vec<(InsightCategory, Vec<ScoredText>)> =
        InsightCategory::ORDER.iter().map(|category| (*category, Vec::new())).collect();

    for item in items {
        let text = item_text(item);
        let lower = text.to_lowercase();
        let category = if contains_any(&lower, &["predict", "forecast"]) {
            InsightCategory::Predictive
        } else if contains_any(&lower, &["pattern", "trend", "correlate"]) {
            InsightCategory::Pattern
        } else if contains_any(&lower, &["behavior", "engagement"]) {
            InsightCategory::Behavioral
        } else if contains_any(&lower, &["tier", "intervention"]) {
            InsightCategory::Tier
        } else {
            InsightCategory::General
        };
        let scored = ScoredText {
            confidence: confidence_score(&text),
            priority: Some(insight_priority(&text)),
            text,
        };
        if let Some((_, bucket)) = buckets.iter_mut().find(|(candidate, _)| *candidate == category) {
            bucket.push(scored);
        }
    }

    buckets
        .into_iter()
        .filter(|(_, items)| !items.is_empty())
        .map(|(category, items)| CategorizedInsights { category, items })
        .collect()
}

pub fn categorize_recommendations(items: &[TextItem]) -> Vec<CategorizedRecommendations> {
    let mut high = Vec::new();
    let mut medium = Vec::new();
    let mut low = Vec::new();

    for item in items {
        let text = item_text(item);
        let lower = text.to_lowercase();
        let scored = ScoredText {
            confidence: confidence_score(&text),
            priority: None,
            text,
        };
        if contains_any(&lower, &["urgent", "critical", "immediate", "priority"]) {
            high.push(scored);
        } else if contains_any(&lower, &["consider", "improve", "enhance"]) {
            medium.push(scored);
        } else {
            low.push(scored);
        }
    }

    [(Priority::High, high), (Priority::Medium, medium), (Priority::Low, low)]
        .into_iter()
        .filter(|(_, items)| !items.is_empty())
        .map(|(priority, items)| CategorizedRecommendations { priority, items })
        .collect()
}

/// Schools named in recommendations like "... to Lincoln High in North with 34.5% ...",
/// highest risk first.
pub fn extract_priority_schools(recommendations: &[TextItem]) -> Vec<PrioritySchool> {
    let mut seen = HashSet::new();
    let mut schools = Vec::new();
    for item in recommendations {
        let text = item_text(item);
        let Some(caps) = PRIORITY_SCHOOL_RE.captures(&text) else {
            continue;
        };
        let school_name = caps[1].trim().to_string();
        let district = caps[2].trim().to_string();
        let Ok(risk_percentage) = caps[3].parse::<f64>() else {
            continue;
        };
        let key = format!("{}-{}", school_name, district).to_lowercase();
        if seen.insert(key) {
            schools.push(PrioritySchool {
                school_name,
                district,
                risk_percentage,
            });
        }
    }
    schools.sort_by(|left, right| right.risk_percentage.total_cmp(&left.risk_percentage));
    schools
}

pub fn extract_grade_level_risks(recommendations: &[TextItem]) -> Vec<GradeLevelRisk> {
    let mut seen = HashSet::new();
    let mut grades = Vec::new();
    for item in recommendations {
        let text = item_text(item);
        let Some(caps) = GRADE_RISK_RE.captures(&text) else {
            continue;
        };
        let (Ok(grade), Ok(risk_percentage)) = (caps[1].parse::<u32>(), caps[2].parse::<f64>()) else {
            continue;
        };
        if seen.insert(grade) {
            grades.push(GradeLevelRisk { grade, risk_percentage });
        }
    }
    grades.sort_by_key(|entry| entry.grade);
    grades
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::{
        categorize_insights, categorize_recommendations, confidence_score, extract_grade_level_risks,
        extract_priority_schools, item_text, InsightCategory, Priority,
    };
    use crate::models::TextItem;

    fn plain(text: &str) -> TextItem {
        TextItem::Plain(text.to_string())
    }

    #[test]
    fn item_text_prefers_first_populated_field() {
        let item = TextItem::Structured {
            text: None,
            insight: Some("Tier 4 is growing".to_string()),
            recommendation: Some("ignored".to_string()),
        };
        assert_eq!(item_text(&item), "Tier 4 is growing");
        let empty = TextItem::Structured {
            text: None,
            insight: None,
            recommendation: None,
        };
        assert_eq!(item_text(&empty), "No content available");
    }

    #[test]
    fn confidence_is_bounded() {
        assert_eq!(confidence_score("short"), 70);
        let rich = "We recommend reviewing data analysis: 40% of students ".repeat(3);
        assert_eq!(confidence_score(&rich), 95);
    }

    #[test]
    fn insights_are_bucketed_in_display_order() {
        let categorized = categorize_insights(&[
            plain("Engagement drops on Mondays"),
            plain("We predict 12% growth in Tier 4"),
            plain("Misc note"),
        ]);
        let order = categorized.iter().map(|bucket| bucket.category).collect::<Vec<_>>();
        assert_eq!(
            order,
            vec![InsightCategory::Predictive, InsightCategory::Behavioral, InsightCategory::General]
        );
        assert_eq!(categorized[0].items[0].priority, Some(Priority::Low));
    }

    #[test]
    fn recommendations_are_grouped_by_urgency() {
        let grouped = categorize_recommendations(&[plain("Consider mentoring"), plain("Urgent outreach")]);
        assert_eq!(grouped[0].priority, Priority::High);
        assert_eq!(grouped[1].priority, Priority::Medium);
    }

    #[test]
    fn extracts_priority_schools_once_each() {
        let recommendations = vec![
            plain("Send counselors to Lincoln High in North with 22.5% chronic absence"),
            plain("Send counselors to lincoln high in north with 22.5% chronic absence"),
            plain("Assign mentors to Adams Middle in South with 31% chronic absence"),
        ];
        let schools = extract_priority_schools(&recommendations);
        assert_eq!(schools.len(), 2);
        assert_eq!(schools[0].school_name, "Adams Middle");
        assert_eq!(schools[1].risk_percentage, 22.5);
    }

    #[test]
    fn extracts_grade_risks_in_grade_order() {
        let risks = extract_grade_level_risks(&[
            plain("Grade 9 shows 18.2% below threshold"),
            plain("Grade 3 at 7% risk"),
            plain("Grade 9 repeated at 50%"),
        ]);
        assert_eq!(risks.len(), 2);
        assert_eq!(risks[0].grade, 3);
        assert_eq!(risks[1].risk_percentage, 18.2);
    }
}
