use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterLevel {
    District,
    School,
    Grade,
}

impl FilterLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::District => "district",
            Self::School => "school",
            Self::Grade => "grade",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    pub district: String,
    pub school: String,
    pub grade: String,
}

impl FilterState {
    pub fn is_global(&self) -> bool {
        self.district.is_empty() && self.school.is_empty() && self.grade.is_empty()
    }

    pub fn value(&self, level: FilterLevel) -> &str {
        match level {
            FilterLevel::District => &self.district,
            FilterLevel::School => &self.school,
            FilterLevel::Grade => &self.grade,
        }
    }

    /// `school ⇒ district` and `grade ⇒ school`.
    pub fn is_consistent(&self) -> bool {
        (self.school.is_empty() || !self.district.is_empty()) && (self.grade.is_empty() || !self.school.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistrictOption {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolOption {
    pub value: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(default, rename = "location_id", skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
}

impl SchoolOption {
    pub fn display_name(&self) -> &str {
        if self.label.is_empty() {
            &self.value
        } else {
            &self.label
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeOption {
    pub value: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptionsResponse {
    #[serde(default)]
    pub districts: Vec<DistrictOption>,
    #[serde(default)]
    pub schools: Vec<SchoolOption>,
    #[serde(default)]
    pub grades: Vec<GradeOption>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionSet {
    pub districts: Vec<DistrictOption>,
    pub schools: Vec<SchoolOption>,
    pub grades: Vec<GradeOption>,
    /// Unscoped school list from the startup option fetch.
    pub all_schools: Vec<SchoolOption>,
    /// Every school of the selected district, kept for the district risk table.
    pub all_district_schools: Vec<SchoolOption>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "tier1")]
    One,
    #[serde(rename = "tier2")]
    Two,
    #[serde(rename = "tier3")]
    Three,
    #[serde(rename = "tier4")]
    Four,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::One, Tier::Two, Tier::Three, Tier::Four];

    pub fn index(self) -> usize {
        match self {
            Self::One => 0,
            Self::Two => 1,
            Self::Three => 2,
            Self::Four => 3,
        }
    }

    pub fn number(self) -> u8 {
        self.index() as u8 + 1
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::One => "Tier 1 (≥95%)",
            Self::Two => "Tier 2 (90-95%)",
            Self::Three => "Tier 3 (80-90%)",
            Self::Four => "Tier 4 (<80%)",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SummaryStatistics {
    pub total_students: u64,
    pub below85_students: u64,
    pub tier1_students: u64,
    pub tier2_students: u64,
    pub tier3_students: u64,
    pub tier4_students: u64,
    pub below85_percentage: f64,
    pub tier1_percentage: f64,
    pub tier2_percentage: f64,
    pub tier3_percentage: f64,
    pub tier4_percentage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub school_prediction: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade_prediction: Option<f64>,
}

impl SummaryStatistics {
    pub fn tier_students(&self, tier: Tier) -> u64 {
        match tier {
            Tier::One => self.tier1_students,
            Tier::Two => self.tier2_students,
            Tier::Three => self.tier3_students,
            Tier::Four => self.tier4_students,
        }
    }
}

/// Insight and recommendation entries arrive either as bare strings or as objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextItem {
    Plain(String),
    Structured {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        insight: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        recommendation: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GradeKey {
    Number(i64),
    Text(String),
}

impl fmt::Display for GradeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{}", value),
            Self::Text(value) => f.write_str(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistrictCount {
    pub district: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolCount {
    pub school: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeCount {
    pub grade: GradeKey,
    #[serde(default)]
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_percentage: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AlertBreakdown {
    #[serde(rename = "totalBelow60")]
    pub total_below60: u64,
    pub by_district: Vec<DistrictCount>,
    pub by_school: Vec<SchoolCount>,
    pub by_grade: Vec<GradeCount>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSnapshot {
    #[serde(default)]
    pub summary_statistics: SummaryStatistics,
    #[serde(default)]
    pub key_insights: Vec<TextItem>,
    #[serde(default)]
    pub recommendations: Vec<TextItem>,
    #[serde(default, alias = "alertsNotifications", skip_serializing_if = "Option::is_none")]
    pub alert_breakdown: Option<AlertBreakdown>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeRiskRow {
    pub grade: String,
    pub risk_percentage: f64,
    pub student_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradeRiskResponse {
    pub grades: Vec<GradeRiskRow>,
    pub total_students: u64,
    pub average_risk: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_percentage(risk: f64) -> Self {
        if risk >= 30.0 {
            Self::Critical
        } else if risk >= 20.0 {
            Self::High
        } else if risk >= 10.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn from_student_count(count: u64) -> Self {
        if count > 100 {
            Self::Critical
        } else if count > 50 {
            Self::High
        } else if count > 10 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistrictSchoolRiskRow {
    pub school_name: String,
    pub risk_percentage: f64,
    pub risk_level: RiskLevel,
    pub student_count: u64,
    pub district: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewMode {
    #[default]
    Global,
    Scoped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationState {
    /// Slider percentages per tier, always within `[-50, 50]`.
    pub improvements: [i32; 4],
    pub selected_strategies: [Option<String>; 4],
    pub is_processing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationSeverity {
    Info,
    Warning,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: String,
    pub template_id: String,
    pub title: String,
    pub body: String,
    pub severity: NotificationSeverity,
    pub critical: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCriteria {
    pub district_code: String,
    pub school_code: String,
    pub grade_code: String,
}

impl SearchCriteria {
    pub fn is_unscoped(&self) -> bool {
        self.district_code.is_empty() && self.school_code.is_empty() && self.grade_code.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadCriteria {
    #[serde(flatten)]
    pub criteria: SearchCriteria,
    pub report_type: String,
}
