use crate::models::{AnalysisSnapshot, DistrictSchoolRiskRow, GradeRiskRow, RiskLevel, SchoolOption};
use serde::Serialize;
use std::cmp::Ordering;

pub const GLOBAL_DISTRICT_LABEL: &str = "All Districts";

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRiskSummary {
    pub total_students: u64,
    pub average_risk: f64,
}

/// PK, K, then numeric grades ascending, then anything else lexically.
pub fn compare_grades(left: &str, right: &str) -> Ordering {
    grade_rank(left).cmp(&grade_rank(right))
}

fn grade_rank(grade: &str) -> (u8, i64, String) {
    let normalized = grade.trim().to_ascii_lowercase();
    let normalized = normalized.strip_prefix("grade ").unwrap_or(&normalized).trim().to_string();
    match normalized.as_str() {
        "pk" => (0, 0, String::new()),
        "k" => (1, 0, String::new()),
        other => match other.parse::<i64>() {
            Ok(number) => (2, number, String::new()),
            Err(_) => (3, 0, normalized),
        },
    }
}

pub fn sorted_grade_rows(mut rows: Vec<GradeRiskRow>) -> Vec<GradeRiskRow> {
    rows.sort_by(|left, right| compare_grades(&left.grade, &right.grade));
    rows
}

pub fn summarize_grades(rows: &[GradeRiskRow]) -> GradeRiskSummary {
    if rows.is_empty() {
        return GradeRiskSummary::default();
    }
    let total_students = rows.iter().map(|row| row.student_count).sum();
    let average_risk = rows.iter().map(|row| row.risk_percentage).sum::<f64>() / rows.len() as f64;
    GradeRiskSummary {
        total_students,
        average_risk,
    }
}

/// Rows for the district school table, recomputed from scratch on every call.
///
/// With a district selected every school of that district gets a row, even when the snapshot
/// has no flagged students for it. In global view the snapshot's per-school counts are used as-is.
pub fn district_school_risks(
    snapshot: Option<&AnalysisSnapshot>,
    district: &str,
    district_schools: &[SchoolOption],
    global_view: bool,
) -> Vec<DistrictSchoolRiskRow> {
    let Some(snapshot) = snapshot else {
        return Vec::new();
    };
    let by_school = snapshot
        .alert_breakdown
        .as_ref()
        .map(|breakdown| breakdown.by_school.as_slice())
        .unwrap_or_default();
    let flagged_total: u64 = by_school.iter().map(|entry| entry.count).sum();

    let mut rows = if !district.is_empty() {
        district_schools
            .iter()
            .map(|school| {
                let name = school.display_name();
                let student_count = by_school
                    .iter()
                    .find(|entry| entry.school.trim().eq_ignore_ascii_case(name.trim()))
                    .map(|entry| entry.count)
                    .unwrap_or(0);
                build_row(
                    name,
                    student_count,
                    flagged_total,
                    school.district.as_deref().unwrap_or(district),
                )
            })
            .collect::<Vec<_>>()
    } else if global_view {
        by_school
            .iter()
            .map(|entry| build_row(&entry.school, entry.count, flagged_total, GLOBAL_DISTRICT_LABEL))
            .collect::<Vec<_>>()
    } else {
        Vec::new()
    };

    rows.sort_by(|left, right| right.student_count.cmp(&left.student_count));
    rows
}

fn build_row(name: &str, student_count: u64, flagged_total: u64, district: &str) -> DistrictSchoolRiskRow {
    let risk_percentage = if flagged_total == 0 {
        0.0
    } else {
        student_count as f64 * 100.0 / flagged_total as f64
    };
    DistrictSchoolRiskRow {
        school_name: name.to_string(),
        risk_percentage,
        risk_level: RiskLevel::from_student_count(student_count),
        student_count,
        district: district.to_string(),
    }
}
