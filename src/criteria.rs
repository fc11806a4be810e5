use crate::models::{DownloadCriteria, FilterState, SearchCriteria};
use once_cell::sync::Lazy;
use regex::Regex;

static PREFIXED_DISTRICT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^D\d+$").expect("valid district regex"));

/// `D12` becomes `12`; anything else passes through.
pub fn normalize_district_code(code: &str) -> String {
    if PREFIXED_DISTRICT_RE.is_match(code) {
        code[1..].to_string()
    } else {
        code.to_string()
    }
}

/// Option lists use the bare numeric district id even when the backend prefixes it.
pub fn normalize_district_value(value: &str) -> String {
    value.strip_prefix('D').unwrap_or(value).to_string()
}

/// School values may be composite (`12-0045`); the service only wants the trailing segment.
pub fn extract_school_code(value: &str) -> String {
    match value.rsplit('-').next() {
        Some(last) if !last.is_empty() => last.to_string(),
        _ => value.to_string(),
    }
}

pub fn search_criteria(filters: &FilterState) -> SearchCriteria {
    SearchCriteria {
        district_code: if filters.district.is_empty() {
            String::new()
        } else {
            normalize_district_code(&filters.district)
        },
        school_code: if filters.school.is_empty() {
            String::new()
        } else {
            extract_school_code(&filters.school)
        },
        grade_code: filters.grade.clone(),
    }
}

pub fn download_criteria(filters: &FilterState, report_type: &str) -> DownloadCriteria {
    DownloadCriteria {
        criteria: search_criteria(filters),
        report_type: report_type.to_string(),
    }
}
