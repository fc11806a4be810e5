use crate::errors::{AppError, AppResult};
use crate::models::{DistrictOption, FilterLevel, FilterState, GradeOption, OptionSet, SchoolOption};
use serde::Serialize;

/// Per-level request generations. A fetch records the generation it was issued under and its
/// result is applied only if that generation is still current.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Generations {
    /// Bumped whenever the district changes; school-list fetches are keyed by it.
    pub district: u64,
    /// Bumped whenever the school changes, including when a district change clears it.
    pub school: u64,
    /// Bumped on any filter mutation; analysis fetches are keyed by it.
    pub tuple: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionsOutcome {
    /// The list was fetched for a selection that is no longer current.
    Stale,
    Applied { filters_changed: bool },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCascade {
    filters: FilterState,
    options: OptionSet,
    generations: Generations,
}

impl FilterCascade {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn options(&self) -> &OptionSet {
        &self.options
    }

    pub fn generations(&self) -> Generations {
        self.generations
    }

    pub fn set_district(&mut self, id: &str) {
        self.filters.district = id.to_string();
        self.clear_below(FilterLevel::District);
        self.generations.district += 1;
        self.generations.school += 1;
        self.generations.tuple += 1;
    }

    pub fn set_school(&mut self, id: &str) -> AppResult<()> {
        if !id.is_empty() && self.filters.district.is_empty() {
            return Err(AppError::Validation(format!(
                "cannot select school {} without a district",
                id
            )));
        }
        self.filters.school = id.to_string();
        self.clear_below(FilterLevel::School);
        self.generations.school += 1;
        self.generations.tuple += 1;
        Ok(())
    }

    pub fn set_grade(&mut self, id: &str) -> AppResult<()> {
        if !id.is_empty() && self.filters.school.is_empty() {
            return Err(AppError::Validation(format!("cannot select grade {} without a school", id)));
        }
        self.filters.grade = id.to_string();
        self.generations.tuple += 1;
        Ok(())
    }

    /// Clears every level and every parent-dependent option list. District options and the
    /// unscoped school list survive; they are session-long lookups.
    pub fn reset_all(&mut self) {
        self.filters = FilterState::default();
        self.clear_below(FilterLevel::District);
        self.generations.district += 1;
        self.generations.school += 1;
        self.generations.tuple += 1;
    }

    pub fn apply_district_options(&mut self, districts: Vec<DistrictOption>, all_schools: Vec<SchoolOption>) -> bool {
        self.options.districts = districts;
        self.options.all_schools = all_schools;
        let selected = self.filters.district.clone();
        if !selected.is_empty() && !self.options.districts.iter().any(|option| option.value == selected) {
            self.set_district("");
            return true;
        }
        false
    }

    pub fn apply_school_options(&mut self, district_generation: u64, schools: Vec<SchoolOption>) -> OptionsOutcome {
        if district_generation != self.generations.district {
            return OptionsOutcome::Stale;
        }
        self.options.all_district_schools = schools.clone();
        self.options.schools = schools;
        let selected = &self.filters.school;
        if !selected.is_empty() && !self.options.schools.iter().any(|option| &option.value == selected) {
            self.drop_level(FilterLevel::School);
            return OptionsOutcome::Applied { filters_changed: true };
        }
        OptionsOutcome::Applied { filters_changed: false }
    }

    pub fn apply_grade_options(&mut self, school_generation: u64, grades: Vec<GradeOption>) -> OptionsOutcome {
        if school_generation != self.generations.school {
            return OptionsOutcome::Stale;
        }
        self.options.grades = grades;
        let selected = &self.filters.grade;
        if !selected.is_empty() && !self.options.grades.iter().any(|option| &option.value == selected) {
            self.drop_level(FilterLevel::Grade);
            return OptionsOutcome::Applied { filters_changed: true };
        }
        OptionsOutcome::Applied { filters_changed: false }
    }

    /// A failed school fetch leaves nothing to select from below the district.
    pub fn fail_school_options(&mut self, district_generation: u64) -> OptionsOutcome {
        if district_generation != self.generations.district {
            return OptionsOutcome::Stale;
        }
        self.options.all_district_schools.clear();
        self.apply_school_options(district_generation, Vec::new())
    }

    pub fn fail_grade_options(&mut self, school_generation: u64) -> OptionsOutcome {
        self.apply_grade_options(school_generation, Vec::new())
    }

    fn drop_level(&mut self, level: FilterLevel) {
        match level {
            FilterLevel::District => self.set_district(""),
            FilterLevel::School => {
                self.filters.school.clear();
                self.clear_below(FilterLevel::School);
                self.generations.school += 1;
                self.generations.tuple += 1;
            }
            FilterLevel::Grade => {
                self.filters.grade.clear();
                self.generations.tuple += 1;
            }
        }
    }

    fn clear_below(&mut self, level: FilterLevel) {
        match level {
            FilterLevel::District => {
                self.filters.school.clear();
                self.filters.grade.clear();
                self.options.schools.clear();
                self.options.all_district_schools.clear();
                self.options.grades.clear();
            }
            FilterLevel::School => {
                self.filters.grade.clear();
                self.options.grades.clear();
            }
            FilterLevel::Grade => {}
        }
    }
}
