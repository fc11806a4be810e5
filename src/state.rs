use crate::cache::AnalysisCache;
use crate::cascade::{FilterCascade, Generations, OptionsOutcome};
use crate::criteria::normalize_district_value;
use crate::errors::{AppError, AppResult};
use crate::jitter::Jitter;
use crate::models::{
    AnalysisSnapshot, DistrictSchoolRiskRow, FilterOptionsResponse, FilterState, GradeOption, GradeRiskRow,
    SchoolOption, SimulationState, Tier, ViewMode,
};
use crate::risk_tables::{district_school_risks, sorted_grade_rows, summarize_grades, GradeRiskSummary};
use crate::simulation::{generate_suggestions, project, AiSuggestion, Projection};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorSlot {
    General,
    Filter,
    GradeRisk,
    Download,
}

impl ErrorSlot {
    pub const ALL: [ErrorSlot; 4] = [Self::General, Self::Filter, Self::GradeRisk, Self::Download];
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBanners {
    pub general: Option<String>,
    pub filter: Option<String>,
    pub grade_risk: Option<String>,
    pub download: Option<String>,
}

impl ErrorBanners {
    pub fn get(&self, slot: ErrorSlot) -> Option<&str> {
        self.slot(slot).as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.general.is_none() && self.filter.is_none() && self.grade_risk.is_none() && self.download.is_none()
    }

    fn slot(&self, slot: ErrorSlot) -> &Option<String> {
        match slot {
            ErrorSlot::General => &self.general,
            ErrorSlot::Filter => &self.filter,
            ErrorSlot::GradeRisk => &self.grade_risk,
            ErrorSlot::Download => &self.download,
        }
    }

    fn slot_mut(&mut self, slot: ErrorSlot) -> &mut Option<String> {
        match slot {
            ErrorSlot::General => &mut self.general,
            ErrorSlot::Filter => &mut self.filter,
            ErrorSlot::GradeRisk => &mut self.grade_risk,
            ErrorSlot::Download => &mut self.download,
        }
    }
}

/// In-flight request counts. Counters rather than flags so a stale response settling does not
/// hide a newer request that is still running.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Loading {
    pub filter_options: bool,
    pub global_analysis: bool,
    pub schools: usize,
    pub grades: usize,
    pub scoped_analysis: usize,
    pub grade_risks: usize,
    pub downloading: bool,
}

impl Loading {
    pub fn analysis(&self) -> bool {
        self.global_analysis || self.scoped_analysis > 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StartupPhase {
    #[default]
    AwaitingCredentials,
    Loading,
    /// First attempt failed; the automatic retry is pending.
    Retrying,
    Ready,
    Failed,
}

impl StartupPhase {
    /// Past the initial-load barrier: the global fetch settled one way or the other.
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRiskKey {
    pub district: String,
    pub school: String,
}

impl GradeRiskKey {
    pub fn is_unscoped(&self) -> bool {
        self.district.is_empty() && self.school.is_empty()
    }
}

/// Discrete state transitions. Each one is applied to completion under the state lock.
#[derive(Debug, Clone)]
pub enum Action {
    DistrictSelected(String),
    SchoolSelected(String),
    GradeSelected(String),
    FiltersReset,
    FilterOptionsRequested,
    FilterOptionsLoaded(FilterOptionsResponse),
    FilterOptionsFailed(AppError),
    SchoolOptionsRequested,
    SchoolOptionsLoaded { generation: u64, schools: Vec<SchoolOption> },
    SchoolOptionsFailed { generation: u64, error: AppError },
    GradeOptionsRequested,
    GradeOptionsLoaded { generation: u64, grades: Vec<GradeOption> },
    GradeOptionsFailed { generation: u64, error: AppError },
    StartupBegan,
    GlobalAnalysisRequested,
    GlobalAnalysisLoaded(Arc<AnalysisSnapshot>),
    /// `terminal` is false only while the automatic startup retry is still pending.
    GlobalAnalysisFailed { error: AppError, terminal: bool },
    GlobalViewRestored,
    ScopedAnalysisRequested,
    ScopedAnalysisLoaded { generation: u64, snapshot: Arc<AnalysisSnapshot> },
    ScopedAnalysisFailed { generation: u64, error: AppError },
    SchoolForGradesSelected(String),
    GradeRisksRequested(GradeRiskKey),
    GradeRisksLoaded { key: GradeRiskKey, rows: Vec<GradeRiskRow> },
    GradeRisksFailed { key: GradeRiskKey, error: AppError },
    GradeRisksCleared,
    DownloadStarted,
    DownloadFinished(Option<AppError>),
    ErrorDismissed(ErrorSlot),
    ErrorsCleared,
    NotificationsToggled(bool),
    NotificationsPaused(bool),
    ImprovementChanged { tier: Tier, value: i32 },
    StrategySelected { tier: Tier, name: Option<String> },
    SuggestionApplied { tier: Tier, suggestion: AiSuggestion },
    SimulationReset,
    ProcessingSettled,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Self::DistrictSelected(_) => "district_selected",
            Self::SchoolSelected(_) => "school_selected",
            Self::GradeSelected(_) => "grade_selected",
            Self::FiltersReset => "filters_reset",
            Self::FilterOptionsRequested => "filter_options_requested",
            Self::FilterOptionsLoaded(_) => "filter_options_loaded",
            Self::FilterOptionsFailed(_) => "filter_options_failed",
            Self::SchoolOptionsRequested => "school_options_requested",
            Self::SchoolOptionsLoaded { .. } => "school_options_loaded",
            Self::SchoolOptionsFailed { .. } => "school_options_failed",
            Self::GradeOptionsRequested => "grade_options_requested",
            Self::GradeOptionsLoaded { .. } => "grade_options_loaded",
            Self::GradeOptionsFailed { .. } => "grade_options_failed",
            Self::StartupBegan => "startup_began",
            Self::GlobalAnalysisRequested => "global_analysis_requested",
            Self::GlobalAnalysisLoaded(_) => "global_analysis_loaded",
            Self::GlobalAnalysisFailed { .. } => "global_analysis_failed",
            Self::GlobalViewRestored => "global_view_restored",
            Self::ScopedAnalysisRequested => "scoped_analysis_requested",
            Self::ScopedAnalysisLoaded { .. } => "scoped_analysis_loaded",
            Self::ScopedAnalysisFailed { .. } => "scoped_analysis_failed",
            Self::SchoolForGradesSelected(_) => "school_for_grades_selected",
            Self::GradeRisksRequested(_) => "grade_risks_requested",
            Self::GradeRisksLoaded { .. } => "grade_risks_loaded",
            Self::GradeRisksFailed { .. } => "grade_risks_failed",
            Self::GradeRisksCleared => "grade_risks_cleared",
            Self::DownloadStarted => "download_started",
            Self::DownloadFinished(_) => "download_finished",
            Self::ErrorDismissed(_) => "error_dismissed",
            Self::ErrorsCleared => "errors_cleared",
            Self::NotificationsToggled(_) => "notifications_toggled",
            Self::NotificationsPaused(_) => "notifications_paused",
            Self::ImprovementChanged { .. } => "improvement_changed",
            Self::StrategySelected { .. } => "strategy_selected",
            Self::SuggestionApplied { .. } => "suggestion_applied",
            Self::SimulationReset => "simulation_reset",
            Self::ProcessingSettled => "processing_settled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Changed,
    /// A response for a selection that is no longer current; nothing was touched.
    Stale,
}

impl Applied {
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale)
    }
}

/// The single dashboard state container.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardState {
    cascade: FilterCascade,
    #[serde(skip)]
    cache: AnalysisCache,
    startup: StartupPhase,
    loading: Loading,
    errors: ErrorBanners,
    selected_school_for_grades: String,
    grade_risks: Vec<GradeRiskRow>,
    grade_risk_summary: GradeRiskSummary,
    /// Key of the grade-risk table last requested or shown.
    #[serde(skip)]
    grade_risk_key: Option<GradeRiskKey>,
    #[serde(skip)]
    global_grade_risks: Option<Vec<GradeRiskRow>>,
    simulation: SimulationState,
    projection: Projection,
    suggestions: [Vec<AiSuggestion>; 4],
    notifications_enabled: bool,
    notifications_paused: bool,
}

impl DashboardState {
    pub fn new(notifications_enabled: bool, jitter: &dyn Jitter) -> Self {
        Self {
            cascade: FilterCascade::new(),
            cache: AnalysisCache::new(),
            startup: StartupPhase::default(),
            loading: Loading::default(),
            errors: ErrorBanners::default(),
            selected_school_for_grades: String::new(),
            grade_risks: Vec::new(),
            grade_risk_summary: GradeRiskSummary::default(),
            grade_risk_key: None,
            global_grade_risks: None,
            simulation: SimulationState::default(),
            projection: Projection::default(),
            suggestions: generate_suggestions(jitter),
            notifications_enabled,
            notifications_paused: false,
        }
    }

    pub fn filters(&self) -> &FilterState {
        self.cascade.filters()
    }

    pub fn cascade(&self) -> &FilterCascade {
        &self.cascade
    }

    pub fn generations(&self) -> Generations {
        self.cascade.generations()
    }

    pub fn cache(&self) -> &AnalysisCache {
        &self.cache
    }

    pub fn view_mode(&self) -> ViewMode {
        self.cache.view_mode()
    }

    pub fn current_snapshot(&self) -> Option<&Arc<AnalysisSnapshot>> {
        self.cache.current()
    }

    pub fn startup(&self) -> StartupPhase {
        self.startup
    }

    pub fn loading(&self) -> &Loading {
        &self.loading
    }

    pub fn errors(&self) -> &ErrorBanners {
        &self.errors
    }

    pub fn selected_school_for_grades(&self) -> &str {
        &self.selected_school_for_grades
    }

    pub fn grade_risks(&self) -> &[GradeRiskRow] {
        &self.grade_risks
    }

    pub fn grade_risk_summary(&self) -> GradeRiskSummary {
        self.grade_risk_summary
    }

    pub fn simulation(&self) -> &SimulationState {
        &self.simulation
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn suggestions(&self, tier: Tier) -> &[AiSuggestion] {
        &self.suggestions[tier.index()]
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notifications_enabled
    }

    pub fn notifications_paused(&self) -> bool {
        self.notifications_paused
    }

    /// The explicitly picked grade-table school, else the filtered one.
    pub fn grade_risk_key(&self) -> GradeRiskKey {
        let school = if self.selected_school_for_grades.is_empty() {
            self.filters().school.clone()
        } else {
            self.selected_school_for_grades.clone()
        };
        GradeRiskKey {
            district: self.filters().district.clone(),
            school,
        }
    }

    pub fn last_grade_risk_key(&self) -> Option<&GradeRiskKey> {
        self.grade_risk_key.as_ref()
    }

    pub fn cached_global_grade_risks(&self) -> bool {
        self.global_grade_risks.is_some()
    }

    pub fn district_school_risks(&self) -> Vec<DistrictSchoolRiskRow> {
        district_school_risks(
            self.cache.current().map(Arc::as_ref),
            &self.filters().district,
            &self.cascade.options().all_district_schools,
            self.view_mode() == ViewMode::Global,
        )
    }

    pub fn apply(&mut self, action: Action) -> AppResult<Applied> {
        tracing::trace!(action = action.name(), "applying action");
        match action {
            Action::DistrictSelected(id) => {
                self.cascade.set_district(&id);
                self.selected_school_for_grades.clear();
                if id.is_empty() {
                    self.restore_global_view();
                }
            }
            Action::SchoolSelected(id) => {
                self.cascade.set_school(&id)?;
                self.selected_school_for_grades.clear();
            }
            Action::GradeSelected(id) => self.cascade.set_grade(&id)?,
            Action::FiltersReset => {
                self.cascade.reset_all();
                self.selected_school_for_grades.clear();
                self.errors.filter = None;
                self.restore_global_view();
            }
            Action::FilterOptionsRequested => self.loading.filter_options = true,
            Action::FilterOptionsLoaded(response) => {
                self.loading.filter_options = false;
                self.errors.filter = None;
                let districts = response
                    .districts
                    .into_iter()
                    .map(|mut option| {
                        option.value = normalize_district_value(&option.value);
                        option
                    })
                    .collect();
                if self.cascade.apply_district_options(districts, response.schools) {
                    self.selected_school_for_grades.clear();
                    self.restore_global_view();
                }
            }
            Action::FilterOptionsFailed(error) => {
                self.loading.filter_options = false;
                self.errors.filter = Some(format!("Failed to load filter options: {}", error.user_message()));
            }
            Action::SchoolOptionsRequested => self.loading.schools += 1,
            Action::SchoolOptionsLoaded { generation, schools } => {
                self.loading.schools = self.loading.schools.saturating_sub(1);
                if self.cascade.apply_school_options(generation, schools) == OptionsOutcome::Stale {
                    return Ok(Applied::Stale);
                }
            }
            Action::SchoolOptionsFailed { generation, error } => {
                self.loading.schools = self.loading.schools.saturating_sub(1);
                if self.cascade.fail_school_options(generation) == OptionsOutcome::Stale {
                    return Ok(Applied::Stale);
                }
                self.errors.filter = Some(format!("Failed to load schools: {}", error.user_message()));
            }
            Action::GradeOptionsRequested => self.loading.grades += 1,
            Action::GradeOptionsLoaded { generation, grades } => {
                self.loading.grades = self.loading.grades.saturating_sub(1);
                if self.cascade.apply_grade_options(generation, grades) == OptionsOutcome::Stale {
                    return Ok(Applied::Stale);
                }
            }
            Action::GradeOptionsFailed { generation, error } => {
                self.loading.grades = self.loading.grades.saturating_sub(1);
                if self.cascade.fail_grade_options(generation) == OptionsOutcome::Stale {
                    return Ok(Applied::Stale);
                }
                self.errors.filter = Some(format!("Failed to load grades: {}", error.user_message()));
            }
            Action::StartupBegan => {
                if !self.startup.is_settled() {
                    self.startup = StartupPhase::Loading;
                }
            }
            Action::GlobalAnalysisRequested => self.loading.global_analysis = true,
            Action::GlobalAnalysisLoaded(snapshot) => {
                self.loading.global_analysis = false;
                self.startup = StartupPhase::Ready;
                let activate = self.filters().is_global();
                self.cache.store_global(snapshot, activate);
                if activate {
                    self.errors.general = None;
                    self.refresh_projection();
                }
            }
            Action::GlobalAnalysisFailed { error, terminal } => {
                self.loading.global_analysis = false;
                if terminal {
                    if !self.startup.is_settled() {
                        self.startup = StartupPhase::Failed;
                    }
                    self.errors.general = Some(error.user_message());
                } else {
                    self.startup = StartupPhase::Retrying;
                    if !error.is_transient() {
                        self.errors.general = Some(error.user_message());
                    }
                }
            }
            Action::GlobalViewRestored => {
                if self.filters().is_global() {
                    self.restore_global_view();
                }
            }
            Action::ScopedAnalysisRequested => self.loading.scoped_analysis += 1,
            Action::ScopedAnalysisLoaded { generation, snapshot } => {
                self.loading.scoped_analysis = self.loading.scoped_analysis.saturating_sub(1);
                if generation != self.generations().tuple {
                    return Ok(Applied::Stale);
                }
                self.cache.store_scoped(snapshot);
                self.errors.general = None;
                self.refresh_projection();
            }
            Action::ScopedAnalysisFailed { generation, error } => {
                self.loading.scoped_analysis = self.loading.scoped_analysis.saturating_sub(1);
                if generation != self.generations().tuple {
                    return Ok(Applied::Stale);
                }
                self.errors.general = Some(error.user_message());
            }
            Action::SchoolForGradesSelected(id) => self.selected_school_for_grades = id,
            Action::GradeRisksRequested(key) => {
                self.loading.grade_risks += 1;
                self.errors.grade_risk = None;
                self.grade_risk_key = Some(key);
            }
            Action::GradeRisksLoaded { key, rows } => {
                self.loading.grade_risks = self.loading.grade_risks.saturating_sub(1);
                let rows = sorted_grade_rows(rows);
                if key.is_unscoped() {
                    self.global_grade_risks = Some(rows.clone());
                }
                if key != self.grade_risk_key() {
                    return Ok(Applied::Stale);
                }
                self.set_grade_rows(rows);
            }
            Action::GradeRisksFailed { key, error } => {
                self.loading.grade_risks = self.loading.grade_risks.saturating_sub(1);
                if key != self.grade_risk_key() {
                    return Ok(Applied::Stale);
                }
                self.grade_risk_key = None;
                self.errors.grade_risk = Some(format!("Failed to load grade risk data: {}", error.user_message()));
            }
            Action::GradeRisksCleared => {
                self.grade_risk_key = None;
                self.set_grade_rows(Vec::new());
            }
            Action::DownloadStarted => {
                self.loading.downloading = true;
                self.errors.download = None;
            }
            Action::DownloadFinished(error) => {
                self.loading.downloading = false;
                self.errors.download = error.map(|error| format!("Failed to download report: {}", error.user_message()));
            }
            Action::ErrorDismissed(slot) => *self.errors.slot_mut(slot) = None,
            Action::ErrorsCleared => self.errors = ErrorBanners::default(),
            Action::NotificationsToggled(enabled) => self.notifications_enabled = enabled,
            Action::NotificationsPaused(paused) => self.notifications_paused = paused,
            Action::ImprovementChanged { tier, value } => {
                self.simulation.set_improvement(tier, value);
                self.simulation_touched();
            }
            Action::StrategySelected { tier, name } => {
                self.simulation.select_strategy(tier, name.as_deref())?;
                self.simulation_touched();
            }
            Action::SuggestionApplied { tier, suggestion } => {
                self.simulation.apply_suggestion(tier, &suggestion)?;
                self.simulation_touched();
            }
            Action::SimulationReset => {
                self.simulation.reset();
                self.simulation_touched();
            }
            Action::ProcessingSettled => self.simulation.is_processing = false,
        }
        Ok(Applied::Changed)
    }

    fn restore_global_view(&mut self) {
        if self.cache.restore_global() {
            self.refresh_projection();
        } else {
            self.cache.mark_global_view();
        }
        if let Some(rows) = self.global_grade_risks.clone() {
            self.grade_risk_key = Some(GradeRiskKey::default());
            self.set_grade_rows(rows);
        }
    }

    fn set_grade_rows(&mut self, rows: Vec<GradeRiskRow>) {
        self.grade_risk_summary = summarize_grades(&rows);
        self.grade_risks = rows;
    }

    fn simulation_touched(&mut self) {
        self.simulation.is_processing = true;
        self.refresh_projection();
    }

    fn refresh_projection(&mut self) {
        self.projection = match self.cache.current() {
            Some(snapshot) => project(&self.simulation, &snapshot.summary_statistics),
            None => Projection::default(),
        };
    }
}
