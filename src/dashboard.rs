use crate::cascade::Generations;
use crate::config::DashboardConfig;
use crate::criteria::{download_criteria, search_criteria};
use crate::debounce::Debouncer;
use crate::errors::{AppError, AppResult};
use crate::insights::InsightsReport;
use crate::jitter::{Jitter, RandomJitter};
use crate::models::{
    AnalysisSnapshot, DistrictSchoolRiskRow, FilterLevel, FilterState, NotificationRecord, SearchCriteria, Tier,
    ViewMode,
};
use crate::notifications::{CyclerSettings, NotificationCycler, NotificationSink};
use crate::preferences::{PreferenceStore, SqlitePreferenceStore};
use crate::service::{DataService, HttpDataService};
use crate::simulation::{AiSuggestion, Projection};
use crate::state::{Action, Applied, DashboardState, ErrorSlot, StartupPhase};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;

const EVENT_CAPACITY: usize = 256;

/// What the rendering layer hears about. Read the state through the accessors for details.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DashboardEvent {
    FiltersChanged { filters: FilterState },
    OptionsLoaded { level: FilterLevel },
    SnapshotLoaded { view_mode: ViewMode },
    GradeRisksLoaded,
    ErrorRaised { slot: ErrorSlot, message: String },
    NotificationEmitted { record: NotificationRecord },
    SimulationUpdated,
    StartupSettled { phase: StartupPhase },
}

/// Result of one reducer step, with the differences callers react to.
struct Commit {
    applied: Applied,
    filters: FilterState,
    generations: Generations,
    filters_changed: bool,
}

struct Timers {
    schools: Debouncer,
    grades: Debouncer,
    analysis: Debouncer,
    processing: Debouncer,
    startup_retry: Option<JoinHandle<()>>,
    closed: bool,
}

impl Timers {
    fn new(config: &DashboardConfig) -> Self {
        Self {
            schools: Debouncer::new("schools", config.debounce()),
            grades: Debouncer::new("grades", config.debounce()),
            analysis: Debouncer::new("analysis", config.debounce()),
            processing: Debouncer::new("simulation", config.simulation_processing()),
            startup_retry: None,
            closed: false,
        }
    }

    fn close_all(&mut self) {
        self.closed = true;
        self.schools.close();
        self.grades.close();
        self.analysis.close();
        self.processing.close();
        if let Some(handle) = self.startup_retry.take() {
            handle.abort();
        }
    }
}

struct DashboardInner {
    config: DashboardConfig,
    service: Arc<dyn DataService>,
    preferences: Arc<dyn PreferenceStore>,
    state: Mutex<DashboardState>,
    timers: Mutex<Timers>,
    cycler: NotificationCycler,
    events: broadcast::Sender<DashboardEvent>,
    closed: AtomicBool,
}

/// Handle to one dashboard session. Cheap to clone; every clone drives the same state.
#[derive(Clone)]
pub struct Dashboard {
    inner: Arc<DashboardInner>,
}

impl Dashboard {
    pub fn new(
        config: DashboardConfig,
        service: Arc<dyn DataService>,
        preferences: Arc<dyn PreferenceStore>,
        jitter: Arc<dyn Jitter>,
    ) -> AppResult<Self> {
        config.validate()?;
        let enabled = match preferences.notifications_enabled() {
            Ok(value) => value.unwrap_or(true),
            Err(error) => {
                tracing::warn!(error = %error, "failed to read notification preference, defaulting to enabled");
                true
            }
        };

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let sink_events = events.clone();
        let sink: NotificationSink = Arc::new(move |record: &NotificationRecord| {
            let _ = sink_events.send(DashboardEvent::NotificationEmitted { record: record.clone() });
        });
        let cycler = NotificationCycler::new(
            CyclerSettings {
                min_interval: config.notification_min_interval(),
                max_interval: config.notification_max_interval(),
                history_capacity: config.notification_history_capacity,
            },
            enabled,
            Arc::clone(&jitter),
            sink,
        );

        Ok(Self {
            inner: Arc::new(DashboardInner {
                state: Mutex::new(DashboardState::new(enabled, jitter.as_ref())),
                timers: Mutex::new(Timers::new(&config)),
                config,
                service,
                preferences,
                cycler,
                events,
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Production wiring: HTTP backend, SQLite preferences under the data dir, random jitter.
    pub fn from_config(config: DashboardConfig, bearer_token: Option<&str>) -> AppResult<Self> {
        let service = HttpDataService::new(&config, bearer_token)?;
        let preferences = SqlitePreferenceStore::new(&config.preferences_path())?;
        Self::new(config, Arc::new(service), Arc::new(preferences), Arc::new(RandomJitter))
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.inner.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.inner.events.subscribe()
    }

    /// Waits for the credential gate, then loads filter options and the global snapshot together.
    /// A failed global fetch is retried once after the configured delay.
    pub async fn start(&self, mut credentials: watch::Receiver<bool>) -> AppResult<()> {
        if credentials.wait_for(|ready| *ready).await.is_err() {
            return Err(AppError::Internal("credential source closed before it became ready".to_string()));
        }
        tracing::info!("credentials ready, loading dashboard");
        self.commit(Action::StartupBegan).await?;

        if self.load_initial(false).await? {
            return Ok(());
        }
        let delay = self.inner.config.startup_retry_delay();
        tracing::warn!(delay_ms = delay.as_millis() as u64, "initial load failed, scheduling retry");
        let dashboard = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(error) = dashboard.load_initial(true).await {
                tracing::error!(error = %error, "startup retry failed");
            }
        });
        let mut timers = self.inner.timers.lock().await;
        if timers.closed {
            handle.abort();
        } else if let Some(previous) = timers.startup_retry.replace(handle) {
            previous.abort();
        }
        Ok(())
    }

    /// Manual retry once the automatic one is spent.
    pub async fn retry_startup(&self) -> AppResult<()> {
        if let Some(pending) = self.inner.timers.lock().await.startup_retry.take() {
            pending.abort();
        }
        self.load_initial(true).await.map(|_| ())
    }

    pub async fn set_district(&self, id: &str) -> AppResult<()> {
        let commit = self.commit(Action::DistrictSelected(id.to_string())).await?;
        tracing::info!(district = %id, "district filter changed");
        let mut timers = self.inner.timers.lock().await;
        timers.grades.cancel();
        if id.is_empty() {
            timers.schools.cancel();
        } else {
            let dashboard = self.clone();
            let generation = commit.generations.district;
            let district = id.to_string();
            timers.schools.schedule(logged("schools", async move {
                dashboard.fetch_schools(generation, district).await
            }));
        }
        self.schedule_analysis(&mut timers);
        Ok(())
    }

    /// Fails with `Validation` and changes nothing when no district is selected.
    pub async fn set_school(&self, id: &str) -> AppResult<()> {
        let commit = self.commit(Action::SchoolSelected(id.to_string())).await?;
        tracing::info!(school = %id, "school filter changed");
        let mut timers = self.inner.timers.lock().await;
        if id.is_empty() {
            timers.grades.cancel();
        } else {
            let dashboard = self.clone();
            let generation = commit.generations.school;
            let district = commit.filters.district.clone();
            let school = id.to_string();
            timers.grades.schedule(logged("grades", async move {
                dashboard.fetch_grades(generation, district, school).await
            }));
        }
        self.schedule_analysis(&mut timers);
        Ok(())
    }

    /// Fails with `Validation` and changes nothing when no school is selected.
    pub async fn set_grade(&self, id: &str) -> AppResult<()> {
        self.commit(Action::GradeSelected(id.to_string())).await?;
        tracing::info!(grade = %id, "grade filter changed");
        let mut timers = self.inner.timers.lock().await;
        self.schedule_analysis(&mut timers);
        Ok(())
    }

    /// Back to the global view. Reuses the cached global snapshot when there is one.
    pub async fn reset_all(&self) -> AppResult<()> {
        {
            let mut timers = self.inner.timers.lock().await;
            timers.schools.cancel();
            timers.grades.cancel();
            timers.analysis.cancel();
        }
        self.commit(Action::FiltersReset).await?;
        tracing::info!("filters reset");
        self.ensure_global().await?;
        self.refresh_grade_risks().await
    }

    pub async fn select_school_for_grades(&self, id: &str) -> AppResult<()> {
        self.commit(Action::SchoolForGradesSelected(id.to_string())).await?;
        self.refresh_grade_risks().await
    }

    /// Report bytes for the current filters. Saving the file is up to the caller.
    pub async fn download_report(&self, report_type: &str) -> AppResult<Vec<u8>> {
        let criteria = {
            let state = self.inner.state.lock().await;
            download_criteria(state.filters(), report_type)
        };
        self.commit(Action::DownloadStarted).await?;
        tracing::info!(report_type, "downloading report");
        match self.inner.service.download_report(report_type, &criteria).await {
            Ok(bytes) => {
                self.commit(Action::DownloadFinished(None)).await?;
                Ok(bytes)
            }
            Err(error) => {
                tracing::warn!(report_type, error = %error, "report download failed");
                self.commit(Action::DownloadFinished(Some(error.clone()))).await?;
                Err(error)
            }
        }
    }

    pub async fn dismiss_error(&self, slot: ErrorSlot) -> AppResult<()> {
        self.commit(Action::ErrorDismissed(slot)).await.map(|_| ())
    }

    pub async fn clear_errors(&self) -> AppResult<()> {
        self.commit(Action::ErrorsCleared).await.map(|_| ())
    }

    /// Persists the preference; disabling silences every template, critical ones included.
    pub async fn set_notifications_enabled(&self, enabled: bool) -> AppResult<()> {
        self.commit(Action::NotificationsToggled(enabled)).await?;
        self.inner.cycler.set_enabled(enabled).await;
        self.inner.preferences.set_notifications_enabled(enabled)?;
        tracing::info!(enabled, "notification preference changed");
        Ok(())
    }

    pub async fn toggle_notifications(&self) -> AppResult<bool> {
        let enabled = !self.inner.state.lock().await.notifications_enabled();
        self.set_notifications_enabled(enabled).await?;
        Ok(enabled)
    }

    pub async fn pause_notifications(&self) -> AppResult<()> {
        self.commit(Action::NotificationsPaused(true)).await?;
        self.inner.cycler.pause().await;
        Ok(())
    }

    pub async fn resume_notifications(&self) -> AppResult<()> {
        self.commit(Action::NotificationsPaused(false)).await?;
        self.inner.cycler.resume().await;
        Ok(())
    }

    pub async fn clear_notification_history(&self) {
        self.inner.cycler.clear_history().await;
    }

    pub async fn notification_history(&self) -> Vec<NotificationRecord> {
        self.inner.cycler.history().await
    }

    pub async fn notification_cursor(&self) -> usize {
        self.inner.cycler.cursor().await
    }

    pub async fn set_improvement(&self, tier: Tier, value: i32) -> AppResult<()> {
        self.simulate(Action::ImprovementChanged { tier, value }).await
    }

    pub async fn select_strategy(&self, tier: Tier, name: Option<&str>) -> AppResult<()> {
        self.simulate(Action::StrategySelected {
            tier,
            name: name.map(ToString::to_string),
        })
        .await
    }

    pub async fn apply_ai_suggestion(&self, tier: Tier, suggestion: &AiSuggestion) -> AppResult<()> {
        self.simulate(Action::SuggestionApplied {
            tier,
            suggestion: suggestion.clone(),
        })
        .await
    }

    pub async fn reset_simulation(&self) -> AppResult<()> {
        self.simulate(Action::SimulationReset).await
    }

    pub async fn state(&self) -> DashboardState {
        self.inner.state.lock().await.clone()
    }

    pub async fn filters(&self) -> FilterState {
        self.inner.state.lock().await.filters().clone()
    }

    pub async fn view_mode(&self) -> ViewMode {
        self.inner.state.lock().await.view_mode()
    }

    pub async fn current_snapshot(&self) -> Option<Arc<AnalysisSnapshot>> {
        self.inner.state.lock().await.current_snapshot().cloned()
    }

    pub async fn global_snapshot(&self) -> Option<Arc<AnalysisSnapshot>> {
        self.inner.state.lock().await.cache().global().cloned()
    }

    pub async fn projection(&self) -> Projection {
        self.inner.state.lock().await.projection().clone()
    }

    pub async fn district_school_risks(&self) -> Vec<DistrictSchoolRiskRow> {
        self.inner.state.lock().await.district_school_risks()
    }

    pub async fn insights(&self) -> InsightsReport {
        self.current_snapshot()
            .await
            .map(|snapshot| InsightsReport::from_snapshot(&snapshot))
            .unwrap_or_default()
    }

    /// Stops every timer. In-flight fetches still settle but nothing new is scheduled by them.
    pub async fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.timers.lock().await.close_all();
        self.inner.cycler.shutdown().await;
        tracing::info!("dashboard shut down");
    }

    async fn commit(&self, action: Action) -> AppResult<Commit> {
        let (commit, snapshot, events) = {
            let mut state = self.inner.state.lock().await;
            let filters_before = state.filters().clone();
            let snapshot_before = state.current_snapshot().cloned();
            let errors_before = state.errors().clone();
            let phase_before = state.startup();

            let applied = state.apply(action)?;

            let mut events = Vec::new();
            let filters = state.filters().clone();
            let filters_changed = filters != filters_before;
            if filters_changed {
                events.push(DashboardEvent::FiltersChanged {
                    filters: filters.clone(),
                });
            }
            let snapshot = match (state.current_snapshot(), snapshot_before.as_ref()) {
                (Some(after), Some(before)) if Arc::ptr_eq(after, before) => None,
                (Some(after), _) => Some(Arc::clone(after)),
                (None, _) => None,
            };
            if snapshot.is_some() {
                events.push(DashboardEvent::SnapshotLoaded {
                    view_mode: state.view_mode(),
                });
            }
            for slot in ErrorSlot::ALL {
                match state.errors().get(slot) {
                    Some(message) if errors_before.get(slot) != Some(message) => {
                        events.push(DashboardEvent::ErrorRaised {
                            slot,
                            message: message.to_string(),
                        });
                    }
                    _ => {}
                }
            }
            if state.startup() != phase_before && state.startup().is_settled() {
                events.push(DashboardEvent::StartupSettled {
                    phase: state.startup(),
                });
            }
            let commit = Commit {
                applied,
                filters,
                generations: state.generations(),
                filters_changed,
            };
            (commit, snapshot, events)
        };

        for event in events {
            self.publish(event);
        }
        if let Some(snapshot) = snapshot {
            if !self.inner.closed.load(Ordering::SeqCst) {
                self.inner.cycler.on_snapshot(snapshot).await;
            }
        }
        Ok(commit)
    }

    fn publish(&self, event: DashboardEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    fn schedule_analysis(&self, timers: &mut Timers) {
        let dashboard = self.clone();
        timers
            .analysis
            .schedule(logged("analysis", async move { dashboard.run_analysis().await }));
    }

    async fn load_initial(&self, terminal: bool) -> AppResult<bool> {
        let need_options = {
            let state = self.inner.state.lock().await;
            state.cascade().options().districts.is_empty() && !state.loading().filter_options
        };
        let options = async {
            if need_options {
                self.load_filter_options().await
            } else {
                Ok(())
            }
        };
        let (options_result, global_result) = tokio::join!(options, self.fetch_global(terminal));
        options_result?;
        let settled = global_result?;
        if settled {
            self.refresh_grade_risks().await?;
        }
        Ok(settled)
    }

    async fn load_filter_options(&self) -> AppResult<()> {
        self.commit(Action::FilterOptionsRequested).await?;
        match self.inner.service.get_filter_options().await {
            Ok(response) => {
                let commit = self.commit(Action::FilterOptionsLoaded(response)).await?;
                self.publish(DashboardEvent::OptionsLoaded {
                    level: FilterLevel::District,
                });
                if commit.filters_changed {
                    self.reschedule_analysis().await;
                }
            }
            Err(error) => {
                tracing::warn!(error = %error, "failed to load filter options");
                self.commit(Action::FilterOptionsFailed(error)).await?;
            }
        }
        Ok(())
    }

    /// Returns false when the fetch failed. A fetch already owned by someone else counts as success.
    async fn fetch_global(&self, terminal: bool) -> AppResult<bool> {
        {
            let mut state = self.inner.state.lock().await;
            if state.cache().has_global() || state.loading().global_analysis {
                return Ok(true);
            }
            state.apply(Action::GlobalAnalysisRequested)?;
        }
        tracing::debug!("fetching global analysis");
        match self
            .inner
            .service
            .get_prediction_insights(&SearchCriteria::default())
            .await
        {
            Ok(snapshot) => {
                self.commit(Action::GlobalAnalysisLoaded(Arc::new(snapshot))).await?;
                Ok(true)
            }
            Err(error) => {
                tracing::warn!(terminal, error = %error, "global analysis fetch failed");
                self.commit(Action::GlobalAnalysisFailed { error, terminal }).await?;
                Ok(false)
            }
        }
    }

    async fn ensure_global(&self) -> AppResult<()> {
        let cached = self.inner.state.lock().await.cache().has_global();
        if cached {
            self.commit(Action::GlobalViewRestored).await?;
            return Ok(());
        }
        self.fetch_global(true).await.map(|_| ())
    }

    async fn fetch_schools(&self, generation: u64, district: String) -> AppResult<()> {
        self.commit(Action::SchoolOptionsRequested).await?;
        tracing::debug!(district = %district, generation, "fetching schools");
        let action = match self.inner.service.get_schools_by_district(&district).await {
            Ok(schools) => Action::SchoolOptionsLoaded { generation, schools },
            Err(error) => {
                tracing::warn!(district = %district, error = %error, "failed to load schools");
                Action::SchoolOptionsFailed { generation, error }
            }
        };
        let loaded = matches!(action, Action::SchoolOptionsLoaded { .. });
        let commit = self.commit(action).await?;
        if commit.applied.is_stale() {
            tracing::debug!(district = %district, generation, "discarding stale school list");
            return Ok(());
        }
        if loaded {
            self.publish(DashboardEvent::OptionsLoaded {
                level: FilterLevel::School,
            });
        }
        if commit.filters_changed {
            self.reschedule_analysis().await;
        }
        Ok(())
    }

    async fn fetch_grades(&self, generation: u64, district: String, school: String) -> AppResult<()> {
        self.commit(Action::GradeOptionsRequested).await?;
        tracing::debug!(district = %district, school = %school, generation, "fetching grades");
        let action = match self.inner.service.get_grades_by_school(&school, &district).await {
            Ok(grades) => Action::GradeOptionsLoaded { generation, grades },
            Err(error) => {
                tracing::warn!(school = %school, error = %error, "failed to load grades");
                Action::GradeOptionsFailed { generation, error }
            }
        };
        let loaded = matches!(action, Action::GradeOptionsLoaded { .. });
        let commit = self.commit(action).await?;
        if commit.applied.is_stale() {
            tracing::debug!(school = %school, generation, "discarding stale grade list");
            return Ok(());
        }
        if loaded {
            self.publish(DashboardEvent::OptionsLoaded {
                level: FilterLevel::Grade,
            });
        }
        if commit.filters_changed {
            self.reschedule_analysis().await;
        }
        Ok(())
    }

    async fn reschedule_analysis(&self) {
        let mut timers = self.inner.timers.lock().await;
        self.schedule_analysis(&mut timers);
    }

    /// Runs once per debounce burst against whatever tuple is current when the timer fires.
    async fn run_analysis(&self) -> AppResult<()> {
        let (filters, generation) = {
            let state = self.inner.state.lock().await;
            (state.filters().clone(), state.generations().tuple)
        };
        let (analysis, grade_risks) = tokio::join!(self.fetch_analysis(filters, generation), self.refresh_grade_risks());
        analysis?;
        grade_risks
    }

    async fn fetch_analysis(&self, filters: FilterState, generation: u64) -> AppResult<()> {
        if filters.is_global() {
            return self.ensure_global().await;
        }
        let criteria = search_criteria(&filters);
        self.commit(Action::ScopedAnalysisRequested).await?;
        tracing::debug!(
            district = %criteria.district_code,
            school = %criteria.school_code,
            grade = %criteria.grade_code,
            generation,
            "fetching scoped analysis"
        );
        let action = match self.inner.service.get_prediction_insights(&criteria).await {
            Ok(snapshot) => Action::ScopedAnalysisLoaded {
                generation,
                snapshot: Arc::new(snapshot),
            },
            Err(error) => {
                tracing::warn!(generation, error = %error, "scoped analysis fetch failed");
                Action::ScopedAnalysisFailed { generation, error }
            }
        };
        if self.commit(action).await?.applied.is_stale() {
            tracing::debug!(generation, "discarding stale analysis");
        }
        Ok(())
    }

    async fn refresh_grade_risks(&self) -> AppResult<()> {
        let key = {
            let mut state = self.inner.state.lock().await;
            let key = state.grade_risk_key();
            if key.is_unscoped() && state.view_mode() != ViewMode::Global {
                None
            } else if state.last_grade_risk_key() == Some(&key) {
                return Ok(());
            } else {
                state.apply(Action::GradeRisksRequested(key.clone()))?;
                Some(key)
            }
        };
        let Some(key) = key else {
            self.commit(Action::GradeRisksCleared).await?;
            return Ok(());
        };

        tracing::debug!(district = %key.district, school = %key.school, "fetching grade risks");
        let action = match self.inner.service.get_grade_risks(&key.district, &key.school).await {
            Ok(response) => Action::GradeRisksLoaded {
                key: key.clone(),
                rows: response.grades,
            },
            Err(error) => {
                tracing::warn!(district = %key.district, school = %key.school, error = %error, "failed to load grade risks");
                Action::GradeRisksFailed { key: key.clone(), error }
            }
        };
        let loaded = matches!(action, Action::GradeRisksLoaded { .. });
        let commit = self.commit(action).await?;
        if commit.applied.is_stale() {
            tracing::debug!(district = %key.district, school = %key.school, "discarding stale grade risks");
        } else if loaded {
            self.publish(DashboardEvent::GradeRisksLoaded);
        }
        Ok(())
    }

    async fn simulate(&self, action: Action) -> AppResult<()> {
        self.commit(action).await?;
        self.publish(DashboardEvent::SimulationUpdated);
        let dashboard = self.clone();
        self.inner
            .timers
            .lock()
            .await
            .processing
            .schedule(logged("simulation", async move {
                dashboard.commit(Action::ProcessingSettled).await?;
                dashboard.publish(DashboardEvent::SimulationUpdated);
                Ok(())
            }));
        Ok(())
    }
}

fn logged<F>(job: &'static str, future: F) -> impl Future<Output = ()> + Send + 'static
where
    F: Future<Output = AppResult<()>> + Send + 'static,
{
    async move {
        if let Err(error) = future.await {
            tracing::error!(job, error = %error, "background job failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Dashboard, DashboardEvent};
    use crate::config::DashboardConfig;
    use crate::errors::{AppError, AppResult};
    use crate::jitter::SequenceJitter;
    use crate::models::{
        AnalysisSnapshot, DownloadCriteria, FilterOptionsResponse, GradeOption, GradeRiskResponse, SchoolOption,
        SearchCriteria,
    };
    use crate::preferences::{MemoryPreferenceStore, PreferenceStore};
    use crate::service::DataService;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct StaticService;

    #[async_trait]
    impl DataService for StaticService {
        async fn get_filter_options(&self) -> AppResult<FilterOptionsResponse> {
            Ok(FilterOptionsResponse::default())
        }

        async fn get_schools_by_district(&self, _district: &str) -> AppResult<Vec<SchoolOption>> {
            Ok(Vec::new())
        }

        async fn get_grades_by_school(&self, _school: &str, _district: &str) -> AppResult<Vec<GradeOption>> {
            Ok(Vec::new())
        }

        async fn get_prediction_insights(&self, _criteria: &SearchCriteria) -> AppResult<AnalysisSnapshot> {
            Ok(AnalysisSnapshot::default())
        }

        async fn get_grade_risks(&self, _district: &str, _school: &str) -> AppResult<GradeRiskResponse> {
            Ok(GradeRiskResponse::default())
        }

        async fn download_report(&self, report_type: &str, criteria: &DownloadCriteria) -> AppResult<Vec<u8>> {
            if report_type == "broken" {
                return Err(AppError::Request("report generator crashed".to_string()));
            }
            Ok(format!("{}:{}", report_type, criteria.criteria.district_code).into_bytes())
        }
    }

    fn dashboard(preferences: Arc<MemoryPreferenceStore>) -> Dashboard {
        Dashboard::new(
            DashboardConfig::default(),
            Arc::new(StaticService),
            preferences,
            Arc::new(SequenceJitter::new(vec![0])),
        )
        .expect("dashboard")
    }

    #[tokio::test(start_paused = true)]
    async fn notification_toggle_is_persisted() {
        let preferences = Arc::new(MemoryPreferenceStore::new(Some(false)));
        let dashboard = dashboard(Arc::clone(&preferences));
        assert!(!dashboard.state().await.notifications_enabled());

        assert!(dashboard.toggle_notifications().await.expect("toggle"));
        assert_eq!(preferences.notifications_enabled().expect("read"), Some(true));
        dashboard.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn download_failure_sets_banner() {
        let dashboard = dashboard(Arc::new(MemoryPreferenceStore::default()));
        let mut events = dashboard.subscribe();

        let bytes = dashboard.download_report("summary").await.expect("download");
        assert_eq!(bytes, b"summary:".to_vec());

        let error = dashboard.download_report("broken").await.expect_err("should fail");
        assert!(matches!(error, AppError::Request(_)));
        let state = dashboard.state().await;
        assert!(!state.loading().downloading);
        assert_eq!(
            state.errors().download.as_deref(),
            Some("Failed to download report: report generator crashed")
        );
        let raised = std::iter::from_fn(|| events.try_recv().ok())
            .any(|event| matches!(event, DashboardEvent::ErrorRaised { .. }));
        assert!(raised);

        dashboard.clear_errors().await.expect("clear");
        assert!(dashboard.state().await.errors().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn grade_without_school_is_rejected() {
        let dashboard = dashboard(Arc::new(MemoryPreferenceStore::default()));
        let result = dashboard.set_grade("9").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(dashboard.filters().await.grade.is_empty());
    }
}
