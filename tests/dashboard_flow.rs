use async_trait::async_trait;
use attendance_risk_console_lib::jitter::SequenceJitter;
use attendance_risk_console_lib::models::{
    AnalysisSnapshot, DistrictOption, DownloadCriteria, FilterOptionsResponse, GradeOption, GradeRiskResponse,
    GradeRiskRow, SchoolOption, SearchCriteria, Tier, ViewMode,
};
use attendance_risk_console_lib::preferences::MemoryPreferenceStore;
use attendance_risk_console_lib::{
    AppError, AppResult, Dashboard, DashboardConfig, DashboardEvent, DataService, StartupPhase,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::{oneshot, watch};
use tokio::time::{sleep, Duration};

#[derive(Debug, Default)]
struct Calls {
    filter_options: usize,
    schools: Vec<String>,
    grades: Vec<(String, String)>,
    insights: Vec<SearchCriteria>,
    grade_risks: Vec<(String, String)>,
}

impl Calls {
    fn total(&self) -> usize {
        self.filter_options + self.schools.len() + self.grades.len() + self.insights.len() + self.grade_risks.len()
    }

    fn scoped_insights(&self) -> Vec<SearchCriteria> {
        self.insights
            .iter()
            .filter(|criteria| !criteria.is_unscoped())
            .cloned()
            .collect()
    }
}

/// Scripted backend. Responses are derived from the request so assertions can tell them apart.
#[derive(Default)]
struct ScriptedService {
    calls: Mutex<Calls>,
    global_failures: Mutex<VecDeque<AppError>>,
    scoped_failure: Mutex<Option<AppError>>,
    failing_districts: Mutex<Vec<String>>,
    gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
}

impl ScriptedService {
    fn calls<T>(&self, read: impl FnOnce(&Calls) -> T) -> T {
        read(&*self.calls.lock().expect("calls"))
    }

    fn record(&self, write: impl FnOnce(&mut Calls)) {
        write(&mut *self.calls.lock().expect("calls"));
    }

    fn fail_global_with(&self, errors: Vec<AppError>) {
        *self.global_failures.lock().expect("failures") = errors.into();
    }

    fn fail_scoped_with(&self, error: AppError) {
        *self.scoped_failure.lock().expect("failure") = Some(error);
    }

    fn fail_schools_for(&self, district: &str) {
        self.failing_districts.lock().expect("districts").push(district.to_string());
    }

    /// Holds the next matching request until the returned sender fires or drops.
    fn gate(&self, key: &str) -> oneshot::Sender<()> {
        let (release, wait) = oneshot::channel();
        self.gates.lock().expect("gates").insert(key.to_string(), wait);
        release
    }

    async fn pass_gate(&self, key: &str) {
        let wait = self.gates.lock().expect("gates").remove(key);
        if let Some(wait) = wait {
            let _ = wait.await;
        }
    }
}

fn snapshot_for(criteria: &SearchCriteria) -> AnalysisSnapshot {
    let mut snapshot = AnalysisSnapshot::default();
    let stats = &mut snapshot.summary_statistics;
    stats.total_students = if criteria.is_unscoped() {
        1000
    } else {
        criteria.district_code.parse().unwrap_or(1)
    };
    stats.below85_students = stats.total_students / 2;
    stats.tier1_students = stats.total_students / 2;
    stats.tier2_students = stats.total_students / 4;
    stats.tier3_students = stats.total_students / 8;
    stats.tier4_students = stats.total_students / 8;
    snapshot
}

#[async_trait]
impl DataService for ScriptedService {
    async fn get_filter_options(&self) -> AppResult<FilterOptionsResponse> {
        self.record(|calls| calls.filter_options += 1);
        Ok(FilterOptionsResponse {
            districts: vec![
                DistrictOption {
                    value: "D12".to_string(),
                    label: "District 12".to_string(),
                },
                DistrictOption {
                    value: "D14".to_string(),
                    label: "District 14".to_string(),
                },
            ],
            schools: Vec::new(),
            grades: Vec::new(),
        })
    }

    async fn get_schools_by_district(&self, district: &str) -> AppResult<Vec<SchoolOption>> {
        self.record(|calls| calls.schools.push(district.to_string()));
        self.pass_gate(&format!("schools:{}", district)).await;
        if self.failing_districts.lock().expect("districts").iter().any(|d| d == district) {
            return Err(AppError::Transport("connection reset".to_string()));
        }
        Ok(vec![SchoolOption {
            value: format!("{}-7", district),
            label: format!("School {}-7", district),
            district: Some(district.to_string()),
            location_id: None,
        }])
    }

    async fn get_grades_by_school(&self, school: &str, district: &str) -> AppResult<Vec<GradeOption>> {
        self.record(|calls| calls.grades.push((school.to_string(), district.to_string())));
        Ok(["9", "10"]
            .iter()
            .map(|grade| GradeOption {
                value: grade.to_string(),
                label: format!("Grade {}", grade),
                school: Some(school.to_string()),
                district: Some(district.to_string()),
            })
            .collect())
    }

    async fn get_prediction_insights(&self, criteria: &SearchCriteria) -> AppResult<AnalysisSnapshot> {
        self.record(|calls| calls.insights.push(criteria.clone()));
        self.pass_gate(&format!("insights:{}", criteria.district_code)).await;
        if criteria.is_unscoped() {
            if let Some(error) = self.global_failures.lock().expect("failures").pop_front() {
                return Err(error);
            }
        } else if let Some(error) = self.scoped_failure.lock().expect("failure").clone() {
            return Err(error);
        }
        Ok(snapshot_for(criteria))
    }

    async fn get_grade_risks(&self, district: &str, school: &str) -> AppResult<GradeRiskResponse> {
        self.record(|calls| calls.grade_risks.push((district.to_string(), school.to_string())));
        Ok(GradeRiskResponse {
            grades: vec![
                GradeRiskRow {
                    grade: "10".to_string(),
                    risk_percentage: 12.5,
                    student_count: 80,
                },
                GradeRiskRow {
                    grade: "9".to_string(),
                    risk_percentage: 31.0,
                    student_count: 120,
                },
            ],
            total_students: 200,
            average_risk: 21.75,
        })
    }

    async fn download_report(&self, report_type: &str, _criteria: &DownloadCriteria) -> AppResult<Vec<u8>> {
        Ok(report_type.as_bytes().to_vec())
    }
}

fn build(service: &Arc<ScriptedService>, notifications: Option<bool>) -> Dashboard {
    let config = DashboardConfig {
        data_dir: std::env::temp_dir().join("attendance-risk-console-tests"),
        ..DashboardConfig::default()
    };
    Dashboard::new(
        config,
        Arc::clone(service) as Arc<dyn DataService>,
        Arc::new(MemoryPreferenceStore::new(notifications)),
        Arc::new(SequenceJitter::new(vec![0])),
    )
    .expect("dashboard")
}

async fn started(service: &Arc<ScriptedService>) -> Dashboard {
    let dashboard = build(service, None);
    let (_credentials, ready) = watch::channel(true);
    dashboard.start(ready).await.expect("start");
    dashboard
}

async fn settle() {
    sleep(Duration::from_millis(400)).await;
}

#[tokio::test(start_paused = true)]
async fn startup_waits_for_credentials_then_loads_global_view() {
    let service = Arc::new(ScriptedService::default());
    let dashboard = build(&service, None);
    let mut events = dashboard.subscribe();
    let (credentials, ready) = watch::channel(false);

    let starting = dashboard.clone();
    let handle = tokio::spawn(async move { starting.start(ready).await });
    settle().await;
    assert_eq!(service.calls(Calls::total), 0);

    credentials.send(true).expect("send");
    handle.await.expect("join").expect("start");

    let state = dashboard.state().await;
    assert_eq!(state.startup(), StartupPhase::Ready);
    assert_eq!(state.view_mode(), ViewMode::Global);
    let districts: Vec<&str> = state
        .cascade()
        .options()
        .districts
        .iter()
        .map(|option| option.value.as_str())
        .collect();
    assert_eq!(districts, vec!["12", "14"]);
    assert_eq!(
        dashboard.current_snapshot().await.expect("snapshot").summary_statistics.total_students,
        1000
    );
    assert_eq!(service.calls(|calls| calls.filter_options), 1);
    assert_eq!(
        service.calls(|calls| calls.grade_risks.clone()),
        vec![(String::new(), String::new())]
    );
    let grades: Vec<&str> = state.grade_risks().iter().map(|row| row.grade.as_str()).collect();
    assert_eq!(grades, vec!["9", "10"]);

    let received: Vec<DashboardEvent> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    assert!(received.contains(&DashboardEvent::StartupSettled {
        phase: StartupPhase::Ready
    }));
    assert!(received
        .iter()
        .any(|event| matches!(event, DashboardEvent::NotificationEmitted { .. })));
    assert_eq!(dashboard.notification_history().await.len(), 1);
    dashboard.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn district_selection_loads_schools_and_scoped_analysis() {
    let service = Arc::new(ScriptedService::default());
    let dashboard = started(&service).await;

    dashboard.set_district("12").await.expect("district");
    assert_eq!(dashboard.view_mode().await, ViewMode::Global);
    settle().await;

    assert_eq!(service.calls(|calls| calls.schools.clone()), vec!["12".to_string()]);
    assert_eq!(
        service.calls(Calls::scoped_insights),
        vec![SearchCriteria {
            district_code: "12".to_string(),
            ..SearchCriteria::default()
        }]
    );
    assert_eq!(dashboard.view_mode().await, ViewMode::Scoped);
    assert_eq!(
        dashboard.current_snapshot().await.expect("snapshot").summary_statistics.total_students,
        12
    );
    let state = dashboard.state().await;
    assert_eq!(state.cascade().options().schools.len(), 1);
    assert_eq!(state.cascade().options().schools[0].value, "12-7");
    assert!(service
        .calls(|calls| calls.grade_risks.clone())
        .contains(&("12".to_string(), String::new())));
    assert_eq!(dashboard.notification_history().await.len(), 2);
    dashboard.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn rapid_edits_coalesce_into_one_fetch_per_level() {
    let service = Arc::new(ScriptedService::default());
    let dashboard = started(&service).await;

    for district in ["12", "14", "12", "14", "12"] {
        dashboard.set_district(district).await.expect("district");
        sleep(Duration::from_millis(20)).await;
    }
    settle().await;

    assert_eq!(service.calls(|calls| calls.schools.clone()), vec!["12".to_string()]);
    assert_eq!(service.calls(Calls::scoped_insights).len(), 1);

    dashboard.set_school("12-7").await.expect("school");
    dashboard.set_grade("9").await.expect("grade");
    settle().await;

    assert_eq!(
        service.calls(|calls| calls.grades.clone()),
        vec![("12-7".to_string(), "12".to_string())]
    );
    let scoped = service.calls(Calls::scoped_insights);
    assert_eq!(scoped.len(), 2);
    assert_eq!(
        scoped[1],
        SearchCriteria {
            district_code: "12".to_string(),
            school_code: "7".to_string(),
            grade_code: "9".to_string(),
        }
    );
    assert_eq!(dashboard.filters().await.grade, "9");
    dashboard.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn late_responses_for_an_old_district_are_discarded() {
    let service = Arc::new(ScriptedService::default());
    let dashboard = started(&service).await;

    let release_schools = service.gate("schools:12");
    let release_insights = service.gate("insights:12");
    dashboard.set_district("12").await.expect("district");
    settle().await;
    assert_eq!(service.calls(|calls| calls.schools.clone()), vec!["12".to_string()]);

    dashboard.set_district("14").await.expect("district");
    settle().await;
    assert_eq!(
        dashboard.current_snapshot().await.expect("snapshot").summary_statistics.total_students,
        14
    );

    release_schools.send(()).expect("release schools");
    release_insights.send(()).expect("release insights");
    settle().await;

    let state = dashboard.state().await;
    assert_eq!(state.filters().district, "14");
    let schools: Vec<&str> = state
        .cascade()
        .options()
        .schools
        .iter()
        .map(|option| option.value.as_str())
        .collect();
    assert_eq!(schools, vec!["14-7"]);
    assert_eq!(
        dashboard.current_snapshot().await.expect("snapshot").summary_statistics.total_students,
        14
    );
    assert_eq!(state.loading().schools, 0);
    assert_eq!(state.loading().scoped_analysis, 0);
    dashboard.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn reset_reuses_the_cached_global_snapshot() {
    let service = Arc::new(ScriptedService::default());
    let dashboard = started(&service).await;
    let global = dashboard.global_snapshot().await.expect("global");

    dashboard.set_district("12").await.expect("district");
    settle().await;
    assert_eq!(dashboard.view_mode().await, ViewMode::Scoped);

    let before = service.calls(Calls::total);
    dashboard.reset_all().await.expect("reset");
    settle().await;
    assert_eq!(service.calls(Calls::total), before);
    assert_eq!(dashboard.view_mode().await, ViewMode::Global);
    let current = dashboard.current_snapshot().await.expect("snapshot");
    assert!(Arc::ptr_eq(&current, &global));
    assert_eq!(dashboard.state().await.grade_risks().len(), 2);

    dashboard.reset_all().await.expect("reset again");
    settle().await;
    assert_eq!(service.calls(Calls::total), before);
    assert!(dashboard.filters().await.is_global());
    dashboard.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn reset_without_a_cached_global_fetches_it_once() {
    let service = Arc::new(ScriptedService::default());
    let dashboard = build(&service, Some(false));

    dashboard.reset_all().await.expect("reset");
    dashboard.reset_all().await.expect("reset again");
    settle().await;

    let unscoped = service.calls(|calls| calls.insights.iter().filter(|c| c.is_unscoped()).count());
    assert_eq!(unscoped, 1);
    assert_eq!(dashboard.view_mode().await, ViewMode::Global);
    assert!(dashboard.global_snapshot().await.is_some());
    dashboard.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn warming_up_backend_is_retried_once_without_a_banner() {
    let service = Arc::new(ScriptedService::default());
    service.fail_global_with(vec![AppError::from_status(503, None)]);
    let dashboard = started(&service).await;

    let state = dashboard.state().await;
    assert_eq!(state.startup(), StartupPhase::Retrying);
    assert!(state.errors().general.is_none());
    assert!(dashboard.current_snapshot().await.is_none());

    sleep(Duration::from_millis(2900)).await;
    assert_eq!(service.calls(|calls| calls.insights.len()), 1);

    sleep(Duration::from_millis(200)).await;
    let state = dashboard.state().await;
    assert_eq!(state.startup(), StartupPhase::Ready);
    assert!(state.errors().general.is_none());
    assert_eq!(service.calls(|calls| calls.insights.len()), 2);
    assert_eq!(service.calls(|calls| calls.filter_options), 1);
    dashboard.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn second_startup_failure_surfaces_and_manual_retry_recovers() {
    let service = Arc::new(ScriptedService::default());
    service.fail_global_with(vec![AppError::from_status(503, None), AppError::from_status(503, None)]);
    let dashboard = started(&service).await;

    sleep(Duration::from_millis(3100)).await;
    let state = dashboard.state().await;
    assert_eq!(state.startup(), StartupPhase::Failed);
    assert_eq!(
        state.errors().general.as_deref(),
        Some("Server is still initializing. Please try again in a moment.")
    );
    assert_eq!(service.calls(|calls| calls.insights.len()), 2);

    dashboard.retry_startup().await.expect("retry");
    let state = dashboard.state().await;
    assert!(state.errors().general.is_none());
    assert_eq!(state.view_mode(), ViewMode::Global);
    assert!(dashboard.current_snapshot().await.is_some());
    dashboard.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn scoped_failure_keeps_the_previous_snapshot() {
    let service = Arc::new(ScriptedService::default());
    let dashboard = started(&service).await;
    let global = dashboard.global_snapshot().await.expect("global");
    service.fail_scoped_with(AppError::from_status(404, None));

    dashboard.set_district("12").await.expect("district");
    settle().await;

    let state = dashboard.state().await;
    assert_eq!(state.errors().general.as_deref(), Some("No data found for the selected filters."));
    assert_eq!(state.view_mode(), ViewMode::Global);
    let current = dashboard.current_snapshot().await.expect("snapshot");
    assert!(Arc::ptr_eq(&current, &global));
    assert_eq!(state.filters().district, "12");
    dashboard.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn failed_school_list_empties_options_and_sets_filter_banner() {
    let service = Arc::new(ScriptedService::default());
    service.fail_schools_for("14");
    let dashboard = started(&service).await;

    dashboard.set_district("14").await.expect("district");
    settle().await;

    let state = dashboard.state().await;
    assert!(state.cascade().options().schools.is_empty());
    assert_eq!(
        state.errors().filter.as_deref(),
        Some("Failed to load schools: connection reset")
    );
    assert_eq!(state.filters().district, "14");
    dashboard.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn school_without_district_is_rejected_without_fetching() {
    let service = Arc::new(ScriptedService::default());
    let dashboard = started(&service).await;
    let before = service.calls(Calls::total);

    let result = dashboard.set_school("12-7").await;
    assert!(matches!(result, Err(AppError::Validation(_))));
    settle().await;
    assert_eq!(service.calls(Calls::total), before);
    assert!(dashboard.filters().await.is_global());
    dashboard.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn grade_risk_school_selector_fetches_its_own_breakdown() {
    let service = Arc::new(ScriptedService::default());
    let dashboard = started(&service).await;
    dashboard.set_district("12").await.expect("district");
    settle().await;

    dashboard.select_school_for_grades("12-7").await.expect("select");
    assert!(service
        .calls(|calls| calls.grade_risks.clone())
        .contains(&("12".to_string(), "12-7".to_string())));
    let before = service.calls(|calls| calls.grade_risks.len());
    dashboard.select_school_for_grades("12-7").await.expect("select again");
    assert_eq!(service.calls(|calls| calls.grade_risks.len()), before);
    dashboard.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn disabled_notifications_stay_silent_across_snapshots() {
    let service = Arc::new(ScriptedService::default());
    let dashboard = build(&service, Some(false));
    let (_credentials, ready) = watch::channel(true);
    dashboard.start(ready).await.expect("start");

    dashboard.set_district("12").await.expect("district");
    sleep(Duration::from_secs(30)).await;
    assert!(dashboard.notification_history().await.is_empty());

    dashboard.set_notifications_enabled(true).await.expect("enable");
    sleep(Duration::from_secs(13)).await;
    assert!(!dashboard.notification_history().await.is_empty());
    dashboard.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn simulation_settles_after_processing_delay() {
    let service = Arc::new(ScriptedService::default());
    let dashboard = started(&service).await;

    dashboard.set_improvement(Tier::Four, 20).await.expect("improve");
    assert!(dashboard.state().await.simulation().is_processing);
    let projection = dashboard.projection().await;
    assert_eq!(projection.outcomes[3].current_students, 125);
    assert_eq!(projection.outcomes[3].improved_students, 25);

    sleep(Duration::from_millis(900)).await;
    assert!(!dashboard.state().await.simulation().is_processing);

    let result = dashboard.select_strategy(Tier::One, Some("Not a strategy")).await;
    assert!(matches!(result, Err(AppError::Validation(_))));
    dashboard.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn clearing_the_district_returns_to_cached_global_at_once() {
    let service = Arc::new(ScriptedService::default());
    let dashboard = started(&service).await;
    let global = dashboard.global_snapshot().await.expect("global");

    dashboard.set_district("12").await.expect("district");
    settle().await;
    assert_eq!(dashboard.view_mode().await, ViewMode::Scoped);
    let before = service.calls(Calls::total);

    dashboard.set_district("").await.expect("clear district");
    assert_eq!(dashboard.view_mode().await, ViewMode::Global);
    let current = dashboard.current_snapshot().await.expect("snapshot");
    assert!(Arc::ptr_eq(&current, &global));
    assert!(dashboard.filters().await.is_global());

    settle().await;
    assert_eq!(service.calls(Calls::total), before);
    assert_eq!(dashboard.view_mode().await, ViewMode::Global);
    dashboard.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_silences_late_snapshots_and_new_edits() {
    let service = Arc::new(ScriptedService::default());
    let dashboard = started(&service).await;

    let release = service.gate("insights:12");
    dashboard.set_district("12").await.expect("district");
    settle().await;
    assert_eq!(service.calls(Calls::scoped_insights).len(), 1);

    dashboard.shutdown().await;
    let emitted_at_shutdown = dashboard.notification_history().await.len();
    release.send(()).expect("release");
    sleep(Duration::from_secs(120)).await;
    assert_eq!(dashboard.notification_history().await.len(), emitted_at_shutdown);

    let before = service.calls(Calls::total);
    dashboard.set_district("14").await.expect("district");
    sleep(Duration::from_secs(5)).await;
    assert_eq!(service.calls(Calls::total), before);
    assert_eq!(dashboard.notification_history().await.len(), emitted_at_shutdown);
}
