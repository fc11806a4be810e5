use crate::jitter::Jitter;
use crate::models::{AnalysisSnapshot, NotificationRecord, NotificationSeverity};
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use uuid::Uuid;

type Describe = fn(&AnalysisSnapshot) -> String;
pub type NotificationSink = Arc<dyn Fn(&NotificationRecord) + Send + Sync>;

pub struct NotificationTemplate {
    pub id: &'static str,
    pub title: &'static str,
    pub severity: NotificationSeverity,
    /// Marks an alert the rendering layer should emphasize. Disabling notifications still silences it.
    pub critical: bool,
    describe: Describe,
}

impl NotificationTemplate {
    pub fn render(&self, snapshot: &AnalysisSnapshot) -> NotificationRecord {
        NotificationRecord {
            id: format!("{}-{}", self.id, Uuid::new_v4()),
            template_id: self.id.to_string(),
            title: self.title.to_string(),
            body: (self.describe)(snapshot),
            severity: self.severity,
            critical: self.critical,
            timestamp: Utc::now(),
        }
    }
}

pub static TEMPLATES: [NotificationTemplate; 7] = [
    NotificationTemplate {
        id: "low-attendance-students",
        title: "Low Attendance Alert",
        severity: NotificationSeverity::Error,
        critical: true,
        describe: describe_low_attendance,
    },
    NotificationTemplate {
        id: "district-risk",
        title: "District Risk Alert",
        severity: NotificationSeverity::Warning,
        critical: false,
        describe: describe_district_risk,
    },
    NotificationTemplate {
        id: "school-risk",
        title: "School Risk Alert",
        severity: NotificationSeverity::Warning,
        critical: false,
        describe: describe_school_risk,
    },
    NotificationTemplate {
        id: "grade-risk",
        title: "Grade Level Risk Alert",
        severity: NotificationSeverity::Warning,
        critical: false,
        describe: describe_grade_risk,
    },
    NotificationTemplate {
        id: "total-students",
        title: "Total Attendance Overview",
        severity: NotificationSeverity::Info,
        critical: false,
        describe: describe_total_students,
    },
    NotificationTemplate {
        id: "tier1-students",
        title: "Tier 1 Attendance (≥95%)",
        severity: NotificationSeverity::Success,
        critical: false,
        describe: describe_tier1,
    },
    NotificationTemplate {
        id: "tier4-students",
        title: "Tier 4 Attendance (<80%)",
        severity: NotificationSeverity::Error,
        critical: true,
        describe: describe_tier4,
    },
];

fn describe_low_attendance(snapshot: &AnalysisSnapshot) -> String {
    match &snapshot.alert_breakdown {
        Some(breakdown) => format!(
            "{} students have predicted attendance below 60%",
            format_count(breakdown.total_below60)
        ),
        None => "No attendance data available".to_string(),
    }
}

fn describe_district_risk(snapshot: &AnalysisSnapshot) -> String {
    snapshot
        .alert_breakdown
        .as_ref()
        .and_then(|breakdown| breakdown.by_district.iter().rev().max_by_key(|entry| entry.count))
        .map(|entry| {
            format!(
                "{} has {} students below 60% attendance",
                entry.district,
                format_count(entry.count)
            )
        })
        .unwrap_or_else(|| "No district data available".to_string())
}

fn describe_school_risk(snapshot: &AnalysisSnapshot) -> String {
    snapshot
        .alert_breakdown
        .as_ref()
        .and_then(|breakdown| breakdown.by_school.iter().rev().max_by_key(|entry| entry.count))
        .map(|entry| format!("{} has {} students below 60% attendance", entry.school, format_count(entry.count)))
        .unwrap_or_else(|| "No school data available".to_string())
}

fn describe_grade_risk(snapshot: &AnalysisSnapshot) -> String {
    snapshot
        .alert_breakdown
        .as_ref()
        .and_then(|breakdown| breakdown.by_grade.iter().rev().max_by_key(|entry| entry.count))
        .map(|entry| format!("Grade {} has {} students below 60% attendance", entry.grade, format_count(entry.count)))
        .unwrap_or_else(|| "No grade data available".to_string())
}

fn describe_total_students(snapshot: &AnalysisSnapshot) -> String {
    format!("Total Students: {}", count_or_na(snapshot.summary_statistics.total_students))
}

fn describe_tier1(snapshot: &AnalysisSnapshot) -> String {
    format!("{} students", count_or_na(snapshot.summary_statistics.tier1_students))
}

fn describe_tier4(snapshot: &AnalysisSnapshot) -> String {
    format!("{} students", count_or_na(snapshot.summary_statistics.tier4_students))
}

fn count_or_na(count: u64) -> String {
    if count == 0 {
        "N/A".to_string()
    } else {
        format_count(count)
    }
}

/// `1234567` -> `"1,234,567"`.
pub fn format_count(count: u64) -> String {
    let digits = count.to_string();
    let mut formatted = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            formatted.push(',');
        }
        formatted.push(digit);
    }
    formatted
}

#[derive(Debug, Clone, Copy)]
pub struct CyclerSettings {
    pub min_interval: Duration,
    pub max_interval: Duration,
    pub history_capacity: usize,
}

struct CyclerState {
    snapshot: Option<Arc<AnalysisSnapshot>>,
    cursor: usize,
    history: VecDeque<NotificationRecord>,
    enabled: bool,
    paused: bool,
    timer: Option<JoinHandle<()>>,
    /// Set once by `shutdown`; nothing re-arms or emits afterwards.
    shut_down: bool,
    /// Bumped on every re-arm so a timer that lost the race to an abort cannot emit.
    epoch: u64,
}

struct CyclerInner {
    state: Mutex<CyclerState>,
    settings: CyclerSettings,
    jitter: Arc<dyn Jitter>,
    sink: NotificationSink,
}

/// Round-robin notification emitter with a re-armed, jittered timer chain.
#[derive(Clone)]
pub struct NotificationCycler {
    inner: Arc<CyclerInner>,
}

impl NotificationCycler {
    pub fn new(settings: CyclerSettings, enabled: bool, jitter: Arc<dyn Jitter>, sink: NotificationSink) -> Self {
        Self {
            inner: Arc::new(CyclerInner {
                state: Mutex::new(CyclerState {
                    snapshot: None,
                    cursor: 0,
                    history: VecDeque::with_capacity(settings.history_capacity),
                    enabled,
                    paused: false,
                    timer: None,
                    shut_down: false,
                    epoch: 0,
                }),
                settings,
                jitter,
                sink,
            }),
        }
    }

    /// Emits immediately for the new snapshot and restarts the timer chain, unless silenced.
    pub async fn on_snapshot(&self, snapshot: Arc<AnalysisSnapshot>) {
        let emitted = {
            let mut state = self.inner.state.lock().await;
            if state.shut_down {
                return;
            }
            state.snapshot = Some(snapshot);
            if !state.enabled || state.paused {
                return;
            }
            let record = self.inner.emit(&mut state);
            self.inner.arm(&mut state);
            record
        };
        if let Some(record) = emitted {
            (self.inner.sink)(&record);
        }
    }

    pub async fn pause(&self) {
        let mut state = self.inner.state.lock().await;
        state.paused = true;
        cancel_timer(&mut state);
    }

    /// Re-arms from the next scheduling point. Nothing is emitted right away.
    pub async fn resume(&self) {
        let mut state = self.inner.state.lock().await;
        state.paused = false;
        if state.enabled && !state.shut_down && state.snapshot.is_some() {
            self.inner.arm(&mut state);
        }
    }

    pub async fn set_enabled(&self, enabled: bool) {
        let mut state = self.inner.state.lock().await;
        state.enabled = enabled;
        if !enabled {
            cancel_timer(&mut state);
            return;
        }
        if !state.paused && !state.shut_down && state.snapshot.is_some() && state.timer.is_none() {
            self.inner.arm(&mut state);
        }
    }

    pub async fn clear_history(&self) {
        self.inner.state.lock().await.history.clear();
    }

    /// Oldest first.
    pub async fn history(&self) -> Vec<NotificationRecord> {
        self.inner.state.lock().await.history.iter().cloned().collect()
    }

    pub async fn cursor(&self) -> usize {
        self.inner.state.lock().await.cursor
    }

    pub async fn is_enabled(&self) -> bool {
        self.inner.state.lock().await.enabled
    }

    pub async fn is_paused(&self) -> bool {
        self.inner.state.lock().await.paused
    }

    /// Final: later snapshots and toggles no longer restart the timer chain.
    pub async fn shutdown(&self) {
        let mut state = self.inner.state.lock().await;
        state.shut_down = true;
        cancel_timer(&mut state);
        state.snapshot = None;
    }
}

impl CyclerInner {
    fn emit(&self, state: &mut CyclerState) -> Option<NotificationRecord> {
        let snapshot = state.snapshot.clone()?;
        let template = &TEMPLATES[state.cursor % TEMPLATES.len()];
        state.cursor = (state.cursor + 1) % TEMPLATES.len();
        let record = template.render(&snapshot);
        if state.history.len() >= self.settings.history_capacity {
            state.history.pop_front();
        }
        state.history.push_back(record.clone());
        tracing::debug!(template = template.id, cursor = state.cursor, "notification emitted");
        Some(record)
    }

    fn next_delay(&self) -> Duration {
        let min = self.settings.min_interval.as_millis() as u64;
        let max = self.settings.max_interval.as_millis() as u64;
        Duration::from_millis(min + self.jitter.sample(max.saturating_sub(min)))
    }

    fn arm(self: &Arc<Self>, state: &mut CyclerState) {
        cancel_timer(state);
        let epoch = state.epoch;
        let delay = self.next_delay();
        let inner = Arc::clone(self);
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.tick(epoch).await;
        }));
    }

    async fn tick(self: Arc<Self>, epoch: u64) {
        let emitted = {
            let mut state = self.state.lock().await;
            if state.epoch != epoch || state.shut_down || !state.enabled || state.paused {
                return;
            }
            // Detach our own handle so re-arming does not abort the running task.
            state.timer = None;
            let record = self.emit(&mut state);
            self.arm(&mut state);
            record
        };
        if let Some(record) = emitted {
            (self.sink)(&record);
        }
    }
}

fn cancel_timer(state: &mut CyclerState) {
    state.epoch += 1;
    if let Some(timer) = state.timer.take() {
        timer.abort();
    }
}
