use crate::errors::{AppError, AppResult};
use crate::jitter::Jitter;
use crate::models::{SimulationState, SummaryStatistics, Tier};
use serde::{Deserialize, Serialize};

pub const MIN_IMPROVEMENT: i32 = -50;
pub const MAX_IMPROVEMENT: i32 = 50;
/// Applying a suggestion never pushes a slider above this.
pub const SUGGESTION_CEILING: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Strategy {
    pub name: &'static str,
    pub success_rate: f64,
    pub description: &'static str,
}

const TIER1_STRATEGIES: [Strategy; 2] = [
    Strategy {
        name: "Early Intervention",
        success_rate: 0.85,
        description: "Proactive support for at-risk students",
    },
    Strategy {
        name: "Parent Engagement",
        success_rate: 0.75,
        description: "Increased communication with parents",
    },
];

const TIER2_STRATEGIES: [Strategy; 2] = [
    Strategy {
        name: "Mentorship Program",
        success_rate: 0.7,
        description: "Peer or teacher mentorship",
    },
    Strategy {
        name: "Attendance Contracts",
        success_rate: 0.65,
        description: "Formal agreements with students",
    },
];

const TIER3_STRATEGIES: [Strategy; 2] = [
    Strategy {
        name: "Counseling Services",
        success_rate: 0.6,
        description: "Professional support services",
    },
    Strategy {
        name: "Personalized Learning",
        success_rate: 0.55,
        description: "Tailored educational plans",
    },
];

const TIER4_STRATEGIES: [Strategy; 2] = [
    Strategy {
        name: "Case Management",
        success_rate: 0.5,
        description: "Intensive one-on-one support",
    },
    Strategy {
        name: "Community Resources",
        success_rate: 0.45,
        description: "External support services",
    },
];

pub fn strategies(tier: Tier) -> &'static [Strategy] {
    match tier {
        Tier::One => &TIER1_STRATEGIES,
        Tier::Two => &TIER2_STRATEGIES,
        Tier::Three => &TIER3_STRATEGIES,
        Tier::Four => &TIER4_STRATEGIES,
    }
}

pub fn find_strategy(tier: Tier, name: &str) -> Option<&'static Strategy> {
    strategies(tier).iter().find(|strategy| strategy.name == name)
}

/// Extra percentage points from a selected strategy, roughly -3..+3.
pub fn strategy_impact(tier: Tier, selected: Option<&str>) -> i32 {
    selected
        .and_then(|name| find_strategy(tier, name))
        .map(|strategy| ((strategy.success_rate - 0.5) * 6.0).floor() as i32)
        .unwrap_or(0)
}

pub fn effective_improvement(improvement: i32, impact: i32) -> i32 {
    improvement.saturating_add(impact).clamp(MIN_IMPROVEMENT, MAX_IMPROVEMENT)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedOutcome {
    pub tier: Tier,
    pub current_students: u64,
    /// Negative when the effective improvement is negative: the tier grows.
    pub improved_students: i64,
    pub improvement_percentage: i32,
    pub strategy_impact: i32,
    pub projected_students: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    pub outcomes: Vec<ProjectedOutcome>,
    pub total_improved: i64,
    pub overall_improvement_percentage: f64,
}

pub fn project_tier(tier: Tier, current_students: u64, improvement: i32, selected: Option<&str>) -> ProjectedOutcome {
    let impact = strategy_impact(tier, selected);
    let effective = effective_improvement(improvement, impact);
    let current = i64::try_from(current_students).unwrap_or(i64::MAX);
    let improved_students = current.saturating_mul(i64::from(effective)).div_euclid(100);
    let projected_students = u64::try_from(current.saturating_sub(improved_students).max(0)).unwrap_or(0);
    ProjectedOutcome {
        tier,
        current_students,
        improved_students,
        improvement_percentage: effective,
        strategy_impact: impact,
        projected_students,
    }
}

/// Deterministic projection of the four tiers under the current sliders and strategies.
pub fn project(state: &SimulationState, stats: &SummaryStatistics) -> Projection {
    let outcomes = Tier::ALL
        .iter()
        .map(|tier| {
            project_tier(
                *tier,
                stats.tier_students(*tier),
                state.improvements[tier.index()],
                state.selected_strategies[tier.index()].as_deref(),
            )
        })
        .collect::<Vec<_>>();
    let total_improved = outcomes.iter().map(|outcome| outcome.improved_students).sum::<i64>();
    let denominator = stats.total_students.max(1) as f64;
    Projection {
        overall_improvement_percentage: total_improved as f64 / denominator * 100.0,
        total_improved,
        outcomes,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiSuggestion {
    pub name: String,
    pub confidence: u32,
    pub impact: i32,
}

/// Advisory display data. Only `confidence` carries jitter.
pub fn generate_suggestions(jitter: &dyn Jitter) -> [Vec<AiSuggestion>; 4] {
    Tier::ALL.map(|tier| {
        strategies(tier)
            .iter()
            .map(|strategy| {
                let base = (strategy.success_rate * 100.0).floor() as u32;
                let bonus = jitter.sample(10) as u32;
                AiSuggestion {
                    name: strategy.name.to_string(),
                    confidence: (base + bonus).clamp(60, 95),
                    impact: (((strategy.success_rate - 0.5) * 40.0).floor() as i32).clamp(-20, 30),
                }
            })
            .collect()
    })
}

impl SimulationState {
    pub fn improvement(&self, tier: Tier) -> i32 {
        self.improvements[tier.index()]
    }

    pub fn set_improvement(&mut self, tier: Tier, value: i32) {
        self.improvements[tier.index()] = value.clamp(MIN_IMPROVEMENT, MAX_IMPROVEMENT);
    }

    pub fn select_strategy(&mut self, tier: Tier, name: Option<&str>) -> AppResult<()> {
        match name {
            Some(name) if find_strategy(tier, name).is_none() => Err(AppError::Validation(format!(
                "unknown strategy {} for tier {}",
                name,
                tier.number()
            ))),
            _ => {
                self.selected_strategies[tier.index()] = name.map(ToString::to_string);
                Ok(())
            }
        }
    }

    pub fn apply_suggestion(&mut self, tier: Tier, suggestion: &AiSuggestion) -> AppResult<()> {
        self.select_strategy(tier, Some(&suggestion.name))?;
        let next = suggestion
            .impact
            .saturating_add(self.improvement(tier))
            .min(SUGGESTION_CEILING);
        self.set_improvement(tier, next);
        Ok(())
    }

    /// Sliders back to zero and no strategies; the snapshot is untouched.
    pub fn reset(&mut self) {
        self.improvements = [0; 4];
        self.selected_strategies = Default::default();
    }
}
