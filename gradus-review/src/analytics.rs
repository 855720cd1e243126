//! Progress & risk analytics engine
//!
//! A pure function of one project's tasks and phase statuses. No side
//! effects, no caching: callers recompute on demand whenever phase or task
//! data changes, so the result is always a fresh derived view.
//!
//! Percentages are rounded to the nearest integer. The overall figure
//! blends task completion (weight 0.6) and phase completion (weight 0.4);
//! a weight is only included when its population is non-empty, so a
//! project without tasks is judged on phases alone and vice versa.

use serde::Serialize;

use gradus_common::models::Task;
use gradus_common::PhaseStatus;

/// Coarse label derived from the overall percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProgressLabel {
    Completed,
    NearlyComplete,
    InProgress,
    Started,
    NotStarted,
}

/// Three-tier project health signal, `Unknown` when there are no phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskLevel {
    Good,
    Medium,
    Critical,
    Unknown,
}

/// Risk classification with its tier-associated guidance
#[derive(Debug, Clone, Serialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    /// Fixed per-tier guidance; not computed from the data
    pub recommendations: &'static [&'static str],
}

/// Derived metrics for one project
#[derive(Debug, Clone, Serialize)]
pub struct ProjectProgress {
    /// Percentage of tasks marked done (0-100)
    pub task_completion: u8,
    /// Percentage of phases resolved, i.e. Approved, Completed, or Failed
    pub phase_completion: u8,
    /// Weighted blend of the two (0-100)
    pub overall: u8,
    pub label: ProgressLabel,
    pub risk: RiskAssessment,
}

const TASK_WEIGHT: f64 = 0.6;
const PHASE_WEIGHT: f64 = 0.4;

const GOOD_RECOMMENDATIONS: &[&str] = &[
    "Progress is on track; keep the current pace.",
    "Continue regular check-ins with the supervising teacher.",
    "Document finished work while it is still fresh.",
];

const MEDIUM_RECOMMENDATIONS: &[&str] = &[
    "Respond to outstanding revision feedback before it accumulates.",
    "Prioritize unfinished tasks with the nearest deadlines.",
    "Schedule a progress meeting with the supervising teacher.",
    "Split stalled work into smaller tasks with clear owners.",
];

const CRITICAL_RECOMMENDATIONS: &[&str] = &[
    "Every phase has been declined; arrange an urgent meeting with the supervising teacher.",
    "Rework the declined phases before starting anything new.",
    "Re-plan the remaining schedule together with the project supervisor.",
    "Close out open tasks to regain momentum before resubmitting.",
];

const UNKNOWN_RECOMMENDATIONS: &[&str] =
    &["No phases are defined for this project yet, so project health cannot be assessed."];

/// Compute all derived metrics for one project.
///
/// `phases` carries the current status of every phase of the master
/// project, including instances that were never started (`NotStarted`).
pub fn analyze(tasks: &[Task], phases: &[PhaseStatus]) -> ProjectProgress {
    let task_completion = task_completion_percent(tasks);
    let phase_completion = phase_completion_percent(phases);
    let overall = overall_percent(
        task_completion,
        tasks.len(),
        phase_completion,
        phases.len(),
    );

    ProjectProgress {
        task_completion,
        phase_completion,
        overall,
        label: label_for(overall),
        risk: classify_risk(task_completion, phases),
    }
}

/// Done tasks over all tasks, rounded; 0 when there are no tasks
pub fn task_completion_percent(tasks: &[Task]) -> u8 {
    let total = tasks.len();
    if total == 0 {
        return 0;
    }
    let done = tasks.iter().filter(|t| t.done).count();
    percent(done, total)
}

/// Resolved phases over all phases, rounded; 0 when there are no phases.
///
/// A `Failed` phase counts as resolved: it is closed, not open.
pub fn phase_completion_percent(phases: &[PhaseStatus]) -> u8 {
    let total = phases.len();
    if total == 0 {
        return 0;
    }
    let resolved = phases.iter().filter(|s| s.is_resolved()).count();
    percent(resolved, total)
}

fn overall_percent(task_pct: u8, task_total: usize, phase_pct: u8, phase_total: usize) -> u8 {
    let mut weighted = 0.0;
    let mut weight = 0.0;
    if task_total > 0 {
        weighted += f64::from(task_pct) * TASK_WEIGHT;
        weight += TASK_WEIGHT;
    }
    if phase_total > 0 {
        weighted += f64::from(phase_pct) * PHASE_WEIGHT;
        weight += PHASE_WEIGHT;
    }
    if weight == 0.0 {
        return 0;
    }
    (weighted / weight).round() as u8
}

fn label_for(overall: u8) -> ProgressLabel {
    match overall {
        100.. => ProgressLabel::Completed,
        80..=99 => ProgressLabel::NearlyComplete,
        50..=79 => ProgressLabel::InProgress,
        1..=49 => ProgressLabel::Started,
        0 => ProgressLabel::NotStarted,
    }
}

/// Classify project risk from the phase status distribution and task
/// completion percentage.
///
/// - `Critical`: every phase failed and tasks are not fully done.
/// - `Medium`: any failed phase, or the revision-needed share reaches 30%,
///   or task completion under 60% while the approved/completed share is
///   under 50%.
/// - `Good` otherwise. `Unknown` with zero phases.
pub fn classify_risk(task_completion: u8, phases: &[PhaseStatus]) -> RiskAssessment {
    let total = phases.len();
    if total == 0 {
        return RiskAssessment {
            level: RiskLevel::Unknown,
            recommendations: UNKNOWN_RECOMMENDATIONS,
        };
    }

    let count = |wanted: PhaseStatus| phases.iter().filter(|s| **s == wanted).count();
    let failed = count(PhaseStatus::Failed);
    let revision_needed = count(PhaseStatus::RevisionNeeded);
    let signed_off = count(PhaseStatus::Completed) + count(PhaseStatus::Approved);

    let task_rate = f64::from(task_completion);
    let failed_rate = rate(failed, total);
    let revision_rate = rate(revision_needed, total);
    let completion_rate = rate(signed_off, total);

    let level = if failed == total && task_rate < 100.0 {
        RiskLevel::Critical
    } else if failed_rate > 0.0
        || revision_rate >= 30.0
        || (task_rate < 60.0 && completion_rate < 50.0)
    {
        RiskLevel::Medium
    } else {
        RiskLevel::Good
    };

    RiskAssessment {
        level,
        recommendations: match level {
            RiskLevel::Good => GOOD_RECOMMENDATIONS,
            RiskLevel::Medium => MEDIUM_RECOMMENDATIONS,
            RiskLevel::Critical => CRITICAL_RECOMMENDATIONS,
            RiskLevel::Unknown => UNKNOWN_RECOMMENDATIONS,
        },
    }
}

fn percent(part: usize, total: usize) -> u8 {
    ((part as f64 / total as f64) * 100.0).round() as u8
}

fn rate(part: usize, total: usize) -> f64 {
    part as f64 / total as f64 * 100.0
}
