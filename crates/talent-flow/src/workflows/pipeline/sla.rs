use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::domain::{StateId, WorkflowInstance};
use super::validator::ValidatedDefinition;

/// Time-in-state snapshot for one instance, derived on read and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlaStatus {
    pub state: StateId,
    pub entered_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sla_hours: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    pub elapsed_minutes: i64,
    pub overdue: bool,
}

impl SlaStatus {
    pub fn elapsed(&self) -> Duration {
        Duration::minutes(self.elapsed_minutes)
    }

    /// Time left before the deadline; negative once overdue, `None` when no SLA applies.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.deadline.map(|deadline| deadline - now)
    }
}

pub fn sla_status(
    definition: &ValidatedDefinition,
    instance: &WorkflowInstance,
    now: DateTime<Utc>,
) -> SlaStatus {
    let state = instance.current_state().clone();
    let entered_at = instance.entered_current_state_at();
    let elapsed = now - entered_at;
    let sla_hours = definition
        .state(&state)
        .and_then(|current| current.sla_hours);
    let deadline = sla_hours.map(|hours| entered_at + Duration::hours(i64::from(hours)));
    let overdue = sla_hours.is_some_and(|hours| elapsed > Duration::hours(i64::from(hours)));

    SlaStatus {
        state,
        entered_at,
        sla_hours,
        deadline,
        elapsed_minutes: elapsed.num_minutes(),
        overdue,
    }
}

/// True when the instance has stayed in its current state longer than that state's SLA.
///
/// States without `sla_hours` are never overdue.
pub fn compute_overdue(
    definition: &ValidatedDefinition,
    instance: &WorkflowInstance,
    now: DateTime<Utc>,
) -> bool {
    sla_status(definition, instance, now).overdue
}
