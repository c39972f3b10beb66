use std::io::Write;

use chrono::SecondsFormat;

use super::domain::{HistoryEntry, StateId, WorkflowInstance};

/// Append `entry` to a copy of `instance`, moving the current state along with it.
///
/// This is the only writer of `history`; prior entries are never removed or reordered.
pub(super) fn record(instance: &WorkflowInstance, entry: HistoryEntry) -> WorkflowInstance {
    let mut next = instance.clone();
    next.current_state = entry.to_state.clone();
    next.history.push(entry);
    next
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    #[error("entry 0 leaves {found} but the instance started in {expected}")]
    DetachedStart { expected: StateId, found: StateId },
    #[error("entry {index} leaves {found} but the previous entry arrived at {expected}")]
    BrokenChain {
        index: usize,
        expected: StateId,
        found: StateId,
    },
    #[error("history ends in {last} but the instance is in {current}")]
    CurrentStateMismatch { last: StateId, current: StateId },
    #[error("entry {index} is timestamped before the preceding event")]
    OutOfOrder { index: usize },
}

/// Audit a loaded instance against the chain invariants.
pub fn verify_history(instance: &WorkflowInstance) -> Result<(), HistoryError> {
    let mut expected = &instance.initial_state;
    let mut previous_at = instance.started_at;

    for (index, entry) in instance.history.iter().enumerate() {
        if &entry.from_state != expected {
            return Err(if index == 0 {
                HistoryError::DetachedStart {
                    expected: expected.clone(),
                    found: entry.from_state.clone(),
                }
            } else {
                HistoryError::BrokenChain {
                    index,
                    expected: expected.clone(),
                    found: entry.from_state.clone(),
                }
            });
        }
        if entry.occurred_at < previous_at {
            return Err(HistoryError::OutOfOrder { index });
        }
        expected = &entry.to_state;
        previous_at = entry.occurred_at;
    }

    if expected != &instance.current_state {
        return Err(HistoryError::CurrentStateMismatch {
            last: expected.clone(),
            current: instance.current_state.clone(),
        });
    }

    Ok(())
}

/// Write the audit trail as CSV, one row per executed transition.
pub fn export_csv<W: Write>(instance: &WorkflowInstance, writer: W) -> Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record([
        "instance_id",
        "sequence",
        "transition_id",
        "from_state",
        "to_state",
        "occurred_at",
        "actor",
        "note",
    ])?;

    for (sequence, entry) in instance.history.iter().enumerate() {
        let sequence = (sequence + 1).to_string();
        let occurred_at = entry.occurred_at.to_rfc3339_opts(SecondsFormat::Secs, true);
        csv_writer.write_record([
            instance.id.as_str(),
            sequence.as_str(),
            entry.transition_id.as_str(),
            entry.from_state.as_str(),
            entry.to_state.as_str(),
            occurred_at.as_str(),
            entry.actor.as_str(),
            entry.note.as_deref().unwrap_or(""),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}
