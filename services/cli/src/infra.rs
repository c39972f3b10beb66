use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use talent_flow::error::AppError;
use talent_flow::workflows::pipeline::{
    ActorId, DefinitionId, GuardError, GuardEvaluator, InstanceId, PublishError,
    RepositoryError, StoredInstance, TransitionEvent, TransitionPublisher, WorkflowDefinition,
    WorkflowInstance, WorkflowRepository,
};
use tracing::info;

#[derive(Default, Clone)]
pub(crate) struct InMemoryWorkflowRepository {
    definitions: Arc<Mutex<HashMap<DefinitionId, WorkflowDefinition>>>,
    instances: Arc<Mutex<HashMap<InstanceId, StoredInstance>>>,
}

impl WorkflowRepository for InMemoryWorkflowRepository {
    fn fetch_definition(
        &self,
        id: &DefinitionId,
    ) -> Result<Option<WorkflowDefinition>, RepositoryError> {
        let guard = self.definitions.lock().map_err(poisoned)?;
        Ok(guard.get(id).cloned())
    }

    fn save_definition(&self, definition: WorkflowDefinition) -> Result<(), RepositoryError> {
        let mut guard = self.definitions.lock().map_err(poisoned)?;
        guard.insert(definition.id.clone(), definition);
        Ok(())
    }

    fn count_instances(&self, definition: &DefinitionId) -> Result<usize, RepositoryError> {
        let guard = self.instances.lock().map_err(poisoned)?;
        Ok(guard
            .values()
            .filter(|stored| stored.instance.definition_id() == definition)
            .count())
    }

    fn insert_instance(
        &self,
        instance: WorkflowInstance,
    ) -> Result<StoredInstance, RepositoryError> {
        let mut guard = self.instances.lock().map_err(poisoned)?;
        if guard.contains_key(instance.id()) {
            return Err(RepositoryError::Conflict);
        }
        let stored = StoredInstance {
            instance,
            revision: 1,
        };
        guard.insert(stored.instance.id().clone(), stored.clone());
        Ok(stored)
    }

    fn fetch_instance(&self, id: &InstanceId) -> Result<Option<StoredInstance>, RepositoryError> {
        let guard = self.instances.lock().map_err(poisoned)?;
        Ok(guard.get(id).cloned())
    }

    fn update_instance(
        &self,
        instance: WorkflowInstance,
        expected_revision: u64,
    ) -> Result<StoredInstance, RepositoryError> {
        let mut guard = self.instances.lock().map_err(poisoned)?;
        let stored = guard
            .get_mut(instance.id())
            .ok_or(RepositoryError::NotFound)?;
        if stored.revision != expected_revision {
            return Err(RepositoryError::RevisionConflict {
                expected: expected_revision,
                actual: stored.revision,
            });
        }
        stored.instance = instance;
        stored.revision += 1;
        Ok(stored.clone())
    }
}

fn poisoned<T>(_: PoisonError<T>) -> RepositoryError {
    RepositoryError::Unavailable("repository mutex poisoned".to_string())
}

/// Resolves guards by checking the acting user against a per-guard approver list.
#[derive(Default, Clone)]
pub(crate) struct RoleGuardEvaluator {
    approvers: BTreeMap<String, BTreeSet<ActorId>>,
}

impl RoleGuardEvaluator {
    pub(crate) fn allow(mut self, guard: &str, actor: &str) -> Self {
        self.approvers
            .entry(guard.to_string())
            .or_default()
            .insert(ActorId::from(actor));
        self
    }
}

impl GuardEvaluator for RoleGuardEvaluator {
    fn evaluate(
        &self,
        guard: &str,
        _instance: &WorkflowInstance,
        actor: &ActorId,
    ) -> Result<bool, GuardError> {
        let approvers = self
            .approvers
            .get(guard)
            .ok_or_else(|| GuardError::UnknownGuard(guard.to_string()))?;
        Ok(approvers.contains(actor))
    }
}

/// Publisher that logs side effects and keeps them for the demo summary.
#[derive(Default, Clone)]
pub(crate) struct RecordingPublisher {
    events: Arc<Mutex<Vec<TransitionEvent>>>,
}

impl TransitionPublisher for RecordingPublisher {
    fn publish(&self, event: TransitionEvent) -> Result<(), PublishError> {
        info!(
            side_effect = %event.side_effect,
            instance_id = %event.instance_id,
            transition_id = %event.transition_id,
            "side effect queued"
        );
        let mut guard = self
            .events
            .lock()
            .map_err(|_| PublishError::Transport("publisher mutex poisoned".to_string()))?;
        guard.push(event);
        Ok(())
    }
}

impl RecordingPublisher {
    pub(crate) fn events(&self) -> Vec<TransitionEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| format!("failed to parse '{raw}' as an RFC 3339 timestamp ({err})"))
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

pub(crate) fn write_json<T: Serialize>(value: &T, path: Option<&Path>) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)?;
    match path {
        Some(path) => fs::write(path, rendered + "\n")?,
        None => println!("{rendered}"),
    }
    Ok(())
}
