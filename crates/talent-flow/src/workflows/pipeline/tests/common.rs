use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::config::WorkflowConfig;
use crate::workflows::pipeline::domain::{
    ActorId, DefinitionId, InstanceId, State, StateId, StateKind, Transition, TransitionId,
    WorkflowDefinition, WorkflowInstance,
};
use crate::workflows::pipeline::repository::{
    GuardError, GuardEvaluator, PublishError, RepositoryError, StoredInstance, TransitionEvent,
    TransitionPublisher, WorkflowRepository,
};
use crate::workflows::pipeline::service::WorkflowService;
use crate::workflows::pipeline::validator::{validate, ValidatedDefinition};

pub(crate) const APPROVAL_GUARD: &str = "requires_hiring_manager_approval";

pub(crate) fn at_hour(hours: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0)
        .single()
        .expect("valid timestamp")
        + Duration::hours(hours)
}

fn state(id: &str, kind: StateKind, sla_hours: Option<u32>) -> State {
    State {
        id: StateId::from(id),
        label: id.to_string(),
        kind,
        color: String::new(),
        description: String::new(),
        sla_hours,
    }
}

fn edge(id: &str, from: &str, to: &str) -> Transition {
    Transition {
        id: TransitionId::from(id),
        from_state: StateId::from(from),
        to_state: StateId::from(to),
        label: id.to_string(),
        guard: None,
        side_effect: None,
    }
}

/// Applied -> Screening -> Hired | Rejected, with an approval guard on the hire.
pub(crate) fn raw_scenario_definition() -> WorkflowDefinition {
    let mut hire = edge("hire", "screening", "hired");
    hire.guard = Some(APPROVAL_GUARD.to_string());
    let mut reject = edge("reject", "screening", "rejected");
    reject.side_effect = Some("send_rejection_email".to_string());

    WorkflowDefinition {
        id: DefinitionId::from("hiring"),
        version: 1,
        name: "Hiring".to_string(),
        description: "Scenario pipeline".to_string(),
        initial_state: None,
        states: vec![
            state("applied", StateKind::Initial, None),
            state("screening", StateKind::Intermediate, Some(48)),
            state("hired", StateKind::Final, None),
            state("rejected", StateKind::Final, None),
        ],
        transitions: vec![edge("screen", "applied", "screening"), hire, reject],
    }
}

pub(crate) fn scenario_definition() -> ValidatedDefinition {
    validate(raw_scenario_definition()).expect("scenario definition validates")
}

pub(crate) fn scenario_instance(definition: &ValidatedDefinition) -> WorkflowInstance {
    WorkflowInstance::start(definition, "cand-001", at_hour(0))
}

#[derive(Default)]
pub(crate) struct MemoryRepository {
    definitions: Mutex<HashMap<DefinitionId, WorkflowDefinition>>,
    instances: Mutex<HashMap<InstanceId, StoredInstance>>,
}

impl WorkflowRepository for MemoryRepository {
    fn fetch_definition(
        &self,
        id: &DefinitionId,
    ) -> Result<Option<WorkflowDefinition>, RepositoryError> {
        let guard = self.definitions.lock().expect("definition mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn save_definition(&self, definition: WorkflowDefinition) -> Result<(), RepositoryError> {
        let mut guard = self.definitions.lock().expect("definition mutex poisoned");
        guard.insert(definition.id.clone(), definition);
        Ok(())
    }

    fn count_instances(&self, definition: &DefinitionId) -> Result<usize, RepositoryError> {
        let guard = self.instances.lock().expect("instance mutex poisoned");
        Ok(guard
            .values()
            .filter(|stored| stored.instance.definition_id() == definition)
            .count())
    }

    fn insert_instance(
        &self,
        instance: WorkflowInstance,
    ) -> Result<StoredInstance, RepositoryError> {
        let mut guard = self.instances.lock().expect("instance mutex poisoned");
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
        let guard = self.instances.lock().expect("instance mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn update_instance(
        &self,
        instance: WorkflowInstance,
        expected_revision: u64,
    ) -> Result<StoredInstance, RepositoryError> {
        let mut guard = self.instances.lock().expect("instance mutex poisoned");
        let current = guard
            .get_mut(instance.id())
            .ok_or(RepositoryError::NotFound)?;
        if current.revision != expected_revision {
            return Err(RepositoryError::RevisionConflict {
                expected: expected_revision,
                actual: current.revision,
            });
        }
        current.instance = instance;
        current.revision += 1;
        Ok(current.clone())
    }
}

/// Repository that loses the revision race a fixed number of times before writing.
#[derive(Default)]
pub(crate) struct RacingRepository {
    pub(crate) inner: MemoryRepository,
    pub(crate) conflicts_remaining: Mutex<u32>,
}

impl RacingRepository {
    pub(crate) fn with_conflicts(conflicts: u32) -> Self {
        Self {
            inner: MemoryRepository::default(),
            conflicts_remaining: Mutex::new(conflicts),
        }
    }
}

impl WorkflowRepository for RacingRepository {
    fn fetch_definition(
        &self,
        id: &DefinitionId,
    ) -> Result<Option<WorkflowDefinition>, RepositoryError> {
        self.inner.fetch_definition(id)
    }

    fn save_definition(&self, definition: WorkflowDefinition) -> Result<(), RepositoryError> {
        self.inner.save_definition(definition)
    }

    fn count_instances(&self, definition: &DefinitionId) -> Result<usize, RepositoryError> {
        self.inner.count_instances(definition)
    }

    fn insert_instance(
        &self,
        instance: WorkflowInstance,
    ) -> Result<StoredInstance, RepositoryError> {
        self.inner.insert_instance(instance)
    }

    fn fetch_instance(&self, id: &InstanceId) -> Result<Option<StoredInstance>, RepositoryError> {
        self.inner.fetch_instance(id)
    }

    fn update_instance(
        &self,
        instance: WorkflowInstance,
        expected_revision: u64,
    ) -> Result<StoredInstance, RepositoryError> {
        let mut remaining = self
            .conflicts_remaining
            .lock()
            .expect("conflict mutex poisoned");
        if *remaining > 0 {
            *remaining -= 1;
            return Err(RepositoryError::RevisionConflict {
                expected: expected_revision,
                actual: expected_revision + 1,
            });
        }
        drop(remaining);
        self.inner.update_instance(instance, expected_revision)
    }
}

pub(crate) struct UnavailableRepository;

impl WorkflowRepository for UnavailableRepository {
    fn fetch_definition(
        &self,
        _id: &DefinitionId,
    ) -> Result<Option<WorkflowDefinition>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn save_definition(&self, _definition: WorkflowDefinition) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn count_instances(&self, _definition: &DefinitionId) -> Result<usize, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn insert_instance(
        &self,
        _instance: WorkflowInstance,
    ) -> Result<StoredInstance, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch_instance(&self, _id: &InstanceId) -> Result<Option<StoredInstance>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update_instance(
        &self,
        _instance: WorkflowInstance,
        _expected_revision: u64,
    ) -> Result<StoredInstance, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// Guard evaluator answering from a fixed verdict table and remembering who asked.
#[derive(Default)]
pub(crate) struct StaticGuards {
    verdicts: BTreeMap<String, bool>,
    calls: Mutex<Vec<(String, ActorId)>>,
}

impl StaticGuards {
    pub(crate) fn with(guard: &str, passed: bool) -> Self {
        let mut verdicts = BTreeMap::new();
        verdicts.insert(guard.to_string(), passed);
        Self {
            verdicts,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Vec<(String, ActorId)> {
        self.calls.lock().expect("guard mutex poisoned").clone()
    }
}

impl GuardEvaluator for StaticGuards {
    fn evaluate(
        &self,
        guard: &str,
        _instance: &WorkflowInstance,
        actor: &ActorId,
    ) -> Result<bool, GuardError> {
        self.calls
            .lock()
            .expect("guard mutex poisoned")
            .push((guard.to_string(), actor.clone()));
        self.verdicts
            .get(guard)
            .copied()
            .ok_or_else(|| GuardError::UnknownGuard(guard.to_string()))
    }
}

#[derive(Default)]
pub(crate) struct MemoryPublisher {
    events: Mutex<Vec<TransitionEvent>>,
}

impl MemoryPublisher {
    pub(crate) fn events(&self) -> Vec<TransitionEvent> {
        self.events.lock().expect("publisher mutex poisoned").clone()
    }
}

impl TransitionPublisher for MemoryPublisher {
    fn publish(&self, event: TransitionEvent) -> Result<(), PublishError> {
        self.events
            .lock()
            .expect("publisher mutex poisoned")
            .push(event);
        Ok(())
    }
}

pub(crate) struct OfflinePublisher;

impl TransitionPublisher for OfflinePublisher {
    fn publish(&self, _event: TransitionEvent) -> Result<(), PublishError> {
        Err(PublishError::Transport("smtp relay down".to_string()))
    }
}

pub(crate) fn workflow_config(max_conflict_retries: u32) -> WorkflowConfig {
    WorkflowConfig {
        max_conflict_retries,
        definition_path: None,
    }
}

pub(crate) fn service_with<R, G, P>(
    repository: Arc<R>,
    guards: Arc<G>,
    publisher: Arc<P>,
) -> WorkflowService<R, G, P>
where
    R: WorkflowRepository + 'static,
    G: GuardEvaluator + 'static,
    P: TransitionPublisher + 'static,
{
    let service = WorkflowService::new(repository, guards, publisher, workflow_config(3));
    service
        .register_definition(raw_scenario_definition())
        .expect("scenario definition registers");
    service
}
