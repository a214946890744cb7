//! Process-wide cache of patient agents.
//!
//! Each patient gets one [`PatientAgent`] behind its own async mutex. The
//! map lock is held only long enough to find or insert a handle. Loading
//! and updates run under the patient's lock, so updates for one patient are
//! serialized together with their saves while other patients proceed
//! independently.
//!
//! Eviction retires the agent under its lock before unmapping it. Handles
//! obtained earlier then refuse to learn or save, and the registry's own
//! operations re-resolve the patient when they land on a retired agent.

use patientrl_core::{Action, Decision, OutcomeEvent, StateInputs};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::agent::{PatientAgent, UpdateReport};
use crate::config::AgentConfig;
use crate::error::Result;
use crate::store::ModelStore;

pub type AgentHandle = Arc<Mutex<PatientAgent>>;

pub struct AgentRegistry {
    store: Arc<dyn ModelStore>,
    config: AgentConfig,
    agents: Mutex<HashMap<String, AgentHandle>>,
}

impl AgentRegistry {
    pub fn new(store: Arc<dyn ModelStore>, config: AgentConfig) -> Self {
        Self {
            store,
            config,
            agents: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the agent for `patient_id`, creating and loading it on first
    /// use. Concurrent first calls for the same patient load only once.
    pub async fn agent(&self, patient_id: &str) -> AgentHandle {
        let (handle, mut guard) = {
            let mut agents = self.agents.lock().await;
            if let Some(handle) = agents.get(patient_id) {
                return Arc::clone(handle);
            }
            let handle = Arc::new(Mutex::new(PatientAgent::new(
                patient_id,
                &self.config,
                Arc::clone(&self.store),
            )));
            // Nobody else can see the handle yet, so this lock is immediate.
            let guard = Arc::clone(&handle).lock_owned().await;
            agents.insert(patient_id.to_string(), Arc::clone(&handle));
            (handle, guard)
        };
        guard.load_model().await;
        drop(guard);
        handle
    }

    /// Locks the live agent for `patient_id`, skipping handles that were
    /// retired while this call waited for their lock.
    async fn lock_live(&self, patient_id: &str) -> OwnedMutexGuard<PatientAgent> {
        loop {
            let guard = self.agent(patient_id).await.lock_owned().await;
            if !guard.is_retired() {
                return guard;
            }
        }
    }

    pub async fn decide(&self, patient_id: &str, inputs: &StateInputs) -> Decision {
        self.lock_live(patient_id).await.decide(inputs)
    }

    pub async fn update_model(
        &self,
        patient_id: &str,
        inputs: &StateInputs,
        action: Action,
        reward: f64,
        next: Option<&StateInputs>,
    ) -> Result<UpdateReport> {
        let mut agent = self.lock_live(patient_id).await;
        agent.update_model(inputs, action, reward, next).await
    }

    pub async fn record_outcome(
        &self,
        patient_id: &str,
        inputs: &StateInputs,
        action: Action,
        works: bool,
        next: Option<&StateInputs>,
    ) -> Result<UpdateReport> {
        let mut agent = self.lock_live(patient_id).await;
        agent.record_outcome(inputs, action, works, next).await
    }

    /// Applies a feedback event to its patient's agent.
    pub async fn apply(&self, event: &OutcomeEvent) -> Result<UpdateReport> {
        let next = event.next_state_inputs();
        self.record_outcome(
            &event.patient_id,
            &event.state_inputs(),
            event.action,
            event.works,
            next.as_ref(),
        )
        .await
    }

    /// Retires and drops the cached agent; the next access reloads it from
    /// the store. Waits for any update in flight on that agent to finish.
    pub async fn evict(&self, patient_id: &str) -> bool {
        let Some(handle) = self.agents.lock().await.get(patient_id).cloned() else {
            return false;
        };
        let mut agent = handle.lock().await;
        if agent.is_retired() {
            return false;
        }
        agent.retire();
        let mut agents = self.agents.lock().await;
        if matches!(agents.get(patient_id), Some(current) if Arc::ptr_eq(current, &handle)) {
            agents.remove(patient_id);
        }
        true
    }

    pub async fn len(&self) -> usize {
        self.agents.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.agents.lock().await.is_empty()
    }
}
