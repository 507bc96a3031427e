//! ScriptedPolicyClient - in-memory PolicyClient
//!
//! Answers from a closure and records every call, so callers can assert on
//! exactly when the network would have been hit. An injected failure
//! overrides the closure until cleared.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::{Action, Endpoint, InferenceError, State};
use crate::ports::PolicyClient;

type Responder = dyn Fn(&Endpoint, &State) -> Result<Action, InferenceError> + Send + Sync;

/// One observed `infer` call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub endpoint: Endpoint,
    pub state: State,
}

pub struct ScriptedPolicyClient {
    responder: Box<Responder>,
    failure: Mutex<Option<InferenceError>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedPolicyClient {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&Endpoint, &State) -> Result<Action, InferenceError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            failure: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every endpoint answers `action` for every state.
    pub fn constant(action: Action) -> Self {
        Self::new(move |_, _| Ok(action.clone()))
    }

    /// Make every following call fail with `failure` (`None` restores the responder).
    pub fn set_failure(&self, failure: Option<InferenceError>) {
        *self.failure.lock() = failure;
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls_to(&self, endpoint: &Endpoint) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| &c.endpoint == endpoint)
            .count()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl PolicyClient for ScriptedPolicyClient {
    async fn infer(&self, endpoint: &Endpoint, state: &State) -> Result<Action, InferenceError> {
        self.calls.lock().push(RecordedCall {
            endpoint: endpoint.clone(),
            state: state.clone(),
        });
        if let Some(failure) = self.failure.lock().clone() {
            return Err(failure);
        }
        (self.responder)(endpoint, state)
    }
}
