//! RateLimitedPredictor - decimated access to one concept policy
//!
//! # Decision rule
//! At iteration `i` the predictor queries the endpoint iff
//! `i % control_period == 0`; otherwise it serves the last action it got.
//! Iteration 0 is therefore always a control iteration.
//!
//! # State machine
//! - `Uninitialized`: no control iteration has succeeded yet
//! - `Ready`: `last_action` holds the most recent answer from the endpoint
//!
//! A failed inference leaves `last_action` (and the phase) untouched.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::domain::{Action, ControlPeriod, Endpoint, PredictorError, State};
use crate::ports::PolicyClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictorPhase {
    Uninitialized,
    Ready,
}

/// Result of one `predict` call.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub action: Action,
    pub iteration: u64,
    /// `true` if the endpoint was actually queried for this step.
    pub queried: bool,
}

/// Per-concept, per-session predictor.
///
/// Owns its cache and counter; build a fresh one for every session even when
/// two sessions talk to the same endpoint. Only the client is shared.
///
/// The self-maintained counter advances only when this predictor is called,
/// so inside a session it counts selections of its concept rather than
/// control-loop steps. Use `predict_at` (or `IterationSource::EpisodeStep`
/// on the session) to gate on the episode step instead.
///
/// # Preconditions
/// Calls on one instance must come from its owning session, one at a time,
/// with non-decreasing iterations. Out-of-order iterations are not detected.
pub struct RateLimitedPredictor {
    endpoint: Endpoint,
    control_period: ControlPeriod,
    client: Arc<dyn PolicyClient>,
    last_action: Option<Action>,
    next_iteration: u64,
}

impl RateLimitedPredictor {
    pub fn new(
        endpoint: Endpoint,
        control_period: ControlPeriod,
        client: Arc<dyn PolicyClient>,
    ) -> Self {
        Self {
            endpoint,
            control_period,
            client,
            last_action: None,
            next_iteration: 0,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn control_period(&self) -> ControlPeriod {
        self.control_period
    }

    pub fn last_action(&self) -> Option<&Action> {
        self.last_action.as_ref()
    }

    /// Iteration the next `get_action` call will use.
    pub fn next_iteration(&self) -> u64 {
        self.next_iteration
    }

    pub fn phase(&self) -> PredictorPhase {
        match self.last_action {
            Some(_) => PredictorPhase::Ready,
            None => PredictorPhase::Uninitialized,
        }
    }

    pub fn is_control_iteration(&self, iteration: u64) -> bool {
        iteration % self.control_period.get() == 0
    }

    /// Action for the next step, using the self-maintained iteration counter.
    pub async fn get_action(&mut self, state: &State) -> Result<Action, PredictorError> {
        self.predict(state).await.map(|p| p.action)
    }

    /// Action for an externally supplied iteration.
    pub async fn get_action_at(
        &mut self,
        state: &State,
        iteration: u64,
    ) -> Result<Action, PredictorError> {
        self.predict_at(state, iteration).await.map(|p| p.action)
    }

    pub async fn predict(&mut self, state: &State) -> Result<Prediction, PredictorError> {
        let iteration = self.next_iteration;
        self.predict_at(state, iteration).await
    }

    /// Core of the predictor.
    ///
    /// The step is consumed whether or not it succeeds: the counter moves to
    /// `iteration + 1` before anything can fail.
    pub async fn predict_at(
        &mut self,
        state: &State,
        iteration: u64,
    ) -> Result<Prediction, PredictorError> {
        self.next_iteration = iteration.saturating_add(1);

        if !self.is_control_iteration(iteration) {
            let Some(action) = &self.last_action else {
                return Err(PredictorError::Initialization { iteration });
            };
            trace!(endpoint = %self.endpoint, iteration, "serving cached action");
            return Ok(Prediction {
                action: action.clone(),
                iteration,
                queried: false,
            });
        }

        debug!(endpoint = %self.endpoint, iteration, "querying policy endpoint");
        match self.client.infer(&self.endpoint, state).await {
            Ok(action) => {
                self.last_action = Some(action.clone());
                Ok(Prediction {
                    action,
                    iteration,
                    queried: true,
                })
            }
            Err(err) => {
                warn!(endpoint = %self.endpoint, iteration, error = %err, "policy inference failed");
                Err(err.into())
            }
        }
    }
}
