//! Session - one episode of the control loop
//!
//! Owns the episode's registry (and through it every predictor's cache and
//! counter). Dropping the session discards all of it; nothing carries over
//! to the next episode.
//!
//! # Iteration source
//! With [`IterationSource::PerConcept`] (the default) a concept's iteration
//! counts how often that concept has been selected, so steps spent on other
//! concepts do not age its cache: a period-3 concept selected at step 0 and
//! next at step 50 serves the step-0 action at its iteration 1.
//! [`IterationSource::EpisodeStep`] passes the episode step instead; a
//! concept first selected on a non-control step then fails with
//! `PredictorError::Initialization`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::app::dispatch::{DispatchError, SelectorDispatcher};
use crate::app::registry::ConceptRegistry;
use crate::domain::{Action, ConceptKey, Selection, SessionId, State};
use crate::ports::Clock;

/// What happened at one control step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub session: SessionId,
    pub step: u64,
    pub selection: Selection,
    pub concept: ConceptKey,
    pub action: Action,
    /// The concept predictor's own iteration for this step.
    pub iteration: u64,
    pub queried: bool,
    pub at: DateTime<Utc>,
}

/// Which counter decides a concept's control iterations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationSource {
    /// Each predictor's self-maintained counter.
    #[default]
    PerConcept,
    /// The session's step number.
    EpisodeStep,
}

pub struct Session {
    id: SessionId,
    started_at: DateTime<Utc>,
    registry: ConceptRegistry,
    dispatcher: SelectorDispatcher,
    clock: Arc<dyn Clock>,
    iteration_source: IterationSource,
    steps: u64,
}

impl Session {
    pub fn new(
        id: SessionId,
        registry: ConceptRegistry,
        dispatcher: SelectorDispatcher,
        clock: Arc<dyn Clock>,
        iteration_source: IterationSource,
    ) -> Self {
        Self {
            id,
            started_at: clock.now(),
            registry,
            dispatcher,
            clock,
            iteration_source,
            steps: 0,
        }
    }

    pub fn iteration_source(&self) -> IterationSource {
        self.iteration_source
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Steps attempted so far, failed ones included.
    pub fn steps_taken(&self) -> u64 {
        self.steps
    }

    pub fn registry(&self) -> &ConceptRegistry {
        &self.registry
    }

    /// Run one control step: route `state` to the concept picked by
    /// `selection` and return its action.
    ///
    /// An error ends nothing by itself; the caller decides whether the
    /// episode continues.
    #[instrument(skip_all, fields(session = %self.id, step = self.steps, selection = %selection))]
    pub async fn step(
        &mut self,
        selection: Selection,
        state: &State,
    ) -> Result<StepRecord, DispatchError> {
        let step = self.steps;
        self.steps += 1;

        let routed = match self.iteration_source {
            IterationSource::PerConcept => {
                self.dispatcher
                    .route(&mut self.registry, selection, state)
                    .await?
            }
            IterationSource::EpisodeStep => {
                self.dispatcher
                    .route_at(&mut self.registry, selection, state, step)
                    .await?
            }
        };

        Ok(StepRecord {
            session: self.id,
            step,
            selection,
            concept: routed.concept,
            action: routed.prediction.action,
            iteration: routed.prediction.iteration,
            queried: routed.prediction.queried,
            at: self.clock.now(),
        })
    }
}
