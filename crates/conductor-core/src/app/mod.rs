//! App - predictor, registry, dispatch and session wiring
//!
//! # Main components
//! - **RateLimitedPredictor**: decimated, cached access to one concept endpoint
//! - **ConceptRegistry**: concept key -> predictor, per session
//! - **SelectorDispatcher**: selection value -> concept -> action
//! - **SessionBuilder / SessionBlueprint / Session**: start-up validation and per-episode isolation

pub mod predictor;
pub mod registry;
pub mod dispatch;
pub mod builder;
pub mod session;

pub use self::predictor::{Prediction, PredictorPhase, RateLimitedPredictor};
pub use self::registry::{ConceptRegistry, RegistryError};
pub use self::dispatch::{DispatchError, Routed, SelectionTable, SelectorDispatcher};
pub use self::builder::{BuildError, SessionBlueprint, SessionBuilder};
pub use self::session::{IterationSource, Session, StepRecord};
