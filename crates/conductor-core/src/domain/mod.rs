//! Domain model (state/action maps, concept identity, errors).
//!
//! Nothing in here talks to the network or holds per-step mutable state;
//! that lives in `app`.

pub mod concept;
pub mod errors;
pub mod ids;
pub mod state;

pub use concept::{ConceptKey, ConceptSpec, ControlPeriod, Endpoint, EndpointError, Selection};
pub use errors::{ErrorKind, InferenceError, InferenceErrorKind, PredictorError};
pub use ids::SessionId;
pub use state::{Action, State, StateValue};
