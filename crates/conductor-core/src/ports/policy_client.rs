//! PolicyClient port - one synchronous request/response against a policy server

use async_trait::async_trait;

use crate::domain::{Action, Endpoint, InferenceError, State};

/// PolicyClient asks a remotely served concept policy for an action.
///
/// # Contract
/// - no local state is kept between calls; the endpoint is passed in every time
/// - one call is one request, with no retry
/// - failures come back as a distinct [`InferenceError`], never as a default action
///
/// Implementations are shared between sessions (`Arc<dyn PolicyClient>`),
/// which is fine exactly because they hold no per-session state.
#[async_trait]
pub trait PolicyClient: Send + Sync {
    async fn infer(&self, endpoint: &Endpoint, state: &State) -> Result<Action, InferenceError>;
}
