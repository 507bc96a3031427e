//! IdGenerator port - session id generation

use crate::domain::SessionId;
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator hands out session ids.
///
/// `Send + Sync` so one generator can serve many parallel rollouts.
pub trait IdGenerator: Send + Sync {
    fn generate_session_id(&self) -> SessionId;
}

/// ULID generator driven by a [`Clock`].
///
/// The timestamp part comes from the clock and the random part from `rand`,
/// so a `FixedClock` pins the timestamp but ids stay unique.
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_session_id(&self) -> SessionId {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        let ulid = Ulid::from_parts(timestamp_ms, rand::random());
        SessionId::from(ulid)
    }
}
