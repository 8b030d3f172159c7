//! Live game generation: one cancellable, time-limited loop per connection.

pub mod supervisor;
mod worker;

use std::time::Duration;

use crate::catalog::generator::DEFAULT_MAX_ID_ATTEMPTS;

pub use supervisor::GenerationSupervisor;
pub use worker::LoopExit;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy)]
pub struct GenerationSettings {
    /// Pause between two generated games.
    pub interval: Duration,
    /// Hard limit on a loop's lifetime when no `stop` arrives.
    pub timeout: Duration,
    pub max_id_attempts: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            max_id_attempts: DEFAULT_MAX_ID_ATTEMPTS,
        }
    }
}
