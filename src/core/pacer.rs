use std::time::Duration;

/// Fixed-interval pacer for bulk sends.
///
/// The broadcast engine iterates recipients sequentially and pauses between
/// sends to stay under the Bot API per-second rate ceiling. The delay lives
/// here as a single tunable instead of a magic number at each call site.
#[derive(Clone, Copy, Debug)]
pub struct Pacer {
    delay: Duration,
}

impl Pacer {
    /// Create a pacer with an explicit inter-send delay.
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Pacer configured with the platform's broadcast delay.
    pub fn from_config() -> Self {
        Self::new(crate::core::config::broadcast::pace_delay())
    }

    /// Inter-send delay this pacer applies.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Suspend the current task for one pacing interval.
    pub async fn pause(&self) {
        tokio::time::sleep(self.delay).await;
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::from_config()
    }
}
