//! Registry configuration

/// Session registry options
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Broadcast notices buffered per session before new ones are dropped
    pub notice_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            notice_capacity: 32,
        }
    }
}

impl RegistryConfig {
    /// Set the per-session notice buffer size (minimum 1)
    pub fn notice_capacity(mut self, capacity: usize) -> Self {
        self.notice_capacity = capacity.max(1);
        self
    }
}
