use std::time::Duration;

/// Delay between the last keystroke and dispatching a lookup.
pub const DEFAULT_LOOKUP_DEBOUNCE: Duration = Duration::from_millis(400);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server origin, e.g. `http://localhost:3001`.
    pub base_url: String,
    pub lookup_debounce: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            lookup_debounce: DEFAULT_LOOKUP_DEBOUNCE,
        }
    }
}
