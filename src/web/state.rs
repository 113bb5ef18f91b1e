use std::sync::Arc;

use crate::paste::PasteService;

/// Shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub service: PasteService,
    /// When set, `x-test-now-ms` replaces the clock for reads.
    pub test_mode: bool,
    /// Base for returned links, e.g. `https://paste.example`.
    pub public_url: Option<Arc<str>>,
}

impl AppState {
    pub fn new(service: PasteService) -> Self {
        Self {
            service,
            test_mode: false,
            public_url: None,
        }
    }

    pub fn with_test_mode(mut self, enabled: bool) -> Self {
        self.test_mode = enabled;
        self
    }

    pub fn with_public_url(mut self, url: Option<String>) -> Self {
        self.public_url = url.map(|u| Arc::from(u.trim_end_matches('/')));
        self
    }
}
