use std::sync::Mutex;

use async_trait::async_trait;

use jobwatch_core::JobListing;

use crate::{Notifier, NotifyError};

/// In-memory sink for tests/dry runs.
///
/// Optionally fails every delivery, to exercise sink isolation.
#[derive(Debug, Default)]
pub struct InMemoryNotifier {
    name: String,
    fail: bool,
    inner: Mutex<Vec<JobListing>>,
}

impl InMemoryNotifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fail: false,
            inner: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(name: impl Into<String>) -> Self {
        Self {
            fail: true,
            ..Self::new(name)
        }
    }

    pub fn delivered(&self) -> Vec<JobListing> {
        self.inner
            .lock()
            .map(|listings| listings.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, listing: &JobListing) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::Transport(format!("{} is down", self.name)));
        }
        self.inner
            .lock()
            .map_err(|_| NotifyError::Transport("sink state poisoned".to_string()))?
            .push(listing.clone());
        Ok(())
    }
}
