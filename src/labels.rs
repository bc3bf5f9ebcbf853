//! Label lookup by name and attachment to pull requests.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::{
    cache::TtlCache,
    error::LabelError,
    github::Forge,
    graphql::{AddLabels, AddLabelsData, LABEL_PAGE_SIZE, RepositoryLabels, Response},
};

pub const LABEL_CACHE_TTL: Duration = Duration::from_secs(360);
pub const LABEL_CACHE_CAPACITY: usize = 1024;

/// Label name to label node id, for one repository.
pub type LabelMap = HashMap<String, String>;

/// Labels of one repository, filled once by whichever lookup gets there
/// first. Lookups arriving while the fetch is in flight wait for it.
pub type LabelSlot = OnceCell<Arc<LabelMap>>;

/// Resolves label names through a per-repository cache and attaches them.
pub struct LabelAssigner<'a, F> {
    forge: &'a F,
    cache: Mutex<TtlCache<String, Arc<LabelSlot>>>,
}

impl<'a, F: Forge> LabelAssigner<'a, F> {
    pub fn new(forge: &'a F) -> Self {
        Self::with_cache(forge, TtlCache::new(LABEL_CACHE_CAPACITY, LABEL_CACHE_TTL))
    }

    pub fn with_cache(forge: &'a F, cache: TtlCache<String, Arc<LabelSlot>>) -> Self {
        Self {
            forge,
            cache: Mutex::new(cache),
        }
    }

    /// Labels of a repository, fetched on a cache miss. Only the first
    /// [`LABEL_PAGE_SIZE`] labels are ever known.
    ///
    /// A failed fetch leaves the slot empty, so the next lookup tries again.
    pub async fn labels_for(&self, repository_id: &str) -> Result<Arc<LabelMap>, LabelError> {
        let slot = self.slot(repository_id);
        if let Some(labels) = slot.get() {
            debug!(repository_id, "label cache hit");
            return Ok(Arc::clone(labels));
        }

        let labels = slot
            .get_or_try_init(|| self.fetch_labels(repository_id))
            .await?;
        Ok(Arc::clone(labels))
    }

    async fn fetch_labels(&self, repository_id: &str) -> Result<Arc<LabelMap>, LabelError> {
        let response = self
            .forge
            .execute(&RepositoryLabels {
                repository_id: repository_id.to_string(),
            })
            .await?;

        let Response { data, errors } = response;
        let Some(data) = data else {
            return Err(LabelError::Fetch {
                repository_id: repository_id.to_string(),
                errors,
            });
        };
        if !errors.is_empty() {
            let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
            warn!(repository_id, ?messages, "label listing returned errors");
        }

        let labels: LabelMap = data
            .node
            .and_then(|repository| repository.labels)
            .map(|connection| {
                connection
                    .nodes
                    .into_iter()
                    .flatten()
                    .map(|label| (label.name, label.id))
                    .collect()
            })
            .unwrap_or_default();

        if labels.len() >= LABEL_PAGE_SIZE {
            debug!(repository_id, "repository may have more labels than were fetched");
        }

        Ok(Arc::new(labels))
    }

    /// Attaches `label_name` to `labelable_id`. Nothing is sent when the
    /// repository has no label of that name.
    pub async fn add_label(
        &self,
        repository_id: &str,
        labelable_id: &str,
        label_name: &str,
    ) -> Result<Response<AddLabelsData>, LabelError> {
        let labels = self.labels_for(repository_id).await?;
        let Some(label_id) = labels.get(label_name) else {
            return Err(LabelError::UnknownLabel {
                label: label_name.to_string(),
                repository_id: repository_id.to_string(),
            });
        };

        debug!(repository_id, labelable_id, label = label_name, "adding label");
        let response = self
            .forge
            .execute(&AddLabels {
                labelable_id: labelable_id.to_string(),
                label_ids: vec![label_id.clone()],
            })
            .await?;
        Ok(response)
    }

    /// Drops the cached labels of a repository.
    pub fn forget(&self, repository_id: &str) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .evict(repository_id);
    }

    fn slot(&self, repository_id: &str) -> Arc<LabelSlot> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = cache.get(repository_id) {
            return slot;
        }
        let slot = Arc::new(LabelSlot::new());
        cache.insert(repository_id.to_string(), Arc::clone(&slot));
        slot
    }
}
