//! Fan-out of one action over many pull requests, with every outcome kept
//! next to the item it belongs to.

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, info};

use crate::{
    github::Forge,
    graphql::{GraphQlError, MergePullRequests},
    labels::LabelAssigner,
    types::{PullRequestRecord, Subject},
};

/// Outcome of an action on a single item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionResult {
    Success,
    /// Never empty.
    Failed(Vec<GraphQlError>),
}

impl ActionResult {
    pub fn from_errors(errors: Vec<GraphQlError>) -> Self {
        if errors.is_empty() {
            ActionResult::Success
        } else {
            ActionResult::Failed(errors)
        }
    }

    /// Wraps a failure that happened outside the API's `errors` array.
    pub fn from_failure(error: &dyn std::error::Error) -> Self {
        ActionResult::Failed(vec![GraphQlError::synthetic(error.to_string())])
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ActionResult::Success)
    }

    pub fn errors(&self) -> &[GraphQlError] {
        match self {
            ActionResult::Success => &[],
            ActionResult::Failed(errors) => errors,
        }
    }

    pub fn error_messages(&self) -> Vec<&str> {
        self.errors().iter().map(|e| e.message.as_str()).collect()
    }
}

/// Something done to one item of a batch.
#[async_trait]
pub trait Action<T: Sync>: Send + Sync {
    fn name(&self) -> &'static str;

    async fn apply(&self, item: &T) -> ActionResult;
}

/// Merges one pull request per request.
pub struct MergeAction<'a, F> {
    forge: &'a F,
}

impl<'a, F> MergeAction<'a, F> {
    pub fn new(forge: &'a F) -> Self {
        Self { forge }
    }
}

#[async_trait]
impl<'a, F, T> Action<T> for MergeAction<'a, F>
where
    F: Forge,
    T: Subject + Sync,
{
    fn name(&self) -> &'static str {
        "merge"
    }

    async fn apply(&self, item: &T) -> ActionResult {
        debug!(id = item.node_id(), title = item.title(), "merging pull request");
        match self
            .forge
            .execute(&MergePullRequests::single(item.node_id()))
            .await
        {
            Ok(response) => ActionResult::from_errors(response.errors),
            Err(e) => ActionResult::from_failure(&e),
        }
    }
}

/// Attaches a label, by name, to each pull request.
pub struct LabelAction<'s, 'a, F> {
    assigner: &'s LabelAssigner<'a, F>,
    label: String,
}

impl<'s, 'a, F> LabelAction<'s, 'a, F> {
    pub fn new(assigner: &'s LabelAssigner<'a, F>, label: impl Into<String>) -> Self {
        Self {
            assigner,
            label: label.into(),
        }
    }
}

#[async_trait]
impl<'s, 'a, F: Forge> Action<PullRequestRecord> for LabelAction<'s, 'a, F> {
    fn name(&self) -> &'static str {
        "label"
    }

    async fn apply(&self, item: &PullRequestRecord) -> ActionResult {
        match self
            .assigner
            .add_label(&item.repository_id, &item.id, &self.label)
            .await
        {
            Ok(response) => ActionResult::from_errors(response.errors),
            Err(e) => ActionResult::from_failure(&e),
        }
    }
}

/// Runs `action` on every item concurrently and pairs each item with its
/// result, in input order.
pub async fn execute<T, A>(items: Vec<T>, action: &A) -> Vec<(T, ActionResult)>
where
    T: Sync,
    A: Action<T> + ?Sized,
{
    execute_with_progress(items, action, |_, _| {}).await
}

/// Like [`execute`], calling `progress` as each item completes.
pub async fn execute_with_progress<T, A, P>(
    items: Vec<T>,
    action: &A,
    progress: P,
) -> Vec<(T, ActionResult)>
where
    T: Sync,
    A: Action<T> + ?Sized,
    P: Fn(&T, &ActionResult),
{
    debug!(action = action.name(), count = items.len(), "starting bulk action");
    let results = join_all(items.iter().map(|item| {
        let progress = &progress;
        async move {
            let result = action.apply(item).await;
            progress(item, &result);
            result
        }
    }))
    .await;

    let paired: Vec<(T, ActionResult)> = items.into_iter().zip(results).collect();
    let failed = paired.iter().filter(|(_, r)| !r.is_success()).count();
    info!(action = action.name(), total = paired.len(), failed, "bulk action finished");
    paired
}

/// Merges every item in a single aliased request.
///
/// Errors are attributed through their `merge_<i>` path; an error without
/// one is reported against every item. When the response carries no data at
/// all, items no error names are failed with every error of the response.
pub async fn merge_batch<F, T>(forge: &F, items: Vec<T>) -> Vec<(T, ActionResult)>
where
    F: Forge,
    T: Subject + Sync,
{
    if items.is_empty() {
        return Vec::new();
    }

    let ids = items.iter().map(|item| item.node_id().to_string()).collect();
    debug!(count = items.len(), "merging pull requests in one request");

    let (data, errors) = match forge.execute(&MergePullRequests::new(ids)).await {
        Ok(response) => (response.data, response.errors),
        Err(e) => {
            let result = ActionResult::from_failure(&e);
            return items.into_iter().map(|item| (item, result.clone())).collect();
        }
    };

    let mut per_item: Vec<Vec<GraphQlError>> = vec![Vec::new(); items.len()];
    for error in &errors {
        let index = error
            .root_field()
            .and_then(MergePullRequests::index_of_alias);
        match index.and_then(|i| per_item.get_mut(i)) {
            Some(bucket) => bucket.push(error.clone()),
            None => per_item.iter_mut().for_each(|bucket| bucket.push(error.clone())),
        }
    }

    // Without data nothing was merged, including items no error names.
    if data.is_none() {
        for bucket in per_item.iter_mut().filter(|bucket| bucket.is_empty()) {
            bucket.clone_from(&errors);
        }
    }

    items
        .into_iter()
        .zip(per_item)
        .map(|(item, errors)| (item, ActionResult::from_errors(errors)))
        .collect()
}

pub const COMPLETED_WITHOUT_ERROR: &str = "Completed without error";

/// Human-readable summary of a finished batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub messages: Vec<String>,
    pub failed: usize,
}

impl BatchReport {
    pub fn from_results<T: Subject>(results: &[(T, ActionResult)]) -> Self {
        let mut messages = Vec::new();
        let mut failed = 0;
        for (item, result) in results {
            if result.is_success() {
                continue;
            }
            failed += 1;
            messages.extend(result.errors().iter().map(|error| {
                format!(
                    "Merging pr \"{}\" into {} resulted in \"{}\"",
                    item.title(),
                    item.repository(),
                    error.message
                )
            }));
        }

        if failed == 0 {
            messages.push(COMPLETED_WITHOUT_ERROR.to_string());
        }

        Self { messages, failed }
    }

    /// Puts failures that happened before any action ran ahead of the
    /// per-item messages. Any problem withdraws the overall success message.
    pub fn with_problems(mut self, problems: Vec<String>) -> Self {
        if problems.is_empty() {
            return self;
        }
        if self.is_success() {
            self.messages.retain(|m| m != COMPLETED_WITHOUT_ERROR);
        }
        self.failed += problems.len();
        let mut messages = problems;
        messages.append(&mut self.messages);
        self.messages = messages;
        self
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}
