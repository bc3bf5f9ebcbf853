//! The fetch, group, select, act and "Done?" loop behind the CLI.

use std::{io::Write, pin::pin};

use anyhow::{Context, Result};
use futures::TryStreamExt;
use tracing::{debug, info};

use crate::{
    bulk::{self, ActionResult, LabelAction, MergeAction},
    github::Forge,
    group::{AutomationIdentities, GroupKeyStrategy, GroupMap, filter_automated},
    labels::LabelAssigner,
    paginate,
    select::{GroupChoice, Selector, label_prompt, merge_prompt},
    types::PullRequestRecord,
};

/// What happens to the pull requests of the chosen groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkOperation {
    /// Merge each pull request; `batch` sends every merge in one request.
    Merge { batch: bool },
    /// Attach the named label.
    Label(String),
}

impl Default for BulkOperation {
    fn default() -> Self {
        BulkOperation::Merge { batch: false }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkflowOptions {
    pub strategy: GroupKeyStrategy,
    pub identities: AutomationIdentities,
    pub operation: BulkOperation,
}

/// Observer for long-running steps. Every hook defaults to doing nothing.
pub trait Progress: Sync {
    fn fetch_started(&self) {}

    fn record_fetched(&self, _record: &PullRequestRecord) {}

    fn fetch_finished(&self, _count: usize) {}

    fn action_started(&self, _total: usize) {}

    fn item_completed(&self, _title: &str, _result: &ActionResult) {}

    fn action_finished(&self) {}
}

impl Progress for () {}

/// How a single pass of the workflow ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    NothingToDo,
    NoSelection,
    Declined,
    Completed(Vec<(PullRequestRecord, ActionResult)>),
}

/// Walks every page and groups the automation-authored pull requests.
pub async fn fetch_groups<F, P>(
    forge: &F,
    strategy: GroupKeyStrategy,
    identities: &AutomationIdentities,
    progress: &P,
) -> Result<GroupMap>
where
    F: Forge,
    P: Progress + ?Sized,
{
    progress.fetch_started();
    let mut records = Vec::new();
    let mut stream = pin!(paginate::pull_requests(forge));
    while let Some(record) = stream
        .try_next()
        .await
        .context("Failed to fetch pull requests")?
    {
        progress.record_fetched(&record);
        records.push(record);
    }
    progress.fetch_finished(records.len());

    let fetched = records.len();
    let automated = filter_automated(records, identities);
    let groups = GroupMap::build(automated, strategy);
    info!(fetched, groups = groups.len(), "grouped pull requests");
    Ok(groups)
}

/// Writes `<title>: [<messages>]` for every failed item.
pub fn report_failures<W: Write>(
    results: &[(PullRequestRecord, ActionResult)],
    writer: &mut W,
) -> Result<()> {
    for (record, result) in results.iter().filter(|(_, r)| !r.is_success()) {
        writeln!(writer, "{}: {:?}", record.title, result.error_messages())?;
    }
    Ok(())
}

/// Interactive bulk triage against one forge.
///
/// The label cache lives as long as the workflow, so repeated passes reuse
/// label lookups.
pub struct Workflow<'a, F> {
    forge: &'a F,
    options: WorkflowOptions,
    assigner: LabelAssigner<'a, F>,
}

impl<'a, F: Forge> Workflow<'a, F> {
    pub fn new(forge: &'a F, options: WorkflowOptions) -> Self {
        Self {
            forge,
            options,
            assigner: LabelAssigner::new(forge),
        }
    }

    pub async fn fetch_groups<P: Progress + ?Sized>(&self, progress: &P) -> Result<GroupMap> {
        fetch_groups(
            self.forge,
            self.options.strategy,
            &self.options.identities,
            progress,
        )
        .await
    }

    /// One pass: fetch, choose, confirm, act and report failures.
    pub async fn run_once<S, P, W>(
        &self,
        selector: &mut S,
        progress: &P,
        writer: &mut W,
    ) -> Result<Outcome>
    where
        S: Selector + ?Sized,
        P: Progress + ?Sized,
        W: Write,
    {
        let groups = self.fetch_groups(progress).await?;
        if groups.is_empty() {
            return Ok(Outcome::NothingToDo);
        }

        let chosen = selector.choose_groups(&GroupChoice::from_groups(&groups))?;
        if chosen.is_empty() {
            debug!("no groups chosen");
            return Ok(Outcome::NoSelection);
        }

        let selected = groups.select(&chosen);
        let prompt = match &self.options.operation {
            BulkOperation::Merge { .. } => merge_prompt(&selected),
            BulkOperation::Label(label) => label_prompt(label, &selected),
        };
        if !selector.confirm(&prompt, false)? {
            debug!("bulk action declined");
            return Ok(Outcome::Declined);
        }

        let results = self.apply(selected, progress).await;
        report_failures(&results, writer)?;
        Ok(Outcome::Completed(results))
    }

    /// Repeats [`Workflow::run_once`] until the user is done, nothing is
    /// chosen or there is nothing left to do.
    pub async fn run<S, P, W>(&self, selector: &mut S, progress: &P, writer: &mut W) -> Result<()>
    where
        S: Selector + ?Sized,
        P: Progress + ?Sized,
        W: Write,
    {
        loop {
            match self.run_once(selector, progress, writer).await? {
                Outcome::NothingToDo => {
                    writeln!(writer, "Nothing to do")?;
                    return Ok(());
                }
                Outcome::NoSelection => return Ok(()),
                Outcome::Declined | Outcome::Completed(_) => {}
            }

            if selector.confirm("Done?", true)? {
                return Ok(());
            }
            debug!("starting another pass");
        }
    }

    async fn apply<P: Progress + ?Sized>(
        &self,
        selected: Vec<PullRequestRecord>,
        progress: &P,
    ) -> Vec<(PullRequestRecord, ActionResult)> {
        progress.action_started(selected.len());
        let on_complete = |record: &PullRequestRecord, result: &ActionResult| {
            progress.item_completed(&record.title, result)
        };

        let results = match &self.options.operation {
            BulkOperation::Merge { batch: true } => {
                let results = bulk::merge_batch(self.forge, selected).await;
                for (record, result) in &results {
                    on_complete(record, result);
                }
                results
            }
            BulkOperation::Merge { batch: false } => {
                bulk::execute_with_progress(selected, &MergeAction::new(self.forge), on_complete)
                    .await
            }
            BulkOperation::Label(label) => {
                let action = LabelAction::new(&self.assigner, label.as_str());
                bulk::execute_with_progress(selected, &action, on_complete).await
            }
        };

        progress.action_finished();
        results
    }
}
