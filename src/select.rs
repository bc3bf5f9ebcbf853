//! The seam between the workflow and whatever asks the user which groups to
//! act on.

use std::collections::BTreeSet;

use anyhow::Result;

use crate::{group::GroupMap, types::PullRequestRecord};

/// One selectable group as presented to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupChoice {
    pub key: String,
    /// `"<key> (<n>)"`.
    pub label: String,
}

impl GroupChoice {
    pub fn new(key: impl Into<String>, count: usize) -> Self {
        let key = key.into();
        let label = format!("{key} ({count})");
        Self { key, label }
    }

    pub fn from_groups(groups: &GroupMap) -> Vec<Self> {
        groups
            .iter()
            .map(|group| Self::new(group.key.clone(), group.records.len()))
            .collect()
    }
}

/// Interactive selection and confirmation.
pub trait Selector {
    /// Returns the keys of the chosen groups. An empty result means the user
    /// chose nothing.
    fn choose_groups(&mut self, choices: &[GroupChoice]) -> Result<Vec<String>>;

    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool>;
}

fn repository_list(selected: &[PullRequestRecord]) -> String {
    selected
        .iter()
        .map(|record| record.repository.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|repository| format!(" ● {repository}\n"))
        .collect()
}

/// Confirmation text listing the distinct repositories about to be merged
/// into, sorted.
pub fn merge_prompt(selected: &[PullRequestRecord]) -> String {
    format!("Merge?\n{}", repository_list(selected))
}

pub fn label_prompt(label: &str, selected: &[PullRequestRecord]) -> String {
    format!("Add label '{label}'?\n{}", repository_list(selected))
}
