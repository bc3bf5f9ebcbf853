//! Filtering to automation-authored pull requests and grouping them by the
//! dependency update they perform.

use std::{collections::BTreeSet, sync::LazyLock};

use clap::ValueEnum;
use regex::Regex;

use crate::types::PullRequestRecord;

static BUMP_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Bump (?P<name>[^ ]+) from (?P<from>[^ ]+) to (?P<to>[^ ]+)")
        .expect("bump title pattern is valid")
});

/// Label every dependency PR carries; it never distinguishes groups.
pub const SENTINEL_LABEL: &str = "dependencies";

/// Returns the `Bump X from A to B` span of a title, or the whole title when
/// it does not describe a bump.
pub fn normalise_title(title: &str) -> &str {
    BUMP_TITLE.find(title).map_or(title, |bump| bump.as_str())
}

/// Sorted, comma-joined label names without the sentinel label.
pub fn label_digest(labels: &[String]) -> String {
    let mut names: Vec<&str> = labels
        .iter()
        .map(String::as_str)
        .filter(|name| *name != SENTINEL_LABEL)
        .collect();
    names.sort_unstable();
    names.join(", ")
}

/// How a record's group key is derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum GroupKeyStrategy {
    /// The bump phrase of the title only.
    Title,
    /// The bump phrase followed by the record's label digest.
    #[default]
    Labels,
}

impl GroupKeyStrategy {
    pub fn key(self, record: &PullRequestRecord) -> String {
        let title = normalise_title(&record.title);
        match self {
            GroupKeyStrategy::Title => title.to_string(),
            GroupKeyStrategy::Labels => {
                let digest = label_digest(&record.labels);
                if digest.is_empty() {
                    title.to_string()
                } else {
                    format!("{title} [{digest}]")
                }
            }
        }
    }
}

/// Logins recognised as dependency-update bots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutomationIdentities {
    logins: BTreeSet<String>,
}

impl AutomationIdentities {
    pub fn new<I, S>(logins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            logins: logins.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, login: &str) -> bool {
        self.logins.contains(login)
    }
}

impl Default for AutomationIdentities {
    fn default() -> Self {
        Self::new(["dependabot", "dependabot-preview"])
    }
}

/// Keeps records whose author is one of `identities`.
pub fn filter_automated<I>(records: I, identities: &AutomationIdentities) -> Vec<PullRequestRecord>
where
    I: IntoIterator<Item = PullRequestRecord>,
{
    records
        .into_iter()
        .filter(|record| identities.contains(&record.author_login))
        .collect()
}

/// Sorts `items` by `key_fn` and splits the result into runs of equal keys.
///
/// The sort is stable, so each run keeps the input order of its items.
pub fn group_by<T, F>(items: Vec<T>, key_fn: F) -> Vec<(String, Vec<T>)>
where
    F: Fn(&T) -> String,
{
    let mut keyed: Vec<(String, T)> = items.into_iter().map(|item| (key_fn(&item), item)).collect();
    keyed.sort_by(|(a, _), (b, _)| a.cmp(b));

    let mut groups: Vec<(String, Vec<T>)> = Vec::new();
    for (key, item) in keyed {
        match groups.last_mut() {
            Some((last_key, run)) if *last_key == key => run.push(item),
            _ => groups.push((key, vec![item])),
        }
    }
    groups
}

/// Records that share a group key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub key: String,
    pub records: Vec<PullRequestRecord>,
}

impl Group {
    /// Distinct repository names, sorted.
    pub fn repositories(&self) -> BTreeSet<&str> {
        self.records.iter().map(|r| r.repository.as_str()).collect()
    }
}

/// Groups ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupMap {
    groups: Vec<Group>,
}

impl GroupMap {
    pub fn build(records: Vec<PullRequestRecord>, strategy: GroupKeyStrategy) -> Self {
        let groups = group_by(records, |record| strategy.key(record))
            .into_iter()
            .map(|(key, records)| Group { key, records })
            .collect();
        Self { groups }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter()
    }

    pub fn get(&self, key: &str) -> Option<&Group> {
        self.groups.iter().find(|group| group.key == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|group| group.key.as_str())
    }

    /// Records of the chosen groups, in the order the keys were chosen.
    /// Unknown keys are ignored.
    pub fn select<S: AsRef<str>>(&self, keys: &[S]) -> Vec<PullRequestRecord> {
        keys.iter()
            .filter_map(|key| self.get(key.as_ref()))
            .flat_map(|group| group.records.iter().cloned())
            .collect()
    }
}

impl IntoIterator for GroupMap {
    type Item = Group;
    type IntoIter = std::vec::IntoIter<Group>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.into_iter()
    }
}
