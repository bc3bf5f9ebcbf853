//! mass-merge: bulk triage of dependency update pull requests.
//!
//! Fetches the open pull requests of every repository the viewer owns,
//! keeps those opened by dependency bots, groups them by the update they
//! perform and merges (or labels) whole groups at once. The same workflow is
//! exposed on the command line and over HTTP.

pub mod bulk;
pub mod cache;
pub mod cli;
pub mod error;
pub mod github;
pub mod graphql;
pub mod group;
pub mod labels;
pub mod paginate;
pub mod select;
pub mod types;
pub mod web;
pub mod workflow;

pub use bulk::{Action, ActionResult, BatchReport};
pub use cli::{Command, Settings, parse_args};
pub use error::{ClientError, FetchError, LabelError};
pub use github::{Credentials, Forge, GitHub, resolve_credentials};
pub use group::{AutomationIdentities, GroupKeyStrategy, GroupMap};
pub use select::{GroupChoice, Selector};
pub use types::{Identity, PullRequestRecord, Subject};
pub use workflow::{BulkOperation, Outcome, Progress, Workflow, WorkflowOptions};
