use thiserror::Error;

use crate::graphql::GraphQlError;

/// Failures of a single round trip to the GitHub API.
///
/// API-level errors (a populated `errors` array) are not represented here:
/// they travel inside [`crate::graphql::Response`] so every caller has to
/// look at them.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to GitHub failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("could not decode GitHub response: {source}")]
    Decode {
        body: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("identity lookup failed: {0}")]
    Identity(#[from] octocrab::Error),

    #[error("failed to build GitHub client: {0}")]
    Setup(String),
}

/// Errors raised while walking the viewer's pull requests page by page.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("GitHub returned no data: {}", join_messages(.0))]
    Api(Vec<GraphQlError>),
}

/// Errors raised while resolving or attaching a label.
#[derive(Debug, Error)]
pub enum LabelError {
    #[error("label '{label}' does not exist in repository {repository_id}")]
    UnknownLabel {
        label: String,
        repository_id: String,
    },

    #[error("could not list labels for repository {repository_id}: {}", join_messages(.errors))]
    Fetch {
        repository_id: String,
        errors: Vec<GraphQlError>,
    },

    #[error(transparent)]
    Client(#[from] ClientError),
}

fn join_messages(errors: &[GraphQlError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}
