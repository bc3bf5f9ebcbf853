//! Typed GraphQL operations and the response envelope shared by every client.
//!
//! Each query or mutation is a struct implementing [`Operation`]; the
//! document text, its variables and the shape of `data` live together so a
//! caller only ever deals with "send operation, get typed response".

use std::{borrow::Cow, collections::BTreeMap, fmt::Write as _};

use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{error, warn};

use crate::error::ClientError;

/// Null and missing lists are both decoded as empty.
pub fn deserialize_null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: u64,
    pub column: u64,
}

/// One element of an error `path`: a field name/alias or a list index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(u64),
}

/// An entry of the top-level `errors` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphQlError {
    pub message: String,
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub locations: Vec<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<PathSegment>>,
}

impl GraphQlError {
    /// An error that did not come from the API's `errors` array.
    pub fn synthetic(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: Vec::new(),
            path: None,
        }
    }

    /// The alias or field the error was reported against, if any.
    pub fn root_field(&self) -> Option<&str> {
        match self.path.as_deref()?.first()? {
            PathSegment::Key(key) => Some(key),
            PathSegment::Index(_) => None,
        }
    }
}

/// Decoded `{data, errors}` envelope. `errors` is never thrown; callers must
/// branch on it.
#[derive(Debug, Clone, PartialEq)]
pub struct Response<T> {
    pub data: Option<T>,
    pub errors: Vec<GraphQlError>,
}

impl<T> Response<T> {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn error_messages(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.message.as_str()).collect()
    }
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    errors: Vec<GraphQlError>,
    #[serde(default)]
    message: Option<String>,
}

/// Decodes a raw GraphQL response body.
///
/// Bodies carrying neither `data` nor `errors` (GitHub answers auth failures
/// with a bare `{"message": ...}`) are turned into a single synthetic error.
pub fn decode_envelope<T: DeserializeOwned>(body: &str) -> Result<Response<T>, ClientError> {
    let envelope: RawEnvelope = serde_json::from_str(body).map_err(|source| {
        error!(%source, body, "GitHub response was not a JSON envelope");
        ClientError::Decode {
            body: body.to_string(),
            source,
        }
    })?;

    let mut errors = envelope.errors;
    if !errors.is_empty() {
        warn!(
            count = errors.len(),
            messages = ?errors.iter().map(|e| &e.message).collect::<Vec<_>>(),
            "GraphQL errors in response"
        );
    }

    let data = envelope.data.filter(|data| !data.is_null());
    if data.is_none() && errors.is_empty() {
        let message = envelope
            .message
            .unwrap_or_else(|| "unknown error".to_string());
        warn!(%message, "GitHub response carried neither data nor errors");
        errors.push(GraphQlError::synthetic(message));
    }

    let data = match data.map(serde_json::from_value::<T>).transpose() {
        Ok(data) => data,
        // Partial data next to errors may not fit the typed shape; the
        // errors are what the caller needs in that case.
        Err(source) if !errors.is_empty() => {
            warn!(%source, "dropping undecodable partial data");
            None
        }
        Err(source) => {
            error!(%source, body, "GitHub response data did not match the operation");
            return Err(ClientError::Decode {
                body: body.to_string(),
                source,
            });
        }
    };

    Ok(Response { data, errors })
}

/// A single GraphQL query or mutation with its typed `data` shape.
pub trait Operation: Send + Sync {
    /// Operation name, also used in logs.
    const NAME: &'static str;

    type Variables: Serialize + Send + Sync;
    type Data: DeserializeOwned + Send;

    fn document(&self) -> Cow<'static, str>;

    fn variables(&self) -> Self::Variables;
}

/// Builds the JSON POST body for an operation.
pub fn request_body<O: Operation>(operation: &O) -> Value {
    serde_json::json!({
        "query": operation.document(),
        "variables": operation.variables(),
    })
}

/// Labels fetched per repository. Deeper pages are never requested.
pub const LABEL_PAGE_SIZE: usize = 50;

/// Open pull requests fetched per repository. Deeper pages are never
/// requested.
pub const PULL_REQUEST_PAGE_SIZE: usize = 50;

const VIEWER_PULL_REQUESTS: &str = r#"
query ViewerPullRequests($after: String) {
    viewer {
        repositories(first: 50, after: $after, ownerAffiliations: [OWNER]) {
            pageInfo {
                endCursor
            }
            edges {
                node {
                    id
                    name
                    pullRequests(first: 50, states: [OPEN]) {
                        edges {
                            node {
                                id
                                title
                                author {
                                    login
                                }
                                labels(first: 20) {
                                    nodes {
                                        name
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}
"#;

/// One page of the viewer's repositories with their open pull requests.
#[derive(Debug, Clone, Default)]
pub struct ViewerPullRequests {
    pub after: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AfterCursor {
    pub after: Option<String>,
}

impl Operation for ViewerPullRequests {
    const NAME: &'static str = "ViewerPullRequests";

    type Variables = AfterCursor;
    type Data = ViewerData;

    fn document(&self) -> Cow<'static, str> {
        Cow::Borrowed(VIEWER_PULL_REQUESTS)
    }

    fn variables(&self) -> AfterCursor {
        AfterCursor {
            after: self.after.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ViewerData {
    pub viewer: Viewer,
}

#[derive(Debug, Deserialize)]
pub struct Viewer {
    pub repositories: RepositoryConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryConnection {
    pub page_info: PageInfo,
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub edges: Vec<Option<RepositoryEdge>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RepositoryEdge {
    pub node: Option<RepositoryNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryNode {
    pub id: String,
    pub name: String,
    pub pull_requests: PullRequestConnection,
}

#[derive(Debug, Deserialize)]
pub struct PullRequestConnection {
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub edges: Vec<Option<PullRequestEdge>>,
}

#[derive(Debug, Deserialize)]
pub struct PullRequestEdge {
    pub node: Option<PullRequestNode>,
}

#[derive(Debug, Deserialize)]
pub struct PullRequestNode {
    pub id: String,
    pub title: String,
    pub author: Option<Actor>,
    pub labels: Option<LabelNameConnection>,
}

#[derive(Debug, Deserialize)]
pub struct Actor {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub struct LabelNameConnection {
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub nodes: Vec<Option<LabelName>>,
}

#[derive(Debug, Deserialize)]
pub struct LabelName {
    pub name: String,
}

/// Merges pull requests, one `mergePullRequest` field per id aliased
/// `merge_<index>`, so any number of merges fit in a single request.
#[derive(Debug, Clone)]
pub struct MergePullRequests {
    pub ids: Vec<String>,
}

impl MergePullRequests {
    pub fn new(ids: Vec<String>) -> Self {
        Self { ids }
    }

    pub fn single(id: impl Into<String>) -> Self {
        Self { ids: vec![id.into()] }
    }

    pub fn alias(index: usize) -> String {
        format!("merge_{index}")
    }

    /// Inverse of [`Self::alias`].
    pub fn index_of_alias(alias: &str) -> Option<usize> {
        alias.strip_prefix("merge_")?.parse().ok()
    }
}

impl Operation for MergePullRequests {
    const NAME: &'static str = "MergePullRequests";

    type Variables = BTreeMap<String, String>;
    type Data = BTreeMap<String, Option<MergePayload>>;

    fn document(&self) -> Cow<'static, str> {
        let params = (0..self.ids.len())
            .map(|i| format!("$id{i}: ID!"))
            .collect::<Vec<_>>()
            .join(", ");

        let mut document = format!("mutation MergePullRequests({params}) {{\n");
        for i in 0..self.ids.len() {
            let _ = writeln!(
                document,
                "    {}: mergePullRequest(input: {{pullRequestId: $id{i}}}) {{ pullRequest {{ title }} }}",
                Self::alias(i)
            );
        }
        document.push('}');
        Cow::Owned(document)
    }

    fn variables(&self) -> BTreeMap<String, String> {
        self.ids
            .iter()
            .enumerate()
            .map(|(i, id)| (format!("id{i}"), id.clone()))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergePayload {
    pub pull_request: Option<MergedPullRequest>,
}

#[derive(Debug, Deserialize)]
pub struct MergedPullRequest {
    pub title: String,
}

const REPOSITORY_LABELS: &str = r#"
query RepositoryLabels($id: ID!) {
    node(id: $id) {
        ... on Repository {
            labels(first: 50) {
                nodes {
                    id
                    name
                }
            }
        }
    }
}
"#;

/// The first [`LABEL_PAGE_SIZE`] labels of a repository.
#[derive(Debug, Clone)]
pub struct RepositoryLabels {
    pub repository_id: String,
}

#[derive(Debug, Serialize)]
pub struct NodeId {
    pub id: String,
}

impl Operation for RepositoryLabels {
    const NAME: &'static str = "RepositoryLabels";

    type Variables = NodeId;
    type Data = RepositoryLabelsData;

    fn document(&self) -> Cow<'static, str> {
        Cow::Borrowed(REPOSITORY_LABELS)
    }

    fn variables(&self) -> NodeId {
        NodeId {
            id: self.repository_id.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RepositoryLabelsData {
    pub node: Option<LabelledRepository>,
}

#[derive(Debug, Deserialize)]
pub struct LabelledRepository {
    pub labels: Option<LabelConnection>,
}

#[derive(Debug, Deserialize)]
pub struct LabelConnection {
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub nodes: Vec<Option<Label>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
}

const ADD_LABELS: &str = r#"
mutation AddLabels($labelableId: ID!, $labelIds: [ID!]!) {
    addLabelsToLabelable(input: {labelableId: $labelableId, labelIds: $labelIds}) {
        clientMutationId
    }
}
"#;

/// Attaches labels (by id) to an issue or pull request.
#[derive(Debug, Clone)]
pub struct AddLabels {
    pub labelable_id: String,
    pub label_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLabelsVariables {
    pub labelable_id: String,
    pub label_ids: Vec<String>,
}

impl Operation for AddLabels {
    const NAME: &'static str = "AddLabels";

    type Variables = AddLabelsVariables;
    type Data = AddLabelsData;

    fn document(&self) -> Cow<'static, str> {
        Cow::Borrowed(ADD_LABELS)
    }

    fn variables(&self) -> AddLabelsVariables {
        AddLabelsVariables {
            labelable_id: self.labelable_id.clone(),
            label_ids: self.label_ids.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLabelsData {
    pub add_labels_to_labelable: Option<AddLabelsPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLabelsPayload {
    pub client_mutation_id: Option<String>,
}
