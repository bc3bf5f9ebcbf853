#![allow(dead_code)]

use std::{collections::VecDeque, sync::Mutex};

use anyhow::Result;
use async_trait::async_trait;
use mass_merge::{
    ClientError, Forge, GroupChoice, Identity, Selector,
    graphql::{Operation, Response, decode_envelope},
};
use serde_json::{Value, json};

type Responder = Box<dyn Fn(&str, &Value) -> Value + Send + Sync>;

/// A request as seen by [`MockForge`].
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub operation: String,
    pub variables: Value,
}

/// Forge whose responses come from a closure over the operation name and
/// its variables. Every request is recorded.
pub struct MockForge {
    responder: Responder,
    requests: Mutex<Vec<Recorded>>,
    identity: Option<Identity>,
    suspends: bool,
}

impl MockForge {
    pub fn new<R>(responder: R) -> Self
    where
        R: Fn(&str, &Value) -> Value + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
            identity: Some(Identity {
                login: "Mause".to_string(),
                email: Some("me@mause.me".to_string()),
            }),
            suspends: false,
        }
    }

    /// Yields to the runtime between recording a request and answering it,
    /// so concurrent callers interleave the way they do over the network.
    pub fn suspending(mut self) -> Self {
        self.suspends = true;
        self
    }

    pub fn without_identity(mut self) -> Self {
        self.identity = None;
        self
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    /// Variables of every request of the named operation, in order.
    pub fn requests_for(&self, operation: &str) -> Vec<Value> {
        self.requests()
            .into_iter()
            .filter(|r| r.operation == operation)
            .map(|r| r.variables)
            .collect()
    }
}

#[async_trait]
impl Forge for MockForge {
    async fn execute<O>(&self, operation: &O) -> Result<Response<O::Data>, ClientError>
    where
        O: Operation,
    {
        let variables = serde_json::to_value(operation.variables()).unwrap();
        self.requests.lock().unwrap().push(Recorded {
            operation: O::NAME.to_string(),
            variables: variables.clone(),
        });
        if self.suspends {
            tokio::task::yield_now().await;
        }
        let body = (self.responder)(O::NAME, &variables);
        decode_envelope(&body.to_string())
    }

    async fn current_user(&self) -> Result<Identity, ClientError> {
        self.identity
            .clone()
            .ok_or_else(|| ClientError::Setup("no identity configured".to_string()))
    }
}

pub fn pull_request(id: &str, title: &str, author: &str, labels: &[&str]) -> Value {
    json!({
        "id": id,
        "title": title,
        "author": { "login": author },
        "labels": { "nodes": labels.iter().map(|name| json!({ "name": name })).collect::<Vec<_>>() },
    })
}

pub fn repository(id: &str, name: &str, pull_requests: Vec<Value>) -> Value {
    json!({
        "id": id,
        "name": name,
        "pullRequests": {
            "edges": pull_requests.into_iter().map(|node| json!({ "node": node })).collect::<Vec<_>>(),
        },
    })
}

/// A `ViewerPullRequests` envelope. A `Value::Null` repository becomes a
/// null node.
pub fn viewer_page(repositories: Vec<Value>, end_cursor: Option<&str>) -> Value {
    json!({
        "data": {
            "viewer": {
                "repositories": {
                    "pageInfo": { "endCursor": end_cursor },
                    "edges": repositories.into_iter().map(|node| json!({ "node": node })).collect::<Vec<_>>(),
                },
            },
        },
    })
}

/// A successful `MergePullRequests` envelope for whatever ids were sent.
pub fn merged(variables: &Value) -> Value {
    let data: serde_json::Map<String, Value> = variables
        .as_object()
        .map(|ids| {
            ids.keys()
                .map(|key| {
                    let index = key.trim_start_matches("id");
                    (
                        format!("merge_{index}"),
                        json!({ "pullRequest": { "title": "merged" } }),
                    )
                })
                .collect()
        })
        .unwrap_or_default();
    json!({ "data": data })
}

/// A `RepositoryLabels` envelope from `(id, name)` pairs.
pub fn labels_page(labels: &[(&str, &str)]) -> Value {
    json!({
        "data": {
            "node": {
                "labels": {
                    "nodes": labels.iter().map(|(id, name)| json!({ "id": id, "name": name })).collect::<Vec<_>>(),
                },
            },
        },
    })
}

pub fn label_added() -> Value {
    json!({ "data": { "addLabelsToLabelable": { "clientMutationId": null } } })
}

pub fn api_error(message: &str, path: &[&str]) -> Value {
    json!({
        "data": null,
        "errors": [{ "message": message, "locations": [], "path": path }],
    })
}

/// Replays scripted answers and records what it was asked.
#[derive(Default)]
pub struct ScriptedSelector {
    choices: VecDeque<Vec<String>>,
    confirms: VecDeque<bool>,
    pub offered: Vec<Vec<GroupChoice>>,
    pub prompts: Vec<String>,
}

impl ScriptedSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn choose(mut self, keys: &[&str]) -> Self {
        self.choices
            .push_back(keys.iter().map(|key| key.to_string()).collect());
        self
    }

    pub fn answer(mut self, yes: bool) -> Self {
        self.confirms.push_back(yes);
        self
    }
}

impl Selector for ScriptedSelector {
    fn choose_groups(&mut self, choices: &[GroupChoice]) -> Result<Vec<String>> {
        self.offered.push(choices.to_vec());
        Ok(self.choices.pop_front().unwrap_or_default())
    }

    fn confirm(&mut self, prompt: &str, _default: bool) -> Result<bool> {
        self.prompts.push(prompt.to_string());
        self.confirms
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("unexpected prompt: {prompt}"))
    }
}
