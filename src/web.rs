//! HTTP surface: the grouped view as JSON and a form-driven bulk merge.

use std::{
    collections::BTreeMap,
    net::SocketAddr,
    sync::{Arc, Mutex, PoisonError},
};

use anyhow::Context;
use axum::{
    Form, Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::{
    bulk::{self, BatchReport, MergeAction},
    github::Forge,
    group::{AutomationIdentities, GroupKeyStrategy},
    types::{Identity, Subject},
    workflow::fetch_groups,
};

/// Shared by every request.
pub struct AppState<F> {
    forge: Arc<F>,
    strategy: GroupKeyStrategy,
    identities: AutomationIdentities,
    flashes: Mutex<Vec<String>>,
}

impl<F> AppState<F> {
    pub fn new(
        forge: Arc<F>,
        strategy: GroupKeyStrategy,
        identities: AutomationIdentities,
    ) -> Self {
        Self {
            forge,
            strategy,
            identities,
            flashes: Mutex::new(Vec::new()),
        }
    }

    /// Queues messages for the next `GET /`.
    pub fn flash<I>(&self, messages: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.flashes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(messages);
    }

    /// Takes every pending message.
    pub fn take_flashes(&self) -> Vec<String> {
        std::mem::take(&mut *self.flashes.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// A pull request as posted back by the front-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedPullRequest {
    pub repo: String,
    pub id: String,
}

/// One pull request of a submitted form, labelled with the group it was
/// submitted under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSelection {
    pub pr_name: String,
    pub repo: String,
    pub id: String,
}

impl Subject for WebSelection {
    fn node_id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.pr_name
    }

    fn repository(&self) -> &str {
        &self.repo
    }
}

#[derive(Debug, Serialize)]
pub struct IndexView {
    pub user: Identity,
    pub messages: Vec<String>,
    pub by_title: BTreeMap<String, Vec<SelectedPullRequest>>,
}

/// Upstream failures surface as `502 Bad Gateway`.
#[derive(Debug)]
pub struct WebError(anyhow::Error);

impl From<anyhow::Error> for WebError {
    fn from(error: anyhow::Error) -> Self {
        Self(error)
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        warn!(error = %format!("{:#}", self.0), "request failed");
        (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": format!("{:#}", self.0) })),
        )
            .into_response()
    }
}

/// Parses submitted form fields, each a group name mapped to a JSON array
/// of `{repo, id}`. Fields that do not parse are returned as messages.
pub fn parse_selection(fields: Vec<(String, String)>) -> (Vec<WebSelection>, Vec<String>) {
    let mut selected = Vec::new();
    let mut problems = Vec::new();

    for (pr_name, value) in fields {
        match serde_json::from_str::<Vec<SelectedPullRequest>>(&value) {
            Ok(prs) => selected.extend(prs.into_iter().map(|pr| WebSelection {
                pr_name: pr_name.clone(),
                repo: pr.repo,
                id: pr.id,
            })),
            Err(e) => {
                warn!(field = %pr_name, error = %e, "ignoring unreadable form field");
                problems.push(format!("Could not read selection \"{pr_name}\": {e}"));
            }
        }
    }

    (selected, problems)
}

async fn index<F: Forge + 'static>(
    State(state): State<Arc<AppState<F>>>,
) -> Result<Json<IndexView>, WebError> {
    let user = state
        .forge
        .current_user()
        .await
        .context("Failed to look up the current user")?;
    info!(login = %user.login, "serving grouped pull requests");

    let groups = fetch_groups(&*state.forge, state.strategy, &state.identities, &()).await?;
    let by_title = groups
        .into_iter()
        .map(|group| {
            let prs = group
                .records
                .into_iter()
                .map(|record| SelectedPullRequest {
                    repo: record.repository,
                    id: record.id,
                })
                .collect();
            (group.key, prs)
        })
        .collect();

    Ok(Json(IndexView {
        user,
        messages: state.take_flashes(),
        by_title,
    }))
}

async fn merge<F: Forge + 'static>(
    State(state): State<Arc<AppState<F>>>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Redirect {
    let (selected, problems) = parse_selection(fields);

    let results = bulk::execute(selected, &MergeAction::new(&*state.forge)).await;
    let report = BatchReport::from_results(&results).with_problems(problems);
    state.flash(report.messages);

    Redirect::to("/")
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

pub fn build_router<F: Forge + 'static>(state: Arc<AppState<F>>) -> Router {
    Router::new()
        .route("/", get(index::<F>).post(merge::<F>))
        .route("/health", get(health))
        .with_state(state)
}

/// Serves the router on `addr` until the process is stopped.
pub async fn serve<F: Forge + 'static>(
    state: Arc<AppState<F>>,
    addr: SocketAddr,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "web interface listening");
    axum::serve(listener, build_router(state))
        .await
        .context("Web server stopped unexpectedly")
}
