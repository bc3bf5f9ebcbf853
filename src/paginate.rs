//! Cursor-driven walk over the viewer's repositories and their open pull
//! requests.

use futures::{Stream, TryStreamExt, stream};
use tracing::{debug, warn};

use crate::{
    error::FetchError,
    github::Forge,
    graphql::{PULL_REQUEST_PAGE_SIZE, RepositoryEdge, Response, ViewerPullRequests},
    types::PullRequestRecord,
};

/// The records of one page and the cursor to continue from.
#[derive(Debug)]
pub struct Page {
    pub records: Vec<PullRequestRecord>,
    pub end_cursor: Option<String>,
}

/// Fetches a single page starting after `after`.
pub async fn fetch_page<F: Forge>(forge: &F, after: Option<String>) -> Result<Page, FetchError> {
    let response = forge
        .execute(&ViewerPullRequests {
            after: after.clone(),
        })
        .await?;

    let Response { data, errors } = response;
    let Some(data) = data else {
        return Err(FetchError::Api(errors));
    };

    if !errors.is_empty() {
        let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
        warn!(
            cursor = ?after,
            ?messages,
            "page fetched with errors, using partial data"
        );
    }

    let connection = data.viewer.repositories;
    let records = flatten_repositories(connection.edges);
    let end_cursor = connection
        .page_info
        .end_cursor
        .filter(|cursor| !cursor.is_empty());

    debug!(cursor = ?after, next = ?end_cursor, records = records.len(), "fetched page");

    Ok(Page {
        records,
        end_cursor,
    })
}

/// Deleted or inaccessible repositories come back as null nodes; they are
/// skipped rather than failing the page.
fn flatten_repositories(edges: Vec<Option<RepositoryEdge>>) -> Vec<PullRequestRecord> {
    edges
        .into_iter()
        .flatten()
        .filter_map(|edge| edge.node)
        .flat_map(|repository| {
            let repository_name = repository.name;
            let repository_id = repository.id;
            let edges = repository.pull_requests.edges;
            if edges.len() >= PULL_REQUEST_PAGE_SIZE {
                debug!(
                    repository = %repository_name,
                    "repository may have more open pull requests than were fetched"
                );
            }
            edges
                .into_iter()
                .flatten()
                .filter_map(|edge| edge.node)
                .map(move |pr| PullRequestRecord {
                    id: pr.id,
                    title: pr.title,
                    author_login: pr.author.map(|a| a.login).unwrap_or_default(),
                    repository: repository_name.clone(),
                    repository_id: repository_id.clone(),
                    labels: pr
                        .labels
                        .map(|labels| labels.nodes.into_iter().flatten().map(|l| l.name).collect())
                        .unwrap_or_default(),
                })
        })
        .collect()
}

/// Lazily yields every open pull request of the viewer's repositories.
///
/// Only a missing cursor ends the walk: a page without records but with a
/// cursor is followed. Each call starts again from the first page.
pub fn pull_requests<F: Forge>(
    forge: &F,
) -> impl Stream<Item = Result<PullRequestRecord, FetchError>> + Send + '_ {
    // `None` once the last page has been read, otherwise the cursor to
    // request next (itself `None` for the first page).
    stream::try_unfold(Some(None), move |state: Option<Option<String>>| async move {
        let Some(after) = state else {
            return Ok::<_, FetchError>(None);
        };
        let page = fetch_page(forge, after).await?;
        let records = stream::iter(page.records.into_iter().map(Ok::<_, FetchError>));
        Ok(Some((records, page.end_cursor.map(Some))))
    })
    .try_flatten()
}
