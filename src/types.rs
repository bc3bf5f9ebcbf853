use serde::{Deserialize, Serialize};

/// An open pull request as fetched from the viewer's repositories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequestRecord {
    /// GraphQL node id, used by every mutation.
    pub id: String,
    pub title: String,
    pub author_login: String,
    /// Repository name (without owner).
    pub repository: String,
    /// Repository node id, needed to resolve label ids.
    pub repository_id: String,
    pub labels: Vec<String>,
}

/// Anything a bulk action can target and report on.
pub trait Subject {
    fn node_id(&self) -> &str;

    /// Name used when reporting on this subject.
    fn title(&self) -> &str;

    fn repository(&self) -> &str;
}

impl Subject for PullRequestRecord {
    fn node_id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn repository(&self) -> &str {
        &self.repository
    }
}

/// The authenticated user, from the REST `GET /user` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub login: String,
    #[serde(default)]
    pub email: Option<String>,
}
