//! Pull-request webhook payloads and the checks applied before a job runs.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::warn;

use crate::config::ServerConfig;

const ACCEPTED_ACTIONS: &[&str] = &["opened", "synchronize"];
const IGNORE_TAG: &str = "[mdb ignore]";
const IGNORE_EXCEPT_MAPS_TAG: &str = "[mdb ignore]dmm";

#[derive(Clone, Debug, Deserialize)]
pub struct PullRequestEvent {
    pub action: String,
    pub pull_request: Option<PullRequest>,
    pub repository: Option<Repository>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PullRequest {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    pub head: GitRef,
    pub base: GitRef,
}

#[derive(Clone, Debug, Deserialize)]
pub struct GitRef {
    pub sha: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Repository {
    pub name: String,
    pub full_name: String,
    pub owner: Owner,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Owner {
    pub login: String,
}

/// Everything a diff job needs to know about one pull-request revision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiffRequest {
    pub owner: String,
    pub repo: String,
    pub full_name: String,
    pub pull_request_id: u64,
    pub title: String,
    pub base_sha: String,
    pub head_sha: String,
}

impl DiffRequest {
    /// Identifier unique to this pull request and revision pair, safe for
    /// use in file names.
    pub fn unique_id(&self) -> String {
        sanitize(&format!(
            "{}-{}-{}-{}",
            self.full_name, self.pull_request_id, self.base_sha, self.head_sha
        ))
    }

    /// The title opts out of map diffs.
    pub fn is_ignored(&self) -> bool {
        let title = self.title.to_lowercase();
        title.contains(IGNORE_TAG) && !title.contains(IGNORE_EXCEPT_MAPS_TAG)
    }
}

/// Replace every character that is not a word character with `-`.
pub fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '-' })
        .collect()
}

/// Why a webhook delivery was turned away.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
    InvalidSignature,
    InvalidSchema,
    MissingRepository,
    BannedRepository,
    BannedUser,
}

impl Rejection {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BannedRepository | Self::BannedUser => StatusCode::FORBIDDEN,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::InvalidSignature => "invalid signature",
            Self::InvalidSchema => "invalid action/schema",
            Self::MissingRepository => "missing owner/repo",
            Self::BannedRepository => "banned repository",
            Self::BannedUser => "banned user",
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        (self.status(), self.message()).into_response()
    }
}

/// Parse a delivery body and apply the action, schema and ban filters.
pub fn accept_event(config: &ServerConfig, body: &[u8]) -> Result<DiffRequest, Rejection> {
    let event: PullRequestEvent = serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, "unparseable webhook payload");
        Rejection::InvalidSchema
    })?;

    let (Some(pull_request), Some(repository)) = (event.pull_request, event.repository) else {
        warn!(action = %event.action, "webhook payload is not a pull request event");
        return Err(Rejection::InvalidSchema);
    };
    if !ACCEPTED_ACTIONS.contains(&event.action.as_str()) {
        warn!(action = %event.action, "ignoring pull request action");
        return Err(Rejection::InvalidSchema);
    }

    let owner = repository.owner.login;
    if owner.is_empty() || repository.name.is_empty() {
        warn!(owner = %owner, repo = %repository.name, "missing owner or repository name");
        return Err(Rejection::MissingRepository);
    }
    if config.is_banned_repo(&repository.full_name) {
        warn!(repo = %repository.full_name, "request from banned repository");
        return Err(Rejection::BannedRepository);
    }
    if config.is_banned_user(&owner) {
        warn!(repo = %repository.full_name, "request from banned user");
        return Err(Rejection::BannedUser);
    }

    Ok(DiffRequest {
        owner,
        repo: repository.name,
        full_name: repository.full_name,
        pull_request_id: pull_request.id,
        title: pull_request.title,
        base_sha: pull_request.base.sha,
        head_sha: pull_request.head.sha,
    })
}

#[cfg(test)]
pub(crate) fn sample_payload(action: &str, full_name: &str, title: &str) -> Vec<u8> {
    let (owner, name) = full_name.split_once('/').unwrap_or(("", full_name));
    serde_json::json!({
        "action": action,
        "pull_request": {
            "id": 1234,
            "title": title,
            "head": { "sha": "headsha" },
            "base": { "sha": "basesha" },
        },
        "repository": {
            "name": name,
            "full_name": full_name,
            "owner": { "login": owner },
        },
    })
    .to_string()
    .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_opened_and_synchronize() {
        let config = ServerConfig::default();
        for action in ["opened", "synchronize"] {
            let request = accept_event(&config, &sample_payload(action, "org/station", "Fix")).unwrap();
            assert_eq!(request.full_name, "org/station");
            assert_eq!(request.owner, "org");
            assert_eq!(request.base_sha, "basesha");
            assert_eq!(request.head_sha, "headsha");
        }
    }

    #[test]
    fn rejects_other_actions_and_schemas() {
        let config = ServerConfig::default();
        assert_eq!(
            accept_event(&config, &sample_payload("closed", "org/station", "x")),
            Err(Rejection::InvalidSchema)
        );
        assert_eq!(
            accept_event(&config, br#"{"action": "opened"}"#),
            Err(Rejection::InvalidSchema)
        );
        assert_eq!(accept_event(&config, b"not json"), Err(Rejection::InvalidSchema));
        assert_eq!(
            accept_event(&config, &sample_payload("opened", "station", "x")),
            Err(Rejection::MissingRepository)
        );
    }

    #[test]
    fn bans() {
        let config = ServerConfig {
            banned_repos: vec!["org/forked".into()],
            banned_users: vec!["spammer".into()],
            ..ServerConfig::default()
        };
        let repo = accept_event(&config, &sample_payload("opened", "org/forked", "x"));
        assert_eq!(repo, Err(Rejection::BannedRepository));
        assert_eq!(repo.unwrap_err().status(), StatusCode::FORBIDDEN);
        assert_eq!(
            accept_event(&config, &sample_payload("opened", "spammer/station", "x")),
            Err(Rejection::BannedUser)
        );
    }

    #[test]
    fn unique_id_is_file_safe() {
        let config = ServerConfig::default();
        let request = accept_event(&config, &sample_payload("opened", "org/my.station", "x")).unwrap();
        assert_eq!(request.unique_id(), "org-my-station-1234-basesha-headsha");
    }

    #[test]
    fn ignore_tag() {
        let config = ServerConfig::default();
        let ignored = |title: &str| {
            accept_event(&config, &sample_payload("opened", "org/station", title))
                .unwrap()
                .is_ignored()
        };
        assert!(ignored("[MDB IGNORE] refactor"));
        assert!(!ignored("[MDB IGNORE]DMM refactor"));
        assert!(!ignored("Add a map"));
    }
}
