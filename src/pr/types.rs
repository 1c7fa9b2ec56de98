use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::PrError;

/// A pull request record as exposed to the frontend.
///
/// Built either from a webhook payload or from the GitHub list-pulls endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// `owner/repo/number`
    pub id: String,
    pub number: u64,
    pub title: String,
    /// Author's GitHub login
    pub author: String,
    /// `owner/repo`
    pub repo: String,
    /// Upstream state ("open", "closed", ...)
    pub status: String,
    pub url: String,
}

/// Identity of a pull request: `owner/repo/number`.
///
/// Constructed once from a webhook payload or a request path and passed
/// around structured from then on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrId {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl PrId {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, number: u64) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            number,
        }
    }

    pub fn repo_ref(&self) -> RepoRef {
        RepoRef {
            owner: self.owner.clone(),
            repo: self.repo.clone(),
        }
    }
}

impl fmt::Display for PrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.owner, self.repo, self.number)
    }
}

impl FromStr for PrId {
    type Err = PrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = s.split('/').collect();
        let [owner, repo, number] = segments.as_slice() else {
            return Err(PrError::InvalidId(s.to_string()));
        };
        if owner.is_empty() || repo.is_empty() {
            return Err(PrError::InvalidId(s.to_string()));
        }
        let number = number
            .parse::<u64>()
            .map_err(|_| PrError::InvalidId(s.to_string()))?;
        Ok(PrId::new(*owner, *repo, number))
    }
}

/// A repository on GitHub: `owner/repo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}
