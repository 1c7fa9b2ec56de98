//! In-process fakes for the upstream collaborators.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::pr::{PrError, PrId, PullFile, PullRequest, PullRequestSource, RepoRef};
use crate::review::{ReviewError, Reviewer};

/// Helper to create a PullRequest record for an `owner/repo/number` id.
pub fn pull_request(id: &str, title: &str) -> PullRequest {
    let parsed: PrId = id.parse().unwrap();
    PullRequest {
        id: id.to_string(),
        number: parsed.number,
        title: title.to_string(),
        author: "testuser".to_string(),
        repo: parsed.repo_ref().to_string(),
        status: "open".to_string(),
        url: format!(
            "https://github.com/{}/{}/pull/{}",
            parsed.owner, parsed.repo, parsed.number
        ),
    }
}

/// A PullRequestSource that serves fixed data, or fails every call when
/// `files` is None. Counts upstream calls.
pub struct FakeSource {
    pub open: Vec<PullRequest>,
    pub files: Option<Vec<PullFile>>,
    list_calls: AtomicUsize,
    file_calls: AtomicUsize,
}

impl FakeSource {
    pub fn new(open: Vec<PullRequest>, files: Vec<PullFile>) -> Self {
        Self {
            open,
            files: Some(files),
            list_calls: AtomicUsize::new(0),
            file_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_patch(filename: &str, patch: &str) -> Self {
        Self::new(
            Vec::new(),
            vec![PullFile {
                filename: filename.to_string(),
                patch: Some(patch.to_string()),
            }],
        )
    }

    pub fn unreachable() -> Self {
        Self {
            files: None,
            ..Self::new(Vec::new(), Vec::new())
        }
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn file_calls(&self) -> usize {
        self.file_calls.load(Ordering::SeqCst)
    }
}

/// An error of the same type a real transport failure produces.
fn transport_error() -> PrError {
    // Building a request with an invalid URL yields a reqwest::Error without I/O.
    let err = reqwest::Client::new()
        .get("http://[::1")
        .build()
        .unwrap_err();
    PrError::ApiRequest(err)
}

#[async_trait]
impl PullRequestSource for FakeSource {
    async fn list_open_pull_requests(&self, _repo: &RepoRef) -> Result<Vec<PullRequest>, PrError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        match self.files {
            Some(_) => Ok(self.open.clone()),
            None => Err(transport_error()),
        }
    }

    async fn fetch_pull_files(&self, _id: &PrId) -> Result<Vec<PullFile>, PrError> {
        self.file_calls.fetch_add(1, Ordering::SeqCst);
        self.files.clone().ok_or_else(transport_error)
    }
}

/// A Reviewer that returns a fixed text, or fails with an API error when `text` is None.
pub struct FakeReviewer {
    pub text: Option<String>,
}

impl FakeReviewer {
    pub fn replying(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
        }
    }

    pub fn failing() -> Self {
        Self { text: None }
    }
}

#[async_trait]
impl Reviewer for FakeReviewer {
    async fn review_diff(&self, _diff: &str) -> Result<String, ReviewError> {
        self.text.clone().ok_or(ReviewError::Api {
            status: 429,
            body: "rate limited".to_string(),
        })
    }
}
