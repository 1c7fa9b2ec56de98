//! Process-lifetime state: pull requests, diffs and reviews.
//!
//! Nothing is persisted; a restart starts from an empty store.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;
use tracing::debug;

use crate::pr::{diff, PrError, PrId, PullRequest, PullRequestSource};

const SUMMARY_CHARS: usize = 100;
const RECENT_REVIEWS: usize = 5;

/// The pull request a review was run against.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ReviewedPr {
    Known(PullRequest),
    /// No PR record was stored for the id at review time.
    Unknown { title: String, number: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct Review {
    /// Number of reviews stored before this one. Reviews are never deleted,
    /// so ids are unique and increase with insertion order.
    pub id: usize,
    pub pr_id: String,
    pub pr: ReviewedPr,
    pub review: String,
    pub summary: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Metrics {
    /// Number of stored pull requests
    pub total: usize,
    /// Reviews mentioning "bug" or "issue" (case-insensitive)
    pub issues: usize,
    /// Most recent reviews, newest first
    pub recent: Vec<Review>,
}

/// First 100 characters of `text`, with an ellipsis if anything was cut.
pub fn summarize(text: &str) -> String {
    match text.char_indices().nth(SUMMARY_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn mentions_issue(review: &str) -> bool {
    let lower = review.to_lowercase();
    lower.contains("bug") || lower.contains("issue")
}

/// Shared relay state. Every method takes each lock once, so individual
/// operations are atomic; sequences of operations are not.
#[derive(Default)]
pub struct Store {
    pull_requests: RwLock<Vec<PullRequest>>,
    diffs: RwLock<HashMap<PrId, String>>,
    reviews: RwLock<VecDeque<Review>>,
}

fn upsert(prs: &mut Vec<PullRequest>, pr: PullRequest) {
    match prs.iter_mut().find(|existing| existing.id == pr.id) {
        Some(existing) => *existing = pr,
        None => prs.push(pr),
    }
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pull request, replacing any record with the same id in place.
    pub async fn upsert_pull_request(&self, pr: PullRequest) {
        let mut prs = self.pull_requests.write().await;
        upsert(&mut prs, pr);
    }

    /// Upsert a batch of freshly fetched pull requests and return the merged list.
    pub async fn merge_pull_requests(&self, fresh: Vec<PullRequest>) -> Vec<PullRequest> {
        let mut prs = self.pull_requests.write().await;
        for pr in fresh {
            upsert(&mut prs, pr);
        }
        prs.clone()
    }

    pub async fn pull_requests(&self) -> Vec<PullRequest> {
        self.pull_requests.read().await.clone()
    }

    pub async fn find_pull_request(&self, id: &PrId) -> Option<PullRequest> {
        let id = id.to_string();
        self.pull_requests
            .read()
            .await
            .iter()
            .find(|pr| pr.id == id)
            .cloned()
    }

    pub async fn diff(&self, id: &PrId) -> Option<String> {
        self.diffs.read().await.get(id).cloned()
    }

    /// Store a diff, overwriting any earlier one for the same pull request.
    pub async fn replace_diff(&self, id: PrId, diff: String) {
        self.diffs.write().await.insert(id, diff);
    }

    /// Return the cached diff, fetching and caching it on first use.
    ///
    /// A cached diff is never refreshed here. The lock is not held across the
    /// upstream call; if two callers race, the first stored diff wins.
    pub async fn diff_or_fetch(
        &self,
        id: &PrId,
        source: &dyn PullRequestSource,
    ) -> Result<String, PrError> {
        if let Some(cached) = self.diff(id).await {
            debug!(pr = %id, "serving cached diff");
            return Ok(cached);
        }

        let files = source.fetch_pull_files(id).await?;
        let fetched = diff::combine_patches(&files);
        debug!(pr = %id, files = files.len(), diff_bytes = fetched.len(), "caching diff");

        let mut diffs = self.diffs.write().await;
        Ok(diffs.entry(id.clone()).or_insert(fetched).clone())
    }

    /// Record a review for `id` at the head of the review list.
    pub async fn append_review(&self, id: &PrId, text: String) -> Review {
        let pr = match self.find_pull_request(id).await {
            Some(pr) => ReviewedPr::Known(pr),
            None => ReviewedPr::Unknown {
                title: id.to_string(),
                number: id.to_string(),
            },
        };

        let mut reviews = self.reviews.write().await;
        let review = Review {
            id: reviews.len(),
            pr_id: id.to_string(),
            pr,
            summary: summarize(&text),
            review: text,
            timestamp: Utc::now(),
        };
        reviews.push_front(review.clone());
        review
    }

    /// All reviews, newest first.
    pub async fn reviews(&self) -> Vec<Review> {
        self.reviews.read().await.iter().cloned().collect()
    }

    pub async fn metrics(&self) -> Metrics {
        let total = self.pull_requests.read().await.len();
        let reviews = self.reviews.read().await;
        Metrics {
            total,
            issues: reviews.iter().filter(|r| mentions_issue(&r.review)).count(),
            recent: reviews.iter().take(RECENT_REVIEWS).cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{pull_request, FakeSource};

    #[test]
    fn test_summarize_short_text() {
        assert_eq!(summarize("looks fine"), "looks fine");
        let exact = "a".repeat(100);
        assert_eq!(summarize(&exact), exact);
    }

    #[test]
    fn test_summarize_long_text() {
        let long = "b".repeat(150);
        let summary = summarize(&long);
        assert_eq!(summary, format!("{}...", "b".repeat(100)));
    }

    #[test]
    fn test_summarize_counts_characters() {
        let long = "é".repeat(101);
        assert_eq!(summarize(&long), format!("{}...", "é".repeat(100)));
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_id() {
        let store = Store::new();
        store.upsert_pull_request(pull_request("acme/widgets/1", "First")).await;
        store.upsert_pull_request(pull_request("acme/widgets/2", "Second")).await;
        store.upsert_pull_request(pull_request("acme/widgets/1", "First (edited)")).await;

        let prs = store.pull_requests().await;
        assert_eq!(prs.len(), 2);
        assert_eq!(prs[0].id, "acme/widgets/1");
        assert_eq!(prs[0].title, "First (edited)");
        assert_eq!(prs[1].title, "Second");
    }

    #[tokio::test]
    async fn test_merge_prefers_fresh_data() {
        let store = Store::new();
        store.upsert_pull_request(pull_request("acme/widgets/1", "Stale")).await;
        store.upsert_pull_request(pull_request("other/repo/9", "From webhook")).await;

        let merged = store
            .merge_pull_requests(vec![
                pull_request("acme/widgets/1", "Fresh"),
                pull_request("acme/widgets/3", "New"),
            ])
            .await;

        let titles: Vec<&str> = merged.iter().map(|pr| pr.title.as_str()).collect();
        assert_eq!(titles, vec!["Fresh", "From webhook", "New"]);
        assert_eq!(store.pull_requests().await.len(), 3);
    }

    #[tokio::test]
    async fn test_diff_is_fetched_once() {
        let store = Store::new();
        let source = FakeSource::with_patch("src/lib.rs", "+fn x() {}");
        let id = PrId::new("acme", "widgets", 42);

        let first = store.diff_or_fetch(&id, &source).await.unwrap();
        let second = store.diff_or_fetch(&id, &source).await.unwrap();

        assert_eq!(first, "--- src/lib.rs ---\n+fn x() {}");
        assert_eq!(first, second);
        assert_eq!(source.file_calls(), 1);
    }

    #[tokio::test]
    async fn test_cached_diff_is_not_refreshed() {
        let store = Store::new();
        let id = PrId::new("acme", "widgets", 42);
        store.replace_diff(id.clone(), "old".to_string()).await;

        let source = FakeSource::with_patch("src/lib.rs", "+changed upstream");
        assert_eq!(store.diff_or_fetch(&id, &source).await.unwrap(), "old");
        assert_eq!(source.file_calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_fetch_caches_nothing() {
        let store = Store::new();
        let source = FakeSource::unreachable();
        let id = PrId::new("acme", "widgets", 42);

        assert!(store.diff_or_fetch(&id, &source).await.is_err());
        assert!(store.diff(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_review_ids_and_order() {
        let store = Store::new();
        let id = PrId::new("acme", "widgets", 42);
        for text in ["first", "second", "third"] {
            store.append_review(&id, text.to_string()).await;
        }

        let reviews = store.reviews().await;
        let ids: Vec<usize> = reviews.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 1, 0]);
        assert_eq!(reviews[0].review, "third");
        assert!(reviews[0].timestamp >= reviews[2].timestamp);
    }

    #[tokio::test]
    async fn test_review_embeds_pr_snapshot() {
        let store = Store::new();
        store.upsert_pull_request(pull_request("acme/widgets/42", "Fix crash")).await;

        let known = store
            .append_review(&PrId::new("acme", "widgets", 42), "ok".to_string())
            .await;
        assert!(matches!(&known.pr, ReviewedPr::Known(pr) if pr.title == "Fix crash"));

        let unknown = store
            .append_review(&PrId::new("acme", "widgets", 7), "ok".to_string())
            .await;
        let json = serde_json::to_value(&unknown).unwrap();
        assert_eq!(json["pr"]["title"], "acme/widgets/7");
        assert_eq!(json["pr"]["number"], "acme/widgets/7");
        assert_eq!(json["pr_id"], "acme/widgets/7");
    }

    #[tokio::test]
    async fn test_metrics() {
        let store = Store::new();
        store.upsert_pull_request(pull_request("acme/widgets/1", "One")).await;
        let id = PrId::new("acme", "widgets", 1);
        store.append_review(&id, "Found a BUG in parser".to_string()).await;
        store.append_review(&id, "Looks clean".to_string()).await;
        store.append_review(&id, "One open Issue".to_string()).await;
        for _ in 0..4 {
            store.append_review(&id, "fine".to_string()).await;
        }

        let metrics = store.metrics().await;
        assert_eq!(metrics.total, 1);
        assert_eq!(metrics.issues, 2);
        assert_eq!(metrics.recent.len(), 5);
        assert_eq!(metrics.recent[0].id, 6);
    }
}
