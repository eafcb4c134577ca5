//! Deduplicated issue tracking.

use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    models::{Issue, IssueCandidate, IssueFilter},
    LogtideError, LogtideResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Collapses issue candidates into deduplicated issues.
///
/// Identity is the normalized signature of container name and title. A
/// candidate whose signature already exists becomes a recurrence: the count
/// goes up, the freshest excerpt and description win, and a resolved issue
/// reopens.
#[derive(Debug, Default)]
pub struct IssueRegistry {
    issues: RwLock<HashMap<String, Issue>>,
}

/// Whether an ingested candidate opened a new issue or collapsed into an
/// existing one.
#[derive(Debug, Clone, PartialEq)]
pub enum Ingested {
    /// The first occurrence of this signature.
    Created(Issue),

    /// A recurrence of a known signature.
    Updated(Issue),
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl IssueRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingests one candidate, creating or updating the issue it maps to.
    pub async fn ingest(&self, candidate: IssueCandidate) -> Ingested {
        let signature = signature(&candidate.container_name, &candidate.title);
        let mut issues = self.issues.write().await;

        match issues.get_mut(&signature) {
            Some(issue) => {
                issue.occurrence_count += 1;
                issue.last_detected = candidate.detected_at;
                if candidate.severity > issue.severity {
                    issue.severity = candidate.severity;
                }
                if !candidate.description.is_empty() {
                    issue.description = candidate.description;
                }
                if !candidate.excerpt.is_empty() {
                    issue.excerpt = candidate.excerpt;
                }
                // A recurrence reopens a resolved issue.
                issue.resolved = false;

                Ingested::Updated(issue.clone())
            }
            None => {
                let issue = Issue {
                    id: Uuid::new_v4(),
                    container_id: candidate.container_id,
                    container_name: candidate.container_name,
                    severity: candidate.severity,
                    title: candidate.title,
                    description: candidate.description,
                    excerpt: candidate.excerpt,
                    first_detected: candidate.detected_at,
                    last_detected: candidate.detected_at,
                    occurrence_count: 1,
                    resolved: false,
                };
                issues.insert(signature, issue.clone());

                Ingested::Created(issue)
            }
        }
    }

    /// Lists issues matching a filter, most recently detected first.
    ///
    /// With no explicit `resolved` choice only unresolved issues are
    /// returned, which is the operator's default view.
    pub async fn list(&self, filter: &IssueFilter) -> Vec<Issue> {
        let issues = self.issues.read().await;

        let mut matched: Vec<Issue> = issues
            .values()
            .filter(|issue| match filter.resolved {
                Some(resolved) => issue.resolved == resolved,
                None => !issue.resolved,
            })
            .filter(|issue| match filter.severity_min {
                Some(min) => issue.severity >= min,
                None => true,
            })
            .filter(|issue| match &filter.container {
                Some(container) => &issue.container_name == container,
                None => true,
            })
            .filter(|issue| match filter.min_occurrences {
                Some(min) => issue.occurrence_count >= min,
                None => true,
            })
            .cloned()
            .collect();

        matched.sort_by(|a, b| b.last_detected.cmp(&a.last_detected));
        matched
    }

    /// Marks an issue resolved.
    pub async fn resolve(&self, id: Uuid) -> LogtideResult<Issue> {
        let mut issues = self.issues.write().await;

        let issue = issues
            .values_mut()
            .find(|issue| issue.id == id)
            .ok_or(LogtideError::IssueNotFound(id))?;

        issue.resolved = true;
        Ok(issue.clone())
    }

    /// Removes all issues and returns how many were dropped.
    pub async fn clear(&self) -> usize {
        let mut issues = self.issues.write().await;
        let dropped = issues.len();
        issues.clear();
        dropped
    }

    /// Returns how many issues are tracked, resolved ones included.
    pub async fn len(&self) -> usize {
        self.issues.read().await.len()
    }

    /// Returns whether the registry is empty.
    pub async fn is_empty(&self) -> bool {
        self.issues.read().await.is_empty()
    }
}

impl Ingested {
    /// Returns the issue regardless of whether it was created or updated.
    pub fn issue(&self) -> &Issue {
        match self {
            Ingested::Created(issue) => issue,
            Ingested::Updated(issue) => issue,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Computes the deduplication signature of a finding.
///
/// Titles are trimmed and lowercased so cosmetic variation in model output
/// does not fan recurrences out into separate issues.
pub fn signature(container_name: &str, title: &str) -> String {
    format!("{}:{}", container_name, title.trim().to_lowercase())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use crate::models::IssueSeverity;

    use super::*;

    fn candidate(container: &str, title: &str, second: u32) -> IssueCandidate {
        IssueCandidate {
            container_id: format!("{}-id", container),
            container_name: container.to_string(),
            severity: IssueSeverity::Error,
            title: title.to_string(),
            description: format!("description at {}", second),
            excerpt: format!("excerpt at {}", second),
            detected_at: Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, second).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_recurrences_collapse_into_one_issue() {
        let registry = IssueRegistry::new();

        for second in 0..5 {
            registry.ingest(candidate("web", "DB down", second)).await;
        }

        let issues = registry.list(&IssueFilter::default()).await;
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].occurrence_count, 5);
        assert_eq!(issues[0].first_detected.timestamp() % 60, 0);
        assert_eq!(issues[0].last_detected.timestamp() % 60, 4);
        // The freshest excerpt and description win.
        assert_eq!(issues[0].excerpt, "excerpt at 4");
        assert_eq!(issues[0].description, "description at 4");
    }

    #[tokio::test]
    async fn test_signature_normalizes_title_but_not_container() {
        let registry = IssueRegistry::new();

        registry.ingest(candidate("web", "DB down", 0)).await;
        registry.ingest(candidate("web", "  db DOWN ", 1)).await;
        registry.ingest(candidate("worker", "DB down", 2)).await;

        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_severity_is_raised_never_lowered() {
        let registry = IssueRegistry::new();

        let mut low = candidate("web", "flaky", 0);
        low.severity = IssueSeverity::Warning;
        registry.ingest(low).await;

        let mut high = candidate("web", "flaky", 1);
        high.severity = IssueSeverity::Critical;
        let ingested = registry.ingest(high).await;
        assert_eq!(ingested.issue().severity, IssueSeverity::Critical);

        let mut low_again = candidate("web", "flaky", 2);
        low_again.severity = IssueSeverity::Info;
        let ingested = registry.ingest(low_again).await;
        assert_eq!(ingested.issue().severity, IssueSeverity::Critical);
    }

    #[tokio::test]
    async fn test_recurrence_reopens_resolved_issue() -> anyhow::Result<()> {
        let registry = IssueRegistry::new();

        let ingested = registry.ingest(candidate("web", "DB down", 0)).await;
        let id = ingested.issue().id;

        registry.resolve(id).await?;
        assert!(registry.list(&IssueFilter::default()).await.is_empty());

        registry.ingest(candidate("web", "DB down", 1)).await;
        let issues = registry.list(&IssueFilter::default()).await;
        assert_eq!(issues.len(), 1);
        assert!(!issues[0].resolved);
        assert_eq!(issues[0].occurrence_count, 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_list_filters_and_orders_by_recency() {
        let registry = IssueRegistry::new();

        registry.ingest(candidate("web", "older", 0)).await;
        registry.ingest(candidate("web", "newer", 10)).await;
        let mut warning = candidate("worker", "mild", 5);
        warning.severity = IssueSeverity::Warning;
        registry.ingest(warning).await;

        let all = registry.list(&IssueFilter::default()).await;
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].title, "newer");
        assert_eq!(all[2].title, "older");

        let severe = registry
            .list(&IssueFilter {
                severity_min: Some(IssueSeverity::Error),
                ..Default::default()
            })
            .await;
        assert_eq!(severe.len(), 2);

        let for_worker = registry
            .list(&IssueFilter {
                container: Some("worker".to_string()),
                ..Default::default()
            })
            .await;
        assert_eq!(for_worker.len(), 1);
        assert_eq!(for_worker[0].title, "mild");

        let repeat_offenders = registry
            .list(&IssueFilter {
                min_occurrences: Some(2),
                ..Default::default()
            })
            .await;
        assert!(repeat_offenders.is_empty());
    }

    #[tokio::test]
    async fn test_list_can_show_resolved_issues() -> anyhow::Result<()> {
        let registry = IssueRegistry::new();

        let ingested = registry.ingest(candidate("web", "DB down", 0)).await;
        registry.resolve(ingested.issue().id).await?;

        let resolved = registry
            .list(&IssueFilter {
                resolved: Some(true),
                ..Default::default()
            })
            .await;
        assert_eq!(resolved.len(), 1);
        assert!(resolved[0].resolved);

        Ok(())
    }

    #[tokio::test]
    async fn test_resolve_unknown_id_fails() {
        let registry = IssueRegistry::new();

        let missing = Uuid::new_v4();
        let error = registry.resolve(missing).await.unwrap_err();
        assert!(matches!(error, LogtideError::IssueNotFound(id) if id == missing));
    }

    #[tokio::test]
    async fn test_clear_empties_the_registry() {
        let registry = IssueRegistry::new();

        registry.ingest(candidate("web", "a", 0)).await;
        registry.ingest(candidate("web", "b", 1)).await;

        assert_eq!(registry.clear().await, 2);
        assert!(registry.is_empty().await);
        assert_eq!(registry.clear().await, 0);
    }
}
