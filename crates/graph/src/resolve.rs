//! Entity resolution / upsert layer
//!
//! Maps external paper identity (url) onto durable Paper rows and produces
//! the ephemeral-node-id -> durable-paper-id mapping used by every later
//! persistence step in the same call.
//!
//! Upserts for distinct urls run concurrently; payloads sharing a url within
//! one call are serialized through their group to avoid racing
//! duplicate-creation.

use crate::types::PaperPayload;
use citegraph_common::db::models::Paper;
use citegraph_common::db::Repository;
use citegraph_common::errors::Result;
use citegraph_common::metrics;
use futures::future::try_join_all;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// Outcome of resolving one batch of paper payloads
#[derive(Debug, Default)]
pub struct ResolveOutcome {
    /// The durable papers, one per distinct url, in first-seen order
    pub papers: Vec<Paper>,

    /// Ephemeral id (and url) -> durable paper id. Total over every id a
    /// payload was known by.
    pub mapping: HashMap<String, Uuid>,

    pub created: usize,
    pub updated: usize,
}

/// Upsert every payload, last-write-wins per url, and record the id mapping.
pub async fn upsert_papers(repo: &Repository, payloads: &[PaperPayload]) -> Result<ResolveOutcome> {
    let groups = group_by_url(payloads);

    // Distinct urls are independent and upsert concurrently; a failure in
    // any group aborts the whole call (structural prerequisite).
    let results = try_join_all(
        groups
            .iter()
            .map(|(_, group)| upsert_url_group(repo, group)),
    )
    .await?;

    let mut outcome = ResolveOutcome::default();

    for (paper, created) in results {
        metrics::record_paper_upserted(created);
        if created {
            outcome.created += 1;
        } else {
            outcome.updated += 1;
        }

        outcome.mapping.insert(paper.url.clone(), paper.id);
        outcome.papers.push(paper);
    }

    // Client-supplied ids map to the same durable id as their url
    for payload in payloads {
        if let Some(&durable_id) = outcome.mapping.get(&payload.url) {
            outcome
                .mapping
                .insert(payload.node_id().to_string(), durable_id);
        }
    }

    debug!(
        papers = outcome.papers.len(),
        created = outcome.created,
        updated = outcome.updated,
        "Papers resolved"
    );

    Ok(outcome)
}

/// Group payloads by url, preserving first-seen order. Serializing each
/// group is what keys the resolver per-url within a single call.
fn group_by_url(payloads: &[PaperPayload]) -> Vec<(String, Vec<&PaperPayload>)> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<&PaperPayload>> = HashMap::new();

    for payload in payloads {
        let group = groups.entry(payload.url.clone()).or_default();
        if group.is_empty() {
            order.push(payload.url.clone());
        }
        group.push(payload);
    }

    order
        .into_iter()
        .map(|url| {
            let group = groups.remove(&url).unwrap_or_default();
            (url, group)
        })
        .collect()
}

/// Apply one url's payloads in order: create-or-update for the first, then
/// overwrite with each subsequent payload (last-write-wins, no field merge).
async fn upsert_url_group(repo: &Repository, group: &[&PaperPayload]) -> Result<(Paper, bool)> {
    let first = group[0];

    let existing = repo.find_paper_by_url(&first.url).await?;
    let (mut paper, created) = match existing {
        Some(found) => (repo.update_paper(found.id, &first.to_write()).await?, false),
        None => (repo.create_paper(&first.to_write()).await?, true),
    };

    for payload in &group[1..] {
        paper = repo.update_paper(paper.id, &payload.to_write()).await?;
    }

    Ok((paper, created))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper(id: Option<&str>, url: &str) -> PaperPayload {
        PaperPayload {
            id: id.map(String::from),
            url: url.to_string(),
            title: url.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_group_by_url_preserves_order() {
        let payloads = vec![
            paper(Some("a"), "https://example.org/1"),
            paper(Some("b"), "https://example.org/2"),
            paper(Some("c"), "https://example.org/1"),
        ];

        let groups = group_by_url(&payloads);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "https://example.org/1");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].0, "https://example.org/2");
        assert_eq!(groups[1].1.len(), 1);
    }

    #[test]
    fn test_same_url_payloads_stay_in_submission_order() {
        let payloads = vec![
            paper(Some("first"), "https://example.org/1"),
            paper(Some("second"), "https://example.org/1"),
        ];

        let groups = group_by_url(&payloads);
        let ids: Vec<_> = groups[0].1.iter().map(|p| p.id.clone().unwrap()).collect();
        assert_eq!(ids, vec!["first", "second"]);
    }
}
