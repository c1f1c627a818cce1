//! Attachment ownership and garbage collection.
//!
//! A job-case link owns the attachments listed in its `attachments` column
//! plus any image embedded in its result detail as
//! `<img src="{base_url}{id}">`. When a link is deleted or its detail is
//! edited, attachments it no longer owns are deleted from the store. Store
//! failures are logged and never fail the request.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::entity::job_case;

/// Errors reported by an attachment store delete.
#[derive(Debug, thiserror::Error)]
pub enum AttachmentError {
    /// The object was already gone.
    #[error("Attachment {0} does not exist")]
    Missing(String),

    #[error("Attachment store error: {0}")]
    Storage(String),
}

/// Blob store holding attachment objects.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    async fn delete(&self, id: &str) -> Result<(), AttachmentError>;
}

/// Ids in `old` that are absent from `new`, in `old` order, without duplicates.
pub fn stale_ids(old: &[String], new: &[String]) -> Vec<String> {
    let keep: HashSet<&str> = new.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    old.iter()
        .filter(|id| !keep.contains(id.as_str()))
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

fn push_unique(ids: &mut Vec<String>, id: String) {
    if !ids.contains(&id) {
        ids.push(id);
    }
}

/// Reconciles attachment references against the attachment store.
pub struct AttachmentService {
    store: Arc<dyn AttachmentStore>,
    base_url: String,
    image_src: Regex,
}

impl AttachmentService {
    /// Build the service for attachments served under `base_url`.
    pub fn new(store: Arc<dyn AttachmentStore>, base_url: &str) -> Result<Self, regex::Error> {
        let image_src = Regex::new(&format!(
            r#"<(?i:img)\b[^>]*?\s(?i:src)\s*=\s*"{}([^"/?#]+)""#,
            regex::escape(base_url)
        ))?;

        Ok(Self {
            store,
            base_url: base_url.to_string(),
            image_src,
        })
    }

    /// Public URL of an attachment, ready to embed in result detail.
    pub fn url_for(&self, id: &str) -> String {
        format!("{}{}", self.base_url, id)
    }

    /// Attachment ids embedded as images in `html`, in order of appearance.
    pub fn embedded_ids(&self, html: &str) -> Vec<String> {
        let mut ids = Vec::new();
        for caps in self.image_src.captures_iter(html) {
            if let Some(id) = caps.get(1) {
                push_unique(&mut ids, id.as_str().to_string());
            }
        }
        ids
    }

    /// Every attachment a link owns: its stored list, then ids embedded in its detail.
    pub fn owned_ids(&self, link: &job_case::Model) -> Vec<String> {
        let mut ids = Vec::new();
        for id in link.attachment_ids() {
            push_unique(&mut ids, id);
        }
        if let Some(ref detail) = link.test_detail {
            for id in self.embedded_ids(detail) {
                push_unique(&mut ids, id);
            }
        }
        ids
    }

    /// Issue one delete per distinct id. Returns the number of delete calls made.
    pub async fn purge(&self, ids: &[String]) -> usize {
        let mut seen = HashSet::new();
        let mut calls = 0;

        for id in ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            calls += 1;
            match self.store.delete(id).await {
                Ok(()) => debug!(attachment = %id, "Deleted attachment"),
                Err(AttachmentError::Missing(_)) => {
                    debug!(attachment = %id, "Attachment already absent")
                }
                Err(e) => warn!(attachment = %id, error = %e, "Failed to delete attachment"),
            }
        }

        calls
    }

    /// Delete every attachment owned by a link that is being removed.
    pub async fn purge_link(&self, link: &job_case::Model) -> usize {
        let ids = self.owned_ids(link);
        let calls = self.purge(&ids).await;
        if calls > 0 {
            info!(link_id = %link.id, attachments = calls, "Purged attachments of removed link");
        }
        calls
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use super::*;

    /// Attachment store that records delete calls.
    #[derive(Default)]
    pub struct RecordingStore {
        pub calls: Mutex<Vec<String>>,
        pub missing: HashSet<String>,
        pub failing: HashSet<String>,
    }

    impl RecordingStore {
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AttachmentStore for RecordingStore {
        async fn delete(&self, id: &str) -> Result<(), AttachmentError> {
            self.calls.lock().unwrap().push(id.to_string());
            if self.missing.contains(id) {
                return Err(AttachmentError::Missing(id.to_string()));
            }
            if self.failing.contains(id) {
                return Err(AttachmentError::Storage("connection reset".to_string()));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::testing::RecordingStore;
    use super::*;

    const BASE: &str = "https://files.example.com/att/";

    fn service(store: Arc<RecordingStore>) -> AttachmentService {
        AttachmentService::new(store, BASE).unwrap()
    }

    fn link(detail: Option<&str>, attachments: serde_json::Value) -> job_case::Model {
        let now = Utc::now();
        job_case::Model {
            id: Uuid::now_v7(),
            job_id: Uuid::now_v7(),
            case_id: Uuid::now_v7(),
            case_status: 0,
            test_detail: detail.map(String::from),
            attachments,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_embedded_ids_only_match_base_url() {
        let svc = service(Arc::new(RecordingStore::default()));
        let html = format!(
            r#"<p>step 1</p><img alt="s" src="{base}a1.png"><IMG SRC="{base}b2.jpg" />
               <img src="https://elsewhere.com/att/c3.png"><img src="{base}a1.png">"#,
            base = BASE
        );
        assert_eq!(svc.embedded_ids(&html), vec!["a1.png", "b2.jpg"]);
    }

    #[test]
    fn test_base_url_is_matched_literally() {
        let svc = AttachmentService::new(
            Arc::new(RecordingStore::default()),
            "http://files.example.com/a.b/",
        )
        .unwrap();
        assert!(svc
            .embedded_ids(r#"<img src="http://filesXexample.com/aXb/x.png">"#)
            .is_empty());
    }

    #[test]
    fn test_stale_ids_keeps_order_and_dedupes() {
        let old = vec!["a".to_string(), "b".to_string(), "a".to_string(), "c".to_string()];
        let new = vec!["b".to_string()];
        assert_eq!(stale_ids(&old, &new), vec!["a", "c"]);
        assert!(stale_ids(&old, &old).is_empty());
    }

    #[test]
    fn test_owned_ids_merges_list_and_detail() {
        let svc = service(Arc::new(RecordingStore::default()));
        let l = link(
            Some(&format!(r#"<img src="{}x.png"><img src="{}y.png">"#, BASE, BASE)),
            serde_json::json!(["y.png", "z.png"]),
        );
        assert_eq!(svc.owned_ids(&l), vec!["y.png", "z.png", "x.png"]);
    }

    #[actix_rt::test]
    async fn test_purge_link_issues_one_call_per_attachment() {
        let store = Arc::new(RecordingStore {
            missing: HashSet::from(["one.png".to_string()]),
            failing: HashSet::from(["two.png".to_string()]),
            ..Default::default()
        });
        let svc = service(store.clone());
        let l = link(
            Some(&format!(r#"<img src="{}one.png"> and <img src="{}two.png">"#, BASE, BASE)),
            serde_json::json!([]),
        );

        let calls = svc.purge_link(&l).await;

        assert_eq!(calls, 2);
        assert_eq!(store.calls(), vec!["one.png", "two.png"]);
    }

    #[actix_rt::test]
    async fn test_purge_skips_duplicates() {
        let store = Arc::new(RecordingStore::default());
        let svc = service(store.clone());
        let ids = vec!["a".to_string(), "a".to_string(), "b".to_string()];

        assert_eq!(svc.purge(&ids).await, 2);
        assert_eq!(store.calls(), vec!["a", "b"]);
    }
}
