//! Report jobs: queued generation with observable progress.
//!
//! `enqueue` returns immediately; a background task writes sections and
//! progress into the shared table. At most one live job per report id.

use crate::ollama::{BackendClient, GenOptions};
use chrono::{DateTime, Utc};
use relay_shared::html_escape;
use relay_shared::models::MODEL_REASONING;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Queued,
    Generating,
    Formatting,
    Complete,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportSection {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportJob {
    pub report_id: String,
    pub user_id: String,
    pub topic: String,
    pub status: ReportStatus,
    pub progress: u8,
    pub started_at: DateTime<Utc>,
    pub token_count: usize,
    pub sections: Vec<ReportSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

const SECTION_TITLES: &[&str] = &["Summary", "Findings", "Details", "Recommendations"];

/// Shared job table.
#[derive(Clone, Default)]
pub struct ReportTable {
    jobs: Arc<Mutex<HashMap<String, ReportJob>>>,
}

impl ReportTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a report; returns its id immediately.
    pub async fn enqueue(&self, backend: BackendClient, user_id: &str, topic: &str) -> String {
        let report_id = Uuid::new_v4().to_string();
        let job = ReportJob {
            report_id: report_id.clone(),
            user_id: user_id.to_string(),
            topic: topic.to_string(),
            status: ReportStatus::Queued,
            progress: 0,
            started_at: Utc::now(),
            token_count: 0,
            sections: Vec::new(),
            error: None,
        };
        self.jobs.lock().await.insert(report_id.clone(), job);

        let table = self.clone();
        let id = report_id.clone();
        let topic = topic.to_string();
        tokio::spawn(async move {
            table.generate(backend, &id, &topic).await;
        });

        info!("report queued: {}", report_id);
        report_id
    }

    async fn set<F: FnOnce(&mut ReportJob)>(&self, id: &str, apply: F) {
        if let Some(job) = self.jobs.lock().await.get_mut(id) {
            apply(job);
        }
    }

    async fn generate(&self, backend: BackendClient, id: &str, topic: &str) {
        self.set(id, |j| j.status = ReportStatus::Generating).await;

        let total = SECTION_TITLES.len() as u8;
        for (i, title) in SECTION_TITLES.iter().enumerate() {
            let prompt = format!("Write the {} section of a report on: {}", title, topic);
            match backend
                .generate(
                    MODEL_REASONING,
                    Some("You write one tight report section at a time. No headings."),
                    &prompt,
                    &GenOptions::default(),
                )
                .await
            {
                Ok(body) => {
                    let tokens = body.split_whitespace().count();
                    self.set(id, |j| {
                        j.sections.push(ReportSection {
                            title: title.to_string(),
                            body: body.trim().to_string(),
                        });
                        j.token_count += tokens;
                        j.progress = ((i as u8 + 1) * 90) / total;
                    })
                    .await;
                }
                Err(e) => {
                    warn!("report {} failed: {}", id, e);
                    self.set(id, |j| {
                        j.status = ReportStatus::Failed;
                        j.error = Some(e.to_string());
                    })
                    .await;
                    return;
                }
            }
        }

        self.set(id, |j| {
            j.status = ReportStatus::Formatting;
            j.progress = 95;
        })
        .await;
        self.set(id, |j| {
            j.status = ReportStatus::Complete;
            j.progress = 100;
        })
        .await;
        info!("report complete: {}", id);
    }

    pub async fn get(&self, id: &str) -> Option<ReportJob> {
        self.jobs.lock().await.get(id).cloned()
    }

    /// Terminal jobs can be removed once read.
    pub async fn remove_terminal(&self, id: &str) -> bool {
        let mut jobs = self.jobs.lock().await;
        match jobs.get(id) {
            Some(j) if matches!(j.status, ReportStatus::Complete | ReportStatus::Failed) => {
                jobs.remove(id);
                true
            }
            _ => false,
        }
    }
}

/// Render a complete job as a standalone HTML document.
pub fn render_html(job: &ReportJob) -> String {
    let mut body = String::new();
    for section in &job.sections {
        body.push_str(&format!(
            "<h2>{}</h2>\n<p>{}</p>\n",
            html_escape(&section.title),
            html_escape(&section.body).replace('\n', "<br>")
        ));
    }
    format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>{}</title></head>\n<body>\n<h1>{}</h1>\n{}</body></html>",
        html_escape(&job.topic),
        html_escape(&job.topic),
        body
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job() -> ReportJob {
        ReportJob {
            report_id: "r1".into(),
            user_id: "u1".into(),
            topic: "Cache <tiers>".into(),
            status: ReportStatus::Complete,
            progress: 100,
            started_at: Utc::now(),
            token_count: 10,
            sections: vec![ReportSection { title: "Summary".into(), body: "a & b".into() }],
            error: None,
        }
    }

    #[test]
    fn test_render_html_escapes() {
        let html = render_html(&sample_job());
        assert!(html.contains("Cache &lt;tiers&gt;"));
        assert!(html.contains("a &amp; b"));
        assert!(html.starts_with("<!doctype html>"));
    }

    #[tokio::test]
    async fn test_table_get_unknown() {
        let table = ReportTable::new();
        assert!(table.get("ghost").await.is_none());
        assert!(!table.remove_terminal("ghost").await);
    }
}
