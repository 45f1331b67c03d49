use futures::future::BoxFuture;
use tracing::debug;
use uuid::Uuid;

use groupflow_core::config::HostConfig;
use groupflow_core::error::{GroupflowError, Result};
use groupflow_core::traits::HostClient;
use groupflow_core::types::{JobId, JobState, WorkItem};

use crate::catalog::Catalog;

/// Host capability implementation over the runtime's REST interface.
pub struct HttpHost {
    base: String,
    client: reqwest::Client,
    client_id: String,
}

impl HttpHost {
    pub fn new(config: &HostConfig) -> Self {
        let client_id = config
            .client_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Self {
            base: config.base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            client_id,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Pull the node-type registry and snapshot it into a catalog.
    pub async fn fetch_catalog(&self) -> Result<Catalog> {
        let resp = self
            .client
            .get(self.url("/object_info"))
            .send()
            .await
            .map_err(host_err)?;
        if !resp.status().is_success() {
            return Err(GroupflowError::Host(format!(
                "object_info returned HTTP {}",
                resp.status()
            )));
        }
        let value: serde_json::Value = resp.json().await.map_err(host_err)?;
        let catalog = Catalog::from_object_info(&value);
        debug!(classes = catalog.len(), "Node catalog fetched");
        Ok(catalog)
    }
}

fn host_err(e: reqwest::Error) -> GroupflowError {
    GroupflowError::Host(e.to_string())
}

impl HostClient for HttpHost {
    fn submit(&self, item: &WorkItem) -> BoxFuture<'_, Result<JobId>> {
        let body = serde_json::json!({
            "prompt": item,
            "client_id": self.client_id,
        });
        Box::pin(async move {
            let resp = self
                .client
                .post(self.url("/prompt"))
                .json(&body)
                .send()
                .await
                .map_err(host_err)?;
            let status = resp.status();
            if status == reqwest::StatusCode::BAD_REQUEST {
                let text = resp.text().await.unwrap_or_default();
                return Err(GroupflowError::Validation(text));
            }
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                return Err(GroupflowError::Submission(format!(
                    "HTTP {}: {}",
                    status, text
                )));
            }
            let value: serde_json::Value = resp.json().await.map_err(host_err)?;
            let id = value
                .get("prompt_id")
                .and_then(|v| v.as_str())
                .ok_or_else(|| GroupflowError::Submission("response missing prompt_id".into()))?;
            Ok(JobId::new(id))
        })
    }

    fn job_state(&self, job: &JobId) -> BoxFuture<'_, Result<JobState>> {
        let job = job.clone();
        Box::pin(async move {
            let resp = self
                .client
                .get(self.url("/queue"))
                .send()
                .await
                .map_err(host_err)?;
            let queue: serde_json::Value = resp.json().await.map_err(host_err)?;
            if queue_contains(queue.get("queue_running"), &job) {
                return Ok(JobState::Running);
            }
            if queue_contains(queue.get("queue_pending"), &job) {
                return Ok(JobState::Queued);
            }

            let resp = self
                .client
                .get(self.url(&format!("/history/{}", job)))
                .send()
                .await
                .map_err(host_err)?;
            let history: serde_json::Value = resp.json().await.map_err(host_err)?;
            let finished = history
                .get(job.0.as_str())
                .map(|v| !v.is_null())
                .unwrap_or(false);
            Ok(if finished {
                JobState::Finished
            } else {
                JobState::Gone
            })
        })
    }

    fn cancel_pending(&self, jobs: &[JobId]) -> BoxFuture<'_, Result<()>> {
        let ids: Vec<String> = jobs.iter().map(|j| j.0.clone()).collect();
        let body = serde_json::json!({ "delete": ids });
        Box::pin(async move {
            let resp = self
                .client
                .post(self.url("/queue"))
                .json(&body)
                .send()
                .await
                .map_err(host_err)?;
            if !resp.status().is_success() {
                return Err(GroupflowError::Host(format!(
                    "queue delete returned HTTP {}",
                    resp.status()
                )));
            }
            Ok(())
        })
    }

    fn interrupt(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let resp = self
                .client
                .post(self.url("/interrupt"))
                .send()
                .await
                .map_err(host_err)?;
            if !resp.status().is_success() {
                return Err(GroupflowError::Host(format!(
                    "interrupt returned HTTP {}",
                    resp.status()
                )));
            }
            Ok(())
        })
    }

    fn free_memory(&self, unload_models: bool, free_cache: bool) -> BoxFuture<'_, Result<()>> {
        let body = serde_json::json!({
            "unload_models": unload_models,
            "free_memory": free_cache,
        });
        Box::pin(async move {
            let resp = self
                .client
                .post(self.url("/free"))
                .json(&body)
                .send()
                .await
                .map_err(host_err)?;
            if !resp.status().is_success() {
                return Err(GroupflowError::Host(format!(
                    "free returned HTTP {}",
                    resp.status()
                )));
            }
            Ok(())
        })
    }
}

/// Queue entries are tuples with the job id at index 1.
fn queue_contains(list: Option<&serde_json::Value>, job: &JobId) -> bool {
    list.and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .any(|e| e.get(1).and_then(|v| v.as_str()) == Some(job.0.as_str()))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_entry_id_at_tuple_index_one() {
        let queue = serde_json::json!([
            [0, "aaaa-bbbb", {"extra": true}],
            [1, "cccc-dddd"]
        ]);
        assert!(queue_contains(Some(&queue), &JobId::new("cccc-dddd")));
        assert!(!queue_contains(Some(&queue), &JobId::new("eeee-ffff")));
        assert!(!queue_contains(None, &JobId::new("aaaa-bbbb")));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let host = HttpHost::new(&HostConfig {
            base_url: "http://localhost:8188/".into(),
            client_id: Some("cid".into()),
        });
        assert_eq!(host.url("/prompt"), "http://localhost:8188/prompt");
        assert_eq!(host.client_id(), "cid");
    }

    #[test]
    fn client_id_generated_when_absent() {
        let host = HttpHost::new(&HostConfig::default());
        assert!(!host.client_id().is_empty());
    }
}
