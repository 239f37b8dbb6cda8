//! Compute Engine REST client implementing the `ComputeApi` port.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::application::ports::{ComputeApi, InstanceGroupPage, Operation};
use crate::domain::ComputeError;
use crate::domain::config::ComputeConfig;

/// HTTP client for the zonal instance group endpoints of the compute API.
pub struct GceComputeClient {
    client: Client,
    endpoint: String,
    access_token: Option<String>,
}

#[derive(Serialize)]
struct DeleteInstancesRequest<'a> {
    instances: &'a [String],
}

impl GceComputeClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ComputeConfig, access_token: Option<String>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("gce-backend/", env!("CARGO_PKG_VERSION")))
            .build()?;
        if access_token.is_none() {
            tracing::warn!("no compute API access token configured; requests are unauthenticated");
        }
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            access_token,
        })
    }

    fn zone_url(&self, project: &str, zone: &str) -> String {
        format!("{}/projects/{project}/zones/{zone}", self.endpoint)
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        body: &B,
    ) -> Result<T, ComputeError> {
        let mut request = self.client.post(url).query(query).json(body);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }
        tracing::debug!(url, "compute API request");
        let response = request
            .send()
            .await
            .map_err(|e| ComputeError::Transport(e.to_string()))?;
        handle_response(response).await
    }
}

async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T, ComputeError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json()
            .await
            .map_err(|e| ComputeError::Decode(e.to_string()));
    }
    let body = response.text().await.unwrap_or_default();
    Err(ComputeError::Http {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

/// The `error.message` of a compute API error body, or the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message")?.as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

impl ComputeApi for GceComputeClient {
    async fn list_instances_in_group(
        &self,
        project: &str,
        group: &str,
        zone: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<InstanceGroupPage, ComputeError> {
        let url = format!(
            "{}/instanceGroups/{group}/listInstances",
            self.zone_url(project, zone)
        );
        let mut query = vec![("maxResults", page_size.to_string())];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }
        self.post(&url, &query, &serde_json::json!({})).await
    }

    async fn delete_instances(
        &self,
        project: &str,
        group: &str,
        zone: &str,
        urls: &[String],
    ) -> Result<Operation, ComputeError> {
        let url = format!(
            "{}/instanceGroupManagers/{group}/deleteInstances",
            self.zone_url(project, zone)
        );
        self.post(&url, &[], &DeleteInstancesRequest { instances: urls })
            .await
    }
}
