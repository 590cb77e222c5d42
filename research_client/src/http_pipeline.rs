use async_trait::async_trait;
use research_lib::{Pipeline, PipelineError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

#[derive(Serialize)]
struct QueryRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct QueryResponse {
    response: String,
}

/// error body of the backend, `{"detail": "..."}`
#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub message: String,
}

/// Forwards queries to the research backend, `POST /query`.
pub struct HttpPipeline {
    http_client: Client,
    base_url: String,
}

impl HttpPipeline {
    pub fn new(http_client: Client, base_url: &str) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn health(&self) -> Result<Health, reqwest::Error> {
        self.http_client
            .get(format!("{}/health", &self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

#[async_trait]
impl Pipeline for HttpPipeline {
    #[instrument(skip(self))]
    async fn run(&self, query: &str) -> Result<String, PipelineError> {
        let response = self
            .http_client
            .post(format!("{}/query", &self.base_url))
            .json(&QueryRequest { text: query })
            .send()
            .await
            .map_err(|e| PipelineError::Failed(format!("error executing request: {}", e)))?;

        let status = response.status();
        info!("backend answered {}", status);
        if status.is_success() {
            let body: QueryResponse = response
                .json()
                .await
                .map_err(|e| PipelineError::Failed(format!("unexpected response: {}", e)))?;
            Ok(body.response)
        } else {
            let detail = match response.json::<ErrorBody>().await {
                Ok(body) => body.detail,
                Err(_) => format!("backend returned {}", status),
            };
            Err(PipelineError::Failed(detail))
        }
    }
}
