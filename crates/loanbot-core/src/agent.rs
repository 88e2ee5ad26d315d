use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::action::LoanOffer;
use crate::error::{Error, Result};
use crate::transcript::Message;

#[derive(Debug, Clone, Serialize)]
pub struct AskRequest {
    pub query: String,
    pub history: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_voice: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AskResponse {
    pub response: String,
    pub history: Vec<Message>,
    /// Server-relative path to a spoken rendition of the reply.
    #[serde(default)]
    pub audio: Option<String>,
}

#[derive(Deserialize)]
struct TextResponse {
    response: String,
}

/// Applicant details for the loan application letter.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplicationDetails {
    pub name: String,
    pub address: String,
    pub city: String,
    pub loan_type: String,
    pub loan_amount: String,
    pub loan_purpose: String,
    pub income: String,
    pub tenure: String,
    pub bank_name: String,
}

/// The server endpoints the client talks to.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    /// `POST /ask`
    async fn ask(&self, request: AskRequest) -> Result<AskResponse>;

    /// `POST /get_mock_score`
    async fn mock_score(&self) -> Result<String>;

    /// `POST /verify_kyc`
    async fn verify_kyc(&self) -> Result<String>;

    /// `POST /generate_sanction_letter`, returning PDF bytes.
    async fn sanction_letter(&self, offer: &LoanOffer) -> Result<Vec<u8>>;

    /// `POST /generate_custom_pdf`, returning PDF bytes.
    async fn application_letter(&self, details: &ApplicationDetails) -> Result<Vec<u8>>;

    /// Resolve a server-relative audio path into something playable.
    fn audio_url(&self, path: &str) -> String {
        path.to_string()
    }
}

#[derive(Clone)]
pub struct AgentClient {
    client: Client,
    base_url: String,
}

impl AgentClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_json<T: Serialize + ?Sized>(&self, endpoint: &str, body: &T) -> Result<reqwest::Response> {
        let request = self.client.post(self.url(endpoint)).json(body);
        self.send(endpoint, request).await
    }

    async fn post_empty(&self, endpoint: &str) -> Result<reqwest::Response> {
        let request = self.client.post(self.url(endpoint));
        self.send(endpoint, request).await
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    async fn send(&self, endpoint: &str, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        tracing::debug!(endpoint, "POST");
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            tracing::warn!(endpoint, status, body = %text, "Request failed");
            return Err(Error::Status {
                endpoint: endpoint.to_string(),
                status,
            });
        }
        Ok(response)
    }

    async fn post_for_text(&self, endpoint: &str) -> Result<String> {
        let response = self.post_empty(endpoint).await?;
        let body: TextResponse = response
            .json()
            .await
            .map_err(|e| Error::Decode(format!("{}: {}", endpoint, e)))?;
        Ok(body.response)
    }
}

#[async_trait]
impl AgentBackend for AgentClient {
    async fn ask(&self, request: AskRequest) -> Result<AskResponse> {
        let response = self.post_json("/ask", &request).await?;
        let body: AskResponse = response
            .json()
            .await
            .map_err(|e| Error::Decode(format!("/ask: {}", e)))?;
        Ok(body)
    }

    async fn mock_score(&self) -> Result<String> {
        self.post_for_text("/get_mock_score").await
    }

    async fn verify_kyc(&self) -> Result<String> {
        self.post_for_text("/verify_kyc").await
    }

    async fn sanction_letter(&self, offer: &LoanOffer) -> Result<Vec<u8>> {
        let response = self.post_json("/generate_sanction_letter", offer).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn application_letter(&self, details: &ApplicationDetails) -> Result<Vec<u8>> {
        let response = self.post_json("/generate_custom_pdf", details).await?;
        Ok(response.bytes().await?.to_vec())
    }

    fn audio_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }
}
