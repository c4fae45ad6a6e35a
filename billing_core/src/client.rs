use crate::{
    cost::{CostQuery, CostReport},
    credentials::Credentials,
    error::{BillingError, Result},
    provider::{CredentialProvider, DynCredentialProvider},
    signing::{amz_date, RequestSigner},
    source::CostSource,
    window::QueryWindow,
};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header::AUTHORIZATION, Url};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_REGION: &str = "us-east-1";

const SERVICE: &str = "ce";
const TARGET: &str = "AWSInsightsIndexService.GetCostAndUsage";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Cost Explorer is served from a single region per partition.
pub fn default_endpoint(region: &str) -> String {
    if region.starts_with("cn-") {
        format!("https://ce.{}.amazonaws.com.cn/", region)
    } else {
        format!("https://ce.{}.amazonaws.com/", region)
    }
}

#[derive(Debug, Clone)]
pub struct CostExplorerConfig {
    pub region: String,
    pub endpoint: Option<String>,
}

impl Default for CostExplorerConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
        }
    }
}

/// `GetCostAndUsage` over the JSON 1.1 protocol, signed with SigV4.
pub struct CostExplorerClient {
    http: reqwest::Client,
    endpoint: Url,
    region: String,
    credentials: DynCredentialProvider,
}

impl CostExplorerClient {
    /// `credentials` is consulted on every request, so rotating providers
    /// take effect without a restart.
    pub fn new(
        config: CostExplorerConfig,
        credentials: impl CredentialProvider + 'static,
    ) -> Result<Self> {
        let endpoint = config
            .endpoint
            .unwrap_or_else(|| default_endpoint(&config.region));
        let endpoint = Url::parse(&endpoint).map_err(|e| {
            BillingError::InvalidRequest(format!("invalid endpoint '{}': {}", endpoint, e))
        })?;
        if endpoint.host_str().is_none() {
            return Err(BillingError::InvalidRequest(format!(
                "endpoint '{}' has no host",
                endpoint
            )));
        }

        Ok(Self {
            http: reqwest::Client::builder().build()?,
            endpoint,
            region: config.region,
            credentials: Arc::new(credentials),
        })
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    fn host_header(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }

    fn signed_headers(
        &self,
        credentials: &Credentials,
        body: &[u8],
    ) -> Result<BTreeMap<String, String>> {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), CONTENT_TYPE.to_string());
        headers.insert("host".to_string(), self.host_header());
        headers.insert("x-amz-date".to_string(), amz_date(Utc::now()));
        headers.insert("x-amz-target".to_string(), TARGET.to_string());
        if let Some(token) = &credentials.session_token {
            headers.insert("x-amz-security-token".to_string(), token.clone());
        }

        let authorization = RequestSigner::new(credentials, &self.region, SERVICE)
            .authorization(
                "POST",
                self.endpoint.path(),
                self.endpoint.query().unwrap_or(""),
                &headers,
                body,
            )?;
        headers.insert(AUTHORIZATION.as_str().to_string(), authorization);

        Ok(headers)
    }
}

#[async_trait]
impl CostSource for CostExplorerClient {
    async fn fetch(&self, metrics: &[String]) -> Result<CostReport> {
        if metrics.is_empty() {
            return Err(BillingError::InvalidRequest(
                "at least one cost metric must be requested".to_string(),
            ));
        }

        let query = CostQuery::daily(QueryWindow::ending_today(), metrics);
        let body = serde_json::to_vec(&query)?;
        let credentials = self.credentials.credentials().await?;
        let headers = self.signed_headers(&credentials, &body)?;

        debug!(
            "Querying Cost Explorer {} for {:?} ({} to {})",
            self.endpoint, query.metrics, query.time_period.start, query.time_period.end
        );

        let mut request = self.http.post(self.endpoint.clone()).body(body);
        for (name, value) in headers.iter().filter(|(name, _)| name.as_str() != "host") {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        let payload = response.bytes().await?;

        if !status.is_success() {
            return Err(service_error(status.as_u16(), &payload));
        }

        serde_json::from_slice(&payload).map_err(|e| BillingError::MalformedResponse(e.to_string()))
    }

    fn name(&self) -> &str {
        "cost_explorer"
    }
}

#[derive(Debug, Default, Deserialize)]
struct AwsErrorBody {
    #[serde(rename = "__type", default)]
    kind: Option<String>,
    #[serde(alias = "Message", default)]
    message: Option<String>,
}

fn service_error(status: u16, payload: &[u8]) -> BillingError {
    let body: AwsErrorBody = serde_json::from_slice(payload).unwrap_or_default();

    let code = body
        .kind
        .as_deref()
        .map(|kind| kind.rsplit('#').next().unwrap_or(kind).trim_end_matches(':'))
        .filter(|code| !code.is_empty())
        .unwrap_or("UnknownError")
        .to_string();
    let message = body
        .message
        .unwrap_or_else(|| String::from_utf8_lossy(payload).trim().to_string());

    BillingError::Service {
        status,
        code,
        message,
    }
}
