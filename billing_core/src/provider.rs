use crate::credentials::{self, Credentials};
use crate::error::{BillingError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const CONTAINER_RELATIVE_URI_VAR: &str = "AWS_CONTAINER_CREDENTIALS_RELATIVE_URI";
pub const CONTAINER_FULL_URI_VAR: &str = "AWS_CONTAINER_CREDENTIALS_FULL_URI";
pub const CONTAINER_AUTHORIZATION_TOKEN_VAR: &str = "AWS_CONTAINER_AUTHORIZATION_TOKEN";
pub const IMDS_ENDPOINT_VAR: &str = "AWS_EC2_METADATA_SERVICE_ENDPOINT";
pub const IMDS_DISABLED_VAR: &str = "AWS_EC2_METADATA_DISABLED";

const CONTAINER_HOST: &str = "http://169.254.170.2";
const IMDS_HOST: &str = "http://169.254.169.254";
const IMDS_TOKEN_TTL_SECONDS: &str = "21600";
const IMDS_ROLE_PATH: &str = "/latest/meta-data/iam/security-credentials/";

/// Temporary credentials are refreshed this long before they expire.
const REFRESH_MARGIN_MINUTES: i64 = 5;

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn credentials(&self) -> Result<Credentials>;
}

pub type DynCredentialProvider = Arc<dyn CredentialProvider>;

#[async_trait]
impl CredentialProvider for Credentials {
    async fn credentials(&self) -> Result<Credentials> {
        Ok(self.clone())
    }
}

type Lookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Resolves credentials the way AWS SDKs do: environment variables, then the
/// shared credentials file, then the container or EC2 instance metadata
/// endpoint. Results are cached until shortly before they expire.
pub struct CredentialChain {
    lookup: Lookup,
    http: reqwest::Client,
    cached: Mutex<Option<Credentials>>,
}

/// JSON shape shared by the ECS container endpoint and EC2 IMDS.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RemoteCredentials {
    #[serde(default)]
    code: Option<String>,
    access_key_id: String,
    secret_access_key: String,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    expiration: Option<DateTime<Utc>>,
}

impl From<RemoteCredentials> for Credentials {
    fn from(remote: RemoteCredentials) -> Self {
        let creds = Credentials::new(remote.access_key_id, remote.secret_access_key, remote.token);
        match remote.expiration {
            Some(expiration) => creds.with_expiration(expiration),
            None => creds,
        }
    }
}

impl CredentialChain {
    pub fn from_env() -> Result<Self> {
        Self::with_lookup(|name| std::env::var(name).ok())
    }

    pub fn with_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(1))
            .timeout(std::time::Duration::from_secs(5))
            .build()?;

        Ok(Self {
            lookup: Arc::new(lookup),
            http,
            cached: Mutex::new(None),
        })
    }

    fn var(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    /// Walks the chain without touching the cache.
    pub async fn resolve(&self) -> Result<Credentials> {
        match Credentials::from_lookup(|name| (self.lookup)(name)) {
            Ok(creds) => {
                debug!("Using AWS credentials from environment");
                return Ok(creds);
            }
            Err(BillingError::MissingCredentials(reason)) => {
                debug!("No environment credentials: {}", reason);
            }
            Err(e) => return Err(e),
        }

        match self.from_shared_file().await {
            Ok(Some(creds)) => return Ok(creds),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Skipping shared credentials file"),
        }

        if self.container_uri().is_some() {
            return self.from_container().await;
        }
        self.from_instance_metadata().await
    }

    async fn from_shared_file(&self) -> Result<Option<Credentials>> {
        let Some(path) = credentials::shared_credentials_path(|name| self.var(name)) else {
            return Ok(None);
        };
        let profile = credentials::profile_name(|name| self.var(name));

        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No shared credentials file at {}", path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(BillingError::MissingCredentials(format!(
                    "cannot read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let creds = Credentials::from_profile(&contents, &profile)?;
        match &creds {
            Some(_) => debug!("Using AWS profile '{}' from {}", profile, path.display()),
            None => debug!("Profile '{}' not found in {}", profile, path.display()),
        }
        Ok(creds)
    }

    fn container_uri(&self) -> Option<String> {
        if let Some(relative) = self.var(CONTAINER_RELATIVE_URI_VAR) {
            return Some(format!("{}{}", CONTAINER_HOST, relative));
        }
        self.var(CONTAINER_FULL_URI_VAR)
    }

    async fn from_container(&self) -> Result<Credentials> {
        let uri = self.container_uri().ok_or_else(|| {
            BillingError::MissingCredentials("no container credentials endpoint".to_string())
        })?;

        let mut request = self.http.get(&uri);
        if let Some(token) = self.var(CONTAINER_AUTHORIZATION_TOKEN_VAR) {
            request = request.header(reqwest::header::AUTHORIZATION, token);
        }

        let remote = self.get_json(request, "container credentials endpoint").await?;
        debug!("Using AWS credentials from container endpoint");
        Ok(remote.into())
    }

    async fn from_instance_metadata(&self) -> Result<Credentials> {
        if self
            .var(IMDS_DISABLED_VAR)
            .is_some_and(|value| value.eq_ignore_ascii_case("true"))
        {
            return Err(BillingError::MissingCredentials(
                "no credentials in environment or shared file, and EC2 metadata is disabled"
                    .to_string(),
            ));
        }

        let endpoint = self
            .var(IMDS_ENDPOINT_VAR)
            .unwrap_or_else(|| IMDS_HOST.to_string());
        let endpoint = endpoint.trim_end_matches('/');
        let token = self.imds_token(endpoint).await;

        let with_token = |request: reqwest::RequestBuilder| match &token {
            Some(token) => request.header("x-aws-ec2-metadata-token", token.as_str()),
            None => request,
        };

        let roles_url = format!("{}{}", endpoint, IMDS_ROLE_PATH);
        let response = with_token(self.http.get(&roles_url))
            .send()
            .await
            .map_err(|e| {
                BillingError::MissingCredentials(format!(
                    "no credentials in environment or shared file, and EC2 metadata is unreachable: {}",
                    e
                ))
            })?;
        if !response.status().is_success() {
            return Err(BillingError::MissingCredentials(format!(
                "EC2 metadata has no instance role ({})",
                response.status()
            )));
        }
        let roles = response.text().await?;
        let role = roles
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .ok_or_else(|| {
                BillingError::MissingCredentials("EC2 metadata lists no instance role".to_string())
            })?
            .to_string();

        let remote = self
            .get_json(
                with_token(self.http.get(format!("{}{}", roles_url, role))),
                "EC2 instance metadata",
            )
            .await?;
        if let Some(code) = remote.code.as_deref().filter(|code| *code != "Success") {
            return Err(BillingError::MissingCredentials(format!(
                "EC2 metadata returned {} for role '{}'",
                code, role
            )));
        }

        debug!("Using AWS credentials from instance role '{}'", role);
        Ok(remote.into())
    }

    /// IMDSv2 session token. Falls back to IMDSv1 when the PUT fails.
    async fn imds_token(&self, endpoint: &str) -> Option<String> {
        let response = self
            .http
            .put(format!("{}/latest/api/token", endpoint))
            .header("x-aws-ec2-metadata-token-ttl-seconds", IMDS_TOKEN_TTL_SECONDS)
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            debug!("IMDSv2 token request returned {}", response.status());
            return None;
        }
        response.text().await.ok().filter(|token| !token.is_empty())
    }

    async fn get_json(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<RemoteCredentials> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(BillingError::MissingCredentials(format!(
                "{} returned {}: {}",
                what, status, body
            )));
        }
        serde_json::from_str(&body).map_err(|e| {
            BillingError::MalformedResponse(format!("cannot decode {} response: {}", what, e))
        })
    }
}

#[async_trait]
impl CredentialProvider for CredentialChain {
    async fn credentials(&self) -> Result<Credentials> {
        let mut cached = self.cached.lock().await;
        if let Some(creds) = cached.as_ref() {
            if !creds.expires_within(Utc::now(), Duration::minutes(REFRESH_MARGIN_MINUTES)) {
                return Ok(creds.clone());
            }
            info!("Refreshing AWS credentials");
        }

        let creds = self.resolve().await?;
        *cached = Some(creds.clone());
        Ok(creds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{
        ACCESS_KEY_ID_VAR, PROFILE_VAR, SECRET_ACCESS_KEY_VAR, SHARED_CREDENTIALS_FILE_VAR,
    };
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn chain(vars: &[(&str, &str)]) -> CredentialChain {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CredentialChain::with_lookup(move |name| vars.get(name).cloned()).unwrap()
    }

    fn shared_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "[default]\naws_access_key_id = AKIDFILE\naws_secret_access_key = filesecret\n\n\
             [prod]\naws_access_key_id = AKIDPROD\naws_secret_access_key = prodsecret\n"
        )
        .unwrap();
        file
    }

    fn remote_body(key: &str, expiration: &str) -> serde_json::Value {
        serde_json::json!({
            "Code": "Success",
            "AccessKeyId": key,
            "SecretAccessKey": "remotesecret",
            "Token": "remotetoken",
            "Expiration": expiration,
        })
    }

    #[tokio::test]
    async fn test_environment_wins_over_shared_file() {
        let file = shared_file();
        let path = file.path().to_string_lossy().to_string();
        let chain = chain(&[
            (ACCESS_KEY_ID_VAR, "AKIDENV"),
            (SECRET_ACCESS_KEY_VAR, "envsecret"),
            (SHARED_CREDENTIALS_FILE_VAR, &path),
        ]);

        let creds = chain.credentials().await.unwrap();
        assert_eq!(creds.access_key_id, "AKIDENV");
    }

    #[tokio::test]
    async fn test_shared_file_honours_profile() {
        let file = shared_file();
        let path = file.path().to_string_lossy().to_string();

        let creds = chain(&[(SHARED_CREDENTIALS_FILE_VAR, &path)])
            .credentials()
            .await
            .unwrap();
        assert_eq!(creds.access_key_id, "AKIDFILE");

        let creds = chain(&[(SHARED_CREDENTIALS_FILE_VAR, &path), (PROFILE_VAR, "prod")])
            .credentials()
            .await
            .unwrap();
        assert_eq!(creds.access_key_id, "AKIDPROD");
        assert_eq!(creds.secret_access_key, "prodsecret");
    }

    #[tokio::test]
    async fn test_partial_environment_falls_through_to_shared_file() {
        let file = shared_file();
        let path = file.path().to_string_lossy().to_string();
        let chain = chain(&[
            (ACCESS_KEY_ID_VAR, "AKIDENV"),
            (SHARED_CREDENTIALS_FILE_VAR, &path),
        ]);

        let creds = chain.credentials().await.unwrap();
        assert_eq!(creds.access_key_id, "AKIDFILE");
    }

    #[tokio::test]
    async fn test_shared_file_wins_over_container_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(remote_body("AKIDECS", "2099-01-01T00:00:00Z")),
            )
            .expect(0)
            .mount(&server)
            .await;

        let file = shared_file();
        let path = file.path().to_string_lossy().to_string();
        let full_uri = format!("{}/creds", server.uri());
        let chain = chain(&[
            (SHARED_CREDENTIALS_FILE_VAR, &path),
            (CONTAINER_FULL_URI_VAR, &full_uri),
        ]);

        let creds = chain.credentials().await.unwrap();
        assert_eq!(creds.access_key_id, "AKIDFILE");
    }

    #[tokio::test]
    async fn test_container_endpoint_with_authorization() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/creds"))
            .and(header("authorization", "Bearer task-token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(remote_body("AKIDECS", "2099-01-01T00:00:00Z")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let full_uri = format!("{}/creds", server.uri());
        let chain = chain(&[
            (SHARED_CREDENTIALS_FILE_VAR, "/nonexistent/aws/credentials"),
            (CONTAINER_FULL_URI_VAR, &full_uri),
            (CONTAINER_AUTHORIZATION_TOKEN_VAR, "Bearer task-token"),
        ]);

        let creds = chain.credentials().await.unwrap();
        assert_eq!(creds.access_key_id, "AKIDECS");
        assert_eq!(creds.session_token.as_deref(), Some("remotetoken"));
        assert!(creds.expiration.is_some());

        // Cached until close to expiry.
        let again = chain.credentials().await.unwrap();
        assert_eq!(again, creds);
    }

    #[tokio::test]
    async fn test_instance_metadata_role() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/latest/api/token"))
            .and(header("x-aws-ec2-metadata-token-ttl-seconds", "21600"))
            .respond_with(ResponseTemplate::new(200).set_body_string("imds-token"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/latest/meta-data/iam/security-credentials/"))
            .and(header("x-aws-ec2-metadata-token", "imds-token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("billing-exporter\n"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/latest/meta-data/iam/security-credentials/billing-exporter"))
            .and(header("x-aws-ec2-metadata-token", "imds-token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(remote_body("AKIDEC2", "2099-01-01T00:00:00Z")),
            )
            .mount(&server)
            .await;

        let endpoint = server.uri();
        let chain = chain(&[
            (SHARED_CREDENTIALS_FILE_VAR, "/nonexistent/aws/credentials"),
            (IMDS_ENDPOINT_VAR, &endpoint),
        ]);

        let creds = chain.credentials().await.unwrap();
        assert_eq!(creds.access_key_id, "AKIDEC2");
        assert_eq!(creds.secret_access_key, "remotesecret");
    }

    #[tokio::test]
    async fn test_expired_credentials_are_refreshed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/creds"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(remote_body("AKIDECS", "2000-01-01T00:00:00Z")),
            )
            .expect(2)
            .mount(&server)
            .await;

        let full_uri = format!("{}/creds", server.uri());
        let chain = chain(&[
            (SHARED_CREDENTIALS_FILE_VAR, "/nonexistent/aws/credentials"),
            (CONTAINER_FULL_URI_VAR, &full_uri),
        ]);

        chain.credentials().await.unwrap();
        chain.credentials().await.unwrap();
    }

    #[tokio::test]
    async fn test_nothing_configured_is_missing_credentials() {
        let chain = chain(&[
            (SHARED_CREDENTIALS_FILE_VAR, "/nonexistent/aws/credentials"),
            (IMDS_DISABLED_VAR, "true"),
        ]);

        let err = chain.credentials().await.unwrap_err();
        assert!(matches!(err, BillingError::MissingCredentials(_)));
    }
}
