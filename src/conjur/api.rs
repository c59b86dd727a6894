//! Conjur HTTP API.
//!
//! [`ConjurApiFactory`] and [`ConjurApi`] are the boundary to the vault: the
//! factory exchanges a workload JWT for a Conjur access token and the API
//! performs batch retrieval with it. [`HttpConjurApiFactory`] talks to a real
//! Conjur over HTTPS, trusting only the certificate from the mount request.

use std::collections::HashMap;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::header::{ACCEPT_ENCODING, AUTHORIZATION, CONTENT_ENCODING};
use reqwest::{Client as HttpClient, Response};
use tracing::{debug, error};
use url::{form_urlencoded, Url};

use super::config::{AuthnType, ConjurConfig};
use super::error::{ConjurError, Result};

/// An authenticated Conjur API handle.
#[async_trait]
pub trait ConjurApi: Send + Sync {
    /// Retrieve several variables in one call.
    ///
    /// `variable_ids` are bare ids (`db/password`); keys of the returned map
    /// are fully qualified (`{account}:variable:db/password`). Values are
    /// returned as raw bytes, so binary secrets survive the transfer.
    async fn retrieve_batch_secrets_safe(
        &self,
        variable_ids: &[String],
    ) -> Result<HashMap<String, Vec<u8>>>;
}

/// Builds authenticated [`ConjurApi`] handles.
#[async_trait]
pub trait ConjurApiFactory: Send + Sync {
    async fn connect(&self, config: &ConjurConfig) -> Result<Box<dyn ConjurApi>>;
}

/// [`ConjurApiFactory`] for the Conjur REST API.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpConjurApiFactory;

impl HttpConjurApiFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConjurApiFactory for HttpConjurApiFactory {
    async fn connect(&self, config: &ConjurConfig) -> Result<Box<dyn ConjurApi>> {
        let base_url = Url::parse(&config.appliance_url)
            .map_err(|e| ConjurError::client_construction(format!("Invalid ApplianceURL: {}", e)))?;
        let http = build_http_client(&config.ssl_cert)?;

        let token = match config.authn_type {
            AuthnType::Jwt => authenticate_jwt(&http, &base_url, config).await?,
        };

        Ok(Box::new(HttpConjurApi {
            http,
            base_url,
            account: config.account.clone(),
            access_token: token,
        }))
    }
}

fn build_http_client(ssl_cert: &str) -> Result<HttpClient> {
    let certificates = reqwest::Certificate::from_pem_bundle(ssl_cert.as_bytes())
        .map_err(|e| {
            debug!(error = %e, "Conjur SSL certificate failed to parse");
            ConjurError::client_construction("Can't append Conjur SSL cert")
        })?;
    if certificates.is_empty() {
        error!("Conjur SSL certificate contains no PEM certificates");
        return Err(ConjurError::client_construction("Can't append Conjur SSL cert"));
    }

    let builder = certificates
        .into_iter()
        .fold(HttpClient::builder().tls_built_in_root_certs(false), |builder, cert| {
            builder.add_root_certificate(cert)
        });

    builder
        .build()
        .map_err(|e| {
            ConjurError::client_construction(format!("Failed to build HTTP client: {}", e))
        })
}

/// Build `{base}/{segments...}` with each segment percent-encoded, so a host
/// identity such as `host/app` becomes one segment.
fn endpoint(base_url: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base_url.clone();
    url.path_segments_mut()
        .map_err(|_| ConjurError::client_construction("ApplianceURL cannot be a base URL"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

async fn authenticate_jwt(
    http: &HttpClient,
    base_url: &Url,
    config: &ConjurConfig,
) -> Result<Vec<u8>> {
    let authenticator = format!("authn-{}", config.authn_type.as_str());
    let mut segments =
        vec![authenticator.as_str(), config.service_id.as_str(), config.account.as_str()];
    if !config.jwt_host_id.is_empty() {
        segments.push(config.jwt_host_id.as_str());
    }
    segments.push("authenticate");
    let url = endpoint(base_url, &segments)?;

    debug!(service_id = %config.service_id, account = %config.account, "Authenticating to Conjur");

    let response = http
        .post(url)
        .form(&[("jwt", config.jwt_content.as_str())])
        .send()
        .await
        .map_err(|e| {
            ConjurError::client_construction(format!("Authentication request failed: {}", e))
        })?;

    let response = check_status(response).map_err(ConjurError::client_construction)?;

    let token = response
        .bytes()
        .await
        .map_err(|e| {
            ConjurError::client_construction(format!("Failed to read access token: {}", e))
        })?;

    Ok(token.to_vec())
}

fn check_status(response: Response) -> std::result::Result<Response, String> {
    if response.status().is_success() {
        Ok(response)
    } else {
        let status = response.status().as_u16();
        error!(status, "Conjur request failed");
        Err(format!("Request failed with status code {}", status))
    }
}

struct HttpConjurApi {
    http: HttpClient,
    base_url: Url,
    account: String,
    access_token: Vec<u8>,
}

impl HttpConjurApi {
    fn authorization_header(&self) -> String {
        format!("Token token=\"{}\"", BASE64.encode(&self.access_token))
    }

    fn batch_url(&self, variable_ids: &[String]) -> Result<Url> {
        let mut url = endpoint(&self.base_url, &["secrets"]).map_err(|e| match e {
            ConjurError::ClientConstruction { message } => ConjurError::retrieval(message),
            other => other,
        })?;

        let ids = variable_ids
            .iter()
            .map(|id| {
                let qualified = format!("{}:variable:{}", self.account, id);
                form_urlencoded::byte_serialize(qualified.as_bytes()).collect::<String>()
            })
            .collect::<Vec<_>>()
            .join(",");
        url.set_query(Some(&format!("variable_ids={}", ids)));

        Ok(url)
    }
}

#[async_trait]
impl ConjurApi for HttpConjurApi {
    async fn retrieve_batch_secrets_safe(
        &self,
        variable_ids: &[String],
    ) -> Result<HashMap<String, Vec<u8>>> {
        let url = self.batch_url(variable_ids)?;

        let response = self
            .http
            .get(url)
            .header(AUTHORIZATION, self.authorization_header())
            .header(ACCEPT_ENCODING, "base64")
            .send()
            .await
            .map_err(|e| ConjurError::retrieval(format!("Batch request failed: {}", e)))?;

        let response = check_status(response).map_err(ConjurError::retrieval)?;

        let base64_encoded = response
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("base64"));

        let body = response
            .bytes()
            .await
            .map_err(|e| ConjurError::retrieval(format!("Failed to read batch response: {}", e)))?;

        let values: HashMap<String, String> = serde_json::from_slice(&body)
            .map_err(|e| ConjurError::retrieval(format!("Invalid batch response: {}", e)))?;

        values
            .into_iter()
            .map(|(id, value)| {
                if base64_encoded {
                    BASE64
                        .decode(value.as_bytes())
                        .map(|decoded| (id.clone(), decoded))
                        .map_err(|e| {
                            let message = format!("Invalid base64 value for {}: {}", id, e);
                            ConjurError::retrieval(message)
                        })
                } else {
                    Ok((id, value.into_bytes()))
                }
            })
            .collect()
    }
}
