//! Per-request Conjur client configuration.

use std::fmt;

use url::Url;

use super::error::{ConjurError, Result};

/// Prefix of the `authnId` attribute that names the JWT authenticator.
pub const AUTHN_JWT_PREFIX: &str = "authn-jwt/";

/// Conjur connection attributes taken from a mount request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub appliance_url: String,
    pub authn_id: String,
    pub account: String,
    pub identity: String,
    pub ssl_certificate: String,
}

impl ConnectionParams {
    /// Service ID of the JWT authenticator, e.g. `kube` for `authn-jwt/kube`.
    pub fn service_id(&self) -> &str {
        self.authn_id.strip_prefix(AUTHN_JWT_PREFIX).unwrap_or(&self.authn_id)
    }
}

/// Authenticator used to obtain a Conjur access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthnType {
    Jwt,
}

impl AuthnType {
    /// Authenticator name as it appears after `authn-` in Conjur URLs.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthnType::Jwt => "jwt",
        }
    }
}

/// Configuration handed to a [`ConjurApiFactory`](super::ConjurApiFactory).
///
/// Built for a single authenticate-and-retrieve call and dropped afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct ConjurConfig {
    pub account: String,
    pub appliance_url: String,
    pub ssl_cert: String,
    pub authn_type: AuthnType,
    pub service_id: String,
    pub jwt_host_id: String,
    pub jwt_content: String,
}

impl fmt::Debug for ConjurConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConjurConfig")
            .field("account", &self.account)
            .field("appliance_url", &self.appliance_url)
            .field("ssl_cert", &format!("[{} bytes PEM]", self.ssl_cert.len()))
            .field("authn_type", &self.authn_type)
            .field("service_id", &self.service_id)
            .field("jwt_host_id", &self.jwt_host_id)
            .field("jwt_content", &"[REDACTED]")
            .finish()
    }
}

impl ConjurConfig {
    /// Build a JWT-authenticated configuration for the given connection.
    pub fn for_jwt(params: &ConnectionParams, jwt: &str) -> Self {
        Self {
            account: params.account.clone(),
            appliance_url: params.appliance_url.clone(),
            ssl_cert: params.ssl_certificate.clone(),
            authn_type: AuthnType::Jwt,
            service_id: params.service_id().to_string(),
            jwt_host_id: params.identity.clone(),
            jwt_content: jwt.to_string(),
        }
    }

    /// Structural validation, reporting every problem at once.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.appliance_url.is_empty() {
            problems.push("Must specify an ApplianceURL".to_string());
        } else if let Err(e) = Url::parse(&self.appliance_url) {
            problems.push(format!("ApplianceURL is not a valid URL: {}", e));
        }

        if self.account.is_empty() {
            problems.push("Must specify an Account".to_string());
        }

        match self.authn_type {
            AuthnType::Jwt => {
                if self.service_id.is_empty() {
                    problems.push("Must specify a ServiceID when using authn-jwt".to_string());
                }
                if self.jwt_content.is_empty() {
                    problems.push("Must specify JWT content when using authn-jwt".to_string());
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConjurError::ConfigValidation { problems })
        }
    }
}
