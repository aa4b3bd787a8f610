use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_sts::Client as StsClient;
use aws_smithy_types::DateTime;
use tracing::{debug, info};

use crate::constants::DEFAULT_AWS_REGION;
use crate::credentials::CredentialSet;

/// Temporary credentials returned by a scope exchange. The expiration is
/// carried for logging and display; it is not enforced here.
#[derive(Debug, Clone)]
pub struct ScopedCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: DateTime,
}

/// The identity-service calls the scope exchanger depends on. Failures are
/// returned as-is; no retries, no backoff, no translation.
#[async_trait]
pub trait IdentityService {
    async fn assume_role(&self, role_arn: &str, session_name: &str) -> Result<ScopedCredentials>;

    async fn session_token(&self, duration_seconds: i32) -> Result<ScopedCredentials>;

    async fn mfa_session_token(
        &self,
        serial_number: &str,
        duration_seconds: i32,
        token_code: &str,
    ) -> Result<ScopedCredentials>;
}

/// AWS STS client bound to the base credentials of a [`CredentialSet`].
#[derive(Debug, Clone)]
pub struct StsService {
    client: StsClient,
}

impl StsService {
    /// Build an STS client from whichever base credentials are currently
    /// active. Falls back to us-east-1 when no region is configured.
    pub async fn connect(credentials: &CredentialSet) -> Result<Self> {
        let factory = credentials.session_factory(true);

        let config = factory.load(None).await?;
        let config = match config.region() {
            Some(region) => {
                info!("Using region: {}", region);
                config
            }
            None => {
                info!(
                    "No region configured, using default {} for STS",
                    DEFAULT_AWS_REGION
                );
                factory.load(Some(DEFAULT_AWS_REGION)).await?
            }
        };

        Ok(Self {
            client: StsClient::new(&config),
        })
    }

    fn scoped(credentials: &aws_sdk_sts::types::Credentials) -> ScopedCredentials {
        ScopedCredentials {
            access_key_id: credentials.access_key_id().to_string(),
            secret_access_key: credentials.secret_access_key().to_string(),
            session_token: credentials.session_token().to_string(),
            expiration: *credentials.expiration(),
        }
    }
}

#[async_trait]
impl IdentityService for StsService {
    async fn assume_role(&self, role_arn: &str, session_name: &str) -> Result<ScopedCredentials> {
        info!("Calling AWS STS AssumeRole");
        debug!("Role ARN: {}", role_arn);
        debug!("Session name: {}", session_name);

        let response = self
            .client
            .assume_role()
            .role_arn(role_arn)
            .role_session_name(session_name)
            .send()
            .await?;

        let sts_creds = response
            .credentials()
            .context("AWS STS returned no credentials")?;

        info!("Successfully obtained role credentials");
        Ok(Self::scoped(sts_creds))
    }

    async fn session_token(&self, duration_seconds: i32) -> Result<ScopedCredentials> {
        info!("Calling AWS STS GetSessionToken");
        debug!("Duration: {} seconds", duration_seconds);

        let response = self
            .client
            .get_session_token()
            .duration_seconds(duration_seconds)
            .send()
            .await?;

        let sts_creds = response
            .credentials()
            .context("AWS STS returned no credentials")?;

        info!("Successfully obtained session credentials");
        Ok(Self::scoped(sts_creds))
    }

    async fn mfa_session_token(
        &self,
        serial_number: &str,
        duration_seconds: i32,
        token_code: &str,
    ) -> Result<ScopedCredentials> {
        info!("Calling AWS STS GetSessionToken with MFA");
        debug!("MFA serial: {}", serial_number);
        debug!("Duration: {} seconds", duration_seconds);

        let response = self
            .client
            .get_session_token()
            .serial_number(serial_number)
            .duration_seconds(duration_seconds)
            .token_code(token_code)
            .send()
            .await?;

        let sts_creds = response
            .credentials()
            .context("AWS STS returned no credentials")?;

        info!("Successfully obtained MFA session credentials");
        Ok(Self::scoped(sts_creds))
    }
}
