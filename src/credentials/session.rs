use std::path::PathBuf;

use anyhow::Result;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_config::profile::profile_file::{ProfileFileKind, ProfileFiles};
use aws_credential_types::Credentials as StaticCredentials;
use serde::Serialize;
use tracing::debug;

use super::{CredentialSet, CredentialsError};
use crate::constants::STATIC_PROVIDER_NAME;

/// The populated subset of credential fields a session is built from.
///
/// Exactly one base is carried: static keys (with the token when present)
/// win over a named profile; an empty spec falls through to the provider's
/// own default resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aws_access_key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aws_secret_access_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aws_session_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_name: Option<String>,
}

impl SessionSpec {
    fn from_credentials(credentials: &CredentialSet) -> Self {
        let mut spec = Self {
            region_name: credentials.region.clone(),
            ..Self::default()
        };

        if credentials.has_keys() {
            spec.aws_access_key_id = credentials.access_key_id.clone();
            spec.aws_secret_access_key = credentials.secret_access_key.clone();
            if credentials.has_session_keys() {
                spec.aws_session_token = credentials.session_token.clone();
            }
        } else if credentials.has_profile() {
            spec.profile_name = credentials.profile.clone();
        }

        spec
    }
}

/// Deferred, reusable session constructor returned by
/// [`CredentialSet::session_factory`].
///
/// Captures the credential fields and region at construction time; mutating
/// the originating set afterwards does not affect sessions built here.
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    spec: SessionSpec,
    config_path: Option<PathBuf>,
    credentials_path: Option<PathBuf>,
    abort_on_build: bool,
}

impl SessionBuilder {
    /// The captured spec, before any region override.
    pub fn spec(&self) -> &SessionSpec {
        &self.spec
    }

    /// The spec a session would be built from, with the optional region
    /// override applied.
    ///
    /// When the originating set had `auth_debug` enabled and the factory was
    /// not flagged internal, this fails with
    /// [`CredentialsError::DebugAbort`] instead: the caller decides whether
    /// to honor the abort by exiting.
    pub fn build_spec(&self, region: Option<&str>) -> Result<SessionSpec, CredentialsError> {
        if self.abort_on_build {
            debug!(spec = ?self.spec, "auth debug: refusing to build session");
            return Err(CredentialsError::DebugAbort);
        }

        let mut spec = self.spec.clone();
        if let Some(region) = region {
            spec.region_name = Some(region.to_string());
        }
        Ok(spec)
    }

    /// Materialize an SDK configuration for the captured credentials.
    pub async fn load(&self, region: Option<&str>) -> Result<SdkConfig> {
        let spec = self.build_spec(region)?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest());

        if let (Some(id), Some(secret)) = (&spec.aws_access_key_id, &spec.aws_secret_access_key) {
            loader = loader.credentials_provider(StaticCredentials::new(
                id.clone(),
                secret.clone(),
                spec.aws_session_token.clone(),
                None,
                STATIC_PROVIDER_NAME,
            ));
        } else if let Some(profile) = &spec.profile_name {
            loader = loader.profile_name(profile);
            if self.config_path.is_some() || self.credentials_path.is_some() {
                let mut files = ProfileFiles::builder();
                if let Some(path) = &self.config_path {
                    files = files.with_file(ProfileFileKind::Config, path.clone());
                }
                if let Some(path) = &self.credentials_path {
                    files = files.with_file(ProfileFileKind::Credentials, path.clone());
                }
                loader = loader.profile_files(files.build());
            }
        }

        if let Some(region) = spec.region_name.clone() {
            loader = loader.region(Region::new(region));
        }

        Ok(loader.load().await)
    }
}

impl CredentialSet {
    /// Build a deferred session factory from whichever credential fields are
    /// currently populated.
    ///
    /// `internal` marks factories used by the scope exchanger itself, which
    /// are exempt from the `auth_debug` abort.
    pub fn session_factory(&self, internal: bool) -> SessionBuilder {
        SessionBuilder {
            spec: SessionSpec::from_credentials(self),
            config_path: self.config_path.clone(),
            credentials_path: self.credentials_path.clone(),
            abort_on_build: self.auth_debug && !internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys_with_region() -> CredentialSet {
        CredentialSet {
            region: Some("eu-west-1".to_string()),
            access_key_id: Some("AKIATEST".to_string()),
            secret_access_key: Some("secret".to_string()),
            ..CredentialSet::new()
        }
    }

    #[test]
    fn test_spec_prefers_keys_over_profile() {
        let mut creds = keys_with_region();
        creds.profile = Some("dev".to_string());

        let spec = creds.session_factory(false).build_spec(None).unwrap();
        assert_eq!(spec.aws_access_key_id.as_deref(), Some("AKIATEST"));
        assert_eq!(spec.profile_name, None);
    }

    #[test]
    fn test_spec_includes_token_only_with_full_pair() {
        let mut creds = keys_with_region();
        creds.session_token = Some("token".to_string());
        let spec = creds.session_factory(false).build_spec(None).unwrap();
        assert_eq!(spec.aws_session_token.as_deref(), Some("token"));

        // A lone token without keys never reaches the session
        let dangling = CredentialSet {
            session_token: Some("token".to_string()),
            profile: Some("dev".to_string()),
            ..CredentialSet::new()
        };
        let spec = dangling.session_factory(false).build_spec(None).unwrap();
        assert_eq!(spec.aws_session_token, None);
        assert_eq!(spec.profile_name.as_deref(), Some("dev"));
    }

    #[test]
    fn test_empty_set_yields_empty_spec() {
        let spec = CredentialSet::new().session_factory(false).build_spec(None).unwrap();
        assert_eq!(spec, SessionSpec::default());
    }

    #[test]
    fn test_factory_captures_region_at_construction() {
        let mut creds = keys_with_region();
        let factory = creds.session_factory(false);

        // Mutations after construction are invisible to the factory
        creds.region = Some("us-west-2".to_string());
        creds.access_key_id = Some("AKIALATER".to_string());

        let spec = factory.build_spec(None).unwrap();
        assert_eq!(spec.region_name.as_deref(), Some("eu-west-1"));
        assert_eq!(spec.aws_access_key_id.as_deref(), Some("AKIATEST"));
    }

    #[test]
    fn test_region_override_wins() {
        let creds = keys_with_region();
        let spec = creds
            .session_factory(false)
            .build_spec(Some("ap-northeast-1"))
            .unwrap();
        assert_eq!(spec.region_name.as_deref(), Some("ap-northeast-1"));
    }

    #[test]
    fn test_auth_debug_aborts_external_factories() {
        let mut creds = keys_with_region();
        creds.auth_debug = true;

        let err = creds.session_factory(false).build_spec(None).unwrap_err();
        assert_eq!(err, CredentialsError::DebugAbort);

        // Internal factories (used for the exchange itself) are exempt
        let spec = creds.session_factory(true).build_spec(None).unwrap();
        assert_eq!(spec.aws_access_key_id.as_deref(), Some("AKIATEST"));
    }

    #[test]
    fn test_spec_serializes_populated_fields_only() {
        let creds = CredentialSet {
            profile: Some("dev".to_string()),
            ..CredentialSet::new()
        };
        let spec = creds.session_factory(false).build_spec(None).unwrap();
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "profile_name": "dev" })
        );
    }
}
