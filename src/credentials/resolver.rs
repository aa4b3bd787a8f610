use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use tracing::debug;

use super::{AuthMode, CredentialSet, CredentialsError, Field};
use crate::constants::{
    DEFAULT_MFA_SESSION_LIFE_SECONDS, ENV_ACCESS_KEY_ID, ENV_CONFIG_FILE, ENV_DEFAULT_PROFILE,
    ENV_DEFAULT_REGION, ENV_SECRET_ACCESS_KEY, ENV_SESSION_TOKEN, ENV_SHARED_CREDENTIALS_FILE,
};

/// Values supplied explicitly by the caller (CLI flags, library arguments).
/// These outrank every other source.
#[derive(Debug, Clone, Default)]
pub struct ExplicitCredentials {
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    pub profile: Option<String>,
    pub role: Option<String>,
    pub role_session_name: Option<String>,
    pub config_path: Option<PathBuf>,
    pub credentials_path: Option<PathBuf>,
    pub mfa_serial: Option<String>,
    pub mfa_session_life: Option<i32>,
    pub mfa_token: Option<String>,
    pub force_mfa: bool,
    pub auth_debug: bool,
}

/// Snapshot of the relevant environment variables. Resolution never reads
/// the process environment directly, so precedence stays in one place and
/// tests stay pure.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    /// Capture the recognized variables from the process environment.
    pub fn from_process() -> Self {
        let vars = [
            ENV_ACCESS_KEY_ID,
            ENV_SECRET_ACCESS_KEY,
            ENV_SESSION_TOKEN,
            ENV_DEFAULT_PROFILE,
            ENV_DEFAULT_REGION,
            ENV_CONFIG_FILE,
            ENV_SHARED_CREDENTIALS_FILE,
        ]
        .into_iter()
        .filter_map(|name| env::var(name).ok().map(|value| (name.to_string(), value)))
        .collect();
        Self { vars }
    }

    /// The variable's value, with empty strings treated as unset.
    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str).filter(|v| !v.is_empty())
    }
}

impl<const N: usize> From<[(&str, &str); N]> for Environment {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

/// Static fallbacks, the lowest-priority source.
#[derive(Debug, Clone, Default)]
pub struct Defaults {
    pub region: Option<String>,
    pub profile: Option<String>,
    pub role_session_name: Option<String>,
}

/// Merge explicit values, environment variables and defaults into one
/// credential set.
///
/// Per-field precedence: explicit non-empty value, then environment
/// variable, then static default, then absent. When `enforced_mode` is
/// given, fields outside that mode's set are not requested at all and the
/// mode's required fields must resolve, otherwise
/// [`CredentialsError::MissingRequiredField`] is returned.
pub fn resolve(
    explicit: ExplicitCredentials,
    environment: &Environment,
    defaults: &Defaults,
    enforced_mode: Option<AuthMode>,
) -> Result<CredentialSet, CredentialsError> {
    let mode = enforced_mode.unwrap_or(AuthMode::Unconstrained);

    let pick = |field: Field, value: Option<String>, env_name: Option<&str>, fallback: Option<&String>| {
        if !mode.requests(field) {
            return None;
        }
        value
            .filter(|v| !v.is_empty())
            .or_else(|| {
                env_name
                    .and_then(|name| environment.var(name))
                    .map(str::to_string)
            })
            .or_else(|| fallback.cloned())
    };

    let credentials = CredentialSet {
        region: explicit
            .region
            .filter(|v| !v.is_empty())
            .or_else(|| environment.var(ENV_DEFAULT_REGION).map(str::to_string))
            .or_else(|| defaults.region.clone()),
        access_key_id: pick(
            Field::AccessKeyId,
            explicit.access_key_id,
            Some(ENV_ACCESS_KEY_ID),
            None,
        ),
        secret_access_key: pick(
            Field::SecretAccessKey,
            explicit.secret_access_key,
            Some(ENV_SECRET_ACCESS_KEY),
            None,
        ),
        session_token: pick(
            Field::SessionToken,
            explicit.session_token,
            Some(ENV_SESSION_TOKEN),
            None,
        ),
        profile: pick(
            Field::Profile,
            explicit.profile,
            Some(ENV_DEFAULT_PROFILE),
            defaults.profile.as_ref(),
        ),
        role: pick(Field::Role, explicit.role, None, None),
        role_session_name: explicit
            .role_session_name
            .filter(|v| !v.is_empty())
            .or_else(|| defaults.role_session_name.clone()),
        config_path: pick(
            Field::ConfigPath,
            explicit.config_path.map(|p| p.to_string_lossy().into_owned()),
            Some(ENV_CONFIG_FILE),
            None,
        )
        .map(PathBuf::from),
        credentials_path: pick(
            Field::CredentialsPath,
            explicit
                .credentials_path
                .map(|p| p.to_string_lossy().into_owned()),
            Some(ENV_SHARED_CREDENTIALS_FILE),
            None,
        )
        .map(PathBuf::from),
        mfa_serial: explicit.mfa_serial.filter(|v| !v.is_empty()),
        mfa_session_life: explicit
            .mfa_session_life
            .unwrap_or(DEFAULT_MFA_SESSION_LIFE_SECONDS),
        mfa_token: explicit.mfa_token.filter(|v| !v.is_empty()),
        force_mfa: explicit.force_mfa,
        auth_debug: explicit.auth_debug,
        ..CredentialSet::new()
    };

    if let Some(mode) = enforced_mode {
        for &field in mode.required_fields() {
            let resolved = match field {
                Field::AccessKeyId => credentials.access_key_id.is_some(),
                Field::SecretAccessKey => credentials.secret_access_key.is_some(),
                Field::SessionToken => credentials.session_token.is_some(),
                Field::Profile => credentials.profile.is_some(),
                Field::Role => credentials.role.is_some(),
                Field::ConfigPath => credentials.config_path.is_some(),
                Field::CredentialsPath => credentials.credentials_path.is_some(),
            };
            if !resolved {
                return Err(CredentialsError::MissingRequiredField { mode, field });
            }
        }
    }

    debug!(mode = %credentials.classify(), "resolved credential set");
    Ok(credentials)
}

/// Cross-field consistency checks for the unconstrained path, where no mode
/// was enforced at resolution time. Success is the absence of failure.
pub fn validate(credentials: &CredentialSet) -> Result<(), CredentialsError> {
    // 1 - A session token is only meaningful on top of a full key pair
    if credentials.session_token.is_some()
        && (credentials.secret_access_key.is_none() || credentials.access_key_id.is_none())
    {
        return Err(CredentialsError::IncompleteSessionCredentials);
    }

    // 2 - A profile and explicit keys are competing base modes
    if credentials.profile.is_some()
        && (credentials.access_key_id.is_some() || credentials.secret_access_key.is_some())
    {
        return Err(CredentialsError::ConflictingAuthSources);
    }

    // 3 - Keys come in pairs
    if credentials.access_key_id.is_some() != credentials.secret_access_key.is_some() {
        return Err(CredentialsError::IncompleteKeyPair);
    }

    Ok(())
}
