use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;

use thiserror::Error;
use tracing::debug;

use crate::constants::DEFAULT_MFA_SESSION_LIFE_SECONDS;

pub mod resolver;
pub mod scope;
pub mod session;

pub use resolver::{Defaults, Environment, ExplicitCredentials, resolve, validate};
pub use scope::MfaTokenSource;
pub use session::{SessionBuilder, SessionSpec};

/// Errors raised by credential resolution, validation and scope exchange.
///
/// External service failures are not represented here; they propagate
/// unmodified from the STS collaborator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialsError {
    #[error("missing required '--{field}' for '{mode}' authentication")]
    MissingRequiredField { mode: AuthMode, field: Field },
    #[error("'--session-token' requires '--secret-access-key' and '--access-key-id'")]
    IncompleteSessionCredentials,
    #[error("'--profile' cannot be combined with '--secret-access-key'/'--access-key-id'")]
    ConflictingAuthSources,
    #[error("both '--secret-access-key' and '--access-key-id' must be provided")]
    IncompleteKeyPair,
    #[error("could not find keys or profile to assume the role with")]
    NoUsableCredentials,
    #[error("no snapshot to restore: freeze() has not been called")]
    NoSnapshotAvailable,
    #[error("MFA authentication requires an mfa serial")]
    MissingMfaSerial,
    #[error("auth debug: aborting before session construction")]
    DebugAbort,
}

/// A single recognized credential field, used in enforcement errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    AccessKeyId,
    SecretAccessKey,
    SessionToken,
    Profile,
    Role,
    ConfigPath,
    CredentialsPath,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::AccessKeyId => "access-key-id",
            Field::SecretAccessKey => "secret-access-key",
            Field::SessionToken => "session-token",
            Field::Profile => "profile",
            Field::Role => "role",
            Field::ConfigPath => "config-path",
            Field::CredentialsPath => "credentials-path",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a credential set authenticates. Derived from field presence, never
/// stored; used to narrow which fields resolution requests and requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Keys,
    KeysWithSession,
    Profile,
    ProfileWithRole,
    ConfigFile,
    CredentialsFile,
    Unconstrained,
}

impl AuthMode {
    /// Fields that must resolve to a value under this mode.
    pub fn required_fields(self) -> &'static [Field] {
        match self {
            AuthMode::Keys => &[Field::AccessKeyId, Field::SecretAccessKey],
            AuthMode::KeysWithSession => {
                &[Field::AccessKeyId, Field::SecretAccessKey, Field::SessionToken]
            }
            AuthMode::Profile => &[Field::Profile],
            AuthMode::ProfileWithRole => &[Field::Profile, Field::Role],
            AuthMode::ConfigFile => &[Field::ConfigPath],
            AuthMode::CredentialsFile => &[Field::CredentialsPath],
            AuthMode::Unconstrained => &[],
        }
    }

    /// Whether this mode requests the field at all. Fields outside the
    /// requested set are left unresolved, mirroring an argument parser that
    /// never offers the flag.
    pub fn requests(self, field: Field) -> bool {
        match self {
            AuthMode::Unconstrained => true,
            AuthMode::Keys
            | AuthMode::KeysWithSession
            | AuthMode::Profile
            | AuthMode::ProfileWithRole => self.required_fields().contains(&field),
            AuthMode::ConfigFile => field == Field::ConfigPath,
            AuthMode::CredentialsFile => field == Field::CredentialsPath,
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuthMode::Keys => "keys",
            AuthMode::KeysWithSession => "keys_with_session",
            AuthMode::Profile => "profile",
            AuthMode::ProfileWithRole => "profile_role",
            AuthMode::ConfigFile => "config",
            AuthMode::CredentialsFile => "credentials",
            AuthMode::Unconstrained => "unconstrained",
        })
    }
}

/// Point-in-time copy of the restorable subset of a [`CredentialSet`].
///
/// Owned by the set that produced it; a later `freeze()` overwrites it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    region: Option<String>,
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
    session_token: Option<String>,
    profile: Option<String>,
    role: Option<String>,
    mfa_serial: Option<String>,
}

/// Merged AWS authentication material.
///
/// Created once by [`resolve`]; the key fields may later be overwritten in
/// place by a successful scope exchange and rolled back via
/// [`CredentialSet::reset`].
#[derive(Debug, Clone, Default)]
pub struct CredentialSet {
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
    pub mfa_session_life: i32,
    pub mfa_token: Option<String>,
    pub force_mfa: bool,
    pub auth_debug: bool,
    snapshot: Option<Snapshot>,
    // Pre-exchange key values, kept for diagnostic inspection only. reset()
    // restores from the snapshot, never from these.
    previous_access_key_id: Option<String>,
    previous_secret_access_key: Option<String>,
    previous_session_token: Option<String>,
    mfa_authenticated: bool,
}

impl CredentialSet {
    pub fn new() -> Self {
        Self {
            mfa_session_life: DEFAULT_MFA_SESSION_LIFE_SECONDS,
            ..Self::default()
        }
    }

    /// Do we have a static key pair?
    pub fn has_keys(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some()
    }

    /// Do we have a key pair plus a session token?
    pub fn has_session_keys(&self) -> bool {
        self.session_token.is_some() && self.has_keys()
    }

    pub fn has_profile(&self) -> bool {
        self.profile.is_some()
    }

    pub fn has_role(&self) -> bool {
        self.role.is_some()
    }

    pub fn has_mfa(&self) -> bool {
        self.mfa_serial.is_some()
    }

    /// A role plus a base (keys or profile) capable of assuming it.
    pub fn using_role(&self) -> bool {
        self.has_role() && (self.has_keys() || self.has_profile())
    }

    pub fn is_mfa_authenticated(&self) -> bool {
        self.mfa_authenticated
    }

    /// Classify the active authentication mode from field presence.
    pub fn classify(&self) -> AuthMode {
        if self.has_session_keys() {
            AuthMode::KeysWithSession
        } else if self.has_keys() {
            AuthMode::Keys
        } else if self.has_profile() && self.has_role() {
            AuthMode::ProfileWithRole
        } else if self.has_profile() {
            AuthMode::Profile
        } else if self.credentials_path.is_some() {
            AuthMode::CredentialsFile
        } else if self.config_path.is_some() {
            AuthMode::ConfigFile
        } else {
            AuthMode::Unconstrained
        }
    }

    /// Snapshot the restorable fields so a later [`reset`](Self::reset) can
    /// roll back a scope exchange. Overwrites any previous snapshot.
    pub fn freeze(&mut self) -> &mut Self {
        self.snapshot = Some(Snapshot {
            region: self.region.clone(),
            access_key_id: self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
            session_token: self.session_token.clone(),
            profile: self.profile.clone(),
            role: self.role.clone(),
            mfa_serial: self.mfa_serial.clone(),
        });
        debug!(snapshot = ?self.snapshot, "froze credential state");
        self
    }

    /// Restore every restorable field from the snapshot taken by
    /// [`freeze`](Self::freeze). The snapshot survives the restore and may
    /// be applied again.
    pub fn reset(&mut self) -> Result<&mut Self, CredentialsError> {
        let snapshot = self
            .snapshot
            .as_ref()
            .ok_or(CredentialsError::NoSnapshotAvailable)?;
        self.region = snapshot.region.clone();
        self.access_key_id = snapshot.access_key_id.clone();
        self.secret_access_key = snapshot.secret_access_key.clone();
        self.session_token = snapshot.session_token.clone();
        self.profile = snapshot.profile.clone();
        self.role = snapshot.role.clone();
        self.mfa_serial = snapshot.mfa_serial.clone();
        debug!("restored credential state from snapshot");
        Ok(self)
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    /// Pre-exchange key values, if a scope exchange has happened. Diagnostic
    /// only.
    pub fn previous_keys(&self) -> (Option<&str>, Option<&str>, Option<&str>) {
        (
            self.previous_access_key_id.as_deref(),
            self.previous_secret_access_key.as_deref(),
            self.previous_session_token.as_deref(),
        )
    }

    pub(crate) fn remember_previous_keys(&mut self) {
        self.previous_access_key_id = self.access_key_id.clone();
        self.previous_secret_access_key = self.secret_access_key.clone();
        self.previous_session_token = self.session_token.clone();
    }

    pub(crate) fn mark_mfa_authenticated(&mut self) {
        self.mfa_authenticated = true;
    }
}

static DEFAULT_CREDENTIALS: OnceLock<CredentialSet> = OnceLock::new();

/// Install a process-wide default credential set for legacy call sites that
/// cannot carry the object explicitly. Only the first call wins; the default
/// is never reassigned. Returns whether this call installed it.
pub fn install_default(credentials: &CredentialSet) -> bool {
    DEFAULT_CREDENTIALS.set(credentials.clone()).is_ok()
}

/// The process-wide default credential set, if one has been installed.
pub fn default_credentials() -> Option<&'static CredentialSet> {
    DEFAULT_CREDENTIALS.get()
}
