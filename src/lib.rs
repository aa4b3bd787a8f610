pub mod cli;
pub mod constants;
pub mod credentials;
pub mod sts;

pub use credentials::{
    AuthMode, CredentialSet, CredentialsError, Defaults, Environment, ExplicitCredentials, Field,
    MfaTokenSource, SessionBuilder, SessionSpec, Snapshot, default_credentials, install_default,
    resolve, validate,
};
pub use sts::{IdentityService, ScopedCredentials, StsService};
