use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser};

use crate::constants::{
    DEFAULT_MFA_SESSION_LIFE_SECONDS, DEFAULT_ROLE_SESSION_NAME, ENV_ACCESS_KEY_ID,
    ENV_DEFAULT_PROFILE, ENV_DEFAULT_REGION, ENV_SECRET_ACCESS_KEY, ENV_SESSION_TOKEN,
};
use crate::credentials::{
    self, Defaults, Environment, ExplicitCredentials, SessionSpec, resolve, scope::TokenPrompt,
    validate,
};
use crate::sts::StsService;

/// Thin declarative flag layer over the credential resolver. Flags are the
/// explicit source; the matching environment variables are merged by the
/// resolver, not by the parser.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "awsauth",
    version,
    about = "Resolve AWS credentials and exchange them for scoped sessions",
    long_about = None
)]
pub struct Cli {
    #[arg(long, help = "AWS access key (overrides AWS_ACCESS_KEY_ID)")]
    pub access_key_id: Option<String>,

    #[arg(
        long,
        help = "AWS secret key; key flags override credential and config files"
    )]
    pub secret_access_key: Option<String>,

    #[arg(
        long,
        help = "Session token, only needed with temporary security credentials"
    )]
    pub session_token: Option<String>,

    #[arg(
        short = 'p',
        long,
        help = "Profile from the credential or config file to use as the base"
    )]
    pub profile: Option<String>,

    #[arg(long, help = "Fully qualified role arn to assume")]
    pub role: Option<String>,

    #[arg(long, help = "Name for the assumed role session")]
    pub role_session_name: Option<String>,

    #[arg(long, help = "Overrides the default region of the in-use profile")]
    pub region: Option<String>,

    #[arg(long, help = "Custom location for ~/.aws/config")]
    pub config_path: Option<PathBuf>,

    #[arg(long, help = "Custom location for ~/.aws/credentials")]
    pub credentials_path: Option<PathBuf>,

    #[arg(long, help = "MFA device serial id; you will be prompted for a token")]
    pub mfa_serial: Option<String>,

    #[arg(
        long,
        default_value_t = DEFAULT_MFA_SESSION_LIFE_SECONDS,
        help = "Lifetime in seconds for MFA and session-token credentials"
    )]
    pub mfa_session_life: i32,

    #[arg(long, help = "MFA token, to avoid the interactive prompt")]
    pub mfa_token: Option<String>,

    #[arg(long, help = "Authenticate an MFA session before anything else")]
    pub force_mfa: bool,

    #[arg(
        long,
        help = "Debug mode: print resolution detail and abort before building a session"
    )]
    pub auth_debug: bool,

    #[arg(long, help = "Exchange the base credentials for a temporary session")]
    pub use_sts: bool,

    #[arg(long, help = "Print the resolved credentials as shell export lines")]
    pub shell_init: bool,

    #[arg(short = 'v', long, global = true, action = ArgAction::Count, help = "Increase verbosity (-v info, -vv debug, -vvv trace)")]
    pub verbose: u8,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let environment = Environment::from_process();
        let defaults = Defaults {
            role_session_name: Some(DEFAULT_ROLE_SESSION_NAME.to_string()),
            ..Defaults::default()
        };

        let mut creds = resolve(self.explicit(), &environment, &defaults, None)?;
        validate(&creds)?;

        // Legacy accessor for call sites that cannot carry the object
        credentials::install_default(&creds);

        if creds.has_mfa() && (creds.force_mfa || creds.mfa_token.is_some()) {
            let sts = StsService::connect(&creds).await?;
            creds.authenticate_mfa(&sts, &TokenPrompt).await?;
        }

        if creds.has_role() {
            let sts = StsService::connect(&creds).await?;
            creds.assume_role(&sts).await?;
        } else if self.use_sts {
            let sts = StsService::connect(&creds).await?;
            creds.assume_temp_session(&sts).await?;
        }

        let spec = creds.session_factory(false).build_spec(None)?;

        if self.shell_init {
            print!("{}", shell_exports(&spec));
        } else {
            println!("{}", serde_json::to_string_pretty(&spec)?);
        }

        Ok(())
    }

    fn explicit(&self) -> ExplicitCredentials {
        ExplicitCredentials {
            region: self.region.clone(),
            access_key_id: self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
            session_token: self.session_token.clone(),
            profile: self.profile.clone(),
            role: self.role.clone(),
            role_session_name: self.role_session_name.clone(),
            config_path: self.config_path.clone(),
            credentials_path: self.credentials_path.clone(),
            mfa_serial: self.mfa_serial.clone(),
            mfa_session_life: Some(self.mfa_session_life),
            mfa_token: self.mfa_token.clone(),
            force_mfa: self.force_mfa,
            auth_debug: self.auth_debug,
        }
    }
}

/// Render the session spec as `export` lines for `eval` in a shell.
fn shell_exports(spec: &SessionSpec) -> String {
    let mut lines = String::new();
    let pairs = [
        (ENV_ACCESS_KEY_ID, &spec.aws_access_key_id),
        (ENV_SECRET_ACCESS_KEY, &spec.aws_secret_access_key),
        (ENV_SESSION_TOKEN, &spec.aws_session_token),
        (ENV_DEFAULT_PROFILE, &spec.profile_name),
        (ENV_DEFAULT_REGION, &spec.region_name),
    ];
    for (name, value) in pairs {
        if let Some(value) = value {
            lines.push_str(&format!("export {name}=\"{value}\"\n"));
        }
    }
    lines
}
