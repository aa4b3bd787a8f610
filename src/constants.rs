/// Environment variable holding the access key id
pub const ENV_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";

/// Environment variable holding the secret access key
pub const ENV_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";

/// Environment variable holding the session token
pub const ENV_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";

/// Environment variable naming the default profile
pub const ENV_DEFAULT_PROFILE: &str = "AWS_DEFAULT_PROFILE";

/// Environment variable naming the default region
pub const ENV_DEFAULT_REGION: &str = "AWS_DEFAULT_REGION";

/// Environment variable overriding the config file location
pub const ENV_CONFIG_FILE: &str = "AWS_CONFIG_FILE";

/// Environment variable overriding the shared credentials file location
pub const ENV_SHARED_CREDENTIALS_FILE: &str = "AWS_SHARED_CREDENTIALS_FILE";

/// Default lifetime of MFA and session-token credentials, in seconds
pub const DEFAULT_MFA_SESSION_LIFE_SECONDS: i32 = 900;

/// Default role session name when a caller does not provide one
pub const DEFAULT_ROLE_SESSION_NAME: &str = "awsauth-cli";

/// Default AWS region for STS operations when no region is configured
pub const DEFAULT_AWS_REGION: &str = "us-east-1";

/// Provider name recorded on statically supplied credentials
pub const STATIC_PROVIDER_NAME: &str = "awsauth";
