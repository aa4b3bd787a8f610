use anyhow::{Context, Result};
use dialoguer::{Input, theme::ColorfulTheme};
use tracing::{debug, info};

use super::{CredentialSet, CredentialsError};
use crate::constants::DEFAULT_ROLE_SESSION_NAME;
use crate::sts::{IdentityService, ScopedCredentials};

/// Source of an MFA token code. The production implementation blocks on an
/// interactive prompt; callers that cannot block pre-supply `mfa_token` on
/// the credential set instead.
pub trait MfaTokenSource {
    fn token(&self, mfa_serial: &str) -> Result<String>;
}

/// Interactive prompt backed by the terminal.
#[derive(Debug, Default)]
pub struct TokenPrompt;

impl MfaTokenSource for TokenPrompt {
    fn token(&self, mfa_serial: &str) -> Result<String> {
        Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Enter MFA token for {mfa_serial}"))
            .interact_text()
            .context("Failed to read MFA token")
    }
}

impl CredentialSet {
    /// Exchange the base credentials for role-scoped ones.
    ///
    /// Requires a role plus something to assume it with (keys or a profile),
    /// otherwise fails with [`CredentialsError::NoUsableCredentials`] before
    /// any external call. Freezes the current state first so the exchange
    /// can be rolled back with [`reset`](Self::reset).
    pub async fn assume_role(&mut self, service: &dyn IdentityService) -> Result<&mut Self> {
        if !self.using_role() {
            debug!("assume_role: no usable base credentials");
            return Err(CredentialsError::NoUsableCredentials.into());
        }

        self.freeze();

        let role = self
            .role
            .clone()
            .ok_or(CredentialsError::NoUsableCredentials)?;
        let session_name = self
            .role_session_name
            .clone()
            .unwrap_or_else(|| DEFAULT_ROLE_SESSION_NAME.to_string());

        info!(role = %role, session_name = %session_name, "assuming role");
        let scoped = service.assume_role(&role, &session_name).await?;
        self.switch_auth_scope(scoped);

        Ok(self)
    }

    /// Exchange the base credentials for a plain temporary session. No role
    /// required and no implicit freeze; this does not narrow an existing
    /// scope, so rollback is not expected.
    pub async fn assume_temp_session(
        &mut self,
        service: &dyn IdentityService,
    ) -> Result<&mut Self> {
        info!(duration = self.mfa_session_life, "requesting temporary session");
        let scoped = service.session_token(self.mfa_session_life).await?;
        self.switch_auth_scope(scoped);
        Ok(self)
    }

    /// Exchange the base credentials for an MFA-gated session.
    ///
    /// Uses the pre-supplied `mfa_token` when present; otherwise blocks on
    /// `tokens` until a code is entered.
    pub async fn authenticate_mfa(
        &mut self,
        service: &dyn IdentityService,
        tokens: &dyn MfaTokenSource,
    ) -> Result<&mut Self> {
        let serial = self
            .mfa_serial
            .clone()
            .ok_or(CredentialsError::MissingMfaSerial)?;

        let token = match self.mfa_token.clone() {
            Some(token) => token,
            None => tokens.token(&serial)?,
        };

        info!(serial = %serial, duration = self.mfa_session_life, "requesting MFA session");
        let scoped = service
            .mfa_session_token(&serial, self.mfa_session_life, &token)
            .await?;
        self.switch_auth_scope(scoped);
        self.mark_mfa_authenticated();

        Ok(self)
    }

    /// Unconditionally overwrite the active key fields with an exchange
    /// response, keeping the old values in the diagnostic shadow fields.
    fn switch_auth_scope(&mut self, scoped: ScopedCredentials) {
        self.remember_previous_keys();

        debug!(expiration = ?scoped.expiration, "switching auth scope");
        self.access_key_id = Some(scoped.access_key_id);
        self.secret_access_key = Some(scoped.secret_access_key);
        self.session_token = Some(scoped.session_token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use async_trait::async_trait;
    use aws_smithy_types::DateTime;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        AssumeRole { role: String, session_name: String },
        SessionToken { duration: i32 },
        MfaSessionToken { serial: String, duration: i32, token: String },
    }

    #[derive(Default)]
    struct FakeSts {
        calls: Mutex<Vec<Call>>,
    }

    impl FakeSts {
        fn scoped() -> ScopedCredentials {
            ScopedCredentials {
                access_key_id: "X".to_string(),
                secret_access_key: "Y".to_string(),
                session_token: "Z".to_string(),
                expiration: DateTime::from_secs(1_700_000_000),
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl IdentityService for FakeSts {
        async fn assume_role(
            &self,
            role_arn: &str,
            session_name: &str,
        ) -> Result<ScopedCredentials> {
            self.calls.lock().unwrap().push(Call::AssumeRole {
                role: role_arn.to_string(),
                session_name: session_name.to_string(),
            });
            Ok(Self::scoped())
        }

        async fn session_token(&self, duration_seconds: i32) -> Result<ScopedCredentials> {
            self.calls.lock().unwrap().push(Call::SessionToken {
                duration: duration_seconds,
            });
            Ok(Self::scoped())
        }

        async fn mfa_session_token(
            &self,
            serial_number: &str,
            duration_seconds: i32,
            token_code: &str,
        ) -> Result<ScopedCredentials> {
            self.calls.lock().unwrap().push(Call::MfaSessionToken {
                serial: serial_number.to_string(),
                duration: duration_seconds,
                token: token_code.to_string(),
            });
            Ok(Self::scoped())
        }
    }

    struct FailingSts;

    #[async_trait]
    impl IdentityService for FailingSts {
        async fn assume_role(&self, _: &str, _: &str) -> Result<ScopedCredentials> {
            bail!("AccessDenied: not authorized to perform sts:AssumeRole")
        }

        async fn session_token(&self, _: i32) -> Result<ScopedCredentials> {
            bail!("service unreachable")
        }

        async fn mfa_session_token(&self, _: &str, _: i32, _: &str) -> Result<ScopedCredentials> {
            bail!("service unreachable")
        }
    }

    struct CannedToken(&'static str);

    impl MfaTokenSource for CannedToken {
        fn token(&self, _: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct UnusedPrompt;

    impl MfaTokenSource for UnusedPrompt {
        fn token(&self, _: &str) -> Result<String> {
            panic!("token source should not be consulted");
        }
    }

    fn role_with_keys() -> CredentialSet {
        CredentialSet {
            access_key_id: Some("AKIABASE".to_string()),
            secret_access_key: Some("base-secret".to_string()),
            role: Some("arn:aws:iam::123456789012:role/Deploy".to_string()),
            role_session_name: Some("test-session".to_string()),
            ..CredentialSet::new()
        }
    }

    #[tokio::test]
    async fn test_assume_role_exchanges_and_freezes() {
        let sts = FakeSts::default();
        let mut creds = role_with_keys();

        creds.assume_role(&sts).await.unwrap();

        assert_eq!(creds.access_key_id.as_deref(), Some("X"));
        assert_eq!(creds.secret_access_key.as_deref(), Some("Y"));
        assert_eq!(creds.session_token.as_deref(), Some("Z"));
        assert_eq!(
            sts.calls(),
            vec![Call::AssumeRole {
                role: "arn:aws:iam::123456789012:role/Deploy".to_string(),
                session_name: "test-session".to_string(),
            }]
        );

        // The exchange froze the base state, so it can be rolled back
        creds.reset().unwrap();
        assert_eq!(creds.access_key_id.as_deref(), Some("AKIABASE"));
        assert_eq!(creds.secret_access_key.as_deref(), Some("base-secret"));
        assert_eq!(creds.session_token, None);
    }

    #[tokio::test]
    async fn test_assume_role_without_base_makes_no_call() {
        let sts = FakeSts::default();
        let mut creds = CredentialSet {
            role: Some("arn:aws:iam::123456789012:role/Deploy".to_string()),
            ..CredentialSet::new()
        };

        let err = creds.assume_role(&sts).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CredentialsError>(),
            Some(CredentialsError::NoUsableCredentials)
        ));
        assert!(sts.calls().is_empty());
        // And nothing was frozen
        assert!(creds.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_assume_role_defaults_session_name() {
        let sts = FakeSts::default();
        let mut creds = role_with_keys();
        creds.role_session_name = None;

        creds.assume_role(&sts).await.unwrap();

        assert_eq!(
            sts.calls(),
            vec![Call::AssumeRole {
                role: "arn:aws:iam::123456789012:role/Deploy".to_string(),
                session_name: DEFAULT_ROLE_SESSION_NAME.to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_exchange_overwrites_unconditionally() {
        let sts = FakeSts::default();
        let mut creds = CredentialSet {
            access_key_id: Some("AKIAOLD".to_string()),
            secret_access_key: Some("old-secret".to_string()),
            session_token: Some("old-token".to_string()),
            ..CredentialSet::new()
        };

        creds.assume_temp_session(&sts).await.unwrap();

        assert_eq!(creds.access_key_id.as_deref(), Some("X"));
        assert_eq!(creds.secret_access_key.as_deref(), Some("Y"));
        assert_eq!(creds.session_token.as_deref(), Some("Z"));
        // Old values survive in the diagnostic shadow fields only
        assert_eq!(
            creds.previous_keys(),
            (Some("AKIAOLD"), Some("old-secret"), Some("old-token"))
        );
    }

    #[tokio::test]
    async fn test_temp_session_uses_configured_lifetime() {
        let sts = FakeSts::default();
        let mut creds = CredentialSet {
            mfa_session_life: 3600,
            ..CredentialSet::new()
        };

        creds.assume_temp_session(&sts).await.unwrap();
        assert_eq!(sts.calls(), vec![Call::SessionToken { duration: 3600 }]);
    }

    #[tokio::test]
    async fn test_authenticate_mfa_with_presupplied_token() {
        let sts = FakeSts::default();
        let mut creds = CredentialSet {
            mfa_serial: Some("arn:aws:iam::123456789012:mfa/user".to_string()),
            mfa_token: Some("123456".to_string()),
            ..CredentialSet::new()
        };

        creds.authenticate_mfa(&sts, &UnusedPrompt).await.unwrap();

        assert!(creds.is_mfa_authenticated());
        assert_eq!(
            sts.calls(),
            vec![Call::MfaSessionToken {
                serial: "arn:aws:iam::123456789012:mfa/user".to_string(),
                duration: 900,
                token: "123456".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_authenticate_mfa_prompts_when_no_token() {
        let sts = FakeSts::default();
        let mut creds = CredentialSet {
            mfa_serial: Some("arn:aws:iam::123456789012:mfa/user".to_string()),
            ..CredentialSet::new()
        };

        creds
            .authenticate_mfa(&sts, &CannedToken("654321"))
            .await
            .unwrap();

        assert_eq!(
            sts.calls(),
            vec![Call::MfaSessionToken {
                serial: "arn:aws:iam::123456789012:mfa/user".to_string(),
                duration: 900,
                token: "654321".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_authenticate_mfa_requires_serial() {
        let sts = FakeSts::default();
        let mut creds = CredentialSet::new();

        let err = creds
            .authenticate_mfa(&sts, &UnusedPrompt)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CredentialsError>(),
            Some(CredentialsError::MissingMfaSerial)
        ));
        assert!(sts.calls().is_empty());
        assert!(!creds.is_mfa_authenticated());
    }

    #[tokio::test]
    async fn test_service_failure_propagates_and_leaves_keys_untouched() {
        let mut creds = role_with_keys();

        let err = creds.assume_role(&FailingSts).await.unwrap_err();
        assert!(err.to_string().contains("AccessDenied"));

        // Keys were not overwritten by the failed exchange
        assert_eq!(creds.access_key_id.as_deref(), Some("AKIABASE"));
        assert_eq!(creds.session_token, None);
    }
}
