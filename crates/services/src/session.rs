//! Account session lifecycle.
//!
//! A session is a UUID token bound to an account name and the address it
//! was issued to. Issuing overwrites any stored token, so an account has
//! at most one live session; logging on from a second machine silently
//! ends the first.

use std::sync::Arc;

use auth_adapters::password::verify_password;
use domains::models::UserRecord;
use domains::ports::AccountRepo;
use domains::{DomainError, Result};
use uuid::Uuid;

use crate::audit::{actions, AuditTrail};

pub struct SessionService {
    accounts: Arc<dyn AccountRepo>,
    audit: AuditTrail,
}

impl SessionService {
    pub fn new(accounts: Arc<dyn AccountRepo>, audit: AuditTrail) -> Self {
        Self { accounts, audit }
    }

    /// Checks a name/password pair and, on success, issues a fresh token
    /// bound to `ip`. Unknown accounts and wrong passwords are
    /// indistinguishable to the caller.
    pub async fn logon(&self, name: &str, password: &str, ip: &str) -> Result<(UserRecord, String)> {
        let creds = match self.accounts.credentials(name).await {
            Ok(creds) => creds,
            Err(DomainError::NotFound(_)) => {
                return Err(DomainError::SessionRejected("bad credentials"))
            }
            Err(err) => return Err(err),
        };
        if !verify_password(password, &creds.password_hash) {
            return Err(DomainError::SessionRejected("bad credentials"));
        }
        if creds.disabled {
            return Err(DomainError::SessionRejected("account disabled"));
        }

        let token = self.issue(name, ip).await?;
        let user = self.accounts.user_by_name(name).await?;
        self.audit
            .record(user.id, actions::LOGON, &format!("{name} logged on"))
            .await;
        Ok((user, token))
    }

    /// Issues a new token for `name`, replacing any previous session.
    pub async fn issue(&self, name: &str, ip: &str) -> Result<String> {
        let token = Uuid::new_v4().to_string();
        self.accounts.store_token(name, &token, ip).await?;
        Ok(token)
    }

    /// Validates a presented token against the stored session state.
    ///
    /// The checks run in a fixed order and the first failure wins:
    /// unknown account, disabled account, no session on record, malformed
    /// presented token, address mismatch, token mismatch.
    pub async fn validate(&self, name: &str, token: &str, ip: &str) -> Result<UserRecord> {
        let state = match self.accounts.session_state(name).await {
            Ok(state) => state,
            Err(DomainError::NotFound(_)) => {
                return Err(DomainError::SessionRejected("unknown account"))
            }
            Err(err) => return Err(err),
        };
        if state.disabled {
            return Err(DomainError::SessionRejected("account disabled"));
        }
        let stored_token = state.token.unwrap_or_default();
        let stored_ip = state.ip.unwrap_or_default();
        if stored_token.is_empty() || stored_ip.is_empty() {
            return Err(DomainError::SessionRejected("no session on record"));
        }
        let presented = Uuid::parse_str(token)
            .map_err(|_| DomainError::SessionRejected("malformed token"))?;
        if stored_ip != ip {
            return Err(DomainError::SessionRejected("address mismatch"));
        }
        // UUID equality, so hex case never matters.
        match Uuid::parse_str(&stored_token) {
            Ok(stored) if stored == presented => {}
            _ => return Err(DomainError::SessionRejected("token mismatch")),
        }
        self.accounts.user_by_name(name).await
    }

    /// Clears the stored token pair. Succeeds whether or not one was set.
    pub async fn revoke(&self, name: &str) -> Result<()> {
        self.accounts.clear_token(name).await
    }

    /// Revokes the actor's own session and records the logout.
    pub async fn logout(&self, user: &UserRecord) -> Result<()> {
        self.revoke(&user.name).await?;
        self.audit
            .record(user.id, actions::LOGOUT, &format!("{} logged out", user.name))
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auth_adapters::password::hash_password;
    use chrono::Utc;
    use domains::models::{Credentials, SessionState};
    use domains::permissions::Permissions;
    use domains::ports::{MockAccountRepo, MockAuditRepo};

    const IP: &str = "203.0.113.9";
    const TOKEN: &str = "123e4567-e89b-42d3-a456-426614174000";

    fn user(id: u64, name: &str) -> UserRecord {
        UserRecord {
            id,
            name: name.into(),
            disabled: false,
            permissions: Permissions::NONE,
            search_filter: String::new(),
            created_at: Utc::now(),
        }
    }

    fn service(accounts: MockAccountRepo) -> SessionService {
        let mut audit = MockAuditRepo::new();
        audit.expect_record().returning(|_, _, _| Ok(()));
        SessionService::new(Arc::new(accounts), AuditTrail::new(Arc::new(audit)))
    }

    fn rejected(result: Result<UserRecord>, reason: &str) {
        match result {
            Err(DomainError::SessionRejected(r)) => assert_eq!(r, reason),
            other => panic!("expected session rejection {reason:?}, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn logon_issues_a_parseable_token() {
        let hash = hash_password("opensesame").unwrap();
        let mut accounts = MockAccountRepo::new();
        accounts.expect_credentials().returning(move |_| {
            Ok(Credentials {
                user_id: 7,
                password_hash: hash.clone(),
                disabled: false,
            })
        });
        accounts
            .expect_store_token()
            .withf(|name, token, ip| {
                name == "alice" && Uuid::parse_str(token).is_ok() && ip == IP
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        accounts
            .expect_user_by_name()
            .returning(|_| Ok(user(7, "alice")));

        let (who, token) = service(accounts).logon("alice", "opensesame", IP).await.unwrap();
        assert_eq!(who.id, 7);
        assert!(Uuid::parse_str(&token).is_ok());
    }

    #[tokio::test]
    async fn logon_rejects_wrong_password_without_storing() {
        let hash = hash_password("right").unwrap();
        let mut accounts = MockAccountRepo::new();
        accounts.expect_credentials().returning(move |_| {
            Ok(Credentials {
                user_id: 7,
                password_hash: hash.clone(),
                disabled: false,
            })
        });

        let result = service(accounts).logon("alice", "wrong", IP).await;
        assert!(matches!(
            result,
            Err(DomainError::SessionRejected("bad credentials"))
        ));
    }

    #[tokio::test]
    async fn logon_hides_unknown_accounts() {
        let mut accounts = MockAccountRepo::new();
        accounts
            .expect_credentials()
            .returning(|_| Err(DomainError::NotFound("account")));

        let result = service(accounts).logon("nobody", "pw", IP).await;
        assert!(matches!(
            result,
            Err(DomainError::SessionRejected("bad credentials"))
        ));
    }

    #[tokio::test]
    async fn logon_rejects_disabled_accounts_even_with_the_right_password() {
        let hash = hash_password("pw").unwrap();
        let mut accounts = MockAccountRepo::new();
        accounts.expect_credentials().returning(move |_| {
            Ok(Credentials {
                user_id: 7,
                password_hash: hash.clone(),
                disabled: true,
            })
        });

        let result = service(accounts).logon("alice", "pw", IP).await;
        assert!(matches!(
            result,
            Err(DomainError::SessionRejected("account disabled"))
        ));
    }

    fn state(token: Option<&str>, ip: Option<&str>) -> SessionState {
        SessionState {
            disabled: false,
            token: token.map(String::from),
            ip: ip.map(String::from),
        }
    }

    #[tokio::test]
    async fn validate_rejects_unknown_accounts_first() {
        let mut accounts = MockAccountRepo::new();
        accounts
            .expect_session_state()
            .returning(|_| Err(DomainError::NotFound("account")));

        rejected(
            service(accounts).validate("ghost", TOKEN, IP).await,
            "unknown account",
        );
    }

    #[tokio::test]
    async fn validate_prefers_disabled_over_missing_session() {
        let mut accounts = MockAccountRepo::new();
        accounts.expect_session_state().returning(|_| {
            Ok(SessionState {
                disabled: true,
                token: None,
                ip: None,
            })
        });

        rejected(
            service(accounts).validate("alice", TOKEN, IP).await,
            "account disabled",
        );
    }

    #[tokio::test]
    async fn validate_requires_a_stored_session() {
        let mut accounts = MockAccountRepo::new();
        accounts
            .expect_session_state()
            .returning(|_| Ok(state(None, None)));

        rejected(
            service(accounts).validate("alice", TOKEN, IP).await,
            "no session on record",
        );
    }

    #[tokio::test]
    async fn validate_rejects_empty_and_malformed_tokens() {
        let mut accounts = MockAccountRepo::new();
        accounts
            .expect_session_state()
            .returning(|_| Ok(state(Some(TOKEN), Some(IP))));
        let service = service(accounts);

        rejected(service.validate("alice", "", IP).await, "malformed token");
        rejected(
            service.validate("alice", "not-a-uuid", IP).await,
            "malformed token",
        );
    }

    #[tokio::test]
    async fn validate_checks_address_before_token_bytes() {
        let other = "ffffffff-ffff-4fff-8fff-ffffffffffff";
        let mut accounts = MockAccountRepo::new();
        accounts
            .expect_session_state()
            .returning(|_| Ok(state(Some(TOKEN), Some(IP))));

        // Both the address and the token are wrong; the address verdict wins.
        rejected(
            service(accounts).validate("alice", other, "198.51.100.1").await,
            "address mismatch",
        );
    }

    #[tokio::test]
    async fn validate_rejects_a_token_for_a_different_session() {
        let other = "ffffffff-ffff-4fff-8fff-ffffffffffff";
        let mut accounts = MockAccountRepo::new();
        accounts
            .expect_session_state()
            .returning(|_| Ok(state(Some(TOKEN), Some(IP))));

        rejected(
            service(accounts).validate("alice", other, IP).await,
            "token mismatch",
        );
    }

    #[tokio::test]
    async fn validate_accepts_the_stored_token_in_any_hex_case() {
        let mut accounts = MockAccountRepo::new();
        accounts
            .expect_session_state()
            .returning(|_| Ok(state(Some(TOKEN), Some(IP))));
        accounts
            .expect_user_by_name()
            .returning(|_| Ok(user(7, "alice")));

        let who = service(accounts)
            .validate("alice", &TOKEN.to_uppercase(), IP)
            .await
            .unwrap();
        assert_eq!(who.id, 7);
    }

    #[tokio::test]
    async fn validate_returns_the_account_on_success() {
        let mut accounts = MockAccountRepo::new();
        accounts
            .expect_session_state()
            .returning(|_| Ok(state(Some(TOKEN), Some(IP))));
        accounts
            .expect_user_by_name()
            .withf(|name| name == "alice")
            .returning(|_| Ok(user(7, "alice")));

        let who = service(accounts).validate("alice", TOKEN, IP).await.unwrap();
        assert_eq!(who.name, "alice");
    }

    #[tokio::test]
    async fn revoke_succeeds_with_or_without_a_session() {
        let mut accounts = MockAccountRepo::new();
        accounts
            .expect_clear_token()
            .times(2)
            .returning(|_| Ok(()));
        let service = service(accounts);

        service.revoke("alice").await.unwrap();
        service.revoke("alice").await.unwrap();
    }
}
