//! Staff accounts and the two-step (password, then emailed code) login.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::instrument;

use tillpoint_auth::{
    hash_password, verify_password, AuthError, Hs256JwtValidator, IssuedOtp, OtpChallenge,
    OtpError, Role, User, UserDraft, UserView,
};
use tillpoint_core::UserId;

use crate::notify::Mailer;
use crate::store::{StoreError, UserStore};

/// Result of a successful code check.
#[derive(Debug, Clone)]
pub struct Session {
    pub role: Role,
    pub token: String,
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserStore>,
    mailer: Arc<dyn Mailer>,
    jwt: Arc<Hs256JwtValidator>,
    otp_ttl: Duration,
    token_ttl: Duration,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserStore>,
        mailer: Arc<dyn Mailer>,
        jwt: Arc<Hs256JwtValidator>,
        otp_ttl: Duration,
        token_ttl: Duration,
    ) -> Self {
        Self {
            users,
            mailer,
            jwt,
            otp_ttl,
            token_ttl,
        }
    }

    /// Create an account. Used by public registration and the admin screens.
    #[instrument(skip(self, draft), err)]
    pub async fn register(&self, draft: UserDraft) -> Result<UserView, AuthError> {
        let new = draft.validate_new()?;
        let password = new.password.clone().unwrap_or_default();
        let password_hash = hash_password(&password)?;
        let user = User::create(UserId::new(), new, password_hash);
        self.users.create_user(&user).await.map_err(store_error)?;
        tracing::info!(user_id = %user.id, role = %user.role, "user registered");
        Ok(user.view())
    }

    /// First login step: check the password, then mail a fresh code.
    #[instrument(skip(self, password), err)]
    pub async fn login(&self, email: &str, password: &str) -> Result<UserView, AuthError> {
        let email = email.trim().to_lowercase();
        let user = self
            .users
            .find_user_by_email(&email)
            .await
            .map_err(store_error)?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }

        self.issue_code(&user).await?;
        Ok(user.view())
    }

    #[instrument(skip(self), err)]
    pub async fn resend_otp(&self, user_id: UserId) -> Result<UserView, AuthError> {
        let user = self.users.get_user(user_id).await.map_err(store_error)?;
        self.issue_code(&user).await?;
        Ok(user.view())
    }

    /// Second login step. A used code is cleared so it cannot be replayed,
    /// and so is a code that has taken too many wrong guesses.
    #[instrument(skip(self, code), err)]
    pub async fn verify_otp(&self, user_id: UserId, code: &str) -> Result<Session, AuthError> {
        let user = self.users.get_user(user_id).await.map_err(store_error)?;
        let challenge = self
            .users
            .claim_otp_attempt(user.id)
            .await
            .map_err(store_error)?
            .ok_or(OtpError::NotIssued)?;

        let now = Utc::now();
        match challenge.verify(code, now) {
            Ok(()) => {}
            Err(OtpError::Mismatch) if !challenge.has_attempts_left() => {
                self.users.set_otp(user.id, None).await.map_err(store_error)?;
                tracing::warn!(user_id = %user.id, "login code discarded after wrong guesses");
                return Err(OtpError::TooManyAttempts.into());
            }
            Err(e) => return Err(e.into()),
        }

        self.users.set_otp(user.id, None).await.map_err(store_error)?;
        let token = self.jwt.issue(user.id, user.role, now, self.token_ttl)?;
        tracing::info!(user_id = %user.id, role = %user.role, "login completed");
        Ok(Session {
            role: user.role,
            token,
        })
    }

    /// Role currently on file. Tokens carry a role snapshot; requests are
    /// authorised against this instead so a demotion or deletion takes effect
    /// before the token expires.
    pub async fn current_role(&self, user_id: UserId) -> Result<Role, AuthError> {
        Ok(self.users.get_user(user_id).await.map_err(store_error)?.role)
    }

    pub async fn list_users(&self) -> Result<Vec<UserView>, AuthError> {
        let users = self.users.list_users().await.map_err(store_error)?;
        Ok(users.iter().map(User::view).collect())
    }

    pub async fn get_user(&self, user_id: UserId) -> Result<UserView, AuthError> {
        Ok(self.users.get_user(user_id).await.map_err(store_error)?.view())
    }

    /// Change name, email and role; a non-empty password is re-hashed.
    #[instrument(skip(self, draft), err)]
    pub async fn update_user(
        &self,
        user_id: UserId,
        draft: UserDraft,
    ) -> Result<UserView, AuthError> {
        let changes = draft.validate_profile()?;
        let mut user = self.users.get_user(user_id).await.map_err(store_error)?;
        user.name = changes.name;
        user.email = changes.email;
        user.role = changes.role;
        if let Some(password) = changes.password {
            user.password_hash = hash_password(&password)?;
        }
        self.users.update_user(&user).await.map_err(store_error)?;
        Ok(user.view())
    }

    #[instrument(skip(self), err)]
    pub async fn delete_user(&self, user_id: UserId) -> Result<(), AuthError> {
        self.users.delete_user(user_id).await.map_err(store_error)
    }

    async fn issue_code(&self, user: &User) -> Result<(), AuthError> {
        let IssuedOtp { code, challenge } = OtpChallenge::generate(Utc::now(), self.otp_ttl)?;
        let expires_at = challenge.expires_at;
        self.users
            .set_otp(user.id, Some(challenge))
            .await
            .map_err(store_error)?;
        self.mailer
            .send_otp(&user.email, &code, expires_at)
            .await
            .map_err(|e| AuthError::Delivery(e.to_string()))
    }
}

fn store_error(err: StoreError) -> AuthError {
    match err {
        StoreError::NotFound(_) => AuthError::UnknownUser,
        StoreError::Conflict(_) => AuthError::EmailTaken,
        StoreError::Backend(msg) => AuthError::Store(msg),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::DateTime;

    use tillpoint_auth::{JwtValidator, TokenError, MAX_OTP_ATTEMPTS};
    use tillpoint_customers::Customer;
    use tillpoint_sales::CheckoutReceipt;

    use super::*;
    use crate::notify::NotificationError;
    use crate::store::InMemoryStore;

    #[derive(Default)]
    struct Outbox {
        codes: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl Outbox {
        fn last_code(&self) -> String {
            self.codes.lock().unwrap().last().map(|(_, c)| c.clone()).unwrap()
        }
    }

    #[async_trait]
    impl Mailer for Outbox {
        async fn send_otp(&self, to: &str, code: &str, _: DateTime<Utc>) -> Result<(), NotificationError> {
            if self.fail {
                return Err(NotificationError::Delivery("smtp down".to_string()));
            }
            self.codes.lock().unwrap().push((to.to_string(), code.to_string()));
            Ok(())
        }

        async fn send_receipt(&self, _: &Customer, _: &CheckoutReceipt) -> Result<(), NotificationError> {
            Ok(())
        }
    }

    fn service(outbox: Arc<Outbox>, otp_ttl: Duration) -> (AccountService, Arc<Hs256JwtValidator>) {
        let jwt = Arc::new(Hs256JwtValidator::new("test-secret"));
        let svc = AccountService::new(
            Arc::new(InMemoryStore::new()),
            outbox,
            jwt.clone(),
            otp_ttl,
            Duration::hours(8),
        );
        (svc, jwt)
    }

    fn draft(email: &str) -> UserDraft {
        UserDraft {
            name: "Kamau".to_string(),
            email: email.to_string(),
            password: Some("correct horse".to_string()),
            role: "cashier".to_string(),
        }
    }

    #[tokio::test]
    async fn full_login_flow_issues_a_token() {
        let outbox = Arc::new(Outbox::default());
        let (svc, jwt) = service(outbox.clone(), Duration::seconds(60));
        let user = svc.register(draft("kamau@till.shop")).await.unwrap();

        let seen = svc.login("Kamau@Till.Shop", "correct horse").await.unwrap();
        assert_eq!(seen.id, user.id);

        let session = svc.verify_otp(user.id, &outbox.last_code()).await.unwrap();
        assert_eq!(session.role, Role::Cashier);
        let claims = jwt.validate(&session.token, Utc::now()).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.expires_at - claims.issued_at, Duration::hours(8));
    }

    #[tokio::test]
    async fn bad_email_and_bad_password_look_the_same() {
        let (svc, _) = service(Arc::new(Outbox::default()), Duration::seconds(60));
        svc.register(draft("kamau@till.shop")).await.unwrap();

        let wrong_pw = svc.login("kamau@till.shop", "nope").await.unwrap_err();
        let no_user = svc.login("nobody@till.shop", "correct horse").await.unwrap_err();
        assert_eq!(wrong_pw.to_string(), no_user.to_string());
        assert!(matches!(wrong_pw, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn code_is_single_use() {
        let outbox = Arc::new(Outbox::default());
        let (svc, _) = service(outbox.clone(), Duration::seconds(60));
        let user = svc.register(draft("kamau@till.shop")).await.unwrap();
        svc.login("kamau@till.shop", "correct horse").await.unwrap();
        let code = outbox.last_code();

        svc.verify_otp(user.id, &code).await.unwrap();
        let again = svc.verify_otp(user.id, &code).await.unwrap_err();
        assert!(matches!(again, AuthError::InvalidOtp(OtpError::NotIssued)));
    }

    #[tokio::test]
    async fn expired_code_is_rejected() {
        let outbox = Arc::new(Outbox::default());
        let (svc, _) = service(outbox.clone(), Duration::milliseconds(1));
        let user = svc.register(draft("kamau@till.shop")).await.unwrap();
        svc.login("kamau@till.shop", "correct horse").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let err = svc.verify_otp(user.id, &outbox.last_code()).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidOtp(OtpError::Expired)));
    }

    #[tokio::test]
    async fn resend_replaces_the_code() {
        let outbox = Arc::new(Outbox::default());
        let (svc, _) = service(outbox.clone(), Duration::seconds(60));
        let user = svc.register(draft("kamau@till.shop")).await.unwrap();
        svc.login("kamau@till.shop", "correct horse").await.unwrap();
        svc.resend_otp(user.id).await.unwrap();

        assert_eq!(outbox.codes.lock().unwrap().len(), 2);
        assert!(svc.verify_otp(user.id, &outbox.last_code()).await.is_ok());
    }

    #[tokio::test]
    async fn stored_code_is_hashed() {
        let outbox = Arc::new(Outbox::default());
        let store = Arc::new(InMemoryStore::new());
        let svc = AccountService::new(
            store.clone(),
            outbox.clone(),
            Arc::new(Hs256JwtValidator::new("test-secret")),
            Duration::seconds(60),
            Duration::hours(8),
        );
        let user = svc.register(draft("kamau@till.shop")).await.unwrap();
        svc.login("kamau@till.shop", "correct horse").await.unwrap();

        let code = outbox.last_code();
        let stored = store.get_user(user.id).await.unwrap().otp.unwrap();
        assert_ne!(stored.code_hash, code);
        assert!(!stored.code_hash.contains(&code));
        assert!(verify_password(&code, &stored.code_hash));
    }

    #[tokio::test]
    async fn wrong_guesses_burn_the_code() {
        let outbox = Arc::new(Outbox::default());
        let (svc, _) = service(outbox.clone(), Duration::seconds(60));
        let user = svc.register(draft("kamau@till.shop")).await.unwrap();
        svc.login("kamau@till.shop", "correct horse").await.unwrap();
        let code = outbox.last_code();
        let wrong = if code == "000000" { "111111" } else { "000000" };

        for _ in 1..MAX_OTP_ATTEMPTS {
            let err = svc.verify_otp(user.id, wrong).await.unwrap_err();
            assert!(matches!(err, AuthError::InvalidOtp(OtpError::Mismatch)));
        }
        let err = svc.verify_otp(user.id, wrong).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidOtp(OtpError::TooManyAttempts)));

        // Even the right code is useless now; a fresh one must be requested.
        let err = svc.verify_otp(user.id, &code).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidOtp(OtpError::NotIssued)));

        svc.resend_otp(user.id).await.unwrap();
        assert!(svc.verify_otp(user.id, &outbox.last_code()).await.is_ok());
    }

    #[tokio::test]
    async fn a_wrong_guess_then_the_right_code_still_logs_in() {
        let outbox = Arc::new(Outbox::default());
        let (svc, _) = service(outbox.clone(), Duration::seconds(60));
        let user = svc.register(draft("kamau@till.shop")).await.unwrap();
        svc.login("kamau@till.shop", "correct horse").await.unwrap();
        let code = outbox.last_code();
        let wrong = if code == "000000" { "111111" } else { "000000" };

        assert!(svc.verify_otp(user.id, wrong).await.is_err());
        assert!(svc.verify_otp(user.id, &code).await.is_ok());
    }

    #[tokio::test]
    async fn mail_failure_surfaces_as_delivery_error() {
        let outbox = Arc::new(Outbox {
            fail: true,
            ..Outbox::default()
        });
        let (svc, _) = service(outbox, Duration::seconds(60));
        svc.register(draft("kamau@till.shop")).await.unwrap();
        let err = svc.login("kamau@till.shop", "correct horse").await.unwrap_err();
        assert!(matches!(err, AuthError::Delivery(_)));
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let (svc, _) = service(Arc::new(Outbox::default()), Duration::seconds(60));
        svc.register(draft("kamau@till.shop")).await.unwrap();
        let err = svc.register(draft("KAMAU@till.shop")).await.unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken));
    }

    #[tokio::test]
    async fn admin_update_rehashes_password() {
        let outbox = Arc::new(Outbox::default());
        let (svc, _) = service(outbox, Duration::seconds(60));
        let user = svc.register(draft("kamau@till.shop")).await.unwrap();

        let mut changes = draft("kamau@till.shop");
        changes.password = Some("new password".to_string());
        changes.role = "inventory".to_string();
        let updated = svc.update_user(user.id, changes).await.unwrap();
        assert_eq!(updated.role, Role::Inventory);

        assert!(svc.login("kamau@till.shop", "correct horse").await.is_err());
        assert!(svc.login("kamau@till.shop", "new password").await.is_ok());
    }

    #[tokio::test]
    async fn current_role_follows_admin_changes() {
        let (svc, _) = service(Arc::new(Outbox::default()), Duration::seconds(60));
        let user = svc.register(draft("kamau@till.shop")).await.unwrap();
        assert_eq!(svc.current_role(user.id).await.unwrap(), Role::Cashier);

        let mut changes = draft("kamau@till.shop");
        changes.password = None;
        changes.role = "inventory".to_string();
        svc.update_user(user.id, changes).await.unwrap();
        assert_eq!(svc.current_role(user.id).await.unwrap(), Role::Inventory);

        svc.delete_user(user.id).await.unwrap();
        assert!(matches!(svc.current_role(user.id).await, Err(AuthError::UnknownUser)));
    }

    #[test]
    fn token_errors_convert() {
        let err: AuthError = TokenError::Claims(tillpoint_auth::TokenValidationError::Expired).into();
        assert!(matches!(err, AuthError::Token(_)));
    }
}
