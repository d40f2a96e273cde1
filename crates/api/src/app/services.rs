//! Service wiring: picks the store and notification adapters from
//! [`AppConfig`] and hands handlers one shared [`AppServices`].

use std::sync::Arc;

use secrecy::ExposeSecret;
use thiserror::Error;

use tillpoint_auth::Hs256JwtValidator;
use tillpoint_infra::{
    AccountService, AppConfig, CheckoutService, CustomerStore, DisabledPaymentGateway,
    InMemoryStore, LogOnlyMailer, Mailer, MpesaGateway, NotificationError, PaymentGateway,
    PostgresStore, ProductStore, SalesLedger, StoreError, SmtpMailer, UserStore,
};

const POSTGRES_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("database unavailable: {0}")]
    Database(#[from] StoreError),

    #[error("notifier misconfigured: {0}")]
    Notifier(#[from] NotificationError),
}

pub struct AppServices {
    pub products: Arc<dyn ProductStore>,
    pub customers: Arc<dyn CustomerStore>,
    pub ledger: Arc<dyn SalesLedger>,
    pub checkout: CheckoutService,
    pub accounts: AccountService,
    pub jwt: Arc<Hs256JwtValidator>,
    pub low_stock_threshold: u32,
}

impl AppServices {
    /// Wire every service over one store that backs all four traits.
    pub fn new<S>(
        store: Arc<S>,
        config: &AppConfig,
        mailer: Arc<dyn Mailer>,
        payments: Arc<dyn PaymentGateway>,
    ) -> Self
    where
        S: ProductStore + CustomerStore + SalesLedger + UserStore + 'static,
    {
        let jwt = Arc::new(Hs256JwtValidator::new(
            config.jwt_secret.expose_secret().as_bytes(),
        ));
        let ledger: Arc<dyn SalesLedger> = store.clone();
        let users: Arc<dyn UserStore> = store.clone();

        Self {
            products: store.clone(),
            customers: store,
            checkout: CheckoutService::new(ledger.clone(), mailer.clone(), payments),
            accounts: AccountService::new(
                users,
                mailer,
                jwt.clone(),
                config.otp_ttl,
                config.token_ttl,
            ),
            ledger,
            jwt,
            low_stock_threshold: config.low_stock_threshold,
        }
    }
}

/// Postgres when `DATABASE_URL` is set, otherwise an in-memory store.
pub async fn build_services(config: &AppConfig) -> Result<AppServices, StartupError> {
    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp)?),
        None => {
            tracing::warn!("SMTP not configured; login codes and receipts will only be logged");
            Arc::new(LogOnlyMailer)
        }
    };

    let payments: Arc<dyn PaymentGateway> = match &config.mpesa {
        Some(mpesa) => Arc::new(MpesaGateway::new(mpesa.clone())?),
        None => Arc::new(DisabledPaymentGateway),
    };

    match &config.database_url {
        Some(url) => {
            let store =
                PostgresStore::connect(url.expose_secret(), POSTGRES_MAX_CONNECTIONS).await?;
            tracing::info!("using postgres store");
            Ok(AppServices::new(Arc::new(store), config, mailer, payments))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store (data is not persisted)");
            Ok(AppServices::new(
                Arc::new(InMemoryStore::new()),
                config,
                mailer,
                payments,
            ))
        }
    }
}
