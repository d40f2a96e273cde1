//! Infrastructure layer: storage backends, configuration, outbound
//! notifications and the services that sequence them.

pub mod accounts;
pub mod checkout;
pub mod config;
pub mod notify;
pub mod store;

pub use accounts::{AccountService, Session};
pub use checkout::CheckoutService;
pub use config::{AppConfig, ConfigError, MpesaConfig, SmtpConfig};
pub use notify::{
    DisabledPaymentGateway, LogOnlyMailer, Mailer, MpesaGateway, NotificationError,
    PaymentGateway, SmtpMailer,
};
pub use store::{
    CheckoutTx, CustomerStore, DecrementError, InMemoryStore, PostgresStore, ProductStore,
    SalesLedger, StoreError, UserStore,
};
