use askama::Template;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lettre::message::{header::ContentType, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::ExposeSecret;

use tillpoint_customers::Customer;
use tillpoint_sales::{CheckoutReceipt, ReceiptLine};

use super::{Mailer, NotificationError};
use crate::config::SmtpConfig;

#[derive(Template)]
#[template(path = "email/otp.html")]
struct OtpEmailHtml<'a> {
    code: &'a str,
    ttl_seconds: i64,
}

#[derive(Template)]
#[template(path = "email/otp.txt")]
struct OtpEmailText<'a> {
    code: &'a str,
    ttl_seconds: i64,
}

#[derive(Template)]
#[template(path = "email/receipt.html")]
struct ReceiptEmailHtml<'a> {
    customer_name: &'a str,
    items: &'a [ReceiptLine],
    total: String,
}

#[derive(Template)]
#[template(path = "email/receipt.txt")]
struct ReceiptEmailText<'a> {
    customer_name: &'a str,
    items: &'a [ReceiptLine],
    total: String,
}

/// Per-command limit on the SMTP conversation.
const SMTP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(20);

/// SMTP delivery through a STARTTLS relay.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, NotificationError> {
        let credentials = Credentials::new(
            config.username.clone(),
            config.password.expose_secret().to_string(),
        );
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| NotificationError::Delivery(format!("smtp relay {}: {e}", config.host)))?
            .port(config.port)
            .credentials(credentials)
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        Ok(Self {
            transport,
            from_address: config.from_address.clone(),
        })
    }

    async fn send(
        &self,
        to: &str,
        subject: &str,
        text_body: String,
        html_body: String,
    ) -> Result<(), NotificationError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| NotificationError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| NotificationError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body),
                    ),
            )
            .map_err(|e| NotificationError::Render(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| NotificationError::Delivery(e.to_string()))?;

        tracing::info!(%to, %subject, "email sent");
        Ok(())
    }
}

fn render(template: &impl Template) -> Result<String, NotificationError> {
    template
        .render()
        .map_err(|e| NotificationError::Render(e.to_string()))
}

fn receipt_bodies(customer_name: &str, receipt: &CheckoutReceipt) -> Result<(String, String), NotificationError> {
    let total = receipt.total.to_string();
    let text = render(&ReceiptEmailText {
        customer_name,
        items: &receipt.items,
        total: total.clone(),
    })?;
    let html = render(&ReceiptEmailHtml {
        customer_name,
        items: &receipt.items,
        total,
    })?;
    Ok((text, html))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_otp(
        &self,
        to: &str,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), NotificationError> {
        let ttl_seconds = (expires_at - Utc::now()).num_seconds().max(0);
        let text = render(&OtpEmailText { code, ttl_seconds })?;
        let html = render(&OtpEmailHtml { code, ttl_seconds })?;
        self.send(to, "Your login code", text, html).await
    }

    async fn send_receipt(
        &self,
        customer: &Customer,
        receipt: &CheckoutReceipt,
    ) -> Result<(), NotificationError> {
        let (text, html) = receipt_bodies(&customer.name, receipt)?;
        self.send(&customer.email, "Your purchase receipt", text, html).await
    }
}
