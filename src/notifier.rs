use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;
use crate::models::TrackedProduct;
use crate::utils::error::{AppError, Result};

/// Outbound alert channel. Fire-and-forget: implementations log failures,
/// the monitoring engine never sees them.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_price_alert(&self, product: &TrackedProduct);
}

pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    config: SmtpConfig,
}

impl EmailNotifier {
    pub fn new(config: SmtpConfig) -> Result<Self> {
        let mut builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| AppError::Internal(format!("SMTP relay setup failed: {}", e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };

        builder = builder.port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            config,
        })
    }

    fn from_mailbox(&self) -> Result<Mailbox> {
        let address = self
            .config
            .from_address
            .as_deref()
            .unwrap_or("alerts@pricewarden.local");
        format!("{} <{}>", self.config.from_name, address)
            .parse()
            .map_err(|e| AppError::Internal(format!("Bad from address: {}", e)))
    }

    fn format_subject(product: &TrackedProduct) -> String {
        format!("Price Alert! Product: {}", product.url)
    }

    fn format_body(product: &TrackedProduct) -> String {
        format!(
            "The price for your tracked product has dropped to or below {}!\n\
             Check it out here: {}\n",
            product.target_price, product.url
        )
    }

    async fn try_send(&self, product: &TrackedProduct) -> Result<()> {
        let message = Message::builder()
            .from(self.from_mailbox()?)
            .to(product
                .user_email
                .parse()
                .map_err(|e| AppError::Internal(format!("Bad recipient address: {}", e)))?)
            .subject(Self::format_subject(product))
            .body(Self::format_body(product))
            .map_err(|e| AppError::Internal(format!("Failed to build alert mail: {}", e)))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::Internal(format!("SMTP send failed: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send_price_alert(&self, product: &TrackedProduct) {
        match self.try_send(product).await {
            Ok(()) => {
                tracing::info!(
                    "Price alert email sent to {} for {}",
                    product.user_email,
                    product.sid
                );
            }
            Err(e) => {
                tracing::error!(
                    "Failed to send price alert to {} for {}: {}",
                    product.user_email,
                    product.sid,
                    e
                );
            }
        }
    }
}
