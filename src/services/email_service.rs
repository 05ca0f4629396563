use lettre::{
    message::{header::ContentType, Mailbox}, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::SmtpConfig;
use crate::errors::{AppError, Result};

#[derive(Clone)]
pub struct EmailService {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_email: String,
}

impl EmailService {
    pub fn new(config: SmtpConfig) -> Result<Self> {
        let creds = Credentials::new(config.username, config.password);

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| AppError::configuration(format!("Failed to create SMTP transport: {}", e)))?
            .port(config.port)
            .credentials(creds)
            .build();

        tracing::info!(host = %config.host, port = config.port, "SMTP transport configured");

        Ok(Self {
            transport,
            from_email: config.from_email,
        })
    }

    pub async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let from: Mailbox = self
            .from_email
            .parse()
            .map_err(|e| AppError::configuration(format!("Invalid from address: {}", e)))?;
        let to_addr: Mailbox = to
            .parse()
            .map_err(|e| AppError::upstream(format!("Invalid to address: {}", e)))?;

        let email = Message::builder()
            .from(from)
            .to(to_addr)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| AppError::upstream(format!("Failed to build email: {}", e)))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| AppError::upstream(format!("Failed to send email: {}", e)))?;

        tracing::info!(to = %to, subject = %subject, "Email sent");
        Ok(())
    }
}
