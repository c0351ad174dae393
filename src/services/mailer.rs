// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Outbound email: verification codes and password reset links.

use std::sync::Arc;

use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::{Config, EmailTransportConfig};
use crate::error::AppError;

enum EmailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
    /// Log-and-drop, for tests and offline development.
    Disabled,
}

#[derive(Clone)]
pub struct Mailer {
    transport: Arc<EmailTransport>,
    from: Mailbox,
}

impl Mailer {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let transport = match &config.email_transport {
            EmailTransportConfig::Smtp {
                host,
                port,
                username,
                password,
            } => {
                let smtp = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                    .map_err(|e| anyhow::anyhow!("SMTP transport: {}", e))?
                    .port(*port)
                    .credentials(Credentials::new(username.clone(), password.clone()))
                    .build();
                EmailTransport::Smtp(smtp)
            }
            EmailTransportConfig::File { path } => {
                let emails_dir = std::path::Path::new(path);
                std::fs::create_dir_all(emails_dir)
                    .map_err(|e| anyhow::anyhow!("emails directory: {}", e))?;
                EmailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(emails_dir))
            }
            EmailTransportConfig::Disabled => EmailTransport::Disabled,
        };

        let from = format!("{} <{}>", config.email_from_name, config.email_from_address)
            .parse::<Mailbox>()
            .map_err(|e| anyhow::anyhow!("from address: {}", e))?;

        Ok(Self {
            transport: Arc::new(transport),
            from,
        })
    }

    pub async fn send_verification_code(
        &self,
        to_email: &str,
        to_name: &str,
        code: &str,
    ) -> Result<(), AppError> {
        let body = format!(
            "<b>Hi {},</b><br>Your verification code is: <h1>{}</h1>",
            to_name, code
        );
        self.send(to_email, "Verify your account", &body).await
    }

    pub async fn send_password_reset(
        &self,
        to_email: &str,
        reset_url: &str,
    ) -> Result<(), AppError> {
        let body = format!(
            "<h3>You requested a password reset</h3>\
             <p>Click the link below to choose a new password:</p>\
             <a href=\"{}\">Reset password</a>\
             <p>This link expires in 1 hour.</p>",
            reset_url
        );
        self.send(to_email, "Reset your password", &body).await
    }

    async fn send(&self, to_email: &str, subject: &str, body: &str) -> Result<(), AppError> {
        let to = to_email
            .parse::<Mailbox>()
            .map_err(|e| AppError::BadRequest(format!("invalid email address: {}", e)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body.to_string())
            .map_err(|e| AppError::Mail(format!("build message: {}", e)))?;

        match self.transport.as_ref() {
            EmailTransport::Smtp(smtp) => {
                smtp.send(message)
                    .await
                    .map_err(|e| AppError::Mail(format!("SMTP send: {}", e)))?;
            }
            EmailTransport::File(file) => {
                file.send(message)
                    .await
                    .map_err(|e| AppError::Mail(format!("file send: {}", e)))?;
            }
            EmailTransport::Disabled => {
                tracing::info!(to = to_email, subject, "Mail delivery disabled, dropping message");
            }
        }

        Ok(())
    }
}
