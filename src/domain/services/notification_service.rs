use std::sync::Arc;
use crate::domain::{models::user::User, ports::EmailService};
use crate::error::AppError;
use tera::{Context, Tera};
use tracing::{error, info};

/// Renders account mails with Tera and hands them to the mail relay.
pub struct NotificationService {
    email: Arc<dyn EmailService>,
    templates: Arc<Tera>,
}

impl NotificationService {
    pub fn new(email: Arc<dyn EmailService>, templates: Arc<Tera>) -> Self {
        Self { email, templates }
    }

    pub async fn send_welcome(&self, user: &User, url: &str) -> Result<(), AppError> {
        self.send(user, "email/welcome.html", "Welcome to the Tour Booking family!", url).await
    }

    pub async fn send_password_reset(&self, user: &User, url: &str) -> Result<(), AppError> {
        self.send(
            user,
            "email/password_reset.html",
            "Your password reset token (valid for only 10 minutes)",
            url,
        )
        .await
    }

    async fn send(&self, user: &User, template: &str, subject: &str, url: &str) -> Result<(), AppError> {
        let mut context = Context::new();
        context.insert("first_name", user.first_name());
        context.insert("url", url);
        context.insert("subject", subject);

        let body = self.templates.render(template, &context).map_err(|e| {
            error!("Failed to render {}: {:?}", template, e);
            AppError::InternalWithMsg(format!("Template rendering failed: {}", template))
        })?;

        self.email.send(&user.email, subject, &body).await?;
        info!("Sent '{}' to user {}", template, user.id);
        Ok(())
    }
}
