//! SMTP email notifier.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use super::{summary_fields, Notifier, NotifyError};
use crate::engine::Event;

pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl EmailNotifier {
    pub fn new(
        host: &str,
        port: u16,
        credentials: Option<(String, String)>,
        from: &str,
        to: &[String],
        use_tls: bool,
    ) -> Result<Self, NotifyError> {
        if !use_tls {
            tracing::warn!("SMTP TLS is disabled for {} - this is not recommended for production", host);
        }

        let mut builder = if use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
        } else {
            Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host))
        }
        .map_err(|e| NotifyError::Email(format!("create SMTP transport: {}", e)))?
        .port(port);

        if let Some((username, password)) = credentials {
            builder = builder.credentials(Credentials::new(username, password));
        }

        let from = parse_mailbox(from)?;
        let to = to
            .iter()
            .map(String::as_str)
            .map(parse_mailbox)
            .collect::<Result<Vec<_>, _>>()?;
        if to.is_empty() {
            return Err(NotifyError::Email("no recipients configured".to_string()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            to,
        })
    }

    /// Build the message without sending it.
    pub fn build_message(&self, event: &Event) -> Result<Message, NotifyError> {
        let body = render_body(event);

        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(event.title())
            .header(ContentType::TEXT_PLAIN);
        for recipient in &self.to {
            builder = builder.to(recipient.clone());
        }

        builder
            .body(body)
            .map_err(|e| NotifyError::Email(format!("build email message: {}", e)))
    }
}

fn parse_mailbox(addr: &str) -> Result<Mailbox, NotifyError> {
    addr.parse::<Mailbox>()
        .map_err(|e| NotifyError::Email(format!("parse address {}: {}", addr, e)))
}

fn render_body(event: &Event) -> String {
    let mut body = summary_fields(event)
        .into_iter()
        .map(|(label, value)| format!("{}: {}", label, value))
        .collect::<Vec<_>>()
        .join("\n");
    body.push('\n');
    body
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn notify(&self, event: &Event) -> Result<(), NotifyError> {
        let message = self.build_message(event)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Email(format!("send SMTP email: {}", e)))?;
        Ok(())
    }
}
