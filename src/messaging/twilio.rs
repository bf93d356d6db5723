//! Twilio (WhatsApp) integration
//!
//! Inbound messages arrive as form-encoded webhooks and are answered inline
//! with a TwiML `<Response>`. Credentials are only looked up to report the
//! connected phone number; replies never go through the REST API.
//!
//! # Connector
//!
//! When hosted behind a connector service, credentials are fetched from
//! `https://$REPLIT_CONNECTORS_HOSTNAME/api/v2/connection` using the
//! `REPL_IDENTITY` (or `WEB_REPL_RENEWAL`) token. Without those the bot runs
//! in basic webhook mode.

use reqwest::Client;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::messaging::InboundMessage;

/// Form fields Twilio posts to the webhook. Only the ones we use.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TwilioWebhook {
    #[serde(rename = "From", default)]
    pub from: Option<String>,
    #[serde(rename = "Body", default)]
    pub body: Option<String>,
}

impl TwilioWebhook {
    /// The sender and text, if both are present and non-blank
    pub fn into_inbound(self) -> Option<InboundMessage> {
        let from = self.from.filter(|f| !f.trim().is_empty())?;
        let body = self.body.filter(|b| !b.trim().is_empty())?;
        Some(InboundMessage { from, body })
    }
}

/// TwiML reply carrying one message
pub fn twiml_message(text: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Message>{}</Message></Response>",
        xml_escape(text)
    )
}

/// TwiML reply that sends nothing back
pub fn twiml_empty() -> String {
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response/>".to_string()
}

fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Twilio credentials resolved from the connector
#[derive(Debug, Clone, PartialEq)]
pub struct TwilioCredentials {
    pub account_sid: String,
    pub api_key: String,
    pub api_key_secret: String,
    pub phone_number: Option<String>,
}

/// Where and how to ask the connector service for credentials
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// e.g. "https://connectors.example.com"
    pub base_url: String,
    /// Value of the `X_REPLIT_TOKEN` header
    pub token: String,
}

impl ConnectorConfig {
    /// Build from `REPLIT_CONNECTORS_HOSTNAME` and `REPL_IDENTITY` /
    /// `WEB_REPL_RENEWAL`. `None` when either part is missing.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let hostname = lookup("REPLIT_CONNECTORS_HOSTNAME").filter(|h| !h.is_empty())?;
        let token = lookup("REPL_IDENTITY")
            .filter(|t| !t.is_empty())
            .map(|t| format!("repl {}", t))
            .or_else(|| {
                lookup("WEB_REPL_RENEWAL")
                    .filter(|t| !t.is_empty())
                    .map(|t| format!("depl {}", t))
            })?;
        Some(Self {
            base_url: format!("https://{}", hostname),
            token,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ConnectionList {
    #[serde(default)]
    items: Vec<Connection>,
}

#[derive(Debug, Deserialize)]
struct Connection {
    #[serde(default)]
    settings: ConnectionSettings,
}

#[derive(Debug, Default, Deserialize)]
struct ConnectionSettings {
    account_sid: Option<String>,
    api_key: Option<String>,
    api_key_secret: Option<String>,
    phone_number: Option<String>,
}

impl ConnectionSettings {
    fn into_credentials(self) -> Option<TwilioCredentials> {
        let present = |v: Option<String>| v.filter(|s| !s.is_empty());
        Some(TwilioCredentials {
            account_sid: present(self.account_sid)?,
            api_key: present(self.api_key)?,
            api_key_secret: present(self.api_key_secret)?,
            phone_number: present(self.phone_number),
        })
    }
}

/// Ask the connector for Twilio credentials. Any failure means basic
/// webhook mode and yields `None`.
pub async fn fetch_twilio_credentials(
    client: &Client,
    connector: &ConnectorConfig,
) -> Option<TwilioCredentials> {
    let url = format!(
        "{}/api/v2/connection?include_secrets=true&connector_names=twilio",
        connector.base_url
    );

    let response = client
        .get(&url)
        .header("Accept", "application/json")
        .header("X_REPLIT_TOKEN", &connector.token)
        .send()
        .await;

    let list: ConnectionList = match response {
        Ok(resp) => match resp.json().await {
            Ok(list) => list,
            Err(e) => {
                error!("Error fetching Twilio credentials: {}", e);
                return None;
            }
        },
        Err(e) => {
            error!("Error fetching Twilio credentials: {}", e);
            return None;
        }
    };

    let credentials = list
        .items
        .into_iter()
        .next()
        .and_then(|c| c.settings.into_credentials());

    if credentials.is_none() {
        warn!("Twilio not fully configured - using basic webhook mode");
    }
    credentials
}

/// Resolve Twilio credentials from the environment's connector, if any
pub async fn initialize(client: &Client) -> Option<TwilioCredentials> {
    let Some(connector) = ConnectorConfig::from_env() else {
        warn!("Twilio connection not available - using basic webhook mode");
        return None;
    };

    let credentials = fetch_twilio_credentials(client, &connector).await?;
    info!(
        "Twilio connected with phone number: {}",
        credentials.phone_number.as_deref().unwrap_or("unknown")
    );
    Some(credentials)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_into_inbound_requires_sender_and_body() {
        let full = TwilioWebhook {
            from: Some("whatsapp:+33612345678".to_string()),
            body: Some("Bonjour".to_string()),
        };
        let inbound = full.into_inbound().unwrap();
        assert_eq!(inbound.from, "whatsapp:+33612345678");
        assert_eq!(inbound.body, "Bonjour");

        let no_body = TwilioWebhook {
            from: Some("whatsapp:+33612345678".to_string()),
            body: Some("  ".to_string()),
        };
        assert!(no_body.into_inbound().is_none());
        assert!(TwilioWebhook::default().into_inbound().is_none());
    }

    #[test]
    fn test_twiml_message_escapes() {
        let xml = twiml_message("C'est <facile> & \"drôle\"");
        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Message>C&apos;est &lt;facile&gt; &amp; &quot;drôle&quot;</Message></Response>"
        );
    }

    #[test]
    fn test_connector_config_token_precedence() {
        let env: HashMap<&str, &str> = [
            ("REPLIT_CONNECTORS_HOSTNAME", "connectors.example"),
            ("REPL_IDENTITY", "abc"),
            ("WEB_REPL_RENEWAL", "def"),
        ]
        .into_iter()
        .collect();
        let config = ConnectorConfig::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.base_url, "https://connectors.example");
        assert_eq!(config.token, "repl abc");

        let config = ConnectorConfig::from_lookup(|k| match k {
            "REPLIT_CONNECTORS_HOSTNAME" => Some("h".to_string()),
            "WEB_REPL_RENEWAL" => Some("def".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.token, "depl def");

        assert!(ConnectorConfig::from_lookup(|k| (k == "REPL_IDENTITY").then(|| "abc".to_string())).is_none());
        assert!(ConnectorConfig::from_lookup(|k| (k == "REPLIT_CONNECTORS_HOSTNAME").then(|| "h".to_string())).is_none());
    }

    fn connector_for(server: &mockito::ServerGuard) -> ConnectorConfig {
        ConnectorConfig {
            base_url: server.url(),
            token: "repl abc".to_string(),
        }
    }

    #[tokio::test]
    async fn test_fetch_credentials_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v2/connection")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("include_secrets".into(), "true".into()),
                mockito::Matcher::UrlEncoded("connector_names".into(), "twilio".into()),
            ]))
            .match_header("x_replit_token", "repl abc")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"items":[{"settings":{"account_sid":"AC123","api_key":"SK456","api_key_secret":"secret","phone_number":"+14155238886"}}]}"#)
            .create_async()
            .await;

        let creds = fetch_twilio_credentials(&Client::new(), &connector_for(&server))
            .await
            .unwrap();
        assert_eq!(creds.account_sid, "AC123");
        assert_eq!(creds.api_key, "SK456");
        assert_eq!(creds.phone_number.as_deref(), Some("+14155238886"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_credentials_incomplete_settings() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v2/connection")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"items":[{"settings":{"account_sid":"AC123"}}]}"#)
            .create_async()
            .await;

        assert!(fetch_twilio_credentials(&Client::new(), &connector_for(&server)).await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_credentials_no_items_or_bad_body() {
        let mut server = mockito::Server::new_async().await;
        let _empty = server
            .mock("GET", "/api/v2/connection")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"items":[]}"#)
            .create_async()
            .await;
        assert!(fetch_twilio_credentials(&Client::new(), &connector_for(&server)).await.is_none());

        let mut server = mockito::Server::new_async().await;
        let _bad = server
            .mock("GET", "/api/v2/connection")
            .match_query(mockito::Matcher::Any)
            .with_status(500)
            .with_body("oops")
            .create_async()
            .await;
        assert!(fetch_twilio_credentials(&Client::new(), &connector_for(&server)).await.is_none());
    }
}
