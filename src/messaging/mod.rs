//! Messaging platform integration
//!
//! Supported platforms:
//! - Twilio WhatsApp: inbound webhooks answered with TwiML

pub mod twilio;

use serde::{Deserialize, Serialize};

/// A platform-neutral inbound text message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Sender identifier, used as the learner id
    pub from: String,
    /// Message text
    pub body: String,
}
