//! Session wire protocol
//!
//! JSON text frames exchanged with the conversational agent service.

use serde::{Deserialize, Serialize};

use crate::attribution::Attribution;

/// Frame sent to the agent service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// Opens the conversation; attribution tags are inlined
    Start {
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(flatten)]
        attribution: Attribution,
    },
    /// One user utterance
    Message {
        text: String,
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    /// Closes the conversation
    End {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
}

impl OutboundFrame {
    /// Serialize to a JSON text frame
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Kind of inbound frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboundKind {
    /// First message of a session
    Greeting,
    /// Reply to a user utterance
    Response,
    /// Appointment booked
    BookingConfirm,
    /// Agent-side failure, text is user-presentable
    Error,
}

/// Extra details attached to a response
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    /// Pricing tier the agent matched the visitor to
    #[serde(default)]
    pub tier_match: Option<String>,

    /// An appointment was booked during this turn
    #[serde(default)]
    pub appointment_booked: Option<bool>,
}

/// Frame received from the agent service
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundFrame {
    /// Frame kind
    #[serde(rename = "type")]
    pub kind: InboundKind,

    /// Agent text
    pub text: String,

    /// Echoed session identifier
    #[serde(default)]
    pub session_id: Option<String>,

    /// Response details
    #[serde(default)]
    pub metadata: Option<ResponseMetadata>,

    /// Booked appointment time, as sent by the service
    #[serde(default)]
    pub appointment_time: Option<String>,
}

impl InboundFrame {
    /// Parse a text frame, dropping anything malformed
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match serde_json::from_str(text) {
            Ok(frame) => Some(frame),
            Err(e) => {
                tracing::debug!(error = %e, len = text.len(), "dropping malformed frame");
                None
            }
        }
    }

    /// The frame reports a booked appointment
    #[must_use]
    pub fn is_booking(&self) -> bool {
        self.kind == InboundKind::BookingConfirm
            || self
                .metadata
                .as_ref()
                .and_then(|m| m.appointment_booked)
                .unwrap_or(false)
    }
}
