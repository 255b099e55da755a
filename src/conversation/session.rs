//! Per-open conversation state

use super::transcript::Transcript;
use crate::attribution::Attribution;
use crate::transport::InboundFrame;

/// Appointment confirmed by the agent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Booking {
    /// Appointment time as reported by the agent service
    pub appointment_time: Option<String>,

    /// Pricing tier the visitor was matched to
    pub tier_match: Option<String>,
}

impl Booking {
    /// Extract a booking from an inbound frame, if it reports one
    #[must_use]
    pub fn from_frame(frame: &InboundFrame) -> Option<Self> {
        if !frame.is_booking() {
            return None;
        }
        Some(Self {
            appointment_time: frame.appointment_time.clone(),
            tier_match: frame.metadata.as_ref().and_then(|m| m.tier_match.clone()),
        })
    }
}

/// Everything that belongs to one opening of the conversation
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub attribution: Attribution,
    pub transcript: Transcript,
    pub booking: Option<Booking>,
}

impl Session {
    #[must_use]
    pub fn new(attribution: Attribution) -> Self {
        Self {
            attribution,
            ..Self::default()
        }
    }
}
