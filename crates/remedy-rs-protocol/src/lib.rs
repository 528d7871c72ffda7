//! Shared types for the complaint engine: conversation steps, inbound turns,
//! collaborator contracts, and the prescription record returned by image
//! understanding.

mod collaborator;
mod prescription;

pub use collaborator::{
    CollaboratorError, ComplaintSink, PrescriptionReader, ReplyGenerator, SinkError,
};
pub use prescription::{NO_MEDICATIONS_MARKER, PrescriptionData, parse_prescription_reply};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Stable identifier of an end user on the chat transport.
pub type UserId = String;
/// Identifier of one complaint instance (`{user_id}_{unix_seconds}`).
pub type ComplaintId = String;
/// Flat record handed to the persistence sink, keyed by column name.
pub type SinkRow = Map<String, Value>;

/// Position of a conversation in the complaint workflow.
///
/// The declaration order is the forward order of the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationStep {
    /// No interaction processed yet.
    Start,
    /// Waiting for a photo of the prescription.
    AwaitingPrescription,
    /// A prescription was read and awaits the user's authorization.
    AwaitingConsent,
    /// Prescription data was applied to the session.
    PrescriptionParsed,
    /// Waiting for the list of undelivered medications.
    AwaitingMedications,
    /// Waiting for the delivery city.
    AwaitingCity,
    /// Waiting for a contact phone number.
    AwaitingPhone,
    /// Waiting for the birth date.
    AwaitingBirthdate,
    /// Waiting for the affiliation regime.
    AwaitingRegime,
    /// Waiting for the residence address.
    AwaitingAddress,
    /// Waiting for the pharmacy name.
    AwaitingPharmacy,
    /// Every required field is present.
    Complete,
}

impl ConversationStep {
    /// Return the step as its wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStep::Start => "START",
            ConversationStep::AwaitingPrescription => "AWAITING_PRESCRIPTION",
            ConversationStep::AwaitingConsent => "AWAITING_CONSENT",
            ConversationStep::PrescriptionParsed => "PRESCRIPTION_PARSED",
            ConversationStep::AwaitingMedications => "AWAITING_MEDICATIONS",
            ConversationStep::AwaitingCity => "AWAITING_CITY",
            ConversationStep::AwaitingPhone => "AWAITING_PHONE",
            ConversationStep::AwaitingBirthdate => "AWAITING_BIRTHDATE",
            ConversationStep::AwaitingRegime => "AWAITING_REGIME",
            ConversationStep::AwaitingAddress => "AWAITING_ADDRESS",
            ConversationStep::AwaitingPharmacy => "AWAITING_PHARMACY",
            ConversationStep::Complete => "COMPLETE",
        }
    }

    /// Whether no prescription has been requested or received yet.
    pub fn is_before_prescription(&self) -> bool {
        matches!(
            self,
            ConversationStep::Start | ConversationStep::AwaitingPrescription
        )
    }
}

impl fmt::Display for ConversationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user.
    User,
    /// The assistant (canned or generated reply).
    Assistant,
}

impl Role {
    /// Return the role as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One entry of the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    /// Who produced the text.
    pub role: Role,
    /// Turn text.
    pub content: String,
    /// When the turn was recorded.
    pub created_at: DateTime<Utc>,
}

impl Turn {
    /// Build a user turn stamped now.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    /// Build an assistant turn stamped now.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Raw image delivered by the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageInput {
    /// Transport-level identity of the media (stable across redeliveries).
    pub media_id: String,
    /// Encoded image bytes.
    pub bytes: Vec<u8>,
    /// MIME type of `bytes`.
    pub mime_type: String,
}

/// Content of an inbound turn.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundPayload {
    /// Free-form text message.
    Text { content: String },
    /// Photo, expected to be a prescription.
    Image(ImageInput),
}

/// One message received from the chat transport.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundTurn {
    /// Sender identity.
    pub user_id: UserId,
    /// Transport message id, when the transport provides one.
    pub message_id: Option<String>,
    /// Display name from the sender's profile.
    pub sender_name: Option<String>,
    /// Receipt timestamp used by the duplicate guard.
    pub received_at: DateTime<Utc>,
    /// Message content.
    pub payload: InboundPayload,
}

impl InboundTurn {
    /// Build a text turn received now.
    pub fn text(user_id: impl Into<UserId>, content: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            message_id: None,
            sender_name: None,
            received_at: Utc::now(),
            payload: InboundPayload::Text {
                content: content.into(),
            },
        }
    }

    /// Build an image turn received now.
    pub fn image(user_id: impl Into<UserId>, image: ImageInput) -> Self {
        Self {
            user_id: user_id.into(),
            message_id: None,
            sender_name: None,
            received_at: Utc::now(),
            payload: InboundPayload::Image(image),
        }
    }

    /// Override the receipt timestamp.
    pub fn at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = received_at;
        self
    }

    /// Attach the transport message id.
    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    /// Attach the sender display name.
    pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = Some(name.into());
        self
    }
}

/// Input handed to the free-text generator.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyRequest {
    /// Natural-language description of the session state.
    pub context: String,
    /// Most recent turns, oldest first.
    pub history: Vec<Turn>,
}

/// Result of processing one inbound turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnOutcome {
    /// Replies to send back, in order.
    pub replies: Vec<String>,
    /// Step after the turn, absent when the turn was suppressed.
    pub step: Option<ConversationStep>,
    /// Whether the active complaint is persisted after the turn.
    pub saved: bool,
    /// The turn was a duplicate delivery and was ignored.
    pub suppressed: bool,
    /// The image collaborator could not read the prescription.
    pub prescription_unreadable: bool,
}

impl TurnOutcome {
    /// Outcome for a dropped duplicate delivery.
    pub fn suppressed() -> Self {
        Self {
            suppressed: true,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn steps_serialize_with_wire_names() {
        let encoded = serde_json::to_string(&ConversationStep::AwaitingBirthdate).expect("encode");
        assert_eq!(encoded, "\"AWAITING_BIRTHDATE\"");
        let decoded: ConversationStep =
            serde_json::from_str("\"AWAITING_PHARMACY\"").expect("decode");
        assert_eq!(decoded, ConversationStep::AwaitingPharmacy);
        assert_eq!(ConversationStep::Complete.to_string(), "COMPLETE");
    }

    #[test]
    fn steps_are_ordered_along_the_workflow() {
        assert!(ConversationStep::Start < ConversationStep::AwaitingConsent);
        assert!(ConversationStep::AwaitingCity < ConversationStep::AwaitingPhone);
        assert!(ConversationStep::AwaitingPharmacy < ConversationStep::Complete);
        assert!(ConversationStep::AwaitingPrescription.is_before_prescription());
        assert_eq!(ConversationStep::AwaitingCity.is_before_prescription(), false);
    }
}
