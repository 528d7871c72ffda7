//! Session and complaint records owned by the engine.

use chrono::{DateTime, Utc};
use remedy_rs_protocol::{ComplaintId, ConversationStep, PrescriptionData, Turn, UserId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Placeholder some replies leave in the missing-medication field before the
/// user has actually answered.
pub const UNSPECIFIED_MEDICATIONS: &str = "[aún no especificado]";

/// A collectable complaint field, in the order the engine asks for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    MissingMedications,
    City,
    Phone,
    BirthDate,
    Regime,
    Address,
    Pharmacy,
}

impl Field {
    /// Every field in collection order.
    pub const ORDER: [Field; 7] = [
        Field::MissingMedications,
        Field::City,
        Field::Phone,
        Field::BirthDate,
        Field::Regime,
        Field::Address,
        Field::Pharmacy,
    ];

    /// Step the conversation sits on while this field is outstanding.
    pub fn step(&self) -> ConversationStep {
        match self {
            Field::MissingMedications => ConversationStep::AwaitingMedications,
            Field::City => ConversationStep::AwaitingCity,
            Field::Phone => ConversationStep::AwaitingPhone,
            Field::BirthDate => ConversationStep::AwaitingBirthdate,
            Field::Regime => ConversationStep::AwaitingRegime,
            Field::Address => ConversationStep::AwaitingAddress,
            Field::Pharmacy => ConversationStep::AwaitingPharmacy,
        }
    }

    /// Field being collected at `step`, if any.
    pub fn for_step(step: ConversationStep) -> Option<Field> {
        Field::ORDER.into_iter().find(|field| field.step() == step)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::MissingMedications => "missing_medications",
            Field::City => "city",
            Field::Phone => "phone",
            Field::BirthDate => "birth_date",
            Field::Regime => "regime",
            Field::Address => "address",
            Field::Pharmacy => "pharmacy",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health-system affiliation regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Regime {
    Contributivo,
    Subsidiado,
}

impl Regime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::Contributivo => "Contributivo",
            Regime::Subsidiado => "Subsidiado",
        }
    }

    /// Regime named anywhere in `text` (case-insensitive); contributory wins
    /// when both appear.
    pub fn find_in(text: &str) -> Option<Regime> {
        let lower = text.to_lowercase();
        if lower.contains("contributivo") {
            Some(Regime::Contributivo)
        } else if lower.contains("subsidiado") {
            Some(Regime::Subsidiado)
        } else {
            None
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values collected for the complaint being built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplaintFields {
    /// Prescription applied after consent.
    pub prescription: Option<PrescriptionData>,
    /// Comma-joined names of the medications that were not delivered.
    pub missing_medications: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    /// Birth date as DD/MM/YYYY.
    pub birth_date: Option<String>,
    pub regime: Option<Regime>,
    pub address: Option<String>,
    pub pharmacy: Option<String>,
}

impl ComplaintFields {
    /// Whether the missing-medication answer is a real answer.
    pub fn has_missing_medications(&self) -> bool {
        self.missing_medications
            .as_deref()
            .map(str::trim)
            .is_some_and(|value| !value.is_empty() && value != UNSPECIFIED_MEDICATIONS)
    }

    /// Whether a field counts as collected.
    pub fn has(&self, field: Field) -> bool {
        match field {
            Field::MissingMedications => self.has_missing_medications(),
            Field::Regime => self.regime.is_some(),
            other => self.text(other).is_some(),
        }
    }

    /// Current value of a field as text.
    pub fn value(&self, field: Field) -> Option<String> {
        match field {
            Field::Regime => self.regime.map(|regime| regime.as_str().to_string()),
            other => self.text(other).map(str::to_string),
        }
    }

    fn text(&self, field: Field) -> Option<&str> {
        let slot = match field {
            Field::MissingMedications => &self.missing_medications,
            Field::City => &self.city,
            Field::Phone => &self.phone,
            Field::BirthDate => &self.birth_date,
            Field::Address => &self.address,
            Field::Pharmacy => &self.pharmacy,
            Field::Regime => return None,
        };
        slot.as_deref().filter(|value| !value.trim().is_empty())
    }

    /// Write a field. Blank values are ignored, as are regime values that
    /// name neither regime. Returns whether the field was written.
    pub fn set(&mut self, field: Field, value: &str) -> bool {
        let value = value.trim();
        if value.is_empty() {
            return false;
        }
        let slot = match field {
            Field::Regime => {
                return match Regime::find_in(value) {
                    Some(regime) => {
                        self.regime = Some(regime);
                        true
                    }
                    None => false,
                };
            }
            Field::MissingMedications => &mut self.missing_medications,
            Field::City => &mut self.city,
            Field::Phone => &mut self.phone,
            Field::BirthDate => &mut self.birth_date,
            Field::Address => &mut self.address,
            Field::Pharmacy => &mut self.pharmacy,
        };
        *slot = Some(value.to_string());
        true
    }

    /// Drop a collected value.
    pub fn clear(&mut self, field: Field) {
        match field {
            Field::MissingMedications => self.missing_medications = None,
            Field::City => self.city = None,
            Field::Phone => self.phone = None,
            Field::BirthDate => self.birth_date = None,
            Field::Regime => self.regime = None,
            Field::Address => self.address = None,
            Field::Pharmacy => self.pharmacy = None,
        }
    }

    /// Every field after the prescription is collected.
    pub fn all_present(&self) -> bool {
        Field::ORDER.iter().all(|field| self.has(*field))
    }

    /// Prescribed medication names, empty before a prescription is applied.
    pub fn candidate_medications(&self) -> &[String] {
        self.prescription
            .as_ref()
            .map(|prescription| prescription.medications.as_slice())
            .unwrap_or(&[])
    }
}

/// Per-field "question already posed" guard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AskedFields(BTreeSet<Field>);

impl AskedFields {
    /// Mark a field as asked; returns true the first time.
    pub fn mark(&mut self, field: Field) -> bool {
        self.0.insert(field)
    }

    pub fn was_asked(&self, field: Field) -> bool {
        self.0.contains(&field)
    }

    /// Allow the question to be posed again.
    pub fn reset(&mut self, field: Field) {
        self.0.remove(&field);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// Complaint instance currently being built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveComplaint {
    pub id: ComplaintId,
    /// Set once the sink accepted the row; never reset for the same id.
    pub saved: bool,
}

impl ActiveComplaint {
    /// Fresh complaint id `{user_id}_{unix_seconds}`.
    pub fn new(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: format!("{user_id}_{}", now.timestamp()),
            saved: false,
        }
    }
}

/// Summary of a complaint that reached the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplaintSummary {
    pub id: ComplaintId,
    pub filed_at: DateTime<Utc>,
    pub patient: String,
    pub missing_medications: String,
}

/// One saved complaint in a patient's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientComplaint {
    pub id: ComplaintId,
    pub filed_at: DateTime<Utc>,
    pub missing_medications: String,
    pub insurer: String,
    pub diagnosis: Option<String>,
}

/// Saved complaints grouped under one patient document number.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub name: String,
    pub complaints: Vec<PatientComplaint>,
}

/// What the duplicate guard remembers about the last accepted delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryMark {
    pub at: DateTime<Utc>,
    pub message_id: Option<String>,
    /// Text content when the last delivery was text.
    pub text: Option<String>,
    /// Media id of the last accepted image and when it arrived.
    pub last_media: Option<(String, DateTime<Utc>)>,
}

/// Per-user conversation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: UserId,
    pub created_at: DateTime<Utc>,
    pub last_interaction_at: DateTime<Utc>,
    /// Name shown in replies; from the transport profile or the prescription.
    pub display_name: Option<String>,
    pub fields: ComplaintFields,
    pub step: ConversationStep,
    pub consent_given: bool,
    pub greeted: bool,
    /// Prescription read before consent was given.
    pub pending_prescription: Option<PrescriptionData>,
    pub history: Vec<Turn>,
    pub asked: AskedFields,
    pub active_complaint: ActiveComplaint,
    /// Complaints already saved, oldest first.
    pub prior_complaints: Vec<ComplaintSummary>,
    /// Saved complaints keyed by patient document number.
    pub patient_history: BTreeMap<String, PatientRecord>,
    pub last_delivery: Option<DeliveryMark>,
}

impl Session {
    /// New session for a first contact.
    pub fn new(id: impl Into<UserId>, now: DateTime<Utc>) -> Self {
        let id = id.into();
        let active_complaint = ActiveComplaint::new(&id, now);
        Self {
            id,
            created_at: now,
            last_interaction_at: now,
            display_name: None,
            fields: ComplaintFields::default(),
            step: ConversationStep::Start,
            consent_given: false,
            greeted: false,
            pending_prescription: None,
            history: Vec::new(),
            asked: AskedFields::default(),
            active_complaint,
            prior_complaints: Vec::new(),
            patient_history: BTreeMap::new(),
            last_delivery: None,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_interaction_at = now;
    }

    /// Whether a prescription awaits the user's authorization.
    pub fn awaiting_consent(&self) -> bool {
        self.pending_prescription.is_some()
    }

    pub fn has_prescription(&self) -> bool {
        self.fields.prescription.is_some()
    }

    /// Apply a consented prescription, seeding the display name from the
    /// patient name when the transport gave none.
    pub fn apply_prescription(&mut self, prescription: PrescriptionData) {
        if self.display_name.is_none() && !prescription.patient_name.is_empty() {
            self.display_name = Some(prescription.patient_name.clone());
        }
        self.fields.prescription = Some(prescription);
        self.step = ConversationStep::PrescriptionParsed;
    }

    /// Start a new complaint: collected fields and the asked guard are
    /// cleared, a new complaint id is assigned, and the conversation returns
    /// to the prescription request. Name, history, and saved complaints stay.
    pub fn reset_for_new_complaint(&mut self, now: DateTime<Utc>) {
        self.fields = ComplaintFields::default();
        self.asked.clear();
        self.pending_prescription = None;
        self.active_complaint = ActiveComplaint::new(&self.id, now);
        self.step = ConversationStep::AwaitingPrescription;
        self.greeted = true;
        self.touch(now);
    }

    /// User-requested restart. Same as a new complaint, and consent carries
    /// over so the next prescription is applied directly.
    pub fn restart(&mut self, now: DateTime<Utc>) {
        self.reset_for_new_complaint(now);
        self.consent_given = true;
    }

    /// Append a turn, keeping only the most recent `window` turns.
    pub fn record_turn(&mut self, turn: Turn, window: usize) {
        self.history.push(turn);
        let excess = self.history.len().saturating_sub(window.max(1));
        if excess > 0 {
            self.history.drain(..excess);
        }
    }

    /// Most recent `window` turns, oldest first.
    pub fn recent_history(&self, window: usize) -> &[Turn] {
        let start = self.history.len().saturating_sub(window);
        &self.history[start..]
    }

    /// First name to greet the user with.
    pub fn first_name(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .and_then(|name| name.split_whitespace().next())
    }
}
