//! Next-requirement evaluation and direct per-step answers.

use crate::error::RemedyCoreError;
use crate::extract::DateParser;
use crate::selector::{MedicationSelector, Selection};
use crate::replies;
use crate::types::{Field, Regime, Session};
use chrono::NaiveDate;
use log::debug;
use regex::Regex;
use remedy_rs_config::ExtractionConfig;
use remedy_rs_protocol::ConversationStep;

/// Next action decided for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    /// No prescription yet.
    AwaitPrescription,
    /// A prescription waits for the user's authorization.
    AwaitConsent,
    /// Ask for `field`. `first_time` is false when the question was already posed.
    Ask { field: Field, first_time: bool },
    /// Every field is present. `newly` is true only on the transition.
    Complete { newly: bool },
}

/// Interpretation of a message as the answer to the current step's question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// The value was stored; `confirmation` acknowledges it.
    Accepted { field: Field, confirmation: String },
    /// The message was meant as an answer but could not be used.
    Unresolved(String),
    /// The message does not look like an answer.
    NotAnswered,
}

/// Decides what the conversation needs next.
#[derive(Debug, Clone)]
pub struct ConversationMachine {
    phone: Regex,
    phone_separators: Regex,
    bare_city: Regex,
    dates: DateParser,
    selector: MedicationSelector,
}

impl ConversationMachine {
    pub fn new(config: &ExtractionConfig) -> Result<Self, RemedyCoreError> {
        Ok(Self {
            phone: Regex::new(&format!(
                r"^[+\d\s()-]{{{},{}}}$",
                config.phone_min_len, config.phone_max_len
            ))?,
            phone_separators: Regex::new(r"[\s()-]")?,
            bare_city: Regex::new(r"^([A-Za-zÁáÉéÍíÓóÚúÜüÑñ\s]{3,})$")?,
            dates: DateParser::new()?,
            selector: MedicationSelector::new()?,
        })
    }

    pub fn selector(&self) -> &MedicationSelector {
        &self.selector
    }

    /// Recompute the step from the collected fields.
    ///
    /// COMPLETE is kept once reached; only a change request or a reset moves
    /// the session back.
    pub fn evaluate(&self, session: &mut Session) -> Evaluation {
        if session.step == ConversationStep::Complete {
            return Evaluation::Complete { newly: false };
        }
        if !session.has_prescription() {
            return if session.awaiting_consent() {
                session.step = ConversationStep::AwaitingConsent;
                Evaluation::AwaitConsent
            } else {
                session.step = ConversationStep::AwaitingPrescription;
                Evaluation::AwaitPrescription
            };
        }
        match Field::ORDER
            .into_iter()
            .find(|field| !session.fields.has(*field))
        {
            Some(field) => {
                session.step = field.step();
                let first_time = session.asked.mark(field);
                Evaluation::Ask { field, first_time }
            }
            None => {
                session.step = ConversationStep::Complete;
                debug!("session complete (user_id={})", session.id);
                Evaluation::Complete { newly: true }
            }
        }
    }

    /// Clear a field so the next evaluation asks for it again.
    pub fn request_change(&self, session: &mut Session, field: Field) {
        session.fields.clear(field);
        session.asked.reset(field);
        session.step = field.step();
        debug!(
            "requested field change (user_id={}, field={})",
            session.id, field
        );
    }

    /// Try `text` as the answer to the question of the current step.
    pub fn accept_answer(&self, text: &str, session: &mut Session, today: NaiveDate) -> Answer {
        let Some(field) = Field::for_step(session.step) else {
            return Answer::NotAnswered;
        };
        let trimmed = text.trim();
        let asks_back = trimmed.contains('?') || trimmed.contains('¿');

        let value = match field {
            Field::MissingMedications => {
                return match self.selector.apply(trimmed, session) {
                    Selection::Resolved { joined, via, .. } => Answer::Accepted {
                        field,
                        confirmation: replies::selection_confirmation(via, &joined),
                    },
                    Selection::Unresolved { reason } => {
                        Answer::Unresolved(replies::selection_unresolved(reason).to_string())
                    }
                };
            }
            Field::City if !asks_back && self.bare_city.is_match(trimmed) => {
                Some(trimmed.to_string())
            }
            Field::Phone if !asks_back && self.phone.is_match(trimmed) => {
                Some(self.phone_separators.replace_all(trimmed, "").into_owned())
            }
            Field::BirthDate => self.dates.parse(trimmed, today),
            Field::Regime => regime_answer(trimmed).map(|regime| regime.as_str().to_string()),
            Field::Address if !asks_back && trimmed.chars().count() >= 5 => {
                Some(trimmed.to_string())
            }
            Field::Pharmacy if !asks_back && trimmed.chars().count() >= 2 => {
                Some(trimmed.to_string())
            }
            _ => None,
        };

        match value {
            Some(value) if session.fields.set(field, &value) => {
                Answer::Accepted {
                    field,
                    confirmation: replies::confirmation(field, &value),
                }
            }
            _ => Answer::NotAnswered,
        }
    }
}

/// Regime named in the answer, or a shortcut (`c`, `con`, `s`, `sub`).
fn regime_answer(text: &str) -> Option<Regime> {
    if let Some(regime) = Regime::find_in(text) {
        return Some(regime);
    }
    match text.to_lowercase().as_str() {
        "c" | "con" => Some(Regime::Contributivo),
        "s" | "sub" => Some(Regime::Subsidiado),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use chrono::Utc;
    use remedy_rs_protocol::PrescriptionData;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).expect("date")
    }

    fn machine() -> ConversationMachine {
        ConversationMachine::new(&ExtractionConfig::default()).expect("machine")
    }

    fn with_prescription() -> Session {
        let mut session = Session::new("9", Utc::now());
        session.consent_given = true;
        session.apply_prescription(PrescriptionData {
            patient_name: "Ana".to_string(),
            medications: vec!["Losartan 50mg".to_string(), "Metformina 850mg".to_string()],
            ..PrescriptionData::default()
        });
        session
    }

    #[test]
    fn second_evaluation_reports_question_already_asked() {
        let machine = machine();
        let mut session = with_prescription();
        assert_eq!(
            machine.evaluate(&mut session),
            Evaluation::Ask {
                field: Field::MissingMedications,
                first_time: true
            }
        );
        assert_eq!(
            machine.evaluate(&mut session),
            Evaluation::Ask {
                field: Field::MissingMedications,
                first_time: false
            }
        );
        assert_eq!(session.step, ConversationStep::AwaitingMedications);
    }

    #[test]
    fn pending_prescription_waits_for_consent() {
        let machine = machine();
        let mut session = Session::new("9", Utc::now());
        assert_eq!(machine.evaluate(&mut session), Evaluation::AwaitPrescription);
        session.pending_prescription = Some(PrescriptionData::default());
        assert_eq!(machine.evaluate(&mut session), Evaluation::AwaitConsent);
        assert_eq!(session.step, ConversationStep::AwaitingConsent);
    }

    #[test]
    fn phone_answer_is_stripped_and_questions_rejected() {
        let machine = machine();
        let mut session = with_prescription();
        session.step = ConversationStep::AwaitingPhone;
        assert_eq!(
            machine.accept_answer("¿para qué?", &mut session, today()),
            Answer::NotAnswered
        );
        assert!(matches!(
            machine.accept_answer("(300) 123-4567", &mut session, today()),
            Answer::Accepted { field: Field::Phone, .. }
        ));
        assert_eq!(session.fields.phone.as_deref(), Some("3001234567"));
    }

    #[test]
    fn regime_shortcuts_and_malformed_answers() {
        let machine = machine();
        let mut session = with_prescription();
        session.step = ConversationStep::AwaitingRegime;
        assert_eq!(
            machine.accept_answer("no sé", &mut session, today()),
            Answer::NotAnswered
        );
        assert_eq!(session.step, ConversationStep::AwaitingRegime);
        machine.accept_answer("sub", &mut session, today());
        assert_eq!(session.fields.regime, Some(Regime::Subsidiado));
    }

    #[test]
    fn change_request_reopens_field_after_completion() {
        let machine = machine();
        let mut session = with_prescription();
        for (field, value) in [
            (Field::MissingMedications, "Losartan 50mg"),
            (Field::City, "Cali"),
            (Field::Phone, "3001234567"),
            (Field::BirthDate, "01/01/1980"),
            (Field::Regime, "Contributivo"),
            (Field::Address, "Calle 1 # 2-3"),
            (Field::Pharmacy, "Cruz Verde"),
        ] {
            session.fields.set(field, value);
        }
        assert_eq!(machine.evaluate(&mut session), Evaluation::Complete { newly: true });
        assert_eq!(machine.evaluate(&mut session), Evaluation::Complete { newly: false });

        machine.request_change(&mut session, Field::City);
        assert_eq!(
            machine.evaluate(&mut session),
            Evaluation::Ask {
                field: Field::City,
                first_time: true
            }
        );
    }
}
