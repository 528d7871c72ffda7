//! Pattern-based extraction of complaint fields from free text.
//!
//! Runs over user messages and generated replies alike. A miss is a silent
//! no-op and re-running over the same text writes the same values.

mod dates;

pub use dates::DateParser;

use crate::error::RemedyCoreError;
use crate::types::{Field, Regime, Session};
use chrono::NaiveDate;
use log::debug;
use regex::Regex;
use remedy_rs_config::ExtractionConfig;
use remedy_rs_protocol::ConversationStep;

/// Letters accepted in city and name captures.
const LETTERS: &str = "A-Za-zÁáÉéÍíÓóÚúÜüÑñ";

/// Where the text being mined came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    /// The user's own message; unlabelled values may replace earlier ones.
    User,
    /// A generated reply; unlabelled values only fill empty fields.
    Reply,
}

/// How a captured value is turned into the stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Normalize {
    Trim,
    Date,
}

/// One labelled recognizer: the label anchors the pattern, group 1 is the value.
#[derive(Debug, Clone)]
struct Recognizer {
    field: Field,
    pattern: Regex,
    normalize: Normalize,
}

/// Extracts field values from text and writes them into a session.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    recognizers: Vec<Recognizer>,
    bare_city: Regex,
    bare_phone: Regex,
    correction: Regex,
    dates: DateParser,
}

impl FieldExtractor {
    pub fn new(config: &ExtractionConfig) -> Result<Self, RemedyCoreError> {
        let recognizers = vec![
            recognizer(
                Field::City,
                &format!(r"(?i)(?:ciudad|estás en|vives en|ubicad[oa] en)[:\s]+([{LETTERS}\s]+?)(?:\.|!|\n|,)"),
                Normalize::Trim,
            )?,
            recognizer(
                Field::Phone,
                r"(?i)(?:celular|teléfono|número)[:\s]+([0-9+\s()-]+?)(?:\.|!|\n|,)",
                Normalize::Trim,
            )?,
            recognizer(
                Field::Pharmacy,
                &format!(r"(?i)(?:farmacia)[:\s]+([{LETTERS}\s0-9]+?)(?:\.|!|\n|,|\s+en\s)"),
                Normalize::Trim,
            )?,
            recognizer(
                Field::Address,
                &format!(r"(?i)(?:dirección)[:\s]+([{LETTERS}\s0-9#\-\.]+?)(?:\.|!|\n|,)"),
                Normalize::Trim,
            )?,
            recognizer(
                Field::Regime,
                r"(?i)(?:régimen|afiliación)[:\s]+(Contributivo|Subsidiado)",
                Normalize::Trim,
            )?,
            recognizer(
                Field::MissingMedications,
                r"(?i)(?:medicamentos? no entregados?)[:\s]+(.+?)(?:\.|!|\n|,)",
                Normalize::Trim,
            )?,
            recognizer(
                Field::BirthDate,
                r"(?i)(?:nacimiento|nació)[:\s]+(\d{1,2}[/-]\d{1,2}[/-]\d{4})",
                Normalize::Date,
            )?,
        ];
        Ok(Self {
            recognizers,
            bare_city: Regex::new(&format!(r"^([{LETTERS}\s]{{3,}})$"))?,
            bare_phone: Regex::new(&format!(r"\b(\d{{{}}})\b", config.bare_phone_digits))?,
            correction: Regex::new(r"(?i)me equivoqu[eé][\s,]*([^,]+) es ([^.]+)")?,
            dates: DateParser::new()?,
        })
    }

    /// Date parser shared with the direct-answer path.
    pub fn dates(&self) -> &DateParser {
        &self.dates
    }

    /// Write every field recognized in a user message into the session.
    ///
    /// Returns the fields that were written, in first-write order.
    pub fn apply(&self, text: &str, session: &mut Session, today: NaiveDate) -> Vec<Field> {
        self.apply_from(Source::User, text, session, today)
    }

    /// Same as [`FieldExtractor::apply`] for a generated reply, where bare
    /// numbers and dates never replace a value the session already has.
    pub fn apply_reply(&self, text: &str, session: &mut Session, today: NaiveDate) -> Vec<Field> {
        self.apply_from(Source::Reply, text, session, today)
    }

    fn apply_from(
        &self,
        source: Source,
        text: &str,
        session: &mut Session,
        today: NaiveDate,
    ) -> Vec<Field> {
        let mut written = Vec::new();

        for recognizer in &self.recognizers {
            let Some(value) = recognizer
                .pattern
                .captures_iter(text)
                .filter_map(|caps| caps.get(1))
                .map(|group| group.as_str().trim())
                .find(|value| value.chars().count() > 2)
            else {
                continue;
            };
            let value = match recognizer.normalize {
                Normalize::Trim => Some(value.to_string()),
                Normalize::Date => self.dates.parse(value, today),
            };
            if let Some(value) = value {
                write(session, recognizer.field, &value, &mut written);
            }
        }

        let trimmed = text.trim();
        if session.step == ConversationStep::AwaitingCity
            && !session.fields.has(Field::City)
            && self.bare_city.is_match(trimmed)
        {
            write(session, Field::City, trimmed, &mut written);
        }

        if (source == Source::User || !session.fields.has(Field::Phone))
            && let Some(caps) = self.bare_phone.captures(text)
        {
            write(session, Field::Phone, &caps[1], &mut written);
        }

        // A yearless date in a user message ("Calle 15 de mayo") only fills.
        let bare_date = if !session.fields.has(Field::BirthDate) {
            self.dates.parse(text, today)
        } else if source == Source::User {
            self.dates.parse_with_year(text)
        } else {
            None
        };
        if let Some(date) = bare_date {
            write(session, Field::BirthDate, &date, &mut written);
        }

        if let Some(regime) = Regime::find_in(text) {
            write(session, Field::Regime, regime.as_str(), &mut written);
        }

        if let Some(caps) = self.correction.captures(text) {
            let reference = caps[1].trim().to_lowercase();
            let value = caps[2].trim();
            if let Some(field) = correction_target(&reference) {
                let value = match field {
                    Field::BirthDate => self.dates.parse(value, today),
                    Field::Regime => Regime::find_in(value).map(|regime| regime.as_str().to_string()),
                    _ => Some(value.to_string()),
                };
                if let Some(value) = value
                    && write(session, field, &value, &mut written)
                {
                    session.asked.reset(field);
                    debug!(
                        "applied correction (user_id={}, field={})",
                        session.id, field
                    );
                }
            }
        }

        written
    }
}

fn recognizer(field: Field, pattern: &str, normalize: Normalize) -> Result<Recognizer, RemedyCoreError> {
    Ok(Recognizer {
        field,
        pattern: Regex::new(pattern)?,
        normalize,
    })
}

fn write(session: &mut Session, field: Field, value: &str, written: &mut Vec<Field>) -> bool {
    if !session.fields.set(field, value) {
        return false;
    }
    if !written.contains(&field) {
        written.push(field);
    }
    true
}

/// Field named by the reference part of "me equivoqué, <ref> es <value>".
fn correction_target(reference: &str) -> Option<Field> {
    let has = |words: &[&str]| words.iter().any(|word| reference.contains(word));
    if has(&["ciudad", "vivo"]) {
        Some(Field::City)
    } else if has(&["celular", "teléfono", "telefono", "numero", "número"]) {
        Some(Field::Phone)
    } else if has(&["direccion", "dirección"]) {
        Some(Field::Address)
    } else if has(&["farmacia"]) {
        Some(Field::Pharmacy)
    } else if has(&["nacimiento", "nací"]) {
        Some(Field::BirthDate)
    } else if has(&["regimen", "régimen"]) {
        Some(Field::Regime)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::FieldExtractor;
    use crate::types::{Field, Regime, Session};
    use chrono::{NaiveDate, Utc};
    use pretty_assertions::assert_eq;
    use remedy_rs_config::ExtractionConfig;
    use remedy_rs_protocol::ConversationStep;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).expect("date")
    }

    fn extractor() -> FieldExtractor {
        FieldExtractor::new(&ExtractionConfig::default()).expect("extractor")
    }

    #[test]
    fn bare_city_only_while_awaiting_city() {
        let extractor = extractor();
        let mut session = Session::new("1", Utc::now());
        assert!(extractor.apply("Bucaramanga", &mut session, today()).is_empty());

        session.step = ConversationStep::AwaitingCity;
        assert_eq!(
            extractor.apply("Bucaramanga", &mut session, today()),
            vec![Field::City]
        );
        assert_eq!(session.fields.city.as_deref(), Some("Bucaramanga"));
    }

    #[test]
    fn correction_overwrites_and_reopens_question() {
        let extractor = extractor();
        let mut session = Session::new("1", Utc::now());
        session.fields.set(Field::City, "Cali");
        session.asked.mark(Field::City);

        extractor.apply("me equivoqué, la ciudad es Pereira.", &mut session, today());
        assert_eq!(session.fields.city.as_deref(), Some("Pereira"));
        assert!(!session.asked.was_asked(Field::City));
    }

    #[test]
    fn correction_of_regime_uses_token_match() {
        let extractor = extractor();
        let mut session = Session::new("1", Utc::now());
        extractor.apply("me equivoque mi régimen es el subsidiado", &mut session, today());
        assert_eq!(session.fields.regime, Some(Regime::Subsidiado));
    }

    #[test]
    fn yearless_dates_do_not_replace_birth_date() {
        let extractor = extractor();
        let mut session = Session::new("1", Utc::now());
        extractor.apply("nací el 3 de mayo de 1990", &mut session, today());
        assert_eq!(session.fields.birth_date.as_deref(), Some("03/05/1990"));
        extractor.apply("vivo en la Calle 15 de mayo # 3-20", &mut session, today());
        assert_eq!(session.fields.birth_date.as_deref(), Some("03/05/1990"));

        extractor.apply("perdón, es el 4 de mayo de 1990", &mut session, today());
        assert_eq!(session.fields.birth_date.as_deref(), Some("04/05/1990"));
    }

    #[test]
    fn later_bare_phone_from_the_user_wins() {
        let extractor = extractor();
        let mut session = Session::new("1", Utc::now());
        session.fields.set(Field::Phone, "3001234567");

        let written =
            extractor.apply("perdón, mi número correcto es 3109876543", &mut session, today());
        assert_eq!(written, vec![Field::Phone]);
        assert_eq!(session.fields.phone.as_deref(), Some("3109876543"));
    }

    #[test]
    fn replies_only_fill_empty_bare_fields() {
        let extractor = extractor();
        let mut session = Session::new("1", Utc::now());
        session.fields.set(Field::Phone, "3001234567");
        session.fields.set(Field::BirthDate, "03/05/1990");

        let written = extractor.apply_reply(
            "Tu documento 1020304050 quedó registrado el 02/03/2024",
            &mut session,
            today(),
        );
        assert!(written.is_empty());
        assert_eq!(session.fields.phone.as_deref(), Some("3001234567"));
        assert_eq!(session.fields.birth_date.as_deref(), Some("03/05/1990"));
    }

    #[test]
    fn short_captures_are_ignored() {
        let extractor = extractor();
        let mut session = Session::new("1", Utc::now());
        assert!(extractor.apply("ciudad: Ab.", &mut session, today()).is_empty());
        assert_eq!(session.fields.city, None);
    }
}
