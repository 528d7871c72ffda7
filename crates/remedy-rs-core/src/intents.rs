//! Fixed Spanish idioms that steer the conversation.

use crate::error::RemedyCoreError;
use crate::types::Field;
use regex::Regex;

/// Recognizes consent, farewell, restart and other conversation idioms.
#[derive(Debug, Clone)]
pub struct IntentMatcher {
    affirmative: Regex,
    negative: Regex,
    farewell: Regex,
    new_complaint: Regex,
    lost_prescription: Regex,
    change: Regex,
    history: Regex,
    greeting: Regex,
}

impl IntentMatcher {
    pub fn new() -> Result<Self, RemedyCoreError> {
        Ok(Self {
            affirmative: Regex::new(
                r"(?i)\b(si|sí|claro|ok|dale|autorizo|acepto|por supuesto|listo|adelante)\b",
            )?,
            negative: Regex::new(
                r"(?i)(^[\s¡!.,]*no\b|\bno\s+(autorizo|acepto|doy|quiero|estoy de acuerdo)\b|\bnegativo\b)",
            )?,
            farewell: Regex::new(
                r"(?i)\b(no|nada|listo|ok|está bien|bien así|gracias|eso sería todo|es todo)\b",
            )?,
            new_complaint: Regex::new(
                r"(?i)(nueva queja|otra queja|quiero hacer otra|iniciar otra|tramitar otra|otra .*queja|reportar otro|denunciar otro|otro medicamento no entregado|volver a empezar)",
            )?,
            lost_prescription: Regex::new(
                r"(?i)(perd[ií] la f[oó]rmula|no tengo la f[oó]rmula|se me perd[ií]|no la tengo|se me dañó|se me mojó|no la encuentro)",
            )?,
            change: Regex::new(r"(?i)cambiar (.*)")?,
            history: Regex::new(r"(?i)(historial|quejas anteriores|mis quejas)")?,
            greeting: Regex::new(
                r"(?i)\b(hola|buenos días|buenas tardes|buenas noches|saludos|hey|hi|hello|ey)\b",
            )?,
        })
    }

    /// Consent answer ("sí", "claro", "autorizo", ...).
    ///
    /// A leading "no" or a negated consent verb wins over any positive word.
    pub fn is_affirmative(&self, text: &str) -> bool {
        !self.negative.is_match(text) && self.affirmative.is_match(text)
    }

    /// Closing message once the complaint is complete.
    pub fn is_farewell(&self, text: &str) -> bool {
        self.farewell.is_match(text)
    }

    pub fn is_new_complaint(&self, text: &str) -> bool {
        self.new_complaint.is_match(text)
    }

    pub fn is_lost_prescription(&self, text: &str) -> bool {
        self.lost_prescription.is_match(text)
    }

    /// "/reset", "empezar de nuevo" or "reiniciar".
    pub fn is_reset(&self, text: &str) -> bool {
        let lower = text.trim().to_lowercase();
        lower == "/reset" || lower.contains("empezar de nuevo") || lower.contains("reiniciar")
    }

    /// Field named in a "cambiar <campo>" request.
    pub fn change_request(&self, text: &str) -> Option<Field> {
        let caps = self.change.captures(text)?;
        let target = caps[1].trim().to_lowercase();
        let has = |words: &[&str]| words.iter().any(|word| target.contains(word));
        if has(&["ciudad"]) {
            Some(Field::City)
        } else if has(&["régimen", "regimen"]) {
            Some(Field::Regime)
        } else if has(&["fecha"]) {
            Some(Field::BirthDate)
        } else if has(&["dirección", "direccion"]) {
            Some(Field::Address)
        } else if has(&["farmacia"]) {
            Some(Field::Pharmacy)
        } else if has(&["celular", "teléfono", "telefono"]) {
            Some(Field::Phone)
        } else {
            None
        }
    }

    pub fn is_history_query(&self, text: &str) -> bool {
        self.history.is_match(text)
    }

    pub fn is_greeting(&self, text: &str) -> bool {
        self.greeting.is_match(text)
    }

    /// A generated reply announcing that the complaint will be filed.
    pub fn announces_completion(&self, reply: &str) -> bool {
        let lower = reply.to_lowercase();
        ["próximas", "horas", "tramitaremos", "queja"]
            .iter()
            .all(|word| lower.contains(word))
    }
}

#[cfg(test)]
mod tests {
    use super::IntentMatcher;
    use crate::types::Field;
    use pretty_assertions::assert_eq;

    #[test]
    fn consent_requires_whole_words() {
        let intents = IntentMatcher::new().expect("intents");
        assert!(intents.is_affirmative("Sí, claro"));
        assert!(intents.is_affirmative("autorizo"));
        assert_eq!(intents.is_affirmative("no, gracias"), false);
        assert_eq!(intents.is_affirmative("okey no sé"), false);
    }

    #[test]
    fn negated_consent_is_a_refusal() {
        let intents = IntentMatcher::new().expect("intents");
        assert_eq!(intents.is_affirmative("No, no autorizo"), false);
        assert_eq!(intents.is_affirmative("no acepto, gracias"), false);
        assert_eq!(intents.is_affirmative("claro que no autorizo"), false);
        assert_eq!(intents.is_affirmative("¡No! ok"), false);
        assert!(intents.is_affirmative("sí, no hay problema"));
    }

    #[test]
    fn change_requests_name_their_field() {
        let intents = IntentMatcher::new().expect("intents");
        assert_eq!(intents.change_request("quiero cambiar mi ciudad"), Some(Field::City));
        assert_eq!(
            intents.change_request("Cambiar fecha de nacimiento"),
            Some(Field::BirthDate)
        );
        assert_eq!(intents.change_request("cambiar el teléfono"), Some(Field::Phone));
        assert_eq!(intents.change_request("cambiar de tema"), None);
        assert_eq!(intents.change_request("mi ciudad es Cali"), None);
    }

    #[test]
    fn recognizes_restart_idioms() {
        let intents = IntentMatcher::new().expect("intents");
        assert!(intents.is_reset("/reset"));
        assert!(intents.is_reset("quiero empezar de nuevo"));
        assert!(intents.is_new_complaint("quiero poner otra queja"));
        assert!(intents.is_lost_prescription("se me perdió la fórmula"));
        assert_eq!(intents.is_new_complaint("gracias"), false);
    }

    #[test]
    fn completion_announcement_needs_all_markers() {
        let intents = IntentMatcher::new().expect("intents");
        assert!(intents.announces_completion(
            "En las próximas 24 horas tramitaremos tu queja ante la EPS."
        ));
        assert_eq!(intents.announces_completion("Tramitaremos tu queja pronto."), false);
    }
}
