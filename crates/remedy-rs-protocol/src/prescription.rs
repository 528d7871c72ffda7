//! Prescription record produced by the image collaborator, plus parsing of
//! the model's JSON answer.

use crate::CollaboratorError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Placeholder some readers emit instead of an empty medication list.
pub const NO_MEDICATIONS_MARKER: &str = "No se detectaron medicamentos";

/// Structured fields read from a prescription photo.
///
/// Serialized with the Spanish keys used by the reader prompt and the sink.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrescriptionData {
    #[serde(rename = "tipo_documento", default, deserialize_with = "lenient_string")]
    pub document_type: String,
    #[serde(rename = "numero_documento", default, deserialize_with = "lenient_string")]
    pub document_number: String,
    #[serde(rename = "paciente", default, deserialize_with = "lenient_string")]
    pub patient_name: String,
    /// Attending date as printed, usually DD/MM/YYYY.
    #[serde(rename = "fecha_atencion", default, deserialize_with = "lenient_string")]
    pub attending_date: String,
    /// Insurer (EPS).
    #[serde(rename = "eps", default, deserialize_with = "lenient_string")]
    pub insurer: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub doctor: String,
    #[serde(
        rename = "diagnostico",
        default,
        deserialize_with = "lenient_optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub diagnosis: Option<String>,
    /// Provider institution (IPS), when printed.
    #[serde(
        default,
        deserialize_with = "lenient_optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub ips: Option<String>,
    /// Prescribed medications in printed order.
    #[serde(rename = "medicamentos", default, deserialize_with = "medication_list")]
    pub medications: Vec<String>,
}

impl PrescriptionData {
    /// A prescription is usable once it names at least one real medication.
    pub fn has_medications(&self) -> bool {
        match self.medications.as_slice() {
            [] => false,
            [only] => only.trim() != NO_MEDICATIONS_MARKER,
            _ => true,
        }
    }

    /// Numbered listing ("1. X\n2. Y") used when asking which were not delivered.
    pub fn numbered_medications(&self) -> String {
        self.medications
            .iter()
            .enumerate()
            .map(|(idx, med)| format!("{}. {}", idx + 1, med))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// First word of the patient name, if any.
    pub fn patient_first_name(&self) -> Option<&str> {
        self.patient_name.split_whitespace().next()
    }
}

/// Parse the reader model's reply into a prescription.
///
/// The reply may wrap the JSON object in prose or code fences and may nest the
/// record under a `datos` key.
pub fn parse_prescription_reply(reply: &str) -> Result<PrescriptionData, CollaboratorError> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => {
            return Err(CollaboratorError::Malformed(
                "no JSON object in reply".to_string(),
            ));
        }
    };
    let value: Value = serde_json::from_str(json)
        .map_err(|err| CollaboratorError::Malformed(format!("invalid JSON: {err}")))?;
    let record = match value {
        Value::Object(mut map) => match map.remove("datos") {
            Some(inner @ Value::Object(_)) => inner,
            Some(_) => {
                return Err(CollaboratorError::Malformed(
                    "`datos` is not an object".to_string(),
                ));
            }
            None => Value::Object(map),
        },
        _ => {
            return Err(CollaboratorError::Malformed(
                "reply is not a JSON object".to_string(),
            ));
        }
    };
    let data: PrescriptionData = serde_json::from_value(record)
        .map_err(|err| CollaboratorError::Malformed(format!("unexpected structure: {err}")))?;
    if !data.has_medications() {
        return Err(CollaboratorError::NoMedications);
    }
    Ok(data)
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_optional_string(deserializer)?.unwrap_or_default())
}

fn lenient_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(text)) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

fn medication_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let items = match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(text),
                _ => None,
            })
            .collect(),
        Some(Value::String(text)) => vec![text],
        _ => Vec::new(),
    };
    Ok(items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect())
}
