//! Session context handed to the reply generator.

use crate::types::{Field, Session};
use remedy_rs_protocol::PrescriptionData;

/// Renders what the session knows and what is still missing, as `## `
/// sections joined by horizontal rules.
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    /// Extra operator instructions appended as the last section.
    instructions: Option<String>,
}

impl ContextBuilder {
    pub fn new(instructions: Option<String>) -> Self {
        Self {
            instructions: instructions.filter(|text| !text.trim().is_empty()),
        }
    }

    /// Build the context for one generator call.
    pub fn build(&self, session: &Session) -> String {
        let mut sections = vec![build_header_section()];
        if let Some(name) = patient_name(session) {
            sections.push(format!("## Nombre del paciente\n\n{name}"));
        }
        sections.push(build_collected_section(session));
        sections.push(build_state_section(session));
        sections.push(build_pending_section(session));
        sections.push(format!(
            "## Próxima acción\n\n- {}",
            next_action(session)
        ));
        sections.push(build_prescription_section(
            session.fields.prescription.as_ref(),
        ));
        if let Some(instructions) = &self.instructions {
            sections.push(format!(
                "## Instrucciones adicionales\n\n{}",
                instructions.trim()
            ));
        }
        sections.join("\n\n---\n\n")
    }
}

fn build_header_section() -> String {
    "# No Me Entregaron\n\n\
Eres un asistente virtual que ayuda a radicar quejas cuando la EPS no entrega medicamentos en Colombia.\n\
- Confirma brevemente cada dato recibido antes de pasar al siguiente.\n\
- Nunca preguntes por información que ya tienes.\n\
- La fórmula médica es obligatoria; sin ella no se tramita ninguna queja."
        .to_string()
}

fn patient_name(session: &Session) -> Option<&str> {
    session
        .fields
        .prescription
        .as_ref()
        .map(|prescription| prescription.patient_name.as_str())
        .filter(|name| !name.is_empty())
}

fn label(field: Field) -> &'static str {
    match field {
        Field::MissingMedications => "Medicamentos no entregados",
        Field::City => "Ciudad",
        Field::Phone => "Celular",
        Field::BirthDate => "Fecha de nacimiento",
        Field::Regime => "Régimen de afiliación",
        Field::Address => "Dirección",
        Field::Pharmacy => "Farmacia",
    }
}

fn build_collected_section(session: &Session) -> String {
    let lines: Vec<String> = Field::ORDER
        .into_iter()
        .filter(|field| session.fields.has(*field))
        .filter_map(|field| {
            session
                .fields
                .value(field)
                .map(|value| format!("- {}: {value}", label(field)))
        })
        .collect();
    if lines.is_empty() {
        "## Datos recopilados\n\nNinguno todavía.".to_string()
    } else {
        format!("## Datos recopilados\n\n{}", lines.join("\n"))
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "Sí" } else { "No" }
}

fn build_state_section(session: &Session) -> String {
    format!(
        "## Estado de la conversación\n\n\
- Paso actual: {}\n\
- Ha saludado: {}\n\
- Consentimiento para procesar datos: {}\n\
- Proceso completado: {}",
        session.step,
        yes_no(session.greeted),
        yes_no(session.consent_given),
        yes_no(session.active_complaint.saved),
    )
}

fn build_pending_section(session: &Session) -> String {
    let mut pending = Vec::new();
    if !session.has_prescription() {
        pending.push("Fórmula médica");
    }
    if !session.consent_given {
        pending.push("Consentimiento para procesar datos");
    }
    pending.extend(
        Field::ORDER
            .into_iter()
            .filter(|field| !session.fields.has(*field))
            .map(label),
    );
    if pending.is_empty() {
        "## Información pendiente\n\nNada.".to_string()
    } else {
        let lines: Vec<String> = pending.iter().map(|item| format!("- {item}")).collect();
        format!("## Información pendiente\n\n{}", lines.join("\n"))
    }
}

fn next_action(session: &Session) -> String {
    if !session.greeted {
        return "Saludar al usuario".to_string();
    }
    if !session.has_prescription() {
        return if session.awaiting_consent() {
            "Solicitar consentimiento para procesar datos".to_string()
        } else {
            "Solicitar foto de fórmula médica".to_string()
        };
    }
    match Field::ORDER
        .into_iter()
        .find(|field| !session.fields.has(*field))
    {
        Some(field) if session.asked.was_asked(field) => format!(
            "Ya se preguntó {}; recordarlo brevemente sin repetir la pregunta completa",
            label(field).to_lowercase()
        ),
        Some(field) => format!("Preguntar {}", label(field).to_lowercase()),
        None => "Presentar resumen final".to_string(),
    }
}

fn build_prescription_section(prescription: Option<&PrescriptionData>) -> String {
    let Some(prescription) = prescription else {
        return "## Fórmula médica\n\nNo proporcionada aún.".to_string();
    };
    let mut section = format!(
        "## Fórmula médica\n\n\
- Paciente: {}\n\
- Documento: {} {}\n\
- Doctor: {}\n\
- Fecha de atención: {}\n\
- EPS: {}",
        prescription.patient_name,
        prescription.document_type,
        prescription.document_number,
        prescription.doctor,
        prescription.attending_date,
        prescription.insurer,
    );
    if let Some(diagnosis) = &prescription.diagnosis {
        section.push_str(&format!("\n- Diagnóstico: {diagnosis}"));
    }
    if !prescription.medications.is_empty() {
        section.push_str("\n- Medicamentos recetados:\n");
        section.push_str(&prescription.numbered_medications());
    }
    section
}
