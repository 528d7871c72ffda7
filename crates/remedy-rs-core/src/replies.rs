//! User-facing copy. Every canned message the engine sends lives here.

use crate::selector::{SelectionVia, UnresolvedReason};
use crate::types::{ComplaintSummary, Field, Session};
use remedy_rs_protocol::PrescriptionData;

pub const WELCOME: &str = "¡Hola! 👋 Bienvenido a *No Me Entregaron*. \n\nSoy tu asistente virtual y estoy aquí para ayudarte a radicar quejas cuando no te entregan tus medicamentos en la EPS. 💊\n\nPor favor envíame una foto clara de tu fórmula médica. 📋📸";

pub const CONSENT: &str = "Para ayudarte con tu queja por medicamentos no entregados, necesito tu autorización para analizar la fórmula médica y procesar tus datos. ¿Me autorizas? (responde sí o no) 📝✅";

pub const UNREADABLE_PRESCRIPTION: &str = "No pude leer bien la fórmula. 🔍❌ ¿Podrías enviarme una foto más clara por favor? Necesito que la imagen esté bien iluminada y enfocada. 📸✨";

pub const LOST_PRESCRIPTION: &str = "Entiendo que no tienes la fórmula médica en este momento. 📋❓\n\nEstas son algunas opciones que puedes considerar:\n• Solicitar un duplicado directamente en tu EPS 🏥\n• Consultar tu historial médico en la página web de tu EPS (muchas permiten descargar fórmulas anteriores) 💻\n• Contactar a tu médico tratante para que te genere una nueva fórmula 👨‍⚕️\n\n¿Te gustaría más información sobre alguna de estas alternativas? También puedes escribirme cuando tengas la fórmula y te ayudaré con gusto. 🤝";

pub const REQUEST_PRESCRIPTION: &str =
    "Para ayudarte con tu queja, necesito que me envíes una foto clara de tu fórmula médica. 📋📸";

pub const FAREWELL: &str = "¡Excelente! 😊 Estaré pendiente de enviar el número de radicado. Si se te ocurre alguna otra pregunta o necesitas ayuda en el futuro, no dudes en escribirme. ¡Espero que pronto se solucione tu situación! Que tengas un buen día. ⭐";

pub const RESET: &str = "He reiniciado nuestra conversación. ¿En qué puedo ayudarte ahora? 🔄";

pub const NEW_COMPLAINT: &str = "¡Claro! 👍 Vamos a tramitar una nueva queja. Por favor, envíame una foto de tu fórmula médica para comenzar. 📋📸";

pub const APOLOGY: &str =
    "Lo siento, tuve un problema al procesar tu mensaje. ¿Podrías intentarlo de nuevo?";

/// Sent by the transport when the engine itself fails.
pub const UNEXPECTED_ERROR: &str = "Disculpa, ocurrió un error inesperado. Por favor, intenta nuevamente o escribe /reset para reiniciar la conversación. 🔄";

pub const CONSENT_DECLINED: &str = "Entiendo. Sin tu autorización no puedo procesar tus datos ni ayudarte con la queja. Si cambias de opinión, puedes escribirme nuevamente. ¡Que tengas un buen día! 👋";

pub const CONSENT_WITHOUT_PRESCRIPTION: &str = "¡Gracias por tu autorización! 👍 Ahora por favor envíame una foto de tu fórmula médica para comenzar el proceso. 📋📸";

pub const NO_PRIOR_COMPLAINTS: &str =
    "Aún no tienes quejas registradas con nosotros. Envíame una foto de tu fórmula médica para radicar la primera. 📋📸";

pub const HELP: &str = "Puedo ayudarte a radicar quejas cuando no te entregan medicamentos en tu EPS. Aquí hay algunos comandos útiles:\n\n/start - Iniciar una nueva conversación\n/reset - Reiniciar el proceso actual\n/help - Mostrar esta ayuda\n\nPara comenzar, simplemente envíame una foto de tu fórmula médica o escribe cualquier mensaje. 📋📸";

/// Short greeting followed by the prescription request.
pub fn greeting_with_request() -> String {
    format!("¡Hola! 👋 Bienvenido a No Me Entregaron.\n\n{REQUEST_PRESCRIPTION}")
}

/// Greeting sent while an image is being read.
pub fn image_greeting(first_name: Option<&str>) -> String {
    let salute = match first_name {
        Some(name) => format!("¡Hola {name}! 👋"),
        None => "¡Hola! 👋".to_string(),
    };
    format!(
        "{salute} Bienvenido a *No Me Entregaron*. Estoy analizando tu fórmula médica, dame un momento... 🔍"
    )
}

/// Question that asks for a field.
pub fn question(field: Field) -> &'static str {
    match field {
        Field::MissingMedications => {
            "Por favor, dime cuáles de estos medicamentos no te fueron entregados. 💊"
        }
        Field::City => "¿En qué ciudad te entregan tus medicamentos? 🏙️",
        Field::Phone => {
            "¿Cuál es tu número de celular? 📱 Lo necesitamos para contactarte sobre el estado de tu queja."
        }
        Field::BirthDate => "¿Cuál es tu fecha de nacimiento (DD/MM/AAAA)? 📅",
        Field::Regime => "¿Cuál es tu régimen de afiliación? (Contributivo o Subsidiado) 🏛️",
        Field::Address => "¿Podrías proporcionarme tu dirección completa? 🏠",
        Field::Pharmacy => {
            "¿Cuál es el nombre de la farmacia donde no te entregaron el medicamento? 💊"
        }
    }
}

/// Acknowledgement of a direct answer.
pub fn confirmation(field: Field, value: &str) -> String {
    match field {
        Field::MissingMedications => {
            format!("Entiendo, los medicamentos que no te entregaron son: {value}.")
        }
        Field::City => format!("¡Perfecto, gracias! He registrado que estás en {value}."),
        Field::Phone => format!("Gracias, he registrado tu número de celular: {value}. 📱"),
        Field::BirthDate => {
            format!("Gracias, he registrado tu fecha de nacimiento: {value}. 📆✅")
        }
        Field::Regime => format!("Gracias, he registrado tu régimen como {value}. ✅"),
        Field::Address => format!("¡Perfecto! He anotado tu dirección como {value}. 🏡"),
        Field::Pharmacy => format!(
            "¡Perfecto! He anotado que la farmacia donde no te entregaron los medicamentos es {value}."
        ),
    }
}

/// Acknowledgement of a medication selection.
pub fn selection_confirmation(via: SelectionVia, joined: &str) -> String {
    match via {
        SelectionVia::Idiom => {
            "Entiendo que no te entregaron ninguno de los medicamentos recetados.".to_string()
        }
        SelectionVia::Ordinal | SelectionVia::Name => {
            confirmation(Field::MissingMedications, joined)
        }
    }
}

pub fn selection_unresolved(reason: UnresolvedReason) -> &'static str {
    match reason {
        UnresolvedReason::NoCandidates => {
            "Aún no tengo medicamentos de tu fórmula para elegir. Por favor, envíame una foto clara de tu fórmula médica. 📋📸"
        }
        UnresolvedReason::NoMatch => {
            "No he podido identificar qué medicamentos no te entregaron. Por favor, especifica los medicamentos por su número o nombre."
        }
    }
}

/// Prompt after a "cambiar <campo>" request.
pub fn change_prompt(field: Field) -> &'static str {
    match field {
        Field::City => "Entendido, por favor dime tu ciudad. 🏙️",
        Field::Regime => "Entendido, por favor dime tu régimen (Contributivo o Subsidiado). 🏛️",
        Field::BirthDate => "Entendido, por favor dime tu fecha de nacimiento (DD/MM/AAAA). 📅",
        Field::Address => "Entendido, por favor dime tu dirección de residencia. 🏠",
        Field::Pharmacy => "Entendido, por favor dime el nombre de la farmacia. 🏪",
        Field::Phone => "Entendido, por favor dime tu nuevo número de celular. 📱",
        Field::MissingMedications => {
            "Entendido, por favor dime cuáles medicamentos no te fueron entregados. 💊"
        }
    }
}

/// What was read from the prescription, and the medication question.
pub fn prescription_summary(prescription: &PrescriptionData) -> String {
    let or_missing = |value: &str| {
        if value.trim().is_empty() {
            "No visible".to_string()
        } else {
            value.to_string()
        }
    };
    let medications = if prescription.medications.is_empty() {
        "No se identificaron medicamentos".to_string()
    } else {
        prescription.numbered_medications()
    };
    format!(
        "¡Gracias por tu autorización! He analizado tu fórmula médica y aquí te muestro lo que encontré:\n\n\
         👤 Paciente: {}\n\
         📄 Documento: {} {}\n\
         🏥 EPS: {}\n\
         👨‍⚕️ Doctor: {}\n\
         📅 Fecha de atención: {}\n\n\
         💊 Medicamentos recetados:\n{}\n\n\
         Por favor, dime cuáles de estos medicamentos no te fueron entregados. Puedes indicarlos por número (ej. \"el 1 y el 3\"), nombre, o decir \"todos\" o \"ninguno\" según corresponda.",
        or_missing(&prescription.patient_name),
        or_missing(&prescription.document_type),
        or_missing(&prescription.document_number),
        or_missing(&prescription.insurer),
        or_missing(&prescription.doctor),
        or_missing(&prescription.attending_date),
        medications,
    )
}

/// Closing summary once every field is collected.
pub fn final_summary(session: &Session) -> String {
    let fields = &session.fields;
    if !fields.has_missing_medications() {
        return "Por favor, antes de finalizar, necesito saber cuáles medicamentos no te fueron entregados. 💊"
            .to_string();
    }
    format!(
        "¡Perfecto! Entonces, vamos a resumir lo que tengo hasta ahora:\n\n\
         - Medicamento(s) no entregado(s): {}\n\
         - Farmacia: {} en {}\n\
         \nEn las próximas 24 horas tramitaremos tu queja ante la EPS y te enviaré el número de radicado por este mismo chat. ¿Hay algo más en lo que pueda ayudarte? 😊",
        fields.missing_medications.as_deref().unwrap_or_default(),
        fields.pharmacy.as_deref().unwrap_or_default(),
        fields.city.as_deref().unwrap_or_default(),
    )
}

/// Listing of the complaints already filed from this chat.
pub fn history(complaints: &[ComplaintSummary]) -> String {
    if complaints.is_empty() {
        return NO_PRIOR_COMPLAINTS.to_string();
    }
    let lines: Vec<String> = complaints
        .iter()
        .enumerate()
        .map(|(idx, complaint)| {
            format!(
                "{}. {} - {} ({})",
                idx + 1,
                complaint.filed_at.format("%Y-%m-%d"),
                complaint.missing_medications,
                complaint.patient
            )
        })
        .collect();
    format!(
        "Estas son tus quejas registradas: 📋\n\n{}\n\n¿Quieres radicar una nueva queja? Envíame la foto de tu fórmula médica. 📸",
        lines.join("\n")
    )
}
