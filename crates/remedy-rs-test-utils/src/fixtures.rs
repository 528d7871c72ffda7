use remedy_rs_protocol::{ImageInput, PrescriptionData};

/// Prescription with two medications and a complete header.
pub fn prescription() -> PrescriptionData {
    PrescriptionData {
        document_type: "CC".to_string(),
        document_number: "1020304050".to_string(),
        patient_name: "Ana María Ruiz".to_string(),
        attending_date: "02/03/2024".to_string(),
        insurer: "Nueva EPS".to_string(),
        doctor: "Carlos Pérez".to_string(),
        diagnosis: Some("Hipertensión esencial".to_string()),
        ips: Some("IPS Salud Total".to_string()),
        medications: vec![
            "Losartan 50mg tableta".to_string(),
            "Metformina 850mg tableta".to_string(),
        ],
    }
}

pub fn prescription_image(media_id: &str) -> ImageInput {
    ImageInput {
        media_id: media_id.to_string(),
        bytes: vec![0xff, 0xd8, 0xff, 0xe0],
        mime_type: "image/jpeg".to_string(),
    }
}
