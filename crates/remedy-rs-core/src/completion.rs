//! Finalizes a complaint into one sink row, at most once per complaint id.

use crate::error::RemedyCoreError;
use crate::types::{ComplaintSummary, PatientComplaint, Session};
use chrono::Utc;
use log::{debug, error, info, warn};
use regex::Regex;
use remedy_rs_config::{ExtractionConfig, SinkColumn, SinkConfig};
use remedy_rs_protocol::{ComplaintSink, SinkError, SinkRow};
use serde_json::Value;
use std::sync::Arc;

/// Leftovers that carry no information on their own.
const CONNECTIVES: [&str; 6] = ["y", "la", "el", "los", "las", "donde"];

/// Whether the completeness gate applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    /// Save only with a prescription and a real missing-medication answer.
    Gated,
    /// Save whatever was collected.
    Force,
}

/// Result of a save attempt. Sink failures are reported here, never as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    AlreadySaved,
    Incomplete,
    Failed { reason: String },
}

impl SaveOutcome {
    /// Whether the active complaint is persisted after the attempt.
    pub fn is_persisted(&self) -> bool {
        matches!(self, SaveOutcome::Saved | SaveOutcome::AlreadySaved)
    }
}

/// Builds complaint rows and hands them to the sink.
pub struct CompletionAdapter {
    sink: Arc<dyn ComplaintSink>,
    sink_config: SinkConfig,
    invalid_cities: Vec<String>,
    pharmacy_noise: Regex,
}

impl CompletionAdapter {
    pub fn new(
        sink: Arc<dyn ComplaintSink>,
        sink_config: &SinkConfig,
        extraction: &ExtractionConfig,
    ) -> Result<Self, RemedyCoreError> {
        Ok(Self {
            sink,
            sink_config: sink_config.clone(),
            invalid_cities: extraction
                .invalid_city_values
                .iter()
                .map(|value| value.trim().to_lowercase())
                .collect(),
            pharmacy_noise: Regex::new(
                r"(?i)donde.*te|y la sede donde|donde no te|sede|y\s+debían|debían",
            )?,
        })
    }

    /// Persist the active complaint.
    pub async fn save(&self, session: &mut Session, mode: SaveMode) -> SaveOutcome {
        let complaint_id = session.active_complaint.id.clone();
        if session.active_complaint.saved {
            debug!("complaint already saved (complaint_id={})", complaint_id);
            return SaveOutcome::AlreadySaved;
        }
        if mode == SaveMode::Gated
            && !(session.has_prescription() && session.fields.has_missing_medications())
        {
            debug!("complaint incomplete, not saved (complaint_id={})", complaint_id);
            return SaveOutcome::Incomplete;
        }

        let mut row = self.build_row(session);
        let mut result = self.sink.insert(&row).await;
        if let Err(SinkError::UnknownFields(fields)) = &result {
            let fields = fields.clone();
            warn!(
                "sink rejected unknown fields, retrying (sink={}, complaint_id={}, fields={})",
                self.sink.name(),
                complaint_id,
                fields.join(",")
            );
            for field in &fields {
                row.remove(field);
            }
            result = self.sink.insert(&row).await;
        }

        match result {
            Ok(()) => {
                self.record_saved(session);
                info!(
                    "saved complaint (sink={}, complaint_id={}, columns={})",
                    self.sink.name(),
                    complaint_id,
                    row.len()
                );
                SaveOutcome::Saved
            }
            Err(err) => {
                error!(
                    "failed to save complaint (sink={}, complaint_id={}, err={})",
                    self.sink.name(),
                    complaint_id,
                    err
                );
                SaveOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }

    /// Flat row for the active complaint, keyed by configured column names.
    pub fn build_row(&self, session: &Session) -> SinkRow {
        let fields = &session.fields;
        let prescription = fields.prescription.clone().unwrap_or_default();
        let columns = &self.sink_config.columns;

        let city = fields.city.as_deref().map(|city| {
            if self.invalid_cities.contains(&city.trim().to_lowercase()) {
                ""
            } else {
                city
            }
        });
        let pharmacy = fields
            .pharmacy
            .as_deref()
            .map(|pharmacy| self.pharmacy_noise.replace_all(pharmacy, "").trim().to_string());
        let phone = fields.phone.clone().unwrap_or_else(|| session.id.clone());

        let values = [
            (SinkColumn::ComplaintId, session.active_complaint.id.clone()),
            (SinkColumn::DocumentType, prescription.document_type.clone()),
            (SinkColumn::DocumentNumber, prescription.document_number.clone()),
            (SinkColumn::Patient, prescription.patient_name.clone()),
            (
                SinkColumn::AttendingDate,
                iso_date(&prescription.attending_date),
            ),
            (SinkColumn::Insurer, prescription.insurer.clone()),
            (SinkColumn::Doctor, prescription.doctor.clone()),
            (SinkColumn::Ips, prescription.ips.clone().unwrap_or_default()),
            (
                SinkColumn::Diagnosis,
                prescription.diagnosis.clone().unwrap_or_default(),
            ),
            (SinkColumn::Medications, prescription.medications.join(", ")),
            (SinkColumn::ImageUrl, String::new()),
            (
                SinkColumn::MissingMedications,
                fields.missing_medications.clone().unwrap_or_default(),
            ),
            (
                SinkColumn::BirthDate,
                fields.birth_date.clone().unwrap_or_default(),
            ),
            (SinkColumn::Phone, phone),
            (
                SinkColumn::Regime,
                fields
                    .regime
                    .map(|regime| regime.as_str().to_string())
                    .unwrap_or_default(),
            ),
            (SinkColumn::City, city.unwrap_or_default().to_string()),
            (SinkColumn::Address, fields.address.clone().unwrap_or_default()),
            (SinkColumn::Pharmacy, pharmacy.unwrap_or_default()),
        ];

        let mut row = SinkRow::new();
        for (column, value) in values {
            row.insert(
                columns.name(column).to_string(),
                Value::String(self.or_marker(value)),
            );
        }
        row
    }

    fn or_marker(&self, value: String) -> String {
        let trimmed = value.trim();
        if trimmed.is_empty() || CONNECTIVES.contains(&trimmed.to_lowercase().as_str()) {
            self.sink_config.unavailable_marker.clone()
        } else {
            trimmed.to_string()
        }
    }

    fn record_saved(&self, session: &mut Session) {
        let now = Utc::now();
        let prescription = session.fields.prescription.clone().unwrap_or_default();
        let missing = session.fields.missing_medications.clone().unwrap_or_default();
        session.active_complaint.saved = true;
        session.prior_complaints.push(ComplaintSummary {
            id: session.active_complaint.id.clone(),
            filed_at: now,
            patient: prescription.patient_name.clone(),
            missing_medications: missing.clone(),
        });
        if !prescription.document_number.is_empty() {
            let record = session
                .patient_history
                .entry(prescription.document_number.clone())
                .or_default();
            record.name = prescription.patient_name.clone();
            record.complaints.push(PatientComplaint {
                id: session.active_complaint.id.clone(),
                filed_at: now,
                missing_medications: missing,
                insurer: prescription.insurer.clone(),
                diagnosis: prescription.diagnosis.clone(),
            });
        }
    }
}

/// DD/MM/YYYY becomes YYYY-MM-DD; anything else passes through.
fn iso_date(value: &str) -> String {
    let parts: Vec<&str> = value.trim().split('/').collect();
    match parts.as_slice() {
        [day, month, year] => format!("{year}-{month:0>2}-{day:0>2}"),
        _ => value.trim().to_string(),
    }
}
