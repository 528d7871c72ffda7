//! Completion adapter: gating, at-most-once saves and schema retries.

use chrono::Utc;
use pretty_assertions::assert_eq;
use remedy_rs_config::{ExtractionConfig, SinkConfig};
use remedy_rs_core::{CompletionAdapter, Field, SaveMode, SaveOutcome, Session};
use remedy_rs_protocol::ComplaintSink;
use remedy_rs_test_utils::{FailingSink, RecordingSink, SchemaSink, prescription};
use serde_json::Value;
use std::sync::Arc;

fn adapter(sink: Arc<dyn ComplaintSink>) -> CompletionAdapter {
    CompletionAdapter::new(sink, &SinkConfig::default(), &ExtractionConfig::default())
        .expect("adapter")
}

fn ready_session() -> Session {
    let mut session = Session::new("5731", Utc::now());
    session.consent_given = true;
    session.apply_prescription(prescription());
    session.fields.set(Field::MissingMedications, "Losartan 50mg tableta");
    session
}

/// Saving twice writes one row.
#[tokio::test]
async fn second_save_is_a_no_op() {
    let sink = RecordingSink::new();
    let adapter = adapter(Arc::new(sink.clone()));
    let mut session = ready_session();

    assert_eq!(adapter.save(&mut session, SaveMode::Gated).await, SaveOutcome::Saved);
    assert_eq!(
        adapter.save(&mut session, SaveMode::Force).await,
        SaveOutcome::AlreadySaved
    );
    assert_eq!(sink.len(), 1);
    assert!(session.active_complaint.saved);
    assert_eq!(session.prior_complaints.len(), 1);
}

/// The gate needs a prescription and a real medication answer.
#[tokio::test]
async fn gated_save_waits_for_medications() {
    let sink = RecordingSink::new();
    let adapter = adapter(Arc::new(sink.clone()));
    let mut session = Session::new("5731", Utc::now());
    session.apply_prescription(prescription());

    assert_eq!(
        adapter.save(&mut session, SaveMode::Gated).await,
        SaveOutcome::Incomplete
    );
    assert!(sink.is_empty());

    assert_eq!(adapter.save(&mut session, SaveMode::Force).await, SaveOutcome::Saved);
    assert_eq!(sink.len(), 1);
}

/// Columns the table does not know are dropped and the insert retried once.
#[tokio::test]
async fn unknown_columns_are_dropped_and_retried() {
    let sink = SchemaSink::new(["PK", "paciente", "no_entregado", "telefono"]);
    let adapter = adapter(Arc::new(sink.clone()));
    let mut session = ready_session();

    assert_eq!(adapter.save(&mut session, SaveMode::Gated).await, SaveOutcome::Saved);
    assert_eq!(sink.attempts(), 2);

    let rows = sink.rows();
    assert_eq!(rows.len(), 1);
    let mut keys: Vec<&str> = rows[0].keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["PK", "no_entregado", "paciente", "telefono"]);
    assert_eq!(
        rows[0].get("telefono"),
        Some(&Value::String("5731".to_string()))
    );
}

/// A sink failure leaves the complaint unsaved so a later save can retry.
#[tokio::test]
async fn failed_save_can_be_retried() {
    let sink = FailingSink::new();
    let adapter = adapter(Arc::new(sink.clone()));
    let mut session = ready_session();

    let outcome = adapter.save(&mut session, SaveMode::Force).await;
    assert!(matches!(outcome, SaveOutcome::Failed { .. }));
    assert_eq!(outcome.is_persisted(), false);
    assert_eq!(session.active_complaint.saved, false);

    adapter.save(&mut session, SaveMode::Force).await;
    assert_eq!(sink.attempts(), 2);
}

/// Blank values, connectives and known capture mistakes become the marker.
#[test]
fn rows_replace_noise_with_marker() {
    let adapter = adapter(Arc::new(RecordingSink::new()));
    let mut session = ready_session();
    session.fields.set(Field::City, "Contributivo");
    session.fields.set(Field::Address, "la");
    session.fields.set(Field::Pharmacy, "Cruz Verde y la sede donde");

    let row = adapter.build_row(&session);
    let value = |key: &str| row.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
    assert_eq!(value("municipio"), "No disponible");
    assert_eq!(value("direccion"), "No disponible");
    assert_eq!(value("farmacia"), "Cruz Verde");
    assert_eq!(value("fecha_nacimiento"), "No disponible");
    assert_eq!(value("medicamentos"), "Losartan 50mg tableta, Metformina 850mg tableta");
    assert_eq!(value("PK"), session.active_complaint.id);
}
