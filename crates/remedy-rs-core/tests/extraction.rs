//! Field extractor, date parser and medication selector behavior.

use chrono::{NaiveDate, Utc};
use pretty_assertions::assert_eq;
use remedy_rs_config::ExtractionConfig;
use remedy_rs_core::{
    DateParser, Field, FieldExtractor, MedicationSelector, Regime, Selection, SelectionVia,
    Session, UnresolvedReason,
};
use remedy_rs_test_utils::prescription;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).expect("date")
}

fn extractor() -> FieldExtractor {
    FieldExtractor::new(&ExtractionConfig::default()).expect("extractor")
}

fn candidates() -> Vec<String> {
    prescription().medications
}

/// Labelled values are recognized anywhere in a message.
#[test]
fn labelled_fields_are_extracted() {
    let extractor = extractor();
    let mut session = Session::new("1", Utc::now());
    let written = extractor.apply(
        "Listo. Tu ciudad: Bogotá, celular: 300 123 4567, dirección: Calle 80 # 12-30, farmacia: Cafam. Régimen: Subsidiado",
        &mut session,
        today(),
    );

    assert_eq!(
        written,
        vec![
            Field::City,
            Field::Phone,
            Field::Pharmacy,
            Field::Address,
            Field::Regime
        ]
    );
    assert_eq!(session.fields.city.as_deref(), Some("Bogotá"));
    assert_eq!(session.fields.phone.as_deref(), Some("300 123 4567"));
    assert_eq!(session.fields.pharmacy.as_deref(), Some("Cafam"));
    assert_eq!(session.fields.address.as_deref(), Some("Calle 80 # 12-30"));
    assert_eq!(session.fields.regime, Some(Regime::Subsidiado));
}

/// Text without recognizable values leaves the session untouched.
#[test]
fn unmatched_text_is_a_no_op() {
    let extractor = extractor();
    let mut session = Session::new("1", Utc::now());
    let before = session.clone();
    assert!(extractor.apply("muchas gracias por la ayuda", &mut session, today()).is_empty());
    assert_eq!(session, before);
}

/// Applying the same text twice yields the same fields.
#[test]
fn extraction_is_idempotent() {
    let extractor = extractor();
    let mut session = Session::new("1", Utc::now());
    let text = "fecha de nacimiento: 7-9-1975. Mi número 3104567890";
    extractor.apply(text, &mut session, today());
    let once = session.fields.clone();
    extractor.apply(text, &mut session, today());
    assert_eq!(session.fields, once);
    assert_eq!(session.fields.birth_date.as_deref(), Some("07/09/1975"));
    assert_eq!(session.fields.phone.as_deref(), Some("3104567890"));
}

/// Dates in numeric and spelled-out forms normalize to DD/MM/YYYY.
#[test]
fn dates_normalize_to_day_month_year() {
    let dates = DateParser::new().expect("dates");
    assert_eq!(dates.parse("15/03/2021", today()).as_deref(), Some("15/03/2021"));
    assert_eq!(
        dates.parse("15 de marzo de 2021", today()).as_deref(),
        Some("15/03/2021")
    );
    assert_eq!(dates.parse("5/7/1980", today()).as_deref(), Some("05/07/1980"));
    assert_eq!(
        dates.parse("nací el 3 de mayo de 1990", today()).as_deref(),
        Some("03/05/1990")
    );
    assert_eq!(
        dates.parse("el 12 de octubre del 2001", today()).as_deref(),
        Some("12/10/2001")
    );
    assert_eq!(
        dates.parse("diciembre 24, 1970", today()).as_deref(),
        Some("24/12/1970")
    );
    assert_eq!(dates.parse("el 9 de enero", today()).as_deref(), Some("09/01/2024"));
    assert_eq!(dates.parse("31/02/1990", today()), None);
    assert_eq!(dates.parse("sin fecha", today()), None);
}

#[test]
fn idioms_select_every_medication() {
    let selector = MedicationSelector::new().expect("selector");
    for answer in ["ninguno", "Todos", "no me entregaron ninguno de los dos"] {
        match selector.select(answer, &candidates()) {
            Selection::Resolved { names, via, .. } => {
                assert_eq!(names, candidates(), "answer {answer}");
                assert_eq!(via, SelectionVia::Idiom);
            }
            other => panic!("unexpected selection for {answer}: {other:?}"),
        }
    }
}

#[test]
fn ordinals_pick_positions_and_ignore_out_of_range() {
    let selector = MedicationSelector::new().expect("selector");
    assert_eq!(
        selector.select("el 2", &candidates()),
        Selection::Resolved {
            names: vec!["Metformina 850mg tableta".to_string()],
            joined: "Metformina 850mg tableta".to_string(),
            via: SelectionVia::Ordinal,
        }
    );
    match selector.select("el 2, el 1 y el 7", &candidates()) {
        Selection::Resolved { joined, .. } => {
            assert_eq!(joined, "Metformina 850mg tableta, Losartan 50mg tableta");
        }
        other => panic!("unexpected selection: {other:?}"),
    }
}

#[test]
fn names_match_by_base_word() {
    let selector = MedicationSelector::new().expect("selector");
    match selector.select("me faltó la losartan", &candidates()) {
        Selection::Resolved { names, via, .. } => {
            assert_eq!(names, vec!["Losartan 50mg tableta".to_string()]);
            assert_eq!(via, SelectionVia::Name);
        }
        other => panic!("unexpected selection: {other:?}"),
    }
}

#[test]
fn unresolved_selections_report_why() {
    let selector = MedicationSelector::new().expect("selector");
    assert_eq!(
        selector.select("xyz", &candidates()),
        Selection::Unresolved {
            reason: UnresolvedReason::NoMatch
        }
    );
    assert_eq!(
        selector.select("el 1", &[]),
        Selection::Unresolved {
            reason: UnresolvedReason::NoCandidates
        }
    );

    let mut session = Session::new("1", Utc::now());
    session.apply_prescription(prescription());
    assert!(!selector.apply("xyz", &mut session).is_resolved());
    assert_eq!(session.fields.missing_medications, None);
}
