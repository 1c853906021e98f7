//! Log idempotence inside and outside the dedup window.
//!
//! The dedup window is a policy knob; these tests pin it explicitly
//! instead of leaning on the default.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use kava_store::{AppendOutcome, SubstanceLog};
use kava_types::{SubstanceCategory, SubstanceMention, SubstanceName, ThreadId};

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 11, 12, 0, 0).unwrap()
}

fn mention(name: &str, category: SubstanceCategory, taken_at: DateTime<Utc>) -> SubstanceMention {
    SubstanceMention::new(
        ThreadId::from("idem"),
        SubstanceName::new(name).unwrap(),
        category,
        name,
        taken_at,
    )
}

fn warfarin_at(minutes_after_base: i64) -> SubstanceMention {
    mention(
        "warfarin",
        SubstanceCategory::Drug,
        base() + chrono::Duration::minutes(minutes_after_base),
    )
}

#[test]
fn second_append_inside_window_is_rejected() {
    let tolerance = Duration::from_secs(15 * 60);
    let mut log = SubstanceLog::open_in_memory().unwrap();

    let first = log.append(&warfarin_at(0), tolerance).unwrap();
    let second = log.append(&warfarin_at(10), tolerance).unwrap();

    assert!(first.is_committed());
    assert_eq!(second, AppendOutcome::Duplicate(first.id()));
    assert_eq!(log.mention_count(), 1);
}

#[test]
fn second_append_outside_window_is_a_new_entry() {
    let tolerance = Duration::from_secs(5 * 60);
    let mut log = SubstanceLog::open_in_memory().unwrap();

    log.append(&warfarin_at(0), tolerance).unwrap();
    let second = log.append(&warfarin_at(10), tolerance).unwrap();

    assert!(second.is_committed());
    assert_eq!(log.mention_count(), 2);
}

#[test]
fn window_boundary_is_inclusive() {
    let tolerance = Duration::from_secs(10 * 60);
    let mut log = SubstanceLog::open_in_memory().unwrap();

    log.append(&warfarin_at(0), tolerance).unwrap();
    // exactly at the tolerance edge: still a duplicate
    let second = log.append(&warfarin_at(10), tolerance).unwrap();
    assert!(!second.is_committed());
}

#[test]
fn different_substances_never_dedup() {
    let tolerance = Duration::from_secs(3600);
    let mut log = SubstanceLog::open_in_memory().unwrap();

    let warfarin = mention("warfarin", SubstanceCategory::Drug, base());
    let grapefruit = mention("grapefruit", SubstanceCategory::Food, base());

    assert!(log.append(&warfarin, tolerance).unwrap().is_committed());
    assert!(log.append(&grapefruit, tolerance).unwrap().is_committed());
}

#[test]
fn dedup_matches_on_normalized_names() {
    let tolerance = Duration::from_secs(3600);
    let mut log = SubstanceLog::open_in_memory().unwrap();

    let spelled = mention("Warfarin", SubstanceCategory::Drug, base());
    let shouted = mention("  WARFARIN ", SubstanceCategory::Drug, base());

    assert!(log.append(&spelled, tolerance).unwrap().is_committed());
    assert!(!log.append(&shouted, tolerance).unwrap().is_committed());
}
