use attendance_tools::ToolError;
use attendance_tools::config::EngineConfig;
use attendance_tools::cycle::{Engine, MembershipOutcome};
use attendance_tools::io::memory::{MemoryDirectory, MemoryTable};
use attendance_tools::model::{CellValue, MemberInfo};
use chrono::{NaiveDate, NaiveDateTime};

const SHEET: &str = "Form Responses 1";
const GROUP: &str = "543724459476123669";
const ROLE: &str = "1113654375135584296";

fn engine() -> Engine {
    Engine::new(EngineConfig {
        group_id: GROUP.to_string(),
        role_id: ROLE.to_string(),
        ..EngineConfig::default()
    })
}

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, 19)
        .and_then(|date| date.and_hms_opt(8, 30, 0))
        .expect("valid timestamp")
}

fn header() -> Vec<CellValue> {
    ["Timestamp", "NetID", "Name", "Discord", "Attendance", "Corrected"]
        .into_iter()
        .map(CellValue::from)
        .collect()
}

/// A fresh form submission: no attendance count stored yet.
fn submission(at: &str, identity: &str, name: &str, handle: &str) -> Vec<CellValue> {
    vec![
        CellValue::from(at),
        CellValue::from(identity),
        CellValue::from(name),
        CellValue::from(handle),
        CellValue::from("Workshop"),
    ]
}

fn table(rows: Vec<Vec<CellValue>>) -> MemoryTable {
    let mut grid = vec![header()];
    grid.extend(rows);
    MemoryTable::with_sheet(SHEET, grid)
}

fn directory(members: Vec<MemberInfo>) -> MemoryDirectory {
    MemoryDirectory::with_group(GROUP, members)
}

#[test]
fn same_day_submissions_count_once_and_need_no_writes() {
    let mut store = table(vec![
        submission("1/5/2024 10:00:00", "id1", "Alice", "alice#1"),
        submission("1/5/2024 11:00:00", "id1", "Alice", "alice#1"),
    ]);
    let mut members = directory(vec![MemberInfo::new("m1", "alice#1")]);

    let preview = engine().preview(&store, now()).expect("preview");
    assert_eq!(preview.totals.get("id1"), Some(&1));
    assert!(preview.plan.operations.is_empty());

    let report = engine()
        .run_cycle(&mut store, &mut members, now())
        .expect("cycle succeeded");
    assert_eq!(report.records, 2);
    assert_eq!(report.writes, 0);

    let sheet = store.sheet(SHEET).expect("sheet present");
    assert_eq!(sheet.len(), 2, "dedup directive collapses the second row");
}

#[test]
fn multi_day_attendance_is_written_back_and_collapsed() {
    let mut store = table(vec![
        submission("1/5/2024 10:00:00", "id1", "Alice", "alice#1"),
        submission("2/5/2024 10:00:00", "id2", "Bob", "bob#2"),
        submission("8/5/2024 10:00:00", "id1", "Alice", "alice#1"),
    ]);
    let mut members = directory(Vec::new());

    let report = engine()
        .run_cycle(&mut store, &mut members, now())
        .expect("cycle succeeded");
    assert_eq!(report.identities, 2);
    assert_eq!(report.writes, 4);

    let sheet = store.sheet(SHEET).expect("sheet present");
    assert_eq!(sheet.len(), 3);
    assert_eq!(sheet[1][1], CellValue::from("id1"));
    assert_eq!(sheet[1][4], CellValue::Number(2.0));
    assert_eq!(sheet[1][5], CellValue::from("19/10/2026 08:30:00"));
    assert_eq!(sheet[2][1], CellValue::from("id2"));
    assert_eq!(sheet[2][4], CellValue::from("Workshop"));
}

#[test]
fn second_cycle_on_unchanged_data_writes_nothing() {
    let mut store = table(vec![
        submission("1/5/2024 10:00:00", "id1", "Alice", "alice#1"),
        submission("3/5/2024 10:00:00", "id1", "Alice", "alice#1"),
        submission("3/5/2024 12:00:00", "id1", "Alice", "alice#1"),
        submission("4/5/2024 10:00:00", "id1", "Alice", "alice#1"),
    ]);
    let mut members = directory(Vec::new());
    let engine = engine();

    let first = engine
        .run_cycle(&mut store, &mut members, now())
        .expect("first cycle");
    assert!(first.writes > 0);

    let snapshot = store.sheet(SHEET).cloned();
    let second = engine
        .run_cycle(&mut store, &mut members, now())
        .expect("second cycle");
    assert_eq!(second.writes, 0);
    assert_eq!(store.sheet(SHEET).cloned(), snapshot);
    assert_eq!(store.sheet(SHEET).expect("sheet")[1][4], CellValue::Number(3.0));
}

#[test]
fn new_submission_on_a_later_day_increments_the_stored_total() {
    let mut store = table(vec![
        submission("1/5/2024 10:00:00", "id1", "Alice", "alice#1"),
        submission("2/5/2024 10:00:00", "id1", "Alice", "alice#1"),
    ]);
    let mut members = directory(Vec::new());
    let engine = engine();
    engine
        .run_cycle(&mut store, &mut members, now())
        .expect("first cycle");

    store.push_row(SHEET, submission("9/5/2024 10:00:00", "id1", "Alice", "alice#1"));
    let report = engine
        .run_cycle(&mut store, &mut members, now())
        .expect("second cycle");

    assert_eq!(report.writes, 4);
    let sheet = store.sheet(SHEET).expect("sheet");
    assert_eq!(sheet.len(), 2);
    assert_eq!(sheet[1][4], CellValue::Number(3.0));
}

#[test]
fn rejected_rows_do_not_stop_the_cycle() {
    let mut store = table(vec![
        submission("not-a-date", "id9", "Mallory", "mallory#9"),
        vec![
            CellValue::from("1/5/2024 10:00:00"),
            CellValue::from("id3"),
            CellValue::from("Carol"),
            CellValue::from("carol#3"),
        ],
        submission("1/5/2024 10:00:00", "id1", "Alice", "alice#1"),
        vec![CellValue::Empty; 6],
    ]);
    let mut members = directory(vec![
        MemberInfo::new("m1", "alice#1"),
        MemberInfo::new("m9", "mallory#9"),
    ]);

    let report = engine()
        .run_cycle(&mut store, &mut members, now())
        .expect("cycle succeeded");

    assert_eq!(report.rows_read, 4);
    assert_eq!(report.records, 1);
    assert_eq!(report.rejected, 3);
    let mallory = members.member(GROUP, "m9").expect("member");
    assert!(!mallory.has_role(ROLE));
}

#[test]
fn attending_members_receive_the_role_once() {
    let mut store = table(vec![
        submission("1/5/2024 10:00:00", "id1", "Alice", "alice#1"),
        submission("1/5/2024 10:00:00", "id2", "Bob", "bob#2"),
    ]);
    let mut members = directory(vec![
        MemberInfo::new("m1", "alice#1"),
        MemberInfo::new("m2", "bob#2").with_role(ROLE),
        MemberInfo::new("m3", "carol#3"),
    ]);
    let engine = engine();

    let report = engine
        .run_cycle(&mut store, &mut members, now())
        .expect("cycle succeeded");
    match report.membership {
        MembershipOutcome::Synced(sync) => {
            assert_eq!(sync.granted, vec!["m1".to_string()]);
            assert_eq!(sync.already_held, 1);
        }
        other => panic!("unexpected membership outcome: {other:?}"),
    }

    engine
        .run_cycle(&mut store, &mut members, now())
        .expect("second cycle");
    assert_eq!(members.grants().len(), 1);
    assert!(!members.member(GROUP, "m3").expect("member").has_role(ROLE));
}

#[test]
fn roles_are_never_revoked_when_attendance_disappears() {
    let mut store = table(vec![submission("1/5/2024 10:00:00", "id1", "Alice", "alice#1")]);
    let mut members = directory(vec![MemberInfo::new("m1", "alice#1")]);
    let engine = engine();
    engine
        .run_cycle(&mut store, &mut members, now())
        .expect("first cycle");

    let mut emptied = table(Vec::new());
    engine
        .run_cycle(&mut emptied, &mut members, now())
        .expect("second cycle");

    assert!(members.member(GROUP, "m1").expect("member").has_role(ROLE));
}

#[test]
fn failed_grant_is_isolated_to_its_member() {
    let mut store = table(vec![
        submission("1/5/2024 10:00:00", "id1", "Alice", "alice#1"),
        submission("1/5/2024 10:00:00", "id2", "Bob", "bob#2"),
    ]);
    let mut members = directory(vec![
        MemberInfo::new("m1", "alice#1"),
        MemberInfo::new("m2", "bob#2"),
    ]);
    members.fail_grants_for("m1");

    let report = engine()
        .run_cycle(&mut store, &mut members, now())
        .expect("cycle succeeded");

    let MembershipOutcome::Synced(sync) = report.membership else {
        panic!("membership step should run");
    };
    assert_eq!(sync.failed.len(), 1);
    assert!(members.member(GROUP, "m2").expect("member").has_role(ROLE));
}

#[test]
fn membership_listing_failure_still_writes_the_table() {
    let mut store = table(vec![
        submission("1/5/2024 10:00:00", "id1", "Alice", "alice#1"),
        submission("2/5/2024 10:00:00", "id1", "Alice", "alice#1"),
    ]);
    let mut members = directory(vec![MemberInfo::new("m1", "alice#1")]);
    members.set_unavailable(true);

    let report = engine()
        .run_cycle(&mut store, &mut members, now())
        .expect("cycle succeeded");

    assert!(matches!(report.membership, MembershipOutcome::Skipped { .. }));
    assert_eq!(store.batches_applied(), 1);
    assert_eq!(store.sheet(SHEET).expect("sheet")[1][4], CellValue::Number(2.0));
}

#[test]
fn read_failure_aborts_the_cycle() {
    let mut store = table(vec![submission("1/5/2024 10:00:00", "id1", "Alice", "alice#1")]);
    store.set_fail_reads(true);
    let mut members = directory(vec![MemberInfo::new("m1", "alice#1")]);

    let err = engine()
        .run_cycle(&mut store, &mut members, now())
        .unwrap_err();

    assert!(matches!(err, ToolError::StoreRead(_)));
    assert!(members.grants().is_empty());
}

#[test]
fn write_failure_discards_the_whole_batch() {
    let rows = vec![
        submission("1/5/2024 10:00:00", "id1", "Alice", "alice#1"),
        submission("2/5/2024 10:00:00", "id1", "Alice", "alice#1"),
    ];
    let mut store = table(rows);
    let before = store.sheet(SHEET).cloned();
    store.set_fail_writes(true);
    let mut members = directory(Vec::new());
    let engine = engine();

    let err = engine
        .run_cycle(&mut store, &mut members, now())
        .unwrap_err();
    assert!(matches!(err, ToolError::StoreWrite(_)));
    assert_eq!(store.sheet(SHEET).cloned(), before);

    store.set_fail_writes(false);
    let report = engine
        .run_cycle(&mut store, &mut members, now())
        .expect("retry succeeded");
    assert_eq!(report.writes, 4);
}
