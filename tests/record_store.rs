use face_analyzer::{CsvFileStore, FaceRecord, Gender, Race, RecordSink, RecordStore, StoreError};
use tempfile::tempdir;

fn records(ages: &[u32]) -> Vec<FaceRecord> {
    ages.iter()
        .enumerate()
        .map(|(i, &age)| FaceRecord::new(i as u32 + 1, age, Gender::Woman, None))
        .collect()
}

#[test]
fn clear_then_append_holds_exactly_the_new_records() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("people.csv");
    std::fs::write(&path, "Age,Gender\n70,Man\n").unwrap();

    let mut sink = RecordSink::new(CsvFileStore::new(&path));
    sink.clear().unwrap();
    assert!(!path.exists());

    assert_eq!(sink.append(&records(&[31, 42]), None).unwrap(), 2);
    let ages: Vec<u32> = sink.rows().unwrap().iter().map(|r| r.age).collect();
    assert_eq!(ages, vec![31, 42]);
}

#[test]
fn appends_concatenate_in_order() {
    let dir = tempdir().unwrap();
    let mut sink = RecordSink::new(CsvFileStore::new(dir.path().join("people.csv")));

    let first = records(&[10, 20, 30]);
    let second = records(&[40, 50]);
    sink.append(&first, None).unwrap();
    let total = sink.append(&second, None).unwrap();

    assert_eq!(total, first.len() + second.len());
    let ages: Vec<u32> = sink.rows().unwrap().iter().map(|r| r.age).collect();
    assert_eq!(ages, vec![10, 20, 30, 40, 50]);
}

#[test]
fn names_and_races_survive_a_reload() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("people.csv");
    let mut sink = RecordSink::new(CsvFileStore::new(&path));

    sink.append(&records(&[33]), None).unwrap();
    sink.append(
        &[FaceRecord::new(1, 27, Gender::Man, Some(Race::MiddleEastern))],
        Some("Sam"),
    )
    .unwrap();

    let rows = RecordSink::new(CsvFileStore::new(&path)).rows().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].name, None);
    assert_eq!(rows[0].race, None);
    assert_eq!(rows[1].name.as_deref(), Some("Sam"));
    assert_eq!(rows[1].gender, Gender::Man);
    assert_eq!(rows[1].race, Some(Race::MiddleEastern));

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("Name,Age,Gender,Race\n"));
}

#[test]
fn malformed_store_is_left_untouched() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("people.csv");
    let original = b"Age,Gender\nforty,Man\n";
    std::fs::write(&path, original).unwrap();

    let mut sink = RecordSink::new(CsvFileStore::new(&path));
    let result = sink.append(&records(&[5]), None);

    assert!(matches!(result, Err(StoreError::Csv(_))));
    assert_eq!(std::fs::read(&path).unwrap(), original);
}

#[test]
fn clearing_a_missing_store_succeeds() {
    let dir = tempdir().unwrap();
    let mut store = CsvFileStore::new(dir.path().join("never-written.csv"));
    store.remove().unwrap();
    assert!(store.load().unwrap().is_empty());
}

#[test]
fn unwritable_location_reports_io_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("missing").join("people.csv");
    let mut sink = RecordSink::new(CsvFileStore::new(&path));

    let result = sink.append(&records(&[18]), None);

    assert!(matches!(result, Err(StoreError::Io { .. })));
    assert!(!path.exists());
}

#[test]
fn appending_no_records_leaves_no_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("people.csv");
    let mut sink = RecordSink::new(CsvFileStore::new(&path));

    assert_eq!(sink.append(&[], Some("empty")).unwrap(), 0);
    assert!(!path.exists());
}
