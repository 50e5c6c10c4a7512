use super::*;
use crate::catalog::CatalogError;
use crate::file::FileError;
use crate::record::HeapFile;
use tempfile::TempDir;

fn setup_test_db(buffer_pages: usize) -> (TempDir, Database) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open(temp_dir.path(), DatabaseConfig { buffer_pages }).unwrap();
    (temp_dir, db)
}

fn student_attrs() -> Vec<AttrSpec> {
    vec![
        AttrSpec::new("id", AttrType::Integer, None),
        AttrSpec::new("name", AttrType::String, Some(16)),
        AttrSpec::new("gpa", AttrType::Float, None),
    ]
}

fn setup_students(buffer_pages: usize) -> (TempDir, Database) {
    let (temp, mut db) = setup_test_db(buffer_pages);
    db.create_relation("students", &student_attrs()).unwrap();
    (temp, db)
}

fn insert_student(db: &mut Database, id: i32, name: &str, gpa: f32) {
    db.insert(
        "students",
        &[
            AttrValue::new("id", &id.to_string()),
            AttrValue::new("name", name),
            AttrValue::new("gpa", &gpa.to_string()),
        ],
    )
    .unwrap();
}

fn int_column(rows: &[Vec<Value>], idx: usize) -> Vec<i32> {
    rows.iter()
        .map(|row| match &row[idx] {
            Value::Int(i) => *i,
            other => panic!("expected integer, got {:?}", other),
        })
        .collect()
}

fn write_csv(dir: &TempDir, name: &str, rows: usize) -> PathBuf {
    let path = dir.path().join(name);
    let content: String = (0..rows)
        .map(|i| format!("{},student{},{}\n", i, i, (i % 4) as f32 + 0.5))
        .collect();
    fs::write(&path, content).unwrap();
    path
}

fn rec_cnt(db: &mut Database, relation: &str) -> u32 {
    let path = db.relation_path(relation);
    let heap_file = HeapFile::open(&mut db.buffer_mgr, path).unwrap();
    let count = heap_file.rec_cnt(&db.buffer_mgr).unwrap();
    heap_file.close(&mut db.buffer_mgr).unwrap();
    count
}

fn page_cnt(db: &mut Database, relation: &str) -> u32 {
    let path = db.relation_path(relation);
    let heap_file = HeapFile::open(&mut db.buffer_mgr, path).unwrap();
    let count = heap_file.page_cnt(&db.buffer_mgr).unwrap();
    heap_file.close(&mut db.buffer_mgr).unwrap();
    count
}

#[test]
fn test_insert_and_scan_in_order() {
    let (_temp, mut db) = setup_students(16);
    insert_student(&mut db, 3, "carol", 3.5);
    insert_student(&mut db, 1, "alice", 4.0);
    insert_student(&mut db, 2, "bob", 2.5);

    let rows = db.scan_relation("students").unwrap();
    assert_eq!(int_column(&rows, 0), vec![3, 1, 2]);
    assert_eq!(
        rows[1],
        vec![
            Value::Int(1),
            Value::String("alice".to_string()),
            Value::Float(4.0)
        ]
    );
    assert_eq!(rec_cnt(&mut db, "students"), 3);
    assert_eq!(page_cnt(&mut db, "students"), 1);
    assert_eq!(db.buffer_manager().total_pins(), 0);
}

#[test]
fn test_int_filter_select() {
    let (_temp, mut db) = setup_students(16);
    insert_student(&mut db, 5, "five", 1.0);
    insert_student(&mut db, 10, "ten", 2.0);
    insert_student(&mut db, 15, "fifteen", 3.0);

    let projection = [
        AttrRef::new("students", "name"),
        AttrRef::new("students", "id"),
    ];
    let gt = Predicate::new("id", Operator::Gt, "10");
    assert_eq!(db.select("big", &projection, Some(&gt)).unwrap(), 1);
    let rows = db.scan_relation("big").unwrap();
    assert_eq!(
        rows,
        vec![vec![Value::String("fifteen".to_string()), Value::Int(15)]]
    );

    // Result relation created from the projection
    let attrs = db.catalog().get_attribute_info("big").unwrap();
    assert_eq!(attrs[0].attr_name, "name");
    assert_eq!(attrs[1].attr_offset, 16);

    let eq = Predicate::new("id", Operator::Eq, "10");
    assert_eq!(db.select("ten", &projection, Some(&eq)).unwrap(), 1);
    assert_eq!(int_column(&db.scan_relation("ten").unwrap(), 1), vec![10]);
    assert_eq!(db.buffer_manager().total_pins(), 0);
}

#[test]
fn test_select_into_existing_result() {
    let (_temp, mut db) = setup_students(16);
    insert_student(&mut db, 1, "a", 1.0);
    insert_student(&mut db, 2, "b", 2.0);

    let ids = [AttrRef::new("students", "id")];
    assert_eq!(db.select("out", &ids, None).unwrap(), 2);
    assert_eq!(db.select("out", &ids, None).unwrap(), 2);
    assert_eq!(int_column(&db.scan_relation("out").unwrap(), 0), vec![1, 2, 1, 2]);

    let names = [AttrRef::new("students", "name")];
    assert!(matches!(
        db.select("out", &names, None),
        Err(QueryError::RecordLengthMismatch { expected: 16, actual: 4, .. })
    ));
    assert_eq!(db.buffer_manager().total_pins(), 0);
}

#[test]
fn test_select_errors() {
    let (_temp, mut db) = setup_students(16);
    db.create_relation("other", &[AttrSpec::new("x", AttrType::Integer, None)])
        .unwrap();
    insert_student(&mut db, 1, "a", 1.0);

    assert!(matches!(
        db.select("out", &[], None),
        Err(QueryError::InvalidQuery(_))
    ));
    assert!(matches!(
        db.select("students", &[AttrRef::new("students", "id")], None),
        Err(QueryError::InvalidQuery(_))
    ));
    let mixed = [AttrRef::new("students", "id"), AttrRef::new("other", "x")];
    assert!(matches!(
        db.select("out", &mixed, None),
        Err(QueryError::InvalidQuery(_))
    ));
    assert!(matches!(
        db.select("out", &[AttrRef::new("students", "age")], None),
        Err(QueryError::CatalogError(CatalogError::AttributeNotFound { .. }))
    ));
    let bad = Predicate::new("id", Operator::Eq, "ten");
    assert!(matches!(
        db.select("out", &[AttrRef::new("students", "id")], Some(&bad)),
        Err(QueryError::InvalidLiteral { .. })
    ));
    // Nothing was created by the failed selects
    assert!(!db.catalog().contains("out"));
    assert_eq!(db.buffer_manager().total_pins(), 0);
}

#[test]
fn test_delete_with_filter() {
    let (temp, mut db) = setup_students(16);
    let csv = write_csv(&temp, "rows.csv", 20);
    assert_eq!(db.load("students", &csv).unwrap(), 20);

    let pred = Predicate::new("id", Operator::Lt, "5");
    assert_eq!(db.delete("students", Some(&pred)).unwrap(), 5);
    assert_eq!(rec_cnt(&mut db, "students"), 15);

    assert_eq!(db.delete("students", Some(&pred)).unwrap(), 0);
    let rows = db.scan_relation("students").unwrap();
    assert_eq!(int_column(&rows, 0), (5..20).collect::<Vec<_>>());
    assert_eq!(db.buffer_manager().total_pins(), 0);
}

#[test]
fn test_delete_all() {
    let (_temp, mut db) = setup_students(16);
    for id in 0..4 {
        insert_student(&mut db, id, "x", 1.0);
    }
    assert_eq!(db.delete("students", None).unwrap(), 4);
    assert!(db.scan_relation("students").unwrap().is_empty());
    assert_eq!(rec_cnt(&mut db, "students"), 0);

    // The relation still accepts inserts
    insert_student(&mut db, 9, "y", 2.0);
    assert_eq!(int_column(&db.scan_relation("students").unwrap(), 0), vec![9]);
}

#[test]
fn test_string_and_float_filters() {
    let (_temp, mut db) = setup_students(16);
    insert_student(&mut db, 1, "alice", 3.5);
    insert_student(&mut db, 2, "bob", 2.0);
    insert_student(&mut db, 3, "bobby", 3.75);

    let ids = [AttrRef::new("students", "id")];
    let name_eq = Predicate::new("name", Operator::Eq, "bob");
    assert_eq!(db.select("by_name", &ids, Some(&name_eq)).unwrap(), 1);
    assert_eq!(int_column(&db.scan_relation("by_name").unwrap(), 0), vec![2]);

    let name_gt = Predicate::new("name", Operator::Gt, "b");
    assert_eq!(db.select("after_b", &ids, Some(&name_gt)).unwrap(), 2);

    let gpa_ge = Predicate::new("gpa", Operator::Gte, "3.5");
    assert_eq!(db.select("honors", &ids, Some(&gpa_ge)).unwrap(), 2);
    assert_eq!(int_column(&db.scan_relation("honors").unwrap(), 0), vec![1, 3]);
}

#[test]
fn test_insert_validation() {
    let (_temp, mut db) = setup_students(16);

    assert!(matches!(
        db.insert("students", &[AttrValue::new("id", "1")]),
        Err(QueryError::AttrCountMismatch { expected: 3, actual: 1 })
    ));
    let wrong_name = [
        AttrValue::new("id", "1"),
        AttrValue::new("name", "a"),
        AttrValue::new("grade", "1.0"),
    ];
    assert!(matches!(
        db.insert("students", &wrong_name),
        Err(QueryError::MissingAttribute(attr)) if attr == "gpa"
    ));
    let too_long = [
        AttrValue::new("id", "1"),
        AttrValue::new("name", "a name longer than sixteen bytes"),
        AttrValue::new("gpa", "1.0"),
    ];
    assert!(matches!(
        db.insert("students", &too_long),
        Err(QueryError::InvalidLiteral { .. })
    ));
    assert!(matches!(
        db.insert("nobody", &too_long),
        Err(QueryError::CatalogError(CatalogError::RelationNotFound(_)))
    ));

    // Attribute order does not matter
    let shuffled = [
        AttrValue::new("gpa", "1.5"),
        AttrValue::new("id", "7"),
        AttrValue::new("name", "zed"),
    ];
    db.insert("students", &shuffled).unwrap();
    assert_eq!(
        db.scan_relation("students").unwrap(),
        vec![vec![
            Value::Int(7),
            Value::String("zed".to_string()),
            Value::Float(1.5)
        ]]
    );
    assert_eq!(db.buffer_manager().total_pins(), 0);
}

#[test]
fn test_load_spans_pages_with_small_pool() {
    let (temp, mut db) = setup_students(6);
    let csv = write_csv(&temp, "many.csv", 700);
    assert_eq!(db.load("students", &csv).unwrap(), 700);
    assert!(page_cnt(&mut db, "students") >= 3);
    assert_eq!(rec_cnt(&mut db, "students"), 700);

    let pred = Predicate::new("id", Operator::Gte, "350");
    let projection = [AttrRef::new("students", "id"), AttrRef::new("students", "gpa")];
    assert_eq!(db.select("upper", &projection, Some(&pred)).unwrap(), 350);

    let rows = db.scan_relation("upper").unwrap();
    assert_eq!(int_column(&rows, 0), (350..700).collect::<Vec<_>>());
    assert_eq!(db.buffer_manager().total_pins(), 0);
}

#[test]
fn test_load_rejects_bad_row() {
    let (temp, mut db) = setup_students(16);
    let path = temp.path().join("bad.csv");
    fs::write(&path, "1,a,1.0\n2,b\n3,c,3.0\n").unwrap();

    assert!(matches!(
        db.load("students", &path),
        Err(QueryError::AttrCountMismatch { expected: 3, actual: 2 })
    ));
    assert_eq!(int_column(&db.scan_relation("students").unwrap(), 0), vec![1]);
    assert_eq!(db.buffer_manager().total_pins(), 0);
}

#[test]
fn test_persistence_across_reopen() {
    let temp = TempDir::new().unwrap();
    {
        let mut db = Database::open(temp.path(), DatabaseConfig::default()).unwrap();
        db.create_relation("students", &student_attrs()).unwrap();
        insert_student(&mut db, 1, "alice", 3.0);
        insert_student(&mut db, 2, "bob", 2.0);
    }

    let mut db = Database::open(temp.path(), DatabaseConfig { buffer_pages: 4 }).unwrap();
    assert_eq!(db.catalog().relation_names(), vec!["students".to_string()]);
    let rows = db.scan_relation("students").unwrap();
    assert_eq!(int_column(&rows, 0), vec![1, 2]);
    assert_eq!(rows[1][1], Value::String("bob".to_string()));
}

#[test]
fn test_create_and_destroy_relation() {
    let (temp, mut db) = setup_students(8);
    assert!(matches!(
        db.create_relation("students", &student_attrs()),
        Err(QueryError::CatalogError(CatalogError::RelationExists(_)))
    ));
    assert!(temp.path().join("students.rel").exists());

    db.destroy_relation("students").unwrap();
    assert!(!temp.path().join("students.rel").exists());
    assert!(matches!(
        db.scan_relation("students"),
        Err(QueryError::CatalogError(CatalogError::RelationNotFound(_)))
    ));
    assert!(matches!(
        db.destroy_relation("students"),
        Err(QueryError::CatalogError(CatalogError::RelationNotFound(_)))
    ));

    // Name is free again
    db.create_relation("students", &student_attrs()).unwrap();
    assert!(db.scan_relation("students").unwrap().is_empty());
}

#[test]
fn test_create_retries_after_buffer_exhaustion() {
    let temp = TempDir::new().unwrap();
    {
        let mut db = Database::open(temp.path(), DatabaseConfig { buffer_pages: 1 }).unwrap();
        assert!(matches!(
            db.create_relation("students", &student_attrs()),
            Err(QueryError::RecordError(RecordError::File(FileError::BufferExceeded)))
        ));
        assert!(!db.catalog().contains("students"));
        assert!(!temp.path().join("students.rel").exists());
    }

    let mut db = Database::open(temp.path(), DatabaseConfig { buffer_pages: 8 }).unwrap();
    db.create_relation("students", &student_attrs()).unwrap();
    insert_student(&mut db, 1, "alice", 3.0);
    assert_eq!(int_column(&db.scan_relation("students").unwrap(), 0), vec![1]);
}

#[test]
fn test_relation_name_stays_in_data_dir() {
    let (temp, mut db) = setup_test_db(8);
    assert!(matches!(
        db.create_relation("../escape", &student_attrs()),
        Err(QueryError::CatalogError(CatalogError::InvalidName(_)))
    ));
    assert!(!temp.path().join("../escape.rel").exists());
    assert!(db.catalog().relation_names().is_empty());
}

#[test]
fn test_print_relation() {
    let (_temp, mut db) = setup_students(8);
    insert_student(&mut db, 1, "alice", 3.5);

    let table = db.print_relation("students").unwrap();
    assert_eq!(table.len(), 1);
    let rendered = table.to_string();
    assert!(rendered.contains("name"));
    assert!(rendered.contains("alice"));
    assert!(rendered.contains("3.5"));
}
