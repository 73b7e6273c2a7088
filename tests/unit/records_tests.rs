/*!
 * Tests for the record model and ingestion
 */

use serde_json::json;
use tablewai::errors::RecordError;
use tablewai::records::{CellValue, ColumnSchema, LockedKeys, Record, RecordSet};

#[test]
fn test_ingest_withSchema_shouldMoveUnknownColumnsToPassthrough() {
    let rows = vec![json!({"name": "苹果", "price": 3.5, "internal_note": "不翻译"})];
    let set = RecordSet::ingest(&rows, &ColumnSchema::with_columns(["name", "price"])).unwrap();
    let record = set.get(0).unwrap();

    assert_eq!(record.keys().collect::<Vec<_>>(), vec!["name", "price"]);
    assert_eq!(record.passthrough().len(), 1);
    assert_eq!(record.text_cells().count(), 1);
    assert_eq!(record.to_json()["internal_note"], "不翻译");
}

#[test]
fn test_ingest_withNestedValue_shouldNameRowAndColumn() {
    let rows = vec![json!({"name": "ok"}), json!({"name": "x", "tags": ["a", "b"]})];
    let error = RecordSet::ingest(&rows, &ColumnSchema::open()).unwrap_err();

    assert_eq!(
        error,
        RecordError::NonScalar {
            row: 1,
            column: "tags".to_string()
        }
    );
}

#[test]
fn test_ingest_withScalarRow_shouldReject() {
    let rows = vec![json!("just a string")];
    assert_eq!(
        RecordSet::ingest(&rows, &ColumnSchema::open()).unwrap_err(),
        RecordError::NotAnObject { row: 0 }
    );
}

#[test]
fn test_set_withExistingKey_shouldKeepPosition() {
    let mut record = Record::from_pairs([("a", "1"), ("b", "2"), ("c", "3")]);
    record.set("b", CellValue::from("two"));
    record.set("d", CellValue::Bool(true));

    assert_eq!(record.keys().collect::<Vec<_>>(), vec!["a", "b", "c", "d"]);
    assert_eq!(record.text("b"), Some("two"));
    assert_eq!(record.text("d"), None);
}

#[test]
fn test_lockedKeys_withCustomPattern_shouldOnlyLockMatches() {
    let locked = LockedKeys::new("^ref$").unwrap();
    assert!(locked.is_locked("ref"));
    assert!(!locked.is_locked("id"));

    assert!(!LockedKeys::new("").unwrap().is_locked("id"));
    assert!(LockedKeys::new("(unclosed").is_err());

    let defaults = LockedKeys::default();
    assert!(defaults.is_locked("product_id"));
    assert!(defaults.is_locked("SKU"));
    assert!(!defaults.is_locked("description"));
}
