//! Decoding of `ChangeRecord` rows into typed records.
//!
//! A row carries one JSON column: an array of envelopes, each holding exactly
//! one populated list of data change, heartbeat or child-partition records.
//! Decoding is structural and deterministic; it never looks at the
//! partition the row came from.

pub mod timestamp;
mod wire;

use serde::Deserialize;
use serde_json::Value;
use snafu::prelude::*;

use crate::error::{
    AmbiguousEnvelopeSnafu, ColumnShapeSnafu, DecodeError, EnvelopeSnafu, RowJsonSnafu,
};
use crate::record::ChangeStreamRecord;
use wire::Envelope;

/// One row returned by a partition query.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    change_record: Value,
}

impl Row {
    /// Wrap the value of the `ChangeRecord` column.
    pub fn new(change_record: Value) -> Self {
        Self { change_record }
    }

    /// Parse the `ChangeRecord` column from its JSON text.
    pub fn from_json(text: &str) -> Result<Self, DecodeError> {
        let change_record = serde_json::from_str(text).context(RowJsonSnafu)?;
        Ok(Self { change_record })
    }

    pub fn change_record(&self) -> &Value {
        &self.change_record
    }
}

/// Decode a row into records, preserving envelope order.
pub fn decode_row(row: &Row) -> Result<Vec<ChangeStreamRecord>, DecodeError> {
    let envelopes: Vec<&Value> = match &row.change_record {
        Value::Array(items) => items.iter().collect(),
        object @ Value::Object(_) => vec![object],
        other => {
            return ColumnShapeSnafu {
                found: describe(other),
            }
            .fail();
        }
    };

    let mut records = Vec::with_capacity(envelopes.len());
    for (index, raw) in envelopes.into_iter().enumerate() {
        let envelope = Envelope::deserialize(raw).context(EnvelopeSnafu { index })?;
        let populated = envelope.populated();
        ensure!(
            populated == 1,
            AmbiguousEnvelopeSnafu { index, populated }
        );
        records.extend(envelope.into_records());
    }
    Ok(records)
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "a boolean".to_string(),
        Value::Number(_) => "a number".to_string(),
        Value::String(_) => "a string".to_string(),
        Value::Array(_) | Value::Object(_) => "a container".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ModType;
    use serde_json::json;

    fn data_change_envelope() -> Value {
        json!({
            "data_change_record": [{
                "commit_timestamp": "2024-05-01T00:00:01.5Z",
                "record_sequence": "00000000",
                "server_transaction_id": "tx-1",
                "is_last_record_in_transaction_in_partition": true,
                "table_name": "Singers",
                "column_types": [],
                "mods": [{"keys": {"SingerId": "1"}, "new_values": {}, "old_values": {}}],
                "mod_type": "DELETE",
                "value_capture_type": "OLD_AND_NEW_VALUES",
                "number_of_records_in_transaction": "1",
                "number_of_partitions_in_transaction": "1"
            }],
            "heartbeat_record": [],
            "child_partitions_record": []
        })
    }

    fn heartbeat_envelope(micros: i64) -> Value {
        json!({"heartbeat_record": [{"timestamp": micros}]})
    }

    fn child_envelope() -> Value {
        json!({
            "child_partitions_record": [{
                "start_timestamp": "2024-05-01T00:05:00Z",
                "record_sequence": "00000001",
                "child_partitions": [
                    {"token": "A", "parent_partition_tokens": []},
                    {"token": "B", "parent_partition_tokens": []}
                ]
            }]
        })
    }

    #[test]
    fn test_decode_each_kind() {
        let row = Row::new(json!([
            data_change_envelope(),
            heartbeat_envelope(1_714_521_600_000_000),
            child_envelope()
        ]));
        let records = decode_row(&row).unwrap();
        assert_eq!(records.len(), 3);

        let ChangeStreamRecord::DataChange(change) = &records[0] else {
            panic!("expected data change, got {:?}", records[0]);
        };
        assert_eq!(change.mod_type, ModType::Delete);
        assert_eq!(change.number_of_records_in_transaction, 1);

        let ChangeStreamRecord::Heartbeat(heartbeat) = &records[1] else {
            panic!("expected heartbeat, got {:?}", records[1]);
        };
        assert_eq!(heartbeat.timestamp.to_rfc3339(), "2024-05-01T00:00:00+00:00");

        let children = records[2].as_child_partitions().unwrap();
        assert_eq!(children.child_partitions.len(), 2);
        assert_eq!(children.child_partitions[1].token.as_str(), "B");
    }

    #[test]
    fn test_single_envelope_object_accepted() {
        let row = Row::new(heartbeat_envelope(0));
        assert_eq!(decode_row(&row).unwrap().len(), 1);
    }

    #[test]
    fn test_empty_array_yields_no_records() {
        let row = Row::new(json!([]));
        assert!(decode_row(&row).unwrap().is_empty());
    }

    #[test]
    fn test_envelope_with_two_kinds_rejected() {
        let row = Row::new(json!([{
            "heartbeat_record": [{"timestamp": 0}],
            "child_partitions_record": child_envelope()["child_partitions_record"].clone()
        }]));
        let err = decode_row(&row).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::AmbiguousEnvelope {
                index: 0,
                populated: 2
            }
        ));
    }

    #[test]
    fn test_envelope_with_no_kind_rejected() {
        let row = Row::new(json!([heartbeat_envelope(0), {"heartbeat_record": []}]));
        let err = decode_row(&row).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::AmbiguousEnvelope {
                index: 1,
                populated: 0
            }
        ));
    }

    #[test]
    fn test_bad_timestamp_is_envelope_error() {
        let row = Row::new(json!([{"heartbeat_record": [{"timestamp": "soon"}]}]));
        let err = decode_row(&row).unwrap_err();
        assert!(matches!(err, DecodeError::Envelope { index: 0, .. }));
        assert!(err.to_string().contains("soon"));
    }

    #[test]
    fn test_scalar_column_rejected() {
        let err = decode_row(&Row::new(json!("hello"))).unwrap_err();
        assert!(matches!(err, DecodeError::ColumnShape { .. }));
    }

    #[test]
    fn test_decode_is_deterministic() {
        let row = Row::new(json!([data_change_envelope(), child_envelope()]));
        assert_eq!(decode_row(&row).unwrap(), decode_row(&row).unwrap());
    }

    #[test]
    fn test_row_from_json() {
        let row = Row::from_json(r#"[{"heartbeat_record":[{"timestamp":"1970-01-01T00:00:00Z"}]}]"#)
            .unwrap();
        assert_eq!(decode_row(&row).unwrap().len(), 1);
        assert!(Row::from_json("{not json").is_err());
    }
}
