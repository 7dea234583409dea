//! JSON shape for printed records: the stored row plus its parsed payloads.

use std::collections::BTreeMap;

use quill_core::AuditRecord;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct RecordView {
    #[serde(flatten)]
    pub record: AuditRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<BTreeMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new: Option<BTreeMap<String, Value>>,
}

impl RecordView {
    pub fn new(record: AuditRecord) -> anyhow::Result<Self> {
        let old = record.old_delta()?;
        let new = record.new_delta()?;
        Ok(Self { record, old, new })
    }

    pub fn list(records: Vec<AuditRecord>) -> anyhow::Result<Vec<Self>> {
        records.into_iter().map(Self::new).collect()
    }
}

#[cfg(test)]
mod tests {
    use quill_core::AuditOperation;

    use super::RecordView;

    #[test]
    fn payloads_are_expanded_next_to_raw_text() {
        let record = quill_core::AuditRecord::new("Invoice", AuditOperation::Modified)
            .with_primary_key("7")
            .with_values(
                Some(r#"{"total":100}"#.into()),
                Some(r#"{"total":150}"#.into()),
            );
        let view = RecordView::new(record).expect("payloads parse");
        let json = serde_json::to_value(&view).expect("serializes");

        assert_eq!(json["primary_key"], "7");
        assert_eq!(json["old"]["total"], 100);
        assert_eq!(json["new"]["total"], 150);
        assert_eq!(json["new_values"], r#"{"total":150}"#);
    }

    #[test]
    fn removed_records_have_no_payload_keys() {
        let record = quill_core::AuditRecord::new("Invoice", AuditOperation::Removed)
            .with_primary_key("7");
        let json = serde_json::to_value(RecordView::new(record).expect("ok")).expect("serializes");
        assert!(json.get("old").is_none());
        assert!(json.get("new").is_none());
    }
}
