//! PV snapshot comparison and batch diff reporting.
//!
//! Compares predicted and observed `PVInfo` records field by field,
//! classifies each difference, and tallies the outcome categories into the
//! JSON report artifact written after a comparison batch.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::model::{PVInfo, TIMEOUT_ERROR};

/// Seconds between the Unix and EPICS epochs; a raw EPICS-epoch timestamp
/// means the IOC never set one
pub const EPICS_EPOCH: f64 = 631_152_000.0;

/// Fields skipped by default: the answering address legitimately differs
/// between a direct and a gateway read
pub const DEFAULT_SKIP_KEYS: &[&str] = &["address"];

/// Outcome category of one observed difference
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiffCategory {
    Other,
    Timeout,
    InvalidTimestamp,
    IncorrectTimestamp,
    Value,
    Metadata,
}

/// One field that differs between two snapshots
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDiff {
    pub key: String,
    pub ours: Value,
    pub theirs: Value,
}

/// Flatten a snapshot to comparable key/value pairs; metadata dictionaries
/// become `time_*` and `ctrl_*` keys.
fn to_flat_map(info: &PVInfo) -> BTreeMap<String, Value> {
    let mut flat = BTreeMap::new();
    flat.insert("name".to_string(), Value::String(info.name.clone()));
    flat.insert("access".to_string(), opt_value(&info.access));
    flat.insert("data_type".to_string(), opt_value(&info.data_type));
    flat.insert(
        "data_count".to_string(),
        info.data_count.map(Value::from).unwrap_or(Value::Null),
    );
    flat.insert(
        "value".to_string(),
        info.value.clone().unwrap_or(Value::Null),
    );
    flat.insert("error".to_string(), opt_value(&info.error));
    flat.insert(
        "address".to_string(),
        serde_json::to_value(&info.address).unwrap_or(Value::Null),
    );
    if let Some(time_md) = &info.time_md {
        for (key, value) in time_md {
            flat.insert(format!("time_{key}"), value.clone());
        }
    }
    if let Some(control_md) = &info.control_md {
        for (key, value) in control_md {
            flat.insert(format!("ctrl_{key}"), value.clone());
        }
    }
    flat
}

fn opt_value(field: &Option<String>) -> Value {
    field
        .as_ref()
        .map(|s| Value::String(s.clone()))
        .unwrap_or(Value::Null)
}

/// Numeric fields compare as floats, and NaN equals NaN here: an undefined
/// value on both sides is not a difference.
fn values_equal(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x == y || (x.is_nan() && y.is_nan());
    }
    a == b
}

/// Compare two snapshots field by field.
///
/// A key present on one side only diffs against null, mirroring an absent
/// metadata dictionary.
pub fn find_pvinfo_differences(ours: &PVInfo, theirs: &PVInfo, skip_keys: &[&str]) -> Vec<FieldDiff> {
    let flat_ours = to_flat_map(ours);
    let flat_theirs = to_flat_map(theirs);

    let mut keys: Vec<&String> = flat_ours.keys().chain(flat_theirs.keys()).collect();
    keys.sort();
    keys.dedup();

    let mut diffs = Vec::new();
    for key in keys {
        if skip_keys.contains(&key.as_str()) {
            continue;
        }
        let ours_value = flat_ours.get(key).cloned().unwrap_or(Value::Null);
        let theirs_value = flat_theirs.get(key).cloned().unwrap_or(Value::Null);
        if !values_equal(&ours_value, &theirs_value) {
            diffs.push(FieldDiff {
                key: key.clone(),
                ours: ours_value,
                theirs: theirs_value,
            });
        }
    }
    diffs
}

/// Accumulates categorized differences across a comparison batch and writes
/// the tally artifact.
#[derive(Debug, Clone, Default)]
pub struct DiffReport {
    by_pv: BTreeMap<String, Vec<DiffCategory>>,
}

impl DiffReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one categorized difference for a PV
    pub fn record<S: Into<String>>(&mut self, pvname: S, category: DiffCategory) {
        self.by_pv.entry(pvname.into()).or_default().push(category);
    }

    /// Describe a difference list, recording each difference's category.
    ///
    /// `desc1` labels the side the `ours` values came from, `desc2` the
    /// `theirs` side.
    pub fn interpret(
        &mut self,
        pvname: &str,
        diffs: &[FieldDiff],
        desc1: &str,
        desc2: &str,
    ) -> String {
        if diffs.is_empty() {
            return "No differences.".to_string();
        }
        let descriptions: Vec<String> = diffs
            .iter()
            .map(|diff| {
                let (category, description) = categorize(pvname, diff, desc1, desc2);
                self.record(pvname, category);
                description
            })
            .collect();
        descriptions.join(". ")
    }

    /// Tally of differences per category
    pub fn counts(&self) -> BTreeMap<DiffCategory, u64> {
        let mut counts = BTreeMap::new();
        for categories in self.by_pv.values() {
            for category in categories {
                *counts.entry(*category).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Categories recorded for one PV
    pub fn categories_for(&self, pvname: &str) -> &[DiffCategory] {
        self.by_pv
            .get(pvname)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Write the JSON tally artifact: category name to count
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer(file, &self.counts())?;
        Ok(())
    }
}

/// Classify one difference and produce its human-readable description
fn categorize(pvname: &str, diff: &FieldDiff, desc1: &str, desc2: &str) -> (DiffCategory, String) {
    let FieldDiff { key, ours, theirs } = diff;
    if key == "name" {
        return (
            DiffCategory::Other,
            "Comparing two unrelated PVs".to_string(),
        );
    }
    if key == "error" {
        if ours.as_str() == Some(TIMEOUT_ERROR) {
            return (
                DiffCategory::Timeout,
                format!("{desc1} PV {pvname} timed out, but {desc2} responded"),
            );
        }
        if theirs.as_str() == Some(TIMEOUT_ERROR) {
            return (
                DiffCategory::Timeout,
                format!("{desc2} PV {pvname} timed out, but {desc1} responded"),
            );
        }
    }
    if key == "time_timestamp" {
        if ours.as_f64() == Some(EPICS_EPOCH) {
            return (
                DiffCategory::InvalidTimestamp,
                format!("{desc1} PV {pvname} had an invalid timestamp"),
            );
        }
        if theirs.as_f64() == Some(EPICS_EPOCH) {
            return (
                DiffCategory::InvalidTimestamp,
                format!("{desc2} PV {pvname} had an invalid timestamp"),
            );
        }
        if let (Some(a), Some(b)) = (ours.as_f64(), theirs.as_f64()) {
            let hours = (a - b).abs() / 3600.0;
            return (
                DiffCategory::IncorrectTimestamp,
                format!("For {pvname} there was a timestamp diff of {hours:.2} hours"),
            );
        }
    }
    let category = if key == "value" {
        DiffCategory::Value
    } else {
        DiffCategory::Metadata
    };
    (
        category,
        format!("For {pvname}, {desc1} {key} == {ours}, but {desc2} {key} == {theirs}"),
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn snapshot(value: f64, timestamp: f64) -> PVInfo {
        PVInfo {
            name: "MFX:GATT:01".to_string(),
            access: Some("READ".to_string()),
            data_type: Some("DOUBLE".to_string()),
            data_count: Some(1),
            value: Some(json!([value])),
            time_md: Some(BTreeMap::from([(
                "timestamp".to_string(),
                json!(timestamp),
            )])),
            ..PVInfo::default()
        }
    }

    #[test]
    fn test_identical_snapshots_do_not_differ() {
        let a = snapshot(10.0, EPICS_EPOCH + 1000.0);
        assert!(find_pvinfo_differences(&a, &a.clone(), DEFAULT_SKIP_KEYS).is_empty());
    }

    #[test]
    fn test_address_skipped_by_default() {
        let mut a = snapshot(10.0, EPICS_EPOCH + 1000.0);
        let b = a.clone();
        a.address = Some(("172.21.72.50".to_string(), 5064));
        assert!(find_pvinfo_differences(&a, &b, DEFAULT_SKIP_KEYS).is_empty());
    }

    #[test]
    fn test_value_difference_categorized() {
        let a = snapshot(10.0, EPICS_EPOCH + 1000.0);
        let b = snapshot(11.0, EPICS_EPOCH + 1000.0);
        let diffs = find_pvinfo_differences(&a, &b, DEFAULT_SKIP_KEYS);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].key, "value");

        let mut report = DiffReport::new();
        report.interpret("MFX:GATT:01", &diffs, "IOC", "Gateway");
        assert_eq!(
            report.categories_for("MFX:GATT:01"),
            &[DiffCategory::Value]
        );
    }

    #[test]
    fn test_timeout_difference_categorized() {
        let a = snapshot(10.0, EPICS_EPOCH + 1000.0);
        let b = PVInfo::timeout("MFX:GATT:01");
        let diffs = find_pvinfo_differences(&a, &b, DEFAULT_SKIP_KEYS);

        let mut report = DiffReport::new();
        let message = report.interpret("MFX:GATT:01", &diffs, "IOC", "Gateway");
        assert!(message.contains("timed out"));
        assert!(report
            .categories_for("MFX:GATT:01")
            .contains(&DiffCategory::Timeout));
    }

    #[test]
    fn test_timestamp_categories() {
        let invalid = snapshot(10.0, EPICS_EPOCH);
        let good = snapshot(10.0, EPICS_EPOCH + 7200.0);
        let diffs = find_pvinfo_differences(&invalid, &good, DEFAULT_SKIP_KEYS);

        let mut report = DiffReport::new();
        report.interpret("MFX:GATT:01", &diffs, "IOC", "Gateway");
        assert_eq!(
            report.categories_for("MFX:GATT:01"),
            &[DiffCategory::InvalidTimestamp]
        );

        let late = snapshot(10.0, EPICS_EPOCH + 3600.0 + 7200.0);
        let diffs = find_pvinfo_differences(&late, &good, DEFAULT_SKIP_KEYS);
        let mut report = DiffReport::new();
        let message = report.interpret("MFX:GATT:01", &diffs, "IOC", "Gateway");
        assert!(message.contains("1.00 hours"));
        assert_eq!(
            report.categories_for("MFX:GATT:01"),
            &[DiffCategory::IncorrectTimestamp]
        );
    }

    #[test]
    fn test_report_artifact_roundtrip() {
        let mut report = DiffReport::new();
        report.record("MFX:GATT:01", DiffCategory::Value);
        report.record("MFX:GATT:01", DiffCategory::Metadata);
        report.record("XPP:SB2:01", DiffCategory::Value);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diff_report.json");
        report.write(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: BTreeMap<String, u64> = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed.get("VALUE"), Some(&2));
        assert_eq!(parsed.get("METADATA"), Some(&1));
    }
}
