//! Data Source Adapter
//!
//! Loads patient populations from the two input formats and validates them
//! into [`PatientRecord`]s at the boundary:
//!
//! - **Tabular** - CSV with the indicator dataset's column names
//!   (`Sex`, `Age`, `HighBP`, ...). Extra columns are ignored.
//! - **Hierarchical** - a JSON array of nested patient documents.
//!
//! Numeric cells may be written as floats (`1.0`); integer fields accept only
//! integral values. Flags are true when non-zero (or a JSON `true`).
//!
//! Malformed records are handled per [`MalformedPolicy`]. Tabular input
//! aborts on the first bad row, hierarchical input skips bad documents.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{BenchError, BenchResult, FormatError};
use crate::patient::PatientRecord;

/// Input file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Flat CSV, one row per patient
    Tabular,
    /// JSON array of nested documents
    Hierarchical,
}

impl SourceFormat {
    /// Guess the format from the file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("csv") => Some(Self::Tabular),
            Some("json") => Some(Self::Hierarchical),
            _ => None,
        }
    }

    /// What to do with a malformed record unless told otherwise
    pub fn default_policy(&self) -> MalformedPolicy {
        match self {
            Self::Tabular => MalformedPolicy::Abort,
            Self::Hierarchical => MalformedPolicy::Skip,
        }
    }
}

/// How the loader reacts to a record that fails validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedPolicy {
    /// Fail the whole load with the first [`FormatError`]
    Abort,
    /// Drop the record, keep its error in [`LoadedRecords::skipped`]
    Skip,
}

/// Result of a load
#[derive(Debug, Clone, Default)]
pub struct LoadedRecords {
    pub records: Vec<PatientRecord>,
    pub skipped: Vec<FormatError>,
}

/// A file-backed patient population
#[derive(Debug, Clone)]
pub struct DataSource {
    path: PathBuf,
    format: SourceFormat,
    policy: MalformedPolicy,
}

impl DataSource {
    pub fn new(path: impl Into<PathBuf>, format: SourceFormat) -> Self {
        Self {
            path: path.into(),
            format,
            policy: format.default_policy(),
        }
    }

    pub fn tabular(path: impl Into<PathBuf>) -> Self {
        Self::new(path, SourceFormat::Tabular)
    }

    pub fn hierarchical(path: impl Into<PathBuf>) -> Self {
        Self::new(path, SourceFormat::Hierarchical)
    }

    /// Builder-style: override the malformed-record policy
    #[must_use]
    pub fn with_policy(mut self, policy: MalformedPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> SourceFormat {
        self.format
    }

    /// Read and validate the whole file
    pub fn load(&self) -> BenchResult<LoadedRecords> {
        let file = File::open(&self.path).map_err(|source| BenchError::Io {
            path: self.path.clone(),
            source,
        })?;
        let reader = BufReader::new(file);
        let name = self.path.display().to_string();

        let loaded = match self.format {
            SourceFormat::Tabular => parse_tabular(reader, &name, self.policy)?,
            SourceFormat::Hierarchical => parse_hierarchical(reader, &name, self.policy)?,
        };

        info!(
            path = %self.path.display(),
            format = ?self.format,
            records = loaded.records.len(),
            skipped = loaded.skipped.len(),
            "Loaded patient records"
        );
        Ok(loaded)
    }
}

// ============================================================================
// Field table
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Kind {
    Int,
    Float,
    Flag,
}

/// (tabular column, nested path, kind), in `PatientRecord` field order
const FIELDS: [(&str, [&str; 2], Kind); 17] = [
    ("Sex", ["demographics", "sex"], Kind::Int),
    ("Age", ["demographics", "age"], Kind::Float),
    ("Education", ["demographics", "education"], Kind::Int),
    ("Income", ["demographics", "income"], Kind::Int),
    ("GenHlth", ["health_status", "gen_health"], Kind::Int),
    ("MentHlth", ["health_status", "ment_health_days"], Kind::Int),
    ("PhysHlth", ["health_status", "phys_health_days"], Kind::Int),
    ("DiffWalk", ["health_status", "difficulty_walking"], Kind::Flag),
    ("PhysActivity", ["lifestyle", "physical_activity"], Kind::Flag),
    ("Smoker", ["lifestyle", "smoker"], Kind::Flag),
    ("Fruits", ["lifestyle", "fruits"], Kind::Flag),
    ("Veggies", ["lifestyle", "veggies"], Kind::Flag),
    ("HeartDiseaseorAttack", ["diseases", "heart_disease"], Kind::Flag),
    ("Stroke", ["diseases", "stroke"], Kind::Flag),
    ("Diabetes", ["diseases", "diabetes"], Kind::Flag),
    ("HighBP", ["diseases", "high_blood_pressure"], Kind::Flag),
    ("HighChol", ["diseases", "high_cholesterol"], Kind::Flag),
];

/// Tabular column names the loader requires
pub fn tabular_columns() -> impl Iterator<Item = &'static str> {
    FIELDS.iter().map(|(column, _, _)| *column)
}

#[derive(Debug, Clone, Copy)]
enum Parsed {
    Int(i64),
    Float(f64),
    Flag(bool),
}

#[derive(Debug, Clone, Copy)]
enum Raw<'a> {
    Text(&'a str),
    Json(&'a Value),
}

impl Raw<'_> {
    fn as_number(&self) -> Option<f64> {
        match self {
            Raw::Text(s) => s.trim().parse::<f64>().ok(),
            Raw::Json(v) => v.as_f64(),
        }
        .filter(|n| n.is_finite())
    }

    fn coerce(&self, kind: Kind) -> Option<Parsed> {
        match kind {
            Kind::Float => self.as_number().map(Parsed::Float),
            Kind::Int => {
                if let Raw::Text(s) = self {
                    if let Ok(i) = s.trim().parse::<i64>() {
                        return Some(Parsed::Int(i));
                    }
                }
                if let Raw::Json(v) = self {
                    if let Some(i) = v.as_i64() {
                        return Some(Parsed::Int(i));
                    }
                }
                self.as_number()
                    .filter(|n| n.fract() == 0.0 && n.abs() < i64::MAX as f64)
                    .map(|n| Parsed::Int(n as i64))
            }
            Kind::Flag => match self {
                Raw::Json(Value::Bool(b)) => Some(Parsed::Flag(*b)),
                Raw::Text(s) if s.trim().eq_ignore_ascii_case("true") => Some(Parsed::Flag(true)),
                Raw::Text(s) if s.trim().eq_ignore_ascii_case("false") => {
                    Some(Parsed::Flag(false))
                }
                _ => self.as_number().map(|n| Parsed::Flag(n != 0.0)),
            },
        }
    }

    fn display(&self) -> String {
        match self {
            Raw::Text(s) => s.to_string(),
            Raw::Json(v) => v.to_string(),
        }
    }
}

/// Build a record from a field lookup; `label` names a field in errors
fn build_record<'a>(
    source_name: &str,
    index: usize,
    label: impl Fn(usize) -> String,
    lookup: impl Fn(usize) -> Option<Raw<'a>>,
) -> Result<PatientRecord, FormatError> {
    let mut parsed = Vec::with_capacity(FIELDS.len());
    for (i, (_, _, kind)) in FIELDS.iter().enumerate() {
        let raw = lookup(i).ok_or_else(|| FormatError::MissingField {
            source_name: source_name.to_string(),
            index,
            field: label(i),
        })?;
        let value = raw.coerce(*kind).ok_or_else(|| FormatError::InvalidValue {
            source_name: source_name.to_string(),
            index,
            field: label(i),
            value: raw.display(),
        })?;
        parsed.push(value);
    }

    let int = |i: usize| match parsed[i] {
        Parsed::Int(v) => v,
        Parsed::Float(v) => v as i64,
        Parsed::Flag(v) => v as i64,
    };
    let float = |i: usize| match parsed[i] {
        Parsed::Float(v) => v,
        Parsed::Int(v) => v as f64,
        Parsed::Flag(v) => f64::from(u8::from(v)),
    };
    let flag = |i: usize| match parsed[i] {
        Parsed::Flag(v) => v,
        Parsed::Int(v) => v != 0,
        Parsed::Float(v) => v != 0.0,
    };

    Ok(PatientRecord {
        patient_id: 0,
        sex: int(0),
        age: float(1),
        education: int(2),
        income: int(3),
        gen_health: int(4),
        ment_health_days: int(5),
        phys_health_days: int(6),
        difficulty_walking: flag(7),
        physical_activity: flag(8),
        smoker: flag(9),
        fruits: flag(10),
        veggies: flag(11),
        heart_disease: flag(12),
        stroke: flag(13),
        diabetes: flag(14),
        high_blood_pressure: flag(15),
        high_cholesterol: flag(16),
    })
}

fn apply_policy(
    loaded: &mut LoadedRecords,
    result: Result<PatientRecord, FormatError>,
    policy: MalformedPolicy,
) -> Result<(), FormatError> {
    match result {
        Ok(record) => loaded.records.push(record),
        Err(e) => match policy {
            MalformedPolicy::Abort => return Err(e),
            MalformedPolicy::Skip => {
                warn!(error = %e, "Skipping malformed record");
                loaded.skipped.push(e);
            }
        },
    }
    Ok(())
}

// ============================================================================
// Parsers
// ============================================================================

/// Parse CSV patient rows
pub fn parse_tabular<R: Read>(
    reader: R,
    source_name: &str,
    policy: MalformedPolicy,
) -> Result<LoadedRecords, FormatError> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| FormatError::Malformed {
            source_name: source_name.to_string(),
            message: format!("unreadable header: {}", e),
        })?
        .clone();
    let positions: Vec<Option<usize>> = FIELDS
        .iter()
        .map(|(column, _, _)| headers.iter().position(|h| h == *column))
        .collect();
    debug!(source = source_name, columns = headers.len(), "Parsing tabular source");

    let mut loaded = LoadedRecords::default();
    for (index, row) in csv_reader.records().enumerate() {
        let row = row.map_err(|e| FormatError::Malformed {
            source_name: source_name.to_string(),
            message: format!("record {}: {}", index, e),
        })?;
        let result = build_record(
            source_name,
            index,
            |i| FIELDS[i].0.to_string(),
            |i| {
                positions[i]
                    .and_then(|p| row.get(p))
                    .filter(|cell| !cell.is_empty())
                    .map(Raw::Text)
            },
        );
        apply_policy(&mut loaded, result, policy)?;
    }
    Ok(loaded)
}

/// Parse a JSON array of nested patient documents
pub fn parse_hierarchical<R: Read>(
    reader: R,
    source_name: &str,
    policy: MalformedPolicy,
) -> Result<LoadedRecords, FormatError> {
    let value: Value = serde_json::from_reader(reader).map_err(|e| FormatError::Malformed {
        source_name: source_name.to_string(),
        message: format!("invalid JSON: {}", e),
    })?;
    let documents = match value {
        Value::Array(documents) => documents,
        _ => {
            return Err(FormatError::Malformed {
                source_name: source_name.to_string(),
                message: "expected a JSON array of patient documents".to_string(),
            })
        }
    };
    debug!(source = source_name, documents = documents.len(), "Parsing hierarchical source");

    let mut loaded = LoadedRecords::default();
    for (index, doc) in documents.iter().enumerate() {
        let result = build_record(
            source_name,
            index,
            |i| FIELDS[i].1.join("."),
            |i| {
                let [section, field] = FIELDS[i].1;
                doc.get(section)
                    .and_then(|s| s.get(field))
                    .filter(|v| !v.is_null())
                    .map(Raw::Json)
            },
        );
        apply_policy(&mut loaded, result, policy)?;
    }
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const HEADER: &str = "HeartDiseaseorAttack,HighBP,HighChol,CholCheck,BMI,Smoker,Stroke,Diabetes,PhysActivity,Fruits,Veggies,HvyAlcoholConsump,GenHlth,MentHlth,PhysHlth,DiffWalk,Sex,Age,Education,Income";

    fn csv_with_rows(rows: &[&str]) -> String {
        let mut out = String::from(HEADER);
        for row in rows {
            out.push('\n');
            out.push_str(row);
        }
        out
    }

    #[test]
    fn test_parse_tabular_float_cells() {
        let csv = csv_with_rows(&[
            "0.0,1.0,1.0,1.0,40.0,1.0,0.0,2.0,0.0,0.0,1.0,0.0,5.0,18.0,15.0,1.0,0.0,9.0,4.0,52000",
            "1,0,0,1,25,0,1,0,1,1,1,0,3,0,0,0,1,7.5,6,85000",
        ]);
        let loaded = parse_tabular(csv.as_bytes(), "test.csv", MalformedPolicy::Abort).unwrap();

        assert_eq!(loaded.records.len(), 2);
        assert!(loaded.skipped.is_empty());

        let first = &loaded.records[0];
        assert_eq!(first.patient_id, 0);
        assert_eq!(first.income, 52_000);
        assert_eq!(first.education, 4);
        assert_eq!(first.gen_health, 5);
        assert_eq!(first.ment_health_days, 18);
        assert!(first.high_blood_pressure);
        assert!(first.high_cholesterol);
        assert!(first.diabetes, "non-zero diabetes code is a positive flag");
        assert!(first.smoker);
        assert!(!first.heart_disease);

        let second = &loaded.records[1];
        assert_eq!(second.age, 7.5);
        assert!(second.heart_disease);
        assert!(second.stroke);
    }

    #[test]
    fn test_parse_tabular_aborts_on_bad_row() {
        let csv = csv_with_rows(&[
            "0,1,1,1,40,1,0,0,0,0,1,0,5,18,15,1,0,9,4,52000",
            "0,1,1,1,40,1,0,0,0,0,1,0,5,18,15,1,0,9,4.5,52000",
        ]);
        let err = parse_tabular(csv.as_bytes(), "test.csv", MalformedPolicy::Abort).unwrap_err();
        match err {
            FormatError::InvalidValue { index, field, .. } => {
                assert_eq!(index, 1);
                assert_eq!(field, "Education");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_tabular_missing_column() {
        let csv = "Sex,Age\n1,5\n";
        let err = parse_tabular(csv.as_bytes(), "short.csv", MalformedPolicy::Abort).unwrap_err();
        assert!(matches!(err, FormatError::MissingField { index: 0, ref field, .. } if field == "Education"));
    }

    #[test]
    fn test_parse_tabular_skip_policy_keeps_good_rows() {
        let csv = csv_with_rows(&[
            "0,1,1,1,40,1,0,0,0,0,1,0,5,18,15,1,0,9,4,52000",
            "0,1,1,1,40,1,0,0,0,0,1,0,5,18,15,1,0,9,4,",
            "0,1,1,1,40,1,0,0,0,0,1,0,5,18,15,1,0,9,4,61000",
        ]);
        let loaded = parse_tabular(csv.as_bytes(), "test.csv", MalformedPolicy::Skip).unwrap();
        assert_eq!(loaded.records.len(), 2);
        assert_eq!(loaded.skipped.len(), 1);
        assert_eq!(loaded.skipped[0].record_index(), Some(1));
    }

    fn document(income: Value) -> Value {
        serde_json::json!({
            "patient_id": 1,
            "demographics": {"sex": 1, "age": 9.0, "education": 5, "income": income},
            "health_status": {"gen_health": 2, "ment_health_days": 0, "phys_health_days": 3, "difficulty_walking": false},
            "lifestyle": {"physical_activity": true, "smoker": false, "fruits": true, "veggies": true},
            "diseases": {"heart_disease": false, "stroke": false, "diabetes": 1, "high_blood_pressure": true, "high_cholesterol": true}
        })
    }

    #[test]
    fn test_parse_hierarchical_skips_incomplete_documents() {
        let mut missing_sex = document(Value::from(70_000));
        missing_sex["demographics"]
            .as_object_mut()
            .unwrap()
            .remove("sex");
        let docs = Value::Array(vec![
            document(Value::from(70_000)),
            missing_sex,
            document(Value::from(48_000.0)),
        ]);
        let text = docs.to_string();

        let loaded =
            parse_hierarchical(text.as_bytes(), "patients.json", MalformedPolicy::Skip).unwrap();
        assert_eq!(loaded.records.len(), 2);
        assert_eq!(loaded.skipped.len(), 1);
        assert!(matches!(
            &loaded.skipped[0],
            FormatError::MissingField { index: 1, field, .. } if field == "demographics.sex"
        ));

        let first = &loaded.records[0];
        assert_eq!(first.patient_id, 0, "input identifiers are not carried over");
        assert_eq!(first.income, 70_000);
        assert!(first.diabetes);
        assert_eq!(loaded.records[1].income, 48_000);
    }

    #[test]
    fn test_parse_hierarchical_abort_policy() {
        let docs = Value::Array(vec![document(Value::from("lots"))]).to_string();
        let err =
            parse_hierarchical(docs.as_bytes(), "patients.json", MalformedPolicy::Abort).unwrap_err();
        assert!(matches!(err, FormatError::InvalidValue { ref field, .. } if field == "demographics.income"));
    }

    #[test]
    fn test_parse_hierarchical_requires_array() {
        let err = parse_hierarchical(&b"{\"a\": 1}"[..], "x.json", MalformedPolicy::Skip).unwrap_err();
        assert!(matches!(err, FormatError::Malformed { .. }));
    }

    #[test]
    fn test_data_source_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("patients.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(
            file,
            "{}",
            csv_with_rows(&["0,1,1,1,40,1,0,0,0,0,1,0,5,18,15,1,0,9,4,52000"])
        )
        .unwrap();

        let source = DataSource::new(&path, SourceFormat::from_path(&path).unwrap());
        assert_eq!(source.format(), SourceFormat::Tabular);
        let loaded = source.load().unwrap();
        assert_eq!(loaded.records.len(), 1);
    }

    #[test]
    fn test_data_source_policy_override() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("patients.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(
            file,
            "{}",
            csv_with_rows(&[
                "0,1,1,1,40,1,0,0,0,0,1,0,5,18,15,1,0,9,4,52000",
                "0,1,1,1,40,1,0,0,0,0,1,0,5,18,15,1,0,9,x,52000",
                "0,1,1,1,40,1,0,0,0,0,1,0,5,18,15,1,0,9,4,61000",
            ])
        )
        .unwrap();

        let err = DataSource::tabular(&path).load().unwrap_err();
        assert!(matches!(err, BenchError::Format(_)), "tabular aborts by default: {:?}", err);

        let source = DataSource::tabular(&path).with_policy(MalformedPolicy::Skip);
        assert_eq!(source.path(), path.as_path());
        let loaded = source.load().unwrap();
        assert_eq!(loaded.records.len(), 2);
        assert_eq!(loaded.skipped.len(), 1);
        assert_eq!(loaded.records[1].income, 61_000);
    }

    #[test]
    fn test_data_source_missing_file() {
        let err = DataSource::hierarchical("/nonexistent/patients.json")
            .load()
            .unwrap_err();
        assert!(matches!(err, BenchError::Io { .. }));
    }

    #[test]
    fn test_default_policies() {
        assert_eq!(SourceFormat::Tabular.default_policy(), MalformedPolicy::Abort);
        assert_eq!(
            SourceFormat::Hierarchical.default_policy(),
            MalformedPolicy::Skip
        );
        assert_eq!(tabular_columns().count(), 17);
    }
}
