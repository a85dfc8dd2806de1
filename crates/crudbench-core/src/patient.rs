//! Patient data model
//!
//! A patient is held in two shapes that carry the same values:
//!
//! - [`PatientRecord`] - flattened, one field per column. This is the shape the
//!   relational backend stores (split over four tables) and the shape every
//!   backend returns from `read`.
//! - [`PatientDocument`] - nested, with `demographics`, `health_status`,
//!   `lifestyle` and `diseases` sub-documents. This is the shape the document
//!   backend stores and the hierarchical input file uses.
//!
//! Conversions between the two are lossless.

use serde::{Deserialize, Serialize};

/// Amount added to `income` by the update operation
pub const INCOME_DELTA: i64 = 1;

/// Aggregate variant 2 keeps only groups whose average income exceeds this
pub const AGGREGATE_INCOME_THRESHOLD: f64 = 50_000.0;

/// Aggregate variant 2 keeps only groups with strictly more members than this
pub const AGGREGATE_MIN_GROUP_SIZE: u64 = 5;

/// Flattened patient record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    /// Identifier assigned by the backend at insert time
    ///
    /// Records loaded from input files carry `0` until inserted.
    pub patient_id: i64,

    // Demographics
    pub sex: i64,
    pub age: f64,
    pub education: i64,
    pub income: i64,

    // Health status
    pub gen_health: i64,
    pub ment_health_days: i64,
    pub phys_health_days: i64,
    pub difficulty_walking: bool,

    // Lifestyle
    pub physical_activity: bool,
    pub smoker: bool,
    pub fruits: bool,
    pub veggies: bool,

    // Diseases
    pub heart_disease: bool,
    pub stroke: bool,
    pub diabetes: bool,
    pub high_blood_pressure: bool,
    pub high_cholesterol: bool,
}

impl PatientRecord {
    /// Builder-style: set the identifier
    #[must_use]
    pub fn with_id(mut self, patient_id: i64) -> Self {
        self.patient_id = patient_id;
        self
    }

    /// Compare every field except `patient_id`
    pub fn same_values(&self, other: &PatientRecord) -> bool {
        self.clone().with_id(0) == other.clone().with_id(0)
    }

    /// Convert into the nested document shape
    pub fn to_document(&self) -> PatientDocument {
        PatientDocument::from(self.clone())
    }
}

impl Default for PatientRecord {
    fn default() -> Self {
        Self {
            patient_id: 0,
            sex: 0,
            age: 0.0,
            education: 0,
            income: 0,
            gen_health: 0,
            ment_health_days: 0,
            phys_health_days: 0,
            difficulty_walking: false,
            physical_activity: false,
            smoker: false,
            fruits: false,
            veggies: false,
            heart_disease: false,
            stroke: false,
            diabetes: false,
            high_blood_pressure: false,
            high_cholesterol: false,
        }
    }
}

/// Nested patient document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientDocument {
    pub patient_id: i64,
    pub demographics: Demographics,
    pub health_status: HealthStatus,
    pub lifestyle: Lifestyle,
    pub diseases: Diseases,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    pub sex: i64,
    pub age: f64,
    pub education: i64,
    pub income: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub gen_health: i64,
    pub ment_health_days: i64,
    pub phys_health_days: i64,
    pub difficulty_walking: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lifestyle {
    pub physical_activity: bool,
    pub smoker: bool,
    pub fruits: bool,
    pub veggies: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diseases {
    pub heart_disease: bool,
    pub stroke: bool,
    pub diabetes: bool,
    pub high_blood_pressure: bool,
    pub high_cholesterol: bool,
}

impl From<PatientRecord> for PatientDocument {
    fn from(r: PatientRecord) -> Self {
        Self {
            patient_id: r.patient_id,
            demographics: Demographics {
                sex: r.sex,
                age: r.age,
                education: r.education,
                income: r.income,
            },
            health_status: HealthStatus {
                gen_health: r.gen_health,
                ment_health_days: r.ment_health_days,
                phys_health_days: r.phys_health_days,
                difficulty_walking: r.difficulty_walking,
            },
            lifestyle: Lifestyle {
                physical_activity: r.physical_activity,
                smoker: r.smoker,
                fruits: r.fruits,
                veggies: r.veggies,
            },
            diseases: Diseases {
                heart_disease: r.heart_disease,
                stroke: r.stroke,
                diabetes: r.diabetes,
                high_blood_pressure: r.high_blood_pressure,
                high_cholesterol: r.high_cholesterol,
            },
        }
    }
}

impl From<PatientDocument> for PatientRecord {
    fn from(d: PatientDocument) -> Self {
        Self {
            patient_id: d.patient_id,
            sex: d.demographics.sex,
            age: d.demographics.age,
            education: d.demographics.education,
            income: d.demographics.income,
            gen_health: d.health_status.gen_health,
            ment_health_days: d.health_status.ment_health_days,
            phys_health_days: d.health_status.phys_health_days,
            difficulty_walking: d.health_status.difficulty_walking,
            physical_activity: d.lifestyle.physical_activity,
            smoker: d.lifestyle.smoker,
            fruits: d.lifestyle.fruits,
            veggies: d.lifestyle.veggies,
            heart_disease: d.diseases.heart_disease,
            stroke: d.diseases.stroke,
            diabetes: d.diseases.diabetes,
            high_blood_pressure: d.diseases.high_blood_pressure,
            high_cholesterol: d.diseases.high_cholesterol,
        }
    }
}

/// One row of an aggregate query result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EducationGroup {
    pub education: i64,

    /// Only computed by aggregate variant 1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_age: Option<f64>,

    pub average_income: f64,
    pub patient_count: u64,
}

/// Sort groups by average income descending, education ascending on ties
///
/// Drivers push ordering into the backend query; this is the reference order
/// they must agree with.
pub fn sort_groups(groups: &mut [EducationGroup]) {
    groups.sort_by(|a, b| {
        b.average_income
            .total_cmp(&a.average_income)
            .then(a.education.cmp(&b.education))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PatientRecord {
        PatientRecord {
            patient_id: 7,
            sex: 1,
            age: 9.0,
            education: 4,
            income: 62_000,
            gen_health: 3,
            ment_health_days: 2,
            phys_health_days: 0,
            difficulty_walking: false,
            physical_activity: true,
            smoker: true,
            fruits: false,
            veggies: true,
            heart_disease: false,
            stroke: false,
            diabetes: true,
            high_blood_pressure: true,
            high_cholesterol: false,
        }
    }

    #[test]
    fn test_document_round_trip() {
        let record = sample();
        let doc = record.to_document();

        assert_eq!(doc.patient_id, 7);
        assert_eq!(doc.demographics.income, 62_000);
        assert!(doc.lifestyle.smoker);
        assert!(doc.diseases.high_blood_pressure);

        assert_eq!(PatientRecord::from(doc), record);
    }

    #[test]
    fn test_same_values_ignores_id() {
        let a = sample();
        let b = sample().with_id(99);
        assert!(a.same_values(&b));
        assert_ne!(a, b);

        let mut c = sample();
        c.income += INCOME_DELTA;
        assert!(!a.same_values(&c));
    }

    #[test]
    fn test_document_json_shape() {
        let json = serde_json::to_value(sample().to_document()).unwrap();
        assert_eq!(json["demographics"]["education"], 4);
        assert_eq!(json["health_status"]["gen_health"], 3);
        assert_eq!(json["diseases"]["diabetes"], true);
    }

    #[test]
    fn test_sort_groups_breaks_ties_by_education() {
        let group = |education, average_income| EducationGroup {
            education,
            average_age: None,
            average_income,
            patient_count: 10,
        };
        let mut groups = vec![group(3, 10.0), group(2, 30.0), group(1, 10.0), group(6, 20.0)];
        sort_groups(&mut groups);

        let order: Vec<i64> = groups.iter().map(|g| g.education).collect();
        assert_eq!(order, vec![2, 6, 1, 3]);
    }
}
