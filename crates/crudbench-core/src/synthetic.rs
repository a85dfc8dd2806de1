//! Reproducible synthetic patient populations
//!
//! Used when no input files are configured and by the contract tests. The
//! same `(count, seed)` always yields the same population.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::patient::PatientRecord;

/// Default seed for generated populations
pub const DEFAULT_SEED: u64 = 42;

/// Generate `count` patients
///
/// Incomes span 15 000 - 150 000 so aggregate variant 2's threshold splits
/// the population; education covers the six survey levels.
pub fn synthetic_patients(count: usize, seed: u64) -> Vec<PatientRecord> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|_| PatientRecord {
            patient_id: 0,
            sex: rng.random_range(0..=1),
            age: f64::from(rng.random_range(1u8..=13)),
            education: rng.random_range(1..=6),
            income: rng.random_range(15_000..=150_000),
            gen_health: rng.random_range(1..=5),
            ment_health_days: rng.random_range(0..=30),
            phys_health_days: rng.random_range(0..=30),
            difficulty_walking: rng.random_bool(0.17),
            physical_activity: rng.random_bool(0.75),
            smoker: rng.random_bool(0.44),
            fruits: rng.random_bool(0.63),
            veggies: rng.random_bool(0.81),
            heart_disease: rng.random_bool(0.09),
            stroke: rng.random_bool(0.04),
            diabetes: rng.random_bool(0.15),
            high_blood_pressure: rng.random_bool(0.43),
            high_cholesterol: rng.random_bool(0.42),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_population() {
        assert_eq!(synthetic_patients(50, 7), synthetic_patients(50, 7));
        assert_ne!(synthetic_patients(50, 7), synthetic_patients(50, 8));
    }

    #[test]
    fn test_values_in_survey_ranges() {
        for p in synthetic_patients(500, DEFAULT_SEED) {
            assert_eq!(p.patient_id, 0);
            assert!((1..=6).contains(&p.education));
            assert!((15_000..=150_000).contains(&p.income));
            assert!((1.0..=13.0).contains(&p.age));
            assert!((0..=30).contains(&p.ment_health_days));
        }
    }

    #[test]
    fn test_population_exercises_aggregate_filters() {
        let patients = synthetic_patients(1_000, DEFAULT_SEED);
        assert!(patients
            .iter()
            .any(|p| p.high_blood_pressure && p.high_cholesterol));
        assert!(patients.iter().any(|p| p.income > 50_000));
        assert!(patients.iter().any(|p| p.income <= 50_000));
    }
}
