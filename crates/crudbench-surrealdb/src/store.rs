//! Document PatientStore
//!
//! One nested document per patient in the `patient` table. The business key
//! `patient_id` is a plain field with a unique index; SurrealDB assigns its
//! own record ids, which are never read back.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use surrealdb::engine::any::Any;
use surrealdb::method::Query;
use tracing::debug;

use crudbench_core::{
    EducationGroup, PatientDocument, PatientRecord, PatientStore, StoreResult,
    AGGREGATE_INCOME_THRESHOLD, AGGREGATE_MIN_GROUP_SIZE,
};

use crate::client::SurrealClient;
use crate::error::{DbError, DbResult};

/// Backend name reported in results
pub const BACKEND_NAME: &str = "surrealdb";

const DOCUMENT_FIELDS: &str = "patient_id, demographics, health_status, lifestyle, diseases";

const MAX_ID: &str = "SELECT patient_id FROM patient ORDER BY patient_id DESC LIMIT 1";

const SAMPLE_IDS: &str = "SELECT VALUE patient_id FROM patient ORDER BY rand() LIMIT $n";

const AGGREGATE_VARIANT_1: &str = "
    SELECT education,
           <float> average_age AS average_age,
           <float> average_income AS average_income,
           patient_count
    FROM (
        SELECT demographics.education AS education,
               math::mean(demographics.age) AS average_age,
               math::mean(demographics.income) AS average_income,
               count() AS patient_count
        FROM patient
        WHERE diseases.high_blood_pressure = true AND diseases.high_cholesterol = true
        GROUP BY education
    )
    ORDER BY average_income DESC, education ASC
    LIMIT $limit";

const AGGREGATE_VARIANT_2: &str = "
    LET $population_mean = math::mean((SELECT VALUE demographics.income FROM patient));
    SELECT education,
           <float> average_income AS average_income,
           patient_count
    FROM (
        SELECT demographics.education AS education,
               math::mean(demographics.income) AS average_income,
               count() AS patient_count
        FROM patient
        WHERE demographics.income > $population_mean
        GROUP BY education
    )
    WHERE patient_count > $min_group AND average_income > $threshold
    ORDER BY average_income DESC, education ASC
    LIMIT $limit";

#[derive(Debug, Deserialize)]
struct CountRow {
    total: u64,
}

#[derive(Debug, Deserialize)]
struct IdRow {
    patient_id: i64,
}

/// SurrealDB implementation of [`PatientStore`]
#[derive(Clone, Debug)]
pub struct SurrealPatientStore {
    client: SurrealClient,
}

impl SurrealPatientStore {
    pub fn new(client: SurrealClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &SurrealClient {
        &self.client
    }

    /// Execute `query` and decode the rows of statement `index`
    async fn fetch<T>(&self, query: Query<'_, Any>, index: usize, what: &str) -> DbResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let mut response = query
            .await
            .map_err(|e| DbError::Query(format!("{} failed: {}", what, e)))?
            .check()
            .map_err(|e| DbError::Query(format!("{} returned error: {}", what, e)))?;
        response
            .take::<Vec<T>>(index)
            .map_err(|e| DbError::Decode(format!("{} result: {}", what, e)))
    }

    async fn current_max_id(&self) -> DbResult<i64> {
        let rows: Vec<IdRow> = self.fetch(self.client.db().query(MAX_ID), 0, "max id").await?;
        Ok(rows.first().map(|r| r.patient_id).unwrap_or(0))
    }

    async fn sample_ids(&self, sample_size: usize) -> DbResult<Vec<i64>> {
        self.fetch(
            self.client
                .db()
                .query(SAMPLE_IDS)
                .bind(("n", sample_size as u64)),
            0,
            "sample",
        )
        .await
    }

    async fn run(&self, query: Query<'_, Any>, what: &str) -> DbResult<()> {
        query
            .await
            .map_err(|e| DbError::Query(format!("{} failed: {}", what, e)))?
            .check()
            .map_err(|e| DbError::Query(format!("{} returned error: {}", what, e)))?;
        Ok(())
    }
}

#[async_trait]
impl PatientStore for SurrealPatientStore {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    async fn max_patient_id(&self) -> StoreResult<i64> {
        Ok(self.current_max_id().await?)
    }

    async fn count(&self) -> StoreResult<u64> {
        let rows: Vec<CountRow> = self
            .fetch(
                self.client
                    .db()
                    .query("SELECT count() AS total FROM patient GROUP ALL"),
                0,
                "count",
            )
            .await?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }

    async fn insert(&self, records: Arc<[PatientRecord]>, count: usize) -> StoreResult<Vec<i64>> {
        let batch = &records[..count.min(records.len())];
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let start = self.current_max_id().await? + 1;
        let ids: Vec<i64> = (start..start + batch.len() as i64).collect();
        let documents: Vec<PatientDocument> = batch
            .iter()
            .zip(&ids)
            .map(|(record, id)| record.clone().with_id(*id).to_document())
            .collect();

        self.run(
            self.client
                .db()
                .query("INSERT INTO patient $documents RETURN NONE")
                .bind(("documents", documents)),
            "insert",
        )
        .await?;
        debug!(inserted = ids.len(), first_id = start, "Inserted patient documents");
        Ok(ids)
    }

    async fn read(&self, limit: usize) -> StoreResult<Vec<PatientRecord>> {
        let documents: Vec<PatientDocument> = self
            .fetch(
                self.client
                    .db()
                    .query(format!(
                        "SELECT {} FROM patient ORDER BY patient_id ASC LIMIT $limit",
                        DOCUMENT_FIELDS
                    ))
                    .bind(("limit", limit as u64)),
                0,
                "read",
            )
            .await?;
        Ok(documents.into_iter().map(PatientRecord::from).collect())
    }

    async fn get(&self, patient_id: i64) -> StoreResult<Option<PatientRecord>> {
        let documents: Vec<PatientDocument> = self
            .fetch(
                self.client
                    .db()
                    .query(format!(
                        "SELECT {} FROM patient WHERE patient_id = $id LIMIT 1",
                        DOCUMENT_FIELDS
                    ))
                    .bind(("id", patient_id)),
                0,
                "get",
            )
            .await?;
        Ok(documents.into_iter().next().map(PatientRecord::from))
    }

    async fn update(&self, sample_size: usize, delta: i64) -> StoreResult<Vec<i64>> {
        let ids = self.sample_ids(sample_size).await?;
        if ids.is_empty() {
            return Ok(ids);
        }
        self.run(
            self.client
                .db()
                .query(
                    "UPDATE patient SET demographics.income += $delta \
                     WHERE patient_id IN $ids RETURN NONE",
                )
                .bind(("delta", delta))
                .bind(("ids", ids.clone())),
            "update",
        )
        .await?;
        Ok(ids)
    }

    async fn delete(&self, sample_size: usize) -> StoreResult<Vec<i64>> {
        let ids = self.sample_ids(sample_size).await?;
        if ids.is_empty() {
            return Ok(ids);
        }
        self.run(
            self.client
                .db()
                .query("DELETE patient WHERE patient_id IN $ids RETURN NONE")
                .bind(("ids", ids.clone())),
            "delete",
        )
        .await?;
        Ok(ids)
    }

    async fn aggregate_variant_1(&self, limit: usize) -> StoreResult<Vec<EducationGroup>> {
        Ok(self
            .fetch(
                self.client
                    .db()
                    .query(AGGREGATE_VARIANT_1)
                    .bind(("limit", limit as u64)),
                0,
                "aggregate variant 1",
            )
            .await?)
    }

    async fn aggregate_variant_2(&self, limit: usize) -> StoreResult<Vec<EducationGroup>> {
        // Statement 0 is the LET
        Ok(self
            .fetch(
                self.client
                    .db()
                    .query(AGGREGATE_VARIANT_2)
                    .bind(("limit", limit as u64))
                    .bind(("min_group", AGGREGATE_MIN_GROUP_SIZE))
                    .bind(("threshold", AGGREGATE_INCOME_THRESHOLD)),
                1,
                "aggregate variant 2",
            )
            .await?)
    }

    async fn reset(&self) -> StoreResult<()> {
        self.run(self.client.db().query("DELETE patient RETURN NONE"), "reset")
            .await?;
        debug!("Cleared patient table");
        Ok(())
    }
}
