use crate::error::{HustleXpError, HustleXpResult};
use crate::models::Proof;
use sqlx::PgExecutor;
use uuid::Uuid;

pub struct ProofRepository;

impl ProofRepository {
    pub async fn find<'e>(executor: impl PgExecutor<'e>, id: Uuid) -> HustleXpResult<Proof> {
        sqlx::query_as::<_, Proof>("SELECT * FROM proofs WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| HustleXpError::not_found(format!("proof {id} not found")))
    }

    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        task_id: Uuid,
        submitter_id: Uuid,
        description: Option<&str>,
        media: Option<serde_json::Value>,
    ) -> HustleXpResult<Proof> {
        let row = sqlx::query_as::<_, Proof>(
            "INSERT INTO proofs (task_id, submitter_id, description, media)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(task_id)
        .bind(submitter_id)
        .bind(description)
        .bind(media)
        .fetch_one(executor)
        .await?;
        Ok(row)
    }

    pub async fn set_state<'e>(
        executor: impl PgExecutor<'e>,
        id: Uuid,
        state: crate::models::ProofState,
    ) -> HustleXpResult<Proof> {
        let row = sqlx::query_as::<_, Proof>(
            "UPDATE proofs SET state = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(state)
        .fetch_one(executor)
        .await?;
        Ok(row)
    }
}
