//! Checkpoint persistence
//!
//! Only the long-lived parts of a session (profile and memory) survive a turn.
//! In-memory for development, Postgres when a database URL is configured.

use crate::error::FinBriefError;
use crate::memory::ConversationMemory;
use crate::models::Profile;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    pub profile: Profile,
    pub memory: ConversationMemory,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(profile: Profile, memory: ConversationMemory) -> Self {
        Self {
            profile,
            memory,
            updated_at: Utc::now(),
        }
    }
}

/// Opaque key-value persistence keyed by session id
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Option<Checkpoint>>;
    async fn save(&self, session_id: &str, checkpoint: &Checkpoint) -> Result<()>;
}

/// In-memory checkpoint store for development and tests
pub struct InMemoryCheckpointStore {
    checkpoints: Arc<RwLock<HashMap<String, Checkpoint>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self {
            checkpoints: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryCheckpointStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn load(&self, session_id: &str) -> Result<Option<Checkpoint>> {
        let checkpoints = self.checkpoints.read().await;
        Ok(checkpoints.get(session_id).cloned())
    }

    async fn save(&self, session_id: &str, checkpoint: &Checkpoint) -> Result<()> {
        let mut checkpoints = self.checkpoints.write().await;
        checkpoints.insert(session_id.to_string(), checkpoint.clone());
        Ok(())
    }
}

/// Postgres-backed store. One row per session; the checkpoint is JSON text.
pub struct PostgresCheckpointStore {
    pool: PgPool,
    schema_ready: Arc<OnceCell<()>>,
}

impl PostgresCheckpointStore {
    /// Lazily connecting pool; the schema is created on first use.
    pub fn connect_lazy(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(database_url)
            .map_err(|e| FinBriefError::Database(format!("Invalid database URL: {}", e)))?;

        Ok(Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        })
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS session_checkpoints (
                      session_id TEXT PRIMARY KEY,
                      payload TEXT NOT NULL,
                      updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                FinBriefError::Database(format!(
                    "Failed to initialize checkpoint schema: {}",
                    e
                ))
            })?;

        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for PostgresCheckpointStore {
    async fn load(&self, session_id: &str) -> Result<Option<Checkpoint>> {
        self.ensure_schema().await?;

        let row = sqlx::query("SELECT payload FROM session_checkpoints WHERE session_id = $1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| FinBriefError::Database(format!("Failed to load checkpoint: {}", e)))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let payload: String = row
            .try_get("payload")
            .map_err(|e| FinBriefError::Database(format!("Malformed checkpoint row: {}", e)))?;

        serde_json::from_str(&payload)
            .map(Some)
            .map_err(|e| FinBriefError::Checkpoint(format!("Undecodable checkpoint: {}", e)))
    }

    async fn save(&self, session_id: &str, checkpoint: &Checkpoint) -> Result<()> {
        self.ensure_schema().await?;

        let payload = serde_json::to_string(checkpoint)?;

        sqlx::query(
            r#"
            INSERT INTO session_checkpoints (session_id, payload, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (session_id)
            DO UPDATE SET payload = EXCLUDED.payload, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(session_id)
        .bind(payload)
        .bind(checkpoint.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| FinBriefError::Database(format!("Failed to save checkpoint: {}", e)))?;

        Ok(())
    }
}

/// Postgres when a URL is given and usable, otherwise in-memory
pub fn build_checkpoint_store(database_url: Option<&str>) -> Arc<dyn CheckpointStore> {
    if let Some(url) = database_url {
        match PostgresCheckpointStore::connect_lazy(url) {
            Ok(store) => {
                info!("Checkpoint backend: postgres");
                return Arc::new(store);
            }
            Err(error) => {
                warn!(
                    "Failed to initialize postgres checkpoint backend, falling back to in-memory: {}",
                    error
                );
            }
        }
    }

    info!("Checkpoint backend: in-memory");
    Arc::new(InMemoryCheckpointStore::new())
}
