use async_trait::async_trait;
use chrono::Utc;
use flowgate_core::domain::ids::{SubjectId, TenantId};
use flowgate_core::errors::RepositoryError;
use flowgate_core::ports::ConversationLog;
use sqlx::Row;
use uuid::Uuid;

use super::{db_error, decode_error};
use crate::DbPool;

pub struct SqlConversationLog {
    pool: DbPool,
}

impl SqlConversationLog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Most recent first.
    pub async fn summaries_for(
        &self,
        tenant_id: &TenantId,
        subject_id: &SubjectId,
        limit: i64,
    ) -> Result<Vec<String>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT summary
            FROM conversation_summary
            WHERE tenant_id = ? AND subject_id = ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(&tenant_id.0)
        .bind(&subject_id.0)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(|row| row.try_get("summary").map_err(decode_error)).collect()
    }
}

#[async_trait]
impl ConversationLog for SqlConversationLog {
    async fn save_summary(
        &self,
        tenant_id: &TenantId,
        subject_id: &SubjectId,
        summary: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO conversation_summary (id, tenant_id, subject_id, summary, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(format!("CS-{}", Uuid::new_v4().simple()))
        .bind(&tenant_id.0)
        .bind(&subject_id.0)
        .bind(summary)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }
}
