use async_trait::async_trait;
use chrono::Utc;
use flowgate_core::domain::definition::StoredFlowDefinition;
use flowgate_core::domain::ids::{FlowId, TenantId};
use flowgate_core::errors::RepositoryError;
use flowgate_core::ports::DefinitionRepository;
use sqlx::{sqlite::SqliteRow, Row};

use super::{db_error, decode_error, parse_timestamp};
use crate::DbPool;

pub struct SqlDefinitionRepository {
    pool: DbPool,
}

impl SqlDefinitionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn list_for_tenant(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<StoredFlowDefinition>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT tenant_id, flow_id, screen_graph_json, navigation_json, description, updated_at
            FROM flow_definition
            WHERE tenant_id = ?
            ORDER BY flow_id
            "#,
        )
        .bind(&tenant_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(definition_from_row).collect()
    }
}

#[async_trait]
impl DefinitionRepository for SqlDefinitionRepository {
    async fn get_flow_definition(
        &self,
        tenant_id: &TenantId,
        flow_id: &FlowId,
    ) -> Result<Option<StoredFlowDefinition>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT tenant_id, flow_id, screen_graph_json, navigation_json, description, updated_at
            FROM flow_definition
            WHERE tenant_id = ? AND flow_id = ?
            "#,
        )
        .bind(&tenant_id.0)
        .bind(&flow_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(|r| definition_from_row(&r)).transpose()
    }

    async fn save_flow_definition(
        &self,
        definition: StoredFlowDefinition,
    ) -> Result<(), RepositoryError> {
        let created_at = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO flow_definition (
                tenant_id, flow_id, screen_graph_json, navigation_json, description,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (tenant_id, flow_id) DO UPDATE SET
                screen_graph_json = excluded.screen_graph_json,
                navigation_json = excluded.navigation_json,
                description = excluded.description,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&definition.tenant_id.0)
        .bind(&definition.flow_id.0)
        .bind(&definition.screen_graph_json)
        .bind(&definition.navigation_json)
        .bind(&definition.description)
        .bind(created_at)
        .bind(definition.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }
}

fn definition_from_row(row: &SqliteRow) -> Result<StoredFlowDefinition, RepositoryError> {
    let tenant_id: String = row.try_get("tenant_id").map_err(decode_error)?;
    let flow_id: String = row.try_get("flow_id").map_err(decode_error)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_error)?;

    Ok(StoredFlowDefinition {
        tenant_id: TenantId(tenant_id),
        flow_id: FlowId(flow_id),
        screen_graph_json: row.try_get("screen_graph_json").map_err(decode_error)?,
        navigation_json: row.try_get("navigation_json").map_err(decode_error)?,
        description: row.try_get("description").map_err(decode_error)?,
        updated_at: parse_timestamp("updated_at", updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use flowgate_core::domain::definition::StoredFlowDefinition;
    use flowgate_core::domain::ids::{FlowId, TenantId};
    use flowgate_core::ports::DefinitionRepository;

    use super::SqlDefinitionRepository;
    use crate::repositories::test_support::setup_pool;

    fn definition(screens: &str) -> StoredFlowDefinition {
        StoredFlowDefinition {
            tenant_id: TenantId("acme".to_string()),
            flow_id: FlowId("onboarding".to_string()),
            screen_graph_json: screens.to_string(),
            navigation_json: r#"{"opcion_a": {"pantalla": "A", "valor": "A"}}"#.to_string(),
            description: "Onboarding".to_string(),
            updated_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn sql_definition_repo_round_trip_and_upsert() {
        let repo = SqlDefinitionRepository::new(setup_pool().await);
        let first = definition(r#"{"routing_model": {"A": []}}"#);

        repo.save_flow_definition(first.clone()).await.expect("save definition");
        let found = repo
            .get_flow_definition(&first.tenant_id, &first.flow_id)
            .await
            .expect("get definition");
        assert_eq!(found, Some(first.clone()));

        let second = definition(r#"{"routing_model": {"A": ["B"], "B": []}}"#);
        repo.save_flow_definition(second.clone()).await.expect("upsert definition");
        let listed = repo.list_for_tenant(&first.tenant_id).await.expect("list definitions");

        assert_eq!(listed, vec![second]);
    }

    #[tokio::test]
    async fn sql_definition_repo_is_scoped_by_tenant() {
        let repo = SqlDefinitionRepository::new(setup_pool().await);
        repo.save_flow_definition(definition(r#"{"routing_model": {"A": []}}"#))
            .await
            .expect("save definition");

        let other = repo
            .get_flow_definition(&TenantId("globex".to_string()), &FlowId("onboarding".to_string()))
            .await
            .expect("get definition");

        assert_eq!(other, None);
    }
}
