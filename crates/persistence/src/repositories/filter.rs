//! Saved filter repository.

use domain::errors::StoreError;
use domain::models::{NewSavedFilter, SavedFilter};
use domain::store::FilterStore;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::FilterEntity;

/// Repository for owner-scoped saved filters.
#[derive(Clone)]
pub struct FilterRepository {
    pool: PgPool,
}

impl FilterRepository {
    /// Create a new repository instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl From<FilterEntity> for SavedFilter {
    fn from(entity: FilterEntity) -> Self {
        Self {
            id: entity.id,
            owner_id: entity.owner_id,
            name: entity.name,
            description: entity.description,
            conditions: entity.conditions,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

#[async_trait::async_trait]
impl FilterStore for FilterRepository {
    async fn create(&self, filter: NewSavedFilter) -> Result<SavedFilter, StoreError> {
        let entity = sqlx::query_as::<_, FilterEntity>(
            r#"
            INSERT INTO filters (owner_id, name, description, conditions)
            VALUES ($1, $2, $3, $4)
            RETURNING id, owner_id, name, description, conditions, created_at, updated_at
            "#,
        )
        .bind(filter.owner_id)
        .bind(&filter.name)
        .bind(&filter.description)
        .bind(&filter.conditions)
        .fetch_one(&self.pool)
        .await?;

        Ok(entity.into())
    }

    async fn find(&self, owner_id: Uuid, id: Uuid) -> Result<Option<SavedFilter>, StoreError> {
        let entity = sqlx::query_as::<_, FilterEntity>(
            r#"
            SELECT id, owner_id, name, description, conditions, created_at, updated_at
            FROM filters
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entity.map(Into::into))
    }

    async fn list(&self, owner_id: Uuid) -> Result<Vec<SavedFilter>, StoreError> {
        let entities = sqlx::query_as::<_, FilterEntity>(
            r#"
            SELECT id, owner_id, name, description, conditions, created_at, updated_at
            FROM filters
            WHERE owner_id = $1
            ORDER BY name, id
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entities.into_iter().map(Into::into).collect())
    }

    async fn update(
        &self,
        owner_id: Uuid,
        id: Uuid,
        filter: NewSavedFilter,
    ) -> Result<Option<SavedFilter>, StoreError> {
        let entity = sqlx::query_as::<_, FilterEntity>(
            r#"
            UPDATE filters
            SET name = $3, description = $4, conditions = $5, updated_at = NOW()
            WHERE id = $1 AND owner_id = $2
            RETURNING id, owner_id, name, description, conditions, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .bind(&filter.name)
        .bind(&filter.description)
        .bind(&filter.conditions)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entity.map(Into::into))
    }

    async fn delete(&self, owner_id: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM filters WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
