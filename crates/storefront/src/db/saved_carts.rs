//! Durable cart documents for logged-in users.

use sqlx::PgPool;

use shopfront_core::UserId;

use super::RepositoryError;

/// Repository for `storefront.saved_cart`.
pub struct SavedCartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SavedCartRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All documents stored for `user_id`, as `(cart_key, document)` pairs.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn entries(&self, user_id: UserId) -> Result<Vec<(String, String)>, RepositoryError> {
        let rows = sqlx::query_as::<_, (String, String)>(
            r"
            SELECT cart_key, document
            FROM storefront.saved_cart
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Insert or replace one document.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(
        &self,
        user_id: UserId,
        cart_key: &str,
        document: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO storefront.saved_cart (user_id, cart_key, document)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, cart_key)
            DO UPDATE SET document = EXCLUDED.document, updated_at = NOW()
            ",
        )
        .bind(user_id)
        .bind(cart_key)
        .bind(document)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Delete one document. Deleting a missing document is not an error.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, user_id: UserId, cart_key: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM storefront.saved_cart WHERE user_id = $1 AND cart_key = $2")
            .bind(user_id)
            .bind(cart_key)
            .execute(self.pool)
            .await?;

        Ok(())
    }
}
