use std::collections::HashMap;

use sqlx::Row;

use tally_core::domain::bundle::{Bundle, BundleId};
use tally_core::domain::product::ProductId;

use super::{decimal_column, BundleRepository, RepositoryError};
use crate::DbPool;

pub struct SqlBundleRepository {
    pool: DbPool,
}

impl SqlBundleRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn join_rows(&self, table: &str) -> Result<HashMap<String, Vec<ProductId>>, RepositoryError> {
        let rows = sqlx::query(&format!("SELECT bundle_id, product_id FROM {table}"))
            .fetch_all(&self.pool)
            .await?;

        let mut grouped: HashMap<String, Vec<ProductId>> = HashMap::new();
        for row in rows {
            let bundle_id: String = row.try_get("bundle_id")?;
            grouped.entry(bundle_id).or_default().push(ProductId(row.try_get("product_id")?));
        }
        Ok(grouped)
    }
}

#[async_trait::async_trait]
impl BundleRepository for SqlBundleRepository {
    async fn list_active(&self) -> Result<Vec<Bundle>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, discount_percentage FROM bundles WHERE is_active = 1 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut members = self.join_rows("bundle_member_products").await?;
        let mut suggested = self.join_rows("bundle_suggested_products").await?;

        rows.iter()
            .map(|row| {
                let id: String = row.try_get("id")?;
                Ok(Bundle {
                    name: row.try_get("name")?,
                    discount_percentage: decimal_column(row, "discount_percentage")?,
                    is_active: true,
                    member_product_ids: members.remove(&id).unwrap_or_default(),
                    suggested_product_ids: suggested.remove(&id).unwrap_or_default(),
                    id: BundleId(id),
                })
            })
            .collect()
    }

    async fn save(&self, bundle: Bundle) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO bundles (id, name, discount_percentage, is_active) VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT (id) DO UPDATE SET \
               name = excluded.name, discount_percentage = excluded.discount_percentage, \
               is_active = excluded.is_active",
        )
        .bind(&bundle.id.0)
        .bind(&bundle.name)
        .bind(bundle.discount_percentage.to_string())
        .bind(bundle.is_active)
        .execute(&mut *tx)
        .await?;

        // Join rows are replaced wholesale; the bundle row is the source of
        // truth for membership.
        sqlx::query("DELETE FROM bundle_member_products WHERE bundle_id = ?1")
            .bind(&bundle.id.0)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM bundle_suggested_products WHERE bundle_id = ?1")
            .bind(&bundle.id.0)
            .execute(&mut *tx)
            .await?;

        for member in &bundle.member_product_ids {
            sqlx::query("INSERT INTO bundle_member_products (bundle_id, product_id) VALUES (?1, ?2)")
                .bind(&bundle.id.0)
                .bind(&member.0)
                .execute(&mut *tx)
                .await?;
        }
        for suggestion in &bundle.suggested_product_ids {
            sqlx::query(
                "INSERT INTO bundle_suggested_products (bundle_id, product_id) VALUES (?1, ?2)",
            )
            .bind(&bundle.id.0)
            .bind(&suggestion.0)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use tally_core::domain::bundle::{Bundle, BundleId};
    use tally_core::domain::product::ProductId;

    use crate::connect_with_settings;
    use crate::migrations::run_pending;
    use crate::repositories::{BundleRepository, SqlBundleRepository};

    fn bundle(id: &str, active: bool) -> Bundle {
        Bundle {
            id: BundleId(id.to_string()),
            name: format!("Bundle {id}"),
            discount_percentage: Decimal::from(15),
            is_active: active,
            member_product_ids: vec![
                ProductId("hub".to_string()),
                ProductId("sensor".to_string()),
            ],
            suggested_product_ids: vec![ProductId("doorbell".to_string())],
        }
    }

    #[tokio::test]
    async fn save_and_list_round_trip_includes_both_relations() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrations");
        let repo = SqlBundleRepository::new(pool);

        repo.save(bundle("starter", true)).await.expect("save");

        let bundles = repo.list_active().await.expect("list");
        assert_eq!(bundles.len(), 1);
        assert_eq!(bundles[0].member_product_ids.len(), 2);
        assert_eq!(bundles[0].suggested_product_ids, vec![ProductId("doorbell".to_string())]);
    }

    #[tokio::test]
    async fn inactive_bundles_are_not_listed() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrations");
        let repo = SqlBundleRepository::new(pool);

        repo.save(bundle("retired", false)).await.expect("save");
        assert!(repo.list_active().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn resaving_replaces_membership() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrations");
        let repo = SqlBundleRepository::new(pool);

        repo.save(bundle("starter", true)).await.expect("save");

        let mut trimmed = bundle("starter", true);
        trimmed.member_product_ids = vec![ProductId("hub".to_string())];
        repo.save(trimmed).await.expect("resave");

        let bundles = repo.list_active().await.expect("list");
        assert_eq!(bundles[0].member_product_ids, vec![ProductId("hub".to_string())]);
    }
}
