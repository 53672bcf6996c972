use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Tables the pricing paths read from. Used by readiness checks to tell a
/// reachable-but-unmigrated database apart from a ready one.
const PRICING_TABLES: &[&str] = &["products", "bundles", "coupons", "shipping_methods"];

/// Apply pending migrations and return how many were applied this run.
pub async fn run_pending(pool: &DbPool) -> Result<usize, MigrateError> {
    let before = applied_count(pool).await;
    MIGRATOR.run(pool).await?;
    Ok(applied_count(pool).await.saturating_sub(before))
}

/// Rows in sqlx's bookkeeping table; zero when the table does not exist yet.
async fn applied_count(pool: &DbPool) -> usize {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(1) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .map_or(0, |count| count as usize)
}

/// Pricing tables absent from the connected database, in declaration order.
/// Read-only; never applies anything.
pub async fn missing_pricing_tables(pool: &DbPool) -> Result<Vec<&'static str>, sqlx::Error> {
    let mut missing = Vec::new();
    for table in PRICING_TABLES {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        )
        .bind(table)
        .fetch_one(pool)
        .await?;
        if count == 0 {
            missing.push(*table);
        }
    }
    Ok(missing)
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::connect_with_settings;

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &[
        "categories",
        "products",
        "customers",
        "cart_items",
        "cart_bundle_items",
        "bundles",
        "bundle_member_products",
        "bundle_suggested_products",
        "coupons",
        "coupon_products",
        "coupon_categories",
        "coupon_usages",
        "shipping_methods",
        "idx_products_status",
        "idx_products_category_id",
        "idx_cart_bundle_items_customer_id",
        "idx_cart_bundle_items_bundle_id",
        "idx_coupons_code",
        "idx_coupon_usages_coupon_customer",
        "idx_shipping_methods_position",
    ];

    #[tokio::test]
    async fn migrations_create_every_managed_object() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for object in MANAGED_SCHEMA_OBJECTS {
            let count = sqlx::query(
                "SELECT COUNT(*) AS count FROM sqlite_master WHERE name = ?1 AND type IN ('table', 'index')",
            )
            .bind(object)
            .fetch_one(&pool)
            .await
            .expect("query sqlite_master")
            .get::<i64, _>("count");

            assert_eq!(count, 1, "schema object `{object}` should exist");
        }
    }

    #[tokio::test]
    async fn missing_tables_are_reported_before_migration_and_empty_after() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");

        let missing = super::missing_pricing_tables(&pool).await.expect("inspect");
        assert_eq!(missing, vec!["products", "bundles", "coupons", "shipping_methods"]);

        run_pending(&pool).await.expect("run migrations");
        assert!(super::missing_pricing_tables(&pool).await.expect("inspect").is_empty());
    }

    #[tokio::test]
    async fn migrations_are_idempotent_and_report_applied_counts() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");

        let applied = run_pending(&pool).await.expect("first run");
        assert!(applied >= 1);

        let reapplied = run_pending(&pool).await.expect("second run is a no-op");
        assert_eq!(reapplied, 0);
    }
}
