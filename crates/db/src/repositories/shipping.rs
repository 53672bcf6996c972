use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use tally_core::domain::shipping::{ShippingKind, ShippingMethod, ShippingMethodId};

use super::{
    decimal_column, optional_decimal_column, optional_u32_column, u32_column,
    RepositoryError, ShippingMethodRepository,
};
use crate::DbPool;

pub struct SqlShippingMethodRepository {
    pool: DbPool,
}

impl SqlShippingMethodRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode_method(row: &SqliteRow) -> Result<ShippingMethod, RepositoryError> {
    let kind_raw: String = row.try_get("kind")?;
    let kind = ShippingKind::parse(&kind_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown shipping kind `{kind_raw}`")))?;

    Ok(ShippingMethod {
        id: ShippingMethodId(row.try_get("id")?),
        kind,
        min_order_amount: decimal_column(row, "min_order_amount")?,
        max_order_amount: optional_decimal_column(row, "max_order_amount")?,
        shipping_cost: decimal_column(row, "shipping_cost")?,
        free_shipping_threshold: optional_decimal_column(row, "free_shipping_threshold")?,
        estimated_days: optional_u32_column(row, "estimated_days")?,
        is_active: row.try_get("is_active")?,
        position: u32_column(row, "position")?,
    })
}

#[async_trait::async_trait]
impl ShippingMethodRepository for SqlShippingMethodRepository {
    async fn list_active(&self) -> Result<Vec<ShippingMethod>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, kind, min_order_amount, max_order_amount, shipping_cost, \
                    free_shipping_threshold, estimated_days, is_active, position \
             FROM shipping_methods WHERE is_active = 1 ORDER BY position, id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode_method).collect()
    }

    async fn save(&self, method: ShippingMethod) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO shipping_methods \
             (id, kind, min_order_amount, max_order_amount, shipping_cost, \
              free_shipping_threshold, estimated_days, is_active, position) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
             ON CONFLICT (id) DO UPDATE SET \
               kind = excluded.kind, min_order_amount = excluded.min_order_amount, \
               max_order_amount = excluded.max_order_amount, shipping_cost = excluded.shipping_cost, \
               free_shipping_threshold = excluded.free_shipping_threshold, \
               estimated_days = excluded.estimated_days, is_active = excluded.is_active, \
               position = excluded.position",
        )
        .bind(&method.id.0)
        .bind(method.kind.as_str())
        .bind(method.min_order_amount.to_string())
        .bind(method.max_order_amount.map(|max| max.to_string()))
        .bind(method.shipping_cost.to_string())
        .bind(method.free_shipping_threshold.map(|threshold| threshold.to_string()))
        .bind(method.estimated_days.map(i64::from))
        .bind(method.is_active)
        .bind(i64::from(method.position))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
