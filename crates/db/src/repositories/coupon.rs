use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use tally_core::domain::coupon::{Coupon, CouponAudience, CouponDiscount, CouponId, CouponUsage};
use tally_core::domain::customer::CustomerId;
use tally_core::domain::product::{CategoryId, ProductId};

use super::{
    decimal_column, optional_decimal_column, optional_u32_column, u32_column, CouponRepository,
    RepositoryError,
};
use crate::DbPool;

pub struct SqlCouponRepository {
    pool: DbPool,
}

impl SqlCouponRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn discount_parts(discount: &CouponDiscount) -> (&'static str, String, Option<String>) {
    match discount {
        CouponDiscount::Percentage { value, max_discount } => {
            ("percentage", value.to_string(), max_discount.map(|cap| cap.to_string()))
        }
        CouponDiscount::Fixed { value } => ("fixed", value.to_string(), None),
        CouponDiscount::ShippingWaiver { value } => ("shipping", value.to_string(), None),
    }
}

fn decode_discount(row: &SqliteRow) -> Result<CouponDiscount, RepositoryError> {
    let kind: String = row.try_get("kind")?;
    let value = decimal_column(row, "value")?;
    match kind.as_str() {
        "percentage" => Ok(CouponDiscount::Percentage {
            value,
            max_discount: optional_decimal_column(row, "max_discount")?,
        }),
        "fixed" => Ok(CouponDiscount::Fixed { value }),
        "shipping" => Ok(CouponDiscount::ShippingWaiver { value }),
        other => Err(RepositoryError::Decode(format!("unknown coupon kind `{other}`"))),
    }
}

fn decode_coupon(
    row: &SqliteRow,
    product_ids: HashSet<ProductId>,
    category_ids: HashSet<CategoryId>,
) -> Result<Coupon, RepositoryError> {
    let audience_raw: String = row.try_get("audience")?;
    let audience = CouponAudience::parse(&audience_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown coupon audience `{audience_raw}`"))
    })?;

    Ok(Coupon {
        id: CouponId(row.try_get("id")?),
        code: row.try_get("code")?,
        discount: decode_discount(row)?,
        min_order_amount: decimal_column(row, "min_order_amount")?,
        usage_limit: optional_u32_column(row, "usage_limit")?,
        used_count: u32_column(row, "used_count")?,
        audience,
        new_user_days: u32_column(row, "new_user_days")?,
        valid_from: row.try_get::<DateTime<Utc>, _>("valid_from")?,
        valid_until: row.try_get::<Option<DateTime<Utc>>, _>("valid_until")?,
        is_active: row.try_get("is_active")?,
        product_ids,
        category_ids,
    })
}

#[async_trait::async_trait]
impl CouponRepository for SqlCouponRepository {
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
        let normalized = Coupon::normalize_code(code);

        let row = sqlx::query(
            "SELECT id, code, kind, value, max_discount, min_order_amount, usage_limit, \
                    used_count, audience, new_user_days, valid_from, valid_until, is_active \
             FROM coupons WHERE code = ?1",
        )
        .bind(&normalized)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let id: String = row.try_get("id")?;
        let product_rows = sqlx::query("SELECT product_id FROM coupon_products WHERE coupon_id = ?1")
            .bind(&id)
            .fetch_all(&self.pool)
            .await?;
        let category_rows =
            sqlx::query("SELECT category_id FROM coupon_categories WHERE coupon_id = ?1")
                .bind(&id)
                .fetch_all(&self.pool)
                .await?;

        let product_ids = product_rows
            .iter()
            .map(|row| Ok(ProductId(row.try_get("product_id")?)))
            .collect::<Result<HashSet<_>, RepositoryError>>()?;
        let category_ids = category_rows
            .iter()
            .map(|row| Ok(CategoryId(row.try_get("category_id")?)))
            .collect::<Result<HashSet<_>, RepositoryError>>()?;

        decode_coupon(&row, product_ids, category_ids).map(Some)
    }

    async fn has_usage(
        &self,
        coupon_id: &CouponId,
        customer_id: &CustomerId,
    ) -> Result<bool, RepositoryError> {
        let count = sqlx::query(
            "SELECT COUNT(*) AS count FROM coupon_usages WHERE coupon_id = ?1 AND customer_id = ?2",
        )
        .bind(&coupon_id.0)
        .bind(&customer_id.0)
        .fetch_one(&self.pool)
        .await?
        .get::<i64, _>("count");

        Ok(count > 0)
    }

    async fn record_usage(&self, usage: CouponUsage) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO coupon_usages (id, coupon_id, customer_id, order_id, discount_amount, used_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(&usage.coupon_id.0)
        .bind(&usage.customer_id.0)
        .bind(&usage.order_id)
        .bind(usage.discount_amount.to_string())
        .bind(usage.used_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE coupons SET used_count = used_count + 1 WHERE id = ?1")
            .bind(&usage.coupon_id.0)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn save(&self, coupon: Coupon) -> Result<(), RepositoryError> {
        let (kind, value, max_discount) = discount_parts(&coupon.discount);
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO coupons \
             (id, code, kind, value, max_discount, min_order_amount, usage_limit, used_count, \
              audience, new_user_days, valid_from, valid_until, is_active) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13) \
             ON CONFLICT (id) DO UPDATE SET \
               code = excluded.code, kind = excluded.kind, value = excluded.value, \
               max_discount = excluded.max_discount, min_order_amount = excluded.min_order_amount, \
               usage_limit = excluded.usage_limit, used_count = excluded.used_count, \
               audience = excluded.audience, new_user_days = excluded.new_user_days, \
               valid_from = excluded.valid_from, valid_until = excluded.valid_until, \
               is_active = excluded.is_active",
        )
        .bind(&coupon.id.0)
        .bind(Coupon::normalize_code(&coupon.code))
        .bind(kind)
        .bind(value)
        .bind(max_discount)
        .bind(coupon.min_order_amount.to_string())
        .bind(coupon.usage_limit.map(i64::from))
        .bind(i64::from(coupon.used_count))
        .bind(coupon.audience.as_str())
        .bind(i64::from(coupon.new_user_days))
        .bind(coupon.valid_from)
        .bind(coupon.valid_until)
        .bind(coupon.is_active)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM coupon_products WHERE coupon_id = ?1")
            .bind(&coupon.id.0)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM coupon_categories WHERE coupon_id = ?1")
            .bind(&coupon.id.0)
            .execute(&mut *tx)
            .await?;

        for product in &coupon.product_ids {
            sqlx::query("INSERT INTO coupon_products (coupon_id, product_id) VALUES (?1, ?2)")
                .bind(&coupon.id.0)
                .bind(&product.0)
                .execute(&mut *tx)
                .await?;
        }
        for category in &coupon.category_ids {
            sqlx::query("INSERT INTO coupon_categories (coupon_id, category_id) VALUES (?1, ?2)")
                .bind(&coupon.id.0)
                .bind(&category.0)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
