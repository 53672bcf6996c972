use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use tally_core::domain::bundle::BundleId;
use tally_core::domain::cart::{CartBundleItem, CartBundleItemId, CartItem};
use tally_core::domain::customer::CustomerId;
use tally_core::domain::product::ProductId;

use super::{decimal_column, u32_column, CartRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCartRepository {
    pool: DbPool,
}

impl SqlCartRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode_bundle_item(row: &SqliteRow) -> Result<CartBundleItem, RepositoryError> {
    Ok(CartBundleItem {
        id: CartBundleItemId(row.try_get("id")?),
        bundle_id: BundleId(row.try_get("bundle_id")?),
        product_id: ProductId(row.try_get("product_id")?),
        original_price: decimal_column(row, "original_price")?,
        discounted_price: decimal_column(row, "discounted_price")?,
        discount_amount: decimal_column(row, "discount_amount")?,
        quantity: u32_column(row, "quantity")?,
    })
}

#[async_trait::async_trait]
impl CartRepository for SqlCartRepository {
    async fn items_for(&self, customer: &CustomerId) -> Result<Vec<CartItem>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT product_id, quantity FROM cart_items WHERE customer_id = ?1 ORDER BY product_id",
        )
        .bind(&customer.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(CartItem {
                    product_id: ProductId(row.try_get("product_id")?),
                    quantity: u32_column(row, "quantity")?,
                })
            })
            .collect()
    }

    async fn save_item(
        &self,
        customer: &CustomerId,
        item: CartItem,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO cart_items (customer_id, product_id, quantity) VALUES (?1, ?2, ?3) \
             ON CONFLICT (customer_id, product_id) DO UPDATE SET quantity = excluded.quantity",
        )
        .bind(&customer.0)
        .bind(&item.product_id.0)
        .bind(i64::from(item.quantity))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove_item(
        &self,
        customer: &CustomerId,
        product_id: &ProductId,
    ) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM cart_items WHERE customer_id = ?1 AND product_id = ?2")
            .bind(&customer.0)
            .bind(&product_id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn bundle_items_for(
        &self,
        customer: &CustomerId,
    ) -> Result<Vec<CartBundleItem>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, bundle_id, product_id, original_price, discounted_price, discount_amount, quantity \
             FROM cart_bundle_items WHERE customer_id = ?1 ORDER BY id",
        )
        .bind(&customer.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode_bundle_item).collect()
    }

    async fn add_bundle_items(
        &self,
        customer: &CustomerId,
        items: Vec<CartBundleItem>,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for item in items {
            sqlx::query(
                "INSERT INTO cart_bundle_items \
                 (id, customer_id, bundle_id, product_id, original_price, discounted_price, discount_amount, quantity) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .bind(&item.id.0)
            .bind(&customer.0)
            .bind(&item.bundle_id.0)
            .bind(&item.product_id.0)
            .bind(item.original_price.to_string())
            .bind(item.discounted_price.to_string())
            .bind(item.discount_amount.to_string())
            .bind(i64::from(item.quantity))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn remove_bundle(
        &self,
        customer: &CustomerId,
        bundle_id: &BundleId,
    ) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM cart_bundle_items WHERE customer_id = ?1 AND bundle_id = ?2")
            .bind(&customer.0)
            .bind(&bundle_id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn clear(&self, customer: &CustomerId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM cart_items WHERE customer_id = ?1")
            .bind(&customer.0)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM cart_bundle_items WHERE customer_id = ?1")
            .bind(&customer.0)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(())
    }
}
