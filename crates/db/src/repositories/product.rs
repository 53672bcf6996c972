use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use tally_core::domain::product::{CategoryId, Product, ProductId, ProductStatus};

use super::{decimal_column, optional_decimal_column, u32_column, ProductRepository, RepositoryError};
use crate::DbPool;

pub struct SqlProductRepository {
    pool: DbPool,
}

impl SqlProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str =
    "id, title, cost_price, retail_price, compare_price, stock, status, category_id";

fn decode_product(row: &SqliteRow) -> Result<Product, RepositoryError> {
    let status_raw: String = row.try_get("status")?;
    let status = ProductStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown product status `{status_raw}`")))?;

    Ok(Product {
        id: ProductId(row.try_get("id")?),
        title: row.try_get("title")?,
        cost_price: decimal_column(row, "cost_price")?,
        retail_price: decimal_column(row, "retail_price")?,
        compare_price: optional_decimal_column(row, "compare_price")?,
        stock: u32_column(row, "stock")?,
        status,
        category_id: row.try_get::<Option<String>, _>("category_id")?.map(CategoryId),
    })
}

#[async_trait::async_trait]
impl ProductRepository for SqlProductRepository {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM products WHERE id = ?1"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(decode_product).transpose()
    }

    async fn list_published(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM products WHERE status = 'published' ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode_product).collect()
    }

    async fn save(&self, product: Product) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO products (id, title, cost_price, retail_price, compare_price, stock, status, category_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
             ON CONFLICT (id) DO UPDATE SET \
               title = excluded.title, cost_price = excluded.cost_price, \
               retail_price = excluded.retail_price, compare_price = excluded.compare_price, \
               stock = excluded.stock, status = excluded.status, category_id = excluded.category_id",
        )
        .bind(&product.id.0)
        .bind(&product.title)
        .bind(product.cost_price.to_string())
        .bind(product.retail_price.to_string())
        .bind(product.compare_price.map(|price| price.to_string()))
        .bind(i64::from(product.stock))
        .bind(product.status.as_str())
        .bind(product.category_id.as_ref().map(|category| category.0.clone()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
