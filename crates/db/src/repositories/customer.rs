use chrono::{DateTime, Utc};
use sqlx::Row;

use tally_core::domain::customer::{Customer, CustomerId};

use super::{CustomerRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCustomerRepository {
    pool: DbPool,
}

impl SqlCustomerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CustomerRepository for SqlCustomerRepository {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query("SELECT id, registered_at FROM customers WHERE id = ?1")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            let registered_at: DateTime<Utc> = row.try_get("registered_at")?;
            Ok(Customer { id: CustomerId(row.try_get("id")?), registered_at })
        })
        .transpose()
    }

    async fn save(&self, customer: Customer) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO customers (id, registered_at) VALUES (?1, ?2) \
             ON CONFLICT (id) DO UPDATE SET registered_at = excluded.registered_at",
        )
        .bind(&customer.id.0)
        .bind(customer.registered_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
