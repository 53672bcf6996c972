use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Contract for the seeded coupons; `verify` checks each one against the
/// stored row.
const SEED_COUPONS: &[SeedCouponContract] = &[
    SeedCouponContract {
        code: "WELCOME10",
        kind: "percentage",
        audience: "new",
        restricted: false,
        description: "10% off for new customers, capped at 40",
    },
    SeedCouponContract {
        code: "SENSORS25",
        kind: "fixed",
        audience: "all",
        restricted: true,
        description: "25 off sensor-category lines on orders of 100+",
    },
    SeedCouponContract {
        code: "FREESHIP",
        kind: "shipping",
        audience: "all",
        restricted: false,
        description: "shipping waiver on orders of 50+",
    },
];

const SEED_SHIPPING_IDS: &[&str] = &["ship-home", "ship-pickup", "ship-express"];

const PUBLISHED_PRODUCT_COUNT: i64 = 4;
const ACTIVE_BUNDLE_COUNT: i64 = 1;

/// Deterministic demo storefront dataset.
///
/// Seeds a small smart-home catalog, one active bundle, three coupons
/// (one per discount kind), and the three shipping tiers. Used by the
/// `seed` CLI command and by integration tests that want a realistic
/// store without hand-building rows.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    /// SQL fixture content for the demo dataset.
    pub const SQL: &'static str = include_str!("../../../config/fixtures/demo_seed_data.sql");

    /// Load the demo dataset. Idempotent; reloading replaces the rows.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let coupons_seeded = SEED_COUPONS
            .iter()
            .map(|coupon| CouponSeedInfo {
                code: coupon.code,
                kind: coupon.kind,
                description: coupon.description,
            })
            .collect::<Vec<_>>();

        Ok(SeedResult { coupons_seeded })
    }

    /// Verify that the seeded rows exist and match the contract.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        let published: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM products WHERE status = 'published'")
                .fetch_one(pool)
                .await?;
        checks.push(("published-products", published == PUBLISHED_PRODUCT_COUNT));

        let active_bundles: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM bundles WHERE is_active = 1")
                .fetch_one(pool)
                .await?;
        checks.push(("active-bundles", active_bundles == ACTIVE_BUNDLE_COUNT));

        let starter_members: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM bundle_member_products WHERE bundle_id = 'bdl-starter'",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("starter-bundle-members", starter_members == 3));

        for coupon in SEED_COUPONS {
            let row_ok: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM coupons \
                 WHERE code = ?1 AND kind = ?2 AND audience = ?3 AND is_active = 1)",
            )
            .bind(coupon.code)
            .bind(coupon.kind)
            .bind(coupon.audience)
            .fetch_one(pool)
            .await?;
            checks.push((coupon.code, row_ok == 1));

            let restriction_rows: i64 = sqlx::query_scalar(
                "SELECT (SELECT COUNT(1) FROM coupon_products cp \
                         JOIN coupons c ON c.id = cp.coupon_id WHERE c.code = ?1) \
                      + (SELECT COUNT(1) FROM coupon_categories cc \
                         JOIN coupons c ON c.id = cc.coupon_id WHERE c.code = ?1)",
            )
            .bind(coupon.code)
            .fetch_one(pool)
            .await?;
            checks.push((coupon.restriction_label(), (restriction_rows > 0) == coupon.restricted));
        }

        for id in SEED_SHIPPING_IDS {
            let method_ok: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM shipping_methods WHERE id = ?1 AND is_active = 1)",
            )
            .bind(id)
            .fetch_one(pool)
            .await?;
            checks.push((*id, method_ok == 1));
        }

        let all_present = checks.iter().all(|(_, exists)| *exists);
        Ok(VerificationResult { all_present, checks })
    }

    /// Remove the seeded rows from a test database.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM shipping_methods WHERE id LIKE 'ship-%'")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM coupons WHERE id LIKE 'cpn-%'").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM bundles WHERE id LIKE 'bdl-%'").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM customers WHERE id LIKE 'cust-%'").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM products WHERE id LIKE 'prod-%'").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM categories WHERE id LIKE 'cat-%'").execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedCouponContract {
    code: &'static str,
    kind: &'static str,
    audience: &'static str,
    restricted: bool,
    description: &'static str,
}

impl SeedCouponContract {
    fn restriction_label(&self) -> &'static str {
        match self.code {
            "WELCOME10" => "welcome10-restrictions",
            "SENSORS25" => "sensors25-restrictions",
            _ => "freeship-restrictions",
        }
    }
}

#[derive(Debug)]
pub struct SeedResult {
    pub coupons_seeded: Vec<CouponSeedInfo>,
}

#[derive(Debug)]
pub struct CouponSeedInfo {
    pub code: &'static str,
    pub kind: &'static str,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
