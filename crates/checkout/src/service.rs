use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, info};

use tally_core::catalog::Catalog;
use tally_core::domain::bundle::BundleId;
use tally_core::domain::cart::{CartBundleItem, CartBundleItemId, CartItem};
use tally_core::domain::customer::{Customer, CustomerId};
use tally_core::domain::product::ProductId;
use tally_core::errors::DomainError;
use tally_core::pricing::bundle::{offers, BundleOffer};
use tally_core::pricing::cart::{discountable_subtotal, BundleLine, CartLine, CartTotals};
use tally_core::pricing::coupon::{validate, CouponContext, CouponDecision};
use tally_core::pricing::cart;
use tally_db::repositories::{
    BundleRepository, CartRepository, CouponRepository, CustomerRepository, ProductRepository,
    RepositoryError, ShippingMethodRepository,
};

use crate::session::{SelectionView, SessionStore};

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("unknown customer `{0}`")]
    UnknownCustomer(String),
    #[error("unknown product `{0}`")]
    UnknownProduct(String),
    #[error("unknown bundle `{0}`")]
    UnknownBundle(String),
    #[error("no cart line for product `{0}`")]
    LineNotFound(String),
    #[error("pricing request superseded by a newer cart change")]
    Superseded,
}

/// Repository handles the service prices over. All reads inside a pricing
/// pass go through these, freshly, never through a cached snapshot.
#[derive(Clone)]
pub struct CheckoutRepositories {
    pub products: Arc<dyn ProductRepository>,
    pub customers: Arc<dyn CustomerRepository>,
    pub carts: Arc<dyn CartRepository>,
    pub bundles: Arc<dyn BundleRepository>,
    pub coupons: Arc<dyn CouponRepository>,
    pub shipping: Arc<dyn ShippingMethodRepository>,
}

/// A completed pricing pass: the totals plus the coupon decision that was
/// folded into them (if a code was submitted).
#[derive(Clone, Debug, PartialEq)]
pub struct PricedCart {
    pub totals: CartTotals,
    pub coupon: Option<CouponDecision>,
}

/// The checkout/session layer.
///
/// Holds per-customer selection state and orchestrates the pure pricing
/// evaluators over fresh repository reads. Every cart or selection change
/// bumps the customer's epoch; a pricing pass records the epoch it started
/// at and is discarded as [`CheckoutError::Superseded`] when a newer change
/// (or a newer pricing pass) landed before it finished.
pub struct CheckoutService {
    repos: CheckoutRepositories,
    sessions: SessionStore,
}

impl CheckoutService {
    pub fn new(repos: CheckoutRepositories) -> Self {
        Self { repos, sessions: SessionStore::default() }
    }

    /// Add a published product to the cart, merging into an existing line.
    pub async fn add_item(
        &self,
        customer: &CustomerId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<CartItem, CheckoutError> {
        let product = self
            .repos
            .products
            .find_by_id(product_id)
            .await?
            .filter(|product| product.is_published())
            .ok_or_else(|| CheckoutError::UnknownProduct(product_id.0.clone()))?;

        let existing = self.existing_line(customer, product_id).await?;
        let merged = match existing {
            Some(line) => {
                CartItem::new(product.id.clone(), line.quantity.saturating_add(quantity))?
            }
            None => CartItem::new(product.id.clone(), quantity)?,
        };
        self.repos.carts.save_item(customer, merged.clone()).await?;
        let epoch = self.sessions.bump(customer).await;

        info!(
            event_name = "checkout.cart.item_added",
            customer_id = %customer.0,
            product_id = %product_id.0,
            quantity = merged.quantity,
            epoch,
            "cart line saved"
        );
        Ok(merged)
    }

    /// Raise an existing line's quantity by one.
    pub async fn increment_item(
        &self,
        customer: &CustomerId,
        product_id: &ProductId,
    ) -> Result<CartItem, CheckoutError> {
        let line = self
            .existing_line(customer, product_id)
            .await?
            .ok_or_else(|| CheckoutError::LineNotFound(product_id.0.clone()))?;

        let updated = line.incremented();
        self.repos.carts.save_item(customer, updated.clone()).await?;
        self.sessions.bump(customer).await;
        Ok(updated)
    }

    /// Lower an existing line's quantity by one; below one the line is
    /// removed rather than kept at zero.
    pub async fn decrement_item(
        &self,
        customer: &CustomerId,
        product_id: &ProductId,
    ) -> Result<Option<CartItem>, CheckoutError> {
        let line = self
            .existing_line(customer, product_id)
            .await?
            .ok_or_else(|| CheckoutError::LineNotFound(product_id.0.clone()))?;

        let updated = match line.decremented() {
            Some(updated) => {
                self.repos.carts.save_item(customer, updated.clone()).await?;
                Some(updated)
            }
            None => {
                self.repos.carts.remove_item(customer, product_id).await?;
                self.sessions.forget_product(customer, product_id).await;
                None
            }
        };
        self.sessions.bump(customer).await;
        Ok(updated)
    }

    pub async fn remove_item(
        &self,
        customer: &CustomerId,
        product_id: &ProductId,
    ) -> Result<(), CheckoutError> {
        self.repos.carts.remove_item(customer, product_id).await?;
        self.sessions.forget_product(customer, product_id).await;
        let epoch = self.sessions.bump(customer).await;

        info!(
            event_name = "checkout.cart.item_removed",
            customer_id = %customer.0,
            product_id = %product_id.0,
            epoch,
            "cart line removed"
        );
        Ok(())
    }

    /// Add an active bundle to the cart, materializing one price-locked line
    /// per member product that still resolves in the catalog. The locked
    /// prices never change afterwards, whatever happens to the catalog.
    pub async fn add_bundle(
        &self,
        customer: &CustomerId,
        bundle_id: &BundleId,
    ) -> Result<Vec<CartBundleItem>, CheckoutError> {
        let bundle = self
            .repos
            .bundles
            .list_active()
            .await?
            .into_iter()
            .find(|bundle| &bundle.id == bundle_id)
            .ok_or_else(|| CheckoutError::UnknownBundle(bundle_id.0.clone()))?;

        let catalog = Catalog::new(self.repos.products.list_published().await?);
        let items = bundle
            .member_product_ids
            .iter()
            .filter_map(|member| catalog.find(member))
            .map(|product| CartBundleItem::locked(&bundle, product, 1))
            .collect::<Result<Vec<_>, _>>()?;

        self.repos.carts.add_bundle_items(customer, items.clone()).await?;
        let epoch = self.sessions.bump(customer).await;

        info!(
            event_name = "checkout.cart.bundle_added",
            customer_id = %customer.0,
            bundle_id = %bundle_id.0,
            lines = items.len(),
            epoch,
            "bundle materialized into price-locked lines"
        );
        Ok(items)
    }

    pub async fn remove_bundle(
        &self,
        customer: &CustomerId,
        bundle_id: &BundleId,
    ) -> Result<(), CheckoutError> {
        let item_ids: Vec<CartBundleItemId> = self
            .repos
            .carts
            .bundle_items_for(customer)
            .await?
            .into_iter()
            .filter(|item| &item.bundle_id == bundle_id)
            .map(|item| item.id)
            .collect();

        self.repos.carts.remove_bundle(customer, bundle_id).await?;
        self.sessions.forget_bundle_items(customer, &item_ids).await;
        self.sessions.bump(customer).await;
        Ok(())
    }

    pub async fn select_product(&self, customer: &CustomerId, product_id: &ProductId) {
        self.sessions.set_product_selected(customer, product_id, true).await;
    }

    pub async fn deselect_product(&self, customer: &CustomerId, product_id: &ProductId) {
        self.sessions.set_product_selected(customer, product_id, false).await;
    }

    pub async fn select_bundle_item(&self, customer: &CustomerId, item_id: &CartBundleItemId) {
        self.sessions.set_bundle_item_selected(customer, item_id, true).await;
    }

    pub async fn deselect_bundle_item(&self, customer: &CustomerId, item_id: &CartBundleItemId) {
        self.sessions.set_bundle_item_selected(customer, item_id, false).await;
    }

    /// Current bundle offers over a fresh catalog read, optionally narrowed
    /// to bundles mentioning one product.
    pub async fn bundle_offers(
        &self,
        context: Option<&ProductId>,
    ) -> Result<Vec<BundleOffer>, CheckoutError> {
        let bundles = self.repos.bundles.list_active().await?;
        let catalog = Catalog::new(self.repos.products.list_published().await?);
        Ok(offers(&bundles, &catalog, context))
    }

    /// Validate a submitted coupon code against the customer's selected cart.
    /// Rejections are data in the decision, not errors.
    pub async fn price_coupon(
        &self,
        customer_id: &CustomerId,
        code: &str,
    ) -> Result<CouponDecision, CheckoutError> {
        let customer = self.customer(customer_id).await?;
        let (lines, bundle_lines) = self.selected_lines(customer_id).await?;
        let decision = self.evaluate_coupon(&customer, code, &lines, &bundle_lines).await?;

        debug!(
            event_name = "checkout.coupon.evaluated",
            customer_id = %customer_id.0,
            accepted = decision.is_ok(),
            "coupon decision computed"
        );
        Ok(decision)
    }

    /// Price the customer's selected cart: fresh reads of catalog, cart,
    /// shipping methods (and coupon) immediately before computing.
    ///
    /// The pass is guarded by the customer's epoch. If any cart or selection
    /// change, or a newer pricing pass, lands while this one is reading, the
    /// result is discarded and [`CheckoutError::Superseded`] returned so a
    /// stale total can never overwrite a newer one.
    pub async fn price_cart(
        &self,
        customer_id: &CustomerId,
        coupon_code: Option<&str>,
    ) -> Result<PricedCart, CheckoutError> {
        let ticket = self.sessions.bump(customer_id).await;
        let customer = self.customer(customer_id).await?;

        let (lines, bundle_lines) = self.selected_lines(customer_id).await?;
        let methods = self.repos.shipping.list_active().await?;

        let decision = match coupon_code {
            Some(code) => {
                Some(self.evaluate_coupon(&customer, code, &lines, &bundle_lines).await?)
            }
            None => None,
        };
        let applied = decision
            .as_ref()
            .and_then(|decision| decision.as_ref().ok())
            .map(|evaluation| &evaluation.coupon);

        let totals = cart::price_cart(&lines, &bundle_lines, &methods, applied);

        if self.sessions.current_epoch(customer_id).await != ticket {
            debug!(
                event_name = "checkout.pricing.superseded",
                customer_id = %customer_id.0,
                epoch = ticket,
                "pricing pass overtaken by a newer change"
            );
            return Err(CheckoutError::Superseded);
        }

        info!(
            event_name = "checkout.pricing.completed",
            customer_id = %customer_id.0,
            subtotal = %totals.subtotal,
            total = %totals.total,
            epoch = ticket,
            "cart priced"
        );
        Ok(PricedCart { totals, coupon: decision })
    }

    async fn customer(&self, customer_id: &CustomerId) -> Result<Customer, CheckoutError> {
        self.repos
            .customers
            .find_by_id(customer_id)
            .await?
            .ok_or_else(|| CheckoutError::UnknownCustomer(customer_id.0.clone()))
    }

    async fn existing_line(
        &self,
        customer: &CustomerId,
        product_id: &ProductId,
    ) -> Result<Option<CartItem>, CheckoutError> {
        let items = self.repos.carts.items_for(customer).await?;
        Ok(items.into_iter().find(|item| &item.product_id == product_id))
    }

    /// Resolve the customer's selected lines against a fresh catalog read.
    /// Lines whose product no longer resolves (deleted or unpublished) are
    /// silently dropped.
    async fn selected_lines(
        &self,
        customer: &CustomerId,
    ) -> Result<(Vec<CartLine>, Vec<BundleLine>), CheckoutError> {
        let selection: SelectionView = self.sessions.selection(customer).await;
        let catalog = Catalog::new(self.repos.products.list_published().await?);

        let lines = self
            .repos
            .carts
            .items_for(customer)
            .await?
            .into_iter()
            .filter(|item| selection.includes_product(&item.product_id))
            .filter_map(|item| {
                catalog
                    .find(&item.product_id)
                    .map(|product| CartLine { product: product.clone(), quantity: item.quantity })
            })
            .collect();

        let bundle_lines = self
            .repos
            .carts
            .bundle_items_for(customer)
            .await?
            .into_iter()
            .filter(|item| selection.includes_bundle_item(&item.id))
            .filter_map(|item| {
                catalog
                    .find(&item.product_id)
                    .map(|product| BundleLine { product: product.clone(), item })
            })
            .collect();

        Ok((lines, bundle_lines))
    }

    async fn evaluate_coupon(
        &self,
        customer: &Customer,
        code: &str,
        lines: &[CartLine],
        bundle_lines: &[BundleLine],
    ) -> Result<CouponDecision, CheckoutError> {
        let found = self.repos.coupons.find_by_code(code).await?;

        let order_amount = selected_subtotal(lines, bundle_lines);
        let discountable_amount = match &found {
            Some(coupon) if coupon.is_restricted() => {
                discountable_subtotal(coupon, lines, bundle_lines)
            }
            _ => order_amount,
        };
        let prior_use = match &found {
            Some(coupon) => self.repos.coupons.has_usage(&coupon.id, &customer.id).await?,
            None => false,
        };

        let ctx = CouponContext { now: Utc::now(), order_amount, discountable_amount, prior_use };
        Ok(validate(found.as_ref(), customer, &ctx))
    }
}

fn selected_subtotal(lines: &[CartLine], bundle_lines: &[BundleLine]) -> Decimal {
    let regular: Decimal = lines
        .iter()
        .map(|line| line.product.retail_price * Decimal::from(line.quantity))
        .sum();
    let bundled: Decimal = bundle_lines
        .iter()
        .map(|line| line.item.discounted_price * Decimal::from(line.item.quantity))
        .sum();
    regular + bundled
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use tokio::sync::Notify;

    use tally_core::domain::bundle::{Bundle, BundleId};
    use tally_core::domain::cart::{CartBundleItem, CartItem};
    use tally_core::domain::coupon::{Coupon, CouponAudience, CouponDiscount, CouponId, CouponUsage};
    use tally_core::domain::customer::{Customer, CustomerId};
    use tally_core::domain::product::{Product, ProductId, ProductStatus};
    use tally_core::domain::shipping::{ShippingKind, ShippingMethod, ShippingMethodId};
    use tally_core::pricing::coupon::CouponRejection;
    use tally_db::repositories::{
        BundleRepository, CartRepository, CouponRepository, CustomerRepository,
        InMemoryBundleRepository,
        InMemoryCartRepository, InMemoryCouponRepository, InMemoryCustomerRepository,
        InMemoryProductRepository, InMemoryShippingMethodRepository, ProductRepository,
        RepositoryError, ShippingMethodRepository,
    };

    use super::{CheckoutError, CheckoutRepositories, CheckoutService};

    fn product(id: &str, retail: u32) -> Product {
        Product {
            id: ProductId(id.to_string()),
            title: format!("Product {id}"),
            cost_price: Decimal::from(retail / 2),
            retail_price: Decimal::from(retail),
            compare_price: None,
            stock: 10,
            status: ProductStatus::Published,
            category_id: None,
        }
    }

    fn home_shipping(cost: u32, threshold: Option<u32>) -> ShippingMethod {
        ShippingMethod {
            id: ShippingMethodId("home".to_string()),
            kind: ShippingKind::Home,
            min_order_amount: Decimal::ZERO,
            max_order_amount: None,
            shipping_cost: Decimal::from(cost),
            free_shipping_threshold: threshold.map(Decimal::from),
            estimated_days: Some(3),
            is_active: true,
            position: 0,
        }
    }

    fn coupon(code: &str, discount: CouponDiscount) -> Coupon {
        Coupon {
            id: CouponId(format!("cpn-{code}")),
            code: code.to_string(),
            discount,
            min_order_amount: Decimal::ZERO,
            usage_limit: None,
            used_count: 0,
            audience: CouponAudience::All,
            new_user_days: 30,
            valid_from: Utc::now() - Duration::days(1),
            valid_until: None,
            is_active: true,
            product_ids: HashSet::new(),
            category_ids: HashSet::new(),
        }
    }

    struct Store {
        products: Arc<InMemoryProductRepository>,
        carts: Arc<InMemoryCartRepository>,
        coupons: Arc<InMemoryCouponRepository>,
        service: CheckoutService,
    }

    async fn store() -> Store {
        let products = Arc::new(InMemoryProductRepository::default());
        let customers = Arc::new(InMemoryCustomerRepository::default());
        let carts = Arc::new(InMemoryCartRepository::default());
        let bundles = Arc::new(InMemoryBundleRepository::default());
        let coupons = Arc::new(InMemoryCouponRepository::default());
        let shipping = Arc::new(InMemoryShippingMethodRepository::default());

        products.save(product("hub", 100)).await.expect("seed product");
        products.save(product("sensor", 50)).await.expect("seed product");
        customers
            .save(Customer {
                id: CustomerId("alice".to_string()),
                registered_at: Utc::now() - Duration::days(90),
            })
            .await
            .expect("seed customer");
        shipping.save(home_shipping(30, Some(220))).await.expect("seed shipping");

        let service = CheckoutService::new(CheckoutRepositories {
            products: products.clone(),
            customers: customers.clone(),
            carts: carts.clone(),
            bundles: bundles.clone(),
            coupons: coupons.clone(),
            shipping: shipping.clone(),
        });

        Store { products, carts, coupons, service }
    }

    fn alice() -> CustomerId {
        CustomerId("alice".to_string())
    }

    fn hub() -> ProductId {
        ProductId("hub".to_string())
    }

    #[tokio::test]
    async fn adding_merges_into_an_existing_line() {
        let store = store().await;
        store.service.add_item(&alice(), &hub(), 1).await.expect("add");
        let merged = store.service.add_item(&alice(), &hub(), 2).await.expect("add again");
        assert_eq!(merged.quantity, 3);
    }

    #[tokio::test]
    async fn merging_saturates_at_the_quantity_ceiling() {
        let store = store().await;
        store.service.add_item(&alice(), &hub(), u32::MAX).await.expect("add");
        let merged = store.service.add_item(&alice(), &hub(), 5).await.expect("merge");
        assert_eq!(merged.quantity, u32::MAX);
    }

    #[tokio::test]
    async fn unknown_or_unpublished_products_cannot_be_added() {
        let store = store().await;

        let missing = store.service.add_item(&alice(), &ProductId("ghost".to_string()), 1).await;
        assert!(matches!(missing, Err(CheckoutError::UnknownProduct(_))));

        let mut drafted = product("drafted", 10);
        drafted.status = ProductStatus::Draft;
        store.products.save(drafted).await.expect("seed draft");
        let draft = store.service.add_item(&alice(), &ProductId("drafted".to_string()), 1).await;
        assert!(matches!(draft, Err(CheckoutError::UnknownProduct(_))));
    }

    #[tokio::test]
    async fn decrementing_below_one_removes_the_line() {
        let store = store().await;
        store.service.add_item(&alice(), &hub(), 1).await.expect("add");

        let removed = store.service.decrement_item(&alice(), &hub()).await.expect("decrement");
        assert!(removed.is_none());
        assert!(store.carts.items_for(&alice()).await.expect("list").is_empty());

        let again = store.service.decrement_item(&alice(), &hub()).await;
        assert!(matches!(again, Err(CheckoutError::LineNotFound(_))));
    }

    #[tokio::test]
    async fn bundle_lines_keep_their_locked_prices_after_a_catalog_edit() {
        let store = store().await;
        let bundle = Bundle {
            id: BundleId("starter".to_string()),
            name: "Starter Kit".to_string(),
            discount_percentage: Decimal::from(20),
            is_active: true,
            member_product_ids: vec![hub(), ProductId("sensor".to_string())],
            suggested_product_ids: Vec::new(),
        };
        store.service.repos.bundles.save(bundle).await.expect("seed bundle");

        let items = store
            .service
            .add_bundle(&alice(), &BundleId("starter".to_string()))
            .await
            .expect("add bundle");
        assert_eq!(items.len(), 2);
        let before = store.service.price_cart(&alice(), None).await.expect("price");

        // Raise the hub's retail price; the locked lines must not move.
        store.products.save(product("hub", 400)).await.expect("reprice product");
        let after = store.service.price_cart(&alice(), None).await.expect("reprice");

        assert_eq!(before.totals.subtotal, after.totals.subtotal);
        for item in &items {
            assert_eq!(item.discounted_price + item.discount_amount, item.original_price);
        }
    }

    #[tokio::test]
    async fn deselected_lines_are_excluded_from_the_totals() {
        let store = store().await;
        store.service.add_item(&alice(), &hub(), 1).await.expect("add hub");
        store
            .service
            .add_item(&alice(), &ProductId("sensor".to_string()), 1)
            .await
            .expect("add sensor");

        store.service.deselect_product(&alice(), &ProductId("sensor".to_string())).await;
        let priced = store.service.price_cart(&alice(), None).await.expect("price");
        assert_eq!(priced.totals.subtotal, Decimal::from(100));

        store.service.select_product(&alice(), &ProductId("sensor".to_string())).await;
        let priced = store.service.price_cart(&alice(), None).await.expect("price");
        assert_eq!(priced.totals.subtotal, Decimal::from(150));
    }

    #[tokio::test]
    async fn unknown_coupon_code_is_a_rejection_not_an_error() {
        let store = store().await;
        store.service.add_item(&alice(), &hub(), 1).await.expect("add");

        let decision = store.service.price_coupon(&alice(), "NOPE").await.expect("evaluate");
        assert_eq!(decision.expect_err("unknown code"), CouponRejection::NotFound);
    }

    #[tokio::test]
    async fn a_prior_redemption_blocks_the_coupon() {
        let store = store().await;
        store.service.add_item(&alice(), &hub(), 1).await.expect("add");

        let save10 = coupon("SAVE10", CouponDiscount::Fixed { value: Decimal::TEN });
        let coupon_id = save10.id.clone();
        store.coupons.save(save10).await.expect("seed coupon");
        store
            .coupons
            .record_usage(CouponUsage {
                coupon_id,
                customer_id: alice(),
                order_id: "ord-1".to_string(),
                discount_amount: Decimal::TEN,
                used_at: Utc::now(),
            })
            .await
            .expect("record usage");

        let decision = store.service.price_coupon(&alice(), "save10").await.expect("evaluate");
        assert_eq!(decision.expect_err("second redemption"), CouponRejection::AlreadyUsed);
    }

    #[tokio::test]
    async fn an_accepted_coupon_flows_into_the_totals() {
        let store = store().await;
        store.service.add_item(&alice(), &hub(), 1).await.expect("add");
        store
            .coupons
            .save(coupon("SAVE10", CouponDiscount::Fixed { value: Decimal::TEN }))
            .await
            .expect("seed coupon");

        let priced = store.service.price_cart(&alice(), Some("save10")).await.expect("price");
        assert_eq!(priced.totals.coupon_discount, Decimal::TEN);
        // 100 subtotal + 30 shipping - 10 coupon.
        assert_eq!(priced.totals.total, Decimal::from(120));
        assert!(priced.coupon.expect("decision present").is_ok());
    }

    #[tokio::test]
    async fn a_rejected_coupon_leaves_the_totals_undiscounted() {
        let store = store().await;
        store.service.add_item(&alice(), &hub(), 1).await.expect("add");

        let priced = store.service.price_cart(&alice(), Some("NOPE")).await.expect("price");
        assert_eq!(priced.totals.coupon_discount, Decimal::ZERO);
        assert_eq!(priced.totals.total, Decimal::from(130));
        assert!(priced.coupon.expect("decision present").is_err());
    }

    /// Cart repository wrapper that parks `bundle_items_for` on a gate so a
    /// test can interleave a cart change into a running pricing pass.
    struct GatedCart {
        inner: Arc<InMemoryCartRepository>,
        entered: Arc<Notify>,
        gate: Arc<Notify>,
    }

    #[async_trait::async_trait]
    impl CartRepository for GatedCart {
        async fn items_for(&self, customer: &CustomerId) -> Result<Vec<CartItem>, RepositoryError> {
            self.inner.items_for(customer).await
        }

        async fn save_item(
            &self,
            customer: &CustomerId,
            item: CartItem,
        ) -> Result<(), RepositoryError> {
            self.inner.save_item(customer, item).await
        }

        async fn remove_item(
            &self,
            customer: &CustomerId,
            product_id: &ProductId,
        ) -> Result<(), RepositoryError> {
            self.inner.remove_item(customer, product_id).await
        }

        async fn bundle_items_for(
            &self,
            customer: &CustomerId,
        ) -> Result<Vec<CartBundleItem>, RepositoryError> {
            self.entered.notify_one();
            self.gate.notified().await;
            self.inner.bundle_items_for(customer).await
        }

        async fn add_bundle_items(
            &self,
            customer: &CustomerId,
            items: Vec<CartBundleItem>,
        ) -> Result<(), RepositoryError> {
            self.inner.add_bundle_items(customer, items).await
        }

        async fn remove_bundle(
            &self,
            customer: &CustomerId,
            bundle_id: &BundleId,
        ) -> Result<(), RepositoryError> {
            self.inner.remove_bundle(customer, bundle_id).await
        }

        async fn clear(&self, customer: &CustomerId) -> Result<(), RepositoryError> {
            self.inner.clear(customer).await
        }
    }

    #[tokio::test]
    async fn a_pricing_pass_overtaken_by_a_cart_change_is_superseded() {
        let products = Arc::new(InMemoryProductRepository::default());
        let customers = Arc::new(InMemoryCustomerRepository::default());
        let inner_carts = Arc::new(InMemoryCartRepository::default());
        let entered = Arc::new(Notify::new());
        let gate = Arc::new(Notify::new());
        let carts = Arc::new(GatedCart {
            inner: inner_carts.clone(),
            entered: entered.clone(),
            gate: gate.clone(),
        });

        products.save(product("hub", 100)).await.expect("seed product");
        customers
            .save(Customer { id: alice(), registered_at: Utc::now() - Duration::days(90) })
            .await
            .expect("seed customer");
        inner_carts
            .save_item(&alice(), CartItem::new(hub(), 1).expect("line"))
            .await
            .expect("seed line");

        let service = Arc::new(CheckoutService::new(CheckoutRepositories {
            products,
            customers,
            carts,
            bundles: Arc::new(InMemoryBundleRepository::default()),
            coupons: Arc::new(InMemoryCouponRepository::default()),
            shipping: Arc::new(InMemoryShippingMethodRepository::default()),
        }));

        let pricing = {
            let service = service.clone();
            tokio::spawn(async move { service.price_cart(&alice(), None).await })
        };

        // Wait until the pass is mid-read, change the selection, then
        // release it.
        entered.notified().await;
        service.deselect_product(&alice(), &ProductId("unrelated".to_string())).await;
        gate.notify_one();

        let result = pricing.await.expect("pricing task");
        assert!(matches!(result, Err(CheckoutError::Superseded)));

        // A fresh pass with no interleaved change succeeds.
        let fresh = {
            let service = service.clone();
            tokio::spawn(async move { service.price_cart(&alice(), None).await })
        };
        entered.notified().await;
        gate.notify_one();
        let priced = fresh.await.expect("pricing task").expect("no newer change");
        assert_eq!(priced.totals.subtotal, Decimal::from(100));
    }
}
