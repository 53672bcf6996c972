use std::collections::HashMap;

use tokio::sync::RwLock;

use tally_core::domain::bundle::{Bundle, BundleId};
use tally_core::domain::cart::{CartBundleItem, CartItem};
use tally_core::domain::coupon::{Coupon, CouponId, CouponUsage};
use tally_core::domain::customer::{Customer, CustomerId};
use tally_core::domain::product::{Product, ProductId};
use tally_core::domain::shipping::ShippingMethod;

use super::{
    BundleRepository, CartRepository, CouponRepository, CustomerRepository, ProductRepository,
    RepositoryError, ShippingMethodRepository,
};

#[derive(Default)]
pub struct InMemoryProductRepository {
    products: RwLock<HashMap<String, Product>>,
}

#[async_trait::async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.get(&id.0).cloned())
    }

    async fn list_published(&self) -> Result<Vec<Product>, RepositoryError> {
        let products = self.products.read().await;
        let mut published: Vec<Product> =
            products.values().filter(|product| product.is_published()).cloned().collect();
        published.sort_by(|a, b| a.id.0.cmp(&b.id.0));
        Ok(published)
    }

    async fn save(&self, product: Product) -> Result<(), RepositoryError> {
        let mut products = self.products.write().await;
        products.insert(product.id.0.clone(), product);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryCustomerRepository {
    customers: RwLock<HashMap<String, Customer>>,
}

#[async_trait::async_trait]
impl CustomerRepository for InMemoryCustomerRepository {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let customers = self.customers.read().await;
        Ok(customers.get(&id.0).cloned())
    }

    async fn save(&self, customer: Customer) -> Result<(), RepositoryError> {
        let mut customers = self.customers.write().await;
        customers.insert(customer.id.0.clone(), customer);
        Ok(())
    }
}

#[derive(Default)]
struct CartState {
    items: HashMap<String, CartItem>,
    bundle_items: Vec<CartBundleItem>,
}

#[derive(Default)]
pub struct InMemoryCartRepository {
    carts: RwLock<HashMap<String, CartState>>,
}

#[async_trait::async_trait]
impl CartRepository for InMemoryCartRepository {
    async fn items_for(&self, customer: &CustomerId) -> Result<Vec<CartItem>, RepositoryError> {
        let carts = self.carts.read().await;
        let mut items: Vec<CartItem> = carts
            .get(&customer.0)
            .map(|cart| cart.items.values().cloned().collect())
            .unwrap_or_default();
        items.sort_by(|a, b| a.product_id.0.cmp(&b.product_id.0));
        Ok(items)
    }

    async fn save_item(
        &self,
        customer: &CustomerId,
        item: CartItem,
    ) -> Result<(), RepositoryError> {
        let mut carts = self.carts.write().await;
        let cart = carts.entry(customer.0.clone()).or_default();
        cart.items.insert(item.product_id.0.clone(), item);
        Ok(())
    }

    async fn remove_item(
        &self,
        customer: &CustomerId,
        product_id: &ProductId,
    ) -> Result<(), RepositoryError> {
        let mut carts = self.carts.write().await;
        if let Some(cart) = carts.get_mut(&customer.0) {
            cart.items.remove(&product_id.0);
        }
        Ok(())
    }

    async fn bundle_items_for(
        &self,
        customer: &CustomerId,
    ) -> Result<Vec<CartBundleItem>, RepositoryError> {
        let carts = self.carts.read().await;
        Ok(carts.get(&customer.0).map(|cart| cart.bundle_items.clone()).unwrap_or_default())
    }

    async fn add_bundle_items(
        &self,
        customer: &CustomerId,
        items: Vec<CartBundleItem>,
    ) -> Result<(), RepositoryError> {
        let mut carts = self.carts.write().await;
        let cart = carts.entry(customer.0.clone()).or_default();
        cart.bundle_items.extend(items);
        Ok(())
    }

    async fn remove_bundle(
        &self,
        customer: &CustomerId,
        bundle_id: &BundleId,
    ) -> Result<(), RepositoryError> {
        let mut carts = self.carts.write().await;
        if let Some(cart) = carts.get_mut(&customer.0) {
            cart.bundle_items.retain(|item| &item.bundle_id != bundle_id);
        }
        Ok(())
    }

    async fn clear(&self, customer: &CustomerId) -> Result<(), RepositoryError> {
        let mut carts = self.carts.write().await;
        carts.remove(&customer.0);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryBundleRepository {
    bundles: RwLock<HashMap<String, Bundle>>,
}

#[async_trait::async_trait]
impl BundleRepository for InMemoryBundleRepository {
    async fn list_active(&self) -> Result<Vec<Bundle>, RepositoryError> {
        let bundles = self.bundles.read().await;
        let mut active: Vec<Bundle> =
            bundles.values().filter(|bundle| bundle.is_active).cloned().collect();
        active.sort_by(|a, b| a.id.0.cmp(&b.id.0));
        Ok(active)
    }

    async fn save(&self, bundle: Bundle) -> Result<(), RepositoryError> {
        let mut bundles = self.bundles.write().await;
        bundles.insert(bundle.id.0.clone(), bundle);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryCouponRepository {
    coupons: RwLock<HashMap<String, Coupon>>,
    usages: RwLock<Vec<CouponUsage>>,
}

#[async_trait::async_trait]
impl CouponRepository for InMemoryCouponRepository {
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
        let normalized = Coupon::normalize_code(code);
        let coupons = self.coupons.read().await;
        Ok(coupons.get(&normalized).cloned())
    }

    async fn has_usage(
        &self,
        coupon_id: &CouponId,
        customer_id: &CustomerId,
    ) -> Result<bool, RepositoryError> {
        let usages = self.usages.read().await;
        Ok(usages
            .iter()
            .any(|usage| &usage.coupon_id == coupon_id && &usage.customer_id == customer_id))
    }

    async fn record_usage(&self, usage: CouponUsage) -> Result<(), RepositoryError> {
        let mut coupons = self.coupons.write().await;
        if let Some(coupon) =
            coupons.values_mut().find(|coupon| coupon.id == usage.coupon_id)
        {
            coupon.used_count += 1;
        }
        let mut usages = self.usages.write().await;
        usages.push(usage);
        Ok(())
    }

    async fn save(&self, mut coupon: Coupon) -> Result<(), RepositoryError> {
        coupon.code = Coupon::normalize_code(&coupon.code);
        let mut coupons = self.coupons.write().await;
        coupons.insert(coupon.code.clone(), coupon);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryShippingMethodRepository {
    methods: RwLock<Vec<ShippingMethod>>,
}

#[async_trait::async_trait]
impl ShippingMethodRepository for InMemoryShippingMethodRepository {
    async fn list_active(&self) -> Result<Vec<ShippingMethod>, RepositoryError> {
        let methods = self.methods.read().await;
        let mut active: Vec<ShippingMethod> =
            methods.iter().filter(|method| method.is_active).cloned().collect();
        active.sort_by_key(|method| method.position);
        Ok(active)
    }

    async fn save(&self, method: ShippingMethod) -> Result<(), RepositoryError> {
        let mut methods = self.methods.write().await;
        if let Some(existing) = methods.iter_mut().find(|existing| existing.id == method.id) {
            *existing = method;
        } else {
            methods.push(method);
        }
        Ok(())
    }
}
