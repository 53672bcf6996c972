//! Per-customer session state: the line selection and the pricing epoch.
//!
//! Cart lines are selected by default; the session tracks only what the
//! customer has unticked. The epoch is a monotonic counter bumped by every
//! cart or selection change and by the start of every pricing request, so a
//! pricing pass can detect that a newer change landed while it was reading.

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

use tally_core::domain::cart::CartBundleItemId;
use tally_core::domain::customer::CustomerId;
use tally_core::domain::product::ProductId;

#[derive(Debug, Default)]
struct SessionState {
    deselected_products: HashSet<ProductId>,
    deselected_bundle_items: HashSet<CartBundleItemId>,
    epoch: u64,
}

/// Snapshot of a customer's selection, taken once per pricing pass.
#[derive(Clone, Debug, Default)]
pub struct SelectionView {
    deselected_products: HashSet<ProductId>,
    deselected_bundle_items: HashSet<CartBundleItemId>,
}

impl SelectionView {
    pub fn includes_product(&self, product_id: &ProductId) -> bool {
        !self.deselected_products.contains(product_id)
    }

    pub fn includes_bundle_item(&self, item_id: &CartBundleItemId) -> bool {
        !self.deselected_bundle_items.contains(item_id)
    }
}

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionState>>,
}

impl SessionStore {
    /// Bump the customer's epoch and return the new value. Called by every
    /// mutation and at the start of every pricing pass.
    pub async fn bump(&self, customer: &CustomerId) -> u64 {
        let mut sessions = self.sessions.write().await;
        let state = sessions.entry(customer.0.clone()).or_default();
        state.epoch += 1;
        state.epoch
    }

    pub async fn current_epoch(&self, customer: &CustomerId) -> u64 {
        let sessions = self.sessions.read().await;
        sessions.get(&customer.0).map_or(0, |state| state.epoch)
    }

    pub async fn selection(&self, customer: &CustomerId) -> SelectionView {
        let sessions = self.sessions.read().await;
        sessions.get(&customer.0).map_or_else(SelectionView::default, |state| SelectionView {
            deselected_products: state.deselected_products.clone(),
            deselected_bundle_items: state.deselected_bundle_items.clone(),
        })
    }

    pub async fn set_product_selected(
        &self,
        customer: &CustomerId,
        product_id: &ProductId,
        selected: bool,
    ) -> u64 {
        let mut sessions = self.sessions.write().await;
        let state = sessions.entry(customer.0.clone()).or_default();
        if selected {
            state.deselected_products.remove(product_id);
        } else {
            state.deselected_products.insert(product_id.clone());
        }
        state.epoch += 1;
        state.epoch
    }

    pub async fn set_bundle_item_selected(
        &self,
        customer: &CustomerId,
        item_id: &CartBundleItemId,
        selected: bool,
    ) -> u64 {
        let mut sessions = self.sessions.write().await;
        let state = sessions.entry(customer.0.clone()).or_default();
        if selected {
            state.deselected_bundle_items.remove(item_id);
        } else {
            state.deselected_bundle_items.insert(item_id.clone());
        }
        state.epoch += 1;
        state.epoch
    }

    /// Drop selection bookkeeping for lines that left the cart.
    pub async fn forget_product(&self, customer: &CustomerId, product_id: &ProductId) {
        let mut sessions = self.sessions.write().await;
        if let Some(state) = sessions.get_mut(&customer.0) {
            state.deselected_products.remove(product_id);
        }
    }

    pub async fn forget_bundle_items(&self, customer: &CustomerId, item_ids: &[CartBundleItemId]) {
        let mut sessions = self.sessions.write().await;
        if let Some(state) = sessions.get_mut(&customer.0) {
            for item_id in item_ids {
                state.deselected_bundle_items.remove(item_id);
            }
        }
    }
}
