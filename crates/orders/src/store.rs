use chrono::{DateTime, Utc};
use proto_commerce::orders::{OrderStatus, SagaState};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokens::Clock;

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub product_id: String,
    pub name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

#[derive(Debug, Clone)]
pub struct Order {
    pub order_id: String,
    pub user_id: String,
    pub items: Vec<OrderItem>,
    pub total_amount_cents: i64,
    pub status: OrderStatus,
    pub saga_state: SagaState,
    pub shipping_address: Option<String>,
    pub payment_method: Option<String>,
    /// Monotonic counter for optimistic concurrency control.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn to_proto(&self) -> proto_commerce::orders::Order {
        proto_commerce::orders::Order {
            order_id: self.order_id.clone(),
            user_id: self.user_id.clone(),
            items: self
                .items
                .iter()
                .map(|item| proto_commerce::orders::OrderItem {
                    product_id: item.product_id.clone(),
                    name: item.name.clone(),
                    quantity: item.quantity,
                    unit_price_cents: item.unit_price_cents,
                })
                .collect(),
            total_amount_cents: self.total_amount_cents,
            status: self.status as i32,
            saga_state: self.saga_state as i32,
            shipping_address: self.shipping_address.clone(),
            payment_method: self.payment_method.clone(),
            version: self.version,
            created_at_unix_ms: self.created_at.timestamp_millis(),
            updated_at_unix_ms: self.updated_at.timestamp_millis(),
        }
    }
}

/// The exact order total: an integral number of cents, never rounded.
pub fn total_amount_cents(items: &[OrderItem]) -> i64 {
    items
        .iter()
        .map(|item| item.quantity as i64 * item.unit_price_cents)
        .sum()
}

/// The authoritative status transition table. DELIVERED and CANCELLED
/// are terminal.
pub fn transition_allowed(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;
    matches!(
        (from, to),
        (Pending, Confirmed | Cancelled)
            | (Confirmed, Processing | Cancelled)
            | (Processing, Shipped | Cancelled | Failed)
            | (Shipped, Delivered)
            | (Failed, Processing)
    )
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("order not found")]
    NotFound,
    #[error("stale version")]
    VersionConflict,
    #[error("cannot transition from {} to {}", .from.as_str_name(), .to.as_str_name())]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}

impl StoreError {
    pub fn into_status(self) -> tonic::Status {
        match self {
            StoreError::NotFound => tonic::Status::not_found("order not found"),
            StoreError::VersionConflict => {
                tonic::Status::aborted("order was concurrently modified")
            }
            StoreError::InvalidTransition { .. } => {
                tonic::Status::failed_precondition(self.to_string())
            }
        }
    }
}

/// Validated fields of a creation request, before any persistence.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: String,
    pub items: Vec<OrderItem>,
    pub shipping_address: Option<String>,
    pub payment_method: Option<String>,
}

/// In-process order store with optimistic versioning; the transition
/// table is enforced on every save so no caller can skip it.
pub struct OrderStore {
    clock: Arc<dyn Clock>,
    orders: RwLock<HashMap<String, Order>>,
}

impl OrderStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            orders: RwLock::new(HashMap::new()),
        }
    }

    /// Persist a fresh PENDING order with its exact total.
    pub fn insert(&self, new: NewOrder) -> Order {
        let now = self.clock.now();
        let order = Order {
            order_id: uuid::Uuid::new_v4().to_string(),
            total_amount_cents: total_amount_cents(&new.items),
            user_id: new.user_id,
            items: new.items,
            status: OrderStatus::Pending,
            saga_state: SagaState::NotStarted,
            shipping_address: new.shipping_address,
            payment_method: new.payment_method,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        self.orders
            .write()
            .unwrap()
            .insert(order.order_id.clone(), order.clone());
        order
    }

    pub fn get(&self, order_id: &str) -> Option<Order> {
        self.orders.read().unwrap().get(order_id).cloned()
    }

    /// Orders of one user, newest first, with zero-based pagination.
    /// Returns the page and the total number of the user's orders.
    pub fn list_for_user(&self, user_id: &str, page_size: u32, page_number: u32) -> (Vec<Order>, u64) {
        let orders = self.orders.read().unwrap();
        let mut matching: Vec<&Order> = orders
            .values()
            .filter(|order| order.user_id == user_id)
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.order_id.cmp(&a.order_id)));

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(page_number as usize * page_size as usize)
            .take(page_size as usize)
            .cloned()
            .collect();
        (page, total)
    }

    /// Save `order`, requiring that its version still matches the stored
    /// one and that any status change follows the transition table.
    pub fn save(&self, mut order: Order) -> Result<Order, StoreError> {
        let mut orders = self.orders.write().unwrap();

        let stored = orders.get(&order.order_id).ok_or(StoreError::NotFound)?;
        if stored.version != order.version {
            return Err(StoreError::VersionConflict);
        }
        if order.status != stored.status && !transition_allowed(stored.status, order.status) {
            return Err(StoreError::InvalidTransition {
                from: stored.status,
                to: order.status,
            });
        }

        order.version += 1;
        order.updated_at = self.clock.now();
        orders.insert(order.order_id.clone(), order.clone());

        Ok(order)
    }

    /// Refresh `updated_at` without changing anything else. Used when a
    /// status update requests the status the order already has.
    pub fn touch(&self, order_id: &str) -> Result<Order, StoreError> {
        let mut orders = self.orders.write().unwrap();
        let order = orders.get_mut(order_id).ok_or(StoreError::NotFound)?;
        order.updated_at = self.clock.now();
        Ok(order.clone())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokens::SystemClock;

    fn store() -> OrderStore {
        OrderStore::new(Arc::new(SystemClock))
    }

    fn new_order(user_id: &str) -> NewOrder {
        NewOrder {
            user_id: user_id.to_string(),
            items: vec![
                OrderItem {
                    product_id: "P-001".to_string(),
                    name: "Laptop".to_string(),
                    quantity: 1,
                    unit_price_cents: 99_999,
                },
                OrderItem {
                    product_id: "P-002".to_string(),
                    name: "Mouse".to_string(),
                    quantity: 2,
                    unit_price_cents: 2_999,
                },
            ],
            shipping_address: Some("1 Main St".to_string()),
            payment_method: Some("CREDIT_CARD".to_string()),
        }
    }

    #[test]
    fn totals_are_exact_sums() {
        let store = store();
        let order = store.insert(new_order("u-1"));
        assert_eq!(order.total_amount_cents, 105_997);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.saga_state, SagaState::NotStarted);
    }

    #[test]
    fn transition_table_is_enforced_on_save() {
        let store = store();
        let mut order = store.insert(new_order("u-1"));

        order.status = OrderStatus::Shipped;
        assert!(matches!(
            store.save(order.clone()),
            Err(StoreError::InvalidTransition { .. })
        ));

        order.status = OrderStatus::Confirmed;
        let order = store.save(order).unwrap();
        assert_eq!(order.version, 1);
    }

    #[test]
    fn terminal_states_admit_nothing() {
        let store = store();
        let mut order = store.insert(new_order("u-1"));
        for status in [
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ] {
            order.status = status;
            order = store.save(order).unwrap();
        }

        for target in [
            OrderStatus::Pending,
            OrderStatus::Processing,
            OrderStatus::Cancelled,
            OrderStatus::Failed,
        ] {
            let mut attempt = order.clone();
            attempt.status = target;
            assert!(matches!(
                store.save(attempt),
                Err(StoreError::InvalidTransition { .. })
            ));
        }
    }

    #[test]
    fn failed_orders_can_reenter_processing() {
        assert!(transition_allowed(OrderStatus::Failed, OrderStatus::Processing));
        assert!(!transition_allowed(OrderStatus::Failed, OrderStatus::Shipped));
    }

    #[test]
    fn stale_saves_conflict() {
        let store = store();
        let order = store.insert(new_order("u-1"));

        let stale = order.clone();
        store.save(order).unwrap();
        assert!(matches!(
            store.save(stale),
            Err(StoreError::VersionConflict)
        ));
    }

    #[test]
    fn touch_only_moves_updated_at() {
        let store = store();
        let order = store.insert(new_order("u-1"));

        let touched = store.touch(&order.order_id).unwrap();
        assert_eq!(touched.version, order.version);
        assert_eq!(touched.status, order.status);
        assert!(touched.updated_at >= order.updated_at);
    }

    #[test]
    fn listing_paginates_newest_first() {
        let store = store();
        for _ in 0..5 {
            store.insert(new_order("u-1"));
        }
        store.insert(new_order("u-2"));

        let (page, total) = store.list_for_user("u-1", 2, 0);
        assert_eq!((page.len(), total), (2, 5));
        let (page, total) = store.list_for_user("u-1", 2, 2);
        assert_eq!((page.len(), total), (1, 5));
        let (page, _) = store.list_for_user("u-1", 2, 3);
        assert!(page.is_empty());
    }
}
