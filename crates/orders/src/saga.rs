use crate::store::{NewOrder, Order, OrderStore, StoreError};
use crate::validation::UserValidator;
use auth::RequestContext;
use proto_commerce::orders::{OrderStatus, SagaState};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum SagaError {
    #[error("invalid order input: {0}")]
    InvalidInput(String),
    #[error("user is not eligible to place orders")]
    UserInvalid,
    #[error("could not reach the identity service")]
    RemoteUnavailable(#[source] fabric::Error),
    #[error("user validation did not finish in time")]
    RemoteDeadline(#[source] fabric::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SagaError {
    pub fn into_status(self) -> tonic::Status {
        match self {
            SagaError::InvalidInput(message) => tonic::Status::invalid_argument(message),
            SagaError::UserInvalid => {
                tonic::Status::failed_precondition("user is not eligible to place orders")
            }
            SagaError::RemoteUnavailable(_) => {
                tonic::Status::unavailable("could not validate user")
            }
            SagaError::RemoteDeadline(_) => {
                tonic::Status::deadline_exceeded("user validation timed out")
            }
            SagaError::Store(err) => err.into_status(),
        }
    }
}

fn classify_remote(err: fabric::Error) -> SagaError {
    match &err {
        fabric::Error::TimeLimit(_) => SagaError::RemoteDeadline(err),
        fabric::Error::Grpc(status) if status.code() == tonic::Code::DeadlineExceeded => {
            SagaError::RemoteDeadline(err)
        }
        _ => SagaError::RemoteUnavailable(err),
    }
}

/// The order-creation saga: an explicit, short-lived state machine whose
/// every transition is persisted before the next step runs, so a crash
/// leaves the order in a recoverable state.
///
/// ```text
/// NOT_STARTED -> IN_PROGRESS -> USER_VALIDATED -> COMPLETED   (status CONFIRMED)
///                     \
///                      -> COMPENSATING -> FAILED              (status CANCELLED)
/// ```
///
/// Compensation is a forward path of the same machine, not exception
/// control flow. The saga never retries a version conflict; `Aborted`
/// propagates to the caller.
pub struct OrderSaga {
    store: Arc<OrderStore>,
    validator: Arc<UserValidator>,
}

impl OrderSaga {
    pub fn new(store: Arc<OrderStore>, validator: Arc<UserValidator>) -> Self {
        Self { store, validator }
    }

    pub async fn create_order(
        &self,
        ctx: &RequestContext,
        new: NewOrder,
    ) -> Result<Order, SagaError> {
        // Rejected before anything is persisted.
        validate_input(&new)?;

        let mut order = self.store.insert(new);
        tracing::info!(
            order_id = %order.order_id,
            user_id = %order.user_id,
            total_cents = order.total_amount_cents,
            "order accepted"
        );

        order.saga_state = SagaState::InProgress;
        order = self.store.save(order)?;

        match self.validator.validate_for_order(ctx, &order.user_id).await {
            Ok(true) => (),
            Ok(false) => {
                self.compensate(order)?;
                return Err(SagaError::UserInvalid);
            }
            Err(err) => {
                tracing::warn!(order_id = %order.order_id, error = %err, "user validation failed");
                self.compensate(order)?;
                return Err(classify_remote(err));
            }
        }

        order.saga_state = SagaState::UserValidated;
        order = self.store.save(order)?;

        order.status = OrderStatus::Confirmed;
        order.saga_state = SagaState::Completed;
        order = self.store.save(order)?;

        tracing::info!(order_id = %order.order_id, "order confirmed");
        Ok(order)
    }

    fn compensate(&self, mut order: Order) -> Result<Order, StoreError> {
        tracing::warn!(order_id = %order.order_id, "compensating order");

        order.saga_state = SagaState::Compensating;
        let mut order = self.store.save(order)?;

        order.status = OrderStatus::Cancelled;
        order.saga_state = SagaState::Failed;
        self.store.save(order)
    }
}

fn validate_input(new: &NewOrder) -> Result<(), SagaError> {
    if new.user_id.is_empty() {
        return Err(SagaError::InvalidInput("user id must not be empty".to_string()));
    }
    if new.items.is_empty() {
        return Err(SagaError::InvalidInput(
            "order must contain at least one item".to_string(),
        ));
    }
    for item in &new.items {
        if item.product_id.is_empty() {
            return Err(SagaError::InvalidInput(
                "item product id must not be empty".to_string(),
            ));
        }
        if item.quantity < 1 {
            return Err(SagaError::InvalidInput(
                "item quantity must be at least 1".to_string(),
            ));
        }
        if item.unit_price_cents < 0 {
            return Err(SagaError::InvalidInput(
                "item unit price must not be negative".to_string(),
            ));
        }
    }
    Ok(())
}
