use crate::store::{NewOrder, OrderItem, OrderStore, StoreError};
use crate::OrderSaga;
use auth::{Principal, RequestContext, RequestExt};
use proto_commerce::orders as pb;
use proto_commerce::orders::OrderStatus;
use proto_grpc::orders::order_service_server::OrderService;
use std::sync::Arc;
use tonic::{Request, Response, Status};

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

/// Implementation of `commerce.orders.OrderService`.
pub struct OrderApi {
    store: Arc<OrderStore>,
    saga: Arc<OrderSaga>,
}

impl OrderApi {
    pub fn new(store: Arc<OrderStore>, saga: Arc<OrderSaga>) -> Self {
        Self { store, saga }
    }
}

// Orders are visible to their owner and to administrators; everyone else
// learns nothing, not even existence.
fn owns(principal: &Principal, order_user_id: &str) -> bool {
    principal.user_id == order_user_id || principal.has_authority("ROLE_ADMIN")
}

#[tonic::async_trait]
impl OrderService for OrderApi {
    #[tracing::instrument(skip_all, fields(user_id = %request.get_ref().user_id))]
    async fn create_order(
        &self,
        request: Request<pb::CreateOrderRequest>,
    ) -> Result<Response<pb::CreateOrderResponse>, Status> {
        request.require_self_or_authority(&request.get_ref().user_id, &["ROLE_ADMIN"])?;

        let ctx = RequestContext::of(&request);
        let req = request.into_inner();

        let new = NewOrder {
            user_id: req.user_id,
            items: req
                .items
                .into_iter()
                .map(|item| OrderItem {
                    product_id: item.product_id,
                    name: item.name,
                    quantity: item.quantity,
                    unit_price_cents: item.unit_price_cents,
                })
                .collect(),
            shipping_address: req.shipping_address,
            payment_method: req.payment_method,
        };

        let order = self
            .saga
            .create_order(&ctx, new)
            .await
            .map_err(|err| err.into_status())?;

        Ok(Response::new(pb::CreateOrderResponse {
            order: Some(order.to_proto()),
        }))
    }

    async fn get_order(
        &self,
        request: Request<pb::GetOrderRequest>,
    ) -> Result<Response<pb::GetOrderResponse>, Status> {
        let principal = request.require_principal()?;

        let order = self
            .store
            .get(&request.get_ref().order_id)
            .filter(|order| owns(principal, &order.user_id))
            .ok_or_else(|| Status::not_found("order not found"))?;

        Ok(Response::new(pb::GetOrderResponse {
            order: Some(order.to_proto()),
        }))
    }

    async fn list_user_orders(
        &self,
        request: Request<pb::ListUserOrdersRequest>,
    ) -> Result<Response<pb::ListUserOrdersResponse>, Status> {
        request.require_self_or_authority(&request.get_ref().user_id, &["ROLE_ADMIN"])?;
        let req = request.into_inner();

        let page_size = match req.page_size {
            0 => DEFAULT_PAGE_SIZE,
            n => n.min(MAX_PAGE_SIZE),
        };
        let (orders, total_items) = self.store.list_for_user(&req.user_id, page_size, req.page_number);
        let total_pages = total_items.div_ceil(page_size as u64) as u32;

        Ok(Response::new(pb::ListUserOrdersResponse {
            orders: orders.iter().map(|order| order.to_proto()).collect(),
            total_pages,
            total_items,
            current_page: req.page_number,
        }))
    }

    #[tracing::instrument(skip_all, fields(order_id = %request.get_ref().order_id, status = %request.get_ref().status))]
    async fn update_order_status(
        &self,
        request: Request<pb::UpdateOrderStatusRequest>,
    ) -> Result<Response<pb::UpdateOrderStatusResponse>, Status> {
        let principal = request.require_principal()?.clone();
        let req = request.into_inner();

        let target = OrderStatus::from_wire_name(&req.status)
            .map_err(|err| Status::invalid_argument(err.to_string()))?;
        if target == OrderStatus::Unspecified {
            return Err(Status::invalid_argument(
                "a concrete status must be requested",
            ));
        }

        let mut order = self
            .store
            .get(&req.order_id)
            .filter(|order| owns(&principal, &order.user_id))
            .ok_or_else(|| Status::not_found("order not found"))?;

        // Re-requesting the current status only refreshes updated_at.
        let order = if order.status == target {
            self.store.touch(&order.order_id).map_err(StoreError::into_status)?
        } else {
            order.status = target;
            self.store.save(order).map_err(StoreError::into_status)?
        };

        Ok(Response::new(pb::UpdateOrderStatusResponse {
            order: Some(order.to_proto()),
        }))
    }

    async fn health_check(
        &self,
        _request: Request<pb::HealthCheckRequest>,
    ) -> Result<Response<pb::HealthCheckResponse>, Status> {
        Ok(Response::new(pb::HealthCheckResponse {
            status: "SERVING".to_string(),
            message: String::new(),
        }))
    }
}
