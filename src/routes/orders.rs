use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;

use crate::{
    app::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
        extract::IdPath,
        middleware,
    },
    auth::CurrentUser,
    filters::{OrderFilter, OrderListParams},
    models::{NewOrder, OrderStatus},
    representation::OrderRes,
    store::OrderDetails,
    validation::{FieldErrors, INVALID_INTEGER, REQUIRED},
};

/// Every order route needs an authenticated user.
pub fn routes_with_openapi(state: AppState) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(get_orders, create_order))
        .routes(routes!(get_user_orders))
        .routes(routes!(get_order, replace_order, update_order, delete_order))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::require_user,
        ))
}

/// Staff see every order, everybody else only their own.
fn visible_to(user: &CurrentUser) -> Option<i32> {
    (!user.is_staff).then_some(user.id)
}

fn to_res(orders: &[OrderDetails]) -> Vec<OrderRes> {
    orders.iter().map(OrderRes::from).collect()
}

/// Fetch orders, newest first, optionally filtered by status and creation time.
#[utoipa::path(
    get,
    path = "/orders/",
    tags = ["Orders"],
    security(("basicAuth" = [])),
    params(OrderListParams),
    responses(
        (status = 200, description = "List orders successfully", body = StdResponse<Vec<OrderRes>, String>),
        (status = 400, description = "Malformed filter value"),
        (status = 401, description = "Missing or invalid credentials")
    )
)]
async fn get_orders(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<OrderListParams>,
) -> Result<impl IntoResponse, AppError> {
    let filter = OrderFilter {
        user_id: visible_to(&user),
        ..OrderFilter::try_from(params)?
    };
    let orders = state.store.list_orders(&filter).await?;

    Ok(StdResponse {
        data: Some(to_res(&orders)),
        message: Some("List orders successfully"),
    })
}

/// Fetch all orders belonging to the authenticated user.
#[utoipa::path(
    get,
    path = "/orders/user-orders/",
    tags = ["Orders"],
    security(("basicAuth" = [])),
    responses(
        (status = 200, description = "List my orders successfully", body = StdResponse<Vec<OrderRes>, String>),
        (status = 401, description = "Missing or invalid credentials")
    )
)]
async fn get_user_orders(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let orders = state
        .store
        .list_orders(&OrderFilter::owned_by(user.id))
        .await?;

    Ok(StdResponse {
        data: Some(to_res(&orders)),
        message: Some("List my orders successfully"),
    })
}

/// Records an unknown status as a field error on `status`.
fn decode_status(errors: &mut FieldErrors, raw: Option<Value>) -> Option<OrderStatus> {
    let raw = raw?;
    let message = format!("{raw} is not a valid choice.");
    errors.decode("status", Some(raw), &message).flatten()
}

#[derive(Deserialize, ToSchema, Debug)]
struct CreateOrderReq {
    #[schema(value_type = Option<OrderStatus>)]
    status: Option<Value>,
    #[schema(value_type = Option<Vec<CreateOrderItemReq>>)]
    items: Option<Value>,
}

#[derive(Deserialize, ToSchema, Debug)]
struct CreateOrderItemReq {
    #[schema(value_type = i32)]
    product_id: Option<Value>,
    #[schema(value_type = i32)]
    quantity: Option<Value>,
}

impl CreateOrderReq {
    /// Status (defaulting to pending) and `(product_id, quantity)` lines.
    fn decode(self) -> Result<(OrderStatus, Vec<(i32, i32)>), FieldErrors> {
        let mut errors = FieldErrors::new();
        let status = decode_status(&mut errors, self.status);
        let items: Vec<CreateOrderItemReq> = errors
            .decode("items", self.items, "Expected a list of items.")
            .flatten()
            .unwrap_or_default();

        let mut lines = Vec::with_capacity(items.len());
        for (position, item) in items.into_iter().enumerate() {
            let mut integer = |name: &str, raw: Option<Value>| -> Option<i32> {
                let message = match raw.map(serde_json::from_value::<i32>) {
                    Some(Ok(value)) => return Some(value),
                    Some(Err(_)) => INVALID_INTEGER,
                    None => REQUIRED,
                };
                errors.add("items", format!("Item {}: {name}: {message}", position + 1));
                None
            };
            let product_id = integer("product_id", item.product_id);
            let quantity = integer("quantity", item.quantity);
            if let (Some(product_id), Some(quantity)) = (product_id, quantity) {
                lines.push((product_id, quantity));
            }
        }

        errors.into_result()?;
        Ok((status.unwrap_or_default(), lines))
    }
}

/// Create an order with its items for the authenticated user.
#[utoipa::path(
    post,
    path = "/orders/",
    tags = ["Orders"],
    security(("basicAuth" = [])),
    request_body = CreateOrderReq,
    responses(
        (status = 201, description = "Created order successfully", body = StdResponse<OrderRes, String>),
        (status = 400, description = "Invalid items"),
        (status = 401, description = "Missing or invalid credentials")
    )
)]
async fn create_order(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<CreateOrderReq>,
) -> Result<impl IntoResponse, AppError> {
    let (status, lines) = body.decode()?;
    let order = state
        .store
        .create_order(NewOrder::new(user.id, status, lines)?)
        .await?;

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(OrderRes::from(&order)),
            message: Some("Created order successfully"),
        },
    ))
}

/// Fetch a specific order.
#[utoipa::path(
    get,
    path = "/orders/{order_id}/",
    tags = ["Orders"],
    security(("basicAuth" = [])),
    params(
        ("order_id" = Uuid, Path, description = "Order ID to fetch")
    ),
    responses(
        (status = 200, description = "Get order successfully", body = StdResponse<OrderRes, String>),
        (status = 404, description = "No such order visible to the caller")
    )
)]
async fn get_order(
    IdPath(order_id): IdPath<Uuid>,
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let order = state.store.get_order(order_id, visible_to(&user)).await?;

    Ok(StdResponse {
        data: Some(OrderRes::from(&order)),
        message: Some("Get order successfully"),
    })
}

#[derive(Deserialize, ToSchema, Debug, Default)]
struct UpdateOrderReq {
    #[schema(value_type = Option<OrderStatus>)]
    status: Option<Value>,
}

impl UpdateOrderReq {
    fn decode(self) -> Result<Option<OrderStatus>, FieldErrors> {
        let mut errors = FieldErrors::new();
        let status = decode_status(&mut errors, self.status);
        errors.into_result()?;
        Ok(status)
    }
}

async fn change_status(
    state: &AppState,
    user: &CurrentUser,
    order_id: Uuid,
    next: Option<OrderStatus>,
) -> Result<OrderDetails, AppError> {
    let current = state.store.get_order(order_id, visible_to(user)).await?;
    let Some(next) = next else {
        return Ok(current);
    };

    let from = current.order.status;
    if !from.can_transition_to(next) {
        return Err(FieldErrors::single(
            "status",
            format!(
                "Cannot change status from {} to {}.",
                from.as_str(),
                next.as_str()
            ),
        )
        .into());
    }
    if from == next {
        return Ok(current);
    }

    let updated = state
        .store
        .update_order_status(order_id, from, next)
        .await?;
    info!(%order_id, from = from.as_str(), to = next.as_str(), "order status changed");
    Ok(updated)
}

/// Replace an order's writable fields (its status).
#[utoipa::path(
    put,
    path = "/orders/{order_id}/",
    tags = ["Orders"],
    security(("basicAuth" = [])),
    params(
        ("order_id" = Uuid, Path, description = "Order ID to update")
    ),
    request_body = UpdateOrderReq,
    responses(
        (status = 200, description = "Updated order successfully", body = StdResponse<OrderRes, String>),
        (status = 400, description = "Missing status or disallowed transition"),
        (status = 404, description = "No such order visible to the caller")
    )
)]
async fn replace_order(
    IdPath(order_id): IdPath<Uuid>,
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<UpdateOrderReq>,
) -> Result<impl IntoResponse, AppError> {
    let Some(status) = body.decode()? else {
        return Err(FieldErrors::single("status", REQUIRED).into());
    };
    let order = change_status(&state, &user, order_id, Some(status)).await?;

    Ok(StdResponse {
        data: Some(OrderRes::from(&order)),
        message: Some("Updated order successfully"),
    })
}

/// Update an order's status if one is given.
#[utoipa::path(
    patch,
    path = "/orders/{order_id}/",
    tags = ["Orders"],
    security(("basicAuth" = [])),
    params(
        ("order_id" = Uuid, Path, description = "Order ID to update")
    ),
    request_body = UpdateOrderReq,
    responses(
        (status = 200, description = "Updated order successfully", body = StdResponse<OrderRes, String>),
        (status = 400, description = "Disallowed transition"),
        (status = 404, description = "No such order visible to the caller")
    )
)]
async fn update_order(
    IdPath(order_id): IdPath<Uuid>,
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<UpdateOrderReq>,
) -> Result<impl IntoResponse, AppError> {
    let order = change_status(&state, &user, order_id, body.decode()?).await?;

    Ok(StdResponse {
        data: Some(OrderRes::from(&order)),
        message: Some("Updated order successfully"),
    })
}

/// Delete an order together with its items.
#[utoipa::path(
    delete,
    path = "/orders/{order_id}/",
    tags = ["Orders"],
    security(("basicAuth" = [])),
    params(
        ("order_id" = Uuid, Path, description = "Order ID to delete")
    ),
    responses(
        (status = 204, description = "Deleted order successfully"),
        (status = 404, description = "No such order visible to the caller")
    )
)]
async fn delete_order(
    IdPath(order_id): IdPath<Uuid>,
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    state.store.get_order(order_id, visible_to(&user)).await?;
    state.store.delete_order(order_id).await?;
    info!(%order_id, "order deleted");

    Ok(StatusCode::NO_CONTENT)
}
