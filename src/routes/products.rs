use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::{
    app::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
        extract::IdPath,
        middleware,
    },
    filters::{ProductFilter, ProductListParams},
    models::{CreateProductEntity, UpdateProductEntity},
    pagination::{Page, PageParams},
    representation::{ProductInfoRes, ProductRes},
    validation::{self, FieldErrors, INVALID_INTEGER, INVALID_NUMBER, INVALID_STRING, REQUIRED},
};

/// Reads are public; writes need a staff account.
pub fn routes_with_openapi(state: AppState) -> OpenApiRouter<AppState> {
    let public = OpenApiRouter::new()
        .routes(routes!(get_products))
        .routes(routes!(get_all_products))
        .routes(routes!(get_product_info))
        .routes(routes!(get_product));

    let staff = OpenApiRouter::new()
        .routes(routes!(create_product))
        .routes(routes!(replace_product, update_product, delete_product))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::require_staff,
        ));

    public.merge(staff)
}

/// Fetch in-stock products (stock above 10), filtered, searched, ordered and paginated.
#[utoipa::path(
    get,
    path = "/products/",
    tags = ["Products"],
    params(ProductListParams, PageParams),
    responses(
        (status = 200, description = "List products successfully", body = StdResponse<Page<ProductRes>, String>),
        (status = 400, description = "Malformed filter value"),
        (status = 404, description = "Invalid page")
    )
)]
async fn get_products(
    State(state): State<AppState>,
    Query(params): Query<ProductListParams>,
    Query(page): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let filter = ProductFilter::try_from(params)?.in_stock_only();
    let page = page.page_request()?;

    let listing = state.store.list_products(&filter, page).await?;
    page.check(listing.count)?;

    let results: Vec<ProductRes> = listing.products.iter().map(ProductRes::from).collect();
    Ok(StdResponse {
        data: Some(Page::new(page, listing.count, results)),
        message: Some("List products successfully"),
    })
}

/// Fetch every product regardless of stock.
#[utoipa::path(
    get,
    path = "/products/all/",
    tags = ["Products"],
    responses(
        (status = 200, description = "List all products successfully", body = StdResponse<Vec<ProductRes>, String>)
    )
)]
async fn get_all_products(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let products = state.store.all_products().await?;

    Ok(StdResponse {
        data: Some(products.iter().map(ProductRes::from).collect::<Vec<_>>()),
        message: Some("List all products successfully"),
    })
}

/// Product count, highest price and the full product list.
#[utoipa::path(
    get,
    path = "/products/info/",
    tags = ["Products"],
    responses(
        (status = 200, description = "Get product info successfully", body = StdResponse<ProductInfoRes, String>)
    )
)]
async fn get_product_info(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let products = state.store.all_products().await?;

    Ok(StdResponse {
        data: Some(ProductInfoRes::from_products(&products)),
        message: Some("Get product info successfully"),
    })
}

/// Fetch a specific product.
#[utoipa::path(
    get,
    path = "/products/{id}/",
    tags = ["Products"],
    params(
        ("id" = i32, Path, description = "Product ID to fetch")
    ),
    responses(
        (status = 200, description = "Get product successfully", body = StdResponse<ProductRes, String>),
        (status = 404, description = "No such product")
    )
)]
async fn get_product(
    IdPath(id): IdPath<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let product = state.store.get_product(id).await?;

    Ok(StdResponse {
        data: Some(ProductRes::from(&product)),
        message: Some("Get product successfully"),
    })
}

/// Body for product writes. Fields stay raw JSON so that missing or mistyped
/// values come back as field errors rather than a deserialization failure.
#[derive(Deserialize, ToSchema, Debug, Default)]
struct ProductReq {
    #[schema(value_type = Option<String>)]
    name: Option<Value>,
    #[schema(value_type = Option<String>)]
    description: Option<Value>,
    #[schema(value_type = Option<String>, example = "19.99")]
    price: Option<Value>,
    #[schema(value_type = Option<i64>)]
    stock: Option<Value>,
    #[schema(value_type = Option<String>)]
    image: Option<Value>,
}

/// The fields of a [`ProductReq`] that decoded to their expected types.
struct ProductFields {
    name: Option<String>,
    description: Option<String>,
    price: Option<Decimal>,
    stock: Option<i64>,
    image: Option<String>,
}

impl ProductReq {
    fn decode(self, errors: &mut FieldErrors) -> ProductFields {
        ProductFields {
            name: errors.decode("name", self.name, INVALID_STRING).flatten(),
            description: errors
                .decode("description", self.description, INVALID_STRING)
                .flatten(),
            price: errors.decode("price", self.price, INVALID_NUMBER).flatten(),
            stock: errors.decode("stock", self.stock, INVALID_INTEGER).flatten(),
            image: errors.decode("image", self.image, INVALID_STRING).flatten(),
        }
    }

    /// Full representation, as required by create and `PUT`.
    fn into_create(self) -> Result<CreateProductEntity, FieldErrors> {
        let mut errors = FieldErrors::new();
        for (field, raw) in [
            ("name", &self.name),
            ("price", &self.price),
            ("stock", &self.stock),
        ] {
            if raw.is_none() {
                errors.add(field, REQUIRED);
            }
        }

        let fields = self.decode(&mut errors);
        match (fields.name, fields.price, fields.stock) {
            (Some(name), Some(price), Some(stock)) if errors.is_empty() => {
                CreateProductEntity::new(
                    &name,
                    fields.description.as_deref().unwrap_or_default(),
                    price,
                    stock,
                    fields.image,
                )
            }
            _ => Err(errors),
        }
    }

    /// Only the fields present in the body, each validated on its own.
    fn into_changes(self) -> Result<UpdateProductEntity, FieldErrors> {
        let mut errors = FieldErrors::new();
        let fields = self.decode(&mut errors);
        let changes = UpdateProductEntity {
            name: fields
                .name
                .and_then(|name| errors.check("name", validation::validate_name(&name))),
            description: fields.description.and_then(|description| {
                errors.check("description", validation::validate_description(&description))
            }),
            price: fields
                .price
                .and_then(|price| errors.check("price", validation::validate_price(price))),
            stock: fields
                .stock
                .and_then(|stock| errors.check("stock", validation::validate_stock(stock))),
            image: fields.image.map(Some),
        };
        errors.into_result()?;
        Ok(changes)
    }
}

/// Create a new product.
#[utoipa::path(
    post,
    path = "/products/",
    tags = ["Products"],
    security(("basicAuth" = [])),
    request_body = ProductReq,
    responses(
        (status = 201, description = "Created product successfully", body = StdResponse<ProductRes, String>),
        (status = 400, description = "Invalid fields"),
        (status = 401, description = "Missing or invalid credentials"),
        (status = 403, description = "Not a staff account")
    )
)]
async fn create_product(
    State(state): State<AppState>,
    Json(body): Json<ProductReq>,
) -> Result<impl IntoResponse, AppError> {
    let product = state.store.create_product(body.into_create()?).await?;
    info!(product_id = product.id, "product created");

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(ProductRes::from(&product)),
            message: Some("Created product successfully"),
        },
    ))
}

/// Replace every field of a product.
#[utoipa::path(
    put,
    path = "/products/{id}/",
    tags = ["Products"],
    security(("basicAuth" = [])),
    params(
        ("id" = i32, Path, description = "Product ID to replace")
    ),
    request_body = ProductReq,
    responses(
        (status = 200, description = "Updated product successfully", body = StdResponse<ProductRes, String>),
        (status = 400, description = "Invalid fields"),
        (status = 404, description = "No such product")
    )
)]
async fn replace_product(
    IdPath(id): IdPath<i32>,
    State(state): State<AppState>,
    Json(body): Json<ProductReq>,
) -> Result<impl IntoResponse, AppError> {
    let changes = UpdateProductEntity::from(body.into_create()?);
    let product = state.store.update_product(id, changes).await?;

    Ok(StdResponse {
        data: Some(ProductRes::from(&product)),
        message: Some("Updated product successfully"),
    })
}

/// Update the given fields of a product.
#[utoipa::path(
    patch,
    path = "/products/{id}/",
    tags = ["Products"],
    security(("basicAuth" = [])),
    params(
        ("id" = i32, Path, description = "Product ID to update")
    ),
    request_body = ProductReq,
    responses(
        (status = 200, description = "Updated product successfully", body = StdResponse<ProductRes, String>),
        (status = 400, description = "Invalid fields"),
        (status = 404, description = "No such product")
    )
)]
async fn update_product(
    IdPath(id): IdPath<i32>,
    State(state): State<AppState>,
    Json(body): Json<ProductReq>,
) -> Result<impl IntoResponse, AppError> {
    let product = state.store.update_product(id, body.into_changes()?).await?;

    Ok(StdResponse {
        data: Some(ProductRes::from(&product)),
        message: Some("Updated product successfully"),
    })
}

/// Delete a product together with the order items that reference it.
#[utoipa::path(
    delete,
    path = "/products/{id}/",
    tags = ["Products"],
    security(("basicAuth" = [])),
    params(
        ("id" = i32, Path, description = "Product ID to delete")
    ),
    responses(
        (status = 204, description = "Deleted product successfully"),
        (status = 404, description = "No such product")
    )
)]
async fn delete_product(
    IdPath(id): IdPath<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    state.store.delete_product(id).await?;
    info!(product_id = id, "product deleted");

    Ok(StatusCode::NO_CONTENT)
}
