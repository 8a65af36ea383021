//! Persistence port used by the HTTP handlers.
//!
//! `PgCatalogStore` is the production adapter. `InMemoryCatalogStore` mirrors
//! its semantics, cascades included, for tests.

use async_trait::async_trait;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;
use uuid::Uuid;

use crate::filters::{OrderFilter, ProductFilter};
use crate::models::{
    CreateProductEntity, CreateUserEntity, NewOrder, OrderEntity, OrderItemEntity, OrderStatus,
    ProductEntity, UpdateProductEntity, UserEntity,
};
use crate::pagination::PageRequest;

#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod postgres;

#[cfg(any(test, feature = "test-support"))]
pub use memory::InMemoryCatalogStore;
pub use postgres::PgCatalogStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("unknown product ids: {0:?}")]
    UnknownProducts(Vec<i32>),

    /// The order's status no longer matches the one the caller checked against.
    #[error("order status is no longer {expected}")]
    StaleStatus { expected: OrderStatus },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("failed to get connection from pool: {0}")]
    Pool(String),

    #[error("database error: {0}")]
    Query(DieselError),

    #[error("{0}")]
    Internal(String),
}

impl From<DieselError> for StoreError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => Self::NotFound,
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                Self::Conflict(info.message().to_owned())
            }
            DieselError::DatabaseError(
                DatabaseErrorKind::CheckViolation
                | DatabaseErrorKind::ForeignKeyViolation
                | DatabaseErrorKind::NotNullViolation,
                info,
            ) => {
                debug!(message = info.message(), "constraint rejected write");
                Self::Constraint(info.message().to_owned())
            }
            other => Self::Query(other),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One page of products plus the size of the whole filtered set.
#[derive(Debug, Clone)]
pub struct ProductPage {
    pub count: i64,
    pub products: Vec<ProductEntity>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderLine {
    pub item: OrderItemEntity,
    pub product: ProductEntity,
}

/// An order with its items and their products loaded eagerly.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDetails {
    pub order: OrderEntity,
    pub lines: Vec<OrderLine>,
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn create_user(&self, user: CreateUserEntity) -> StoreResult<UserEntity>;

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<UserEntity>>;

    /// Filtered, ordered page of products.
    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> StoreResult<ProductPage>;

    /// Every product ordered by primary key.
    async fn all_products(&self) -> StoreResult<Vec<ProductEntity>>;

    async fn get_product(&self, id: i32) -> StoreResult<ProductEntity>;

    async fn create_product(&self, product: CreateProductEntity) -> StoreResult<ProductEntity>;

    async fn update_product(
        &self,
        id: i32,
        changes: UpdateProductEntity,
    ) -> StoreResult<ProductEntity>;

    /// Also removes every order item referencing the product.
    async fn delete_product(&self, id: i32) -> StoreResult<()>;

    /// Newest orders first.
    async fn list_orders(&self, filter: &OrderFilter) -> StoreResult<Vec<OrderDetails>>;

    /// `owner` restricts the lookup to that user's orders.
    async fn get_order(&self, order_id: Uuid, owner: Option<i32>) -> StoreResult<OrderDetails>;

    /// Inserts the order and its items atomically. Unknown product ids abort the write.
    async fn create_order(&self, order: NewOrder) -> StoreResult<OrderDetails>;

    /// Compare-and-set: only writes `status` while the stored status is still
    /// `expected`, otherwise fails with [`StoreError::StaleStatus`].
    async fn update_order_status(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        status: OrderStatus,
    ) -> StoreResult<OrderDetails>;

    /// Also removes the order's items.
    async fn delete_order(&self, order_id: Uuid) -> StoreResult<()>;
}
