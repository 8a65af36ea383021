use std::collections::HashMap;

use async_trait::async_trait;
use diesel::pg::Pg;
use diesel::{
    BelongingToDsl, BoolExpressionMethods, ExpressionMethods, GroupedBy, OptionalExtension,
    PgTextExpressionMethods, QueryDsl, SelectableHelper, TextExpressionMethods,
};
use diesel_async::pooled_connection::bb8::PooledConnection;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use tracing::info;
use uuid::Uuid;

use crate::app::db::DbPool;
use crate::filters::{OrderFilter, ProductFilter, SortKey};
use crate::models::{
    CreateProductEntity, CreateUserEntity, NewOrder, OrderEntity, OrderItemEntity, OrderStatus,
    ProductEntity, UpdateProductEntity, UserEntity,
};
use crate::pagination::PageRequest;
use crate::schema::{order_items, orders, products, users};

use super::{CatalogStore, OrderDetails, OrderLine, ProductPage, StoreError, StoreResult};

/// Diesel-backed store over a bb8 pool of async PostgreSQL connections.
#[derive(Clone)]
pub struct PgCatalogStore {
    pool: DbPool,
}

impl PgCatalogStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> StoreResult<PooledConnection<'_, AsyncPgConnection>> {
        self.pool
            .get()
            .await
            .map_err(|err| StoreError::Pool(err.to_string()))
    }
}

/// `LIKE` pattern matching `fragment` anywhere, with wildcards in it escaped.
fn contains_pattern(fragment: &str) -> String {
    let escaped = fragment
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn filtered_products(filter: &ProductFilter) -> products::BoxedQuery<'static, Pg> {
    let mut query = products::table.into_boxed();

    if let Some(threshold) = filter.stock_above {
        query = query.filter(products::stock.gt(threshold));
    }
    if let Some(name) = &filter.name {
        query = query.filter(products::name.eq(name.clone()));
    }
    if let Some(fragment) = &filter.name_contains {
        query = query.filter(products::name.like(contains_pattern(fragment)));
    }
    if let Some(price) = filter.price {
        query = query.filter(products::price.eq(price));
    }
    if let Some(bound) = filter.price_lt {
        query = query.filter(products::price.lt(bound));
    }
    if let Some(bound) = filter.price_gt {
        query = query.filter(products::price.gt(bound));
    }
    if let Some((low, high)) = filter.price_range {
        query = query.filter(products::price.between(low, high));
    }
    for term in &filter.search_terms {
        let pattern = contains_pattern(term);
        query = query.filter(
            products::name
                .ilike(pattern.clone())
                .or(products::description.ilike(pattern)),
        );
    }

    query
}

fn filtered_orders(filter: &OrderFilter) -> orders::BoxedQuery<'static, Pg> {
    let mut query = orders::table.into_boxed();

    if let Some(user_id) = filter.user_id {
        query = query.filter(orders::user_id.eq(user_id));
    }
    if let Some(status) = filter.status {
        query = query.filter(orders::status.eq(status));
    }
    if let Some(bound) = filter.created_before {
        query = query.filter(orders::created_at.lt(bound));
    }
    if let Some(bound) = filter.created_after {
        query = query.filter(orders::created_at.gt(bound));
    }

    query
}

/// Loads items and products for `orders` with one query per relation.
async fn load_details(
    conn: &mut AsyncPgConnection,
    orders: Vec<OrderEntity>,
) -> StoreResult<Vec<OrderDetails>> {
    let items: Vec<OrderItemEntity> = OrderItemEntity::belonging_to(&orders)
        .select(OrderItemEntity::as_select())
        .order_by(order_items::id.asc())
        .load(conn)
        .await?;

    let product_ids: Vec<i32> = items.iter().map(|item| item.product_id).collect();
    let products: HashMap<i32, ProductEntity> = products::table
        .filter(products::id.eq_any(&product_ids))
        .select(ProductEntity::as_select())
        .load(conn)
        .await?
        .into_iter()
        .map(|product| (product.id, product))
        .collect();

    let grouped = items.grouped_by(&orders);
    Ok(orders
        .into_iter()
        .zip(grouped)
        .map(|(order, items)| OrderDetails {
            order,
            lines: items
                .into_iter()
                .filter_map(|item| {
                    let product = products.get(&item.product_id)?.clone();
                    Some(OrderLine { item, product })
                })
                .collect(),
        })
        .collect())
}

async fn load_one(conn: &mut AsyncPgConnection, order: OrderEntity) -> StoreResult<OrderDetails> {
    load_details(conn, vec![order])
        .await?
        .pop()
        .ok_or(StoreError::NotFound)
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn create_user(&self, user: CreateUserEntity) -> StoreResult<UserEntity> {
        let conn = &mut self.conn().await?;

        let user = diesel::insert_into(users::table)
            .values(user)
            .returning(UserEntity::as_returning())
            .get_result(conn)
            .await?;

        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<UserEntity>> {
        let conn = &mut self.conn().await?;

        let user = users::table
            .filter(users::username.eq(username))
            .select(UserEntity::as_select())
            .first(conn)
            .await;

        match user {
            Ok(user) => Ok(Some(user)),
            Err(diesel::result::Error::NotFound) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> StoreResult<ProductPage> {
        let conn = &mut self.conn().await?;

        let count: i64 = filtered_products(filter).count().get_result(conn).await?;

        let mut query = filtered_products(filter);
        for field in &filter.ordering {
            query = match (field.key, field.descending) {
                (SortKey::Name, false) => query.then_order_by(products::name.asc()),
                (SortKey::Name, true) => query.then_order_by(products::name.desc()),
                (SortKey::Price, false) => query.then_order_by(products::price.asc()),
                (SortKey::Price, true) => query.then_order_by(products::price.desc()),
                (SortKey::Stock, false) => query.then_order_by(products::stock.asc()),
                (SortKey::Stock, true) => query.then_order_by(products::stock.desc()),
            };
        }

        let products = query
            .then_order_by(products::id.asc())
            .limit(page.size)
            .offset(page.offset())
            .select(ProductEntity::as_select())
            .load(conn)
            .await?;

        Ok(ProductPage { count, products })
    }

    async fn all_products(&self) -> StoreResult<Vec<ProductEntity>> {
        let conn = &mut self.conn().await?;

        let products = products::table
            .order_by(products::id.asc())
            .select(ProductEntity::as_select())
            .load(conn)
            .await?;

        Ok(products)
    }

    async fn get_product(&self, id: i32) -> StoreResult<ProductEntity> {
        let conn = &mut self.conn().await?;

        let product = products::table
            .find(id)
            .select(ProductEntity::as_select())
            .get_result(conn)
            .await?;

        Ok(product)
    }

    async fn create_product(&self, product: CreateProductEntity) -> StoreResult<ProductEntity> {
        let conn = &mut self.conn().await?;

        let product = diesel::insert_into(products::table)
            .values(product)
            .returning(ProductEntity::as_returning())
            .get_result(conn)
            .await?;

        Ok(product)
    }

    async fn update_product(
        &self,
        id: i32,
        changes: UpdateProductEntity,
    ) -> StoreResult<ProductEntity> {
        if changes.is_empty() {
            return self.get_product(id).await;
        }

        let conn = &mut self.conn().await?;

        let product = diesel::update(products::table.find(id))
            .set(changes)
            .returning(ProductEntity::as_returning())
            .get_result(conn)
            .await?;

        Ok(product)
    }

    async fn delete_product(&self, id: i32) -> StoreResult<()> {
        let conn = &mut self.conn().await?;

        let deleted = diesel::delete(products::table.find(id))
            .execute(conn)
            .await?;

        if deleted == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_orders(&self, filter: &OrderFilter) -> StoreResult<Vec<OrderDetails>> {
        let mut pooled = self.conn().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        let orders: Vec<OrderEntity> = filtered_orders(filter)
            .order_by((orders::created_at.desc(), orders::order_id.asc()))
            .select(OrderEntity::as_select())
            .load(conn)
            .await?;

        load_details(conn, orders).await
    }

    async fn get_order(&self, order_id: Uuid, owner: Option<i32>) -> StoreResult<OrderDetails> {
        let mut pooled = self.conn().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        let mut query = orders::table.find(order_id).into_boxed();
        if let Some(user_id) = owner {
            query = query.filter(orders::user_id.eq(user_id));
        }
        let order: OrderEntity = query
            .select(OrderEntity::as_select())
            .get_result(conn)
            .await?;

        load_one(conn, order).await
    }

    async fn create_order(&self, order: NewOrder) -> StoreResult<OrderDetails> {
        let mut pooled = self.conn().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        let product_ids = order.product_ids();
        let order = conn
            .transaction(move |tx| {
                Box::pin(async move {
                    let found: Vec<i32> = products::table
                        .filter(products::id.eq_any(&product_ids))
                        .select(products::id)
                        .load(tx)
                        .await?;
                    let missing: Vec<i32> = product_ids
                        .into_iter()
                        .filter(|id| !found.contains(id))
                        .collect();
                    if !missing.is_empty() {
                        return Err(StoreError::UnknownProducts(missing));
                    }

                    let created: OrderEntity = diesel::insert_into(orders::table)
                        .values(&order.order)
                        .returning(OrderEntity::as_returning())
                        .get_result(tx)
                        .await?;

                    if !order.items.is_empty() {
                        diesel::insert_into(order_items::table)
                            .values(&order.items)
                            .execute(tx)
                            .await?;
                    }

                    Ok::<OrderEntity, StoreError>(created)
                })
            })
            .await?;

        info!(order_id = %order.order_id, user_id = order.user_id, "order created");
        load_one(conn, order).await
    }

    async fn update_order_status(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        status: OrderStatus,
    ) -> StoreResult<OrderDetails> {
        let mut pooled = self.conn().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        // The status filter makes the check and the write a single statement.
        let updated: Option<OrderEntity> = diesel::update(
            orders::table
                .find(order_id)
                .filter(orders::status.eq(expected)),
        )
        .set(orders::status.eq(status))
        .returning(OrderEntity::as_returning())
        .get_result(conn)
        .await
        .optional()?;

        let Some(order) = updated else {
            let exists: i64 = orders::table
                .find(order_id)
                .count()
                .get_result(conn)
                .await?;
            return Err(if exists == 0 {
                StoreError::NotFound
            } else {
                StoreError::StaleStatus { expected }
            });
        };

        load_one(conn, order).await
    }

    async fn delete_order(&self, order_id: Uuid) -> StoreResult<()> {
        let conn = &mut self.conn().await?;

        let deleted = diesel::delete(orders::table.find(order_id))
            .execute(conn)
            .await?;

        if deleted == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
