use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::filters::{OrderFilter, ProductFilter};
use crate::models::{
    CreateProductEntity, CreateUserEntity, NewOrder, OrderEntity, OrderItemEntity, OrderStatus,
    ProductEntity, UpdateProductEntity, UserEntity,
};
use crate::pagination::PageRequest;

use super::{CatalogStore, OrderDetails, OrderLine, ProductPage, StoreError, StoreResult};

#[derive(Default)]
struct Tables {
    users: Vec<UserEntity>,
    products: BTreeMap<i32, ProductEntity>,
    orders: Vec<OrderEntity>,
    items: Vec<OrderItemEntity>,
    next_user_id: i32,
    next_product_id: i32,
    next_item_id: i32,
}

impl Tables {
    fn details(&self, order: &OrderEntity) -> OrderDetails {
        let lines = self
            .items
            .iter()
            .filter(|item| item.order_id == order.order_id)
            .filter_map(|item| {
                let product = self.products.get(&item.product_id)?.clone();
                Some(OrderLine {
                    item: item.clone(),
                    product,
                })
            })
            .collect();

        OrderDetails {
            order: order.clone(),
            lines,
        }
    }

    fn order_mut(&mut self, order_id: Uuid) -> StoreResult<&mut OrderEntity> {
        self.orders
            .iter_mut()
            .find(|order| order.order_id == order_id)
            .ok_or(StoreError::NotFound)
    }
}

/// Store kept in process memory, with the same cascades as the SQL schema.
#[derive(Default)]
pub struct InMemoryCatalogStore {
    tables: Mutex<Tables>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Internal("in-memory store lock poisoned".into()))
    }

    /// Number of stored order items, for cascade assertions.
    pub fn order_item_count(&self) -> usize {
        self.tables().map(|tables| tables.items.len()).unwrap_or_default()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn create_user(&self, user: CreateUserEntity) -> StoreResult<UserEntity> {
        let mut tables = self.tables()?;
        if tables
            .users
            .iter()
            .any(|existing| existing.username == user.username)
        {
            return Err(StoreError::Conflict(format!(
                "username `{}` already exists",
                user.username
            )));
        }

        tables.next_user_id += 1;
        let user = UserEntity {
            id: tables.next_user_id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            is_staff: user.is_staff,
            date_joined: Utc::now(),
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<UserEntity>> {
        let tables = self.tables()?;
        Ok(tables
            .users
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> StoreResult<ProductPage> {
        let tables = self.tables()?;
        let mut matching: Vec<ProductEntity> = tables
            .products
            .values()
            .filter(|product| filter.matches(product))
            .cloned()
            .collect();
        filter.sort(&mut matching);

        let count = i64::try_from(matching.len()).unwrap_or(i64::MAX);
        let products = matching
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(page.size).unwrap_or(usize::MAX))
            .collect();

        Ok(ProductPage { count, products })
    }

    async fn all_products(&self) -> StoreResult<Vec<ProductEntity>> {
        let tables = self.tables()?;
        Ok(tables.products.values().cloned().collect())
    }

    async fn get_product(&self, id: i32) -> StoreResult<ProductEntity> {
        let tables = self.tables()?;
        tables.products.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn create_product(&self, product: CreateProductEntity) -> StoreResult<ProductEntity> {
        let mut tables = self.tables()?;
        tables.next_product_id += 1;
        let product = ProductEntity {
            id: tables.next_product_id,
            name: product.name,
            description: product.description,
            price: product.price,
            stock: product.stock,
            image: product.image,
        };
        tables.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        id: i32,
        changes: UpdateProductEntity,
    ) -> StoreResult<ProductEntity> {
        let mut tables = self.tables()?;
        let product = tables.products.get_mut(&id).ok_or(StoreError::NotFound)?;
        changes.apply_to(product);
        Ok(product.clone())
    }

    async fn delete_product(&self, id: i32) -> StoreResult<()> {
        let mut tables = self.tables()?;
        tables.products.remove(&id).ok_or(StoreError::NotFound)?;
        tables.items.retain(|item| item.product_id != id);
        Ok(())
    }

    async fn list_orders(&self, filter: &OrderFilter) -> StoreResult<Vec<OrderDetails>> {
        let tables = self.tables()?;
        let mut orders: Vec<&OrderEntity> = tables
            .orders
            .iter()
            .filter(|order| filter.matches(order))
            .collect();
        orders.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.order_id.cmp(&b.order_id))
        });

        Ok(orders.into_iter().map(|order| tables.details(order)).collect())
    }

    async fn get_order(&self, order_id: Uuid, owner: Option<i32>) -> StoreResult<OrderDetails> {
        let tables = self.tables()?;
        tables
            .orders
            .iter()
            .find(|order| {
                order.order_id == order_id && owner.is_none_or(|user_id| order.user_id == user_id)
            })
            .map(|order| tables.details(order))
            .ok_or(StoreError::NotFound)
    }

    async fn create_order(&self, order: NewOrder) -> StoreResult<OrderDetails> {
        let mut tables = self.tables()?;

        let missing: Vec<i32> = order
            .product_ids()
            .into_iter()
            .filter(|id| !tables.products.contains_key(id))
            .collect();
        if !missing.is_empty() {
            return Err(StoreError::UnknownProducts(missing));
        }
        if !tables.users.iter().any(|user| user.id == order.order.user_id) {
            return Err(StoreError::Constraint(format!(
                "user {} does not exist",
                order.order.user_id
            )));
        }

        let created = OrderEntity {
            order_id: order.order.order_id,
            user_id: order.order.user_id,
            created_at: Utc::now(),
            status: order.order.status,
        };
        for item in order.items {
            tables.next_item_id += 1;
            let id = tables.next_item_id;
            tables.items.push(OrderItemEntity {
                id,
                order_id: item.order_id,
                product_id: item.product_id,
                quantity: item.quantity,
            });
        }
        tables.orders.push(created.clone());

        Ok(tables.details(&created))
    }

    async fn update_order_status(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        status: OrderStatus,
    ) -> StoreResult<OrderDetails> {
        let mut tables = self.tables()?;
        let order = tables.order_mut(order_id)?;
        if order.status != expected {
            return Err(StoreError::StaleStatus { expected });
        }
        order.status = status;
        let order = order.clone();
        Ok(tables.details(&order))
    }

    async fn delete_order(&self, order_id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables()?;
        let before = tables.orders.len();
        tables.orders.retain(|order| order.order_id != order_id);
        if tables.orders.len() == before {
            return Err(StoreError::NotFound);
        }
        tables.items.retain(|item| item.order_id != order_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    async fn store_with_order() -> (InMemoryCatalogStore, OrderDetails) {
        let store = InMemoryCatalogStore::new();
        let user = store
            .create_user(CreateUserEntity {
                username: "ada".into(),
                email: "ada@example.com".into(),
                password_hash: "unused".into(),
                is_staff: false,
            })
            .await
            .unwrap();
        let lamp = store
            .create_product(
                CreateProductEntity::new("Lamp", "", Decimal::new(2500, 2), 20, None).unwrap(),
            )
            .await
            .unwrap();
        let rug = store
            .create_product(
                CreateProductEntity::new("Rug", "", Decimal::new(4000, 2), 2, None).unwrap(),
            )
            .await
            .unwrap();
        let order = store
            .create_order(
                NewOrder::new(user.id, OrderStatus::Pending, [(lamp.id, 2), (rug.id, 1)]).unwrap(),
            )
            .await
            .unwrap();
        (store, order)
    }

    #[tokio::test]
    async fn deleting_a_product_cascades_to_its_items() {
        let (store, order) = store_with_order().await;
        assert_eq!(store.order_item_count(), 2);

        let rug_id = order.lines[1].product.id;
        store.delete_product(rug_id).await.unwrap();

        assert_eq!(store.order_item_count(), 1);
        let reloaded = store.get_order(order.order.order_id, None).await.unwrap();
        assert_eq!(reloaded.lines.len(), 1);
        assert_eq!(reloaded.lines[0].product.name, "Lamp");
    }

    #[tokio::test]
    async fn deleting_an_order_cascades_to_its_items() {
        let (store, order) = store_with_order().await;
        store.delete_order(order.order.order_id).await.unwrap();

        assert_eq!(store.order_item_count(), 0);
        assert!(matches!(
            store.get_order(order.order.order_id, None).await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            store.delete_order(order.order.order_id).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn unknown_products_abort_order_creation() {
        let (store, order) = store_with_order().await;
        let result = store
            .create_order(NewOrder::new(order.order.user_id, OrderStatus::Pending, [(99, 1)]).unwrap())
            .await;

        assert!(matches!(result, Err(StoreError::UnknownProducts(ids)) if ids == vec![99]));
        assert_eq!(store.order_item_count(), 2);
    }

    #[tokio::test]
    async fn owner_scoping_hides_other_users_orders() {
        let (store, order) = store_with_order().await;
        let id = order.order.order_id;

        assert!(store.get_order(id, Some(order.order.user_id)).await.is_ok());
        assert!(matches!(
            store.get_order(id, Some(order.order.user_id + 1)).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn duplicate_usernames_conflict() {
        let (store, _) = store_with_order().await;
        let result = store
            .create_user(CreateUserEntity {
                username: "ada".into(),
                email: String::new(),
                password_hash: "unused".into(),
                is_staff: true,
            })
            .await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn status_updates_compare_and_set() {
        let (store, order) = store_with_order().await;
        let id = order.order.order_id;

        let cancelled = store
            .update_order_status(id, OrderStatus::Pending, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(cancelled.order.status, OrderStatus::Cancelled);

        let stale = store
            .update_order_status(id, OrderStatus::Pending, OrderStatus::Confirmed)
            .await;
        assert!(matches!(
            stale,
            Err(StoreError::StaleStatus { expected: OrderStatus::Pending })
        ));
        let reloaded = store.get_order(id, None).await.unwrap();
        assert_eq!(reloaded.order.status, OrderStatus::Cancelled);

        assert!(matches!(
            store
                .update_order_status(Uuid::new_v4(), OrderStatus::Pending, OrderStatus::Confirmed)
                .await,
            Err(StoreError::NotFound)
        ));
    }
}
