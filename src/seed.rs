//! Fixture records for a fresh database: one customer, three products and a
//! pending order, plus an optional staff account.

use anyhow::Context;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::auth::PasswordHasher;
use crate::models::{CreateProductEntity, CreateUserEntity, NewOrder, OrderStatus};
use crate::store::CatalogStore;

#[derive(Debug, Clone, Copy, Default)]
pub struct SeedOptions {
    /// Also create an `admin` staff account with password `admin`.
    pub with_admin: bool,
}

#[derive(Debug, Clone)]
pub struct SeedSummary {
    pub user_id: i32,
    pub admin_id: Option<i32>,
    pub product_ids: Vec<i32>,
    pub order_id: Uuid,
}

const PRODUCTS: [(&str, &str, i64, i64); 3] = [
    ("Product 1", "Description for Product 1", 100, 10),
    ("Product 2", "Description for Product 2", 50, 20),
    ("Product 3", "Description for Product 3", 30, 5),
];

async fn create_user(
    store: &dyn CatalogStore,
    hasher: &PasswordHasher,
    username: &str,
    password: &str,
    email: &str,
    is_staff: bool,
) -> anyhow::Result<i32> {
    let user = store
        .create_user(CreateUserEntity {
            username: username.to_owned(),
            email: email.to_owned(),
            password_hash: hasher.hash(password)?,
            is_staff,
        })
        .await
        .with_context(|| format!("Failed to create user `{username}`"))?;
    Ok(user.id)
}

pub async fn populate(
    store: &dyn CatalogStore,
    hasher: &PasswordHasher,
    options: SeedOptions,
) -> anyhow::Result<SeedSummary> {
    let user_id = create_user(
        store,
        hasher,
        "john_doe",
        "password",
        "john@example.com",
        false,
    )
    .await?;

    let admin_id = if options.with_admin {
        Some(create_user(store, hasher, "admin", "admin", "admin@example.com", true).await?)
    } else {
        None
    };

    let mut product_ids = Vec::with_capacity(PRODUCTS.len());
    for (name, description, price, stock) in PRODUCTS {
        let product = CreateProductEntity::new(name, description, Decimal::from(price), stock, None)?;
        let product = store
            .create_product(product)
            .await
            .with_context(|| format!("Failed to create `{name}`"))?;
        product_ids.push(product.id);
    }

    let order = NewOrder::new(
        user_id,
        OrderStatus::Pending,
        [(product_ids[0], 2), (product_ids[1], 1)],
    )?;
    let order = store
        .create_order(order)
        .await
        .context("Failed to create the sample order")?;

    info!(
        user_id,
        products = product_ids.len(),
        order_id = %order.order.order_id,
        "populated the database with dummy data"
    );

    Ok(SeedSummary {
        user_id,
        admin_id,
        product_ids,
        order_id: order.order.order_id,
    })
}
