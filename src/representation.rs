//! JSON representations of the catalog records, including computed fields.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{OrderStatus, ProductEntity};
use crate::store::{OrderDetails, OrderLine};
use crate::validation::PRICE_DECIMAL_PLACES;

fn money(mut amount: Decimal) -> Decimal {
    amount.rescale(PRICE_DECIMAL_PLACES);
    amount
}

#[derive(Serialize, ToSchema, Debug, Clone, PartialEq)]
pub struct ProductRes {
    pub id: i32,
    pub name: String,
    pub description: String,
    #[schema(value_type = String, example = "100.00")]
    pub price: Decimal,
    pub stock: i32,
    pub image: Option<String>,
    pub in_stock: bool,
}

impl From<&ProductEntity> for ProductRes {
    fn from(product: &ProductEntity) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            description: product.description.clone(),
            price: money(product.price),
            stock: product.stock,
            image: product.image.clone(),
            in_stock: product.in_stock(),
        }
    }
}

/// Product fields are read from the product as it is now, not as it was when
/// the order was placed.
#[derive(Serialize, ToSchema, Debug, Clone, PartialEq)]
pub struct OrderItemRes {
    pub product_name: String,
    #[schema(value_type = String, example = "50.00")]
    pub product_price: Decimal,
    pub quantity: i32,
    #[schema(value_type = String, example = "100.00")]
    pub item_subtotal: Decimal,
}

pub fn item_subtotal(price: Decimal, quantity: i32) -> Decimal {
    money(price * Decimal::from(quantity))
}

impl From<&OrderLine> for OrderItemRes {
    fn from(line: &OrderLine) -> Self {
        Self {
            product_name: line.product.name.clone(),
            product_price: money(line.product.price),
            quantity: line.item.quantity,
            item_subtotal: item_subtotal(line.product.price, line.item.quantity),
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone, PartialEq)]
pub struct OrderRes {
    pub order_id: Uuid,
    pub user: i32,
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
    /// Distinct products on the order, in item order.
    pub products: Vec<ProductRes>,
    pub items: Vec<OrderItemRes>,
    #[schema(value_type = String, example = "250.00")]
    pub total_price: Decimal,
}

impl From<&OrderDetails> for OrderRes {
    fn from(details: &OrderDetails) -> Self {
        let items: Vec<OrderItemRes> = details.lines.iter().map(OrderItemRes::from).collect();
        let total_price = money(items.iter().map(|item| item.item_subtotal).sum());

        let mut products: Vec<ProductRes> = Vec::new();
        for line in &details.lines {
            if products.iter().all(|product| product.id != line.product.id) {
                products.push(ProductRes::from(&line.product));
            }
        }

        Self {
            order_id: details.order.order_id,
            user: details.order.user_id,
            created_at: details.order.created_at,
            status: details.order.status,
            products,
            items,
            total_price,
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone, PartialEq)]
pub struct ProductInfoRes {
    pub products: Vec<ProductRes>,
    pub count: usize,
    /// `null` when there are no products.
    #[schema(value_type = Option<String>, example = "100.00")]
    pub max_price: Option<Decimal>,
}

impl ProductInfoRes {
    pub fn from_products(products: &[ProductEntity]) -> Self {
        Self {
            products: products.iter().map(ProductRes::from).collect(),
            count: products.len(),
            max_price: products.iter().map(|product| money(product.price)).max(),
        }
    }
}
