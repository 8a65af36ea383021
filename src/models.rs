use std::fmt;
use std::io::Write;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use diesel::{
    AsChangeset, AsExpression, FromSqlRow, Selectable,
    deserialize::{self, FromSql},
    pg::{Pg, PgValue},
    prelude::{Associations, Identifiable, Insertable, Queryable},
    serialize::{self, IsNull, Output, ToSql},
    sql_types::Text,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::validation::{self, FieldErrors};

// Users

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserEntity {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_staff: bool,
    pub date_joined: DateTime<Utc>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::users)]
pub struct CreateUserEntity {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_staff: bool,
}

// Products

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProductEntity {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock: i32,
    pub image: Option<String>,
}

impl ProductEntity {
    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

#[derive(Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::products)]
pub struct CreateProductEntity {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock: i32,
    pub image: Option<String>,
}

impl CreateProductEntity {
    /// Builds a validated insert. Every invalid field is reported, not just the first.
    pub fn new(
        name: &str,
        description: &str,
        price: Decimal,
        stock: i64,
        image: Option<String>,
    ) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();
        let name = errors.check("name", validation::validate_name(name));
        let description =
            errors.check("description", validation::validate_description(description));
        let price = errors.check("price", validation::validate_price(price));
        let stock = errors.check("stock", validation::validate_stock(stock));

        match (name, description, price, stock) {
            (Some(name), Some(description), Some(price), Some(stock)) => Ok(Self {
                name,
                description,
                price,
                stock,
                image,
            }),
            _ => Err(errors),
        }
    }
}

/// Partial product update; `None` leaves the column untouched.
#[derive(AsChangeset, Debug, Clone, Default, PartialEq)]
#[diesel(table_name = crate::schema::products)]
pub struct UpdateProductEntity {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub image: Option<Option<String>>,
}

impl UpdateProductEntity {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn apply_to(&self, product: &mut ProductEntity) {
        if let Some(name) = &self.name {
            product.name = name.clone();
        }
        if let Some(description) = &self.description {
            product.description = description.clone();
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(stock) = self.stock {
            product.stock = stock;
        }
        if let Some(image) = &self.image {
            product.image = image.clone();
        }
    }
}

impl From<CreateProductEntity> for UpdateProductEntity {
    fn from(product: CreateProductEntity) -> Self {
        Self {
            name: Some(product.name),
            description: Some(product.description),
            price: Some(product.price),
            stock: Some(product.stock),
            image: Some(product.image),
        }
    }
}

// Orders

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsExpression,
    FromSqlRow,
    ToSchema,
)]
#[diesel(sql_type = Text)]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Confirmed => "Confirmed",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Pending may be confirmed or cancelled, Confirmed may only be cancelled,
    /// Cancelled is terminal. Staying in the same state is always allowed.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed)
                | (Self::Pending, Self::Cancelled)
                | (Self::Confirmed, Self::Cancelled)
        ) || self == next
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown order status `{0}`")]
pub struct UnknownOrderStatus(String);

impl FromStr for OrderStatus {
    type Err = UnknownOrderStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Confirmed" => Ok(Self::Confirmed),
            "Cancelled" => Ok(Self::Cancelled),
            other => Err(UnknownOrderStatus(other.to_owned())),
        }
    }
}

impl ToSql<Text, Pg> for OrderStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for OrderStatus {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let raw = std::str::from_utf8(bytes.as_bytes())?;
        Ok(raw.parse()?)
    }
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(primary_key(order_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderEntity {
    pub order_id: Uuid,
    pub user_id: i32,
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreateOrderEntity {
    pub order_id: Uuid,
    pub user_id: i32,
    pub status: OrderStatus,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Debug, Clone, PartialEq)]
#[diesel(belongs_to(OrderEntity, foreign_key = order_id))]
#[diesel(belongs_to(ProductEntity, foreign_key = product_id))]
#[diesel(table_name = crate::schema::order_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderItemEntity {
    pub id: i32,
    pub order_id: Uuid,
    pub product_id: i32,
    pub quantity: i32,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::order_items)]
pub struct CreateOrderItemEntity {
    pub order_id: Uuid,
    pub product_id: i32,
    pub quantity: i32,
}

/// An order and its items, inserted together.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order: CreateOrderEntity,
    pub items: Vec<CreateOrderItemEntity>,
}

impl NewOrder {
    /// `lines` are `(product_id, quantity)` pairs. The order id is a fresh random UUID.
    pub fn new(
        user_id: i32,
        status: OrderStatus,
        lines: impl IntoIterator<Item = (i32, i32)>,
    ) -> Result<Self, FieldErrors> {
        let order_id = Uuid::new_v4();
        let mut errors = FieldErrors::new();
        let mut items = Vec::new();

        for (position, (product_id, quantity)) in lines.into_iter().enumerate() {
            match validation::validate_quantity(quantity) {
                Ok(quantity) => items.push(CreateOrderItemEntity {
                    order_id,
                    product_id,
                    quantity,
                }),
                Err(message) => errors.add("items", format!("Item {}: {message}", position + 1)),
            }
        }
        errors.into_result()?;

        Ok(Self {
            order: CreateOrderEntity {
                order_id,
                user_id,
                status,
            },
            items,
        })
    }

    /// Distinct product ids in first-seen order.
    pub fn product_ids(&self) -> Vec<i32> {
        let mut ids: Vec<i32> = Vec::with_capacity(self.items.len());
        for item in &self.items {
            if !ids.contains(&item.product_id) {
                ids.push(item.product_id);
            }
        }
        ids
    }
}
