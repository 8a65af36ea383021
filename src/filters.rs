//! Query-string filters for the product and order listings.
//!
//! Raw parameters are parsed into typed filters here. The stores translate the
//! typed filters into SQL (`store::postgres`) or apply them in memory via
//! [`ProductFilter::matches`] and [`ProductFilter::sort`].

use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::models::{OrderEntity, OrderStatus, ProductEntity};
use crate::validation::FieldErrors;

/// The general product listing only shows products with more stock than this.
pub const IN_STOCK_THRESHOLD: i32 = 10;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductListParams {
    /// Exact name match.
    pub name: Option<String>,
    /// Case-sensitive substring of the name.
    #[serde(rename = "name__contains")]
    pub name_contains: Option<String>,
    /// Exact price.
    pub price: Option<String>,
    #[serde(rename = "price__lt")]
    pub price_lt: Option<String>,
    #[serde(rename = "price__gt")]
    pub price_gt: Option<String>,
    /// Inclusive range written as `low,high`.
    #[serde(rename = "price__range")]
    pub price_range: Option<String>,
    /// Whitespace-separated terms matched against name and description.
    pub search: Option<String>,
    /// Comma-separated `name`, `price` or `stock`, prefix `-` for descending.
    pub ordering: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Price,
    Stock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortField {
    pub key: SortKey,
    pub descending: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductFilter {
    /// Implicit server-side predicate: only products with `stock` above this.
    pub stock_above: Option<i32>,
    pub name: Option<String>,
    pub name_contains: Option<String>,
    pub price: Option<Decimal>,
    pub price_lt: Option<Decimal>,
    pub price_gt: Option<Decimal>,
    pub price_range: Option<(Decimal, Decimal)>,
    pub search_terms: Vec<String>,
    pub ordering: Vec<SortField>,
}

fn non_blank(raw: Option<String>) -> Option<String> {
    raw.filter(|value| !value.trim().is_empty())
}

fn parse_decimal(raw: &str) -> Result<Decimal, String> {
    Decimal::from_str(raw.trim()).map_err(|_| "Enter a number.".to_string())
}

fn parse_range(raw: &str) -> Result<(Decimal, Decimal), String> {
    match raw.split(',').collect::<Vec<_>>().as_slice() {
        [low, high] => Ok((parse_decimal(low)?, parse_decimal(high)?)),
        _ => Err("Enter two numbers separated by a comma.".to_string()),
    }
}

/// Unknown fields are dropped, as are repeats of a key already listed.
pub fn parse_ordering(raw: &str) -> Vec<SortField> {
    let mut fields: Vec<SortField> = Vec::new();
    for token in raw.split(',').map(str::trim) {
        let (descending, name) = match token.strip_prefix('-') {
            Some(name) => (true, name),
            None => (false, token),
        };
        let key = match name {
            "name" => SortKey::Name,
            "price" => SortKey::Price,
            "stock" => SortKey::Stock,
            _ => continue,
        };
        if fields.iter().all(|field| field.key != key) {
            fields.push(SortField { key, descending });
        }
    }
    fields
}

impl TryFrom<ProductListParams> for ProductFilter {
    type Error = FieldErrors;

    fn try_from(params: ProductListParams) -> Result<Self, Self::Error> {
        let mut errors = FieldErrors::new();
        let mut decimal = |field: &str, raw: Option<String>| {
            non_blank(raw).and_then(|raw| errors.check(field, parse_decimal(&raw)))
        };
        let price = decimal("price", params.price);
        let price_lt = decimal("price__lt", params.price_lt);
        let price_gt = decimal("price__gt", params.price_gt);
        let price_range = non_blank(params.price_range)
            .and_then(|raw| errors.check("price__range", parse_range(&raw)));
        errors.into_result()?;

        Ok(Self {
            stock_above: None,
            name: non_blank(params.name),
            name_contains: non_blank(params.name_contains),
            price,
            price_lt,
            price_gt,
            price_range,
            search_terms: params
                .search
                .as_deref()
                .unwrap_or_default()
                .split_whitespace()
                .map(str::to_owned)
                .collect(),
            ordering: params.ordering.as_deref().map(parse_ordering).unwrap_or_default(),
        })
    }
}

impl ProductFilter {
    /// Restricts the filter to products above [`IN_STOCK_THRESHOLD`].
    pub fn in_stock_only(mut self) -> Self {
        self.stock_above = Some(IN_STOCK_THRESHOLD);
        self
    }

    pub fn matches(&self, product: &ProductEntity) -> bool {
        let price = product.price;
        self.stock_above.is_none_or(|threshold| product.stock > threshold)
            && self.name.as_ref().is_none_or(|name| &product.name == name)
            && self
                .name_contains
                .as_ref()
                .is_none_or(|fragment| product.name.contains(fragment.as_str()))
            && self.price.is_none_or(|exact| price == exact)
            && self.price_lt.is_none_or(|bound| price < bound)
            && self.price_gt.is_none_or(|bound| price > bound)
            && self
                .price_range
                .is_none_or(|(low, high)| low <= price && price <= high)
            && self.search_terms.iter().all(|term| {
                let term = term.to_lowercase();
                product.name.to_lowercase().contains(&term)
                    || product.description.to_lowercase().contains(&term)
            })
    }

    /// Sorts by the requested fields, falling back to the primary key.
    pub fn sort(&self, products: &mut [ProductEntity]) {
        products.sort_by(|a, b| {
            self.ordering
                .iter()
                .map(|field| {
                    let ordering = match field.key {
                        SortKey::Name => a.name.cmp(&b.name),
                        SortKey::Price => a.price.cmp(&b.price),
                        SortKey::Stock => a.stock.cmp(&b.stock),
                    };
                    if field.descending { ordering.reverse() } else { ordering }
                })
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or_else(|| a.id.cmp(&b.id))
        });
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderListParams {
    /// One of `Pending`, `Confirmed`, `Cancelled`.
    pub status: Option<String>,
    /// RFC 3339 timestamp; orders created strictly before it.
    #[serde(rename = "created_at__lt")]
    pub created_at_lt: Option<String>,
    /// RFC 3339 timestamp; orders created strictly after it.
    #[serde(rename = "created_at__gt")]
    pub created_at_gt: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderFilter {
    /// Restricts the listing to one owner.
    pub user_id: Option<i32>,
    pub status: Option<OrderStatus>,
    pub created_before: Option<DateTime<Utc>>,
    pub created_after: Option<DateTime<Utc>>,
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|_| "Enter a valid date/time.".to_string())
}

impl TryFrom<OrderListParams> for OrderFilter {
    type Error = FieldErrors;

    fn try_from(params: OrderListParams) -> Result<Self, Self::Error> {
        let mut errors = FieldErrors::new();
        let status = non_blank(params.status).and_then(|raw| {
            errors.check(
                "status",
                raw.trim()
                    .parse::<OrderStatus>()
                    .map_err(|_| format!("Select a valid choice. {raw} is not one of the available choices.")),
            )
        });
        let created_before = non_blank(params.created_at_lt)
            .and_then(|raw| errors.check("created_at__lt", parse_timestamp(&raw)));
        let created_after = non_blank(params.created_at_gt)
            .and_then(|raw| errors.check("created_at__gt", parse_timestamp(&raw)));
        errors.into_result()?;

        Ok(Self {
            user_id: None,
            status,
            created_before,
            created_after,
        })
    }
}

impl OrderFilter {
    pub fn owned_by(user_id: i32) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, order: &OrderEntity) -> bool {
        self.user_id.is_none_or(|user_id| order.user_id == user_id)
            && self.status.is_none_or(|status| order.status == status)
            && self
                .created_before
                .is_none_or(|bound| order.created_at < bound)
            && self
                .created_after
                .is_none_or(|bound| order.created_at > bound)
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;

    fn product(id: i32, name: &str, description: &str, price: i64, stock: i32) -> ProductEntity {
        ProductEntity {
            id,
            name: name.into(),
            description: description.into(),
            price: Decimal::new(price * 100, 2),
            stock,
            image: None,
        }
    }

    #[fixture]
    fn products() -> Vec<ProductEntity> {
        vec![
            product(1, "Desk Lamp", "Warm light", 40, 12),
            product(2, "Floor Lamp", "Tall and bright", 90, 30),
            product(3, "Chair", "Oak chair with lamp holder", 90, 11),
            product(4, "Rug", "Wool", 15, 3),
        ]
    }

    fn ids(products: &[ProductEntity], filter: &ProductFilter) -> Vec<i32> {
        products
            .iter()
            .filter(|product| filter.matches(product))
            .map(|product| product.id)
            .collect()
    }

    #[rstest]
    fn in_stock_only_hides_low_stock(products: Vec<ProductEntity>) {
        let filter = ProductFilter::default().in_stock_only();
        assert_eq!(ids(&products, &filter), vec![1, 2, 3]);
    }

    #[rstest]
    fn price_bounds_and_ranges(products: Vec<ProductEntity>) {
        let filter = ProductFilter::try_from(ProductListParams {
            price_gt: Some("20".into()),
            price_lt: Some("95".into()),
            ..ProductListParams::default()
        })
        .unwrap();
        assert_eq!(ids(&products, &filter), vec![1, 2, 3]);

        let filter = ProductFilter::try_from(ProductListParams {
            price_range: Some("15,40".into()),
            ..ProductListParams::default()
        })
        .unwrap();
        assert_eq!(ids(&products, &filter), vec![1, 4]);
    }

    #[rstest]
    fn name_exact_and_contains(products: Vec<ProductEntity>) {
        let exact = ProductFilter {
            name: Some("Rug".into()),
            ..ProductFilter::default()
        };
        assert_eq!(ids(&products, &exact), vec![4]);

        let contains = ProductFilter {
            name_contains: Some("Lamp".into()),
            ..ProductFilter::default()
        };
        assert_eq!(ids(&products, &contains), vec![1, 2]);

        let wrong_case = ProductFilter {
            name_contains: Some("lamp".into()),
            ..ProductFilter::default()
        };
        assert!(ids(&products, &wrong_case).is_empty());
    }

    #[rstest]
    fn search_terms_must_all_match(products: Vec<ProductEntity>) {
        let filter = ProductFilter::try_from(ProductListParams {
            search: Some("LAMP  oak".into()),
            ..ProductListParams::default()
        })
        .unwrap();
        assert_eq!(ids(&products, &filter), vec![3]);
    }

    #[rstest]
    fn ordering_with_primary_key_tiebreak(mut products: Vec<ProductEntity>) {
        let filter = ProductFilter {
            ordering: parse_ordering("-price,bogus"),
            ..ProductFilter::default()
        };
        filter.sort(&mut products);
        let order: Vec<i32> = products.iter().map(|product| product.id).collect();
        assert_eq!(order, vec![2, 3, 1, 4]);
    }

    #[test]
    fn ordering_ignores_unknown_and_duplicate_keys() {
        assert_eq!(
            parse_ordering("stock, -stock,description,-name"),
            vec![
                SortField {
                    key: SortKey::Stock,
                    descending: false
                },
                SortField {
                    key: SortKey::Name,
                    descending: true
                },
            ]
        );
    }

    #[test]
    fn malformed_prices_are_field_errors() {
        let errors = ProductFilter::try_from(ProductListParams {
            price: Some("cheap".into()),
            price_range: Some("10".into()),
            name: Some("  ".into()),
            ..ProductListParams::default()
        })
        .unwrap_err();
        assert_eq!(errors.get("price"), Some(&["Enter a number.".to_string()][..]));
        assert!(errors.get("price__range").is_some());
        assert!(errors.get("name").is_none());
    }

    #[test]
    fn order_filter_parses_status_and_bounds() {
        let filter = OrderFilter::try_from(OrderListParams {
            status: Some("Confirmed".into()),
            created_at_gt: Some("2024-01-01T00:00:00Z".into()),
            created_at_lt: None,
        })
        .unwrap();
        assert_eq!(filter.status, Some(OrderStatus::Confirmed));
        assert!(filter.created_after.is_some());

        let errors = OrderFilter::try_from(OrderListParams {
            status: Some("Shipped".into()),
            created_at_lt: Some("yesterday".into()),
            created_at_gt: None,
        })
        .unwrap_err();
        assert!(errors.get("status").is_some());
        assert!(errors.get("created_at__lt").is_some());
    }
}
