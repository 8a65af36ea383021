//! Field-level validation shared by the request layer and the model constructors.
//!
//! Every rule here is also backed by a CHECK constraint in the migrations, so a
//! write that skips the HTTP layer still cannot store an invalid row.

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub const NAME_MAX_CHARS: usize = 200;
pub const DESCRIPTION_MAX_CHARS: usize = 2000;
pub const PRICE_DECIMAL_PLACES: u32 = 2;
const PRICE_MAX_WHOLE_DIGITS: u32 = 8;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_NUMBER: &str = "A valid number is required.";
pub const INVALID_INTEGER: &str = "A valid integer is required.";
pub const INVALID_STRING: &str = "Not a valid string.";

/// Validation messages keyed by the field they belong to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// Records the error of `result` under `field` and returns the value on success.
    pub fn check<T>(&mut self, field: &str, result: Result<T, String>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(message) => {
                self.add(field, message);
                None
            }
        }
    }

    /// Decodes a raw JSON field. `None` means the field was absent or null,
    /// `Some(None)` that it held a value of the wrong type, recorded as `message`.
    pub fn decode<T: DeserializeOwned>(
        &mut self,
        field: &str,
        raw: Option<Value>,
        message: &str,
    ) -> Option<Option<T>> {
        raw.map(|raw| {
            self.check(
                field,
                serde_json::from_value(raw).map_err(|_| message.to_owned()),
            )
        })
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.0.keys().map(String::as_str).collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

impl std::error::Error for FieldErrors {}

pub fn validate_name(name: &str) -> Result<String, String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("This field may not be blank.".into());
    }
    if name.chars().count() > NAME_MAX_CHARS {
        return Err(format!(
            "Ensure this field has no more than {NAME_MAX_CHARS} characters."
        ));
    }
    Ok(name.to_owned())
}

pub fn validate_description(description: &str) -> Result<String, String> {
    if description.chars().count() > DESCRIPTION_MAX_CHARS {
        return Err(format!(
            "Ensure this field has no more than {DESCRIPTION_MAX_CHARS} characters."
        ));
    }
    Ok(description.to_owned())
}

/// Checks the NUMERIC(10, 2) shape first, then positivity, and returns the
/// price rescaled to two decimal places.
pub fn validate_price(price: Decimal) -> Result<Decimal, String> {
    if price.normalize().scale() > PRICE_DECIMAL_PLACES {
        return Err(format!(
            "Ensure that there are no more than {PRICE_DECIMAL_PLACES} decimal places."
        ));
    }
    if price.trunc().abs() >= Decimal::from(10_i64.pow(PRICE_MAX_WHOLE_DIGITS)) {
        return Err(format!(
            "Ensure that there are no more than {PRICE_MAX_WHOLE_DIGITS} digits before the decimal point."
        ));
    }
    if price <= Decimal::ZERO {
        return Err("Price must be greater than zero".into());
    }

    let mut price = price;
    price.rescale(PRICE_DECIMAL_PLACES);
    Ok(price)
}

pub fn validate_stock(stock: i64) -> Result<i32, String> {
    if stock < 0 {
        return Err("Stock must not be negative".into());
    }
    i32::try_from(stock).map_err(|_| format!("Ensure this value is less than or equal to {}.", i32::MAX))
}

pub fn validate_quantity(quantity: i32) -> Result<i32, String> {
    if quantity <= 0 {
        return Err("Quantity must be greater than zero".into());
    }
    Ok(quantity)
}
