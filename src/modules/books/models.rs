use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Number of decimal places every price carries.
pub const PRICE_SCALE: u32 = 2;

/// Fixed-point monetary amount, always held at two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price(Decimal);

impl Price {
    /// Round half away from zero to two places and pad to exactly two places.
    ///
    /// Amounts too large to carry two fractional digits are rejected.
    pub fn new(amount: Decimal) -> Result<Self, InvalidPrice> {
        let mut rounded =
            amount.round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero);
        // rescale leaves the scale untouched when the mantissa has no room
        rounded.rescale(PRICE_SCALE);
        if rounded.scale() != PRICE_SCALE {
            return Err(InvalidPrice::OutOfRange(amount.to_string()));
        }
        Ok(Self(rounded))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InvalidPrice {
    #[error("'{0}' is not a decimal price")]
    NotDecimal(String),

    #[error("price {0} cannot be held with two decimal places")]
    OutOfRange(String),
}

impl FromStr for Price {
    type Err = InvalidPrice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount =
            Decimal::from_str(s.trim()).map_err(|_| InvalidPrice::NotDecimal(s.to_string()))?;
        Price::new(amount)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

/// Accepts a decimal string (`"9.90"`) or a JSON number.
impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let amount = <Decimal as Deserialize>::deserialize(deserializer)?;
        Price::new(amount).map_err(serde::de::Error::custom)
    }
}

/// A purchasable book.
///
/// `id` is `None` until the book has been saved to a store and never changes
/// afterwards, so it is only settable from inside the module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    id: Option<i64>,
    pub name: String,
    pub price: Price,
}

impl Book {
    /// Create an unsaved book.
    pub fn new(name: impl Into<String>, price: Price) -> Self {
        Self {
            id: None,
            name: name.into(),
            price,
        }
    }

    pub(super) fn with_id(id: i64, name: String, price: Price) -> Self {
        Self {
            id: Some(id),
            name,
            price,
        }
    }

    pub(super) fn assign_id(&mut self, id: i64) {
        debug_assert!(self.id.is_none(), "book id is assigned exactly once");
        self.id = Some(id);
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    /// Resource path of a saved book, `None` while unsaved.
    pub fn url(&self) -> Option<String> {
        self.id.map(book_url)
    }
}

pub fn book_url(id: i64) -> String {
    format!("/books/{}/", id)
}

/// Serialized form: `{"id", "name", "price", "url"}`.
impl Serialize for Book {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Book", 4)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("price", &self.price)?;
        state.serialize_field("url", &self.url())?;
        state.end()
    }
}

/// Request body for creating or replacing a book.
#[derive(Debug, Clone, Deserialize)]
pub struct BookInput {
    pub name: String,
    pub price: Price,
}

impl BookInput {
    pub fn into_book(self) -> Book {
        Book::new(self.name, self.price)
    }

    /// Overwrite the mutable fields of `book`, leaving its id alone.
    pub fn apply_to(self, book: &mut Book) {
        book.name = self.name;
        book.price = self.price;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn price(s: &str) -> Price {
        s.parse().unwrap()
    }

    #[test]
    fn price_is_padded_to_two_places() {
        assert_eq!(price("9.9").to_string(), "9.90");
        assert_eq!(price("29.90").to_string(), "29.90");
        assert_eq!(price("7").to_string(), "7.00");
    }

    #[test]
    fn price_rounds_half_away_from_zero() {
        assert_eq!(price("1.005").to_string(), "1.01");
        assert_eq!(price("1.004").to_string(), "1.00");
        assert_eq!(price("-1.005").to_string(), "-1.01");
    }

    #[test]
    fn price_rejects_non_decimals() {
        let err = "nine".parse::<Price>().unwrap_err();
        assert_eq!(err.to_string(), "'nine' is not a decimal price");
    }

    #[test]
    fn price_without_room_for_two_places_is_rejected() {
        for input in [
            "79228162514264337593543950335",
            "7922816251426433759354395033.5",
        ] {
            let err = input.parse::<Price>().unwrap_err();
            assert!(matches!(err, InvalidPrice::OutOfRange(_)), "{input}");
            assert!(serde_json::from_value::<Price>(json!(input)).is_err());
        }

        let widest = price("792281625142643375935439503.35");
        assert_eq!(widest.to_string(), "792281625142643375935439503.35");
    }

    #[test]
    fn price_deserializes_from_string_or_number() {
        let from_str: Price = serde_json::from_value(json!("9.9")).unwrap();
        let from_num: Price = serde_json::from_value(json!(9.9)).unwrap();
        assert_eq!(from_str, price("9.90"));
        assert_eq!(from_num, price("9.90"));
        assert!(serde_json::from_value::<Price>(json!("abc")).is_err());
    }

    #[test]
    fn unsaved_book_has_no_url() {
        let book = Book::new("Django Book", price("29.90"));
        assert_eq!(book.id(), None);
        assert_eq!(book.url(), None);
    }

    #[test]
    fn saved_book_url_follows_id() {
        let mut book = Book::new("Django Book", price("29.90"));
        book.assign_id(42);
        assert_eq!(book.url().as_deref(), Some("/books/42/"));
    }

    #[test]
    fn book_serializes_canonical_fields() {
        let book = Book::with_id(3, "Python Cookbook".to_string(), price("39.9"));
        assert_eq!(
            serde_json::to_value(&book).unwrap(),
            json!({"id": 3, "name": "Python Cookbook", "price": "39.90", "url": "/books/3/"})
        );

        let unsaved = Book::new("Draft", price("1"));
        assert_eq!(
            serde_json::to_value(&unsaved).unwrap(),
            json!({"id": null, "name": "Draft", "price": "1.00", "url": null})
        );
    }

    #[test]
    fn input_replaces_name_and_price_only() {
        let mut book = Book::with_id(5, "Django Book".to_string(), price("29.90"));
        let input: BookInput =
            serde_json::from_value(json!({"name": "Kochbuch", "price": "9.90"})).unwrap();

        input.apply_to(&mut book);

        assert_eq!(book.id(), Some(5));
        assert_eq!(book.name, "Kochbuch");
        assert_eq!(book.price.to_string(), "9.90");
        assert_eq!(book.url().as_deref(), Some("/books/5/"));
    }
}
