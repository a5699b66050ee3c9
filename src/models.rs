use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ValidationError;

/// One line of a user's active cart.
///
/// Product name, image and price are captured when the item is added, so the
/// cart never has to reach back into the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CartItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub product_image: Option<String>,
    pub price: Decimal,
    pub quantity: u32,
    pub size: Option<String>,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CartItem {
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Brazilian postal code (CEP) reduced to its 8 digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(transparent)]
pub struct PostalCode(String);

impl PostalCode {
    pub const LEN: usize = 8;

    /// Strips every non-digit character; `None` unless exactly 8 digits remain.
    pub fn parse(raw: &str) -> Option<Self> {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        (digits.len() == Self::LEN).then_some(Self(digits))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn numeric(&self) -> u32 {
        // Eight ASCII digits always fit in a u32.
        self.0
            .bytes()
            .fold(0u32, |acc, b| acc * 10 + u32::from(b - b'0'))
    }
}

impl fmt::Display for PostalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AddressField {
    PostalCode,
    Street,
    Number,
    City,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct Address {
    pub postal_code: String,
    pub street: String,
    pub number: String,
    pub complement: Option<String>,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
}

impl Address {
    pub fn missing_fields(&self) -> Vec<AddressField> {
        [
            (AddressField::PostalCode, &self.postal_code),
            (AddressField::Street, &self.street),
            (AddressField::Number, &self.number),
            (AddressField::City, &self.city),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect()
    }

    /// Checks the address is complete enough to ship to and returns its
    /// postal code. The state is optional, but when given it must be a
    /// two-letter code such as `SP`.
    pub fn validate(&self) -> Result<PostalCode, ValidationError> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(ValidationError::IncompleteAddress { missing });
        }
        let postal_code =
            PostalCode::parse(&self.postal_code).ok_or(ValidationError::InvalidPostalCode)?;
        let state = self.state.trim();
        if !state.is_empty() && !(state.len() == 2 && state.chars().all(|c| c.is_ascii_alphabetic()))
        {
            return Err(ValidationError::InvalidField {
                field: "state",
                message: "must be a 2-letter code",
            });
        }
        Ok(postal_code)
    }
}

/// Interest-free credit card installment count, always within `1..=10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "u8", into = "u8")]
pub struct Installments(u8);

impl Installments {
    pub const MAX: u8 = 10;

    pub fn new(count: u8) -> Result<Self, ValidationError> {
        if (1..=Self::MAX).contains(&count) {
            Ok(Self(count))
        } else {
            Err(ValidationError::InvalidInstallments { max: Self::MAX })
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Installments {
    type Error = ValidationError;

    fn try_from(count: u8) -> Result<Self, Self::Error> {
        Self::new(count)
    }
}

impl From<Installments> for u8 {
    fn from(value: Installments) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PaymentSelection {
    Pix,
    CreditCard { installments: Installments },
    Boleto,
}

impl PaymentSelection {
    pub fn method_name(&self) -> &'static str {
        match self {
            PaymentSelection::Pix => "pix",
            PaymentSelection::CreditCard { .. } => "credit_card",
            PaymentSelection::Boleto => "boleto",
        }
    }

    pub fn installments(&self) -> Option<Installments> {
        match self {
            PaymentSelection::CreditCard { installments } => Some(*installments),
            _ => None,
        }
    }

    /// Rebuilds a selection from its stored columns.
    pub fn from_parts(method: &str, installments: Option<u8>) -> Option<Self> {
        match (method, installments) {
            ("pix", None) => Some(PaymentSelection::Pix),
            ("boleto", None) => Some(PaymentSelection::Boleto),
            ("credit_card", Some(count)) => Installments::new(count)
                .ok()
                .map(|installments| PaymentSelection::CreditCard { installments }),
            _ => None,
        }
    }
}

/// Post-creation status of an order.
///
/// `pending -> confirmed -> shipped -> delivered`, with `cancelled` reachable
/// from every non-terminal state. Transitions past `pending` belong to the
/// fulfillment process; this crate only assigns the initial state and filters
/// by status.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const INITIAL: OrderStatus = OrderStatus::Pending;

    pub fn next_states(self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending => &[OrderStatus::Confirmed, OrderStatus::Cancelled],
            OrderStatus::Confirmed => &[OrderStatus::Shipped, OrderStatus::Cancelled],
            OrderStatus::Shipped => &[OrderStatus::Delivered, OrderStatus::Cancelled],
            OrderStatus::Delivered | OrderStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        self.next_states().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        self.next_states().is_empty()
    }
}

/// Line item copied out of the cart when the order is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub product_name: String,
    pub price: Decimal,
    pub quantity: u32,
    pub size: Option<String>,
    pub color: Option<String>,
    /// Cart item this line was built from; used to finish clearing the cart.
    pub cart_item_id: Uuid,
}

impl From<&CartItem> for OrderItem {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: item.product_id,
            product_name: item.product_name.clone(),
            price: item.price,
            quantity: item.quantity,
            size: item.size.clone(),
            color: item.color.clone(),
            cart_item_id: item.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub coupon_code: Option<String>,
    pub coupon_discount: Decimal,
    pub payment_discount: Decimal,
    pub shipping_cost: Decimal,
    pub total: Decimal,
    pub status: OrderStatus,
    pub shipping_address: Address,
    pub payment: PaymentSelection,
    pub created_at: DateTime<Utc>,
}
