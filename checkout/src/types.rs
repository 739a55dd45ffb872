//! Domain types for the checkout workflow.
//!
//! All of these live for a single page session; nothing here is persisted.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

/// Order identifier assigned by the backend
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Wraps a backend order id
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw id
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Mobile-money checkout request id, used as the payment reference when polling
///
/// The provider issues ids such as `ws_CO_191220191020363925`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckoutRequestId(String);

impl CheckoutRequestId {
    /// Prefix every provider-issued checkout request id starts with
    pub const PREFIX: &'static str = "ws_CO_";

    /// Ids must be strictly longer than this to look plausible
    pub const MIN_LEN: usize = 10;

    /// Wraps a checkout request id without validating it
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Sanity check before polling. Not a security check.
    #[must_use]
    pub fn looks_valid(&self) -> bool {
        self.0.starts_with(Self::PREFIX) && self.0.len() > Self::MIN_LEN
    }

    /// Returns the raw id
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CheckoutRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Money Value Object (cents-based to avoid floating point errors)
// ============================================================================

/// Represents money in cents to avoid floating-point arithmetic errors
///
/// On the wire money is a decimal number of major units (`100.5`), which is
/// rounded to the nearest cent when decoded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(u64);

impl Money {
    /// Zero
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Creates a `Money` value from whole major units, saturating on overflow
    #[must_use]
    pub const fn from_major(units: u64) -> Self {
        Self(units.saturating_mul(100))
    }

    /// Converts a decimal amount of major units, rounding to the nearest cent
    ///
    /// Returns `None` for negative, NaN or infinite amounts.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_decimal(amount: f64) -> Option<Self> {
        if !amount.is_finite() || amount < 0.0 {
            return None;
        }
        let cents = (amount * 100.0).round();
        if cents > u64::MAX as f64 {
            return None;
        }
        Some(Self(cents as u64))
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Returns the amount as a decimal number of major units
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_decimal(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two amounts, saturating at the maximum
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Subtracts, flooring at zero
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Multiplies by a quantity, saturating at the maximum
    #[must_use]
    pub const fn saturating_mul(self, quantity: u32) -> Self {
        Self(self.0.saturating_mul(quantity as u64))
    }

    /// Portion of this amount given in basis points, rounded half-up to the cent
    ///
    /// `Money::from_major(90).portion_bps(800)` is 7.20.
    #[must_use]
    pub const fn portion_bps(self, bps: u32) -> Self {
        let scaled = (self.0 as u128) * (bps as u128) + 5_000;
        let cents = scaled / 10_000;
        if cents > u64::MAX as u128 {
            Self(u64::MAX)
        } else {
            Self(cents as u64)
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_decimal())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let amount = f64::deserialize(deserializer)?;
        Self::from_decimal(amount)
            .ok_or_else(|| de::Error::custom(format!("invalid money amount: {amount}")))
    }
}

/// Tax rate in basis points (800 = 8%)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxRate(u32);

impl TaxRate {
    /// The flat 8% rate applied at checkout
    pub const STANDARD: Self = Self(800);

    /// Creates a rate from basis points
    #[must_use]
    pub const fn from_bps(bps: u32) -> Self {
        Self(bps)
    }

    /// Returns the rate in basis points
    #[must_use]
    pub const fn bps(&self) -> u32 {
        self.0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        Self::STANDARD
    }
}

// ============================================================================
// Cart, contact details and discount
// ============================================================================

/// A ticket line in the shopper's cart
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    /// Event or ticket-type id
    pub id: String,
    /// Display title
    pub title: String,
    /// Unit price
    pub price: Money,
    /// Number of tickets
    pub quantity: u32,
    /// Image URL shown next to the line
    #[serde(default)]
    pub image: String,
}

impl CartItem {
    /// Creates a cart line without an image
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>, price: Money, quantity: u32) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            price,
            quantity,
            image: String::new(),
        }
    }

    /// Price times quantity
    #[must_use]
    pub const fn line_total(&self) -> Money {
        self.price.saturating_mul(self.quantity)
    }
}

/// Buyer contact fields collected on the order details step
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContactField {
    /// Given name
    FirstName,
    /// Family name
    LastName,
    /// Email address
    Email,
    /// Phone number
    Phone,
}

impl ContactField {
    /// All fields, in form order
    pub const ALL: [Self; 4] = [Self::FirstName, Self::LastName, Self::Email, Self::Phone];

    /// Human readable label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::FirstName => "First name",
            Self::LastName => "Last name",
            Self::Email => "Email",
            Self::Phone => "Phone number",
        }
    }
}

impl fmt::Display for ContactField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Buyer contact details
///
/// Only presence is checked client-side; format is the server's concern.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactDetails {
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Email address
    pub email: String,
    /// Phone number
    pub phone: String,
}

impl ContactDetails {
    /// Returns the value of a field
    #[must_use]
    pub fn get(&self, field: ContactField) -> &str {
        match field {
            ContactField::FirstName => &self.first_name,
            ContactField::LastName => &self.last_name,
            ContactField::Email => &self.email,
            ContactField::Phone => &self.phone,
        }
    }

    /// Sets the value of a field
    pub fn set(&mut self, field: ContactField, value: String) {
        match field {
            ContactField::FirstName => self.first_name = value,
            ContactField::LastName => self.last_name = value,
            ContactField::Email => self.email = value,
            ContactField::Phone => self.phone = value,
        }
    }

    /// First field, in form order, that is blank
    #[must_use]
    pub fn first_missing(&self) -> Option<ContactField> {
        ContactField::ALL
            .into_iter()
            .find(|field| self.get(*field).trim().is_empty())
    }

    /// True when every field is filled in
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.first_missing().is_none()
    }

    /// "First Last"
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }
}

/// A discount code accepted by the backend
///
/// `percentage` is the canonical field; older responses call it
/// `discountPercentage`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Discount {
    /// The code as accepted by the server
    pub code: String,
    /// Percent off the subtotal (10.0 = 10%)
    #[serde(alias = "discountPercentage")]
    pub percentage: f64,
    /// Description shown to the buyer
    #[serde(default)]
    pub description: String,
}

impl Discount {
    /// Percentage in basis points, clamped to 0..=100%
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn bps(&self) -> u32 {
        if !self.percentage.is_finite() {
            return 0;
        }
        (self.percentage.clamp(0.0, 100.0) * 100.0).round() as u32
    }
}

// ============================================================================
// Totals
// ============================================================================

/// Derived order totals; recomputed from cart and discount, never stored
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    /// Sum of line totals
    pub subtotal: Money,
    /// Discount taken off the subtotal
    pub discount_amount: Money,
    /// Tax on the discounted subtotal
    pub tax: Money,
    /// `subtotal - discount_amount + tax`
    pub total: Money,
}

impl Totals {
    /// Computes totals for a cart
    ///
    /// Tax is charged on the discounted subtotal. Each component is rounded
    /// to the cent before it is summed.
    #[must_use]
    pub fn compute(items: &[CartItem], discount: Option<&Discount>, tax_rate: TaxRate) -> Self {
        let subtotal = items
            .iter()
            .fold(Money::ZERO, |sum, item| sum.saturating_add(item.line_total()));

        let discount_amount = discount.map_or(Money::ZERO, |d| subtotal.portion_bps(d.bps()));
        let taxable = subtotal.saturating_sub(discount_amount);
        let tax = taxable.portion_bps(tax_rate.bps());

        Self {
            subtotal,
            discount_amount,
            tax,
            total: taxable.saturating_add(tax),
        }
    }
}

// ============================================================================
// Payment status
// ============================================================================

/// Status reported by the payment-status endpoint
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PaymentStatus {
    /// Request sent to the phone, no answer yet
    Pending,
    /// Provider is processing
    Processing,
    /// Payment confirmed
    Completed,
    /// Payment failed
    Failed,
    /// Buyer cancelled on the phone
    Cancelled,
    /// Any other status string; treated as still processing
    Unknown(String),
}

impl PaymentStatus {
    /// Wire name of the status
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Unknown(other) => other,
        }
    }

    /// True for completed, failed and cancelled
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl From<&str> for PaymentStatus {
    fn from(value: &str) -> Self {
        match value {
            "pending" => Self::Pending,
            "processing" => Self::Processing,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PaymentStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PaymentStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from(raw.as_str()))
    }
}

/// Body of `GET /checkout/payment-status/:checkoutRequestID`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusReport {
    /// Current status
    pub status: PaymentStatus,
    /// Provider result code; sent as a number or a string
    #[serde(default, deserialize_with = "string_or_number")]
    pub result_code: Option<String>,
    /// Provider result description
    #[serde(default)]
    pub result_desc: Option<String>,
    /// Everything else the server sent
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PaymentStatusReport {
    /// Report with only a status
    #[must_use]
    pub fn new(status: PaymentStatus) -> Self {
        Self {
            status,
            result_code: None,
            result_desc: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Failed report carrying a provider result
    #[must_use]
    pub fn failed(result_code: impl Into<String>, result_desc: impl Into<String>) -> Self {
        Self {
            status: PaymentStatus::Failed,
            result_code: Some(result_code.into()),
            result_desc: Some(result_desc.into()),
            extra: serde_json::Map::new(),
        }
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(code)) => Ok(Some(code)),
        Some(serde_json::Value::Number(code)) => Ok(Some(code.to_string())),
        Some(other) => Err(de::Error::custom(format!("unexpected result code: {other}"))),
    }
}

/// How a payment ended, as seen by the buyer
#[derive(Clone, Debug, PartialEq)]
pub enum PaymentOutcome {
    /// Payment confirmed
    Paid {
        /// The final status report
        report: PaymentStatusReport,
    },
    /// Payment failed
    Failed {
        /// Provider result code, if any
        result_code: Option<String>,
        /// Message to show the buyer
        message: String,
    },
    /// Buyer cancelled the request on their phone
    Cancelled {
        /// Message to show the buyer
        message: String,
    },
}

impl PaymentOutcome {
    /// True for [`PaymentOutcome::Paid`]
    #[must_use]
    pub const fn is_paid(&self) -> bool {
        matches!(self, Self::Paid { .. })
    }
}
