//! # Money Module
//!
//! Provides the `Money` type plus the rate types applied to it.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents (2-decimal fixed point)                    │
//! │    unit 100.00 × 3 = 30000 cents, exactly                              │
//! │    Rates are basis points: 2100 bps = 21% = 0.21                        │
//! │    Rounding happens once, on the order subtotal, half-up                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use branchpos_core::money::{Money, TaxRate};
//!
//! let price = Money::from_cents(10_000); // 100.00
//! let subtotal = price * 3_i64;          // 300.00
//! let tax = subtotal.calculate_tax(TaxRate::from_bps(2100));
//! assert_eq!(tax.cents(), 6_300);        // 63.00
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

/// Basis points in 100%.
pub const BPS_SCALE: i128 = 10_000;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: Allows negative values for refunds and adjustments
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - Serialized as the raw cent amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use branchpos_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// For negative amounts only the major unit carries the sign:
    /// `from_major_minor(-5, 50)` is -5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Calculates tax on this amount, rounded half-up (away from zero).
    ///
    /// ## Rounding
    /// ```text
    /// ┌─────────────────────────────────────────────────────────────────────┐
    /// │  ROUND HALF UP (away from zero)                                     │
    /// │                                                                     │
    /// │  10.00 × 8.25% = 0.825  → 0.83                                      │
    /// │  0.05  × 50%   = 0.025  → 0.03                                      │
    /// │  -10.00 × 8.25% = -0.825 → -0.83                                    │
    /// │                                                                     │
    /// │  Applied ONCE on the order subtotal, never per line                 │
    /// └─────────────────────────────────────────────────────────────────────┘
    /// ```
    ///
    /// ## Example
    /// ```rust
    /// use branchpos_core::money::{Money, TaxRate};
    ///
    /// let tax = Money::from_cents(1000).calculate_tax(TaxRate::from_bps(825));
    /// assert_eq!(tax.cents(), 83);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        self.apply_bps(rate.bps())
    }

    /// Calculates a payment surcharge on this amount, rounded half-up.
    pub fn calculate_surcharge(&self, rate: SurchargeRate) -> Money {
        self.apply_bps(rate.bps())
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use branchpos_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(299);
    /// assert_eq!(unit_price.multiply_quantity(3).cents(), 897);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Checked variant of [`Money::multiply_quantity`].
    #[inline]
    pub fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        self.0.checked_mul(qty).map(Money)
    }

    /// Checked addition.
    #[inline]
    pub fn checked_add(&self, other: Money) -> Option<Self> {
        self.0.checked_add(other.0).map(Money)
    }

    fn apply_bps(&self, bps: u32) -> Money {
        // i128 so that large subtotals cannot overflow before the division
        let scaled = self.0 as i128 * bps as i128;
        Money::from_cents(round_half_up(scaled, BPS_SCALE) as i64)
    }
}

/// Integer division rounding half away from zero.
///
/// `denominator` must be positive.
pub fn round_half_up(numerator: i128, denominator: i128) -> i128 {
    let half = denominator / 2;
    if numerator >= 0 {
        (numerator + half) / denominator
    } else {
        -((-numerator + half) / denominator)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Currency-neutral display (`12.34`, `-5.50`). Use [`CurrencyFormat`]
/// for user-facing strings.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 2100 bps = 21% = a fractional rate of 0.21
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    /// Checks if tax rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Surcharge Rate
// =============================================================================

/// Payment surcharge (card / installment plan) in basis points.
///
/// 1500 bps = 15% = `subtotal × 15 / 100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SurchargeRate(u32);

impl SurchargeRate {
    /// Creates a surcharge rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        SurchargeRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// No surcharge.
    #[inline]
    pub const fn none() -> Self {
        SurchargeRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

// =============================================================================
// Currency Format
// =============================================================================

/// Currency display rules supplied by the tax/currency configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CurrencyFormat {
    /// ISO 4217 code.
    pub code: String,
    /// Symbol placed before the amount.
    pub symbol: String,
    /// Decimal places shown. Amounts are always stored as cents.
    pub decimals: u8,
}

impl Default for CurrencyFormat {
    fn default() -> Self {
        CurrencyFormat {
            code: "USD".to_string(),
            symbol: "$".to_string(),
            decimals: 2,
        }
    }
}

impl CurrencyFormat {
    /// Formats a money amount for display.
    ///
    /// ## Example
    /// ```rust
    /// use branchpos_core::money::{CurrencyFormat, Money};
    ///
    /// let usd = CurrencyFormat::default();
    /// assert_eq!(usd.format(Money::from_cents(36_300)), "$363.00");
    /// assert_eq!(usd.format(Money::from_cents(-550)), "-$5.50");
    /// ```
    ///
    /// With fewer than two decimals the dropped digits round half-up on
    /// the magnitude, so 1.50 shows as 2 and -1.50 as -2.
    pub fn format(&self, amount: Money) -> String {
        let cents = i128::from(amount.cents().unsigned_abs());
        let sign = |shown: i128| if amount.is_negative() && shown != 0 { "-" } else { "" };

        match self.decimals {
            0 => {
                let whole = round_half_up(cents, 100);
                format!("{}{}{}", sign(whole), self.symbol, whole)
            }
            1 => {
                let tenths = round_half_up(cents, 10);
                format!("{}{}{}.{}", sign(tenths), self.symbol, tenths / 10, tenths % 10)
            }
            n => format!(
                "{}{}{}.{:02}{}",
                sign(cents),
                self.symbol,
                cents / 100,
                cents % 100,
                "0".repeat(n as usize - 2)
            ),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
