//! Fixed-point amounts and pt-BR number text.
//!
//! Amounts are integer cents. Input text uses `.` as thousands separator and
//! `,` as decimal separator, optionally prefixed with `R$`; parsing takes the
//! longest numeric prefix the way a browser number field does.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

use serde::{Deserialize, Serialize};

/// Fractional digits kept while parsing
const MAX_SCALE: u32 = 9;

/// Decimal value as `mantissa / 10^scale`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fixed {
    mantissa: i128,
    scale: u32,
}

impl Fixed {
    /// Rescales to `scale` digits, rounding half away from zero.
    /// `None` when the result does not fit.
    fn rescale(self, scale: u32) -> Option<i128> {
        if self.scale <= scale {
            self.mantissa.checked_mul(10i128.pow(scale - self.scale))
        } else {
            Some(div_round(self.mantissa, 10i128.pow(self.scale - scale)))
        }
    }
}

fn saturate(value: i128) -> i64 {
    i64::try_from(value).unwrap_or(if value < 0 { i64::MIN } else { i64::MAX })
}

fn div_round(n: i128, d: i128) -> i128 {
    let q = n / d;
    let r = n % d;
    if 2 * r.abs() >= d.abs() {
        q + n.signum() * d.signum()
    } else {
        q
    }
}

/// Reads the localized numeric prefix of `text`
fn parse_localized(text: &str) -> Option<Fixed> {
    let cleaned: String = text
        .trim()
        .trim_start_matches("R$")
        .trim()
        .chars()
        .filter(|c| *c != '.')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    let mut chars = cleaned.chars().peekable();
    let negative = match chars.peek() {
        Some('-') => {
            chars.next();
            true
        }
        Some('+') => {
            chars.next();
            false
        }
        _ => false,
    };

    let mut mantissa: i128 = 0;
    let mut scale = 0u32;
    let mut digits = 0usize;
    let mut in_fraction = false;

    for c in chars {
        match c {
            '0'..='9' => {
                if in_fraction && scale >= MAX_SCALE {
                    continue;
                }
                mantissa = mantissa.checked_mul(10)?.checked_add(i128::from(c as u8 - b'0'))?;
                digits += 1;
                if in_fraction {
                    scale += 1;
                }
            }
            '.' if !in_fraction => in_fraction = true,
            _ => break,
        }
    }

    if digits == 0 {
        return None;
    }
    Some(Fixed {
        mantissa: if negative { -mantissa } else { mantissa },
        scale,
    })
}

fn group_thousands(units: u128) -> String {
    let digits = units.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    out
}

// ============================================================================
// Money
// ============================================================================

/// Monetary amount in cents
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    pub fn from_units(units: i64) -> Self {
        Money(units.saturating_mul(100))
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    /// `None` when the text has no numeric prefix or the amount is out of range
    pub fn parse(text: &str) -> Option<Self> {
        let cents = parse_localized(text)?.rescale(2)?;
        i64::try_from(cents).ok().map(Money)
    }

    /// Unparsable text counts as zero
    pub fn parse_or_zero(text: &str) -> Self {
        Self::parse(text).unwrap_or_default()
    }

    /// Price times a localized quantity, rounded to the cent. Saturates.
    pub fn times(&self, quantity: &Quantity) -> Money {
        let Fixed { mantissa, scale } = quantity.0;
        match i128::from(self.0).checked_mul(mantissa) {
            Some(product) => Money(saturate(div_round(product, 10i128.pow(scale)))),
            None if (self.0 < 0) != (mantissa < 0) => Money(i64::MIN),
            None => Money(i64::MAX),
        }
    }

    pub fn percent(&self, pct: Percentage) -> Money {
        Money(saturate(div_round(i128::from(self.0) * i128::from(pct.0), 10_000)))
    }

    /// `1.750,00`
    pub fn to_localized(&self) -> String {
        let abs = i128::from(self.0).unsigned_abs();
        let sign = if self.0 < 0 { "-" } else { "" };
        format!("{}{},{:02}", sign, group_thousands(abs / 100), abs % 100)
    }

    /// `R$ 1.750,00`
    pub fn to_currency(&self) -> String {
        format!("R$ {}", self.to_localized())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_localized())
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        *self = *self + rhs;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

// ============================================================================
// Quantity & percentage
// ============================================================================

/// Decimal quantity parsed from localized text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantity(Fixed);

impl Quantity {
    pub fn parse(text: &str) -> Option<Self> {
        parse_localized(text).map(Quantity)
    }

    pub fn parse_or_zero(text: &str) -> Self {
        Self::parse(text).unwrap_or(Quantity(Fixed {
            mantissa: 0,
            scale: 0,
        }))
    }

    pub fn whole(n: i64) -> Self {
        Quantity(Fixed {
            mantissa: i128::from(n),
            scale: 0,
        })
    }
}

/// Percentage in hundredths of a percent (`20,5` → 2050)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Percentage(i64);

impl Percentage {
    pub fn from_basis_points(bp: i64) -> Self {
        Percentage(bp)
    }

    pub fn basis_points(&self) -> i64 {
        self.0
    }

    pub fn parse(text: &str) -> Option<Self> {
        let hundredths = parse_localized(text)?.rescale(2)?;
        i64::try_from(hundredths).ok().map(Percentage)
    }

    pub fn parse_or_zero(text: &str) -> Self {
        Self::parse(text).unwrap_or_default()
    }

    /// `20,00`
    pub fn to_localized(&self) -> String {
        Money(self.0).to_localized()
    }
}
