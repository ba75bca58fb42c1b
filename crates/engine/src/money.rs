use std::{
    fmt,
    ops::{Add, Neg, Sub},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{Currency, EngineError, ResultEngine};

/// Signed money amount represented as integer **minor units** tagged with its
/// currency.
///
/// Use this type for **all** monetary values in the engine (expense amounts,
/// shares, balances) to avoid floating-point drift. Arithmetic is exact and
/// checked: mixing currencies fails with `CurrencyMismatch`, leaving the `i64`
/// range fails with `InvalidArithmetic`.
///
/// # Examples
///
/// ```rust
/// use engine::{Currency, Locale, Money};
///
/// let amount = Money::parse_major("90", Currency::Inr).unwrap();
/// assert_eq!(amount.minor(), 9000);
///
/// let shares = amount.allocate(3).unwrap();
/// assert!(shares.iter().all(|s| s.minor() == 3000));
///
/// assert_eq!(Money::new(10_000_000, Currency::Inr).format(Locale::EnIn), "₹1,00,000.00");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    minor: i64,
    currency: Currency,
}

/// Locales supported by [`Money::format`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Locale {
    /// `₹1,00,000.00` (lakh/crore grouping).
    #[default]
    EnIn,
    /// `$1,000.00`
    EnUs,
    /// `1.000,00 €`
    DeDe,
}

impl TryFrom<&str> for Locale {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().replace('_', "-").to_ascii_lowercase().as_str() {
            "en-in" => Ok(Self::EnIn),
            "en-us" => Ok(Self::EnUs),
            "de-de" => Ok(Self::DeDe),
            other => Err(EngineError::Validation(format!(
                "unsupported locale: {other}"
            ))),
        }
    }
}

impl Money {
    /// Creates a new amount from minor units.
    #[must_use]
    pub const fn new(minor: i64, currency: Currency) -> Self {
        Self { minor, currency }
    }

    #[must_use]
    pub const fn zero(currency: Currency) -> Self {
        Self::new(0, currency)
    }

    /// Returns the raw value in minor units.
    #[must_use]
    pub const fn minor(self) -> i64 {
        self.minor
    }

    #[must_use]
    pub const fn currency(self) -> Currency {
        self.currency
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.minor == 0
    }

    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.minor > 0
    }

    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.minor < 0
    }

    fn same_currency(self, rhs: Money) -> ResultEngine<()> {
        if self.currency != rhs.currency {
            return Err(EngineError::CurrencyMismatch(format!(
                "cannot combine {} with {}",
                self.currency.code(),
                rhs.currency.code()
            )));
        }
        Ok(())
    }

    /// Exact addition.
    pub fn checked_add(self, rhs: Money) -> ResultEngine<Money> {
        self.same_currency(rhs)?;
        self.minor
            .checked_add(rhs.minor)
            .map(|minor| Money::new(minor, self.currency))
            .ok_or_else(|| EngineError::InvalidArithmetic("amount overflow".to_string()))
    }

    /// Exact subtraction.
    pub fn checked_sub(self, rhs: Money) -> ResultEngine<Money> {
        self.same_currency(rhs)?;
        self.minor
            .checked_sub(rhs.minor)
            .map(|minor| Money::new(minor, self.currency))
            .ok_or_else(|| EngineError::InvalidArithmetic("amount overflow".to_string()))
    }

    pub fn negate(self) -> ResultEngine<Money> {
        self.minor
            .checked_neg()
            .map(|minor| Money::new(minor, self.currency))
            .ok_or_else(|| EngineError::InvalidArithmetic("amount overflow".to_string()))
    }

    pub fn absolute(self) -> ResultEngine<Money> {
        self.minor
            .checked_abs()
            .map(|minor| Money::new(minor, self.currency))
            .ok_or_else(|| EngineError::InvalidArithmetic("amount overflow".to_string()))
    }

    /// Sums `items`, all of which must be in `currency`.
    pub fn sum<I>(items: I, currency: Currency) -> ResultEngine<Money>
    where
        I: IntoIterator<Item = Money>,
    {
        items
            .into_iter()
            .try_fold(Money::zero(currency), |total, item| total + item)
    }

    /// Multiplies by `fraction`, rounding half away from zero to whole minor
    /// units.
    ///
    /// The product goes through `f64`, so amounts beyond 2^53 minor units lose
    /// precision. Use [`Money::allocate_weighted`] when shares must sum
    /// exactly.
    pub fn scale(self, fraction: f64) -> ResultEngine<Money> {
        if !fraction.is_finite() {
            return Err(EngineError::InvalidArithmetic(format!(
                "cannot scale by {fraction}"
            )));
        }
        let scaled = (self.minor as f64 * fraction).round();
        if !scaled.is_finite() || scaled < i64::MIN as f64 || scaled >= i64::MAX as f64 {
            return Err(EngineError::InvalidArithmetic("amount overflow".to_string()));
        }
        Ok(Money::new(scaled as i64, self.currency))
    }

    /// Splits the amount into `parts` near-equal shares that sum exactly to
    /// the original amount.
    pub fn allocate(self, parts: usize) -> ResultEngine<Vec<Money>> {
        if parts == 0 {
            return Err(EngineError::InvalidArithmetic(
                "cannot allocate into zero parts".to_string(),
            ));
        }
        self.allocate_weighted(&vec![1; parts])
    }

    /// Splits the amount proportionally to `weights` using the
    /// largest-remainder method.
    ///
    /// Every share is first rounded down; the minor units left over go one by
    /// one to the shares with the largest remainders. Equal remainders are
    /// served in input order, so the result is deterministic.
    pub fn allocate_weighted(self, weights: &[u32]) -> ResultEngine<Vec<Money>> {
        let total: i128 = weights.iter().map(|w| i128::from(*w)).sum();
        if total == 0 {
            return Err(EngineError::InvalidArithmetic(
                "allocation weights must not all be zero".to_string(),
            ));
        }

        let amount = i128::from(self.minor);
        let mut shares = Vec::with_capacity(weights.len());
        let mut remainders = Vec::with_capacity(weights.len());
        for (index, weight) in weights.iter().enumerate() {
            let product = amount * i128::from(*weight);
            shares.push(product.div_euclid(total));
            remainders.push((product.rem_euclid(total), index));
        }

        let allocated: i128 = shares.iter().sum();
        let leftover = amount - allocated;
        remainders.sort_by(|(ra, ia), (rb, ib)| rb.cmp(ra).then(ia.cmp(ib)));
        for (_, index) in remainders
            .iter()
            .take(usize::try_from(leftover).unwrap_or(0))
        {
            shares[*index] += 1;
        }

        shares
            .into_iter()
            .map(|share| {
                i64::try_from(share)
                    .map(|minor| Money::new(minor, self.currency))
                    .map_err(|_| EngineError::InvalidArithmetic("amount overflow".to_string()))
            })
            .collect()
    }

    /// Plain decimal rendering without symbol or grouping (`-1234.50`).
    #[must_use]
    pub fn to_decimal_string(self) -> String {
        let (sign, int_part, frac_part) = self.split_parts();
        if frac_part.is_empty() {
            format!("{sign}{int_part}")
        } else {
            format!("{sign}{int_part}.{frac_part}")
        }
    }

    /// Display projection in major units. Never feed this back into
    /// arithmetic.
    #[must_use]
    pub fn to_major_f64(self) -> f64 {
        self.minor as f64 / self.currency.scale() as f64
    }

    /// Formats the amount for display in `locale`.
    #[must_use]
    pub fn format(self, locale: Locale) -> String {
        let (sign, int_part, frac_part) = self.split_parts();
        let symbol = self.currency.symbol();
        match locale {
            Locale::EnIn => {
                let grouped = group_indian(&int_part);
                format!("{sign}{symbol}{grouped}{}", fraction(".", &frac_part))
            }
            Locale::EnUs => {
                let grouped = group_thousands(&int_part, ',');
                format!("{sign}{symbol}{grouped}{}", fraction(".", &frac_part))
            }
            Locale::DeDe => {
                let grouped = group_thousands(&int_part, '.');
                format!("{sign}{grouped}{} {symbol}", fraction(",", &frac_part))
            }
        }
    }

    fn split_parts(self) -> (&'static str, String, String) {
        let sign = if self.minor < 0 { "-" } else { "" };
        let abs = self.minor.unsigned_abs();
        let scale = self.currency.scale().unsigned_abs();
        let digits = usize::from(self.currency.minor_units());
        let int_part = (abs / scale).to_string();
        let frac_part = if digits == 0 {
            String::new()
        } else {
            format!("{:0digits$}", abs % scale)
        };
        (sign, int_part, frac_part)
    }

    /// Parses a decimal string in major units into minor units.
    ///
    /// Accepts `.` or `,` as decimal separator and an optional leading `+`/`-`.
    ///
    /// Validation rules:
    /// - at most `currency.minor_units()` fractional digits (rejects `12.345`)
    /// - rejects empty/invalid strings
    pub fn parse_major(input: &str, currency: Currency) -> ResultEngine<Money> {
        let empty = || EngineError::Validation("empty amount".to_string());
        let invalid = || EngineError::Validation(format!("invalid amount: {input}"));
        let overflow = || EngineError::InvalidArithmetic("amount too large".to_string());

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(empty());
        }

        let (negative, rest) = if let Some(stripped) = trimmed.strip_prefix('-') {
            (true, stripped)
        } else if let Some(stripped) = trimmed.strip_prefix('+') {
            (false, stripped)
        } else {
            (false, trimmed)
        };

        let rest = rest.trim().replace(',', ".");
        if rest.is_empty() {
            return Err(empty());
        }

        let mut parts = rest.split('.');
        let int_str = parts.next().ok_or_else(invalid)?;
        let frac_str = parts.next().unwrap_or("");
        if parts.next().is_some() {
            return Err(invalid());
        }
        if int_str.is_empty() || !int_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        if !frac_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let digits = usize::from(currency.minor_units());
        if frac_str.len() > digits {
            return Err(EngineError::Validation(format!(
                "too many decimals for {}",
                currency.code()
            )));
        }

        let major: i64 = int_str.parse().map_err(|_| overflow())?;
        let frac: i64 = if frac_str.is_empty() {
            0
        } else {
            let padded = format!("{frac_str:0<digits$}");
            padded.parse().map_err(|_| invalid())?
        };

        let total = major
            .checked_mul(currency.scale())
            .and_then(|v| v.checked_add(frac))
            .ok_or_else(overflow)?;
        let minor = if negative {
            total.checked_neg().ok_or_else(overflow)?
        } else {
            total
        };

        Ok(Money::new(minor, currency))
    }
}

fn fraction(separator: &str, digits: &str) -> String {
    if digits.is_empty() {
        String::new()
    } else {
        format!("{separator}{digits}")
    }
}

fn group_thousands(digits: &str, separator: char) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            out.push(separator);
        }
        out.push(ch);
    }
    out
}

/// Indian grouping: the last three digits, then pairs (`12,34,567`).
fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }
    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut out = String::with_capacity(digits.len() + digits.len() / 2);
    for (index, ch) in head.chars().enumerate() {
        if index > 0 && (head.len() - index) % 2 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out.push(',');
    out.push_str(tail);
    out
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.to_decimal_string(), self.currency.code())
    }
}

/// `a + b` is [`Money::checked_add`]; the result still has to be `?`-ed.
impl Add for Money {
    type Output = ResultEngine<Money>;

    fn add(self, rhs: Money) -> Self::Output {
        self.checked_add(rhs)
    }
}

impl Sub for Money {
    type Output = ResultEngine<Money>;

    fn sub(self, rhs: Money) -> Self::Output {
        self.checked_sub(rhs)
    }
}

impl Neg for Money {
    type Output = ResultEngine<Money>;

    fn neg(self) -> Self::Output {
        self.negate()
    }
}

impl FromStr for Money {
    type Err = EngineError;

    /// Parses the [`Display`](fmt::Display) form, `"<amount> <CODE>"`
    /// (e.g. `90.50 INR`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (amount, code) = s.trim().rsplit_once(' ').ok_or_else(|| {
            EngineError::Validation(format!("expected \"<amount> <currency>\": {s}"))
        })?;
        let currency = Currency::try_from(code)?;
        Money::parse_major(amount, currency)
    }
}
