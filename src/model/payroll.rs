use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, AsRefStr, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct PayrollRecord {
    pub id: u64,
    pub user_id: u64,
    #[schema(example = 1)]
    pub month: u8,
    #[schema(example = 2026)]
    pub year: u16,
    #[schema(value_type = f64, example = 50000.0)]
    pub basic_salary: Decimal,
    #[schema(value_type = f64, example = 5000.0)]
    pub allowances: Decimal,
    #[schema(value_type = f64, example = 2000.0)]
    pub deductions: Decimal,
    #[schema(value_type = f64, example = 53000.0)]
    pub net_salary: Decimal,
    #[schema(example = "pending")]
    pub payment_status: String,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}

pub const PAYROLL_COLUMNS: &str = "id, user_id, month, year, basic_salary, allowances, deductions, \
     net_salary, payment_status, created_at, updated_at";

/// Largest magnitude a `DECIMAL(12,2)` money column holds.
pub fn max_amount() -> Decimal {
    Decimal::new(999_999_999_999, 2)
}

/// The one place net salary is derived; the result must still fit the column.
pub fn net_salary(basic_salary: Decimal, allowances: Decimal, deductions: Decimal) -> Result<Decimal, String> {
    let net = basic_salary
        .checked_add(allowances)
        .and_then(|gross| gross.checked_sub(deductions))
        .filter(|net| net.abs() <= max_amount())
        .ok_or_else(|| format!("net_salary must be between -{0} and {0}", max_amount()))?;
    Ok(net)
}

pub fn validate_period(month: u8, year: u16) -> Result<(), String> {
    if !(1..=12).contains(&month) {
        return Err("month must be between 1 and 12".to_string());
    }
    if !(2000..=2100).contains(&year) {
        return Err("year must be between 2000 and 2100".to_string());
    }
    Ok(())
}

pub fn validate_amounts(amounts: &[(&str, Decimal)]) -> Result<(), String> {
    for (name, value) in amounts {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(format!("{name} must not be negative"));
        }
        if value.scale() > 2 && value.round_dp(2) != *value {
            return Err(format!("{name} must have at most two decimal places"));
        }
        if *value > max_amount() {
            return Err(format!("{name} must not exceed {}", max_amount()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn net_is_basic_plus_allowances_minus_deductions() {
        let net = net_salary(Decimal::new(5_000_000, 2), Decimal::new(500_050, 2), Decimal::new(200_025, 2));
        assert_eq!(net.unwrap(), Decimal::new(5_300_025, 2));
    }

    #[test]
    fn net_can_go_negative_without_losing_precision() {
        let net = net_salary(Decimal::new(10, 1), Decimal::ZERO, Decimal::new(30, 1));
        assert_eq!(net.unwrap(), Decimal::new(-20, 1));
    }

    #[test]
    fn net_outside_column_range_is_an_error() {
        let max = max_amount();
        assert!(net_salary(max, max, Decimal::ZERO).is_err());
        assert_eq!(net_salary(max, max, max).unwrap(), max);
    }

    #[test]
    fn net_never_panics_on_huge_inputs() {
        let huge = Decimal::MAX;
        assert!(net_salary(huge, huge, Decimal::ZERO).is_err());
        assert!(net_salary(Decimal::ZERO, Decimal::ZERO, huge).is_err());
    }

    #[test]
    fn amounts_above_column_range_are_rejected() {
        assert!(validate_amounts(&[("basic_salary", max_amount())]).is_ok());
        assert!(validate_amounts(&[("basic_salary", Decimal::new(100_000_000_000, 0))]).is_err());
        assert!(validate_amounts(&[("allowances", Decimal::new(7, 0) * Decimal::new(10_000_000_000_000, 0))]).is_err());
    }

    #[test]
    fn period_bounds() {
        assert!(validate_period(1, 2026).is_ok());
        assert!(validate_period(12, 2026).is_ok());
        assert!(validate_period(0, 2026).is_err());
        assert!(validate_period(13, 2026).is_err());
        assert!(validate_period(6, 1999).is_err());
    }

    #[test]
    fn amounts_must_be_non_negative_cents() {
        assert!(validate_amounts(&[("basic_salary", Decimal::new(100, 0))]).is_ok());
        assert!(validate_amounts(&[("deductions", Decimal::new(-1, 0))]).is_err());
        assert!(validate_amounts(&[("allowances", Decimal::new(1001, 3))]).is_err());
        assert!(validate_amounts(&[("allowances", Decimal::new(1000, 3))]).is_ok());
    }
}
