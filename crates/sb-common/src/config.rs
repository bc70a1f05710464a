use std::collections::HashMap;
use std::env;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub database_url: String,
    /// When unset, admin login is disabled and the API is open.
    pub admin_password: Option<String>,
    pub default_company_profit_percentage: Decimal,
    pub default_payment_terms_days: u32,
    pub sweep_interval_secs: u64,
}

impl ServerConfig {
    pub fn from_env() -> AppResult<Self> {
        Self::from_map(&env_map())
    }

    pub fn from_map(vars: &HashMap<String, String>) -> AppResult<Self> {
        let default_company_profit_percentage: Decimal =
            parse(vars, "SB_DEFAULT_COMPANY_PROFIT_PCT", Decimal::from(25))?;
        if default_company_profit_percentage < Decimal::ZERO
            || default_company_profit_percentage > Decimal::ONE_HUNDRED
        {
            return Err(AppError::Config(format!(
                "SB_DEFAULT_COMPANY_PROFIT_PCT must be between 0 and 100, got {default_company_profit_percentage}"
            )));
        }

        let sweep_interval_secs = parse(vars, "SB_SWEEP_INTERVAL_SECS", 300u64)?;
        if sweep_interval_secs == 0 {
            return Err(AppError::Config(
                "SB_SWEEP_INTERVAL_SECS must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            bind_addr: get(vars, "SB_BIND_ADDR", "0.0.0.0:8080"),
            database_url: get(vars, "SB_DATABASE_URL", "sqlite://splitbook.db?mode=rwc"),
            admin_password: optional(vars, "SB_ADMIN_PASSWORD"),
            default_company_profit_percentage,
            default_payment_terms_days: parse(vars, "SB_DEFAULT_PAYMENT_TERMS_DAYS", 30u32)?,
            sweep_interval_secs,
        })
    }
}

fn env_map() -> HashMap<String, String> {
    env::vars().collect()
}

fn get(vars: &HashMap<String, String>, key: &str, default: &str) -> String {
    vars.get(key)
        .cloned()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn optional(vars: &HashMap<String, String>, key: &str) -> Option<String> {
    vars.get(key).cloned().filter(|v| !v.is_empty())
}

fn parse<T: FromStr>(vars: &HashMap<String, String>, key: &str, default: T) -> AppResult<T> {
    match optional(vars, key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("invalid value for {key}: {raw:?}"))),
    }
}
