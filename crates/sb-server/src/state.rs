use rust_decimal::Decimal;
use sb_common::config::ServerConfig;
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct AppState {
    pub boot_id: String,
    pub git_sha: Option<String>,
    pub admin_password: Option<String>,
    pub db_pool: SqlitePool,
    pub default_company_profit_percentage: Decimal,
    pub default_payment_terms_days: u32,
}

impl AppState {
    pub fn new(
        boot_id: String,
        git_sha: Option<String>,
        config: &ServerConfig,
        db_pool: SqlitePool,
    ) -> Self {
        Self {
            boot_id,
            git_sha,
            admin_password: config.admin_password.clone(),
            db_pool,
            default_company_profit_percentage: config.default_company_profit_percentage,
            default_payment_terms_days: config.default_payment_terms_days,
        }
    }

    /// Defaults from an empty environment, for tests.
    pub fn for_tests(db_pool: SqlitePool, admin_password: Option<&str>) -> Self {
        Self {
            boot_id: "boot-test".to_string(),
            git_sha: None,
            admin_password: admin_password.map(ToString::to_string),
            db_pool,
            default_company_profit_percentage: Decimal::from(25),
            default_payment_terms_days: 30,
        }
    }
}
