use crate::app_config::{AppConfig, Environment};
use crate::{ConfigError, StalePolicy};

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("VCAT_ENV", "development"))?;
    let log_level = or_default("VCAT_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("VCAT_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("VCAT_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("VCAT_DB_ACQUIRE_TIMEOUT_SECS", "10")?;
    if db_min_connections > db_max_connections {
        return Err(invalid(
            "VCAT_DB_MIN_CONNECTIONS",
            format!("{db_min_connections} exceeds VCAT_DB_MAX_CONNECTIONS ({db_max_connections})"),
        ));
    }

    let import_dir = PathBuf::from(or_default("VCAT_IMPORT_DIR", "./imports/incoming"));
    let completed_dir = PathBuf::from(or_default("VCAT_COMPLETED_DIR", "./imports/completed"));

    let stale_policy = or_default("VCAT_STALE_POLICY", "flag")
        .parse::<StalePolicy>()
        .map_err(|reason| invalid("VCAT_STALE_POLICY", reason))?;

    let window_size = parse_usize("VCAT_WINDOW_SIZE", "80")?;
    if window_size == 0 {
        return Err(invalid("VCAT_WINDOW_SIZE", "must be at least 1".to_string()));
    }

    let import_budget_secs = parse_u64("VCAT_IMPORT_BUDGET_SECS", "600")?;
    let reschedule_delay_secs = parse_u64("VCAT_RESCHEDULE_DELAY_SECS", "180")?;
    let import_cron = or_default("VCAT_IMPORT_CRON", "0 0 * * * *");
    let image_cron = or_default("VCAT_IMAGE_CRON", "0 30 * * * *");

    let image_batch_size = parse_usize("VCAT_IMAGE_BATCH_SIZE", "50")?;
    if image_batch_size == 0 {
        return Err(invalid("VCAT_IMAGE_BATCH_SIZE", "must be at least 1".to_string()));
    }
    let image_timeout_secs = parse_u64("VCAT_IMAGE_TIMEOUT_SECS", "30")?;
    let image_user_agent = or_default("VCAT_IMAGE_USER_AGENT", "vcat/0.1 (catalog-importer)");
    let fallback_image_path = lookup("VCAT_FALLBACK_IMAGE_PATH")
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from);

    let currency_code = or_default("VCAT_CURRENCY_CODE", "USD");
    let size_attribute = or_default("VCAT_SIZE_ATTRIBUTE", "Size");

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        import_dir,
        completed_dir,
        stale_policy,
        window_size,
        import_budget_secs,
        reschedule_delay_secs,
        import_cron,
        image_cron,
        image_batch_size,
        image_timeout_secs,
        image_user_agent,
        fallback_image_path,
        currency_code,
        size_attribute,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "VCAT_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
