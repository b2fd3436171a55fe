use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

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
/// Decoupled from the process environment so tests can drive it with a
/// plain `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
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

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
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

    let parse_bool = |var: &str, default: bool| -> Result<bool, ConfigError> {
        match lookup(var) {
            Err(_) => Ok(default),
            Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                other => Err(invalid(var, format!("expected a boolean, got '{other}'"))),
            },
        }
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("SEOFLOW_ENV", "development"))?;
    let bind_addr = parse_addr("SEOFLOW_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("SEOFLOW_LOG_LEVEL", "info");
    let pipeline_config_path = PathBuf::from(or_default(
        "SEOFLOW_PIPELINE_CONFIG",
        "./config/pipeline.yaml",
    ));

    let db_max_connections = parse_u32("SEOFLOW_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("SEOFLOW_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("SEOFLOW_DB_ACQUIRE_TIMEOUT_SECS", "10")?;
    if db_min_connections > db_max_connections {
        return Err(invalid(
            "SEOFLOW_DB_MIN_CONNECTIONS",
            format!("{db_min_connections} exceeds SEOFLOW_DB_MAX_CONNECTIONS={db_max_connections}"),
        ));
    }

    let generator_url = lookup("SEOFLOW_GENERATOR_URL")
        .ok()
        .filter(|v| !v.trim().is_empty());
    let generator_api_key = lookup("SEOFLOW_GENERATOR_API_KEY")
        .ok()
        .filter(|v| !v.trim().is_empty());
    let generator_timeout_secs = parse_u64("SEOFLOW_GENERATOR_TIMEOUT_SECS", "120")?;
    let generator_max_retries = parse_u32("SEOFLOW_GENERATOR_MAX_RETRIES", "2")?;
    let attribution_timeout_secs = parse_u64("SEOFLOW_ATTRIBUTION_TIMEOUT_SECS", "30")?;
    if generator_timeout_secs == 0 {
        return Err(invalid(
            "SEOFLOW_GENERATOR_TIMEOUT_SECS",
            "must be greater than zero".to_string(),
        ));
    }
    if attribution_timeout_secs == 0 {
        return Err(invalid(
            "SEOFLOW_ATTRIBUTION_TIMEOUT_SECS",
            "must be greater than zero".to_string(),
        ));
    }

    let scheduler_enabled = parse_bool("SEOFLOW_SCHEDULER_ENABLED", true)?;

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        pipeline_config_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        generator_url,
        generator_api_key,
        generator_timeout_secs,
        generator_max_retries,
        attribution_timeout_secs,
        scheduler_enabled,
    })
}

fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "SEOFLOW_ENV".to_string(),
            reason: format!("expected development|test|production, got '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
