use std::path::PathBuf;

/// Runtime configuration for the stocksync binary.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Connection URL of the authoritative source database.
    pub source_database_url: String,

    /// Connection URL of the mirrored destination database.
    pub destination_database_url: String,

    /// Worker count. `None` uses the number of available CPUs.
    pub workers: Option<usize>,

    /// Site whose stock is mirrored. Default: 2.
    pub site_id: i32,

    /// Brand whose catalogue is mirrored. Default: 1.
    pub brand_id: i32,

    /// Directory receiving the dated log file.
    pub log_dir: PathBuf,

    /// Seconds a worker waits for a destination connection.
    pub pool_timeout_secs: u64,

    /// Replacement for the built-in stock projection query.
    pub stock_query: Option<String>,

    /// Replacement for the built-in product projection query.
    pub product_query: Option<String>,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    /// Load configuration from a custom variable reader.
    ///
    /// Tests supply variables through this instead of mutating the process
    /// environment.
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let source_database_url = reader("SOURCE_DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("SOURCE_DATABASE_URL".into()))?;

        let destination_database_url = reader("DESTINATION_DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DESTINATION_DATABASE_URL".into()))?;

        let workers = match reader("STOCKSYNC_WORKERS") {
            Ok(raw) => {
                let workers = raw.trim().parse::<usize>().map_err(|e| {
                    ConfigError::InvalidValue("STOCKSYNC_WORKERS".into(), e.to_string())
                })?;
                if workers == 0 {
                    return Err(ConfigError::InvalidValue(
                        "STOCKSYNC_WORKERS".into(),
                        "must be at least 1".into(),
                    ));
                }
                Some(workers)
            }
            Err(_) => None,
        };

        let site_id = reader("STOCKSYNC_SITE_ID")
            .unwrap_or_else(|_| "2".to_string())
            .trim()
            .parse::<i32>()
            .map_err(|e| ConfigError::InvalidValue("STOCKSYNC_SITE_ID".into(), e.to_string()))?;

        let brand_id = reader("STOCKSYNC_BRAND_ID")
            .unwrap_or_else(|_| "1".to_string())
            .trim()
            .parse::<i32>()
            .map_err(|e| ConfigError::InvalidValue("STOCKSYNC_BRAND_ID".into(), e.to_string()))?;

        let log_dir = reader("STOCKSYNC_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("logs"));

        let pool_timeout_secs = reader("STOCKSYNC_POOL_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .trim()
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidValue("STOCKSYNC_POOL_TIMEOUT_SECS".into(), e.to_string())
            })?;

        let stock_query = non_blank(reader("STOCKSYNC_STOCK_QUERY").ok());
        let product_query = non_blank(reader("STOCKSYNC_PRODUCT_QUERY").ok());

        Ok(Self {
            source_database_url,
            destination_database_url,
            workers,
            site_id,
            brand_id,
            log_dir,
            pool_timeout_secs,
            stock_query,
            product_query,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::env::VarError;

    fn make_reader(vars: HashMap<&str, &str>) -> impl Fn(&str) -> Result<String, VarError> {
        let owned: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| owned.get(key).cloned().ok_or(VarError::NotPresent)
    }

    fn required() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("SOURCE_DATABASE_URL", "postgres://erp@erp-db/erp"),
            ("DESTINATION_DATABASE_URL", "postgres://shop@shop-db/shop"),
        ])
    }

    #[test]
    fn test_missing_source_url() {
        let reader = make_reader(HashMap::from([(
            "DESTINATION_DATABASE_URL",
            "postgres://shop@shop-db/shop",
        )]));

        let err = AppConfig::from_reader(reader).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(_)));
        assert!(err.to_string().contains("SOURCE_DATABASE_URL"));
    }

    #[test]
    fn test_missing_destination_url() {
        let reader = make_reader(HashMap::from([(
            "SOURCE_DATABASE_URL",
            "postgres://erp@erp-db/erp",
        )]));

        let err = AppConfig::from_reader(reader).unwrap_err();
        assert!(err.to_string().contains("DESTINATION_DATABASE_URL"));
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_reader(make_reader(required())).unwrap();

        assert_eq!(config.source_database_url, "postgres://erp@erp-db/erp");
        assert_eq!(config.destination_database_url, "postgres://shop@shop-db/shop");
        assert_eq!(config.workers, None);
        assert_eq!(config.site_id, 2);
        assert_eq!(config.brand_id, 1);
        assert_eq!(config.log_dir, PathBuf::from("logs"));
        assert_eq!(config.pool_timeout_secs, 30);
        assert!(config.stock_query.is_none());
        assert!(config.product_query.is_none());
    }

    #[test]
    fn test_custom_values() {
        let mut vars = required();
        vars.extend([
            ("STOCKSYNC_WORKERS", "8"),
            ("STOCKSYNC_SITE_ID", "7"),
            ("STOCKSYNC_BRAND_ID", "3"),
            ("STOCKSYNC_LOG_DIR", "/var/log/stocksync"),
            ("STOCKSYNC_POOL_TIMEOUT_SECS", "5"),
            ("STOCKSYNC_STOCK_QUERY", "SELECT 1"),
        ]);

        let config = AppConfig::from_reader(make_reader(vars)).unwrap();
        assert_eq!(config.workers, Some(8));
        assert_eq!(config.site_id, 7);
        assert_eq!(config.brand_id, 3);
        assert_eq!(config.log_dir, PathBuf::from("/var/log/stocksync"));
        assert_eq!(config.pool_timeout_secs, 5);
        assert_eq!(config.stock_query.as_deref(), Some("SELECT 1"));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut vars = required();
        vars.insert("STOCKSYNC_WORKERS", "0");

        let err = AppConfig::from_reader(make_reader(vars)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(..)));
        assert!(err.to_string().contains("STOCKSYNC_WORKERS"));
    }

    #[test]
    fn test_invalid_site_id() {
        let mut vars = required();
        vars.insert("STOCKSYNC_SITE_ID", "north");

        let err = AppConfig::from_reader(make_reader(vars)).unwrap_err();
        assert!(err.to_string().contains("STOCKSYNC_SITE_ID"));
    }

    #[test]
    fn test_blank_query_ignored() {
        let mut vars = required();
        vars.insert("STOCKSYNC_PRODUCT_QUERY", "   ");

        let config = AppConfig::from_reader(make_reader(vars)).unwrap();
        assert!(config.product_query.is_none());
    }
}
