//! Pipeline configuration resolution
//!
//! Each setting is resolved independently with Database → ENV → TOML →
//! compiled default priority. Disagreeing sources are logged so a stale
//! environment variable does not silently lose to the settings table.

use chrono::Duration;
use scorecard_common::config::TomlConfig;
use scorecard_common::{Error, Result};
use sqlx::{Pool, Sqlite};
use std::fmt::Display;
use std::str::FromStr;
use tracing::{info, warn};

use crate::db::settings;
use crate::validators::{DispositionRule, HoldPolicy, ValidationPolicy};

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_SCORECARD_WINDOW_DAYS: u32 = 90;
pub const DEFAULT_ROLLUP_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_MAX_LOCK_WAIT_MS: u64 = 5000;
/// Ten years
pub const MAX_AGGREGATION_OPEN_WINDOW_HOURS: u64 = 87_600;

pub const ENV_HOLD_POLICY: &str = "SCORECARD_HOLD_POLICY";
pub const ENV_AGGREGATION_OPEN_WINDOW_HOURS: &str = "SCORECARD_AGGREGATION_OPEN_WINDOW_HOURS";
pub const ENV_MAX_UPLOAD_BYTES: &str = "SCORECARD_MAX_UPLOAD_BYTES";
pub const ENV_SCORECARD_WINDOW_DAYS: &str = "SCORECARD_WINDOW_DAYS";
pub const ENV_ROLLUP_INTERVAL_SECS: &str = "SCORECARD_ROLLUP_INTERVAL_SECS";
pub const ENV_MAX_LOCK_WAIT_MS: &str = "SCORECARD_MAX_LOCK_WAIT_MS";
pub const ENV_DISPOSITION_RULE: &str = "SCORECARD_DISPOSITION_RULE";
pub const ENV_DROP_FOLDER_POLL_SECS: &str = "SCORECARD_DROP_FOLDER_POLL_SECS";

/// Resolved pipeline settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub hold_policy: HoldPolicy,
    /// `None` flags every pack still open at end of document
    pub aggregation_open_window_hours: Option<u64>,
    pub max_upload_bytes: usize,
    pub scorecard_window_days: u32,
    /// 0 disables the background rollup task
    pub rollup_interval_secs: u64,
    pub max_lock_wait_ms: u64,
    pub disposition_rule: DispositionRule,
    /// 0 disables the drop-folder scan
    pub drop_folder_poll_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            hold_policy: HoldPolicy::default(),
            aggregation_open_window_hours: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            scorecard_window_days: DEFAULT_SCORECARD_WINDOW_DAYS,
            rollup_interval_secs: DEFAULT_ROLLUP_INTERVAL_SECS,
            max_lock_wait_ms: DEFAULT_MAX_LOCK_WAIT_MS,
            disposition_rule: DispositionRule::default(),
            drop_folder_poll_secs: 0,
        }
    }
}

impl PipelineConfig {
    /// Resolve every setting from database, environment and TOML
    pub async fn resolve(db: &Pool<Sqlite>, toml_config: &TomlConfig) -> Result<Self> {
        let toml = &toml_config.pipeline;
        let defaults = Self::default();

        let hold_policy = parse_toml::<HoldPolicy>("hold_policy", toml.hold_policy.as_deref())?;
        let disposition_rule =
            parse_toml::<DispositionRule>("disposition_rule", toml.disposition_rule.as_deref())?;

        let config = Self {
            hold_policy: resolve_setting(db, settings::HOLD_POLICY, ENV_HOLD_POLICY, hold_policy)
                .await?
                .unwrap_or(defaults.hold_policy),
            aggregation_open_window_hours: resolve_setting(
                db,
                settings::AGGREGATION_OPEN_WINDOW_HOURS,
                ENV_AGGREGATION_OPEN_WINDOW_HOURS,
                toml.aggregation_open_window_hours,
            )
            .await?,
            max_upload_bytes: resolve_setting(
                db,
                settings::MAX_UPLOAD_BYTES,
                ENV_MAX_UPLOAD_BYTES,
                toml.max_upload_bytes,
            )
            .await?
            .unwrap_or(defaults.max_upload_bytes),
            scorecard_window_days: resolve_setting(
                db,
                settings::SCORECARD_WINDOW_DAYS,
                ENV_SCORECARD_WINDOW_DAYS,
                toml.scorecard_window_days,
            )
            .await?
            .unwrap_or(defaults.scorecard_window_days),
            rollup_interval_secs: resolve_setting(
                db,
                settings::ROLLUP_INTERVAL_SECS,
                ENV_ROLLUP_INTERVAL_SECS,
                toml.rollup_interval_secs,
            )
            .await?
            .unwrap_or(defaults.rollup_interval_secs),
            max_lock_wait_ms: resolve_setting(
                db,
                settings::MAX_LOCK_WAIT_MS,
                ENV_MAX_LOCK_WAIT_MS,
                toml.max_lock_wait_ms,
            )
            .await?
            .unwrap_or(defaults.max_lock_wait_ms),
            disposition_rule: resolve_setting(
                db,
                settings::DISPOSITION_RULE,
                ENV_DISPOSITION_RULE,
                disposition_rule,
            )
            .await?
            .unwrap_or(defaults.disposition_rule),
            drop_folder_poll_secs: resolve_setting(
                db,
                settings::DROP_FOLDER_POLL_SECS,
                ENV_DROP_FOLDER_POLL_SECS,
                toml.drop_folder_poll_secs,
            )
            .await?
            .unwrap_or(defaults.drop_folder_poll_secs),
        };

        config.check()?;

        info!(
            hold_policy = %config.hold_policy,
            aggregation_open_window_hours = ?config.aggregation_open_window_hours,
            max_upload_bytes = config.max_upload_bytes,
            scorecard_window_days = config.scorecard_window_days,
            rollup_interval_secs = config.rollup_interval_secs,
            max_lock_wait_ms = config.max_lock_wait_ms,
            disposition_rule = %config.disposition_rule,
            drop_folder_poll_secs = config.drop_folder_poll_secs,
            "Pipeline configuration resolved"
        );

        Ok(config)
    }

    fn check(&self) -> Result<()> {
        if self.max_upload_bytes == 0 {
            return Err(Error::Config("max_upload_bytes must be greater than 0".to_string()));
        }
        if self.scorecard_window_days == 0 {
            return Err(Error::Config("scorecard_window_days must be at least 1".to_string()));
        }
        if let Some(hours) = self.aggregation_open_window_hours {
            if hours > MAX_AGGREGATION_OPEN_WINDOW_HOURS {
                return Err(Error::Config(format!(
                    "aggregation_open_window_hours must be at most {} (got {})",
                    MAX_AGGREGATION_OPEN_WINDOW_HOURS, hours
                )));
            }
        }
        Ok(())
    }

    pub fn validation_policy(&self) -> ValidationPolicy {
        ValidationPolicy {
            hold_policy: self.hold_policy,
            disposition_rule: self.disposition_rule,
            // Clamped so an unchecked value cannot overflow the duration
            aggregation_open_window: self.aggregation_open_window_hours.map(|hours| {
                Duration::hours(hours.min(MAX_AGGREGATION_OPEN_WINDOW_HOURS) as i64)
            }),
        }
    }
}

/// Parse an optional TOML text value into its typed form
fn parse_toml<T>(key: &str, text: Option<&str>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    text.map(|text| {
        text.parse::<T>()
            .map_err(|e| Error::Config(format!("[pipeline] {}: {}", key, e)))
    })
    .transpose()
}

/// One setting from the first source that has it
///
/// **Priority:** Database → ENV → TOML. An unparseable environment value is
/// ignored with a warning; an unparseable database value is an error.
async fn resolve_setting<T>(
    db: &Pool<Sqlite>,
    key: &str,
    env_var: &str,
    toml_value: Option<T>,
) -> Result<Option<T>>
where
    T: FromStr + PartialEq + Display + Clone,
    T::Err: Display,
{
    let db_value = settings::get_setting::<T>(db, key).await?;
    let env_value = read_env::<T>(env_var);

    let mut sources: Vec<(&str, &T)> = Vec::new();
    if let Some(value) = &db_value {
        sources.push(("database", value));
    }
    if let Some(value) = &env_value {
        sources.push(("environment", value));
    }
    if let Some(value) = &toml_value {
        sources.push(("TOML", value));
    }

    if let Some((winner, chosen)) = sources.first() {
        if sources.iter().any(|(_, value)| value != chosen) {
            let listed: Vec<String> = sources
                .iter()
                .map(|(source, value)| format!("{}={}", source, value))
                .collect();
            warn!(
                "Setting '{}' differs between sources ({}). Using {} (highest priority).",
                key,
                listed.join(", "),
                winner
            );
        }
    }

    Ok(db_value.or(env_value).or(toml_value))
}

fn read_env<T>(name: &str) -> Option<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = std::env::var(name).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    match trimmed.parse::<T>() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring {}='{}': {}", name, raw, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scorecard_common::config::PipelineSection;
    use serial_test::serial;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query("CREATE TABLE settings (key TEXT PRIMARY KEY, value TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        pool
    }

    fn clear_env() {
        for name in [
            ENV_HOLD_POLICY,
            ENV_AGGREGATION_OPEN_WINDOW_HOURS,
            ENV_MAX_UPLOAD_BYTES,
            ENV_SCORECARD_WINDOW_DAYS,
            ENV_ROLLUP_INTERVAL_SECS,
            ENV_MAX_LOCK_WAIT_MS,
            ENV_DISPOSITION_RULE,
            ENV_DROP_FOLDER_POLL_SECS,
        ] {
            std::env::remove_var(name);
        }
    }

    #[tokio::test]
    #[serial]
    async fn test_defaults_without_sources() {
        clear_env();
        let pool = setup_test_db().await;

        let config = PipelineConfig::resolve(&pool, &TomlConfig::default()).await.unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.validation_policy(), ValidationPolicy::default());
    }

    #[tokio::test]
    #[serial]
    async fn test_priority_database_env_toml() {
        clear_env();
        let pool = setup_test_db().await;

        let toml = TomlConfig {
            pipeline: PipelineSection {
                hold_policy: Some("open_aggregation".to_string()),
                max_lock_wait_ms: Some(100),
                rollup_interval_secs: Some(10),
                ..Default::default()
            },
            ..Default::default()
        };

        std::env::set_var(ENV_MAX_LOCK_WAIT_MS, "200");
        std::env::set_var(ENV_ROLLUP_INTERVAL_SECS, "20");
        settings::set_setting(&pool, settings::MAX_LOCK_WAIT_MS, 300u64).await.unwrap();

        let config = PipelineConfig::resolve(&pool, &toml).await.unwrap();
        assert_eq!(config.max_lock_wait_ms, 300);
        assert_eq!(config.rollup_interval_secs, 20);
        assert_eq!(config.hold_policy, HoldPolicy::OpenAggregation);

        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn test_bad_env_value_ignored() {
        clear_env();
        let pool = setup_test_db().await;

        std::env::set_var(ENV_AGGREGATION_OPEN_WINDOW_HOURS, "two days");
        let config = PipelineConfig::resolve(&pool, &TomlConfig::default()).await.unwrap();
        assert_eq!(config.aggregation_open_window_hours, None);

        std::env::set_var(ENV_AGGREGATION_OPEN_WINDOW_HOURS, "48");
        let config = PipelineConfig::resolve(&pool, &TomlConfig::default()).await.unwrap();
        assert_eq!(
            config.validation_policy().aggregation_open_window,
            Some(Duration::hours(48))
        );

        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn test_invalid_toml_hold_policy_rejected() {
        clear_env();
        let pool = setup_test_db().await;

        let toml = TomlConfig {
            pipeline: PipelineSection {
                hold_policy: Some("never".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        assert!(matches!(
            PipelineConfig::resolve(&pool, &toml).await,
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    #[serial]
    async fn test_disposition_rule_sources() {
        clear_env();
        let pool = setup_test_db().await;

        let toml = TomlConfig {
            pipeline: PipelineSection {
                disposition_rule: Some("warning".to_string()),
                drop_folder_poll_secs: Some(15),
                ..Default::default()
            },
            ..Default::default()
        };
        let config = PipelineConfig::resolve(&pool, &toml).await.unwrap();
        assert_eq!(config.disposition_rule, DispositionRule::Warning);
        assert_eq!(config.validation_policy().disposition_rule, DispositionRule::Warning);
        assert_eq!(config.drop_folder_poll_secs, 15);

        std::env::set_var(ENV_DISPOSITION_RULE, "off");
        let config = PipelineConfig::resolve(&pool, &toml).await.unwrap();
        assert_eq!(config.disposition_rule, DispositionRule::Off);
        clear_env();

        let toml = TomlConfig {
            pipeline: PipelineSection {
                disposition_rule: Some("sometimes".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            PipelineConfig::resolve(&pool, &toml).await,
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    #[serial]
    async fn test_oversized_aggregation_window_rejected() {
        clear_env();
        let pool = setup_test_db().await;

        for hours in [MAX_AGGREGATION_OPEN_WINDOW_HOURS + 1, 10u64.pow(16), u64::MAX] {
            settings::set_setting(&pool, settings::AGGREGATION_OPEN_WINDOW_HOURS, hours)
                .await
                .unwrap();
            assert!(
                matches!(
                    PipelineConfig::resolve(&pool, &TomlConfig::default()).await,
                    Err(Error::Config(_))
                ),
                "{} hours should be rejected",
                hours
            );
        }

        settings::set_setting(
            &pool,
            settings::AGGREGATION_OPEN_WINDOW_HOURS,
            MAX_AGGREGATION_OPEN_WINDOW_HOURS,
        )
        .await
        .unwrap();
        let config = PipelineConfig::resolve(&pool, &TomlConfig::default()).await.unwrap();
        assert_eq!(
            config.aggregation_open_window_hours,
            Some(MAX_AGGREGATION_OPEN_WINDOW_HOURS)
        );
    }

    #[test]
    fn test_validation_policy_never_overflows() {
        for hours in [10u64.pow(16), u64::MAX] {
            let config = PipelineConfig {
                aggregation_open_window_hours: Some(hours),
                ..Default::default()
            };
            let window = config.validation_policy().aggregation_open_window.unwrap();
            assert_eq!(window, Duration::hours(MAX_AGGREGATION_OPEN_WINDOW_HOURS as i64));
        }
    }

    #[tokio::test]
    #[serial]
    async fn test_zero_window_rejected() {
        clear_env();
        let pool = setup_test_db().await;
        settings::set_setting(&pool, settings::SCORECARD_WINDOW_DAYS, 0u32).await.unwrap();

        assert!(PipelineConfig::resolve(&pool, &TomlConfig::default()).await.is_err());
    }
}
