//! Client configuration loaded via OrthoConfig.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::StoreSettings;

const DEFAULT_BASE_URL: &str = "http://localhost:5000";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAX_CONCURRENT_LOOKUPS: usize = 8;
const DEFAULT_PAGE_SIZE: u32 = 50;
const DEFAULT_MAX_PAGES: u32 = 200;

/// Configuration values for talking to the claims service.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "CLAIMS_CLIENT")]
pub struct ClientSettings {
    /// Root URL of the claims service.
    pub base_url: Option<String>,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: Option<u64>,
    /// Concurrent direct user lookups during enrichment.
    pub max_concurrent_lookups: Option<usize>,
    /// Follow listing pages until the last one.
    #[ortho_config(default = false)]
    pub fetch_all_pages: bool,
    /// Page size requested when following pages.
    pub page_size: Option<u32>,
    /// Upper bound on pages followed per listing.
    pub max_pages: Option<u32>,
}

impl ClientSettings {
    /// Return the configured service URL, falling back to the default.
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_BASE_URL)
    }

    /// Return the request timeout, falling back to the default.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    /// Return the lookup concurrency, never below one.
    pub fn max_concurrent_lookups(&self) -> usize {
        self.max_concurrent_lookups
            .unwrap_or(DEFAULT_MAX_CONCURRENT_LOOKUPS)
            .max(1)
    }

    /// Return the listing page size, never below one.
    pub fn page_size(&self) -> u32 {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1)
    }

    /// Return the page cap, never below one.
    pub fn max_pages(&self) -> u32 {
        self.max_pages.unwrap_or(DEFAULT_MAX_PAGES).max(1)
    }

    /// Store settings derived from this configuration.
    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings {
            fetch_all_pages: self.fetch_all_pages,
            page_size: self.page_size(),
            max_pages: self.max_pages(),
            max_concurrent_lookups: self.max_concurrent_lookups(),
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for client configuration parsing.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    const VARS: [&str; 6] = [
        "CLAIMS_CLIENT_BASE_URL",
        "CLAIMS_CLIENT_REQUEST_TIMEOUT_SECS",
        "CLAIMS_CLIENT_MAX_CONCURRENT_LOOKUPS",
        "CLAIMS_CLIENT_FETCH_ALL_PAGES",
        "CLAIMS_CLIENT_PAGE_SIZE",
        "CLAIMS_CLIENT_MAX_PAGES",
    ];

    fn load_from_empty_args() -> ClientSettings {
        ClientSettings::load_from_iter([OsString::from("claims-sync")])
            .expect("config should load")
    }

    #[rstest]
    fn default_values_are_used_when_missing() {
        let _guard = lock_env(VARS.map(|name| (name, None::<String>)));

        let settings = load_from_empty_args();
        assert_eq!(settings.base_url(), DEFAULT_BASE_URL);
        assert_eq!(settings.request_timeout(), Duration::from_secs(10));
        assert_eq!(settings.store_settings(), StoreSettings::default());
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env([
            ("CLAIMS_CLIENT_BASE_URL", Some("https://claims.example.test".to_owned())),
            ("CLAIMS_CLIENT_REQUEST_TIMEOUT_SECS", Some("3".to_owned())),
            ("CLAIMS_CLIENT_MAX_CONCURRENT_LOOKUPS", Some("2".to_owned())),
            ("CLAIMS_CLIENT_FETCH_ALL_PAGES", Some("true".to_owned())),
            ("CLAIMS_CLIENT_PAGE_SIZE", Some("25".to_owned())),
            ("CLAIMS_CLIENT_MAX_PAGES", Some("4".to_owned())),
        ]);

        let settings = load_from_empty_args();
        assert_eq!(settings.base_url(), "https://claims.example.test");
        assert_eq!(settings.request_timeout(), Duration::from_secs(3));
        assert_eq!(
            settings.store_settings(),
            StoreSettings {
                fetch_all_pages: true,
                page_size: 25,
                max_pages: 4,
                max_concurrent_lookups: 2,
            }
        );
    }

    #[rstest]
    fn zero_values_fall_back_to_usable_bounds() {
        let _guard = lock_env([
            ("CLAIMS_CLIENT_BASE_URL", Some("   ".to_owned())),
            ("CLAIMS_CLIENT_REQUEST_TIMEOUT_SECS", Some("0".to_owned())),
            ("CLAIMS_CLIENT_MAX_CONCURRENT_LOOKUPS", Some("0".to_owned())),
            ("CLAIMS_CLIENT_FETCH_ALL_PAGES", None::<String>),
            ("CLAIMS_CLIENT_PAGE_SIZE", Some("0".to_owned())),
            ("CLAIMS_CLIENT_MAX_PAGES", Some("0".to_owned())),
        ]);

        let settings = load_from_empty_args();
        assert_eq!(settings.base_url(), DEFAULT_BASE_URL);
        assert_eq!(settings.request_timeout(), Duration::from_secs(10));
        assert_eq!(settings.max_concurrent_lookups(), 1);
        assert_eq!(settings.page_size(), 1);
        assert_eq!(settings.max_pages(), 1);
    }
}
