pub mod account;
pub mod auth;
pub mod dashboard;
pub mod domain;
pub mod financial;
pub mod store;
pub mod time;

pub mod config {
    use anyhow::Context;

    const DEFAULT_STORE_TIMEOUT_SECS: u64 = 30;
    const DEFAULT_STORE_RETRIES: u32 = 3;
    pub const MAX_STORE_RETRIES: u32 = 10;
    const DEFAULT_STORE_PAGE_SIZE: u32 = 100;
    const DEFAULT_LOOKUP_CONCURRENCY: usize = 8;
    // Vietnam (UTC+7); revenue is stored in VND.
    const DEFAULT_DISPLAY_UTC_OFFSET_MINUTES: i32 = 7 * 60;
    const DEFAULT_SESSION_CACHE_TTL_SECS: u64 = 60;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub appwrite_endpoint: Option<String>,
        pub appwrite_project_id: Option<String>,
        pub appwrite_api_key: Option<String>,
        pub appwrite_database_id: Option<String>,
        pub collections: CollectionIds,
        pub store_timeout_secs: u64,
        pub store_retries: u32,
        pub store_page_size: u32,
        pub lookup_concurrency: usize,
        pub display_utc_offset_minutes: i32,
        pub session_cache_ttl_secs: u64,
        pub admin_emails: Vec<String>,
        pub account_deletion_function_id: Option<String>,
        pub sentry_dsn: Option<String>,
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct CollectionIds {
        pub transactions: String,
        pub payments: String,
        pub feedback: String,
        pub users: String,
        pub packages: String,
    }

    impl Default for CollectionIds {
        fn default() -> Self {
            Self {
                transactions: "transactions".to_string(),
                payments: "payments".to_string(),
                feedback: "feedback".to_string(),
                users: "users".to_string(),
                packages: "packages".to_string(),
            }
        }
    }

    impl CollectionIds {
        fn from_env() -> Self {
            let defaults = Self::default();
            let var = |key: &str, fallback: String| {
                std::env::var(key)
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or(fallback)
            };
            Self {
                transactions: var("APPWRITE_COL_TRANSACTIONS_ID", defaults.transactions),
                payments: var("APPWRITE_COL_PAYMENTS_ID", defaults.payments),
                feedback: var("APPWRITE_COL_FEEDBACK_ID", defaults.feedback),
                users: var("APPWRITE_COL_USERS_ID", defaults.users),
                packages: var("APPWRITE_COL_PACKAGES_ID", defaults.packages),
            }
        }
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let display_utc_offset_minutes = match std::env::var("DISPLAY_UTC_OFFSET_MINUTES") {
                Ok(s) => s
                    .trim()
                    .parse::<i32>()
                    .with_context(|| format!("invalid DISPLAY_UTC_OFFSET_MINUTES: {s}"))?,
                Err(_) => DEFAULT_DISPLAY_UTC_OFFSET_MINUTES,
            };
            anyhow::ensure!(
                (-14 * 60..=14 * 60).contains(&display_utc_offset_minutes),
                "DISPLAY_UTC_OFFSET_MINUTES out of range: {display_utc_offset_minutes}"
            );

            let lookup_concurrency = env_parse("LOOKUP_CONCURRENCY", DEFAULT_LOOKUP_CONCURRENCY);
            anyhow::ensure!(lookup_concurrency >= 1, "LOOKUP_CONCURRENCY must be >= 1");

            let store_page_size = env_parse("STORE_PAGE_SIZE", DEFAULT_STORE_PAGE_SIZE);
            anyhow::ensure!(
                (1..=5000).contains(&store_page_size),
                "STORE_PAGE_SIZE must be 1..=5000 (got {store_page_size})"
            );

            Ok(Self {
                appwrite_endpoint: std::env::var("APPWRITE_ENDPOINT").ok(),
                appwrite_project_id: std::env::var("APPWRITE_PROJECT_ID").ok(),
                appwrite_api_key: std::env::var("APPWRITE_API_KEY").ok(),
                appwrite_database_id: std::env::var("APPWRITE_DB_ID").ok(),
                collections: CollectionIds::from_env(),
                store_timeout_secs: env_parse("STORE_TIMEOUT_SECS", DEFAULT_STORE_TIMEOUT_SECS),
                store_retries: clamp_store_retries(env_parse("STORE_RETRIES", DEFAULT_STORE_RETRIES)),
                store_page_size,
                lookup_concurrency,
                display_utc_offset_minutes,
                session_cache_ttl_secs: env_parse(
                    "SESSION_CACHE_TTL_SECS",
                    DEFAULT_SESSION_CACHE_TTL_SECS,
                ),
                admin_emails: parse_admin_emails(std::env::var("ADMIN_EMAILS").ok().as_deref()),
                account_deletion_function_id: std::env::var("APPWRITE_DELETION_FUNCTION_ID")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
            })
        }

        pub fn require_appwrite_endpoint(&self) -> anyhow::Result<&str> {
            self.appwrite_endpoint
                .as_deref()
                .context("APPWRITE_ENDPOINT is required")
        }

        pub fn require_appwrite_project_id(&self) -> anyhow::Result<&str> {
            self.appwrite_project_id
                .as_deref()
                .context("APPWRITE_PROJECT_ID is required")
        }

        pub fn require_appwrite_database_id(&self) -> anyhow::Result<&str> {
            self.appwrite_database_id
                .as_deref()
                .context("APPWRITE_DB_ID is required")
        }

        pub fn store_timeout(&self) -> std::time::Duration {
            std::time::Duration::from_secs(self.store_timeout_secs)
        }

        pub fn session_cache_ttl(&self) -> std::time::Duration {
            std::time::Duration::from_secs(self.session_cache_ttl_secs)
        }

        pub fn display_offset(&self) -> anyhow::Result<chrono::FixedOffset> {
            chrono::FixedOffset::east_opt(self.display_utc_offset_minutes * 60)
                .context("invalid display UTC offset")
        }

        pub fn is_admin_email(&self, email: &str) -> bool {
            let email = email.trim();
            self.admin_emails
                .iter()
                .any(|admin| admin.eq_ignore_ascii_case(email))
        }
    }

    pub fn clamp_store_retries(retries: u32) -> u32 {
        retries.clamp(1, MAX_STORE_RETRIES)
    }

    fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
        std::env::var(key)
            .ok()
            .and_then(|s| s.trim().parse::<T>().ok())
            .unwrap_or(default)
    }

    fn parse_admin_emails(raw: Option<&str>) -> Vec<String> {
        raw.unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

}
