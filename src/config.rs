//! Process-wide configuration: environment-driven settings and the static
//! system-id mount table.

use once_cell::sync::Lazy;
use regex::Regex;

/// One ordered mapping rule from a system-id pattern to a physical mount
/// path. Rules are checked in declaration order; first match wins, which is
/// what lets the broader `^project-` prefix rule coexist with the exact
/// per-system rules above it.
pub struct MountRule {
    pub pattern: Regex,
    pub path: &'static str,
}

static SYSTEM_ID_PATHS: Lazy<Vec<MountRule>> = Lazy::new(|| {
    vec![
        MountRule {
            pattern: Regex::new(r"^depot\.storage\.default$").unwrap(),
            path: "/corral/depot/shared",
        },
        MountRule {
            pattern: Regex::new(r"^depot\.storage\.community$").unwrap(),
            path: "/corral/depot/community",
        },
        MountRule {
            pattern: Regex::new(r"^depot\.storage\.published$").unwrap(),
            path: "/corral/depot/published",
        },
        MountRule {
            pattern: Regex::new(r"^project-").unwrap(),
            path: "/corral/depot/projects",
        },
    ]
});

/// Resolve a system-id to its physical mount path. `None` means the
/// system-id has no local mount and the backend-native path is the path;
/// callers must not treat that as an error.
pub fn base_mounted_path(system_id: &str) -> Option<&'static str> {
    SYSTEM_ID_PATHS
        .iter()
        .find(|rule| rule.pattern.is_match(system_id))
        .map(|rule| rule.path)
}

/// Environment-driven runtime settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub http_port: u16,
    /// Local JSON user file backing login.
    pub users_file: String,
    /// Base URL of the remote HPC storage gateway API.
    pub gateway_url: String,
    /// Service token presented to the gateway.
    pub gateway_token: String,
    /// Base URL of the consumer cloud storage API.
    pub cloud_url: String,
    pub cloud_token: String,
    /// Base URL of the search index service.
    pub index_url: String,
    /// Base URL of the external task queue accepting reindex jobs.
    pub queue_url: String,
    /// Service identity attached to every reindex job.
    pub reindex_user: String,
    /// System-id used by the primary gateway adapter when a request names none.
    pub default_system: String,
    /// System-id backing the public/shared view.
    pub public_system: String,
    /// System-id label for the cloud provider namespace.
    pub cloud_system: String,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl Settings {
    pub fn from_env() -> Self {
        Settings {
            http_port: env_or("DEPOT_HTTP_PORT", "8660").parse().unwrap_or(8660),
            users_file: env_or("DEPOT_USERS_FILE", "users.json"),
            gateway_url: env_or("DEPOT_GATEWAY_URL", "http://localhost:8443"),
            gateway_token: env_or("DEPOT_GATEWAY_TOKEN", ""),
            cloud_url: env_or("DEPOT_CLOUD_URL", "http://localhost:8444"),
            cloud_token: env_or("DEPOT_CLOUD_TOKEN", ""),
            index_url: env_or("DEPOT_INDEX_URL", "http://localhost:9200"),
            queue_url: env_or("DEPOT_QUEUE_URL", "http://localhost:5672"),
            reindex_user: env_or("DEPOT_REINDEX_USER", "depot_admin"),
            default_system: env_or("DEPOT_DEFAULT_SYSTEM", "depot.storage.default"),
            public_system: env_or("DEPOT_PUBLIC_SYSTEM", "depot.storage.published"),
            cloud_system: env_or("DEPOT_CLOUD_SYSTEM", "cloud"),
        }
    }
}
