//! Database / cache role inference
//!
//! A best-effort guess at which compose service is "the database" and which is
//! "the cache", used only to pick the hostname that replaces localhost
//! literals. Per role, image families are tried first, then role-specific
//! environment keys, then a conventional default name.

use super::manifest::ServiceDescriptor;
use serde::Serialize;
use std::fmt;

const DEFAULT_DATABASE: &str = "postgres";
const DEFAULT_CACHE: &str = "redis";

const DATABASE_IMAGE_TOKENS: &[&str] = &["postgres", "postgis", "timescale", "mysql", "mariadb", "mongo"];
const DATABASE_ENV_KEYS: &[&str] = &[
    "POSTGRES_PASSWORD",
    "POSTGRES_USER",
    "POSTGRES_DB",
    "MYSQL_ROOT_PASSWORD",
    "MYSQL_DATABASE",
    "MONGO_INITDB_ROOT_USERNAME",
];

const CACHE_IMAGE_TOKENS: &[&str] = &["redis", "valkey", "keydb", "memcached"];
const CACHE_ENV_KEYS: &[&str] = &["REDIS_PASSWORD", "REDIS_ARGS"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Database,
    Cache,
}

impl Role {
    fn image_tokens(&self) -> &'static [&'static str] {
        match self {
            Role::Database => DATABASE_IMAGE_TOKENS,
            Role::Cache => CACHE_IMAGE_TOKENS,
        }
    }

    fn env_keys(&self) -> &'static [&'static str] {
        match self {
            Role::Database => DATABASE_ENV_KEYS,
            Role::Cache => CACHE_ENV_KEYS,
        }
    }

    fn default_service(&self) -> &'static str {
        match self {
            Role::Database => DEFAULT_DATABASE,
            Role::Cache => DEFAULT_CACHE,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Database => f.write_str("database"),
            Role::Cache => f.write_str("cache"),
        }
    }
}

/// Concrete service names for each role. Transient, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleAssignment {
    pub database: String,
    pub cache: String,
}

impl Default for RoleAssignment {
    fn default() -> Self {
        Self {
            database: DEFAULT_DATABASE.to_string(),
            cache: DEFAULT_CACHE.to_string(),
        }
    }
}

impl RoleAssignment {
    pub fn resolve(services: &[ServiceDescriptor]) -> Self {
        Self {
            database: resolve_role(services, Role::Database),
            cache: resolve_role(services, Role::Cache),
        }
    }

    pub fn service_for(&self, role: Role) -> &str {
        match role {
            Role::Database => &self.database,
            Role::Cache => &self.cache,
        }
    }
}

fn resolve_role(services: &[ServiceDescriptor], role: Role) -> String {
    let by_image = services.iter().find(|s| {
        s.image
            .as_deref()
            .map(|image| image_matches(image, role.image_tokens()))
            .unwrap_or(false)
    });

    let by_env = || {
        services
            .iter()
            .find(|s| role.env_keys().iter().any(|key| s.environment.contains_key(key)))
    };

    by_image
        .or_else(by_env)
        .map(|s| s.name.clone())
        .unwrap_or_else(|| role.default_service().to_string())
}

/// Matches on the repository part of the reference, ignoring registry and tag
fn image_matches(image: &str, tokens: &[&str]) -> bool {
    let without_tag = image.split('@').next().unwrap_or(image);
    let repository = without_tag.rsplit('/').next().unwrap_or(without_tag);
    let repository = repository.split(':').next().unwrap_or(repository).to_lowercase();
    tokens.iter().any(|token| repository.contains(token))
}
