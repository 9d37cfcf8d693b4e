//! Application settings: defaults, then an optional JSON file, then the environment.

pub mod loader;
pub mod validator;

pub use loader::*;
pub use validator::*;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// `dev` or `prod`.
    pub mode: String,
    pub debug: bool,
    /// Prefix every route is nested under.
    pub api_version: String,
    pub host_ip: String,
    pub host_port: u16,
    pub database_url: String,
    pub max_connections: u32,
    /// Serve from the in-process engine instead of PostgreSQL.
    pub use_memory_engine: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            mode: "dev".into(),
            debug: false,
            api_version: "/v1".into(),
            host_ip: "0.0.0.0".into(),
            host_port: 8080,
            database_url: String::new(),
            max_connections: 10,
            use_memory_engine: false,
        }
    }
}

impl Settings {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host_ip, self.host_port)
    }

    /// Default `tracing` filter directive for this configuration.
    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            "crud_template=debug,template_server=debug"
        } else {
            "crud_template=info,template_server=info"
        }
    }
}
