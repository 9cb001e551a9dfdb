use serde::{Deserialize, Serialize};

use super::{env_or, env_parse};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HTTP server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default = "d_port")]
    pub port: u16,
    /// Number of broker consumers to run inside this process.
    #[serde(default = "d_workers")]
    pub worker_count: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: d_host(),
            port: d_port(),
            worker_count: d_workers(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            host: env_or("HOST", &d_host()),
            port: env_parse("PORT", d_port()),
            worker_count: env_parse("WORKER_COUNT", d_workers()),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn d_host() -> String {
    "0.0.0.0".into()
}
fn d_port() -> u16 {
    8080
}
fn d_workers() -> usize {
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_addr_joins_host_and_port() {
        let cfg = ServerConfig {
            host: "127.0.0.1".into(),
            port: 9000,
            worker_count: 1,
        };
        assert_eq!(cfg.bind_addr(), "127.0.0.1:9000");
    }
}
