use serde::{Deserialize, Serialize};

use super::{env_or, env_parse};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Broker
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Message broker settings for the `agent.task` and `training.job` queues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "d_broker_url")]
    pub url: String,
    /// Delivery attempts before a message is dead-lettered.
    #[serde(default = "d_max_delivery_attempts")]
    pub max_delivery_attempts: u32,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: d_broker_url(),
            max_delivery_attempts: d_max_delivery_attempts(),
        }
    }
}

impl BrokerConfig {
    pub fn from_env() -> Self {
        Self {
            url: env_or("RABBITMQ_URL", &d_broker_url()),
            max_delivery_attempts: env_parse(
                "BROKER_MAX_DELIVERY_ATTEMPTS",
                d_max_delivery_attempts(),
            ),
        }
    }
}

fn d_broker_url() -> String {
    "amqp://localhost:5672".into()
}
fn d_max_delivery_attempts() -> u32 {
    3
}
