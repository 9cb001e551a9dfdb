//! Work queue plumbing: the two logical queues (`agent.task`,
//! `training.job`), the broker contract, and an in-process implementation
//! with at-least-once delivery, bounded redelivery and a dead-letter list.

mod messages;
mod queue;

pub use messages::{AgentTaskMessage, TrainingJobMessage, AGENT_TASK_QUEUE, TRAINING_JOB_QUEUE};
pub use queue::{Broker, DeadLetter, Delivery, InMemoryBroker};
