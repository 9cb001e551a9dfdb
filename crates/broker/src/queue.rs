use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::{mpsc, Mutex};

use arbor_domain::{Error, Result};

use crate::messages::{AgentTaskMessage, TrainingJobMessage, AGENT_TASK_QUEUE, TRAINING_JOB_QUEUE};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Delivery
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One delivery of a queued message. `attempt` starts at 1 and increments
/// on every redelivery.
#[derive(Debug, Clone)]
pub struct Delivery<T> {
    pub message: T,
    pub attempt: u32,
}

/// A message that exhausted its redeliveries.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub queue: &'static str,
    pub payload: serde_json::Value,
    pub attempts: u32,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Broker contract
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Publish/consume for the two logical queues. Delivery is at-least-once:
/// a successfully processed message is acked; a handler failure nacks with
/// requeue until the attempt limit runs out, then dead-letters.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn publish_agent_task(&self, message: AgentTaskMessage) -> Result<()>;
    async fn publish_training_job(&self, message: TrainingJobMessage) -> Result<()>;

    /// Await the next agent-task delivery. Returns `None` once the broker
    /// is shut down.
    async fn consume_agent_task(&self) -> Option<Delivery<AgentTaskMessage>>;
    async fn consume_training_job(&self) -> Option<Delivery<TrainingJobMessage>>;

    /// Acknowledge a processed delivery.
    async fn ack_agent_task(&self, delivery: Delivery<AgentTaskMessage>);

    /// Negative-acknowledge: requeue with an incremented attempt counter,
    /// or dead-letter once attempts are exhausted.
    async fn nack_agent_task(&self, delivery: Delivery<AgentTaskMessage>);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// In-memory broker
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// In-process broker over unbounded tokio channels. Consumption is serial
/// per consumer call (the receiver sits behind an async mutex) while any
/// number of workers may take turns pulling deliveries.
pub struct InMemoryBroker {
    max_delivery_attempts: u32,
    agent_tx: mpsc::UnboundedSender<Delivery<AgentTaskMessage>>,
    agent_rx: Mutex<mpsc::UnboundedReceiver<Delivery<AgentTaskMessage>>>,
    training_tx: mpsc::UnboundedSender<Delivery<TrainingJobMessage>>,
    training_rx: Mutex<mpsc::UnboundedReceiver<Delivery<TrainingJobMessage>>>,
    dead_letters: RwLock<Vec<DeadLetter>>,
}

impl InMemoryBroker {
    pub fn new(max_delivery_attempts: u32) -> Self {
        let (agent_tx, agent_rx) = mpsc::unbounded_channel();
        let (training_tx, training_rx) = mpsc::unbounded_channel();
        Self {
            max_delivery_attempts: max_delivery_attempts.max(1),
            agent_tx,
            agent_rx: Mutex::new(agent_rx),
            training_tx,
            training_rx: Mutex::new(training_rx),
            dead_letters: RwLock::new(Vec::new()),
        }
    }

    /// Messages that exhausted their redeliveries.
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters.read().clone()
    }

    fn dead_letter(&self, queue: &'static str, payload: serde_json::Value, attempts: u32) {
        tracing::warn!(queue, attempts, "dead-lettering message");
        self.dead_letters.write().push(DeadLetter {
            queue,
            payload,
            attempts,
        });
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn publish_agent_task(&self, message: AgentTaskMessage) -> Result<()> {
        tracing::debug!(
            task_id = %message.task_id,
            assistant_task_id = %message.assistant_task_id,
            queue = AGENT_TASK_QUEUE,
            "publishing agent task"
        );
        self.agent_tx
            .send(Delivery {
                message,
                attempt: 1,
            })
            .map_err(|e| Error::Transport(format!("publish {AGENT_TASK_QUEUE}: {e}")))
    }

    async fn publish_training_job(&self, message: TrainingJobMessage) -> Result<()> {
        self.training_tx
            .send(Delivery {
                message,
                attempt: 1,
            })
            .map_err(|e| Error::Transport(format!("publish {TRAINING_JOB_QUEUE}: {e}")))
    }

    async fn consume_agent_task(&self) -> Option<Delivery<AgentTaskMessage>> {
        self.agent_rx.lock().await.recv().await
    }

    async fn consume_training_job(&self) -> Option<Delivery<TrainingJobMessage>> {
        self.training_rx.lock().await.recv().await
    }

    async fn ack_agent_task(&self, delivery: Delivery<AgentTaskMessage>) {
        tracing::debug!(
            assistant_task_id = %delivery.message.assistant_task_id,
            attempt = delivery.attempt,
            "acked agent task"
        );
    }

    async fn nack_agent_task(&self, delivery: Delivery<AgentTaskMessage>) {
        if delivery.attempt >= self.max_delivery_attempts {
            let payload = serde_json::to_value(&delivery.message).unwrap_or_default();
            self.dead_letter(AGENT_TASK_QUEUE, payload, delivery.attempt);
            return;
        }
        let requeued = Delivery {
            message: delivery.message,
            attempt: delivery.attempt + 1,
        };
        tracing::debug!(
            assistant_task_id = %requeued.message.assistant_task_id,
            attempt = requeued.attempt,
            "requeueing agent task"
        );
        if self.agent_tx.send(requeued).is_err() {
            tracing::warn!("agent task channel closed during requeue");
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn agent_message(id: &str) -> AgentTaskMessage {
        AgentTaskMessage {
            task_id: format!("{id}-user"),
            assistant_task_id: format!("{id}-assistant"),
            agent_id: "agent".into(),
            project_id: "proj".into(),
            content: "hello".into(),
            metadata: Default::default(),
        }
    }

    #[tokio::test]
    async fn publish_then_consume() {
        let broker = InMemoryBroker::new(3);
        broker.publish_agent_task(agent_message("m1")).await.unwrap();

        let delivery = broker.consume_agent_task().await.unwrap();
        assert_eq!(delivery.message.assistant_task_id, "m1-assistant");
        assert_eq!(delivery.attempt, 1);
        broker.ack_agent_task(delivery).await;
    }

    #[tokio::test]
    async fn fifo_ordering() {
        let broker = InMemoryBroker::new(3);
        for i in 0..3 {
            broker
                .publish_agent_task(agent_message(&format!("m{i}")))
                .await
                .unwrap();
        }
        for i in 0..3 {
            let d = broker.consume_agent_task().await.unwrap();
            assert_eq!(d.message.task_id, format!("m{i}-user"));
        }
    }

    #[tokio::test]
    async fn nack_requeues_with_incremented_attempt() {
        let broker = InMemoryBroker::new(3);
        broker.publish_agent_task(agent_message("m1")).await.unwrap();

        let first = broker.consume_agent_task().await.unwrap();
        broker.nack_agent_task(first).await;

        let second = broker.consume_agent_task().await.unwrap();
        assert_eq!(second.attempt, 2);
        assert!(broker.dead_letters().is_empty());
    }

    #[tokio::test]
    async fn nack_dead_letters_after_max_attempts() {
        let broker = InMemoryBroker::new(2);
        broker.publish_agent_task(agent_message("m1")).await.unwrap();

        let first = broker.consume_agent_task().await.unwrap();
        broker.nack_agent_task(first).await;
        let second = broker.consume_agent_task().await.unwrap();
        assert_eq!(second.attempt, 2);
        broker.nack_agent_task(second).await;

        let dead = broker.dead_letters();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].queue, AGENT_TASK_QUEUE);
        assert_eq!(dead[0].attempts, 2);
        assert_eq!(dead[0].payload["assistant_task_id"], "m1-assistant");
    }

    #[tokio::test]
    async fn training_queue_is_independent() {
        let broker = InMemoryBroker::new(3);
        broker
            .publish_training_job(TrainingJobMessage {
                training_id: "tr-1".into(),
                project_id: "proj".into(),
                project_name: "alpha".into(),
                data_source_ids: vec!["ds-1".into()],
            })
            .await
            .unwrap();

        let delivery = broker.consume_training_job().await.unwrap();
        assert_eq!(delivery.message.training_id, "tr-1");
    }
}
