//! The per-conversation agent runner and its contract with the external
//! LLM SDK. The SDK is opaque: `query(prompt, options)` yields a lazy event
//! stream; everything else (prompt assembly, retries, cancellation polling,
//! streaming fan-out) lives here.

mod cancel;
mod prompt;
mod runner;
mod sdk;
pub mod testing;

pub use cancel::{CancelToken, CancellationOracle};
pub use prompt::{
    build_prompt, retry_prompt, DEFAULT_ERROR_MESSAGE, TASK_CANCELLED_MESSAGE,
};
pub use runner::{AgentRunner, RunOutcome, StreamEvent};
pub use sdk::{AgentEvent, AgentSdk, ContentBlock, EventStream, QueryOptions};
