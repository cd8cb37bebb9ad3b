//! The orchestration loop of Forgeloop.
//!
//! Each user turn follows a **Think → Act → Observe** cycle:
//!
//! 1. **Append** the user message to the conversation history
//! 2. **Stream** a model response into the history's streaming transaction
//! 3. **Parse** the response into reasoning, tool calls and a final answer
//! 4. **If tool calls**: coerce arguments, dispatch (in parallel when there
//!    are several), feed results or errors back, loop to step 2
//! 5. **Otherwise**: return the final answer
//!
//! The loop ends on a final answer, on cancellation, or at the iteration
//! ceiling.

pub mod coerce;
pub mod context;
pub mod dispatch;
pub mod feedback;
pub mod loop_runner;
pub mod prompt;
pub mod protocol;
pub mod session;
pub mod stream_event;
pub mod transport;

#[cfg(test)]
mod test_helpers;

pub use context::{ConversationHistory, ProviderSummarizer, Summarizer, SummaryError};
pub use dispatch::{ParallelOutcome, ToolDispatcher, ToolExecutionOutcome};
pub use loop_runner::{AgentLoop, ITERATION_LIMIT_MESSAGE, TurnOutcome};
pub use prompt::build_system_prompt;
pub use protocol::{ActionGrammar, ResponseParser};
pub use session::{Session, SessionSnapshot};
pub use stream_event::AgentStreamEvent;
pub use transport::{ModelStream, TransportEvent};
