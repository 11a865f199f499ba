//! Conversational agents over the retrieval pipeline

mod manager;
pub mod memory;
pub mod react;
pub mod session;
pub mod tool;

pub use manager::AgenticRag;
pub use memory::ChatMemoryBuffer;
pub use react::{parse_step, ReActAgent, ReasoningStep};
pub use session::{Session, SessionRegistry, SweeperHandle};
pub use tool::{RetrievalTool, Tool, RETRIEVAL_TOOL_NAME};
