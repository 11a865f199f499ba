//! ReAct-style reasoning agent
//!
//! Each step the model either requests a tool:
//!
//! ```text
//! Thought: ...
//! Action: knowledge_search
//! Action Input: what colour is grass
//! ```
//!
//! or finishes with `Answer: ...`. Tool output is returned to the model as an
//! `Observation:` message. Replies in neither form are taken as the answer.

use regex::Regex;
use std::sync::{Arc, OnceLock};

use crate::error::Result;
use crate::generation::prompt::AGENT_GAVE_UP;
use crate::generation::PromptBuilder;
use crate::providers::LlmProvider;
use crate::types::ChatMessage;

use super::memory::ChatMemoryBuffer;
use super::tool::Tool;

/// One parsed model reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReasoningStep {
    /// Invoke `tool` with `input`
    Action { tool: String, input: String },
    /// Final answer
    Answer(String),
}

fn action_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)Action:[ \t]*([^\n]+?)[ \t]*\r?\nAction Input:[ \t]*(.*)").unwrap()
    })
}

fn answer_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)Answer:[ \t]*(.*)").unwrap())
}

/// Tool input may arrive as plain text or as `{"input": "..."}`
fn normalize_input(raw: &str) -> String {
    let raw = raw
        .split("\nObservation:")
        .next()
        .unwrap_or(raw)
        .trim();

    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(raw) {
        for key in ["input", "query", "question"] {
            if let Some(serde_json::Value::String(s)) = map.get(key) {
                return s.trim().to_string();
            }
        }
    }
    raw.to_string()
}

/// Parse a model reply into a reasoning step
pub fn parse_step(reply: &str) -> ReasoningStep {
    let action = action_regex().captures(reply);
    let answer = answer_regex().captures(reply);

    let action_start = action.as_ref().and_then(|c| c.get(0)).map(|m| m.start());
    let answer_start = answer.as_ref().and_then(|c| c.get(0)).map(|m| m.start());

    let use_action = match (action_start, answer_start) {
        (Some(a), Some(b)) => a < b,
        (Some(_), None) => true,
        _ => false,
    };

    if use_action {
        if let Some(caps) = action {
            let tool = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
            let input = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            return ReasoningStep::Action {
                tool: tool.to_string(),
                input: normalize_input(input),
            };
        }
    }

    if let Some(text) = answer.and_then(|c| c.get(1)) {
        return ReasoningStep::Answer(text.as_str().trim().to_string());
    }

    ReasoningStep::Answer(reply.trim().to_string())
}

/// Tool-using agent with conversation memory
pub struct ReActAgent {
    llm: Arc<dyn LlmProvider>,
    tools: Vec<Arc<dyn Tool>>,
    memory: ChatMemoryBuffer,
    system_prompt: String,
    max_iterations: usize,
}

impl ReActAgent {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        tools: Vec<Arc<dyn Tool>>,
        memory: ChatMemoryBuffer,
        instructions: Option<&str>,
        max_iterations: usize,
    ) -> Self {
        let descriptions: Vec<(&str, &str)> =
            tools.iter().map(|t| (t.name(), t.description())).collect();
        let system_prompt = PromptBuilder::agent_system_prompt(instructions, &descriptions);

        Self {
            llm,
            tools,
            memory,
            system_prompt,
            max_iterations: max_iterations.max(1),
        }
    }

    pub fn memory(&self) -> &ChatMemoryBuffer {
        &self.memory
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn tool(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools
            .iter()
            .find(|t| t.name().eq_ignore_ascii_case(name))
    }

    async fn observe(&self, tool_name: &str, input: &str) -> String {
        let Some(tool) = self.tool(tool_name) else {
            let names: Vec<&str> = self.tools.iter().map(|t| t.name()).collect();
            return format!(
                "Error: unknown tool '{}'. Available tools: {}",
                tool_name,
                names.join(", ")
            );
        };

        match tool.call(input).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!("Tool {} failed: {}", tool_name, e);
                format!("Error: {}", e)
            }
        }
    }

    /// Run one user turn to a final answer
    pub async fn chat(&mut self, query: &str) -> Result<String> {
        self.memory.push(ChatMessage::user(query));
        let mut scratchpad: Vec<ChatMessage> = Vec::new();

        for step in 1..=self.max_iterations {
            let messages: Vec<ChatMessage> = std::iter::once(ChatMessage::system(&self.system_prompt))
                .chain(self.memory.messages().cloned())
                .chain(scratchpad.iter().cloned())
                .collect();

            let reply = self.llm.complete(&messages).await?;

            match parse_step(&reply) {
                ReasoningStep::Answer(answer) => {
                    tracing::debug!("Agent answered after {} steps", step);
                    self.memory.push(ChatMessage::assistant(&answer));
                    return Ok(answer);
                }
                ReasoningStep::Action { tool, input } => {
                    tracing::debug!("Step {}: {}({:?})", step, tool, input);
                    let observation = self.observe(&tool, &input).await;
                    scratchpad.push(ChatMessage::assistant(reply.trim()));
                    scratchpad.push(ChatMessage::user(PromptBuilder::observation(&observation)));
                }
            }
        }

        tracing::warn!(
            "Agent reached {} steps without an answer",
            self.max_iterations
        );
        self.memory.push(ChatMessage::assistant(AGENT_GAVE_UP));
        Ok(AGENT_GAVE_UP.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    struct ScriptedLlm {
        replies: Mutex<VecDeque<String>>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedLlm {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().map(|s| s.to_string()).collect()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
            self.seen.lock().push(messages.to_vec());
            self.replies
                .lock()
                .pop_front()
                .ok_or_else(|| Error::llm("script exhausted"))
        }

        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes its input"
        }

        async fn call(&self, input: &str) -> Result<String> {
            if input == "boom" {
                return Err(Error::tool("echo", "exploded"));
            }
            Ok(format!("echo: {}", input))
        }
    }

    fn agent(llm: Arc<ScriptedLlm>, max_iterations: usize) -> ReActAgent {
        ReActAgent::new(
            llm,
            vec![Arc::new(EchoTool)],
            ChatMemoryBuffer::new(3000),
            None,
            max_iterations,
        )
    }

    #[test]
    fn test_parse_action() {
        let step = parse_step("Thought: look it up\nAction: echo\nAction Input: {\"input\": \"grass\"}");
        assert_eq!(
            step,
            ReasoningStep::Action {
                tool: "echo".to_string(),
                input: "grass".to_string()
            }
        );
    }

    #[test]
    fn test_parse_answer_and_plain_reply() {
        assert_eq!(
            parse_step("Thought: done\nAnswer: Green."),
            ReasoningStep::Answer("Green.".to_string())
        );
        assert_eq!(
            parse_step("  just text  "),
            ReasoningStep::Answer("just text".to_string())
        );
    }

    #[test]
    fn test_hallucinated_observation_is_cut() {
        let step = parse_step("Action: echo\nAction Input: sky\nObservation: blue\nAnswer: blue");
        assert_eq!(
            step,
            ReasoningStep::Action {
                tool: "echo".to_string(),
                input: "sky".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_tool_then_answer() {
        let llm = ScriptedLlm::new(&[
            "Thought: need data\nAction: echo\nAction Input: grass",
            "Thought: I can answer without using any more tools.\nAnswer: Grass is green.",
        ]);
        let mut agent = agent(llm.clone(), 5);

        let answer = agent.chat("what colour is grass?").await.unwrap();
        assert_eq!(answer, "Grass is green.");

        let seen = llm.seen.lock();
        assert_eq!(seen.len(), 2);
        let last = seen[1].last().unwrap();
        assert_eq!(last.content, "Observation: echo: grass");
        assert_eq!(agent.memory().len(), 2);
    }

    #[tokio::test]
    async fn test_tool_errors_become_observations() {
        let llm = ScriptedLlm::new(&[
            "Action: echo\nAction Input: boom",
            "Action: missing\nAction Input: x",
            "Answer: gave up",
        ]);
        let mut agent = agent(llm.clone(), 5);
        assert_eq!(agent.chat("q").await.unwrap(), "gave up");

        let seen = llm.seen.lock();
        assert!(seen[1].last().unwrap().content.contains("exploded"));
        assert!(seen[2].last().unwrap().content.contains("unknown tool 'missing'"));
    }

    #[tokio::test]
    async fn test_iteration_limit() {
        let llm = ScriptedLlm::new(&[
            "Action: echo\nAction Input: a",
            "Action: echo\nAction Input: b",
        ]);
        let mut agent = agent(llm, 2);
        assert_eq!(agent.chat("q").await.unwrap(), AGENT_GAVE_UP);
    }

    #[tokio::test]
    async fn test_llm_failure_fails_turn() {
        let llm = ScriptedLlm::new(&[]);
        let mut agent = agent(llm, 3);
        assert!(matches!(agent.chat("q").await, Err(Error::Llm(_))));
    }
}
