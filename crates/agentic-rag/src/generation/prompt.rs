//! Prompt templates for contextualization, answering and the agent

use crate::types::ChatMessage;

/// System message for contextualization and answering
pub const ASSISTANT_SYSTEM: &str = "You are a helpful assistant.";

/// Fixed directive given to every agent session
pub const AGENT_DIRECTIVE: &str = "You are an AI assistant. You must always use the provided tools to answer any question or solve any task.\nDo not attempt to answer directly. If you cannot solve the task using the tools, respond with:\n\"I cannot complete this task without tools.\"";

/// Reply when the agent runs out of reasoning steps
pub const AGENT_GAVE_UP: &str = "I cannot complete this task without tools.";

const DOCUMENT_TEMPLATE: &str = "<document>\n{WHOLE_DOCUMENT}\n</document>\n";

const CHUNK_TEMPLATE: &str = "Here is the chunk we want to situate within the whole document\n\n{CHUNK_CONTENT}\n\nPlease give a short succinct context to situate this chunk within the overall document for the purposes of improving search retrieval of the chunk. Answer only with the succinct context and nothing else.";

const QA_TEMPLATE: &str = r#"We have provided context information below.
---------------------
{CONTEXT}"
---------------------
Given this information, please answer the question: {QUERY}

Please ONLY return in json format like this:
```json
{
    "result": ### Your answer here, MUST BE IN MARKDOWN FORMAT
    "is_chat_false": ### You must decide if the answer is true with the context and question provided
}
```
"#;

const REACT_FORMAT: &str = r#"## Tools

You have access to the following tools:
{TOOL_DESCRIPTIONS}

## Output Format

To use a tool, reply in exactly this format:

Thought: <what you need to find out>
Action: <tool name, one of: {TOOL_NAMES}>
Action Input: <plain-text input for the tool>

You will then receive:

Observation: <tool output>

Repeat until you have enough information, then reply with:

Thought: I can answer without using any more tools.
Answer: <your answer, in markdown>
"#;

/// Prompt builder for pipeline and agent prompts
pub struct PromptBuilder;

impl PromptBuilder {
    /// Messages asking for a short context situating `chunk` in `whole_document`
    pub fn contextualize_messages(whole_document: &str, chunk: &str) -> Vec<ChatMessage> {
        let user = format!(
            "{}\n{}",
            DOCUMENT_TEMPLATE.replace("{WHOLE_DOCUMENT}", whole_document),
            CHUNK_TEMPLATE.replace("{CHUNK_CONTENT}", chunk)
        );
        vec![ChatMessage::system(ASSISTANT_SYSTEM), ChatMessage::user(user)]
    }

    /// Join passage texts into the QA context block
    pub fn build_context<'a>(passages: impl IntoIterator<Item = &'a str>) -> String {
        passages.into_iter().collect::<Vec<_>>().join("\n\n")
    }

    /// Messages asking for a fenced JSON answer to `query` over `context`
    pub fn qa_messages(query: &str, context: &str) -> Vec<ChatMessage> {
        let user = QA_TEMPLATE
            .replace("{CONTEXT}", context)
            .replace("{QUERY}", query);
        vec![ChatMessage::system(ASSISTANT_SYSTEM), ChatMessage::user(user)]
    }

    /// Agent system prompt: directive, optional host instructions, tool format
    pub fn agent_system_prompt(
        instructions: Option<&str>,
        tools: &[(&str, &str)],
    ) -> String {
        let descriptions = tools
            .iter()
            .map(|(name, description)| format!("> {}: {}", name, description))
            .collect::<Vec<_>>()
            .join("\n");
        let names = tools
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(", ");

        let mut prompt = String::from(AGENT_DIRECTIVE);
        prompt.push_str("\n\n");
        if let Some(extra) = instructions.map(str::trim).filter(|s| !s.is_empty()) {
            prompt.push_str("Here are something you should pay attention to:\n");
            prompt.push_str(extra);
            prompt.push_str("\n\n");
        }
        prompt.push_str(
            &REACT_FORMAT
                .replace("{TOOL_DESCRIPTIONS}", &descriptions)
                .replace("{TOOL_NAMES}", &names),
        );
        prompt
    }

    /// Format a tool result fed back to the agent
    pub fn observation(output: &str) -> String {
        format!("Observation: {}", output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    #[test]
    fn test_contextualize_messages() {
        let messages = PromptBuilder::contextualize_messages("Whole doc.", "A chunk.");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, ASSISTANT_SYSTEM);
        assert!(messages[1]
            .content
            .starts_with("<document>\nWhole doc.\n</document>\n"));
        assert!(messages[1].content.contains("whole document\n\nA chunk.\n\nPlease give"));
    }

    #[test]
    fn test_qa_messages_embed_context_and_query() {
        let context = PromptBuilder::build_context(["one", "two"]);
        assert_eq!(context, "one\n\ntwo");

        let messages = PromptBuilder::qa_messages("why?", &context);
        let user = &messages[1].content;
        assert!(user.contains("one\n\ntwo\"\n---"));
        assert!(user.contains("please answer the question: why?"));
        assert!(user.contains("```json"));
    }

    #[test]
    fn test_agent_prompt_lists_tools() {
        let prompt = PromptBuilder::agent_system_prompt(
            Some("Be brief."),
            &[("knowledge_search", "Search documents")],
        );
        assert!(prompt.starts_with(AGENT_DIRECTIVE));
        assert!(prompt.contains("Be brief."));
        assert!(prompt.contains("> knowledge_search: Search documents"));
        assert!(prompt.contains("one of: knowledge_search"));
    }

    #[test]
    fn test_agent_prompt_without_instructions() {
        let prompt = PromptBuilder::agent_system_prompt(None, &[]);
        assert!(!prompt.contains("pay attention"));
    }
}
