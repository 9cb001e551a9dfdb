//! Prompt assembly for agent queries.

/// Fallback answer when an invocation yields nothing usable. Also the
/// error sentinel the retry loop looks for.
pub const DEFAULT_ERROR_MESSAGE: &str = "I'm sorry, but something went wrong while processing \
     your request. Please try again or contact support if the issue persists.";

/// Terminal content written to a task the user cancelled.
pub const TASK_CANCELLED_MESSAGE: &str = "Task was cancelled by user.";

/// Assemble the user prompt: optional context, the question, optional
/// expected output format.
pub fn build_prompt(question: &str, context: &str, output_format: &str) -> String {
    let mut parts = Vec::new();
    if !context.is_empty() {
        parts.push(format!("## Context\n{context}\n"));
    }
    parts.push(format!("## Question\n{question}"));
    if !output_format.is_empty() {
        parts.push(format!("\n## Expected Output Format\n{output_format}"));
    }
    parts.join("\n")
}

/// Wrap the original prompt with a retry preamble documenting the previous
/// attempt's failure.
pub fn retry_prompt(original: &str, attempt: u32, max_attempts: u32, last_error: &str) -> String {
    format!(
        "[RETRY ATTEMPT {attempt}/{max_attempts}]\n\
         The previous attempt failed with the following error:\n\
         ---\n\
         {last_error}\n\
         ---\n\
         Please try a different approach. Consider:\n\
         - Process data in smaller chunks if memory error\n\
         - Use alternative methods if a tool failed\n\
         - Verify file paths and try again\n\
         \n\
         Original request: {original}\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_only() {
        assert_eq!(build_prompt("2+2?", "", ""), "## Question\n2+2?");
    }

    #[test]
    fn full_prompt_sections_in_order() {
        let prompt = build_prompt("2+2?", "math homework", "a number");
        assert_eq!(
            prompt,
            "## Context\nmath homework\n\n## Question\n2+2?\n\n## Expected Output Format\na number"
        );
    }

    #[test]
    fn output_format_without_context() {
        let prompt = build_prompt("2+2?", "", "json");
        assert!(prompt.starts_with("## Question"));
        assert!(prompt.ends_with("## Expected Output Format\njson"));
    }

    #[test]
    fn retry_prompt_embeds_error_and_original() {
        let prompt = retry_prompt("## Question\n2+2?", 2, 3, "execution failed: oom");
        assert!(prompt.starts_with("[RETRY ATTEMPT 2/3]"));
        assert!(prompt.contains("execution failed: oom"));
        assert!(prompt.contains("Original request: ## Question\n2+2?"));
    }
}
