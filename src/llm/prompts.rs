//! Prompts for multiple-choice answering.

/// Collection of fixed prompt texts.
pub struct Prompts;

impl Prompts {
    /// System prompt for answering from parametric knowledge only.
    pub fn basic_system() -> &'static str {
        r#"You are an expert in multiple-choice questions. For each question provided, respond with only the letter corresponding to the correct answer.
Do not include any additional text, explanations, or the content of the answer option itself.

Example Input Format:
Question: What is the capital of France?
A) Berlin
B) Madrid
C) Paris
D) Rome

Example Output Format:
C

Your Task:
Answer the following multiple-choice questions by providing only the letter of the correct option.
/no_think"#
    }

    /// System prompt for answering with retrieved context.
    pub fn vector_rag_system() -> &'static str {
        r#"You are an expert in multiple-choice questions. For each question provided, consider the accompanying context as primary information. If the context does not directly provide the answer, you may use your general knowledge to select the correct option. Respond with only the letter corresponding to the correct answer.

Do not include any additional text, explanations, or the content of the answer option itself.

Example Input Format:
Context:
[1] Paris is the capital and most populous city of France, with an estimated population of 2,141,000 residents in 2020.

Question: What is the capital of France?
A) Berlin
B) Madrid
C) Paris
D) Rome

Example Output Format:
C

Your Task:
Answer the following multiple-choice questions by providing only the letter of the correct option, prioritizing information from the provided context, but supplementing with your general knowledge if necessary.
/no_think"#
    }

    /// Render the user message. Without context the question is sent unchanged.
    pub fn user_message(question: &str, context: Option<&[String]>) -> String {
        match context {
            Some(snippets) if !snippets.is_empty() => {
                let numbered = snippets
                    .iter()
                    .enumerate()
                    .map(|(i, s)| format!("[{}] {}", i + 1, s))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!("Context:\n{}\n\nQuestion: {}", numbered, question)
            }
            _ => question.to_string(),
        }
    }
}

/// System prompts per evaluation kind, injected into the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemPrompts {
    pub basic: String,
    pub vector_rag: String,
}

impl Default for SystemPrompts {
    fn default() -> Self {
        Self {
            basic: Prompts::basic_system().to_string(),
            vector_rag: Prompts::vector_rag_system().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_without_context() {
        let q = "Which empire built the Grand Canal?\nA) Song\nB) Sui";
        assert_eq!(Prompts::user_message(q, None), q);
        assert_eq!(Prompts::user_message(q, Some(&[])), q);
    }

    #[test]
    fn test_user_message_numbers_snippets() {
        let context = vec!["first snippet".to_string(), "second snippet".to_string()];
        let message = Prompts::user_message("Q?", Some(&context));

        assert_eq!(
            message,
            "Context:\n[1] first snippet\n[2] second snippet\n\nQuestion: Q?"
        );
    }

    #[test]
    fn test_user_message_keeps_snippet_text_verbatim() {
        let context = vec!["Wilson's {question} of self-determination {context}".to_string()];
        let message = Prompts::user_message("Which president?", Some(&context));

        assert_eq!(
            message,
            "Context:\n[1] Wilson's {question} of self-determination {context}\n\nQuestion: Which president?"
        );
    }

    #[test]
    fn test_prompts_forbid_explanations() {
        let prompts = SystemPrompts::default();
        assert!(prompts.basic.contains("only the letter"));
        assert!(prompts.vector_rag.contains("prioritizing information from the provided context"));
        assert!(prompts.vector_rag.contains("general knowledge"));
        for p in [&prompts.basic, &prompts.vector_rag] {
            assert!(p.contains("Do not include any additional text, explanations"));
        }
    }
}
