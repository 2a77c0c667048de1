//! Prompt assembly for grounded answers.

use crate::llm::ChatMessage;
use crate::models::ScoredDocument;

/// System prompt; `{context}` is replaced with the retrieved documents.
pub const RAG_SYSTEM_PROMPT: &str = "You are an assistant answering a user's question from their own documents.
Use the documents in the context below to write a clear, concise and accurate answer.
Stay specific to what the user asked and draw details directly from the provided material.
If the context does not contain the answer, say so.

<context>
{context}
</context>";

const DOCUMENT_SEPARATOR: &str = "\n\n---\n\n";

/// Join document contents, best first, into one context block.
pub fn format_context(documents: &[ScoredDocument]) -> String {
    documents
        .iter()
        .map(|d| d.document.page_content.trim())
        .collect::<Vec<_>>()
        .join(DOCUMENT_SEPARATOR)
}

/// System message carrying the context, followed by the user's query.
pub fn build_messages(query: &str, documents: &[ScoredDocument]) -> Vec<ChatMessage> {
    let system = RAG_SYSTEM_PROMPT.replace("{context}", &format_context(documents));
    vec![ChatMessage::system(system), ChatMessage::user(query)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;
    use crate::models::Document;

    fn scored(text: &str, score: f32) -> ScoredDocument {
        ScoredDocument {
            document: Document::new(text),
            score,
        }
    }

    #[test]
    fn test_messages_embed_context() {
        let docs = vec![scored("Data mining finds patterns.", 0.9), scored("  Second.  ", 0.5)];
        let messages = build_messages("what is data mining", &docs);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0]
            .content
            .contains("<context>\nData mining finds patterns.\n\n---\n\nSecond.\n</context>"));
        assert!(!messages[0].content.contains("{context}"));
        assert_eq!(messages[1], ChatMessage::user("what is data mining"));
    }

    #[test]
    fn test_empty_context() {
        let messages = build_messages("anything?", &[]);
        assert!(messages[0].content.contains("<context>\n\n</context>"));
    }
}
