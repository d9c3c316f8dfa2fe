//! System prompt template
//!
//! Builds the fixed prompt the Generator sends to the LLM: names the book,
//! enumerates the retrieved chunks with per-chunk source tags, and states
//! the five binding rules that keep the answer grounded in context.

use bookrag_retrieval::RetrievedChunk;

const SYSTEM_PROMPT_TEMPLATE: &str = "You are an educational assistant answering questions about \"{book_title}\". \
Use ONLY the information in the retrieved sections below to answer the student's question.\n\n\
Retrieved sections:\n{retrieved_chunks}\n\n\
Student question: {user_query}\n\n\
Rules:\n\
1. Answer only using the information in the retrieved sections above.\n\
2. Include source references (chapter and section) that support your answer.\n\
3. If the retrieved sections do not contain enough information to answer, say so clearly rather than guessing.\n\
4. Never use knowledge from outside the retrieved sections, even if you know the answer.\n\
5. Keep the answer to 2-3 paragraphs.\n\
6. Maintain an encouraging, educational tone suited to a student.";

/// One `[Source N - Chapter X, Section Y]` block per chunk.
pub fn format_retrieved_chunks(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            format!(
                "[Source {} - Chapter {}, {}]\n{}\n",
                i + 1,
                chunk.chapter_title,
                chunk.section,
                chunk.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_system_prompt(book_title: &str, chunks: &[RetrievedChunk], user_query: &str) -> String {
    SYSTEM_PROMPT_TEMPLATE
        .replace("{book_title}", book_title)
        .replace("{retrieved_chunks}", &format_retrieved_chunks(chunks))
        .replace("{user_query}", user_query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn chunk(chapter: &str, section: &str, content: &str) -> RetrievedChunk {
        RetrievedChunk {
            id: Uuid::new_v4(),
            score: 0.9,
            book_id: "physical-ai-robotics".to_string(),
            chapter_number: 0,
            chapter_title: chapter.to_string(),
            section: section.to_string(),
            section_slug: "slug".to_string(),
            source_file: "docs/chapters/m0/01-x.md".to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_format_retrieved_chunks_numbers_sources() {
        let chunks = vec![
            chunk("Module 0", "Foundations", "first chunk"),
            chunk("Module 0", "Foundations", "second chunk"),
        ];
        let formatted = format_retrieved_chunks(&chunks);
        assert!(formatted.contains("[Source 1 - Chapter Module 0, Foundations]"));
        assert!(formatted.contains("[Source 2 - Chapter Module 0, Foundations]"));
    }

    #[test]
    fn test_build_system_prompt_substitutes_all_placeholders() {
        let chunks = vec![chunk("Module 0", "Foundations", "content")];
        let prompt = build_system_prompt("Physical AI & Robotics", &chunks, "What is ZMP?");
        assert!(prompt.contains("Physical AI & Robotics"));
        assert!(prompt.contains("What is ZMP?"));
        assert!(prompt.contains("[Source 1"));
        assert!(!prompt.contains("{book_title}"));
        assert!(!prompt.contains("{user_query}"));
    }
}
