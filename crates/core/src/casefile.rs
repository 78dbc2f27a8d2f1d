use crate::error::GatewayError;
use crate::gateway::ChatClient;
use crate::models::{ChatMessage, ChunkMeta};
use regex::Regex;

const MAX_QUESTIONS: usize = 10;
const CORPUS_SAMPLE_PER_DOCUMENT: usize = 1_500;
const CORPUS_SAMPLE_TOTAL: usize = 4_000;
const DRAFT_SAMPLE_LIMIT: usize = 5_000;

/// Markdown shell every drafted case study is assembled into.
pub const CASE_TEMPLATE: &str = "# {title}\n\n\
**Executive Summary**  \n{summary}\n\n\
## Problem / Need\n{problem}\n\n\
## Implementation Approach\n{implementation}\n\n\
## Benefits & Impact\n{benefits}\n\n\
## Key Learning Points\n{learnings}\n\n\
## Point of Contact\n{poc}\n\n\
## Suggested Visuals / Diagrams\n{visuals}\n";

#[derive(Debug, Clone, Default)]
pub struct CaseSections {
    pub title: String,
    pub summary: String,
    pub problem: String,
    pub implementation: String,
    pub benefits: String,
    pub learnings: String,
    pub poc: String,
    pub visuals: String,
}

pub fn build_case_study(sections: &CaseSections) -> String {
    CASE_TEMPLATE
        .replace("{title}", &sections.title)
        .replace("{summary}", &sections.summary)
        .replace("{problem}", &sections.problem)
        .replace("{implementation}", &sections.implementation)
        .replace("{benefits}", &sections.benefits)
        .replace("{learnings}", &sections.learnings)
        .replace("{poc}", &sections.poc)
        .replace("{visuals}", &sections.visuals)
}

/// Pulls `-`/`•` bullet items out of a model response, capped at ten. A
/// response with no bullets degrades to its first 120 characters.
pub fn parse_questions_list(text: &str) -> Vec<String> {
    let bullet = Regex::new(r"[-•]\s*(.+)").expect("bullet pattern is valid");
    let items: Vec<String> = bullet
        .captures_iter(text)
        .take(MAX_QUESTIONS)
        .map(|capture| capture[1].trim().to_string())
        .collect();

    if !items.is_empty() {
        return items;
    }

    let trimmed = text.trim();
    let fallback: String = trimmed.chars().take(120).collect();
    if fallback.is_empty() {
        Vec::new()
    } else {
        vec![fallback]
    }
}

/// Head sample of the uploaded corpus: up to 1500 chars per document,
/// capped at 4000 chars overall.
pub fn corpus_sample(texts: &[String]) -> String {
    let joined = texts
        .iter()
        .map(|text| truncate_chars(text, CORPUS_SAMPLE_PER_DOCUMENT))
        .collect::<Vec<_>>()
        .join("\n\n");
    truncate_chars(&joined, CORPUS_SAMPLE_TOTAL)
}

pub fn gap_analysis_prompt(sample: &str) -> String {
    format!(
        "You are assisting to prepare a public-sector finance case study.\n\
         Based on the following uploaded content (may be partial), list the missing information \
         that we must ask the user as bullet questions.\n\
         Cover: title direction, executive summary angle, problem clarity, implementation \
         specifics (timeline, roles, tools), benefits with metrics, learning points, and a POC \
         contact.\n\
         Content sample:\n---\n{sample}\n---\n\
         Return only bullet questions (max 10)."
    )
}

pub fn draft_prompt(context: &[ChunkMeta], answers: &[(String, String)]) -> String {
    let base = if context.is_empty() {
        "(no context)".to_string()
    } else {
        context
            .iter()
            .map(|chunk| chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    let answers_text = answers
        .iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .map(|(key, value)| format!("- {key}: {value}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a professional case study writer for public-sector finance.\n\
         Using the CONTEXT (from uploaded files) and the USER ANSWERS (provided via a form), \
         draft a polished, visually engaging case study with the following sections:\n\n\
         1) Captivating Title\n\
         2) Executive Summary (3-5 sentences)\n\
         3) Problem / Need for the project\n\
         4) Implementation Approach (timeline, roles, tools, governance)\n\
         5) Benefits & Impact (quantify where possible, use bullets if helpful)\n\
         6) Key Learning Points (bulleted)\n\
         7) Point of Contact (POC: name, role, email - use placeholders if missing)\n\
         8) Suggested Visuals/Diagrams (list 2-3 ideas)\n\n\
         CONTEXT:\n{base}\n\n\
         USER ANSWERS:\n{answers_text}\n\n\
         Return Markdown only."
    )
}

pub fn diagram_prompts_prompt(draft: &str) -> String {
    format!(
        "From the following case study markdown, list three concise prompts for \
         diagrams/flowcharts to visualise the process and impact.\n\
         Return bullet points only (max 3 prompts).\n---\n{}\n---",
        truncate_chars(draft, DRAFT_SAMPLE_LIMIT)
    )
}

pub fn cover_prompt(style: &str, theme: &str) -> String {
    format!(
        "A {style} depicting {theme}. Clean, professional, government context, \
         minimal color palette."
    )
}

/// Asks the chat collaborator which information is still missing from the
/// uploaded corpus, returned as targeted bullet questions.
pub async fn analyze_gaps<C: ChatClient>(
    chat: &C,
    texts: &[String],
) -> Result<Vec<String>, GatewayError> {
    let prompt = gap_analysis_prompt(&corpus_sample(texts));
    let response = chat.chat(&[ChatMessage::user(prompt)]).await?;
    Ok(parse_questions_list(&response))
}

/// Drafts the full case study from retrieved grounding chunks and the user's
/// answers to the gap questions.
pub async fn draft_case_study<C: ChatClient>(
    chat: &C,
    context: &[ChunkMeta],
    answers: &[(String, String)],
) -> Result<String, GatewayError> {
    let prompt = draft_prompt(context, answers);
    chat.chat(&[ChatMessage::user(prompt)]).await
}

pub async fn suggest_diagram_prompts<C: ChatClient>(
    chat: &C,
    draft: &str,
) -> Result<Vec<String>, GatewayError> {
    let response = chat.chat(&[ChatMessage::user(diagram_prompts_prompt(draft))]).await?;
    Ok(parse_questions_list(&response))
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct CannedChat {
        response: String,
    }

    #[async_trait]
    impl ChatClient for CannedChat {
        async fn chat(&self, _messages: &[ChatMessage]) -> Result<String, GatewayError> {
            Ok(self.response.clone())
        }
    }

    #[test]
    fn bullets_are_parsed_from_both_markers() {
        let text = "- What is the project timeline?\n• Who is the POC?\nplain line";
        let questions = parse_questions_list(text);
        assert_eq!(
            questions,
            vec![
                "What is the project timeline?".to_string(),
                "Who is the POC?".to_string(),
            ]
        );
    }

    #[test]
    fn bullet_list_is_capped_at_ten() {
        let text = (0..15)
            .map(|i| format!("- question {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(parse_questions_list(&text).len(), 10);
    }

    #[test]
    fn bulletless_response_degrades_to_truncated_text() {
        let text = "x".repeat(300);
        let questions = parse_questions_list(&text);
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].chars().count(), 120);
    }

    #[test]
    fn template_fills_every_section() {
        let rendered = build_case_study(&CaseSections {
            title: "Budget Consolidation".to_string(),
            summary: "A summary.".to_string(),
            problem: "A problem.".to_string(),
            implementation: "An approach.".to_string(),
            benefits: "Benefits.".to_string(),
            learnings: "Learnings.".to_string(),
            poc: "Jane Doe".to_string(),
            visuals: "A flowchart.".to_string(),
        });

        assert!(rendered.starts_with("# Budget Consolidation"));
        assert!(rendered.contains("## Problem / Need\nA problem."));
        assert!(rendered.contains("## Point of Contact\nJane Doe"));
        assert!(!rendered.contains('{'));
    }

    #[test]
    fn corpus_sample_caps_per_document_and_total() {
        let texts = vec!["a".repeat(2_000), "b".repeat(2_000), "c".repeat(2_000)];
        let sample = corpus_sample(&texts);
        assert_eq!(sample.chars().count(), 4_000);
        assert!(sample.starts_with(&"a".repeat(1_500)));
    }

    #[test]
    fn draft_prompt_without_context_marks_it_explicitly() {
        let prompt = draft_prompt(&[], &[("timeline".to_string(), "Q3 2024".to_string())]);
        assert!(prompt.contains("(no context)"));
        assert!(prompt.contains("- timeline: Q3 2024"));
    }

    #[test]
    fn draft_prompt_skips_blank_answers() {
        let answers = vec![
            ("poc".to_string(), "  ".to_string()),
            ("tools".to_string(), "ledger system".to_string()),
        ];
        let prompt = draft_prompt(&[], &answers);
        assert!(!prompt.contains("- poc:"));
        assert!(prompt.contains("- tools: ledger system"));
    }

    #[tokio::test]
    async fn analyze_gaps_parses_chat_bullets() {
        let chat = CannedChat {
            response: "- Missing timeline?\n- Missing POC?".to_string(),
        };
        let questions = analyze_gaps(&chat, &["some uploaded text".to_string()])
            .await
            .unwrap();
        assert_eq!(questions.len(), 2);
    }
}
