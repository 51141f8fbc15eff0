//! Prompt assembly.
//!
//! [`PromptBuilder`] is a pure mapping from a [`GenerationRequest`] to a
//! [`Prompt`]. It never fails: missing fields were already resolved to
//! defaults by the request accessors.

use crate::request::GenerationRequest;

/// System instruction shared by every prompt variant.
pub const NOVELIST_SYSTEM_PROMPT: &str = "你是一位才华横溢的小说家，擅长模仿各种写作风格。";

/// Minimum length (in characters) requested from author-imitation prompts.
pub const MIN_IMITATION_LENGTH: usize = 1000;

/// Authors offered by the interactive menu, in menu order.
pub const SUPPORTED_AUTHORS: [&str; 5] = [
    "高尔基 (Maxim Gorky)",
    "鲁迅 (Lu Xun)",
    "贾平凹 (Jia Pingwa)",
    "金庸 (Jin Yong)",
    "钱钟书 (Qian Zhongshu)",
];

/// A system instruction plus a user instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Builds prompts from structured requests.
pub struct PromptBuilder;

impl PromptBuilder {
    /// Build the prompt for a structured or continuation request.
    ///
    /// # Example
    ///
    /// ```
    /// use story_stream::{GenerationRequest, PromptBuilder};
    ///
    /// let request = GenerationRequest::new().with_style("武侠").with_title("剑");
    /// let prompt = PromptBuilder::build(&request);
    /// assert!(prompt.user.contains("[武侠]"));
    /// assert!(prompt.user.contains("《剑》"));
    /// ```
    pub fn build(request: &GenerationRequest) -> Prompt {
        let user = match request.continuation_source() {
            Some(source) => Self::continuation(request.style(), source),
            None => Self::structured(request),
        };
        Prompt {
            system: NOVELIST_SYSTEM_PROMPT.to_string(),
            user,
        }
    }

    /// Build the author-imitation prompt used by the interactive CLI.
    pub fn author_imitation(author: &str, theme: &str) -> Prompt {
        let system = format!(
            "{}创作时请严格模仿作家 {} 的叙事方式、语言特点、常见主题和情感基调，正文不少于{}字。",
            NOVELIST_SYSTEM_PROMPT, author, MIN_IMITATION_LENGTH
        );
        let requirements = numbered_list(&[
            format!(
                "风格务必神似 {}，包括其常用的叙事方式、语言特点、人物塑造技巧以及作品中常见的情感基调和思想内涵。",
                author
            ),
            "故事情节需要有一定的吸引力，能够引发读者兴趣。".to_string(),
            format!("字数请控制在{}字以上，确保内容充实。", MIN_IMITATION_LENGTH),
            "请直接开始创作小说内容，不要包含任何解释性文字或与小说无关的对话。".to_string(),
        ]);
        let user = format!(
            "请你扮演一位经验丰富的小说家，模仿作家 {} 的独特写作风格和文笔，围绕以下主题创作一段精彩的小说片段：\n\n主题：{}\n\n{}",
            author,
            theme,
            section("要求", &requirements)
        );
        Prompt { system, user }
    }

    fn continuation(style: &str, source: &str) -> String {
        [
            format!("请继续以下小说的创作，保持 [{}] 风格：", style),
            section("已有内容", source),
            "请继续创作：".to_string(),
        ]
        .join("\n\n")
    }

    fn structured(request: &GenerationRequest) -> String {
        [
            format!(
                "请以 [{}] 风格创作一篇小说，标题为《{}》。",
                request.style(),
                request.title()
            ),
            section("故事背景", request.background()),
            section("主角设定", request.character()),
            section("情节走向", request.plot()),
            section("其他要求", request.other_reqs()),
            "请开始创作：".to_string(),
        ]
        .join("\n\n")
    }
}

/// Create a numbered list from items (1-indexed).
pub fn numbered_list<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, item.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A labeled block: the label, a full-width colon, then the content on the next line.
pub fn section(label: &str, content: &str) -> String {
    format!("{}：\n{}", label, content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{defaults, RequestValidator};
    use serde_json::json;

    fn full_request() -> GenerationRequest {
        GenerationRequest::new()
            .with_style("wuxia")
            .with_title("Sword")
            .with_background("Song dynasty")
            .with_character("An orphan")
            .with_plot("Revenge")
            .with_other_reqs("Short chapters")
    }

    #[test]
    fn test_build_is_deterministic() {
        let request = full_request();
        assert_eq!(PromptBuilder::build(&request), PromptBuilder::build(&request));
    }

    #[test]
    fn test_structured_fields_in_fixed_order() {
        let prompt = PromptBuilder::build(&full_request());
        let positions: Vec<usize> = [
            "[wuxia]",
            "《Sword》",
            "故事背景：\nSong dynasty",
            "主角设定：\nAn orphan",
            "情节走向：\nRevenge",
            "其他要求：\nShort chapters",
            "请开始创作：",
        ]
        .iter()
        .map(|needle| prompt.user.find(needle).expect(needle))
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(prompt.system, NOVELIST_SYSTEM_PROMPT);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let prompt = PromptBuilder::build(&GenerationRequest::new());
        assert!(!prompt.user.is_empty());
        for default in [
            defaults::STYLE,
            defaults::TITLE,
            defaults::BACKGROUND,
            defaults::CHARACTER,
            defaults::PLOT,
            defaults::OTHER_REQS,
        ] {
            assert!(prompt.user.contains(default), "missing default {default}");
        }
    }

    #[test]
    fn test_scenario_sparse_request() {
        let request = RequestValidator::default()
            .validate(&json!({
                "style": "wuxia", "title": "Sword", "background": "",
                "character": "", "plot": "", "other_reqs": ""
            }))
            .unwrap();
        let prompt = PromptBuilder::build(&request);
        assert!(prompt.user.contains("wuxia"));
        assert!(prompt.user.contains("Sword"));
        assert!(prompt.user.contains(defaults::BACKGROUND));
        assert!(prompt.user.contains(defaults::CHARACTER));
        assert!(prompt.user.contains(defaults::PLOT));
    }

    #[test]
    fn test_continuation_embeds_source_verbatim() {
        let source = "Once upon a time...\n  the river froze.";
        let request = full_request().continuing(source);
        let prompt = PromptBuilder::build(&request);
        assert!(prompt.user.contains(source));
        assert!(prompt.user.contains("请继续以下小说的创作"));
        assert!(prompt.user.contains("[wuxia]"));
        for absent in ["Sword", "Song dynasty", "An orphan", "Revenge"] {
            assert!(!prompt.user.contains(absent), "{absent} should not be embedded");
        }
    }

    #[test]
    fn test_continue_flag_without_source_falls_back() {
        let mut request = full_request();
        request.is_continue = true;
        let prompt = PromptBuilder::build(&request);
        assert!(prompt.user.contains("《Sword》"));
        assert!(!prompt.user.contains("请继续以下小说的创作"));
    }

    #[test]
    fn test_author_imitation_prompt() {
        let prompt = PromptBuilder::author_imitation(SUPPORTED_AUTHORS[1], "故乡");
        assert!(prompt.system.starts_with(NOVELIST_SYSTEM_PROMPT));
        assert!(prompt.system.contains("鲁迅 (Lu Xun)"));
        assert!(prompt.system.contains("1000"));
        assert!(prompt.user.contains("主题：故乡"));
        assert!(prompt.user.contains("要求：\n1. 风格务必神似"));
        assert!(prompt.user.contains("\n4. 请直接开始创作"));
    }

    #[test]
    fn test_numbered_list() {
        let result = numbered_list(&SUPPORTED_AUTHORS[..2]);
        assert_eq!(result, "1. 高尔基 (Maxim Gorky)\n2. 鲁迅 (Lu Xun)");
    }

    #[test]
    fn test_numbered_list_empty() {
        let items: [&str; 0] = [];
        assert_eq!(numbered_list(&items), "");
    }

    #[test]
    fn test_section() {
        assert_eq!(section("故事背景", "江湖"), "故事背景：\n江湖");
    }
}
