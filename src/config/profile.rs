//! Page-specific selectors and phrase lists.
//!
//! The defaults target the Google AI Mode answer page as captured in 2025.
//! A profile can be loaded from JSON to follow markup churn without touching
//! the pipeline itself.

use std::collections::BTreeMap;

use serde::Deserialize;

/// Everything the pipeline needs to know about the page it is cleaning.
///
/// Selector lists are ordered by preference: the first selector that
/// matches wins.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectorProfile {
    /// Containers holding one question/answer exchange each.
    pub turn_container_selectors: Vec<String>,
    /// Question text, most specific first.
    pub question_selectors: Vec<String>,
    /// Subtrees that scope the question region of a turn.
    pub question_scope_selectors: Vec<String>,
    /// Subtrees that scope the answer region of a turn.
    pub answer_scope_selectors: Vec<String>,
    /// Source/citation panels to mine for cards and then remove.
    pub source_panel_selectors: Vec<String>,
    /// Toolbars, popovers and copy buttons removed outright.
    pub ui_chrome_selectors: Vec<String>,
    /// Elements that repeat the question text inside a quote scope.
    pub question_text_selectors: Vec<String>,
    /// Structured title nodes inside a citation or image card.
    pub source_title_selectors: Vec<String>,
    /// Structured snippet nodes inside a citation card.
    pub source_snippet_selectors: Vec<String>,
    /// Inline code copies that carry doubled text and need renormalizing.
    pub inline_code_selectors: Vec<String>,
    /// Title nodes inside a place-card anchor, tried group by group.
    pub place_title_selectors: Vec<String>,
    /// Wrappers whose every image is a question attachment.
    pub attachment_shell_selectors: Vec<String>,
    /// Image classes that strongly hint at an attachment.
    pub attachment_image_selectors: Vec<String>,
    /// Question-side regions attachments live in.
    pub attachment_region_selectors: Vec<String>,
    /// Images the user attached to their question.
    pub user_attachment_selectors: Vec<String>,
    /// alt-text fragments marking an attachment image.
    pub user_attachment_alt_hints: Vec<String>,
    /// Last-resort question heading selectors for the whole document.
    pub fallback_heading_selectors: Vec<String>,
    /// Exact chrome phrases whose leaf elements are dropped.
    pub ui_texts: Vec<String>,
    /// Substrings identifying the model-disclaimer footer.
    pub disclaimer_patterns: Vec<String>,
    /// Lowercase prefixes that mark a paragraph as a caveat block.
    pub caveat_patterns: Vec<String>,
    /// Phrases specific enough to identify a feedback form on their own.
    pub feedback_core_tokens: Vec<String>,
    /// Feedback option words too generic to act on alone.
    pub feedback_option_tokens: Vec<String>,
    /// Long feedback-form phrases that never occur in real answers.
    pub feedback_strong_snippets: Vec<String>,
    /// Shorter feedback-form phrases, only used together with other signals.
    pub feedback_weak_snippets: Vec<String>,
    /// Language identifiers accepted on code payloads.
    pub code_language_names: Vec<String>,
    /// Identifier -> human label for code block headers.
    pub code_language_display: BTreeMap<String, String>,
}

impl SelectorProfile {
    /// True when `alt` hints at a visual-search attachment.
    #[must_use]
    pub fn is_attachment_alt(&self, alt: &str) -> bool {
        let alt = alt.to_lowercase();
        self.user_attachment_alt_hints
            .iter()
            .any(|hint| alt.contains(hint.as_str()))
    }

    /// True when `text` (already lowercased and trimmed) is pure UI chrome.
    #[must_use]
    pub fn is_ui_text(&self, text: &str) -> bool {
        self.ui_texts.iter().any(|t| t == text)
    }

    /// True when `text` contains a model-disclaimer phrase.
    #[must_use]
    pub fn is_disclaimer(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.disclaimer_patterns
            .iter()
            .any(|p| text.contains(p.as_str()))
    }

    /// Human-readable label for a code language identifier.
    #[must_use]
    pub fn display_language(&self, lang: &str) -> String {
        let key = lang.trim().to_lowercase();
        if let Some(label) = self.code_language_display.get(&key) {
            return label.clone();
        }
        if key.is_empty() {
            return "Code".to_string();
        }
        let mut chars = key.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => "Code".to_string(),
        }
    }

    /// True when `lang` is a known code language identifier.
    #[must_use]
    pub fn is_known_language(&self, lang: &str) -> bool {
        let key = lang.trim().to_lowercase();
        self.code_language_names.iter().any(|l| l == &key)
    }
}

impl Default for SelectorProfile {
    fn default() -> Self {
        Self {
            turn_container_selectors: owned(&[
                "div.tonYlb",
                "div[data-tr-rsts]",
                "[jsmodel*=\"CPTaDd\"][data-tr-rsts]",
            ]),
            question_selectors: owned(&[
                ".sUKAcb span.VndcI > span",
                ".sUKAcb span.VndcI",
                "span.VndcI > span",
                "span.VndcI",
                ".tbIZh span[role=\"heading\"] span",
                ".tbIZh [role=\"heading\"]",
                "[role=\"heading\"][aria-level=\"2\"] span",
                "[role=\"heading\"][aria-level=\"2\"]",
            ]),
            question_scope_selectors: owned(&[".ilZyRc", ".tbIZh", ".sUKAcb"]),
            answer_scope_selectors: owned(&[
                "[data-subtree=\"aimc\"]",
                "[data-aimmrs=\"true\"]",
                ".Zkbeff",
            ]),
            source_panel_selectors: owned(&[
                ".ofHStc",
                ".NGHFcc",
                ".W94uae",
                ".iqGHOe",
                ".MUZtye",
                ".U9BD8",
                ".Wsaimf",
                ".QyEYne",
                "img.sGgDgb",
                "img.aWLPic",
                ".wDa0n",
                ".HWMcu",
                ".jKhXsc",
                ".bTFeG",
                ".CyMdWb",
            ]),
            ui_chrome_selectors: owned(&[
                ".P8PNlb",
                ".LIBz9e",
                ".Ev0C3d",
                ".T0PRsc",
                ".Fsg96",
                "aside[popover=\"manual\"]",
                "[aria-label*=\"Скопировать код\"]",
                "[aria-label*=\"Copy code\"]",
            ]),
            question_text_selectors: owned(&[
                ".sUKAcb",
                "span.VndcI",
                "[role=\"heading\"]",
                "h1",
                "h2",
                "h3",
            ]),
            source_title_selectors: owned(&[
                ".Nn35F",
                ".nPDzT",
                "h3",
                "h4",
                "[role=\"heading\"]",
            ]),
            source_snippet_selectors: owned(&[".vhJ6Pe", ".MUxGbd", ".w8lk7d", ".jEYmO"]),
            inline_code_selectors: owned(&["code.o8j0Mc"]),
            place_title_selectors: owned(&[
                "[role=\"heading\"], h3, .Vo3rib, .tit",
                "b, strong",
            ]),
            attachment_shell_selectors: owned(&["div.irXdnc.UpF4j"]),
            attachment_image_selectors: owned(&["img.taqkMe", "img.Tbpky"]),
            attachment_region_selectors: owned(&[
                "div.ilZyRc.R7mRQb",
                "[jscontroller=\"TB3Kme\"]",
            ]),
            user_attachment_selectors: owned(&[
                "div.irXdnc.UpF4j img",
                "div.CKgc1d img.taqkMe",
                "div.CKgc1d img.Tbpky",
                "[data-scope-id=\"turn\"] .irXdnc img",
                "img.taqkMe",
                "img.Tbpky",
            ]),
            user_attachment_alt_hints: owned(&[
                "визуального поиска",
                "visual search",
                "по изображению",
                "image search",
            ]),
            fallback_heading_selectors: owned(&[
                "span.VndcI",
                "[role=\"heading\"][aria-level=\"2\"] span",
                "[role=\"heading\"] span",
                "h2 span",
                "h1 span",
            ]),
            ui_texts: owned(&[
                "полезный",
                "предложение бесполезно",
                "создание общедоступной ссылки",
                "спасибо!",
                "ваши отзывы помогают",
                "политикой конфиденциальности",
                "политика конфиденциальности",
                "копировать",
                "поделиться",
                "показать все",
                "показать ещё",
                "свернуть",
                "развернуть",
                "закрыть",
                "отмена",
                "удалить",
                "история режима ии",
                "вход не выполнен",
                "войти",
                "режим ии",
                "задать вопрос по теме",
                "используйте код с осторожностью",
                "скопировано в буфер обмена",
                "скопировать код в буфер обмена",
                "думаю…",
                "думаю...",
                "thinking…",
                "thinking...",
                "хороший ответ",
                "плохой ответ",
                "good answer",
                "bad answer",
            ]),
            disclaimer_patterns: owned(&[
                "в ответах искусственного интеллекта могут быть ошибки",
                "ответы ии могут содержать ошибки",
                "ии может ошибаться",
                "советуем проверять его ответы",
                "ai responses may include mistakes",
                "ai responses may contain mistakes",
                "ai may make mistakes",
                "ai can make mistakes",
            ]),
            feedback_core_tokens: owned(&[
                "positive feedback",
                "negative feedback",
                "saved time",
                "not working",
                "unhelpful",
                "inappropriate",
                "incorrect",
            ]),
            feedback_option_tokens: owned(&["helpful", "comprehensive", "clear", "other"]),
            feedback_strong_snippets: owned(&[
                "a copy of this chat will be included with your feedback",
                "a copy of this chat and your uploaded image will be included with your feedback",
                "google may use account and system data to understand your feedback",
            ]),
            feedback_weak_snippets: owned(&[
                "subject to our privacy policy and terms of service",
                "for legal issues, make a legal removal request",
            ]),
            caveat_patterns: owned(&[
                "важное замечание",
                "важно:",
                "примечание:",
                "обратите внимание:",
                "предупреждение:",
                "совет:",
                "подсказка:",
                "note:",
                "important:",
                "warning:",
                "tip:",
            ]),
            code_language_names: owned(&[
                "python",
                "javascript",
                "js",
                "typescript",
                "ts",
                "java",
                "kotlin",
                "swift",
                "rust",
                "go",
                "golang",
                "php",
                "ruby",
                "perl",
                "lua",
                "dart",
                "scala",
                "r",
                "matlab",
                "sql",
                "html",
                "css",
                "xml",
                "json",
                "yaml",
                "yml",
                "bash",
                "shell",
                "sh",
                "powershell",
                "ps1",
                "c",
                "c++",
                "cpp",
                "c#",
                "cs",
                "objective-c",
                "objc",
                "plaintext",
                "text",
            ]),
            code_language_display: [
                ("js", "JavaScript"),
                ("javascript", "JavaScript"),
                ("ts", "TypeScript"),
                ("typescript", "TypeScript"),
                ("python", "Python"),
                ("java", "Java"),
                ("kotlin", "Kotlin"),
                ("swift", "Swift"),
                ("rust", "Rust"),
                ("go", "Go"),
                ("golang", "Go"),
                ("php", "PHP"),
                ("ruby", "Ruby"),
                ("perl", "Perl"),
                ("lua", "Lua"),
                ("dart", "Dart"),
                ("scala", "Scala"),
                ("r", "R"),
                ("matlab", "MATLAB"),
                ("sql", "SQL"),
                ("html", "HTML"),
                ("css", "CSS"),
                ("xml", "XML"),
                ("json", "JSON"),
                ("yaml", "YAML"),
                ("yml", "YAML"),
                ("bash", "Bash"),
                ("shell", "Shell"),
                ("sh", "Shell"),
                ("powershell", "PowerShell"),
                ("ps1", "PowerShell"),
                ("c", "C"),
                ("c++", "C++"),
                ("cpp", "C++"),
                ("c#", "C#"),
                ("cs", "C#"),
                ("objective-c", "Objective-C"),
                ("objc", "Objective-C"),
                ("plaintext", "Text"),
                ("text", "Text"),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        }
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profile_recognizes_ui_chrome() {
        let profile = SelectorProfile::default();
        assert!(profile.is_ui_text("показать все"));
        assert!(!profile.is_ui_text("показать все результаты поиска"));
    }

    #[test]
    fn disclaimer_match_is_substring_based() {
        let profile = SelectorProfile::default();
        assert!(profile.is_disclaimer("AI responses may include mistakes. Learn more"));
        assert!(!profile.is_disclaimer("the answer is correct"));
    }

    #[test]
    fn display_language_falls_back_to_capitalized_identifier() {
        let profile = SelectorProfile::default();
        assert_eq!(profile.display_language("cpp"), "C++");
        assert_eq!(profile.display_language("zig"), "Zig");
        assert_eq!(profile.display_language(""), "Code");
    }

    #[test]
    fn profile_deserializes_with_partial_overrides() {
        let profile: SelectorProfile =
            serde_json::from_str(r#"{"ui_texts": ["dismiss"]}"#).unwrap();
        assert!(profile.is_ui_text("dismiss"));
        assert!(!profile.turn_container_selectors.is_empty());
    }

    #[test]
    fn selector_overrides_replace_the_defaults() {
        let profile: SelectorProfile = serde_json::from_str(
            r#"{"ui_chrome_selectors": [".toolbar"], "source_title_selectors": [".headline"]}"#,
        )
        .unwrap();
        assert_eq!(profile.ui_chrome_selectors, vec![".toolbar".to_string()]);
        assert_eq!(profile.source_title_selectors, vec![".headline".to_string()]);
        // Untouched selector groups keep their defaults.
        assert!(!profile.attachment_shell_selectors.is_empty());
        assert!(!profile.inline_code_selectors.is_empty());
    }
}
