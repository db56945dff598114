//! Cleanup of generated text before it is treated as file content.

const FENCE: &str = "```";

/// Strips a code fence wrapping the whole text.
///
/// If the trimmed text starts and ends with a fence and spans more than one
/// line, the first line (fence plus any language tag) and the last line are
/// dropped. A lone fence yields an empty string. Anything else is returned
/// unchanged.
pub fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    if !(trimmed.starts_with(FENCE) && trimmed.ends_with(FENCE)) {
        return text.to_string();
    }

    let lines: Vec<&str> = trimmed.lines().collect();
    match lines.len() {
        0 => String::new(),
        1 if trimmed.chars().all(|c| c == '`') => String::new(),
        1 => text.to_string(),
        n => lines[1..n - 1].join("\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfenced_text_is_unchanged() {
        for text in ["hello", "line one\nline two\n", "  indented\n", "a ``` b"] {
            assert_eq!(strip_code_fence(text), text);
        }
    }

    #[test]
    fn stripping_is_idempotent() {
        let once = strip_code_fence("```python\nprint('hi')\n```");
        assert_eq!(strip_code_fence(&once), once);
    }

    #[test]
    fn fence_with_language_tag_is_removed() {
        let text = "```python\ndef f():\n    return 1\n```";
        assert_eq!(strip_code_fence(text), "def f():\n    return 1");
    }

    #[test]
    fn bare_fence_is_removed() {
        assert_eq!(strip_code_fence("```\nHELLO\n```"), "HELLO");
    }

    #[test]
    fn surrounding_whitespace_is_ignored_for_fences() {
        assert_eq!(strip_code_fence("\n  ```js\nlet x = 1;\n```  \n"), "let x = 1;");
    }

    #[test]
    fn only_first_and_last_lines_are_stripped() {
        let text = "```markdown\n# Title\n```sh\nls\n```\n```";
        assert_eq!(strip_code_fence(text), "# Title\n```sh\nls\n```");
    }

    #[test]
    fn lone_fence_becomes_empty() {
        assert_eq!(strip_code_fence("```"), "");
        assert_eq!(strip_code_fence("```\n```"), "");
    }

    #[test]
    fn single_line_inline_code_is_kept() {
        assert_eq!(strip_code_fence("```x```"), "```x```");
    }

    #[test]
    fn crlf_lines_are_handled() {
        assert_eq!(strip_code_fence("```\r\nA\r\nB\r\n```"), "A\nB");
    }
}
