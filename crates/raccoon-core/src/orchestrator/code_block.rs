//! Incremental fenced-code-block detector over a token stream.
//!
//! Tokens arrive as arbitrary-length fragments; a fence (triple backtick)
//! can split across fragment boundaries. The detector buffers only what it
//! needs to resolve a fence, never the whole turn's text.

const FENCE: &str = "```";

#[derive(Debug, Default)]
pub struct CodeBlockDetector {
    /// Text not yet classified as inside or outside a block — holds at
    /// most a partial fence plus whatever follows it until the next
    /// newline (for the language tag) is seen.
    pending: String,
    state: State,
}

#[derive(Debug, Default, PartialEq, Eq)]
enum State {
    #[default]
    Outside,
    InBlock {
        language: String,
        code: String,
    },
}

#[derive(Debug, PartialEq, Eq)]
pub struct DetectedBlock {
    pub language: String,
    pub code: String,
}

impl CodeBlockDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next token. Returns a completed block if this token closed
    /// one, or `None` otherwise. A fence that never closes emits nothing.
    pub fn push(&mut self, token: &str) -> Option<DetectedBlock> {
        self.pending.push_str(token);

        loop {
            match &mut self.state {
                State::Outside => {
                    let Some(idx) = self.pending.find(FENCE) else {
                        // No fence yet; if the buffer ends mid-backtick-run
                        // keep enough to detect a fence split across
                        // tokens, otherwise drop it (plain text needs no
                        // buffering).
                        self.trim_non_fence_prefix();
                        return None;
                    };
                    let after_fence = idx + FENCE.len();
                    let Some(newline_offset) = self.pending[after_fence..].find('\n') else {
                        // Opening fence seen but the language-tag line
                        // hasn't arrived yet; wait for more tokens.
                        return None;
                    };
                    let language_end = after_fence + newline_offset;
                    let mut language = self.pending[after_fence..language_end].trim().to_string();
                    if language.is_empty() {
                        language = "text".to_string();
                    }
                    let rest = self.pending[language_end + 1..].to_string();
                    self.pending = rest;
                    self.state = State::InBlock {
                        language,
                        code: String::new(),
                    };
                }
                State::InBlock { language, code } => {
                    let Some(idx) = self.pending.find(FENCE) else {
                        code.push_str(&self.pending);
                        self.pending.clear();
                        return None;
                    };
                    code.push_str(&self.pending[..idx]);
                    let after_fence = idx + FENCE.len();
                    let block = DetectedBlock {
                        language: language.clone(),
                        code: code.clone(),
                    };
                    self.pending = self.pending[after_fence..].to_string();
                    self.state = State::Outside;
                    return Some(block);
                }
            }
        }
    }

    /// Drop buffered plain text that cannot possibly be the start of a
    /// fence, so the buffer does not grow unboundedly across a long run of
    /// ordinary tokens.
    fn trim_non_fence_prefix(&mut self) {
        let keep_from = self
            .pending
            .char_indices()
            .rev()
            .find(|(_, c)| *c != '`')
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        if keep_from > 0 {
            self.pending.drain(..keep_from);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fence_split_across_tokens_is_still_detected() {
        let mut detector = CodeBlockDetector::new();
        assert_eq!(detector.push("plain text `"), None);
        assert_eq!(detector.push("``python\nprint(1)\n"), None);
        let block = detector.push("```\ndone").unwrap();
        assert_eq!(block.language, "python");
        assert_eq!(block.code, "print(1)\n");
    }

    #[test]
    fn language_tag_defaults_to_text_when_empty() {
        let mut detector = CodeBlockDetector::new();
        detector.push("```\n");
        let block = detector.push("no lang\n```\n").unwrap();
        assert_eq!(block.language, "text");
        assert_eq!(block.code, "no lang\n");
    }

    #[test]
    fn unbalanced_fence_at_stream_end_emits_nothing() {
        let mut detector = CodeBlockDetector::new();
        assert_eq!(detector.push("```python\n"), None);
        assert_eq!(detector.push("print(1)\n"), None);
        // stream ends here; no closing fence ever arrives.
    }

    #[test]
    fn fenced_block_is_detected_within_a_single_token() {
        let mut detector = CodeBlockDetector::new();
        let block = detector.push("```python\nprint(1)\n```\n").unwrap();
        assert_eq!(block.language, "python");
        assert_eq!(block.code, "print(1)\n");
    }

    #[test]
    fn plain_text_never_buffers_unboundedly() {
        let mut detector = CodeBlockDetector::new();
        for _ in 0..1000 {
            assert_eq!(detector.push("no backticks here. "), None);
        }
        assert!(detector.pending.len() < 100);
    }
}
