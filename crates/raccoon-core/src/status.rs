//! Status message bank: fun, minimalist, developer-humor status lines shown
//! while a turn is in flight.
//!
//! Rotation rule: pick at random from the category, never repeat the
//! immediately previous message across any category. Unknown categories
//! fall back to `Thinking`.

use rand::seq::SliceRandom;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCategory {
    Thinking,
    Coding,
    Generating,
    Searching,
    Deploying,
    ErrorRecovery,
    ReadingCode,
}

impl StatusCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Thinking => "thinking",
            Self::Coding => "coding",
            Self::Generating => "generating",
            Self::Searching => "searching",
            Self::Deploying => "deploying",
            Self::ErrorRecovery => "error_recovery",
            Self::ReadingCode => "reading_code",
        }
    }

    /// Parse a category name, case-insensitively, falling back to `Thinking`
    /// for anything unrecognized.
    pub fn parse_or_thinking(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "thinking" => Self::Thinking,
            "coding" => Self::Coding,
            "generating" => Self::Generating,
            "searching" => Self::Searching,
            "deploying" => Self::Deploying,
            "error_recovery" => Self::ErrorRecovery,
            "reading_code" => Self::ReadingCode,
            _ => Self::Thinking,
        }
    }

    pub fn all() -> &'static [StatusCategory] {
        &[
            Self::Thinking,
            Self::Coding,
            Self::Generating,
            Self::Searching,
            Self::Deploying,
            Self::ErrorRecovery,
            Self::ReadingCode,
        ]
    }

    fn messages(&self) -> &'static [&'static str] {
        match self {
            Self::Thinking => &[
                "thinking about this...",
                "untangling your requirements...",
                "consulting the raccoon council...",
                "reading between the lines...",
                "pondering the edge cases...",
                "considering 14 possible approaches, discarding 13...",
                "having a quick existential crisis about types...",
                "contemplating the void...",
                "asking the rubber duck...",
                "thinking raccoon thoughts...",
                "processing at the speed of thought...",
                "one moment, having an existential crisis...",
                "buffering genius...",
            ],
            Self::Coding => &[
                "writing code that hopefully compiles...",
                "brewing your landing page...",
                "refactoring things you didn't ask me to refactor...",
                "adding semicolons in all the right places...",
                "building something with unreasonable attention to detail...",
                "reading your spaghetti code... trying not to judge...",
                "deleting my first attempt. you'll never know.",
                "arguing with the linter...",
                "writing code at 3am energy...",
                "refactoring reality...",
                "debugging the matrix...",
                "compiling thoughts...",
                "stack overflowing gracefully...",
                "git committing to the cause...",
            ],
            Self::Generating => &[
                "drafting something worth reading...",
                "choosing words carefully...",
                "writing, rewriting, re-rewriting...",
                "making your bullet points bulletproof...",
                "turning caffeine into documentation...",
                "generating prose that doesn't sound like a robot...",
                "assembling pixels...",
                "summoning components...",
                "crafting something beautiful...",
                "weaving HTML with care...",
                "painting with CSS...",
            ],
            Self::Searching => &[
                "digging through the internet...",
                "searching for answers in the digital void...",
                "reading docs so you don't have to...",
                "cross-referencing sources like a paranoid librarian...",
                "going down a rabbit hole for you...",
                "asking the hive mind...",
                "raiding the knowledge base...",
                "foraging for answers...",
                "consulting the archives...",
            ],
            Self::Deploying => &[
                "shipping it...",
                "deploying to prod on a friday. you asked for this.",
                "running your build. fingers crossed.",
                "testing in production like a professional...",
                "pushing to the void and hoping for the best...",
                "watching the CI pipeline like a hawk...",
                "releasing into the wild...",
                "launching to the moon...",
                "pushing pixels to production...",
                "making it live...",
            ],
            Self::ErrorRecovery => &[
                "hmm, that didn't work. plan B.",
                "retrying with more optimism...",
                "something broke. fixing it before you notice.",
                "the raccoon tripped. getting back up.",
                "adjusting expectations...",
            ],
            Self::ReadingCode => &[
                "reading your spaghetti code...",
                "parsing the chaos...",
                "judging your variable names...",
                "untangling the dependency graph...",
                "deciphering ancient commit messages...",
                "finding where the bug lives...",
            ],
        }
    }
}

/// Stateful picker, scoped to a single turn.
#[derive(Debug, Default)]
pub struct StatusPicker {
    last_message: Option<&'static str>,
}

impl StatusPicker {
    pub fn new() -> Self {
        Self { last_message: None }
    }

    /// Pick a random message from `category`, excluding the previous pick.
    /// Unknown category names already fell back to `Thinking` in
    /// [`StatusCategory::parse_or_thinking`]; this method takes the resolved
    /// category directly.
    pub fn pick(&mut self, category: StatusCategory) -> &'static str {
        let messages = category.messages();
        let available: Vec<&'static str> = match self.last_message {
            Some(last) if messages.len() > 1 => {
                messages.iter().copied().filter(|m| *m != last).collect()
            }
            _ => messages.to_vec(),
        };
        let chosen = *available
            .choose(&mut rand::thread_rng())
            .unwrap_or(&messages[0]);
        self.last_message = Some(chosen);
        chosen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_category_falls_back_to_thinking() {
        assert_eq!(StatusCategory::parse_or_thinking("nonsense"), StatusCategory::Thinking);
        assert_eq!(StatusCategory::parse_or_thinking("CODING"), StatusCategory::Coding);
    }

    #[test]
    fn never_repeats_consecutive_message() {
        let mut picker = StatusPicker::new();
        let mut previous = picker.pick(StatusCategory::ErrorRecovery);
        for _ in 0..200 {
            let next = picker.pick(StatusCategory::ErrorRecovery);
            assert_ne!(previous, next);
            previous = next;
        }
    }

    #[test]
    fn single_message_category_is_allowed_to_repeat() {
        // ErrorRecovery has 5 entries; exercise the fallback path directly
        // by constructing a picker and forcing last_message outside the set.
        let mut picker = StatusPicker {
            last_message: Some("not a real message"),
        };
        let msg = picker.pick(StatusCategory::Thinking);
        assert!(StatusCategory::Thinking.messages().contains(&msg));
    }
}
