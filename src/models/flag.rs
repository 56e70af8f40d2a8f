use regex::Regex;

pub const DEFAULT_FLAG_PATTERN: &str = r"^pwn\.college\{[^}]+\}$";

/// Longest trimmed text still considered a flag candidate
pub const DEFAULT_FLAG_MAX_LEN: usize = 120;

/// Grammar a candidate string must match to be treated as a flag
#[derive(Debug, Clone)]
pub struct FlagGrammar {
    pattern: Regex,
    max_len: usize,
}

impl FlagGrammar {
    pub fn new(pattern: &str, max_len: usize) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            max_len,
        })
    }

    pub fn matches(&self, text: &str) -> bool {
        let trimmed = text.trim();
        if trimmed.chars().count() > self.max_len {
            return false;
        }
        self.pattern.is_match(trimmed)
    }
}

impl Default for FlagGrammar {
    fn default() -> Self {
        Self {
            pattern: Regex::new(DEFAULT_FLAG_PATTERN).expect("default flag pattern is valid"),
            max_len: DEFAULT_FLAG_MAX_LEN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_exact_flags() {
        let grammar = FlagGrammar::default();
        assert!(grammar.matches("pwn.college{abc123}"));
        assert!(grammar.matches("  pwn.college{xyz}\n"));
    }

    #[test]
    fn test_rejects_near_misses() {
        let grammar = FlagGrammar::default();
        assert!(!grammar.matches("pwn.college{}"));
        assert!(!grammar.matches("flag: pwn.college{abc}"));
        assert!(!grammar.matches("pwn.college{abc}}"));
        assert!(!grammar.matches("pwnXcollege{abc}"));
        assert!(!grammar.matches(""));
    }

    #[test]
    fn test_rejects_overlong_flags() {
        let grammar = FlagGrammar::default();
        let body = "a".repeat(DEFAULT_FLAG_MAX_LEN);
        assert!(!grammar.matches(&format!("pwn.college{{{body}}}")));

        let body = "a".repeat(DEFAULT_FLAG_MAX_LEN - "pwn.college{}".len());
        assert!(grammar.matches(&format!("pwn.college{{{body}}}")));
    }

    #[test]
    fn test_custom_pattern() {
        let grammar = FlagGrammar::new(r"^ctf\{[0-9]+\}$", 32).unwrap();
        assert!(grammar.matches("ctf{42}"));
        assert!(!grammar.matches("pwn.college{42}"));
        assert!(FlagGrammar::new("(", 32).is_err());
    }
}
