//! The failure pattern: one alternative per way a password can fail.
//!
//! A policy is compiled into an alternation where each branch describes a
//! whole password that is unacceptable: short enough to miss the length
//! requirement, or made up entirely of characters outside a required class.
//! A password is accepted exactly when no branch matches it.

use std::fmt;

use super::{CharacterClass, PasswordPolicy, PolicyError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alternative {
    /// Matches any password of at most `max_len` characters.
    TooShort { max_len: usize },
    /// Matches any password with no character from the class.
    Lacks(CharacterClass),
}

impl Alternative {
    pub fn matches(&self, password: &str) -> bool {
        match *self {
            Alternative::TooShort { max_len } => password.chars().nth(max_len).is_none(),
            Alternative::Lacks(class) => !class.present_in(password),
        }
    }
}

impl fmt::Display for Alternative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alternative::TooShort { max_len } => write!(f, ".{{0,{max_len}}}"),
            Alternative::Lacks(CharacterClass::Lowercase) => f.write_str("[^a-z]*"),
            Alternative::Lacks(CharacterClass::Uppercase) => f.write_str("[^A-Z]*"),
            Alternative::Lacks(CharacterClass::Digit) => f.write_str("[^0-9]*"),
            Alternative::Lacks(CharacterClass::Symbol) => f.write_str("[^!@#$%^&*]*"),
        }
    }
}

/// The compiled alternation for one policy.
///
/// Renders as an anchored regular expression with the same meaning, e.g.
/// `^(?s:.{0,7}|[^a-z]*|[^A-Z]*|[^0-9]*|[^!@#$%^&*]*)$` for the default
/// policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailurePattern {
    alternatives: Vec<Alternative>,
}

impl FailurePattern {
    pub fn compile(policy: &PasswordPolicy) -> Result<Self, PolicyError> {
        policy.ensure_valid()?;

        let mut alternatives = vec![Alternative::TooShort {
            max_len: policy.minimum_length - 1,
        }];
        alternatives.extend(policy.required_classes().map(Alternative::Lacks));

        Ok(Self { alternatives })
    }

    pub fn alternatives(&self) -> &[Alternative] {
        &self.alternatives
    }

    /// True when the whole password fits at least one failure alternative.
    pub fn matches(&self, password: &str) -> bool {
        self.first_match(password).is_some()
    }

    pub fn first_match(&self, password: &str) -> Option<Alternative> {
        self.alternatives
            .iter()
            .copied()
            .find(|alternative| alternative.matches(password))
    }
}

impl fmt::Display for FailurePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("^(?s:")?;
        for (index, alternative) in self.alternatives.iter().enumerate() {
            if index > 0 {
                f.write_str("|")?;
            }
            write!(f, "{alternative}")?;
        }
        f.write_str(")$")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use regex::Regex;

    #[test]
    fn test_default_policy_renders_full_alternation() {
        let pattern = FailurePattern::compile(&PasswordPolicy::default()).unwrap();
        assert_eq!(
            pattern.to_string(),
            "^(?s:.{0,7}|[^a-z]*|[^A-Z]*|[^0-9]*|[^!@#$%^&*]*)$"
        );
    }

    #[test]
    fn test_disabled_classes_have_no_alternative() {
        let policy = PasswordPolicy {
            minimum_length: 12,
            require_uppercase: false,
            require_symbol: false,
            ..PasswordPolicy::default()
        };
        let pattern = FailurePattern::compile(&policy).unwrap();
        assert_eq!(
            pattern.alternatives(),
            &[
                Alternative::TooShort { max_len: 11 },
                Alternative::Lacks(CharacterClass::Lowercase),
                Alternative::Lacks(CharacterClass::Digit),
            ]
        );
        assert_eq!(pattern.to_string(), "^(?s:.{0,11}|[^a-z]*|[^0-9]*)$");
    }

    #[test]
    fn test_length_only_policy_has_single_alternative() {
        let pattern = FailurePattern::compile(&PasswordPolicy::length_only(1)).unwrap();
        assert_eq!(pattern.to_string(), "^(?s:.{0,0})$");
        assert!(pattern.matches(""));
        assert!(!pattern.matches("x"));
    }

    #[test]
    fn test_first_match_names_the_failing_branch() {
        let pattern = FailurePattern::compile(&PasswordPolicy::default()).unwrap();
        assert_eq!(
            pattern.first_match("Abcdefg1"),
            Some(Alternative::Lacks(CharacterClass::Symbol))
        );
        assert_eq!(
            pattern.first_match("Ab1!"),
            Some(Alternative::TooShort { max_len: 7 })
        );
        assert_eq!(pattern.first_match("Abcdefg1!"), None);
    }

    #[test]
    fn test_too_short_boundary() {
        let short = Alternative::TooShort { max_len: 3 };
        assert!(short.matches(""));
        assert!(short.matches("abc"));
        assert!(!short.matches("abcd"));
    }

    #[test]
    fn test_compile_rejects_zero_length() {
        assert!(FailurePattern::compile(&PasswordPolicy::length_only(0)).is_err());
    }

    proptest! {
        #[test]
        fn prop_rendered_regex_matches_like_pattern(
            min in 1usize..12,
            flags in any::<(bool, bool, bool, bool)>(),
            password in prop_oneof!["[a-zA-Z0-9!@#$%^&*_\n .-]{0,16}", any::<String>()],
        ) {
            let policy = PasswordPolicy {
                minimum_length: min,
                require_lowercase: flags.0,
                require_uppercase: flags.1,
                require_digit: flags.2,
                require_symbol: flags.3,
            };
            let pattern = FailurePattern::compile(&policy).unwrap();
            let regex = Regex::new(&pattern.to_string()).unwrap();
            prop_assert_eq!(regex.is_match(&password), pattern.matches(&password));
        }
    }
}
