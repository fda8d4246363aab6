//! Pure string transformations shared by title matching and rename planning.
//!
//! Every function here is total: any input produces an output, nothing
//! touches the filesystem.

/// Substitutions applied to titles, in order. Later entries see the output of
/// earlier ones.
pub const REPLACE_TABLE: &[(&str, &str)] = &[
    ("&", "and"),
    ("'", ""),
    ("?", ""),
    (":", " -"),
    (",", ""),
    ("!", ""),
];

/// Characters stripped from titles before they become directory or file names.
pub const INVALID_CHARS: &str = "/<>,:\"'\\|{}@#$%^&*+=~`()?";

/// Characters no file name produced by the planner may contain.
pub const FORBIDDEN_PATH_CHARS: &str = "/\\:*?\"<>|";

/// Words dropped from the beginning of titles.
pub const STOP_WORDS: &[&str] = &["the", "a"];

/// Number of halving passes `collapse_repeats` makes.
const COLLAPSE_PASSES: usize = 5;

/// Replace every non-overlapping occurrence of each pattern, in table order.
pub fn replace_substrings(text: &str, table: &[(&str, &str)]) -> String {
    let mut out = text.to_string();
    for (pattern, replacement) in table {
        if !pattern.is_empty() {
            out = out.replace(pattern, replacement);
        }
    }
    out
}

/// Delete every occurrence of any character in `chars`.
pub fn remove_characters(text: &str, chars: &str) -> String {
    text.chars().filter(|c| !chars.contains(*c)).collect()
}

/// Collapse doubled `ch` into a single `ch`.
///
/// Makes a fixed number of passes, each halving a run. Runs longer than 32
/// characters are shortened but not fully collapsed.
pub fn collapse_repeats(text: &str, ch: char) -> String {
    let single = ch.to_string();
    let double = format!("{ch}{ch}");
    let mut out = text.to_string();
    for _ in 0..COLLAPSE_PASSES {
        out = out.replace(&double, &single);
    }
    out
}

/// Remove one leading stop word (case-insensitive) followed by a space.
///
/// Words are tried in order and at most one is removed.
pub fn strip_leading_stop_word(text: &str, stop_words: &[&str]) -> String {
    for word in stop_words {
        let len = word.len();
        let head = text.get(..len);
        let next = text.get(len..len + 1);
        if let (Some(head), Some(" ")) = (head, next) {
            if head.eq_ignore_ascii_case(word) {
                return text[len + 1..].to_string();
            }
        }
    }
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_substrings_in_order() {
        assert_eq!(replace_substrings("Tom & Jerry", REPLACE_TABLE), "Tom and Jerry");
        assert_eq!(replace_substrings("Who's Next?", REPLACE_TABLE), "Whos Next");
        assert_eq!(
            replace_substrings("Star Wars: Episode IV", REPLACE_TABLE),
            "Star Wars - Episode IV"
        );
        // Later entries see the output of earlier ones
        let chained = [("a", "b"), ("b", "c")];
        assert_eq!(replace_substrings("ab", &chained), "cc");
    }

    #[test]
    fn test_remove_characters() {
        assert_eq!(remove_characters("a/b<c>d", "/<>"), "abcd");
        assert_eq!(remove_characters("Amélie (2001)", INVALID_CHARS), "Amélie 2001");
        assert_eq!(remove_characters("", INVALID_CHARS), "");
    }

    #[test]
    fn test_collapse_repeats() {
        assert_eq!(collapse_repeats("a....b", '.'), "a.b");
        assert_eq!(collapse_repeats("a..b...c", '.'), "a.b.c");
        assert_eq!(collapse_repeats("abc", '.'), "abc");
        assert_eq!(collapse_repeats(&".".repeat(32), '.'), ".");
    }

    #[test]
    fn test_collapse_repeats_is_bounded() {
        // 33 dots: 17, 9, 5, 3, 2 after five passes
        assert_eq!(collapse_repeats(&".".repeat(33), '.'), "..");
    }

    #[test]
    fn test_strip_leading_stop_word() {
        assert_eq!(strip_leading_stop_word("The Terminal", STOP_WORDS), "Terminal");
        assert_eq!(strip_leading_stop_word("a bug's life", STOP_WORDS), "bug's life");
        assert_eq!(strip_leading_stop_word("The A Team", STOP_WORDS), "A Team");
        assert_eq!(strip_leading_stop_word("Theory", STOP_WORDS), "Theory");
        assert_eq!(strip_leading_stop_word("The", STOP_WORDS), "The");
        assert_eq!(strip_leading_stop_word("Été", STOP_WORDS), "Été");
    }
}
