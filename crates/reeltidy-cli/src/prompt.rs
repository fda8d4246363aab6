use std::io::{self, BufRead, Write};

use reeltidy_core::Chooser;

/// Choices listed before asking.
const MAX_SHOWN: usize = 20;

/// Asks on the terminal. Empty input or 0 means none; EOF means none.
pub struct TerminalChooser;

impl Chooser for TerminalChooser {
    fn choose(&self, question: &str, choices: &[String]) -> Option<usize> {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut output = io::stderr();
        // A broken terminal counts as declining
        ask(&mut input, &mut output, question, choices).unwrap_or(None)
    }
}

/// List up to [`MAX_SHOWN`] choices and read an answer until it is valid.
pub fn ask(
    input: &mut impl BufRead,
    output: &mut impl Write,
    question: &str,
    choices: &[String],
) -> io::Result<Option<usize>> {
    let shown = choices.len().min(MAX_SHOWN);
    writeln!(output)?;
    for (i, choice) in choices.iter().take(shown).enumerate() {
        writeln!(output, "  {:>2}. {}", i + 1, choice)?;
    }

    loop {
        write!(output, "\n  {question} (0 for None) [0]: ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            return Ok(None);
        }
        match parse_answer(line.trim(), shown) {
            Some(None) => {
                writeln!(output, "  You selected: None")?;
                return Ok(None);
            }
            Some(Some(index)) => {
                writeln!(output, "  You selected: {}", choices[index])?;
                return Ok(Some(index));
            }
            None => writeln!(output, "  Invalid input, please enter a number from 0 to {shown}")?,
        }
    }
}

/// `Some(None)` for "none", `Some(Some(i))` for a choice, None if invalid.
fn parse_answer(answer: &str, shown: usize) -> Option<Option<usize>> {
    if answer.is_empty() {
        return Some(None);
    }
    match answer.parse::<usize>() {
        Ok(0) => Some(None),
        Ok(n) if n <= shown => Some(Some(n - 1)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choices(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("Movie {i}")).collect()
    }

    #[test]
    fn test_parse_answer() {
        assert_eq!(parse_answer("", 3), Some(None));
        assert_eq!(parse_answer("0", 3), Some(None));
        assert_eq!(parse_answer("2", 3), Some(Some(1)));
        assert_eq!(parse_answer("4", 3), None);
        assert_eq!(parse_answer("x", 3), None);
    }

    #[test]
    fn test_ask_retries_until_valid() {
        let mut input = "9\nabc\n2\n".as_bytes();
        let mut output = Vec::new();
        let answer = ask(&mut input, &mut output, "Pick", &choices(3)).unwrap();
        assert_eq!(answer, Some(1));

        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("   1. Movie 1"));
        assert_eq!(text.matches("Invalid input").count(), 2);
        assert!(text.contains("You selected: Movie 2"));
    }

    #[test]
    fn test_ask_shows_at_most_twenty() {
        let mut input = "21\n\n".as_bytes();
        let mut output = Vec::new();
        let answer = ask(&mut input, &mut output, "Pick", &choices(25)).unwrap();
        assert_eq!(answer, None);

        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("20. Movie 20"));
        assert!(!text.contains("Movie 21"));
    }

    #[test]
    fn test_ask_eof_is_none() {
        let mut input = "".as_bytes();
        let mut output = Vec::new();
        assert_eq!(ask(&mut input, &mut output, "Pick", &choices(2)).unwrap(), None);
    }
}
