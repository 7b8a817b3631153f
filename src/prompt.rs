use crate::error::{Result, SnapeError};
use std::io::{BufRead, Write};

/// Asks the operator a yes/no question.
pub trait Prompt {
    /// Returns the answer; with `default = None` an answer is required.
    fn ask(&self, question: &str, default: Option<bool>) -> Result<bool>;
}

/// Reads answers from stdin.
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn ask(&self, question: &str, default: Option<bool>) -> Result<bool> {
        let stdin = std::io::stdin();
        ask_with(&mut stdin.lock(), &mut std::io::stdout(), question, default)
    }
}

fn ask_with(
    input: &mut impl BufRead,
    output: &mut impl Write,
    question: &str,
    default: Option<bool>,
) -> Result<bool> {
    let choices = match default {
        None => "[y/n]",
        Some(true) => "[Y/n]",
        Some(false) => "[y/N]",
    };

    loop {
        write!(output, "{question} {choices} ")?;
        output.flush()?;

        let mut answer = String::new();
        if input.read_line(&mut answer)? == 0 {
            // stdin closed, nobody is left to answer
            writeln!(output)?;
            return default.ok_or(SnapeError::Cancelled);
        }
        match answer.trim_end_matches(['\r', '\n']) {
            "y" | "Y" => return Ok(true),
            "n" | "N" => return Ok(false),
            "" => {
                if let Some(default) = default {
                    return Ok(default);
                }
            }
            _ => {}
        }
    }
}
