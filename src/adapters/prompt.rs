use crate::core::Chooser;
use crate::utils::error::{CtdError, Result};
use std::io::{BufRead, Write};
use std::sync::Mutex;

/// Asks on the terminal; the answer must be one of the listed options.
pub struct StdinChooser;

impl Chooser for StdinChooser {
    fn choose(&self, what: &str, options: &[String]) -> Result<String> {
        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        choose_from(what, options, &mut stdin.lock(), &mut stdout.lock())
    }
}

/// Reads answers from any reader; three wrong answers give up.
pub fn choose_from<R: BufRead, W: Write>(
    what: &str,
    options: &[String],
    input: &mut R,
    output: &mut W,
) -> Result<String> {
    if options.is_empty() {
        return Err(CtdError::not_found(format!("any {}", what)));
    }

    writeln!(output, "Available {}s:", what)?;
    for option in options {
        writeln!(output, "  {}", option)?;
    }

    for _ in 0..3 {
        write!(output, "Please choose one {} for your data request: ", what)?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        let answer = line.trim();
        if options.iter().any(|o| o == answer) {
            return Ok(answer.to_string());
        }
        writeln!(output, "'{}' is not one of the listed {}s", answer, what)?;
    }

    Err(CtdError::InvalidConfigValueError {
        field: what.to_string(),
        value: String::new(),
        reason: "no valid choice given".to_string(),
    })
}

/// Answers from a fixed queue, for scripted runs.
pub struct ScriptedChooser {
    answers: Mutex<Vec<String>>,
}

impl ScriptedChooser {
    pub fn new(answers: Vec<String>) -> Self {
        let mut answers = answers;
        answers.reverse();
        Self {
            answers: Mutex::new(answers),
        }
    }
}

impl Chooser for ScriptedChooser {
    fn choose(&self, what: &str, options: &[String]) -> Result<String> {
        let answer = self
            .answers
            .lock()
            .ok()
            .and_then(|mut answers| answers.pop())
            .ok_or_else(|| CtdError::MissingConfigError {
                field: what.to_string(),
            })?;
        if !options.contains(&answer) {
            return Err(CtdError::InvalidConfigValueError {
                field: what.to_string(),
                value: answer,
                reason: format!("Available: {}", options.join(", ")),
            });
        }
        Ok(answer)
    }
}
