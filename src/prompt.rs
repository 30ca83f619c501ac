//! Interactive questions asked by the CLI when paths are not given

use crate::error::{Result, ShrinkError};
use crate::quality_from_percent;
use std::io::{BufRead, Write};
use std::path::PathBuf;

/// Quality offered when the user just presses enter, on the 0-100 scale
pub const DEFAULT_PERCENT: f32 = 85.0;

/// Asks questions on `output` and reads answers line by line from `input`
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Print `question` and read one trimmed line. `None` on end of input.
    fn ask(&mut self, question: &str) -> Result<Option<String>> {
        write!(self.output, "{}", question).map_err(|_| ShrinkError::UserCanceled)?;
        self.output.flush().map_err(|_| ShrinkError::UserCanceled)?;

        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .map_err(|_| ShrinkError::UserCanceled)?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn tell(&mut self, message: &str) -> Result<()> {
        writeln!(self.output, "{}", message).map_err(|_| ShrinkError::UserCanceled)
    }

    /// Ask for a PDF to read until an existing file is named.
    ///
    /// An empty answer cancels.
    pub fn input_path(&mut self) -> Result<PathBuf> {
        loop {
            let answer = self
                .ask("PDF to shrink: ")?
                .filter(|answer| !answer.is_empty())
                .ok_or(ShrinkError::UserCanceled)?;

            let path = PathBuf::from(answer);
            if path.is_file() {
                return Ok(path);
            }
            self.tell(&format!("Cannot read {}", path.display()))?;
        }
    }

    /// Ask for a quality on the 0-100 scale, returned on the 0-1 scale
    pub fn quality(&mut self) -> Result<f32> {
        loop {
            let answer = self
                .ask(&format!("Quality 0-100 [{}]: ", DEFAULT_PERCENT))?
                .ok_or(ShrinkError::UserCanceled)?;

            if answer.is_empty() {
                return Ok(quality_from_percent(DEFAULT_PERCENT));
            }
            match answer.parse::<f32>() {
                Ok(percent) if (0.0..=100.0).contains(&percent) => {
                    return Ok(quality_from_percent(percent))
                }
                _ => self.tell("Enter a number between 0 and 100")?,
            }
        }
    }

    /// Ask where to save the result. An empty answer cancels.
    pub fn output_path(&mut self) -> Result<PathBuf> {
        self.ask("Save as: ")?
            .filter(|answer| !answer.is_empty())
            .map(PathBuf::from)
            .ok_or(ShrinkError::UserCanceled)
    }
}
