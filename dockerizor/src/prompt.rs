use crossterm::{
    style::{self, Colorize, Styler},
    QueueableCommand,
};
use log::debug;
use std::io::{BufRead, Write};

use crate::error::{Error, Result};

/// Questions asked while configuring an application.
pub trait Prompt {
    fn ask(&mut self, question: &str, default: &str) -> Result<String>;

    fn confirm(&mut self, question: &str, default: bool) -> Result<bool>;

    /// Index of the chosen option.
    fn choose(&mut self, question: &str, options: &[&str], default: usize) -> Result<usize>;
}

/// Answers every question with its default.
#[derive(Copy, Clone, Debug, Default)]
pub struct NonInteractive;

impl Prompt for NonInteractive {
    fn ask(&mut self, question: &str, default: &str) -> Result<String> {
        debug!("{} -> {:?}", question, default);
        Ok(default.to_string())
    }

    fn confirm(&mut self, question: &str, default: bool) -> Result<bool> {
        debug!("{} -> {}", question, default);
        Ok(default)
    }

    fn choose(&mut self, question: &str, options: &[&str], default: usize) -> Result<usize> {
        debug!("{} -> {:?}", question, options.get(default));
        Ok(default)
    }
}

/// Reads answers line by line; an empty line takes the default.
pub struct ConsolePrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> ConsolePrompt<R, W> {
    pub fn new(input: R, output: W) -> ConsolePrompt<R, W> {
        ConsolePrompt { input, output }
    }

    fn read_answer(&mut self, question: &str, hint: &str) -> Result<String> {
        self.output
            .queue(style::PrintStyledContent(question.cyan().bold()))?
            .queue(style::Print(format!(" [{}] ", hint)))?
            .flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(Error::unsupported(format!("no answer to {:?}", question)));
        }

        Ok(line.trim().to_string())
    }
}

impl<R: BufRead, W: Write> Prompt for ConsolePrompt<R, W> {
    fn ask(&mut self, question: &str, default: &str) -> Result<String> {
        let answer = self.read_answer(question, default)?;
        if answer.is_empty() {
            Ok(default.to_string())
        } else {
            Ok(answer)
        }
    }

    fn confirm(&mut self, question: &str, default: bool) -> Result<bool> {
        let hint = if default { "Y/n" } else { "y/N" };

        loop {
            match self.read_answer(question, hint)?.to_lowercase().as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => continue,
            }
        }
    }

    fn choose(&mut self, question: &str, options: &[&str], default: usize) -> Result<usize> {
        for (index, option) in options.iter().enumerate() {
            self.output
                .queue(style::Print(format!("  [{}] {}\n", index, option)))?;
        }

        loop {
            let answer = self.read_answer(question, &default.to_string())?;
            if answer.is_empty() {
                return Ok(default);
            }
            if let Ok(index) = answer.parse::<usize>() {
                if index < options.len() {
                    return Ok(index);
                }
            }
            if let Some(index) = options.iter().position(|option| *option == answer) {
                return Ok(index);
            }
        }
    }
}
