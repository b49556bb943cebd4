use anyhow::{bail, Result};
use std::io::{self, BufRead, Write};

/// Line-oriented operator prompts on stdin/stdout.
pub struct Prompt<R> {
    input: R,
}

impl Prompt<io::StdinLock<'static>> {
    pub fn stdin() -> Self {
        Self::new(io::stdin().lock())
    }
}

impl<R: BufRead> Prompt<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }

    fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            bail!("Input closed");
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Asks for a value; an empty answer keeps `default`.
    pub fn ask(&mut self, label: &str, default: &str) -> Result<String> {
        let mut stdout = io::stdout();
        if default.is_empty() {
            print!("{label}: ");
        } else {
            print!("{label} [{default}]: ");
        }
        stdout.flush()?;

        let answer = self.read_line()?;
        if answer.trim().is_empty() {
            Ok(default.to_string())
        } else {
            Ok(answer.trim().to_string())
        }
    }

    /// Asks until a non-empty value is given.
    pub fn ask_required(&mut self, label: &str, default: &str) -> Result<String> {
        loop {
            let answer = self.ask(label, default)?;
            if !answer.is_empty() {
                return Ok(answer);
            }
            println!("A value is required.");
        }
    }

    pub fn confirm(&mut self, question: &str, default: bool) -> Result<bool> {
        let hint = if default { "Y/n" } else { "y/N" };
        let mut stdout = io::stdout();
        loop {
            print!("{question} [{hint}]: ");
            stdout.flush()?;
            match self.read_line()?.trim().to_lowercase().as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => println!("Please answer y or n."),
            }
        }
    }

    /// Waits for the operator to press Enter.
    pub fn pause(&mut self, message: &str) -> Result<()> {
        print!("{message}");
        io::stdout().flush()?;
        self.read_line()?;
        Ok(())
    }
}
