use anyhow::{Context, Result};
use std::io::{self, Write};

/// One line from stdin without the line ending; `None` at end of input.
pub fn prompt_line(prompt: &str) -> Result<Option<String>> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut s = String::new();
    if io::stdin().read_line(&mut s)? == 0 {
        return Ok(None);
    }
    if s.ends_with('\n') {
        s.pop();
        if s.ends_with('\r') {
            s.pop();
        }
    }
    Ok(Some(s))
}

pub fn prompt_string(prompt: &str) -> Result<String> {
    Ok(prompt_line(prompt)?.unwrap_or_default())
}

pub fn prompt_hidden(prompt: &str) -> Result<String> {
    let s = rpassword::prompt_password(prompt)?;
    Ok(s)
}

/// The code is typed hidden and passed on as typed, like `--code`.
pub fn prompt_code() -> Result<String> {
    prompt_hidden("One-time code: ")
}

pub fn prompt_number(prompt: &str) -> Result<u32> {
    prompt_optional_number(prompt)?.context("a number is required")
}

/// Empty input means "no value".
pub fn prompt_optional_number(prompt: &str) -> Result<Option<u32>> {
    parse_optional_number(&prompt_string(prompt)?)
}

pub fn confirm(prompt: &str) -> Result<bool> {
    Ok(is_yes(&prompt_string(prompt)?))
}

fn parse_optional_number(input: &str) -> Result<Option<u32>> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }
    let n = input
        .parse::<u32>()
        .with_context(|| format!("'{input}' is not a valid number"))?;
    Ok(Some(n))
}

fn is_yes(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}
