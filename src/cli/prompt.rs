use std::io::{self, BufRead, Write};

/// Ask for confirmation on the terminal.
pub fn confirm(action: &str) -> io::Result<bool> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    confirm_with(&mut stdin.lock(), &mut stdout.lock(), action)
}

pub fn confirm_with<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    action: &str,
) -> io::Result<bool> {
    write!(output, "Are you sure you want to {}? (yes/no): ", action)?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(is_affirmative(&answer))
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
