use clap::CommandFactory;
use clap_complete::{Shell, generate};
use memnex_runtime::Error;

use crate::args::Cli;

pub fn handle(shell: &str) -> Result<i32, Error> {
    let shell = match shell.to_ascii_lowercase().as_str() {
        "bash" => Shell::Bash,
        "zsh" => Shell::Zsh,
        "fish" => Shell::Fish,
        other => {
            return Err(Error::InvalidArgument(format!(
                "unsupported shell '{}' (expected bash, zsh or fish)",
                other
            )));
        }
    };

    let mut command = Cli::command();
    generate(shell, &mut command, "memnex", &mut std::io::stdout());
    Ok(0)
}
