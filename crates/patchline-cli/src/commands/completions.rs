use std::fs::File;
use std::io;
use std::path::Path;

use clap::CommandFactory;
use clap_complete::{generate, shells};

use crate::cli::{Cli, CompletionShell};
use crate::error::CliError;

pub fn run_completions(shell: CompletionShell, output: Option<&Path>) -> Result<(), CliError> {
    let mut command = Cli::command();
    let name = command.get_name().to_string();

    let mut writer: Box<dyn io::Write> = match output {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout()),
    };

    match shell {
        CompletionShell::Bash => generate(shells::Bash, &mut command, name, &mut writer),
        CompletionShell::Zsh => generate(shells::Zsh, &mut command, name, &mut writer),
        CompletionShell::Fish => generate(shells::Fish, &mut command, name, &mut writer),
    }

    Ok(())
}
