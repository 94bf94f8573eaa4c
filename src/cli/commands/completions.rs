use std::io;

use clap::Command;
use clap_complete::Shell;

pub fn execute(shell: Shell, command: &mut Command) {
    let name = command.get_name().to_string();
    clap_complete::generate(shell, command, name, &mut io::stdout());
}
