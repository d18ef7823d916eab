use crate::cli::args::{Cli, Command};
use crate::exit_codes::EXIT_SUCCESS;

pub fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Pack(args) => super::pack::run(args),
        Command::Verify(args) => Ok(super::verify::run(args)),
        Command::Keygen(args) => super::keygen::run(args),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(EXIT_SUCCESS)
        }
    }
}
