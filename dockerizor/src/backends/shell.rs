use log::debug;
use std::{path::Path, process::Command};

use crate::{
    error::{Error, Result},
    services::CommandRunner,
};

/// Runs command lines through `sh -c` with the console attached.
#[derive(Debug, Default)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&mut self, command: &str, workdir: &Path) -> Result<()> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command).current_dir(workdir);
        debug!("executing command: {:?}", cmd);

        let status = cmd.status()?;
        if !status.success() {
            return Err(Error::CommandFailed {
                command: command.to_string(),
                status,
            });
        }

        Ok(())
    }
}
