mod docker;
#[cfg(test)]
pub(crate) mod memory;
mod offline;
mod shell;

pub use docker::DockerBackend;
pub use offline::OfflineDaemon;
pub use shell::ShellRunner;
