use std::path::Path;

use crate::{
    error::Result,
    models::{Container, Labels, Network, Secret, Volume},
};

/// Blocking access to the Docker daemon.
///
/// Reads of a single resource return `Ok(None)` when the daemon reports an
/// error for it. Creation is not idempotent: callers check existence first.
pub trait DaemonClient {
    fn ping(&self) -> bool;

    fn list_networks(&self) -> Result<Vec<Network>>;

    fn create_network(&self, name: &str, driver: &str, labels: &Labels) -> Result<()>;

    fn list_containers(&self) -> Result<Vec<Container>>;

    fn get_container(&self, id: &str) -> Result<Option<Container>>;

    fn list_secrets(&self) -> Result<Vec<Secret>>;

    fn get_secret(&self, name: &str) -> Result<Option<Secret>>;

    fn create_secret(&self, name: &str, plaintext: &str, labels: &Labels) -> Result<()>;

    fn list_volumes(&self) -> Result<Vec<Volume>>;

    fn get_volume(&self, name: &str) -> Result<Option<Volume>>;

    fn create_volume(
        &self,
        name: &str,
        driver: Option<&str>,
        options: &Labels,
        labels: &Labels,
    ) -> Result<()>;
}

/// Runs a shell command line in a directory, streaming its output.
pub trait CommandRunner {
    fn run(&mut self, command: &str, workdir: &Path) -> Result<()>;
}
