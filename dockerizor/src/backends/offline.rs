use crate::{
    error::{Error, Result},
    models::{Container, Labels, Network, Secret, Volume},
    services::DaemonClient,
};

/// Stands in for the daemon when no client could be built. Every call
/// fails with `DaemonUnavailable`, carrying the reason.
#[derive(Clone, Debug)]
pub struct OfflineDaemon {
    reason: String,
}

impl OfflineDaemon {
    pub fn new<S: Into<String>>(reason: S) -> OfflineDaemon {
        OfflineDaemon { reason: reason.into() }
    }

    fn fail<T>(&self) -> Result<T> {
        Err(Error::DaemonUnavailable(self.reason.clone()))
    }
}

impl DaemonClient for OfflineDaemon {
    fn ping(&self) -> bool {
        false
    }

    fn list_networks(&self) -> Result<Vec<Network>> {
        self.fail()
    }

    fn create_network(&self, _name: &str, _driver: &str, _labels: &Labels) -> Result<()> {
        self.fail()
    }

    fn list_containers(&self) -> Result<Vec<Container>> {
        self.fail()
    }

    fn get_container(&self, _id: &str) -> Result<Option<Container>> {
        self.fail()
    }

    fn list_secrets(&self) -> Result<Vec<Secret>> {
        self.fail()
    }

    fn get_secret(&self, _name: &str) -> Result<Option<Secret>> {
        self.fail()
    }

    fn create_secret(&self, _name: &str, _plaintext: &str, _labels: &Labels) -> Result<()> {
        self.fail()
    }

    fn list_volumes(&self) -> Result<Vec<Volume>> {
        self.fail()
    }

    fn get_volume(&self, _name: &str) -> Result<Option<Volume>> {
        self.fail()
    }

    fn create_volume(
        &self,
        _name: &str,
        _driver: Option<&str>,
        _options: &Labels,
        _labels: &Labels,
    ) -> Result<()> {
        self.fail()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn everything_is_unavailable() {
        let daemon = OfflineDaemon::new("no socket");

        assert!(!daemon.ping());
        match daemon.list_containers() {
            Err(Error::DaemonUnavailable(reason)) => assert_eq!(reason, "no socket"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
