use log::{debug, info, warn};
use rand::{distributions::Alphanumeric, Rng};
use std::collections::BTreeSet as Set;

use crate::{
    controller::DryRun,
    error::{Error, Result},
    models::{Container, Labels, Network, Provisioned, Secret, Volume},
    services::DaemonClient,
};

pub const NETWORK_FRONTEND_NAME: &str = "dockerizor-frontend";
pub const NETWORK_FRONTEND_LABEL: &str = "dockerizor.network.frontend";
pub const NETWORK_BACKEND_NAME: &str = "dockerizor-backend";
pub const NETWORK_BACKEND_LABEL: &str = "dockerizor.network.backend";
pub const NETWORK_DRIVER: &str = "overlay";

pub const LABEL_ENABLE: &str = "dockerizor.enable";
pub const LABEL_HOST: &str = "dockerizor.host";
pub const LABEL_WILDCARD: &str = "dockerizor.wildcard";
/// An existing secret mounted into a center service.
pub const LABEL_SECRET: &str = "dockerizor.secret";
pub const LABEL_SECRET_METHOD: &str = "dockerizor.secret.method";
pub const LABEL_SECRET_NAME: &str = "dockerizor.secret.name";
pub const LABEL_SWARM_SERVICE: &str = "com.docker.swarm.service.name";

pub const FREE_PORT_BASE: u16 = 8000;

/// The shared networks found on the daemon.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Networks {
    pub frontend: Option<Network>,
    pub backend: Option<Network>,
}

/// Reads the center's state from the daemon and creates missing shared
/// resources.
///
/// Every lookup reflects the daemon at call time. Nothing is locked, so two
/// concurrent runs can both decide to create the same resource.
pub struct CenterManager<'a> {
    daemon: &'a dyn DaemonClient,
    dry_run: DryRun,
}

impl<'a> CenterManager<'a> {
    pub fn new(daemon: &'a dyn DaemonClient, dry_run: DryRun) -> CenterManager<'a> {
        CenterManager { daemon, dry_run }
    }

    pub fn is_available(&self) -> bool {
        self.daemon.ping()
    }

    /// Fails with `DaemonUnavailable` when the daemon does not answer.
    pub fn require_daemon(&self) -> Result<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(Error::DaemonUnavailable("ping failed".into()))
        }
    }

    /// A network only counts when both its name and its label match; a
    /// network of the same name created by someone else is ignored.
    pub fn discover_networks(&self) -> Result<Networks> {
        let mut networks = Networks::default();

        for network in self.daemon.list_networks()? {
            if is_managed(&network, NETWORK_FRONTEND_NAME, NETWORK_FRONTEND_LABEL) {
                networks.frontend = Some(network);
            } else if is_managed(&network, NETWORK_BACKEND_NAME, NETWORK_BACKEND_LABEL) {
                networks.backend = Some(network);
            }
        }

        info!(
            "found networks frontend={:?} backend={:?}",
            networks.frontend.as_ref().map(|network| &network.name),
            networks.backend.as_ref().map(|network| &network.name)
        );

        Ok(networks)
    }

    /// Containers whose image contains both `name` and `image` and that are
    /// attached to `network`; absent filters match everything. `name` is a
    /// service name such as `mariadb`, looked up in the image reference.
    ///
    /// The daemon's listing order is not stable, so matches are sorted by
    /// container name.
    pub fn find_containers(
        &self,
        name: Option<&str>,
        image: Option<&str>,
        network: Option<&str>,
    ) -> Result<Vec<Container>> {
        let mut matches = self
            .daemon
            .list_containers()?
            .into_iter()
            .filter(|container| name.map_or(true, |name| container.image.contains(name)))
            .filter(|container| image.map_or(true, |image| container.image.contains(image)))
            .filter(|container| network.map_or(true, |network| container.is_attached_to(network)))
            .collect::<Vec<_>>();

        matches.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(matches)
    }

    /// The first of `find_containers`, with a warning when the choice was
    /// ambiguous.
    pub fn find_container(
        &self,
        name: Option<&str>,
        image: Option<&str>,
        network: Option<&str>,
    ) -> Result<Option<Container>> {
        let matches = self.find_containers(name, image, network)?;

        if matches.len() > 1 {
            warn!(
                "several containers match name={:?} image={:?} network={:?}, using {:?}",
                name, image, network, matches[0].name
            );
        }

        Ok(matches.into_iter().next())
    }

    pub fn used_ports(&self) -> Result<Set<u16>> {
        let ports = self
            .daemon
            .list_containers()?
            .iter()
            .flat_map(|container| container.ports.iter())
            .filter_map(|port| port.public)
            .collect();

        Ok(ports)
    }

    /// The lowest port from `FREE_PORT_BASE` up that no container publishes.
    pub fn free_port(&self) -> Result<u16> {
        let used = self.used_ports()?;
        debug!("used ports {:?}", used);

        (FREE_PORT_BASE..=u16::MAX)
            .find(|port| !used.contains(port))
            .ok_or_else(|| Error::unsupported("no free port left"))
    }

    /// Creates the shared networks that do not exist yet.
    pub fn ensure_networks(&self) -> Result<Networks> {
        let existing = self.daemon.list_networks()?;

        for (name, label) in [
            (NETWORK_FRONTEND_NAME, NETWORK_FRONTEND_LABEL),
            (NETWORK_BACKEND_NAME, NETWORK_BACKEND_LABEL),
        ] {
            match existing.iter().find(|network| network.name == name) {
                Some(network) if is_managed(network, name, label) => {
                    info!("network {:?} already exists", name);
                }
                Some(_) => {
                    return Err(Error::unsupported(format!(
                        "network {:?} exists but was not created by dockerizor",
                        name
                    )))
                }
                None => {
                    let labels = labels(&[(label, "true")]);
                    if self.dry_run.permits(format_args!("create network {}", name)) {
                        self.daemon.create_network(name, NETWORK_DRIVER, &labels)?;
                    }
                }
            }
        }

        if self.dry_run.is_enabled() {
            return Ok(Networks {
                frontend: Some(planned_network(NETWORK_FRONTEND_NAME, NETWORK_FRONTEND_LABEL)),
                backend: Some(planned_network(NETWORK_BACKEND_NAME, NETWORK_BACKEND_LABEL)),
            });
        }

        self.discover_networks()
    }

    pub fn find_secret(&self, name: &str) -> Result<Option<Secret>> {
        self.daemon.get_secret(name)
    }

    /// Reuses the secret called `name` or creates it holding `password`,
    /// a generated one when none is given.
    pub fn ensure_secret(
        &self,
        name: &str,
        password: Option<&str>,
        labels: &Labels,
    ) -> Result<Provisioned<Secret>> {
        let existing = self
            .daemon
            .list_secrets()?
            .into_iter()
            .find(|secret| secret.name == name);

        if let Some(secret) = existing {
            info!("reusing secret {:?}", name);
            if password.is_some() {
                warn!("secret {:?} already exists, the given password is ignored", name);
            }
            return Ok(Provisioned::reused(secret));
        }

        let password = password.map_or_else(generate_password, String::from);
        if self.dry_run.permits(format_args!("create secret {}", name)) {
            self.daemon.create_secret(name, &password, labels)?;
        }

        let secret = Secret {
            id: String::new(),
            name: name.to_string(),
            labels: labels.clone(),
        };

        Ok(Provisioned::created(secret, Some(password)))
    }

    /// Reuses the volume called `name` or creates it with the local driver.
    pub fn ensure_volume(&self, name: &str, labels: &Labels) -> Result<Provisioned<Volume>> {
        if let Some(volume) = self.daemon.get_volume(name)? {
            info!("reusing volume {:?}", name);
            return Ok(Provisioned::reused(volume));
        }

        if self.dry_run.permits(format_args!("create volume {}", name)) {
            self.daemon
                .create_volume(name, None, &Labels::new(), labels)?;
        }

        let volume = Volume {
            name: name.to_string(),
            driver: "local".to_string(),
            labels: labels.clone(),
        };

        Ok(Provisioned::created(volume, None))
    }
}

fn is_managed(network: &Network, name: &str, label: &str) -> bool {
    network.name == name && network.labels.contains_key(label)
}

fn planned_network(name: &str, label: &str) -> Network {
    Network {
        id: String::new(),
        name: name.to_string(),
        driver: NETWORK_DRIVER.to_string(),
        labels: labels(&[(label, "true")]),
    }
}

pub fn labels(pairs: &[(&str, &str)]) -> Labels {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

/// Falls back to the default when the daemon could not answer a lookup
/// that only serves to reuse existing infrastructure.
pub fn or_absent<T: Default>(result: Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            warn!("treating infrastructure as absent: {}", err);
            T::default()
        }
    }
}

pub fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::{container, MemoryDaemon};

    fn center(daemon: &MemoryDaemon) -> CenterManager {
        CenterManager::new(daemon, DryRun::default())
    }

    #[test]
    fn networks_need_name_and_label() {
        let daemon = MemoryDaemon::default()
            .with_network(NETWORK_FRONTEND_NAME, &[(NETWORK_FRONTEND_LABEL, "true")])
            .with_network(NETWORK_BACKEND_NAME, &[]);

        let networks = center(&daemon).discover_networks().unwrap();

        assert_eq!(networks.frontend.unwrap().name, NETWORK_FRONTEND_NAME);
        assert!(networks.backend.is_none());
    }

    #[test]
    fn finds_the_proxy_on_the_frontend_network() {
        let daemon = MemoryDaemon::default()
            .with_container(container("shop_web_1", "nginx:alpine", &[NETWORK_FRONTEND_NAME], &[]))
            .with_container(container("traefik_1", "traefik:v2.10", &[NETWORK_FRONTEND_NAME], &[80]))
            .with_container(container("traefik_old", "traefik:v1.7", &["bridge"], &[]));

        let found = center(&daemon)
            .find_container(None, Some("traefik"), Some(NETWORK_FRONTEND_NAME))
            .unwrap();

        assert_eq!(found.unwrap().name, "traefik_1");
    }

    #[test]
    fn no_match_is_absent() {
        let daemon = MemoryDaemon::default()
            .with_container(container("shop_web_1", "nginx:alpine", &[NETWORK_FRONTEND_NAME], &[]));

        let found = center(&daemon)
            .find_container(None, Some("traefik"), Some(NETWORK_FRONTEND_NAME))
            .unwrap();

        assert!(found.is_none());
    }

    #[test]
    fn name_filter_matches_images() {
        let daemon = MemoryDaemon::default()
            .with_container(container("mysql_admin_1", "mariadb:10.5", &[NETWORK_BACKEND_NAME], &[]))
            .with_container(container("center_db_1", "mysql:8", &[NETWORK_BACKEND_NAME], &[]));

        let found = center(&daemon)
            .find_container(Some("mysql"), None, None)
            .unwrap();

        assert_eq!(found.unwrap().name, "center_db_1");
    }

    #[test]
    fn all_matches_are_listed_by_name() {
        let daemon = MemoryDaemon::default()
            .with_container(container("center_mariadb_1", "mariadb:10.5", &[NETWORK_BACKEND_NAME], &[]))
            .with_container(container("blog_mariadb_1", "mariadb:10.5", &[NETWORK_BACKEND_NAME], &[]))
            .with_container(container("shop_mariadb_1", "mariadb:10.5", &["shop_default"], &[]));

        let names = center(&daemon)
            .find_containers(Some("mariadb"), None, Some(NETWORK_BACKEND_NAME))
            .unwrap()
            .into_iter()
            .map(|container| container.name)
            .collect::<Vec<_>>();

        assert_eq!(names, ["blog_mariadb_1", "center_mariadb_1"]);
    }

    #[test]
    fn multiple_matches_resolve_independently_of_listing_order() {
        let forward = MemoryDaemon::default()
            .with_container(container("db_b", "postgres:13", &[], &[]))
            .with_container(container("db_a", "postgres:14", &[], &[]));
        let backward = MemoryDaemon::default()
            .with_container(container("db_a", "postgres:14", &[], &[]))
            .with_container(container("db_b", "postgres:13", &[], &[]));

        let first = center(&forward).find_container(None, Some("postgres"), None).unwrap();
        let second = center(&backward).find_container(None, Some("postgres"), None).unwrap();

        assert_eq!(first.unwrap().name, "db_a");
        assert_eq!(second.unwrap().name, "db_a");
    }

    #[test]
    fn free_port_skips_published_ports() {
        let daemon = MemoryDaemon::default()
            .with_container(container("a", "nginx", &[], &[8000, 8001]))
            .with_container(container("b", "nginx", &[], &[8003, 80]));
        let center = center(&daemon);

        let used = center.used_ports().unwrap();
        let port = center.free_port().unwrap();

        assert_eq!(port, 8002);
        assert!(!used.contains(&port));
        assert_eq!(center.free_port().unwrap(), port);
    }

    #[test]
    fn free_port_starts_at_the_base() {
        let daemon = MemoryDaemon::default();
        assert_eq!(center(&daemon).free_port().unwrap(), FREE_PORT_BASE);
    }

    #[test]
    fn ensure_networks_creates_only_missing_ones() {
        let daemon = MemoryDaemon::default()
            .with_network(NETWORK_FRONTEND_NAME, &[(NETWORK_FRONTEND_LABEL, "true")]);

        let networks = center(&daemon).ensure_networks().unwrap();

        assert!(networks.frontend.is_some());
        assert!(networks.backend.is_some());
        assert_eq!(daemon.networks.borrow().len(), 2);
    }

    #[test]
    fn foreign_network_with_our_name_is_refused() {
        let daemon = MemoryDaemon::default().with_network(NETWORK_BACKEND_NAME, &[]);

        let err = center(&daemon).ensure_networks().unwrap_err();

        assert!(matches!(err, Error::Unsupported(_)));
    }

    #[test]
    fn dry_run_creates_nothing() {
        let daemon = MemoryDaemon::default();
        let center = CenterManager::new(&daemon, DryRun::enabled());

        let networks = center.ensure_networks().unwrap();
        let secret = center.ensure_secret("mysql_root_password", None, &Labels::new()).unwrap();
        center.ensure_volume("center_mysql", &Labels::new()).unwrap();

        assert!(networks.frontend.is_some());
        assert!(secret.password.is_some());
        assert!(daemon.networks.borrow().is_empty());
        assert!(daemon.secrets.borrow().is_empty());
        assert!(daemon.volumes.borrow().is_empty());
    }

    #[test]
    fn existing_secret_is_reused_without_password() {
        let daemon = MemoryDaemon::default();
        let center = center(&daemon);

        let created = center.ensure_secret("postgres_root_password", None, &Labels::new()).unwrap();
        let reused = center.ensure_secret("postgres_root_password", None, &Labels::new()).unwrap();

        assert!(created.created);
        assert_eq!(created.password.as_ref().map(String::len), Some(32));
        assert!(!reused.created);
        assert_eq!(reused.password, None);
        assert_eq!(daemon.secret_data.borrow().len(), 1);
    }

    #[test]
    fn given_password_is_stored_in_the_secret() {
        let daemon = MemoryDaemon::default();

        let secret = center(&daemon)
            .ensure_secret("redis_7_password", Some("hunter22"), &Labels::new())
            .unwrap();

        assert_eq!(secret.password.as_deref(), Some("hunter22"));
        assert_eq!(
            daemon.secret_data.borrow()[0],
            ("redis_7_password".to_string(), "hunter22".to_string())
        );
        assert!(center(&daemon).find_secret("redis_7_password").unwrap().is_some());
    }

    #[test]
    fn volumes_are_created_once() {
        let daemon = MemoryDaemon::default();
        let center = center(&daemon);

        assert!(center.ensure_volume("center_redis", &Labels::new()).unwrap().created);
        assert!(!center.ensure_volume("center_redis", &Labels::new()).unwrap().created);
        assert_eq!(daemon.volumes.borrow().len(), 1);
    }

    #[test]
    fn unreachable_daemon_degrades_to_absent() {
        let daemon = MemoryDaemon::unreachable();
        let center = center(&daemon);

        assert!(center.require_daemon().is_err());
        assert_eq!(or_absent(center.discover_networks()), Networks::default());
        assert_eq!(or_absent(center.find_container(None, Some("traefik"), None)), None);
    }
}
