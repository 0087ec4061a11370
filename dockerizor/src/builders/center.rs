//! Services of the shared center stack: the traefik proxy and the catalog
//! of tools and databases that can be added next to it.

use std::{fmt, str::FromStr};

use crate::{
    center::{
        LABEL_ENABLE, LABEL_HOST, LABEL_SECRET, LABEL_SECRET_METHOD, LABEL_SECRET_NAME,
        LABEL_WILDCARD, NETWORK_BACKEND_NAME, NETWORK_FRONTEND_NAME,
    },
    compose::{Port, Service, ServiceVolume},
    dsn::{DatabaseSystem, Dsn},
    error::{Error, Result},
};

use super::{environment_for, slugify};

pub const TRAEFIK_SERVICE: &str = "traefik";
const DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// How applications are told to read a database's root password.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecretMethod {
    Secret,
    Vault,
}

impl Default for SecretMethod {
    fn default() -> Self {
        SecretMethod::Secret
    }
}

impl SecretMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            SecretMethod::Secret => "secret",
            SecretMethod::Vault => "vault",
        }
    }
}

impl FromStr for SecretMethod {
    type Err = Error;

    fn from_str(value: &str) -> Result<SecretMethod> {
        match value {
            "secret" => Ok(SecretMethod::Secret),
            "vault" => Ok(SecretMethod::Vault),
            _ => Err(Error::unsupported(format!("secret method {:?}", value))),
        }
    }
}

impl fmt::Display for SecretMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What `center add-service` may change about a catalog entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServiceOptions {
    /// Stored in the root password secret when it has to be created.
    pub password: Option<String>,
    /// A secret that must already exist. Databases use it as their root
    /// password; other services just mount it.
    pub secret: Option<String>,
    pub secret_method: SecretMethod,
    /// `name`, `/host/path` or `source:target`.
    pub volume: Option<String>,
    /// Also join the frontend network. The backend network is always joined.
    pub frontend: bool,
}

/// A service `center add-service` knows how to configure.
#[derive(Debug, PartialEq, Eq)]
pub struct CatalogService {
    pub slug: &'static str,
    /// Repository; the requested version becomes the tag.
    pub image: &'static str,
    /// Container port the proxy routes `{slug}.{wildcard}` to.
    pub web_port: Option<u16>,
    /// Directory kept in a named volume.
    pub data_directory: Option<&'static str>,
    pub mount_docker_socket: bool,
    pub environment: &'static [(&'static str, &'static str)],
    pub database: Option<DatabaseSystem>,
}

const fn tool(slug: &'static str, image: &'static str, web_port: u16) -> CatalogService {
    CatalogService {
        slug,
        image,
        web_port: Some(web_port),
        data_directory: None,
        mount_docker_socket: false,
        environment: &[],
        database: None,
    }
}

const fn backend(slug: &'static str, data_directory: Option<&'static str>) -> CatalogService {
    CatalogService {
        slug,
        image: slug,
        web_port: None,
        data_directory,
        mount_docker_socket: false,
        environment: &[],
        database: None,
    }
}

const fn database(system: DatabaseSystem, slug: &'static str, data_directory: &'static str) -> CatalogService {
    CatalogService {
        database: Some(system),
        ..backend(slug, Some(data_directory))
    }
}

pub const CATALOG: &[CatalogService] = &[
    CatalogService {
        environment: &[("PMA_ARBITRARY", "1")],
        ..tool("phpmyadmin", "phpmyadmin/phpmyadmin", 80)
    },
    tool("adminer", "adminer", 8080),
    CatalogService {
        data_directory: Some("/data"),
        mount_docker_socket: true,
        ..tool("portainer", "portainer/portainer-ce", 9000)
    },
    database(DatabaseSystem::MySql, "mysql", "/var/lib/mysql"),
    database(DatabaseSystem::MariaDb, "mariadb", "/var/lib/mysql"),
    database(DatabaseSystem::Postgres, "postgres", "/var/lib/postgresql/data"),
    database(DatabaseSystem::Mongo, "mongo", "/data/db"),
    backend("redis", Some("/data")),
    backend("memcached", None),
    CatalogService {
        environment: &[("discovery.type", "single-node")],
        ..backend("elasticsearch", Some("/usr/share/elasticsearch/data"))
    },
    tool("kibana", "kibana", 5601),
    backend("rabbitmq", Some("/var/lib/rabbitmq")),
    tool("mailhog", "mailhog/mailhog", 8025),
];

/// Fails with `Unsupported` for slugs outside the catalog.
pub fn catalog_service(slug: &str) -> Result<&'static CatalogService> {
    CATALOG
        .iter()
        .find(|service| service.slug == slug)
        .ok_or_else(|| Error::unsupported(format!("unknown service {:?}", slug)))
}

impl CatalogService {
    /// `mariadb_10-5` for version `10.5`.
    pub fn service_name(&self, version: &str) -> String {
        format!("{}_{}", self.slug, slugify(version))
    }

    pub fn volume_name(&self, version: &str) -> Option<String> {
        self.data_directory
            .map(|_| format!("dockerizor_{}", self.service_name(version)))
    }

    /// The mount for the service's data. The default is a named volume on
    /// the data directory; `options.volume` may rename that volume, bind a
    /// host path onto itself or give both sides.
    pub fn volume(&self, version: &str, options: &ServiceOptions) -> Result<Option<ServiceVolume>> {
        let requested = match options.volume.as_deref() {
            Some(requested) => requested,
            None => {
                return Ok(self
                    .data_directory
                    .zip(self.volume_name(version))
                    .map(|(directory, name)| ServiceVolume::new(name, directory)))
            }
        };

        match requested.split_once(':') {
            Some((source, target)) if !source.is_empty() && !target.is_empty() => {
                Ok(Some(ServiceVolume::new(source, target)))
            }
            Some(_) => Err(Error::format(format!(
                "volume {:?} must look like source:target",
                requested
            ))),
            None if requested.contains('/') => Ok(Some(ServiceVolume::new(requested, requested))),
            None => match self.data_directory {
                Some(directory) => Ok(Some(ServiceVolume::new(requested, directory))),
                None => Err(Error::format(format!(
                    "{} keeps no data, write the volume as {}:/target",
                    self.slug, requested
                ))),
            },
        }
    }

    /// Root password secret of a database, `{service}_root_password` unless
    /// an existing one was given.
    pub fn secret_name(&self, version: &str, options: &ServiceOptions) -> Option<String> {
        self.database.map(|_| {
            options
                .secret
                .clone()
                .unwrap_or_else(|| format!("{}_root_password", self.service_name(version)))
        })
    }

    /// Tools are exposed on the frontend network and reach databases on the
    /// backend one; everything else lives on the backend network only,
    /// unless `options.frontend` asks for both.
    pub fn service(&self, version: &str, wildcard: Option<&str>, options: &ServiceOptions) -> Result<Service> {
        let name = self.service_name(version);
        let mut service = Service::new(name.clone()).with_image(format!("{}:{}", self.image, version));
        service.add_label(LABEL_ENABLE, "true");

        for (key, value) in self.environment {
            service.add_environment(*key, *value);
        }

        if let Some(volume) = self.volume(version, options)? {
            service.add_volume(volume);
        }
        if self.mount_docker_socket {
            service.add_volume(ServiceVolume::new(DOCKER_SOCKET, DOCKER_SOCKET));
        }

        if self.web_port.is_some() || options.frontend {
            service.add_network(NETWORK_FRONTEND_NAME, Some(&name));
        }
        if let (Some(port), Some(wildcard)) = (self.web_port, wildcard) {
            add_proxy_route(&mut service, self.slug, &format!("{}.{}", self.slug, wildcard), port);
        }
        service.add_network(NETWORK_BACKEND_NAME, Some(&name));

        match (self.database, self.secret_name(version, options)) {
            (Some(system), Some(secret)) => {
                let dsn = Dsn {
                    user: system.root_user().to_string(),
                    ..Dsn::default()
                };
                for (key, value) in environment_for(system, &dsn, Some(&secret)) {
                    service.add_environment(key, value);
                }

                service
                    .add_secret(secret.clone())
                    .add_label(LABEL_SECRET_METHOD, options.secret_method.as_str())
                    .add_label(LABEL_SECRET_NAME, secret)
                    .add_label(LABEL_HOST, name);
            }
            _ => {
                if let Some(secret) = &options.secret {
                    service.add_secret(secret.clone()).add_label(LABEL_SECRET, secret.clone());
                }
            }
        }

        Ok(service)
    }
}

fn add_proxy_route(service: &mut Service, router: &str, host: &str, port: u16) {
    service
        .add_deploy_label("traefik.enable", "true")
        .add_deploy_label(format!("traefik.http.routers.{}-web.rule", router), format!("Host(`{}`)", host))
        .add_deploy_label(format!("traefik.http.routers.{}-web.entrypoints", router), "http")
        .add_deploy_label(
            format!("traefik.http.services.{}.loadbalancer.server.port", router),
            port.to_string(),
        );
}

/// The reverse proxy of the center, watching swarm services on the frontend
/// network. Its dashboard is served at `traefik.{wildcard}`.
pub fn traefik_service(wildcard: &str) -> Service {
    let mut service = Service::new(TRAEFIK_SERVICE).with_image("traefik:latest");

    for argument in [
        "--providers.docker".to_string(),
        format!("--providers.docker.network={}", NETWORK_FRONTEND_NAME),
        "--providers.docker.exposedByDefault=false".to_string(),
        "--providers.docker.swarmMode=true".to_string(),
        "--entrypoints.http.address=:80".to_string(),
        "--accesslog".to_string(),
        "--log".to_string(),
        "--api".to_string(),
        "--api.insecure=true".to_string(),
    ] {
        service.add_command(argument);
    }

    service
        .add_port(Port::new(80, 80))
        .add_volume(ServiceVolume::new(DOCKER_SOCKET, DOCKER_SOCKET))
        .add_network(NETWORK_FRONTEND_NAME, Some(TRAEFIK_SERVICE))
        .add_label(LABEL_WILDCARD, wildcard)
        .add_deploy_label("traefik.docker.network", NETWORK_FRONTEND_NAME);
    add_proxy_route(&mut service, "traefik-public", &format!("traefik.{}", wildcard), 8080);

    service
}
