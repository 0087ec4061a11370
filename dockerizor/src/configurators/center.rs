//! The `center` commands: the shared proxy and the services every
//! application on the host can join.

use log::{info, warn};
use std::path::Path;

use crate::{
    builders::center::{catalog_service, traefik_service, CatalogService, ServiceOptions, CATALOG},
    center::{labels, CenterManager, LABEL_ENABLE, NETWORK_BACKEND_NAME, NETWORK_FRONTEND_NAME},
    compose::{ComposeFile, Secret, Volume},
    config::ToolConfig,
    context::AppBuildContext,
    dsn::DatabaseSystem,
    error::{Error, Result},
    prompt::Prompt,
};

use super::COMPOSE_FILE;

pub const CENTER_NAME: &str = "dockerizor-center";
const DEFAULT_WILDCARD: &str = "docker.localhost";
const DATABASE_SYSTEMS: &[DatabaseSystem] = &[
    DatabaseSystem::MySql,
    DatabaseSystem::MariaDb,
    DatabaseSystem::Postgres,
    DatabaseSystem::Mongo,
];

/// Creates the shared networks and puts the proxy into the center's
/// compose file. Nothing is deployed; the returned application only holds
/// the files to write.
pub fn install(
    dir: &Path,
    center: &CenterManager,
    prompt: &mut dyn Prompt,
    wildcard: Option<&str>,
) -> Result<AppBuildContext> {
    center.require_daemon()?;

    let mut config = ToolConfig::center(dir)?;
    let wildcard = match wildcard {
        Some(wildcard) => wildcard.to_string(),
        None => {
            let default = config.get_str("/wildcard").unwrap_or(DEFAULT_WILDCARD).to_string();
            prompt.ask("Wildcard domain (apps.test serves *.apps.test)", &default)?
        }
    };
    validate_wildcard(&wildcard)?;
    config.set("/wildcard", wildcard.as_str())?;

    let networks = center.ensure_networks()?;

    let compose_file = ComposeFile::load_or_new(dir, COMPOSE_FILE)?;
    let mut app = AppBuildContext::new(CENTER_NAME, dir, compose_file);
    app.set_frontend_network(network_name(networks.frontend.map(|network| network.name), NETWORK_FRONTEND_NAME))
        .set_backend_network(network_name(networks.backend.map(|network| network.name), NETWORK_BACKEND_NAME));

    info!("proxy serves *.{}", wildcard);
    app.compose_file_mut().add_service(traefik_service(&wildcard));
    app.add_file(config.to_file()?);

    Ok(app)
}

fn network_name(found: Option<String>, planned: &str) -> String {
    found.unwrap_or_else(|| planned.to_string())
}

/// Adds a catalog service to the center's compose file, creating the
/// secret and volume it needs when they are missing.
pub fn add_service(
    dir: &Path,
    center: &CenterManager,
    slug: &str,
    version: &str,
    options: &ServiceOptions,
) -> Result<AppBuildContext> {
    let entry = catalog_service(slug)?;
    add_catalog_service(dir, center, entry, version, options)
}

/// Like `add_service`, restricted to the database servers applications
/// can join. `password` is stored in the root password secret when that
/// secret has to be created.
pub fn add_database(
    dir: &Path,
    center: &CenterManager,
    system: &str,
    version: &str,
    password: Option<String>,
) -> Result<AppBuildContext> {
    let system = DatabaseSystem::from_driver(system)?;
    let entry = CATALOG
        .iter()
        .find(|entry| entry.database == Some(system))
        .filter(|_| DATABASE_SYSTEMS.contains(&system))
        .ok_or_else(|| Error::unsupported(format!("center database {}", system)))?;

    let options = ServiceOptions {
        password,
        ..ServiceOptions::default()
    };
    add_catalog_service(dir, center, entry, version, &options)
}

fn add_catalog_service(
    dir: &Path,
    center: &CenterManager,
    entry: &CatalogService,
    version: &str,
    options: &ServiceOptions,
) -> Result<AppBuildContext> {
    center.require_daemon()?;

    let config = ToolConfig::center(dir)?;
    let wildcard = config.get_str("/wildcard");
    if entry.web_port.is_some() && wildcard.is_none() {
        warn!("no wildcard configured, {} will not be routed by the proxy", entry.slug);
    }

    let compose_file = ComposeFile::load_or_new(dir, COMPOSE_FILE)?;
    let mut app = AppBuildContext::new(CENTER_NAME, dir, compose_file);
    if entry.web_port.is_some() || options.frontend {
        app.set_frontend_network(NETWORK_FRONTEND_NAME);
    }
    app.set_backend_network(NETWORK_BACKEND_NAME);

    let resource_labels = labels(&[(LABEL_ENABLE, "true")]);

    if let Some(name) = &options.secret {
        if center.find_secret(name)?.is_none() {
            return Err(Error::unsupported(format!("secret {:?} does not exist", name)));
        }
        info!("using existing secret {:?}", name);
        app.compose_file_mut().add_secret(Secret::external(name.clone()));
    }

    match entry.secret_name(version, options) {
        Some(name) if options.secret.is_none() => {
            let secret = center.ensure_secret(&name, options.password.as_deref(), &resource_labels)?;
            if secret.created {
                info!("created root password secret {:?}", name);
            }
            app.compose_file_mut().add_secret(Secret::external(name));
        }
        Some(_) => (),
        None if options.password.is_some() => {
            warn!("{} has no root password, the given password is ignored", entry.slug);
        }
        None => (),
    }

    if let Some(volume) = entry.volume(version, options)? {
        if !volume.is_bind() {
            center.ensure_volume(&volume.source, &resource_labels)?;
            app.compose_file_mut().add_volume(Volume::external(volume.source));
        }
    }

    let service = entry.service(version, wildcard, options)?;
    info!("adding service {:?}", service.name);
    app.compose_file_mut().add_service(service);

    Ok(app)
}

/// A hostname: dot separated labels of letters, digits and inner hyphens.
fn validate_wildcard(wildcard: &str) -> Result<()> {
    let valid_label = |label: &str| {
        (1..=63).contains(&label.len())
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            && !label.starts_with('-')
            && !label.ends_with('-')
    };

    if wildcard.len() <= 253 && wildcard.split('.').all(valid_label) {
        Ok(())
    } else {
        Err(Error::format(format!("invalid wildcard domain {:?}", wildcard)))
    }
}
