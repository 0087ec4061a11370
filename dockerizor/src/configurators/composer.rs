use log::{info, warn};
use std::path::Path;

use crate::{
    builders::{build_app, slugify, DATA_SECRET_DIRECTORY},
    center::{
        generate_password, labels, or_absent, CenterManager, FREE_PORT_BASE, LABEL_ENABLE,
        LABEL_HOST, LABEL_SECRET_METHOD, LABEL_SECRET_NAME, LABEL_SWARM_SERVICE, LABEL_WILDCARD,
    },
    compose::{ComposeFile, ServiceVolume},
    config::ToolConfig,
    context::{
        AppBuildContext, DatabaseBuildContext, DockerRun, PhpBuildContext, WebBuildContext,
        DEFAULT_PHP_VERSION,
    },
    detect::{ComposerProject, Project, COMPOSER_FILE, PACKAGE_FILE, SOURCE_ROOT},
    dockerfile::Dockerfile,
    dotenv::DotenvFile,
    dsn::{DatabaseSystem, Dsn},
    error::{Error, Result},
    models::Container,
    os::OperatingSystem,
    prompt::Prompt,
};

use super::node;

pub const COMPOSE_FILE: &str = "docker-compose.yml";
const DATABASE_URL: &str = "DATABASE_URL";
const NO_DATABASE: &str = "none";
const DATABASE_CHOICES: &[&str] = &["mysql", "mariadb", "postgresql", "sqlite", NO_DATABASE];
const COMPOSER_INSTALL: &str = "composer install --ignore-platform-reqs -n";

/// Asks what is needed to containerize the project in `workdir` and
/// assembles its application, artifacts included. `None` when the user
/// cancels at the summary.
///
/// The daemon is only queried here: an unreachable daemon means no center to
/// join. The one daemon write is the database secret, created when the user
/// asks for a new database service.
pub fn dockerize(
    workdir: &Path,
    center: &CenterManager,
    prompt: &mut dyn Prompt,
) -> Result<Option<AppBuildContext>> {
    let project = Project::detect(workdir)?;
    if project.is_empty() {
        return Err(Error::unsupported(format!(
            "no {} or {} in {:?}",
            COMPOSER_FILE, PACKAGE_FILE, workdir
        )));
    }

    let mut config = ToolConfig::app(workdir)?;
    let loaded_dotenv = DotenvFile::load(workdir)?;
    let mut dotenv = loaded_dotenv.clone();

    let default_name = config
        .get_str("/app_name")
        .map(String::from)
        .unwrap_or_else(|| slugify(&directory_name(workdir)));
    let app_name = slugify(&prompt.ask("Application name", &default_name)?);
    if app_name.is_empty() {
        return Err(Error::format("the application name is empty"));
    }
    config.set("/app_name", app_name.as_str())?;

    let compose_file = ComposeFile::load_or_new(workdir, COMPOSE_FILE)?;
    let mut app = AppBuildContext::new(app_name.clone(), workdir, compose_file);

    let networks = or_absent(center.discover_networks());
    if let Some(network) = networks.frontend {
        app.set_frontend_network(network.name);
    }
    if let Some(network) = networks.backend {
        app.set_backend_network(network.name);
    }

    let framework = project.composer.as_ref().and_then(|composer| composer.framework);

    if let Some(composer) = &project.composer {
        let mut php = php_context(&app_name, composer, &config);

        let root_directory = match framework {
            Some(framework) => {
                info!("detected {} application", framework.name());
                framework.root_directory()
            }
            None => ask_root_directory(&config, prompt)?,
        };
        config.set("/root_directory", root_directory.as_str())?;
        php.root_directory = root_directory.clone();

        let database = configure_database(&mut app, &mut php, &mut config, &mut dotenv, center, prompt)?;
        let port = configure_access(&mut app, &mut config, center, prompt)?;
        choose_suggestions(&mut php, composer, &mut config, prompt)?;

        if !confirm_summary(&php, prompt)? {
            info!("dockerization canceled");
            return Ok(None);
        }

        app.add_build_context(php)
            .add_build_context(WebBuildContext::new(root_directory, port));
        if let Some(database) = database {
            app.add_build_context(database);
        }
    }

    if project.node {
        node::configure(&mut app, framework);
    }

    let services = build_app(&mut app);
    info!("built {} services for {:?}", services.len(), app_name);

    app.add_file(config.to_file()?);
    if dotenv != loaded_dotenv {
        app.add_file(dotenv.to_file());
    }

    let source = workdir.to_string_lossy().into_owned();
    let composer_install = app.php().map(|php| {
        DockerRun::new(php.image.clone(), COMPOSER_INSTALL)
            .with_volume(ServiceVolume::new(source, SOURCE_ROOT))
            .with_workdir(SOURCE_ROOT)
    });
    if let Some(run) = composer_install {
        app.add_run(run);
    }

    Ok(Some(app))
}

fn directory_name(workdir: &Path) -> String {
    workdir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "app".to_string())
}

/// The php tier on top of the Alpine fpm image, with the extensions
/// composer requires and the extra ones remembered in the configuration.
fn php_context(app_name: &str, composer: &ComposerProject, config: &ToolConfig) -> PhpBuildContext {
    let mut php = PhpBuildContext::new(composer.php_version.as_deref().unwrap_or(DEFAULT_PHP_VERSION));

    let extra_extensions = config.get_strings("/extra_extensions");
    for extension in composer.extensions.iter().chain(extra_extensions.iter()) {
        php.add_extension(extension);
    }

    let mut operating_system = OperatingSystem::alpine(format!("php:{}-fpm-alpine", php.minor_version()));
    operating_system.add_packages(config.get_strings("/extra_packages"));
    php.dockerfile = Some(Dockerfile::new(operating_system));
    php.image = format!("{}-php:latest", app_name);

    php
}

fn ask_root_directory(config: &ToolConfig, prompt: &mut dyn Prompt) -> Result<String> {
    let saved = config.get_str("/root_directory").unwrap_or(SOURCE_ROOT);
    let default = saved.trim_start_matches(SOURCE_ROOT).trim_start_matches('/');

    let answer = prompt.ask(&format!("Document root below {}", SOURCE_ROOT), default)?;
    let relative = answer.trim_matches('/');

    if relative.is_empty() {
        Ok(SOURCE_ROOT.to_string())
    } else {
        Ok(format!("{}/{}", SOURCE_ROOT, relative))
    }
}

/// Picks the database system, then joins a center database that exposes
/// its secret or creates a service of our own.
fn configure_database(
    app: &mut AppBuildContext,
    php: &mut PhpBuildContext,
    config: &mut ToolConfig,
    dotenv: &mut DotenvFile,
    center: &CenterManager,
    prompt: &mut dyn Prompt,
) -> Result<Option<DatabaseBuildContext>> {
    let choice = match config.get_str("/database_system") {
        Some(system) => system.to_string(),
        None => {
            let index = prompt.choose("Database system", DATABASE_CHOICES, detected_choice(dotenv))?;
            DATABASE_CHOICES
                .get(index)
                .ok_or_else(|| Error::unsupported(format!("no database choice {}", index)))?
                .to_string()
        }
    };
    config.set("/database_system", choice.as_str())?;

    if choice == NO_DATABASE {
        return Ok(None);
    }
    let system = DatabaseSystem::from_driver(&choice)?;

    let mut dsn = match config.get_str("/database_url") {
        Some(url) => Dsn::parse(url)?,
        None => Dsn::for_system(system, &app.app_name, ""),
    };
    if let Some(database) = config.get_str("/database_name") {
        dsn.database = database.to_string();
    }
    config.set("/database_name", dsn.database.as_str())?;

    php.configure_database(&dsn.driver)?;

    if system.is_embedded() {
        return Ok(Some(DatabaseBuildContext::new(system, dsn)));
    }

    let candidates = or_absent(center.find_containers(Some(system.image_name()), None, app.backend_network()));
    if let Some((secret, host)) = candidates.iter().find_map(center_database) {
        if prompt.confirm(&format!("Use the center database {}?", host), true)? {
            info!("joining center database {:?}", host);
            if or_absent(center.find_secret(secret)).is_none() {
                warn!("secret {:?} is not on the daemon, the database will not start", secret);
            }
            dsn.host = host.to_string();
            dsn.user = system.root_user().to_string();
            dsn.password = secret_password(secret);
            dotenv.set(DATABASE_URL, &dsn.to_string());
            remember_dsn(config, &dsn)?;

            return Ok(Some(
                DatabaseBuildContext::new(system, dsn)
                    .with_secret(secret)
                    .external(),
            ));
        }
    }

    let context = DatabaseBuildContext::new(system, dsn.clone());
    if !prompt.confirm(&format!("Create a {} service for the database?", context.image), true)? {
        return Ok(None);
    }

    dsn.host = format!("{}-{}", app.app_name, system.image_name());
    let secret = if center.is_available() {
        let name = format!("{}_{}_root_password", app.app_name, system.image_name());
        let secret = center.ensure_secret(&name, None, &labels(&[(LABEL_ENABLE, "true")]))?;
        dsn.password = secret_password(&secret.resource.name);
        Some(secret.resource.name)
    } else {
        warn!("docker daemon unavailable, the database password is stored in plaintext");
        dsn.password = generate_password();
        None
    };
    dotenv.set(DATABASE_URL, &dsn.to_string());
    remember_dsn(config, &dsn)?;

    let mut context = DatabaseBuildContext::new(system, dsn);
    context.secret = secret;
    Ok(Some(context))
}

/// Saved without the password, which lives in `.env` or in a secret.
fn remember_dsn(config: &mut ToolConfig, dsn: &Dsn) -> Result<()> {
    let saved = Dsn {
        password: String::new(),
        ..dsn.clone()
    };
    config.set("/database_url", saved.to_string())?;
    Ok(())
}

/// Index of the system already named by the `.env` connection string.
fn detected_choice(dotenv: &DotenvFile) -> usize {
    let none = DATABASE_CHOICES.len() - 1;

    let detected = dotenv
        .get(DATABASE_URL)
        .and_then(|url| Dsn::parse(&url).ok())
        .and_then(|dsn| DatabaseSystem::from_driver(dsn.system()).ok());

    match detected {
        Some(system) => DATABASE_CHOICES
            .iter()
            .position(|choice| DatabaseSystem::from_driver(choice).ok() == Some(system))
            .unwrap_or(none),
        None => none,
    }
}

/// Secret name and host of a database started by `center add-database`.
fn center_database(container: &Container) -> Option<(&str, &str)> {
    if container.label(LABEL_SECRET_METHOD) != Some("secret") {
        return None;
    }
    let secret = container.label(LABEL_SECRET_NAME)?;
    let host = container
        .label(LABEL_HOST)
        .or_else(|| container.label(LABEL_SWARM_SERVICE))?;

    Some((secret, host))
}

/// Read from the mounted secret when the application loads its `.env`.
fn secret_password(secret: &str) -> String {
    format!("$(cat '{}/{}')", DATA_SECRET_DIRECTORY, secret)
}

/// Routes through a proxy found on the frontend network, or publishes the
/// web tier on a host port. Returns that port.
fn configure_access(
    app: &mut AppBuildContext,
    config: &mut ToolConfig,
    center: &CenterManager,
    prompt: &mut dyn Prompt,
) -> Result<u16> {
    let proxy = match app.frontend_network() {
        Some(network) => or_absent(center.find_container(None, Some("traefik"), Some(network))),
        None => None,
    };

    if let Some(proxy) = proxy {
        if prompt.confirm(&format!("Route the application through {}?", proxy.name), true)? {
            let default = match config.get_str("/domain") {
                Some(domain) => domain.to_string(),
                None => format!(
                    "{}.{}",
                    app.app_name,
                    proxy.label(LABEL_WILDCARD).unwrap_or("localhost")
                ),
            };
            let domain = prompt.ask("Domain", &default)?;
            info!("routing {:?} through {:?}", domain, proxy.name);

            config.set("/domain", domain.as_str())?;
            app.domain = Some(domain);
            app.set_proxy(proxy);

            return Ok(WebBuildContext::default().port);
        }
    }

    let default = match config.get_port("/port") {
        Some(port) => port,
        None => center.free_port().unwrap_or_else(|err| {
            warn!("could not look up used ports: {}", err);
            FREE_PORT_BASE
        }),
    };

    let answer = prompt.ask("Web port", &default.to_string())?;
    let port = answer
        .parse::<u16>()
        .map_err(|_| Error::format(format!("invalid port {:?}", answer)))?;
    config.set("/port", port)?;

    Ok(port)
}

fn choose_suggestions(
    php: &mut PhpBuildContext,
    composer: &ComposerProject,
    config: &mut ToolConfig,
    prompt: &mut dyn Prompt,
) -> Result<()> {
    let mut extra_extensions = config.get_strings("/extra_extensions");

    for extension in composer.suggested_extensions.iter() {
        if php.has_extension(extension) {
            continue;
        }
        if prompt.confirm(&format!("Install the suggested extension {}?", extension), false)? {
            php.add_extension(extension);
            extra_extensions.push(extension.clone());
        }
    }

    config.set("/extra_extensions", extra_extensions)?;
    Ok(())
}

fn confirm_summary(php: &PhpBuildContext, prompt: &mut dyn Prompt) -> Result<bool> {
    let mut preview = php.clone();
    let packages = match preview.dockerfile.take() {
        Some(mut dockerfile) => dockerfile
            .operating_system
            .add_packages_for_php(&mut preview)
            .packages()
            .to_vec(),
        None => Vec::new(),
    };

    let summary = format!(
        "Install PHP {} with extensions [{}] and packages [{}]?",
        php.minor_version(),
        php.extensions().join(", "),
        packages.join(", ")
    );
    info!("{}", summary);

    prompt.confirm(&summary, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backends::memory::{container, labels_from, MemoryDaemon},
        center::{NETWORK_BACKEND_LABEL, NETWORK_BACKEND_NAME, NETWORK_FRONTEND_LABEL, NETWORK_FRONTEND_NAME},
        config::APP_CONFIG_FILE,
        context::GeneratedFile,
        controller::DryRun,
        dotenv::DOTENV_FILE,
        prompt::{ConsolePrompt, NonInteractive},
    };
    use std::{fs, io::Cursor, path::PathBuf};

    const SYMFONY: &str = r#"{
        "require": {
            "php": "^8.1",
            "ext-intl": "*",
            "symfony/framework-bundle": "6.2.*"
        }
    }"#;

    fn project(composer: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let workdir = dir.path().join("shop");
        fs::create_dir(&workdir).unwrap();
        fs::write(workdir.join(COMPOSER_FILE), composer).unwrap();
        (dir, workdir)
    }

    fn scripted(answers: &str) -> ConsolePrompt<Cursor<Vec<u8>>, Vec<u8>> {
        ConsolePrompt::new(Cursor::new(answers.as_bytes().to_vec()), Vec::new())
    }

    fn file<'a>(app: &'a AppBuildContext, path: &str) -> Option<&'a GeneratedFile> {
        app.files().iter().find(|file| file.path == Path::new(path))
    }

    #[test]
    fn standalone_symfony_application() {
        let (_dir, workdir) = project(SYMFONY);
        let daemon = MemoryDaemon::unreachable();
        let center = CenterManager::new(&daemon, DryRun::default());

        let app = dockerize(&workdir, &center, &mut NonInteractive).unwrap().unwrap();

        assert_eq!(app.app_name, "shop");
        assert_eq!(app.web().unwrap().port, FREE_PORT_BASE);
        assert_eq!(app.web().unwrap().root_directory, "/var/www/html/public");
        assert!(app.database().is_none());
        assert_eq!(
            app.compose_file().services().map(|service| service.name.as_str()).collect::<Vec<_>>(),
            ["php-fpm", "web"]
        );

        let php = app.php().unwrap();
        assert_eq!(php.image, "shop-php:latest");
        assert!(php.has_extension("intl"));

        let run = app.runs().last().unwrap().to_string();
        assert!(run.ends_with("-w /var/www/html -u 1000:1000 shop-php:latest composer install --ignore-platform-reqs -n"));

        let config = file(&app, APP_CONFIG_FILE).unwrap();
        assert!(config.contents.contains("\"port\": 8000"));
        assert!(config.contents.contains("\"database_system\": \"none\""));
        assert!(file(&app, DOTENV_FILE).is_none());
    }

    #[test]
    fn joins_the_center_proxy_and_database() {
        let (_dir, workdir) = project(SYMFONY);
        fs::write(workdir.join(APP_CONFIG_FILE), r#"{"database_system": "mariadb"}"#).unwrap();

        let mut traefik = container("center_traefik.1.x", "traefik:latest", &[NETWORK_FRONTEND_NAME], &[80]);
        traefik.labels = labels_from(&[(LABEL_WILDCARD, "apps.test")]);
        let mut mariadb = container("center_mariadb_10-5.1.y", "mariadb:10.5", &[NETWORK_BACKEND_NAME], &[]);
        mariadb.labels = labels_from(&[
            (LABEL_SECRET_METHOD, "secret"),
            (LABEL_SECRET_NAME, "mariadb_10-5_root_password"),
            (LABEL_HOST, "mariadb_10-5"),
        ]);
        let daemon = MemoryDaemon::default()
            .with_network(NETWORK_FRONTEND_NAME, &[(NETWORK_FRONTEND_LABEL, "true")])
            .with_network(NETWORK_BACKEND_NAME, &[(NETWORK_BACKEND_LABEL, "true")])
            .with_container(traefik)
            .with_container(mariadb);
        let center = CenterManager::new(&daemon, DryRun::default());

        let app = dockerize(&workdir, &center, &mut NonInteractive).unwrap().unwrap();

        assert_eq!(app.domain.as_deref(), Some("shop.apps.test"));
        assert!(app.proxy().is_some());

        let database = app.database().unwrap();
        assert!(database.external);
        assert_eq!(database.dsn.host, "mariadb_10-5");
        assert!(app.compose_file().secret("mariadb_10-5_root_password").unwrap().external);
        assert!(app.compose_file().services().all(|service| !service.name.starts_with("mariadb")));
        assert_eq!(app.compose_file().service("php-fpm").unwrap().secrets, ["mariadb_10-5_root_password"]);

        let dotenv = DotenvFile::parse(&file(&app, DOTENV_FILE).unwrap().contents);
        assert_eq!(
            dotenv.get(DATABASE_URL).as_deref(),
            Some("mysql://root:$(cat '/var/run/secrets/mariadb_10-5_root_password')@mariadb_10-5:3306/shop")
        );
        assert!(daemon.secrets.borrow().is_empty());
    }

    #[test]
    fn center_database_is_found_among_application_databases() {
        let (_dir, workdir) = project(SYMFONY);
        fs::write(workdir.join(APP_CONFIG_FILE), r#"{"database_system": "mariadb", "port": 8080}"#).unwrap();

        let blog = container("blog_mariadb_10-5_1", "mariadb:10.5", &[NETWORK_BACKEND_NAME], &[]);
        let mut center_mariadb = container("center_mariadb_10-5.1.y", "mariadb:10.5", &[NETWORK_BACKEND_NAME], &[]);
        center_mariadb.labels = labels_from(&[
            (LABEL_SECRET_METHOD, "secret"),
            (LABEL_SECRET_NAME, "mariadb_10-5_root_password"),
            (LABEL_HOST, "mariadb_10-5"),
        ]);
        let daemon = MemoryDaemon::default()
            .with_network(NETWORK_BACKEND_NAME, &[(NETWORK_BACKEND_LABEL, "true")])
            .with_container(blog)
            .with_container(center_mariadb);
        let center = CenterManager::new(&daemon, DryRun::default());

        let app = dockerize(&workdir, &center, &mut NonInteractive).unwrap().unwrap();

        let database = app.database().unwrap();
        assert!(database.external);
        assert_eq!(database.dsn.host, "mariadb_10-5");
        assert!(daemon.secrets.borrow().is_empty());
    }

    #[test]
    fn saved_connection_string_keeps_port_and_database() {
        let (_dir, workdir) = project(SYMFONY);
        fs::write(
            workdir.join(APP_CONFIG_FILE),
            r#"{"database_system": "postgresql", "database_url": "postgresql://postgres:@db.internal:6543/legacy"}"#,
        )
        .unwrap();
        let daemon = MemoryDaemon::unreachable();
        let center = CenterManager::new(&daemon, DryRun::default());

        let app = dockerize(&workdir, &center, &mut NonInteractive).unwrap().unwrap();

        let dotenv = DotenvFile::parse(&file(&app, DOTENV_FILE).unwrap().contents);
        let url = dotenv.get(DATABASE_URL).unwrap();
        assert!(url.starts_with("postgresql://postgres:"));
        assert!(url.ends_with("@shop-postgres:6543/legacy"));

        let config = file(&app, APP_CONFIG_FILE).unwrap();
        assert!(config.contents.contains("\"database_url\": \"postgresql://postgres:@shop-postgres:6543/legacy\""));
        assert!(config.contents.contains("\"database_name\": \"legacy\""));
    }

    #[test]
    fn creates_a_postgres_service_with_a_secret() {
        let (_dir, workdir) = project(r#"{"require": {"php": "~7.4"}}"#);
        let daemon = MemoryDaemon::default();
        let center = CenterManager::new(&daemon, DryRun::default());
        let mut prompt = scripted("\nweb\npostgresql\n\n8081\n\n");

        let app = dockerize(&workdir, &center, &mut prompt).unwrap().unwrap();

        assert_eq!(app.web().unwrap().root_directory, "/var/www/html/web");
        assert_eq!(app.web().unwrap().port, 8081);
        assert!(app.php().unwrap().has_extension("pdo_pgsql"));

        let service = app.compose_file().service("postgres_latest").unwrap();
        assert_eq!(service.secrets, ["shop_postgres_root_password"]);
        assert_eq!(daemon.secrets.borrow()[0].name, "shop_postgres_root_password");

        let config = file(&app, APP_CONFIG_FILE).unwrap();
        assert!(config.contents.contains("\"database_url\": \"postgresql://postgres:@shop-postgres:5432/shop\""));

        let dotenv = DotenvFile::parse(&file(&app, DOTENV_FILE).unwrap().contents);
        assert_eq!(
            dotenv.get(DATABASE_URL).as_deref(),
            Some("postgresql://postgres:$(cat '/var/run/secrets/shop_postgres_root_password')@shop-postgres:5432/shop")
        );
    }

    #[test]
    fn declining_the_summary_cancels() {
        let (_dir, workdir) = project(SYMFONY);
        fs::write(workdir.join(APP_CONFIG_FILE), r#"{"database_system": "none"}"#).unwrap();
        let daemon = MemoryDaemon::unreachable();
        let center = CenterManager::new(&daemon, DryRun::default());

        let app = dockerize(&workdir, &center, &mut scripted("\n\nn\n")).unwrap();

        assert!(app.is_none());
    }

    #[test]
    fn suggested_extensions_are_remembered() {
        let (_dir, workdir) = project(r#"{"require": {"laravel/framework": "^10"}, "suggest": {"ext-gd": "images"}}"#);
        fs::write(workdir.join(APP_CONFIG_FILE), r#"{"database_system": "none", "port": 8080}"#).unwrap();
        let daemon = MemoryDaemon::unreachable();
        let center = CenterManager::new(&daemon, DryRun::default());

        let app = dockerize(&workdir, &center, &mut scripted("\n\ny\n\n")).unwrap().unwrap();

        assert_eq!(app.php().unwrap().configures()["gd"], "--with-jpeg --with-freetype");
        let config = file(&app, APP_CONFIG_FILE).unwrap();
        assert!(config.contents.contains("\"extra_extensions\": [\n    \"gd\"\n  ]"));
    }

    #[test]
    fn empty_directory_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = MemoryDaemon::unreachable();
        let center = CenterManager::new(&daemon, DryRun::default());

        let err = dockerize(dir.path(), &center, &mut NonInteractive).unwrap_err();

        assert!(matches!(err, Error::Unsupported(_)));
    }
}
