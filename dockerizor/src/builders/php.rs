use std::path::Path;

use crate::{
    center::LABEL_ENABLE,
    compose::{Build, Secret, Service, ServiceVolume},
    context::{AppBuildContext, GeneratedFile, PhpBuildContext},
    dockerfile::Dockerfile,
    os::OperatingSystem,
};

pub const SERVICE_NAME: &str = "php-fpm";
const SOURCE_DIRECTORY: &str = "/var/www/html";
const PHP_INI: &str = "docker/php/php.ini";
const PHP_INI_TARGET: &str = "/usr/local/etc/php/conf.d/dockerizor.ini";

/// Gives the context an Alpine Dockerfile on top of the official fpm image
/// and collects the OS packages its extensions need.
pub fn prepare(app: &AppBuildContext, context: &mut PhpBuildContext) {
    let mut dockerfile = match context.dockerfile.take() {
        Some(dockerfile) => dockerfile,
        None => {
            let base = format!("php:{}-fpm-alpine", context.minor_version());
            context.image = format!("{}-php:latest", app.app_name);
            Dockerfile::new(OperatingSystem::alpine(base))
        }
    };

    dockerfile
        .operating_system
        .add_package("shadow")
        .add_packages_for_php(context);

    context.dockerfile = Some(dockerfile);
}

pub fn build(app: &mut AppBuildContext, context: &mut PhpBuildContext) -> Service {
    let alias = format!("{}-php", app.app_name);

    if let Some(mut dockerfile) = context.dockerfile.take() {
        dockerfile
            .add_run("usermod -u 1000 www-data")
            .add_run("groupmod -g 1000 www-data");

        for (extension, flags) in context.configures() {
            dockerfile.add_run(format!("docker-php-ext-configure {} {}", extension, flags));
        }

        let extensions = context.installable_extensions();
        if !extensions.is_empty() {
            dockerfile.add_run(format!("docker-php-ext-install {}", extensions.join(" ")));
        }

        let pecl = context.pecl_extensions();
        if !pecl.is_empty() {
            dockerfile
                .add_run(format!("pecl install {}", pecl.join(" ")))
                .add_run(format!("docker-php-ext-enable {}", pecl.join(" ")));
        }

        dockerfile.add_copy("--from=composer:latest /usr/bin/composer", "/usr/local/bin/composer");
        context.dockerfile = Some(dockerfile);
    }

    let mut service = Service::new(SERVICE_NAME).with_image(context.image.clone());
    service.build = Some(Build::context(build_directory(context)));
    service
        .add_label(LABEL_ENABLE, "true")
        .add_volume(ServiceVolume::new(".", SOURCE_DIRECTORY))
        .add_volume(ServiceVolume::new(format!("./{}", PHP_INI), PHP_INI_TARGET));

    if app.proxy().is_some() {
        if let Some(network) = app.frontend_network() {
            service.add_network(network, Some(&alias));
        }
    } else {
        service.add_network("default", Some(&alias));
    }
    if let Some(network) = app.backend_network() {
        service.add_network(network, Some(&alias));
    }

    if let Some(secret) = app.database().and_then(|database| database.secret.clone()) {
        service.add_secret(secret.clone());
        app.compose_file_mut().add_secret(Secret::external(secret));
    }

    // An existing php.ini holds the user's settings.
    if !app.workdir().join(PHP_INI).exists() {
        app.add_file(GeneratedFile::new(PHP_INI, ""));
    }
    app.compose_file_mut().add_service(service.clone());

    service
}

fn build_directory(context: &PhpBuildContext) -> String {
    context
        .dockerfile
        .as_ref()
        .and_then(|dockerfile| dockerfile.path.as_deref())
        .and_then(Path::parent)
        .map(|directory| directory.to_string_lossy().into_owned())
        .unwrap_or_else(|| "docker/php".to_string())
}
