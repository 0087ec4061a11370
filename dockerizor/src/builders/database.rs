use indexmap::IndexMap;

use crate::{
    center::LABEL_ENABLE,
    compose::{Secret, Service, ServiceVolume, Volume},
    context::{AppBuildContext, DatabaseBuildContext},
    dsn::{DatabaseSystem, Dsn},
};

use super::slugify;

/// Where swarm mounts the secrets of a service.
pub const DATA_SECRET_DIRECTORY: &str = "/var/run/secrets";

/// A database service with a named data volume, reachable on the backend
/// network as `{app}-{image}`. Embedded and external databases get no
/// service, only the secret the application reads.
pub fn build(app: &mut AppBuildContext, context: &mut DatabaseBuildContext) -> Option<Service> {
    if context.system.is_embedded() {
        return None;
    }
    if context.external {
        if let Some(secret) = &context.secret {
            app.compose_file_mut().add_secret(Secret::external(secret.clone()));
        }
        return None;
    }

    let image_name = context.system.image_name();
    let name = format!("{}_{}", image_name, slugify(context.version()));
    let volume = format!("{}_{}", app.app_name, image_name);
    let alias = format!("{}-{}", app.app_name, image_name);

    let mut service = Service::new(name).with_image(context.image.clone());
    service
        .add_label(LABEL_ENABLE, "true")
        .add_volume(ServiceVolume::new(volume.clone(), context.system.data_directory()));

    let environment = environment_for(context.system, &context.dsn, context.secret.as_deref());
    for (key, value) in environment.into_iter().chain(context.environment.clone()) {
        service.add_environment(key, value);
    }

    if let Some(secret) = &context.secret {
        service.add_secret(secret.clone());
        app.compose_file_mut().add_secret(Secret::external(secret.clone()));
    }

    let network = app.backend_network().unwrap_or("default").to_string();
    service.add_network(network, Some(&alias));

    app.compose_file_mut()
        .add_volume(Volume::new(volume))
        .add_service(service.clone());

    Some(service)
}

/// The image's initialization variables for the descriptor's credentials.
/// With a secret the password variables point at the mounted file instead
/// of carrying the plaintext.
pub fn environment_for(system: DatabaseSystem, dsn: &Dsn, secret: Option<&str>) -> IndexMap<String, String> {
    let mut environment = IndexMap::new();
    let password = if dsn.password.is_empty() { "root" } else { dsn.password.as_str() };

    let set_password = |environment: &mut IndexMap<String, String>, key: &str| match secret {
        Some(secret) => {
            environment.insert(
                format!("{}_FILE", key),
                format!("{}/{}", DATA_SECRET_DIRECTORY, secret),
            );
        }
        None => {
            environment.insert(key.to_string(), password.to_string());
        }
    };

    match system {
        DatabaseSystem::MySql | DatabaseSystem::MariaDb => {
            let prefix = if system == DatabaseSystem::MySql { "MYSQL" } else { "MARIADB" };

            set_password(&mut environment, &format!("{}_ROOT_PASSWORD", prefix));
            if dsn.user != system.root_user() && !dsn.user.is_empty() {
                environment.insert(format!("{}_USER", prefix), dsn.user.clone());
                set_password(&mut environment, &format!("{}_PASSWORD", prefix));
            }
            if !dsn.database.is_empty() {
                environment.insert(format!("{}_DATABASE", prefix), dsn.database.clone());
            }
        }
        DatabaseSystem::Postgres => {
            if dsn.user != system.root_user() && !dsn.user.is_empty() {
                environment.insert("POSTGRES_USER".to_string(), dsn.user.clone());
            }
            set_password(&mut environment, "POSTGRES_PASSWORD");
            if !dsn.database.is_empty() {
                environment.insert("POSTGRES_DB".to_string(), dsn.database.clone());
            }
        }
        DatabaseSystem::Mongo => {
            environment.insert("MONGO_INITDB_ROOT_USERNAME".to_string(), dsn.user.clone());
            set_password(&mut environment, "MONGO_INITDB_ROOT_PASSWORD");
        }
        DatabaseSystem::SqlServer => {
            environment.insert("ACCEPT_EULA".to_string(), "Y".to_string());
            set_password(&mut environment, "SA_PASSWORD");
        }
        DatabaseSystem::Sqlite => (),
    }

    environment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::ComposeFile;

    fn dsn(uri: &str) -> Dsn {
        Dsn::parse(uri).unwrap()
    }

    #[test]
    fn plaintext_without_secret() {
        let environment = environment_for(
            DatabaseSystem::MySql,
            &dsn("mysql://shop:s3cret@db:3306/shop"),
            None,
        );

        assert_eq!(environment["MYSQL_ROOT_PASSWORD"], "s3cret");
        assert_eq!(environment["MYSQL_USER"], "shop");
        assert_eq!(environment["MYSQL_PASSWORD"], "s3cret");
        assert_eq!(environment["MYSQL_DATABASE"], "shop");
    }

    #[test]
    fn secret_uses_file_variables() {
        let environment = environment_for(
            DatabaseSystem::Postgres,
            &dsn("pgsql://postgres:ignored@db/shop"),
            Some("postgres_root_password"),
        );

        assert!(!environment.contains_key("POSTGRES_PASSWORD"));
        assert!(!environment.contains_key("POSTGRES_USER"));
        assert_eq!(
            environment["POSTGRES_PASSWORD_FILE"],
            "/var/run/secrets/postgres_root_password"
        );
    }

    #[test]
    fn missing_password_defaults_to_root() {
        let environment = environment_for(DatabaseSystem::SqlServer, &dsn("sqlsrv://sa@db/shop"), None);

        assert_eq!(environment["ACCEPT_EULA"], "Y");
        assert_eq!(environment["SA_PASSWORD"], "root");
    }

    #[test]
    fn service_gets_volume_and_backend_alias() {
        let mut app = AppBuildContext::new("shop", "/srv/shop", ComposeFile::new());
        app.set_backend_network("dockerizor-backend");
        let mut context = DatabaseBuildContext::new(
            DatabaseSystem::MySql,
            dsn("mysql://root:pw@shop-mysql/shop?serverVersion=8.0"),
        );
        context.environment.insert("TZ".into(), "UTC".into());

        let service = build(&mut app, &mut context).unwrap();

        assert_eq!(service.name, "mysql_8-0");
        assert_eq!(service.image.as_deref(), Some("mysql:8.0"));
        assert_eq!(service.volumes, [ServiceVolume::new("shop_mysql", "/var/lib/mysql")]);
        assert_eq!(service.networks["dockerizor-backend"].aliases, ["shop-mysql"]);
        assert_eq!(service.environment["TZ"], "UTC");
        assert!(app.compose_file().volume("shop_mysql").is_some());
        assert!(app.compose_file().service("mysql_8-0").is_some());
    }

    #[test]
    fn center_database_only_declares_the_secret() {
        let mut app = AppBuildContext::new("shop", "/srv/shop", ComposeFile::new());
        let mut context = DatabaseBuildContext::new(
            DatabaseSystem::MariaDb,
            dsn("mysql://root:pw@mariadb_10-5/shop?serverVersion=mariadb-10.5"),
        )
        .with_secret("mariadb_10-5_root_password")
        .external();

        assert!(build(&mut app, &mut context).is_none());
        assert!(app.compose_file().secret("mariadb_10-5_root_password").unwrap().external);
        assert_eq!(app.compose_file().services().count(), 0);
    }
}
