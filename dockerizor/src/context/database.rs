use indexmap::IndexMap;

use crate::dsn::{DatabaseSystem, Dsn};

/// A database service described by the application's connection string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseBuildContext {
    pub system: DatabaseSystem,
    pub dsn: Dsn,
    /// Image including the tag.
    pub image: String,
    /// Name of a docker secret holding the root password.
    pub secret: Option<String>,
    /// Extra environment passed to the service.
    pub environment: IndexMap<String, String>,
    /// Served by a center container; the application only connects to it.
    pub external: bool,
}

impl DatabaseBuildContext {
    pub fn new(system: DatabaseSystem, dsn: Dsn) -> DatabaseBuildContext {
        let version = dsn.server_version_number().unwrap_or("latest").to_string();

        DatabaseBuildContext {
            image: format!("{}:{}", system.image(), version),
            system,
            dsn,
            secret: None,
            environment: IndexMap::new(),
            external: false,
        }
    }

    pub fn with_secret<S: Into<String>>(mut self, secret: S) -> DatabaseBuildContext {
        self.secret = Some(secret.into());
        self
    }

    pub fn external(mut self) -> DatabaseBuildContext {
        self.external = true;
        self
    }

    /// Tag part of the image.
    pub fn version(&self) -> &str {
        self.image.rsplit_once(':').map(|(_, tag)| tag).unwrap_or("latest")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_follows_the_server_version() {
        let dsn = Dsn::parse("mysql://root:pw@db/app?serverVersion=mariadb-10.5.8").unwrap();
        let context = DatabaseBuildContext::new(DatabaseSystem::MariaDb, dsn);

        assert_eq!(context.image, "mariadb:10.5.8");
        assert_eq!(context.version(), "10.5.8");
    }

    #[test]
    fn missing_server_version_uses_latest() {
        let dsn = Dsn::parse("sqlsrv://sa:pw@db/app").unwrap();
        let context = DatabaseBuildContext::new(DatabaseSystem::SqlServer, dsn);

        assert_eq!(context.image, "mcr.microsoft.com/mssql/server:latest");
        assert_eq!(context.version(), "latest");
    }
}
