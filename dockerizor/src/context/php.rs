use indexmap::IndexMap;

use crate::{
    dockerfile::Dockerfile,
    dsn::DatabaseSystem,
    error::{Error, Result},
};

pub const DEFAULT_PHP_VERSION: &str = "7.4";

/// Extensions `docker-php-ext-install` knows how to build.
const AVAILABLE_EXTENSIONS: &[&str] = &[
    "bcmath", "bz2", "calendar", "ctype", "curl", "dba", "dom", "enchant", "exif",
    "fileinfo", "filter", "ftp", "gd", "gettext", "gmp", "hash", "iconv", "imap",
    "interbase", "intl", "json", "ldap", "mbstring", "mcrypt", "mysqli", "oci8", "odbc",
    "opcache", "pcntl", "pdo", "pdo_dblib", "pdo_firebird", "pdo_mysql", "pdo_oci",
    "pdo_odbc", "pdo_pgsql", "pdo_sqlite", "pgsql", "phar", "posix", "pspell",
    "readline", "recode", "reflection", "session", "shmop", "simplexml", "snmp", "soap",
    "sockets", "spl", "standard", "sysvmsg", "sysvsem", "sysvshm", "tidy", "tokenizer",
    "wddx", "xml", "xmlreader", "xmlrpc", "xmlwriter", "xsl", "zip",
];

/// Extensions built from PECL, then enabled.
const PECL_EXTENSIONS: &[&str] = &["apcu", "pdo_sqlsrv", "redis", "sqlsrv"];

/// Extensions compiled into the official php images.
const BUNDLED_EXTENSIONS: &[&str] = &[
    "ctype", "curl", "date", "dom", "fileinfo", "filter", "ftp", "hash", "iconv", "json",
    "libxml", "mbstring", "mysqlnd", "openssl", "pcre", "pdo", "pdo_sqlite", "phar",
    "posix", "readline", "reflection", "session", "simplexml", "sodium", "spl", "sqlite3",
    "standard", "tokenizer", "xml", "xmlreader", "xmlwriter", "zlib",
];

/// The php-fpm runtime tier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhpBuildContext {
    pub version: String,
    /// Tag of the image built from `dockerfile`.
    pub image: String,
    pub root_directory: String,
    pub dockerfile: Option<Dockerfile>,
    extensions: Vec<String>,
    configures: IndexMap<String, String>,
}

impl Default for PhpBuildContext {
    fn default() -> Self {
        PhpBuildContext::new(DEFAULT_PHP_VERSION)
    }
}

impl PhpBuildContext {
    pub fn new<S: Into<String>>(version: S) -> PhpBuildContext {
        let mut context = PhpBuildContext {
            version: version.into(),
            image: String::new(),
            root_directory: "/var/www/html".to_string(),
            dockerfile: None,
            extensions: Vec::new(),
            configures: IndexMap::new(),
        };
        context.image = format!("php:{}-fpm", context.minor_version());
        context
    }

    /// `8.1` for `8.1.12`.
    pub fn minor_version(&self) -> String {
        self.version.split('.').take(2).collect::<Vec<_>>().join(".")
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Accepts both `intl` and composer's `ext-intl`.
    pub fn add_extension(&mut self, extension: &str) -> &mut Self {
        let extension = extension.trim_start_matches("ext-").to_lowercase();
        if !extension.is_empty() && !self.extensions.contains(&extension) {
            self.extensions.push(extension);
        }
        self
    }

    pub fn has_extension(&self, extension: &str) -> bool {
        self.extensions.iter().any(|known| known == extension)
    }

    /// Extensions that have to be compiled into the image.
    pub fn installable_extensions(&self) -> Vec<&str> {
        self.extensions
            .iter()
            .map(String::as_str)
            .filter(|extension| AVAILABLE_EXTENSIONS.contains(extension))
            .filter(|extension| !BUNDLED_EXTENSIONS.contains(extension))
            .collect()
    }

    /// Extensions that `docker-php-ext-install` cannot build and come from PECL.
    pub fn pecl_extensions(&self) -> Vec<&str> {
        self.extensions
            .iter()
            .map(String::as_str)
            .filter(|extension| PECL_EXTENSIONS.contains(extension))
            .collect()
    }

    pub fn configures(&self) -> &IndexMap<String, String> {
        &self.configures
    }

    /// Records configure flags for an extension; the first call wins.
    pub fn add_configure(&mut self, extension: &str, flags: &str) -> &mut Self {
        self.configures
            .entry(extension.to_string())
            .or_insert_with(|| flags.to_string());
        self
    }

    /// Adds the extensions a database driver needs.
    pub fn configure_database(&mut self, driver: &str) -> Result<&mut Self> {
        match driver {
            "mysqli" => {
                self.add_extension("mysqli");
            }
            "sqlsrv" => {
                self.add_extension("sqlsrv");
            }
            driver => match DatabaseSystem::from_driver(driver)? {
                DatabaseSystem::MariaDb | DatabaseSystem::MySql => {
                    self.add_extension("pdo_mysql");
                }
                DatabaseSystem::Postgres => {
                    self.add_configure("pgsql", "--with-pgsql=/usr/local/pgsql")
                        .add_extension("pdo")
                        .add_extension("pgsql")
                        .add_extension("pdo_pgsql");
                }
                DatabaseSystem::Sqlite => {
                    self.add_extension("pdo_sqlite");
                }
                DatabaseSystem::SqlServer => {
                    self.add_extension("pdo_sqlsrv");
                }
                DatabaseSystem::Mongo => {
                    return Err(Error::unsupported(format!(
                        "php driver for {:?} is not bundled with docker-php-ext-install",
                        driver
                    )))
                }
            },
        }

        Ok(self)
    }
}
