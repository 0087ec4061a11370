use std::collections::BTreeSet as Set;

use crate::context::PhpBuildContext;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OsFamily {
    Alpine,
}

/// Build tools the official images name for compiling PECL extensions.
const PHPIZE_DEPS: &str = "$PHPIZE_DEPS";

const ALPINE_EXTENSION_PACKAGES: &[(&str, &[&str])] = &[
    ("apcu", &[PHPIZE_DEPS]),
    ("curl", &["curl-dev"]),
    ("dba", &["enchant2-dev"]),
    ("gd", &["libpng-dev", "libjpeg-turbo-dev", "freetype-dev"]),
    ("gettext", &["gettext-dev"]),
    ("gmp", &["gmp-dev"]),
    ("iconv", &["gnu-libiconv-dev"]),
    ("imap", &["krb5-dev", "imap-dev"]),
    ("intl", &["icu-dev"]),
    ("ldap", &["ldb-dev", "openldap-dev", "libldap"]),
    ("libxml", &["libxml2-dev"]),
    ("mbstring", &["oniguruma-dev"]),
    ("odbc", &["unixodbc-dev"]),
    ("pdo_dblib", &["freetds-dev"]),
    ("pdo_odbc", &["unixodbc-dev"]),
    ("pdo_pgsql", &["postgresql-dev"]),
    ("pdo_sqlsrv", &[PHPIZE_DEPS, "unixodbc-dev"]),
    ("pgsql", &["postgresql-dev"]),
    ("phar", &["openssl-dev"]),
    ("pspell", &["aspell-dev"]),
    ("redis", &[PHPIZE_DEPS]),
    ("simplexml", &["libxml2-dev"]),
    ("snmp", &["net-snmp-dev"]),
    ("sqlsrv", &[PHPIZE_DEPS, "unixodbc-dev"]),
    ("tidy", &["tidyhtml-dev"]),
    ("xsl", &["libxslt-dev"]),
    ("zip", &["libzip-dev"]),
];

const ALPINE_EXTENSION_CONFIGURE: &[(&str, &str)] = &[
    ("gd", "--with-jpeg --with-freetype"),
    ("imap", "--with-kerberos --with-imap-ssl"),
    ("odbc", "--with-unixODBC=shared,/usr"),
    ("pdo_odbc", "--with-pdo-odbc=unixODBC,/usr"),
    ("pgsql", "--with-pgsql=/usr/local/pgsql"),
];

impl OsFamily {
    pub fn extension_packages(self, extension: &str) -> &'static [&'static str] {
        let table = match self {
            OsFamily::Alpine => ALPINE_EXTENSION_PACKAGES,
        };

        table
            .iter()
            .find(|(name, _)| *name == extension)
            .map(|(_, packages)| *packages)
            .unwrap_or(&[])
    }

    pub fn extension_configure(self, extension: &str) -> Option<&'static str> {
        let table = match self {
            OsFamily::Alpine => ALPINE_EXTENSION_CONFIGURE,
        };

        table
            .iter()
            .find(|(name, _)| *name == extension)
            .map(|(_, flags)| *flags)
    }

    /// Every OS package the given extensions need. Extensions without an
    /// entry contribute nothing.
    pub fn packages_for<'a, I>(self, extensions: I) -> Set<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        extensions
            .into_iter()
            .flat_map(|extension| self.extension_packages(extension).iter())
            .map(|package| package.to_string())
            .collect()
    }

    pub fn update_command(self) -> String {
        match self {
            OsFamily::Alpine => "apk update".to_string(),
        }
    }

    pub fn install_command<S: AsRef<str>>(self, packages: &[S]) -> String {
        let packages = packages
            .iter()
            .map(|package| package.as_ref())
            .collect::<Vec<_>>()
            .join(" ");

        match self {
            OsFamily::Alpine => format!("apk add --no-cache {}", packages),
        }
    }
}

/// The base image of a Dockerfile and the OS packages to install on it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatingSystem {
    pub family: OsFamily,
    pub image: String,
    packages: Vec<String>,
}

impl OperatingSystem {
    pub fn new<S: Into<String>>(family: OsFamily, image: S) -> OperatingSystem {
        OperatingSystem {
            family,
            image: image.into(),
            packages: Vec::new(),
        }
    }

    pub fn alpine<S: Into<String>>(image: S) -> OperatingSystem {
        OperatingSystem::new(OsFamily::Alpine, image)
    }

    /// Image without its tag, `php` for `php:8.1-fpm-alpine`.
    pub fn image_name(&self) -> &str {
        self.image.split(':').next().unwrap_or(&self.image)
    }

    pub fn packages(&self) -> &[String] {
        &self.packages
    }

    /// Adds a package once; later duplicates are ignored.
    pub fn add_package<S: Into<String>>(&mut self, package: S) -> &mut Self {
        let package = package.into();
        if !self.packages.contains(&package) {
            self.packages.push(package);
        }
        self
    }

    pub fn add_packages<I, S>(&mut self, packages: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for package in packages {
            self.add_package(package);
        }
        self
    }

    /// Pulls in the packages for the context's compiled extensions and
    /// records their configure flags on the context.
    pub fn add_packages_for_php(&mut self, context: &mut PhpBuildContext) -> &mut Self {
        let extensions = context
            .installable_extensions()
            .into_iter()
            .chain(context.pecl_extensions())
            .map(String::from)
            .collect::<Vec<_>>();

        for extension in extensions.iter() {
            self.add_packages(self.family.extension_packages(extension).iter().copied());

            if let Some(flags) = self.family.extension_configure(extension) {
                context.add_configure(extension, flags);
            }
        }

        self
    }

    pub fn update_command(&self) -> String {
        self.family.update_command()
    }

    pub fn install_command(&self) -> String {
        self.family.install_command(&self.packages)
    }
}
