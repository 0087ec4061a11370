use indexmap::IndexMap;
use log::info;
use serde::Deserialize;
use std::{fs, path::Path};

use crate::error::{Error, Result};

pub const COMPOSER_FILE: &str = "composer.json";
pub const PACKAGE_FILE: &str = "package.json";
pub const SOURCE_ROOT: &str = "/var/www/html";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Framework {
    Symfony,
    Laravel,
    CakePhp,
    Yii2,
    Drupal,
    Magento,
}

/// Framework, composer packages that identify it, public directory.
const FRAMEWORKS: &[(Framework, &[&str], &str)] = &[
    (Framework::Symfony, &["symfony/framework-bundle"], "public"),
    (Framework::Laravel, &["laravel/framework"], "public"),
    (Framework::CakePhp, &["cakephp/cakephp"], "webroot"),
    (Framework::Yii2, &["yiisoft/yii2"], "web"),
    (Framework::Drupal, &["drupal/core", "drupal/core-recommended"], "web"),
    (
        Framework::Magento,
        &["magento/product-community-edition", "magento/framework"],
        "pub",
    ),
];

impl Framework {
    pub fn name(self) -> &'static str {
        match self {
            Framework::Symfony => "symfony",
            Framework::Laravel => "laravel",
            Framework::CakePhp => "cakephp",
            Framework::Yii2 => "yii2",
            Framework::Drupal => "drupal",
            Framework::Magento => "magento",
        }
    }

    pub fn public_directory(self) -> &'static str {
        FRAMEWORKS
            .iter()
            .find(|(framework, _, _)| *framework == self)
            .map(|(_, _, directory)| *directory)
            .unwrap_or("public")
    }

    /// Document root inside the php and web containers.
    pub fn root_directory(self) -> String {
        format!("{}/{}", SOURCE_ROOT, self.public_directory())
    }

    /// Install, build and watch commands of the asset pipeline, for
    /// frameworks that ship one.
    pub fn node_commands(self) -> Option<NodeCommands> {
        match self {
            Framework::Symfony => Some(NodeCommands {
                install: "yarn install",
                build: "yarn build",
                watch: "yarn watch",
            }),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NodeCommands {
    pub install: &'static str,
    pub build: &'static str,
    pub watch: &'static str,
}

#[derive(Debug, Default, Deserialize)]
struct ComposerJson {
    #[serde(default)]
    require: IndexMap<String, String>,
    #[serde(default)]
    suggest: IndexMap<String, String>,
}

/// Platform requirements of a composer project.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ComposerProject {
    /// `8.1` for a `^8.1` constraint.
    pub php_version: Option<String>,
    /// Required extensions without the `ext-` prefix.
    pub extensions: Vec<String>,
    /// Extensions listed under `suggest`, offered but not required.
    pub suggested_extensions: Vec<String>,
    pub framework: Option<Framework>,
}

impl ComposerProject {
    pub fn parse(text: &str) -> Result<ComposerProject> {
        let composer: ComposerJson = serde_json::from_str(text)
            .map_err(|err| Error::format(format!("{}: {}", COMPOSER_FILE, err)))?;

        let php_version = composer
            .require
            .get("php")
            .and_then(|constraint| version_from_constraint(constraint));

        let extensions = extension_names(&composer.require);
        let suggested_extensions = extension_names(&composer.suggest);

        let framework = FRAMEWORKS
            .iter()
            .find(|(_, packages, _)| packages.iter().any(|package| composer.require.contains_key(*package)))
            .map(|(framework, _, _)| *framework);

        Ok(ComposerProject {
            php_version,
            extensions,
            suggested_extensions,
            framework,
        })
    }
}

/// What lives in a working directory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Project {
    pub composer: Option<ComposerProject>,
    pub node: bool,
}

impl Project {
    pub fn detect(workdir: &Path) -> Result<Project> {
        let composer_path = workdir.join(COMPOSER_FILE);
        let composer = if composer_path.exists() {
            let project = ComposerProject::parse(&fs::read_to_string(&composer_path)?)?;
            info!(
                "found composer project php={:?} framework={:?}",
                project.php_version, project.framework
            );
            Some(project)
        } else {
            None
        };

        let node = workdir.join(PACKAGE_FILE).exists();
        if node {
            info!("found node project");
        }

        Ok(Project { composer, node })
    }

    pub fn is_empty(&self) -> bool {
        self.composer.is_none() && !self.node
    }
}

fn extension_names(packages: &IndexMap<String, String>) -> Vec<String> {
    packages
        .keys()
        .filter_map(|name| name.strip_prefix("ext-"))
        .map(str::to_lowercase)
        .collect()
}

/// First dotted number of a composer constraint, cut to `major.minor`.
fn version_from_constraint(constraint: &str) -> Option<String> {
    let start = constraint.find(|c: char| c.is_ascii_digit())?;
    let version = constraint[start..]
        .split(|c: char| !(c.is_ascii_digit() || c == '.'))
        .next()?
        .trim_end_matches('.');

    let minor = version.split('.').take(2).collect::<Vec<_>>().join(".");
    if minor.contains('.') {
        Some(minor)
    } else {
        Some(format!("{}.0", minor))
    }
}
