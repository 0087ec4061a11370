use std::path::PathBuf;

use crate::dockerfile::Dockerfile;

mod app;
mod database;
mod node;
mod php;
mod run;
mod web;

pub use app::AppBuildContext;
pub use database::DatabaseBuildContext;
pub use node::{NodeBuildContext, DEFAULT_NODE_VERSION};
pub use php::{PhpBuildContext, DEFAULT_PHP_VERSION};
pub use run::DockerRun;
pub use web::WebBuildContext;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BuildContextKind {
    Php,
    Web,
    Database,
    Node,
    Generic,
}

/// An image built from a hand assembled Dockerfile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenericBuildContext {
    pub image: String,
    pub dockerfile: Option<Dockerfile>,
}

/// Configuration of one service tier of an application.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildContext {
    Php(PhpBuildContext),
    Web(WebBuildContext),
    Database(DatabaseBuildContext),
    Node(NodeBuildContext),
    Generic(GenericBuildContext),
}

impl BuildContext {
    pub fn kind(&self) -> BuildContextKind {
        match self {
            BuildContext::Php(_) => BuildContextKind::Php,
            BuildContext::Web(_) => BuildContextKind::Web,
            BuildContext::Database(_) => BuildContextKind::Database,
            BuildContext::Node(_) => BuildContextKind::Node,
            BuildContext::Generic(_) => BuildContextKind::Generic,
        }
    }

    pub fn dockerfile(&self) -> Option<&Dockerfile> {
        match self {
            BuildContext::Php(context) => context.dockerfile.as_ref(),
            BuildContext::Generic(context) => context.dockerfile.as_ref(),
            _ => None,
        }
    }

    pub fn dockerfile_mut(&mut self) -> Option<&mut Dockerfile> {
        match self {
            BuildContext::Php(context) => context.dockerfile.as_mut(),
            BuildContext::Generic(context) => context.dockerfile.as_mut(),
            _ => None,
        }
    }

    /// The image the context runs, which is also the tag of its build.
    pub fn image(&self) -> Option<&str> {
        match self {
            BuildContext::Php(context) => Some(&context.image),
            BuildContext::Database(context) => Some(&context.image),
            BuildContext::Node(context) => Some(&context.image),
            BuildContext::Generic(context) => Some(&context.image),
            BuildContext::Web(_) => None,
        }
    }
}

impl From<PhpBuildContext> for BuildContext {
    fn from(context: PhpBuildContext) -> Self {
        BuildContext::Php(context)
    }
}

impl From<WebBuildContext> for BuildContext {
    fn from(context: WebBuildContext) -> Self {
        BuildContext::Web(context)
    }
}

impl From<DatabaseBuildContext> for BuildContext {
    fn from(context: DatabaseBuildContext) -> Self {
        BuildContext::Database(context)
    }
}

impl From<NodeBuildContext> for BuildContext {
    fn from(context: NodeBuildContext) -> Self {
        BuildContext::Node(context)
    }
}

impl From<GenericBuildContext> for BuildContext {
    fn from(context: GenericBuildContext) -> Self {
        BuildContext::Generic(context)
    }
}

/// A support file written next to the application, path relative to the
/// working directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub contents: String,
}

impl GeneratedFile {
    pub fn new<P: Into<PathBuf>, S: Into<String>>(path: P, contents: S) -> GeneratedFile {
        GeneratedFile {
            path: path.into(),
            contents: contents.into(),
        }
    }
}
