use std::path::{Path, PathBuf};

use crate::{
    compose::{ComposeFile, Network},
    error::Result,
    models::Container,
};

use super::{
    BuildContext, BuildContextKind, DatabaseBuildContext, DockerRun, GeneratedFile,
    NodeBuildContext, PhpBuildContext, WebBuildContext,
};

/// Everything generated for one application.
///
/// Owns the single compose file every builder writes into, the per-tier
/// build contexts, and the support files and commands the orchestrator
/// materializes afterwards. Lookup by kind returns the first registered
/// context of that kind.
#[derive(Clone, Debug)]
pub struct AppBuildContext {
    pub app_name: String,
    pub workdir: PathBuf,
    /// Virtual host routed by the proxy, `shop.example.test`.
    pub domain: Option<String>,
    compose_file: ComposeFile,
    proxy: Option<Container>,
    frontend_network: Option<String>,
    backend_network: Option<String>,
    build_contexts: Vec<BuildContext>,
    files: Vec<GeneratedFile>,
    runs: Vec<DockerRun>,
}

impl AppBuildContext {
    pub fn new<S, P>(app_name: S, workdir: P, compose_file: ComposeFile) -> AppBuildContext
    where
        S: Into<String>,
        P: Into<PathBuf>,
    {
        AppBuildContext {
            app_name: app_name.into(),
            workdir: workdir.into(),
            domain: None,
            compose_file,
            proxy: None,
            frontend_network: None,
            backend_network: None,
            build_contexts: Vec::new(),
            files: Vec::new(),
            runs: Vec::new(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn compose_file(&self) -> &ComposeFile {
        &self.compose_file
    }

    pub fn compose_file_mut(&mut self) -> &mut ComposeFile {
        &mut self.compose_file
    }

    pub fn proxy(&self) -> Option<&Container> {
        self.proxy.as_ref()
    }

    pub fn set_proxy(&mut self, container: Container) -> &mut Self {
        self.proxy = Some(container);
        self
    }

    pub fn frontend_network(&self) -> Option<&str> {
        self.frontend_network.as_deref()
    }

    /// Joins an existing network; it is declared external in the compose file.
    pub fn set_frontend_network<S: Into<String>>(&mut self, name: S) -> &mut Self {
        let name = name.into();
        self.compose_file.add_network(Network::external(name.clone()));
        self.frontend_network = Some(name);
        self
    }

    pub fn backend_network(&self) -> Option<&str> {
        self.backend_network.as_deref()
    }

    pub fn set_backend_network<S: Into<String>>(&mut self, name: S) -> &mut Self {
        let name = name.into();
        self.compose_file.add_network(Network::external(name.clone()));
        self.backend_network = Some(name);
        self
    }

    pub fn add_build_context<C: Into<BuildContext>>(&mut self, context: C) -> &mut Self {
        self.build_contexts.push(context.into());
        self
    }

    pub fn build_contexts(&self) -> &[BuildContext] {
        &self.build_contexts
    }

    pub fn build_context(&self, kind: BuildContextKind) -> Option<&BuildContext> {
        self.build_contexts
            .iter()
            .find(|context| context.kind() == kind)
    }

    pub fn build_context_mut(&mut self, kind: BuildContextKind) -> Option<&mut BuildContext> {
        self.build_contexts
            .iter_mut()
            .find(|context| context.kind() == kind)
    }

    pub fn php(&self) -> Option<&PhpBuildContext> {
        match self.build_context(BuildContextKind::Php) {
            Some(BuildContext::Php(context)) => Some(context),
            _ => None,
        }
    }

    pub fn php_mut(&mut self) -> Option<&mut PhpBuildContext> {
        match self.build_context_mut(BuildContextKind::Php) {
            Some(BuildContext::Php(context)) => Some(context),
            _ => None,
        }
    }

    pub fn web(&self) -> Option<&WebBuildContext> {
        match self.build_context(BuildContextKind::Web) {
            Some(BuildContext::Web(context)) => Some(context),
            _ => None,
        }
    }

    pub fn database(&self) -> Option<&DatabaseBuildContext> {
        match self.build_context(BuildContextKind::Database) {
            Some(BuildContext::Database(context)) => Some(context),
            _ => None,
        }
    }

    pub fn node(&self) -> Option<&NodeBuildContext> {
        match self.build_context(BuildContextKind::Node) {
            Some(BuildContext::Node(context)) => Some(context),
            _ => None,
        }
    }

    /// Lends the context at `index` out of the application so a builder can
    /// mutate both. The context is not visible to lookups while lent.
    pub fn with_build_context<R, F>(&mut self, index: usize, f: F) -> Option<R>
    where
        F: FnOnce(&mut AppBuildContext, &mut BuildContext) -> R,
    {
        if index >= self.build_contexts.len() {
            return None;
        }

        let mut context = self.build_contexts.remove(index);
        let result = f(self, &mut context);
        self.build_contexts.insert(index, context);

        Some(result)
    }

    pub fn add_file(&mut self, file: GeneratedFile) -> &mut Self {
        match self.files.iter_mut().find(|existing| existing.path == file.path) {
            Some(existing) => *existing = file,
            None => self.files.push(file),
        }
        self
    }

    pub fn files(&self) -> &[GeneratedFile] {
        &self.files
    }

    pub fn add_run(&mut self, run: DockerRun) -> &mut Self {
        self.runs.push(run);
        self
    }

    pub fn runs(&self) -> &[DockerRun] {
        &self.runs
    }

    /// The compose file, each Dockerfile that has a location, then the
    /// registered files.
    pub fn rendered_files(&self) -> Result<Vec<GeneratedFile>> {
        let mut files = Vec::new();

        if let Some(path) = &self.compose_file.path {
            files.push(GeneratedFile::new(path.clone(), self.compose_file.to_yaml()?));
        }

        for dockerfile in self.build_contexts.iter().filter_map(BuildContext::dockerfile) {
            if let Some(path) = &dockerfile.path {
                files.push(GeneratedFile::new(path.clone(), dockerfile.to_string()));
            }
        }

        files.extend(self.files.iter().cloned());

        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dockerfile::Dockerfile, os::OperatingSystem};

    fn app() -> AppBuildContext {
        AppBuildContext::new("shop", "/srv/shop", ComposeFile::at("docker-compose.yml"))
    }

    #[test]
    fn networks_are_declared_external() {
        let mut app = app();
        app.set_frontend_network("dockerizor-frontend")
            .set_backend_network("dockerizor-backend");

        let network = app.compose_file().network("dockerizor-backend").unwrap();
        assert!(network.external);
        assert_eq!(app.frontend_network(), Some("dockerizor-frontend"));
    }

    #[test]
    fn lookup_returns_the_first_context_of_a_kind() {
        let mut app = app();
        app.add_build_context(WebBuildContext::new("/var/www/html/public", 8000))
            .add_build_context(WebBuildContext::new("/var/www/html/web", 8001));

        assert_eq!(app.web().unwrap().port, 8000);
        assert!(app.php().is_none());
    }

    #[test]
    fn lent_context_returns_to_its_slot() {
        let mut app = app();
        app.add_build_context(WebBuildContext::default())
            .add_build_context(PhpBuildContext::new("8.1"));

        let seen = app
            .with_build_context(1, |app, context| {
                assert!(app.php().is_none());
                context.kind()
            })
            .unwrap();

        assert_eq!(seen, BuildContextKind::Php);
        assert_eq!(app.build_contexts()[1].kind(), BuildContextKind::Php);
        assert!(app.with_build_context(2, |_, _| ()).is_none());
    }

    #[test]
    fn rendered_files_include_compose_and_dockerfiles() {
        let mut app = app();
        let mut php = PhpBuildContext::new("8.1");
        let mut dockerfile = Dockerfile::new(OperatingSystem::alpine("php:8.1-fpm-alpine"));
        dockerfile.path = Some("docker/php/Dockerfile".into());
        php.dockerfile = Some(dockerfile);

        app.add_build_context(php)
            .add_file(GeneratedFile::new("docker/php/php.ini", ""))
            .add_file(GeneratedFile::new("docker/php/php.ini", "memory_limit = 256M\n"));

        let files = app.rendered_files().unwrap();
        let paths = files
            .iter()
            .map(|file| file.path.to_string_lossy().into_owned())
            .collect::<Vec<_>>();

        assert_eq!(
            paths,
            vec!["docker-compose.yml", "docker/php/Dockerfile", "docker/php/php.ini"]
        );
        assert_eq!(files[2].contents, "memory_limit = 256M\n");
        assert!(files[1].contents.starts_with("FROM php:8.1-fpm-alpine\n"));
    }
}
