use log::info;

use crate::{
    compose::ServiceVolume,
    context::{AppBuildContext, DockerRun, NodeBuildContext},
    detect::Framework,
};

const RUN_IMAGE: &str = "node:lts";

/// Adds the node tier. Frameworks with an asset pipeline also get its
/// install and build as one-off runs, and its watcher as the service
/// command.
pub fn configure(app: &mut AppBuildContext, framework: Option<Framework>) {
    let mut context = NodeBuildContext::default();

    if let Some(commands) = framework.and_then(Framework::node_commands) {
        info!("configuring {:?} asset pipeline", commands.build);
        let source = app.workdir().to_string_lossy().into_owned();

        for command in [commands.install, commands.build] {
            app.add_run(DockerRun::new(RUN_IMAGE, command).with_volume(ServiceVolume::new(source.clone(), "/app")));
        }
        context.command = Some(commands.watch.to_string());
    }

    app.add_build_context(context);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::ComposeFile;

    fn app() -> AppBuildContext {
        AppBuildContext::new("shop", "/srv/shop", ComposeFile::new())
    }

    #[test]
    fn symfony_builds_assets_and_watches() {
        let mut app = app();

        configure(&mut app, Some(Framework::Symfony));

        let runs = app.runs().iter().map(ToString::to_string).collect::<Vec<_>>();
        assert_eq!(
            runs,
            [
                "docker run --rm -v /srv/shop:/app -w /app -u 1000:1000 node:lts yarn install",
                "docker run --rm -v /srv/shop:/app -w /app -u 1000:1000 node:lts yarn build",
            ]
        );
        assert_eq!(app.node().unwrap().command.as_deref(), Some("yarn watch"));
    }

    #[test]
    fn plain_projects_only_get_the_service() {
        let mut app = app();

        configure(&mut app, None);

        assert!(app.runs().is_empty());
        assert_eq!(app.node().unwrap().command, None);
    }
}
