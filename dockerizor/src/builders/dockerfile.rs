use std::path::PathBuf;

use crate::dockerfile::Dockerfile;

/// Places the Dockerfile under `docker/<image name>/` unless it already has
/// a location, then adds the package manager instructions.
pub fn build(dockerfile: &mut Dockerfile) {
    if dockerfile.path.is_none() {
        dockerfile.path = Some(default_path(dockerfile));
    }

    let os = dockerfile.operating_system.clone();
    dockerfile.add_run(os.update_command());
    if !os.packages().is_empty() {
        dockerfile.add_run(os.install_command());
    }
}

fn default_path(dockerfile: &Dockerfile) -> PathBuf {
    let name = dockerfile.operating_system.image_name();
    let name = name.rsplit('/').next().unwrap_or(name);

    PathBuf::from("docker").join(name).join("Dockerfile")
}
