use std::fmt;

use crate::compose::ServiceVolume;

/// A one-off `docker run` executed after the images are built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DockerRun {
    pub image: String,
    pub command: String,
    pub volumes: Vec<ServiceVolume>,
    pub workdir: String,
    pub user: String,
    pub remove: bool,
}

impl DockerRun {
    pub fn new<I: Into<String>, C: Into<String>>(image: I, command: C) -> DockerRun {
        DockerRun {
            image: image.into(),
            command: command.into(),
            volumes: Vec::new(),
            workdir: "/app".to_string(),
            user: "1000:1000".to_string(),
            remove: true,
        }
    }

    pub fn with_volume(mut self, volume: ServiceVolume) -> DockerRun {
        self.volumes.push(volume);
        self
    }

    pub fn with_workdir<S: Into<String>>(mut self, workdir: S) -> DockerRun {
        self.workdir = workdir.into();
        self
    }
}

impl fmt::Display for DockerRun {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("docker run")?;
        if self.remove {
            f.write_str(" --rm")?;
        }
        for volume in self.volumes.iter() {
            write!(f, " -v {}:{}", volume.source, volume.target)?;
            if volume.read_only {
                f.write_str(":ro")?;
            }
        }
        write!(f, " -w {} -u {} {}", self.workdir, self.user, self.image)?;
        if !self.command.is_empty() {
            write!(f, " {}", self.command)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_a_docker_run_command_line() {
        let run = DockerRun::new("node:lts", "yarn install")
            .with_volume(ServiceVolume::new("/srv/shop", "/app"));

        assert_eq!(
            run.to_string(),
            "docker run --rm -v /srv/shop:/app -w /app -u 1000:1000 node:lts yarn install"
        );
    }

    #[test]
    fn php_runs_use_the_document_root() {
        let run = DockerRun::new("shop-php", "composer install --ignore-platform-reqs -n")
            .with_volume(ServiceVolume::new("/srv/shop", "/var/www/html"))
            .with_workdir("/var/www/html");

        assert_eq!(
            run.to_string(),
            "docker run --rm -v /srv/shop:/var/www/html -w /var/www/html -u 1000:1000 shop-php composer install --ignore-platform-reqs -n"
        );
    }
}
