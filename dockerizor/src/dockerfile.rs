use std::{fmt, path::PathBuf};

use crate::{
    error::{Error, Result},
    os::{OperatingSystem, OsFamily},
};

/// A Dockerfile as a base image plus raw instructions.
///
/// Instructions are kept in append order. Nothing is reordered or merged,
/// so an update has to be added before the install that depends on it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dockerfile {
    pub operating_system: OperatingSystem,
    /// Location relative to the working directory, unset until a builder
    /// decides where the file goes.
    pub path: Option<PathBuf>,
    instructions: Vec<String>,
}

impl Dockerfile {
    pub fn new(operating_system: OperatingSystem) -> Dockerfile {
        Dockerfile {
            operating_system,
            path: None,
            instructions: Vec::new(),
        }
    }

    pub fn parse(text: &str, family: OsFamily) -> Result<Dockerfile> {
        let mut lines = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'));

        let image = match lines.next().and_then(|line| line.strip_prefix("FROM ")) {
            Some(image) => image.trim(),
            None => return Err(Error::format("dockerfile must start with a FROM instruction")),
        };

        let mut dockerfile = Dockerfile::new(OperatingSystem::new(family, image));

        for line in lines {
            if line.starts_with("RUN ") || line.starts_with("COPY ") {
                dockerfile.instructions.push(line.to_string());
            } else {
                return Err(Error::format(format!("unsupported instruction {:?}", line)));
            }
        }

        Ok(dockerfile)
    }

    pub fn image(&self) -> &str {
        &self.operating_system.image
    }

    pub fn instructions(&self) -> &[String] {
        &self.instructions
    }

    pub fn add_run<S: AsRef<str>>(&mut self, command: S) -> &mut Self {
        self.instructions.push(format!("RUN {}", command.as_ref()));
        self
    }

    pub fn add_copy<S: AsRef<str>, D: AsRef<str>>(&mut self, source: S, destination: D) -> &mut Self {
        self.instructions
            .push(format!("COPY {} {}", source.as_ref(), destination.as_ref()));
        self
    }
}

impl fmt::Display for Dockerfile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "FROM {}", self.image())?;
        for instruction in self.instructions.iter() {
            writeln!(f, "{}", instruction)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_from_then_instructions_in_order() {
        let mut dockerfile = Dockerfile::new(OperatingSystem::alpine("php:8.1-fpm-alpine"));
        dockerfile
            .add_run("apk update")
            .add_run("apk add --no-cache icu-dev")
            .add_copy("--from=composer:latest /usr/bin/composer", "/usr/local/bin/composer");

        assert_eq!(
            dockerfile.to_string(),
            "FROM php:8.1-fpm-alpine\n\
             RUN apk update\n\
             RUN apk add --no-cache icu-dev\n\
             COPY --from=composer:latest /usr/bin/composer /usr/local/bin/composer\n"
        );
    }

    #[test]
    fn duplicate_instructions_are_kept() {
        let mut dockerfile = Dockerfile::new(OperatingSystem::alpine("node:lts-alpine"));
        dockerfile.add_run("apk update").add_run("apk update");

        assert_eq!(dockerfile.instructions().len(), 2);
    }

    #[test]
    fn parses_what_it_renders() {
        let mut dockerfile = Dockerfile::new(OperatingSystem::alpine("php:8.1-fpm-alpine"));
        dockerfile.add_run("usermod -u 1000 www-data");

        let parsed = Dockerfile::parse(&dockerfile.to_string(), OsFamily::Alpine).unwrap();

        assert_eq!(parsed, dockerfile);
    }

    #[test]
    fn missing_from_is_a_format_error() {
        let err = Dockerfile::parse("RUN apk update\n", OsFamily::Alpine).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn unmodeled_instruction_is_a_format_error() {
        let err = Dockerfile::parse("FROM alpine\nENTRYPOINT [\"sh\"]\n", OsFamily::Alpine)
            .unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }
}
