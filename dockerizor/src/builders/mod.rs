//! Turns an application's build contexts into compose services,
//! Dockerfiles and support files.
//!
//! `build_app` runs three phases over every context. OS package
//! requirements are collected first, then each Dockerfile gets its package
//! manager instructions, and only then are the variant instructions and
//! compose services added. The pipeline appends instructions, so it runs
//! once per application.

use log::debug;

use crate::{
    compose::Service,
    context::{AppBuildContext, BuildContext},
};

pub mod center;
mod database;
mod dockerfile;
mod node;
mod php;
mod web;

pub use database::{environment_for, DATA_SECRET_DIRECTORY};

/// Runs the pipeline and returns the services added to the compose file.
pub fn build_app(app: &mut AppBuildContext) -> Vec<Service> {
    let count = app.build_contexts().len();

    for index in 0..count {
        app.with_build_context(index, |app, context| prepare(app, context));
    }

    for index in 0..count {
        app.with_build_context(index, |_, context| {
            if let Some(dockerfile) = context.dockerfile_mut() {
                dockerfile::build(dockerfile);
            }
        });
    }

    let mut services = Vec::new();
    for index in 0..count {
        if let Some(service) = app
            .with_build_context(index, |app, context| build(app, context))
            .flatten()
        {
            debug!("built service {:?}", service.name);
            services.push(service);
        }
    }

    services
}

fn prepare(app: &AppBuildContext, context: &mut BuildContext) {
    if let BuildContext::Php(php) = context {
        php::prepare(app, php);
    }
}

fn build(app: &mut AppBuildContext, context: &mut BuildContext) -> Option<Service> {
    match context {
        BuildContext::Php(php) => Some(php::build(app, php)),
        BuildContext::Web(web) => Some(web::build(app, web)),
        BuildContext::Database(database) => database::build(app, database),
        BuildContext::Node(node) => Some(node::build(app, node)),
        BuildContext::Generic(_) => None,
    }
}

/// Lowercase ASCII words joined by `-`; `10.5.8` becomes `10-5-8`.
pub fn slugify(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
