//! Containerizes PHP and Node applications: detects the project, asks what
//! it cannot detect, reuses the shared infrastructure found on the Docker
//! daemon, and writes a compose file, Dockerfiles and support files.

pub mod backends;
pub mod builders;
pub mod center;
pub mod compose;
pub mod config;
pub mod configurators;
pub mod context;
pub mod controller;
pub mod detect;
pub mod dockerfile;
pub mod dotenv;
pub mod dsn;
pub mod error;
pub mod models;
pub mod os;
pub mod prompt;
pub mod services;

pub use error::{Error, Result};
