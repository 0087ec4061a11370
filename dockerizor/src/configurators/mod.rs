//! Question flows that turn a working directory into an application ready
//! for the controller.

pub mod center;
mod composer;
mod node;

pub use composer::{dockerize, COMPOSE_FILE};
