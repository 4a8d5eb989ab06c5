//! Docker plumbing
//!
//! - `connection`: registry credentials and image name qualification
//! - `engine`: the container engine seam and its docker CLI implementation
//! - `image`: pure helpers for image references and Dockerfiles

pub mod connection;
pub mod engine;
pub mod image;

pub use connection::{ContainerConnection, DockerConfig, RegistryAuth};
pub use engine::{ContainerEngine, DockerCli};
