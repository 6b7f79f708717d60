// Application layer - Use case interactors

pub mod archive;
pub mod build_interactor;
pub mod container;
pub mod workspace;

// Re-export interactors
pub use build_interactor::{BuildInteractor, BuildRequest, FailedOutput, RunReport};
pub use container::{AppContainer, DefaultAppContainer};
