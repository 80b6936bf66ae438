//! Feature containers and their JSON persistence

pub mod matrix;
pub mod persist;
pub mod repository;

pub use matrix::{DataMatrix, FocusSpec, MatrixStats};
pub use repository::DataRepository;
