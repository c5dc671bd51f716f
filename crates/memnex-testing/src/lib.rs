//! Fixtures for integration tests: synthetic session files and a
//! temp-directory workspace laid out like the real one.

mod fixtures;
mod world;

pub use fixtures::SessionFileBuilder;
pub use world::TestWorld;
