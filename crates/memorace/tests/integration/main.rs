// See <https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html>

pub mod acceleration;
pub mod delivery;
pub mod filesystem;
pub mod keys;
pub mod refresh;
pub mod scenarios;

pub use utils::*;
