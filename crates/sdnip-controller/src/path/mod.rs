//! Path installation engine.

mod installer;

pub use installer::{InstallError, PathInstaller, Result};
