//! Small helpers shared by the workspace binaries.

pub mod env;
