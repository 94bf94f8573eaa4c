mod failure;
mod runner;
mod sink;

pub use failure::{FailureKind, ProcessFailure};
pub use runner::ProcessRunner;

#[cfg(test)]
pub use sink::SharedBuffer;
