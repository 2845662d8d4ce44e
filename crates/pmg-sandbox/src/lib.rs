//! Sandbox Adapter (C11): policy model plus platform backends that wrap the child
//! package-manager command under a capability-restricted sandbox.

mod fallback;
#[cfg(target_os = "macos")]
mod macos;
pub mod policy;
pub mod sandbox;

pub use policy::{ExecPolicy, FsPolicy, NetPolicy, SandboxPolicy};
pub use sandbox::{should_activate, Sandbox, SandboxOutcome};

/// Construct the sandbox backend for the current platform.
#[cfg(target_os = "macos")]
pub fn platform_sandbox() -> Box<dyn Sandbox> {
    Box::new(macos::MacosSandbox::new())
}

#[cfg(not(target_os = "macos"))]
pub fn platform_sandbox() -> Box<dyn Sandbox> {
    Box::new(fallback::UnavailableSandbox)
}
