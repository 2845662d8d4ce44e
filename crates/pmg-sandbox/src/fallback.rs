//! The non-macOS sandbox backend: always reports unavailable. The adapter degrades to
//! running the child unsandboxed, logging a warning — never silently (§4.11, §7).

use crate::policy::SandboxPolicy;
use crate::sandbox::{Sandbox, SandboxOutcome};
use tracing::warn;

#[derive(Default)]
pub struct UnavailableSandbox;

impl Sandbox for UnavailableSandbox {
    fn is_available(&self) -> bool {
        false
    }

    fn execute(&self, _policy: &SandboxPolicy, _exe: &str, _args: &[String]) -> SandboxOutcome {
        warn!("no sandbox backend available on this platform, running unsandboxed");
        SandboxOutcome::Unsandboxed
    }

    fn close(&self) -> std::io::Result<()> {
        Ok(())
    }
}
