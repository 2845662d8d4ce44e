//! Console UI (§7, "User-visible failure"): red/yellow color-coded output implementing
//! the [`pmg_core::UserInteraction`] contract the guard engine talks to.

use pmg_common::AnalysisVerdict;
use pmg_core::UserInteraction;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};

const RED: &str = "\u{1b}[31m";
const YELLOW: &str = "\u{1b}[33m";
const RESET: &str = "\u{1b}[0m";

pub struct ConsoleUi {
    silent: bool,
    status_active: AtomicBool,
}

impl ConsoleUi {
    pub fn new(silent: bool) -> Self {
        Self { silent, status_active: AtomicBool::new(false) }
    }

    /// The banner printed ahead of any suspicious-package confirmation prompt, shared
    /// by the dialoguer-backed guard-mode prompt and the PTY-backed proxy-mode one
    /// (which reads its answer from a diverted stdin stream, not dialoguer).
    pub fn print_suspicious_banner(&self, suspicious: &[AnalysisVerdict]) {
        eprintln!("{RED}Suspicious package(s) detected: {}{RESET}", suspicious.len());
        self.print_verdict_list(suspicious);
    }

    fn print_verdict_list(&self, verdicts: &[AnalysisVerdict]) {
        for v in verdicts {
            let mut line = format!("  - {}", v.pkg_version);
            if let Some(summary) = &v.summary {
                line.push_str(&format!(": {summary}"));
            }
            eprintln!("{line}");
            if let Some(url) = &v.reference_url {
                eprintln!("    {url}");
            }
        }
    }
}

impl UserInteraction for ConsoleUi {
    fn set_status(&self, message: &str) {
        if self.silent {
            return;
        }
        eprint!("\r{message}");
        let _ = io::stderr().flush();
        self.status_active.store(true, Ordering::Relaxed);
    }

    fn clear_status(&self) {
        if self.status_active.swap(false, Ordering::Relaxed) {
            eprint!("\r\u{1b}[2K");
            let _ = io::stderr().flush();
        }
    }

    fn show_warning(&self, message: &str) {
        eprintln!("{YELLOW}warning: {message}{RESET}");
    }

    fn get_confirmation_on_malware(&self, suspicious: &[AnalysisVerdict]) -> bool {
        if suspicious.is_empty() {
            return true;
        }
        self.print_suspicious_banner(suspicious);

        if self.silent {
            return false;
        }

        dialoguer::Confirm::new()
            .with_prompt(format!("{YELLOW}Proceed anyway?{RESET}"))
            .default(false)
            .interact()
            .unwrap_or(false)
    }

    fn block(&self, blocked: &[AnalysisVerdict]) {
        eprintln!("{RED}Malicious package blocked!{RESET}");
        self.print_verdict_list(blocked);
    }
}

/// Print a structured `PmgError` per §7's "User-visible failure" format: red headline,
/// yellow help, yellow additional help.
pub fn print_error(err: &pmg_common::PmgError) {
    eprintln!("{RED}Error occurred: {}{RESET}", err.message);
    if let Some(help) = &err.help {
        eprintln!("{YELLOW}{help}{RESET}");
    }
    if let Some(source) = &err.source {
        eprintln!("{YELLOW}{source}{RESET}");
    }
}
