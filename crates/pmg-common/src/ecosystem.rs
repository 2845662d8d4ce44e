use serde::{Deserialize, Serialize};
use std::fmt;

/// A package ecosystem recognized by PMG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Npm,
    PyPi,
}

impl Ecosystem {
    pub fn as_str(self) -> &'static str {
        match self {
            Ecosystem::Npm => "npm",
            Ecosystem::PyPi => "pypi",
        }
    }

    /// Normalize a package name for dedup/identity purposes within this ecosystem.
    ///
    /// PyPI collapses runs of `-_.` into a single hyphen and lower-cases (PEP 503);
    /// npm names are already case-sensitive and unique as written.
    pub fn normalize_name(self, name: &str) -> String {
        match self {
            Ecosystem::Npm => name.to_string(),
            Ecosystem::PyPi => {
                let lower = name.to_lowercase();
                let mut out = String::with_capacity(lower.len());
                let mut last_was_sep = false;
                for ch in lower.chars() {
                    if matches!(ch, '-' | '_' | '.') {
                        if !last_was_sep && !out.is_empty() {
                            out.push('-');
                        }
                        last_was_sep = true;
                    } else {
                        out.push(ch);
                        last_was_sep = false;
                    }
                }
                out.trim_end_matches('-').to_string()
            }
        }
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Ecosystem {
    type Err = crate::error::PmgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "npm" => Ok(Ecosystem::Npm),
            "pypi" | "pip" => Ok(Ecosystem::PyPi),
            other => Err(crate::error::PmgError::invalid_argument(format!(
                "unknown ecosystem: {other}"
            ))),
        }
    }
}
