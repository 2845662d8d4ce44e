//! Command Parser (C1): turn raw argv for a specific package manager into a normalized
//! [`ParsedCommand`].

use pmg_common::{Ecosystem, PackageInstallTarget, PackageVersion, PmgError, PmgResult};
use std::fmt;

/// Every package manager PMG intercepts (§6, CLI surface sub-commands).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Npm,
    Pnpm,
    Yarn,
    Bun,
    Npx,
    Pnpx,
    Pip,
    Pip3,
    Uv,
    Poetry,
}

impl PackageManager {
    pub fn ecosystem(self) -> Ecosystem {
        match self {
            PackageManager::Npm
            | PackageManager::Pnpm
            | PackageManager::Yarn
            | PackageManager::Bun
            | PackageManager::Npx
            | PackageManager::Pnpx => Ecosystem::Npm,
            PackageManager::Pip | PackageManager::Pip3 | PackageManager::Uv | PackageManager::Poetry => {
                Ecosystem::PyPi
            }
        }
    }

    pub fn exe_name(self) -> &'static str {
        match self {
            PackageManager::Npm => "npm",
            PackageManager::Pnpm => "pnpm",
            PackageManager::Yarn => "yarn",
            PackageManager::Bun => "bun",
            PackageManager::Npx => "npx",
            PackageManager::Pnpx => "pnpx",
            PackageManager::Pip => "pip",
            PackageManager::Pip3 => "pip3",
            PackageManager::Uv => "uv",
            PackageManager::Poetry => "poetry",
        }
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.exe_name())
    }
}

impl std::str::FromStr for PackageManager {
    type Err = PmgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "npm" => Ok(PackageManager::Npm),
            "pnpm" => Ok(PackageManager::Pnpm),
            "yarn" => Ok(PackageManager::Yarn),
            "bun" => Ok(PackageManager::Bun),
            "npx" => Ok(PackageManager::Npx),
            "pnpx" => Ok(PackageManager::Pnpx),
            "pip" => Ok(PackageManager::Pip),
            "pip3" => Ok(PackageManager::Pip3),
            "uv" => Ok(PackageManager::Uv),
            "poetry" => Ok(PackageManager::Poetry),
            other => Err(PmgError::invalid_argument(format!("unrecognized package manager: {other}"))),
        }
    }
}

const NPM_FAMILY_INSTALL_SYNONYMS: &[&str] = &["install", "i", "add", "ci"];
const YARN_INSTALL_SYNONYMS: &[&str] = &["install", "add"];

/// Parse raw argv (not including the program name) for `pm` into a [`ParsedCommand`].
/// An unrecognized subcommand returns an empty-install-targets pass-through rather than
/// an error (§4.1).
pub fn parse_command(pm: PackageManager, args: &[String]) -> PmgResult<pmg_common::ParsedCommand> {
    let mut parsed = pmg_common::ParsedCommand {
        exe: pm.exe_name().to_string(),
        args: args.to_vec(),
        install_targets: Vec::new(),
        is_manifest_install: false,
        manifest_files: Vec::new(),
    };

    match pm {
        PackageManager::Npm | PackageManager::Pnpm | PackageManager::Bun => {
            parse_npm_family(pm, args, &mut parsed)?;
        }
        PackageManager::Npx | PackageManager::Pnpx => {
            // `npx`/`pnpx` run a package directly rather than installing one into a
            // manifest; treat the first positional as a single install target.
            parse_npx(pm, args, &mut parsed)?;
        }
        PackageManager::Yarn => parse_yarn(args, &mut parsed)?,
        PackageManager::Pip | PackageManager::Pip3 => parse_pip(args, &mut parsed)?,
        PackageManager::Uv => parse_uv(args, &mut parsed)?,
        PackageManager::Poetry => parse_poetry(args, &mut parsed)?,
    }

    Ok(parsed)
}

fn dev_flags_for(pm: PackageManager) -> &'static [&'static str] {
    match pm {
        PackageManager::Npm | PackageManager::Pnpm => &["--save-dev", "-D"],
        PackageManager::Yarn | PackageManager::Bun => &["--dev", "-D"],
        _ => &[],
    }
}

fn parse_npm_family(
    pm: PackageManager,
    args: &[String],
    parsed: &mut pmg_common::ParsedCommand,
) -> PmgResult<()> {
    let Some(subcommand_idx) = args.iter().position(|a| NPM_FAMILY_INSTALL_SYNONYMS.contains(&a.as_str()))
    else {
        return Ok(()); // unrecognized subcommand: pass-through
    };

    let dev_flags = dev_flags_for(pm);
    let is_dev = args.iter().any(|a| dev_flags.contains(&a.as_str()));
    let positionals: Vec<&String> = args[subcommand_idx + 1..]
        .iter()
        .filter(|a| !a.starts_with('-'))
        .collect();

    if positionals.is_empty() {
        parsed.is_manifest_install = true;
        parsed.manifest_files = vec!["package.json".to_string()];
        return Ok(());
    }

    for spec in positionals {
        let target = parse_npm_package_spec(spec, is_dev)?;
        parsed.install_targets.push(target);
    }
    Ok(())
}

fn parse_npx(pm: PackageManager, args: &[String], parsed: &mut pmg_common::ParsedCommand) -> PmgResult<()> {
    let Some(spec) = args.iter().find(|a| !a.starts_with('-')) else {
        return Ok(());
    };
    parsed.install_targets.push(parse_npm_package_spec(spec, false)?);
    let _ = pm;
    Ok(())
}

fn parse_yarn(args: &[String], parsed: &mut pmg_common::ParsedCommand) -> PmgResult<()> {
    let non_flag: Vec<&String> = args.iter().filter(|a| !a.starts_with('-')).collect();

    let Some(&subcommand) = non_flag.first() else {
        // bare `yarn`: manifest install.
        parsed.is_manifest_install = true;
        return Ok(());
    };

    if !YARN_INSTALL_SYNONYMS.contains(&subcommand.as_str()) {
        return Ok(()); // unrecognized subcommand: pass-through
    }

    let is_dev = args.iter().any(|a| dev_flags_for(PackageManager::Yarn).contains(&a.as_str()));
    let positionals = &non_flag[1..];

    if positionals.is_empty() && subcommand == "install" {
        parsed.is_manifest_install = true;
        return Ok(());
    }

    for spec in positionals {
        parsed.install_targets.push(parse_npm_package_spec(spec, is_dev)?);
    }
    Ok(())
}

/// npm package-spec parsing (§4.1): scoped `@scope/name[@ver]` or `name[@ver]`; the `@`
/// split for the version uses the *last* `@` so scoped names (which start with `@`)
/// split correctly.
fn parse_npm_package_spec(spec: &str, dev: bool) -> PmgResult<PackageInstallTarget> {
    let at_positions: Vec<usize> = spec
        .char_indices()
        .filter(|(_, c)| *c == '@')
        .map(|(i, _)| i)
        .collect();

    let (name, raw_version) = if spec.starts_with('@') {
        match at_positions.len() {
            0 | 1 => (spec.to_string(), String::new()),
            _ => {
                let last = *at_positions.last().unwrap();
                (spec[..last].to_string(), spec[last + 1..].to_string())
            }
        }
    } else if let Some(&last) = at_positions.last() {
        (spec[..last].to_string(), spec[last + 1..].to_string())
    } else {
        (spec.to_string(), String::new())
    };

    if name.is_empty() {
        return Err(PmgError::invalid_argument(format!("malformed package spec: {spec}")));
    }

    let version = pmg_registry::npm::npm_clean_version(&raw_version);
    let pkg_version = PackageVersion::new(Ecosystem::Npm, name, version);
    let mut target = PackageInstallTarget::new(pkg_version);
    let _ = dev; // dev-ness is tracked at the resolver layer via `include_dev_dependencies`
    target.extras = Vec::new();
    Ok(target)
}

fn parse_pip(args: &[String], parsed: &mut pmg_common::ParsedCommand) -> PmgResult<()> {
    let first_non_flag = args.iter().find(|a| !a.starts_with('-'));
    if first_non_flag.map(String::as_str) != Some("install") {
        return Ok(()); // unrecognized subcommand (list/show/freeze/...): pass-through
    }

    let mut i = 0;
    let mut had_requirement = false;
    while i < args.len() {
        let arg = &args[i];
        if arg == "-r" || arg == "--requirement" {
            if let Some(file) = args.get(i + 1) {
                parsed.manifest_files.push(file.clone());
                had_requirement = true;
                i += 2;
                continue;
            }
        }
        if !arg.starts_with('-') && arg != "install" {
            let target = parse_pypi_package_spec(arg)?;
            parsed.install_targets.push(target);
        }
        i += 1;
    }
    if had_requirement {
        parsed.is_manifest_install = true;
    }
    Ok(())
}

fn parse_uv(args: &[String], parsed: &mut pmg_common::ParsedCommand) -> PmgResult<()> {
    if args.iter().any(|a| a == "sync") && !args.iter().any(|a| a == "pip") {
        parsed.is_manifest_install = true;
        parsed.manifest_files = vec!["uv.lock".to_string()];
        return Ok(());
    }

    let has_pip = args.iter().any(|a| a == "pip");
    let requirement_file = args
        .iter()
        .position(|a| a == "-r" || a == "--requirement")
        .and_then(|idx| args.get(idx + 1));

    if has_pip && args.iter().any(|a| a == "sync") {
        if let Some(file) = requirement_file {
            parsed.is_manifest_install = true;
            parsed.manifest_files = vec![file.clone()];
            return Ok(());
        }
    }

    // Only `add` and `pip install` treat positionals as explicit install targets; every
    // other uv subcommand (`tree`, `lock`, `run`, `remove`, `venv`, ...) is a pass-through
    // per §4.1's general rule.
    let is_add = args.iter().any(|a| a == "add");
    let is_pip_install = has_pip && args.iter().any(|a| a == "install");
    if !is_add && !is_pip_install {
        return Ok(());
    }

    if let Some(file) = requirement_file {
        parsed.is_manifest_install = true;
        parsed.manifest_files = vec![file.clone()];
        return Ok(());
    }

    let skip_words = ["add", "pip", "install", "sync"];
    for arg in args {
        if arg.starts_with('-') || skip_words.contains(&arg.as_str()) {
            continue;
        }
        parsed.install_targets.push(parse_pypi_package_spec(arg)?);
    }
    Ok(())
}

fn parse_poetry(args: &[String], parsed: &mut pmg_common::ParsedCommand) -> PmgResult<()> {
    if args.first().map(String::as_str) == Some("install") {
        parsed.is_manifest_install = true;
        parsed.manifest_files = vec!["poetry.lock".to_string()];
        return Ok(());
    }
    if args.first().map(String::as_str) == Some("add") {
        for arg in &args[1..] {
            if arg.starts_with('-') {
                continue;
            }
            parsed.install_targets.push(parse_pypi_package_spec(arg)?);
        }
    }
    Ok(())
}

/// PyPI package-spec parsing (§4.1): optional `[extra1,extra2]` extras block (mismatched
/// brackets are a parse error) followed by an optional comparator from
/// `{==, >=, <=, !=, >, <, ~=}`; the operator index used is the earliest of any.
fn parse_pypi_package_spec(spec: &str) -> PmgResult<PackageInstallTarget> {
    let open = spec.find('[');
    let close = spec.find(']');
    let (name_and_version, extras) = match (open, close) {
        (Some(o), Some(c)) if o < c => {
            let extras_str = &spec[o + 1..c];
            let extras: Vec<String> = extras_str.split(',').map(|s| s.trim().to_string()).collect();
            (format!("{}{}", &spec[..o], &spec[c + 1..]), extras)
        }
        (None, None) => (spec.to_string(), Vec::new()),
        _ => {
            return Err(PmgError::invalid_argument(format!(
                "mismatched extras brackets in package spec: {spec}"
            )))
        }
    };

    let ops = ["==", ">=", "<=", "!=", "~=", ">", "<"];
    let earliest_op = ops
        .iter()
        .filter_map(|op| name_and_version.find(op).map(|idx| (idx, *op)))
        .min_by_key(|(idx, _)| *idx);

    let (name, version) = match earliest_op {
        Some((idx, op)) => (
            name_and_version[..idx].trim().to_string(),
            name_and_version[idx + op.len()..].trim().to_string(),
        ),
        None => (name_and_version.trim().to_string(), String::new()),
    };

    if name.is_empty() {
        return Err(PmgError::invalid_argument(format!("malformed package spec: {spec}")));
    }

    let pkg_version = PackageVersion::new(Ecosystem::PyPi, name, version);
    Ok(PackageInstallTarget::new(pkg_version).with_extras(extras))
}
