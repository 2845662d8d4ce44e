//! Wires the parsed CLI onto either the guard engine (C6) or the proxy server (C7–C10),
//! per §4.6/§4.8's split between the optimistic-guard and proxy run modes.

use crate::cli::args::Cli;
use crate::ui::ConsoleUi;
use pmg_analyzer::{AnalysisMode, AnalyzerClient};
use pmg_common::{Configuration, ParsedCommand, PmgError, PmgResult, SafeDepCredentials, TrustedPackage};
use pmg_core::{parser, GuardEngine, UserInteraction};
use pmg_proxy::{CertificateAuthority, NpmInterceptor, ProxyConfig, ProxyServer, PypiInterceptor};
use pmg_registry::{EcosystemClient, NpmClient, PyPiClient};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

const DEFAULT_CONFIG_FILE: &str = ".pmg.yaml";

/// Parse, configure, and run the full pipeline. Returns the process exit code.
pub async fn run(cli: Cli) -> i32 {
    let pm = match cli.command.exe_name().parse::<parser::PackageManager>() {
        Ok(pm) => pm,
        Err(e) => return fatal(&e),
    };
    let tail = cli.command.tail().to_vec();

    let mut config = match load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => return fatal(&e),
    };
    apply_cli_overrides(&mut config, &cli);
    config.apply_env_overrides();

    let parsed = match parser::parse_command(pm, &tail) {
        Ok(p) => p,
        Err(e) => return fatal(&e),
    };

    let mode = if config.paranoid { AnalysisMode::ActiveScan } else { AnalysisMode::Query };
    let analyzer = match AnalyzerClient::new(mode, SafeDepCredentials::from_env()) {
        Ok(a) => a,
        Err(e) => {
            return fatal(
                &PmgError::invalid_argument(format!("failed to build analyzer client: {e}")).with_help(
                    "set SAFEDEP_API_KEY and SAFEDEP_TENANT_ID, or drop --paranoid".to_string(),
                ),
            )
        }
    };

    let cwd = match std::env::current_dir() {
        Ok(d) => d,
        Err(e) => return fatal(&PmgError::not_found(format!("cannot read current directory: {e}"))),
    };

    if config.proxy_mode {
        run_proxy_mode(&config, Arc::new(analyzer), &parsed, &cwd).await
    } else {
        run_guard_mode(&config, &analyzer, &parsed, &cwd, cli.silent).await
    }
}

fn fatal(err: &PmgError) -> i32 {
    crate::ui::print_error(err);
    crate::exit_codes::EXIT_FATAL
}

fn load_config(path_override: Option<&std::path::Path>) -> PmgResult<Configuration> {
    let path: PathBuf = path_override.map(PathBuf::from).unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    Configuration::load(&path)
}

fn apply_cli_overrides(config: &mut Configuration, cli: &Cli) {
    if cli.dry_run {
        config.dry_run = true;
    }
    if let Some(transitive) = cli.transitive {
        config.transitive = transitive;
    }
    if let Some(depth) = cli.transitive_depth {
        config.transitive_depth = depth;
    }
    if cli.include_dev_dependencies {
        config.include_dev_dependencies = true;
    }
    if cli.paranoid {
        config.paranoid = true;
    }
    if cli.proxy_mode {
        config.proxy_mode = true;
    }
}

async fn run_guard_mode(
    config: &Configuration,
    analyzer: &AnalyzerClient,
    parsed: &ParsedCommand,
    cwd: &std::path::Path,
    silent: bool,
) -> i32 {
    let npm_client: Arc<dyn EcosystemClient> = match NpmClient::new() {
        Ok(c) => Arc::new(c),
        Err(e) => return fatal(&PmgError::network(format!("failed to build npm client: {e}"))),
    };
    let pypi_client: Arc<dyn EcosystemClient> = match PyPiClient::new() {
        Ok(c) => Arc::new(c),
        Err(e) => return fatal(&PmgError::network(format!("failed to build pypi client: {e}"))),
    };

    let trusted = TrustedPackage::parse_all(&config.trusted_packages);
    let sandbox_policy = pmg_sandbox::SandboxPolicy::builtin_default();
    let sandbox = pmg_sandbox::platform_sandbox();
    let ui = ConsoleUi::new(silent);

    let engine = GuardEngine {
        config,
        trusted,
        npm_client,
        pypi_client,
        analyzer,
        ui: &ui,
        sandbox: Some(sandbox.as_ref()),
        sandbox_policy,
    };

    let result = engine.run(parsed, cwd).await;
    result.outcome.exit_code(result.child_exit_code)
}

async fn run_proxy_mode(
    config: &Configuration,
    analyzer: Arc<AnalyzerClient>,
    parsed: &ParsedCommand,
    cwd: &std::path::Path,
) -> i32 {
    let ca = match CertificateAuthority::generate() {
        Ok(ca) => Arc::new(ca),
        Err(e) => return fatal(&PmgError::invalid_argument(format!("failed to generate proxy CA: {e}"))),
    };

    let proxy_config = ProxyConfig::default();
    let server = ProxyServer::new(Arc::clone(&ca), proxy_config.clone());

    let (confirm_tx, confirm_rx) = pmg_proxy::confirmation::channel();
    let insecure_installation = config.insecure_installation;
    server
        .register(Arc::new(NpmInterceptor::new(Arc::clone(&analyzer), confirm_tx.clone(), insecure_installation)))
        .await;
    server
        .register(Arc::new(PypiInterceptor::new(analyzer, confirm_tx, insecure_installation)))
        .await;

    let handle = match server.start().await {
        Ok(h) => h,
        Err(e) => return fatal(&PmgError::network(format!("failed to start proxy server: {e}"))),
    };

    set_child_env_vars(&ca, handle.port);

    let exe = parsed.exe.clone();
    let args = parsed.args.clone();

    // Only an interactive stdin gets the PTY switchboard; otherwise the child runs
    // directly and a SUSPICIOUS verdict is auto-denied with no prompt (§4.10).
    let pty = if pmg_proxy::stdin_is_interactive() {
        match pmg_proxy::PtySwitchboard::spawn(&exe, &args) {
            Ok((switchboard, interaction, prompt)) => {
                let _ = crossterm::terminal::enable_raw_mode();
                Some((switchboard, interaction, prompt))
            }
            Err(e) => {
                warn!(error = %e, "failed to spawn pty switchboard, falling back to direct exec");
                None
            }
        }
    } else {
        None
    };

    let (switchboard, interaction, prompt) = match pty {
        Some((switchboard, interaction, prompt)) => (Some(switchboard), Some(interaction), Some(prompt)),
        None => (None, None, None),
    };

    let ui = ConsoleUi::new(false);
    let confirmations_task = tokio::spawn(run_confirmations(confirm_rx, ui, interaction, prompt));

    let child_exit_code = match switchboard {
        Some(switchboard) => run_under_pty(switchboard).await,
        None => run_direct(&exe, &args, cwd).await,
    };

    handle.stop(proxy_config.shutdown_timeout).await;
    // Dropping the server's last `Arc` closes every interceptor's confirmation sender,
    // so the drain loop below exits on its own once `handle.stop` has returned.
    let (blocked_count, user_cancelled_count) = confirmations_task.await.unwrap_or((0, 0));

    let outcome = pmg_common::infer_outcome(pmg_common::OutcomeInputs {
        insecure_mode: config.insecure_installation,
        dry_run: config.dry_run,
        blocked_count,
        user_cancelled_count,
        has_error: child_exit_code.is_none(),
    });
    outcome.exit_code(child_exit_code)
}

/// Drains the confirmation channel for the lifetime of the proxy run. Every request here
/// already corresponds to a wire-level 403 (§4.9/§9 open question 3: a block can't be
/// retroactively undone), so this loop's job is purely the user-facing notification and
/// — for SUSPICIOUS verdicts with an interactive terminal — the synchronous y/N prompt
/// that feeds `user_cancelled_count` into the final outcome. `before_interaction`/
/// `after_interaction` pause and resume the child's live PTY output so the prompt never
/// interleaves with it (§4.10); the answer itself is read from the diverted-stdin
/// `PromptReader` rather than dialoguer, since the child PTY owns real stdin.
async fn run_confirmations(
    mut confirm_rx: pmg_proxy::ConfirmationReceiver,
    ui: ConsoleUi,
    interaction: Option<pmg_proxy::InteractionHandle>,
    mut prompt: Option<pmg_proxy::PromptReader>,
) -> (usize, usize) {
    let mut blocked_count = 0usize;
    let mut user_cancelled_count = 0usize;

    while let Some(req) = confirm_rx.recv().await {
        blocked_count += 1;

        if req.verdict.kind != pmg_common::VerdictKind::Suspicious {
            ui.block(std::slice::from_ref(&req.verdict));
            continue;
        }

        match (&interaction, &mut prompt) {
            (Some(interaction), Some(prompt)) => {
                interaction.before_interaction();
                ui.print_suspicious_banner(std::slice::from_ref(&req.verdict));
                let allowed = matches!(
                    prompt.read_line().await.as_deref().map(str::to_lowercase).as_deref(),
                    Some("y") | Some("yes")
                );
                interaction.after_interaction();
                if !allowed {
                    user_cancelled_count += 1;
                }
            }
            _ => {
                ui.show_warning("non-interactive session, denying suspicious package without prompting");
                user_cancelled_count += 1;
            }
        }
    }

    (blocked_count, user_cancelled_count)
}

/// `PtySwitchboard::wait` is synchronous (portable-pty is not async); run it on a
/// blocking thread so the confirmation-drain task keeps polling while the child runs.
async fn run_under_pty(switchboard: pmg_proxy::PtySwitchboard) -> Option<i32> {
    tokio::task::spawn_blocking(move || switchboard.wait().ok()).await.unwrap_or(None)
}

async fn run_direct(exe: &str, args: &[String], cwd: &std::path::Path) -> Option<i32> {
    let status = tokio::process::Command::new(exe)
        .args(args)
        .current_dir(cwd)
        .stdin(std::process::Stdio::inherit())
        .stdout(std::process::Stdio::inherit())
        .stderr(std::process::Stdio::inherit())
        .status()
        .await;
    match status {
        Ok(s) => s.code(),
        Err(e) => {
            warn!(error = %e, "failed to execute package manager under proxy mode");
            None
        }
    }
}

/// Point the child process at the local proxy and trust its CA (§6, env var table).
fn set_child_env_vars(ca: &CertificateAuthority, port: u16) {
    let proxy_url = format!("http://127.0.0.1:{port}");
    let pem_path = ca.ca_pem_path().display().to_string();
    std::env::set_var("HTTPS_PROXY", &proxy_url);
    std::env::set_var("HTTP_PROXY", &proxy_url);
    std::env::set_var("NODE_EXTRA_CA_CERTS", &pem_path);
    std::env::set_var("SSL_CERT_FILE", &pem_path);
    std::env::set_var("REQUESTS_CA_BUNDLE", &pem_path);
    std::env::set_var("PIP_CERT", &pem_path);
    std::env::set_var("PIP_PROXY", &proxy_url);
}
