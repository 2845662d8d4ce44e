//! The transitive dependency resolver (C2): walks direct install targets out to a
//! bounded depth, deduplicating by fingerprint and fanning out across a bounded worker
//! pool so large dependency trees resolve concurrently rather than one request at a time.

use crate::client::EcosystemClient;
use crate::error::{RegistryError, RegistryResult};
use pmg_common::{Fingerprint, PackageInstallTarget, PackageVersion};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify, Semaphore};
use tracing::{debug, warn};

/// Tunables for one resolution run.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub max_depth: u32,
    pub include_dev_dependencies: bool,
    pub max_concurrency: usize,
    /// Abort the whole resolution on the first registry error rather than skipping the
    /// offending subtree and continuing.
    pub fail_fast: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            include_dev_dependencies: false,
            max_concurrency: 10,
            fail_fast: false,
        }
    }
}

/// One resolved node in the dependency closure, with its distance from a root install
/// target.
#[derive(Debug, Clone)]
pub struct ResolvedDependency {
    pub package: PackageVersion,
    pub depth: u32,
    pub dev: bool,
}

struct SharedState {
    visited: Mutex<HashSet<Fingerprint>>,
    results: Mutex<Vec<ResolvedDependency>>,
    errors: Mutex<Vec<RegistryError>>,
    /// Count of in-flight resolve tasks (spawned but not yet finished). The root waiter
    /// blocks on `idle` until this drops to zero, which only happens once every task a
    /// given task transitively spawned has also finished.
    pending: AtomicUsize,
    idle: Notify,
}

impl SharedState {
    fn spawn_one(self: &Arc<Self>) {
        self.pending.fetch_add(1, Ordering::SeqCst);
    }

    fn finish_one(self: &Arc<Self>) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_one();
        }
    }
}

/// Walk the transitive dependency closure of `targets` against `client`, to a depth of
/// `config.max_depth`, deduplicating by fingerprint (I2: a package visited once at any
/// depth is never re-queued) so diamond-shaped dependency graphs resolve each node
/// exactly once (P1).
pub async fn resolve_transitive(
    client: Arc<dyn EcosystemClient>,
    targets: &[PackageInstallTarget],
    config: &ResolverConfig,
) -> RegistryResult<Vec<ResolvedDependency>> {
    let state = Arc::new(SharedState {
        visited: Mutex::new(HashSet::new()),
        results: Mutex::new(Vec::new()),
        errors: Mutex::new(Vec::new()),
        pending: AtomicUsize::new(0),
        idle: Notify::new(),
    });
    let semaphore = Arc::new(Semaphore::new(config.max_concurrency.max(1)));

    if targets.is_empty() {
        return Ok(Vec::new());
    }

    for target in targets {
        let pkg = target.pkg_version.clone();
        state.spawn_one();
        spawn_resolve(
            Arc::clone(&client),
            Arc::clone(&state),
            Arc::clone(&semaphore),
            pkg,
            0,
            false,
            config.clone(),
        );
    }

    while state.pending.load(Ordering::SeqCst) > 0 {
        state.idle.notified().await;
    }

    if config.fail_fast {
        let errors = state.errors.lock().await;
        if let Some(first) = errors.first() {
            return Err(clone_error(first));
        }
    } else {
        for err in state.errors.lock().await.iter() {
            warn!(error = %err, "skipping subtree after registry error");
        }
    }

    let results = state.results.lock().await;
    Ok(results.clone())
}

/// Caller must have already counted this unit of work via `state.spawn_one()`.
fn spawn_resolve(
    client: Arc<dyn EcosystemClient>,
    state: Arc<SharedState>,
    semaphore: Arc<Semaphore>,
    pkg: PackageVersion,
    depth: u32,
    dev: bool,
    config: ResolverConfig,
) {
    tokio::spawn(async move {
        let _permit = semaphore.acquire().await.expect("semaphore never closed");

        let fingerprint = pkg.fingerprint();
        {
            let mut visited = state.visited.lock().await;
            if visited.contains(&fingerprint) {
                state.finish_one();
                return;
            }
            visited.insert(fingerprint.clone());
        }

        let resolved_version = if pkg.version.is_empty() || pkg.version == "latest" {
            match client.resolve_latest_version(&pkg.name).await {
                Ok(v) => v,
                Err(e) => {
                    state.errors.lock().await.push(e);
                    state.finish_one();
                    return;
                }
            }
        } else {
            pkg.version.clone()
        };
        let resolved = PackageVersion::new(pkg.ecosystem, pkg.name.clone(), resolved_version);

        state.results.lock().await.push(ResolvedDependency {
            package: resolved.clone(),
            depth,
            dev,
        });

        if depth >= config.max_depth {
            debug!(package = %resolved, depth, "max depth reached, not descending further");
            state.finish_one();
            return;
        }

        let deps = match client
            .resolve_dependencies(&resolved, config.include_dev_dependencies)
            .await
        {
            Ok(deps) => deps,
            Err(e) => {
                state.errors.lock().await.push(e);
                state.finish_one();
                return;
            }
        };

        for dep in deps {
            let child_version = match client.resolve_version_spec(&dep.name, &dep.version_spec).await {
                Ok(v) => v,
                Err(e) => {
                    state.errors.lock().await.push(e);
                    continue;
                }
            };
            let child_pkg = PackageVersion::new(resolved.ecosystem, dep.name.clone(), child_version);
            state.spawn_one();
            spawn_resolve(
                Arc::clone(&client),
                Arc::clone(&state),
                Arc::clone(&semaphore),
                child_pkg,
                depth + 1,
                dep.dev,
                config.clone(),
            );
        }

        state.finish_one();
    });
}

fn clone_error(err: &RegistryError) -> RegistryError {
    // `RegistryError` isn't `Clone` (it wraps `Duration`/`String` only, so this is just
    // to avoid adding a derive that would ripple into `PmgError`'s own error taxonomy).
    match err {
        RegistryError::NotFound { name, version } => RegistryError::NotFound {
            name: name.clone(),
            version: version.clone(),
        },
        RegistryError::RateLimited { retry_after } => RegistryError::RateLimited {
            retry_after: *retry_after,
        },
        RegistryError::Network { message } => RegistryError::Network {
            message: message.clone(),
        },
        RegistryError::InvalidResponse { message } => RegistryError::InvalidResponse {
            message: message.clone(),
        },
        RegistryError::NoMatchingVersion { name, constraint } => RegistryError::NoMatchingVersion {
            name: name.clone(),
            constraint: constraint.clone(),
        },
        RegistryError::Manifest { message } => RegistryError::Manifest {
            message: message.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RawDependency;
    use async_trait::async_trait;
    use pmg_common::Ecosystem;
    use std::collections::HashMap;

    struct FakeClient {
        deps: HashMap<String, Vec<RawDependency>>,
    }

    #[async_trait]
    impl EcosystemClient for FakeClient {
        fn ecosystem(&self) -> Ecosystem {
            Ecosystem::Npm
        }

        async fn resolve_latest_version(&self, _name: &str) -> RegistryResult<String> {
            Ok("1.0.0".to_string())
        }

        async fn resolve_dependencies(
            &self,
            pkg: &PackageVersion,
            _include_dev: bool,
        ) -> RegistryResult<Vec<RawDependency>> {
            Ok(self.deps.get(&pkg.name).cloned().unwrap_or_default())
        }

        async fn resolve_version_spec(&self, _name: &str, _spec: &str) -> RegistryResult<String> {
            Ok("1.0.0".to_string())
        }
    }

    #[tokio::test]
    async fn diamond_dependency_resolved_once() {
        // root -> {a, b}, a -> c, b -> c
        let mut deps = HashMap::new();
        deps.insert(
            "root".to_string(),
            vec![
                RawDependency { name: "a".into(), version_spec: "".into(), dev: false },
                RawDependency { name: "b".into(), version_spec: "".into(), dev: false },
            ],
        );
        deps.insert(
            "a".to_string(),
            vec![RawDependency { name: "c".into(), version_spec: "".into(), dev: false }],
        );
        deps.insert(
            "b".to_string(),
            vec![RawDependency { name: "c".into(), version_spec: "".into(), dev: false }],
        );
        let client: Arc<dyn EcosystemClient> = Arc::new(FakeClient { deps });

        let targets = vec![PackageInstallTarget::new(PackageVersion::new(
            Ecosystem::Npm,
            "root",
            "1.0.0",
        ))];
        let results = resolve_transitive(client, &targets, &ResolverConfig::default())
            .await
            .unwrap();

        let c_count = results.iter().filter(|r| r.package.name == "c").count();
        assert_eq!(c_count, 1, "c should only be resolved once despite two paths");
    }

    #[tokio::test]
    async fn depth_limit_stops_descent() {
        let mut deps = HashMap::new();
        deps.insert(
            "root".to_string(),
            vec![RawDependency { name: "a".into(), version_spec: "".into(), dev: false }],
        );
        deps.insert(
            "a".to_string(),
            vec![RawDependency { name: "b".into(), version_spec: "".into(), dev: false }],
        );
        let client: Arc<dyn EcosystemClient> = Arc::new(FakeClient { deps });

        let targets = vec![PackageInstallTarget::new(PackageVersion::new(
            Ecosystem::Npm,
            "root",
            "1.0.0",
        ))];
        let config = ResolverConfig {
            max_depth: 1,
            ..ResolverConfig::default()
        };
        let results = resolve_transitive(client, &targets, &config).await.unwrap();
        assert!(results.iter().any(|r| r.package.name == "a"));
        assert!(!results.iter().any(|r| r.package.name == "b"));
    }
}
