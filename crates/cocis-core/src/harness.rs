//! Demo scenarios and stress runs
//!
//! Backs the `cocis demo` and `cocis stress` subcommands.

use crate::cocis::Cocis;
use crate::config::{CocisConfig, GuardScope};
use crate::error::CocisResult;
use cocis_builder::{BuilderSchema, BuilderSession, ValidationMode};
use cocis_factory::{product, Policy, Product};
use cocis_guard::{AccessPath, SingletonCell, SingletonGuard, TypeKey};
use cocis_types::{ConstructionError, ConstructionResult, ErrorKind, Params};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Instant;

/// Outcome of one demo scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioOutcome {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

/// Report of `cocis demo`
#[derive(Debug, Clone, Serialize)]
pub struct DemoReport {
    pub version: &'static str,
    pub guard_scope: GuardScope,
    pub scenarios: Vec<ScenarioOutcome>,
}

impl DemoReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.scenarios.iter().all(|s| s.passed)
    }

    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut out = format!(
            "COCIS demo (v{}, {:?} guard)\n",
            self.version, self.guard_scope
        );
        for s in &self.scenarios {
            let mark = if s.passed { "PASS" } else { "FAIL" };
            let _ = writeln!(out, "  [{mark}] {}: {}", s.name, s.detail);
        }
        let _ = write!(
            out,
            "Status: {}",
            if self.passed() { "PASSED" } else { "FAILED" }
        );
        out
    }

    /// Encode as pretty JSON
    ///
    /// # Errors
    /// Returns `Serialization` if encoding fails
    pub fn to_json(&self) -> CocisResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Connection {
    host: String,
    serial: usize,
}

impl Product for Connection {
    fn kind(&self) -> &str {
        "connection"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn value_eq(&self, other: &dyn Product) -> bool {
        product::value_eq(self, other)
    }
}

fn register_connection(cocis: &Cocis, name: &str, policy: Policy) -> CocisResult<Arc<AtomicUsize>> {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    cocis.register(name, policy, move |ctx| {
        Ok(Connection {
            host: ctx.text("host").unwrap_or("localhost").to_string(),
            serial: counter.fetch_add(1, Ordering::SeqCst),
        })
    })?;
    Ok(calls)
}

fn outcome(name: &'static str, result: CocisResult<String>) -> ScenarioOutcome {
    match result {
        Ok(detail) => ScenarioOutcome {
            name,
            passed: true,
            detail,
        },
        Err(e) => ScenarioOutcome {
            name,
            passed: false,
            detail: e.to_string(),
        },
    }
}

fn ensure(condition: bool, what: &str) -> CocisResult<()> {
    if condition {
        Ok(())
    } else {
        Err(ConstructionError::invalid_argument("scenario", what).into())
    }
}

fn expect_kind<T>(result: ConstructionResult<T>, kind: ErrorKind) -> CocisResult<ConstructionError> {
    match result {
        Err(e) if e.kind() == kind => Ok(e),
        Err(e) => Err(e.into()),
        Ok(_) => Err(ConstructionError::invalid_argument("scenario", format!("expected {kind:?}")).into()),
    }
}

fn singleton_factory(cocis: &Cocis) -> CocisResult<String> {
    let calls = register_connection(cocis, "pool-connection", Policy::Singleton)?;
    let a = cocis.create("pool-connection", &Params::new())?;
    let b = cocis.create("pool-connection", &Params::new())?;
    ensure(a.same_instance(&b) && a == b, "singleton instances differ")?;
    let calls = calls.load(Ordering::SeqCst);
    ensure(calls == 1, "constructor ran more than once")?;
    Ok(format!("two creates, one instance, constructor invoked {calls}x"))
}

fn cached_interning(cocis: &Cocis) -> CocisResult<String> {
    let calls = register_connection(cocis, "connection", Policy::Cached)?;
    let db = Params::new().with("host", "db");
    let a = cocis.create("connection", &db)?;
    let b = cocis.create("connection", &db)?;
    let c = cocis.create("connection", &Params::new().with("host", "cache"))?;
    ensure(a == b, "equal params produced distinct instances")?;
    ensure(a != c, "distinct params shared an instance")?;
    let calls = calls.load(Ordering::SeqCst);
    ensure(calls == 2, "unexpected producer invocations")?;
    Ok(format!("3 creates over 2 keys, {calls} constructions"))
}

fn rectangle_schema() -> ConstructionResult<Arc<BuilderSchema>> {
    BuilderSchema::builder("rectangle")
        .required_int("width", 1, 10_000)
        .required_int("height", 1, 10_000)
        .optional("color", "black")
        .finish()
}

fn rectangle_builder(_: &Cocis) -> CocisResult<String> {
    let schema = rectangle_schema()?;

    let mut session = BuilderSession::staged(Arc::clone(&schema));
    session.set("height", 3)?;
    let missing = expect_kind(session.build(), ErrorKind::MissingRequiredField)?;

    let rect = session.set("width", 4)?.build()?;
    ensure(rect.text("color")? == "black", "color default not applied")?;
    expect_kind(session.build(), ErrorKind::BuilderAlreadyConsumed)?;

    Ok(format!(
        "{}x{} {} built; without width: {missing}",
        rect.int("width")?,
        rect.int("height")?,
        rect.text("color")?
    ))
}

fn validation_modes(_: &Cocis) -> CocisResult<String> {
    let zoom = |v: &cocis_builder::FieldView<'_>| match (v.int("zoom_min"), v.int("zoom_max")) {
        (Some(lo), Some(hi)) if lo > hi => Err(format!("zoom_min {lo} exceeds zoom_max {hi}")),
        _ => Ok(()),
    };
    let immediate = BuilderSchema::builder("viewport")
        .optional_int("zoom_min", 1, 1, 100)
        .optional_int("zoom_max", 10, 1, 100)
        .group("zoom", &["zoom_min", "zoom_max"], ValidationMode::Immediate, zoom)
        .finish()?;
    let deferred = BuilderSchema::builder("viewport")
        .optional_int("zoom_min", 1, 1, 100)
        .optional_int("zoom_max", 10, 1, 100)
        .group("zoom", &["zoom_min", "zoom_max"], ValidationMode::Deferred, zoom)
        .finish()?;

    let mut fast = BuilderSession::staged(immediate);
    fast.set("zoom_max", 20)?;
    expect_kind(fast.set("zoom_min", 50).map(|_| ()), ErrorKind::InvalidArgument)?;

    let mut late = BuilderSession::staged(deferred);
    late.set("zoom_min", 50)?;
    expect_kind(late.build(), ErrorKind::InvalidArgument)?;

    Ok("immediate group rejected in setter, deferred group rejected in build".to_string())
}

fn round_trip_identity(cocis: &Cocis) -> CocisResult<String> {
    let cell: SingletonCell<Connection> = cocis.singleton(TypeKey::named("primary-connection"));
    let live = cell.get_or_try_init(|_| {
        Ok(Arc::new(Connection {
            host: "primary".to_string(),
            serial: 0,
        }))
    })?;
    let json = cell.persist()?.to_json()?;
    let restored = cell.restore_json(&json)?;
    ensure(Arc::ptr_eq(&live, &restored), "restore minted a second instance")?;
    ensure(
        cocis.guard().issued_count() >= 1,
        "restore did not resolve the issued token",
    )?;
    Ok(format!("persisted {} bytes, restored to the live instance", json.len()))
}

fn bypass_rejected(cocis: &Cocis) -> CocisResult<String> {
    let key = TypeKey::named("bypass-target");
    let err = expect_kind(
        cocis.guard().acquire_via(&key, AccessPath::Privileged),
        ErrorKind::PolicyViolation,
    )?;
    cocis.guard().acquire(&key)?;
    expect_kind(cocis.guard().acquire(&key), ErrorKind::PolicyViolation)?;
    Ok(err.to_string())
}

/// Run every reference scenario against a facade built from `config`
///
/// With [`GuardScope::Process`] the scenarios claim tokens on the process-wide
/// guard, so a second run in the same process reports them as refused.
#[must_use]
pub fn run_demo(config: &CocisConfig) -> DemoReport {
    let cocis = Cocis::new(config.clone());
    let scenarios: [(&'static str, fn(&Cocis) -> CocisResult<String>); 6] = [
        ("singleton factory", singleton_factory),
        ("cached interning", cached_interning),
        ("rectangle builder", rectangle_builder),
        ("validation modes", validation_modes),
        ("round-trip identity", round_trip_identity),
        ("privileged bypass", bypass_rejected),
    ];
    DemoReport {
        version: crate::VERSION,
        guard_scope: config.guard.scope,
        scenarios: scenarios
            .into_iter()
            .map(|(name, run)| outcome(name, run(&cocis)))
            .collect(),
    }
}

/// Report of `cocis stress`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StressReport {
    pub threads: usize,
    pub iterations: usize,
    /// Constructor invocations for cached keys; one per key when correct
    pub producer_invocations: usize,
    /// Singleton constructor invocations; one when correct
    pub singleton_constructions: usize,
    pub tokens_granted: usize,
    pub tokens_refused: usize,
    pub elapsed_ms: u128,
}

impl StressReport {
    #[must_use]
    pub fn success(&self) -> bool {
        self.producer_invocations == self.iterations
            && self.singleton_constructions == 1
            && self.tokens_granted == self.iterations
            && self.tokens_refused == self.iterations * (self.threads - 1)
    }

    #[must_use]
    pub fn generate_text(&self) -> String {
        format!(
            "Stress Test Report:\n  Threads: {}\n  Iterations: {}\n  Producer invocations: {}\n  Singleton constructions: {}\n  Tokens granted: {}\n  Tokens refused: {}\n  Elapsed: {}ms\n  Success: {}",
            self.threads,
            self.iterations,
            self.producer_invocations,
            self.singleton_constructions,
            self.tokens_granted,
            self.tokens_refused,
            self.elapsed_ms,
            self.success()
        )
    }
}

/// Contend `stress.threads` workers on `stress.iterations` cached keys, guard
/// tokens and one singleton name, using the guard `config` selects
///
/// # Errors
/// Returns the first unexpected construction error
pub fn run_stress(config: &CocisConfig) -> CocisResult<StressReport> {
    let threads = config.stress.threads.max(1);
    let iterations = config.stress.iterations;
    let cocis = Cocis::new(config.clone());
    let produced = register_connection(&cocis, "stress-cached", Policy::Cached)?;
    let singletons = register_connection(&cocis, "stress-singleton", Policy::Singleton)?;
    let guard: &SingletonGuard = cocis.guard();
    let barrier = Barrier::new(threads);
    let granted = AtomicUsize::new(0);
    let refused = AtomicUsize::new(0);

    tracing::info!(threads, iterations, "stress run starting");
    let start = Instant::now();

    std::thread::scope(|scope| -> CocisResult<()> {
        let workers: Vec<_> = (0..threads)
            .map(|_| {
                scope.spawn(|| -> ConstructionResult<()> {
                    barrier.wait();
                    let first = cocis.registry().create("stress-singleton", &Params::new())?;
                    for i in 0..iterations {
                        let params = Params::new().with("host", format!("host-{i}"));
                        cocis.registry().create("stress-cached", &params)?;
                        match guard.acquire(&TypeKey::named(format!("stress:{i}"))) {
                            Ok(_) => granted.fetch_add(1, Ordering::Relaxed),
                            Err(e) if e.kind() == ErrorKind::PolicyViolation => {
                                refused.fetch_add(1, Ordering::Relaxed)
                            }
                            Err(e) => return Err(e),
                        };
                    }
                    let last = cocis.registry().create("stress-singleton", &Params::new())?;
                    if first.same_instance(&last) {
                        Ok(())
                    } else {
                        Err(ConstructionError::invalid_argument(
                            "stress-singleton",
                            "observed two instances",
                        ))
                    }
                })
            })
            .collect();

        for worker in workers {
            match worker.join() {
                Ok(result) => result?,
                Err(_) => {
                    return Err(ConstructionError::producer_failed("stress", "worker panicked").into())
                }
            }
        }
        Ok(())
    })?;

    let report = StressReport {
        threads,
        iterations,
        producer_invocations: produced.load(Ordering::SeqCst),
        singleton_constructions: singletons.load(Ordering::SeqCst),
        tokens_granted: granted.load(Ordering::Relaxed),
        tokens_refused: refused.load(Ordering::Relaxed),
        elapsed_ms: start.elapsed().as_millis(),
    };
    tracing::info!(success = report.success(), elapsed_ms = %report.elapsed_ms, "stress run finished");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn isolated() -> CocisConfig {
        CocisConfig::default().with_guard_scope(GuardScope::Isolated)
    }

    #[test]
    fn demo_scenarios_pass() {
        let report = run_demo(&isolated());
        for s in &report.scenarios {
            assert!(s.passed, "{}: {}", s.name, s.detail);
        }
        assert!(report.generate_text().ends_with("PASSED"));
    }

    #[test]
    fn demo_report_serializes() {
        let json = run_demo(&isolated()).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["scenarios"].as_array().map(Vec::len), Some(6));
    }

    #[test]
    fn stress_run_is_consistent() {
        let report = run_stress(&isolated().with_stress(4, 64)).unwrap();
        assert_eq!(report.producer_invocations, 64);
        assert_eq!(report.singleton_constructions, 1);
        assert_eq!(report.tokens_granted, 64);
        assert_eq!(report.tokens_refused, 64 * 3);
        assert!(report.success());
    }

    #[test]
    fn demo_uses_the_configured_guard() {
        let config = CocisConfig::default().with_guard_scope(GuardScope::Process);
        let report = run_demo(&config);

        assert_eq!(report.guard_scope, GuardScope::Process);
        assert!(report.passed(), "{}", report.generate_text());
        assert!(SingletonGuard::global().is_acquired(&TypeKey::named("bypass-target")));
    }

    #[test]
    fn stress_reads_sizes_from_config() {
        let report = run_stress(&isolated().with_stress(2, 8)).unwrap();
        assert_eq!((report.threads, report.iterations), (2, 8));
        assert!(report.success());
    }
}
