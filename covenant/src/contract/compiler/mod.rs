// Copyright Judica, Inc 2021
//
// This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The primary compilation traits and types
use super::actions::{Factory, PathKind, PathSpec};
use super::{
    BoundContract, CompilationError, Compiled, Context, Fields, NestedContract, Registry,
};
use crate::template::{Builder, Template};
use crate::util::amountrange::AmountRange;
use crate::CompilerConfig;
use bitcoin::hashes::sha256;
use bitcoin::util::amount::Amount;
use covenant_base::timelocks::AnyTimeLock;
use covenant_base::Clause;
use log::{debug, warn};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

mod cache;
pub mod deriver;
use cache::{GuardCache, OnceMap};
pub use deriver::{Derived, Deriver};

const LOG_TARGET: &str = "covenant::compiler";

/// Compilable is a trait for anything which can be compiled
pub trait Compilable {
    /// Compile a compilable object returning errors, if any.
    fn compile(&self, ctx: Context) -> Result<Arc<Compiled>, CompilationError>;
}

/// Implements a basic identity
impl Compilable for Compiled {
    fn compile(&self, _ctx: Context) -> Result<Arc<Compiled>, CompilationError> {
        Ok(Arc::new(self.clone()))
    }
}

impl Compilable for NestedContract {
    /// Binds the amount being sent (the context's funds) into the amount
    /// field if there is one, then compiles the bound contract.
    fn compile(&self, ctx: Context) -> Result<Arc<Compiled>, CompilationError> {
        let mut provided = self.fields.clone();
        if let Some(f) = &self.amount_field {
            provided.insert(f.clone(), Value::from(ctx.funds().as_sat()));
        }
        ctx.compiler().registry().bind(&self.kind, provided)?.compile(ctx)
    }
}

impl Compilable for BoundContract {
    fn compile(&self, ctx: Context) -> Result<Arc<Compiled>, CompilationError> {
        let ctx = ctx.enter(self.fingerprint())?;
        let compiler = ctx.compiler().clone();
        let key = (self.fingerprint(), ctx.funds().as_sat());
        let depth = ctx.depth();
        compiler.contracts.get_or_try_init(
            &key,
            || CompilationError::RecursionLimit { depth },
            || compile_contract(self, ctx).map(Arc::new),
        )
    }
}

/// What one path contributes: its script clause and its templates (none for
/// an unlock entry).
#[derive(Debug, Clone)]
pub struct PathOutcome {
    /// `guard AND (one of the template hashes)`, or the unlock guard
    pub clause: Clause,
    /// finalized templates in generation order
    pub templates: Vec<Template>,
}

/// The per-path result of compiling every path of a contract.
pub type PathReport = BTreeMap<String, Result<PathOutcome, CompilationError>>;

/// Owns the configuration, the registry of contract kinds, and the shared
/// caches. Cheap to share between threads behind an `Arc`.
pub struct Compiler {
    config: CompilerConfig,
    registry: Registry,
    contracts: OnceMap<(sha256::Hash, u64), Arc<Compiled>>,
    deriver: Deriver,
}

impl Compiler {
    /// a compiler for `config.network` resolving kinds from `registry`
    pub fn new(config: CompilerConfig, registry: Registry) -> Arc<Self> {
        Arc::new(Compiler {
            deriver: Deriver::new(config.network),
            contracts: OnceMap::new("contract"),
            config,
            registry,
        })
    }

    /// settings
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }
    /// known contract kinds
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
    /// the shared clause to script deriver
    pub fn deriver(&self) -> &Deriver {
        &self.deriver
    }
    /// number of distinct (contract, amount) pairs compiled so far
    pub fn cached_contracts(&self) -> usize {
        self.contracts.len()
    }

    /// Compile `contract` funded with `amount`.
    pub fn compile(
        self: &Arc<Self>,
        contract: &BoundContract,
        amount: Amount,
    ) -> Result<Arc<Compiled>, CompilationError> {
        Context::new(self.clone(), amount).compile(contract)
    }

    /// Bind `fields` to the kind registered as `kind` and compile it.
    pub fn compile_kind(
        self: &Arc<Self>,
        kind: &str,
        fields: Map<String, Value>,
        amount: Amount,
    ) -> Result<Arc<Compiled>, CompilationError> {
        let bound = self.registry.bind(kind, fields)?;
        self.compile(&bound, amount)
    }

    /// Compile every path of `contract` independently, without deriving its
    /// address, and report each path's outcome. Errors that prevent any path
    /// from running (bad registry, recursion) are returned directly.
    pub fn compile_paths(
        self: &Arc<Self>,
        contract: &BoundContract,
        amount: Amount,
    ) -> Result<PathReport, CompilationError> {
        let ctx = Context::new(self.clone(), amount).enter(contract.fingerprint())?;
        Ok(run_paths(contract, &ctx)?
            .into_iter()
            .map(|(spec, r)| (spec.name.to_string(), r))
            .collect())
    }
}

/// Every registered path of `contract`, each compiled independently so one
/// failing path never stops its siblings.
fn run_paths(
    contract: &BoundContract,
    ctx: &Context,
) -> Result<Vec<(PathSpec, Result<PathOutcome, CompilationError>)>, CompilationError> {
    let registry = contract.kind().paths();
    registry.validate()?;
    let mut guards = GuardCache::new();
    Ok(registry
        .iter()
        .map(|spec| {
            debug!(target: LOG_TARGET, "{}::{} compiling", contract.kind().kind(), spec.name);
            let r = compile_path(spec, contract.fields(), ctx, &mut guards).map_err(|e| {
                CompilationError::PathCompilation {
                    path: spec.name.into(),
                    cause: Box::new(e),
                }
            });
            (*spec, r)
        })
        .collect())
}

fn compile_path(
    spec: &PathSpec,
    fields: &Fields,
    ctx: &Context,
    guards: &mut GuardCache,
) -> Result<PathOutcome, CompilationError> {
    let factory = match spec.kind {
        PathKind::Unlock(g) => {
            return Ok(PathOutcome {
                clause: guards.get(fields, g)?,
                templates: vec![],
            })
        }
        PathKind::Then(factory) => factory,
    };
    let guard = match spec.guard {
        Some(g) => guards.get(fields, g)?,
        None => Clause::Trivial,
    };
    let limit = ctx.compiler().config().max_templates_per_path;
    let builders: Vec<Builder> = match factory {
        Factory::Single(f) => vec![f(fields, ctx.clone())?],
        Factory::Generator(f) => {
            let mut v = vec![];
            for b in f(fields, ctx.clone())? {
                if v.len() == limit {
                    return Err(CompilationError::TooManyTemplates(limit));
                }
                v.push(b?);
            }
            v
        }
    };
    if builders.is_empty() {
        return Err(CompilationError::MissingTemplates);
    }
    let templates = builders
        .into_iter()
        .map(|b| {
            let t = b.finalize(ctx.funds())?;
            check_locks(&guard, &t)?;
            Ok(t)
        })
        .collect::<Result<Vec<Template>, CompilationError>>()?;
    let commitments = Clause::or_any(templates.iter().map(|t| Clause::TxTemplate(t.hash())));
    let clause = Clause::and_all(vec![guard, commitments]).reduce();
    if clause == Clause::Unsatisfiable {
        return Err(CompilationError::EmptyPolicy);
    }
    Ok(PathOutcome { clause, templates })
}

/// Every timelock the guard requires must be set, at least as strictly, in
/// the template's own lock field of the same axis and unit. A lock of the
/// other unit on the same axis can never satisfy the guard.
fn check_locks(guard: &Clause, t: &Template) -> Result<(), CompilationError> {
    for required in guard.required_timelocks() {
        let (met, found, unit_clash) = match required {
            AnyTimeLock::R(r) => (
                t.sequence.and_then(|s| s.covers(&r)),
                t.sequence.map(AnyTimeLock::from),
                CompilationError::IncompatibleSequence,
            ),
            AnyTimeLock::A(a) => (
                t.lock_time.and_then(|l| l.covers(&a)),
                t.lock_time.map(AnyTimeLock::from),
                CompilationError::IncompatibleLockTime,
            ),
        };
        match (met, found) {
            (Some(true), _) => {}
            (None, Some(_)) => return Err(unit_clash),
            (_, found) => return Err(CompilationError::LockMismatch { required, found }),
        }
    }
    Ok(())
}

/// The main Compilation Logic for a Contract.
fn compile_contract(contract: &BoundContract, ctx: Context) -> Result<Compiled, CompilationError> {
    let kind = contract.kind().kind();
    let mut amount_range = AmountRange::new();
    amount_range.update_range(ctx.funds());
    let mut templates = BTreeMap::new();
    let mut failed_paths = BTreeMap::new();
    let mut branches = vec![];
    for (spec, r) in run_paths(contract, &ctx)? {
        match r {
            Ok(outcome) => {
                branches.push(outcome.clause);
                for t in &outcome.templates {
                    amount_range.update_range(t.total_amount());
                }
                if !outcome.templates.is_empty() {
                    templates.insert(spec.name.to_string(), outcome.templates);
                }
            }
            Err(e) if spec.optional && !e.is_fatal() => {
                warn!(target: LOG_TARGET, "{}::{} skipped: {}", kind, spec.name, e);
                failed_paths.insert(spec.name.to_string(), e.to_string());
            }
            Err(e) => return Err(e),
        }
    }
    if branches.is_empty() {
        return Err(CompilationError::EmptyPolicy);
    }
    let derived = ctx.compiler().deriver().derive(&Clause::or_any(branches))?;
    debug!(target: LOG_TARGET, "{} compiled to {} at depth {}", kind, derived.address, ctx.depth());
    Ok(Compiled {
        kind: kind.into(),
        fingerprint: contract.fingerprint(),
        fields: contract.fields().clone(),
        address: derived.address.clone(),
        script_pubkey: derived.script_pubkey.clone(),
        witness_script: derived.witness_script.clone(),
        policy: derived.policy.clone(),
        miniscript: derived.miniscript.clone(),
        amount: ctx.funds(),
        templates,
        failed_paths,
        amount_range,
        metadata: contract.kind().metadata(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::actions::ThenFn;
    use crate::contract::{ContractType, FieldDecl, FieldType, PathRegistry, TxTmplIt};
    use covenant_base::timelocks::{RelHeight, RelTime};
    use once_cell::sync::Lazy;
    use serde_json::json;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Barrier};
    use std::time::Duration;

    const KEY: &str = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

    fn addr() -> bitcoin::Address {
        bitcoin::Address::from_str("bc1qxy2kgdygjrsqtzq2n0yrf2493p83kkfjhx0wlh").unwrap()
    }

    fn timed_key(f: &Fields) -> Result<Clause, CompilationError> {
        Ok(Clause::and_all(vec![
            Clause::key(f.key("key")?),
            Clause::older(f.rel_time("timeout")?),
        ]))
    }
    fn key_only(f: &Fields) -> Result<Clause, CompilationError> {
        Ok(Clause::key(f.key("key")?))
    }
    fn pay_all(_: &Fields, ctx: Context) -> Result<Builder, CompilationError> {
        let amt = ctx.funds();
        Ok(ctx.template().add_output(amt, addr()).drain())
    }
    fn nothing<'a>(_: &'a Fields, _ctx: Context) -> TxTmplIt<'a> {
        Ok(Box::new(std::iter::empty()))
    }

    const FIELDS: &[FieldDecl] = &[
        FieldDecl::required("key", FieldType::PubKey),
        FieldDecl::required("timeout", FieldType::RelTimeSpec),
    ];

    /// `strict` decides whether the badly locked path is optional
    struct Tester {
        strict: bool,
    }
    impl ContractType for Tester {
        fn kind(&self) -> &'static str {
            "tester"
        }
        fn fields(&self) -> &'static [FieldDecl] {
            FIELDS
        }
        fn paths(&self) -> PathRegistry {
            let r = PathRegistry::new()
                .then("pay", None, pay_all)
                .unlock("backdoor", key_only)
                .then("locked", Some(timed_key), pay_all);
            if self.strict {
                r
            } else {
                r.optional()
            }
        }
    }

    fn compiler(strict: bool) -> Arc<Compiler> {
        Compiler::new(
            CompilerConfig::default(),
            Registry::new().register(Arc::new(Tester { strict })),
        )
    }
    fn obj(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }
    fn fields() -> Map<String, Value> {
        obj(json!({"key": KEY, "timeout": {"relative_height": 144}}))
    }

    /// Pays half of its funds to an address and the rest to another copy of
    /// itself with the same fields, until it holds less than 100. With
    /// `shrink` off it is "echo", which passes all of its funds to itself.
    struct Halve {
        shrink: bool,
    }
    const HALVE_FIELDS: &[FieldDecl] = &[FieldDecl::required("key", FieldType::PubKey)];
    fn again(kind: &str, f: &Fields) -> Result<NestedContract, CompilationError> {
        Ok(NestedContract::new(kind, json!({"key": f.raw("key")?})))
    }
    fn halve(f: &Fields, ctx: Context) -> Result<Builder, CompilationError> {
        let funds = ctx.funds();
        if funds < Amount::from_sat(100) {
            return Ok(ctx.template().add_output(funds, addr()).drain());
        }
        let half = Amount::from_sat(funds.as_sat() / 2);
        Ok(ctx
            .template()
            .add_output(half, addr())
            .add_output(funds - half, again("halve", f)?)
            .drain())
    }
    fn echo(f: &Fields, ctx: Context) -> Result<Builder, CompilationError> {
        let funds = ctx.funds();
        Ok(ctx.template().add_output(funds, again("echo", f)?).drain())
    }
    impl ContractType for Halve {
        fn kind(&self) -> &'static str {
            if self.shrink {
                "halve"
            } else {
                "echo"
            }
        }
        fn fields(&self) -> &'static [FieldDecl] {
            HALVE_FIELDS
        }
        fn paths(&self) -> PathRegistry {
            let split: ThenFn = if self.shrink { halve } else { echo };
            PathRegistry::new().then("split", None, split)
        }
    }

    static BOTH_COMPILING: Lazy<Barrier> = Lazy::new(|| Barrier::new(2));
    static PASSES: AtomicUsize = AtomicUsize::new(0);

    /// `ping{n}` pays everything to `ping{1-n}`. The first two passes wait
    /// for each other, so two threads each start filling their own ping
    /// before either asks for the other's.
    struct Ping;
    const PING_FIELDS: &[FieldDecl] = &[FieldDecl::required("n", FieldType::Int)];
    fn pass(f: &Fields, ctx: Context) -> Result<Builder, CompilationError> {
        if PASSES.fetch_add(1, Ordering::SeqCst) < 2 {
            BOTH_COMPILING.wait();
        }
        let other = NestedContract::new("ping", json!({"n": 1 - f.int("n")?}));
        let funds = ctx.funds();
        Ok(ctx.template().add_output(funds, other).drain())
    }
    impl ContractType for Ping {
        fn kind(&self) -> &'static str {
            "ping"
        }
        fn fields(&self) -> &'static [FieldDecl] {
            PING_FIELDS
        }
        fn paths(&self) -> PathRegistry {
            PathRegistry::new().then("pass", None, pass)
        }
    }

    #[test]
    fn optional_lock_mismatch_is_skipped() {
        let c = compiler(false);
        let out = c
            .compile_kind("tester", fields(), Amount::from_sat(1000))
            .unwrap();
        assert!(out.path("pay").is_some());
        assert!(out.path("locked").is_none());
        assert!(out.failed_paths.contains_key("locked"));
        assert_eq!(out.ctv_hashes().len(), 1);
        assert!(out.miniscript.contains(KEY));
    }

    #[test]
    fn required_lock_mismatch_fails() {
        let c = compiler(true);
        let err = c
            .compile_kind("tester", fields(), Amount::from_sat(1000))
            .unwrap_err();
        match err {
            CompilationError::PathCompilation { path, cause } => {
                assert_eq!(path, "locked");
                assert!(matches!(*cause, CompilationError::LockMismatch { found: None, .. }));
            }
            e => panic!("unexpected {:?}", e),
        }
    }

    #[test]
    fn path_report_keeps_siblings() {
        let c = compiler(true);
        let b = c.registry().bind("tester", fields()).unwrap();
        let report = c.compile_paths(&b, Amount::from_sat(1000)).unwrap();
        assert_eq!(report.len(), 3);
        assert!(report["pay"].is_ok());
        assert!(report["backdoor"].as_ref().unwrap().templates.is_empty());
        assert!(report["locked"].is_err());
    }

    #[test]
    fn lock_checks() {
        let c = compiler(true);
        let f = c.registry().bind("tester", fields()).unwrap();
        let ctx = Context::new(c.clone(), Amount::from_sat(10));
        let t = pay_all(f.fields(), ctx.clone())
            .unwrap()
            .set_sequence(RelHeight::from(200).into())
            .unwrap()
            .finalize(ctx.funds())
            .unwrap();
        let guard = timed_key(f.fields()).unwrap();
        assert!(check_locks(&guard, &t).is_ok());
        // the same template with a shorter wait does not satisfy the guard
        let short = pay_all(f.fields(), ctx)
            .unwrap()
            .set_sequence(RelHeight::from(10).into())
            .unwrap()
            .finalize(Amount::from_sat(10))
            .unwrap();
        assert!(check_locks(&guard, &short).is_err());
        let seconds = pay_all(f.fields(), Context::new(c, Amount::from_sat(10)))
            .unwrap()
            .set_sequence(RelTime::from(200).into())
            .unwrap()
            .finalize(Amount::from_sat(10))
            .unwrap();
        assert_eq!(
            check_locks(&guard, &seconds).err(),
            Some(CompilationError::IncompatibleSequence)
        );
    }

    #[test]
    fn empty_generator() {
        let c = compiler(true);
        let b = c.registry().bind("tester", fields()).unwrap();
        let spec = PathRegistry::new().generator("none", None, nothing);
        let spec = spec.get("none").unwrap();
        let ctx = Context::new(c, Amount::from_sat(10));
        assert_eq!(
            compile_path(spec, b.fields(), &ctx, &mut GuardCache::new()).err(),
            Some(CompilationError::MissingTemplates)
        );
    }

    #[test]
    fn memoized_by_fields_and_amount() {
        let c = compiler(false);
        let a = c.compile_kind("tester", fields(), Amount::from_sat(1000)).unwrap();
        let b = c.compile_kind("tester", fields(), Amount::from_sat(1000)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        let d = c.compile_kind("tester", fields(), Amount::from_sat(999)).unwrap();
        assert_eq!(c.cached_contracts(), 2);
        assert_ne!(a.ctv_hashes(), d.ctv_hashes());
    }

    #[test]
    fn shrinking_self_reference_terminates() {
        let c = Compiler::new(
            CompilerConfig::default(),
            Registry::new().register(Arc::new(Halve { shrink: true })),
        );
        let out = c
            .compile_kind("halve", obj(json!({"key": KEY})), Amount::from_sat(400))
            .unwrap();
        let mut amounts = vec![];
        let mut node: Option<&Compiled> = Some(&out);
        while let Some(n) = node {
            amounts.push(n.amount.as_sat());
            node = n.children().next();
        }
        assert_eq!(amounts, vec![400, 200, 100, 50]);
    }

    #[test]
    fn same_funds_self_reference_fails() {
        let c = Compiler::new(
            CompilerConfig::default(),
            Registry::new().register(Arc::new(Halve { shrink: false })),
        );
        let err = c
            .compile_kind("echo", obj(json!({"key": KEY})), Amount::from_sat(400))
            .unwrap_err();
        assert_eq!(err.root_cause(), &CompilationError::RecursionLimit { depth: 2 });
    }

    #[test]
    fn crossed_compiles_fail_instead_of_deadlocking() {
        let c = Compiler::new(CompilerConfig::default(), Registry::new().register(Arc::new(Ping)));
        let (tx, rx) = mpsc::channel();
        for n in 0..2u64 {
            let c = c.clone();
            let tx = tx.clone();
            std::thread::spawn(move || {
                let r = c.compile_kind("ping", obj(json!({"n": n})), Amount::from_sat(1000));
                let _ = tx.send(r.map(|_| ()));
            });
        }
        for _ in 0..2 {
            let err = rx.recv_timeout(Duration::from_secs(10)).unwrap().unwrap_err();
            assert!(matches!(err.root_cause(), CompilationError::RecursionLimit { .. }));
        }
    }

    #[test]
    fn unknown_kind() {
        let c = compiler(false);
        assert_eq!(
            c.compile_kind("nope", Map::new(), Amount::from_sat(1)).err(),
            Some(CompilationError::UnknownContract("nope".into()))
        );
    }
}
