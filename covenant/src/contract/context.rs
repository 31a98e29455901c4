// Copyright Judica, Inc 2021
//
// This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! general non-parameter compilation state required by all contracts
use super::{Amount, Compilable, CompilationError, Compiled, Compiler};
use bitcoin::hashes::sha256;
use bitcoin::Network;
use std::sync::Arc;

/// The chain of (contract, amount) pairs currently being compiled, innermost
/// first. Shared between siblings, so pushing is O(1) and never copies.
#[derive(Debug)]
struct Ancestry {
    past: Option<Arc<Ancestry>>,
    this: (sha256::Hash, Amount),
}

impl Ancestry {
    fn push(past: Option<Arc<Ancestry>>, this: (sha256::Hash, Amount)) -> Arc<Ancestry> {
        Arc::new(Ancestry { past, this })
    }
    fn contains(&self, key: &(sha256::Hash, Amount)) -> bool {
        let mut node = Some(self);
        while let Some(n) = node {
            if n.this == *key {
                return true;
            }
            node = n.past.as_deref();
        }
        false
    }
}

/// Context is used to track state during compilation such as remaining value
/// and how deep in the contract tree we are.
#[derive(Clone)]
pub struct Context {
    available_funds: Amount,
    depth: usize,
    ancestry: Option<Arc<Ancestry>>,
    compiler: Arc<Compiler>,
}

impl Context {
    /// create a context instance. Should only happen *once* per compile
    /// request, at the very top level.
    pub fn new(compiler: Arc<Compiler>, available_funds: Amount) -> Self {
        Context {
            available_funds,
            depth: 0,
            ancestry: None,
            compiler,
        }
    }

    /// which network is the contract building for?
    pub fn network(&self) -> Network {
        self.compiler.config().network
    }

    /// the compiler running this context
    pub fn compiler(&self) -> &Arc<Compiler> {
        &self.compiler
    }

    /// return the available funds
    pub fn funds(&self) -> Amount {
        self.available_funds
    }

    /// how many contracts enclose this one
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Compile the compilable item with this context.
    pub fn compile<A: Compilable + ?Sized>(
        self,
        a: &A,
    ) -> Result<Arc<Compiled>, CompilationError> {
        a.compile(self)
    }

    /// return a context with the new amount if amount is smaller or equal to available
    pub fn with_amount(&self, amount: Amount) -> Result<Self, CompilationError> {
        if self.available_funds < amount {
            Err(CompilationError::AmountConservation {
                available: self.available_funds,
                required: amount,
                draining: false,
            })
        } else {
            Ok(Context {
                available_funds: amount,
                ..self.clone()
            })
        }
    }

    /// decrease the amount available in this context object.
    pub fn spend_amount(&mut self, amount: Amount) -> Result<(), CompilationError> {
        self.available_funds = self.available_funds.checked_sub(amount).ok_or(
            CompilationError::AmountConservation {
                available: self.available_funds,
                required: amount,
                draining: false,
            },
        )?;
        Ok(())
    }

    /// Enter the contract identified by `fingerprint`, funded with this
    /// context's funds: one level deeper, and an error if the same contract
    /// with the same funds is already being compiled further up the chain.
    /// A contract may contain itself with a different amount.
    pub fn enter(&self, fingerprint: sha256::Hash) -> Result<Self, CompilationError> {
        let depth = self.depth + 1;
        let key = (fingerprint, self.available_funds);
        let cyclic = self
            .ancestry
            .as_ref()
            .map(|a| a.contains(&key))
            .unwrap_or(false);
        if cyclic || depth > self.compiler.config().max_recursion_depth {
            return Err(CompilationError::RecursionLimit { depth });
        }
        Ok(Context {
            depth,
            ancestry: Some(Ancestry::push(self.ancestry.clone(), key)),
            ..self.clone()
        })
    }

    /// Get a template builder from this context object
    pub fn template(self) -> crate::template::Builder {
        crate::template::Builder::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::Registry;
    use crate::CompilerConfig;
    use bitcoin::hashes::Hash;

    fn ctx(max: usize) -> Context {
        let cfg = CompilerConfig {
            max_recursion_depth: max,
            ..Default::default()
        };
        Context::new(Compiler::new(cfg, Registry::new()), Amount::from_sat(100))
    }

    #[test]
    fn depth_limit() {
        let c = ctx(2);
        let a = c.enter(sha256::Hash::hash(b"a")).unwrap();
        let b = a.enter(sha256::Hash::hash(b"b")).unwrap();
        assert_eq!(b.depth(), 2);
        assert_eq!(
            b.enter(sha256::Hash::hash(b"c")).err(),
            Some(CompilationError::RecursionLimit { depth: 3 })
        );
    }

    #[test]
    fn cycles_detected() {
        let c = ctx(64);
        let a = c.enter(sha256::Hash::hash(b"a")).unwrap();
        let b = a.enter(sha256::Hash::hash(b"b")).unwrap();
        assert_eq!(
            b.enter(sha256::Hash::hash(b"a")).err(),
            Some(CompilationError::RecursionLimit { depth: 3 })
        );
        // siblings do not see each other
        assert!(a.enter(sha256::Hash::hash(b"b")).is_ok());
    }

    #[test]
    fn same_contract_with_less_funds_is_not_a_cycle() {
        let c = ctx(64);
        let a = c.enter(sha256::Hash::hash(b"a")).unwrap();
        let smaller = a.with_amount(Amount::from_sat(50)).unwrap();
        assert_eq!(smaller.enter(sha256::Hash::hash(b"a")).unwrap().depth(), 2);
    }

    #[test]
    fn funds() {
        let mut c = ctx(64);
        assert!(c.with_amount(Amount::from_sat(101)).is_err());
        assert_eq!(
            c.with_amount(Amount::from_sat(40)).unwrap().funds(),
            Amount::from_sat(40)
        );
        c.spend_amount(Amount::from_sat(60)).unwrap();
        assert!(c.spend_amount(Amount::from_sat(41)).is_err());
        assert_eq!(c.funds(), Amount::from_sat(40));
    }
}
