// Copyright Judica, Inc 2021
//
// This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Clause to script and address.
use super::cache::OnceMap;
use crate::contract::CompilationError;
use bitcoin::{Address, Network, Script};
use covenant_base::miniscript::Segwitv0;
use covenant_base::Clause;
use log::debug;
use std::sync::Arc;

const LOG_TARGET: &str = "covenant::deriver";

/// The script and address a clause compiles to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derived {
    /// the reduced clause
    pub policy: Clause,
    /// the miniscript the policy compiled to
    pub miniscript: String,
    /// P2WSH witness script
    pub witness_script: Script,
    /// output script paying `witness_script`
    pub script_pubkey: Script,
    /// address of `script_pubkey`
    pub address: Address,
}

/// Reduces clauses and compiles them to segwit v0 scripts, memoized on the
/// reduced clause's canonical text.
pub struct Deriver {
    network: Network,
    cache: OnceMap<String, Arc<Derived>>,
}

impl Deriver {
    /// a deriver producing addresses for `network`
    pub fn new(network: Network) -> Self {
        Deriver {
            network,
            cache: OnceMap::new("deriver"),
        }
    }

    /// Deterministic: clauses with the same reduced form always yield the
    /// identical script and address.
    pub fn derive(&self, clause: &Clause) -> Result<Arc<Derived>, CompilationError> {
        let policy = clause.reduce();
        if policy == Clause::Unsatisfiable {
            return Err(CompilationError::EmptyPolicy);
        }
        let key = policy.to_string();
        let cyclic = || CompilationError::TerminateWith(format!("cyclic derivation of {}", key));
        self.cache.get_or_try_init(&key, cyclic, || {
            let ms = policy.to_policy().compile::<Segwitv0>()?;
            let witness_script = ms.encode();
            let address = Address::p2wsh(&witness_script, self.network);
            debug!(target: LOG_TARGET, "derived {} for {}", address, key);
            Ok(Arc::new(Derived {
                miniscript: ms.to_string(),
                script_pubkey: address.script_pubkey(),
                witness_script,
                address,
                policy: policy.clone(),
            }))
        })
    }

    /// number of distinct scripts derived so far
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}
