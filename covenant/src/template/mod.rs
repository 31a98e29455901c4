// Copyright Judica, Inc 2021
//
// This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Finalized transaction templates and the builder that drafts them.
use bitcoin::hashes::sha256;
use bitcoin::util::amount::Amount;
use covenant_base::timelocks::{AnyAbsTimeLock, AnyRelTimeLock};
use serde::{Deserialize, Serialize};

pub mod output;
pub use output::Output;

pub mod builder;
pub use builder::Builder;

/// A frozen template: resolved outputs, timelocks, and the unsigned
/// transaction the parent's script commits to by CTV hash.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Template {
    /// outputs in order, each resolved to an address
    pub outputs: Vec<Output>,
    /// the unsigned transaction
    pub tx: bitcoin::Transaction,
    /// BIP-119 hash of `tx` at input 0
    pub ctv: sha256::Hash,
    /// relative lock on the single input, if any
    pub sequence: Option<AnyRelTimeLock>,
    /// absolute lock, if any
    pub lock_time: Option<AnyAbsTimeLock>,
    /// sum of the outputs
    #[serde(with = "bitcoin::util::amount::serde::as_sat")]
    pub total: Amount,
    /// this template consumes its whole input
    pub draining: bool,
    /// free-form label for tooling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Template {
    /// the CTV commitment for this template
    pub fn hash(&self) -> sha256::Hash {
        self.ctv
    }

    /// sum of all output amounts
    pub fn total_amount(&self) -> Amount {
        self.total
    }

    /// output amounts in order
    pub fn output_amounts(&self) -> Vec<Amount> {
        self.outputs.iter().map(|o| o.amount).collect()
    }
}
