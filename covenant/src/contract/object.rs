// Copyright Judica, Inc 2021
//
// This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Compiled is the output of compilation & can be linked to a specific coin
use super::{Fields, Metadata};
use crate::template::Template;
use crate::util::amountrange::AmountRange;
use bitcoin::hashes::sha256;
use bitcoin::util::amount::Amount;
use bitcoin::Script;
use covenant_base::Clause;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Compiled holds a contract's complete result: the address to fund, the
/// script behind it, and every template the script commits to.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Compiled {
    /// registered kind of the contract
    pub kind: String,
    /// (kind, fields) identity
    pub fingerprint: sha256::Hash,
    /// the values the contract was compiled with
    pub fields: Fields,
    /// address to fund
    pub address: bitcoin::Address,
    /// `address` as an output script
    pub script_pubkey: Script,
    /// P2WSH witness script
    pub witness_script: Script,
    /// the reduced spending policy
    pub policy: Clause,
    /// the miniscript `policy` compiled to
    pub miniscript: String,
    /// amount the contract was compiled for
    #[serde(with = "bitcoin::util::amount::serde::as_sat")]
    pub amount: Amount,
    /// path name to its templates, in generation order
    pub templates: BTreeMap<String, Vec<Template>>,
    /// optional paths that failed and were left out of the policy
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub failed_paths: BTreeMap<String, String>,
    /// amounts the templates move
    pub amount_range: AmountRange,
    /// display hints for tooling
    pub metadata: Metadata,
}

impl Compiled {
    /// the templates of one path
    pub fn path(&self, name: &str) -> Option<&[Template]> {
        self.templates.get(name).map(|v| &v[..])
    }

    /// every template of every path
    pub fn all_templates(&self) -> impl Iterator<Item = &Template> {
        self.templates.values().flatten()
    }

    /// compiled contracts paid by any template of this one
    pub fn children(&self) -> impl Iterator<Item = &Compiled> {
        self.all_templates()
            .flat_map(|t| t.outputs.iter())
            .filter_map(|o| o.contract.as_deref())
    }

    /// CTV hashes committed to by this contract's script
    pub fn ctv_hashes(&self) -> Vec<sha256::Hash> {
        self.all_templates().map(Template::hash).collect()
    }
}
