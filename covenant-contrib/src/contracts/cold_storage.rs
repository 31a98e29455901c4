// Copyright Judica, Inc 2021
//
// This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A k-of-n multisig destination
use bitcoin::PublicKey;
use covenant::contract::*;
use covenant::Clause;

/// Funds spendable by any `threshold` of `keys`. The optional `amount` is
/// bound by parents that pay it through an amount parameterized reference, so
/// every distinct amount is a distinct contract.
pub struct ColdStorage;

const FIELDS: &[FieldDecl] = &[
    FieldDecl::required("keys", FieldType::List(&FieldType::PubKey)),
    FieldDecl::required("threshold", FieldType::Int),
    FieldDecl::optional("amount", FieldType::Amount),
];

impl ColdStorage {
    /// registered name
    pub const KIND: &'static str = "cold_storage";

    fn multisig(f: &Fields) -> Result<Clause, CompilationError> {
        let keys: Vec<PublicKey> = f.get("keys")?;
        Ok(Clause::threshold(
            f.int("threshold")? as usize,
            keys.into_iter().map(Clause::key),
        ))
    }
}

impl ContractType for ColdStorage {
    fn kind(&self) -> &'static str {
        Self::KIND
    }
    fn fields(&self) -> &'static [FieldDecl] {
        FIELDS
    }
    fn paths(&self) -> PathRegistry {
        PathRegistry::new().unlock("multisig", Self::multisig)
    }
    fn metadata(&self) -> Metadata {
        Metadata::new("Cold Storage", "black")
    }
}
