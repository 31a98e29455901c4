// Copyright Judica, Inc 2021
//
// This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Batched payments
use covenant::contract::*;
use covenant::template::Builder;

/// Pays every entry of `payments` in one transaction which must spend the
/// whole input.
pub struct Payments;

const FIELDS: &[FieldDecl] = &[FieldDecl::required(
    "payments",
    FieldType::List(&FieldType::Payment),
)];

impl Payments {
    /// registered name
    pub const KIND: &'static str = "pay";

    fn pay(f: &Fields, ctx: Context) -> Result<Builder, CompilationError> {
        let payments: Vec<Payment> = f.get("payments")?;
        Ok(payments
            .into_iter()
            .fold(ctx.template(), |b, p| b.add_output(p.amount, p.to))
            .drain())
    }
}

impl ContractType for Payments {
    fn kind(&self) -> &'static str {
        Self::KIND
    }
    fn fields(&self) -> &'static [FieldDecl] {
        FIELDS
    }
    fn paths(&self) -> PathRegistry {
        PathRegistry::new().then("pay", None, Self::pay)
    }
    fn metadata(&self) -> Metadata {
        Metadata::new("Batch Payment", "orange")
    }
}
