// Copyright Judica, Inc 2021
//
// This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Contract for managing movement of funds from cold to hot storage
use super::undo_send::UndoSend;
use covenant::contract::*;
use covenant::template::Builder;
use log::debug;
use serde_json::{json, Value};

const LOG_TARGET: &str = "covenant_contrib::vault";

/// A SmarterVault makes an "annuity chain" which releases `amount_step` every
/// `timeout` period for `n_steps`. Each released step sits in an
/// [`UndoSend`] to `hot_storage` for `mature`, during which it can still be
/// sent back to cold storage. At any time the remaining funds can be moved to
/// `cold_storage`, which is parameterized by the amount sent to it.
pub struct SmarterVault;

const FIELDS: &[FieldDecl] = &[
    FieldDecl::required("cold_storage", FieldType::Contract),
    FieldDecl::required("hot_storage", FieldType::PubKey),
    FieldDecl::required("n_steps", FieldType::Int),
    FieldDecl::required("amount_step", FieldType::Amount),
    FieldDecl::required("timeout", FieldType::RelTimeSpec),
    FieldDecl::required("mature", FieldType::TimeSpec),
];

impl SmarterVault {
    /// registered name
    pub const KIND: &'static str = "vault";

    fn step(f: &Fields, ctx: Context) -> Result<Builder, CompilationError> {
        let n_steps = f.int("n_steps")?;
        let amount_step = f.amount("amount_step")?;
        let undo = NestedContract::new(
            UndoSend::KIND,
            json!({
                "from_contract": f.raw("cold_storage")?,
                "to_key": f.raw("hot_storage")?,
                "amount": amount_step.as_sat(),
                "timeout": f.raw("mature")?,
            }),
        );
        let builder = ctx
            .template()
            .set_sequence(f.rel_time("timeout")?)?
            .add_output(amount_step, undo);
        let builder = if n_steps > 1 {
            let sub_amount = amount_step
                .checked_mul(n_steps - 1)
                .ok_or(CompilationError::AmountOverflow)?;
            debug!(
                target: LOG_TARGET,
                "{} steps left, {} to the next vault",
                n_steps - 1,
                sub_amount
            );
            let sub_vault = NestedContract::new(
                Self::KIND,
                Value::from(f.with("n_steps", Value::from(n_steps - 1)).to_map()),
            );
            builder.add_output(sub_amount, sub_vault)
        } else {
            builder
        };
        Ok(builder.drain())
    }

    fn to_cold(f: &Fields, ctx: Context) -> Result<Builder, CompilationError> {
        let amount = f
            .amount("amount_step")?
            .checked_mul(f.int("n_steps")?)
            .ok_or(CompilationError::AmountOverflow)?;
        Ok(ctx
            .template()
            .add_output(amount, f.contract("cold_storage")?)
            .drain())
    }
}

impl ContractType for SmarterVault {
    fn kind(&self) -> &'static str {
        Self::KIND
    }
    fn fields(&self) -> &'static [FieldDecl] {
        FIELDS
    }
    fn paths(&self) -> PathRegistry {
        PathRegistry::new()
            .then("step", None, Self::step)
            .then("to_cold", None, Self::to_cold)
    }
    fn metadata(&self) -> Metadata {
        Metadata::new("Vault", "green")
    }
}
