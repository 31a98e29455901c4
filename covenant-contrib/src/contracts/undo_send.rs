// Copyright Judica, Inc 2021
//
// This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Contracts useful for operations that should be revertible
use covenant::contract::*;
use covenant::template::Builder;
use covenant::Clause;

/// UndoSend lets `to_key` take the funds once `timeout` has passed. Until
/// then, `to_key` may only send `amount` back to `from_contract`.
pub struct UndoSend;

const UNDO_SEND_FIELDS: &[FieldDecl] = &[
    FieldDecl::required("from_contract", FieldType::Contract),
    FieldDecl::required("to_key", FieldType::PubKey),
    FieldDecl::required("amount", FieldType::Amount),
    FieldDecl::required("timeout", FieldType::TimeSpec),
];

impl UndoSend {
    /// registered name
    pub const KIND: &'static str = "undo_send";

    fn signed(f: &Fields) -> Result<Clause, CompilationError> {
        Ok(Clause::key(f.key("to_key")?))
    }
    fn matured(f: &Fields) -> Result<Clause, CompilationError> {
        Ok(Clause::and_all(vec![
            Clause::from(f.time("timeout")?),
            Self::signed(f)?,
        ]))
    }
    fn undo(f: &Fields, ctx: Context) -> Result<Builder, CompilationError> {
        Ok(ctx
            .template()
            .add_output(f.amount("amount")?, f.contract("from_contract")?))
    }
}

impl ContractType for UndoSend {
    fn kind(&self) -> &'static str {
        Self::KIND
    }
    fn fields(&self) -> &'static [FieldDecl] {
        UNDO_SEND_FIELDS
    }
    fn paths(&self) -> PathRegistry {
        PathRegistry::new()
            .unlock("matured", Self::matured)
            .then("undo", Some(Self::signed), Self::undo)
    }
}

/// UndoSend2 forwards funds to `to_contract` only after `timeout`. Before
/// that, they can move back to `from_contract`.
pub struct UndoSend2;

const UNDO_SEND2_FIELDS: &[FieldDecl] = &[
    FieldDecl::required("from_contract", FieldType::Contract),
    FieldDecl::required("to_contract", FieldType::Contract),
    FieldDecl::required("amount", FieldType::Amount),
    FieldDecl::required("timeout", FieldType::TimeSpec),
];

impl UndoSend2 {
    /// registered name
    pub const KIND: &'static str = "undo_send2";

    fn complete(f: &Fields, ctx: Context) -> Result<Builder, CompilationError> {
        Ok(ctx
            .template()
            .set_timeout(f.time("timeout")?)?
            .add_output(f.amount("amount")?, f.contract("to_contract")?))
    }
    fn undo(f: &Fields, ctx: Context) -> Result<Builder, CompilationError> {
        Ok(ctx
            .template()
            .add_output(f.amount("amount")?, f.contract("from_contract")?))
    }
}

impl ContractType for UndoSend2 {
    fn kind(&self) -> &'static str {
        Self::KIND
    }
    fn fields(&self) -> &'static [FieldDecl] {
        UNDO_SEND2_FIELDS
    }
    fn paths(&self) -> PathRegistry {
        PathRegistry::new()
            .then("complete", None, Self::complete)
            .then("undo", None, Self::undo)
    }
    fn metadata(&self) -> Metadata {
        Metadata::new("Undo Send", "red")
    }
}
