// Copyright Judica, Inc 2021
//
// This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tools for defining contract kinds, binding them, and compiling them.
pub mod actions;
pub mod compiler;
pub mod context;
pub mod error;
pub mod fields;
pub mod object;

pub use actions::{Factory, GuardFn, PathKind, PathRegistry, PathSpec, TxTmplIt};
pub use compiler::{Compilable, Compiler, PathOutcome};
pub use context::Context;
pub use error::CompilationError;
pub use fields::{
    ContractRef, FieldDecl, FieldType, Fields, NestedContract, Payment, ScheduleEntry,
};
pub use object::Compiled;

use bitcoin::hashes::sha256;
use bitcoin::util::amount::Amount;
use schemars::schema::RootSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Display hints for tooling. The compiler carries these through but never
/// reads them.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Metadata {
    /// short human readable name
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub label: Option<String>,
    /// color for graph views
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub color: Option<String>,
}

impl Metadata {
    /// a label and color pair
    pub fn new(label: &str, color: &str) -> Self {
        Metadata {
            label: Some(label.into()),
            color: Some(color.into()),
        }
    }
}

/// A kind of contract: its declared fields and its table of paths.
pub trait ContractType: Send + Sync {
    /// name this kind is registered under
    fn kind(&self) -> &'static str;
    /// declared fields
    fn fields(&self) -> &'static [FieldDecl];
    /// the spending paths
    fn paths(&self) -> PathRegistry;
    /// display hints
    fn metadata(&self) -> Metadata {
        Metadata::default()
    }
}

/// A contract kind together with an immutable binding of its fields.
#[derive(Clone)]
pub struct BoundContract {
    kind: Arc<dyn ContractType>,
    fields: Fields,
    fingerprint: sha256::Hash,
}

impl BoundContract {
    /// Bind `provided` against `kind`'s declared fields.
    pub fn bind(
        kind: Arc<dyn ContractType>,
        provided: Map<String, Value>,
    ) -> Result<Self, CompilationError> {
        let fields = Fields::bind(kind.fields(), provided)?;
        Ok(Self::from_fields(kind, fields))
    }

    /// Wrap already checked fields.
    pub fn from_fields(kind: Arc<dyn ContractType>, fields: Fields) -> Self {
        let fingerprint = fields.fingerprint(kind.kind());
        BoundContract {
            kind,
            fields,
            fingerprint,
        }
    }

    /// the contract kind
    pub fn kind(&self) -> &Arc<dyn ContractType> {
        &self.kind
    }
    /// the bound values
    pub fn fields(&self) -> &Fields {
        &self.fields
    }
    /// (kind, fields) identity used for memoization
    pub fn fingerprint(&self) -> sha256::Hash {
        self.fingerprint
    }
}

impl fmt::Debug for BoundContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundContract")
            .field("kind", &self.kind.kind())
            .field("fields", &self.fields)
            .finish()
    }
}

/// Every contract kind a compiler can resolve by name.
#[derive(Clone, Default)]
pub struct Registry {
    kinds: BTreeMap<&'static str, Arc<dyn ContractType>>,
}

impl Registry {
    /// an empty registry
    pub fn new() -> Self {
        Self::default()
    }
    /// add a kind, replacing any kind with the same name
    pub fn register(mut self, kind: Arc<dyn ContractType>) -> Self {
        self.kinds.insert(kind.kind(), kind);
        self
    }
    /// look up a kind
    pub fn get(&self, kind: &str) -> Result<Arc<dyn ContractType>, CompilationError> {
        self.kinds
            .get(kind)
            .cloned()
            .ok_or_else(|| CompilationError::UnknownContract(kind.into()))
    }
    /// look up and bind in one step
    pub fn bind(
        &self,
        kind: &str,
        provided: Map<String, Value>,
    ) -> Result<BoundContract, CompilationError> {
        BoundContract::bind(self.get(kind)?, provided)
    }
    /// JSON Schema of a kind's fields
    pub fn api(&self, kind: &str) -> Result<RootSchema, CompilationError> {
        Ok(fields::api_schema(self.get(kind)?.fields()))
    }
    /// registered names, sorted
    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.kinds.keys().copied()
    }
}

/// Sum of a list of amounts, failing instead of overflowing.
pub fn checked_sum<I: IntoIterator<Item = Amount>>(amounts: I) -> Result<Amount, CompilationError> {
    amounts
        .into_iter()
        .try_fold(Amount::ZERO, |a, b| a.checked_add(b))
        .ok_or(CompilationError::AmountOverflow)
}
