// Copyright Judica, Inc 2021
//
// This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The registration table of a contract's spending paths.
use super::{CompilationError, Context, Fields};
use crate::template::Builder;
use covenant_base::Clause;
use std::collections::BTreeSet;

/// Computes a guard clause from a contract's fields.
pub type GuardFn = fn(&Fields) -> Result<Clause, CompilationError>;

/// A lazily evaluated sequence of draft templates.
pub type TxTmplIt<'a> =
    Result<Box<dyn Iterator<Item = Result<Builder, CompilationError>> + 'a>, CompilationError>;

/// Builds the one template of a path.
pub type ThenFn = fn(&Fields, Context) -> Result<Builder, CompilationError>;

/// Yields the alternative templates of a generator path. Calling it again
/// with the same fields must yield the same sequence.
pub type GeneratorFn = for<'a> fn(&'a Fields, Context) -> TxTmplIt<'a>;

/// How a path produces templates.
#[derive(Clone, Copy)]
pub enum Factory {
    /// exactly one template
    Single(ThenFn),
    /// a finite family of alternatives, each committed to separately
    Generator(GeneratorFn),
}

/// What a registered entry contributes to the contract's script.
#[derive(Clone, Copy)]
pub enum PathKind {
    /// templates committed to by CTV
    Then(Factory),
    /// a guard spendable without any template
    Unlock(GuardFn),
}

/// A named entry in a [`PathRegistry`].
#[derive(Clone, Copy)]
pub struct PathSpec {
    /// unique within a contract
    pub name: &'static str,
    /// extra condition on every template of a `Then` path
    pub guard: Option<GuardFn>,
    /// the entry's kind
    pub kind: PathKind,
    /// optional paths may fail without failing the contract
    pub optional: bool,
}

impl PathSpec {
    /// is this an `Unlock` entry
    pub fn is_unlock(&self) -> bool {
        matches!(self.kind, PathKind::Unlock(_))
    }
}

/// Maps path names to guards and factories. Built once when a contract kind
/// is defined; there is no runtime discovery of paths.
#[derive(Clone, Default)]
pub struct PathRegistry {
    paths: Vec<PathSpec>,
}

impl PathRegistry {
    /// an empty table
    pub fn new() -> Self {
        Self::default()
    }
    /// add a prebuilt entry
    pub fn register(mut self, spec: PathSpec) -> Self {
        self.paths.push(spec);
        self
    }
    /// a single-template path
    pub fn then(self, name: &'static str, guard: Option<GuardFn>, f: ThenFn) -> Self {
        self.register(PathSpec {
            name,
            guard,
            kind: PathKind::Then(Factory::Single(f)),
            optional: false,
        })
    }
    /// a generator path
    pub fn generator(self, name: &'static str, guard: Option<GuardFn>, f: GeneratorFn) -> Self {
        self.register(PathSpec {
            name,
            guard,
            kind: PathKind::Then(Factory::Generator(f)),
            optional: false,
        })
    }
    /// a guard over the whole contract, with no template
    pub fn unlock(self, name: &'static str, g: GuardFn) -> Self {
        self.register(PathSpec {
            name,
            guard: None,
            kind: PathKind::Unlock(g),
            optional: false,
        })
    }
    /// mark the most recently added entry optional
    pub fn optional(mut self) -> Self {
        if let Some(p) = self.paths.last_mut() {
            p.optional = true;
        }
        self
    }

    /// Rejects duplicate names and unlock entries carrying their own path
    /// guard.
    pub fn validate(&self) -> Result<(), CompilationError> {
        let mut seen = BTreeSet::new();
        for p in &self.paths {
            if !seen.insert(p.name) {
                return Err(CompilationError::DuplicatePath(p.name.into()));
            }
            if p.is_unlock() && p.guard.is_some() {
                return Err(CompilationError::ConflictingUnlock(p.name.into()));
            }
        }
        Ok(())
    }

    /// entries in registration order
    pub fn iter(&self) -> impl Iterator<Item = &PathSpec> {
        self.paths.iter()
    }

    /// look up an entry by name
    pub fn get(&self, name: &str) -> Option<&PathSpec> {
        self.paths.iter().find(|p| p.name == name)
    }

    /// number of entries
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// no entries at all
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
