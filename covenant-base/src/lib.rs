// Copyright Judica, Inc 2021
//
// This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared leaf types for the covenant compiler: lock times, the clause
//! algebra spending conditions are written in, and template hashing.
#![deny(missing_docs)]
pub mod clause;
pub mod serialization_helpers;
pub mod timelocks;
pub mod util;

pub use clause::Clause;
pub use miniscript;
pub use util::CTVHash;
