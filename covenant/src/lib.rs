// Copyright Judica, Inc 2021
//
// This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The covenant compiler core. A contract is a set of typed fields plus a
//! table of spending paths; compiling it yields a deterministic address and
//! the chain of transaction templates its script commits to.
#![deny(missing_docs)]

pub mod config;
pub mod contract;
pub mod template;
pub mod util;

pub use config::CompilerConfig;
pub use covenant_base;
pub use covenant_base::Clause;
