// Copyright Judica, Inc 2021
//
// This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Compiler settings
use bitcoin::Network;
use serde::{Deserialize, Serialize};

/// Settings shared by every compilation a [`crate::contract::Compiler`] runs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct CompilerConfig {
    /// network addresses are derived for
    pub network: Network,
    /// how many contracts deep a single compile may nest before it is
    /// considered runaway self reference
    pub max_recursion_depth: usize,
    /// cap on how many templates one generator path may yield
    pub max_templates_per_path: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            network: Network::Bitcoin,
            max_recursion_depth: 64,
            max_templates_per_path: 1024,
        }
    }
}
