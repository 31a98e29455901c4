// Copyright Judica, Inc 2021
//
// This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Template Output container
use crate::contract::Compiled;
use bitcoin::util::amount::Amount;
use covenant_base::serialization_helpers::SArc;
use serde::{Deserialize, Serialize};

/// An Output is an amount paid to a resolved destination. When the
/// destination is a contract its compilation is embedded, so a template
/// carries the whole covenant below it.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Output {
    /// satoshis
    #[serde(with = "bitcoin::util::amount::serde::as_sat")]
    pub amount: Amount,
    /// where the funds go
    pub address: bitcoin::Address,
    /// the destination's compiled contract, unless it was a plain address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<SArc<Compiled>>,
}

impl Output {
    /// the kind of contract paid, if any
    pub fn kind(&self) -> Option<&str> {
        self.contract.as_ref().map(|c| c.kind.as_str())
    }
}
