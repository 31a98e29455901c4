// Copyright Judica, Inc 2021
//
// This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Converts an externally supplied payment list into payments the compiler
//! can pay out, validating it on the way in.
use crate::request::{CompileRequest, RequestError};
use bitcoin::util::amount::Amount;
use bitcoin::{Address, Network};
use covenant::contract::{checked_sum, ContractRef, Payment};
use covenant::util::address_usable_on;
use covenant_contrib::contracts::Payments;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::str::FromStr;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Entry {
    address: String,
    amount: u64,
}

/// Parse `[{"address": ..., "amount": sats}, ...]` into payments for
/// `network`. The list must be non-empty with positive amounts.
pub fn parse_payments(v: &Value, network: Network) -> Result<Vec<Payment>, RequestError> {
    let entries: Vec<Entry> = serde_json::from_value(v.clone())?;
    if entries.is_empty() {
        return Err(RequestError::SchemaValidation("empty payment list".into()));
    }
    entries
        .into_iter()
        .enumerate()
        .map(|(i, e)| {
            let mut address = Address::from_str(&e.address).map_err(|err| {
                RequestError::SchemaValidation(format!("payment {}: {}", i, err))
            })?;
            if !address_usable_on(address.network, network) {
                return Err(RequestError::SchemaValidation(format!(
                    "payment {}: address is for {}, expected {}",
                    i, address.network, network
                )));
            }
            address.network = network;
            if e.amount == 0 {
                return Err(RequestError::SchemaValidation(format!(
                    "payment {}: zero amount",
                    i
                )));
            }
            Ok(Payment {
                to: ContractRef::Address(address),
                amount: Amount::from_sat(e.amount),
            })
        })
        .collect()
}

/// A request compiling `payments` as one batched transaction funded with
/// exactly their sum.
pub fn payments_request(payments: &[Payment]) -> Result<CompileRequest, RequestError> {
    let amount = checked_sum(payments.iter().map(|p| p.amount))
        .map_err(|e| RequestError::SchemaValidation(e.to_string()))?;
    let mut fields = Map::new();
    fields.insert("payments".into(), serde_json::to_value(payments)?);
    Ok(CompileRequest {
        kind: Payments::KIND.into(),
        amount,
        fields,
    })
}

/// [`parse_payments`] then [`payments_request`]
pub fn from_json(s: &str, network: Network) -> Result<CompileRequest, RequestError> {
    let v: Value = serde_json::from_str(s)?;
    payments_request(&parse_payments(&v, network)?)
}
