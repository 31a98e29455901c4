// Copyright Judica, Inc 2021
//
// This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![allow(dead_code)]
use bitcoin::util::amount::Amount;
use covenant::contract::{CompilationError, Compiled, Compiler};
use covenant::CompilerConfig;
use covenant_contrib::builtin_registry;
use serde_json::{json, Map, Value};
use std::sync::Arc;

pub const K1: &str = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
pub const K2: &str = "02c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5";
pub const K3: &str = "02f9308a019258c31049344f85f89d5229b531c845836f99b08601f113bce036f9";
pub const RECIPIENT: &str = "bc1qxy2kgdygjrsqtzq2n0yrf2493p83kkfjhx0wlh";
pub const RETURN: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";

pub fn compiler() -> Arc<Compiler> {
    Compiler::new(CompilerConfig::default(), builtin_registry())
}

pub fn obj(v: Value) -> Map<String, Value> {
    match v {
        Value::Object(m) => m,
        _ => panic!("not an object"),
    }
}

pub fn sats(n: u64) -> Amount {
    Amount::from_sat(n)
}

pub fn vault_fields(n_steps: u64, amount_step: u64) -> Map<String, Value> {
    obj(json!({
        "cold_storage": {"contract": {
            "kind": "cold_storage",
            "fields": {"keys": [K2, K3], "threshold": 2},
            "amount_field": "amount",
        }},
        "hot_storage": K1,
        "n_steps": n_steps,
        "amount_step": amount_step,
        "timeout": {"relative_height": 10},
        "mature": {"relative_height": 20},
    }))
}

pub fn subscription_fields() -> Map<String, Value> {
    obj(json!({
        "amount": 100,
        "recipient": {"address": RECIPIENT},
        "schedule": [
            {"time": {"absolute_height": 100}, "amount": 50},
            {"time": {"absolute_height": 200}, "amount": 50},
        ],
        "return_address": {"address": RETURN},
        "watchtower_key": K1,
        "return_timeout": {"relative_height": 6},
    }))
}

pub fn compile(
    kind: &str,
    fields: Map<String, Value>,
    amount: u64,
) -> Result<Arc<Compiled>, CompilationError> {
    compiler().compile_kind(kind, fields, sats(amount))
}

/// every contract reachable from `c`, including `c`
pub fn walk(c: &Compiled) -> Vec<&Compiled> {
    let mut out = vec![c];
    for child in c.children() {
        out.extend(walk(child));
    }
    out
}

/// the single nested contract of `kind` paid by `path`
pub fn child<'a>(c: &'a Compiled, path: &str, kind: &str) -> Option<&'a Compiled> {
    c.path(path)?
        .iter()
        .flat_map(|t| t.outputs.iter())
        .filter_map(|o| o.contract.as_deref())
        .find(|c| c.kind == kind)
}
