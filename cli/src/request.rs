// Copyright Judica, Inc 2021
//
// This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The compile request boundary: a JSON request naming a contract kind, an
//! amount and field values, answered with either the compiled contract or a
//! structured failure report.
use bitcoin::util::amount::Amount;
use covenant::contract::{CompilationError, Compiled, Compiler};
use covenant_base::serialization_helpers::SArc;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Errors raised at the boundary, before the compiler is involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// externally supplied data did not have the expected shape
    SchemaValidation(String),
}

impl Display for RequestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl Error for RequestError {}

impl From<serde_json::Error> for RequestError {
    fn from(e: serde_json::Error) -> Self {
        RequestError::SchemaValidation(e.to_string())
    }
}

/// Compile `fields` as a contract of kind `type` funded with `amount`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CompileRequest {
    /// registered contract kind
    #[serde(rename = "type")]
    pub kind: String,
    /// satoshis
    #[serde(with = "bitcoin::util::amount::serde::as_sat")]
    pub amount: Amount,
    /// field values
    #[serde(default)]
    pub fields: Map<String, Value>,
}

/// Why a request produced no contract.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// the error that stopped compilation
    pub error: String,
    /// each path's own outcome, `"ok"` or its error, when the fields bound
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub paths: BTreeMap<String, String>,
}

/// The answer to a [`CompileRequest`].
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    /// the compiled contract
    Ok(SArc<Compiled>),
    /// no contract, and why
    Err(Failure),
}

impl Response {
    fn failed(e: &CompilationError, paths: BTreeMap<String, String>) -> Self {
        Response::Err(Failure {
            error: e.to_string(),
            paths,
        })
    }

    /// did the request compile
    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok(_))
    }
}

impl CompileRequest {
    /// Parse a request from JSON text.
    pub fn from_json(s: &str) -> Result<Self, RequestError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Run the request. A failed compile is retried path by path so the
    /// report says which paths are at fault.
    pub fn handle(&self, compiler: &Arc<Compiler>) -> Response {
        info!("compiling {} for {}", self.kind, self.amount);
        let bound = match compiler.registry().bind(&self.kind, self.fields.clone()) {
            Ok(b) => b,
            Err(e) => {
                warn!("binding {} failed: {}", self.kind, e);
                return Response::failed(&e, BTreeMap::new());
            }
        };
        match compiler.compile(&bound, self.amount) {
            Ok(c) => Response::Ok(SArc(c)),
            Err(e) => {
                warn!("compiling {} failed: {}", self.kind, e);
                let paths = compiler
                    .compile_paths(&bound, self.amount)
                    .map(|report| {
                        report
                            .into_iter()
                            .map(|(name, r)| {
                                let outcome = match r {
                                    Ok(_) => "ok".into(),
                                    Err(e) => e.root_cause().to_string(),
                                };
                                (name, outcome)
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                Response::failed(&e, paths)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant::CompilerConfig;
    use covenant_contrib::builtin_registry;
    use serde_json::json;

    const K1: &str = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
    const K2: &str = "02c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5";

    fn compiler() -> Arc<Compiler> {
        Compiler::new(CompilerConfig::default(), builtin_registry())
    }

    fn vault_request(amount: u64) -> String {
        json!({
            "type": "vault",
            "amount": amount,
            "fields": {
                "cold_storage": {"contract": {
                    "kind": "cold_storage",
                    "fields": {"keys": [K2], "threshold": 1},
                    "amount_field": "amount",
                }},
                "hot_storage": K1,
                "n_steps": 2,
                "amount_step": 50,
                "timeout": {"relative_height": 10},
                "mature": {"relative_height": 20},
            }
        })
        .to_string()
    }

    #[test]
    fn ok_response() {
        let r = CompileRequest::from_json(&vault_request(100)).unwrap();
        let resp = r.handle(&compiler());
        assert!(resp.is_ok());
        let v = serde_json::to_value(&resp).unwrap();
        let ok = v.get("ok").unwrap();
        assert_eq!(ok["kind"], json!("vault"));
        assert_eq!(ok["amount"], json!(100));
        assert!(ok["address"].as_str().unwrap().starts_with("bc1q"));
        assert!(ok["templates"]["step"].is_array());
    }

    #[test]
    fn failure_reports_every_path() {
        let r = CompileRequest::from_json(&vault_request(99)).unwrap();
        let v = serde_json::to_value(&r.handle(&compiler())).unwrap();
        let err = v.get("err").unwrap();
        assert!(err["error"].as_str().unwrap().contains("step"));
        let paths = err["paths"].as_object().unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths["to_cold"].as_str().unwrap().contains("AmountConservation"));
    }

    #[test]
    fn unknown_kind_has_no_paths() {
        let r = CompileRequest {
            kind: "nope".into(),
            amount: Amount::from_sat(1),
            fields: Map::new(),
        };
        match r.handle(&compiler()) {
            Response::Err(f) => {
                assert!(f.error.contains("UnknownContract"));
                assert!(f.paths.is_empty());
            }
            Response::Ok(_) => panic!("compiled an unknown kind"),
        }
    }

    #[test]
    fn malformed_request() {
        assert!(matches!(
            CompileRequest::from_json(r#"{"type": "vault", "amount": -1}"#),
            Err(RequestError::SchemaValidation(_))
        ));
        let extra = r#"{"type": "vault", "amount": 1, "extra": 2}"#;
        assert!(CompileRequest::from_json(extra).is_err());
    }
}
