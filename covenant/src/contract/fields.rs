// Copyright Judica, Inc 2021
//
// This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Field binding: a contract's declared, typed parameters and the immutable
//! record of values bound to them.
use super::CompilationError;
use bitcoin::hashes::sha256;
use bitcoin::hashes::{Hash, HashEngine};
use bitcoin::util::amount::Amount;
use bitcoin::PublicKey;
use covenant_base::timelocks::{AnyAbsTimeLock, AnyRelTimeLock, AnyTimeLock};
use schemars::gen::SchemaGenerator;
use schemars::schema::{
    ArrayValidation, InstanceType, ObjectValidation, RootSchema, Schema, SchemaObject,
};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// The shape a field's value must have.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// satoshis
    Amount,
    /// non-negative integer
    Int,
    /// compressed or uncompressed public key in hex
    PubKey,
    /// relative or absolute timelock
    TimeSpec,
    /// relative timelock only
    RelTimeSpec,
    /// absolute timelock only
    AbsTimeSpec,
    /// a [`ContractRef`]
    Contract,
    /// a list of [`ScheduleEntry`]
    Schedule,
    /// a [`Payment`]
    Payment,
    /// homogeneous list
    List(&'static FieldType),
}

impl FieldType {
    /// Does `v` have this shape?
    pub fn check(&self, v: &Value) -> bool {
        match self {
            FieldType::Amount | FieldType::Int => v.is_u64(),
            FieldType::PubKey => fits::<PublicKey>(v),
            FieldType::TimeSpec => fits::<AnyTimeLock>(v),
            FieldType::RelTimeSpec => fits::<AnyRelTimeLock>(v),
            FieldType::AbsTimeSpec => fits::<AnyAbsTimeLock>(v),
            FieldType::Contract => fits::<ContractRef>(v),
            FieldType::Schedule => fits::<Vec<ScheduleEntry>>(v),
            FieldType::Payment => fits::<Payment>(v),
            FieldType::List(t) => v
                .as_array()
                .map(|items| items.iter().all(|i| t.check(i)))
                .unwrap_or(false),
        }
    }

    fn subschema(&self, gen: &mut SchemaGenerator) -> Schema {
        match self {
            FieldType::Amount | FieldType::Int => gen.subschema_for::<u64>(),
            FieldType::PubKey => gen.subschema_for::<String>(),
            FieldType::TimeSpec => gen.subschema_for::<AnyTimeLock>(),
            FieldType::RelTimeSpec => gen.subschema_for::<AnyRelTimeLock>(),
            FieldType::AbsTimeSpec => gen.subschema_for::<AnyAbsTimeLock>(),
            FieldType::Contract => gen.subschema_for::<ContractRef>(),
            FieldType::Schedule => gen.subschema_for::<Vec<ScheduleEntry>>(),
            FieldType::Payment => gen.subschema_for::<Payment>(),
            FieldType::List(t) => SchemaObject {
                instance_type: Some(InstanceType::Array.into()),
                array: Some(Box::new(ArrayValidation {
                    items: Some(t.subschema(gen).into()),
                    ..Default::default()
                })),
                ..Default::default()
            }
            .into(),
        }
    }
}

fn fits<T: DeserializeOwned>(v: &Value) -> bool {
    T::deserialize(v).is_ok()
}

/// One declared parameter.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldDecl {
    /// name
    pub name: &'static str,
    /// shape
    pub ty: FieldType,
    /// optional fields are left out of the api's required list
    pub optional: bool,
}

impl FieldDecl {
    /// a field every path may rely on
    pub const fn required(name: &'static str, ty: FieldType) -> Self {
        FieldDecl {
            name,
            ty,
            optional: false,
        }
    }
    /// a field callers may omit
    pub const fn optional(name: &'static str, ty: FieldType) -> Self {
        FieldDecl {
            name,
            ty,
            optional: true,
        }
    }
}

/// JSON Schema describing the object accepted by [`Fields::bind`] for `decls`.
pub fn api_schema(decls: &[FieldDecl]) -> RootSchema {
    let mut gen = SchemaGenerator::default();
    let mut obj = ObjectValidation::default();
    for d in decls {
        obj.properties.insert(d.name.to_string(), d.ty.subschema(&mut gen));
        if !d.optional {
            obj.required.insert(d.name.to_string());
        }
    }
    obj.additional_properties = Some(Box::new(Schema::Bool(false)));
    let schema = SchemaObject {
        instance_type: Some(InstanceType::Object.into()),
        object: Some(Box::new(obj)),
        ..Default::default()
    };
    RootSchema {
        meta_schema: gen.settings().meta_schema.clone(),
        definitions: gen.definitions().clone(),
        schema,
    }
}

/// A nested contract which has not been compiled yet.
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, PartialEq, Eq)]
pub struct NestedContract {
    /// registered kind
    pub kind: String,
    /// values for the nested contract's fields
    #[serde(default)]
    pub fields: Map<String, Value>,
    /// if set, the output amount paying this contract is bound into this
    /// field when the output is resolved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_field: Option<String>,
}

impl NestedContract {
    /// a nested contract from a JSON object of field values. Anything that is
    /// not an object binds no fields.
    pub fn new(kind: &str, fields: Value) -> Self {
        NestedContract {
            kind: kind.into(),
            fields: match fields {
                Value::Object(m) => m,
                _ => Map::new(),
            },
            amount_field: None,
        }
    }
    /// mark this contract as parameterized by the amount sent to it
    pub fn with_amount_field(mut self, name: &str) -> Self {
        self.amount_field = Some(name.into());
        self
    }
}

/// Where an output's funds go.
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContractRef {
    /// an already resolved destination
    Address(#[schemars(with = "String")] bitcoin::Address),
    /// a contract compiled on demand
    Contract(NestedContract),
}

impl From<NestedContract> for ContractRef {
    fn from(n: NestedContract) -> Self {
        ContractRef::Contract(n)
    }
}
impl From<bitcoin::Address> for ContractRef {
    fn from(a: bitcoin::Address) -> Self {
        ContractRef::Address(a)
    }
}

/// One step of a payment schedule.
#[derive(Serialize, Deserialize, JsonSchema, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScheduleEntry {
    /// earliest time this step may be claimed
    pub time: AnyAbsTimeLock,
    /// amount released at this step
    #[schemars(with = "u64")]
    #[serde(with = "bitcoin::util::amount::serde::as_sat")]
    pub amount: Amount,
}

/// An amount to a destination.
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, PartialEq, Eq)]
pub struct Payment {
    /// destination
    pub to: ContractRef,
    /// satoshis
    #[schemars(with = "u64")]
    #[serde(with = "bitcoin::util::amount::serde::as_sat")]
    pub amount: Amount,
}

/// An immutable set of bound field values, kept in canonical (sorted) order.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct Fields {
    values: BTreeMap<String, Value>,
}

impl Fields {
    /// Checks `provided` against `schema`. Unknown names and ill-typed values
    /// are rejected. Declared fields left out stay unbound and only fail when
    /// read.
    pub fn bind(
        schema: &[FieldDecl],
        provided: Map<String, Value>,
    ) -> Result<Fields, CompilationError> {
        let mut values = BTreeMap::new();
        for (name, value) in provided {
            let decl = schema
                .iter()
                .find(|d| d.name == name)
                .ok_or_else(|| CompilationError::UnknownField(name.clone()))?;
            if !decl.ty.check(&value) {
                return Err(CompilationError::TypeMismatch {
                    field: name,
                    expected: format!("{:?}", decl.ty),
                });
            }
            values.insert(name, value);
        }
        Ok(Fields { values })
    }

    /// Is `name` bound?
    pub fn is_bound(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Read a bound field as `T`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, CompilationError> {
        let v = self
            .values
            .get(name)
            .ok_or_else(|| CompilationError::UnboundField(name.into()))?;
        T::deserialize(v).map_err(|_| CompilationError::TypeMismatch {
            field: name.into(),
            expected: std::any::type_name::<T>().into(),
        })
    }

    /// Read a field that may be unbound.
    pub fn get_opt<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, CompilationError> {
        if self.is_bound(name) {
            self.get(name).map(Some)
        } else {
            Ok(None)
        }
    }

    /// An `Amount` field
    pub fn amount(&self, name: &str) -> Result<Amount, CompilationError> {
        self.get::<u64>(name).map(Amount::from_sat)
    }
    /// An `Int` field
    pub fn int(&self, name: &str) -> Result<u64, CompilationError> {
        self.get(name)
    }
    /// A `PubKey` field
    pub fn key(&self, name: &str) -> Result<PublicKey, CompilationError> {
        self.get(name)
    }
    /// A `TimeSpec` field
    pub fn time(&self, name: &str) -> Result<AnyTimeLock, CompilationError> {
        self.get(name)
    }
    /// A `RelTimeSpec` field
    pub fn rel_time(&self, name: &str) -> Result<AnyRelTimeLock, CompilationError> {
        self.get(name)
    }
    /// A `Contract` field
    pub fn contract(&self, name: &str) -> Result<ContractRef, CompilationError> {
        self.get(name)
    }
    /// A `Schedule` field
    pub fn schedule(&self, name: &str) -> Result<Vec<ScheduleEntry>, CompilationError> {
        self.get(name)
    }

    /// The raw value of a bound field.
    pub fn raw(&self, name: &str) -> Result<&Value, CompilationError> {
        self.values
            .get(name)
            .ok_or_else(|| CompilationError::UnboundField(name.into()))
    }

    /// A copy with `name` bound to `value`. The receiver is not changed.
    pub fn with(&self, name: &str, value: Value) -> Fields {
        let mut values = self.values.clone();
        values.insert(name.into(), value);
        Fields { values }
    }

    /// The bound values as a JSON object.
    pub fn to_map(&self) -> Map<String, Value> {
        self.values.clone().into_iter().collect()
    }

    /// Identity of a (kind, bound fields) pair: SHA-256 over the kind and the
    /// canonical JSON of the values.
    pub fn fingerprint(&self, kind: &str) -> sha256::Hash {
        let mut engine = sha256::Hash::engine();
        engine.input(kind.as_bytes());
        engine.input(&[0]);
        // BTreeMap keys serialize in order and nested objects are sorted maps
        engine.input(Value::from(self.to_map()).to_string().as_bytes());
        sha256::Hash::from_engine(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const KEY: &str = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
    const SCHEMA: &[FieldDecl] = &[
        FieldDecl::required("amount", FieldType::Amount),
        FieldDecl::required("key", FieldType::PubKey),
        FieldDecl::optional("timeout", FieldType::RelTimeSpec),
        FieldDecl::optional("keys", FieldType::List(&FieldType::PubKey)),
    ];

    fn obj(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn bind_and_read() {
        let f = Fields::bind(SCHEMA, obj(json!({"amount": 5, "key": KEY}))).unwrap();
        assert_eq!(f.amount("amount").unwrap(), Amount::from_sat(5));
        assert_eq!(f.key("key").unwrap().to_string(), KEY);
        assert_eq!(
            f.rel_time("timeout"),
            Err(CompilationError::UnboundField("timeout".into()))
        );
        assert_eq!(f.get_opt::<AnyRelTimeLock>("timeout").unwrap(), None);
    }

    #[test]
    fn rejects_unknown_and_mistyped() {
        assert_eq!(
            Fields::bind(SCHEMA, obj(json!({"amnt": 5}))),
            Err(CompilationError::UnknownField("amnt".into()))
        );
        assert!(matches!(
            Fields::bind(SCHEMA, obj(json!({"amount": "five"}))),
            Err(CompilationError::TypeMismatch { .. })
        ));
        assert!(matches!(
            Fields::bind(SCHEMA, obj(json!({"keys": [KEY, 3]}))),
            Err(CompilationError::TypeMismatch { .. })
        ));
        assert!(Fields::bind(SCHEMA, obj(json!({"timeout": {"relative_height": 10}}))).is_ok());
    }

    #[test]
    fn fingerprint_ignores_insertion_order() {
        let a = Fields::bind(SCHEMA, obj(json!({"amount": 5, "key": KEY}))).unwrap();
        let b = Fields::default()
            .with("key", json!(KEY))
            .with("amount", json!(5));
        assert_eq!(a.fingerprint("x"), b.fingerprint("x"));
        assert_ne!(a.fingerprint("x"), a.fingerprint("y"));
        assert_ne!(a.fingerprint("x"), a.with("amount", json!(6)).fingerprint("x"));
    }

    #[test]
    fn api_lists_required_fields() {
        let s = serde_json::to_value(api_schema(SCHEMA)).unwrap();
        assert_eq!(s["required"], json!(["amount", "key"]));
        assert!(s["properties"]["timeout"].is_object());
    }
}
