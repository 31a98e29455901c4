// Copyright Judica, Inc 2021
//
// This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interactive Transaction Template Builder
use super::{Output, Template};
use crate::contract::{
    BoundContract, Compilable, CompilationError, Compiled, Context, ContractRef, NestedContract,
};
use crate::util::address_usable_on;
use bitcoin::util::amount::Amount;
use covenant_base::serialization_helpers::SArc;
use covenant_base::timelocks::*;
use covenant_base::CTVHash;
use log::debug;
use std::sync::Arc;

const LOG_TARGET: &str = "covenant::template";

/// Anything an output may pay to.
pub enum Target {
    /// a plain address or an uncompiled nested contract
    Ref(ContractRef),
    /// a contract whose fields are already bound
    Bound(BoundContract),
    /// an already compiled contract
    Compiled(Arc<Compiled>),
}

impl From<ContractRef> for Target {
    fn from(r: ContractRef) -> Self {
        Target::Ref(r)
    }
}
impl From<NestedContract> for Target {
    fn from(n: NestedContract) -> Self {
        Target::Ref(ContractRef::Contract(n))
    }
}
impl From<bitcoin::Address> for Target {
    fn from(a: bitcoin::Address) -> Self {
        Target::Ref(ContractRef::Address(a))
    }
}
impl From<BoundContract> for Target {
    fn from(b: BoundContract) -> Self {
        Target::Bound(b)
    }
}
impl From<Arc<Compiled>> for Target {
    fn from(c: Arc<Compiled>) -> Self {
        Target::Compiled(c)
    }
}

impl Target {
    /// Resolve to an address, compiling nested contracts with `ctx`'s funds
    /// as their amount.
    fn resolve(
        self,
        ctx: Context,
    ) -> Result<(bitcoin::Address, Option<Arc<Compiled>>), CompilationError> {
        let compiled = match self {
            Target::Ref(ContractRef::Address(mut a)) => {
                if !address_usable_on(a.network, ctx.network()) {
                    return Err(CompilationError::WrongNetwork {
                        expected: ctx.network(),
                        found: a.network,
                    });
                }
                a.network = ctx.network();
                return Ok((a, None));
            }
            Target::Ref(ContractRef::Contract(n)) => n.compile(ctx)?,
            Target::Bound(b) => b.compile(ctx)?,
            Target::Compiled(c) => c,
        };
        Ok((compiled.address.clone(), Some(compiled)))
    }
}

/// Builder can be used to interactively put together a transaction template before
/// finalizing into a Template.
pub struct Builder {
    sequence: Option<AnyRelTimeLock>,
    lock_time: Option<AnyAbsTimeLock>,
    outputs: Vec<(Amount, Target)>,
    version: i32,
    draining: bool,
    label: Option<String>,
    ctx: Context,
}

impl Builder {
    /// Creates a new transaction template with 1 input and no outputs.
    pub fn new(ctx: Context) -> Builder {
        Builder {
            sequence: None,
            lock_time: None,
            outputs: vec![],
            version: 2,
            draining: false,
            label: None,
            ctx,
        }
    }

    /// get a read-only reference to the builder's context
    pub fn ctx(&self) -> &Context {
        &self.ctx
    }

    /// Appends an output. Nothing is compiled until [`Builder::finalize`].
    pub fn add_output<T: Into<Target>>(mut self, amount: Amount, target: T) -> Self {
        self.outputs.push((amount, target.into()));
        self
    }

    /// Appends an output only if `amount` is positive. This is how optional
    /// tail outputs (e.g. a refund that may be empty) are written.
    pub fn add_output_if_nonzero<T: Into<Target>>(self, amount: Amount, target: T) -> Self {
        if amount > Amount::ZERO {
            self.add_output(amount, target)
        } else {
            self
        }
    }

    /// Sets the input's relative timelock. May be called once.
    pub fn set_sequence(mut self, s: AnyRelTimeLock) -> Result<Self, CompilationError> {
        if self.sequence.is_some() {
            return Err(CompilationError::DoubleLock("sequence"));
        }
        self.sequence = Some(s);
        Ok(self)
    }

    /// Sets the transaction's absolute timelock. May be called once.
    pub fn set_lock_time(mut self, lt: AnyAbsTimeLock) -> Result<Self, CompilationError> {
        if self.lock_time.is_some() {
            return Err(CompilationError::DoubleLock("lock_time"));
        }
        self.lock_time = Some(lt);
        Ok(self)
    }

    /// set_sequence or set_lock_time, whichever axis `t` is on
    pub fn set_timeout(self, t: AnyTimeLock) -> Result<Self, CompilationError> {
        match t {
            AnyTimeLock::R(r) => self.set_sequence(r),
            AnyTimeLock::A(a) => self.set_lock_time(a),
        }
    }

    /// Declare that the outputs must add up to exactly the input amount.
    pub fn drain(mut self) -> Self {
        self.draining = true;
        self
    }

    /// overwrite any existing label with the provided string,
    /// or set a label if non provided thus far.
    pub fn set_label(mut self, label: String) -> Self {
        self.label = Some(label);
        self
    }

    /// Checks conservation against `available`, compiles every nested
    /// destination with its output amount, and freezes the result.
    pub fn finalize(self, available: Amount) -> Result<Template, CompilationError> {
        let mut total = Amount::ZERO;
        for (i, (amount, _)) in self.outputs.iter().enumerate() {
            if *amount == Amount::ZERO {
                return Err(CompilationError::ZeroValueOutput(i));
            }
            total = total
                .checked_add(*amount)
                .ok_or(CompilationError::AmountOverflow)?;
        }
        if total > available || (self.draining && total != available) {
            return Err(CompilationError::AmountConservation {
                available,
                required: total,
                draining: self.draining,
            });
        }
        let Builder {
            sequence,
            lock_time,
            outputs,
            version,
            draining,
            label,
            ctx,
        } = self;
        let outputs = outputs
            .into_iter()
            .map(|(amount, target)| {
                let (address, contract) = target.resolve(ctx.with_amount(amount)?)?;
                Ok(Output {
                    amount,
                    address,
                    contract: contract.map(SArc),
                })
            })
            .collect::<Result<Vec<_>, CompilationError>>()?;
        let tx = bitcoin::Transaction {
            version,
            lock_time: lock_time.map(|l| l.get()).unwrap_or(0),
            input: vec![bitcoin::TxIn {
                previous_output: Default::default(),
                script_sig: Default::default(),
                sequence: sequence
                    .unwrap_or_else(|| RelHeight::from(0).into())
                    .get(),
                witness: bitcoin::Witness::default(),
            }],
            output: outputs
                .iter()
                .map(|out| bitcoin::TxOut {
                    value: out.amount.as_sat(),
                    script_pubkey: out.address.script_pubkey(),
                })
                .collect(),
        };
        let ctv = tx.get_ctv_hash(0);
        debug!(target: LOG_TARGET, "finalized template {} with {} outputs", ctv, outputs.len());
        Ok(Template {
            outputs,
            ctv,
            sequence,
            lock_time,
            total,
            draining,
            label,
            tx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{Compiler, Registry};
    use crate::CompilerConfig;
    use std::convert::TryFrom;
    use std::str::FromStr;

    fn ctx() -> Context {
        Context::new(
            Compiler::new(CompilerConfig::default(), Registry::new()),
            Amount::from_sat(100),
        )
    }
    fn addr() -> bitcoin::Address {
        bitcoin::Address::from_str("bc1qxy2kgdygjrsqtzq2n0yrf2493p83kkfjhx0wlh").unwrap()
    }

    #[test]
    fn double_lock() {
        let b = ctx().template().set_sequence(RelHeight::from(5).into()).unwrap();
        assert_eq!(
            b.set_sequence(RelHeight::from(6).into()).err(),
            Some(CompilationError::DoubleLock("sequence"))
        );
        let lt: AnyAbsTimeLock = AbsHeight::try_from(10).unwrap().into();
        let b = ctx().template().set_timeout(lt.into()).unwrap();
        assert_eq!(
            b.set_lock_time(lt).err(),
            Some(CompilationError::DoubleLock("lock_time"))
        );
    }

    #[test]
    fn conservation() {
        let over = ctx()
            .template()
            .add_output(Amount::from_sat(60), addr())
            .add_output(Amount::from_sat(50), addr())
            .finalize(Amount::from_sat(100));
        assert!(matches!(
            over,
            Err(CompilationError::AmountConservation { draining: false, .. })
        ));
        let short = ctx()
            .template()
            .add_output(Amount::from_sat(60), addr())
            .drain()
            .finalize(Amount::from_sat(100));
        assert!(matches!(
            short,
            Err(CompilationError::AmountConservation { draining: true, .. })
        ));
        let ok = ctx()
            .template()
            .add_output(Amount::from_sat(60), addr())
            .finalize(Amount::from_sat(100))
            .unwrap();
        assert_eq!(ok.total_amount(), Amount::from_sat(60));
    }

    #[test]
    fn zero_outputs() {
        let t = ctx()
            .template()
            .add_output(Amount::from_sat(100), addr())
            .add_output_if_nonzero(Amount::ZERO, addr())
            .drain()
            .finalize(Amount::from_sat(100))
            .unwrap();
        assert_eq!(t.outputs.len(), 1);
        let z = ctx()
            .template()
            .add_output(Amount::ZERO, addr())
            .finalize(Amount::from_sat(100));
        assert_eq!(z.err(), Some(CompilationError::ZeroValueOutput(0)));
    }

    #[test]
    fn locks_land_in_tx() {
        let t = ctx()
            .template()
            .set_sequence(RelHeight::from(144).into())
            .unwrap()
            .add_output(Amount::from_sat(100), addr())
            .finalize(Amount::from_sat(100))
            .unwrap();
        assert_eq!(t.tx.input[0].sequence, 144);
        assert_eq!(t.tx.lock_time, 0);
        assert_eq!(t.ctv, t.tx.get_ctv_hash(0));
    }

    #[test]
    fn wrong_network() {
        let cfg = CompilerConfig {
            network: bitcoin::Network::Regtest,
            ..Default::default()
        };
        let c = Context::new(Compiler::new(cfg, Registry::new()), Amount::from_sat(100));
        let r = c
            .template()
            .add_output(Amount::from_sat(100), addr())
            .finalize(Amount::from_sat(100));
        assert!(matches!(r, Err(CompilationError::WrongNetwork { .. })));
    }
}
