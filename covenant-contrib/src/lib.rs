// Copyright Judica, Inc 2021
//
// This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at https://mozilla.org/MPL/2.0/.
#![deny(missing_docs)]

//! Collection of contracts built on the covenant compiler, usable directly or
//! as components of larger contracts.

pub mod contracts;

use contracts::*;
use covenant::contract::Registry;
use std::sync::Arc;

/// A registry holding every contract kind in this crate.
pub fn builtin_registry() -> Registry {
    Registry::new()
        .register(Arc::new(UndoSend))
        .register(Arc::new(UndoSend2))
        .register(Arc::new(ColdStorage))
        .register(Arc::new(SmarterVault))
        .register(Arc::new(CancellableSubscription))
        .register(Arc::new(CancelContest))
        .register(Arc::new(AutoPay))
        .register(Arc::new(Payments))
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant::contract::ContractType;
    #[test]
    fn every_kind_registered_and_valid() {
        let r = builtin_registry();
        let kinds: Vec<_> = r.kinds().collect();
        assert_eq!(kinds.len(), 8);
        for k in kinds {
            let c = r.get(k).unwrap();
            assert_eq!(c.kind(), k);
            assert!(c.paths().validate().is_ok(), "{}", k);
            assert!(r.api(k).is_ok());
        }
    }
}
