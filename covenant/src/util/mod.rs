// Copyright Judica, Inc 2021
//
// This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! general utilities for working with contracts
pub mod amountrange;

use bitcoin::Network;

/// Can an address decoded as `found` be used on `expected`? Testnet and
/// signet share an address encoding, so an address decodes as testnet either
/// way.
pub fn address_usable_on(found: Network, expected: Network) -> bool {
    found == expected
        || matches!(
            (found, expected),
            (Network::Testnet, Network::Signet) | (Network::Signet, Network::Testnet)
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn signet_and_testnet_share_addresses() {
        assert!(address_usable_on(Network::Testnet, Network::Signet));
        assert!(address_usable_on(Network::Regtest, Network::Regtest));
        assert!(!address_usable_on(Network::Testnet, Network::Regtest));
        assert!(!address_usable_on(Network::Bitcoin, Network::Testnet));
    }
}
