// Copyright Judica, Inc 2021
//
// This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod common;
use common::*;
use covenant_base::timelocks::{AnyAbsTimeLock, AnyRelTimeLock, RelHeight};
use serde_json::json;

fn recipient_total(t: &covenant::template::Template) -> u64 {
    t.outputs
        .iter()
        .filter(|o| o.address.to_string() == RECIPIENT)
        .map(|o| o.amount.as_sat())
        .sum()
}

#[test]
fn claims_pay_the_whole_schedule() {
    let s = compile("subscription", subscription_fields(), 100).unwrap();
    let first = &s.path("claim").unwrap()[0];
    assert_eq!(first.lock_time, Some(AnyAbsTimeLock::at_height(100).unwrap()));
    assert_eq!(first.tx.lock_time, 100);
    assert_eq!(recipient_total(first), 50);
    let next = child(&s, "claim", "subscription").unwrap();
    assert_eq!(next.amount, sats(50));
    assert_eq!(next.fields.schedule("schedule").unwrap().len(), 1);

    let second = &next.path("claim").unwrap()[0];
    assert_eq!(second.lock_time, Some(AnyAbsTimeLock::at_height(200).unwrap()));
    assert_eq!(second.outputs.len(), 1);
    assert_eq!(recipient_total(first) + recipient_total(second), 100);
}

#[test]
fn cancel_opens_a_contest() {
    let s = compile("subscription", subscription_fields(), 100).unwrap();
    let cancel = &s.path("cancel").unwrap()[0];
    assert_eq!(cancel.outputs.len(), 1);
    assert_eq!(cancel.outputs[0].amount, sats(100));
    let contest = child(&s, "cancel", "cancel_contest").unwrap();
    assert_eq!(contest.metadata.label.as_deref(), Some("Cancellation Attempt"));
    assert_eq!(s.metadata.color.as_deref(), Some("blue"));

    let finish = &contest.path("finish_cancel").unwrap()[0];
    assert_eq!(finish.sequence, Some(AnyRelTimeLock::from(RelHeight::from(6))));
    assert_eq!(finish.outputs[0].address.to_string(), RETURN);
    assert_eq!(finish.outputs[0].amount, sats(100));
}

#[test]
fn counterclaims_follow_the_schedule() {
    let contest = compile("cancel_contest", subscription_fields(), 100).unwrap();
    let claims = contest.path("counterclaim").unwrap();
    assert_eq!(claims.len(), 2);
    let split: Vec<Vec<u64>> = claims
        .iter()
        .map(|t| t.outputs.iter().map(|o| o.amount.as_sat()).collect())
        .collect();
    assert_eq!(split, vec![vec![50, 50], vec![100]]);
    assert!(claims
        .windows(2)
        .all(|w| recipient_total(&w[0]) <= recipient_total(&w[1])));
    assert_eq!(claims[1].outputs[0].address.to_string(), RECIPIENT);
    // watchtower signature plus one commitment per claim
    assert!(contest.miniscript.contains(K1));
    assert_eq!(contest.ctv_hashes().len(), 3);
}

#[test]
fn counterclaims_are_restartable() {
    let a = compile("cancel_contest", subscription_fields(), 100).unwrap();
    let b = compile("cancel_contest", subscription_fields(), 100).unwrap();
    assert_eq!(a.ctv_hashes(), b.ctv_hashes());
}

#[test]
fn auto_pay_matches_explicit_subscription() {
    let explicit = compile("subscription", subscription_fields(), 100).unwrap();
    let auto = compile(
        "auto_pay",
        obj(json!({
            "period": 100,
            "times": 2,
            "per_time": 50,
            "recipient": {"address": RECIPIENT},
            "return_address": {"address": RETURN},
            "watchtower_key": K1,
            "return_timeout": {"relative_height": 6},
        })),
        100,
    )
    .unwrap();
    assert_eq!(auto.address, explicit.address);
    assert_eq!(auto.ctv_hashes(), explicit.ctv_hashes());
    assert_ne!(auto.fingerprint, explicit.fingerprint);
}

#[test]
fn overscheduled_subscription_fails() {
    let mut f = subscription_fields();
    f.insert("amount".into(), json!(40));
    assert!(compile("subscription", f, 40).is_err());
}
