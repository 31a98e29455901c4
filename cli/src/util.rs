// Copyright Judica, Inc 2021
//
// This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at https://mozilla.org/MPL/2.0/.

use log::LevelFilter;
use std::io::Read;

/// Checks that a file exists during argument parsing
///
/// **Race Conditions** if file is deleted after this call
pub fn check_file(p: String) -> Result<(), String> {
    std::fs::metadata(p).map_err(|_| String::from("File doesn't exist"))?;
    Ok(())
}

/// Reads the file named by argument `arg`, or stdin if it was not given.
pub fn read_input(
    matches: &clap::ArgMatches,
    arg: &str,
) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match matches.value_of(arg) {
        Some(p) => std::fs::read_to_string(p)?,
        None => {
            let mut s = String::new();
            std::io::stdin().read_to_string(&mut s)?;
            s
        }
    })
}

/// Log level for `n` repetitions of `-d`.
pub fn log_level(n: u64) -> LevelFilter {
    match n {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}
