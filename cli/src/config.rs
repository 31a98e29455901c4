// Copyright Judica, Inc 2021
//
// This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at https://mozilla.org/MPL/2.0/.

use covenant::CompilerConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Settings for this covenant-cli instance. Missing entries take their
/// defaults, so an empty object is a valid config file.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct Config {
    /// settings handed to the compiler
    #[serde(default)]
    pub compiler: CompilerConfig,
}

impl Config {
    /// where the default config file lives
    pub fn default_path(
        typ: &str,
        org: &str,
        proj: &str,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let proj = directories::ProjectDirs::from(typ, org, proj)
            .ok_or("Failed to find config directory")?;
        let mut pb = proj.config_dir().to_path_buf();
        pb.push("config.json");
        Ok(pb)
    }

    /// reads the user's config file and returns it,
    /// or a different one if the user specified a different file manually.
    ///
    /// if no config is found for the user, creates a file.
    ///
    /// **Race Conditions** This is clearly not safe if multiple edits are
    /// happening on config.json. It is assumed that the user will ensure
    /// writes to config.json are safe.
    pub fn setup(
        matches: &clap::ArgMatches,
        typ: &str,
        org: &str,
        proj: &str,
    ) -> Result<Config, Box<dyn std::error::Error>> {
        let mut config: Config = if let Some(p) = matches.value_of("config") {
            serde_json::from_slice(&std::fs::read(p)?[..])?
        } else {
            let pb = Self::default_path(typ, org, proj)?;
            if let Ok(txt) = std::fs::read(&pb) {
                serde_json::from_slice(&txt[..])?
            } else {
                if let Some(dir) = pb.parent() {
                    std::fs::create_dir_all(dir)?;
                }
                let cfg = Config::default();
                std::fs::write(&pb, &serde_json::to_string_pretty(&cfg)?)?;
                cfg
            }
        };
        if let Some(n) = matches.value_of("network") {
            config.compiler.network = bitcoin::Network::from_str(n)?;
        }
        Ok(config)
    }
}
