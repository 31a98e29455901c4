// Copyright Judica, Inc 2021
//
// This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! covenant-cli compiles covenant contracts from JSON requests.
use clap::clap_app;
use config::Config;
use covenant::contract::Compiler;
use covenant_contrib::builtin_registry;
use request::{CompileRequest, Response};
use util::*;

pub mod config;
pub mod payments;
pub mod request;
mod util;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let app = clap_app!(("covenant-cli") =>
    (@setting SubcommandRequiredElseHelp)
    (version: "0.1.0")
    (about: "Compiler for Bitcoin covenant contracts")
    (@arg config: -c --config +takes_value #{1,1} {check_file} "Sets a custom config file")
    (@arg network: -n --network +takes_value "Network override: bitcoin, testnet, signet, regtest")
    (@arg debug: -d ... "Sets the level of debugging information")
    (@subcommand configure =>
     (@setting SubcommandRequiredElseHelp)
     (about: "Helper to check current configuration settings")
     (@subcommand files =>
      (about: "Show where the configure files live.")
     )
     (@subcommand show =>
      (about: "Print out the currently loaded configuration")
     )
    )
    (@subcommand list =>
     (about: "List the contract kinds this compiler knows")
    )
    (@subcommand api =>
     (about: "Print the JSON Schema of a contract kind's fields")
     (@arg kind: +required "The contract kind")
    )
    (@subcommand compile =>
     (about: "Compile a request {\"type\", \"amount\", \"fields\"}")
     (@arg input: -i --input +takes_value {check_file} "The request file, stdin if absent")
    )
    (@subcommand pay =>
     (about: "Compile a payment list [{\"address\", \"amount\"}] into one transaction")
     (@arg input: -i --input +takes_value {check_file} "The payment list file, stdin if absent")
    )
    );
    let matches = app.get_matches();
    env_logger::Builder::from_default_env()
        .filter_level(log_level(matches.occurrences_of("debug")))
        .init();

    let (typ, org, proj) = ("org", "judica", "covenant-cli");
    let config = Config::setup(&matches, typ, org, proj)?;
    let compiler = Compiler::new(config.compiler.clone(), builtin_registry());

    let response = match matches.subcommand() {
        ("configure", Some(sub)) => {
            match sub.subcommand() {
                ("files", _) => println!("{}", Config::default_path(typ, org, proj)?.display()),
                ("show", _) => println!("{}", serde_json::to_string_pretty(&config)?),
                _ => unreachable!(),
            }
            return Ok(());
        }
        ("list", _) => {
            for kind in compiler.registry().kinds() {
                println!("{}", kind);
            }
            return Ok(());
        }
        ("api", Some(args)) => {
            let kind = args.value_of("kind").ok_or("kind is required")?;
            println!(
                "{}",
                serde_json::to_string_pretty(&compiler.registry().api(kind)?)?
            );
            return Ok(());
        }
        ("compile", Some(args)) => {
            CompileRequest::from_json(&read_input(args, "input")?)?.handle(&compiler)
        }
        ("pay", Some(args)) => {
            payments::from_json(&read_input(args, "input")?, config.compiler.network)?
                .handle(&compiler)
        }
        _ => unreachable!(),
    };
    println!("{}", serde_json::to_string_pretty(&response)?);
    if let Response::Err(_) = response {
        std::process::exit(1);
    }
    Ok(())
}
