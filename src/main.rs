// Copyright 2025 the deadbolt authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use clap::{Parser, ValueEnum};
use deadbolt::config::DeadboltConfig;
use deadbolt::demo;
use deadbolt::error::{Result, get_exit_code};
use deadbolt::locking::{DeadlockPolicy, LockManager};
use deadbolt::logging;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "deadbolt")]
#[command(author, version, about = "Deadlock-aware lock manager demo", long_about = None)]
struct Cli {
    /// Deadlock response: "safe" aborts the process on a circular wait,
    /// "unsafe" declines the offending acquisition and carries on
    #[arg(value_enum)]
    mode: Option<Mode>,

    /// Workload to drive
    #[arg(long, value_enum, default_value_t = Scenario::Deadlock)]
    scenario: Scenario,

    /// Iterations each worker runs
    #[arg(long)]
    iterations: Option<u32>,

    /// How long a worker holds a lock, in milliseconds
    #[arg(long)]
    hold_millis: Option<u64>,

    /// Directory containing deadbolt.toml (defaults to the current directory)
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Safe,
    Unsafe,
}

#[derive(Clone, Copy, ValueEnum)]
enum Scenario {
    Deadlock,
    Basic,
}

fn main() {
    let cli = Cli::parse();

    logging::setup_logger(cli.verbose);

    let result: Result<()> = (|| {
        let config_dir = cli
            .config_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        let mut config = DeadboltConfig::load(&config_dir)?;

        // Absence of a mode argument keeps the configured (default: abort)
        // policy, matching the "safe unless told otherwise" contract.
        if let Some(mode) = cli.mode {
            config.on_deadlock = match mode {
                Mode::Safe => DeadlockPolicy::Abort,
                Mode::Unsafe => DeadlockPolicy::Decline,
            };
        }
        if let Some(iterations) = cli.iterations {
            config.demo.iterations = iterations;
        }
        if let Some(hold_millis) = cli.hold_millis {
            config.demo.hold_millis = hold_millis;
        }

        let manager = Arc::new(LockManager::with_config(&config));
        log::info!(
            "Running {} scenario with {} policy",
            match cli.scenario {
                Scenario::Deadlock => "deadlock",
                Scenario::Basic => "basic",
            },
            manager.policy()
        );

        match cli.scenario {
            Scenario::Deadlock => demo::run_deadlock(manager, &config.demo),
            Scenario::Basic => demo::run_basic(manager, &config.demo),
        }
    })();

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(get_exit_code(&e));
    }
}
