use anyhow::Result;
use clap::Parser;
use colored::Colorize;

mod commands;

use commands::{Command, Opts};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts: Opts = Opts::parse();

    let outcome = match opts.command {
        Command::Generate(args) => commands::generate::run(args),
        Command::Rewrite(args) => commands::rewrite::run(args),
        Command::Info(args) => commands::info::run(args),
        Command::Selftest(args) => commands::selftest::run(args),
    };

    match outcome {
        Ok(report) => {
            println!("{}", report.to_json_line());
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            Err(e)
        }
    }
}
