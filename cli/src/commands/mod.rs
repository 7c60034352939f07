//! CLI surface (§6): one subcommand per build tool, since this system has
//! more than one (unlike `x4c`'s single flat flag set).

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;

pub mod generate;
pub mod info;
pub mod rewrite;
pub mod selftest;

#[derive(Parser)]
#[clap(name = "untangle", version = "0.1")]
pub struct Opts {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Exhaustively enumerate canonical trees and build a container.
    Generate(generate::GenerateArgs),
    /// Look up a tree name's canonical rewrite in a built container.
    Rewrite(rewrite::RewriteArgs),
    /// Print a container's header and section counts.
    Info(info::InfoArgs),
    /// Run the testable properties (§8) against a built container.
    Selftest(selftest::SelftestArgs),
}

/// The single-line JSON object a successful run prints (§6 "Exit-status
/// JSON"). Field ordering is explicitly not normative.
#[derive(Debug, Serialize)]
pub struct Report {
    pub command: &'static str,
    pub input: Option<String>,
    pub output: Option<String>,
    pub fields: serde_json::Value,
}

impl Report {
    pub fn new(command: &'static str) -> Self {
        Self { command, input: None, output: None, fields: json!({}) }
    }

    pub fn with_input(mut self, path: &std::path::Path) -> Self {
        self.input = Some(path.display().to_string());
        self
    }

    pub fn with_output(mut self, path: &std::path::Path) -> Self {
        self.output = Some(path.display().to_string());
        self
    }

    pub fn with_fields(mut self, fields: serde_json::Value) -> Self {
        self.fields = fields;
        self
    }

    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
