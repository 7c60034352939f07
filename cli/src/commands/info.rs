use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use serde_json::json;

use catalogue::container::ContainerReader;

use super::Report;

#[derive(Parser, Debug)]
pub struct InfoArgs {
    #[clap(long)]
    pub input: PathBuf,
}

pub fn run(args: InfoArgs) -> Result<Report> {
    let reader = ContainerReader::open(&args.input, tree::consts::MAXSLOTS as u32)?;
    let header = reader.header();

    let sections: Vec<_> = header
        .sections
        .iter()
        .map(|s| json!({ "name": s.name, "count": s.count, "elementSize": s.element_size, "offset": s.offset }))
        .collect();

    Ok(Report::new("info").with_input(&args.input).with_fields(json!({
        "slots": header.slots,
        "interleave": header.interleave,
        "version": header.version,
        "sections": sections,
    })))
}
