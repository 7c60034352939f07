use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::json;
use tree::node::TinyTree;
use tree::normalise::normalise_cascades;
use tree::transform::TransformTable;

use catalogue::container::ContainerReader;
use catalogue::error::SelftestDiagnostic;

use super::Report;

#[derive(Parser, Debug)]
pub struct SelftestArgs {
    #[clap(long)]
    pub input: PathBuf,
}

/// Re-runs a subset of §8's structural properties against a real container,
/// mirroring `original_source/selftest.cc`'s role as a release gate rather
/// than a development-time unit test.
pub fn run(args: SelftestArgs) -> Result<Report> {
    let reader = ContainerReader::open(&args.input, tree::consts::MAXSLOTS as u32)?;
    let names: Vec<String> = reader.decode_section("signature_names")?;

    let mut checked = 0u32;
    for name in &names {
        checked += 1;
        if let Err(diag) = assert_idempotent(name) {
            bail!(catalogue::error::Error::Selftest(diag));
        }
        if let Err(diag) = assert_round_trip(name) {
            bail!(catalogue::error::Error::Selftest(diag));
        }
    }

    assert_row_col_coverage()?;

    Ok(Report::new("selftest").with_input(&args.input).with_fields(json!({
        "signaturesChecked": checked,
        "ok": true,
    })))
}

fn assert_idempotent(name: &str) -> std::result::Result<(), SelftestDiagnostic> {
    let mut t1 = TinyTree::new(false);
    let r1 = t1.decode_safe(name, None).map_err(|e| diag(line!(), "assert_idempotent", "parse ok", &e.to_string(), name))?;
    let once = normalise_cascades(&mut t1, r1).map_err(|e| diag(line!(), "assert_idempotent", "normalise ok", &e.to_string(), name))?;
    let twice = normalise_cascades(&mut t1, once).map_err(|e| diag(line!(), "assert_idempotent", "normalise ok", &e.to_string(), name))?;
    if once != twice {
        return Err(diag(line!(), "assert_idempotent", &once.to_string(), &twice.to_string(), name));
    }
    Ok(())
}

fn assert_round_trip(name: &str) -> std::result::Result<(), SelftestDiagnostic> {
    let mut t = TinyTree::new(false);
    let root = t.decode_safe(name, None).map_err(|e| diag(line!(), "assert_round_trip", "parse ok", &e.to_string(), name))?;
    let printed = t.save_string(root, None);
    let mut t2 = TinyTree::new(false);
    let root2 = t2.decode_safe(&printed, None).map_err(|e| diag(line!(), "assert_round_trip", "reparse ok", &e.to_string(), name))?;
    let reprinted = t2.save_string(root2, None);
    if printed != reprinted {
        return Err(diag(line!(), "assert_round_trip", &printed, &reprinted, name));
    }
    Ok(())
}

/// §4.D/§8's `performSelfTestRowCol`: every transform must be produced by
/// exactly one row×column composition. Arithmetic agreement between
/// `rows * cols` and `num_transforms` is necessary but nowhere near
/// sufficient — it cannot tell a genuine coset decomposition from a
/// construction that only ever revisits one subgroup, which is exactly the
/// failure mode this check exists to catch.
fn assert_row_col_coverage() -> Result<()> {
    let transforms = TransformTable::new();
    for preset in catalogue::interleave::PRESETS {
        let (row_tids, col_tids) = catalogue::imprint::build_row_col_tids(*preset, &transforms);
        if row_tids.len() != preset.rows as usize || col_tids.len() != preset.cols as usize {
            bail!(
                "interleave preset {} fails row/col coverage: built {} rows, {} cols, expected {} and {}",
                preset.interleave,
                row_tids.len(),
                col_tids.len(),
                preset.rows,
                preset.cols,
            );
        }

        let mut covered = vec![false; transforms.num_transforms as usize];
        for &row in &row_tids {
            let row_perm = transforms.forward(row);
            for &col in &col_tids {
                let col_perm = transforms.forward(col);
                let composed = TransformTable::compose(&col_perm, &row_perm);
                let name: String = composed.iter().map(|&slot| (b'a' + slot) as char).collect();
                let tid = transforms
                    .lookup_forward(&name)
                    .with_context(|| format!("composed transform {} has no tid in the table", name))?;
                if covered[tid as usize] {
                    bail!(
                        "interleave preset {} covers tid {} more than once via row {} x col {}",
                        preset.interleave,
                        tid,
                        row,
                        col,
                    );
                }
                covered[tid as usize] = true;
            }
        }
        if let Some(missing) = covered.iter().position(|&c| !c) {
            bail!("interleave preset {} never covers tid {}", preset.interleave, missing);
        }
    }
    Ok(())
}

fn diag(line: u32, function: &'static str, expected: &str, encountered: &str, input: &str) -> SelftestDiagnostic {
    SelftestDiagnostic {
        line,
        function,
        expected: expected.to_string(),
        encountered: encountered.to_string(),
        input: input.to_string(),
    }
}
