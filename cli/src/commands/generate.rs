use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use serde_json::json;
use tree::node::TinyTree;
use tree::normalise::normalise_cascades;
use tree::transform::TransformTable;

use catalogue::container::ContainerWriter;
use catalogue::depreciate;
use catalogue::generator::{generate as run_generator, GeneratorConfig};
use catalogue::imprint::{self, ImprintIndex};
use catalogue::interleave;
use catalogue::io_context::IoContext;
use catalogue::member::{Member, MemberFlags, MemberRecord, MemberTable};
use catalogue::pair::PairTable;
use catalogue::pattern::{self, FirstKey, PatternTable, SecondKey, SecondRecord};
use catalogue::rewrite_dfa;
use catalogue::signature::{SignatureCatalogue, SignatureFlags};

use super::Report;

#[derive(Parser, Debug)]
pub struct GenerateArgs {
    #[clap(long = "node-count")]
    pub node_count: u32,

    #[clap(long, default_value_t = interleave::DEFAULT_INTERLEAVE)]
    pub interleave: u32,

    #[clap(long)]
    pub pure: bool,

    /// `lo[,hi]` restart-window selection (§6).
    #[clap(long)]
    pub window: Option<String>,

    #[clap(long)]
    pub output: PathBuf,

    #[clap(long)]
    pub force: bool,

    #[clap(long = "no-save-index")]
    pub no_save_index: bool,
}

fn parse_window(spec: &str) -> Result<(u64, u64)> {
    let mut parts = spec.splitn(2, ',');
    let lo: u64 = parts.next().unwrap().parse().context("invalid --window lo")?;
    let hi: u64 = match parts.next() {
        Some(h) => h.parse().context("invalid --window hi")?,
        None => lo + 1,
    };
    Ok((lo, hi))
}

pub fn run(args: GenerateArgs) -> Result<Report> {
    if args.output.exists() && !args.force {
        anyhow::bail!("output {} already exists (pass --force to overwrite)", args.output.display());
    }

    let preset = interleave::lookup(args.interleave)
        .ok_or_else(|| anyhow::anyhow!("--interleave must be one of the supported presets"))?;

    let window = args.window.as_deref().map(parse_window).transpose()?;
    let cfg = GeneratorConfig {
        num_nodes: args.node_count,
        pure: args.pure,
        window,
        restart_stride: 1024,
    };

    let transforms = TransformTable::new();
    let mut signatures = SignatureCatalogue::with_capacity(1024);
    let mut members = MemberTable::new();
    let mut imprints = ImprintIndex::new(preset, &transforms, 1024);
    let mut pairs = PairTable::with_capacity(1024);
    let mut patterns = PatternTable::new();
    let mut ctx = IoContext::new();

    let mut emitted = 0u64;
    let mut decomposed = 0u64;
    run_generator(&cfg, &mut ctx, |emitted_tree: &TinyTree, root: u32| {
        emitted += 1;
        let raw_name = emitted_tree.save_string(root, None);

        // The generator's own tree array is shared and append-only across
        // the whole run (it never shrinks), so each callback re-parses its
        // tree into a fresh, small working copy rather than mutating the
        // shared one further.
        let mut working = TinyTree::new(args.pure);
        let raw_root = match working.decode_safe(&raw_name, None) {
            Ok(r) => r,
            Err(_) => return,
        };
        let normalised = match normalise_cascades(&mut working, raw_root) {
            Ok(r) => r,
            Err(_) => return,
        };
        let name = working.save_string(normalised, None);

        let flags = if args.pure { SignatureFlags::SAFE } else { SignatureFlags::empty() };
        let sid = match signatures.intern(&name, 0, 0, 0, args.node_count as u16, flags) {
            Ok(sid) => sid,
            Err(_) => return,
        };

        if signatures.get(sid).first_member.is_none() {
            let mut lanes = tree::seeded_lanes();
            working.eval(&mut lanes);
            let footprint = working.root_footprint(&lanes, normalised);
            let _ = imprints.add(&transforms, sid, &footprint);

            let candidates: Vec<u32> = imprints.row_tids().iter().chain(imprints.col_tids()).copied().collect();
            let swap = imprint::compute_swap(&transforms, &candidates, &footprint);
            signatures.get_mut(sid).swap = swap;

            // Component G: for an internal node, resolve its (Q, T, F)
            // children to their own signatures and record the pattern
            // compiler's two-level lookup (§4.G).
            let decomposition = pattern::decompose(&working, normalised, &transforms, &mut signatures);

            let mut member = Member::new(sid, name, MemberFlags::SAFE);
            if let Some(decomposition) = &decomposition {
                member.q_pair = Some(pairs.intern(decomposition.q.sid, decomposition.q.tid));
                member.t_pair = Some(pairs.intern(decomposition.t.sid, decomposition.t.tid));
                member.f_pair = Some(pairs.intern(decomposition.f.sid, decomposition.f.tid));
            }

            let sig = signatures.get_mut(sid);
            members.attach(member, sig);

            if let Some(decomposition) = decomposition {
                let first_key = decomposition.first_key();
                let first_id = patterns.intern_first(first_key);
                let second_key = SecondKey {
                    first_id,
                    sid_f: decomposition.f.sid,
                    tid_f_relative: decomposition.layout.tid_slot_f,
                };
                // `tid_extract`/`power` are left at their simplest legal
                // values here: extraction relative to the freshly-assigned
                // output slot order, no node-count savings claimed over the
                // triplet itself.
                let second_record = SecondRecord { sid_r: sid, tid_extract: 0, power: 1 };
                let _ = patterns.record_second(second_key, second_record);
                decomposed += 1;
            }
        }
    })?;

    info!("generated {} trees, {} distinct signatures", emitted, signatures.len());

    // Component F: compile the rewrite DFA's dense verdict table. Runs
    // independently of the generated signature set.
    let rewrite_table = rewrite_dfa::compile(args.pure)?;

    // Component H: prune the member catalogue to its minimal covering set.
    let total_depreciated = depreciate::depreciate(&mut signatures, &mut members)?;

    let mut writer = ContainerWriter::new(tree::consts::MAXSLOTS as u32, args.interleave);
    writer.add_section("signature_names", signatures.len() as u32, &signature_names(&signatures))?;
    writer.add_section("signature_first_members", 1, &signature_first_members(&signatures))?;
    writer.add_section("member_records", 1, &member_records(&members))?;
    writer.add_section("pair_table", 1, &pair_records(&pairs))?;
    writer.add_section("rewrite_table", 1, &rewrite_table)?;
    writer.add_section("pattern_table", 1, &pattern_records(&patterns))?;
    if !args.no_save_index {
        writer.add_section("imprint_count", 1, &(imprints.len() as u32))?;
    }
    writer.write_to(&args.output)?;

    Ok(Report::new("generate").with_output(&args.output).with_fields(json!({
        "nodeCount": args.node_count,
        "interleave": args.interleave,
        "treesEmitted": emitted,
        "signatures": signatures.len(),
        "members": members.len(),
        "depreciated": total_depreciated,
        "rewriteCells": rewrite_table.len_recorded(),
        "patternEntries": decomposed,
    })))
}

fn signature_names(signatures: &SignatureCatalogue) -> Vec<String> {
    signatures.iter().map(|(_, s)| s.name.clone()).collect()
}

fn signature_first_members(signatures: &SignatureCatalogue) -> Vec<Option<u32>> {
    signatures.iter().map(|(_, s)| s.first_member).collect()
}

fn member_records(members: &MemberTable) -> Vec<MemberRecord> {
    (0..members.len() as u32).map(|id| members.get(id).to_record()).collect()
}

fn pair_records(pairs: &PairTable) -> Vec<(u32, u32)> {
    (0..pairs.len() as u32)
        .map(|id| {
            let pair = pairs.get(id);
            (pair.sid, pair.tid)
        })
        .collect()
}

fn pattern_records(patterns: &PatternTable) -> Vec<(FirstKey, SecondKey, SecondRecord)> {
    patterns
        .second_entries()
        .map(|(key, record)| (patterns.first_key(key.first_id), *key, *record))
        .collect()
}
