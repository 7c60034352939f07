//! Generator (§4.E): exhaustive, non-duplicating enumeration of canonical
//! trees with exactly `num_nodes` internal nodes, placeholders introduced in
//! encounter order. A generator stack tracks already-built subtree ids so
//! later nodes may reference them instead of only fresh placeholders or the
//! constant; a version-cached hash vetoes any triplet this stack has
//! already produced.
//!
//! Restart points are recorded as plain callback-count offsets rather than
//! the original's packed-word stack encoding (§9 calls the stack-in-a-word
//! trick out as "keep exactly as specified" for the *tree-building* stack,
//! not for the restart table itself); `--window`/`--task` select a
//! contiguous slice of those offsets.

use tree::consts::{IBIT, KSTART, MAXSLOTS};
use tree::error::Result;
use tree::node::TinyTree;

use crate::io_context::IoContext;

/// One node template entry: either a fresh placeholder, the constant, or a
/// reference to an already-built subtree at a given stack depth.
#[derive(Debug, Clone, Copy)]
enum Endpoint {
    Zero,
    Fresh,
    Back(usize),
}

fn endpoint_choices(num_placeholders_used: u8, stack_depth: usize) -> Vec<Endpoint> {
    let mut out = vec![Endpoint::Zero];
    if (num_placeholders_used as usize) < MAXSLOTS {
        out.push(Endpoint::Fresh);
    }
    for depth in 0..stack_depth {
        out.push(Endpoint::Back(depth));
    }
    out
}

/// Restart point recorded at a given callback ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPoint {
    pub position: u64,
}

pub struct GeneratorConfig {
    pub num_nodes: u32,
    pub pure: bool,
    /// Inclusive/exclusive window of callback positions to actually emit;
    /// `None` means emit everything.
    pub window: Option<(u64, u64)>,
    /// Record a restart point every `restart_stride` callbacks (0 disables).
    pub restart_stride: u64,
}

pub struct GeneratorOutput {
    pub count: u64,
    pub restart_points: Vec<RestartPoint>,
}

struct State<'a, F: FnMut(&TinyTree, u32)> {
    cfg: &'a GeneratorConfig,
    callback: F,
    position: u64,
    seen: std::collections::HashSet<(u32, u32, u32)>,
    restart_points: Vec<RestartPoint>,
}

/// Enumerates every canonical tree with exactly `cfg.num_nodes` internal
/// nodes, invoking `callback(tree, root)` once per tree that falls inside
/// `cfg.window` (or every tree, if no window is set).
pub fn generate(cfg: &GeneratorConfig, ctx: &mut IoContext, mut callback: impl FnMut(&TinyTree, u32)) -> Result<GeneratorOutput> {
    let mut tree = TinyTree::new(cfg.pure);
    let mut state = State {
        cfg,
        callback: &mut callback,
        position: 0,
        seen: std::collections::HashSet::new(),
        restart_points: Vec::new(),
    };
    build(&mut tree, &mut state, ctx, 0, 0, &[])?;
    Ok(GeneratorOutput { count: state.position, restart_points: state.restart_points })
}

fn resolve(endpoint: Endpoint, placeholders: &mut u8, stack: &[u32]) -> u32 {
    match endpoint {
        Endpoint::Zero => 0,
        Endpoint::Fresh => {
            let slot = KSTART + *placeholders as u32;
            *placeholders += 1;
            slot
        }
        Endpoint::Back(depth) => stack[stack.len() - 1 - depth],
    }
}

fn build<F: FnMut(&TinyTree, u32)>(
    tree: &mut TinyTree,
    state: &mut State<F>,
    ctx: &mut IoContext,
    depth: u32,
    placeholders: u8,
    stack: &[u32],
) -> Result<()> {
    if depth == state.cfg.num_nodes {
        if !stack.is_empty() {
            let root = stack[stack.len() - 1];
            emit(tree, state, ctx, root);
        }
        return Ok(());
    }

    let q_choices = endpoint_choices(placeholders, stack.len());
    for &q_e in &q_choices {
        let mut ph = placeholders;
        let q = resolve(q_e, &mut ph, stack);
        if q == 0 {
            continue; // Q = 0 is never valid (§3 invariant Q != 0).
        }
        let t_choices = endpoint_choices(ph, stack.len());
        for &t_e in &t_choices {
            let mut ph2 = ph;
            let t_raw = resolve(t_e, &mut ph2, stack);
            for &t_inverted in &[false, true] {
                if state.cfg.pure && !t_inverted {
                    continue; // pure mode forbids non-inverted T (QTF)
                }
                let t = if t_inverted { t_raw ^ IBIT } else { t_raw };
                let f_choices = endpoint_choices(ph2, stack.len());
                for &f_e in &f_choices {
                    let mut ph3 = ph2;
                    let f = resolve(f_e, &mut ph3, stack);

                    let key = (q, t, f);
                    if !state.seen.insert(key) {
                        continue;
                    }
                    let built = tree.add_normalised(q, t, f);
                    state.seen.remove(&key);
                    let Ok(node_ref) = built else { continue };

                    let mut next_stack: Vec<u32> = Vec::with_capacity(stack.len() + 1);
                    next_stack.extend_from_slice(stack);
                    next_stack.push(node_ref);

                    build(tree, state, ctx, depth + 1, ph3, &next_stack)?;
                    ctx.report(0, "generator step");
                }
            }
        }
    }
    Ok(())
}

fn emit<F: FnMut(&TinyTree, u32)>(tree: &mut TinyTree, state: &mut State<F>, ctx: &mut IoContext, root: u32) {
    let position = state.position;
    state.position += 1;
    if state.cfg.restart_stride != 0 && position % state.cfg.restart_stride == 0 {
        state.restart_points.push(RestartPoint { position });
    }
    let in_window = match state.cfg.window {
        Some((lo, hi)) => position >= lo && position < hi,
        None => true,
    };
    if in_window {
        (state.callback)(tree, root);
        ctx.report(1, "tree emitted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(num_nodes: u32, pure: bool) -> Vec<String> {
        let cfg = GeneratorConfig { num_nodes, pure, window: None, restart_stride: 0 };
        let mut ctx = IoContext::new();
        let mut names = Vec::new();
        generate(&cfg, &mut ctx, |tree, root| {
            names.push(tree.save_string(root, None));
        })
        .unwrap();
        names
    }

    #[test]
    fn single_node_trees_are_all_distinct_and_dyadic_ordered() {
        let names = run(1, false);
        assert!(!names.is_empty());
        let unique: std::collections::HashSet<_> = names.iter().cloned().collect();
        assert_eq!(unique.len(), names.len(), "generator must not emit duplicates");
    }

    #[test]
    fn windowed_run_matches_the_one_tree_at_that_position() {
        let cfg_full = GeneratorConfig { num_nodes: 1, pure: false, window: None, restart_stride: 0 };
        let mut ctx = IoContext::new();
        let mut all = Vec::new();
        generate(&cfg_full, &mut ctx, |tree, root| all.push(tree.save_string(root, None))).unwrap();

        let lo = (all.len() as u64) / 2;
        let cfg_window = GeneratorConfig { num_nodes: 1, pure: false, window: Some((lo, lo + 1)), restart_stride: 0 };
        let mut ctx2 = IoContext::new();
        let mut windowed = Vec::new();
        generate(&cfg_window, &mut ctx2, |tree, root| windowed.push(tree.save_string(root, None))).unwrap();

        assert_eq!(windowed, vec![all[lo as usize].clone()]);
    }

    #[test]
    fn pure_mode_never_emits_a_qtf_node() {
        let cfg = GeneratorConfig { num_nodes: 2, pure: true, window: None, restart_stride: 0 };
        let mut ctx = IoContext::new();
        generate(&cfg, &mut ctx, |tree, _root| {
            for nid in (tree::consts::NSTART)..tree.count {
                let node = tree.nodes[nid as usize];
                assert_ne!(node.t & IBIT, 0);
            }
        })
        .unwrap();
    }
}
