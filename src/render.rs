//! Pull renderer
//!
//! Starting from a node, recursively renders its inputs into their scratch
//! buffers, then processes the node itself. A node is processed at most once
//! per generation: it is marked before its inputs are pulled, so a consumer
//! reached twice reuses the cached scratch and a back-edge in a cycle reads
//! whatever the node produced last.

use core::mem;

use crate::error::{Error, Result};
use crate::graph::AudioGraph;
use crate::node::{ensure_len, AudioNode, NodeId, ProcessContext, Pull};

/// Render `id` for `ctx.generation` and copy its output into `out`.
///
/// `out` must hold at least `ctx.len()` samples.
pub(crate) fn render(
    graph: &mut AudioGraph,
    ctx: &ProcessContext<'_>,
    id: NodeId,
    out: &mut [f32],
) -> Result<()> {
    render_node(graph, ctx, id)?;

    let node = graph.node(id).ok_or(Error::BadArgument("unknown node"))?;
    let len = ctx.len();
    out[..len].copy_from_slice(&node.scratch[..len]);
    Ok(())
}

fn render_node(graph: &mut AudioGraph, ctx: &ProcessContext<'_>, id: NodeId) -> Result<()> {
    let len = ctx.len();

    let pull = {
        let node = graph.node_mut(id).ok_or(Error::BadArgument("unknown node"))?;
        if node.last_rendered == ctx.generation {
            return Ok(());
        }
        ensure_len(&mut node.scratch, len)?;
        ensure_len(&mut node.pulled, len)?;
        node.last_rendered = ctx.generation;
        node.state.pull()
    };

    let inputs = match pull {
        Pull::Nothing => Vec::new(),
        Pull::First => graph.inputs(id).into_iter().take(1).collect(),
        Pull::All => graph.inputs(id),
    };

    for &input in &inputs {
        render_node(graph, ctx, input)?;
    }

    let mut pulled = match graph.node_mut(id) {
        Some(node) => mem::take(&mut node.pulled),
        None => return Err(Error::BadArgument("unknown node")),
    };
    pulled[..len].iter_mut().for_each(|s| *s = 0.0);

    for &input in &inputs {
        if let Some(src) = graph.node(input) {
            for (acc, &s) in pulled[..len].iter_mut().zip(&src.scratch) {
                *acc += s;
            }
        }
    }

    let node = match graph.node_mut(id) {
        Some(node) => node,
        None => return Err(Error::BadArgument("unknown node")),
    };
    let mut scratch = mem::take(&mut node.scratch);
    let input = if inputs.is_empty() {
        None
    } else {
        Some(&pulled[..len])
    };
    node.state.process(ctx, input, &mut scratch[..len]);
    node.renders += 1;
    node.scratch = scratch;
    node.pulled = pulled;

    Ok(())
}
