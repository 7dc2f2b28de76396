//! Reverse-mode automatic differentiation implementation.
//!
//! The backward pass computes gradients by:
//! 1. Building a topological ordering of nodes reachable from the output
//! 2. Traversing in reverse order, accumulating each node's gradient onto its
//!    arguments through the local gradient of its operation
//!
//! Both steps use explicit stacks, so graph depth is bounded by memory rather
//! than by the thread's call stack.

use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::node::{Tape, Value};
use crate::ops::local_gradients;

/// Compute gradients via reverse-mode autodiff.
///
/// Seeds `root.grad = 1`, then runs every reachable node's rule exactly once in
/// reverse topological order. Gradients are accumulated, never overwritten, so
/// nodes reached along several paths receive the sum of every contribution.
///
/// Returns the number of distinct nodes visited.
pub fn backward(tape: &mut Tape, root: Value) -> Result<usize> {
    let root_index = tape.checked_index(root)?;

    // Step 1: Build topological order
    let order = topological_order(tape, root_index);

    // Step 2: d(root)/d(root) = 1
    tape.nodes[root_index].grad = Decimal::ONE;

    // Step 3: Traverse from the root towards the leaves
    for &index in order.iter().rev() {
        let node = &tape.nodes[index];
        let adjoint = node.grad;

        // Leaves have nothing to propagate; a zero adjoint contributes nothing
        if node.is_leaf() || adjoint.is_zero() {
            continue;
        }

        let args: Vec<Decimal> = node.args.iter().map(|&i| tape.nodes[i].data).collect();
        let local = local_gradients(&node.op, &args, node.data)?;
        let slots = node.args.clone();

        for (slot, partial) in slots.into_iter().zip(local) {
            // Chain rule: arg_grad += adjoint * local_gradient
            let contribution = adjoint
                .checked_mul(partial)
                .ok_or(Error::Arithmetic { op: "backward" })?;
            tape.accumulate_grad(slot, contribution)?;
        }
    }

    Ok(order.len())
}

/// Build a topological ordering of all nodes reachable from `root`.
///
/// Iterative DFS postorder: a node is appended only after all of its operands.
/// Operands are visited in their stored order, matching a recursive walk.
pub(crate) fn topological_order(tape: &Tape, root: usize) -> Vec<usize> {
    let mut visited = vec![false; tape.nodes.len()];
    let mut order = Vec::new();
    let mut stack = vec![(root, false)];

    while let Some((index, expanded)) = stack.pop() {
        if expanded {
            order.push(index);
            continue;
        }
        if visited[index] {
            continue;
        }
        visited[index] = true;

        // Revisit this node once its operands are done
        stack.push((index, true));
        for &operand in tape.nodes[index].operands.iter().rev() {
            if !visited[operand] {
                stack.push((operand, false));
            }
        }
    }

    order
}
