use super::lookahead::LookaheadSet;

const DONE: usize = usize::MAX;

/// The DeRemer–Pennello `digraph` traversal.
///
/// Computes `F(x) = F'(x) ∪ ⋃ { F(y) | x R y }` for every node, where
/// `relation[x]` lists the `y` with `x R y` and `initial[x]` is `F'(x)`.
/// Nodes of one strongly connected component end up with identical sets.
///
/// The traversal keeps its own call stack so deep relations cannot
/// overflow the thread stack.
pub(crate) fn digraph(relation: &[Vec<usize>], initial: Vec<LookaheadSet>) -> Vec<LookaheadSet> {
    let count = relation.len();
    let mut sets = initial;
    let mut depth = vec![0usize; count];
    let mut stack: Vec<usize> = Vec::new();

    struct Frame {
        node: usize,
        depth: usize,
        cursor: usize,
    }

    for root in 0..count {
        if depth[root] != 0 {
            continue;
        }
        let mut calls = Vec::new();
        stack.push(root);
        depth[root] = stack.len();
        calls.push(Frame {
            node: root,
            depth: stack.len(),
            cursor: 0,
        });

        while let Some(frame) = calls.last_mut() {
            let x = frame.node;
            if let Some(&y) = relation[x].get(frame.cursor) {
                frame.cursor += 1;
                if depth[y] == 0 {
                    stack.push(y);
                    depth[y] = stack.len();
                    calls.push(Frame {
                        node: y,
                        depth: stack.len(),
                        cursor: 0,
                    });
                    continue;
                }
                depth[x] = depth[x].min(depth[y]);
                merge(&mut sets, x, y);
                continue;
            }

            let own_depth = frame.depth;
            calls.pop();
            if depth[x] == own_depth {
                while let Some(top) = stack.pop() {
                    depth[top] = DONE;
                    if top == x {
                        break;
                    }
                    sets[top] = sets[x].clone();
                }
            }
            if let Some(parent) = calls.last() {
                let p = parent.node;
                depth[p] = depth[p].min(depth[x]);
                merge(&mut sets, p, x);
            }
        }
    }
    sets
}

fn merge(sets: &mut [LookaheadSet], into: usize, from: usize) {
    if into == from {
        return;
    }
    let source = sets[from].clone();
    sets[into].union_with(&source);
}
