//! §4.2 SCC decomposition: iterative Tarjan over the causal graph's successor relation.

use crate::causal_graph::CausalGraph;
use crate::ids::VarId;

/// Strongly connected components of `cg.successors`, as a condensation-topological list:
/// the first component is a leaf of the condensation (has no outgoing edges to later
/// components), matching the contract used by `order_within_sccs`.
pub fn tarjan_sccs(cg: &CausalGraph) -> Vec<Vec<VarId>> {
    let n = cg.num_variables();
    let mut index = vec![None; n];
    let mut lowlink = vec![0u32; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut next_index: u32 = 0;
    let mut components: Vec<Vec<VarId>> = Vec::new();

    // Explicit-stack DFS frame: the node being visited and the next successor to try.
    enum Frame {
        Enter(usize),
        Iterate(usize, usize),
    }

    for start in 0..n {
        if index[start].is_some() {
            continue;
        }
        let mut work: Vec<Frame> = vec![Frame::Enter(start)];
        while let Some(frame) = work.pop() {
            match frame {
                Frame::Enter(v) => {
                    if index[v].is_some() {
                        continue;
                    }
                    index[v] = Some(next_index);
                    lowlink[v] = next_index;
                    next_index += 1;
                    stack.push(v);
                    on_stack[v] = true;
                    work.push(Frame::Iterate(v, 0));
                }
                Frame::Iterate(v, next_child) => {
                    let neighbors = &cg.successors[v];
                    if next_child < neighbors.len() {
                        let w: usize = neighbors[next_child].into();
                        work.push(Frame::Iterate(v, next_child + 1));
                        if index[w].is_none() {
                            work.push(Frame::Enter(w));
                        } else if on_stack[w] {
                            lowlink[v] = lowlink[v].min(index[w].unwrap());
                        }
                    } else {
                        // Done visiting v's children: propagate lowlink to parent (the
                        // frame just below this one on `work`, if any belongs to v's caller)
                        // and, if v is a root, pop its component off `stack`.
                        if lowlink[v] == index[v].unwrap() {
                            let mut component = Vec::new();
                            loop {
                                let w = stack.pop().unwrap();
                                on_stack[w] = false;
                                component.push(VarId::from(w));
                                if w == v {
                                    break;
                                }
                            }
                            components.push(component);
                        }
                        // propagate lowlink[v] into whichever frame called us
                        if let Some(Frame::Iterate(parent, _)) = work.last() {
                            lowlink[*parent] = lowlink[*parent].min(lowlink[v]);
                        }
                    }
                }
            }
        }
    }

    // Tarjan emits components in reverse topological order of the condensation (a
    // component's predecessors are found after it). Reverse so the first component
    // returned is a leaf of the condensation, as spec.md §4.2 requires.
    components.reverse();
    components
}
