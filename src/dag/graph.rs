// src/dag/graph.rs

use std::collections::HashSet;

use crate::job::JobId;

/// Check whether adding `job` with edges `job -> deps` would close a cycle.
///
/// `edges_of` returns the existing dependency list of a node (empty for
/// unknown nodes). Edge direction is job -> dependency.
///
/// The search is a DFS with a recursion-stack set, started from each new
/// dependency with `job` already on the stack. It keeps its own frame stack,
/// so arbitrarily long dependency chains do not grow the thread stack.
/// Returns the offending path, first and last element equal, if a cycle is
/// found.
pub fn find_cycle<'a, F>(job: &JobId, deps: &[JobId], edges_of: F) -> Option<Vec<JobId>>
where
    F: Fn(&JobId) -> &'a [JobId],
{
    let mut search = CycleSearch {
        edges_of,
        root: job.clone(),
        visited: HashSet::new(),
        on_stack: HashSet::from([job.clone()]),
        frames: Vec::new(),
    };

    deps.iter().find_map(|dep| search.visit(dep))
}

struct CycleSearch<F> {
    edges_of: F,
    /// The job being added; bottom of every path.
    root: JobId,
    visited: HashSet<JobId>,
    on_stack: HashSet<JobId>,
    /// Current DFS path below `root`: node and index of its next dependency.
    frames: Vec<(JobId, usize)>,
}

impl<'a, F> CycleSearch<F>
where
    F: Fn(&JobId) -> &'a [JobId],
{
    fn visit(&mut self, start: &JobId) -> Option<Vec<JobId>> {
        if let Some(cycle) = self.closes_cycle(start) {
            return Some(cycle);
        }
        self.enter(start);

        loop {
            let (node, next) = self.frames.last_mut()?;
            let child = (self.edges_of)(node).get(*next).cloned();
            *next += 1;

            match child {
                Some(child) => {
                    if let Some(cycle) = self.closes_cycle(&child) {
                        return Some(cycle);
                    }
                    self.enter(&child);
                }
                None => {
                    if let Some((done, _)) = self.frames.pop() {
                        self.on_stack.remove(&done);
                    }
                }
            }
        }
    }

    /// Push `node` unless an earlier search already exhausted it.
    fn enter(&mut self, node: &JobId) {
        if self.visited.insert(node.clone()) {
            self.on_stack.insert(node.clone());
            self.frames.push((node.clone(), 0));
        }
    }

    /// The path from the first occurrence of `node` back to `node`, if
    /// `node` is on the current path.
    fn closes_cycle(&self, node: &JobId) -> Option<Vec<JobId>> {
        if !self.on_stack.contains(node) {
            return None;
        }

        let path = std::iter::once(&self.root).chain(self.frames.iter().map(|(id, _)| id));
        let mut cycle: Vec<JobId> = path.skip_while(|id| *id != node).cloned().collect();
        cycle.push(node.clone());
        Some(cycle)
    }
}
