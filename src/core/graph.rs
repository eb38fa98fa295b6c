//! Target dependency graph: cycle detection and topological ordering.

use std::collections::{BTreeSet, HashMap};

use crate::core::model::BuildModel;

/// The per-build dependency graph over the frozen model's targets.
///
/// One node per target; one edge per explicit dependency and per linked
/// library name that matches a target. Non-matching link names are recorded
/// as external libraries, not nodes.
#[derive(Debug)]
pub struct DependencyGraph {
    /// Target names in model insertion order.
    nodes: Vec<String>,
    /// Adjacency: node index -> indices of its dependencies.
    edges: Vec<Vec<usize>>,
    /// Library names that matched no target.
    externals: BTreeSet<String>,
    index: HashMap<String, usize>,
}

impl DependencyGraph {
    pub fn from_model(model: &BuildModel) -> Self {
        let nodes: Vec<String> = model.targets().iter().map(|t| t.name().to_string()).collect();
        let index: HashMap<String, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();

        let mut edges = vec![Vec::new(); nodes.len()];
        let mut externals = BTreeSet::new();

        for (i, target) in model.targets().iter().enumerate() {
            for dep in model.edge_names(target) {
                let j = index[dep];
                if !edges[i].contains(&j) {
                    edges[i].push(j);
                }
            }
            for link in target.links() {
                if !index.contains_key(link.as_str()) {
                    externals.insert(link.clone());
                }
            }
        }

        DependencyGraph {
            nodes,
            edges,
            externals,
            index,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Library names referenced by some target but defined by none.
    pub fn externals(&self) -> impl Iterator<Item = &str> {
        self.externals.iter().map(|s| s.as_str())
    }

    /// Direct dependencies of `name`, in declaration order.
    pub fn dependencies_of(&self, name: &str) -> Vec<&str> {
        match self.index.get(name) {
            Some(&i) => self.edges[i].iter().map(|&j| self.nodes[j].as_str()).collect(),
            None => Vec::new(),
        }
    }

    /// Topological order via Kahn's algorithm: for every edge u -> v, v
    /// precedes u. Ties break on target insertion order, so the result is
    /// stable across runs given stable script evaluation.
    ///
    /// If the graph has a cycle the result is shorter than the node count.
    pub fn topological_order(&self) -> Vec<&str> {
        let n = self.nodes.len();
        // indegree[u] = number of unresolved dependencies of u
        let mut indegree: Vec<usize> = self.edges.iter().map(|e| e.len()).collect();
        // dependents[v] = nodes that depend on v
        let mut dependents = vec![Vec::new(); n];
        for (u, deps) in self.edges.iter().enumerate() {
            for &v in deps {
                dependents[v].push(u);
            }
        }

        let mut ready: BTreeSet<usize> = (0..n).filter(|&u| indegree[u] == 0).collect();
        let mut order = Vec::with_capacity(n);

        while let Some(&u) = ready.iter().next() {
            ready.remove(&u);
            order.push(self.nodes[u].as_str());
            for &w in &dependents[u] {
                indegree[w] -= 1;
                if indegree[w] == 0 {
                    ready.insert(w);
                }
            }
        }

        order
    }

    /// Find a dependency cycle via DFS with a recursion stack. Returns the
    /// node names on the stack at the first closing back-edge, ending with
    /// the node that closes the cycle.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            OnStack,
            Done,
        }

        fn dfs(
            graph: &DependencyGraph,
            u: usize,
            marks: &mut [Mark],
            stack: &mut Vec<usize>,
        ) -> Option<Vec<String>> {
            marks[u] = Mark::OnStack;
            stack.push(u);

            for &v in &graph.edges[u] {
                match marks[v] {
                    Mark::OnStack => {
                        // Slice the stack from the first occurrence of v to
                        // form the cycle path, then close it.
                        let start = stack.iter().position(|&x| x == v).unwrap_or(0);
                        let mut path: Vec<String> =
                            stack[start..].iter().map(|&i| graph.nodes[i].clone()).collect();
                        path.push(graph.nodes[v].clone());
                        return Some(path);
                    }
                    Mark::Unvisited => {
                        if let Some(cycle) = dfs(graph, v, marks, stack) {
                            return Some(cycle);
                        }
                    }
                    Mark::Done => {}
                }
            }

            stack.pop();
            marks[u] = Mark::Done;
            None
        }

        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        let mut stack = Vec::new();
        for u in 0..self.nodes.len() {
            if marks[u] == Mark::Unvisited {
                if let Some(cycle) = dfs(self, u, &mut marks, &mut stack) {
                    return Some(cycle);
                }
            }
        }
        None
    }
}
