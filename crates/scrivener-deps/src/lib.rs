//! Dependency graph over outline section ids: a natural-sort ordering key
//! (so `"s1" < "s2" < "s10"`), a priority-queue topological order, and
//! Kahn layering, both failing closed on a cycle.

use std::collections::{BTreeMap, BinaryHeap, HashMap, HashSet};
use std::cmp::Reverse;

use scrivener_errors::CycleError;
use scrivener_types::OutlineSection;

/// One run of an ordering key: a digit run compares numerically, a
/// non-digit run compares lexically, and digit runs always sort before
/// non-digit runs at the same position (declaration order of the variants
/// *is* the comparison order `derive(Ord)` uses, which is exactly the
/// `(0, int) < (1, str)` tagging the source ordering key relies on).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Token {
    Num(u64),
    Str(String),
    /// Final tie-breaker: insertion order, appended once per key so two
    /// ids with identical token runs still compare deterministically.
    Index(usize),
}

type OrderingKey = Vec<Token>;

/// Split an id into alternating digit/non-digit runs, e.g. `"s10a"` →
/// `[Str("s"), Num(10), Str("a")]`.
fn tokenize(id: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut current_is_digit: Option<bool> = None;
    for ch in id.chars() {
        let is_digit = ch.is_ascii_digit();
        if current_is_digit == Some(is_digit) {
            current.push(ch);
        } else {
            if !current.is_empty() {
                tokens.push(finish_run(&current, current_is_digit.unwrap()));
            }
            current.clear();
            current.push(ch);
            current_is_digit = Some(is_digit);
        }
    }
    if !current.is_empty() {
        tokens.push(finish_run(&current, current_is_digit.unwrap()));
    }
    tokens
}

fn finish_run(run: &str, is_digit: bool) -> Token {
    if is_digit {
        Token::Num(run.parse().unwrap_or(u64::MAX))
    } else {
        Token::Str(run.to_string())
    }
}

/// A dependency graph over section ids. Edges are `dep -> sid` for every
/// `sid` and every `dep` in that section's declared dependencies.
pub struct DependencyGraph {
    nodes: Vec<String>,
    node_index: HashMap<String, usize>,
    adj: HashMap<String, HashSet<String>>,
    rev: HashMap<String, HashSet<String>>,
}

impl DependencyGraph {
    /// Build a graph from `nodes` (deduplicated, first occurrence wins)
    /// and `edges`, silently dropping any edge referencing a node not in
    /// `nodes`.
    #[must_use]
    pub fn new(nodes: Vec<String>, edges: Vec<(String, String)>) -> Self {
        let mut unique_nodes = Vec::new();
        let mut node_index = HashMap::new();
        for node in nodes {
            if node_index.contains_key(&node) {
                continue;
            }
            node_index.insert(node.clone(), unique_nodes.len());
            unique_nodes.push(node);
        }
        let node_set: HashSet<&String> = unique_nodes.iter().collect();

        let mut adj: HashMap<String, HashSet<String>> = HashMap::new();
        let mut rev: HashMap<String, HashSet<String>> = HashMap::new();
        for (from, to) in edges {
            if !node_set.contains(&from) || !node_set.contains(&to) {
                continue;
            }
            adj.entry(from.clone()).or_default().insert(to.clone());
            rev.entry(to).or_default().insert(from);
        }

        Self {
            nodes: unique_nodes,
            node_index,
            adj,
            rev,
        }
    }

    /// Build a graph from a plan outline: nodes are section ids, edges
    /// are `dep -> sid` for each declared dependency.
    #[must_use]
    pub fn from_outline(outline: &[OutlineSection]) -> Self {
        let nodes: Vec<String> = outline.iter().map(|s| s.id.clone()).collect();
        let mut edges = Vec::new();
        for section in outline {
            for dep in &section.dependencies {
                edges.push((dep.clone(), section.id.clone()));
            }
        }
        Self::new(nodes, edges)
    }

    fn ordering_key(&self, id: &str) -> OrderingKey {
        let fallback = self.node_index.get(id).copied().unwrap_or(self.nodes.len());
        let mut key = tokenize(id);
        key.push(Token::Index(fallback));
        key
    }

    fn in_degrees(&self) -> BTreeMap<String, usize> {
        let mut indeg: BTreeMap<String, usize> = self.nodes.iter().map(|n| (n.clone(), 0)).collect();
        for (v, preds) in &self.rev {
            indeg.insert(v.clone(), preds.len());
        }
        indeg
    }

    /// A single topological ordering, breaking ties by the natural-sort
    /// ordering key via a min-heap (Kahn's algorithm with a priority
    /// queue instead of an arbitrary-order worklist).
    pub fn topological_order(&self) -> Result<Vec<String>, CycleError> {
        let mut indeg = self.in_degrees();
        let mut heap: BinaryHeap<Reverse<(OrderingKey, String)>> = BinaryHeap::new();
        for (node, degree) in &indeg {
            if *degree == 0 {
                heap.push(Reverse((self.ordering_key(node), node.clone())));
            }
        }

        let mut order = Vec::new();
        while let Some(Reverse((_, u))) = heap.pop() {
            order.push(u.clone());
            if let Some(successors) = self.adj.get(&u) {
                for v in successors {
                    let degree = indeg.get_mut(v).expect("successor must be a known node");
                    *degree -= 1;
                    if *degree == 0 {
                        heap.push(Reverse((self.ordering_key(v), v.clone())));
                    }
                }
            }
        }

        if order.len() != self.nodes.len() {
            return Err(CycleError::DependencyCycle);
        }
        Ok(order)
    }

    /// Kahn layers: each layer is every node whose remaining dependencies
    /// are all satisfied by earlier layers, sorted by the same ordering
    /// key. Used by the review sub-scheduler to batch sections so a
    /// section is never reviewed before its dependencies are.
    pub fn layers(&self) -> Result<Vec<Vec<String>>, CycleError> {
        let mut indeg = self.in_degrees();
        let mut frontier: Vec<String> = indeg.iter().filter(|(_, d)| **d == 0).map(|(n, _)| n.clone()).collect();
        frontier.sort_by_key(|n| self.ordering_key(n));

        let mut layers = Vec::new();
        let mut seen = HashSet::new();
        while !frontier.is_empty() {
            let layer = frontier.clone();
            layers.push(layer.clone());

            let mut next_frontier = Vec::new();
            let mut seen_in_next = HashSet::new();
            for u in &layer {
                seen.insert(u.clone());
                if let Some(successors) = self.adj.get(u) {
                    for v in successors {
                        let degree = indeg.get_mut(v).expect("successor must be a known node");
                        *degree -= 1;
                        if *degree == 0 && seen_in_next.insert(v.clone()) {
                            next_frontier.push(v.clone());
                        }
                    }
                }
            }
            next_frontier.sort_by_key(|n| self.ordering_key(n));
            frontier = next_frontier;
        }

        if seen.len() != self.nodes.len() {
            return Err(CycleError::DependencyCycle);
        }
        Ok(layers)
    }
}
