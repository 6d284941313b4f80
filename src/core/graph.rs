//! Dependency graph assembly and ordering
//!
//! The graph is rebuilt from registry edges and recipe declarations on
//! every run; only the registry is persistent. Nodes are concrete specs,
//! edges point from a package to its direct dependencies, and ordering
//! is fully deterministic: among equally-ready nodes the spec with the
//! fewest installed dependents is emitted first, then lexicographic
//! spec order.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, VecDeque};

use crate::core::recipe::{declared_dependencies, RecipeSource};
use crate::core::registry::InstalledRegistry;
use crate::core::spec::PackageSpec;
use crate::error::GraphError;

/// Direction for a topological ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    /// Dependencies before dependents (build order)
    DependenciesFirst,
    /// Dependents before dependencies (uninstall order)
    DependentsFirst,
}

/// How far the graph walk reaches beyond the requested roots
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkOptions {
    /// Pull dependencies that are not installed in as build nodes
    pub include_dependencies: bool,
    /// Pull installed dependents in, for uninstall and rebuild ordering
    pub include_dependents: bool,
}

/// In-memory DAG over package specs
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Node to its direct dependencies within the graph
    edges: BTreeMap<PackageSpec, BTreeSet<PackageSpec>>,
    /// Nodes that are not installed and need a fresh build
    missing: BTreeSet<PackageSpec>,
    /// Installed dependent counts used as the ordering tie-break
    dependent_counts: BTreeMap<PackageSpec, usize>,
}

impl DependencyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble the graph for `roots` from recorded registry edges and
    /// recipe-declared dependencies.
    ///
    /// Installed nodes contribute their recorded edges; nodes that are
    /// not installed contribute their recipe's declared dependencies,
    /// concretized against the registry and recipe defaults. Edges to
    /// packages outside the final node set are satisfied externally and
    /// dropped. A dependency that is neither installed nor scheduled is
    /// an error unless `include_dependencies` pulls it in.
    pub fn build(
        registry: &InstalledRegistry,
        recipes: &dyn RecipeSource,
        roots: &[PackageSpec],
        options: WalkOptions,
    ) -> Result<Self, GraphError> {
        let mut graph = Self::new();
        let mut raw_edges: BTreeMap<PackageSpec, Vec<PackageSpec>> = BTreeMap::new();
        let mut seen: BTreeSet<PackageSpec> = BTreeSet::new();
        let mut queue: VecDeque<PackageSpec> = VecDeque::new();

        for root in roots {
            if seen.insert(root.clone()) {
                queue.push_back(root.clone());
            }
        }

        while let Some(spec) = queue.pop_front() {
            let deps: Vec<PackageSpec> = if let Some(entry) = registry.get(&spec) {
                entry.dependencies.iter().cloned().collect()
            } else {
                graph.missing.insert(spec.clone());
                declared_dependencies(registry, recipes, &spec)?
            };

            for dep in &deps {
                if registry.contains(dep) || seen.contains(dep) {
                    continue;
                }
                if !options.include_dependencies {
                    return Err(GraphError::MissingDependency {
                        package: spec.to_string(),
                        dependency: dep.to_string(),
                    });
                }
                seen.insert(dep.clone());
                queue.push_back(dep.clone());
            }

            if options.include_dependents {
                for dependent in registry.dependents_of(&spec) {
                    if seen.insert(dependent.clone()) {
                        queue.push_back(dependent);
                    }
                }
            }

            raw_edges.insert(spec, deps);
        }

        for (spec, deps) in raw_edges {
            let kept: Vec<PackageSpec> =
                deps.into_iter().filter(|dep| seen.contains(dep)).collect();
            graph.set_dependent_count(spec.clone(), registry.dependent_count(&spec));
            graph.add_package(spec, kept);
        }

        Ok(graph)
    }

    /// Add a package and its dependency edges.
    ///
    /// Dependencies named here become nodes as well, initially without
    /// edges of their own.
    pub fn add_package(
        &mut self,
        spec: PackageSpec,
        dependencies: impl IntoIterator<Item = PackageSpec>,
    ) {
        let deps: BTreeSet<PackageSpec> = dependencies.into_iter().collect();
        for dep in &deps {
            self.edges.entry(dep.clone()).or_default();
        }
        self.edges.entry(spec).or_default().extend(deps);
    }

    /// Record the installed dependent count used to break ordering ties.
    pub fn set_dependent_count(&mut self, spec: PackageSpec, count: usize) {
        self.dependent_counts.insert(spec, count);
    }

    /// True when the spec is a node of this graph.
    pub fn contains(&self, spec: &PackageSpec) -> bool {
        self.edges.contains_key(spec)
    }

    /// True when the node is not installed and needs a fresh build.
    pub fn is_missing(&self, spec: &PackageSpec) -> bool {
        self.missing.contains(spec)
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.edges.len()
    }

    /// All nodes in spec order.
    pub fn nodes(&self) -> impl Iterator<Item = &PackageSpec> {
        self.edges.keys()
    }

    /// Direct dependencies of a node within the graph.
    pub fn dependencies_of(&self, spec: &PackageSpec) -> Option<&BTreeSet<PackageSpec>> {
        self.edges.get(spec)
    }

    /// True when the edges contain at least one cycle.
    pub fn has_cycle(&self) -> bool {
        self.topological_order(OrderDirection::DependenciesFirst)
            .is_err()
    }

    /// Produce a linear order consistent with every edge.
    ///
    /// Kahn's algorithm over a ready-heap keyed by (dependent count,
    /// spec), so the result is deterministic for a given graph. A cycle
    /// anywhere in the graph fails the whole ordering.
    pub fn topological_order(
        &self,
        direction: OrderDirection,
    ) -> Result<Vec<PackageSpec>, GraphError> {
        let mut blockers: BTreeMap<&PackageSpec, usize> = BTreeMap::new();
        let mut unlocks: BTreeMap<&PackageSpec, Vec<&PackageSpec>> = BTreeMap::new();

        for (node, deps) in &self.edges {
            blockers.entry(node).or_insert(0);
            for dep in deps {
                blockers.entry(dep).or_insert(0);
                match direction {
                    OrderDirection::DependenciesFirst => {
                        *blockers.entry(node).or_insert(0) += 1;
                        unlocks.entry(dep).or_default().push(node);
                    }
                    OrderDirection::DependentsFirst => {
                        *blockers.entry(dep).or_insert(0) += 1;
                        unlocks.entry(node).or_default().push(dep);
                    }
                }
            }
        }

        let mut ready: BinaryHeap<Reverse<(usize, &PackageSpec)>> = blockers
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(node, _)| Reverse((self.weight(node), *node)))
            .collect();

        let mut order: Vec<PackageSpec> = Vec::with_capacity(self.edges.len());
        while let Some(Reverse((_, node))) = ready.pop() {
            order.push(node.clone());
            if let Some(unlocked) = unlocks.get(node) {
                for next in unlocked {
                    if let Some(count) = blockers.get_mut(next) {
                        *count -= 1;
                        if *count == 0 {
                            ready.push(Reverse((self.weight(next), *next)));
                        }
                    }
                }
            }
        }

        if order.len() != self.edges.len() {
            return Err(GraphError::CircularDependency {
                cycle: self.find_cycle(),
            });
        }
        Ok(order)
    }

    fn weight(&self, spec: &PackageSpec) -> usize {
        self.dependent_counts.get(spec).copied().unwrap_or(0)
    }

    /// DFS over dependency edges, reporting the first cycle path found.
    fn find_cycle(&self) -> Vec<String> {
        let mut visited: BTreeSet<&PackageSpec> = BTreeSet::new();
        for node in self.edges.keys() {
            if visited.contains(node) {
                continue;
            }
            let mut in_progress: Vec<&PackageSpec> = Vec::new();
            if let Some(cycle) = self.visit(node, &mut visited, &mut in_progress) {
                return cycle;
            }
        }
        Vec::new()
    }

    fn visit<'a>(
        &'a self,
        node: &'a PackageSpec,
        visited: &mut BTreeSet<&'a PackageSpec>,
        in_progress: &mut Vec<&'a PackageSpec>,
    ) -> Option<Vec<String>> {
        if let Some(position) = in_progress.iter().position(|seen| *seen == node) {
            let mut cycle: Vec<String> =
                in_progress[position..].iter().map(ToString::to_string).collect();
            cycle.push(node.to_string());
            return Some(cycle);
        }
        if visited.contains(node) {
            return None;
        }

        in_progress.push(node);
        if let Some(deps) = self.edges.get(node) {
            for dep in deps {
                if let Some(cycle) = self.visit(dep, visited, in_progress) {
                    return Some(cycle);
                }
            }
        }
        in_progress.pop();
        visited.insert(node);
        None
    }
}
