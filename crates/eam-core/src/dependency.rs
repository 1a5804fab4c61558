//! Dependency graph and change impact over record cross-references
//!
//! Interfaces name their provider and consumer applications, processes and
//! activities name their host application, activities name their business
//! process. [`ArtifactIndex`] holds the records visible from one initiative
//! and answers both directions of those references; [`build_graph`] walks
//! them breadth-first from one artifact.

use std::collections::{BTreeMap, HashSet, VecDeque};

use eam_artifact::{ArtifactKind, ArtifactRecord, ArtifactRef, InitiativeId, Reference, Relation};
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use serde::Serialize;

/// Default walk depth from the root artifact
pub const MAX_DEPTH: usize = 3;

/// Affected artifacts listed in one report
pub const MAX_AFFECTED: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    Provides,
    Consumes,
    Requires,
    Impacts,
    RelatedTo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strength {
    Strong,
    Weak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleSeverity {
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Level for `impacts` reachable artifacts and `critical_paths` strong chains
    #[must_use]
    pub fn assess(impacts: usize, critical_paths: usize) -> Self {
        if impacts > 20 || critical_paths > 10 {
            Self::Critical
        } else if impacts > 10 || critical_paths > 5 {
            Self::High
        } else if impacts > 5 || critical_paths > 2 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// One record in an [`ArtifactIndex`]
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedArtifact {
    pub artifact: ArtifactRef,
    pub record: ArtifactRecord,
    /// Production revision, 0 for artifacts that exist only as a proposal
    pub revision: u64,
    /// Edited (or proposed) by the initiative the index was built for
    pub modified: bool,
}

/// Records visible from one initiative, with reverse references
#[derive(Debug, Clone, Default)]
pub struct ArtifactIndex {
    entries: BTreeMap<ArtifactRef, IndexedArtifact>,
    referrers: BTreeMap<ArtifactRef, Vec<(ArtifactRef, Reference)>>,
}

impl FromIterator<IndexedArtifact> for ArtifactIndex {
    /// Later entries for the same artifact replace earlier ones
    fn from_iter<I: IntoIterator<Item = IndexedArtifact>>(iter: I) -> Self {
        let entries: BTreeMap<_, _> = iter.into_iter().map(|e| (e.artifact, e)).collect();
        let mut referrers: BTreeMap<ArtifactRef, Vec<(ArtifactRef, Reference)>> = BTreeMap::new();
        for entry in entries.values() {
            for reference in entry.record.references() {
                referrers
                    .entry(reference.target)
                    .or_default()
                    .push((entry.artifact, reference));
            }
        }
        Self { entries, referrers }
    }
}

/// Neighbour reached from one node, with the edge leading to it
struct Link {
    target: ArtifactRef,
    dependency_type: DependencyType,
    strength: Strength,
    description: Option<&'static str>,
}

impl ArtifactIndex {
    #[inline]
    #[must_use]
    pub fn get(&self, artifact: &ArtifactRef) -> Option<&IndexedArtifact> {
        self.entries.get(artifact)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Display name, falling back to the reference itself
    #[must_use]
    pub fn name_of(&self, artifact: &ArtifactRef) -> String {
        self.get(artifact)
            .map_or_else(|| artifact.to_string(), |e| e.record.display_name())
    }

    fn links(&self, node: &ArtifactRef) -> Vec<Link> {
        let mut links = Vec::new();
        if let Some(entry) = self.entries.get(node) {
            for reference in entry.record.references() {
                if !self.entries.contains_key(&reference.target) {
                    continue;
                }
                let (dependency_type, strength, description) = match reference.relation {
                    Relation::Provider => {
                        (DependencyType::Requires, Strength::Strong, "Provider application")
                    }
                    Relation::Consumer => {
                        (DependencyType::Requires, Strength::Strong, "Consumer application")
                    }
                    Relation::Host => (DependencyType::Requires, Strength::Strong, "Host application"),
                    Relation::Process => (DependencyType::RelatedTo, Strength::Weak, "Business process"),
                };
                links.push(Link {
                    target: reference.target,
                    dependency_type,
                    strength,
                    description: Some(description),
                });
            }
        }
        for (holder, reference) in self.referrers.get(node).into_iter().flatten() {
            let (dependency_type, strength) = match reference.relation {
                Relation::Provider => (DependencyType::Provides, Strength::Strong),
                Relation::Consumer => (DependencyType::Consumes, Strength::Strong),
                Relation::Host => (DependencyType::Impacts, Strength::Strong),
                Relation::Process => (DependencyType::Impacts, Strength::Weak),
            };
            links.push(Link {
                target: *holder,
                dependency_type,
                strength,
                description: None,
            });
        }
        links
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyNode {
    #[serde(flatten)]
    pub artifact: ArtifactRef,
    pub name: String,
    pub revision: u64,
    /// Hops from the root
    pub depth: usize,
    pub modified_in_initiative: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyEdge {
    pub from: ArtifactRef,
    pub to: ArtifactRef,
    #[serde(rename = "type")]
    pub dependency_type: DependencyType,
    pub strength: Strength,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyCycle {
    /// Closed path; the first node is repeated at the end
    pub nodes: Vec<ArtifactRef>,
    pub severity: CycleSeverity,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactAnalysis {
    pub direct_impacts: usize,
    pub indirect_impacts: usize,
    /// Chains of two or more strong hops from the root
    pub critical_paths: Vec<Vec<ArtifactRef>>,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyGraph {
    pub root: ArtifactRef,
    /// Root first, then in discovery order
    pub nodes: Vec<DependencyNode>,
    pub edges: Vec<DependencyEdge>,
    pub cycles: Vec<DependencyCycle>,
    pub impact_analysis: ImpactAnalysis,
}

/// Walk references out from `root` up to `max_depth` hops
///
/// Returns `None` when `root` is not in the index. Edges are recorded in
/// both directions of each reference, so every pair of linked nodes has a
/// back edge; those two-node loops are not reported as cycles.
#[must_use]
pub fn build_graph(index: &ArtifactIndex, root: ArtifactRef, max_depth: usize) -> Option<DependencyGraph> {
    let entry = index.get(&root)?;
    let mut depths = BTreeMap::from([(root, 0usize)]);
    let mut nodes = vec![node(entry, 0)];
    let mut edges = Vec::new();
    let mut queue = VecDeque::from([root]);

    while let Some(current) = queue.pop_front() {
        let depth = depths.get(&current).copied().unwrap_or_default();
        for link in index.links(&current) {
            if !depths.contains_key(&link.target) {
                if depth >= max_depth {
                    continue;
                }
                let Some(found) = index.get(&link.target) else {
                    continue;
                };
                depths.insert(link.target, depth + 1);
                nodes.push(node(found, depth + 1));
                queue.push_back(link.target);
            }
            edges.push(DependencyEdge {
                from: current,
                to: link.target,
                dependency_type: link.dependency_type,
                strength: link.strength,
                description: link.description.map(str::to_string),
            });
        }
    }

    let cycles = detect_cycles(&nodes, &edges);
    let impact_analysis = analyze_impact(root, &edges);
    Some(DependencyGraph {
        root,
        nodes,
        edges,
        cycles,
        impact_analysis,
    })
}

fn node(entry: &IndexedArtifact, depth: usize) -> DependencyNode {
    DependencyNode {
        artifact: entry.artifact,
        name: entry.record.display_name(),
        revision: entry.revision,
        depth,
        modified_in_initiative: entry.modified,
    }
}

/// Directed view of the edges; parallel edges collapse into one
fn edge_map(edges: &[DependencyEdge]) -> DiGraphMap<ArtifactRef, Strength> {
    let mut graph = DiGraphMap::new();
    for edge in edges {
        graph.add_edge(edge.from, edge.to, edge.strength);
    }
    graph
}

/// Loops of three or more distinct nodes found by depth-first search
fn detect_cycles(nodes: &[DependencyNode], edges: &[DependencyEdge]) -> Vec<DependencyCycle> {
    struct Search<'a> {
        graph: &'a DiGraphMap<ArtifactRef, Strength>,
        visited: HashSet<ArtifactRef>,
        path: Vec<ArtifactRef>,
        cycles: Vec<DependencyCycle>,
    }

    impl Search<'_> {
        fn visit(&mut self, current: ArtifactRef) {
            self.visited.insert(current);
            self.path.push(current);
            let graph = self.graph;
            for next in graph.neighbors_directed(current, Direction::Outgoing) {
                if let Some(start) = self.path.iter().position(|n| *n == next) {
                    let mut cycle = self.path[start..].to_vec();
                    if cycle.len() < 3 {
                        continue;
                    }
                    let severity = if cycle.len() <= 4 {
                        CycleSeverity::Warning
                    } else {
                        CycleSeverity::Error
                    };
                    cycle.push(next);
                    let description = cycle
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(" -> ");
                    self.cycles.push(DependencyCycle {
                        nodes: cycle,
                        severity,
                        description: format!("Circular dependency: {description}"),
                    });
                } else if !self.visited.contains(&next) {
                    self.visit(next);
                }
            }
            self.path.pop();
        }
    }

    let graph = edge_map(edges);
    let mut search = Search {
        graph: &graph,
        visited: HashSet::new(),
        path: Vec::new(),
        cycles: Vec::new(),
    };
    for n in nodes {
        if !search.visited.contains(&n.artifact) {
            search.visit(n.artifact);
        }
    }
    search.cycles
}

/// Breadth-first walk of the dependents of `root`
fn analyze_impact(root: ArtifactRef, edges: &[DependencyEdge]) -> ImpactAnalysis {
    let graph = edge_map(edges);
    let mut analysis = ImpactAnalysis::default();
    let mut visited = HashSet::new();
    let mut queue = VecDeque::from([(root, 0usize, vec![root])]);
    while let Some((current, depth, path)) = queue.pop_front() {
        if !visited.insert(current) {
            continue;
        }
        match depth {
            0 => {}
            1 => analysis.direct_impacts += 1,
            _ => analysis.indirect_impacts += 1,
        }
        if !graph.contains_node(current) {
            continue;
        }
        for dependent in graph.neighbors_directed(current, Direction::Incoming) {
            if visited.contains(&dependent) {
                continue;
            }
            let strong = graph.edge_weight(dependent, current) == Some(&Strength::Strong);
            let mut next = path.clone();
            next.push(dependent);
            if strong && depth >= 1 {
                analysis.critical_paths.push(next.clone());
            }
            queue.push_back((dependent, depth + 1, next));
        }
    }
    analysis.risk_level = RiskLevel::assess(
        analysis.direct_impacts + analysis.indirect_impacts,
        analysis.critical_paths.len(),
    );
    analysis
}

/// How an initiative touches one of its changed artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Modified,
    Proposed,
}

impl ChangeType {
    fn as_str(self) -> &'static str {
        match self {
            Self::Modified => "modified",
            Self::Proposed => "proposed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedArtifact {
    #[serde(flatten)]
    pub artifact: ArtifactRef,
    pub name: String,
    pub impact_level: RiskLevel,
    pub reason: String,
}

/// Why another initiative overlaps with this one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapKind {
    /// Holds an active lock on the artifact
    Locked,
    /// Has a shadow version of the artifact
    Modified,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossInitiativeImpact {
    pub initiative_id: InitiativeId,
    #[serde(flatten)]
    pub artifact: ArtifactRef,
    pub name: String,
    pub overlap: OverlapKind,
}

/// Combined impact of every change an initiative carries
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactReport {
    pub initiative_id: InitiativeId,
    pub changed_artifacts: usize,
    /// Distinct artifacts reached from any change
    pub total_impacts: usize,
    pub critical_impacts: usize,
    /// Highest level first, at most [`MAX_AFFECTED`]
    pub affected_artifacts: Vec<AffectedArtifact>,
    pub cross_initiative_impacts: Vec<CrossInitiativeImpact>,
    pub risk_level: RiskLevel,
    pub recommendations: Vec<String>,
}

impl ImpactReport {
    /// Fold the graph of each change into one report
    ///
    /// An artifact reached from several changes is listed once, at the
    /// highest level any of them assigns.
    #[must_use]
    pub fn build(
        initiative_id: InitiativeId,
        changes: &[(ChangeType, DependencyGraph)],
        cross_initiative_impacts: Vec<CrossInitiativeImpact>,
    ) -> Self {
        let mut affected: BTreeMap<ArtifactRef, AffectedArtifact> = BTreeMap::new();
        let mut graph_risk = RiskLevel::Low;
        for (change, graph) in changes {
            let level = graph.impact_analysis.risk_level;
            graph_risk = graph_risk.max(level);
            for n in graph.nodes.iter().filter(|n| n.artifact != graph.root) {
                let entry = affected.entry(n.artifact).or_insert_with(|| AffectedArtifact {
                    artifact: n.artifact,
                    name: n.name.clone(),
                    impact_level: level,
                    reason: format!("{} {}", change.as_str(), graph.root),
                });
                if level > entry.impact_level {
                    entry.impact_level = level;
                    entry.reason = format!("{} {}", change.as_str(), graph.root);
                }
            }
        }

        let total_impacts = affected.len();
        let mut affected_artifacts: Vec<AffectedArtifact> = affected.into_values().collect();
        affected_artifacts.sort_by(|a, b| b.impact_level.cmp(&a.impact_level));
        let critical_impacts = affected_artifacts
            .iter()
            .filter(|a| a.impact_level == RiskLevel::Critical)
            .count();
        let touches_interfaces = affected_artifacts
            .iter()
            .any(|a| a.artifact.kind == ArtifactKind::Interface);
        affected_artifacts.truncate(MAX_AFFECTED);

        let overlaps = cross_initiative_impacts.len();
        let risk_level = graph_risk.max(if overlaps > 5 || total_impacts > 20 {
            RiskLevel::Critical
        } else if overlaps > 2 || total_impacts > 10 {
            RiskLevel::High
        } else if overlaps > 0 || total_impacts > 5 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        });

        let mut recommendations = Vec::new();
        if critical_impacts > 0 {
            recommendations.push("Critical impacts detected. Thorough testing required.".into());
        }
        if total_impacts > 10 {
            recommendations
                .push("Large number of dependencies affected. Consider phased rollout.".into());
        }
        if touches_interfaces {
            recommendations.push("Interface changes detected. Coordinate with consumer teams.".into());
        }
        if overlaps > 0 {
            recommendations.push(
                "Other open initiatives touch affected artifacts. Coordinate before completion."
                    .into(),
            );
        }

        Self {
            initiative_id,
            changed_artifacts: changes.len(),
            total_impacts,
            critical_impacts,
            affected_artifacts,
            cross_initiative_impacts,
            risk_level,
            recommendations,
        }
    }
}
