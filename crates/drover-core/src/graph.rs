use crate::errors::GraphError;
use crate::model::{JobName, Pipeline};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// The analyzed dependency structure of a pipeline.
///
/// `adjacency[i][j]` is true iff job `j` consumes at least one output of
/// job `i`. `list_jobs` (insertion order) is the index space shared with
/// the scheduler masks. The matrix is mutated during execution: finished
/// producers have their row zeroed so consumers become runnable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphAnalysis {
    pub list_jobs: Vec<JobName>,
    #[serde(skip)]
    index: HashMap<JobName, usize>,
    pub files_in: Vec<BTreeSet<String>>,
    pub files_out: Vec<BTreeSet<String>>,
    /// `deps[consumer][producer]` lists the files the consumer takes from
    /// that producer.
    pub deps: BTreeMap<JobName, BTreeMap<JobName, Vec<String>>>,
    pub adjacency: Vec<Vec<bool>>,
}

impl GraphAnalysis {
    /// Derive the dependency graph from input/output file overlap.
    ///
    /// Pairwise intersection over all ordered job pairs. `O(J^2 * F)`,
    /// which is fine for the hundreds-to-low-thousands of jobs this
    /// manager is built for.
    pub fn analyze(pipeline: &Pipeline) -> Result<Self, GraphError> {
        let list_jobs: Vec<JobName> = pipeline.names().cloned().collect();
        let n = list_jobs.len();
        let index: HashMap<JobName, usize> = list_jobs
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        let mut files_in: Vec<BTreeSet<String>> = Vec::with_capacity(n);
        let mut files_out: Vec<BTreeSet<String>> = Vec::with_capacity(n);
        for name in &list_jobs {
            let declaration = pipeline.get(name).expect("listed job must be declared");
            files_in.push(declaration.inputs().map(str::to_string).collect());
            files_out.push(declaration.outputs().map(str::to_string).collect());
        }

        let mut adjacency = vec![vec![false; n]; n];
        let mut deps: BTreeMap<JobName, BTreeMap<JobName, Vec<String>>> = BTreeMap::new();
        for producer in 0..n {
            for consumer in 0..n {
                if producer == consumer {
                    continue;
                }
                let shared: Vec<String> = files_in[consumer]
                    .intersection(&files_out[producer])
                    .cloned()
                    .collect();
                if !shared.is_empty() {
                    adjacency[producer][consumer] = true;
                    deps.entry(list_jobs[consumer].clone())
                        .or_default()
                        .insert(list_jobs[producer].clone(), shared);
                }
            }
        }

        let analysis = GraphAnalysis {
            list_jobs,
            index,
            files_in,
            files_out,
            deps,
            adjacency,
        };
        analysis.check_acyclic()?;
        Ok(analysis)
    }

    /// Rebuild the name index after deserializing a manifest.
    pub fn rebuild_index(&mut self) {
        self.index = self
            .list_jobs
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
    }

    pub fn len(&self) -> usize {
        self.list_jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list_jobs.is_empty()
    }

    pub fn index_of(&self, name: &JobName) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn name(&self, idx: usize) -> &JobName {
        &self.list_jobs[idx]
    }

    /// True while at least one producer of `consumer` has not been pruned.
    pub fn has_unmet_deps(&self, consumer: usize) -> bool {
        (0..self.len()).any(|producer| self.adjacency[producer][consumer])
    }

    /// A finished producer no longer constrains its consumers.
    pub fn prune_producer(&mut self, producer: usize) {
        for cell in &mut self.adjacency[producer] {
            *cell = false;
        }
    }

    /// Transitive consumer set of `job`, by repeated row union to fixpoint.
    pub fn descendants(&self, job: usize) -> Vec<usize> {
        let n = self.len();
        let mut reachable = self.adjacency[job].clone();
        loop {
            let mut changed = false;
            for mid in 0..n {
                if !reachable[mid] {
                    continue;
                }
                for consumer in 0..n {
                    if self.adjacency[mid][consumer] && !reachable[consumer] {
                        reachable[consumer] = true;
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }
        (0..n).filter(|&k| reachable[k]).collect()
    }

    /// Inputs of `job` that no job in the pipeline produces. These must
    /// exist on disk before execution starts.
    pub fn external_inputs(&self, job: usize) -> Vec<&str> {
        self.files_in[job]
            .iter()
            .filter(|file| !self.files_out.iter().any(|out| out.contains(*file)))
            .map(String::as_str)
            .collect()
    }

    /// Kahn topological sort; on failure, report a cycle found by DFS.
    fn check_acyclic(&self) -> Result<(), GraphError> {
        let n = self.len();
        let mut in_degree: Vec<usize> = (0..n)
            .map(|consumer| {
                (0..n)
                    .filter(|&producer| self.adjacency[producer][consumer])
                    .count()
            })
            .collect();

        let mut queue: Vec<usize> = (0..n).filter(|&j| in_degree[j] == 0).collect();
        let mut seen = 0;
        while let Some(producer) = queue.pop() {
            seen += 1;
            for consumer in 0..n {
                if self.adjacency[producer][consumer] {
                    in_degree[consumer] -= 1;
                    if in_degree[consumer] == 0 {
                        queue.push(consumer);
                    }
                }
            }
        }

        if seen == n {
            Ok(())
        } else {
            Err(GraphError::Cycle(self.find_cycle()))
        }
    }

    fn find_cycle(&self) -> Vec<JobName> {
        const WHITE: u8 = 0;
        const GRAY: u8 = 1;
        const BLACK: u8 = 2;

        let n = self.len();
        let mut color = vec![WHITE; n];
        let mut stack: Vec<usize> = Vec::new();

        fn dfs(
            node: usize,
            graph: &GraphAnalysis,
            color: &mut [u8],
            stack: &mut Vec<usize>,
        ) -> Option<Vec<usize>> {
            color[node] = GRAY;
            stack.push(node);
            for next in 0..graph.len() {
                if !graph.adjacency[node][next] {
                    continue;
                }
                if color[next] == GRAY {
                    let start = stack.iter().position(|&s| s == next).unwrap_or(0);
                    return Some(stack[start..].to_vec());
                }
                if color[next] == WHITE {
                    if let Some(cycle) = dfs(next, graph, color, stack) {
                        return Some(cycle);
                    }
                }
            }
            stack.pop();
            color[node] = BLACK;
            None
        }

        for start in 0..n {
            if color[start] == WHITE {
                if let Some(cycle) = dfs(start, self, &mut color, &mut stack) {
                    return cycle.into_iter().map(|j| self.list_jobs[j].clone()).collect();
                }
            }
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::JobDeclaration;

    fn job(command: &str, files_in: &[&str], files_out: &[&str]) -> JobDeclaration {
        let mut decl = JobDeclaration::new(command);
        decl.files_in = files_in.iter().map(|s| s.to_string()).collect();
        decl.files_out = files_out.iter().map(|s| s.to_string()).collect();
        decl
    }

    fn diamond() -> Pipeline {
        let mut p = Pipeline::new();
        p.insert("a", job("gen", &[], &["/t/a.out"])).unwrap();
        p.insert("b", job("left", &["/t/a.out"], &["/t/b.out"])).unwrap();
        p.insert("c", job("right", &["/t/a.out"], &["/t/c.out"])).unwrap();
        p.insert("d", job("join", &["/t/b.out", "/t/c.out"], &["/t/d.out"]))
            .unwrap();
        p
    }

    #[test]
    fn test_diamond_edges() {
        let g = GraphAnalysis::analyze(&diamond()).unwrap();
        let a = g.index_of(&JobName::from("a")).unwrap();
        let b = g.index_of(&JobName::from("b")).unwrap();
        let c = g.index_of(&JobName::from("c")).unwrap();
        let d = g.index_of(&JobName::from("d")).unwrap();

        assert!(g.adjacency[a][b]);
        assert!(g.adjacency[a][c]);
        assert!(g.adjacency[b][d]);
        assert!(g.adjacency[c][d]);
        assert!(!g.adjacency[a][d]);
        assert!(!g.adjacency[d][a]);

        let deps_of_d = &g.deps[&JobName::from("d")];
        assert_eq!(deps_of_d[&JobName::from("b")], vec!["/t/b.out".to_string()]);
    }

    #[test]
    fn test_descendants_closure() {
        let g = GraphAnalysis::analyze(&diamond()).unwrap();
        let a = g.index_of(&JobName::from("a")).unwrap();
        let b = g.index_of(&JobName::from("b")).unwrap();
        let d = g.index_of(&JobName::from("d")).unwrap();

        let mut from_a = g.descendants(a);
        from_a.sort_unstable();
        assert_eq!(from_a.len(), 3);

        let from_b = g.descendants(b);
        assert_eq!(from_b, vec![d]);
    }

    #[test]
    fn test_prune_unblocks_consumer() {
        let mut g = GraphAnalysis::analyze(&diamond()).unwrap();
        let a = g.index_of(&JobName::from("a")).unwrap();
        let b = g.index_of(&JobName::from("b")).unwrap();
        let c = g.index_of(&JobName::from("c")).unwrap();
        let d = g.index_of(&JobName::from("d")).unwrap();

        assert!(g.has_unmet_deps(d));
        g.prune_producer(a);
        assert!(!g.has_unmet_deps(b));
        assert!(g.has_unmet_deps(d));
        g.prune_producer(b);
        g.prune_producer(c);
        assert!(!g.has_unmet_deps(d));
    }

    #[test]
    fn test_cycle_detected() {
        let mut p = Pipeline::new();
        p.insert("a", job("x", &["/t/b.out"], &["/t/a.out"])).unwrap();
        p.insert("b", job("y", &["/t/a.out"], &["/t/b.out"])).unwrap();
        let err = GraphAnalysis::analyze(&p).unwrap_err();
        let GraphError::Cycle(cycle) = err;
        assert_eq!(cycle.len(), 2);
    }

    #[test]
    fn test_placeholders_do_not_create_edges() {
        let mut p = Pipeline::new();
        p.insert("a", job("x", &[], &["gb_niak_omitted", ""])).unwrap();
        p.insert("b", job("y", &["gb_niak_omitted", ""], &[])).unwrap();
        let g = GraphAnalysis::analyze(&p).unwrap();
        assert!(g.deps.is_empty());
        assert!(!g.adjacency[0][1]);
    }

    #[test]
    fn test_external_inputs() {
        let mut p = Pipeline::new();
        p.insert("a", job("x", &["/raw/input.dat"], &["/t/a.out"])).unwrap();
        p.insert("b", job("y", &["/t/a.out"], &[])).unwrap();
        let g = GraphAnalysis::analyze(&p).unwrap();
        assert_eq!(g.external_inputs(0), vec!["/raw/input.dat"]);
        assert!(g.external_inputs(1).is_empty());
    }

    #[test]
    fn test_empty_pipeline() {
        let g = GraphAnalysis::analyze(&Pipeline::new()).unwrap();
        assert!(g.is_empty());
    }
}
