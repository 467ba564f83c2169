// src/config/validate.rs

use petgraph::algo::{kosaraju_scc, toposort};
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{PlanFile, RawPlanFile};
use crate::errors::{JobdagError, Result};
use crate::job::JobId;

impl TryFrom<RawPlanFile> for PlanFile {
    type Error = JobdagError;

    fn try_from(raw: RawPlanFile) -> std::result::Result<Self, Self::Error> {
        let order = validate_raw_plan(&raw)?;
        Ok(PlanFile::new_unchecked(raw.config, raw.job, order))
    }
}

/// Validate a raw plan and return its jobs in dependency order.
fn validate_raw_plan(plan: &RawPlanFile) -> Result<Vec<String>> {
    ensure_has_jobs(plan)?;
    validate_scheduler_section(plan)?;
    validate_job_dependencies(plan)?;
    dependency_order(plan)
}

fn ensure_has_jobs(plan: &RawPlanFile) -> Result<()> {
    if plan.job.is_empty() {
        return Err(JobdagError::ConfigError(
            "plan must contain at least one [job.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_scheduler_section(plan: &RawPlanFile) -> Result<()> {
    if plan.config.workers == 0 {
        return Err(JobdagError::ConfigError(
            "[config].workers must be >= 1 (got 0)".to_string(),
        ));
    }

    if plan.config.poll_interval_ms == 0 {
        return Err(JobdagError::ConfigError(
            "[config].poll_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(())
}

fn validate_job_dependencies(plan: &RawPlanFile) -> Result<()> {
    for (name, job) in plan.job.iter() {
        for dep in job.after.iter() {
            if dep == name {
                return Err(JobdagError::CircularDependency {
                    cycle: vec![JobId::from(name.as_str()), JobId::from(name.as_str())],
                });
            }
            if !plan.job.contains_key(dep) {
                return Err(JobdagError::UnknownDependency {
                    job: JobId::from(name.as_str()),
                    dependency: JobId::from(dep.as_str()),
                });
            }
        }
    }
    Ok(())
}

fn dependency_order(plan: &RawPlanFile) -> Result<Vec<String>> {
    // Edge direction: dep -> job, so a topological order lists
    // dependencies first.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in plan.job.keys() {
        graph.add_node(name.as_str());
    }

    for (name, job) in plan.job.iter() {
        for dep in job.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(str::to_string).collect()),
        Err(cycle) => {
            // Report the whole strongly connected component containing the
            // node toposort tripped on.
            let node = cycle.node_id();
            let mut members = kosaraju_scc(&graph)
                .into_iter()
                .find(|scc| scc.contains(&node))
                .unwrap_or_else(|| vec![node]);
            members.sort_unstable();

            Err(JobdagError::CircularDependency {
                cycle: members.into_iter().map(JobId::from).collect(),
            })
        }
    }
}
