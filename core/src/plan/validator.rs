use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use super::resolver::VariableResolver;
use crate::context::ExecutionContext;
use crate::error::PlanError;
use crate::model::{Job, Plan, Stage};

/// Stand-in execution id for references checked before a run exists.
const VALIDATION_EXECUTION_ID: &str = "validation";

/// Structural checks run before any execution begins.
///
/// The cycle check here walks the job list directly and is independent of
/// [`crate::executor::JobGraph::has_cycles`], which the executor re-runs on
/// every stage graph.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlanValidator;

impl PlanValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_plan(&self, plan: &Plan) -> Result<(), PlanError> {
        if plan.api_version.is_empty() {
            return Err(PlanError::MissingField("apiVersion".into()));
        }
        if plan.kind.is_empty() {
            return Err(PlanError::MissingField("kind".into()));
        }
        if plan.metadata.name.is_empty() {
            return Err(PlanError::MissingField("metadata.name".into()));
        }
        if plan.stages.is_empty() {
            return Err(PlanError::NoStages);
        }

        self.validate_stages(&plan.stages, "stage", &plan.variables)?;

        if let Some(rollback) = &plan.rollback {
            if rollback.stages.is_empty() {
                return Err(PlanError::EmptyRollback);
            }
            self.validate_stages(&rollback.stages, "rollback.stage", &plan.variables)?;
        }

        Ok(())
    }

    fn validate_stages(
        &self,
        stages: &[Stage],
        scope: &'static str,
        variables: &Map<String, Value>,
    ) -> Result<(), PlanError> {
        let mut stage_names = HashSet::new();
        for (i, stage) in stages.iter().enumerate() {
            if stage.name.is_empty() {
                return Err(PlanError::MissingField(format!("{scope}[{i}].name")));
            }
            if !stage_names.insert(stage.name.as_str()) {
                return Err(PlanError::DuplicateStage(stage.name.clone()));
            }
            if stage.jobs.is_empty() {
                return Err(PlanError::NoJobs {
                    scope,
                    stage: stage.name.clone(),
                });
            }
            self.validate_jobs(stage, scope)?;
            check_circular_dependencies(&stage.name, &stage.jobs)?;
            check_references(stage, scope, variables)?;
        }
        Ok(())
    }

    fn validate_jobs(&self, stage: &Stage, scope: &'static str) -> Result<(), PlanError> {
        let mut job_names = HashSet::new();
        for (j, job) in stage.jobs.iter().enumerate() {
            if job.name.is_empty() {
                return Err(PlanError::MissingField(format!(
                    "{scope}[{}].job[{j}].name",
                    stage.name
                )));
            }
            if !job_names.insert(job.name.as_str()) {
                return Err(PlanError::DuplicateJob {
                    stage: stage.name.clone(),
                    job: job.name.clone(),
                });
            }
            if job.job_type.is_empty() {
                return Err(PlanError::MissingField(format!(
                    "{scope}[{}].job[{}].type",
                    stage.name, job.name
                )));
            }
        }

        for job in &stage.jobs {
            if let Some(dep) = job.depends_on.iter().find(|d| !job_names.contains(d.as_str())) {
                return Err(PlanError::UnknownDependency {
                    scope,
                    stage: stage.name.clone(),
                    job: job.name.clone(),
                    dependency: dep.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Resolve every job config the way dispatch will, so a whole-value
/// reference to a missing path fails before anything runs. `execution.id`
/// is a placeholder here; only its presence matters.
fn check_references(
    stage: &Stage,
    scope: &'static str,
    variables: &Map<String, Value>,
) -> Result<(), PlanError> {
    let resolver = VariableResolver::new();
    let context = ExecutionContext::with_id(
        VALIDATION_EXECUTION_ID,
        variables.clone(),
        CancellationToken::new(),
    )
    .with_stage(&stage.name)
    .resolution_scope();

    for job in &stage.jobs {
        resolver
            .resolve_values(&job.config, &context)
            .map_err(|source| PlanError::UnresolvedReference {
                scope,
                stage: stage.name.clone(),
                job: job.name.clone(),
                source,
            })?;
    }
    Ok(())
}

fn check_circular_dependencies(stage: &str, jobs: &[Job]) -> Result<(), PlanError> {
    let by_name: HashMap<&str, &Job> = jobs.iter().map(|j| (j.name.as_str(), j)).collect();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut on_path: HashSet<&str> = HashSet::new();

    fn visit<'a>(
        job: &'a Job,
        by_name: &HashMap<&str, &'a Job>,
        visited: &mut HashSet<&'a str>,
        on_path: &mut HashSet<&'a str>,
    ) -> Option<(String, String)> {
        visited.insert(job.name.as_str());
        on_path.insert(job.name.as_str());

        for dep in &job.depends_on {
            if on_path.contains(dep.as_str()) {
                return Some((job.name.clone(), dep.clone()));
            }
            if visited.contains(dep.as_str()) {
                continue;
            }
            if let Some(next) = by_name.get(dep.as_str()) {
                if let Some(edge) = visit(next, by_name, visited, on_path) {
                    return Some(edge);
                }
            }
        }

        on_path.remove(job.name.as_str());
        None
    }

    for job in jobs {
        if visited.contains(job.name.as_str()) {
            continue;
        }
        if let Some((from, to)) = visit(job, &by_name, &mut visited, &mut on_path) {
            return Err(PlanError::CircularDependency {
                stage: stage.to_string(),
                from,
                to,
            });
        }
    }
    Ok(())
}
