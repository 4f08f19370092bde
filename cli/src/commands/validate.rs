use rollout_core::api::{CliError, Plan, PlanLoader, PlanValidator};

use super::cli::ValidateArgs;

/// Load and validate a plan, returning the report to print.
pub fn validate_plan(args: &ValidateArgs, verbose: bool) -> Result<String, CliError> {
    let plan = PlanLoader::new().load_plan(&args.plan)?;
    PlanValidator::new().validate_plan(&plan)?;
    tracing::debug!(plan = %plan.metadata.name, "plan is valid");
    Ok(format_report(&plan, verbose))
}

fn format_report(plan: &Plan, verbose: bool) -> String {
    let version = if plan.metadata.version.is_empty() {
        "not specified"
    } else {
        plan.metadata.version.as_str()
    };

    let mut lines = vec![
        "Plan validation successful!".to_string(),
        format!("Plan: {} (version: {})", plan.metadata.name, version),
        format!("Stages: {}", plan.stages.len()),
    ];
    if let Some(rollback) = &plan.rollback {
        lines.push(format!("Rollback stages: {}", rollback.stages.len()));
    }

    if verbose {
        for (i, stage) in plan.stages.iter().enumerate() {
            let approval = if stage.require_approval {
                " [requires approval]"
            } else {
                ""
            };
            lines.push(format!(
                "Stage {}: {} ({} jobs){}",
                i + 1,
                stage.name,
                stage.jobs.len(),
                approval
            ));
            for (j, job) in stage.jobs.iter().enumerate() {
                lines.push(format!("  Job {}: {} (type: {})", j + 1, job.name, job.job_type));
                if !job.depends_on.is_empty() {
                    lines.push(format!("    Dependencies: {:?}", job.depends_on));
                }
            }
        }
    }

    lines.join("\n")
}
