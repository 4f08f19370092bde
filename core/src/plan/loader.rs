use std::path::Path;

use serde_json::{Map, Value};

use super::resolver::VariableResolver;
use crate::error::PlanError;
use crate::model::Plan;

const REQUIRED_FIELDS: [&str; 3] = ["apiVersion", "kind", "metadata"];

/// Reads plan documents from disk and prepares their variable context.
#[derive(Debug, Default)]
pub struct PlanLoader {
    resolver: VariableResolver,
    cache: Map<String, Value>,
}

impl PlanLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Included documents seen by the last load, keyed by `kind` or file name.
    pub fn includes(&self) -> &Map<String, Value> {
        &self.cache
    }

    pub fn load_plan(&mut self, path: impl AsRef<Path>) -> Result<Plan, PlanError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(PlanError::EmptyPath);
        }
        if !path.exists() {
            return Err(PlanError::NotFound(path.display().to_string()));
        }

        let data = std::fs::read_to_string(path).map_err(|source| PlanError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        tracing::debug!(plan = %path.display(), "loading plan");
        self.load_document(&data, &path.display().to_string(), &base_dir)
    }

    /// Load a plan from YAML text; includes resolve relative to `base_dir`.
    pub fn load_plan_str(
        &mut self,
        yaml: &str,
        base_dir: impl AsRef<Path>,
    ) -> Result<Plan, PlanError> {
        self.load_document(yaml, "<inline>", base_dir.as_ref())
    }

    fn load_document(
        &mut self,
        yaml: &str,
        origin: &str,
        base_dir: &Path,
    ) -> Result<Plan, PlanError> {
        self.cache.clear();

        let raw = parse_yaml(yaml, origin)?;
        let Value::Object(mut raw) = raw else {
            return Err(PlanError::MissingField(REQUIRED_FIELDS[0].to_string()));
        };
        validate_raw_plan(&raw)?;

        if let Some(Value::Array(includes)) = raw.get("includes") {
            let paths: Vec<String> = includes
                .iter()
                .filter_map(|inc| inc.get("path").and_then(Value::as_str))
                .map(str::to_string)
                .collect();
            for rel in paths {
                self.load_include(&base_dir.join(&rel), &rel)?;
            }
        }

        let variables = match raw.remove("variables") {
            Some(Value::Object(vars)) => self.resolve_variables(vars)?,
            Some(Value::Null) | None => self.included_variables(Map::new()),
            Some(_) => {
                return Err(PlanError::InvalidField {
                    field: "variables".to_string(),
                    reason: "must be a mapping".to_string(),
                })
            }
        };
        raw.insert("variables".to_string(), Value::Object(variables));

        let plan: Plan = serde_json::from_value(Value::Object(raw))?;
        tracing::debug!(
            plan = %plan.metadata.name,
            stages = plan.stages.len(),
            includes = self.cache.len(),
            "plan loaded"
        );
        Ok(plan)
    }

    fn load_include(&mut self, path: &Path, rel: &str) -> Result<(), PlanError> {
        let data = std::fs::read_to_string(path).map_err(|e| PlanError::Include {
            path: rel.to_string(),
            reason: format!("failed to read include file: {e}"),
        })?;
        let doc = parse_yaml(&data, rel).map_err(|e| PlanError::Include {
            path: rel.to_string(),
            reason: e.to_string(),
        })?;

        let key = doc
            .get("kind")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| file_name(path));
        self.cache.insert(key, doc);
        Ok(())
    }

    /// Resolve the `variables` block against the include cache and itself.
    fn resolve_variables(&self, vars: Map<String, Value>) -> Result<Map<String, Value>, PlanError> {
        let mut context = self.cache.clone();
        context.insert("variables".to_string(), Value::Object(vars.clone()));
        for (key, value) in &vars {
            context.entry(key.clone()).or_insert_with(|| value.clone());
        }

        let resolved = self.resolver.resolve_values(&vars, &context)?;
        Ok(self.included_variables(resolved))
    }

    fn included_variables(&self, mut vars: Map<String, Value>) -> Map<String, Value> {
        for (key, doc) in &self.cache {
            vars.entry(key.clone()).or_insert_with(|| doc.clone());
        }
        vars
    }
}

fn parse_yaml(data: &str, origin: &str) -> Result<Value, PlanError> {
    serde_yaml::from_str::<Value>(data).map_err(|source| PlanError::Yaml {
        path: origin.to_string(),
        source,
    })
}

fn validate_raw_plan(raw: &Map<String, Value>) -> Result<(), PlanError> {
    for field in REQUIRED_FIELDS {
        if !raw.contains_key(field) {
            return Err(PlanError::MissingField(field.to_string()));
        }
    }
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    const PLAN: &str = r#"
apiVersion: v1
kind: ReleasePlan
metadata:
  name: web-release
  version: "1.4"
includes:
  - path: env.yaml
variables:
  service:
    name: web
    port: 8080
  region: ${Environment.spec.region}
  endpoint: "https://${Environment.spec.domain}/${service.name}"
stages:
  - name: deploy
    jobs:
      - name: apply
        type: kubernetes
        config:
          namespace: ${service.name}
          port: ${service.port}
"#;

    const ENV: &str = r#"
kind: Environment
spec:
  region: eu-west-1
  domain: example.com
"#;

    #[test]
    fn test_load_plan_with_includes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("plan.yaml"), PLAN).unwrap();
        fs::write(dir.path().join("env.yaml"), ENV).unwrap();

        let mut loader = PlanLoader::new();
        let plan = loader.load_plan(dir.path().join("plan.yaml")).unwrap();

        assert_eq!(plan.metadata.name, "web-release");
        assert_eq!(plan.metadata.version, "1.4");
        assert_eq!(plan.variables["region"], json!("eu-west-1"));
        assert_eq!(plan.variables["endpoint"], json!("https://example.com/web"));
        assert_eq!(plan.variables["Environment"]["spec"]["domain"], json!("example.com"));
        assert!(loader.includes().contains_key("Environment"));

        // job configs stay unresolved until dispatch
        let config = &plan.stages[0].jobs[0].config;
        assert_eq!(config["namespace"], json!("${service.name}"));
    }

    #[test]
    fn test_missing_required_field() {
        let mut loader = PlanLoader::new();
        let err = loader
            .load_plan_str("kind: ReleasePlan\nmetadata: {name: x}\n", ".")
            .unwrap_err();
        assert!(matches!(err, PlanError::MissingField(f) if f == "apiVersion"));
    }

    #[test]
    fn test_missing_file_and_empty_path() {
        let mut loader = PlanLoader::new();
        assert!(matches!(loader.load_plan(""), Err(PlanError::EmptyPath)));
        assert!(matches!(
            loader.load_plan("does-not-exist.yaml"),
            Err(PlanError::NotFound(_))
        ));
    }

    #[test]
    fn test_malformed_yaml() {
        let mut loader = PlanLoader::new();
        let err = loader.load_plan_str("stages: [unclosed", ".").unwrap_err();
        assert!(matches!(err, PlanError::Yaml { .. }));
    }

    #[test]
    fn test_missing_include_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = "apiVersion: v1\nkind: ReleasePlan\nmetadata: {name: x}\nincludes:\n  - path: nope.yaml\nstages: []\n";
        let mut loader = PlanLoader::new();
        let err = loader.load_plan_str(yaml, dir.path()).unwrap_err();
        assert!(matches!(err, PlanError::Include { path, .. } if path == "nope.yaml"));
    }

    #[test]
    fn test_include_without_kind_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("defaults.yaml"), "replicas: 3\n").unwrap();
        let yaml = "apiVersion: v1\nkind: ReleasePlan\nmetadata: {name: x}\nincludes:\n  - path: defaults.yaml\nstages: []\n";

        let mut loader = PlanLoader::new();
        let plan = loader.load_plan_str(yaml, dir.path()).unwrap();
        assert_eq!(plan.variables["defaults.yaml"]["replicas"], json!(3));
    }

    #[test]
    fn test_unresolvable_variable_fails_load() {
        let yaml = "apiVersion: v1\nkind: ReleasePlan\nmetadata: {name: x}\nvariables:\n  a: ${nowhere.b}\nstages: []\n";
        let mut loader = PlanLoader::new();
        let err = loader.load_plan_str(yaml, ".").unwrap_err();
        assert!(matches!(err, PlanError::Resolve(_)));
    }
}
