use thiserror::Error;

use super::code::ErrorCode;

/// Failures while resolving `${...}` references.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("reference path not found: {path}")]
    PathNotFound { path: String },

    #[error("invalid reference path: {path} ('{segment}' is not a mapping)")]
    NotAMapping { path: String, segment: String },

    #[error("error resolving value for key {key}: {source}")]
    InKey {
        key: String,
        #[source]
        source: Box<ResolveError>,
    },

    #[error("error resolving array item {index}: {source}")]
    InIndex {
        index: usize,
        #[source]
        source: Box<ResolveError>,
    },
}

impl ResolveError {
    pub(crate) fn in_key(key: &str, source: ResolveError) -> Self {
        Self::InKey {
            key: key.to_string(),
            source: Box::new(source),
        }
    }

    pub(crate) fn in_index(index: usize, source: ResolveError) -> Self {
        Self::InIndex {
            index,
            source: Box::new(source),
        }
    }

    /// The reference path that failed, regardless of nesting.
    pub fn path(&self) -> &str {
        match self {
            Self::PathNotFound { path } | Self::NotAMapping { path, .. } => path,
            Self::InKey { source, .. } | Self::InIndex { source, .. } => source.path(),
        }
    }
}

/// Structural errors: the plan cannot be loaded or is malformed.
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("file path cannot be empty")]
    EmptyPath,

    #[error("plan file does not exist: {0}")]
    NotFound(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML in {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to parse plan structure: {0}")]
    Structure(#[from] serde_json::Error),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("failed to load include {path}: {reason}")]
    Include { path: String, reason: String },

    #[error("failed to resolve variables: {0}")]
    Resolve(#[from] ResolveError),

    #[error("at least one stage is required")]
    NoStages,

    #[error("rollback must have at least one stage")]
    EmptyRollback,

    #[error("{scope}[{stage}] must have at least one job")]
    NoJobs { scope: &'static str, stage: String },

    #[error("duplicate stage name: {0}")]
    DuplicateStage(String),

    #[error("duplicate job name in stage {stage}: {job}")]
    DuplicateJob { stage: String, job: String },

    #[error("{scope}[{stage}].job[{job}] depends on unknown job: {dependency}")]
    UnknownDependency {
        scope: &'static str,
        stage: String,
        job: String,
        dependency: String,
    },

    #[error("{scope}[{stage}].job[{job}] has an unresolvable reference: {source}")]
    UnresolvedReference {
        scope: &'static str,
        stage: String,
        job: String,
        #[source]
        source: ResolveError,
    },

    #[error("in stage {stage}: circular dependency detected: {from} -> {to}")]
    CircularDependency {
        stage: String,
        from: String,
        to: String,
    },
}

impl PlanError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::EmptyPath | Self::NotFound(_) => ErrorCode::FileNotFound,
            Self::Io { .. } => ErrorCode::GeneralError,
            Self::Yaml { .. } | Self::Structure(_) => ErrorCode::ParseError,
            Self::Include { .. } => ErrorCode::ParseError,
            Self::Resolve(_) | Self::UnresolvedReference { .. } => ErrorCode::ResolveError,
            Self::UnknownDependency { .. } => ErrorCode::DependencyError,
            Self::CircularDependency { .. } => ErrorCode::CircularDependency,
            Self::MissingField(_)
            | Self::InvalidField { .. }
            | Self::NoStages
            | Self::EmptyRollback
            | Self::NoJobs { .. }
            | Self::DuplicateStage(_)
            | Self::DuplicateJob { .. } => ErrorCode::ValidationError,
        }
    }
}
