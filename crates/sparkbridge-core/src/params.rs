//! Submission parameter model and its wire mapping.
//!
//! [`SparkSubmissionParameter`] is the immutable-after-build value
//! object callers hand to the engine. Its open `job_config` map carries
//! both submission-level keys (driver/executor sizing, with documented
//! defaults) and a nested `conf` object of raw Spark properties.
//! [`SparkSubmissionParameter::flatten`] turns it into the
//! [`BatchJobRequest`] JSON body the gateway expects;
//! [`SparkSubmissionParameter::apply_flattened`] is the lossless
//! inverse.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Submission-level key: driver process memory, e.g. `"4G"`.
pub const DRIVER_MEMORY: &str = "driverMemory";
/// Default driver memory when the key is absent.
pub const DEFAULT_DRIVER_MEMORY: &str = "4G";
/// Submission-level key: driver core count.
pub const DRIVER_CORES: &str = "driverCores";
/// Default driver core count.
pub const DEFAULT_DRIVER_CORES: u32 = 1;
/// Submission-level key: per-executor memory, e.g. `"4G"`.
pub const EXECUTOR_MEMORY: &str = "executorMemory";
/// Default executor memory when the key is absent.
pub const DEFAULT_EXECUTOR_MEMORY: &str = "4G";
/// Submission-level key: per-executor core count.
pub const EXECUTOR_CORES: &str = "executorCores";
/// Default executor core count.
pub const DEFAULT_EXECUTOR_CORES: u32 = 1;
/// Submission-level key: number of executors.
pub const NUM_EXECUTORS: &str = "numExecutors";
/// Default executor count.
pub const DEFAULT_NUM_EXECUTORS: u32 = 5;
/// Key under which raw Spark properties nest inside the job config.
pub const CONF: &str = "conf";

/// The submission-level keys recognized at the top of `job_config`.
pub const SUBMISSION_LEVEL_KEYS: &[&str] = &[
    DRIVER_MEMORY,
    DRIVER_CORES,
    EXECUTOR_MEMORY,
    EXECUTOR_CORES,
    NUM_EXECUTORS,
];

/// Typed, validated configuration for one batch-job submission.
///
/// Built with [`new`](Self::new) plus `with_*` methods, then treated as
/// immutable by the engine. Invariant: submission-level keys never
/// appear inside the nested `conf` map -- [`with_job_config`]
/// (Self::with_job_config) hoists any it finds so the two layers stay
/// disjoint and [`flatten`](Self::flatten)/[`apply_flattened`]
/// (Self::apply_flattened) round-trip losslessly.
#[derive(Debug, Clone, PartialEq)]
pub struct SparkSubmissionParameter {
    cluster_name: String,
    name: String,
    file: String,
    is_local_artifact: bool,
    main_class_name: String,
    referenced_files: Vec<String>,
    referenced_jars: Vec<String>,
    args: Vec<String>,
    job_config: BTreeMap<String, Value>,
}

impl SparkSubmissionParameter {
    /// Create a parameter targeting `cluster_name`, running `file`'s
    /// `main_class_name`.
    pub fn new(
        cluster_name: impl Into<String>,
        file: impl Into<String>,
        main_class_name: impl Into<String>,
    ) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            name: String::new(),
            file: file.into(),
            is_local_artifact: false,
            main_class_name: main_class_name.into(),
            referenced_files: Vec::new(),
            referenced_jars: Vec::new(),
            args: Vec::new(),
            job_config: BTreeMap::new(),
        }
    }

    /// Set the display name sent to the gateway.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Mark the artifact as a local path that must be deployed before
    /// submission (as opposed to an already-uploaded remote URI).
    pub fn with_local_artifact(mut self, is_local: bool) -> Self {
        self.is_local_artifact = is_local;
        self
    }

    /// Auxiliary files shipped with the job.
    pub fn with_referenced_files(mut self, files: Vec<String>) -> Self {
        self.referenced_files = files;
        self
    }

    /// Auxiliary jars shipped with the job.
    pub fn with_referenced_jars(mut self, jars: Vec<String>) -> Self {
        self.referenced_jars = jars;
        self
    }

    /// Program arguments.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Replace the job configuration map.
    ///
    /// Submission-level keys found *inside* the nested `conf` object
    /// are hoisted to the top level so the two layers stay disjoint.
    pub fn with_job_config(mut self, config: BTreeMap<String, Value>) -> Self {
        self.job_config = normalize_job_config(config);
        self
    }

    /// Cluster the job targets.
    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    /// Job display name (may be empty).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Artifact reference: a local path or an already-deployed URI,
    /// per [`is_local_artifact`](Self::is_local_artifact).
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Whether [`file`](Self::file) is a local path still to deploy.
    pub fn is_local_artifact(&self) -> bool {
        self.is_local_artifact
    }

    /// Main entry-point class.
    pub fn main_class_name(&self) -> &str {
        &self.main_class_name
    }

    /// Program arguments.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The open job-configuration map.
    pub fn job_config(&self) -> &BTreeMap<String, Value> {
        &self.job_config
    }

    /// The nested `conf` map of raw Spark properties, if present.
    pub fn conf(&self) -> Option<&serde_json::Map<String, Value>> {
        self.job_config.get(CONF).and_then(Value::as_object)
    }

    /// Driver memory, falling back to [`DEFAULT_DRIVER_MEMORY`].
    pub fn driver_memory(&self) -> String {
        self.string_config(DRIVER_MEMORY)
            .unwrap_or_else(|| DEFAULT_DRIVER_MEMORY.to_string())
    }

    /// Driver cores, falling back to [`DEFAULT_DRIVER_CORES`].
    pub fn driver_cores(&self) -> u32 {
        self.integer_config(DRIVER_CORES).unwrap_or(DEFAULT_DRIVER_CORES)
    }

    /// Executor memory, falling back to [`DEFAULT_EXECUTOR_MEMORY`].
    pub fn executor_memory(&self) -> String {
        self.string_config(EXECUTOR_MEMORY)
            .unwrap_or_else(|| DEFAULT_EXECUTOR_MEMORY.to_string())
    }

    /// Executor cores, falling back to [`DEFAULT_EXECUTOR_CORES`].
    pub fn executor_cores(&self) -> u32 {
        self.integer_config(EXECUTOR_CORES)
            .unwrap_or(DEFAULT_EXECUTOR_CORES)
    }

    /// Executor count, falling back to [`DEFAULT_NUM_EXECUTORS`].
    pub fn num_executors(&self) -> u32 {
        self.integer_config(NUM_EXECUTORS).unwrap_or(DEFAULT_NUM_EXECUTORS)
    }

    /// Flatten into the JSON body for `POST /batches`.
    pub fn flatten(&self) -> BatchJobRequest {
        let conf = self
            .conf()
            .map(|map| {
                map.iter()
                    .map(|(k, v)| (k.clone(), value_to_string(v)))
                    .collect()
            })
            .unwrap_or_default();

        BatchJobRequest {
            file: self.file.clone(),
            class_name: self.main_class_name.clone(),
            name: (!self.name.is_empty()).then(|| self.name.clone()),
            files: self.referenced_files.clone(),
            jars: self.referenced_jars.clone(),
            args: self.args.clone(),
            driver_memory: self.string_config(DRIVER_MEMORY),
            driver_cores: self.integer_config(DRIVER_CORES),
            executor_memory: self.string_config(EXECUTOR_MEMORY),
            executor_cores: self.integer_config(EXECUTOR_CORES),
            num_executors: self.integer_config(NUM_EXECUTORS),
            conf,
        }
    }

    /// Rebuild this parameter's mutable parts from a flattened request
    /// body. Inverse of [`flatten`](Self::flatten): the reconstructed
    /// `job_config` is equivalent to the one that produced `request`.
    pub fn apply_flattened(&mut self, request: BatchJobRequest) {
        let mut config = BTreeMap::new();
        if let Some(v) = request.driver_memory {
            config.insert(DRIVER_MEMORY.to_string(), Value::String(v));
        }
        if let Some(v) = request.driver_cores {
            config.insert(DRIVER_CORES.to_string(), Value::from(v));
        }
        if let Some(v) = request.executor_memory {
            config.insert(EXECUTOR_MEMORY.to_string(), Value::String(v));
        }
        if let Some(v) = request.executor_cores {
            config.insert(EXECUTOR_CORES.to_string(), Value::from(v));
        }
        if let Some(v) = request.num_executors {
            config.insert(NUM_EXECUTORS.to_string(), Value::from(v));
        }
        if !request.conf.is_empty() {
            let conf: serde_json::Map<String, Value> = request
                .conf
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect();
            config.insert(CONF.to_string(), Value::Object(conf));
        }

        self.file = request.file;
        self.main_class_name = request.class_name;
        self.name = request.name.unwrap_or_default();
        self.referenced_files = request.files;
        self.referenced_jars = request.jars;
        self.args = request.args;
        self.job_config = normalize_job_config(config);
    }

    fn string_config(&self, key: &str) -> Option<String> {
        self.job_config.get(key).map(value_to_string)
    }

    fn integer_config(&self, key: &str) -> Option<u32> {
        self.job_config.get(key).and_then(value_as_u32)
    }
}

/// Flattened JSON body for `POST /batches`, as the Livy-style gateway
/// expects it. Empty collections and absent sizing keys are omitted
/// from the serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchJobRequest {
    /// Remote artifact URI resolvable by the gateway.
    pub file: String,
    /// Main entry-point class.
    pub class_name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub files: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub jars: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub driver_memory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub driver_cores: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub executor_memory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub executor_cores: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub num_executors: Option<u32>,
    /// Raw Spark properties (`spark.*` keys).
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub conf: BTreeMap<String, String>,
}

/// Hoist submission-level keys out of the nested `conf` object so the
/// two layers stay disjoint.
fn normalize_job_config(mut config: BTreeMap<String, Value>) -> BTreeMap<String, Value> {
    let hoisted: Vec<(String, Value)> = match config.get_mut(CONF).and_then(Value::as_object_mut) {
        Some(conf) => SUBMISSION_LEVEL_KEYS
            .iter()
            .filter_map(|key| conf.remove(*key).map(|v| (key.to_string(), v)))
            .collect(),
        None => Vec::new(),
    };

    for (key, value) in hoisted {
        // Top-level wins if the caller set both.
        config.entry(key).or_insert(value);
    }

    if config
        .get(CONF)
        .and_then(Value::as_object)
        .is_some_and(|conf| conf.is_empty())
    {
        config.remove(CONF);
    }

    config
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn value_as_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
