//! Storage-backend and cluster-kind enumerations.
//!
//! [`StorageBackendKind`] is the closed set of artifact-upload targets
//! an engine deployment can use; [`supported_backends`] maps each
//! cluster kind to the ordered subset it legally supports. The mapping
//! feeds a caller-facing choice list -- it is never used to silently
//! fall back to a different backend.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of artifact-upload backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageBackendKind {
    /// Azure Blob storage addressed by container + SAS credential.
    AzureBlob,
    /// The cluster's own default storage account.
    DefaultStorageAccount,
    /// Upload through an already-open Spark interactive session.
    SparkInteractiveSession,
    /// Azure Data Lake Storage Gen1 (`adl://`).
    AdlsGen1,
    /// Azure Data Lake Storage Gen2 (`abfs://`).
    AdlsGen2,
    /// Plain WebHDFS endpoint.
    Webhdfs,
    /// Default Data Lake storage of a Cosmos serverless Spark account.
    CosmosServerlessDefault,
    /// Sentinel for backends the engine cannot drive.
    NotSupported,
}

impl StorageBackendKind {
    /// Human-readable description shown in caller-facing choice lists.
    pub fn description(&self) -> &'static str {
        match self {
            StorageBackendKind::AzureBlob => "Use Azure Blob to upload",
            StorageBackendKind::DefaultStorageAccount => {
                "Use cluster default storage account to upload"
            }
            StorageBackendKind::SparkInteractiveSession => {
                "Use Spark interactive session to upload"
            }
            StorageBackendKind::AdlsGen1 => "Use ADLS Gen 1 storage to upload",
            StorageBackendKind::AdlsGen2 => "Use ADLS Gen 2 storage to upload",
            StorageBackendKind::Webhdfs => "Use WebHDFS to upload",
            StorageBackendKind::CosmosServerlessDefault => {
                "Use account default storage to upload"
            }
            StorageBackendKind::NotSupported => "Storage type is not supported",
        }
    }
}

impl fmt::Display for StorageBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Kinds of cluster targets the engine can submit to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClusterKind {
    /// A directly-listed HDInsight cluster.
    Hdi,
    /// An HDInsight cluster linked by URL (credentials supplied by the
    /// caller rather than a subscription).
    HdiLinked,
    /// A Cosmos serverless Spark account.
    Serverless,
    /// A SQL Server big-data cluster fronted by a Livy gateway.
    SqlServerBigData,
    /// A Synapse/Arcadia workspace Spark pool.
    Synapse,
}

/// Ordered subset of backends each cluster kind legally supports.
///
/// The first entry is the recommended default for that kind.
pub fn supported_backends(kind: ClusterKind) -> &'static [StorageBackendKind] {
    match kind {
        ClusterKind::Hdi => &[
            StorageBackendKind::DefaultStorageAccount,
            StorageBackendKind::SparkInteractiveSession,
            StorageBackendKind::AzureBlob,
            StorageBackendKind::AdlsGen1,
            StorageBackendKind::AdlsGen2,
        ],
        ClusterKind::HdiLinked => &[
            StorageBackendKind::SparkInteractiveSession,
            StorageBackendKind::AzureBlob,
            StorageBackendKind::AdlsGen2,
        ],
        ClusterKind::Serverless => &[StorageBackendKind::CosmosServerlessDefault],
        ClusterKind::SqlServerBigData => &[StorageBackendKind::Webhdfs],
        ClusterKind::Synapse => &[
            StorageBackendKind::DefaultStorageAccount,
            StorageBackendKind::AdlsGen2,
        ],
    }
}
