//! # Error Handling
//!
//! This module defines the centralized error handling mechanism for the
//! `manifest-doctor` application. It uses the `thiserror` library to create a
//! comprehensive `Error` enum that covers all anticipated failure modes,
//! providing clear and descriptive error messages.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum that represents all possible errors that can
//!   occur within the application. Each variant corresponds to a specific
//!   type of error and includes contextual information to aid in debugging.
//!   Per-work-item errors always carry the `(branch, project)` pair so that
//!   batch logs can name the failing combination.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`, used
//!   throughout the application to simplify function signatures and ensure
//!   type safety.
//!
//! ## Exit Codes
//!
//! The enclosing CLI maps errors to process exit codes via
//! [`Error::exit_code`]:
//!
//! - `1` — configuration error (missing checkout, empty project list, ...)
//! - `2` — authentication / setup failure
//! - `3` — memoization-client failure
//! - `4` — the batch had at least one non-fatal error
//! - `5` — fatal reference-manifest load failure
//!
//! ## Retry Classification
//!
//! Transient transport errors are represented by the dedicated
//! [`Error::Transient`] variant; the retry policy in `retry` only ever
//! retries errors for which [`Error::is_transient`] returns true. Definite
//! rejections (e.g. a Gerrit 4xx) use [`Error::PushRejected`] and fail fast.

use thiserror::Error;

/// Main error type for manifest-doctor operations
#[derive(Error, Debug)]
pub enum Error {
    /// An invalid or incomplete run configuration.
    ///
    /// This error includes the specific issue and optionally a hint about how
    /// to fix it.
    #[error("Configuration error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    Config {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// Authentication or client setup failed before any work started.
    #[error("Auth/setup failure: {message}")]
    AuthSetup { message: String },

    /// The memoization client could not be constructed.
    ///
    /// Read failures during processing are *not* reported through this
    /// variant; they degrade to "no history" per the memoization contract.
    #[error("Memoization client failure: {message}")]
    Memo { message: String },

    /// The canonical reference manifest for a branch could not be fetched or
    /// parsed. Fatal for the affected branch.
    #[error("{branch}: failed to load reference manifest: {message}")]
    ReferenceLoad { branch: String, message: String },

    /// A per-work-item failure: loading, fetching or rewriting a project's
    /// `local_manifest.xml` went wrong. Non-fatal for the batch.
    #[error("{branch}, {project}: {message}")]
    TargetLoad {
        branch: String,
        project: String,
        message: String,
    },

    /// A manifest document could not be parsed.
    #[error("failed to parse manifest {path}: {message}")]
    ManifestParse { path: String, message: String },

    /// Manifest includes form a cycle.
    #[error("cyclic manifest include at {path}")]
    CyclicInclude { path: String },

    /// A project references a remote that is absent after include merging.
    #[error("project {project} references unknown remote {remote}")]
    UnknownRemote { remote: String, project: String },

    /// The rewriter found more than one `<default>` element.
    #[error("manifest contains more than one <default> element")]
    MultipleDefaults,

    /// The reference carries a populated default but the file has no
    /// `<default>` element to update.
    #[error("reference has a default but manifest contains no <default> element")]
    MissingDefault,

    /// The reference contains remotes with no counterpart in the file.
    #[error("reference contains remote(s) not present in manifest: {remotes}")]
    ExtraReferenceRemote { remotes: String },

    /// A start-tag in the raw manifest stream violated the rewriter's
    /// structural assumptions.
    #[error("malformed <{tag}> element: {message}")]
    MalformedElement { tag: String, message: String },

    /// A project checkout has no git remote to push to.
    #[error("{project}: project has no remotes")]
    NoRemote { project: String },

    /// A project checkout has more than one git remote.
    #[error("{project}: project has {count} remotes, don't know which to push to")]
    AmbiguousRemote { project: String, count: usize },

    /// The remote definitively rejected the push.
    #[error("{branch}, {project}: push rejected: {stderr}")]
    PushRejected {
        project: String,
        branch: String,
        stderr: String,
    },

    /// A retryable transport failure.
    #[error("transient failure during {operation}: {message}")]
    Transient { operation: String, message: String },

    /// An error occurred while executing a git command.
    #[error("git command failed in {repo}: {command} - {stderr}")]
    GitCommand {
        command: String,
        repo: String,
        stderr: String,
    },

    /// A gitiles-like request failed.
    #[error("gitiles request failed for {host}/{project}/{path}: {message}")]
    Gitiles {
        host: String,
        project: String,
        path: String,
        message: String,
    },

    /// An object-storage operation failed.
    #[error("storage operation failed for {path}: {message}")]
    Storage { path: String, message: String },

    /// An internal buildspec's default remote is private; its public mirror
    /// cannot be derived.
    #[error("default remote {remote} is not public")]
    PrivateDefault { remote: String },

    /// A work item was abandoned due to cancellation or deadline expiry.
    #[error("{branch}, {project}: cancelled before completion")]
    Cancelled { branch: String, project: String },

    /// The batch deadline expired.
    #[error("deadline exceeded during {operation}")]
    DeadlineExceeded { operation: String },

    /// One or more non-fatal per-item errors were collected over a batch.
    #[error("batch had {} error(s):\n{}", .errors.len(), .errors.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Batch { errors: Vec<Error> },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON (de)serialization error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// A version parsing error, wrapped from `semver::Error`.
    #[error("Version parsing error: {0}")]
    Semver(#[from] semver::Error),
}

impl Error {
    /// Whether the retry policy may re-attempt the failed operation.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transient { .. })
    }

    /// Process exit code for the enclosing CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config { .. }
            | Error::Yaml(_)
            | Error::Glob(_)
            | Error::UrlParse(_)
            | Error::Semver(_) => 1,
            Error::AuthSetup { .. } => 2,
            Error::Memo { .. } => 3,
            Error::Batch { .. } => 4,
            Error::ReferenceLoad { .. } => 5,
            _ => 1,
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
