//! Error conditions callers may want to match on.
//!
//! Everything else is propagated as plain `anyhow::Error` with context.

/// Typed failures of the transformer, the resolver and the wrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShimError {
    /// A manifest field required by the operation is absent.
    MissingField(String),
    /// The dependency to relocate is not listed under `dependencies`.
    MissingDependency(String),
    /// No download URL is configured for the platform key.
    UnsupportedPlatform {
        key: String,
        supported: Vec<String>,
    },
    /// The archive was extracted but the named binary is not where it should be.
    BinaryNotFound { name: String, path: String },
    /// One or more release URLs could not be fetched.
    UnreachableUrls(Vec<String>),
}

impl std::fmt::Display for ShimError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShimError::MissingField(field) => {
                write!(f, "Manifest is missing required field \"{}\"", field)
            }
            ShimError::MissingDependency(name) => {
                write!(f, "Dependency \"{}\" is not listed in \"dependencies\"", name)
            }
            ShimError::UnsupportedPlatform { key, supported } => {
                write!(
                    f,
                    "Unsupported platform: {}. Supported platforms: {}",
                    key,
                    supported.join(", ")
                )
            }
            ShimError::BinaryNotFound { name, path } => {
                write!(f, "Binary \"{}\" not found at {}", name, path)
            }
            ShimError::UnreachableUrls(urls) => {
                write!(f, "Unreachable release URLs: {}", urls.join(", "))
            }
        }
    }
}

impl std::error::Error for ShimError {}
