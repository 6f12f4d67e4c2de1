//! Collecting secret values from the environment and secrets files.

use runguard_redact::{FilterError, SecretSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::cli::SecretArgs;

/// Errors raised while loading secrets.
#[derive(Debug, Error)]
pub enum SecretsError {
    /// The secrets file could not be read.
    #[error("failed to read secrets file {}: {source}", path.display())]
    Read {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The secrets file is not a JSON array of strings.
    #[error("invalid secrets file {}: {source}", path.display())]
    Parse {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// The secret set could not be built.
    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// Read a JSON array of secret values.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
pub fn read_secrets_file(path: &Path) -> Result<Vec<String>, SecretsError> {
    let content = std::fs::read_to_string(path).map_err(|source| SecretsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| SecretsError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Values of the named environment variables. Unset variables are skipped.
pub fn env_secrets<F>(names: &[String], lookup: F) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    names
        .iter()
        .filter(|name| !name.is_empty())
        .filter_map(|name| {
            let value = lookup(name);
            if value.is_none() {
                tracing::warn!(env = %name, "Secret environment variable is not set");
            }
            value
        })
        .collect()
}

/// Build the secret set described by `args`.
///
/// # Errors
/// Returns an error if the secrets file is unusable.
pub fn load_secrets(args: &SecretArgs) -> Result<Arc<SecretSet>, SecretsError> {
    let mut values = env_secrets(&args.secret_envs, |name| std::env::var(name).ok());
    if let Some(path) = &args.secrets_file {
        values.extend(read_secrets_file(path)?);
    }

    let secrets = SecretSet::new(values)?;
    tracing::debug!(count = secrets.len(), "Loaded secrets");
    Ok(Arc::new(secrets))
}
