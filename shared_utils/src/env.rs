use thiserror::Error;

/// An environment variable required by the watcher is not set (or is blank).
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Missing environment variable: {0}")]
pub struct MissingEnvVarError(pub String);

/// Reads a required environment variable.
///
/// Blank values are reported the same way as unset ones: an empty API token
/// or server URL is never useful and only fails later with a worse message.
///
/// # Arguments
/// * `name` - The name of the environment variable to read.
pub fn get_env_var(name: &str) -> Result<String, MissingEnvVarError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(MissingEnvVarError(name.to_string())),
    }
}
