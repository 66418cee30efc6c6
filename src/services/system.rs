//! Host program discovery

use std::{
    env,
    path::{Path, PathBuf},
};
use tokio::process::Command;
use tracing::info;

/// Check that `program` can be executed on this host
pub async fn check_program_available(program: &str) -> Result<(), String> {
    Command::new(program)
        .arg("--version")
        .output()
        .await
        .map_err(|_| format!("{} is not available on this host", program))?;

    info!("{} is available", program);
    Ok(())
}

/// Resolve `program` the way a shell would, without running it
pub fn find_on_path(program: &str) -> Result<PathBuf, String> {
    let candidate = Path::new(program);
    if candidate.is_absolute() || program.contains(std::path::MAIN_SEPARATOR) {
        return if candidate.is_file() {
            Ok(candidate.to_path_buf())
        } else {
            Err(format!("{} does not exist", program))
        };
    }

    let path = env::var_os("PATH").ok_or_else(|| "PATH is not set".to_string())?;
    env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|full| full.is_file())
        .ok_or_else(|| format!("{} was not found on PATH", program))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_finds_standard_program() {
        let path = find_on_path("sh").unwrap();
        assert!(path.ends_with("sh"));
    }

    #[test]
    fn test_missing_program() {
        assert!(find_on_path("rest-timer-no-such-program").is_err());
        assert!(find_on_path("/no/such/dir/player").is_err());
    }

    #[tokio::test]
    async fn test_check_missing_program() {
        let err = check_program_available("rest-timer-no-such-program").await.unwrap_err();
        assert!(err.contains("not available"));
    }
}
