//! Handler reference parsing.
//!
//! A handler is either a plain command looked up by the shell (`rev`,
//! `echo`) or a `file:entry` pair naming a script inside the function
//! directory (`reverser.sh:main`). The entry part is kept as a label only.

use crate::error::ConfigurationError;
use std::fmt;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Executable {
    /// Resolved by the shell, typically through `PATH`.
    Command(String),
    /// A script or binary inside the function directory.
    Script(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerReference {
    executable: Executable,
    entry: Option<String>,
}

impl HandlerReference {
    /// Parse `handler` and resolve it against `function_dir`.
    pub fn resolve(
        handler: &str,
        function_dir: Option<&Path>,
    ) -> Result<Self, ConfigurationError> {
        let handler = handler.trim();
        if handler.is_empty() {
            return Err(ConfigurationError::EmptyHandler);
        }

        let (target, entry) = split_entry(handler);

        let executable = match function_dir.map(|dir| dir.join(target)) {
            Some(path) if path.is_file() => {
                ensure_executable(&path)?;
                Executable::Script(path)
            }
            _ => Executable::Command(target.to_string()),
        };

        Ok(Self {
            executable,
            entry: entry.map(str::to_string),
        })
    }

    pub fn executable(&self) -> &Executable {
        &self.executable
    }

    pub fn entry(&self) -> Option<&str> {
        self.entry.as_deref()
    }

    /// Shell command line for one invocation with the resolved `arguments`.
    ///
    /// Arguments are appended verbatim; splitting and quoting are left to the shell.
    pub fn command_line(&self, arguments: &str) -> String {
        let mut line = match &self.executable {
            Executable::Command(command) => command.clone(),
            Executable::Script(path) => shell_escape(&path.to_string_lossy()),
        };
        if !arguments.is_empty() {
            line.push(' ');
            line.push_str(arguments);
        }
        line
    }
}

impl fmt::Display for HandlerReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.executable {
            Executable::Command(command) => write!(f, "{}", command)?,
            Executable::Script(path) => write!(f, "{}", path.display())?,
        }
        if let Some(entry) = &self.entry {
            write!(f, ":{}", entry)?;
        }
        Ok(())
    }
}

/// Split `file:entry`, leaving command lines such as `echo a:b` intact.
fn split_entry(handler: &str) -> (&str, Option<&str>) {
    match handler.rsplit_once(':') {
        Some((target, entry))
            if !target.is_empty()
                && !entry.is_empty()
                && !target.contains(char::is_whitespace)
                && !entry.contains(|c: char| c.is_whitespace() || c == '/') =>
        {
            (target, Some(entry))
        }
        _ => (handler, None),
    }
}

#[cfg(unix)]
fn ensure_executable(path: &Path) -> Result<(), ConfigurationError> {
    let metadata = path
        .metadata()
        .map_err(|source| ConfigurationError::HandlerInspection {
            path: path.to_path_buf(),
            source,
        })?;
    if metadata.permissions().mode() & 0o111 == 0 {
        return Err(ConfigurationError::HandlerNotExecutable {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

#[cfg(not(unix))]
fn ensure_executable(_path: &Path) -> Result<(), ConfigurationError> {
    Ok(())
}

fn shell_escape(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }
    let escaped = arg.replace('\'', "'\\''");
    format!("'{}'", escaped)
}
