//! Matching command names against the command directory

use super::{base_name, process, CallerContext, CommandInvocation, CommandRunner, OutputHandle};
use crate::error::CommandError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// A file in the command directory selected for one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    pub file_name: String,
}

/// A flat directory of command executables
#[derive(Debug, Clone)]
pub struct CommandDirectory {
    dir: PathBuf,
}

impl CommandDirectory {
    /// Create a new command directory; nothing is read until a command runs
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// File names of the regular entries, sorted by name
    async fn entries(&self) -> Result<Vec<String>, CommandError> {
        let mut read_dir = fs::read_dir(&self.dir).await.map_err(|e| {
            warn!("Error listing command directory '{}': {}", self.dir.display(), e);
            CommandError::ListDir(e)
        })?;

        let mut files = Vec::new();
        while let Some(entry) = read_dir.next_entry().await.map_err(CommandError::ListDir)? {
            let file_type = entry.file_type().await.map_err(CommandError::ListDir)?;
            if file_type.is_dir() {
                continue;
            }

            match entry.file_name().into_string() {
                Ok(name) => files.push(name),
                Err(name) => debug!("Skipping non UTF-8 command file {:?}", name),
            }
        }

        files.sort();
        Ok(files)
    }

    /// Select the file to run for `name`.
    ///
    /// A file whose base name equals `name` wins outright. Otherwise exactly
    /// one file's base name must start with `name`.
    pub async fn resolve(&self, name: &str) -> Result<ResolvedCommand, CommandError> {
        let mut commands = Vec::new();

        for file_name in self.entries().await? {
            let base = base_name(&file_name);
            if base == name {
                return Ok(ResolvedCommand { file_name });
            }
            if base.starts_with(name) {
                commands.push(file_name);
            }
        }

        match commands.len() {
            0 => Err(CommandError::NotFound(name.to_string())),
            1 => Ok(ResolvedCommand {
                file_name: commands.remove(0),
            }),
            _ => Err(CommandError::NotUnique {
                name: name.to_string(),
                commands,
            }),
        }
    }

    /// Base names of every invocable command, sorted and deduplicated
    pub async fn list(&self) -> Result<Vec<String>, CommandError> {
        let mut names: Vec<String> = self
            .entries()
            .await?
            .iter()
            .map(|file| base_name(file))
            .filter(|base| !base.is_empty())
            .map(str::to_string)
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }
}

#[async_trait]
impl CommandRunner for CommandDirectory {
    async fn run(
        &self,
        invocation: &CommandInvocation,
        caller: &CallerContext,
    ) -> Result<OutputHandle, CommandError> {
        let resolved = self.resolve(&invocation.name).await?;
        process::launch(&self.dir, &resolved, invocation, caller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command_dir(files: &[&str]) -> (tempfile::TempDir, CommandDirectory) {
        let dir = tempfile::tempdir().unwrap();
        for file in files {
            std::fs::write(dir.path().join(file), "#!/bin/sh\n").unwrap();
        }
        let commands = CommandDirectory::new(dir.path());
        (dir, commands)
    }

    #[tokio::test]
    async fn test_resolve_unique_prefix() {
        let (_dir, commands) = command_dir(&["countdown.sh", "webcam.py"]);
        let resolved = commands.resolve("count").await.unwrap();
        assert_eq!(resolved.file_name, "countdown.sh");
    }

    #[tokio::test]
    async fn test_resolve_exact_match_wins() {
        let (_dir, commands) = command_dir(&["command.sh", "commandone.sh", "commandtwo.sh"]);
        let resolved = commands.resolve("command").await.unwrap();
        assert_eq!(resolved.file_name, "command.sh");
    }

    #[tokio::test]
    async fn test_resolve_exact_match_without_extension() {
        let (_dir, commands) = command_dir(&["commandone.sh", "command"]);
        let resolved = commands.resolve("command").await.unwrap();
        assert_eq!(resolved.file_name, "command");
    }

    #[tokio::test]
    async fn test_resolve_not_unique() {
        let (_dir, commands) = command_dir(&["commandtwo.sh", "commandone.sh"]);
        let err = commands.resolve("command").await.unwrap_err();
        match &err {
            CommandError::NotUnique { name, commands } => {
                assert_eq!(name, "command");
                assert_eq!(commands, &vec!["commandone.sh".to_string(), "commandtwo.sh".to_string()]);
            }
            other => panic!("expected NotUnique, got {:?}", other),
        }
        assert_eq!(err.commands(), "commandone commandtwo");
    }

    #[tokio::test]
    async fn test_resolve_not_unique_sorted_by_file_name() {
        let (_dir, commands) =
            command_dir(&["cmdc.sh", "cmda.py", "cmde", "cmdb.sh", "cmdd.rb", "other.sh"]);
        let err = commands.resolve("cmd").await.unwrap_err();
        assert_eq!(err.commands(), "cmda cmdb cmdc cmdd cmde");
    }

    #[tokio::test]
    async fn test_resolve_not_found() {
        let (_dir, commands) = command_dir(&["webcam.py"]);
        let err = commands.resolve("countdown").await.unwrap_err();
        assert!(matches!(err, CommandError::NotFound(ref name) if name == "countdown"));
    }

    #[tokio::test]
    async fn test_resolve_empty_directory() {
        let (_dir, commands) = command_dir(&[]);
        let err = commands.resolve("anything").await.unwrap_err();
        assert!(matches!(err, CommandError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_resolve_skips_directories() {
        let (dir, commands) = command_dir(&["countdown.sh"]);
        std::fs::create_dir(dir.path().join("countries")).unwrap();
        let resolved = commands.resolve("count").await.unwrap();
        assert_eq!(resolved.file_name, "countdown.sh");
    }

    #[tokio::test]
    async fn test_resolve_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let commands = CommandDirectory::new(dir.path().join("missing"));
        let err = commands.resolve("countdown").await.unwrap_err();
        assert!(matches!(err, CommandError::ListDir(_)));
    }

    #[tokio::test]
    async fn test_list_commands() {
        let (dir, commands) = command_dir(&["webcam.py", "countdown.sh", "countdown.txt", ".hidden"]);
        std::fs::create_dir(dir.path().join("lib")).unwrap();
        let names = commands.list().await.unwrap();
        assert_eq!(names, vec!["countdown".to_string(), "webcam".to_string()]);
    }
}
