//! Error types for SMIB

use std::path::PathBuf;
use thiserror::Error;

/// Result type for SMIB operations
pub type Result<T> = std::result::Result<T, SmibError>;

/// Main error type for SMIB
#[derive(Error, Debug)]
pub enum SmibError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Chat transport errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Command resolution and launch errors
    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    /// Message dispatch errors
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing required configuration: {0}")]
    Missing(String),
}

/// Chat transport errors
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Failed to send message: {0}")]
    SendFailed(String),

    #[error("Channel connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed for channel: {0}")]
    AuthenticationFailed(String),

    #[error("Lookup failed: {0}")]
    LookupFailed(String),

    #[error("API error from {method}: {error}")]
    Api { method: String, error: String },
}

/// Errors from resolving or launching a command.
#[derive(Error, Debug)]
pub enum CommandError {
    /// No entry in the command directory matches the name
    #[error("command '{0}' not found")]
    NotFound(String),

    /// Several entries match the name and none matches exactly
    #[error("command '{name}' was not unique")]
    NotUnique { name: String, commands: Vec<String> },

    /// The command directory could not be listed
    #[error("error listing command directory: {0}")]
    ListDir(#[source] std::io::Error),

    /// The resolved executable failed to start
    #[error("failed to start command '{command}': {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

impl CommandError {
    /// Candidate commands of a `NotUnique` error, space-joined and truncated
    /// to their base names. Empty for every other variant.
    pub fn commands(&self) -> String {
        match self {
            CommandError::NotUnique { commands, .. } => commands
                .iter()
                .map(|file| crate::command::base_name(file))
                .collect::<Vec<_>>()
                .join(" "),
            _ => String::new(),
        }
    }
}

/// Outcome of dispatching one chat message, when it did not succeed.
///
/// `NotFound` and `NotUnique` are answered in chat and never escape
/// [`crate::Dispatcher::handle_message`]; the remaining variants are
/// returned to the caller for logging.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("command '{name}' not found")]
    NotFound { name: String },

    #[error("command was not unique, candidates: {candidates}")]
    NotUnique { candidates: String },

    #[error("failed to run command: {0}")]
    Execution(#[source] CommandError),

    #[error("failed to read output from command: {0}")]
    Read(#[source] std::io::Error),

    #[error("chat lookup failed: {0}")]
    Chat(#[source] Box<SmibError>),
}

impl From<CommandError> for DispatchError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::NotFound(name) => DispatchError::NotFound { name },
            err @ CommandError::NotUnique { .. } => DispatchError::NotUnique {
                candidates: err.commands(),
            },
            err @ (CommandError::ListDir(_) | CommandError::Launch { .. }) => {
                DispatchError::Execution(err)
            }
        }
    }
}

impl From<serde_json::Error> for SmibError {
    fn from(err: serde_json::Error) -> Self {
        SmibError::Other(format!("JSON error: {}", err))
    }
}

impl From<reqwest::Error> for ChannelError {
    fn from(err: reqwest::Error) -> Self {
        ChannelError::ConnectionFailed(err.to_string())
    }
}

impl From<reqwest::Error> for SmibError {
    fn from(err: reqwest::Error) -> Self {
        SmibError::Channel(ChannelError::from(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CommandError::NotFound("badcommand".to_string());
        assert_eq!(err.to_string(), "command 'badcommand' not found");
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let smib_err: SmibError = io_err.into();
        assert!(matches!(smib_err, SmibError::Io(_)));
    }

    #[test]
    fn test_not_unique_commands() {
        let err = CommandError::NotUnique {
            name: "command".to_string(),
            commands: vec!["commandone.sh".to_string(), "commandtwo.sh".to_string()],
        };
        assert_eq!(err.commands(), "commandone commandtwo");
    }

    #[test]
    fn test_not_unique_empty_commands() {
        let err = CommandError::NotUnique {
            name: "c".to_string(),
            commands: vec![],
        };
        assert_eq!(err.commands(), "");
    }

    #[test]
    fn test_dispatch_classification() {
        let err: DispatchError = CommandError::NotFound("x".to_string()).into();
        assert!(matches!(err, DispatchError::NotFound { ref name } if name == "x"));

        let err: DispatchError = CommandError::NotUnique {
            name: "c".to_string(),
            commands: vec!["commands".to_string(), "countdown.py".to_string()],
        }
        .into();
        assert!(
            matches!(err, DispatchError::NotUnique { ref candidates } if candidates == "commands countdown")
        );

        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: DispatchError = CommandError::Launch {
            command: "crash.sh".to_string(),
            source: io_err,
        }
        .into();
        assert!(matches!(err, DispatchError::Execution(_)));
    }

    #[test]
    fn test_launch_error_hides_directory() {
        let err = CommandError::Launch {
            command: "crash.sh".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.to_string(), "failed to start command 'crash.sh': denied");
    }
}
