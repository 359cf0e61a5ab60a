use thiserror::Error;
use tickterm_core::OrchestratorError;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Command(#[from] OrchestratorError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Command(
                OrchestratorError::Parse(_) | OrchestratorError::Store(_),
            ) => 2,
            Self::Command(
                OrchestratorError::NotFound { .. }
                | OrchestratorError::InvalidKey { .. }
                | OrchestratorError::DataUnavailable { .. },
            ) => 3,
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use tickterm_core::ParseError;

    use super::*;

    #[test]
    fn exit_codes_follow_error_category() {
        let parse = CliError::from(OrchestratorError::Parse(ParseError::UnknownCommand {
            verb: String::from("ZZ"),
        }));
        assert_eq!(parse.exit_code(), 2);

        let data = CliError::from(OrchestratorError::NotFound {
            subject: String::from("NOPE"),
        });
        assert_eq!(data.exit_code(), 3);

        let io = CliError::from(std::io::Error::other("closed"));
        assert_eq!(io.exit_code(), 10);
    }
}
