//! Domain error types.

/// Top-level error type for stockrank.
#[derive(Debug, thiserror::Error)]
pub enum RankError {
    #[error("data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("insufficient data for {symbol}: have {bars} bars, need {minimum}")]
    DataInsufficient {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("invalid price series for {symbol}: {reason}")]
    InvalidSeries { symbol: String, reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RankError {
    pub fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        RankError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Process exit status for this error category.
    pub fn exit_status(&self) -> u8 {
        match self {
            RankError::Io(_) => 1,
            RankError::ConfigParse { .. }
            | RankError::ConfigMissing { .. }
            | RankError::ConfigInvalid { .. }
            | RankError::UnknownStrategy(_) => 2,
            RankError::DataUnavailable { .. } | RankError::InvalidSeries { .. } => 3,
            RankError::DataInsufficient { .. } => 5,
        }
    }
}

impl From<&RankError> for std::process::ExitCode {
    fn from(err: &RankError) -> Self {
        std::process::ExitCode::from(err.exit_status())
    }
}
