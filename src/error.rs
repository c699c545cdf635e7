use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScopeError>;

/// Failure to queue a command. Both variants are programming errors: effect-producing
/// code ran outside of any managed turn, or inside a turn accumulating another command type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    #[error("no reactions scope is active on this thread")]
    NoScope,

    #[error("active reactions scope does not accumulate commands of type {queued}")]
    CommandTypeMismatch { queued: &'static str },
}
