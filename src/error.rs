use crate::locking::owner::OwnerId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeadboltError {
    #[error("lock '{0}' is not registered")]
    NotFound(String),

    #[error("lock '{0}' is already registered")]
    DuplicateIdentity(String),

    #[error("lock '{name}' is busy: {details}")]
    LockBusy { name: String, details: String },

    #[error("{owner} does not hold lock '{name}'")]
    NotHolder { name: String, owner: OwnerId },

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("System error: {0}")]
    SystemError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DeadboltError>;

pub fn get_exit_code(error: &DeadboltError) -> i32 {
    match error {
        DeadboltError::ConfigError(_) => 2,

        DeadboltError::NotFound(_) => 4,

        DeadboltError::NotHolder { .. } => 5,

        DeadboltError::LockBusy { .. } => 16,

        DeadboltError::DuplicateIdentity(_) => 17,

        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_distinguish_misuse_from_contention() {
        assert_eq!(get_exit_code(&DeadboltError::ConfigError("bad".into())), 2);
        assert_eq!(get_exit_code(&DeadboltError::NotFound("x".into())), 4);
        assert_eq!(
            get_exit_code(&DeadboltError::LockBusy {
                name: "x".into(),
                details: String::new()
            }),
            16
        );
        assert_eq!(
            get_exit_code(&DeadboltError::DuplicateIdentity("x".into())),
            17
        );
    }
}
