//! CLI command implementations.

pub mod column_family;
pub mod compact;
pub mod kv;

use std::fmt;
use std::process::ExitCode;
use tidesdb_binding::{codes, BindingResult, Status, OK_MESSAGE};

/// What a command prints: `status message [value]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Status code, `0` on success.
    pub code: i32,
    /// Status message.
    pub message: String,
    /// Value printed after the message on success.
    pub value: Option<String>,
}

impl Reply {
    /// A successful reply without a value.
    pub fn ok() -> Self {
        Self {
            code: codes::OK,
            message: OK_MESSAGE.to_string(),
            value: None,
        }
    }

    /// A successful reply carrying a value.
    pub fn with_value(value: String) -> Self {
        Self {
            value: Some(value),
            ..Self::ok()
        }
    }

    /// Builds a reply from a result, rendering the value on success.
    pub fn from_result<T>(result: BindingResult<T>, render: impl FnOnce(T) -> Option<String>) -> Self {
        match result {
            Ok(value) => match render(value) {
                Some(value) => Self::with_value(value),
                None => Self::ok(),
            },
            Err(status) => status.into(),
        }
    }

    /// Returns true for status `0`.
    pub fn is_ok(&self) -> bool {
        self.code == codes::OK
    }

    /// Process exit code for this reply.
    pub fn exit_code(&self) -> ExitCode {
        if self.is_ok() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }
}

impl From<Status> for Reply {
    fn from(status: Status) -> Self {
        Self {
            code: status.code,
            message: status.message,
            value: None,
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.message)?;
        if let Some(value) = &self.value {
            write!(f, " {value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_status_line() {
        assert_eq!(Reply::ok().to_string(), "0 OK");
        assert_eq!(Reply::with_value("v".into()).to_string(), "0 OK v");
        let reply = Reply::from(Status::new(3, "key not found"));
        assert_eq!(reply.to_string(), "3 key not found");
        assert!(!reply.is_ok());
    }

    #[test]
    fn failed_result_drops_value() {
        let reply = Reply::from_result(Err::<String, _>(Status::new(6, "conflict")), Some);
        assert_eq!(reply.value, None);
        assert_eq!(reply.code, 6);
    }
}
