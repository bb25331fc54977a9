use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqlProcError {
    /// Error raised by the database server itself (constraint violations, missing
    /// procedures, RAISERROR, ...). `number` is the server's error number.
    #[error("Server error {number} (state {state}, class {class}): {message}")]
    Server {
        number: u32,
        state: u8,
        class: u8,
        message: String,
    },

    #[cfg(feature = "mssql")]
    #[error(transparent)]
    MssqlError(#[from] tiberius::error::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Transaction error: {0}")]
    TransactionError(String),

    /// Failure while running a stored procedure, decorated with the procedure name.
    #[error("Error executing stored procedure '{procedure}': {source}")]
    Procedure {
        procedure: String,
        #[source]
        source: Box<SqlProcError>,
    },
}

impl SqlProcError {
    /// Server error number, looking through `Procedure` wrappers.
    #[must_use]
    pub fn server_number(&self) -> Option<u32> {
        match self {
            SqlProcError::Server { number, .. } => Some(*number),
            #[cfg(feature = "mssql")]
            SqlProcError::MssqlError(tiberius::error::Error::Server(token)) => Some(token.code()),
            SqlProcError::Procedure { source, .. } => source.server_number(),
            _ => None,
        }
    }

    /// Wrap an error with the name of the procedure that produced it.
    #[must_use]
    pub fn in_procedure(self, procedure: &str) -> Self {
        SqlProcError::Procedure {
            procedure: procedure.to_string(),
            source: Box::new(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn procedure_wrapper_keeps_source_text() {
        let err = SqlProcError::ExecutionError("deadlock victim".into()).in_procedure("sp_Save");
        let msg = err.to_string();
        assert!(msg.contains("sp_Save"));
        assert!(msg.contains("deadlock victim"));
    }

    #[test]
    fn server_number_looks_through_wrapper() {
        let err = SqlProcError::Server {
            number: 547,
            state: 0,
            class: 16,
            message: "The DELETE statement conflicted with the REFERENCE constraint".into(),
        }
        .in_procedure("sp_DeleteUser");
        assert_eq!(err.server_number(), Some(547));
        assert_eq!(SqlProcError::ConfigError("x".into()).server_number(), None);
    }
}
