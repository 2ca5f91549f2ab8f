use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the session store, the task repository and the
/// remote client. Anything the view layer shows to the user is one of these;
/// command handlers wrap them in `anyhow` context on the way out.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{field} must not be empty")]
    Validation { field: &'static str },

    #[error("a user with email {email} already exists")]
    DuplicateUser { email: String },

    #[error("invalid email or password")]
    InvalidCredentials,

    /// A network failure or non-2xx response from the backend. `status` is
    /// `None` for transport errors that never produced a response.
    #[error("{}", remote_display(.status, .message))]
    Remote {
        status: Option<u16>,
        message: String,
    },

    /// A mutation (or load of durable state) could not be completed. Wraps
    /// the underlying remote or I/O failure as the source.
    #[error("persistence failure")]
    Persistence {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl Error {
    pub fn persistence(
        source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        Self::Persistence {
            source: source.into(),
        }
    }
}

fn remote_display(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("server returned {code}: {message}"),
        None => message.to_string(),
    }
}
