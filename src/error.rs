use thiserror::Error;

/// Failures at the WebDriver wire level.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("webdriver transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote end answered with a WebDriver error document.
    #[error("webdriver {error}: {message}")]
    Protocol { error: String, message: String },

    #[error("unexpected webdriver response: {0}")]
    Wire(String),
}

/// Run-level failure taxonomy. Each variant is fatal to the run except
/// where a component explicitly degrades instead of raising.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Missing or empty credentials. Raised before any session exists.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to initialize browser session after {attempts} attempt(s): {last}")]
    SessionInit { attempts: u32, last: String },

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("search page navigation failed: {0}")]
    Navigation(String),

    #[error("search execution failed: {0}")]
    Search(String),

    /// The row collection itself could not be resolved mid-run. Rows
    /// already upserted stay committed.
    #[error("result extraction failed: {0}")]
    Extraction(String),

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("record store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("export failed: {0}")]
    Export(String),
}
