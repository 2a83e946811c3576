use reqwest::StatusCode;
use thiserror::Error;

/// A request never produced a response.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Network unreachable: {0}")]
    Unreachable(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Why a loader operation failed.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("No data available for {0}")]
    NoData(String),

    #[error("Request to {url} failed with status {status}")]
    Status { url: String, status: StatusCode },

    #[error("Failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("Invalid response from {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl LoadError {
    pub fn from_status(url: &str, status: StatusCode) -> Self {
        LoadError::Status {
            url: url.to_string(),
            status,
        }
    }

    /// Short text for the error panel.
    pub fn user_message(&self) -> String {
        match self {
            LoadError::NoData(resort) => format!("No data available for {}", resort),
            LoadError::Status { status, .. } if *status == StatusCode::NOT_FOUND => {
                "No report was published for this date.".to_string()
            }
            LoadError::Status { status, .. } => {
                format!("The server returned an error ({}).", status.as_u16())
            }
            LoadError::Fetch { .. } => {
                "Unable to load data. Check your connection and pull to refresh.".to_string()
            }
            LoadError::Parse { .. } => "The report could not be read.".to_string(),
        }
    }
}
