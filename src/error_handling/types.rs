use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    BadPort(String),
    BadTimeout(String),
    NotInRange(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::BadPort(e) => write!(f, "Port configuration error: {}", e),
            ConfigError::BadTimeout(e) => write!(f, "Timeout configuration error: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Errors surfaced by the session record store.
///
/// `NotFound` is a normal outcome ("this session does not exist") and is
/// never treated as a store fault. `Unavailable` means the backing store
/// cannot be reached and poisons any operation that needs it.
#[derive(Debug)]
pub enum StoreError {
    NotFound,
    Unavailable(String),
    Serialization(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound => write!(f, "Session not found"),
            StoreError::Unavailable(e) => write!(f, "Record store unavailable: {}", e),
            StoreError::Serialization(e) => write!(f, "Record serialization error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Errors from the cluster resource manager.
///
/// There is no internal retry behind these: retry policy belongs to the
/// caller, which knows whether partially applied state makes a retry safe.
#[derive(Debug)]
pub enum ClusterError {
    /// An object with the requested name already exists. Deterministic
    /// naming makes a second create for the same session id fail here
    /// instead of corrupting state.
    Conflict(String),
    CreateFailed(String),
    NotFound(String),
    ApiError(String),
}

impl fmt::Display for ClusterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterError::Conflict(name) => write!(f, "Cluster object already exists: {}", name),
            ClusterError::CreateFailed(e) => write!(f, "Cluster object creation failed: {}", e),
            ClusterError::NotFound(name) => write!(f, "Cluster object not found: {}", name),
            ClusterError::ApiError(e) => write!(f, "Cluster API error: {}", e),
        }
    }
}

impl std::error::Error for ClusterError {}

/// Errors from the readiness waiter. Creation failures elsewhere in
/// provisioning are recorded on the session itself rather than raised.
#[derive(Debug)]
pub enum ProvisionError {
    /// Readiness deadline elapsed; carries the last observed probe error.
    ReadinessTimeout(String),
}

impl fmt::Display for ProvisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionError::ReadinessTimeout(e) => {
                write!(f, "Timed out waiting for readiness: {}", e)
            }
        }
    }
}

impl std::error::Error for ProvisionError {}

#[derive(Debug)]
pub enum WebError {
    BindFailed(String),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::BindFailed(e) => write!(f, "Web server bind failed: {}", e),
        }
    }
}

impl std::error::Error for WebError {}

#[derive(Debug)]
pub enum ControllerError {
    Config(ConfigError),
    Store(StoreError),
    Cluster(ClusterError),
    Web(WebError),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::Config(e) => write!(f, "Configuration error: {}", e),
            ControllerError::Store(e) => write!(f, "Store error: {}", e),
            ControllerError::Cluster(e) => write!(f, "Cluster error: {}", e),
            ControllerError::Web(e) => write!(f, "Web error: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<ConfigError> for ControllerError {
    fn from(err: ConfigError) -> Self {
        ControllerError::Config(err)
    }
}

impl From<StoreError> for ControllerError {
    fn from(err: StoreError) -> Self {
        ControllerError::Store(err)
    }
}

impl From<ClusterError> for ControllerError {
    fn from(err: ClusterError) -> Self {
        ControllerError::Cluster(err)
    }
}

impl From<WebError> for ControllerError {
    fn from(err: WebError) -> Self {
        ControllerError::Web(err)
    }
}
