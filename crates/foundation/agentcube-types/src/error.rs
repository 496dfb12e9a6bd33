/// The closed error taxonomy of §7, shared across every crate so that a
/// `K8sAdapterError`, a `DaemonError`, and a `RouterError` all map onto the
/// same small, stable set of categories and HTTP status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ErrorCategory {
    #[error("configuration")]
    Configuration,
    #[error("not found")]
    NotFound,
    #[error("unauthorized")]
    Unauthorized,
    #[error("conflict")]
    Conflict,
    #[error("rate limit")]
    RateLimit,
    #[error("provider")]
    Provider,
    #[error("timeout")]
    Timeout,
    #[error("resource")]
    Resource,
}

impl ErrorCategory {
    /// The HTTP status code this category maps onto (§7).
    #[must_use]
    pub fn http_status(self) -> u16 {
        match self {
            Self::Configuration => 400,
            Self::NotFound => 404,
            Self::Unauthorized => 401,
            Self::Conflict => 409,
            Self::RateLimit => 429,
            Self::Provider => 502,
            Self::Timeout => 504,
            Self::Resource => 500,
        }
    }
}
