use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("failed to read config file")]
    ReadFile,
    #[display("failed to parse config: {reason}")]
    Parse { reason: String },
    #[display("invalid config: {field}")]
    Validation { field: String },
    #[display("environment variable {var} is not set")]
    MissingSecret { var: String },
}

/// Malformed price input (empty, non-positive close, dates out of order).
#[derive(Debug, Display, Error, PartialEq)]
pub enum SeriesError {
    #[display("price series is empty")]
    Empty,
    #[display("close at index {index} is not a positive finite number")]
    NonPositiveClose { index: usize },
    #[display("date at index {index} does not strictly follow the previous one")]
    NonMonotonicDate { index: usize },
}

#[derive(Debug, Display, Error, PartialEq)]
pub enum IndicatorError {
    #[display("insufficient data: need {required}, got {available}")]
    InsufficientData { required: usize, available: usize },
    #[display("invalid parameter: {name}")]
    InvalidParameter { name: String },
}

#[derive(Debug, Display, Error, Clone, PartialEq)]
pub enum ProviderError {
    #[display("no price data found for {symbol}")]
    NotFound { symbol: String },
    #[display("price provider rate limited request for {symbol}")]
    RateLimited { symbol: String },
    #[display("network failure while fetching {symbol}")]
    Network { symbol: String },
    #[display("failed to parse price data for {symbol}")]
    ResponseParse { symbol: String },
    #[display("failed to build price provider client")]
    Client,
}

#[derive(Debug, Display, Error, Clone, PartialEq)]
pub enum NarrativeError {
    #[display("text generation service rejected credentials")]
    Authentication,
    #[display("text generation service rate limit exceeded")]
    RateLimited,
    #[display("text generation service returned a malformed response")]
    MalformedResponse,
    #[display("request to text generation service failed")]
    Request,
    #[display("text generation timed out after {secs}s")]
    Timeout { secs: u64 },
    #[display("text generation cancelled")]
    Cancelled,
}

/// Symbol-scoped failure recorded by the batch runner.
#[derive(Debug, Display, Error, Clone, PartialEq)]
pub enum AnalysisError {
    #[display("failed to fetch prices for {symbol}")]
    Fetch { symbol: String },
    #[display("invalid price series for {symbol}")]
    InvalidSeries { symbol: String },
    #[display("indicator computation failed for {symbol}")]
    Indicator { symbol: String },
}

#[derive(Debug, Display, Error)]
pub enum RenderError {
    #[display("failed to serialize report output")]
    Serialize,
    #[display("failed to write report output")]
    Write,
}
