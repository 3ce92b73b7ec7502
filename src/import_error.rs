#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Page {page}: title not recognised: {title}")]
    UnrecognisedTitle { page: usize, title: String },
    #[error("Page {page}: no Date/Time column pair in header")]
    NoTimeBase { page: usize },
    #[error("Page {page}: no observed or predicted data columns in header")]
    NoDataColumns { page: usize },
}
