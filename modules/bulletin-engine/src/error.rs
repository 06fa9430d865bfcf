use bulletin_common::EventId;

#[derive(Debug, thiserror::Error)]
pub enum EnactError {
    /// The caller broke the validate-then-enact contract.
    #[error("precondition violated: {0}")]
    Precondition(String),

    #[error("id space exhausted: cannot assign an id after {0}")]
    IdSpaceExhausted(EventId),
}
