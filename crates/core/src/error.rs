use thiserror::Error;

use crate::model::{ParseIdError, PayloadError, SlotKeyError, UnknownDomain};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error(transparent)]
    SlotKey(#[from] SlotKeyError),
    #[error(transparent)]
    SubjectId(#[from] ParseIdError),
    #[error(transparent)]
    Domain(#[from] UnknownDomain),
}
