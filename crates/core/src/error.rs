use thiserror::Error;

use crate::model::{ExamError, SessionError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Exam(#[from] ExamError),
    #[error(transparent)]
    Session(#[from] SessionError),
}
