use thiserror::Error;

use crate::checks::Check;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PerceiverError {
    #[error("check type \"{0}\" not implemented")]
    UnregisteredCheck(Check),
}
