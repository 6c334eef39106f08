use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum TippinCoreError {
    #[error("Amount is not a number: {0}")]
    AmountNotNumber(String),

    #[error("Amount is negative: {0}")]
    NegativeAmount(String),
}
