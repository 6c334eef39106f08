use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use fedimint_tonic_lnd::ConnectError;

use thiserror::Error;
use tracing::{event, Level};

#[derive(Error, Debug)]
pub enum TippinServerError {
    #[error("LndConnectError - {0}")]
    ConnectError(ConnectError),

    #[error("Lnd rpc error {0}")]
    Rpc(#[from] fedimint_tonic_lnd::tonic::Status),

    #[error("Node did not answer within {0} seconds")]
    Timeout(u64),

    #[error("Invalid node url {0}")]
    InvalidNodeUrl(String),

    #[error("Node {0} is not in the list of allowed nodes")]
    NodeNotAllowed(String),

    #[error("Node credentials missing")]
    MissingCredentials,

    #[error("IO Error {0}")]
    Io(#[from] std::io::Error),

    #[error("Template Error {0}")]
    Render(#[from] askama::Error),

    #[error("Config Error {0}")]
    Config(String),
}

impl IntoResponse for TippinServerError {
    fn into_response(self) -> Response {
        event!(Level::ERROR, "error in faucet: {:?}", self);

        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}
