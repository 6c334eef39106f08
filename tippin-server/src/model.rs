use std::{fmt, net::SocketAddr};

use serde::Deserialize;
use tippin_core::{amount::Atoms, primitives::FormFields};

#[derive(Debug, Default, Deserialize)]
pub struct ActionQuery {
    pub action: Option<String>,
}

/// One submission of the invoice form.
#[derive(Debug, Clone, Default)]
pub struct InvoiceRequest {
    pub fields: FormFields,
    /// Only used when the faucet binds a node per request.
    pub credentials: Option<NodeCredentials>,
    pub remote_addr: Option<SocketAddr>,
}

impl InvoiceRequest {
    pub fn new(fields: FormFields) -> Self {
        Self {
            fields,
            ..Default::default()
        }
    }

    pub fn with_credentials(mut self, credentials: Option<NodeCredentials>) -> Self {
        self.credentials = credentials;
        self
    }

    pub const fn with_remote_addr(mut self, remote_addr: Option<SocketAddr>) -> Self {
        self.remote_addr = remote_addr;
        self
    }
}

/// Node address and credentials uploaded together with the form.
#[derive(Clone, PartialEq, Eq)]
pub struct NodeCredentials {
    pub node_url: String,
    /// PEM encoded TLS certificate of the node
    pub tls_cert: Vec<u8>,
    /// binary macaroon
    pub macaroon: Vec<u8>,
}

impl fmt::Debug for NodeCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeCredentials")
            .field("node_url", &self.node_url)
            .field("tls_cert", &format!("{} bytes", self.tls_cert.len()))
            .field("macaroon", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddInvoiceParams {
    /// unix timestamp in seconds
    pub creation_date: i64,
    pub value: Atoms,
    pub memo: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedInvoice {
    pub payment_request: String,
    pub add_index: u64,
    pub r_hash: Vec<u8>,
}
