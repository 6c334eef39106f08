use crate::{
    error::TippinServerError,
    model::{AddInvoiceParams, AddedInvoice, NodeCredentials},
};
use async_trait::async_trait;
use std::{
    fmt::{self, Formatter},
    sync::Arc,
};

pub mod lnd;

#[cfg(test)]
use mockall::automock;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait InvoiceNode: Send + Sync {
    async fn add_invoice(&self, params: AddInvoiceParams)
        -> Result<AddedInvoice, TippinServerError>;
}

/// Dials a node from credentials submitted by a visitor.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NodeConnector: Send + Sync {
    async fn connect(
        &self,
        credentials: &NodeCredentials,
    ) -> Result<Arc<dyn InvoiceNode>, TippinServerError>;
}

/// The node invoices are created on.
#[derive(Clone)]
pub enum NodeBinding {
    /// One client for the lifetime of the process.
    Shared(Arc<dyn InvoiceNode>),
    /// A fresh client for every submission.
    PerRequest(Arc<dyn NodeConnector>),
}

impl fmt::Display for NodeBinding {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shared(_) => write!(f, "shared node"),
            Self::PerRequest(_) => write!(f, "per-request node"),
        }
    }
}
