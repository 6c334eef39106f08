use std::{
    fmt::{self, Formatter},
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    error::TippinServerError,
    model::{AddInvoiceParams, AddedInvoice, NodeCredentials},
};
use async_trait::async_trait;
use clap::Parser;
use fedimint_tonic_lnd::Client;
use tempfile::NamedTempFile;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tracing::{info, warn};
use url::Url;

use super::{InvoiceNode, NodeConnector};

#[derive(Debug, Clone, Default, Parser)]
pub struct LndNodeSettings {
    #[clap(long, env = "TIPPIN_LND_GRPC_HOST")]
    pub grpc_host: Option<Url>,

    #[clap(long, env = "TIPPIN_LND_TLS_CERT_PATH")]
    pub tls_cert_path: Option<PathBuf>,

    #[clap(long, env = "TIPPIN_LND_MACAROON_PATH")]
    pub macaroon_path: Option<PathBuf>,
}

impl fmt::Display for LndNodeSettings {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "grpc_host: {}, tls_cert_path: {}, macaroon_path: {}",
            self.grpc_host
                .as_ref()
                .map(Url::as_str)
                .unwrap_or("<not set>"),
            self.tls_cert_path
                .as_deref()
                .and_then(Path::to_str)
                .unwrap_or("<not set>"),
            self.macaroon_path
                .as_deref()
                .and_then(Path::to_str)
                .unwrap_or("<not set>"),
        )
    }
}

pub struct LndNode(Arc<Mutex<Client>>);

impl LndNode {
    pub async fn new(
        address: Url,
        cert_file: &PathBuf,
        macaroon_file: &PathBuf,
    ) -> Result<Self, TippinServerError> {
        let client =
            fedimint_tonic_lnd::connect(address.to_string(), cert_file, macaroon_file).await;

        Ok(Self(Arc::new(Mutex::new(
            client.map_err(TippinServerError::ConnectError)?,
        ))))
    }

    pub async fn from_settings(settings: &LndNodeSettings) -> Result<Self, TippinServerError> {
        match settings {
            LndNodeSettings {
                grpc_host: Some(grpc_host),
                tls_cert_path: Some(tls_cert_path),
                macaroon_path: Some(macaroon_path),
            } => Self::new(grpc_host.clone(), tls_cert_path, macaroon_path).await,
            _ => Err(TippinServerError::Config(format!(
                "lnd grpc host, tls cert and macaroon are required for the default node: {settings}"
            ))),
        }
    }

    pub async fn client_lock(
        &self,
    ) -> Result<MappedMutexGuard<'_, fedimint_tonic_lnd::LightningClient>, TippinServerError> {
        let guard = self.0.lock().await;
        Ok(MutexGuard::map(guard, |client| client.lightning()))
    }
}

#[async_trait]
impl InvoiceNode for LndNode {
    async fn add_invoice(
        &self,
        params: AddInvoiceParams,
    ) -> Result<AddedInvoice, TippinServerError> {
        let invoice_request = fedimint_tonic_lnd::lnrpc::Invoice {
            creation_date: params.creation_date,
            value: params.value.0 as i64,
            memo: params.memo,
            ..Default::default()
        };

        let invoice = self
            .client_lock()
            .await?
            .add_invoice(fedimint_tonic_lnd::tonic::Request::new(invoice_request))
            .await?
            .into_inner();

        Ok(AddedInvoice {
            payment_request: invoice.payment_request,
            add_index: invoice.add_index,
            r_hash: invoice.r_hash,
        })
    }
}

/// Connects to nodes submitted through the form, restricted to an allow-list of hosts.
pub struct LndConnector {
    allowed_hosts: Vec<String>,
}

impl LndConnector {
    pub fn new(allowed_hosts: Vec<String>) -> Self {
        Self { allowed_hosts }
    }

    /// Parses the submitted node url, `host:port` without a scheme is read as https.
    pub fn node_url(&self, raw: &str) -> Result<Url, TippinServerError> {
        let raw = raw.trim();
        let with_scheme = if raw.contains("://") {
            raw.to_owned()
        } else {
            format!("https://{raw}")
        };

        let url = Url::parse(&with_scheme)
            .map_err(|_| TippinServerError::InvalidNodeUrl(raw.to_owned()))?;
        if url.scheme() != "https" {
            return Err(TippinServerError::InvalidNodeUrl(raw.to_owned()));
        }

        let host = url
            .host_str()
            .ok_or_else(|| TippinServerError::InvalidNodeUrl(raw.to_owned()))?;
        if !self
            .allowed_hosts
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(host))
        {
            return Err(TippinServerError::NodeNotAllowed(host.to_owned()));
        }
        Ok(url)
    }
}

#[async_trait]
impl NodeConnector for LndConnector {
    async fn connect(
        &self,
        credentials: &NodeCredentials,
    ) -> Result<Arc<dyn InvoiceNode>, TippinServerError> {
        let url = self.node_url(&credentials.node_url).inspect_err(|err| {
            warn!("rejected node {}: {}", credentials.node_url, err);
        })?;
        if credentials.tls_cert.is_empty() || credentials.macaroon.is_empty() {
            return Err(TippinServerError::MissingCredentials);
        }

        // the lnd client only loads credentials from files
        let cert_file = write_temp_file(&credentials.tls_cert)?;
        let macaroon_file = write_temp_file(&credentials.macaroon)?;

        let node = LndNode::new(
            url.clone(),
            &cert_file.path().to_path_buf(),
            &macaroon_file.path().to_path_buf(),
        )
        .await?;
        info!("connected to node {}", url);
        Ok(Arc::new(node))
    }
}

fn write_temp_file(content: &[u8]) -> Result<NamedTempFile, TippinServerError> {
    let mut file = NamedTempFile::new()?;
    file.write_all(content)?;
    file.flush()?;
    Ok(file)
}
