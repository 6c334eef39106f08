use std::sync::Arc;

use tracing::warn;

use crate::{
    config::{BuildParams, NodeBindingVariant, TippinConfig},
    error::TippinServerError,
    handler::InvoiceRequestHandler,
    node::{
        lnd::{LndConnector, LndNode},
        NodeBinding,
    },
};

/// State shared by all routes of the faucet.
#[derive(Clone)]
pub struct Tippin {
    pub handler: Arc<InvoiceRequestHandler>,
    pub config: TippinConfig,
    pub build_params: BuildParams,
}

impl Tippin {
    pub fn new(
        handler: Arc<InvoiceRequestHandler>,
        config: TippinConfig,
        build_params: BuildParams,
    ) -> Self {
        Self {
            handler,
            config,
            build_params,
        }
    }

    pub fn builder() -> TippinBuilder {
        TippinBuilder::new()
    }

    /// True if visitors have to upload the credentials of their own node.
    pub fn binds_node_per_request(&self) -> bool {
        matches!(self.handler.node(), NodeBinding::PerRequest(_))
    }
}

#[derive(Default)]
pub struct TippinBuilder {
    config: Option<TippinConfig>,
    node: Option<NodeBinding>,
    build_params: Option<BuildParams>,
}

impl TippinBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: TippinConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Uses the given node instead of the one described by the config.
    pub fn with_node(mut self, node: NodeBinding) -> Self {
        self.node = Some(node);
        self
    }

    pub fn with_build_params(mut self, build_params: BuildParams) -> Self {
        self.build_params = Some(build_params);
        self
    }

    pub async fn build(self) -> Result<Tippin, TippinServerError> {
        let config = self.config.unwrap_or_default();

        let node = match self.node {
            Some(node) => node,
            None => match config.node_binding {
                NodeBindingVariant::Default => {
                    NodeBinding::Shared(Arc::new(LndNode::from_settings(&config.lnd).await?))
                }
                NodeBindingVariant::PerRequest => {
                    if config.allowed_node_hosts.is_empty() {
                        warn!("no allowed node hosts configured, all submitted nodes are rejected");
                    }
                    NodeBinding::PerRequest(Arc::new(LndConnector::new(
                        config.allowed_node_hosts.clone(),
                    )))
                }
            },
        };

        let handler = InvoiceRequestHandler::new(node, config.invoice.clone());
        Ok(Tippin::new(
            Arc::new(handler),
            config,
            self.build_params.unwrap_or_else(BuildParams::from_env),
        ))
    }
}
