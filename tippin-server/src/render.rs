use askama::Template;
use axum::response::Html;
use tippin_core::primitives::{
    FormFields, SubmissionError, SubmissionOutcome, GENERATE_INVOICE_ACTION,
};

use crate::{error::TippinServerError, tippin::Tippin};

/// The faucet home page: the invoice form, the last outcome and some node info.
#[derive(Template, Debug, Clone)]
#[template(path = "index.html")]
pub struct HomeTemplate {
    pub node_addr: Option<String>,
    pub commit_hash: Option<String>,
    pub action: &'static str,
    pub per_request_node: bool,
    pub fields: FormFields,
    pub error: Option<SubmissionError>,
    pub payment_request: Option<String>,
}

impl HomeTemplate {
    pub fn new(tippin: &Tippin) -> Self {
        Self {
            node_addr: tippin.config.page.node_addr.clone(),
            commit_hash: tippin.build_params.commit_hash.clone(),
            action: GENERATE_INVOICE_ACTION,
            per_request_node: tippin.binds_node_per_request(),
            fields: FormFields::default(),
            error: None,
            payment_request: None,
        }
    }

    pub fn with_outcome(mut self, outcome: SubmissionOutcome) -> Self {
        self.error = outcome.error();
        self.payment_request = outcome.result.ok();
        self.fields = outcome.fields;
        self
    }

    pub fn amount_error(&self) -> bool {
        self.error.is_some_and(|err| err.is_amount_error())
    }

    pub fn render_html(&self) -> Result<Html<String>, TippinServerError> {
        Ok(Html(self.render()?))
    }
}
