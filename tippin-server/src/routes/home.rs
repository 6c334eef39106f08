use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Query, Request, State},
    response::Html,
};
use tippin_core::primitives::{SubmissionError, SubmissionOutcome, GENERATE_INVOICE_ACTION};
use tracing::{instrument, warn};

use crate::{
    error::TippinServerError, form::SubmittedForm, model::ActionQuery, render::HomeTemplate,
    tippin::Tippin,
};

#[instrument(skip(tippin), err)]
pub async fn get_home(State(tippin): State<Tippin>) -> Result<Html<String>, TippinServerError> {
    HomeTemplate::new(&tippin).render_html()
}

#[instrument(name = "post_home", skip(tippin, request), err)]
pub async fn post_home(
    State(tippin): State<Tippin>,
    Query(query): Query<ActionQuery>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
) -> Result<Html<String>, TippinServerError> {
    let page = HomeTemplate::new(&tippin);
    if query.action.as_deref() != Some(GENERATE_INVOICE_ACTION) {
        return page.render_html();
    }

    let submission = SubmittedForm::read(request)
        .await
        .and_then(|form| form.into_invoice_request(tippin.binds_node_per_request()));

    let outcome = match submission {
        Ok(invoice_request) => {
            let invoice_request =
                invoice_request.with_remote_addr(connect_info.map(|ConnectInfo(addr)| addr));
            tippin.handler.submit(invoice_request).await
        }
        Err(malformed) => {
            warn!("unable to read invoice form: {}", malformed.reason);
            SubmissionOutcome::rejected(malformed.fields, SubmissionError::MalformedUpload)
        }
    };

    page.with_outcome(outcome).render_html()
}
