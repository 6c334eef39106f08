//! Admission and validation of invoice form submissions.
//!
//! Every submission goes through the same sequence: the process wide cooldown is
//! checked and the attempt recorded, the amount is parsed and checked against the
//! ceiling, and only then the node is asked for an invoice. The first failing step
//! decides the outcome. A recorded attempt stays recorded even if a later step fails.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tippin_core::{
    amount::CoinAmount,
    primitives::{SubmissionError, SubmissionOutcome},
};
use tokio::{sync::Mutex, time::Instant};
use tracing::{error, info, instrument, warn};

use crate::{
    config::InvoiceConfig,
    error::TippinServerError,
    model::{AddInvoiceParams, AddedInvoice, InvoiceRequest, NodeCredentials},
    node::NodeBinding,
};

/// Wall clock used for the creation date of invoices. The cooldown runs on the
/// monotonic tokio clock instead, so clock steps do not affect admission.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub struct InvoiceRequestHandler {
    node: NodeBinding,
    config: InvoiceConfig,
    clock: Arc<dyn Clock>,
    /// monotonic time of the last admitted attempt, `None` until the first one
    last_attempt_at: Mutex<Option<Instant>>,
}

impl InvoiceRequestHandler {
    pub fn new(node: NodeBinding, config: InvoiceConfig) -> Self {
        Self {
            node,
            config,
            clock: Arc::new(SystemClock),
            last_attempt_at: Mutex::new(None),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub const fn node(&self) -> &NodeBinding {
        &self.node
    }

    pub const fn config(&self) -> &InvoiceConfig {
        &self.config
    }

    pub async fn last_attempt_at(&self) -> Option<Instant> {
        *self.last_attempt_at.lock().await
    }

    #[instrument(name = "submit", skip_all, fields(amt = %request.fields.amt))]
    pub async fn submit(&self, request: InvoiceRequest) -> SubmissionOutcome {
        let InvoiceRequest {
            fields,
            credentials,
            remote_addr,
        } = request;

        if let Err(err) = self.admit().await {
            return SubmissionOutcome::rejected(fields, err);
        }

        let amount = match fields.amt.parse::<CoinAmount>() {
            Ok(amount) => amount,
            Err(err) => {
                info!("rejected invoice amount: {}", err);
                return SubmissionOutcome::rejected(fields, SubmissionError::AmountNotNumber);
            }
        };

        if amount.exceeds(self.config.max_amount) {
            warn!(
                "Attempt to generate high value invoice ({}) from {}",
                amount.coins(),
                remote_addr.map_or_else(|| "unknown".to_owned(), |addr| addr.to_string())
            );
            return SubmissionOutcome::rejected(fields, SubmissionError::AmountTooHigh);
        }

        let value = amount.to_atoms();
        let params = AddInvoiceParams {
            creation_date: self.clock.now().timestamp(),
            value,
            memo: fields.description.clone(),
        };

        let result = tokio::time::timeout(
            self.config.timeout(),
            self.create_invoice(credentials.as_ref(), params),
        )
        .await
        .unwrap_or_else(|_| Err(TippinServerError::Timeout(self.config.timeout_secs)));

        match result {
            Ok(invoice) => {
                info!(
                    "Generated invoice #{} for {} rhash={}",
                    invoice.add_index,
                    value,
                    hex::encode(&invoice.r_hash)
                );
                SubmissionOutcome::invoice(fields, invoice.payment_request)
            }
            Err(err) => {
                error!("Generate invoice failed: {}", err);
                SubmissionOutcome::rejected(fields, SubmissionError::InvoiceGenerationFailed)
            }
        }
    }

    /// Checks the cooldown and records the attempt under one lock.
    async fn admit(&self) -> Result<(), SubmissionError> {
        let mut last_attempt_at = self.last_attempt_at.lock().await;
        let now = Instant::now();

        if let Some(last) = *last_attempt_at {
            if now.saturating_duration_since(last) < self.config.cooldown() {
                return Err(SubmissionError::RateLimited);
            }
        }
        *last_attempt_at = Some(now);
        Ok(())
    }

    async fn create_invoice(
        &self,
        credentials: Option<&NodeCredentials>,
        params: AddInvoiceParams,
    ) -> Result<AddedInvoice, TippinServerError> {
        match &self.node {
            NodeBinding::Shared(node) => node.add_invoice(params).await,
            NodeBinding::PerRequest(connector) => {
                let credentials = credentials.ok_or(TippinServerError::MissingCredentials)?;
                let node = connector.connect(credentials).await?;
                node.add_invoice(params).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use fedimint_tonic_lnd::tonic::Status;
    use pretty_assertions::assert_eq;
    use tippin_core::{
        amount::Atoms,
        primitives::{FormFields, SubmissionError, SubmissionOutcome},
    };
    use tokio::time::{advance, Instant};

    use super::{Clock, InvoiceRequestHandler};
    use crate::{
        config::InvoiceConfig,
        error::TippinServerError,
        model::{AddInvoiceParams, AddedInvoice, InvoiceRequest, NodeCredentials},
        node::{InvoiceNode, MockInvoiceNode, MockNodeConnector, NodeBinding},
    };

    const T0: i64 = 1_700_000_000;

    /// Wall clock that only moves when told to.
    struct ManualClock(std::sync::Mutex<DateTime<Utc>>);

    impl ManualClock {
        fn at(secs: i64) -> Arc<Self> {
            Arc::new(Self(std::sync::Mutex::new(timestamp(secs))))
        }

        fn set(&self, secs: i64) {
            *self.0.lock().expect("clock lock poisoned") = timestamp(secs);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().expect("clock lock poisoned")
        }
    }

    fn timestamp(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(T0 + secs, 0).expect("valid timestamp")
    }

    fn fields(amt: &str) -> FormFields {
        FormFields {
            amt: amt.to_owned(),
            description: "coffee".to_owned(),
            ..Default::default()
        }
    }

    fn request(amt: &str) -> InvoiceRequest {
        InvoiceRequest::new(fields(amt))
    }

    fn added_invoice() -> AddedInvoice {
        AddedInvoice {
            payment_request: "lntdcr100u1pjtest".to_owned(),
            add_index: 7,
            r_hash: vec![0xab; 32],
        }
    }

    fn create_handler(node: MockInvoiceNode, clock: Arc<ManualClock>) -> InvoiceRequestHandler {
        InvoiceRequestHandler::new(NodeBinding::Shared(Arc::new(node)), Default::default())
            .with_clock(clock)
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_creates_invoice() -> anyhow::Result<()> {
        let mut node = MockInvoiceNode::new();
        node.expect_add_invoice()
            .times(1)
            .withf(|params| {
                params
                    == &AddInvoiceParams {
                        creation_date: T0,
                        value: Atoms(10_000_000),
                        memo: "coffee".to_owned(),
                    }
            })
            .returning(|_| Ok(added_invoice()));
        let handler = create_handler(node, ManualClock::at(0));
        let start = Instant::now();

        let outcome = handler.submit(request("0.1")).await;

        assert_eq!(
            SubmissionOutcome::invoice(fields("0.1"), "lntdcr100u1pjtest"),
            outcome
        );
        assert_eq!(Some(start), handler.last_attempt_at().await);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_returns_fields() -> anyhow::Result<()> {
        let handler = create_handler(MockInvoiceNode::new(), ManualClock::at(0));
        let submitted = FormFields {
            nodeurl: "node.example.com:10009".to_owned(),
            amt: "abc".to_owned(),
            description: "a tip".to_owned(),
        };

        let outcome = handler
            .submit(InvoiceRequest::new(submitted.clone()))
            .await;
        assert_eq!(
            SubmissionOutcome::rejected(submitted.clone(), SubmissionError::AmountNotNumber),
            outcome
        );

        let outcome = handler.submit(InvoiceRequest::new(submitted.clone())).await;
        assert_eq!(
            SubmissionOutcome::rejected(submitted, SubmissionError::RateLimited),
            outcome
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_truncates_to_atoms() -> anyhow::Result<()> {
        let mut node = MockInvoiceNode::new();
        node.expect_add_invoice()
            .times(1)
            .withf(|params| params.value == Atoms(19_999_999))
            .returning(|_| Ok(added_invoice()));
        let handler = create_handler(node, ManualClock::at(0));

        let outcome = handler.submit(request("0.19999999999")).await;
        assert!(outcome.payment_request().is_some());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_cooldown_scenario() -> anyhow::Result<()> {
        let mut node = MockInvoiceNode::new();
        node.expect_add_invoice()
            .times(1)
            .returning(|_| Ok(added_invoice()));
        let handler = create_handler(node, ManualClock::at(0));
        let start = Instant::now();

        assert!(handler.submit(request("0.1")).await.payment_request().is_some());

        advance(Duration::from_secs(30)).await;
        let outcome = handler.submit(request("0.1")).await;
        assert_eq!(Some(SubmissionError::RateLimited), outcome.error());
        assert_eq!(Some(start), handler.last_attempt_at().await);

        advance(Duration::from_secs(31)).await;
        let outcome = handler.submit(request("abc")).await;
        assert_eq!(Some(SubmissionError::AmountNotNumber), outcome.error());
        assert_eq!(
            Some(start + Duration::from_secs(61)),
            handler.last_attempt_at().await
        );

        // rate limit is checked before the amount
        advance(Duration::from_secs(4)).await;
        let outcome = handler.submit(request("0.5")).await;
        assert_eq!(Some(SubmissionError::RateLimited), outcome.error());
        assert_eq!(
            Some(start + Duration::from_secs(61)),
            handler.last_attempt_at().await
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_exactly_at_cooldown() -> anyhow::Result<()> {
        let mut node = MockInvoiceNode::new();
        node.expect_add_invoice()
            .times(2)
            .returning(|_| Ok(added_invoice()));
        let handler = create_handler(node, ManualClock::at(0));

        assert!(handler.submit(request("0.1")).await.payment_request().is_some());
        advance(Duration::from_secs(60)).await;
        assert!(handler.submit(request("0.1")).await.payment_request().is_some());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_wall_clock_step_back_does_not_block() -> anyhow::Result<()> {
        let mut node = MockInvoiceNode::new();
        node.expect_add_invoice()
            .times(1)
            .withf(|params| params.creation_date == T0)
            .returning(|_| Ok(added_invoice()));
        node.expect_add_invoice()
            .times(1)
            .withf(|params| params.creation_date == T0 - 3_480)
            .returning(|_| Ok(added_invoice()));
        let clock = ManualClock::at(0);
        let handler = create_handler(node, clock.clone());

        assert!(handler.submit(request("0.1")).await.payment_request().is_some());

        // the system clock is set back an hour, then two minutes pass
        clock.set(-3_600 + 120);
        advance(Duration::from_secs(120)).await;
        let outcome = handler.submit(request("0.1")).await;
        assert_eq!(Some("lntdcr100u1pjtest"), outcome.payment_request());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_wall_clock_step_forward_keeps_cooldown() -> anyhow::Result<()> {
        let mut node = MockInvoiceNode::new();
        node.expect_add_invoice()
            .times(1)
            .returning(|_| Ok(added_invoice()));
        let clock = ManualClock::at(0);
        let handler = create_handler(node, clock.clone());

        assert!(handler.submit(request("0.1")).await.payment_request().is_some());

        clock.set(3_600 + 10);
        advance(Duration::from_secs(10)).await;
        let outcome = handler.submit(request("0.1")).await;
        assert_eq!(Some(SubmissionError::RateLimited), outcome.error());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_amount_not_number() -> anyhow::Result<()> {
        for amt in ["abc", "", "0,1", "NaN", "-0.1", "1e400"] {
            let handler = create_handler(MockInvoiceNode::new(), ManualClock::at(0));
            let start = Instant::now();
            let outcome = handler.submit(request(amt)).await;
            assert_eq!(Some(SubmissionError::AmountNotNumber), outcome.error());
            assert_eq!(Some(start), handler.last_attempt_at().await);
        }
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_amount_too_high() -> anyhow::Result<()> {
        for amt in ["0.2000001", "0.5", "21", "inf", "1e300"] {
            let handler = create_handler(MockInvoiceNode::new(), ManualClock::at(0));
            let outcome = handler.submit(request(amt)).await;
            assert_eq!(Some(SubmissionError::AmountTooHigh), outcome.error());
        }
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_ceiling_is_inclusive() -> anyhow::Result<()> {
        let mut node = MockInvoiceNode::new();
        node.expect_add_invoice()
            .times(1)
            .withf(|params| params.value == Atoms(20_000_000))
            .returning(|_| Ok(added_invoice()));
        let handler = create_handler(node, ManualClock::at(0));

        assert!(handler.submit(request("0.2")).await.payment_request().is_some());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_node_failure_consumes_attempt() -> anyhow::Result<()> {
        let mut node = MockInvoiceNode::new();
        node.expect_add_invoice()
            .times(1)
            .returning(|_| Err(TippinServerError::Rpc(Status::unavailable("node down"))));
        let handler = create_handler(node, ManualClock::at(0));
        let start = Instant::now();

        let outcome = handler.submit(request("0.1")).await;
        assert_eq!(
            Some(SubmissionError::InvoiceGenerationFailed),
            outcome.error()
        );
        assert_eq!(Some(start), handler.last_attempt_at().await);

        advance(Duration::from_secs(10)).await;
        let outcome = handler.submit(request("0.1")).await;
        assert_eq!(Some(SubmissionError::RateLimited), outcome.error());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_twice_second_is_rate_limited() -> anyhow::Result<()> {
        let mut node = MockInvoiceNode::new();
        node.expect_add_invoice()
            .times(1)
            .returning(|_| Ok(added_invoice()));
        let handler = create_handler(node, ManualClock::at(0));

        let first = handler.submit(request("0.1")).await;
        let second = handler.submit(request("0.1")).await;

        assert!(first.payment_request().is_some());
        assert_eq!(Some(SubmissionError::RateLimited), second.error());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_submissions_admit_one() -> anyhow::Result<()> {
        let mut node = MockInvoiceNode::new();
        node.expect_add_invoice()
            .times(1)
            .returning(|_| Ok(added_invoice()));
        let handler = Arc::new(create_handler(node, ManualClock::at(0)));

        let tasks = (0..16)
            .map(|_| {
                let handler = handler.clone();
                tokio::spawn(async move { handler.submit(request("0.1")).await })
            })
            .collect::<Vec<_>>();

        let mut invoices = 0;
        let mut rate_limited = 0;
        for task in tasks {
            match task.await?.result {
                Ok(_) => invoices += 1,
                Err(SubmissionError::RateLimited) => rate_limited += 1,
                Err(other) => panic!("unexpected outcome {other:?}"),
            }
        }
        assert_eq!(1, invoices);
        assert_eq!(15, rate_limited);
        Ok(())
    }

    struct SlowNode;

    #[async_trait]
    impl InvoiceNode for SlowNode {
        async fn add_invoice(
            &self,
            _params: AddInvoiceParams,
        ) -> Result<AddedInvoice, TippinServerError> {
            tokio::time::sleep(Duration::from_secs(3_600)).await;
            Ok(added_invoice())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_node_timeout() -> anyhow::Result<()> {
        let handler = InvoiceRequestHandler::new(
            NodeBinding::Shared(Arc::new(SlowNode)),
            InvoiceConfig {
                timeout_secs: 5,
                ..Default::default()
            },
        )
        .with_clock(ManualClock::at(0));
        let start = Instant::now();

        let outcome = handler.submit(request("0.1")).await;
        assert_eq!(
            Some(SubmissionError::InvoiceGenerationFailed),
            outcome.error()
        );
        assert_eq!(Some(start), handler.last_attempt_at().await);
        Ok(())
    }

    fn credentials() -> NodeCredentials {
        NodeCredentials {
            node_url: "node.example.com:10009".to_owned(),
            tls_cert: b"-----BEGIN CERTIFICATE-----".to_vec(),
            macaroon: vec![2, 1, 3],
        }
    }

    fn create_per_request_handler(connector: MockNodeConnector) -> InvoiceRequestHandler {
        InvoiceRequestHandler::new(
            NodeBinding::PerRequest(Arc::new(connector)),
            Default::default(),
        )
        .with_clock(ManualClock::at(0))
    }

    #[tokio::test]
    async fn test_per_request_node_creates_invoice() -> anyhow::Result<()> {
        let mut node = MockInvoiceNode::new();
        node.expect_add_invoice()
            .times(1)
            .returning(|_| Ok(added_invoice()));
        let node: Arc<dyn InvoiceNode> = Arc::new(node);

        let mut connector = MockNodeConnector::new();
        connector
            .expect_connect()
            .times(1)
            .withf(|submitted| submitted == &credentials())
            .returning(move |_| Ok(node.clone()));
        let handler = create_per_request_handler(connector);

        let outcome = handler
            .submit(request("0.05").with_credentials(Some(credentials())))
            .await;
        assert_eq!(Some("lntdcr100u1pjtest"), outcome.payment_request());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_request_connect_failure() -> anyhow::Result<()> {
        let mut connector = MockNodeConnector::new();
        connector
            .expect_connect()
            .times(1)
            .returning(|_| Err(TippinServerError::NodeNotAllowed("node.example.com".to_owned())));
        let handler = create_per_request_handler(connector);
        let start = Instant::now();

        let outcome = handler
            .submit(request("0.05").with_credentials(Some(credentials())))
            .await;
        assert_eq!(
            Some(SubmissionError::InvoiceGenerationFailed),
            outcome.error()
        );
        assert_eq!(Some(start), handler.last_attempt_at().await);
        Ok(())
    }

    #[tokio::test]
    async fn test_per_request_without_credentials() -> anyhow::Result<()> {
        let handler = create_per_request_handler(MockNodeConnector::new());

        let outcome = handler.submit(request("0.05")).await;
        assert_eq!(
            Some(SubmissionError::InvoiceGenerationFailed),
            outcome.error()
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_per_request_validates_amount_before_connecting() -> anyhow::Result<()> {
        let handler = create_per_request_handler(MockNodeConnector::new());

        let outcome = handler
            .submit(request("1").with_credentials(Some(credentials())))
            .await;
        assert_eq!(Some(SubmissionError::AmountTooHigh), outcome.error());
        Ok(())
    }
}
