//! Form fields, submission errors and outcomes exchanged between the faucet handler and the page.

use std::fmt;

use serde::Deserialize;

/// Value of the `action` query parameter for the invoice form.
pub const GENERATE_INVOICE_ACTION: &str = "generateinvoice";

/// The reason a form submission did not produce an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionError {
    /// The cooldown since the last invoice attempt has not elapsed yet.
    RateLimited,
    AmountNotNumber,
    AmountTooHigh,
    /// Connecting to the node or creating the invoice failed.
    InvoiceGenerationFailed,
    /// The submitted form or one of its file parts could not be read.
    MalformedUpload,
}

impl SubmissionError {
    pub const fn message(&self) -> &'static str {
        match self {
            Self::RateLimited => "Please wait until you can generate a new invoice",
            Self::AmountNotNumber => "Amount must be a number",
            Self::AmountTooHigh => "Invoice amount too high",
            Self::InvoiceGenerationFailed => "Error generating Invoice",
            Self::MalformedUpload => "Unable to read the submitted form",
        }
    }

    /// True for the errors caused by the `amt` input.
    pub const fn is_amount_error(&self) -> bool {
        matches!(self, Self::AmountNotNumber | Self::AmountTooHigh)
    }
}

impl fmt::Display for SubmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Text fields of the invoice form, echoed back into the page after a submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FormFields {
    #[serde(default)]
    pub nodeurl: String,
    #[serde(default)]
    pub amt: String,
    #[serde(default)]
    pub description: String,
}

/// Result of one submission together with the fields it was made with, so the page can
/// show them again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionOutcome {
    pub fields: FormFields,
    /// the payment request of the created invoice
    pub result: Result<String, SubmissionError>,
}

impl SubmissionOutcome {
    pub fn invoice(fields: FormFields, payment_request: impl Into<String>) -> Self {
        Self {
            fields,
            result: Ok(payment_request.into()),
        }
    }

    pub const fn rejected(fields: FormFields, err: SubmissionError) -> Self {
        Self {
            fields,
            result: Err(err),
        }
    }

    pub fn payment_request(&self) -> Option<&str> {
        self.result.as_deref().ok()
    }

    pub fn error(&self) -> Option<SubmissionError> {
        self.result.as_ref().err().copied()
    }
}
