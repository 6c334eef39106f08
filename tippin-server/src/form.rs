use axum::{
    extract::{
        multipart::{Field, MultipartError},
        FromRequest, Multipart, Request,
    },
    http::header::CONTENT_TYPE,
    Form,
};
use tippin_core::primitives::FormFields;

use crate::model::{InvoiceRequest, NodeCredentials};

/// The invoice form as sent by the browser, either url-encoded or as multipart with file uploads.
#[derive(Debug, Default)]
pub struct SubmittedForm {
    pub fields: FormFields,
    pub tls_cert: Option<Vec<u8>>,
    pub macaroon: Option<Vec<u8>>,
}

/// A form that could not be read completely. Keeps the fields read so far.
#[derive(Debug)]
pub struct MalformedForm {
    pub fields: FormFields,
    pub reason: String,
}

impl MalformedForm {
    fn new(fields: FormFields, reason: impl ToString) -> Self {
        Self {
            fields,
            reason: reason.to_string(),
        }
    }
}

impl SubmittedForm {
    pub async fn read(request: Request) -> Result<Self, MalformedForm> {
        let is_multipart = request
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("multipart/form-data"));

        if is_multipart {
            Self::read_multipart(request).await
        } else {
            Self::read_urlencoded(request).await
        }
    }

    async fn read_urlencoded(request: Request) -> Result<Self, MalformedForm> {
        let Form(fields) = Form::<FormFields>::from_request(request, &())
            .await
            .map_err(|rejection| MalformedForm::new(FormFields::default(), rejection))?;

        Ok(Self {
            fields,
            ..Default::default()
        })
    }

    async fn read_multipart(request: Request) -> Result<Self, MalformedForm> {
        let mut form = Self::default();
        let mut multipart = match Multipart::from_request(request, &()).await {
            Ok(multipart) => multipart,
            Err(rejection) => return Err(MalformedForm::new(form.fields, rejection)),
        };

        loop {
            let field = match multipart.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => return Ok(form),
                Err(err) => return Err(MalformedForm::new(form.fields, err)),
            };
            if let Err(err) = form.read_field(field).await {
                return Err(MalformedForm::new(form.fields, err));
            }
        }
    }

    async fn read_field(&mut self, field: Field<'_>) -> Result<(), MultipartError> {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "nodeurl" => self.fields.nodeurl = field.text().await?,
            "amt" => self.fields.amt = field.text().await?,
            "description" => self.fields.description = field.text().await?,
            "tlscert" => self.tls_cert = Some(field.bytes().await?.to_vec()),
            "adminmacaroon" => self.macaroon = Some(field.bytes().await?.to_vec()),
            _ => {}
        }
        Ok(())
    }

    /// Turns the form into a submission. With `per_request_node` the certificate and
    /// macaroon uploads are required.
    pub fn into_invoice_request(
        self,
        per_request_node: bool,
    ) -> Result<InvoiceRequest, MalformedForm> {
        if !per_request_node {
            return Ok(InvoiceRequest::new(self.fields));
        }

        match (self.tls_cert, self.macaroon) {
            (Some(tls_cert), Some(macaroon)) if !tls_cert.is_empty() && !macaroon.is_empty() => {
                let credentials = NodeCredentials {
                    node_url: self.fields.nodeurl.clone(),
                    tls_cert,
                    macaroon,
                };
                Ok(InvoiceRequest::new(self.fields).with_credentials(Some(credentials)))
            }
            _ => Err(MalformedForm::new(
                self.fields,
                "tls certificate or macaroon upload missing",
            )),
        }
    }
}
