//! HTTP client for the expense parsing service.
//!
//! `POST {endpoint}/parse/text` takes a JSON body, `POST
//! {endpoint}/parse/receipt` a multipart form with the image in `file`. Both
//! answer with `{amount, description, category?, payer?}`.

use std::time::Duration;

use api_types::AmountInput;
use engine::{
    Currency, ExpenseDraft, ExpenseExtractor, ExtractError, ExtractFuture, Money, ReceiptInput,
    TextInput,
};
use reqwest::{
    Client, RequestBuilder,
    multipart::{Form, Part},
};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct TextRequest<'a> {
    text_input: &'a str,
    user_name: &'a str,
    currency: &'static str,
    members: &'a [String],
}

#[derive(Debug, Deserialize)]
struct DraftResponse {
    amount: AmountInput,
    description: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    payer: Option<String>,
}

/// Drops thousands separators from a model-produced amount.
///
/// With both `,` and `.` present the last one is the decimal point. A lone
/// separator followed by exactly three digits groups thousands
/// (`1,234`), otherwise it is the decimal point (`12,50`).
fn plain_decimal(text: &str) -> String {
    let text: String = text
        .chars()
        .filter(|c| !matches!(c, ' ' | '_' | '\''))
        .collect();
    let decimal = match (text.rfind(','), text.rfind('.')) {
        (Some(comma), Some(dot)) => Some(comma.max(dot)),
        (Some(at), None) | (None, Some(at)) => {
            let separator = &text[at..=at];
            let lone = text.matches(separator).count() == 1;
            let grouping = text.len() - at - 1 == 3 && !text.starts_with('0');
            (lone && !grouping).then_some(at)
        }
        (None, None) => None,
    };
    text.char_indices()
        .filter_map(|(at, c)| match c {
            ',' | '.' if Some(at) == decimal => Some('.'),
            ',' | '.' => None,
            other => Some(other),
        })
        .collect()
}

impl DraftResponse {
    fn into_draft(self, currency: Currency) -> Result<ExpenseDraft, ExtractError> {
        let text = match &self.amount {
            AmountInput::Text(text) => plain_decimal(text),
            number => number.as_decimal(),
        };
        let amount = Money::parse_major(&text, currency)
            .map_err(|err| ExtractError::InvalidDraft(err.to_string()))?;
        Ok(ExpenseDraft {
            amount,
            description: self.description,
            category: self.category,
            payer_name: self.payer,
        })
    }
}

#[derive(Clone, Debug)]
pub struct HttpExtractor {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpExtractor {
    pub fn new(
        endpoint: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("splitsphere/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let request = self.client.post(format!("{}{path}", self.endpoint));
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send(
        &self,
        request: RequestBuilder,
        currency: Currency,
    ) -> Result<ExpenseDraft, ExtractError> {
        let response = request
            .send()
            .await
            .map_err(|err| ExtractError::Unavailable(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::Upstream(format!("status {status}")));
        }
        let draft: DraftResponse = response
            .json()
            .await
            .map_err(|err| ExtractError::InvalidDraft(err.to_string()))?;
        draft.into_draft(currency)
    }
}

impl ExpenseExtractor for HttpExtractor {
    fn parse_text<'a>(&'a self, input: &'a TextInput) -> ExtractFuture<'a> {
        Box::pin(async move {
            let body = TextRequest {
                text_input: &input.text,
                user_name: &input.user_name,
                currency: input.currency.code(),
                members: &input.member_names,
            };
            self.send(self.post("/parse/text").json(&body), input.currency)
                .await
        })
    }

    fn parse_receipt<'a>(&'a self, input: &'a ReceiptInput) -> ExtractFuture<'a> {
        Box::pin(async move {
            let mut file = Part::bytes(input.bytes.clone()).file_name(input.file_name.clone());
            if let Some(content_type) = &input.content_type {
                file = file
                    .mime_str(content_type)
                    .map_err(|err| ExtractError::InvalidDraft(err.to_string()))?;
            }
            let mut form = Form::new()
                .part("file", file)
                .text("user_name", input.user_name.clone())
                .text("currency", input.currency.code())
                .text("members", input.member_names.join(","));
            if let Some(caption) = &input.caption {
                form = form.text("caption", caption.clone());
            }
            self.send(self.post("/parse/receipt").multipart(form), input.currency)
                .await
        })
    }
}
