//! Reconciliation pipeline.
//!
//! Drives one logical transaction end to end: validate, open a log entry,
//! preauthorize, commit, then record the payment on the ERP side. The
//! inbound callback and the manual try-again operation re-enter the same
//! payment-recording step, so currency conversion and the idempotence
//! guard live in exactly one place.

pub mod rates;

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::gateway::types::{
    CommitRequest, GatewayResponse, HostedLinkRequest, PreauthorizeRequest, RESPONSE_CODE_OK,
    STATE_APPROVED, STATE_RCS_SUCCESS,
};
use crate::gateway::PaymentGateway;
use crate::ledger::{LogHandle, TransactionLog};
use crate::store::documents::{
    DocStatus, GatewayCredentials, LogStatus, PaymentChannel, PaymentEntry,
    PaymentEntryReference, PaymentRequest, PaymentRequestStatus, SalesInvoice,
};
use crate::store::{doctype, DocumentStore};
use rates::{round2, ExchangeRates};

/// Who is driving this operation. Callbacks arrive unauthenticated, so the
/// handler hands the pipeline an elevated context scoped to that single
/// call instead of flipping any process-wide identity.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub actor: String,
    pub elevated: bool,
}

impl ExecutionContext {
    pub fn interactive(actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            elevated: false,
        }
    }

    pub fn elevated(actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            elevated: true,
        }
    }
}

/// Result of a completed interactive phone payment
#[derive(Debug, Clone)]
pub struct PhonePaymentOutcome {
    pub reference_id: String,
    pub log_entry: String,
    pub payment_request: String,
    pub transaction_id: String,
    pub payment_entry: Option<String>,
}

/// Parsed inbound gateway notification. The gateway is inconsistent about
/// where it puts things, so every recognized spelling is checked.
#[derive(Debug, Clone, Default)]
pub struct CallbackNotification {
    pub reference_id: Option<String>,
    pub status: Option<String>,
    pub transaction_id: Option<String>,
    pub order_id: Option<String>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub raw: Value,
}

impl CallbackNotification {
    pub fn from_value(raw: Value) -> Self {
        let pick_str = |keys: &[&Value]| {
            keys.iter()
                .find_map(|v| v.as_str())
                .map(str::to_string)
        };
        let coerce_amount = |v: &Value| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        };

        let reference_id = pick_str(&[&raw["referenceId"], &raw["params"]["referenceId"]]);
        let status = pick_str(&[
            &raw["status"],
            &raw["responseCode"],
            &raw["params"]["state"],
        ]);
        let transaction_id = pick_str(&[&raw["transactionId"], &raw["params"]["transactionId"]]);
        let order_id = pick_str(&[&raw["params"]["orderId"]]);
        let amount = coerce_amount(&raw["params"]["txAmount"])
            .or_else(|| coerce_amount(&raw["amount"]))
            .map(round2);
        let currency = pick_str(&[&raw["currency"]]);

        Self {
            reference_id,
            status,
            transaction_id,
            order_id,
            amount,
            currency,
            raw,
        }
    }

    /// A notification is an explicit failure only when it carries a status
    /// that is none of the success spellings; a missing status is treated
    /// as success provided the reference resolves.
    pub fn is_explicit_failure(&self) -> bool {
        match self.status.as_deref() {
            Some(status) => {
                status != RESPONSE_CODE_OK
                    && status != STATE_APPROVED
                    && status != STATE_RCS_SUCCESS
            }
            None => false,
        }
    }
}

/// How a callback was resolved; the HTTP boundary maps this to a redirect
/// or a JSON body.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackOutcome {
    Completed {
        reference_id: String,
        payment_entry: Option<String>,
    },
    Failed {
        reason: String,
    },
}

impl CallbackOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

pub struct ReconciliationPipeline {
    store: Arc<dyn DocumentStore>,
    gateway: Arc<dyn PaymentGateway>,
    rates: Arc<dyn ExchangeRates>,
    log: TransactionLog,
    credentials_name: String,
}

impl ReconciliationPipeline {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        gateway: Arc<dyn PaymentGateway>,
        rates: Arc<dyn ExchangeRates>,
        credentials_name: impl Into<String>,
    ) -> Self {
        let log = TransactionLog::new(store.clone());
        Self {
            store,
            gateway,
            rates,
            log,
            credentials_name: credentials_name.into(),
        }
    }

    /// Success/failure landing pages for the redirect-style webhook
    pub async fn landing_urls(&self) -> AppResult<(String, String)> {
        let credentials =
            GatewayCredentials::load(self.store.as_ref(), &self.credentials_name).await?;
        Ok((credentials.success_url, credentials.failure_url))
    }

    /// Interactive flow: preauthorize against the customer's wallet,
    /// commit the hold, record the payment.
    pub async fn run_phone_payment(
        &self,
        ctx: &ExecutionContext,
        invoice_name: &str,
        phone_override: Option<&str>,
    ) -> AppResult<PhonePaymentOutcome> {
        info!(
            actor = %ctx.actor,
            elevated = ctx.elevated,
            invoice = %invoice_name,
            "phone payment requested"
        );

        if !self.store.exists(doctype::SALES_INVOICE, invoice_name).await? {
            return Err(AppError::validation(format!(
                "sales invoice '{invoice_name}' not found"
            )));
        }
        let mut invoice_doc = self.store.load(doctype::SALES_INVOICE, invoice_name).await?;
        let invoice = SalesInvoice::from_document(&invoice_doc)?;

        let credentials =
            GatewayCredentials::load(self.store.as_ref(), &self.credentials_name).await?;

        let phone = phone_override
            .map(str::to_string)
            .or_else(|| invoice.customer_mobile.clone())
            .ok_or_else(|| {
                AppError::validation("customer phone number is required for a WaafiPay payment")
            })?;

        let existing = self.find_active_payment_request(&invoice).await?;
        let amount = round2(
            existing
                .as_ref()
                .map(|request| request.grand_total)
                .unwrap_or(invoice.outstanding_amount),
        );

        // Everything below writes state; reject bad input first.
        if amount <= 0.0 {
            return Err(AppError::validation(
                "payment amount must be greater than zero",
            ));
        }
        if !credentials.supports_currency(&invoice.currency) {
            return Err(AppError::UnsupportedCurrency {
                currency: invoice.currency.clone(),
            });
        }

        let request = match existing {
            Some(request) => request,
            None => {
                self.create_payment_request(&invoice, &credentials, amount)
                    .await?
            }
        };

        let reference_id = Uuid::new_v4().to_string();
        let envelope = self.gateway.prepare_preauthorize(&PreauthorizeRequest {
            phone_number: phone,
            amount,
            currency: invoice.currency.clone(),
            reference_id: reference_id.clone(),
            invoice_id: Some(invoice.name.clone()),
        })?;

        let handle = self
            .log
            .open(&reference_id, Some(invoice_name), &envelope)
            .await?;

        let response = match self.gateway.dispatch(&envelope).await {
            Ok(response) => response,
            Err(err) => {
                self.abort(&handle, None, &err).await;
                return Err(err);
            }
        };

        let approved = response.is_ok()
            && matches!(response.state(), Some(STATE_APPROVED) | Some(STATE_RCS_SUCCESS));
        if !approved {
            let err = AppError::rejection(response.message_or("preauthorization was declined"));
            self.abort(&handle, Some(&response), &err).await;
            return Err(err);
        }

        let transaction_id = match response.transaction_id() {
            Some(id) => id.to_string(),
            None => {
                let err = AppError::reconciliation(
                    "preauthorization approved but the response carries no transactionId",
                );
                self.abort(&handle, Some(&response), &err).await;
                return Err(err);
            }
        };

        invoice_doc.set(
            "waafipay_reference_id",
            Value::from(response.reference_id().unwrap_or(&reference_id)),
        );
        if let Err(err) = self.store.save(&invoice_doc).await {
            let err = AppError::reconciliation(err.to_string());
            self.abort(&handle, Some(&response), &err).await;
            return Err(err);
        }

        let commit_response = self
            .commit_hold(&transaction_id, &reference_id, &handle)
            .await?;

        let payment_entry = match self
            .record_payment(
                ctx,
                &invoice,
                Some(&request),
                &reference_id,
                amount,
                &invoice.currency,
            )
            .await
        {
            Ok(entry) => entry,
            Err(err) => {
                self.abort(&handle, Some(&commit_response), &err).await;
                return Err(err);
            }
        };

        self.log.close_success(&handle, &commit_response).await?;
        info!(
            reference_id = %reference_id,
            transaction_id = %transaction_id,
            "phone payment reconciled"
        );

        Ok(PhonePaymentOutcome {
            reference_id,
            log_entry: handle.name,
            payment_request: request.name,
            transaction_id,
            payment_entry,
        })
    }

    /// Asynchronous gateway notification. Resolution order: match a
    /// payment request, fall back to committing a preauthorized hold, and
    /// otherwise record the failure and stop.
    pub async fn handle_callback(
        &self,
        ctx: &ExecutionContext,
        notification: &CallbackNotification,
    ) -> AppResult<CallbackOutcome> {
        info!(
            actor = %ctx.actor,
            elevated = ctx.elevated,
            reference_id = notification.reference_id.as_deref().unwrap_or("-"),
            status = notification.status.as_deref().unwrap_or("-"),
            "gateway callback received"
        );

        if notification.is_explicit_failure() {
            let reason = format!(
                "gateway reported failure ({})",
                notification.status.as_deref().unwrap_or("unknown")
            );
            if let Some(reference_id) = &notification.reference_id {
                self.log
                    .record_callback(
                        reference_id,
                        &notification.raw,
                        LogStatus::Failed,
                        Some(&reason),
                    )
                    .await?;
            }
            return Ok(CallbackOutcome::Failed { reason });
        }

        let Some(reference_id) = notification.reference_id.clone() else {
            // Nothing to correlate against; noted and swallowed.
            error!("callback carries no reference id; ignoring");
            return Ok(CallbackOutcome::Failed {
                reason: "missing reference id in callback".to_string(),
            });
        };

        let log_entry = self.log.find_by_reference(&reference_id).await?;
        let invoice_name = log_entry.as_ref().and_then(|e| e.sales_invoice.clone());

        let request = self
            .resolve_payment_request(&reference_id, invoice_name.as_deref())
            .await?;

        match request {
            Some(request) => {
                self.log
                    .record_callback(
                        &reference_id,
                        &notification.raw,
                        LogStatus::Success,
                        None,
                    )
                    .await?;
                self.settle_from_callback(ctx, &reference_id, &request, notification)
                    .await
            }
            None if notification.transaction_id.is_some() => {
                self.commit_then_settle(ctx, &reference_id, invoice_name.as_deref(), notification)
                    .await
            }
            None => {
                let reason = format!(
                    "no payment request or preauthorized transaction found for reference '{reference_id}'"
                );
                self.log
                    .record_callback(
                        &reference_id,
                        &notification.raw,
                        LogStatus::Failed,
                        Some(&reason),
                    )
                    .await?;
                warn!(reference_id = %reference_id, "{reason}");
                Ok(CallbackOutcome::Failed { reason })
            }
        }
    }

    /// Manual retry: re-read a closed log entry's stored response and
    /// re-invoke payment-entry creation. Caller-triggered only.
    pub async fn try_again(
        &self,
        ctx: &ExecutionContext,
        log_name: &str,
    ) -> AppResult<Option<String>> {
        let entry = self.log.load(log_name).await?;
        let stored = entry.response_data.as_deref().ok_or_else(|| {
            AppError::validation(format!("log entry '{log_name}' has no stored response"))
        })?;
        let response: GatewayResponse = serde_json::from_str(stored)
            .map_err(|e| AppError::validation(format!("stored response is unreadable: {e}")))?;

        let reference_id = response
            .reference_id()
            .unwrap_or(&entry.reference_id)
            .to_string();
        let invoice_name = entry.sales_invoice.as_deref().ok_or_else(|| {
            AppError::validation(format!("log entry '{log_name}' has no linked sales invoice"))
        })?;
        let invoice_doc = self.store.load(doctype::SALES_INVOICE, invoice_name).await?;
        let invoice = SalesInvoice::from_document(&invoice_doc)?;

        let request = self
            .resolve_payment_request(&reference_id, Some(invoice_name))
            .await?;
        let amount = request
            .as_ref()
            .map(|r| r.grand_total)
            .unwrap_or(invoice.outstanding_amount);

        info!(
            actor = %ctx.actor,
            log = %log_name,
            reference_id = %reference_id,
            "manual retry of payment-entry creation"
        );
        self.record_payment(
            ctx,
            &invoice,
            request.as_ref(),
            &reference_id,
            round2(amount),
            &invoice.currency,
        )
        .await
    }

    /// Hosted-payment-page flow for non-phone channels: request a link
    /// from the gateway and store it on the payment request.
    pub async fn generate_payment_link(
        &self,
        ctx: &ExecutionContext,
        request_name: &str,
    ) -> AppResult<String> {
        let mut doc = self
            .store
            .load(doctype::PAYMENT_REQUEST, request_name)
            .await?;
        let request = PaymentRequest::from_document(&doc)?;

        let envelope = self.gateway.prepare_hosted_link(&HostedLinkRequest {
            reference: request.reference_name.clone(),
            amount: round2(request.grand_total),
            currency: request.currency.clone(),
            description: format!(
                "Payment for {:.2} {} for {}",
                request.grand_total, request.currency, request.reference_name
            ),
        })?;

        info!(
            actor = %ctx.actor,
            payment_request = %request_name,
            "requesting hosted payment link"
        );
        let response = self.gateway.dispatch(&envelope).await?;

        if !response.is_ok() {
            let message = response.message_or("unexpected response from WaafiPay");
            error!(payment_request = %request_name, "link generation failed: {message}");
            return Err(AppError::rejection(message));
        }
        let link = response.payment_link().ok_or_else(|| {
            AppError::rejection("gateway accepted the purchase but returned no payment link")
        })?;

        doc.set("payment_link", Value::from(link));
        self.store.save(&doc).await?;
        Ok(link.to_string())
    }

    async fn settle_from_callback(
        &self,
        ctx: &ExecutionContext,
        reference_id: &str,
        request: &PaymentRequest,
        notification: &CallbackNotification,
    ) -> AppResult<CallbackOutcome> {
        let invoice_name = if request.reference_doctype == doctype::SALES_INVOICE {
            request.reference_name.clone()
        } else {
            return Ok(CallbackOutcome::Failed {
                reason: format!(
                    "payment request '{}' does not reference a sales invoice",
                    request.name
                ),
            });
        };

        let invoice_doc = self
            .store
            .load(doctype::SALES_INVOICE, &invoice_name)
            .await?;
        let invoice = SalesInvoice::from_document(&invoice_doc)?;

        let amount = notification.amount.unwrap_or(round2(request.grand_total));
        let currency = notification
            .currency
            .clone()
            .unwrap_or_else(|| "USD".to_string());

        match self
            .record_payment(ctx, &invoice, Some(request), reference_id, amount, &currency)
            .await
        {
            Ok(payment_entry) => Ok(CallbackOutcome::Completed {
                reference_id: reference_id.to_string(),
                payment_entry,
            }),
            Err(err) => {
                error!(reference_id = %reference_id, "callback settlement failed: {err}");
                Ok(CallbackOutcome::Failed {
                    reason: err.to_string(),
                })
            }
        }
    }

    /// Preauthorization-only flow: the payer approved on their handset and
    /// the gateway notified us before any interactive commit ran.
    async fn commit_then_settle(
        &self,
        ctx: &ExecutionContext,
        reference_id: &str,
        invoice_name: Option<&str>,
        notification: &CallbackNotification,
    ) -> AppResult<CallbackOutcome> {
        let transaction_id = notification
            .transaction_id
            .as_deref()
            .unwrap_or_default()
            .to_string();

        let envelope = self.gateway.prepare_commit(&CommitRequest {
            transaction_id: transaction_id.clone(),
            reference_id: reference_id.to_string(),
        })?;
        let response = match self.gateway.dispatch(&envelope).await {
            Ok(response) => response,
            Err(err) => {
                self.log
                    .record_callback(
                        reference_id,
                        &notification.raw,
                        LogStatus::Failed,
                        Some(&err.to_string()),
                    )
                    .await?;
                return Ok(CallbackOutcome::Failed {
                    reason: err.to_string(),
                });
            }
        };

        let committed = response.is_ok() || response.message() == Some(STATE_RCS_SUCCESS);
        if !committed {
            let reason = format!(
                "preauthorize commit failed: {}",
                response.message_or("no gateway message")
            );
            self.log
                .record_callback(
                    reference_id,
                    &notification.raw,
                    LogStatus::Failed,
                    Some(&reason),
                )
                .await?;
            return Ok(CallbackOutcome::Failed { reason });
        }

        let Some(invoice_name) = invoice_name else {
            let reason = format!(
                "committed transaction '{transaction_id}' but no sales invoice is linked to reference '{reference_id}'"
            );
            self.log
                .record_callback(
                    reference_id,
                    &notification.raw,
                    LogStatus::Failed,
                    Some(&reason),
                )
                .await?;
            return Ok(CallbackOutcome::Failed { reason });
        };

        self.log
            .record_callback(
                reference_id,
                &notification.raw,
                LogStatus::Success,
                None,
            )
            .await?;

        let invoice_doc = self.store.load(doctype::SALES_INVOICE, invoice_name).await?;
        let invoice = SalesInvoice::from_document(&invoice_doc)?;
        let amount = notification
            .amount
            .unwrap_or(round2(invoice.outstanding_amount));
        let currency = notification
            .currency
            .clone()
            .unwrap_or_else(|| invoice.currency.clone());

        match self
            .record_payment(ctx, &invoice, None, reference_id, amount, &currency)
            .await
        {
            Ok(payment_entry) => Ok(CallbackOutcome::Completed {
                reference_id: reference_id.to_string(),
                payment_entry,
            }),
            Err(err) => Ok(CallbackOutcome::Failed {
                reason: err.to_string(),
            }),
        }
    }

    /// Find a usable payment request: named after the reference id, or the
    /// one raised against the linked invoice.
    async fn resolve_payment_request(
        &self,
        reference_id: &str,
        invoice_name: Option<&str>,
    ) -> AppResult<Option<PaymentRequest>> {
        if self
            .store
            .exists(doctype::PAYMENT_REQUEST, reference_id)
            .await?
        {
            let doc = self
                .store
                .load(doctype::PAYMENT_REQUEST, reference_id)
                .await?;
            return PaymentRequest::from_document(&doc).map(Some);
        }

        let Some(invoice_name) = invoice_name else {
            return Ok(None);
        };
        let doc = self
            .store
            .find(
                doctype::PAYMENT_REQUEST,
                &[
                    ("reference_doctype", Value::from(doctype::SALES_INVOICE)),
                    ("reference_name", Value::from(invoice_name)),
                ],
            )
            .await?;
        doc.as_ref().map(PaymentRequest::from_document).transpose()
    }

    /// The one active (neither paid nor cancelled) payment request raised
    /// against this invoice, if any.
    async fn find_active_payment_request(
        &self,
        invoice: &SalesInvoice,
    ) -> AppResult<Option<PaymentRequest>> {
        let existing = self
            .store
            .find(
                doctype::PAYMENT_REQUEST,
                &[
                    ("reference_doctype", Value::from(doctype::SALES_INVOICE)),
                    ("reference_name", Value::from(invoice.name.as_str())),
                ],
            )
            .await?;

        if let Some(doc) = existing {
            let request = PaymentRequest::from_document(&doc)?;
            if !matches!(
                request.status,
                PaymentRequestStatus::Paid | PaymentRequestStatus::Cancelled
            ) {
                return Ok(Some(request));
            }
        }
        Ok(None)
    }

    async fn create_payment_request(
        &self,
        invoice: &SalesInvoice,
        credentials: &GatewayCredentials,
        amount: f64,
    ) -> AppResult<PaymentRequest> {
        let fields = PaymentRequest::creation_fields(
            doctype::SALES_INVOICE,
            &invoice.name,
            amount,
            &invoice.currency,
            &PaymentChannel::Phone,
            &credentials.name,
        );
        let doc = self.store.create(doctype::PAYMENT_REQUEST, fields).await?;
        PaymentRequest::from_document(&doc)
    }

    async fn commit_hold(
        &self,
        transaction_id: &str,
        reference_id: &str,
        handle: &LogHandle,
    ) -> AppResult<GatewayResponse> {
        let envelope = self.gateway.prepare_commit(&CommitRequest {
            transaction_id: transaction_id.to_string(),
            reference_id: reference_id.to_string(),
        })?;

        let response = match self.gateway.dispatch(&envelope).await {
            Ok(response) => response,
            Err(err) => {
                self.abort(handle, None, &err).await;
                return Err(err);
            }
        };

        let committed = response.is_ok() || response.message() == Some(STATE_RCS_SUCCESS);
        if !committed {
            let err = AppError::reconciliation(format!(
                "preauthorize commit failed: {}",
                response.message_or("no gateway message")
            ));
            self.abort(handle, Some(&response), &err).await;
            return Err(err);
        }
        Ok(response)
    }

    /// Shared settlement step. Marks the payment request Paid, then creates
    /// and submits a payment entry unless one already exists for this
    /// (reference id, posting date) pair. Returns the entry name, or None
    /// when the existence check found a prior one.
    async fn record_payment(
        &self,
        ctx: &ExecutionContext,
        invoice: &SalesInvoice,
        request: Option<&PaymentRequest>,
        reference_id: &str,
        amount: f64,
        currency: &str,
    ) -> AppResult<Option<String>> {
        match self
            .record_payment_inner(ctx, invoice, request, reference_id, amount, currency)
            .await
        {
            Ok(entry) => Ok(entry),
            Err(err @ AppError::Reconciliation { .. }) => Err(err),
            Err(err) => Err(AppError::reconciliation(err.to_string())),
        }
    }

    async fn record_payment_inner(
        &self,
        ctx: &ExecutionContext,
        invoice: &SalesInvoice,
        request: Option<&PaymentRequest>,
        reference_id: &str,
        amount: f64,
        currency: &str,
    ) -> AppResult<Option<String>> {
        if let Some(request) = request {
            self.mark_request_paid(request).await?;
        }

        let posting_date = invoice.posting_date.format("%Y-%m-%d").to_string();
        let existing = self
            .store
            .find(
                doctype::PAYMENT_ENTRY,
                &[
                    ("reference_no", Value::from(reference_id)),
                    ("reference_date", Value::from(posting_date.as_str())),
                ],
            )
            .await?;
        if let Some(existing) = existing {
            info!(
                reference_id = %reference_id,
                payment_entry = %existing.name,
                "payment entry already recorded; skipping creation"
            );
            return Ok(None);
        }

        let account_currency = request
            .and_then(|r| r.payment_account_currency.clone())
            .unwrap_or_else(|| invoice.company_currency.clone());

        let source_exchange_rate = if account_currency != invoice.company_currency {
            round2(
                self.rates
                    .rate(&account_currency, &invoice.company_currency, invoice.posting_date)
                    .await?,
            )
        } else {
            1.0
        };
        let target_exchange_rate = if currency != invoice.company_currency {
            round2(
                self.rates
                    .rate(currency, &invoice.company_currency, invoice.posting_date)
                    .await?,
            )
        } else {
            1.0
        };

        let entry = PaymentEntry {
            company: invoice.company.clone(),
            posting_date: invoice.posting_date,
            party: invoice.customer.clone(),
            paid_amount: amount,
            received_amount: amount,
            paid_currency: currency.to_string(),
            source_exchange_rate,
            target_exchange_rate,
            reference_no: reference_id.to_string(),
            reference_date: invoice.posting_date,
            paid_to: invoice.debit_to.clone(),
            references: vec![PaymentEntryReference {
                reference_doctype: doctype::SALES_INVOICE.to_string(),
                reference_name: invoice.name.clone(),
                total_amount: invoice.outstanding_amount,
                outstanding_amount: invoice.outstanding_amount,
                allocated_amount: amount,
            }],
        };

        let doc = self
            .store
            .create(doctype::PAYMENT_ENTRY, entry.creation_fields()?)
            .await?;
        let submitted = self.store.submit(&doc).await?;

        info!(
            actor = %ctx.actor,
            elevated = ctx.elevated,
            payment_entry = %submitted.name,
            reference_id = %reference_id,
            amount,
            "payment entry submitted"
        );
        Ok(Some(submitted.name))
    }

    async fn mark_request_paid(&self, request: &PaymentRequest) -> AppResult<()> {
        let mut doc = self
            .store
            .load(doctype::PAYMENT_REQUEST, &request.name)
            .await?;
        if doc.docstatus == DocStatus::Draft {
            doc = self.store.submit(&doc).await?;
        }
        doc.set(
            "status",
            Value::from(PaymentRequestStatus::Paid.as_str()),
        );
        self.store.save(&doc).await
    }

    /// Close the log as Failed on the way out of an aborted run. Closing
    /// failures are reported but never mask the error being surfaced.
    async fn abort(
        &self,
        handle: &LogHandle,
        response: Option<&GatewayResponse>,
        err: &AppError,
    ) {
        if let Err(close_err) = self
            .log
            .close_failure(handle, response, &err.to_string())
            .await
        {
            error!(
                log = %handle.name,
                "could not close transaction log entry: {close_err}"
            );
        }
    }
}
