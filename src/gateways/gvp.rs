use std::collections::BTreeMap;

use crate::config::GvpConfig;
use crate::domain::order::SaleLine;
use crate::domain::payment::{
    BookingDetails, CustomerInfo, OrderDetails, PaymentIntent, PurchaseKind, VerifiedPaymentResult,
    CURRENCY_CODE,
};
use crate::error::PaymentError;
use crate::gateways::{GatewayCallback, InitiateOutcome, PaymentGateway, RedirectInstruction};
use crate::hashcodec;

// Gateway-defined field names, shared by the initiation form and the callback.
const F_TERMINAL_ID: &str = "terminalid";
const F_ORDER_ID: &str = "orderid";
const F_AMOUNT: &str = "txnamount";
const F_CURRENCY: &str = "txncurrencycode";
const F_SUCCESS_URL: &str = "successurl";
const F_ERROR_URL: &str = "errorurl";
const F_TXN_TYPE: &str = "txntype";
const F_INSTALLMENTS: &str = "txninstallmentcount";
const F_SECURE_HASH: &str = "secure3dhash";
const F_PROC_RETURN_CODE: &str = "procreturncode";
const F_ERROR_MESSAGE: &str = "errmsg";
const F_TRANSACTION_ID: &str = "transid";
const F_HOST_REF: &str = "hostrefnum";

// Merchant fields echoed by the gateway so the callback carries the full
// purchase context.
const F_CUSTOMER_NAME: &str = "customername";
const F_CUSTOMER_EMAIL: &str = "customeremail";
const F_CUSTOMER_PHONE: &str = "customerphone";
const F_PURCHASE_KIND: &str = "purchasekind";
const F_VENUE_TR: &str = "venuetr";
const F_VENUE_EN: &str = "venueen";
const F_SLOT_START: &str = "slotstart";
const F_SLOT_END: &str = "slotend";
const F_PEOPLE: &str = "people";
const F_NOTES: &str = "notes";
const F_EVENT_ID: &str = "eventid";
const F_EVENT_SLUG: &str = "eventslug";
const F_EVENT_DATE: &str = "eventdate";
const F_TICKET_LINES: &str = "ticketlines";

const KIND_BOOKING: &str = "BOOKING";
const KIND_TICKETS: &str = "TICKETS";

const TXN_TYPE_SALES: &str = "sales";
const APPROVED_CODE: &str = "00";

/// Virtual-POS adapter: 3D-secure redirect out, signed form POST back.
pub struct GvpGateway {
    pub config: GvpConfig,
    pub success_url: String,
    pub error_url: String,
}

#[async_trait::async_trait]
impl PaymentGateway for GvpGateway {
    fn name(&self) -> &'static str {
        "gvp"
    }

    async fn initiate(&self, intent: &PaymentIntent) -> Result<InitiateOutcome, PaymentError> {
        let amount = intent.amount_minor.to_string();
        let hashed_password = hashcodec::hashed_password(
            &self.config.provision_password,
            &self.config.terminal_id,
        );
        let secure3dhash = hashcodec::initiation_hash(&hashcodec::InitiationHashInput {
            terminal_id: &self.config.terminal_id,
            order_id: &intent.order_id,
            amount_minor: &amount,
            currency_code: CURRENCY_CODE,
            success_url: &self.success_url,
            error_url: &self.error_url,
            txn_type: TXN_TYPE_SALES,
            installment_count: "",
            store_key: &self.config.store_key,
            hashed_password: &hashed_password,
        });

        let mut fields: Vec<(String, String)> = vec![
            (F_TERMINAL_ID.into(), self.config.terminal_id.clone()),
            (F_ORDER_ID.into(), intent.order_id.clone()),
            (F_AMOUNT.into(), amount),
            (F_CURRENCY.into(), CURRENCY_CODE.into()),
            (F_SUCCESS_URL.into(), self.success_url.clone()),
            (F_ERROR_URL.into(), self.error_url.clone()),
            (F_TXN_TYPE.into(), TXN_TYPE_SALES.into()),
            (F_INSTALLMENTS.into(), String::new()),
            (F_SECURE_HASH.into(), secure3dhash),
            (F_CUSTOMER_NAME.into(), intent.customer.name.clone()),
            (F_CUSTOMER_EMAIL.into(), intent.customer.email.clone()),
        ];
        if let Some(phone) = &intent.customer.phone {
            fields.push((F_CUSTOMER_PHONE.into(), phone.clone()));
        }
        push_purchase_fields(&mut fields, &intent.purchase)?;

        Ok(InitiateOutcome::Redirect(RedirectInstruction {
            action_url: self.config.gateway_url.clone(),
            fields,
        }))
    }
}

impl GvpGateway {
    /// Wraps a raw form POST. No validation happens here; `verified_result`
    /// is the integrity gate.
    pub fn parse_callback(&self, form: BTreeMap<String, String>) -> GatewayCallback {
        GatewayCallback::new(form)
    }

    /// Verifies the callback digest and, only then, reads the payment
    /// outcome out of it. `Err(Integrity)` means no other field was trusted.
    pub fn verified_result(
        &self,
        callback: &GatewayCallback,
    ) -> Result<VerifiedPaymentResult, PaymentError> {
        if !hashcodec::verify_callback(&callback.fields, &self.config.store_key) {
            tracing::warn!(
                target: "security",
                gateway = self.name(),
                order_hint = callback.get(F_ORDER_ID),
                "callback digest mismatch, rejecting"
            );
            return Err(PaymentError::Integrity);
        }

        let proc_return_code = callback.get(F_PROC_RETURN_CODE);
        let success = proc_return_code == APPROVED_CODE;
        let amount_minor = callback
            .get(F_AMOUNT)
            .parse::<i64>()
            .map_err(|_| PaymentError::InvalidRequest("unparseable txnamount".into()))?;

        Ok(VerifiedPaymentResult {
            order_id: callback.get(F_ORDER_ID).to_string(),
            amount_minor,
            success,
            error_code: if success {
                None
            } else {
                Some(proc_return_code.to_string())
            },
            error_message: if success {
                None
            } else {
                callback.get_opt(F_ERROR_MESSAGE)
            },
            gateway_transaction_id: callback
                .get_opt(F_TRANSACTION_ID)
                .or_else(|| callback.get_opt(F_HOST_REF)),
        })
    }

    /// Rebuilds the customer echoed through the gateway.
    pub fn customer_from_callback(&self, callback: &GatewayCallback) -> CustomerInfo {
        CustomerInfo {
            name: callback.get(F_CUSTOMER_NAME).to_string(),
            email: callback.get(F_CUSTOMER_EMAIL).to_string(),
            phone: callback.get_opt(F_CUSTOMER_PHONE),
        }
    }

    /// Rebuilds the purchase context echoed through the gateway. Callers must
    /// verify the callback first; these fields are covered by `hashparams` on
    /// a well-behaved gateway.
    pub fn purchase_from_callback(
        &self,
        callback: &GatewayCallback,
    ) -> Result<PurchaseKind, PaymentError> {
        match callback.get(F_PURCHASE_KIND) {
            KIND_BOOKING => Ok(PurchaseKind::Booking(BookingDetails {
                venue_tr: callback.get(F_VENUE_TR).to_string(),
                venue_en: callback.get(F_VENUE_EN).to_string(),
                start_time: parse_time(callback.get(F_SLOT_START))?,
                end_time: parse_time(callback.get(F_SLOT_END))?,
                people: callback
                    .get(F_PEOPLE)
                    .parse::<i32>()
                    .map_err(|_| PaymentError::InvalidRequest("unparseable people count".into()))?,
                notes: callback.get_opt(F_NOTES),
            })),
            KIND_TICKETS => {
                let lines: Vec<SaleLine> = serde_json::from_str(callback.get(F_TICKET_LINES))
                    .map_err(|_| {
                        PaymentError::InvalidRequest("unparseable ticket lines".into())
                    })?;
                let event_date = match callback.get_opt(F_EVENT_DATE) {
                    Some(raw) => Some(parse_time(&raw)?),
                    None => None,
                };
                Ok(PurchaseKind::Tickets(OrderDetails {
                    event_id: callback.get(F_EVENT_ID).to_string(),
                    event_slug: callback.get(F_EVENT_SLUG).to_string(),
                    event_date,
                    lines,
                }))
            }
            other => Err(PaymentError::InvalidRequest(format!(
                "unknown purchase kind {other:?}"
            ))),
        }
    }
}

fn push_purchase_fields(
    fields: &mut Vec<(String, String)>,
    purchase: &PurchaseKind,
) -> Result<(), PaymentError> {
    match purchase {
        PurchaseKind::Booking(details) => {
            fields.push((F_PURCHASE_KIND.into(), KIND_BOOKING.into()));
            fields.push((F_VENUE_TR.into(), details.venue_tr.clone()));
            fields.push((F_VENUE_EN.into(), details.venue_en.clone()));
            fields.push((F_SLOT_START.into(), details.start_time.to_rfc3339()));
            fields.push((F_SLOT_END.into(), details.end_time.to_rfc3339()));
            fields.push((F_PEOPLE.into(), details.people.to_string()));
            if let Some(notes) = &details.notes {
                fields.push((F_NOTES.into(), notes.clone()));
            }
        }
        PurchaseKind::Tickets(details) => {
            fields.push((F_PURCHASE_KIND.into(), KIND_TICKETS.into()));
            fields.push((F_EVENT_ID.into(), details.event_id.clone()));
            fields.push((F_EVENT_SLUG.into(), details.event_slug.clone()));
            if let Some(date) = details.event_date {
                fields.push((F_EVENT_DATE.into(), date.to_rfc3339()));
            }
            let lines = serde_json::to_string(&details.lines)
                .map_err(|e| PaymentError::InvalidRequest(e.to_string()))?;
            fields.push((F_TICKET_LINES.into(), lines));
        }
    }
    Ok(())
}

fn parse_time(raw: &str) -> Result<chrono::DateTime<chrono::Utc>, PaymentError> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&chrono::Utc))
        .map_err(|_| PaymentError::InvalidRequest(format!("unparseable timestamp {raw:?}")))
}
