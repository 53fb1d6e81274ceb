use serde::Serialize;
use std::collections::BTreeMap;

use crate::domain::payment::PaymentIntent;
use crate::error::PaymentError;

pub mod gvp;
pub mod iyzico;

/// A form the customer's browser must POST to the gateway. Field order is
/// preserved because some gateways hash the form as submitted.
#[derive(Debug, Clone, Serialize)]
pub struct RedirectInstruction {
    pub action_url: String,
    pub fields: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub enum InitiateOutcome {
    /// Signed redirect form (virtual POS).
    Redirect(RedirectInstruction),
    /// Hosted checkout form token (provider renders the form).
    FormToken { token: String },
}

/// Raw callback payload as posted by a gateway, including its claimed digest
/// and digest field list. Exists only for the duration of verification.
#[derive(Debug, Clone)]
pub struct GatewayCallback {
    pub fields: BTreeMap<String, String>,
}

impl GatewayCallback {
    pub fn new(fields: BTreeMap<String, String>) -> Self {
        Self { fields }
    }

    /// Missing fields read as empty, the same convention the digest uses.
    pub fn get(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn get_opt(&self, name: &str) -> Option<String> {
        self.fields.get(name).filter(|v| !v.is_empty()).cloned()
    }
}

#[async_trait::async_trait]
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> &'static str;

    /// Builds the outbound payment initiation for an intent. No side effects
    /// beyond the provider call itself; nothing is persisted.
    async fn initiate(&self, intent: &PaymentIntent) -> Result<InitiateOutcome, PaymentError>;
}
