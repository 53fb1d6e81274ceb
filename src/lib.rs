pub mod config;
pub mod domain {
    pub mod booking;
    pub mod order;
    pub mod payment;
}
pub mod error;
pub mod gateways;
pub mod hashcodec;
pub mod http {
    pub mod handlers {
        pub mod bookings;
        pub mod ops;
        pub mod orders;
        pub mod payments;
        pub mod rollups;
    }
    pub mod middleware {
        pub mod admin_auth;
    }
}
pub mod repo {
    pub mod bookings_repo;
    pub mod event_orders_repo;
    pub mod outbox_repo;
    pub mod rollups_repo;
}
pub mod service {
    pub mod checkout;
    pub mod reconciler;
    pub mod rollup_relay;
}

use axum::response::Redirect;

use crate::domain::payment::format_major;

/// Where callback handling sends the customer's browser. Callbacks never
/// render gateway payloads; they only redirect here.
#[derive(Clone)]
pub struct RedirectTargets {
    pub confirmation_url: String,
    pub failure_url: String,
    pub processing_url: String,
}

impl RedirectTargets {
    pub fn from_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            confirmation_url: format!("{base}/checkout/confirmation"),
            failure_url: format!("{base}/checkout/failed"),
            processing_url: format!("{base}/checkout/processing"),
        }
    }

    pub fn confirmation(&self, order_id: &str, amount_minor: i64) -> Redirect {
        self.redirect(
            &self.confirmation_url,
            &[("orderId", order_id), ("amount", &format_major(amount_minor))],
        )
    }

    pub fn failure(&self, reason: &str, code: Option<&str>) -> Redirect {
        let mut params = vec![("reason", reason)];
        if let Some(code) = code {
            params.push(("code", code));
        }
        self.redirect(&self.failure_url, &params)
    }

    pub fn processing(&self, order_id: &str) -> Redirect {
        self.redirect(&self.processing_url, &[("orderId", order_id)])
    }

    fn redirect(&self, url: &str, params: &[(&str, &str)]) -> Redirect {
        let query = serde_urlencoded::to_string(params).unwrap_or_default();
        Redirect::to(&format!("{url}?{query}"))
    }
}

#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::PgPool,
    pub checkout: service::checkout::CheckoutService,
    pub reconciler: service::reconciler::OrderReconciler,
    pub bookings_repo: repo::bookings_repo::BookingsRepo,
    pub event_orders_repo: repo::event_orders_repo::EventOrdersRepo,
    pub rollups_repo: repo::rollups_repo::RollupsRepo,
    pub outbox_repo: repo::outbox_repo::OutboxRepo,
    pub gvp: std::sync::Arc<gateways::gvp::GvpGateway>,
    pub iyzico: std::sync::Arc<gateways::iyzico::IyzicoGateway>,
    pub urls: RedirectTargets,
}
