//! Stripe webhook handling
//!
//! Verifies signatures, claims events atomically for idempotent processing,
//! and reconciles subscription state onto `company_profiles`. The gating
//! logic reads that table on every access decision, so webhook lag only
//! delays a verdict change; it never corrupts one.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use sqlx::PgPool;
use stripe::{Event, EventObject, EventType, Subscription, Webhook};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::client::StripeClient;
use crate::customer::CustomerService;
use crate::email::BillingEmailService;
use crate::error::{BillingError, BillingResult};
use crate::subscriptions::SubscriptionService;

type HmacSha256 = Hmac<Sha256>;

/// Signature timestamp tolerance (seconds)
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Re-claim events stuck in `processing` after this many minutes.
const PROCESSING_TIMEOUT_MINUTES: i32 = 30;

/// Stripe customer ID out of an expandable reference, expanded or not.
fn expandable_customer_id(customer: &stripe::Expandable<stripe::Customer>) -> String {
    match customer {
        stripe::Expandable::Id(id) => id.to_string(),
        stripe::Expandable::Object(c) => c.id.to_string(),
    }
}

/// Parse Stripe's `t=timestamp,v1=signature` header.
fn parse_signature_header(signature: &str) -> Option<(i64, String)> {
    let mut timestamp: Option<i64> = None;
    let mut v1: Option<String> = None;

    for part in signature.split(',') {
        match part.splitn(2, '=').collect::<Vec<_>>()[..] {
            ["t", value] => timestamp = value.parse().ok(),
            ["v1", value] => v1 = Some(value.to_string()),
            _ => {}
        }
    }

    Some((timestamp?, v1?))
}

/// Manual signature verification for Stripe API versions newer than the
/// client library understands.
fn verify_signature_manual(
    payload: &str,
    signature: &str,
    webhook_secret: &str,
    now_unix: i64,
) -> BillingResult<()> {
    let (timestamp, v1_signature) =
        parse_signature_header(signature).ok_or(BillingError::WebhookSignatureInvalid)?;

    if (now_unix - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        tracing::error!(
            timestamp = timestamp,
            now = now_unix,
            "Webhook timestamp outside tolerance"
        );
        return Err(BillingError::WebhookSignatureInvalid);
    }

    let secret_key = webhook_secret
        .strip_prefix("whsec_")
        .unwrap_or(webhook_secret);
    let signed_payload = format!("{timestamp}.{payload}");

    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes())
        .map_err(|_| BillingError::WebhookSignatureInvalid)?;
    mac.update(signed_payload.as_bytes());
    let computed = hex::encode(mac.finalize().into_bytes());

    if computed != v1_signature {
        tracing::error!("Webhook signature mismatch");
        return Err(BillingError::WebhookSignatureInvalid);
    }

    Ok(())
}

/// Webhook handler for Stripe events
pub struct WebhookHandler {
    stripe: StripeClient,
    pool: PgPool,
    email: BillingEmailService,
}

impl WebhookHandler {
    pub fn new(stripe: StripeClient, pool: PgPool, email: BillingEmailService) -> Self {
        Self {
            stripe,
            pool,
            email,
        }
    }

    /// Verify and parse a Stripe webhook event.
    ///
    /// Tries the client library first, then falls back to manual HMAC
    /// verification (the library rejects events from newer API versions).
    pub fn verify_event(&self, payload: &str, signature: &str) -> BillingResult<Event> {
        let webhook_secret = &self.stripe.config().webhook_secret;

        match Webhook::construct_event(payload, signature, webhook_secret) {
            Ok(event) => return Ok(event),
            Err(e) => {
                tracing::warn!(
                    stripe_error = %e,
                    "Standard webhook parsing failed, trying manual verification"
                );
            }
        }

        let now = OffsetDateTime::now_utc().unix_timestamp();
        verify_signature_manual(payload, signature, webhook_secret, now)?;

        let event: Event = serde_json::from_str(payload).map_err(|e| {
            tracing::error!(parse_error = %e, "Failed to parse webhook event JSON");
            BillingError::WebhookSignatureInvalid
        })?;

        tracing::info!(
            event_type = %event.type_,
            event_id = %event.id,
            "Manual webhook verification succeeded"
        );

        Ok(event)
    }

    /// Handle a verified Stripe event.
    ///
    /// The INSERT...ON CONFLICT...RETURNING claim guarantees only one
    /// concurrent delivery processes a given event; events stuck in
    /// `processing` past the timeout can be re-claimed.
    pub async fn handle_event(&self, event: Event) -> BillingResult<()> {
        let event_id = event.id.to_string();
        let event_type = event.type_.to_string();
        let event_timestamp = OffsetDateTime::from_unix_timestamp(event.created)
            .unwrap_or_else(|_| OffsetDateTime::now_utc());

        let claimed: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO stripe_webhook_events
                (stripe_event_id, event_type, event_timestamp, processing_result, processing_started_at)
            VALUES ($1, $2, $3, 'processing', NOW())
            ON CONFLICT (stripe_event_id) DO UPDATE SET
                processing_result = 'processing',
                processing_started_at = NOW()
            WHERE stripe_webhook_events.processing_result = 'processing'
              AND stripe_webhook_events.processing_started_at < NOW() - ($4::TEXT || ' minutes')::INTERVAL
            RETURNING id
            "#,
        )
        .bind(&event_id)
        .bind(&event_type)
        .bind(event_timestamp)
        .bind(PROCESSING_TIMEOUT_MINUTES)
        .fetch_optional(&self.pool)
        .await?;

        if claimed.is_none() {
            tracing::info!(
                event_id = %event_id,
                event_type = %event_type,
                "Duplicate webhook event, skipping"
            );
            return Ok(());
        }

        let result = self.process_event(&event).await;

        let (processing_result, error_message) = match &result {
            Ok(()) => ("success", None),
            Err(e) => ("error", Some(e.to_string())),
        };

        if let Err(e) = sqlx::query(
            "UPDATE stripe_webhook_events SET processing_result = $1, error_message = $2 WHERE stripe_event_id = $3",
        )
        .bind(processing_result)
        .bind(&error_message)
        .bind(&event_id)
        .execute(&self.pool)
        .await
        {
            tracing::error!(
                event_id = %event_id,
                error = %e,
                "Failed to update webhook audit record"
            );
        }

        result
    }

    async fn process_event(&self, event: &Event) -> BillingResult<()> {
        match event.type_ {
            EventType::CheckoutSessionCompleted => {
                self.handle_checkout_completed(event.clone()).await
            }
            EventType::CustomerSubscriptionCreated | EventType::CustomerSubscriptionUpdated => {
                self.handle_subscription_changed(event.clone()).await
            }
            EventType::CustomerSubscriptionDeleted => {
                self.handle_subscription_deleted(event.clone()).await
            }
            EventType::CustomerSubscriptionTrialWillEnd => {
                self.handle_trial_will_end(event.clone()).await
            }
            EventType::InvoicePaymentFailed => self.handle_payment_failed(event.clone()).await,
            _ => {
                tracing::info!(
                    event_type = %event.type_,
                    event_id = %event.id,
                    "Received unhandled Stripe event type - no handler configured"
                );
                Ok(())
            }
        }
    }

    async fn handle_checkout_completed(&self, event: Event) -> BillingResult<()> {
        let session = match event.data.object {
            EventObject::CheckoutSession(session) => session,
            _ => {
                return Err(BillingError::WebhookEventNotSupported(
                    "Expected CheckoutSession".to_string(),
                ))
            }
        };

        let company_id = session
            .metadata
            .as_ref()
            .and_then(|m| m.get("company_id"))
            .and_then(|id| Uuid::parse_str(id).ok())
            .ok_or_else(|| {
                BillingError::Internal("company_id not found in session metadata".to_string())
            })?;

        let subscriptions = SubscriptionService::new(self.stripe.clone(), self.pool.clone());
        subscriptions.mark_active(company_id).await?;

        tracing::info!(
            company_id = %company_id,
            session_id = %session.id,
            "Checkout completed, tenant activated"
        );

        Ok(())
    }

    async fn handle_subscription_changed(&self, event: Event) -> BillingResult<()> {
        let subscription = self.extract_subscription(event)?;
        let company_id = self.resolve_company(&subscription).await?;

        let subscriptions = SubscriptionService::new(self.stripe.clone(), self.pool.clone());
        subscriptions
            .sync_subscription_to_db(company_id, &subscription)
            .await
    }

    async fn handle_subscription_deleted(&self, event: Event) -> BillingResult<()> {
        let subscription = self.extract_subscription(event)?;
        let company_id = self.resolve_company(&subscription).await?;

        let subscriptions = SubscriptionService::new(self.stripe.clone(), self.pool.clone());
        subscriptions.mark_cancelled(company_id).await
    }

    async fn handle_trial_will_end(&self, event: Event) -> BillingResult<()> {
        let subscription = self.extract_subscription(event)?;
        let company_id = self.resolve_company(&subscription).await?;

        tracing::info!(
            company_id = %company_id,
            subscription_id = %subscription.id,
            trial_end = ?subscription.trial_end,
            "Trial period ending soon"
        );

        if let Some((email, name)) = self.owner_contact(company_id).await? {
            let days_remaining = subscription
                .trial_end
                .map(|end| {
                    let now = OffsetDateTime::now_utc().unix_timestamp();
                    ((end - now) / 86_400).max(1)
                })
                .unwrap_or(3);

            if let Err(e) = self
                .email
                .send_trial_ending(&email, &name, days_remaining)
                .await
            {
                // Notification failure must not fail the webhook.
                tracing::error!(company_id = %company_id, error = %e, "Failed to send trial ending email");
            }
        }

        Ok(())
    }

    async fn handle_payment_failed(&self, event: Event) -> BillingResult<()> {
        let invoice = match event.data.object {
            EventObject::Invoice(invoice) => invoice,
            _ => {
                return Err(BillingError::WebhookEventNotSupported(
                    "Expected Invoice".to_string(),
                ))
            }
        };

        let customer_id = invoice
            .customer
            .as_ref()
            .map(expandable_customer_id)
            .ok_or_else(|| {
                BillingError::Internal("Invoice has no customer".to_string())
            })?;

        let customers = CustomerService::new(self.stripe.clone(), self.pool.clone());
        let company_id = customers.company_id_for_customer(&customer_id).await?;

        tracing::warn!(
            company_id = %company_id,
            invoice_id = %invoice.id,
            "Invoice payment failed"
        );

        if let Some((email, name)) = self.owner_contact(company_id).await? {
            if let Err(e) = self.email.send_payment_failed(&email, &name).await {
                // Notification failure must not fail the webhook; Stripe keeps
                // retrying the payment regardless.
                tracing::error!(company_id = %company_id, error = %e, "Failed to send payment failed email");
            }
        }

        Ok(())
    }

    fn extract_subscription(&self, event: Event) -> BillingResult<Subscription> {
        match event.data.object {
            EventObject::Subscription(subscription) => Ok(subscription),
            _ => Err(BillingError::WebhookEventNotSupported(
                "Expected Subscription".to_string(),
            )),
        }
    }

    /// Resolve the tenant from subscription metadata, falling back to the
    /// stored Stripe customer ID.
    async fn resolve_company(&self, subscription: &Subscription) -> BillingResult<Uuid> {
        if let Some(id) = subscription
            .metadata
            .get("company_id")
            .and_then(|id| Uuid::parse_str(id).ok())
        {
            return Ok(id);
        }

        let customer_id = expandable_customer_id(&subscription.customer);

        let customers = CustomerService::new(self.stripe.clone(), self.pool.clone());
        customers.company_id_for_customer(&customer_id).await
    }

    async fn owner_contact(&self, company_id: Uuid) -> BillingResult<Option<(String, String)>> {
        let row: Option<(Option<String>, String)> =
            sqlx::query_as("SELECT email, name FROM company_profiles WHERE id = $1")
                .bind(company_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.and_then(|(email, name)| email.map(|e| (e, name))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(payload: &str, secret: &str, timestamp: i64) -> String {
        let key = secret.strip_prefix("whsec_").unwrap_or(secret);
        let mut mac = HmacSha256::new_from_slice(key.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.{payload}").as_bytes());
        format!(
            "t={timestamp},v1={}",
            hex::encode(mac.finalize().into_bytes())
        )
    }

    #[test]
    fn resolves_customer_id_from_unexpanded_reference() {
        let customer: stripe::Expandable<stripe::Customer> =
            stripe::Expandable::Id("cus_test123".parse().unwrap());
        assert_eq!(expandable_customer_id(&customer), "cus_test123");
    }

    #[test]
    fn parses_signature_header() {
        let (t, v1) = parse_signature_header("t=1700000000,v1=abc123,v0=old").unwrap();
        assert_eq!(t, 1_700_000_000);
        assert_eq!(v1, "abc123");
    }

    #[test]
    fn rejects_header_missing_parts() {
        assert!(parse_signature_header("v1=abc").is_none());
        assert!(parse_signature_header("t=123").is_none());
        assert!(parse_signature_header("garbage").is_none());
    }

    #[test]
    fn accepts_valid_manual_signature() {
        let payload = r#"{"id":"evt_1"}"#;
        let secret = "whsec_test_secret";
        let now = 1_700_000_000;
        let header = sign(payload, secret, now);

        verify_signature_manual(payload, &header, secret, now).unwrap();
    }

    #[test]
    fn rejects_tampered_payload() {
        let secret = "whsec_test_secret";
        let now = 1_700_000_000;
        let header = sign(r#"{"id":"evt_1"}"#, secret, now);

        let err = verify_signature_manual(r#"{"id":"evt_2"}"#, &header, secret, now).unwrap_err();
        assert!(matches!(err, BillingError::WebhookSignatureInvalid));
    }

    #[test]
    fn rejects_stale_timestamp() {
        let payload = r#"{"id":"evt_1"}"#;
        let secret = "whsec_test_secret";
        let signed_at = 1_700_000_000;
        let header = sign(payload, secret, signed_at);

        let err = verify_signature_manual(
            payload,
            &header,
            secret,
            signed_at + SIGNATURE_TOLERANCE_SECS + 1,
        )
        .unwrap_err();
        assert!(matches!(err, BillingError::WebhookSignatureInvalid));
    }
}
