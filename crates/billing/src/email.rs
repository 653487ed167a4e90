//! Billing email notifications (Resend)
//!
//! Degrades to a no-op when RESEND_API_KEY is missing so billing keeps
//! working in environments without email configured.

use serde_json::json;

use crate::error::{BillingError, BillingResult};

const RESEND_API_URL: &str = "https://api.resend.com";

/// Email service for billing notifications
#[derive(Clone)]
pub struct BillingEmailService {
    client: reqwest::Client,
    api_key: Option<String>,
    from_address: String,
    base_url: String,
}

impl BillingEmailService {
    pub fn from_env() -> Self {
        let api_key = std::env::var("RESEND_API_KEY")
            .ok()
            .filter(|k| !k.is_empty());
        let from_address = std::env::var("EMAIL_FROM")
            .unwrap_or_else(|_| "Locagest <no-reply@locagest.app>".to_string());

        Self {
            client: reqwest::Client::new(),
            api_key,
            from_address,
            base_url: RESEND_API_URL.to_string(),
        }
    }

    /// Construct against a specific API endpoint (tests).
    pub fn with_base_url(api_key: &str, from_address: &str, base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: Some(api_key.to_string()),
            from_address: from_address.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// Trial ending soon (triggered by the trial_will_end webhook).
    pub async fn send_trial_ending(
        &self,
        to: &str,
        company_name: &str,
        days_remaining: i64,
    ) -> BillingResult<()> {
        let subject = format!("Seu período de teste termina em {days_remaining} dia(s)");
        let html = format!(
            "<p>Olá, {company_name}!</p>\
             <p>Seu período de teste do Locagest termina em {days_remaining} dia(s). \
             Para manter o acesso ao sistema, assine um plano em \
             <a href=\"https://app.locagest.app/assinatura\">Assinatura</a>.</p>"
        );
        self.send(to, &subject, &html).await
    }

    /// Payment failed notice.
    pub async fn send_payment_failed(&self, to: &str, company_name: &str) -> BillingResult<()> {
        let subject = "Falha no pagamento da sua assinatura".to_string();
        let html = format!(
            "<p>Olá, {company_name}!</p>\
             <p>Não conseguimos processar o pagamento da sua assinatura. \
             Atualize sua forma de pagamento em \
             <a href=\"https://app.locagest.app/assinatura-gestao\">Gestão da assinatura</a> \
             para evitar o bloqueio do acesso.</p>"
        );
        self.send(to, &subject, &html).await
    }

    async fn send(&self, to: &str, subject: &str, html: &str) -> BillingResult<()> {
        let Some(api_key) = &self.api_key else {
            tracing::debug!(to = %to, subject = %subject, "Email not configured, skipping send");
            return Ok(());
        };

        let body = json!({
            "from": self.from_address,
            "to": [to],
            "subject": subject,
            "html": html,
        });

        let response = self
            .client
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| BillingError::Email(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BillingError::Email(format!(
                "Resend API error ({status}): {body}"
            )));
        }

        tracing::info!(to = %to, subject = %subject, "Billing email sent");
        Ok(())
    }
}
