/// What the payment provider needs to sell one tour to one customer.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub tour_id: String,
    pub tour_name: String,
    pub summary: String,
    pub image_url: String,
    /// Whole currency units; the gateway converts to the smallest unit.
    pub price: f64,
    pub customer_email: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    CheckoutCompleted {
        tour_id: String,
        customer_email: String,
        amount: f64,
    },
    Ignored(String),
}
