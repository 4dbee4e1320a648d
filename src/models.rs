use crate::ledger::{LineItem, Payment};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ProductKind {
    #[serde(rename = "articulos_extra")]
    Extra,
    #[default]
    #[serde(rename = "agua_litros")]
    WaterByLiter,
    #[serde(rename = "botella_20l")]
    Bottle20L,
    #[serde(rename = "botella_10l")]
    Bottle10L,
    #[serde(rename = "botella_5l")]
    Bottle5L,
}

impl ProductKind {
    pub fn code(self) -> &'static str {
        match self {
            ProductKind::Extra => "articulos_extra",
            ProductKind::WaterByLiter => "agua_litros",
            ProductKind::Bottle20L => "botella_20l",
            ProductKind::Bottle10L => "botella_10l",
            ProductKind::Bottle5L => "botella_5l",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "articulos_extra" => Some(ProductKind::Extra),
            "agua_litros" => Some(ProductKind::WaterByLiter),
            "botella_20l" => Some(ProductKind::Bottle20L),
            "botella_10l" => Some(ProductKind::Bottle10L),
            "botella_5l" => Some(ProductKind::Bottle5L),
            _ => None,
        }
    }

    /// Sold by the liter straight from the cistern, in fractional quantities.
    pub fn is_bulk_liquid(self) -> bool {
        self == ProductKind::WaterByLiter
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: u64,
    pub code: String,
    pub name: String,
    pub price_ref: Decimal,
    pub price_local: Decimal,
    pub stock: i64,
    pub kind: ProductKind,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethodRecord {
    pub id: u64,
    pub name: String,
    pub is_local_currency: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeRateRecord {
    pub date: NaiveDate,
    pub rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CisternIntake {
    pub id: u64,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub volume: Decimal,
    pub liters_available: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub id: u64,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub customer_name: String,
    pub address: String,
    pub liters_delivered: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Promotion {
    pub id: u64,
    pub customer_name: String,
    pub phone: String,
    pub amount_paid_ref: Decimal,
    pub bottles_paid: u32,
    pub bottles_taken: u32,
    pub created_at: NaiveDateTime,
}

impl Promotion {
    pub fn bottles_pending(&self) -> u32 {
        self.bottles_paid.saturating_sub(self.bottles_taken)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SaleKind {
    #[default]
    Normal,
    Promotion,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleItem {
    pub product_code: String,
    pub product_name: String,
    pub kind: ProductKind,
    pub quantity: Decimal,
    pub subtotal_ref: Decimal,
    pub subtotal_local: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalePayment {
    pub method: String,
    pub is_local_currency: bool,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sale {
    pub id: u64,
    pub operator: String,
    pub sold_at: NaiveDateTime,
    pub total_ref: Decimal,
    pub total_local: Decimal,
    pub rate_used: Decimal,
    pub kind: SaleKind,
    #[serde(default)]
    pub items: Vec<SaleItem>,
    #[serde(default)]
    pub payments: Vec<SalePayment>,
}

/// What a signed-in user may do. The owner passes every role check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Trabajador,
    Encargada,
    Dueno,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Trabajador => "trabajador",
            Role::Encargada => "encargada",
            Role::Dueno => "dueno",
        }
    }

    pub fn may_act_as(self, allowed: &[Role]) -> bool {
        self == Role::Dueno || allowed.contains(&self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: u64,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

/// Everything the store keeps, persisted as one JSON document.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppData {
    pub next_id: u64,
    pub products: Vec<ProductRecord>,
    pub payment_methods: Vec<PaymentMethodRecord>,
    pub exchange_rates: Vec<ExchangeRateRecord>,
    pub cisterns: Vec<CisternIntake>,
    pub deliveries: Vec<Delivery>,
    pub promotions: Vec<Promotion>,
    pub sales: Vec<Sale>,
    pub users: Vec<UserRecord>,
}

impl AppData {
    pub fn allocate_id(&mut self) -> u64 {
        self.next_id = self.next_id.saturating_add(1);
        self.next_id
    }

    pub fn product_by_code(&self, code: &str) -> Option<&ProductRecord> {
        self.products.iter().find(|product| product.code == code)
    }

    pub fn payment_method(&self, name: &str) -> Option<&PaymentMethodRecord> {
        self.payment_methods.iter().find(|method| method.name == name)
    }
}

// ---- request bodies ----

/// Posted by the login form and by API clients.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterUserRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub code: String,
    pub name: String,
    pub price_ref: Decimal,
    #[serde(default)]
    pub price_local: Decimal,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub kind: ProductKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateInput {
    pub rate: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CisternInput {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub volume: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryInput {
    pub customer_name: String,
    pub address: String,
    pub liters_delivered: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromotionInput {
    pub customer_name: String,
    #[serde(default)]
    pub phone: String,
    pub amount_paid_ref: Decimal,
    pub bottles_paid: u32,
}

/// Hidden fields of the sale form.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SaleForm {
    #[serde(default)]
    pub items: String,
    #[serde(default)]
    pub pagos: String,
    #[serde(default)]
    pub csrfmiddlewaretoken: Option<String>,
}

/// Ledger state posted by the sale page to get its totals recomputed.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LedgerPreviewInput {
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub pagos: Vec<Payment>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct CisternQuery {
    pub fecha: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RangeQuery {
    pub rango: Option<String>,
    pub fecha_inicio: Option<String>,
    pub fecha_fin: Option<String>,
}

// ---- responses ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in_seconds: u64,
    pub username: String,
    pub role: Role,
}

/// A user as listed to the owner; the password hash never leaves the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserView {
    pub id: u64,
    pub username: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

impl From<&UserRecord> for UserView {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role: user.role,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PromoDecrementResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub botellas_restantes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SaleReceipt {
    pub id: u64,
    pub total_ref: Decimal,
    pub total_local: Decimal,
    pub rate_used: Decimal,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MethodTotal {
    pub method: String,
    pub is_local_currency: bool,
    pub total: Decimal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardResponse {
    pub date: NaiveDate,
    pub liters_available: Decimal,
    pub liters_sold_today: Decimal,
    pub collected_ref: Decimal,
    pub collected_local: Decimal,
    pub by_method: Vec<MethodTotal>,
    pub daily_labels: Vec<String>,
    pub daily_liters: Vec<Decimal>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ControlReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub range: String,
    pub total_sales_ref: Decimal,
    pub total_sales_local: Decimal,
    pub liters_sold: Decimal,
    pub by_method: Vec<MethodTotal>,
    pub date_labels: Vec<String>,
    pub daily_totals: Vec<Decimal>,
}
