//! The data a sale page needs, delivered once when the page loads.
//!
//! The server embeds three JSON blobs into the point-of-sale page: the product list,
//! the payment methods and the current exchange rate. [`Catalog::parse`] is the only
//! place those blobs are read back; everything after it works on typed values.

use crate::models::{AppData, ProductKind};
use crate::money::{self, lenient_decimal};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("product list is not valid JSON: {0}")]
    Products(serde_json::Error),

    #[error("payment method list is not valid JSON: {0}")]
    PaymentMethods(serde_json::Error),

    #[error("exchange rate is not valid JSON: {0}")]
    ExchangeRate(serde_json::Error),
}

impl BootstrapError {
    /// Banner text shown to the operator; the page is unusable until reloaded.
    pub fn user_message(&self) -> &'static str {
        "Error crítico al cargar datos del sistema (precios, tasa). Recargue la página."
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub code: String,
    pub name: String,
    /// `None` when the server sent a price that is not a number.
    pub unit_price: Option<Decimal>,
    pub kind: ProductKind,
}

impl Product {
    pub fn is_bulk_liquid(&self) -> bool {
        self.kind.is_bulk_liquid()
    }

    /// Price usable in totals: present and strictly positive.
    pub fn billable_price(&self) -> Option<Decimal> {
        self.unit_price.filter(|price| *price > Decimal::ZERO)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentMethod {
    pub name: String,
    pub is_local_currency: bool,
}

/// Read-only lookup tables for one page session.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: HashMap<String, Product>,
    methods: Vec<PaymentMethod>,
    exchange_rate: Decimal,
}

#[derive(Deserialize)]
struct ProductWire {
    #[serde(deserialize_with = "lenient_code")]
    codigo: String,
    #[serde(default)]
    nombre: String,
    #[serde(default, deserialize_with = "lenient_decimal")]
    precio_divisa: Option<Decimal>,
    #[serde(default)]
    tipo: Option<String>,
}

#[derive(Deserialize)]
struct PaymentMethodWire {
    nombre: String,
    #[serde(default)]
    es_bolivares: bool,
}

fn lenient_code<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(code) => code,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn blob_or<'a>(text: &'a str, fallback: &'a str) -> &'a str {
    let trimmed = text.trim();
    if trimmed.is_empty() { fallback } else { trimmed }
}

impl Catalog {
    pub fn new(products: Vec<Product>, methods: Vec<PaymentMethod>, exchange_rate: Decimal) -> Self {
        let products = products
            .into_iter()
            .map(|product| (product.code.clone(), product))
            .collect();
        Self {
            products,
            methods,
            exchange_rate,
        }
    }

    /// Parses the three page blobs. Blank blobs read as empty lists and a zero rate.
    pub fn parse(products_json: &str, methods_json: &str, rate_json: &str) -> Result<Self, BootstrapError> {
        let products: Vec<ProductWire> =
            serde_json::from_str(blob_or(products_json, "[]")).map_err(BootstrapError::Products)?;
        let methods: Vec<PaymentMethodWire> =
            serde_json::from_str(blob_or(methods_json, "[]")).map_err(BootstrapError::PaymentMethods)?;
        let rate: serde_json::Value =
            serde_json::from_str(blob_or(rate_json, "0")).map_err(BootstrapError::ExchangeRate)?;

        let products = products
            .into_iter()
            .map(|wire| Product {
                code: wire.codigo,
                name: wire.nombre,
                unit_price: wire.precio_divisa,
                kind: wire
                    .tipo
                    .as_deref()
                    .and_then(ProductKind::from_code)
                    .unwrap_or(ProductKind::Extra),
            })
            .collect();
        let methods = methods
            .into_iter()
            .map(|wire| PaymentMethod {
                name: wire.nombre,
                is_local_currency: wire.es_bolivares,
            })
            .collect();
        let exchange_rate = money::decimal_from_json(&rate).unwrap_or(Decimal::ZERO);

        Ok(Self::new(products, methods, exchange_rate))
    }

    pub fn from_payload(payload: &PagePayload) -> Result<Self, BootstrapError> {
        Self::parse(
            &payload.products_json(),
            &payload.payment_methods_json(),
            &payload.exchange_rate_json(),
        )
    }

    pub fn product(&self, code: &str) -> Option<&Product> {
        self.products.get(code)
    }

    /// Last method registered under `name` wins.
    pub fn payment_method(&self, name: &str) -> Option<&PaymentMethod> {
        self.methods.iter().rev().find(|method| method.name == name)
    }

    pub fn payment_methods(&self) -> &[PaymentMethod] {
        &self.methods
    }

    pub fn exchange_rate(&self) -> Decimal {
        self.exchange_rate
    }

    pub fn product_count(&self) -> usize {
        self.products.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductPayload {
    pub id: u64,
    pub codigo: String,
    pub nombre: String,
    pub precio_divisa: String,
    pub precio_bolivares: String,
    pub tipo: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentMethodPayload {
    pub id: u64,
    pub nombre: String,
    pub es_bolivares: bool,
}

/// Server side of the page data, serialized into the sale page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PagePayload {
    pub productos: Vec<ProductPayload>,
    pub metodos_pago: Vec<PaymentMethodPayload>,
    pub tasa_actual: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl PagePayload {
    pub fn from_store(data: &AppData) -> Self {
        let mut products: Vec<_> = data.products.iter().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));

        let productos = products
            .into_iter()
            .map(|product| ProductPayload {
                id: product.id,
                codigo: product.code.clone(),
                nombre: product.name.clone(),
                precio_divisa: money::fixed2(product.price_ref),
                precio_bolivares: money::fixed2(product.price_local),
                tipo: product.kind.code().to_string(),
            })
            .collect();
        let metodos_pago = data
            .payment_methods
            .iter()
            .map(|method| PaymentMethodPayload {
                id: method.id,
                nombre: method.name.clone(),
                es_bolivares: method.is_local_currency,
            })
            .collect();

        let (tasa_actual, warning) = match crate::rates::latest(data) {
            Some(record) => (money::fixed2(record.rate), None),
            None => (
                "1.00".to_string(),
                Some("No hay una tasa de cambio registrada. Usando una tasa predeterminada de 1.00.".to_string()),
            ),
        };

        Self {
            productos,
            metodos_pago,
            tasa_actual,
            warning,
        }
    }

    pub fn products_json(&self) -> String {
        serde_json::to_string(&self.productos).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn payment_methods_json(&self) -> String {
        serde_json::to_string(&self.metodos_pago).unwrap_or_else(|_| "[]".to_string())
    }

    /// The rate travels as a JSON string, e.g. `"36.50"`.
    pub fn exchange_rate_json(&self) -> String {
        serde_json::Value::String(self.tasa_actual.clone()).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExchangeRateRecord, PaymentMethodRecord, ProductRecord};
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn dec(text: &str) -> Decimal {
        Decimal::from_str(text).unwrap()
    }

    #[test]
    fn parse_reads_products_methods_and_rate() {
        let catalog = Catalog::parse(
            r#"[{"codigo":"A1","nombre":"Botellón","precio_divisa":"2.00","tipo":"botella_20l"},
                {"codigo":7,"nombre":"Litro","precio_divisa":0.05,"tipo":"agua_litros"}]"#,
            r#"[{"nombre":"Divisa $","es_bolivares":false},{"nombre":"Pago Móvil","es_bolivares":true}]"#,
            r#""36.50""#,
        )
        .unwrap();

        assert_eq!(catalog.product_count(), 2);
        assert_eq!(catalog.product("A1").unwrap().unit_price, Some(dec("2.00")));
        assert!(catalog.product("7").unwrap().is_bulk_liquid());
        assert!(catalog.payment_method("Pago Móvil").unwrap().is_local_currency);
        assert_eq!(catalog.exchange_rate(), dec("36.50"));
    }

    #[test]
    fn blank_blobs_give_an_empty_catalog() {
        let catalog = Catalog::parse("", "  ", "").unwrap();
        assert_eq!(catalog.product_count(), 0);
        assert!(catalog.payment_methods().is_empty());
        assert_eq!(catalog.exchange_rate(), Decimal::ZERO);
    }

    #[test]
    fn malformed_json_is_reported_once() {
        let err = Catalog::parse("[{", "[]", "1").unwrap_err();
        assert!(matches!(err, BootstrapError::Products(_)));
        let err = Catalog::parse("[]", "{}", "1").unwrap_err();
        assert!(matches!(err, BootstrapError::PaymentMethods(_)));
        let err = Catalog::parse("[]", "[]", "tasa").unwrap_err();
        assert!(matches!(err, BootstrapError::ExchangeRate(_)));
    }

    #[test]
    fn unusable_values_degrade_to_absent() {
        let catalog = Catalog::parse(
            r#"[{"codigo":"X","nombre":"Raro","precio_divisa":"gratis","tipo":"desconocido"}]"#,
            "[]",
            r#""sin tasa""#,
        )
        .unwrap();
        let product = catalog.product("X").unwrap();
        assert_eq!(product.unit_price, None);
        assert_eq!(product.billable_price(), None);
        assert_eq!(product.kind, ProductKind::Extra);
        assert_eq!(catalog.exchange_rate(), Decimal::ZERO);
    }

    #[test]
    fn payload_from_store_feeds_the_catalog() {
        let now = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap().and_hms_opt(9, 0, 0).unwrap();
        let mut data = AppData::default();
        data.products.push(ProductRecord {
            id: 1,
            code: "B20".into(),
            name: "Botellón 20L".into(),
            price_ref: dec("1.5"),
            price_local: dec("54.75"),
            stock: 10,
            kind: ProductKind::Bottle20L,
            created_at: now,
            updated_at: now,
        });
        data.payment_methods.push(PaymentMethodRecord {
            id: 2,
            name: "Efectivo BsD".into(),
            is_local_currency: true,
        });
        data.exchange_rates.push(ExchangeRateRecord {
            date: now.date(),
            rate: dec("36.5"),
        });

        let payload = PagePayload::from_store(&data);
        assert_eq!(payload.productos[0].precio_divisa, "1.50");
        assert_eq!(payload.exchange_rate_json(), r#""36.50""#);
        assert!(payload.warning.is_none());

        let catalog = Catalog::from_payload(&payload).unwrap();
        assert_eq!(catalog.product("B20").unwrap().unit_price, Some(dec("1.50")));
        assert_eq!(catalog.exchange_rate(), dec("36.50"));
    }

    #[test]
    fn payload_without_rate_falls_back_to_one() {
        let payload = PagePayload::from_store(&AppData::default());
        assert_eq!(payload.tasa_actual, "1.00");
        assert!(payload.warning.is_some());
    }
}
