//! Server-side check and recording of a finished sale.
//!
//! The sale page only enables its submit button once the ledger balances, but the
//! server recomputes everything from stored prices and the stored rate before it
//! accepts the sale.

use crate::cisterns::{self, CisternError};
use crate::ledger::{LineItem, Payment};
use crate::models::{AppData, ProductRecord, Sale, SaleItem, SaleKind, SalePayment, SaleReceipt};
use crate::money::{self, round2};
use crate::rates;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SaleError {
    #[error("Error en los datos enviados. Por favor, intente de nuevo. Detalle: {0}")]
    InvalidPayload(String),

    #[error("No se puede registrar una venta sin productos.")]
    NoItems,

    #[error("No se puede registrar una venta sin pagos.")]
    NoPayments,

    #[error("No hay una tasa de cambio registrada para hoy. Por favor, regístrela primero.")]
    NoExchangeRate,

    #[error("Producto {0} no encontrado.")]
    UnknownProduct(String),

    #[error("Método de pago {0} no encontrado.")]
    UnknownPaymentMethod(String),

    #[error("Cantidad inválida para el producto {0}.")]
    InvalidQuantity(String),

    #[error("Monto inválido para el método {0}.")]
    InvalidAmount(String),

    #[error(transparent)]
    Water(#[from] CisternError),

    #[error("El monto total de los pagos no coincide con el total de la venta. Saldo pendiente: ${pending}")]
    Unbalanced { pending: Decimal },
}

/// Items and payments as posted by the sale form.
#[derive(Debug, Clone)]
pub struct SaleDraft {
    pub items: Vec<LineItem>,
    pub payments: Vec<Payment>,
}

impl SaleDraft {
    pub fn parse(items_json: &str, payments_json: &str) -> Result<Self, SaleError> {
        let items = serde_json::from_str(or_empty(items_json))
            .map_err(|err| SaleError::InvalidPayload(err.to_string()))?;
        let payments = serde_json::from_str(or_empty(payments_json))
            .map_err(|err| SaleError::InvalidPayload(err.to_string()))?;
        Ok(Self { items, payments })
    }
}

fn or_empty(text: &str) -> &str {
    let trimmed = text.trim();
    if trimmed.is_empty() { "[]" } else { trimmed }
}

/// Validates the draft against stored prices, methods, rate and water level, then
/// records it. Nothing is changed unless every check passes.
pub fn finalize(
    data: &mut AppData,
    draft: SaleDraft,
    operator: &str,
    now: NaiveDateTime,
) -> Result<SaleReceipt, SaleError> {
    if draft.items.is_empty() {
        return Err(SaleError::NoItems);
    }
    if draft.payments.is_empty() {
        return Err(SaleError::NoPayments);
    }
    let rate = rates::latest(data)
        .map(|record| record.rate)
        .filter(|rate| *rate > Decimal::ZERO)
        .ok_or(SaleError::NoExchangeRate)?;

    let mut total_ref = Decimal::ZERO;
    let mut total_local = Decimal::ZERO;
    let mut liters = Decimal::ZERO;
    let mut items = Vec::with_capacity(draft.items.len());
    for item in &draft.items {
        let product = data
            .product_by_code(&item.code)
            .ok_or_else(|| SaleError::UnknownProduct(item.code.clone()))?;
        let invalid = || SaleError::InvalidQuantity(item.code.clone());
        if item.quantity <= Decimal::ZERO {
            return Err(invalid());
        }
        let subtotal_ref = product.price_ref.checked_mul(item.quantity).ok_or_else(invalid)?;
        let subtotal_local = subtotal_ref.checked_mul(rate).ok_or_else(invalid)?;
        total_ref = total_ref.checked_add(subtotal_ref).ok_or_else(invalid)?;
        total_local = total_local.checked_add(subtotal_local).ok_or_else(invalid)?;
        if product.kind.is_bulk_liquid() {
            liters = liters.checked_add(item.quantity).ok_or_else(invalid)?;
        }
        items.push(sale_item(product, item.quantity, subtotal_ref, subtotal_local));
    }

    if liters > Decimal::ZERO {
        cisterns::ensure_available(data, liters)?;
    }

    let mut total_paid_ref = Decimal::ZERO;
    let mut payments = Vec::with_capacity(draft.payments.len());
    for payment in &draft.payments {
        let method = data
            .payment_method(&payment.method)
            .ok_or_else(|| SaleError::UnknownPaymentMethod(payment.method.clone()))?;
        if payment.amount <= Decimal::ZERO {
            return Err(SaleError::InvalidAmount(payment.method.clone()));
        }
        let invalid = || SaleError::InvalidAmount(payment.method.clone());
        let converted = if method.is_local_currency {
            payment.amount.checked_div(rate).ok_or_else(invalid)?
        } else {
            payment.amount
        };
        total_paid_ref = total_paid_ref.checked_add(converted).ok_or_else(invalid)?;
        payments.push(SalePayment {
            method: method.name.clone(),
            is_local_currency: method.is_local_currency,
            amount: payment.amount,
        });
    }

    let difference = total_ref - total_paid_ref;
    if difference.abs() > money::cent() {
        let mut pending = round2(difference);
        pending.rescale(money::DECIMAL_PLACES);
        return Err(SaleError::Unbalanced { pending });
    }

    if liters > Decimal::ZERO {
        cisterns::draw(data, liters)?;
    }

    let sale = Sale {
        id: data.allocate_id(),
        operator: operator.to_string(),
        sold_at: now,
        total_ref,
        total_local,
        rate_used: rate,
        kind: SaleKind::Normal,
        items,
        payments,
    };
    let receipt = SaleReceipt {
        id: sale.id,
        total_ref: sale.total_ref,
        total_local: sale.total_local,
        rate_used: sale.rate_used,
    };
    data.sales.push(sale);
    Ok(receipt)
}

fn sale_item(product: &ProductRecord, quantity: Decimal, subtotal_ref: Decimal, subtotal_local: Decimal) -> SaleItem {
    SaleItem {
        product_code: product.code.clone(),
        product_name: product.name.clone(),
        kind: product.kind,
        quantity,
        subtotal_ref,
        subtotal_local,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CisternInput, ProductInput, ProductKind};
    use crate::products;
    use chrono::{NaiveDate, NaiveTime};
    use std::str::FromStr;

    fn dec(text: &str) -> Decimal {
        Decimal::from_str(text).unwrap()
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 9, 10).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    fn store() -> AppData {
        let mut data = AppData::default();
        products::ensure_payment_methods(&mut data);
        for (code, price, kind) in [
            ("B20", "1.50", ProductKind::Bottle20L),
            ("L", "0.05", ProductKind::WaterByLiter),
        ] {
            products::create(
                &mut data,
                ProductInput {
                    code: code.into(),
                    name: code.into(),
                    price_ref: dec(price),
                    price_local: Decimal::ZERO,
                    stock: 0,
                    kind,
                },
                now(),
            )
            .unwrap();
        }
        rates::register(&mut data, now().date(), dec("40")).unwrap();
        cisterns::register(
            &mut data,
            CisternInput {
                date: now().date(),
                time: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
                volume: dec("1000"),
            },
        )
        .unwrap();
        data
    }

    fn draft(items: &str, payments: &str) -> SaleDraft {
        SaleDraft::parse(items, payments).unwrap()
    }

    #[test]
    fn balanced_sale_is_recorded_and_draws_water() {
        let mut data = store();
        let receipt = finalize(
            &mut data,
            draft(
                r#"[{"codigo":"B20","cantidad":2},{"codigo":"L","cantidad":"100"}]"#,
                r#"[{"monto":5,"metodo_pago":"Divisa $"},{"monto":"120","metodo_pago":"Pago Móvil"}]"#,
            ),
            "caja",
            now(),
        )
        .unwrap();

        assert_eq!(receipt.total_ref, dec("8.00"));
        assert_eq!(receipt.total_local, dec("320"));
        assert_eq!(cisterns::current_level(&data), dec("900"));
        let sale = data.sales.last().unwrap();
        assert_eq!(sale.items.len(), 2);
        assert_eq!(sale.items[1].subtotal_local, dec("200"));
        assert_eq!(sale.payments[1].amount, dec("120"));
    }

    #[test]
    fn empty_lists_are_rejected() {
        let mut data = store();
        assert_eq!(finalize(&mut data, draft("[]", "[]"), "caja", now()), Err(SaleError::NoItems));
        assert_eq!(
            finalize(&mut data, draft(r#"[{"codigo":"B20","cantidad":1}]"#, ""), "caja", now()),
            Err(SaleError::NoPayments)
        );
    }

    #[test]
    fn malformed_payload_is_an_error() {
        assert!(matches!(SaleDraft::parse("[{", "[]"), Err(SaleError::InvalidPayload(_))));
        assert!(matches!(
            SaleDraft::parse(r#"[{"cantidad":1}]"#, "[]"),
            Err(SaleError::InvalidPayload(_))
        ));
    }

    #[test]
    fn unbalanced_sale_reports_pending_amount() {
        let mut data = store();
        let err = finalize(
            &mut data,
            draft(
                r#"[{"codigo":"B20","cantidad":2}]"#,
                r#"[{"monto":1,"metodo_pago":"Divisa $"}]"#,
            ),
            "caja",
            now(),
        )
        .unwrap_err();
        assert_eq!(err, SaleError::Unbalanced { pending: dec("2.00") });
        assert!(err.to_string().ends_with("Saldo pendiente: $2.00"));
        assert!(data.sales.is_empty());
    }

    #[test]
    fn overpayment_beyond_a_cent_is_rejected() {
        let mut data = store();
        let err = finalize(
            &mut data,
            draft(
                r#"[{"codigo":"B20","cantidad":1}]"#,
                r#"[{"monto":5,"metodo_pago":"Divisa $"}]"#,
            ),
            "caja",
            now(),
        )
        .unwrap_err();
        assert_eq!(err, SaleError::Unbalanced { pending: dec("-3.50") });
    }

    #[test]
    fn unknown_references_and_missing_rate() {
        let mut data = store();
        assert_eq!(
            finalize(
                &mut data,
                draft(r#"[{"codigo":"X","cantidad":1}]"#, r#"[{"monto":1,"metodo_pago":"Divisa $"}]"#),
                "caja",
                now()
            ),
            Err(SaleError::UnknownProduct("X".into()))
        );
        assert_eq!(
            finalize(
                &mut data,
                draft(r#"[{"codigo":"B20","cantidad":1}]"#, r#"[{"monto":1.5,"metodo_pago":"Zelle"}]"#),
                "caja",
                now()
            ),
            Err(SaleError::UnknownPaymentMethod("Zelle".into()))
        );

        data.exchange_rates.clear();
        assert_eq!(
            finalize(
                &mut data,
                draft(r#"[{"codigo":"B20","cantidad":1}]"#, r#"[{"monto":1.5,"metodo_pago":"Divisa $"}]"#),
                "caja",
                now()
            ),
            Err(SaleError::NoExchangeRate)
        );
    }

    #[test]
    fn quantities_past_the_decimal_range_are_rejected() {
        let mut data = store();
        let payments = r#"[{"monto":1,"metodo_pago":"Divisa $"}]"#;
        assert_eq!(
            finalize(
                &mut data,
                draft(r#"[{"codigo":"B20","cantidad":"79228162514264337593543950335"}]"#, payments),
                "caja",
                now()
            ),
            Err(SaleError::InvalidQuantity("B20".into()))
        );
        assert_eq!(
            finalize(
                &mut data,
                draft(
                    r#"[{"codigo":"L","cantidad":"79228162514264337593543950335"},{"codigo":"L","cantidad":"1"}]"#,
                    payments
                ),
                "caja",
                now()
            ),
            Err(SaleError::InvalidQuantity("L".into()))
        );
        assert!(data.sales.is_empty());
        assert_eq!(cisterns::current_level(&data), dec("1000"));
    }

    #[test]
    fn payments_past_the_decimal_range_are_rejected() {
        let mut data = store();
        let err = finalize(
            &mut data,
            draft(
                r#"[{"codigo":"B20","cantidad":1}]"#,
                r#"[{"monto":"79228162514264337593543950335","metodo_pago":"Divisa $"},{"monto":"1","metodo_pago":"Divisa $"}]"#,
            ),
            "caja",
            now(),
        )
        .unwrap_err();
        assert_eq!(err, SaleError::InvalidAmount("Divisa $".into()));
    }

    #[test]
    fn not_enough_water_blocks_the_sale() {
        let mut data = store();
        let err = finalize(
            &mut data,
            draft(
                r#"[{"codigo":"L","cantidad":2000}]"#,
                r#"[{"monto":100,"metodo_pago":"Divisa $"}]"#,
            ),
            "caja",
            now(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            SaleError::Water(CisternError::InsufficientWater { available: dec("1000") })
        );
        assert_eq!(cisterns::current_level(&data), dec("1000"));
    }
}
