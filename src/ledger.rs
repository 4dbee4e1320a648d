//! Running totals of a sale being rung up at the counter.
//!
//! A [`SaleLedger`] holds the line items and the payment entry rows of one sale. It never
//! owns the [`Catalog`]; callers pass it in so prices, methods and the exchange rate stay
//! read-only for the page session.

use crate::bootstrap::Catalog;
use crate::money::{self, round2};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error("Ingrese un código de producto.")]
    EmptyCode,

    #[error("Producto no encontrado.")]
    UnknownProduct(String),

    #[error("Cantidad de litros inválida.")]
    InvalidQuantity,

    #[error("no line item at position {0}")]
    NoSuchItem(usize),

    #[error("no payment row with id {0}")]
    NoSuchPaymentRow(u32),

    #[error("Error al cargar métodos de pago. Verifique los datos del backend.")]
    NoPaymentMethods,

    #[error("the sale is not ready to be finalized")]
    NotReady,

    #[error("could not encode the sale form: {0}")]
    Encoding(String),
}

impl LedgerError {
    /// Warnings are operator slips; the rest point at bad data.
    pub fn is_warning(&self) -> bool {
        matches!(self, LedgerError::EmptyCode | LedgerError::InvalidQuantity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "cantidad")]
    pub quantity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    #[serde(rename = "monto")]
    pub amount: Decimal,
    #[serde(rename = "metodo_pago")]
    pub method: String,
}

/// One payment entry on the form: whatever the operator typed plus the selected method.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRow {
    pub id: u32,
    pub amount: String,
    pub method: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub total_sale_ref: Decimal,
    pub total_paid_ref: Decimal,
    pub total_sale_local: Decimal,
    /// Positive while money is missing, negative when change is owed.
    pub balance: Decimal,
    pub is_settled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizeAction {
    NeedsProducts,
    Missing,
    Change,
    Ready,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizeState {
    pub action: FinalizeAction,
    pub label: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Success,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineView {
    pub index: usize,
    pub text: String,
    pub subtotal_ref: Decimal,
}

/// What the sale page shows after each recompute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerView {
    pub totals: Totals,
    pub sale_total_ref: String,
    pub sale_total_local: String,
    pub balance_text: String,
    pub balance_tone: Tone,
    pub finalize: FinalizeState,
    pub lines: Vec<LineView>,
}

/// Serialized form of a finished ledger, as posted in the sale form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleSubmission {
    pub items: String,
    pub pagos: String,
}

#[derive(Debug, Clone, Default)]
pub struct SaleLedger {
    items: Vec<LineItem>,
    rows: Vec<PaymentRow>,
    payments: Vec<Payment>,
    next_row_id: u32,
}

impl SaleLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a ledger from already collected items and payments, one row per payment.
    pub fn from_parts(items: Vec<LineItem>, payments: Vec<Payment>) -> Self {
        let mut ledger = Self {
            items,
            ..Self::default()
        };
        for payment in payments {
            let id = ledger.next_row();
            ledger.rows.push(PaymentRow {
                id,
                amount: payment.amount.to_string(),
                method: payment.method,
            });
        }
        ledger.collect_payments();
        ledger
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn payment_rows(&self) -> &[PaymentRow] {
        &self.rows
    }

    pub fn payments(&self) -> &[Payment] {
        &self.payments
    }

    /// Adds a product by code, merging with an existing line for the same code.
    ///
    /// Bulk-liquid products need the liters the operator entered; every other product
    /// is added one unit at a time and `quantity` is ignored.
    pub fn add_item(&mut self, catalog: &Catalog, code: &str, quantity: Option<Decimal>) -> Result<(), LedgerError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(LedgerError::EmptyCode);
        }
        let product = catalog
            .product(code)
            .ok_or_else(|| LedgerError::UnknownProduct(code.to_string()))?;

        let quantity = if product.is_bulk_liquid() {
            match quantity {
                Some(liters) if liters > Decimal::ZERO => liters,
                _ => return Err(LedgerError::InvalidQuantity),
            }
        } else {
            Decimal::ONE
        };

        match self.items.iter_mut().find(|item| item.code == product.code) {
            Some(existing) => {
                existing.quantity = existing
                    .quantity
                    .checked_add(quantity)
                    .ok_or(LedgerError::InvalidQuantity)?;
            }
            None => self.items.push(LineItem {
                code: product.code.clone(),
                quantity,
            }),
        }
        Ok(())
    }

    pub fn remove_item(&mut self, index: usize) -> Result<LineItem, LedgerError> {
        if index >= self.items.len() {
            return Err(LedgerError::NoSuchItem(index));
        }
        Ok(self.items.remove(index))
    }

    /// Adds an empty payment row with the first known method selected.
    pub fn open_payment_row(&mut self, catalog: &Catalog) -> Result<u32, LedgerError> {
        let method = catalog
            .payment_methods()
            .first()
            .ok_or(LedgerError::NoPaymentMethods)?
            .name
            .clone();
        let id = self.next_row();
        self.rows.push(PaymentRow {
            id,
            amount: String::new(),
            method,
        });
        self.collect_payments();
        Ok(id)
    }

    /// Updates one payment row, then re-collects every row into the payment list.
    pub fn record_payment(&mut self, row_id: u32, amount: &str, method: &str) -> Result<(), LedgerError> {
        let row = self
            .rows
            .iter_mut()
            .find(|row| row.id == row_id)
            .ok_or(LedgerError::NoSuchPaymentRow(row_id))?;
        row.amount = amount.to_string();
        row.method = method.to_string();
        self.collect_payments();
        Ok(())
    }

    pub fn remove_payment(&mut self, row_id: u32) -> Result<(), LedgerError> {
        let position = self
            .rows
            .iter()
            .position(|row| row.id == row_id)
            .ok_or(LedgerError::NoSuchPaymentRow(row_id))?;
        self.rows.remove(position);
        self.collect_payments();
        Ok(())
    }

    /// Rows with a blank, non-numeric or non-positive amount are left out.
    pub fn collect_payments(&mut self) {
        self.payments = self
            .rows
            .iter()
            .filter_map(|row| {
                let amount = money::parse_amount(&row.amount)?;
                (amount > Decimal::ZERO).then(|| Payment {
                    amount,
                    method: row.method.clone(),
                })
            })
            .collect();
    }

    /// Arithmetic saturates at `Decimal::MAX`, so an absurd quantity or amount shows up as
    /// an unpayable balance instead of a panic.
    pub fn compute_totals(&self, catalog: &Catalog) -> Totals {
        let rate = catalog.exchange_rate();

        let sale = money::saturating_sum(self.items.iter().filter_map(|item| {
            let price = catalog.product(&item.code)?.billable_price()?;
            Some(price.saturating_mul(item.quantity))
        }));
        let total_sale_ref = round2(sale);

        let paid = money::saturating_sum(self.payments.iter().filter_map(|payment| {
            let method = catalog.payment_method(&payment.method)?;
            let amount = round2(payment.amount);
            if amount <= Decimal::ZERO {
                return None;
            }
            if method.is_local_currency && rate > Decimal::ZERO {
                Some(amount.checked_div(rate).unwrap_or(Decimal::MAX))
            } else {
                Some(amount)
            }
        }));
        let total_paid_ref = round2(paid);

        let balance = round2(total_sale_ref.saturating_sub(total_paid_ref));

        Totals {
            total_sale_ref,
            total_paid_ref,
            total_sale_local: total_sale_ref.saturating_mul(rate),
            balance,
            is_settled: balance.abs() < money::cent(),
        }
    }

    pub fn finalize_state(&self, totals: &Totals) -> FinalizeState {
        finalize_state(!self.items.is_empty(), totals)
    }

    pub fn view(&self, catalog: &Catalog) -> LedgerView {
        let totals = self.compute_totals(catalog);

        let (balance_text, balance_tone) = if totals.is_settled {
            (money::format_ref(Decimal::ZERO), Tone::Success)
        } else if totals.balance > Decimal::ZERO {
            (money::format_ref(totals.balance), Tone::Danger)
        } else {
            (money::format_ref(totals.balance.abs()), Tone::Success)
        };

        let lines = self
            .items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| {
                let product = catalog.product(&item.code)?;
                let shown_quantity = if product.is_bulk_liquid() {
                    item.quantity.normalize()
                } else {
                    item.quantity
                        .round_dp_with_strategy(0, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
                };
                let subtotal_ref = round2(product.unit_price.unwrap_or_default().saturating_mul(item.quantity));
                Some(LineView {
                    index,
                    text: format!(
                        "{} x {} - {}",
                        product.name,
                        shown_quantity,
                        money::format_ref(subtotal_ref)
                    ),
                    subtotal_ref,
                })
            })
            .collect();

        LedgerView {
            sale_total_ref: money::format_ref(totals.total_sale_ref),
            sale_total_local: money::format_local(totals.total_sale_local),
            balance_text,
            balance_tone,
            finalize: self.finalize_state(&totals),
            lines,
            totals,
        }
    }

    /// Packs items and payments for the sale form; refuses while finalizing is disabled.
    pub fn submission(&mut self, catalog: &Catalog) -> Result<SaleSubmission, LedgerError> {
        self.collect_payments();
        let totals = self.compute_totals(catalog);
        if !self.finalize_state(&totals).enabled {
            return Err(LedgerError::NotReady);
        }
        let encoding = |err: serde_json::Error| LedgerError::Encoding(err.to_string());
        Ok(SaleSubmission {
            items: serde_json::to_string(&self.items).map_err(encoding)?,
            pagos: serde_json::to_string(&self.payments).map_err(encoding)?,
        })
    }

    fn next_row(&mut self) -> u32 {
        self.next_row_id += 1;
        self.next_row_id
    }
}

/// Label and enabled flag of the finalize button.
///
/// Overpaying by more than a cent keeps the button disabled, the same as missing money.
pub fn finalize_state(has_items: bool, totals: &Totals) -> FinalizeState {
    let enabled = has_items && totals.is_settled;
    let (action, label) = if !has_items {
        (FinalizeAction::NeedsProducts, "add products".to_string())
    } else if totals.balance > Decimal::ZERO {
        (FinalizeAction::Missing, format!("missing {}", money::format_ref(totals.balance)))
    } else if totals.balance < -money::cent() {
        (FinalizeAction::Change, format!("change: {}", money::format_ref(totals.balance.abs())))
    } else {
        (FinalizeAction::Ready, "finalize sale".to_string())
    };
    FinalizeState { action, label, enabled }
}
