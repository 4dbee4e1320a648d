use crate::cisterns::{self, CisternError};
use crate::models::{AppData, Promotion, PromotionInput, Sale, SaleKind};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use thiserror::Error;

/// Liters drawn from the cistern for each prepaid bottle handed out.
pub const LITERS_PER_BOTTLE: i64 = 20;

#[derive(Debug, Error, PartialEq)]
pub enum PromoError {
    #[error("Error al registrar la promoción. Revisa los datos.")]
    Invalid,

    #[error("Promoción {0} no encontrada.")]
    NotFound(u64),

    #[error("No hay botellas pendientes")]
    NothingPending,

    #[error("No hay cisternas registradas.")]
    NoCistern,

    #[error("No hay suficientes litros disponibles en la cisterna.")]
    InsufficientWater,
}

impl From<CisternError> for PromoError {
    fn from(err: CisternError) -> Self {
        match err {
            CisternError::NoCistern => PromoError::NoCistern,
            CisternError::InsufficientWater { .. } | CisternError::InvalidVolume | CisternError::VolumeOverflow => {
                PromoError::InsufficientWater
            }
        }
    }
}

/// Promotions are logged as zero-value sales so they show up in the day's activity.
fn record_zero_sale(data: &mut AppData, operator: &str, now: NaiveDateTime) {
    let id = data.allocate_id();
    data.sales.push(Sale {
        id,
        operator: operator.to_string(),
        sold_at: now,
        total_ref: Decimal::ZERO,
        total_local: Decimal::ZERO,
        rate_used: Decimal::ZERO,
        kind: SaleKind::Promotion,
        items: Vec::new(),
        payments: Vec::new(),
    });
}

pub fn register(
    data: &mut AppData,
    input: PromotionInput,
    operator: &str,
    now: NaiveDateTime,
) -> Result<Promotion, PromoError> {
    let customer_name = input.customer_name.trim();
    if customer_name.is_empty() || input.amount_paid_ref < Decimal::ZERO {
        return Err(PromoError::Invalid);
    }
    let promotion = Promotion {
        id: data.allocate_id(),
        customer_name: customer_name.to_string(),
        phone: input.phone.trim().to_string(),
        amount_paid_ref: input.amount_paid_ref,
        bottles_paid: input.bottles_paid,
        bottles_taken: 0,
        created_at: now,
    };
    data.promotions.push(promotion.clone());
    record_zero_sale(data, operator, now);
    Ok(promotion)
}

/// Promotions that still have bottles to hand out, newest first.
pub fn pending(data: &AppData) -> Vec<Promotion> {
    let mut promotions: Vec<_> = data
        .promotions
        .iter()
        .filter(|promo| promo.bottles_pending() > 0)
        .cloned()
        .collect();
    promotions.sort_by(|a, b| b.id.cmp(&a.id));
    promotions
}

/// Hands out one prepaid bottle and returns how many are left.
pub fn take_bottle(data: &mut AppData, id: u64, operator: &str, now: NaiveDateTime) -> Result<u32, PromoError> {
    let pending = data
        .promotions
        .iter()
        .find(|promo| promo.id == id)
        .ok_or(PromoError::NotFound(id))?
        .bottles_pending();
    if pending == 0 {
        return Err(PromoError::NothingPending);
    }

    cisterns::draw_from_last_registered(data, Decimal::new(LITERS_PER_BOTTLE, 0))?;

    let promotion = data
        .promotions
        .iter_mut()
        .find(|promo| promo.id == id)
        .ok_or(PromoError::NotFound(id))?;
    promotion.bottles_taken += 1;
    let remaining = promotion.bottles_pending();

    record_zero_sale(data, operator, now);
    Ok(remaining)
}
