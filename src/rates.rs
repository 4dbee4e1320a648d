use crate::errors::StoreError;
use crate::models::{AppData, ExchangeRateRecord};
use chrono::NaiveDate;
use rust_decimal::Decimal;

const RECENT_RATES: usize = 10;

/// Registers the rate for `date`. Only one rate may exist per day.
pub fn register(data: &mut AppData, date: NaiveDate, rate: Decimal) -> Result<ExchangeRateRecord, StoreError> {
    if rate <= Decimal::ZERO {
        return Err(StoreError::Invalid("La tasa debe ser mayor que cero.".into()));
    }
    if data.exchange_rates.iter().any(|record| record.date == date) {
        return Err(StoreError::Conflict(
            "Ya existe una tasa de cambio registrada para el día de hoy.".into(),
        ));
    }
    let record = ExchangeRateRecord { date, rate };
    data.exchange_rates.push(record.clone());
    Ok(record)
}

/// The rate with the most recent date.
pub fn latest(data: &AppData) -> Option<&ExchangeRateRecord> {
    data.exchange_rates.iter().max_by_key(|record| record.date)
}

pub fn recent(data: &AppData) -> Vec<ExchangeRateRecord> {
    let mut rates = data.exchange_rates.clone();
    rates.sort_by(|a, b| b.date.cmp(&a.date));
    rates.truncate(RECENT_RATES);
    rates
}
