use crate::models::{AppData, CisternInput, CisternIntake};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum CisternError {
    #[error("El volumen debe ser mayor que cero.")]
    InvalidVolume,

    #[error("El volumen es demasiado grande para registrarlo.")]
    VolumeOverflow,

    #[error("No hay una cisterna registrada. Contacte al administrador.")]
    NoCistern,

    #[error("No hay suficientes litros de agua en la cisterna. Solo quedan {available}L.")]
    InsufficientWater { available: Decimal },
}

/// The intake with the latest date and time; ties go to the most recently registered.
pub fn latest(data: &AppData) -> Option<&CisternIntake> {
    data.cisterns
        .iter()
        .max_by_key(|intake| (intake.date, intake.time, intake.id))
}

fn latest_mut(data: &mut AppData) -> Option<&mut CisternIntake> {
    data.cisterns
        .iter_mut()
        .max_by_key(|intake| (intake.date, intake.time, intake.id))
}

pub fn current_level(data: &AppData) -> Decimal {
    latest(data).map(|intake| intake.liters_available).unwrap_or(Decimal::ZERO)
}

/// Records water poured into the cistern on top of the current level.
pub fn register(data: &mut AppData, input: CisternInput) -> Result<CisternIntake, CisternError> {
    if input.volume <= Decimal::ZERO {
        return Err(CisternError::InvalidVolume);
    }
    let liters_available = current_level(data)
        .checked_add(input.volume)
        .ok_or(CisternError::VolumeOverflow)?;
    let intake = CisternIntake {
        id: data.allocate_id(),
        date: input.date,
        time: input.time,
        volume: input.volume,
        liters_available,
    };
    data.cisterns.push(intake.clone());
    Ok(intake)
}

/// Fails with `InsufficientWater` when `liters` is more than the latest level.
pub fn ensure_available(data: &AppData, liters: Decimal) -> Result<(), CisternError> {
    let intake = latest(data).ok_or(CisternError::NoCistern)?;
    if intake.liters_available < liters {
        return Err(CisternError::InsufficientWater {
            available: intake.liters_available,
        });
    }
    Ok(())
}

/// Takes `liters` out of the latest level. Returns what is left.
pub fn draw(data: &mut AppData, liters: Decimal) -> Result<Decimal, CisternError> {
    ensure_available(data, liters)?;
    let intake = latest_mut(data).ok_or(CisternError::NoCistern)?;
    intake.liters_available -= liters;
    Ok(intake.liters_available)
}

/// Takes `liters` out of the intake registered last, whatever date it carries.
///
/// Promotion bottles are served this way; sales go through [`draw`].
pub fn draw_from_last_registered(data: &mut AppData, liters: Decimal) -> Result<Decimal, CisternError> {
    let intake = data
        .cisterns
        .iter_mut()
        .max_by_key(|intake| intake.id)
        .ok_or(CisternError::NoCistern)?;
    if intake.liters_available < liters {
        return Err(CisternError::InsufficientWater {
            available: intake.liters_available,
        });
    }
    intake.liters_available -= liters;
    Ok(intake.liters_available)
}

/// Newest first, optionally only one date.
pub fn list(data: &AppData, date: Option<NaiveDate>) -> Vec<CisternIntake> {
    let mut intakes: Vec<_> = data
        .cisterns
        .iter()
        .filter(|intake| date.is_none_or(|wanted| intake.date == wanted))
        .cloned()
        .collect();
    intakes.sort_by(|a, b| (b.date, b.time, b.id).cmp(&(a.date, a.time, a.id)));
    intakes
}
