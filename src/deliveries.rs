use crate::errors::StoreError;
use crate::models::{AppData, Delivery, DeliveryInput};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;

pub fn register(data: &mut AppData, input: DeliveryInput, now: NaiveDateTime) -> Result<Delivery, StoreError> {
    let customer_name = input.customer_name.trim();
    let address = input.address.trim();
    if customer_name.is_empty() || address.is_empty() {
        return Err(StoreError::Invalid("El cliente y la dirección son obligatorios.".into()));
    }
    if input.liters_delivered < Decimal::ZERO {
        return Err(StoreError::Invalid("Los litros entregados no pueden ser negativos.".into()));
    }
    let delivery = Delivery {
        id: data.allocate_id(),
        date: now.date(),
        time: now.time(),
        customer_name: customer_name.to_string(),
        address: address.to_string(),
        liters_delivered: input.liters_delivered,
    };
    data.deliveries.push(delivery.clone());
    Ok(delivery)
}

pub fn delete(data: &mut AppData, id: u64) -> Result<Delivery, StoreError> {
    let position = data
        .deliveries
        .iter()
        .position(|delivery| delivery.id == id)
        .ok_or_else(|| StoreError::NotFound(format!("Delivery {id} no encontrado.")))?;
    Ok(data.deliveries.remove(position))
}

/// Text of a delivery row as it appears on the list page.
pub fn row_text(delivery: &Delivery) -> String {
    format!(
        "{} {} {} {} {}",
        delivery.date.format("%Y-%m-%d"),
        delivery.time.format("%H:%M"),
        delivery.customer_name,
        delivery.address,
        delivery.liters_delivered
    )
}

/// Newest first; a non-blank query keeps rows whose text contains it, ignoring case.
pub fn search(data: &AppData, query: Option<&str>) -> Vec<Delivery> {
    let needle = query.map(|q| q.trim().to_lowercase()).unwrap_or_default();
    let mut rows: Vec<_> = data
        .deliveries
        .iter()
        .filter(|delivery| needle.is_empty() || row_text(delivery).to_lowercase().contains(&needle))
        .cloned()
        .collect();
    rows.sort_by(|a, b| (b.date, b.time, b.id).cmp(&(a.date, a.time, a.id)));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 7, 4).unwrap().and_hms_opt(hour, 30, 0).unwrap()
    }

    fn input(name: &str, address: &str) -> DeliveryInput {
        DeliveryInput {
            customer_name: name.into(),
            address: address.into(),
            liters_delivered: Decimal::new(40, 0),
        }
    }

    #[test]
    fn register_requires_customer_and_address() {
        let mut data = AppData::default();
        assert!(matches!(
            register(&mut data, input(" ", "Calle 1"), at(9)),
            Err(StoreError::Invalid(_))
        ));
        let delivery = register(&mut data, input("Ana", "Calle 1"), at(9)).unwrap();
        assert_eq!(delivery.date, at(9).date());
    }

    #[test]
    fn search_is_case_insensitive_and_newest_first() {
        let mut data = AppData::default();
        register(&mut data, input("Ana Pérez", "Av. Bolívar"), at(9)).unwrap();
        register(&mut data, input("Luis", "Calle Sucre"), at(11)).unwrap();
        assert_eq!(search(&data, Some("BOLÍVAR")).len(), 1);
        assert_eq!(search(&data, Some("09:30")).len(), 1);
        let all = search(&data, Some("  "));
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].customer_name, "Luis");
    }

    #[test]
    fn delete_missing_delivery_is_not_found() {
        let mut data = AppData::default();
        let delivery = register(&mut data, input("Ana", "Calle 1"), at(9)).unwrap();
        delete(&mut data, delivery.id).unwrap();
        assert!(matches!(delete(&mut data, delivery.id), Err(StoreError::NotFound(_))));
    }
}
