use crate::errors::StoreError;
use crate::models::{AppData, PaymentMethodRecord, ProductInput, ProductRecord};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;

/// Methods every store starts with: name and whether it is paid in local currency.
pub const DEFAULT_PAYMENT_METHODS: [(&str, bool); 6] = [
    ("Tarjeta de Débito BsD", true),
    ("Tarjeta de Crédito BsD", true),
    ("Efectivo BsD", true),
    ("Divisa $", false),
    ("Transferencia", true),
    ("Pago Móvil", true),
];

/// Adds the default payment methods that are missing. Returns how many were created.
pub fn ensure_payment_methods(data: &mut AppData) -> usize {
    let mut created = 0;
    for (name, is_local_currency) in DEFAULT_PAYMENT_METHODS {
        if data.payment_method(name).is_none() {
            let id = data.allocate_id();
            data.payment_methods.push(PaymentMethodRecord {
                id,
                name: name.to_string(),
                is_local_currency,
            });
            created += 1;
        }
    }
    created
}

fn validate(input: &ProductInput) -> Result<(String, String), StoreError> {
    let code = input.code.trim();
    let name = input.name.trim();
    if code.is_empty() || name.is_empty() {
        return Err(StoreError::Invalid("El código y el nombre son obligatorios.".into()));
    }
    if input.price_ref < Decimal::ZERO || input.price_local < Decimal::ZERO {
        return Err(StoreError::Invalid("Los precios no pueden ser negativos.".into()));
    }
    Ok((code.to_string(), name.to_string()))
}

pub fn create(data: &mut AppData, input: ProductInput, now: NaiveDateTime) -> Result<ProductRecord, StoreError> {
    let (code, name) = validate(&input)?;
    if data.product_by_code(&code).is_some() {
        return Err(StoreError::Conflict(format!("Ya existe un producto con el código {code}.")));
    }
    let record = ProductRecord {
        id: data.allocate_id(),
        code,
        name,
        price_ref: input.price_ref,
        price_local: input.price_local,
        stock: input.stock,
        kind: input.kind,
        created_at: now,
        updated_at: now,
    };
    data.products.push(record.clone());
    Ok(record)
}

pub fn update(data: &mut AppData, id: u64, input: ProductInput, now: NaiveDateTime) -> Result<ProductRecord, StoreError> {
    let (code, name) = validate(&input)?;
    if data.products.iter().any(|product| product.code == code && product.id != id) {
        return Err(StoreError::Conflict(format!("Ya existe un producto con el código {code}.")));
    }
    let product = data
        .products
        .iter_mut()
        .find(|product| product.id == id)
        .ok_or_else(|| StoreError::NotFound(format!("Producto {id} no encontrado.")))?;
    product.code = code;
    product.name = name;
    product.price_ref = input.price_ref;
    product.price_local = input.price_local;
    product.stock = input.stock;
    product.kind = input.kind;
    product.updated_at = now;
    Ok(product.clone())
}

pub fn delete(data: &mut AppData, id: u64) -> Result<ProductRecord, StoreError> {
    let position = data
        .products
        .iter()
        .position(|product| product.id == id)
        .ok_or_else(|| StoreError::NotFound(format!("Producto {id} no encontrado.")))?;
    Ok(data.products.remove(position))
}

/// All products ordered by name.
pub fn list(data: &AppData) -> Vec<ProductRecord> {
    let mut products = data.products.clone();
    products.sort_by(|a, b| a.name.cmp(&b.name));
    products
}
