//! Store accounts: who may sign in and with which role.

use crate::models::{AppData, RegisterUserRequest, Role, UserRecord, UserView};
use chrono::NaiveDateTime;
use thiserror::Error;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Error, PartialEq)]
pub enum UserError {
    #[error("Usuario requerido.")]
    MissingUsername,

    #[error("La contraseña debe tener al menos 6 caracteres.")]
    PasswordTooShort,

    #[error("El usuario {0} ya existe.")]
    Duplicate(String),

    #[error("Usuario o contraseña incorrectos.")]
    InvalidCredentials,

    #[error("Usuario inactivo.")]
    Inactive,

    #[error("Hash error: {0}")]
    Hashing(String),
}

pub fn hash_password(password: &str, cost: u32) -> Result<String, UserError> {
    bcrypt::hash(password, cost).map_err(|err| UserError::Hashing(err.to_string()))
}

/// Checks a new account before its password is hashed.
pub fn validate(data: &AppData, request: &RegisterUserRequest) -> Result<(), UserError> {
    let username = request.username.trim();
    if username.is_empty() {
        return Err(UserError::MissingUsername);
    }
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(UserError::PasswordTooShort);
    }
    if find_by_username(data, username).is_some() {
        return Err(UserError::Duplicate(username.to_string()));
    }
    Ok(())
}

pub fn create(
    data: &mut AppData,
    username: &str,
    password_hash: String,
    role: Role,
    now: NaiveDateTime,
) -> Result<UserRecord, UserError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(UserError::MissingUsername);
    }
    if find_by_username(data, username).is_some() {
        return Err(UserError::Duplicate(username.to_string()));
    }
    let user = UserRecord {
        id: data.allocate_id(),
        username: username.to_string(),
        password_hash,
        role,
        is_active: true,
        created_at: now,
    };
    data.users.push(user.clone());
    Ok(user)
}

pub fn find(data: &AppData, id: u64) -> Option<&UserRecord> {
    data.users.iter().find(|user| user.id == id)
}

pub fn find_by_username<'a>(data: &'a AppData, username: &str) -> Option<&'a UserRecord> {
    let username = username.trim();
    data.users.iter().find(|user| user.username == username)
}

/// Blocking: bcrypt is slow on purpose. Call it off the async runtime.
pub fn check_password(user: &UserRecord, password: &str) -> Result<(), UserError> {
    if !user.is_active {
        return Err(UserError::Inactive);
    }
    let ok = bcrypt::verify(password, &user.password_hash).map_err(|err| UserError::Hashing(err.to_string()))?;
    if !ok {
        return Err(UserError::InvalidCredentials);
    }
    Ok(())
}

/// Creates the owner account when the store has no users yet. Returns whether it did.
pub fn ensure_owner(
    data: &mut AppData,
    username: &str,
    password: &str,
    cost: u32,
    now: NaiveDateTime,
) -> Result<bool, UserError> {
    if !data.users.is_empty() {
        return Ok(false);
    }
    let request = RegisterUserRequest {
        username: username.to_string(),
        password: password.to_string(),
        role: Role::Dueno,
    };
    validate(data, &request)?;
    let password_hash = hash_password(password, cost)?;
    create(data, username, password_hash, Role::Dueno, now)?;
    Ok(true)
}

/// Oldest first.
pub fn list(data: &AppData) -> Vec<UserView> {
    data.users.iter().map(UserView::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const COST: u32 = 4;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 5, 4).unwrap().and_hms_opt(9, 0, 0).unwrap()
    }

    fn request(username: &str, password: &str, role: Role) -> RegisterUserRequest {
        RegisterUserRequest {
            username: username.into(),
            password: password.into(),
            role,
        }
    }

    #[test]
    fn owner_is_seeded_once() {
        let mut data = AppData::default();
        assert_eq!(ensure_owner(&mut data, "admin", "secreto", COST, now()), Ok(true));
        assert_eq!(ensure_owner(&mut data, "otro", "secreto", COST, now()), Ok(false));
        assert_eq!(data.users.len(), 1);
        assert_eq!(data.users[0].role, Role::Dueno);
        assert_ne!(data.users[0].password_hash, "secreto");
    }

    #[test]
    fn new_accounts_are_validated() {
        let mut data = AppData::default();
        ensure_owner(&mut data, "admin", "secreto", COST, now()).unwrap();
        assert_eq!(
            validate(&data, &request(" ", "secreto", Role::Trabajador)),
            Err(UserError::MissingUsername)
        );
        assert_eq!(
            validate(&data, &request("caja", "12345", Role::Trabajador)),
            Err(UserError::PasswordTooShort)
        );
        assert_eq!(
            validate(&data, &request(" admin ", "secreto", Role::Trabajador)),
            Err(UserError::Duplicate("admin".into()))
        );
        assert_eq!(validate(&data, &request("caja", "123456", Role::Trabajador)), Ok(()));
    }

    #[test]
    fn password_check_needs_the_right_password_and_an_active_user() {
        let mut data = AppData::default();
        let hash = hash_password("clave-caja", COST).unwrap();
        let mut user = create(&mut data, "caja", hash, Role::Trabajador, now()).unwrap();
        assert_eq!(check_password(&user, "clave-caja"), Ok(()));
        assert_eq!(check_password(&user, "otra"), Err(UserError::InvalidCredentials));
        user.is_active = false;
        assert_eq!(check_password(&user, "clave-caja"), Err(UserError::Inactive));
        assert_eq!(find(&data, user.id).map(|found| found.username.as_str()), Some("caja"));
    }

    #[test]
    fn listing_hides_password_hashes() {
        let mut data = AppData::default();
        ensure_owner(&mut data, "admin", "secreto", COST, now()).unwrap();
        let listed = serde_json::to_string(&list(&data)).unwrap();
        assert!(listed.contains(r#""role":"dueno""#));
        assert!(!listed.contains("password"));
    }

    #[test]
    fn owner_passes_every_role_check() {
        assert!(Role::Dueno.may_act_as(&[]));
        assert!(Role::Dueno.may_act_as(&[Role::Encargada]));
        assert!(Role::Encargada.may_act_as(&[Role::Encargada]));
        assert!(!Role::Trabajador.may_act_as(&[Role::Encargada]));
        assert!(!Role::Encargada.may_act_as(&[]));
    }
}
