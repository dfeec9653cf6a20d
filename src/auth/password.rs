use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

pub const MIN_PASSWORD_LEN: usize = 8;

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let argon2 = Argon2::default();
    let salt = SaltString::generate(&mut OsRng);

    Ok(argon2.hash_password(password.as_bytes(), &salt)?.to_string())
}

pub fn verify_password(password: &str, hashed: &str) -> Result<(), argon2::password_hash::Error> {
    let argon2 = Argon2::default();
    let parsed = PasswordHash::new(hashed)?;

    argon2.verify_password(password.as_bytes(), &parsed)
}

/// One-time password handed out when an admin provisions an account.
pub fn temporary_password() -> String {
    let raw = uuid::Uuid::new_v4().to_string().replace('-', "");
    format!("Df-{}", &raw[..12])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hashed = hash_password("s3cret-pass").unwrap();
        assert!(verify_password("s3cret-pass", &hashed).is_ok());
        assert!(verify_password("wrong-pass", &hashed).is_err());
    }

    #[test]
    fn corrupt_hash_is_an_error_not_a_panic() {
        assert!(verify_password("anything", "not-a-phc-string").is_err());
    }

    #[test]
    fn temporary_passwords_are_long_enough_and_distinct() {
        let a = temporary_password();
        let b = temporary_password();
        assert!(a.len() >= MIN_PASSWORD_LEN);
        assert_ne!(a, b);
    }
}
