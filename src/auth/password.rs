use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

/// Hashes with Argon2id. `cost` is the time cost (number of passes).
pub fn hash_password(password: &str, cost: u32) -> Result<String, argon2::password_hash::Error> {
    let params = Params::new(
        Params::DEFAULT_M_COST,
        cost.max(1),
        Params::DEFAULT_P_COST,
        None,
    )?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let salt = SaltString::generate(&mut OsRng);

    Ok(argon2.hash_password(password.as_bytes(), &salt)?.to_string())
}

/// Parameters are read back from the PHC string, so hashes made with any
/// cost verify. Comparison is constant-time inside the hasher.
pub fn verify_password(password: &str, hashed: &str) -> Result<(), argon2::password_hash::Error> {
    let argon2 = Argon2::default();
    let parsed = PasswordHash::new(hashed)?;

    argon2.verify_password(password.as_bytes(), &parsed)
}
