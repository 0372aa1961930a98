//! Test factories for generating test data
//!
//! Factories create randomized test data, useful when each test needs
//! unique addresses and names.

use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::{FirstName, Name};
use fake::Fake;
use serde_json::{json, Value};
use uuid::Uuid;

/// Factory for registration payloads
pub struct UserFactory;

impl UserFactory {
    /// Unique address at `domain`
    pub fn email_at(domain: &str) -> String {
        let local: String = SafeEmail().fake::<String>().split('@').next().unwrap_or("user").to_string();
        format!("{}.{}@{}", local, Uuid::new_v4().simple(), domain)
    }

    /// Registration body for an address at `domain`
    pub fn registration_at(domain: &str, password: &str) -> (String, Value) {
        let email = Self::email_at(domain);
        let name: String = Name().fake();
        let body = json!({"email": email, "name": name, "password": password});
        (email, body)
    }
}

/// Factory for kid profiles
pub struct KidFactory;

impl KidFactory {
    pub fn create_request() -> Value {
        let name: String = FirstName().fake();
        let age: i64 = (5..12).fake();
        json!({"name": name, "grade": (age - 5).max(1).to_string(), "age": age})
    }
}
