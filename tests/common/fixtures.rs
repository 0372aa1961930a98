//! Test fixtures for common test data
//!
//! Fixtures provide pre-defined test data that can be used across multiple tests.

use serde_json::{json, Value};

/// Fixed addresses used across the suites
pub mod emails {
    pub const PARENT: &str = "parent@family.test";
    pub const TEACHER: &str = "teacher@school.test";
    pub const ADMIN: &str = "admin@brainybees.test";
    pub const STRANGER: &str = "stranger@nowhere.test";
    pub const SCHOOL_DOMAIN: &str = "school.test";
}

/// Worksheet request and provider output fixtures
pub struct WorksheetFixtures;

impl WorksheetFixtures {
    /// Provider output with three questions
    pub fn content() -> Value {
        json!({
            "title": "Adding within 20",
            "questions": [
                {"question": "7 + 5 = ?", "options": ["11", "12", "13", "14"], "answer": "12"},
                {"question": "9 + 9 = ?", "options": ["16", "17", "18", "19"], "answer": "18"},
                {"question": "4 + 8 = ?", "options": ["10", "11", "12", "13"], "answer": "12"}
            ]
        })
    }

    /// Body for `POST /api/worksheets/generate`
    pub fn generate_request() -> Value {
        json!({
            "subject": "Math",
            "grade": "2",
            "topic": "Adding within 20",
            "difficulty": "easy",
            "questionCount": 3
        })
    }

    /// Generation request tied to a kid profile
    pub fn generate_request_for(kid_profile_id: &str) -> Value {
        let mut body = Self::generate_request();
        body["kidProfileId"] = json!(kid_profile_id);
        body
    }
}

/// Kid profile fixtures
pub struct KidFixtures;

impl KidFixtures {
    pub fn create_request() -> Value {
        json!({"name": "Sam", "grade": "2", "age": 7})
    }
}
