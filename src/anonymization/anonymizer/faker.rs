//! Realistic fake values backed by the `fake` crate

use super::FieldAnonymizer;
use crate::domain::{Attributes, Result};
use fake::faker::address::en::{CityName, StreetName};
use fake::faker::company::en::CompanyName;
use fake::faker::internet::en::{FreeEmail, SafeEmail, Username};
use fake::faker::lorem::en::Word;
use fake::faker::name::en::{FirstName, LastName, Name};
use fake::faker::phone_number::en::PhoneNumber;
use fake::Fake;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of fake value to generate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FakerKind {
    FirstName,
    LastName,
    Name,
    SafeEmail,
    FreeEmail,
    PhoneNumber,
    Username,
    CompanyName,
    CityName,
    StreetName,
    Word,
}

/// Fake value strategy
pub struct FakeStrategy {
    kind: FakerKind,
}

impl FakeStrategy {
    pub fn new(kind: FakerKind) -> Self {
        Self { kind }
    }

    fn fake_string(&self) -> String {
        match self.kind {
            FakerKind::FirstName => FirstName().fake(),
            FakerKind::LastName => LastName().fake(),
            FakerKind::Name => Name().fake(),
            FakerKind::SafeEmail => SafeEmail().fake(),
            FakerKind::FreeEmail => FreeEmail().fake(),
            FakerKind::PhoneNumber => PhoneNumber().fake(),
            FakerKind::Username => Username().fake(),
            FakerKind::CompanyName => CompanyName().fake(),
            FakerKind::CityName => CityName().fake(),
            FakerKind::StreetName => StreetName().fake(),
            FakerKind::Word => Word().fake(),
        }
    }
}

impl FieldAnonymizer for FakeStrategy {
    fn anonymize_field(&self, _field: &str, _current: &Attributes) -> Result<Value> {
        Ok(Value::String(self.fake_string()))
    }
}
