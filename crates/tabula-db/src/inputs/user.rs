//! User inputs and update builder.

use serde::{Deserialize, Serialize};
use tabula_core::{FieldSet, IntoFields};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCreate {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl UserCreate {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: None,
        }
    }

    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

impl IntoFields for UserCreate {
    fn into_fields(self) -> FieldSet {
        FieldSet::new()
            .with("name", self.name)
            .with("email", self.email)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<Option<String>>,
}

impl IntoFields for UserUpdate {
    fn into_fields(self) -> FieldSet {
        let mut fields = FieldSet::new();
        if let Some(name) = self.name {
            fields.insert("name", name);
        }
        if let Some(email) = self.email {
            fields.insert("email", email);
        }
        fields
    }
}

#[derive(Debug, Default)]
pub struct UserUpdateBuilder(UserUpdate);

impl UserUpdateBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self(UserUpdate::default())
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.0.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn email(mut self, email: Option<String>) -> Self {
        self.0.email = Some(email);
        self
    }

    #[must_use]
    pub fn build(self) -> UserUpdate {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tabula_core::Value;

    #[test]
    fn create_emits_every_field() {
        let fields = UserCreate::new("alice").into_fields();
        assert_eq!(fields.names().collect::<Vec<_>>(), vec!["name", "email"]);
        assert_eq!(fields.get("email"), Some(&Value::Null));
    }

    #[test]
    fn update_emits_only_set_fields() {
        let fields = UserUpdateBuilder::new().name("bob").build().into_fields();
        assert_eq!(fields.names().collect::<Vec<_>>(), vec!["name"]);
        assert!(UserUpdate::default().into_fields().is_empty());
    }

    #[test]
    fn update_can_clear_email() {
        let fields = UserUpdateBuilder::new().email(None).build().into_fields();
        assert_eq!(fields.get("email"), Some(&Value::Null));
    }

    #[test]
    fn update_serializes_changed_fields_only() {
        let update = UserUpdateBuilder::new().email(None).build();
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({ "email": null }));
    }
}
