//! Entity contract, naming and serde behaviour seen from outside the crate.

use chrono::Utc;
use pretty_assertions::assert_eq;
use rstest::rstest;
use tabula_core::entities::User;
use tabula_core::naming::{camel_to_snake, table_name};
use tabula_core::{
    Column, ColumnType, CoreError, Entity, FieldSet, FromValue, NamingConvention, Timestamps, Value,
};
use uuid::Uuid;

/// Entity declared outside the crate, the way applications do it.
#[derive(Debug, Clone, PartialEq)]
struct ApiCredential {
    id: Uuid,
    label: String,
    owner_id: Uuid,
    expires_at: Option<chrono::DateTime<Utc>>,
    timestamps: Timestamps,
}

impl Entity for ApiCredential {
    const TYPE_NAME: &'static str = "ApiCredential";
    const COLUMNS: &'static [Column] = &[
        Column::new("label", ColumnType::Text),
        Column::new("owner_id", ColumnType::Uuid).references("users").indexed(),
        Column::new("expires_at", ColumnType::Timestamp).nullable(),
    ];

    fn id(&self) -> Uuid {
        self.id
    }

    fn timestamps(&self) -> &Timestamps {
        &self.timestamps
    }

    fn timestamps_mut(&mut self) -> &mut Timestamps {
        &mut self.timestamps
    }

    fn from_fields(id: Uuid, timestamps: Timestamps, mut fields: FieldSet) -> Result<Self, CoreError> {
        Ok(Self {
            id,
            label: fields.take(Self::TYPE_NAME, "label")?,
            owner_id: fields.take(Self::TYPE_NAME, "owner_id")?,
            expires_at: fields.take(Self::TYPE_NAME, "expires_at")?,
            timestamps,
        })
    }

    fn field(&self, name: &str) -> Result<Value, CoreError> {
        match name {
            "label" => Ok(self.label.clone().into()),
            "owner_id" => Ok(self.owner_id.into()),
            "expires_at" => Ok(self.expires_at.into()),
            other => Err(Self::unknown_field(other)),
        }
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<(), CoreError> {
        match name {
            "label" => self.label = FromValue::from_value(name, value)?,
            "owner_id" => self.owner_id = FromValue::from_value(name, value)?,
            "expires_at" => self.expires_at = FromValue::from_value(name, value)?,
            other => return Err(Self::unknown_field(other)),
        }
        Ok(())
    }
}

#[rstest]
#[case("UserAccount", "user_accounts")]
#[case("Category", "categories")]
#[case("ApiCredential", "api_credentials")]
fn table_names_follow_type_names(#[case] type_name: &str, #[case] expected: &str) {
    assert_eq!(table_name(type_name), expected);
}

#[test]
fn entity_table_name_defaults_to_derived() {
    assert_eq!(ApiCredential::table_name(), "api_credentials");
    assert_eq!(User::table_name(), "users");
    assert_eq!(camel_to_snake(ApiCredential::TYPE_NAME), "api_credential");
}

#[test]
fn construction_and_dispatch() {
    let owner = Uuid::new_v4();
    let fields = FieldSet::new().with("label", "ci").with("owner_id", owner);
    let mut cred = ApiCredential::from_fields(Uuid::new_v4(), Timestamps::now(), fields).unwrap();
    assert_eq!(cred.expires_at, None);
    assert_eq!(cred.field("owner_id").unwrap(), Value::Uuid(owner));

    let later = Utc::now();
    cred.set_field("expires_at", later.into()).unwrap();
    assert_eq!(cred.expires_at, Some(later));

    let err = cred.set_field("owner_id", "nope".into()).unwrap_err();
    assert!(matches!(err, CoreError::TypeMismatch { .. }), "{err:?}");
}

#[test]
fn missing_required_field_names_entity() {
    let err = ApiCredential::from_fields(Uuid::new_v4(), Timestamps::now(), FieldSet::new())
        .unwrap_err();
    assert_eq!(err.to_string(), "Missing required field: ApiCredential.label");
}

#[test]
fn user_serde_roundtrip() {
    let user = User::from_fields(
        Uuid::new_v4(),
        Timestamps::now(),
        FieldSet::new().with("name", "alice").with("email", "a@example.com"),
    )
    .unwrap();
    let json = serde_json::to_string_pretty(&user).unwrap();
    let recovered: User = serde_json::from_str(&json).unwrap();
    assert_eq!(recovered, user);
}

#[test]
fn naming_convention_from_toml_like_json() {
    let naming: NamingConvention = serde_json::from_value(serde_json::json!({
        "primary_key": "{table}_pkey"
    }))
    .unwrap();
    assert_eq!(naming.primary_key_name("api_credentials"), "api_credentials_pkey");
    assert_eq!(naming.index_name("api_credentials", "owner_id"), "ix_api_credentials_owner_id");
    assert_eq!(
        naming.foreign_key_name("api_credentials", "owner_id", "users"),
        "fk_api_credentials_owner_id_users"
    );
}
