//! The example `User` entity.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{Column, ColumnType, Entity, FieldSet, Timestamps};
use crate::errors::CoreError;
use crate::value::{FromValue, Value};

/// A registered user. Stored in `users`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl Entity for User {
    const TYPE_NAME: &'static str = "User";

    const COLUMNS: &'static [Column] = &[
        Column::new("name", ColumnType::Text).check("name_not_blank", "length(name) > 0"),
        Column::new("email", ColumnType::Text).nullable().unique(),
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

    fn from_fields(
        id: Uuid,
        timestamps: Timestamps,
        mut fields: FieldSet,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            id,
            name: fields.take(Self::TYPE_NAME, "name")?,
            email: fields.take(Self::TYPE_NAME, "email")?,
            timestamps,
        })
    }

    fn field(&self, name: &str) -> Result<Value, CoreError> {
        match name {
            "name" => Ok(self.name.clone().into()),
            "email" => Ok(self.email.clone().into()),
            other => Err(Self::unknown_field(other)),
        }
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<(), CoreError> {
        match name {
            "name" => self.name = FromValue::from_value(name, value)?,
            "email" => self.email = FromValue::from_value(name, value)?,
            other => return Err(Self::unknown_field(other)),
        }
        Ok(())
    }
}
