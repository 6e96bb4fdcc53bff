use scopecrate::entity::PrimaryKeyOf;
use scopecrate::validation::validators::{validate_length, validate_range, validate_required};
use scopecrate::{ApiEntity, SeaOrmEntity, ValidationErrors};
use sea_orm::{ActiveValue::Set, entity::prelude::*};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub quantity: i32,
    pub cost: i32,
    #[sea_orm(column_type = "Text", nullable)]
    pub note: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub quantity: i32,
    #[serde(default)]
    pub cost: i32,
    #[serde(default)]
    pub note: Option<String>,
}

impl Item {
    pub fn new(name: &str, category: &str, quantity: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            category: category.to_string(),
            quantity,
            cost: 0,
            note: None,
        }
    }
}

impl ApiEntity for Item {
    type Id = Uuid;
    const RESOURCE_NAME: &'static str = "items";

    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check(validate_required("name", &self.name));
        errors.check(validate_length("name", &self.name, None, Some(100)));
        errors.check(validate_range("quantity", self.quantity, Some(0), None));
        errors.result()
    }

    fn filterable_fields() -> &'static [&'static str] {
        &["id", "name", "category", "quantity", "cost", "note"]
    }

    fn sortable_fields() -> &'static [&'static str] {
        &["id", "name", "quantity", "cost"]
    }

    fn searchable_fields() -> &'static [&'static str] {
        &["name", "note"]
    }
}

impl SeaOrmEntity for Item {
    type EntityType = Entity;
    type ModelType = Model;
    type ColumnType = Column;
    type ActiveModelType = ActiveModel;

    const ID_COLUMN: Column = Column::Id;

    fn from_model(model: Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            category: model.category,
            quantity: model.quantity,
            cost: model.cost,
            note: model.note,
        }
    }

    fn active_model(self) -> ActiveModel {
        ActiveModel {
            id: Set(self.id),
            name: Set(self.name),
            category: Set(self.category),
            quantity: Set(self.quantity),
            cost: Set(self.cost),
            note: Set(self.note),
        }
    }

    fn primary_key(id: Uuid) -> PrimaryKeyOf<Self> {
        id
    }
}
