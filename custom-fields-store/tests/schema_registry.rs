//! Schema registry behavior against a real database file.

use std::fs;

use custom_fields::{ErrorKind, FieldDef, FieldType, FieldsError, Schema, SelectOption};
use custom_fields_store::{CustomFields, StoreConfig};
use serde_json::json;
use tempfile::TempDir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn open(dir: &TempDir) -> CustomFields {
    init_tracing();
    let config = StoreConfig::default().with_database_path(dir.path().join("fields.db"));
    CustomFields::open(config).unwrap()
}

fn partner_schema() -> Schema {
    Schema::new("Partner", [("en", "Partner Custom Fields")])
        .with_description("Extra partner attributes")
        .with_field(FieldDef::new("industry", "Industry", FieldType::Text))
        .unwrap()
        .with_field(FieldDef::new("website", "Website", FieldType::Text).rule("regex:^https?://"))
        .unwrap()
}

#[test]
fn create_and_reload_from_disk() {
    let dir = TempDir::new().unwrap();
    let created = open(&dir).registry().create_schema(partner_schema()).unwrap();

    let fields = open(&dir);
    let loaded = fields.registry().active_schema("Partner").unwrap().unwrap();
    assert_eq!(loaded.id, created.id);
    assert_eq!(loaded.schema, partner_schema());
    assert_eq!(
        fields.registry().schema_by_id(created.id).unwrap().owner_type,
        "Partner"
    );
}

#[test]
fn second_schema_for_owner_type_violates_constraint() {
    let dir = TempDir::new().unwrap();
    let fields = open(&dir);
    fields.registry().create_schema(partner_schema()).unwrap();

    let err = fields
        .registry()
        .create_schema(Schema::new("Partner", "Another"))
        .unwrap_err();
    assert!(err.is_constraint_violation());
}

#[test]
fn add_update_remove_fields() {
    let dir = TempDir::new().unwrap();
    let fields = open(&dir);
    let registry = fields.registry();
    registry.create_schema(partner_schema()).unwrap();

    let stored = registry
        .add_field(
            "Partner",
            FieldDef::new("tier", "Tier", FieldType::Select)
                .option(SelectOption::new("gold", "Gold"))
                .option(SelectOption::new("silver", "Silver")),
        )
        .unwrap();
    assert_eq!(
        stored.keys().collect::<Vec<_>>(),
        vec!["industry", "website", "tier"]
    );

    let stored = registry
        .update_field(
            "Partner",
            "industry",
            FieldDef::new("industry", "Sector", FieldType::Textarea).show_in_table(),
        )
        .unwrap();
    let industry = stored.field("industry").unwrap();
    assert_eq!(stored.fields[0].key, "industry");
    assert_eq!(industry.type_, FieldType::Textarea);
    assert!(industry.show_in_table);

    let stored = registry.remove_field("Partner", "website").unwrap();
    assert_eq!(stored.keys().collect::<Vec<_>>(), vec!["industry", "tier"]);

    let reloaded = registry.schema("Partner").unwrap().unwrap();
    assert_eq!(reloaded.schema, stored.schema);
}

#[test]
fn duplicate_field_key_rejected() {
    let dir = TempDir::new().unwrap();
    let fields = open(&dir);
    fields.registry().create_schema(partner_schema()).unwrap();

    let err = fields
        .registry()
        .add_field("Partner", FieldDef::new("industry", "Industry", FieldType::Text))
        .unwrap_err();
    assert!(matches!(
        err.as_fields_error(),
        Some(FieldsError::DuplicateFieldKey { key }) if key == "industry"
    ));
    assert_eq!(
        fields.registry().schema("Partner").unwrap().unwrap().fields.len(),
        2
    );
}

#[test]
fn malformed_definitions_rejected() {
    let dir = TempDir::new().unwrap();
    let fields = open(&dir);
    let registry = fields.registry();
    registry.create_schema(partner_schema()).unwrap();

    let cases = [
        FieldDef::new("", "No key", FieldType::Text),
        FieldDef::new("Bad Key", "Bad key", FieldType::Text),
        FieldDef::new("stage", "Stage", FieldType::Select),
        FieldDef::new("notes", "Notes", FieldType::Text).option(SelectOption::new("a", "A")),
        FieldDef::new("score", "Score", FieldType::Number).rule("between:1,5"),
    ];
    for def in cases {
        let err = registry.add_field("Partner", def).unwrap_err();
        assert_eq!(
            err.as_fields_error().map(FieldsError::kind),
            Some(ErrorKind::Validation),
            "{err}"
        );
    }
    assert_eq!(registry.schema("Partner").unwrap().unwrap().fields.len(), 2);
}

#[test]
fn definitions_from_untyped_input() {
    let dir = TempDir::new().unwrap();
    let fields = open(&dir);
    fields.registry().create_schema(partner_schema()).unwrap();

    let def = FieldDef::from_value(&json!({
        "key": "is_preferred",
        "label": {"en": "Preferred Partner", "ar": "شريك مفضل"},
        "type": "boolean",
        "show_in_table": true,
    }))
    .unwrap();
    let stored = fields.registry().add_field("Partner", def).unwrap();

    let field = stored.field("is_preferred").unwrap();
    assert!(field.show_in_table);
    assert!(!field.required);
    assert_eq!(field.label.resolve("ar", "en"), "شريك مفضل");
}

#[test]
fn custom_rules_apply_to_values() {
    let dir = TempDir::new().unwrap();
    let fields = open(&dir);
    fields.registry().create_schema(partner_schema()).unwrap();
    let partner = fields.host(&custom_fields_store::OwnerRef::new("Partner", 9));

    partner
        .set_custom_field_value("website", &json!("https://example.com"), None)
        .unwrap();
    let err = partner
        .set_custom_field_value("website", &json!("example.com"), None)
        .unwrap_err();
    assert!(matches!(
        err.as_fields_error(),
        Some(FieldsError::RuleFailed { key, .. }) if key == "website"
    ));
}

#[test]
fn seed_file_creates_missing_schemas_only() {
    let dir = TempDir::new().unwrap();
    let fields = open(&dir);
    fields
        .registry()
        .create_schema(Schema::new("Partner", "Customized Partner"))
        .unwrap();

    let seed = dir.path().join("defaults.yaml");
    fs::write(
        &seed,
        r#"
- owner_type: Partner
  name:
    en: Partner Custom Fields
  field_definitions:
    - key: industry
      label: Industry
      type: text
- owner_type: Lead
  name:
    en: Lead Custom Fields
    ar: حقول العملاء المحتملين
  field_definitions:
    - key: source
      label:
        en: Source
      type: select
      required: true
      options:
        - value: web
          label:
            en: Web
        - value: referral
"#,
    )
    .unwrap();

    let created = fields.registry().seed_from_file(&seed).unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].owner_type, "Lead");
    assert!(created[0].field("source").unwrap().required);

    let partner = fields.registry().schema("Partner").unwrap().unwrap();
    assert_eq!(partner.name.resolve("en", "en"), "Customized Partner");
    assert!(partner.fields.is_empty());

    let again = fields.registry().seed_from_file(&seed).unwrap();
    assert!(again.is_empty());
    assert_eq!(fields.registry().list_schemas().unwrap().len(), 2);
}

#[test]
fn seed_file_with_single_json_schema() {
    let dir = TempDir::new().unwrap();
    let fields = open(&dir);

    let seed = dir.path().join("contact.json");
    fs::write(
        &seed,
        json!({
            "owner_type": "Contact",
            "name": "Contact Custom Fields",
            "field_definitions": [
                {"key": "birthday", "label": "Birthday", "type": "date"}
            ],
            "is_active": false
        })
        .to_string(),
    )
    .unwrap();

    let created = fields.registry().seed_from_file(&seed).unwrap();
    assert_eq!(created.len(), 1);
    assert!(!created[0].is_active);
    assert!(fields.registry().active_schema("Contact").unwrap().is_none());
}

#[test]
fn seed_file_with_invalid_field_rejected() {
    let dir = TempDir::new().unwrap();
    let fields = open(&dir);

    let seed = dir.path().join("broken.yaml");
    fs::write(
        &seed,
        "owner_type: Lead\nname: Leads\nfield_definitions:\n  - key: stage\n    label: Stage\n    type: select\n",
    )
    .unwrap();

    let err = fields.registry().seed_from_file(&seed).unwrap_err();
    assert!(matches!(
        err.as_fields_error(),
        Some(FieldsError::InvalidDefinition { key, .. }) if key == "stage"
    ));
    assert!(fields.registry().schema("Lead").unwrap().is_none());
}

#[test]
fn missing_seed_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let fields = open(&dir);
    let err = fields
        .registry()
        .seed_from_file(dir.path().join("absent.yaml"))
        .unwrap_err();
    assert!(err.to_string().contains("absent.yaml"));
}
