//! End-to-end tests against an in-memory SQLite database: command CRUD,
//! model lifecycle, dynamic helpers and relations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use loam_orm::{
    Condition, Db, Dispatched, Error, Hooks, Model, ModelSpec, Params, PrimaryKey, Related,
    Relation, SqlValue, ValueMap,
};

fn text(s: &str) -> SqlValue {
    SqlValue::Text(String::from(s))
}

fn values(pairs: &[(&str, SqlValue)]) -> ValueMap {
    pairs
        .iter()
        .map(|(k, v)| (String::from(*k), v.clone()))
        .collect()
}

fn params(pairs: &[(&str, SqlValue)]) -> Params {
    values(pairs)
}

async fn setup() -> Db {
    let db = Db::new("sqlite::memory:");
    for ddl in [
        "CREATE TABLE contact (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             name TEXT NOT NULL,
             email TEXT,
             city TEXT
         )",
        "CREATE TABLE profile (
             id INTEGER PRIMARY KEY,
             bio TEXT NOT NULL
         )",
        "CREATE TABLE phone (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             contact_id INTEGER NOT NULL,
             number TEXT NOT NULL
         )",
        "CREATE TABLE tag (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             label TEXT NOT NULL
         )",
        "CREATE TABLE contact_tag (
             contact_id INTEGER NOT NULL,
             tag_id INTEGER NOT NULL
         )",
    ] {
        db.command().sql(ddl).execute().await.unwrap();
    }
    db
}

fn contact_spec() -> ModelSpec {
    ModelSpec::table("contact")
        // Both keys default to the primary keys of the two sides.
        .relation("profile", Relation::one_to_one(ModelSpec::table("profile")))
        .relation(
            "phones",
            Relation::one_to_many(ModelSpec::table("phone")).target_key("contact_id"),
        )
        .relation(
            "tags",
            Relation::many_to_many(ModelSpec::table("tag"), "contact_tag,contact_id,tag_id")
                .unwrap(),
        )
}

fn phone_spec() -> ModelSpec {
    ModelSpec::table("phone").relation(
        "owner",
        Relation::many_to_one(ModelSpec::table("contact")).key("contact_id"),
    )
}

async fn seed_contact(db: &Db, name: &str, email: &str, city: &str) -> i64 {
    db.command()
        .insert(
            "contact",
            &values(&[
                ("name", text(name)),
                ("email", text(email)),
                ("city", text(city)),
            ]),
        )
        .await
        .unwrap();
    db.last_insert_id().await.unwrap().unwrap()
}

#[tokio::test]
async fn command_crud_round_trip() {
    let db = setup().await;
    let affected = db
        .command()
        .insert(
            "contact",
            &values(&[("name", text("Ada")), ("email", text("ada@example.org"))]),
        )
        .await
        .unwrap();
    assert_eq!(affected, 1);
    let id = db.last_insert_id().await.unwrap().unwrap();
    assert_eq!(id, 1);

    let row = db
        .command()
        .select("id, name, email")
        .from("contact")
        .where_clause(
            Condition::raw("id = :id"),
            params(&[(":id", SqlValue::Int(id))]),
        )
        .query_row()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.get("name"), Some(&text("Ada")));

    let affected = db
        .command()
        .update(
            "contact",
            &values(&[("email", text("ada@lovelace.org"))]),
            Condition::raw("id = :id"),
            params(&[(":id", SqlValue::Int(id))]),
        )
        .await
        .unwrap();
    assert_eq!(affected, 1);

    let email = db
        .command()
        .select("email")
        .from("contact")
        .query_scalar()
        .await
        .unwrap();
    assert_eq!(email, Some(text("ada@lovelace.org")));

    let affected = db
        .command()
        .delete(
            "contact",
            Condition::raw("id = :id"),
            params(&[(":id", SqlValue::Int(id))]),
        )
        .await
        .unwrap();
    assert_eq!(affected, 1);
}

#[tokio::test]
async fn update_binds_set_values_apart_from_condition_params() {
    let db = setup().await;
    seed_contact(&db, "Ada", "ada@example.org", "London").await;
    seed_contact(&db, "Grace", "grace@example.org", "New York").await;

    // The city column appears both as a SET value and in the condition.
    let affected = db
        .command()
        .update(
            "contact",
            &values(&[("city", text("Paris"))]),
            Condition::raw("city = :city"),
            params(&[(":city", text("London"))]),
        )
        .await
        .unwrap();
    assert_eq!(affected, 1);

    let factory = db.factory(contact_spec());
    assert_eq!(factory.count_by("city", "Paris").await.unwrap(), 1);
    assert_eq!(factory.count_by("city", "New York").await.unwrap(), 1);
}

#[tokio::test]
async fn structured_conditions_filter_rows() {
    let db = setup().await;
    seed_contact(&db, "Ada", "ada@example.org", "London").await;
    seed_contact(&db, "Grace", "grace@example.org", "New York").await;
    seed_contact(&db, "Alan", "alan@example.org", "London").await;

    let rows = db
        .command()
        .select("name")
        .from("contact")
        .where_clause(
            Condition::and(vec![
                Condition::in_list("city", ["London"]),
                Condition::like("name", ["A%"]),
            ]),
            Params::new(),
        )
        .order_by("name")
        .query_column()
        .await
        .unwrap();
    assert_eq!(rows, vec![text("Ada"), text("Alan")]);
}

#[tokio::test]
async fn factory_finders_and_paging() {
    let db = setup().await;
    for i in 0..8 {
        seed_contact(
            &db,
            &format!("c{i}"),
            &format!("c{i}@example.org"),
            if i % 2 == 0 { "London" } else { "Oslo" },
        )
        .await;
    }
    let factory = db.factory(contact_spec());

    assert_eq!(factory.find_all().await.unwrap().len(), 8);
    assert_eq!(factory.count(Condition::none(), Params::new()).await.unwrap(), 8);
    assert_eq!(factory.count_by("city", "Oslo").await.unwrap(), 4);

    let found = factory.find(3_i64).await.unwrap().unwrap();
    assert_eq!(found.get("name"), Some(&text("c2")));
    assert!(factory.find(99_i64).await.unwrap().is_none());

    let page = factory
        .find_many(
            Condition::none(),
            Params::new(),
            Some("id"),
            Some(3),
            Some(4),
        )
        .await
        .unwrap();
    let names: Vec<_> = page.iter().map(|m| m.get("name").cloned().unwrap()).collect();
    assert_eq!(names, vec![text("c4"), text("c5"), text("c6")]);
}

#[tokio::test]
async fn dynamic_helpers_match_typed_finders() {
    let db = setup().await;
    seed_contact(&db, "Ada", "ada@example.org", "London").await;
    seed_contact(&db, "Grace", "grace@example.org", "New York").await;
    let factory = db.factory(contact_spec());

    let Dispatched::One(found) = factory
        .dispatch("findOneByName", "Grace", None, None, None, None)
        .await
        .unwrap()
    else {
        panic!("expected a single record")
    };
    let typed = factory.find_one_by("name", "Grace").await.unwrap();
    assert_eq!(
        found.unwrap().get("email"),
        typed.unwrap().get("email")
    );

    let Dispatched::Count(count) = factory
        .dispatch("countByCity", "London", None, None, None, None)
        .await
        .unwrap()
    else {
        panic!("expected a count")
    };
    assert_eq!(count, 1);

    let new_values = values(&[("city", text("Cambridge"))]);
    let Dispatched::Affected(affected) = factory
        .dispatch("updateByName", "Ada", Some(&new_values), None, None, None)
        .await
        .unwrap()
    else {
        panic!("expected an affected count")
    };
    assert_eq!(affected, 1);

    assert!(matches!(
        factory
            .dispatch("updateByName", "Ada", None, None, None, None)
            .await,
        Err(Error::MissingUpdateValues)
    ));
    assert!(matches!(
        factory
            .dispatch("explodeByName", "Ada", None, None, None, None)
            .await,
        Err(Error::UnknownMethod(_))
    ));
}

#[tokio::test]
async fn dispatched_find_many_forwards_order_and_paging() {
    let db = setup().await;
    for i in 0..6 {
        seed_contact(&db, &format!("c{i}"), &format!("c{i}@example.org"), "London").await;
    }
    let factory = db.factory(contact_spec());

    let Dispatched::Many(page) = factory
        .dispatch("findManyByCity", "London", None, Some("id DESC"), Some(2), Some(1))
        .await
        .unwrap()
    else {
        panic!("expected a record list")
    };
    let typed = factory
        .find_many_by("city", "London", Some("id DESC"), Some(2), Some(1))
        .await
        .unwrap();

    let names = |models: &[Model]| -> Vec<SqlValue> {
        models.iter().map(|m| m.get("name").cloned().unwrap()).collect()
    };
    assert_eq!(names(&page), vec![text("c4"), text("c3")]);
    assert_eq!(names(&page), names(&typed));
}

#[tokio::test]
async fn model_lifecycle() {
    let db = setup().await;
    let factory = db.factory(contact_spec());

    let mut record = factory.create(values(&[
        ("name", text("Ada")),
        ("email", text("ada@example.org")),
    ]));
    assert!(record.is_new());
    let affected = record.save().await.unwrap();
    assert_eq!(affected, 1);
    assert!(!record.is_new());
    assert_eq!(record.get("id"), Some(&SqlValue::Int(1)));

    // Clean persisted record: nothing to write.
    assert!(matches!(record.save().await, Err(Error::NothingToSave)));

    record.set("email", "ada@lovelace.org");
    assert!(record.is_dirty());
    assert_eq!(record.save().await.unwrap(), 1);
    assert!(!record.is_dirty());

    let reloaded = factory.find(1_i64).await.unwrap().unwrap();
    assert_eq!(reloaded.get("email"), Some(&text("ada@lovelace.org")));

    let mut reloaded = reloaded;
    assert_eq!(reloaded.delete().await.unwrap(), 1);
    assert!(reloaded.is_new());
    assert!(factory.find(1_i64).await.unwrap().is_none());
}

#[tokio::test]
async fn deleting_an_unsaved_record_touches_nothing() {
    let db = setup().await;
    let factory = db.factory(contact_spec());
    let mut record = factory.create(values(&[("name", text("ghost"))]));
    assert_eq!(record.delete().await.unwrap(), 0);
    assert_eq!(factory.count(Condition::none(), Params::new()).await.unwrap(), 0);
}

struct VetoDelete {
    saved: AtomicBool,
}

impl Hooks for VetoDelete {
    fn after_save(&self, _model: &mut Model) {
        self.saved.store(true, Ordering::SeqCst);
    }

    fn before_delete(&self, _model: &mut Model) -> bool {
        false
    }
}

#[tokio::test]
async fn hooks_observe_and_veto() {
    let db = setup().await;
    let hooks = Arc::new(VetoDelete {
        saved: AtomicBool::new(false),
    });
    let spec = ModelSpec::table("contact").hooks(Arc::clone(&hooks) as Arc<dyn Hooks>);
    let factory = db.factory(spec);

    let mut record = factory.create(values(&[("name", text("Ada"))]));
    record.save().await.unwrap();
    assert!(hooks.saved.load(Ordering::SeqCst));

    assert!(matches!(
        record.delete().await,
        Err(Error::HookRejected("before_delete"))
    ));
    assert_eq!(factory.count_by("name", "Ada").await.unwrap(), 1);
}

#[tokio::test]
async fn relations_resolve() {
    let db = setup().await;
    let contact_id = seed_contact(&db, "Ada", "ada@example.org", "London").await;
    db.command()
        .insert(
            "profile",
            &values(&[
                ("id", SqlValue::Int(contact_id)),
                ("bio", text("first programmer")),
            ]),
        )
        .await
        .unwrap();
    for number in ["123", "456"] {
        db.command()
            .insert(
                "phone",
                &values(&[
                    ("contact_id", SqlValue::Int(contact_id)),
                    ("number", text(number)),
                ]),
            )
            .await
            .unwrap();
    }
    for label in ["friend", "mathematician"] {
        db.command()
            .insert("tag", &values(&[("label", text(label))]))
            .await
            .unwrap();
        let tag_id = db.last_insert_id().await.unwrap().unwrap();
        db.command()
            .insert(
                "contact_tag",
                &values(&[
                    ("contact_id", SqlValue::Int(contact_id)),
                    ("tag_id", SqlValue::Int(tag_id)),
                ]),
            )
            .await
            .unwrap();
    }

    let contacts = db.factory(contact_spec());
    let contact = contacts.find(contact_id).await.unwrap().unwrap();

    let Related::One(profile) = contact.related("profile").await.unwrap() else {
        panic!("expected a single record")
    };
    assert_eq!(
        profile.unwrap().get("bio"),
        Some(&text("first programmer"))
    );

    let Related::Many(phones) = contact.related("phones").await.unwrap() else {
        panic!("expected a record list")
    };
    assert_eq!(phones.len(), 2);

    let Related::Many(tags) = contact.related("tags").await.unwrap() else {
        panic!("expected a record list")
    };
    let mut labels: Vec<_> = tags
        .iter()
        .map(|t| t.get("label").cloned().unwrap())
        .collect();
    labels.sort_by_key(|v| v.as_str().map(String::from));
    assert_eq!(labels, vec![text("friend"), text("mathematician")]);

    let phones_factory = db.factory(phone_spec());
    let phone = phones_factory.find_one_by("number", "123").await.unwrap().unwrap();
    let Related::One(owner) = phone.related("owner").await.unwrap() else {
        panic!("expected a single record")
    };
    assert_eq!(owner.unwrap().get("name"), Some(&text("Ada")));

    assert!(matches!(
        contact.related("enemies").await,
        Err(Error::UnknownRelation(name)) if name == "enemies"
    ));
}

#[tokio::test]
async fn composite_keys_update_and_scalar_find_fails() {
    let db = setup().await;
    db.command()
        .sql("CREATE TABLE membership (tenant INTEGER, contact_id INTEGER, role TEXT, \
              PRIMARY KEY (tenant, contact_id))")
        .execute()
        .await
        .unwrap();
    let factory = db.factory(
        ModelSpec::table("membership")
            .primary_key(PrimaryKey::composite(["tenant", "contact_id"])),
    );
    factory
        .insert(&values(&[
            ("tenant", SqlValue::Int(1)),
            ("contact_id", SqlValue::Int(7)),
            ("role", text("admin")),
        ]))
        .await
        .unwrap();

    assert!(matches!(
        factory.find(1_i64).await,
        Err(Error::CompositeKeyScalar)
    ));

    let key = values(&[
        ("tenant", SqlValue::Int(1)),
        ("contact_id", SqlValue::Int(7)),
    ]);
    let found = factory.find_by_map(&key).await.unwrap().unwrap();
    assert_eq!(found.get("role"), Some(&text("admin")));

    let mut member = found;
    member.set("role", "owner");
    assert_eq!(member.save().await.unwrap(), 1);
    let reloaded = factory.find_by_map(&key).await.unwrap().unwrap();
    assert_eq!(reloaded.get("role"), Some(&text("owner")));
}

#[tokio::test]
async fn transactions_pass_through_the_registry() {
    let db = setup().await;
    db.begin_transaction().await.unwrap();
    assert!(db.in_transaction().await.unwrap());
    seed_contact(&db, "Ada", "ada@example.org", "London").await;
    db.rollback().await.unwrap();
    assert!(!db.in_transaction().await.unwrap());

    let factory = db.factory(contact_spec());
    assert_eq!(factory.count(Condition::none(), Params::new()).await.unwrap(), 0);

    db.begin_transaction().await.unwrap();
    seed_contact(&db, "Grace", "grace@example.org", "New York").await;
    db.commit().await.unwrap();
    assert_eq!(factory.count(Condition::none(), Params::new()).await.unwrap(), 1);
}
