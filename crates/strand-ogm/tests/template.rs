//! Saving, loading and deleting object graphs through the in-memory driver.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use strand_core::schema::{AssociationSchema, EntitySchema, IdStrategy, MappingContext};
use strand_core::{AssociationValue, EntityRef, Error, Properties, PropertyKind};
use strand_cypher::{Example, ExampleMatcher, Order, Pageable, Sort};
use strand_graph::{GraphState, MemoryDriver};
use strand_ogm::{DatabaseSelection, EntityCallbacks, ResultShape, Template};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn context() -> Arc<MappingContext> {
    let ctx = MappingContext::new();
    ctx.register(
        EntitySchema::new("Person")
            .id("id", IdStrategy::Internal)
            .property("name", PropertyKind::String)
            .property("age", PropertyKind::Integer)
            .dynamic_labels("roles")
            .association(AssociationSchema::outgoing("knows", "KNOWS", "Person"))
            .association(AssociationSchema::outgoing("pets", "OWNS", "Pet")),
    )
    .unwrap();
    ctx.register(
        EntitySchema::new("Pet")
            .id("id", IdStrategy::Internal)
            .property("name", PropertyKind::String)
            .association(AssociationSchema::incoming("owner", "OWNS", "Person").single()),
    )
    .unwrap();
    ctx.register(
        EntitySchema::new("Movie")
            .id("id", IdStrategy::uuid())
            .property("title", PropertyKind::String)
            .association(AssociationSchema::incoming("actors", "ACTED_IN", "Actor").with_properties()),
    )
    .unwrap();
    ctx.register(
        EntitySchema::new("Actor")
            .id("name", IdStrategy::Assigned)
            .property("born", PropertyKind::Integer),
    )
    .unwrap();
    ctx.register(
        EntitySchema::new("Account")
            .id("number", IdStrategy::Assigned)
            .property("balance", PropertyKind::Integer)
            .version("version")
            .association(AssociationSchema::outgoing("holder", "HELD_BY", "Person").single()),
    )
    .unwrap();
    ctx.register(
        EntitySchema::new("Thing")
            .id("code", IdStrategy::Assigned)
            .property("name", PropertyKind::String),
    )
    .unwrap();
    ctx.register(
        EntitySchema::new("Club")
            .id("id", IdStrategy::Internal)
            .property("name", PropertyKind::String)
            .association(AssociationSchema::outgoing("links", "LINKED", "Pet").dynamic()),
    )
    .unwrap();
    Arc::new(ctx)
}

fn setup() -> (Template, MemoryDriver) {
    init_tracing();
    let driver = MemoryDriver::new();
    let template = Template::new(Arc::new(driver.clone()), context());
    (template, driver)
}

fn person(name: &str) -> EntityRef {
    EntityRef::new("Person").with("name", name)
}

fn pet(name: &str) -> EntityRef {
    EntityRef::new("Pet").with("name", name)
}

fn internal_id(entity: &EntityRef) -> i64 {
    entity.get("id").and_then(|v| v.as_i64()).unwrap()
}

async fn state(driver: &MemoryDriver) -> GraphState {
    driver.snapshot(None).await
}

// ── Saving ───────────────────────────────────────────────────────

#[tokio::test]
async fn save_back_fills_ids_on_every_reachable_instance() {
    let (template, driver) = setup();
    let rex = pet("Rex");
    let alice = person("Alice").with_association("pets", vec![rex.clone()].into());

    template.save(&alice).await.unwrap();

    let alice_id = internal_id(&alice);
    let rex_id = internal_id(&rex);
    let graph = state(&driver).await;
    assert_eq!(graph.node(alice_id).unwrap().properties["name"], json!("Alice"));
    assert!(graph.node(rex_id).unwrap().has_label("Pet"));

    let owns: Vec<_> = graph.relationships_of_type("OWNS").collect();
    assert_eq!(owns.len(), 1);
    assert_eq!((owns[0].start, owns[0].end), (alice_id, rex_id));

    let loaded = template.find_by_id("Person", alice_id).await.unwrap().unwrap();
    assert_eq!(loaded.get("name"), Some(json!("Alice")));
}

#[tokio::test]
async fn saving_the_same_graph_twice_is_idempotent() {
    let (template, driver) = setup();
    let bob = person("Bob");
    let alice = person("Alice")
        .with_association("knows", vec![bob.clone()].into())
        .with_association("pets", vec![pet("Rex"), pet("Fido")].into());

    template.save(&alice).await.unwrap();
    let first = state(&driver).await;
    template.save(&alice).await.unwrap();
    let second = state(&driver).await;

    assert_eq!(first.node_count(), 4);
    assert_eq!(second.node_count(), 4);
    assert_eq!(first.relationship_count(), 3);
    assert_eq!(second.relationship_count(), 3);
}

#[tokio::test]
async fn cyclic_graphs_terminate() {
    let (template, driver) = setup();
    let alice = person("Alice");
    let bob = person("Bob");
    alice.set_association("knows", vec![bob.clone()].into());
    bob.set_association("knows", vec![alice.clone()].into());

    template.save(&alice).await.unwrap();

    let graph = state(&driver).await;
    assert_eq!(graph.node_count(), 2);
    let knows: Vec<_> = graph.relationships_of_type("KNOWS").collect();
    assert_eq!(knows.len(), 2);

    // A self-reference is a cycle of length one.
    let narcissus = person("Narcissus");
    narcissus.set_association("knows", vec![narcissus.clone()].into());
    template.save(&narcissus).await.unwrap();
    assert_eq!(state(&driver).await.relationships_of_type("KNOWS").count(), 3);
}

#[tokio::test]
async fn bidirectional_relationships_are_written_once() {
    let (template, driver) = setup();
    let alice = person("Alice");
    let rex = pet("Rex");
    alice.set_association("pets", vec![rex.clone()].into());
    rex.set_association("owner", alice.clone().into());

    template.save(&alice).await.unwrap();
    template.save(&rex).await.unwrap();

    let graph = state(&driver).await;
    let owns: Vec<_> = graph.relationships_of_type("OWNS").collect();
    assert_eq!(owns.len(), 1);
    assert_eq!((owns[0].start, owns[0].end), (internal_id(&alice), internal_id(&rex)));
}

#[tokio::test]
async fn saving_replaces_the_relationships_of_an_association() {
    let (template, driver) = setup();
    let bob = person("Bob");
    let carol = person("Carol");
    let alice = person("Alice").with_association("knows", vec![bob.clone(), carol.clone()].into());
    template.save(&alice).await.unwrap();
    assert_eq!(state(&driver).await.relationships_of_type("KNOWS").count(), 2);

    alice.set_association("knows", vec![bob.clone()].into());
    template.save(&alice).await.unwrap();

    let graph = state(&driver).await;
    let knows: Vec<_> = graph.relationships_of_type("KNOWS").collect();
    assert_eq!(knows.len(), 1);
    assert_eq!(knows[0].end, internal_id(&bob));
    // Dropped targets lose the relationship, not their node.
    assert!(graph.node(internal_id(&carol)).is_some());
}

#[tokio::test]
async fn empty_associations_clear_persisted_relationships() {
    let (template, driver) = setup();
    let alice = person("Alice").with_association("pets", vec![pet("Rex")].into());
    template.save(&alice).await.unwrap();

    alice.set_association("pets", AssociationValue::Empty);
    template.save(&alice).await.unwrap();
    assert_eq!(state(&driver).await.relationships_of_type("OWNS").count(), 0);

    alice.set_association("pets", vec![pet("Fido")].into());
    template.save(&alice).await.unwrap();
    alice.set_association("pets", AssociationValue::Many(Vec::new()));
    template.save(&alice).await.unwrap();

    let graph = state(&driver).await;
    assert_eq!(graph.relationships_of_type("OWNS").count(), 0);
    assert_eq!(graph.nodes_with_label("Pet").count(), 2);
}

#[tokio::test]
async fn relationship_properties_and_generated_ids() {
    let (template, driver) = setup();
    let keanu = EntityRef::new("Actor").with("name", "Keanu Reeves").with("born", 1964);
    let mut roles = Properties::new();
    roles.insert("roles".to_string(), json!(["Neo"]));
    let matrix = EntityRef::new("Movie")
        .with("title", "The Matrix")
        .with_association("actors", AssociationValue::WithProperties(vec![(keanu, roles)]));

    template.save(&matrix).await.unwrap();

    let id = matrix.get("id").unwrap();
    assert!(uuid::Uuid::parse_str(id.as_str().unwrap()).is_ok());

    let graph = state(&driver).await;
    let (actor_id, _) = graph.nodes_with_label("Actor").next().unwrap();
    let (movie_id, movie) = graph.nodes_with_label("Movie").next().unwrap();
    assert_eq!(movie.properties["id"], id);

    let acted_in: Vec<_> = graph.relationships_of_type("ACTED_IN").collect();
    assert_eq!(acted_in.len(), 1);
    assert_eq!((acted_in[0].start, acted_in[0].end), (actor_id, movie_id));
    assert_eq!(acted_in[0].properties["roles"], json!(["Neo"]));

    // A second save keeps the generated id.
    template.save(&matrix).await.unwrap();
    assert_eq!(matrix.get("id"), Some(id));
    assert_eq!(state(&driver).await.nodes_with_label("Movie").count(), 1);
}

#[tokio::test]
async fn assigned_ids_must_be_set() {
    let (template, _) = setup();
    let err = template
        .save(&EntityRef::new("Thing").with("name", "nameless"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Mapping(_)));
}

#[tokio::test]
async fn dynamic_relationship_types_come_from_map_keys() {
    let (template, driver) = setup();
    let mut links = BTreeMap::new();
    links.insert("GUARDS".to_string(), vec![pet("Rex")]);
    links.insert("MASCOT_OF".to_string(), vec![pet("Tom")]);
    let club = EntityRef::new("Club")
        .with("name", "Chess")
        .with_association("links", AssociationValue::Dynamic(links));
    template.save(&club).await.unwrap();

    let graph = state(&driver).await;
    assert_eq!(graph.relationships_of_type("GUARDS").count(), 1);
    assert_eq!(graph.relationships_of_type("MASCOT_OF").count(), 1);
    assert_eq!(graph.relationships_of_type("LINKED").count(), 0);

    let mut links = BTreeMap::new();
    links.insert("GUARDS".to_string(), vec![pet("Max")]);
    club.set_association("links", AssociationValue::Dynamic(links));
    template.save(&club).await.unwrap();

    let graph = state(&driver).await;
    assert_eq!(graph.relationships_of_type("GUARDS").count(), 1);
    assert_eq!(graph.relationships_of_type("MASCOT_OF").count(), 0);
}

#[tokio::test]
async fn dynamic_labels_are_replaced_on_save() {
    let (template, driver) = setup();
    let alice = person("Alice").with("roles", json!(["Admin"]));
    template.save(&alice).await.unwrap();

    let id = internal_id(&alice);
    let labels = state(&driver).await.node(id).unwrap().labels.clone();
    assert_eq!(labels, vec!["Person".to_string(), "Admin".to_string()]);

    alice.set("roles", json!(["Auditor"]));
    template.save(&alice).await.unwrap();
    let labels = state(&driver).await.node(id).unwrap().labels.clone();
    assert_eq!(labels, vec!["Person".to_string(), "Auditor".to_string()]);

    let loaded = template.find_by_id("Person", id).await.unwrap().unwrap();
    assert_eq!(loaded.labels_in("roles"), vec!["Auditor".to_string()]);
    // The dynamic-labels field is not a property.
    assert!(!state(&driver).await.node(id).unwrap().properties.contains_key("roles"));
}

#[tokio::test]
async fn values_must_fit_the_shape_of_their_association() {
    let (template, driver) = setup();
    let bob = person("Bob");

    let mut likes = BTreeMap::new();
    likes.insert("LIKES".to_string(), vec![bob.clone()]);
    let alice = person("Alice").with_association("knows", AssociationValue::Dynamic(likes));
    let err = template.save(&alice).await.unwrap_err();
    assert!(matches!(err.root_cause(), Error::Mapping(m) if m.contains("Person.knows")));

    // Once the map is replaced, clearing the association leaves nothing behind.
    alice.set_association("knows", vec![bob.clone()].into());
    template.save(&alice).await.unwrap();
    alice.set_association("knows", AssociationValue::Empty);
    template.save(&alice).await.unwrap();
    let graph = state(&driver).await;
    assert_eq!(graph.relationships_of_type("LIKES").count(), 0);
    assert_eq!(graph.relationships_of_type("KNOWS").count(), 0);

    let mut since = Properties::new();
    since.insert("since".to_string(), json!(2020));
    alice.set_association("pets", AssociationValue::WithProperties(vec![(pet("Rex"), since)]));
    let err = template.save(&alice).await.unwrap_err();
    assert!(matches!(err.root_cause(), Error::Mapping(m) if m.contains("Person.pets")));

    let rex = pet("Rex").with_association("owner", vec![person("Carol"), person("Dave")].into());
    let err = template.save(&rex).await.unwrap_err();
    assert!(matches!(err.root_cause(), Error::Mapping(m) if m.contains("Pet.owner")));
    // A one-element collection is fine on a single-valued association.
    rex.set_association("owner", vec![person("Carol")].into());
    template.save(&rex).await.unwrap();
    assert_eq!(state(&driver).await.relationships_of_type("OWNS").count(), 1);
}

// ── Versions ─────────────────────────────────────────────────────

#[tokio::test]
async fn versions_are_checked_and_incremented() {
    let (template, _) = setup();
    let account = EntityRef::new("Account").with("number", "acc-1").with("balance", 10);

    template.save(&account).await.unwrap();
    assert_eq!(account.get("version"), Some(json!(0)));

    let stale = EntityRef::new("Account")
        .with("number", "acc-1")
        .with("balance", 99)
        .with("version", 0);

    account.set("balance", 20);
    template.save(&account).await.unwrap();
    assert_eq!(account.get("version"), Some(json!(1)));

    let err = template.save(&stale).await.unwrap_err();
    assert!(matches!(err, Error::OptimisticLocking { ref id, .. } if id == "acc-1"));
    assert_eq!(stale.get("version"), Some(json!(0)));

    let loaded = template.find_by_id("Account", "acc-1").await.unwrap().unwrap();
    assert_eq!(loaded.get("balance"), Some(json!(20)));
    assert_eq!(loaded.get("version"), Some(json!(1)));
}

#[tokio::test]
async fn versioned_deletes_require_the_current_version() {
    let (template, _) = setup();
    let account = EntityRef::new("Account").with("number", "acc-2").with("balance", 1);
    template.save(&account).await.unwrap();

    let err = template
        .delete_by_id_with_version("Account", "acc-2", 7)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::OptimisticLocking { .. }));
    assert!(template.exists_by_id("Account", "acc-2").await.unwrap());

    template.delete(&account).await.unwrap();
    assert!(!template.exists_by_id("Account", "acc-2").await.unwrap());
}

// ── Failures ─────────────────────────────────────────────────────

#[tokio::test]
async fn rolled_back_saves_restore_ids_and_versions() {
    let (template, driver) = setup();
    let account = EntityRef::new("Account").with("number", "acc-3").with("balance", 5);
    template.save(&account).await.unwrap();
    assert_eq!(account.get("version"), Some(json!(0)));

    // The account and its holder are written before the holder's pets fail.
    let alice = person("Alice").with_association("pets", vec![person("Impostor")].into());
    account.set("balance", 6);
    account.set_association("holder", alice.clone().into());
    let err = template.save(&account).await.unwrap_err();
    assert!(matches!(err.root_cause(), Error::Mapping(_)));
    assert_eq!(account.get("version"), Some(json!(0)));
    assert_eq!(alice.get("id"), None);

    alice.set_association("pets", AssociationValue::Empty);
    template.save(&account).await.unwrap();
    assert_eq!(account.get("version"), Some(json!(1)));
    let graph = state(&driver).await;
    assert!(graph.node(internal_id(&alice)).is_some());
    assert_eq!(graph.relationships_of_type("HELD_BY").count(), 1);

    // The same holds for transactions owned by the caller.
    let mut tx = template.begin().await.unwrap();
    template.save_in(tx.as_mut(), &account).await.unwrap();
    assert_eq!(account.get("version"), Some(json!(2)));
    tx.rollback().await.unwrap();
    assert_eq!(account.get("version"), Some(json!(1)));
    template.save(&account).await.unwrap();
    assert_eq!(account.get("version"), Some(json!(2)));
}

#[tokio::test]
async fn failures_roll_back_the_whole_graph() {
    let (template, driver) = setup();
    let alice = person("Alice")
        .with_association("knows", vec![person("Bob")].into())
        .with_association("pets", vec![person("Impostor")].into());

    let err = template.save(&alice).await.unwrap_err();
    match &err {
        Error::Association { path, .. } => assert_eq!(path, "Person.pets -> Pet"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(matches!(err.root_cause(), Error::Mapping(_)));
    assert_eq!(state(&driver).await.node_count(), 0);
}

#[tokio::test]
async fn nested_failures_report_the_full_association_path() {
    let (template, _) = setup();
    let rex = pet("Rex").with_association("owner", pet("NotAPerson").into());
    let alice = person("Alice").with_association("pets", vec![rex].into());

    let err = template.save(&alice).await.unwrap_err();
    match err {
        Error::Association { path, .. } => {
            assert_eq!(path, "Person.pets -> Pet -> Pet.owner -> Person")
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn callbacks_run_before_binding_and_can_abort() {
    init_tracing();
    let driver = MemoryDriver::new();
    let mut callbacks = EntityCallbacks::new();
    callbacks.register(|entity: &EntityRef| -> anyhow::Result<()> {
        if entity.type_name() == "Thing" && entity.get("name").is_none() {
            entity.set("name", "unnamed");
        }
        if entity.get("name") == Some(json!("forbidden")) {
            anyhow::bail!("forbidden name");
        }
        Ok(())
    });
    let template = Template::new(Arc::new(driver.clone()), context()).with_callbacks(callbacks);

    template
        .save(&EntityRef::new("Thing").with("code", "t-1"))
        .await
        .unwrap();
    let (_, thing) = driver
        .snapshot(None)
        .await
        .nodes_with_label("Thing")
        .map(|(id, node)| (id, node.clone()))
        .next()
        .unwrap();
    assert_eq!(thing.properties["name"], json!("unnamed"));

    let err = template
        .save(&EntityRef::new("Thing").with("code", "t-2").with("name", "forbidden"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Callback { .. }));
    assert_eq!(driver.snapshot(None).await.node_count(), 1);
}

// ── Batches ──────────────────────────────────────────────────────

#[tokio::test]
async fn eligible_entities_are_saved_in_one_batch() {
    let (template, driver) = setup();
    let things: Vec<_> = (1..=3)
        .map(|i| EntityRef::new("Thing").with("code", format!("t-{i}")).with("name", format!("thing {i}")))
        .collect();

    let saved = template.save_all(&things).await.unwrap();
    assert_eq!(saved.len(), 3);
    assert_eq!(template.count("Thing").await.unwrap(), 3);

    // Saving again merges on the id property.
    things[0].set("name", "renamed");
    template.save_all(&things).await.unwrap();
    let graph = state(&driver).await;
    assert_eq!(graph.nodes_with_label("Thing").count(), 3);
    assert!(graph
        .nodes_with_label("Thing")
        .any(|(_, node)| node.properties["name"] == json!("renamed")));
}

#[tokio::test]
async fn ineligible_entities_are_saved_one_by_one() {
    let (template, _) = setup();
    let accounts: Vec<_> = ["a", "b"]
        .iter()
        .map(|n| EntityRef::new("Account").with("number", *n).with("balance", 0))
        .collect();
    template.save_all(&accounts).await.unwrap();
    assert!(accounts.iter().all(|a| a.get("version") == Some(json!(0))));

    let people = vec![person("Alice"), person("Bob")];
    template.save_all(&people).await.unwrap();
    assert!(people.iter().all(|p| p.get("id").is_some()));

    assert!(template.save_all(&[]).await.unwrap().is_empty());
}

// ── Finding ──────────────────────────────────────────────────────

async fn save_people(template: &Template) {
    for (name, age) in [("Alice", Value::from(42)), ("Bob", Value::Null), ("alice", Value::from(7))] {
        template.save(&person(name).with("age", age)).await.unwrap();
    }
}

#[tokio::test]
async fn finds_by_example() {
    let (template, _) = setup();
    save_people(&template).await;

    let example = Example::of(person("Alice"));
    let found = template.find_all_by_example(&example).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].get("age"), Some(json!(42)));

    let any_case = Example::with_matcher(person("ALICE"), ExampleMatcher::matching_all().with_ignore_case());
    assert_eq!(template.count_by_example(&any_case).await.unwrap(), 2);
    let err = template.find_one_by_example(&any_case).await.unwrap_err();
    assert!(matches!(err, Error::IncorrectResultSize { expected: 1, actual: 2 }));

    let nulls = Example::with_matcher(
        person("Bob").with("age", Value::Null),
        ExampleMatcher::matching_all().with_include_null_values(),
    );
    let bob = template.find_one_by_example(&nulls).await.unwrap().unwrap();
    assert_eq!(bob.get("name"), Some(json!("Bob")));

    let nobody = Example::of(person("Zed"));
    assert!(template.find_one_by_example(&nobody).await.unwrap().is_none());
}

#[tokio::test]
async fn finds_sorted_paged_and_by_ids() {
    let (template, _) = setup();
    save_people(&template).await;

    let sorted = template
        .find_all_sorted("Person", &Sort::by(Order::desc("name")))
        .await
        .unwrap();
    let names: Vec<_> = sorted.iter().map(|p| p.get("name").unwrap()).collect();
    assert_eq!(names, vec![json!("alice"), json!("Bob"), json!("Alice")]);

    let page = template
        .find_page("Person", &Pageable::of(1, 2).sorted(Sort::by(Order::asc("name").ignoring_case())))
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.content.len(), 1);
    assert_eq!(page.content[0].get("name"), Some(json!("Bob")));
    assert!(!page.has_next());

    let ids: Vec<Value> = sorted.iter().take(2).map(|p| p.get("id").unwrap()).collect();
    assert_eq!(template.find_all_by_id("Person", ids).await.unwrap().len(), 2);
    assert_eq!(template.find_all("Person").await.unwrap().len(), 3);
    assert!(template.find_by_id("Person", 999).await.unwrap().is_none());

    let err = template
        .find_all_sorted("Person", &Sort::by(Order::asc("shoeSize")))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Mapping(_)));
}

#[tokio::test]
async fn executable_queries_are_lazy_and_check_their_size() {
    let (template, _) = setup();

    let query = template.prepare_find_by_example(&Example::of(person("Alice"))).unwrap();
    // Nothing has run yet; saving afterwards is visible to the query.
    let pending = template.to_executable_query(query.clone());
    assert!(pending.one().await.unwrap().is_none());
    let err = template.to_executable_query(query.clone()).required_one().await.unwrap_err();
    assert!(matches!(err, Error::NoResult { expected: 1, .. }));

    template.save(&person("Alice")).await.unwrap();
    let alice = template.to_executable_query(query.clone()).one().await.unwrap().unwrap();
    assert_eq!(alice.get("name"), Some(json!("Alice")));

    template.save(&person("Alice")).await.unwrap();
    let err = template.to_executable_query(query.clone()).one().await.unwrap_err();
    assert!(matches!(err, Error::IncorrectResultSize { expected: 1, actual: 2 }));
    assert!(template.to_executable_query(query.clone()).first().await.unwrap().is_some());
    assert_eq!(template.to_executable_query(query).all().await.unwrap().len(), 2);
}

#[tokio::test]
async fn executable_queries_honour_their_expected_shape() {
    let (template, _) = setup();
    template.save(&person("Alice")).await.unwrap();
    template.save(&person("Alice")).await.unwrap();
    let query = template.prepare_find_by_example(&Example::of(person("Alice"))).unwrap();

    let single = query.clone().expecting(ResultShape::Single);
    let err = template.to_executable_query(single.clone()).all().await.unwrap_err();
    assert!(matches!(err, Error::IncorrectResultSize { expected: 1, actual: 2 }));
    let err = template.to_executable_query(single).first().await.unwrap_err();
    assert!(matches!(err, Error::IncorrectResultSize { expected: 1, actual: 2 }));

    // Queries run for their side effects produce no values.
    let effects = query.expecting(ResultShape::None);
    assert!(template.to_executable_query(effects.clone()).all().await.unwrap().is_empty());
    assert!(template.to_executable_query(effects).one().await.unwrap().is_none());
}

// ── Deleting ─────────────────────────────────────────────────────

#[tokio::test]
async fn deletes_detach_relationships() {
    let (template, driver) = setup();
    let rex = pet("Rex");
    let alice = person("Alice").with_association("pets", vec![rex.clone()].into());
    template.save(&alice).await.unwrap();
    template.save(&person("Bob")).await.unwrap();

    assert_eq!(template.delete_by_id("Pet", internal_id(&rex)).await.unwrap(), 1);
    let graph = state(&driver).await;
    assert_eq!(graph.relationship_count(), 0);
    assert!(graph.node(internal_id(&alice)).is_some());

    assert_eq!(template.delete_by_id("Pet", internal_id(&rex)).await.unwrap(), 0);
    assert_eq!(
        template
            .delete_all_by_id("Person", vec![json!(internal_id(&alice))])
            .await
            .unwrap(),
        1
    );
    assert_eq!(template.delete_all("Person").await.unwrap(), 1);
    assert_eq!(state(&driver).await.node_count(), 0);
}

#[tokio::test]
async fn unsaved_entities_cannot_be_deleted() {
    let (template, _) = setup();
    let err = template.delete(&person("Nobody")).await.unwrap_err();
    assert!(matches!(err, Error::Mapping(_)));
}

// ── Databases ────────────────────────────────────────────────────

#[tokio::test]
async fn the_selected_database_is_used() {
    init_tracing();
    let driver = MemoryDriver::new();
    let template = Template::new(Arc::new(driver.clone()), context())
        .with_database_selection(|| DatabaseSelection::by_name("tenant-a"));

    template.save(&person("Alice")).await.unwrap();

    assert_eq!(driver.snapshot(Some("tenant-a")).await.node_count(), 1);
    assert_eq!(driver.snapshot(None).await.node_count(), 0);
    assert_eq!(template.count("Person").await.unwrap(), 1);
}

#[tokio::test]
async fn operations_outside_an_open_transaction_wait_then_fail() {
    init_tracing();
    let driver = MemoryDriver::new().with_lock_timeout(Duration::from_millis(50));
    let template = Template::new(Arc::new(driver), context());

    let mut tx = template.begin().await.unwrap();
    template.save_in(tx.as_mut(), &person("Alice")).await.unwrap();
    let err = template.count("Person").await.unwrap_err();
    assert!(err.is_retryable());
    tx.commit().await.unwrap();

    assert_eq!(template.count("Person").await.unwrap(), 1);
}

#[tokio::test]
async fn unknown_types_are_reported() {
    let (template, _) = setup();
    let err = template.save(&EntityRef::new("Spaceship")).await.unwrap_err();
    assert!(matches!(err, Error::UnknownEntity(ref name) if name == "Spaceship"));
}
