/// Integration tests for the document store
///
/// Every test opens a fresh SQLite file in a temporary directory.

use cotisations_shared::db::pool::DatabaseConfig;
use cotisations_shared::events::{AppEvent, EventBus, Operation};
use cotisations_shared::models::canton::Canton;
use cotisations_shared::models::contribution_type::ContributionType;
use cotisations_shared::models::member::{Member, MemberStatus};
use cotisations_shared::models::village::Village;
use cotisations_shared::ranking::{AmountSource, Criterion, RankingService, SortOrder};
use cotisations_shared::session::SessionStore;
use cotisations_shared::store::{Collection, DocumentKey, SeedReport, Snapshot, Store, StoreError};
use serde_json::{json, Value};
use tempfile::TempDir;

fn config(dir: &TempDir) -> DatabaseConfig {
    DatabaseConfig {
        url: format!("sqlite://{}", dir.path().join("store.db").display()),
        ..Default::default()
    }
}

async fn open_store() -> (Store, SeedReport, TempDir) {
    let dir = TempDir::new().unwrap();
    let (store, report) = Store::initialize(config(&dir), EventBus::default())
        .await
        .expect("Failed to initialize store");
    (store, report, dir)
}

fn member_in(village_id: i64, amount: f64) -> Member {
    Member {
        village_id: Some(village_id),
        contribution_amount: amount,
        occupation: "commercant".to_string(),
        ..Member::new("Mensah", "Afi")
    }
}

#[tokio::test]
async fn test_first_initialize_seeds_reference_data_once() {
    let dir = TempDir::new().unwrap();

    let (store, first) = Store::initialize(config(&dir), EventBus::default()).await.unwrap();
    assert_eq!(first.cantons, 4);
    assert_eq!(first.contribution_types, 3);

    let cantons: Vec<Canton> = store.get_all().await.unwrap();
    let names: Vec<_> = cantons.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Golfe", "Kloto", "Ogou", "Tchaoudjo"]);
    assert_eq!(cantons[0].chief_town.as_deref(), Some("Lomé"));

    let types: Vec<ContributionType> = store.get_all().await.unwrap();
    assert_eq!(types.len(), 3);
    assert_eq!(types[1].required_amount, 25000.0);
    drop(store);

    let (store, second) = Store::initialize(config(&dir), EventBus::default()).await.unwrap();
    assert!(second.is_empty());
    assert_eq!(store.count(Collection::Cantons).await.unwrap(), 4);
}

#[tokio::test]
async fn test_get_after_add_returns_input_plus_key_and_timestamps() {
    let (store, _, _dir) = open_store().await;

    let input = json!({"nom": "Zio", "description": "Plateau", "region": "Maritime"});
    let key = store.add_document(Collection::Cantons, input.clone()).await.unwrap();

    let stored = store.get_document(Collection::Cantons, &key).await.unwrap().unwrap();
    let mut expected = input.as_object().unwrap().clone();
    expected.insert("id".to_string(), serde_json::to_value(&key).unwrap());
    expected.insert("date_creation".to_string(), stored["date_creation"].clone());
    expected.insert("date_modification".to_string(), stored["date_modification"].clone());

    assert_eq!(stored, Value::Object(expected));
    assert!(stored["date_creation"].is_string());
    assert_eq!(stored["date_creation"], stored["date_modification"]);
}

#[tokio::test]
async fn test_add_keeps_explicit_id() {
    let (store, _, _dir) = open_store().await;

    let key = store
        .add_document(Collection::Villages, json!({"id": 40, "nom": "Bè", "canton_id": 1}))
        .await
        .unwrap();
    assert_eq!(key, DocumentKey::Id(40));

    let village: Village = store.get_by_id(40).await.unwrap().unwrap();
    assert_eq!(village.name, "Bè");
}

#[tokio::test]
async fn test_update_restamps_modification_time_strictly_later() {
    let (store, _, _dir) = open_store().await;

    let id = store.add(&Canton::new("Zio")).await.unwrap();
    let before: Canton = store.get_by_id(id).await.unwrap().unwrap();

    let mut edited = before.clone();
    edited.description = Some("Préfecture de Tsévié".to_string());
    store.update(&edited).await.unwrap();
    store.update(&edited).await.unwrap();

    let after: Canton = store.get_by_id(id).await.unwrap().unwrap();
    assert_eq!(after.description.as_deref(), Some("Préfecture de Tsévié"));
    assert_eq!(after.date_creation, before.date_creation);
    assert!(after.date_modification > before.date_modification);

    let all: Vec<Canton> = store.get_all().await.unwrap();
    let listed = all.iter().find(|c| c.id == Some(id)).unwrap();
    assert_eq!(listed, &after);
}

#[tokio::test]
async fn test_update_is_a_full_replace() {
    let (store, _, _dir) = open_store().await;

    let key = store
        .add_document(Collection::Cantons, json!({"nom": "Zio", "description": "x", "code": "ZIO"}))
        .await
        .unwrap();

    store
        .update_document(Collection::Cantons, json!({"id": key.as_id(), "nom": "Zio"}))
        .await
        .unwrap();

    let stored = store.get_document(Collection::Cantons, &key).await.unwrap().unwrap();
    assert!(stored.get("description").is_none());
    assert!(stored.get("code").is_none());
}

#[tokio::test]
async fn test_update_requires_existing_key() {
    let (store, _, _dir) = open_store().await;

    let err = store
        .update_document(Collection::Cantons, json!({"nom": "Sans clé"}))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::MissingKey(Collection::Cantons)));

    let err = store.update(&Canton::new("Sans clé")).await.unwrap_err();
    assert!(matches!(err, StoreError::MissingKey(Collection::Cantons)));

    let err = store
        .update_document(Collection::Cantons, json!({"id": 999, "nom": "Fantôme"}))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[tokio::test]
async fn test_delete_removes_record() {
    let (store, _, _dir) = open_store().await;

    let id = store.add(&member_in(1, 1000.0)).await.unwrap();
    store.delete(Collection::Members, id).await.unwrap();

    assert!(store.get_by_id::<Member>(id).await.unwrap().is_none());
    let all: Vec<Member> = store.get_all().await.unwrap();
    assert!(all.iter().all(|m| m.id != Some(id)));

    let err = store.delete(Collection::Members, id).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[tokio::test]
async fn test_delete_does_not_cascade() {
    let (store, _, _dir) = open_store().await;

    let canton = store.add(&Canton::new("Zio")).await.unwrap();
    let village = store.add(&Village::new("Tsévié", canton)).await.unwrap();

    store.delete(Collection::Cantons, canton).await.unwrap();

    let orphan: Village = store.get_by_id(village).await.unwrap().unwrap();
    assert_eq!(orphan.canton_id, canton);
}

#[tokio::test]
async fn test_duplicate_canton_name_is_a_constraint_error() {
    let (store, _, _dir) = open_store().await;

    let err = store.add(&Canton::new("Golfe")).await.unwrap_err();
    assert!(matches!(err, StoreError::Constraint { collection: Collection::Cantons, .. }));
    assert_eq!(store.count(Collection::Cantons).await.unwrap(), 4);
}

#[tokio::test]
async fn test_search_filters() {
    let (store, _, _dir) = open_store().await;

    let mut afi = member_in(3, 5000.0);
    afi.phone = Some("90112233".to_string());
    store.add(&afi).await.unwrap();

    let mut kossi = member_in(4, 2000.0);
    kossi.last_name = "Agbodjan".to_string();
    kossi.first_name = "Kossi".to_string();
    kossi.status = MemberStatus::Inactive;
    store.add(&kossi).await.unwrap();

    let by_name: Vec<Member> = store
        .search(json!({"nom": "MENS"}).as_object().unwrap())
        .await
        .unwrap();
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].first_name, "Afi");

    let by_village: Vec<Member> = store
        .search(json!({"village_id": 4}).as_object().unwrap())
        .await
        .unwrap();
    assert_eq!(by_village.len(), 1);
    assert_eq!(by_village[0].first_name, "Kossi");

    let ignored: Vec<Member> = store
        .search(json!({"statut": null}).as_object().unwrap())
        .await
        .unwrap();
    assert_eq!(ignored.len(), 2);

    let inactive = store
        .search_documents(Collection::Members, json!({"statut": "inactif"}).as_object().unwrap())
        .await
        .unwrap();
    assert_eq!(inactive.len(), 1);
}

#[tokio::test]
async fn test_mutations_publish_data_changed_events() {
    let (store, _, _dir) = open_store().await;
    let mut rx = store.events().subscribe();

    let id = store.add(&Canton::new("Zio")).await.unwrap();
    store.delete(Collection::Cantons, id).await.unwrap();

    let AppEvent::DataChanged(added) = rx.recv().await.unwrap() else {
        panic!("expected a data change");
    };
    assert_eq!(added.collection, Collection::Cantons);
    assert_eq!(added.operation, Operation::Added);
    assert_eq!(added.key, Some(DocumentKey::Id(id)));

    let AppEvent::DataChanged(deleted) = rx.recv().await.unwrap() else {
        panic!("expected a data change");
    };
    assert_eq!(deleted.operation, Operation::Deleted);
}

#[tokio::test]
async fn test_export_then_import_round_trip() {
    let (source, _, _source_dir) = open_store().await;

    let golfe = source
        .search::<Canton>(json!({"nom": "Golfe"}).as_object().unwrap())
        .await
        .unwrap()[0]
        .id
        .unwrap();
    let be = source.add(&Village::new("Bè", golfe)).await.unwrap();
    source.add(&member_in(be, 5000.0)).await.unwrap();
    source.set_setting("derniere_route", &"cotisants").await.unwrap();

    let snapshot = source.export_all().await.unwrap();
    assert_eq!(snapshot.version, source.schema_version().await.unwrap());
    assert_eq!(snapshot.collections.len(), Collection::ALL.len());

    let (target, _, _target_dir) = open_store().await;
    let report = target.import_all(&snapshot).await.unwrap();
    assert!(report.skipped.is_empty());

    for collection in Collection::ALL {
        assert_eq!(
            source.all_documents(collection).await.unwrap(),
            target.all_documents(collection).await.unwrap(),
            "collection {} differs after import",
            collection
        );
    }
}

#[tokio::test]
async fn test_import_accepts_legacy_payload_and_skips_unknown_collections() {
    let (store, _, _dir) = open_store().await;

    let payload = json!({
        "version": 2,
        "date_export": "2025-11-14T09:00:00.000Z",
        "donnees": {
            "cantons": [{"id": 7, "nom": "Kozah", "chef_lieu": "Kara"}],
            "utilisateurs": [{"id": 1}]
        }
    });
    let snapshot = serde_json::from_value(payload).unwrap();

    let report = store.import_all(&snapshot).await.unwrap();
    assert_eq!(report.imported.get("cantons"), Some(&1));
    assert_eq!(report.skipped, vec!["utilisateurs".to_string()]);

    let cantons: Vec<Canton> = store.get_all().await.unwrap();
    assert_eq!(cantons.len(), 1);
    assert_eq!(cantons[0].id, Some(7));
    assert!(cantons[0].date_creation.is_some());

    // Untouched collections keep their data
    assert_eq!(store.count(Collection::ContributionTypes).await.unwrap(), 3);
}

#[tokio::test]
async fn test_settings_and_session_preferences() {
    let (store, _, _dir) = open_store().await;

    assert_eq!(store.get_setting::<String>("theme").await.unwrap(), None);
    store.set_setting("theme", &"sombre").await.unwrap();
    store.set_setting("theme", &"clair").await.unwrap();
    assert_eq!(store.get_setting::<String>("theme").await.unwrap().as_deref(), Some("clair"));
    assert!(store.delete_setting("theme").await.unwrap());
    assert!(!store.delete_setting("theme").await.unwrap());

    let session = SessionStore::new(store.clone());
    assert_eq!(session.last_route().await.unwrap(), None);
    assert!(!session.sidebar_collapsed().await.unwrap());

    session.set_last_route("paiements").await.unwrap();
    session.set_sidebar_collapsed(true).await.unwrap();
    assert_eq!(session.last_route().await.unwrap().as_deref(), Some("paiements"));
    assert!(session.sidebar_collapsed().await.unwrap());

    let stored = store
        .get_document(Collection::Settings, &DocumentKey::from("derniere_route"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored["cle"], "derniere_route");
    assert_eq!(stored["valeur"], "paiements");
}

#[tokio::test]
async fn test_non_object_documents_are_rejected() {
    let (store, _, _dir) = open_store().await;

    let err = store
        .add_document(Collection::Cantons, json!(["Golfe"]))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidDocument { .. }));
}

#[tokio::test]
async fn test_add_refuses_member_without_first_name() {
    let (store, _, _dir) = open_store().await;

    let err = store
        .add_document(Collection::Members, json!({"nom": "Ayivi"}))
        .await
        .unwrap_err();
    match err {
        StoreError::InvalidDocument { collection, message } => {
            assert_eq!(collection, Collection::Members);
            assert!(message.contains("prenom"), "{}", message);
        }
        other => panic!("expected InvalidDocument, got {:?}", other),
    }
    assert_eq!(store.count(Collection::Members).await.unwrap(), 0);

    // Rankings keep working after the refused write
    let ranking = RankingService::new(store.clone(), AmountSource::default());
    let cantons = ranking
        .rank_cantons(Criterion::TotalAmount, SortOrder::Desc)
        .await
        .unwrap();
    assert_eq!(cantons.len(), 4);
}

#[tokio::test]
async fn test_update_refuses_village_without_canton() {
    let (store, _, _dir) = open_store().await;

    let golfe = store.get_all::<Canton>().await.unwrap()[0].id.unwrap();
    let be = store.add(&Village::new("Bè", golfe)).await.unwrap();

    let err = store
        .update_document(Collection::Villages, json!({"id": be, "nom": "Bè"}))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::InvalidDocument { collection: Collection::Villages, .. }
    ));

    let villages: Vec<Village> = store.get_all().await.unwrap();
    assert_eq!(villages.len(), 1);
    assert_eq!(villages[0].canton_id, golfe);
}

#[tokio::test]
async fn test_import_rolls_back_collection_with_malformed_document() {
    let (store, _, _dir) = open_store().await;

    let payload = json!({
        "version": 2,
        "exportDate": "2025-11-14T09:00:00Z",
        "collections": {
            "villages": [
                {"id": 1, "nom": "Bè", "canton_id": 1},
                {"id": 2, "nom": "Agoè"}
            ]
        }
    });
    let snapshot: Snapshot = serde_json::from_value(payload).unwrap();

    let err = store.import_all(&snapshot).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::InvalidDocument { collection: Collection::Villages, .. }
    ));

    // Nothing from the rejected collection was written
    assert_eq!(store.count(Collection::Villages).await.unwrap(), 0);
    assert!(store.get_all::<Village>().await.unwrap().is_empty());
}
