/// Integration tests for leaderboards computed from a real store

use chrono::NaiveDate;
use cotisations_shared::db::pool::DatabaseConfig;
use cotisations_shared::events::EventBus;
use cotisations_shared::models::canton::Canton;
use cotisations_shared::models::member::{Member, MemberStatus};
use cotisations_shared::models::payment::{Payment, PaymentMode, PaymentStatus};
use cotisations_shared::models::quarter::Quarter;
use cotisations_shared::models::village::Village;
use cotisations_shared::ranking::{AmountSource, Criterion, RankingService, SortOrder, Statistics};
use cotisations_shared::store::Store;
use serde_json::json;
use tempfile::TempDir;

async fn empty_store() -> (Store, TempDir) {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}", dir.path().join("ranking.db").display());
    let pool = cotisations_shared::db::pool::create_pool(DatabaseConfig {
        url,
        ..Default::default()
    })
    .await
    .unwrap();
    cotisations_shared::db::migrations::run_migrations(&pool).await.unwrap();
    (Store::open(pool, EventBus::default()), dir)
}

async fn seeded_store() -> (Store, TempDir) {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}", dir.path().join("ranking.db").display());
    let (store, _) = Store::initialize(
        DatabaseConfig {
            url,
            ..Default::default()
        },
        EventBus::default(),
    )
    .await
    .unwrap();
    (store, dir)
}

fn member(village_id: i64, quarter_id: Option<i64>, amount: f64, status: MemberStatus) -> Member {
    Member {
        village_id: Some(village_id),
        quarter_id,
        contribution_amount: amount,
        status,
        ..Member::new("Ayivi", "Komla")
    }
}

#[tokio::test]
async fn test_golfe_ranks_first_with_its_village_member() {
    let (store, _dir) = seeded_store().await;

    let golfe = store
        .search::<Canton>(json!({"nom": "Golfe"}).as_object().unwrap())
        .await
        .unwrap()[0]
        .id
        .unwrap();
    let be = store.add(&Village::new("Bè", golfe)).await.unwrap();
    store
        .add(&member(be, None, 5000.0, MemberStatus::Active))
        .await
        .unwrap();

    let ranking = RankingService::new(store, AmountSource::DeclaredContribution);
    let entries = ranking
        .rank_cantons(Criterion::TotalAmount, SortOrder::Desc)
        .await
        .unwrap();

    assert_eq!(entries.len(), 4);
    assert_eq!(entries[0].entity.name, "Golfe");
    assert_eq!(entries[0].rank, 1);
    assert_eq!(entries[0].statistics.total_amount, 5000.0);
    assert_eq!(entries[0].children.len(), 1);
    assert_eq!(entries[0].members.len(), 1);

    // Cantons without members stay in the list with zeroed statistics
    for entry in &entries[1..] {
        assert_eq!(entry.statistics, Statistics::default());
    }
    let ranks: Vec<usize> = entries.iter().map(|e| e.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3, 4]);

    // Ties keep the store order
    let names: Vec<&str> = entries[1..].iter().map(|e| e.entity.name.as_str()).collect();
    assert_eq!(names, vec!["Kloto", "Ogou", "Tchaoudjo"]);
}

#[tokio::test]
async fn test_rank_villages_within_canton() {
    let (store, _dir) = empty_store().await;

    let canton = store.add(&Canton::new("Zio")).await.unwrap();
    let other = store.add(&Canton::new("Haho")).await.unwrap();
    let tsevie = store.add(&Village::new("Tsévié", canton)).await.unwrap();
    let davie = store.add(&Village::new("Davié", canton)).await.unwrap();
    store.add(&Village::new("Notsé", other)).await.unwrap();

    store.add(&member(tsevie, None, 1000.0, MemberStatus::Active)).await.unwrap();
    store.add(&member(davie, None, 1000.0, MemberStatus::Active)).await.unwrap();
    store.add(&member(davie, None, 1000.0, MemberStatus::Inactive)).await.unwrap();

    let ranking = RankingService::new(store, AmountSource::default());

    let by_count = ranking
        .rank_villages(canton, Criterion::MemberCount, SortOrder::Desc)
        .await
        .unwrap();
    assert_eq!(by_count.len(), 2);
    assert_eq!(by_count[0].entity.name, "Davié");
    assert_eq!(by_count[0].statistics.participation_rate, 50.0);

    let by_rate = ranking
        .rank_villages(canton, Criterion::ParticipationRate, SortOrder::Desc)
        .await
        .unwrap();
    assert_eq!(by_rate[0].entity.name, "Tsévié");
    assert_eq!(by_rate[0].statistics.participation_rate, 100.0);

    let unknown = ranking
        .rank_villages(9999, Criterion::TotalAmount, SortOrder::Asc)
        .await
        .unwrap();
    assert!(unknown.is_empty());
}

#[tokio::test]
async fn test_rank_quarters_keeps_unpopulated_quarters() {
    let (store, _dir) = empty_store().await;

    let canton = store.add(&Canton::new("Zio")).await.unwrap();
    let village = store.add(&Village::new("Tsévié", canton)).await.unwrap();
    let elsewhere = store.add(&Village::new("Davié", canton)).await.unwrap();
    let centre = store.add(&Quarter::new("Centre", village)).await.unwrap();
    store.add(&Quarter::new("Gbatopé", village)).await.unwrap();

    store.add(&member(village, Some(centre), 3000.0, MemberStatus::Active)).await.unwrap();
    // Same quarter id but another village: not counted
    store.add(&member(elsewhere, Some(centre), 9000.0, MemberStatus::Active)).await.unwrap();

    let ranking = RankingService::new(store, AmountSource::default());
    let entries = ranking
        .rank_quarters(village, Criterion::TotalAmount, SortOrder::Asc)
        .await
        .unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].entity.name, "Gbatopé");
    assert_eq!(entries[0].statistics.member_count, 0);
    assert_eq!(entries[0].statistics.total_amount, 0.0);
    assert_eq!(entries[0].statistics.participation_rate, 0.0);
    assert_eq!(entries[1].statistics.total_amount, 3000.0);
    assert!(entries[1].children.is_empty());
}

#[tokio::test]
async fn test_confirmed_payments_amount_source() {
    let (store, _dir) = empty_store().await;

    let canton = store.add(&Canton::new("Zio")).await.unwrap();
    let village = store.add(&Village::new("Tsévié", canton)).await.unwrap();
    let payer = store.add(&member(village, None, 5000.0, MemberStatus::Active)).await.unwrap();

    let date = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
    store
        .add(&Payment::new(payer, 1200.0, date, PaymentMode::Cash, PaymentStatus::Confirmed))
        .await
        .unwrap();
    store
        .add(&Payment::new(payer, 800.0, date, PaymentMode::MobileMoney, PaymentStatus::Cancelled))
        .await
        .unwrap();

    let declared = RankingService::new(store.clone(), AmountSource::DeclaredContribution)
        .rank_cantons(Criterion::TotalAmount, SortOrder::Desc)
        .await
        .unwrap();
    assert_eq!(declared[0].statistics.total_amount, 5000.0);
    assert_eq!(declared[0].statistics.payment_count, 2);

    let paid = RankingService::new(store, AmountSource::ConfirmedPayments)
        .rank_cantons(Criterion::TotalAmount, SortOrder::Desc)
        .await
        .unwrap();
    assert_eq!(paid[0].statistics.total_amount, 1200.0);
}

#[tokio::test]
async fn test_ranking_serializes_with_french_keys() {
    let (store, _dir) = seeded_store().await;
    let ranking = RankingService::new(store, AmountSource::default());

    let entries = ranking
        .rank_cantons(Criterion::MemberCount, SortOrder::Desc)
        .await
        .unwrap();
    let json = serde_json::to_value(&entries[0]).unwrap();

    for key in ["entite", "enfants", "cotisants", "statistiques", "rang"] {
        assert!(json.get(key).is_some(), "missing key {}", key);
    }
    assert_eq!(json["statistiques"]["taux_participation"], 0.0);
}
