/// Reference data inserted on first run
///
/// Seeding is keyed on the canton collection being empty: an initialized
/// database is never seeded twice, even if the contribution presets were
/// removed later.

use super::{Collection, Store, StoreResult};
use crate::models::canton::Canton;
use crate::models::contribution_type::{ContributionType, Periodicity};
use serde::Serialize;
use tracing::info;

/// Records inserted by a seeding pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub cantons: usize,
    pub contribution_types: usize,
}

impl SeedReport {
    /// Whether anything was inserted
    pub fn is_empty(&self) -> bool {
        self.cantons == 0 && self.contribution_types == 0
    }
}

/// Cantons present in a fresh database: (name, chief town, code)
pub const SEED_CANTONS: [(&str, &str, &str); 4] = [
    ("Golfe", "Lomé", "GLF"),
    ("Kloto", "Kpalimé", "KLT"),
    ("Ogou", "Atakpamé", "OGU"),
    ("Tchaoudjo", "Sokodé", "TCH"),
];

/// Contribution presets present in a fresh database
pub const SEED_CONTRIBUTION_TYPES: [(&str, f64, Periodicity); 3] = [
    ("Cotisation Mensuelle", 5000.0, Periodicity::Monthly),
    ("Cotisation Développement", 25000.0, Periodicity::Quarterly),
    ("Cotisation Solidarité", 10000.0, Periodicity::Monthly),
];

/// Seeds the reference data when no canton exists yet
pub async fn seed_if_empty(store: &Store) -> StoreResult<SeedReport> {
    if store.count(Collection::Cantons).await? > 0 {
        return Ok(SeedReport::default());
    }

    info!("Empty database, inserting reference data");

    let mut report = SeedReport::default();

    for (nom, chef_lieu, code) in SEED_CANTONS {
        let canton = Canton {
            chief_town: Some(chef_lieu.to_string()),
            code: Some(code.to_string()),
            ..Canton::new(nom)
        };
        store.add(&canton).await?;
        report.cantons += 1;
    }

    for (nom, montant, periodicite) in SEED_CONTRIBUTION_TYPES {
        store.add(&ContributionType::new(nom, montant, periodicite)).await?;
        report.contribution_types += 1;
    }

    Ok(report)
}
