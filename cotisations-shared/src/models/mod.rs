/// Typed records of the contribution tracker
///
/// Rust field names are English; the serialized names follow the
/// association's vocabulary so that documents and snapshots stay
/// compatible with existing exports. Every model keeps fields it does not
/// know about in `extra`, and the store stamps `date_creation` and
/// `date_modification` on write.
///
/// # Models
///
/// - `canton`: top-level territorial unit
/// - `village`: territorial unit within a canton
/// - `quarter`: territorial unit within a village
/// - `member`: a person tracked for contributions ("cotisant")
/// - `payment`: a payment attributed to a member
/// - `contribution_type`: preset required amount and periodicity
///
/// # Example
///
/// ```no_run
/// use cotisations_shared::models::canton::Canton;
/// use cotisations_shared::models::village::Village;
/// use cotisations_shared::store::Store;
///
/// # async fn example(store: &Store) -> Result<(), Box<dyn std::error::Error>> {
/// let golfe = store.add(&Canton::new("Golfe")).await?;
/// let be = store.add(&Village::new("Bè", golfe)).await?;
///
/// let villages: Vec<Village> = store.get_all().await?;
/// # Ok(())
/// # }
/// ```

pub mod canton;
pub mod contribution_type;
pub mod member;
pub mod payment;
pub mod quarter;
pub mod village;

/// Upper bound accepted for any amount, in CFA francs
pub const MAX_AMOUNT: f64 = 10_000_000.0;

/// Minimum length of a name
pub const NAME_MIN_LENGTH: usize = 2;

/// Maximum length of a name
pub const NAME_MAX_LENGTH: usize = 50;
