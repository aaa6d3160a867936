/// Navigation shell
///
/// The shell is the server-side counterpart of the single-page interface:
/// one [`Navigator`] (route table, location, history, mounted view) behind
/// a mutex, plus the double-submit guards of every form.
///
/// ## Module Organization
///
/// - `view`: base view component (state, bindings, dispatch, confirmation)
/// - `router`: fragment router and navigation state machine
/// - `forms`: form inputs, validation rules and submit guards
/// - `markup`: markup helpers shared by the views
/// - `views`: the seven application screens
///
/// # Example
///
/// ```no_run
/// use cotisations_api::shell::{Shell, view::DomEvent};
/// use cotisations_api::shell::view::ViewContext;
/// use cotisations_shared::events::EventBus;
/// use std::time::Duration;
///
/// # async fn example(ctx: ViewContext, events: EventBus) -> anyhow::Result<()> {
/// let shell = Shell::new(ctx, events, Duration::from_secs(5));
/// shell.navigator().await.resume(None).await?;
///
/// let outcome = shell
///     .dispatch(DomEvent::action("#liste-cotisants", "editer-cotisant").with_data("id", 1))
///     .await?;
/// println!("{:?}", outcome);
/// # Ok(())
/// # }
/// ```

pub mod forms;
pub mod markup;
pub mod router;
pub mod view;
pub mod views;

pub use router::{NavigateOptions, NavigationError, Navigator, Transition};
pub use view::{DispatchOutcome, DomEvent, View, ViewContext, ViewError};

use cotisations_shared::events::{AppEvent, DataChange, EventBus};
use forms::SubmitGuards;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Single navigation session
#[derive(Debug)]
pub struct Shell {
    navigator: Mutex<Navigator>,
    submissions: SubmitGuards,
}

impl Shell {
    /// Creates a shell with every application route registered
    pub fn new(context: ViewContext, events: EventBus, mount_timeout: Duration) -> Self {
        let mut navigator = Navigator::new(context, events, mount_timeout);
        views::register_all(&mut navigator);
        Self::with_navigator(navigator)
    }

    /// Wraps an already configured navigator
    pub fn with_navigator(navigator: Navigator) -> Self {
        Self {
            navigator: Mutex::new(navigator),
            submissions: SubmitGuards::default(),
        }
    }

    /// Locks the navigator
    pub async fn navigator(&self) -> MutexGuard<'_, Navigator> {
        self.navigator.lock().await
    }

    /// Sends a UI event to the mounted view
    ///
    /// A submission of a form that is already being submitted is dropped
    /// before waiting for the navigator.
    pub async fn dispatch(&self, event: DomEvent) -> Result<DispatchOutcome, NavigationError> {
        let _ticket = if event.is_submit() {
            let form = event.target.as_deref().unwrap_or_default();
            match self.submissions.try_begin(form) {
                Some(ticket) => Some(ticket),
                None => {
                    info!(form = %form, "Dropping duplicate submission");
                    return Ok(DispatchOutcome::Dropped);
                }
            }
        } else {
            None
        };

        let mut navigator = self.navigator.lock().await;
        navigator.dispatch(&event).await
    }

    /// Refreshes the mounted view if it watches the changed collection
    pub async fn on_data_changed(&self, change: &DataChange) -> bool {
        self.navigator.lock().await.on_data_changed(change).await
    }

    /// Refreshes the mounted view on every "data changed" event
    pub fn spawn_listener(self: Arc<Self>, events: &EventBus) -> JoinHandle<()> {
        let mut receiver = events.subscribe();

        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(AppEvent::DataChanged(change)) => {
                        if self.on_data_changed(&change).await {
                            debug!(collection = %change.collection, "Mounted view refreshed");
                        }
                    }
                    Ok(AppEvent::RouteChanged(_)) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Shell listener lagging behind, events skipped");
                    }
                    Err(RecvError::Closed) => {
                        debug!("Event bus closed, shell listener stopping");
                        break;
                    }
                }
            }
        })
    }
}
