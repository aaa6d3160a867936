/// Base view component
///
/// A view renders markup for one route and reacts to UI events. Every view
/// embeds a [`ViewBase`] holding its JSON state, the markup it last rendered
/// and its event bindings. The [`View`] trait provides the shared lifecycle:
///
/// 1. [`View::render`] produces markup (required)
/// 2. [`View::mount`] registers bindings against that markup (optional)
/// 3. [`View::dispatch`] resolves an incoming [`DomEvent`] to an action
///    through the bindings and calls [`View::handle_action`]
/// 4. [`View::cleanup`] drops every binding when the view is unmounted
///
/// [`View::update_state`] merges a partial state then renders and mounts
/// again.
///
/// # Example
///
/// ```no_run
/// use async_trait::async_trait;
/// use cotisations_api::shell::view::{View, ViewBase, ViewContext, ViewError};
///
/// struct Hello {
///     base: ViewBase,
/// }
///
/// #[async_trait]
/// impl View for Hello {
///     fn name(&self) -> &'static str {
///         "bonjour"
///     }
///
///     fn base(&self) -> &ViewBase {
///         &self.base
///     }
///
///     fn base_mut(&mut self) -> &mut ViewBase {
///         &mut self.base
///     }
///
///     async fn render(&mut self, _ctx: &ViewContext) -> Result<String, ViewError> {
///         Ok("<h1>Bonjour</h1>".to_string())
///     }
/// }
/// ```

use super::forms::FieldError;
use super::markup::{contains_element, CONFIRMATION_MODAL_ID};
use async_trait::async_trait;
use cotisations_shared::ranking::RankingService;
use cotisations_shared::session::SessionStore;
use cotisations_shared::store::{Collection, Store, StoreError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Event type used when a binding does not name one
pub const DEFAULT_EVENT: &str = "click";

/// Fallback message of the native prompt
pub const DEFAULT_CONFIRMATION_MESSAGE: &str = "Confirmer ?";

/// View layer errors
#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Form input rejected; shown inline next to each field
    #[error("Validation failed: {} errors", .0.len())]
    Validation(Vec<FieldError>),

    /// No handler for this action name
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// The action is not allowed in the current data state
    #[error("{0}")]
    Rejected(String),

    /// View state could not be read or merged
    #[error("Invalid view state: {0}")]
    State(String),
}

/// Services available to a view
#[derive(Clone)]
pub struct ViewContext {
    pub store: Store,
    pub ranking: RankingService,
    pub session: SessionStore,

    /// Native confirmation prompt, used when the view has no modal
    pub prompt: Arc<dyn ConfirmationPrompt>,

    /// Query parameters of the current fragment
    pub query: BTreeMap<String, String>,
}

impl ViewContext {
    pub fn new(store: Store, ranking: RankingService, prompt: Arc<dyn ConfirmationPrompt>) -> Self {
        Self {
            session: SessionStore::new(store.clone()),
            store,
            ranking,
            prompt,
            query: BTreeMap::new(),
        }
    }

    /// Same services with another query
    pub fn with_query(&self, query: BTreeMap<String, String>) -> Self {
        Self {
            query,
            ..self.clone()
        }
    }

    /// Query parameter parsed as a record id
    pub fn query_id(&self, key: &str) -> Option<i64> {
        self.query.get(key).and_then(|v| v.trim().parse().ok())
    }
}

impl fmt::Debug for ViewContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewContext")
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

/// UI event sent by the client
///
/// `target` is the element a direct listener was attached to; `container`
/// and `selector` describe where a delegated event was caught and which
/// selector the originating element matched. `data` holds the `data-*`
/// attributes of the closest element carrying `data-action` (or of the
/// matched element).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomEvent {
    #[serde(rename = "type", default = "default_event_type")]
    pub event_type: String,

    #[serde(default)]
    pub target: Option<String>,

    #[serde(default)]
    pub container: Option<String>,

    #[serde(default)]
    pub selector: Option<String>,

    #[serde(default)]
    pub data: BTreeMap<String, String>,

    /// Value of the input for `change`/`input` events
    #[serde(default)]
    pub value: Option<String>,

    /// Form fields for `submit` events
    #[serde(default)]
    pub form: Map<String, Value>,

    /// Answer given in the confirmation modal, if it was shown
    #[serde(default)]
    pub confirmation: Option<bool>,
}

fn default_event_type() -> String {
    DEFAULT_EVENT.to_string()
}

impl Default for DomEvent {
    fn default() -> Self {
        Self {
            event_type: default_event_type(),
            target: None,
            container: None,
            selector: None,
            data: BTreeMap::new(),
            value: None,
            form: Map::new(),
            confirmation: None,
        }
    }
}

impl DomEvent {
    /// Click on an element carrying `data-action` inside `container`
    pub fn action(container: &str, action: &str) -> Self {
        Self {
            container: Some(container.to_string()),
            data: BTreeMap::from([("action".to_string(), action.to_string())]),
            ..Default::default()
        }
    }

    /// Submission of the form `target`
    pub fn submit(target: &str, form: Value) -> Self {
        Self {
            event_type: "submit".to_string(),
            target: Some(target.to_string()),
            form: match form {
                Value::Object(map) => map,
                _ => Map::new(),
            },
            ..Default::default()
        }
    }

    /// Value change of the input `target`
    pub fn change(target: &str, value: &str) -> Self {
        Self {
            event_type: "change".to_string(),
            target: Some(target.to_string()),
            value: Some(value.to_string()),
            ..Default::default()
        }
    }

    pub fn with_data(mut self, key: &str, value: impl ToString) -> Self {
        self.data.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_confirmation(mut self, answer: bool) -> Self {
        self.confirmation = Some(answer);
        self
    }

    pub fn is_submit(&self) -> bool {
        self.event_type == "submit"
    }
}

/// Parameters of a delegated action
///
/// Built from every `data-*` attribute except `action`; `"true"`/`"false"`
/// become booleans and numeric strings become numbers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActionParams(Map<String, Value>);

impl ActionParams {
    pub fn from_data(data: &BTreeMap<String, String>) -> Self {
        let params = data
            .iter()
            .filter(|(key, _)| key.as_str() != "action")
            .map(|(key, raw)| (key.clone(), coerce(raw)))
            .collect();
        Self(params)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn id(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(Value::as_i64)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn coerce(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::String(raw.to_string());
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        return Value::from(int);
    }
    match trimmed.parse::<f64>() {
        Ok(number) if number.is_finite() => Value::from(number),
        _ => Value::String(raw.to_string()),
    }
}

/// Event binding registered by a view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Binding {
    /// Listener on one element
    Listener {
        target: String,
        event: String,
        action: String,
    },

    /// Listener on a container for descendants matching `selector`
    Delegated {
        container: String,
        selector: String,
        event: String,
        action: String,
    },

    /// Container dispatching by the `data-action` of the clicked element
    Actions { container: String, event: String },
}

/// Question asked before a destructive action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationRequest {
    pub title: String,
    pub message: String,
    pub confirm_label: String,
}

impl ConfirmationRequest {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            confirm_label: "Supprimer".to_string(),
        }
    }

    pub fn confirm_label(mut self, label: impl Into<String>) -> Self {
        self.confirm_label = label.into();
        self
    }
}

/// Prompt used when a view renders no confirmation modal
#[async_trait]
pub trait ConfirmationPrompt: Send + Sync {
    async fn confirm(&self, request: &ConfirmationRequest) -> bool;
}

/// Prompt that always gives the same answer
#[derive(Debug, Clone, Copy)]
pub struct StaticPrompt(pub bool);

#[async_trait]
impl ConfirmationPrompt for StaticPrompt {
    async fn confirm(&self, request: &ConfirmationRequest) -> bool {
        debug!(message = %request.message, answer = self.0, "Native confirmation");
        self.0
    }
}

/// Result of dispatching an event to a view
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// The action ran
    Handled { action: String },

    /// No binding matched, or the action is unknown
    Ignored,

    /// The action waits for an answer in the confirmation modal
    ConfirmationRequired {
        action: String,
        confirmation: ConfirmationRequest,
    },

    /// Form input was rejected
    Invalid {
        action: String,
        errors: Vec<FieldError>,
    },

    /// The action is not allowed right now
    Rejected { action: String, message: String },

    /// A submission of the same form was already in flight
    Dropped,
}

/// State and bindings shared by every view
#[derive(Debug, Default)]
pub struct ViewBase {
    state: Map<String, Value>,
    markup: String,
    bindings: Vec<Binding>,
    modal_answer: Option<bool>,
    pending_confirmation: Option<ConfirmationRequest>,
}

impl ViewBase {
    /// Creates a base with an initial state object
    pub fn new(initial_state: Value) -> Self {
        let state = match initial_state {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            state,
            ..Default::default()
        }
    }

    pub fn state(&self) -> &Map<String, Value> {
        &self.state
    }

    /// Deserializes the whole state into a typed struct
    pub fn state_as<T: DeserializeOwned>(&self) -> Result<T, ViewError> {
        serde_json::from_value(Value::Object(self.state.clone())).map_err(|e| ViewError::State(e.to_string()))
    }

    /// Sets one state key without re-rendering
    pub fn set(&mut self, key: &str, value: impl Serialize) -> Result<(), ViewError> {
        let value = serde_json::to_value(value).map_err(|e| ViewError::State(e.to_string()))?;
        self.state.insert(key.to_string(), value);
        Ok(())
    }

    /// Shallow-merges `partial` into the state
    pub fn merge_state(&mut self, partial: Value) -> Result<(), ViewError> {
        match partial {
            Value::Object(map) => {
                self.state.extend(map);
                Ok(())
            }
            other => Err(ViewError::State(format!(
                "partial state must be an object, got {}",
                other
            ))),
        }
    }

    /// Inline field errors currently held in the state
    pub fn errors(&self) -> Vec<FieldError> {
        self.state
            .get("erreurs")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    pub fn markup(&self) -> &str {
        &self.markup
    }

    /// Replaces the rendered markup; bindings of the old markup are dropped
    pub fn replace_markup(&mut self, markup: String) {
        self.bindings.clear();
        self.markup = markup;
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Listens for `event` on `target` and runs `action`
    pub fn add_listener(&mut self, target: &str, event: &str, action: &str) {
        self.bindings.push(Binding::Listener {
            target: target.to_string(),
            event: event.to_string(),
            action: action.to_string(),
        });
    }

    /// Listens on `container` for `event` raised inside elements matching
    /// `selector`
    ///
    /// Returns false, with a warning, when the container is not in the
    /// rendered markup.
    pub fn delegate_event(&mut self, container: &str, selector: &str, event: &str, action: &str) -> bool {
        if !contains_element(&self.markup, container) {
            warn!(container = %container, "Delegation container not found");
            return false;
        }
        self.bindings.push(Binding::Delegated {
            container: container.to_string(),
            selector: selector.to_string(),
            event: event.to_string(),
            action: action.to_string(),
        });
        true
    }

    /// Dispatches `event` (default `click`) inside `container` by the
    /// `data-action` attribute of the originating element
    pub fn configure_delegated_actions(&mut self, container: &str, event: Option<&str>) -> bool {
        if !contains_element(&self.markup, container) {
            warn!(container = %container, "Delegation container not found");
            return false;
        }
        self.bindings.push(Binding::Actions {
            container: container.to_string(),
            event: event.unwrap_or(DEFAULT_EVENT).to_string(),
        });
        true
    }

    /// Finds the action an event maps to, with its parameters
    pub fn resolve(&self, event: &DomEvent) -> Option<(String, ActionParams)> {
        let params = || ActionParams::from_data(&event.data);

        self.bindings.iter().find_map(|binding| match binding {
            Binding::Listener {
                target,
                event: kind,
                action,
            } if event.target.as_deref() == Some(target.as_str()) && *kind == event.event_type => {
                Some((action.clone(), params()))
            }
            Binding::Delegated {
                container,
                selector,
                event: kind,
                action,
            } if event.container.as_deref() == Some(container.as_str())
                && event.selector.as_deref() == Some(selector.as_str())
                && *kind == event.event_type =>
            {
                Some((action.clone(), params()))
            }
            Binding::Actions { container, event: kind }
                if event.container.as_deref() == Some(container.as_str()) && *kind == event.event_type =>
            {
                event.data.get("action").map(|action| (action.clone(), params()))
            }
            _ => None,
        })
    }

    /// Whether the rendered markup carries the confirmation modal
    pub fn has_modal(&self) -> bool {
        contains_element(&self.markup, &format!("#{}", CONFIRMATION_MODAL_ID))
    }

    /// Asks the user to confirm a destructive action
    ///
    /// With the modal rendered, the answer comes with the dispatched event;
    /// when the event carries none, the request is recorded so the client
    /// can show the modal and send the event again. Without the modal, the
    /// native prompt of the context answers.
    pub async fn request_confirmation(&mut self, ctx: &ViewContext, request: ConfirmationRequest) -> bool {
        if self.has_modal() {
            return match self.modal_answer {
                Some(answer) => answer,
                None => {
                    self.pending_confirmation = Some(request);
                    false
                }
            };
        }

        let request = if request.message.is_empty() {
            ConfirmationRequest {
                message: DEFAULT_CONFIRMATION_MESSAGE.to_string(),
                ..request
            }
        } else {
            request
        };
        ctx.prompt.confirm(&request).await
    }

    fn begin_dispatch(&mut self, modal_answer: Option<bool>) {
        self.modal_answer = modal_answer;
        self.pending_confirmation = None;
    }

    fn end_dispatch(&mut self) -> Option<ConfirmationRequest> {
        self.modal_answer = None;
        self.pending_confirmation.take()
    }

    /// Removes every binding
    pub fn cleanup(&mut self) {
        self.bindings.clear();
        self.modal_answer = None;
        self.pending_confirmation = None;
    }
}

/// View component mounted by the router
#[async_trait]
pub trait View: Send + Sync {
    /// Stable name used in logs
    fn name(&self) -> &'static str;

    fn base(&self) -> &ViewBase;

    fn base_mut(&mut self) -> &mut ViewBase;

    /// Produces the view's markup
    async fn render(&mut self, ctx: &ViewContext) -> Result<String, ViewError>;

    /// Registers bindings once the markup is in place
    async fn mount(&mut self, _ctx: &ViewContext) -> Result<(), ViewError> {
        Ok(())
    }

    /// Collections whose changes require a re-render
    fn watches(&self) -> &'static [Collection] {
        &[]
    }

    /// Runs a named action
    async fn handle_action(
        &mut self,
        _ctx: &ViewContext,
        action: &str,
        _params: &ActionParams,
        _event: &DomEvent,
    ) -> Result<(), ViewError> {
        Err(ViewError::UnknownAction(action.to_string()))
    }

    /// Renders then mounts; returns the new markup
    async fn refresh(&mut self, ctx: &ViewContext) -> Result<String, ViewError> {
        let markup = self.render(ctx).await?;
        self.base_mut().replace_markup(markup);
        self.mount(ctx).await?;
        Ok(self.base().markup().to_string())
    }

    /// Merges a partial state then re-renders and re-mounts
    async fn update_state(&mut self, ctx: &ViewContext, partial: Value) -> Result<String, ViewError> {
        self.base_mut().merge_state(partial)?;
        self.refresh(ctx).await
    }

    /// Resolves an event through the bindings and runs the matching action
    async fn dispatch(&mut self, ctx: &ViewContext, event: &DomEvent) -> Result<DispatchOutcome, ViewError> {
        let Some((action, params)) = self.base().resolve(event) else {
            debug!(view = self.name(), event = %event.event_type, "No binding for event");
            return Ok(DispatchOutcome::Ignored);
        };

        debug!(view = self.name(), action = %action, "Dispatching action");
        self.base_mut().begin_dispatch(event.confirmation);
        let result = self.handle_action(ctx, &action, &params, event).await;
        let pending = self.base_mut().end_dispatch();

        match result {
            Ok(()) => Ok(match pending {
                Some(confirmation) => DispatchOutcome::ConfirmationRequired {
                    action,
                    confirmation,
                },
                None => DispatchOutcome::Handled { action },
            }),
            Err(ViewError::UnknownAction(name)) => {
                warn!(view = self.name(), action = %name, "Action not found");
                Ok(DispatchOutcome::Ignored)
            }
            Err(ViewError::Validation(errors)) => {
                self.update_state(ctx, json!({ "erreurs": errors })).await?;
                Ok(DispatchOutcome::Invalid { action, errors })
            }
            Err(ViewError::Rejected(message)) => {
                self.update_state(ctx, json!({ "alerte": message })).await?;
                Ok(DispatchOutcome::Rejected { action, message })
            }
            Err(other) => Err(other),
        }
    }

    /// Drops bindings before the view is discarded
    async fn cleanup(&mut self) {
        self.base_mut().cleanup();
    }
}
