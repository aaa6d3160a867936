/// Settings: database overview, snapshot export and interface preferences

use super::to_state;
use crate::shell::markup::{self, escape};
use crate::shell::view::{ActionParams, DomEvent, View, ViewBase, ViewContext, ViewError};
use async_trait::async_trait;
use cotisations_shared::store::{Collection, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt::Write as _;
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct SettingsState {
    export_json: Option<String>,
    message: Option<String>,
}

fn collection_label(collection: Collection) -> &'static str {
    match collection {
        Collection::Members => "Cotisants",
        Collection::Payments => "Paiements",
        Collection::Cantons => "Cantons",
        Collection::Villages => "Villages",
        Collection::Quarters => "Quartiers",
        Collection::ContributionTypes => "Types de cotisation",
        Collection::Settings => "Paramètres",
    }
}

/// Settings screen
#[derive(Debug)]
pub struct SettingsView {
    base: ViewBase,
}

impl SettingsView {
    pub fn new() -> Self {
        Self {
            base: ViewBase::new(json!({})),
        }
    }
}

impl Default for SettingsView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl View for SettingsView {
    fn name(&self) -> &'static str {
        "parametres"
    }

    fn base(&self) -> &ViewBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ViewBase {
        &mut self.base
    }

    async fn render(&mut self, ctx: &ViewContext) -> Result<String, ViewError> {
        let state: SettingsState = self.base.state_as()?;
        let schema_version = ctx.store.schema_version().await?;
        let collapsed = ctx.session.sidebar_collapsed().await?;

        let mut html = markup::heading("Paramètres");
        if let Some(message) = &state.message {
            html.push_str(&markup::alert("succes", message));
        }

        let _ = write!(
            html,
            r#"<section><h2>Base de données</h2><p>Version du schéma : <strong id="version-schema">{}</strong></p><p>Source des montants du classement : <code>{}</code></p><table class="tableau"><tbody>"#,
            schema_version,
            ctx.ranking.amount_source(),
        );
        for collection in Collection::ALL {
            let count = ctx.store.count(collection).await?;
            let _ = write!(
                html,
                r#"<tr><td>{}</td><td data-collection="{}">{}</td></tr>"#,
                collection_label(collection),
                collection.as_str(),
                count
            );
        }
        html.push_str("</tbody></table></section>");

        let _ = write!(
            html,
            r#"<section id="preferences"><h2>Interface</h2><label><input id="pref-sidebar" type="checkbox" data-action="basculer-sidebar" data-reduite="{}"{}> Réduire la barre latérale</label></section>"#,
            !collapsed,
            if collapsed { " checked" } else { "" },
        );

        html.push_str(r#"<section id="sauvegarde"><h2>Sauvegarde</h2><button data-action="exporter" class="bouton">Exporter les données</button>"#);
        if let Some(export) = &state.export_json {
            let _ = write!(html, r#"<textarea id="export-json" readonly>{}</textarea>"#, escape(export));
        }
        html.push_str("</section>");
        Ok(html)
    }

    async fn mount(&mut self, _ctx: &ViewContext) -> Result<(), ViewError> {
        self.base.configure_delegated_actions("#preferences", None);
        self.base.configure_delegated_actions("#sauvegarde", None);
        Ok(())
    }

    async fn handle_action(
        &mut self,
        ctx: &ViewContext,
        action: &str,
        params: &ActionParams,
        _event: &DomEvent,
    ) -> Result<(), ViewError> {
        let mut state: SettingsState = self.base.state_as()?;

        match action {
            "basculer-sidebar" => {
                let collapsed = match params.bool("reduite") {
                    Some(collapsed) => collapsed,
                    None => !ctx.session.sidebar_collapsed().await?,
                };
                ctx.session.set_sidebar_collapsed(collapsed).await?;
                state.message = Some("Préférence enregistrée".to_string());
            }
            "exporter" => {
                let snapshot = ctx.store.export_all().await?;
                let export = serde_json::to_string_pretty(&snapshot).map_err(StoreError::from)?;
                info!(bytes = export.len(), "Snapshot exported from settings");
                state.export_json = Some(export);
                state.message = Some("Export généré".to_string());
            }
            other => return Err(ViewError::UnknownAction(other.to_string())),
        }

        self.update_state(ctx, to_state(&state)?).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_collection_has_a_label() {
        for collection in Collection::ALL {
            assert!(!collection_label(collection).is_empty());
        }
    }
}
