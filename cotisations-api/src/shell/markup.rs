/// Markup helpers shared by the views
///
/// Views build HTML fragments by hand; everything interpolated from user
/// data goes through [`escape`].

use super::forms::FieldError;
use std::fmt::Write as _;

/// Element id of the shared confirmation modal
pub const CONFIRMATION_MODAL_ID: &str = "modal-confirmation-suppression";

/// Escapes text for use inside element content and quoted attributes
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Formats an amount the French way, without decimals ("12 500")
///
/// Groups are separated by a narrow no-break space.
pub fn format_amount(amount: f64) -> String {
    if !amount.is_finite() {
        return "0".to_string();
    }

    let rounded = amount.round() as i64;
    let digits = rounded.unsigned_abs().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 * 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('\u{202f}');
        }
        grouped.push(c);
    }

    if rounded < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// Page heading
pub fn heading(title: &str) -> String {
    format!("<h1>{}</h1>", escape(title))
}

/// Placeholder shown while a view is being mounted
pub fn loading_panel() -> String {
    r#"<div class="conteneur-chargement"><div class="spinner"></div><p>Chargement en cours...</p></div>"#
        .to_string()
}

/// Inline error panel with a reload action
pub fn error_panel(message: &str) -> String {
    format!(
        r#"<div class="conteneur-erreur"><div class="alerte alerte-erreur"><h3>Erreur</h3><p>{}</p><button class="bouton bouton-primaire" data-action="recharger">Recharger la page</button></div></div>"#,
        escape(message)
    )
}

/// Informational or error banner
pub fn alert(kind: &str, message: &str) -> String {
    format!(
        r#"<div class="alerte alerte-{}">{}</div>"#,
        escape(kind),
        escape(message)
    )
}

/// Empty-list message
pub fn empty(message: &str) -> String {
    format!(r#"<p class="message-vide">{}</p>"#, escape(message))
}

/// Confirmation modal used by destructive actions
pub fn confirmation_modal() -> String {
    format!(
        r#"<div id="{}" class="modal-overlay masque"><div class="modal"><h3 id="confirmation-titre"></h3><p id="confirmation-message"></p><button id="btn-confirmation-annuler" class="bouton">Annuler</button><button id="btn-confirmation-confirmer" class="bouton bouton-danger">Supprimer</button></div></div>"#,
        CONFIRMATION_MODAL_ID
    )
}

/// Inline error message for one form field, empty if the field is valid
pub fn field_error(errors: &[FieldError], field: &str) -> String {
    errors
        .iter()
        .find(|e| e.field == field)
        .map(|e| format!(r#"<span class="message-erreur" data-champ="{}">{}</span>"#, escape(field), escape(&e.message)))
        .unwrap_or_default()
}

/// `<select>` with a leading placeholder option
pub fn select<'a>(
    id: &str,
    name: &str,
    placeholder: &str,
    options: impl IntoIterator<Item = (String, &'a str)>,
    selected: Option<&str>,
) -> String {
    let mut html = format!(
        r#"<select id="{}" name="{}"><option value="">{}</option>"#,
        escape(id),
        escape(name),
        escape(placeholder)
    );
    for (value, label) in options {
        let is_selected = selected == Some(value.as_str());
        let _ = write!(
            html,
            r#"<option value="{}"{}>{}</option>"#,
            escape(&value),
            if is_selected { " selected" } else { "" },
            escape(label)
        );
    }
    html.push_str("</select>");
    html
}

/// Whether `markup` contains the element designated by an id selector
///
/// Only `#id` selectors are checked; any other selector is assumed present.
pub fn contains_element(markup: &str, selector: &str) -> bool {
    match selector.strip_prefix('#') {
        Some(id) => markup.contains(&format!(r#"id="{}""#, id)),
        None => true,
    }
}
