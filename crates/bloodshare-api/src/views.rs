use std::collections::BTreeMap;

use axum::response::Html;
use tera::{Context, Tera};

use bloodshare_types::models::BloodGroup;

use crate::error::AppError;
use crate::flash::Flash;
use crate::forms::FormErrors;

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/base.html")),
    ("landing.html", include_str!("../templates/landing.html")),
    ("signup.html", include_str!("../templates/signup.html")),
    ("login.html", include_str!("../templates/login.html")),
    ("dashboard.html", include_str!("../templates/dashboard.html")),
    ("profile_edit.html", include_str!("../templates/profile_edit.html")),
    ("donor.html", include_str!("../templates/donor.html")),
];

/// Compiled page templates. Names ending in `.html` are auto-escaped.
pub struct Views {
    tera: Tera,
}

impl Views {
    pub fn new() -> anyhow::Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES.iter().copied())?;
        Ok(Self { tera })
    }

    pub fn render(&self, template: &str, ctx: &Context) -> Result<Html<String>, AppError> {
        self.tera
            .render(template, ctx)
            .map(Html)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("rendering {}: {:?}", template, e)))
    }
}

/// Context every page starts from: who is signed in, queued messages and
/// the blood group choices used by select inputs.
pub fn page_context(signed_in: bool, messages: &[Flash]) -> Context {
    let mut ctx = Context::new();
    ctx.insert("signed_in", &signed_in);
    ctx.insert("messages", messages);
    ctx.insert("blood_groups", &BloodGroup::ALL.map(BloodGroup::as_str));
    ctx
}

/// Add the submitted values and field errors of a form.
pub fn with_form(ctx: &mut Context, values: &BTreeMap<String, String>, errors: &FormErrors) {
    ctx.insert("values", values);
    ctx.insert("errors", errors);
}
