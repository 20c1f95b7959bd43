//! Metadata-driven configuration form.
//!
//! One `FormPage` renders the whole schema as an HTML form and applies the
//! submission back to the store. Rendering streams the document in chunks,
//! one table row per parameter, so the page never has to fit in RAM at
//! once. Everything client-side (numeric clamping, tab insertion, the clear
//! and restart actions) lives in a small static script block; the server
//! enforces nothing beyond type-correct parsing.

use core::fmt::Write as _;

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::markup;
use crate::ports::{HttpExchange, Method, NvsPort};
use crate::schema::{Bound, Choice, Editor, EditorFlags, ParamInfo};
use crate::store::Store;

const STYLE: &str = "<style>\
body{font-family:sans-serif;margin:1em;background:#f4f4f4}\
table{border-collapse:collapse}\
td{padding:.3em .6em}\
input,select,textarea{font-family:inherit}\
.actions{margin-top:1em}\
</style>";

const SCRIPT: &str = "<script>\
function checkInt(e,min,max,d){var v=parseInt(e.value);\
if(isNaN(v)){e.value=d;return;}\
if(!isNaN(min)&&v<min)v=min;if(!isNaN(max)&&v>max)v=max;e.value=v;}\
function checkFloat(e,min,max,d){var v=parseFloat(e.value);\
if(isNaN(v)){e.value=d;return;}\
if(!isNaN(min)&&v<min)v=min;if(!isNaN(max)&&v>max)v=max;e.value=v;}\
function processTab(e,ev){if(ev.keyCode!=9)return true;\
var s=e.selectionStart;\
e.value=e.value.substring(0,s)+'\\t'+e.value.substring(e.selectionEnd);\
e.selectionStart=e.selectionEnd=s+1;ev.preventDefault();return false;}\
function openUrl(u,c){if(!c||confirm(c))location.href=u;}\
function doClear(c){if(c&&!confirm(c))return;\
var x=new XMLHttpRequest();x.open('DELETE',location.pathname);\
x.onload=function(){location.reload();};x.send();}\
</script>";

/// Form renderer and request handler over a parameter store.
pub struct FormPage<'a, P: NvsPort> {
    store: &'a mut Store<P>,
    title: &'static str,
    /// Confirmation text for the clear action; `None` clears immediately.
    clear_confirm: Option<&'static str>,
    /// When set, the page gets a restart button targeting this path.
    restart_path: Option<&'static str>,
}

impl<'a, P: NvsPort> FormPage<'a, P> {
    pub fn new(store: &'a mut Store<P>) -> Self {
        Self {
            store,
            title: "Configuration",
            clear_confirm: Some("Reset all parameters to defaults?"),
            restart_path: None,
        }
    }

    pub fn with_title(mut self, title: &'static str) -> Self {
        self.title = title;
        self
    }

    pub fn with_clear_confirmation(mut self, text: Option<&'static str>) -> Self {
        self.clear_confirm = text;
        self
    }

    pub fn with_restart_path(mut self, path: Option<&'static str>) -> Self {
        self.restart_path = path;
        self
    }

    /// Dispatches one request: GET renders, POST applies, DELETE resets.
    ///
    /// `confirm` enables the clear-action confirmation dialog; captive-probe
    /// aliases render without one.
    pub fn handle(&mut self, exchange: &mut dyn HttpExchange, confirm: bool) -> Result<()> {
        match exchange.method() {
            Method::Get => self.render(exchange, confirm),
            Method::Post => self.apply(exchange),
            Method::Delete => self.reset(exchange),
            Method::Other => {
                exchange.send(405, "text/plain", "method not allowed")?;
                Err(Error::ProtocolViolation)
            }
        }
    }

    // ── GET ────────────────────────────────────────────────────

    fn render(&mut self, exchange: &mut dyn HttpExchange, confirm: bool) -> Result<()> {
        debug!("rendering form, {} fields", self.store.schema().count());
        exchange.chunked_begin("text/html")?;

        let mut head = String::with_capacity(1024);
        head.push_str("<!DOCTYPE html><html><head>");
        head.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">");
        let _ = write!(head, "<title>{}</title>", markup::escape(self.title));
        head.push_str(STYLE);
        head.push_str(SCRIPT);
        let _ = write!(
            head,
            "</head><body><h2>{}</h2><form method=\"post\"><table>",
            markup::escape(self.title)
        );
        exchange.chunk(&head)?;

        for index in 0..self.store.schema().count() {
            let param = *self.store.schema().param(index)?;
            if matches!(param.editor, Editor::None) {
                continue;
            }
            let mut row = String::with_capacity(256);
            if matches!(param.editor, Editor::Hidden) {
                self.write_widget(&mut row, index, &param)?;
            } else {
                row.push_str("<tr><td>");
                markup::escape_into(&mut row, param.label());
                row.push_str("</td><td>");
                self.write_widget(&mut row, index, &param)?;
                row.push_str("</td></tr>");
            }
            exchange.chunk(&row)?;
        }

        let mut tail = String::with_capacity(256);
        tail.push_str("</table><div class=\"actions\">");
        tail.push_str("<input type=\"submit\" value=\"Store\"> ");
        let clear_confirm = if confirm { self.clear_confirm } else { None };
        match clear_confirm {
            Some(text) => {
                let _ = write!(
                    tail,
                    "<button type=\"button\" onclick=\"doClear('{}')\">Clear</button>",
                    markup::escape(text)
                );
            }
            None => {
                tail.push_str("<button type=\"button\" onclick=\"doClear()\">Clear</button>");
            }
        }
        if let Some(path) = self.restart_path {
            let _ = write!(
                tail,
                " <button type=\"button\" onclick=\"openUrl('{path}')\">Restart!</button>"
            );
        }
        tail.push_str("</div></form></body></html>");
        exchange.chunk(&tail)?;
        exchange.chunked_end()
    }

    fn write_widget(&self, out: &mut String, index: usize, param: &ParamInfo) -> Result<()> {
        let mut value = String::new();
        self.store.to_text(index, &mut value, true)?;
        match param.editor {
            Editor::None => {}
            Editor::Text {
                size,
                maxlength,
                flags,
            } => {
                self.write_input(out, "text", param, &value, size, maxlength, flags);
            }
            Editor::Password {
                size,
                maxlength,
                flags,
            } => {
                self.write_input(out, "password", param, &value, size, maxlength, flags);
            }
            Editor::TextArea {
                cols,
                rows,
                maxlength,
                flags,
            } => {
                let _ = write!(
                    out,
                    "<textarea name=\"{}\" cols=\"{cols}\" rows=\"{rows}\" \
                     maxlength=\"{maxlength}\" \
                     onkeydown=\"return processTab(this,event)\"",
                    param.name
                );
                write_flags(out, flags);
                let _ = write!(out, ">{value}</textarea>");
            }
            Editor::Checkbox {
                checked,
                unchecked,
                flags,
            } => {
                // The hidden twin submits the unchecked literal; checking
                // the box disables it so only one value ever arrives.
                let mut current = String::new();
                self.store.to_text(index, &mut current, false)?;
                let is_checked = current == checked;
                let _ = write!(
                    out,
                    "<input type=\"hidden\" id=\"{0}__off\" name=\"{0}\" value=\"{1}\"",
                    param.name,
                    markup::escape(unchecked)
                );
                if is_checked {
                    out.push_str(" disabled");
                }
                let _ = write!(
                    out,
                    "><input type=\"checkbox\" name=\"{0}\" value=\"{1}\" \
                     onchange=\"document.getElementById('{0}__off').disabled=this.checked\"",
                    param.name,
                    markup::escape(checked)
                );
                if is_checked {
                    out.push_str(" checked");
                }
                write_flags(out, flags);
                out.push('>');
            }
            Editor::Radio { choices, flags } => {
                let mut current = String::new();
                self.store.to_text(index, &mut current, false)?;
                for Choice { value, title } in choices {
                    let _ = write!(
                        out,
                        "<input type=\"radio\" name=\"{}\" value=\"{}\"",
                        param.name,
                        markup::escape(value)
                    );
                    if *value == current {
                        out.push_str(" checked");
                    }
                    write_flags(out, flags);
                    out.push('>');
                    markup::escape_into(out, title);
                    out.push_str("<br>");
                }
            }
            Editor::Select {
                size,
                choices,
                flags,
            } => {
                let mut current = String::new();
                self.store.to_text(index, &mut current, false)?;
                let _ = write!(out, "<select name=\"{}\" size=\"{size}\"", param.name);
                write_flags(out, flags);
                out.push('>');
                for Choice { value, title } in choices {
                    let _ = write!(out, "<option value=\"{}\"", markup::escape(value));
                    if *value == current {
                        out.push_str(" selected");
                    }
                    out.push('>');
                    markup::escape_into(out, title);
                    out.push_str("</option>");
                }
                out.push_str("</select>");
            }
            Editor::Hidden => {
                let _ = write!(
                    out,
                    "<input type=\"hidden\" name=\"{}\" value=\"{value}\">",
                    param.name
                );
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn write_input(
        &self,
        out: &mut String,
        kind: &str,
        param: &ParamInfo,
        value: &str,
        size: u16,
        maxlength: u16,
        flags: EditorFlags,
    ) {
        let _ = write!(
            out,
            "<input type=\"{kind}\" name=\"{}\" value=\"{value}\" \
             size=\"{size}\" maxlength=\"{maxlength}\"",
            param.name
        );
        if !flags.readonly {
            if param.ptype.is_integer() {
                let _ = write!(
                    out,
                    " onblur=\"checkInt(this,{},{},'{value}')\"",
                    js_bound(param.min),
                    js_bound(param.max)
                );
            } else if param.ptype == crate::schema::ParamType::F32 {
                let _ = write!(
                    out,
                    " onblur=\"checkFloat(this,{},{},'{value}')\"",
                    js_bound(param.min),
                    js_bound(param.max)
                );
            }
        }
        write_flags(out, flags);
        out.push('>');
    }

    // ── POST ───────────────────────────────────────────────────

    fn apply(&mut self, exchange: &mut dyn HttpExchange) -> Result<()> {
        // Stage the args first; later duplicates (checkbox twins) win by
        // simply being applied after their hidden sibling.
        let args: Vec<(String, String)> = (0..exchange.arg_count())
            .filter_map(|i| exchange.arg(i))
            .map(|(n, v)| (n.to_owned(), v.to_owned()))
            .collect();

        let mut errors = String::new();
        for (name, value) in &args {
            match self.store.from_text_by_name(name, value) {
                Ok(()) => {}
                Err(Error::NotFound) => {
                    debug!("ignoring unknown form field '{name}'");
                }
                Err(e) => {
                    warn!("rejected value for '{name}': {e}");
                    let _ = writeln!(errors, "{name}: {e}");
                }
            }
        }
        self.store.commit()?;

        if errors.is_empty() {
            exchange.send(200, "text/html", &refresh_page("OK"))
        } else {
            exchange.send(400, "text/html", &refresh_page(&markup::escape(&errors)))
        }
    }

    // ── DELETE ─────────────────────────────────────────────────

    fn reset(&mut self, exchange: &mut dyn HttpExchange) -> Result<()> {
        match self.store.clear_all() {
            Ok(()) => exchange.send(200, "text/plain", "OK"),
            Err(e) => {
                warn!("clear failed: {e}");
                exchange.send(400, "text/plain", "clear failed")
            }
        }
    }
}

fn write_flags(out: &mut String, flags: EditorFlags) {
    if flags.disabled {
        out.push_str(" disabled");
    }
    if flags.required {
        out.push_str(" required");
    }
    if flags.readonly {
        out.push_str(" readonly");
    }
}

/// Bound rendered as a JS number literal, `NaN` when unbounded.
fn js_bound(bound: Bound) -> String {
    match bound {
        Bound::Int(v) => v.to_string(),
        Bound::Uint(v) => v.to_string(),
        Bound::Float(v) => format!("{v}"),
        Bound::Unbounded => "NaN".to_owned(),
    }
}

/// Result page that bounces back to the form after five seconds.
fn refresh_page(body: &str) -> String {
    format!(
        "<html><head><meta http-equiv=\"refresh\" content=\"5; url=/\"></head>\
         <body>{body}</body></html>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::http::BufferedExchange;
    use crate::adapters::nvs::MemoryNvs;
    use crate::schema::{ParamInfo, Schema};
    use crate::store::Value;

    const PARAMS: &[ParamInfo] = &[
        ParamInfo::string("ssid", "WiFi SSID", 33, ""),
        ParamInfo::uint16("port", "Broker port", 1883),
        ParamInfo::boolean("retain", "Retained", false),
    ];

    fn store() -> Store<MemoryNvs> {
        let mut store = Store::new(Schema::new(PARAMS), MemoryNvs::new());
        store.begin().unwrap();
        store
    }

    #[test]
    fn get_renders_every_editable_field() {
        let mut store = store();
        let mut page = FormPage::new(&mut store).with_restart_path(Some("/restart"));
        let mut ex = BufferedExchange::get("/");
        page.handle(&mut ex, true).unwrap();
        let body = ex.body();
        assert!(body.contains("WiFi SSID"));
        assert!(body.contains("name=\"port\" value=\"1883\""));
        assert!(body.contains("type=\"checkbox\" name=\"retain\""));
        assert!(body.contains("value=\"Store\""));
        assert!(body.contains("doClear('Reset all parameters to defaults?')"));
        assert!(body.contains("openUrl('/restart')"));
        assert!(body.contains("checkInt(this,0,65535,'1883')"));
    }

    #[test]
    fn probe_alias_renders_without_confirmation() {
        let mut store = store();
        let mut page = FormPage::new(&mut store);
        let mut ex = BufferedExchange::get("/generate_204");
        page.handle(&mut ex, false).unwrap();
        let body = ex.body();
        assert!(body.contains("doClear()"));
        assert!(!body.contains("doClear('"));
    }

    #[test]
    fn hidden_schema_still_renders_page_chrome() {
        // A schema whose fields are all invisible must still produce the
        // document with the clear control.
        const HIDDEN: &[ParamInfo] = &[ParamInfo::uint8_custom(
            "secret",
            "",
            1,
            0,
            255,
            Editor::None,
        )];
        let mut store = Store::new(Schema::new(HIDDEN), MemoryNvs::new());
        store.begin().unwrap();
        let mut page = FormPage::new(&mut store).with_clear_confirmation(None);
        let mut ex = BufferedExchange::get("/");
        page.handle(&mut ex, true).unwrap();
        let body = ex.body();
        assert!(!body.contains("secret"));
        assert!(body.contains("</html>"));
        assert!(body.contains("doClear()"));
    }

    #[test]
    fn post_ignores_unknown_and_applies_known() {
        let mut store = store();
        {
            let mut page = FormPage::new(&mut store);
            let mut ex = BufferedExchange::post("/", &[("bogus", "x"), ("retain", "true")]);
            page.handle(&mut ex, true).unwrap();
            assert_eq!(ex.status(), Some(200));
            assert!(ex.body().contains("OK"));
        }
        assert_eq!(store.typed_by_name("retain"), Ok(Value::Bool(true)));
        assert!(store.verify());
    }

    #[test]
    fn post_reports_field_errors_with_400() {
        let mut store = store();
        let mut page = FormPage::new(&mut store);
        let mut ex = BufferedExchange::post("/", &[("port", "99999")]);
        page.handle(&mut ex, true).unwrap();
        assert_eq!(ex.status(), Some(400));
        assert!(ex.body().contains("port"));
    }

    #[test]
    fn checkbox_twin_last_value_wins() {
        let mut store = store();
        {
            let mut page = FormPage::new(&mut store);
            let mut ex = BufferedExchange::post("/", &[("retain", "false"), ("retain", "true")]);
            page.handle(&mut ex, true).unwrap();
        }
        assert_eq!(store.typed_by_name("retain"), Ok(Value::Bool(true)));
    }

    #[test]
    fn delete_resets_everything() {
        let mut store = store();
        store.from_text_by_name("port", "8080").unwrap();
        {
            let mut page = FormPage::new(&mut store);
            let mut ex = BufferedExchange::delete("/");
            page.handle(&mut ex, true).unwrap();
            assert_eq!(ex.status(), Some(200));
        }
        assert_eq!(store.typed_by_name("port"), Ok(Value::U16(1883)));
    }

    #[test]
    fn unsupported_method_is_405() {
        let mut store = store();
        let mut page = FormPage::new(&mut store);
        let mut ex = BufferedExchange::other("/");
        assert_eq!(page.handle(&mut ex, true), Err(Error::ProtocolViolation));
        assert_eq!(ex.status(), Some(405));
    }
}
