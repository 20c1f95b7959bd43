//! Form rendering and submission through the public surface.

#![cfg(not(target_os = "espidf"))]

use paramportal::adapters::http::{parse_form, BufferedExchange};
use paramportal::adapters::nvs::MemoryNvs;
use paramportal::schema::{Choice, Editor, EditorFlags};
use paramportal::{FormPage, ParamInfo, Schema, Store, Value};

const MODES: &[Choice] = &[
    Choice {
        value: "0",
        title: "Off",
    },
    Choice {
        value: "1",
        title: "Eco",
    },
    Choice {
        value: "2",
        title: "Boost",
    },
];

const PARAMS: &[ParamInfo] = &[
    ParamInfo::string("ssid", "WiFi SSID", 33, ""),
    ParamInfo::password("pass", "WiFi password", 64, ""),
    ParamInfo::uint8_custom(
        "mode",
        "Mode",
        1,
        0,
        2,
        Editor::Radio {
            choices: MODES,
            flags: EditorFlags::NONE,
        },
    ),
    ParamInfo::uint8_custom(
        "profile",
        "Profile",
        0,
        0,
        2,
        Editor::Select {
            size: 1,
            choices: MODES,
            flags: EditorFlags::NONE,
        },
    ),
    ParamInfo::string_custom(
        "notes",
        "Notes",
        129,
        "",
        Editor::TextArea {
            cols: 40,
            rows: 4,
            maxlength: 128,
            flags: EditorFlags::NONE,
        },
    ),
    ParamInfo::string_custom("token", "", 17, "t0", Editor::Hidden),
];

fn open_store() -> Store<MemoryNvs> {
    let mut store = Store::new(Schema::new(PARAMS), MemoryNvs::new());
    store.begin().unwrap();
    store
}

#[test]
fn renders_every_editor_kind() {
    let mut store = open_store();
    let mut page = FormPage::new(&mut store);
    let mut ex = BufferedExchange::get("/");
    page.handle(&mut ex, true).unwrap();
    let body = ex.body();

    assert!(body.contains("type=\"password\" name=\"pass\""));
    assert!(body.contains("<textarea name=\"notes\""));
    assert!(body.contains("processTab(this,event)"));
    // Radio: the stored value 1 is the checked option.
    assert!(body.contains("type=\"radio\" name=\"mode\" value=\"1\" checked"));
    assert!(body.contains("type=\"radio\" name=\"mode\" value=\"2\">Boost"));
    // Select: stored value 0 is selected.
    assert!(body.contains("<select name=\"profile\""));
    assert!(body.contains("<option value=\"0\" selected>Off</option>"));
    // Hidden fields carry no label row.
    assert!(body.contains("type=\"hidden\" name=\"token\" value=\"t0\""));
    assert!(!body.contains("<td>token</td>"));
}

#[test]
fn urlencoded_submission_round_trips() {
    let mut store = open_store();
    let decoded = parse_form("ssid=caf%C3%A9+net&pass=p%26w&mode=2&notes=line1%0Aline2");
    {
        let mut page = FormPage::new(&mut store);
        let pairs: Vec<(&str, &str)> = decoded
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_str()))
            .collect();
        let mut ex = BufferedExchange::post("/", &pairs);
        page.handle(&mut ex, true).unwrap();
        assert_eq!(ex.status(), Some(200));
    }
    assert_eq!(
        store.typed_by_name("ssid"),
        Ok(Value::Str("café net".as_bytes()))
    );
    assert_eq!(store.typed_by_name("pass"), Ok(Value::Str(b"p&w".as_slice())));
    assert_eq!(store.typed_by_name("mode"), Ok(Value::U8(2)));
    assert_eq!(
        store.typed_by_name("notes"),
        Ok(Value::Str(b"line1\nline2".as_slice()))
    );
    // The submission committed: a reopened store sees the same values.
    let image = store.port().flash_image().to_vec();
    let mut reopened = Store::new(Schema::new(PARAMS), MemoryNvs::with_image(image));
    assert_eq!(reopened.begin(), Ok(false));
    assert_eq!(reopened.typed_by_name("mode"), Ok(Value::U8(2)));
}

#[test]
fn stored_values_render_escaped() {
    let mut store = open_store();
    store.set_by_name("ssid", Some(b"a\"b<c>")).unwrap();
    let mut page = FormPage::new(&mut store);
    let mut ex = BufferedExchange::get("/");
    page.handle(&mut ex, true).unwrap();
    assert!(ex.body().contains("value=\"a&quot;b&lt;c&gt;\""));
    assert!(!ex.body().contains("value=\"a\"b"));
}

#[test]
fn partial_failure_keeps_good_fields_and_reports_bad() {
    let mut store = open_store();
    {
        let mut page = FormPage::new(&mut store);
        let mut ex = BufferedExchange::post("/", &[("ssid", "ok-net"), ("mode", "nine")]);
        page.handle(&mut ex, true).unwrap();
        assert_eq!(ex.status(), Some(400));
        assert!(ex.body().contains("mode"));
    }
    // The good field stuck and everything was still committed.
    assert_eq!(
        store.typed_by_name("ssid"),
        Ok(Value::Str(b"ok-net".as_slice()))
    );
    assert_eq!(store.typed_by_name("mode"), Ok(Value::U8(1)));
    assert!(store.verify());
}
