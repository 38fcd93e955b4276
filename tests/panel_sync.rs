use pretty_assertions::assert_eq;
use std::{cell::RefCell, rc::Rc};

use argpanel::{
    Event, EventBus, ParamValue,
    form::{ChangeOrigin, FormChange},
    panel::{PanelKind, PanelSync},
    statics,
    store::{DocumentStore, FileStorage},
    table::{MappingTable, TableEditor, TableId},
};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

fn doc(src: &str) -> ParamValue {
    ParamValue::parse_json5(src).expect("test document parses")
}

fn setup() -> (Rc<EventBus>, Rc<DocumentStore>) {
    (Rc::new(EventBus::new()), Rc::new(DocumentStore::in_memory()))
}

fn text(panel: &PanelSync, field: &str) -> Option<String> {
    panel.form().get(field).and_then(|v| v.as_str().map(str::to_string))
}

#[test]
fn data_options_coerce_numbers_to_text() {
    let (bus, store) = setup();
    let panel = PanelSync::activate(PanelKind::DataOptions, &bus, &store);

    bus.publish(
        statics::TOPIC_DATA_OPTIONS_REFRESH,
        Event::Refresh(Some(doc("{ DataDirectory: '/tmp', IgnoredBlockKeys: 3 }"))),
    );

    assert_eq!(text(&panel, "DataDirectory").as_deref(), Some("/tmp"));
    assert_eq!(text(&panel, "IgnoredBlockKeys").as_deref(), Some("3"));
}

#[test]
fn bootstrap_renders_the_stored_document() -> Result<()> {
    let (bus, store) = setup();
    store.set_parameters(&doc("{ Title: 'Boot', Final: true }"))?;
    let writes = store.write_count();

    let panel = PanelSync::activate(PanelKind::GeneralOptions, &bus, &store);
    assert_eq!(text(&panel, "Title").as_deref(), Some("Boot"));
    assert_eq!(panel.form().get("Final"), Some(ParamValue::Bool(true)));
    // Bootstrapping alone does not write.
    assert_eq!(store.write_count(), writes);
    Ok(())
}

#[test]
fn refresh_equal_to_merged_state_does_not_write_back() {
    let (bus, store) = setup();
    let _panel = PanelSync::activate(PanelKind::ReportInformation, &bus, &store);

    // First refresh writes the panel defaults into the empty document.
    bus.publish(
        statics::TOPIC_REPORT_INFORMATION_REFRESH,
        Event::Refresh(store.parameters()),
    );
    let writes = store.write_count();
    let settled = store.parameters();
    assert_eq!(
        settled.as_ref().and_then(|d| d.get("BackendType")),
        Some(&ParamValue::from("LaTeX"))
    );

    bus.publish(
        statics::TOPIC_REPORT_INFORMATION_REFRESH,
        Event::Refresh(store.parameters()),
    );
    assert_eq!(store.write_count(), writes);
    assert_eq!(store.parameters(), settled);
}

#[test]
fn merge_reproduces_recognized_fields_and_keeps_the_rest() -> Result<()> {
    let (bus, store) = setup();
    let document = doc("{ Title: 'T', Number: 7, Authors: ['a', 'b'], Foreign: { x: 1 } }");
    store.set_parameters(&document)?;
    let panel = PanelSync::activate(PanelKind::GeneralOptions, &bus, &store);

    let seen: Rc<RefCell<Vec<FormChange>>> = Rc::new(RefCell::new(Vec::new()));
    let _tap = {
        let seen = Rc::clone(&seen);
        panel.form().subscribe(move |change| {
            seen.borrow_mut().push(change.clone());
            Ok(())
        })
    };

    bus.publish(
        statics::TOPIC_GENERAL_OPTIONS_REFRESH,
        Event::Refresh(Some(document)),
    );
    {
        let seen = seen.borrow();
        let last = seen.last().ok_or("no change emitted")?;
        assert_eq!(last.origin, ChangeOrigin::Document);
        assert_eq!(last.values.get("Title"), Some(&ParamValue::from("T")));
        assert_eq!(last.values.get("Number"), Some(&ParamValue::from("7")));
        assert_eq!(last.values.get("Authors"), Some(&ParamValue::from("a;b")));
        assert!(!last.values.contains_key("Foreign"));
    }

    assert!(panel.form().set_field("Title", "New".into()));
    let stored = store.parameters().ok_or("document missing")?;
    assert_eq!(stored.get("Title"), Some(&ParamValue::from("New")));
    assert_eq!(stored.get("Foreign"), Some(&doc("{ x: 1 }")));
    assert_eq!(seen.borrow().last().map(|c| c.origin), Some(ChangeOrigin::Panel));
    Ok(())
}

#[test]
fn non_object_refreshes_are_ignored() {
    let (bus, store) = setup();
    let panel = PanelSync::activate(PanelKind::GeneralOptions, &bus, &store);
    panel.form().set_field("Title", "kept".into());
    let writes = store.write_count();

    bus.publish(statics::TOPIC_GENERAL_OPTIONS_REFRESH, Event::Refresh(None));
    bus.publish(
        statics::TOPIC_GENERAL_OPTIONS_REFRESH,
        Event::Refresh(Some(ParamValue::from("not a document"))),
    );

    assert_eq!(text(&panel, "Title").as_deref(), Some("kept"));
    assert_eq!(store.write_count(), writes);
}

#[test]
fn dropping_a_panel_releases_both_listeners() {
    let (bus, store) = setup();
    let panel = PanelSync::activate(PanelKind::Inserts, &bus, &store);
    let form = Rc::clone(panel.form());
    assert_eq!(bus.subscriber_count(statics::TOPIC_INSERTS_REFRESH), 1);
    assert_eq!(form.subscriber_count(), 1);

    drop(panel);
    assert_eq!(bus.subscriber_count(statics::TOPIC_INSERTS_REFRESH), 0);
    assert_eq!(form.subscriber_count(), 0);

    let writes = store.write_count();
    form.set_field("Inserts", doc("[{ location: '2', string: ['x'] }]"));
    assert_eq!(store.write_count(), writes);
}

#[test]
fn diverging_mapping_tables_are_repaired_on_refresh() -> Result<()> {
    let (bus, store) = setup();
    let panel = PanelSync::activate(PanelKind::DataOptions, &bus, &store);

    bus.publish(
        statics::TOPIC_DATA_OPTIONS_REFRESH,
        Event::Refresh(Some(doc(
            "{ Mappings: { CAD_to_FEM: { elements: { a: ['1'], b: 'x' }, factors: { a: '2' } } } }",
        ))),
    );

    let table = TableEditor::new(panel.form()).table(TableId::CadToFem)?;
    assert!(table.keys_in_lockstep());
    assert_eq!(table.factor("b"), Some(""));
    assert_eq!(table.elements("b"), Some(&["x".to_string()][..]));

    // The untouched table keeps its empty default.
    let other = TableEditor::new(panel.form()).table(TableId::FemToCad)?;
    assert_eq!(other, MappingTable::default());
    Ok(())
}

#[test]
fn panel_edits_survive_a_session_file_reopen() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("session.json");

    {
        let bus = Rc::new(EventBus::new());
        let store = Rc::new(DocumentStore::open(Box::new(FileStorage::open(&path)?))?);
        let panel = PanelSync::activate(PanelKind::GeneralOptions, &bus, &store);
        panel.form().set_field("Title", "Persisted".into());
    }

    let bus = Rc::new(EventBus::new());
    let store = Rc::new(DocumentStore::open(Box::new(FileStorage::open(&path)?))?);
    let panel = PanelSync::activate(PanelKind::GeneralOptions, &bus, &store);
    assert_eq!(text(&panel, "Title").as_deref(), Some("Persisted"));
    Ok(())
}
