use pretty_assertions::assert_eq;
use std::rc::Rc;

use argpanel::{
    EventBus, ParamValue,
    error::InsertError,
    inserts::{InsertEntry, InsertKind, InsertList},
    panel::{PanelKind, PanelSync},
    store::DocumentStore,
};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

fn stored_inserts(store: &DocumentStore) -> Option<ParamValue> {
    store.parameters()?.get("Inserts").cloned()
}

#[test]
fn append_edit_and_remove_reach_the_document() -> Result<()> {
    let bus = Rc::new(EventBus::new());
    let store = Rc::new(DocumentStore::in_memory());
    let panel = PanelSync::activate(PanelKind::Inserts, &bus, &store);
    let inserts = InsertList::new(panel.form());
    assert!(inserts.is_empty());

    assert_eq!(inserts.append(), 0);
    assert_eq!(inserts.append(), 1);
    assert_eq!(
        inserts.entries(),
        vec![InsertEntry::new_default(), InsertEntry::new_default()]
    );
    assert_eq!(
        stored_inserts(&store),
        Some(ParamValue::parse_json5(
            "[{ location: '1', string: ['My insertion'] }, { location: '1', string: ['My insertion'] }]"
        )?)
    );
    inserts.set_location(1, " 3 ")?;
    inserts.change_type(1, InsertKind::Image)?;
    inserts.set_payload(1, "fig1.png; fig2.png")?;

    assert_eq!(
        stored_inserts(&store),
        Some(ParamValue::parse_json5(
            "[{ location: '1', string: ['My insertion'] }, { location: '3', image: ['fig1.png', 'fig2.png'] }]"
        )?)
    );

    let removed = inserts.remove(0)?;
    assert_eq!(removed.kind, InsertKind::String);
    let entries = inserts.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].location, "3");
    assert_eq!(entries[0].payload_text(), "fig1.png;fig2.png");
    assert_eq!(
        stored_inserts(&store).and_then(|v| v.as_array().map(<[ParamValue]>::len)),
        Some(1)
    );
    Ok(())
}

#[test]
fn changing_type_moves_the_payload() -> Result<()> {
    let form = PanelKind::Inserts.form();
    let inserts = InsertList::new(&form);
    inserts.append();

    inserts.change_type(0, InsertKind::Image)?;
    let raw = form.get("Inserts").ok_or("Inserts missing")?;
    let entry = raw.as_array().and_then(|a| a.first()).ok_or("entry missing")?;
    assert_eq!(entry.get("string"), None);
    assert_eq!(entry.get("image"), Some(&ParamValue::string_list(["My insertion"])));

    // Same kind again is a no-op.
    inserts.change_type(0, InsertKind::Image)?;
    assert_eq!(inserts.entries()[0].kind, InsertKind::Image);
    Ok(())
}

#[test]
fn entries_with_two_payloads_keep_one_after_an_edit() -> Result<()> {
    let form = PanelKind::Inserts.form();
    form.set_field(
        "Inserts",
        ParamValue::parse_json5("[{ location: '1', string: ['a'], image: ['b.png'] }]")?,
    );
    let inserts = InsertList::new(&form);
    assert_eq!(inserts.entries()[0].kind, InsertKind::String);

    inserts.change_type(0, InsertKind::Image)?;
    let raw = form.get("Inserts").ok_or("Inserts missing")?;
    let entry = raw.as_array().and_then(|a| a.first()).ok_or("entry missing")?;
    assert_eq!(entry.get("string"), None);
    assert_eq!(entry.get("image"), Some(&ParamValue::string_list(["a"])));
    Ok(())
}

#[test]
fn out_of_range_indices_are_rejected() {
    let form = PanelKind::Inserts.form();
    let inserts = InsertList::new(&form);
    inserts.append();

    assert_eq!(
        inserts.remove(4),
        Err(InsertError::OutOfRange { index: 4, len: 1 })
    );
    assert_eq!(
        inserts.set_payload(1, "x"),
        Err(InsertError::OutOfRange { index: 1, len: 1 })
    );
    assert_eq!(inserts.len(), 1);
}
