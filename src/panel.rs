//! The four editor panels and the adapter that keeps each one in step with the shared
//! parameter document.

use crate::{
    Event, EventBus, ParamMap, ParamValue,
    bus::Subscription,
    form::{Coercion, FieldSpec, Form},
    statics,
    store::DocumentStore,
    table,
};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelKind {
    ReportInformation,
    GeneralOptions,
    DataOptions,
    Inserts,
}

impl PanelKind {
    /// Tab order.
    pub const ALL: [PanelKind; 4] = [
        PanelKind::ReportInformation,
        PanelKind::GeneralOptions,
        PanelKind::DataOptions,
        PanelKind::Inserts,
    ];

    pub fn topic(self) -> &'static str {
        match self {
            PanelKind::ReportInformation => statics::TOPIC_REPORT_INFORMATION_REFRESH,
            PanelKind::GeneralOptions => statics::TOPIC_GENERAL_OPTIONS_REFRESH,
            PanelKind::DataOptions => statics::TOPIC_DATA_OPTIONS_REFRESH,
            PanelKind::Inserts => statics::TOPIC_INSERTS_REFRESH,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            PanelKind::ReportInformation => statics::EN_TAB_REPORT_INFORMATION,
            PanelKind::GeneralOptions => statics::EN_TAB_GENERAL_OPTIONS,
            PanelKind::DataOptions => statics::EN_TAB_DATA_OPTIONS,
            PanelKind::Inserts => statics::EN_TAB_INSERTS,
        }
    }

    pub fn fields(self) -> Vec<FieldSpec> {
        match self {
            PanelKind::ReportInformation => report_information_fields(),
            PanelKind::GeneralOptions => general_options_fields(),
            PanelKind::DataOptions => data_options_fields(),
            PanelKind::Inserts => vec![FieldSpec::new(
                statics::FIELD_INSERTS,
                ParamValue::Array(Vec::new()),
                Coercion::Identity,
            )],
        }
    }

    pub fn form(self) -> Form {
        Form::new(self.topic(), self.fields())
    }

    /// The panel's declared defaults as a document fragment.
    pub fn defaults(self) -> ParamMap {
        self.fields()
            .into_iter()
            .map(|f| (f.name.to_string(), f.default))
            .collect()
    }
}

fn report_information_fields() -> Vec<FieldSpec> {
    use Coercion::NumberToString;
    vec![
        FieldSpec::new(statics::FIELD_BACKEND_TYPE, statics::BACKEND_LATEX, NumberToString),
        FieldSpec::new(statics::FIELD_REPORT_TYPE, statics::REPORT_TYPE_REPORT, NumberToString),
        FieldSpec::text(statics::FIELD_MUTABLES),
        FieldSpec::text(statics::FIELD_STRUCTURE_FILE),
        FieldSpec::text(statics::FIELD_STRUCTURE_END),
        FieldSpec::text(statics::FIELD_ARTIFACT_FILE),
        FieldSpec::text(statics::FIELD_OUTPUT_DIR),
        FieldSpec::new(statics::FIELD_VERBOSITY, statics::VERBOSITY_DEFAULT, NumberToString),
    ]
}

fn general_options_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::text(statics::FIELD_TITLE),
        FieldSpec::text(statics::FIELD_NUMBER),
        FieldSpec::text(statics::FIELD_ISSUE),
        FieldSpec::list(statics::FIELD_VERSIONS),
        FieldSpec::list(statics::FIELD_AUTHORS),
        FieldSpec::list(statics::FIELD_ORGANIZATIONS),
        FieldSpec::text(statics::FIELD_LOCATION),
        FieldSpec::text(statics::FIELD_YEAR),
        FieldSpec::text(statics::FIELD_MONTH),
        FieldSpec::text(statics::FIELD_ABSTRACT_FILE),
        FieldSpec::text(statics::FIELD_PREFACE),
        FieldSpec::text(statics::FIELD_THANKS),
        FieldSpec::text(statics::FIELD_EXECUTIVE_SUMMARY),
        FieldSpec::text(statics::FIELD_NOMENCLATURE),
        FieldSpec::text(statics::FIELD_CLASSIFICATION),
        FieldSpec::new(statics::FIELD_FINAL, false, Coercion::Identity),
        FieldSpec::text(statics::FIELD_KEY_SEPARATOR),
    ]
}

fn data_options_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::list(statics::FIELD_DATA_DIRECTORY),
        FieldSpec::list(statics::FIELD_GEOMETRY_ROOT),
        FieldSpec::list(statics::FIELD_REPORTED_CAD_METADATA),
        FieldSpec::list(statics::FIELD_DECK_ROOT),
        FieldSpec::list(statics::FIELD_IGNORED_BLOCK_KEYS),
        FieldSpec::new(
            statics::FIELD_MAPPINGS,
            table::default_mappings(),
            Coercion::DeepMergeStructured,
        )
        .with_repair(table::repair_mappings),
    ]
}

/// One mounted panel: its working copy, subscribed to the panel's refresh topic, with every
/// change written back into the document. Dropping it unsubscribes both listeners.
pub struct PanelSync {
    kind: PanelKind,
    form: Rc<Form>,
    _refresh: Subscription,
    _write_back: Subscription,
}

impl PanelSync {
    pub fn activate(kind: PanelKind, bus: &EventBus, store: &Rc<DocumentStore>) -> Self {
        let form = Rc::new(kind.form());

        let refresh = {
            let form = Rc::downgrade(&form);
            bus.subscribe(kind.topic(), move |event| {
                let Event::Refresh(document) = event else {
                    return Ok(());
                };
                if let Some(form) = form.upgrade() {
                    form.apply_document(document.as_ref());
                }
                Ok(())
            })
        };

        // Bootstrap render through our own subscription.
        bus.publish(kind.topic(), Event::Refresh(store.parameters()));

        let changes = {
            let store = Rc::clone(store);
            form.subscribe(move |change| {
                write_back(&store, &change.values)?;
                Ok(())
            })
        };

        tracing::debug!(panel = kind.topic(), "panel activated");
        Self {
            kind,
            form,
            _refresh: refresh,
            _write_back: changes,
        }
    }

    pub fn kind(&self) -> PanelKind {
        self.kind
    }

    pub fn form(&self) -> &Rc<Form> {
        &self.form
    }
}

/// Shallow-merge `values` over the stored document and store the result, unless that
/// leaves the document's serialization unchanged. Returns whether a write happened.
pub fn write_back(store: &DocumentStore, values: &ParamMap) -> anyhow::Result<bool> {
    let current = store.parameters().unwrap_or_default();
    let before = current.to_json_compact();

    let mut candidate = current.into_object().unwrap_or_default();
    for (field, value) in values {
        candidate.insert(field.clone(), value.clone());
    }
    let candidate = ParamValue::Object(candidate);

    if candidate.to_json_compact() == before {
        return Ok(false);
    }
    store.set_parameters(&candidate)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::{PanelKind, write_back};
    use crate::{ParamValue, statics, store::DocumentStore};

    #[test]
    fn topics_are_distinct_and_match_the_refresh_list() {
        let topics: Vec<_> = PanelKind::ALL.iter().map(|k| k.topic()).collect();
        assert_eq!(topics, statics::REFRESH_TOPICS.to_vec());
    }

    #[test]
    fn report_information_defaults() {
        let defaults = PanelKind::ReportInformation.defaults();
        assert_eq!(defaults.get("BackendType"), Some(&ParamValue::from("LaTeX")));
        assert_eq!(defaults.get("Verbosity"), Some(&ParamValue::from("1")));
        assert_eq!(defaults.len(), 8);
    }

    #[test]
    fn write_back_skips_identical_documents() {
        let store = DocumentStore::in_memory();
        let values = PanelKind::Inserts.defaults();

        assert!(write_back(&store, &values).unwrap());
        let writes = store.write_count();
        assert!(!write_back(&store, &values).unwrap());
        assert_eq!(store.write_count(), writes);
    }
}
