// Central place for UI strings, topic names and document keys.
// Keep these out of gui.rs and the panel declarations to reduce duplication.

// External links
pub const PROJECT_URL: &str = "https://gitlab.com/AutomaticReportGenerator/arg";

// Bus topics
pub const TOPIC_LOGGER: &str = "logger";
pub const TOPIC_REPORT_INFORMATION_REFRESH: &str = "report-information-tab-refresh";
pub const TOPIC_GENERAL_OPTIONS_REFRESH: &str = "general-options-tab-refresh";
pub const TOPIC_DATA_OPTIONS_REFRESH: &str = "data-options-tab-refresh";
pub const TOPIC_INSERTS_REFRESH: &str = "inserts-tab-refresh";

/// Every panel refresh topic, in tab order.
pub const REFRESH_TOPICS: [&str; 4] = [
    TOPIC_REPORT_INFORMATION_REFRESH,
    TOPIC_GENERAL_OPTIONS_REFRESH,
    TOPIC_DATA_OPTIONS_REFRESH,
    TOPIC_INSERTS_REFRESH,
];

// Session store keys
pub const STORE_PARAMETERS: &str = "parameters";
pub const STORE_RUN_OPT: &str = "run_opt";
pub const STORE_IS_DEFAULT_CONF: &str = "is_default_configuration";

// Run options understood by the report service.
pub const RUN_OPT_EXECUTE: &str = "-e";
pub const RUN_OPT_GENERATE: &str = "-g";

// Report information fields
pub const FIELD_BACKEND_TYPE: &str = "BackendType";
pub const FIELD_REPORT_TYPE: &str = "ReportType";
pub const FIELD_MUTABLES: &str = "Mutables";
pub const FIELD_STRUCTURE_FILE: &str = "StructureFile";
pub const FIELD_STRUCTURE_END: &str = "StructureEnd";
pub const FIELD_ARTIFACT_FILE: &str = "ArtifactFile";
pub const FIELD_OUTPUT_DIR: &str = "OutputDir";
pub const FIELD_VERBOSITY: &str = "Verbosity";

pub const BACKEND_LATEX: &str = "LaTeX";
pub const BACKEND_WORD: &str = "Word";
pub const REPORT_TYPE_REPORT: &str = "Report";
pub const REPORT_TYPE_GENERIC: &str = "Generic";
pub const VERBOSITY_DEFAULT: &str = "1";

// General options fields
pub const FIELD_TITLE: &str = "Title";
pub const FIELD_NUMBER: &str = "Number";
pub const FIELD_ISSUE: &str = "Issue";
pub const FIELD_VERSIONS: &str = "Versions";
pub const FIELD_AUTHORS: &str = "Authors";
pub const FIELD_ORGANIZATIONS: &str = "Organizations";
pub const FIELD_LOCATION: &str = "Location";
pub const FIELD_YEAR: &str = "Year";
pub const FIELD_MONTH: &str = "Month";
pub const FIELD_ABSTRACT_FILE: &str = "AbstractFile";
pub const FIELD_PREFACE: &str = "Preface";
pub const FIELD_THANKS: &str = "Thanks";
pub const FIELD_EXECUTIVE_SUMMARY: &str = "ExecutiveSummary";
pub const FIELD_NOMENCLATURE: &str = "Nomenclature";
pub const FIELD_CLASSIFICATION: &str = "Classification";
pub const FIELD_FINAL: &str = "Final";
pub const FIELD_KEY_SEPARATOR: &str = "KeySeparator";

// Data options fields
pub const FIELD_DATA_DIRECTORY: &str = "DataDirectory";
pub const FIELD_GEOMETRY_ROOT: &str = "GeometryRoot";
pub const FIELD_REPORTED_CAD_METADATA: &str = "ReportedCadMetaData";
pub const FIELD_DECK_ROOT: &str = "DeckRoot";
pub const FIELD_IGNORED_BLOCK_KEYS: &str = "IgnoredBlockKeys";
pub const FIELD_MAPPINGS: &str = "Mappings";

// Mapping tables inside `Mappings`.
pub const MAPPING_CAD_TO_FEM: &str = "CAD_to_FEM";
pub const MAPPING_FEM_TO_CAD: &str = "FEM_to_CAD";
pub const MAPPING_ELEMENTS: &str = "elements";
pub const MAPPING_FACTORS: &str = "factors";
pub const MAPPING_KEY_PREFIX: &str = "elt";

// Inserts
pub const FIELD_INSERTS: &str = "Inserts";
pub const INSERT_LOCATION: &str = "location";
pub const INSERT_TYPE_STRING: &str = "string";
pub const INSERT_TYPE_IMAGE: &str = "image";
pub const INSERT_DEFAULT_LOCATION: &str = "1";
pub const INSERT_DEFAULT_TEXT: &str = "My insertion";

/// Separator used when list fields are shown as a single line of text.
pub const LIST_DELIMITER: char = ';';

// Log levels as sent over the logger topic.
pub const LEVEL_DEBUG: &str = "DEBUG";
pub const LEVEL_INFO: &str = "INFO";
pub const LEVEL_WARN: &str = "WARN";
pub const LEVEL_ERROR: &str = "ERROR";
pub const LEVEL_SUCCESS: &str = "SUCCESS";

// Log messages published by the toolbar.
pub const MSG_REQUESTING_FILE_LOAD: &str = "Requesting file load...";
pub const MSG_REQUESTING_RELOAD: &str = "Requesting reload...";
pub const MSG_REQUESTING_SAVE: &str = "Requesting save...";
pub const MSG_REQUESTING_RUN: &str = "Requesting run action...";
pub const MSG_REQUESTING_DEFAULTS: &str = "Requesting default parameters...";
pub const MSG_DEFAULTS_APPLIED: &str = "Default parameters applied.";
pub const MSG_SAVED: &str = "Parameters saved successfully";
pub const MSG_PARAMS_REQUIRED: &str = "Params needs to be provided";
pub const MSG_INTERNAL_ERROR: &str = "Internal error";

// Remote service routes (relative to the configured API url).
pub const ROUTE_DEFAULT_PARAMETERS: &str = "/api/v1/arg/parameters/default";
pub const ROUTE_RUN: &str = "/api/v1/arg/run";
pub const ROUTE_RELOAD: &str = "/api/v1/arg/reload";
pub const ROUTE_READ_PARAMETERS: &str = "/api/v1/arg/parameters/read";
pub const ROUTE_WRITE_PARAMETERS: &str = "/api/v1/arg/parameters/write";

pub const DEFAULT_SAVE_FILE_NAME: &str = "parameters.yml";

// English UI strings (EN_ prefix to make future localization easier)
pub const EN_APP_TITLE: &str = "ARG Control Panel";
pub const EN_LINK_PROJECT: &str = "ARG on GitLab";

pub const EN_BTN_OPEN: &str = "Open...";
pub const EN_BTN_SAVE_AS: &str = "Save As...";
pub const EN_BTN_RELOAD: &str = "Reload";
pub const EN_BTN_RUN: &str = "Run";
pub const EN_BTN_TOGGLE_THEME: &str = "Theme";
pub const EN_BTN_CLEAR: &str = "Clear";
pub const EN_BTN_ADD_ITEM: &str = "Add item";
pub const EN_BTN_DELETE: &str = "Delete";

pub const EN_LABEL_RUN_OPT: &str = "Run:";
pub const EN_RUN_OPT_EXECUTE: &str = "Execute (-e)";
pub const EN_RUN_OPT_GENERATE: &str = "Generate (-g)";
pub const EN_BADGE_BUSY: &str = "request in progress";

pub const EN_TAB_REPORT_INFORMATION: &str = "Report Information";
pub const EN_TAB_GENERAL_OPTIONS: &str = "General Options";
pub const EN_TAB_DATA_OPTIONS: &str = "Data Options";
pub const EN_TAB_INSERTS: &str = "Inserts";

pub const EN_HEADING_LOGS: &str = "Logs";
pub const EN_HEADING_CAD_TO_FEM: &str = "CAD to FEM";
pub const EN_HEADING_FEM_TO_CAD: &str = "FEM to CAD";

pub const EN_COL_KEY: &str = "Key";
pub const EN_COL_ELEMENTS: &str = "Elements";
pub const EN_COL_FACTOR: &str = "Factor";
pub const EN_COL_LOCATION: &str = "Location";
pub const EN_COL_TYPE: &str = "Type";
pub const EN_COL_PAYLOAD: &str = "Text / Image Path";

pub const EN_FILTER_PARAMETERS: &str = "ARG parameters";
pub const EN_FILTER_EXTENSIONS: [&str; 2] = ["yml", "yaml"];
