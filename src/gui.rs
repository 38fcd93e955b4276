use crate::{
    Config, EventBus, LogLevel, ParamValue,
    bus::Subscription,
    form::{ChangeOrigin, Coercion, FieldSpec, Form},
    inserts::{InsertKind, InsertList},
    logger::LogView,
    panel::{PanelKind, PanelSync},
    service::HttpReportService,
    statics,
    store::{DocumentStore, FileStorage},
    table::{CellEdit, TableEditor, TableId},
    toolbar::{Request, Toolbar, Worker},
};
use anyhow::Context;
use eframe::egui;
use egui_extras::{Column, TableBuilder};
use std::{
    cell::Cell,
    path::PathBuf,
    rc::Rc,
    sync::Arc,
};

pub fn run_gui(config: Config) -> eframe::Result {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1280.0, 900.0]),
        ..Default::default()
    };
    let title = format!("{} {}", statics::EN_APP_TITLE, env!("CARGO_PKG_VERSION"));
    eframe::run_native(
        &title,
        options,
        Box::new(move |cc| {
            let app = ArgPanelApp::new(&cc.egui_ctx, &config)?;
            Ok(Box::new(app))
        }),
    )
}

/// Which cell of which table is being edited.
#[derive(Clone, Debug, PartialEq, Eq)]
enum CellRef {
    MappingKey(TableId, String),
    MappingElements(TableId, String),
    MappingFactor(TableId, String),
    InsertPayload(usize),
}

/// Edits collected while drawing and applied once the frame's borrows are released.
enum PanelOp {
    SetField(&'static str, ParamValue),
    InsertRow(TableId),
    RemoveRow(TableId, String),
    AppendInsert,
    RemoveInsert(usize),
    SetInsertLocation(usize, String),
    SetInsertKind(usize, InsertKind),
    BeginCell(CellRef, String, String),
    Commit,
    Cancel,
}

/// One tab: the synced panel plus the view state the shell keeps for it.
struct PanelView {
    sync: PanelSync,
    cell: Option<(CellRef, CellEdit)>,
    document_replaced: Rc<Cell<bool>>,
    _watch: Subscription,
}

impl PanelView {
    fn new(kind: PanelKind, bus: &EventBus, store: &Rc<DocumentStore>) -> Self {
        let sync = PanelSync::activate(kind, bus, store);
        let document_replaced = Rc::new(Cell::new(false));
        let watch = {
            let flag = Rc::clone(&document_replaced);
            sync.form().subscribe(move |change| {
                // Our own edits come back as Panel changes; only a refresh invalidates a cell.
                if change.origin == ChangeOrigin::Document {
                    flag.set(true);
                }
                Ok(())
            })
        };
        Self {
            sync,
            cell: None,
            document_replaced,
            _watch: watch,
        }
    }

    fn form(&self) -> &Form {
        self.sync.form()
    }
}

struct ArgPanelApp {
    toolbar: Toolbar,
    worker: Worker,
    panels: Vec<PanelView>,
    log_view: LogView,
    active_tab: PanelKind,
    dialog_dir: Option<PathBuf>,
    status: String,
    last_error: Option<String>,
    theme_dark: bool,
}

impl ArgPanelApp {
    fn new(ctx: &egui::Context, config: &Config) -> anyhow::Result<Self> {
        let store = Rc::new(match &config.session_file {
            Some(path) => {
                let backend = FileStorage::open(path)
                    .with_context(|| format!("opening session file {path:?}"))?;
                DocumentStore::open(Box::new(backend))?
            }
            None => DocumentStore::in_memory(),
        });
        let bus = Rc::new(EventBus::new());
        let service = HttpReportService::new(&config.api_url, config.timeout())?;

        // The log view must exist before anything publishes to it.
        let log_view = LogView::attach(&bus);
        let toolbar = Toolbar::new(Rc::clone(&bus), Rc::clone(&store));
        let first_request = toolbar.initialize();

        let panels = PanelKind::ALL
            .into_iter()
            .map(|kind| PanelView::new(kind, &bus, &store))
            .collect();

        let mut app = Self {
            toolbar,
            worker: Worker::new(Arc::new(service)),
            panels,
            log_view,
            active_tab: PanelKind::ReportInformation,
            dialog_dir: None,
            status: String::new(),
            last_error: None,
            theme_dark: true,
        };
        if let Some(request) = first_request {
            app.dispatch(ctx, request);
        }
        Ok(app)
    }

    fn dispatch(&mut self, ctx: &egui::Context, request: Request) {
        self.status = format!("{} ...", request.label());
        let ctx = ctx.clone();
        self.worker.submit(request, move || ctx.request_repaint());
    }

    fn file_dialog(&self) -> rfd::FileDialog {
        let mut dlg = rfd::FileDialog::new()
            .add_filter(statics::EN_FILTER_PARAMETERS, &statics::EN_FILTER_EXTENSIONS);
        if let Some(dir) = self.dialog_dir.clone() {
            dlg = dlg.set_directory(dir);
        }
        dlg
    }

    fn open_file(&mut self, ctx: &egui::Context) {
        let Some(path) = self.file_dialog().pick_file() else {
            return;
        };
        self.dialog_dir = path.parent().map(PathBuf::from);
        let request = self.toolbar.open_file(path);
        self.dispatch(ctx, request);
    }

    fn save_file_as(&mut self, ctx: &egui::Context) {
        let Some(path) = self
            .file_dialog()
            .set_file_name(statics::DEFAULT_SAVE_FILE_NAME)
            .save_file()
        else {
            return;
        };
        self.dialog_dir = path.parent().map(PathBuf::from);
        if let Some(request) = self.toolbar.save(path) {
            self.dispatch(ctx, request);
        }
    }

    fn apply_completions(&mut self) {
        let done = self.worker.drain();
        if done.is_empty() {
            return;
        }
        for completion in done {
            self.toolbar.complete(completion);
        }
        if !self.worker.is_busy() {
            self.status.clear();
        }
    }

    fn render_top_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            egui::MenuBar::new().ui(ui, |ui| {
                if ui.button(statics::EN_BTN_OPEN).clicked() {
                    self.open_file(ctx);
                }
                if ui.button(statics::EN_BTN_SAVE_AS).clicked() {
                    self.save_file_as(ctx);
                }
                if ui.button(statics::EN_BTN_RELOAD).clicked() {
                    let request = self.toolbar.reload();
                    self.dispatch(ctx, request);
                }

                ui.separator();
                ui.label(statics::EN_LABEL_RUN_OPT);
                let current = self.toolbar.run_option();
                let mut selected = current.clone();
                egui::ComboBox::from_id_salt("run_opt")
                    .selected_text(run_option_label(&selected))
                    .show_ui(ui, |ui| {
                        for opt in [statics::RUN_OPT_EXECUTE, statics::RUN_OPT_GENERATE] {
                            ui.selectable_value(&mut selected, opt.to_string(), run_option_label(opt));
                        }
                    });
                if selected != current {
                    self.toolbar.set_run_option(&selected);
                }
                if ui.button(statics::EN_BTN_RUN).clicked() {
                    let request = self.toolbar.run();
                    self.dispatch(ctx, request);
                }

                ui.separator();
                if ui.button(statics::EN_BTN_TOGGLE_THEME).clicked() {
                    self.theme_dark = !self.theme_dark;
                    if self.theme_dark {
                        ctx.set_visuals(egui::Visuals::dark());
                    } else {
                        ctx.set_visuals(egui::Visuals::light());
                    }
                }

                if self.worker.is_busy() {
                    ui.separator();
                    ui.spinner();
                    ui.label(statics::EN_BADGE_BUSY);
                }
                if !self.status.is_empty() {
                    ui.separator();
                    ui.label(&self.status);
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.hyperlink_to(statics::EN_LINK_PROJECT, statics::PROJECT_URL);
                });
            });
        });
    }

    fn render_log_panel(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("logs")
            .resizable(true)
            .default_height(180.0)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading(statics::EN_HEADING_LOGS);
                    if ui.small_button(statics::EN_BTN_CLEAR).clicked() {
                        self.log_view.clear();
                    }
                });
                let scroll = self.log_view.take_scroll_request();
                egui::ScrollArea::vertical()
                    .auto_shrink([false, false])
                    .stick_to_bottom(true)
                    .show(ui, |ui| {
                        for line in self.log_view.lines() {
                            ui.horizontal(|ui| {
                                ui.monospace(line.date.format("%Y-%m-%d %H:%M:%S").to_string());
                                ui.colored_label(level_color(&line.level), line.level.as_str());
                                ui.label(&line.message);
                            });
                        }
                        if scroll {
                            ui.scroll_to_cursor(Some(egui::Align::BOTTOM));
                        }
                    });
            });
    }

    fn render_central(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                for kind in PanelKind::ALL {
                    ui.selectable_value(&mut self.active_tab, kind, kind.title());
                }
            });
            ui.separator();

            let Some(view) = self.panels.iter_mut().find(|p| p.sync.kind() == self.active_tab)
            else {
                return;
            };
            if view.document_replaced.replace(false) {
                view.cell = None;
            }

            let mut ops = Vec::new();
            egui::ScrollArea::vertical()
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    render_fields(ui, view, &mut ops);
                });

            if let Err(err) = apply_ops(view, ops) {
                self.last_error = Some(err);
            }
        });
    }
}

fn run_option_label(opt: &str) -> &'static str {
    if opt == statics::RUN_OPT_GENERATE {
        statics::EN_RUN_OPT_GENERATE
    } else {
        statics::EN_RUN_OPT_EXECUTE
    }
}

fn level_color(level: &LogLevel) -> egui::Color32 {
    match level {
        LogLevel::Error => egui::Color32::from_rgb(220, 50, 50),
        LogLevel::Warn => egui::Color32::from_rgb(230, 160, 0),
        LogLevel::Success => egui::Color32::from_rgb(0, 170, 60),
        LogLevel::Debug => egui::Color32::GRAY,
        LogLevel::Info | LogLevel::Other(_) => egui::Color32::from_rgb(70, 140, 230),
    }
}

fn render_fields(ui: &mut egui::Ui, view: &mut PanelView, ops: &mut Vec<PanelOp>) {
    let fields: Vec<FieldSpec> = view.form().fields().to_vec();
    let values = view.form().values();

    let (structured, plain): (Vec<_>, Vec<_>) = fields.iter().partition(|f| {
        f.name == statics::FIELD_MAPPINGS || f.name == statics::FIELD_INSERTS
    });

    egui::Grid::new(("fields", view.sync.kind().topic()))
        .num_columns(2)
        .striped(true)
        .show(ui, |ui| {
            for field in plain {
                ui.label(field.name);
                let current = values.get(field.name).cloned().unwrap_or(ParamValue::Null);
                render_plain_field(ui, field, &current, ops);
                ui.end_row();
            }
        });

    for field in structured {
        ui.add_space(8.0);
        match field.name {
            statics::FIELD_MAPPINGS => {
                for id in TableId::ALL {
                    render_mapping_table(ui, view, id, ops);
                    ui.add_space(8.0);
                }
            }
            _ => render_inserts(ui, view, ops),
        }
    }
}

fn render_plain_field(
    ui: &mut egui::Ui,
    field: &FieldSpec,
    current: &ParamValue,
    ops: &mut Vec<PanelOp>,
) {
    if let (Coercion::Identity, ParamValue::Bool(b)) = (field.coercion, current) {
        let mut checked = *b;
        if ui.checkbox(&mut checked, "").changed() {
            ops.push(PanelOp::SetField(field.name, ParamValue::Bool(checked)));
        }
        return;
    }

    let choices: &[&str] = match field.name {
        statics::FIELD_BACKEND_TYPE => &[statics::BACKEND_LATEX, statics::BACKEND_WORD],
        statics::FIELD_REPORT_TYPE => &[statics::REPORT_TYPE_REPORT, statics::REPORT_TYPE_GENERIC],
        _ => &[],
    };
    let text = current
        .scalar_text()
        .unwrap_or_else(|| current.to_json_compact());

    if !choices.is_empty() {
        let mut selected = text.clone();
        egui::ComboBox::from_id_salt(field.name)
            .selected_text(selected.clone())
            .show_ui(ui, |ui| {
                for choice in choices {
                    ui.selectable_value(&mut selected, choice.to_string(), *choice);
                }
            });
        if selected != text {
            ops.push(PanelOp::SetField(field.name, selected.into()));
        }
        return;
    }

    let mut edited = text.clone();
    let response = ui.add(egui::TextEdit::singleline(&mut edited).desired_width(420.0));
    if response.changed() && edited != text {
        ops.push(PanelOp::SetField(field.name, edited.into()));
    }
}

/// A text cell that only reaches the document when the edit is committed.
fn render_cell(
    ui: &mut egui::Ui,
    view: &mut PanelView,
    cell: CellRef,
    current: &str,
    ops: &mut Vec<PanelOp>,
) {
    let width = ui.available_width();
    if let Some((active, edit)) = view.cell.as_mut()
        && *active == cell
        && let Some(buffer) = edit.buffer_mut()
    {
        let response = ui.add(egui::TextEdit::singleline(buffer).desired_width(width));
        if ui.input(|i| i.key_pressed(egui::Key::Escape)) {
            ops.push(PanelOp::Cancel);
        } else if response.lost_focus() {
            ops.push(PanelOp::Commit);
        }
        return;
    }

    let mut text = current.to_string();
    let response = ui.add(egui::TextEdit::singleline(&mut text).desired_width(width));
    if response.changed() {
        ops.push(PanelOp::BeginCell(cell, current.to_string(), text));
    }
}

fn render_mapping_table(
    ui: &mut egui::Ui,
    view: &mut PanelView,
    id: TableId,
    ops: &mut Vec<PanelOp>,
) {
    ui.horizontal(|ui| {
        ui.strong(id.heading());
        if ui.small_button(statics::EN_BTN_ADD_ITEM).clicked() {
            ops.push(PanelOp::InsertRow(id));
        }
    });

    let table = match TableEditor::new(view.form()).table(id) {
        Ok(table) => table,
        Err(err) => {
            ui.colored_label(egui::Color32::RED, err.to_string());
            return;
        }
    };
    let rows: Vec<(String, String, String)> = table
        .rows()
        .map(|(k, e, f)| {
            (
                k.to_string(),
                e.join(&statics::LIST_DELIMITER.to_string()),
                f.to_string(),
            )
        })
        .collect();

    let row_h = ui.text_style_height(&egui::TextStyle::Body) + 8.0;
    ui.push_id(("mapping", id.key()), |ui| {
        TableBuilder::new(ui)
            .striped(true)
            .cell_layout(egui::Layout::left_to_right(egui::Align::Center))
            .column(Column::initial(140.0).resizable(true))
            .column(Column::remainder().resizable(true))
            .column(Column::initial(100.0).resizable(true))
            .column(Column::initial(70.0).resizable(false))
            .header(row_h, |mut header| {
                header.col(|ui| {
                    ui.strong(statics::EN_COL_KEY);
                });
                header.col(|ui| {
                    ui.strong(statics::EN_COL_ELEMENTS);
                });
                header.col(|ui| {
                    ui.strong(statics::EN_COL_FACTOR);
                });
                header.col(|ui| {
                    ui.strong("");
                });
            })
            .body(|mut body| {
                for (key, elements, factor) in &rows {
                    body.row(row_h, |mut row| {
                        row.col(|ui| {
                            render_cell(ui, view, CellRef::MappingKey(id, key.clone()), key, ops);
                        });
                        row.col(|ui| {
                            let cell = CellRef::MappingElements(id, key.clone());
                            render_cell(ui, view, cell, elements, ops);
                        });
                        row.col(|ui| {
                            let cell = CellRef::MappingFactor(id, key.clone());
                            render_cell(ui, view, cell, factor, ops);
                        });
                        row.col(|ui| {
                            if ui.small_button(statics::EN_BTN_DELETE).clicked() {
                                ops.push(PanelOp::RemoveRow(id, key.clone()));
                            }
                        });
                    });
                }
            });
    });
}

fn render_inserts(ui: &mut egui::Ui, view: &mut PanelView, ops: &mut Vec<PanelOp>) {
    if ui.button(statics::EN_BTN_ADD_ITEM).clicked() {
        ops.push(PanelOp::AppendInsert);
    }
    let entries = InsertList::new(view.form()).entries();
    let row_h = ui.text_style_height(&egui::TextStyle::Body) + 8.0;

    ui.push_id("inserts_table", |ui| {
        TableBuilder::new(ui)
            .striped(true)
            .cell_layout(egui::Layout::left_to_right(egui::Align::Center))
            .column(Column::initial(40.0).resizable(false))
            .column(Column::initial(90.0).resizable(true))
            .column(Column::initial(90.0).resizable(false))
            .column(Column::remainder().resizable(true))
            .column(Column::initial(70.0).resizable(false))
            .header(row_h, |mut header| {
                header.col(|ui| {
                    ui.strong("#");
                });
                header.col(|ui| {
                    ui.strong(statics::EN_COL_LOCATION);
                });
                header.col(|ui| {
                    ui.strong(statics::EN_COL_TYPE);
                });
                header.col(|ui| {
                    ui.strong(statics::EN_COL_PAYLOAD);
                });
                header.col(|ui| {
                    ui.strong("");
                });
            })
            .body(|mut body| {
                for (index, entry) in entries.iter().enumerate() {
                    body.row(row_h, |mut row| {
                        row.col(|ui| {
                            ui.monospace(index.to_string());
                        });
                        row.col(|ui| {
                            let mut location = entry.location.clone();
                            if ui.text_edit_singleline(&mut location).changed() {
                                ops.push(PanelOp::SetInsertLocation(index, location));
                            }
                        });
                        row.col(|ui| {
                            let mut kind = entry.kind;
                            egui::ComboBox::from_id_salt(("insert_kind", index))
                                .selected_text(kind.field())
                                .show_ui(ui, |ui| {
                                    for k in InsertKind::ALL {
                                        ui.selectable_value(&mut kind, k, k.field());
                                    }
                                });
                            if kind != entry.kind {
                                ops.push(PanelOp::SetInsertKind(index, kind));
                            }
                        });
                        row.col(|ui| {
                            let text = entry.payload_text();
                            render_cell(ui, view, CellRef::InsertPayload(index), &text, ops);
                        });
                        row.col(|ui| {
                            if ui.small_button(statics::EN_BTN_DELETE).clicked() {
                                ops.push(PanelOp::RemoveInsert(index));
                            }
                        });
                    });
                }
            });
    });
}

fn apply_ops(view: &mut PanelView, ops: Vec<PanelOp>) -> Result<(), String> {
    for op in ops {
        match op {
            PanelOp::SetField(name, value) => {
                view.form().set_field(name, value);
            }
            PanelOp::InsertRow(id) => {
                TableEditor::new(view.form())
                    .insert(id)
                    .map_err(|e| e.to_string())?;
            }
            PanelOp::RemoveRow(id, key) => {
                view.cell = None;
                TableEditor::new(view.form())
                    .remove(id, &key)
                    .map_err(|e| e.to_string())?;
            }
            PanelOp::AppendInsert => {
                InsertList::new(view.form()).append();
            }
            PanelOp::RemoveInsert(index) => {
                view.cell = None;
                InsertList::new(view.form())
                    .remove(index)
                    .map_err(|e| e.to_string())?;
            }
            PanelOp::SetInsertLocation(index, location) => {
                InsertList::new(view.form())
                    .set_location(index, &location)
                    .map_err(|e| e.to_string())?;
            }
            PanelOp::SetInsertKind(index, kind) => {
                InsertList::new(view.form())
                    .change_type(index, kind)
                    .map_err(|e| e.to_string())?;
            }
            PanelOp::BeginCell(cell, original, text) => {
                let mut edit = CellEdit::new();
                edit.begin(&original);
                edit.input(&text);
                view.cell = Some((cell, edit));
            }
            PanelOp::Cancel => {
                if let Some((_, edit)) = view.cell.as_mut() {
                    edit.cancel();
                }
                view.cell = None;
            }
            PanelOp::Commit => {
                let Some((cell, mut edit)) = view.cell.take() else {
                    continue;
                };
                let form = view.sync.form();
                edit.commit(|text| match &cell {
                    CellRef::MappingKey(id, key) => TableEditor::new(form)
                        .rename(*id, key, text)
                        .map_err(|e| e.to_string()),
                    CellRef::MappingElements(id, key) => TableEditor::new(form)
                        .set_elements(*id, key, text)
                        .map_err(|e| e.to_string()),
                    CellRef::MappingFactor(id, key) => TableEditor::new(form)
                        .set_factor(*id, key, text)
                        .map_err(|e| e.to_string()),
                    CellRef::InsertPayload(index) => InsertList::new(form)
                        .set_payload(*index, text)
                        .map_err(|e| e.to_string()),
                })?;
            }
        }
    }
    Ok(())
}

impl eframe::App for ArgPanelApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.apply_completions();

        self.render_top_bar(ctx);

        if let Some(err) = self.last_error.clone() {
            egui::TopBottomPanel::top("error_bar").show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.colored_label(egui::Color32::RED, err);
                    if ui.small_button("x").clicked() {
                        self.last_error = None;
                    }
                });
            });
        }

        self.render_log_panel(ctx);
        self.render_central(ctx);
    }
}
