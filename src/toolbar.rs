//! Toolbar actions against the report service.
//!
//! Each action is split in two: building a [`Request`] touches only the store and the log,
//! [`Request::execute`] performs the blocking service call (on a worker thread in the app),
//! and [`Toolbar::complete`] applies the [`Completion`] back on the UI thread.

use crate::{
    Event, EventBus, ParamValue,
    error::StoreError,
    logger::{self, LogLevel, LogRecord},
    panel::PanelKind,
    service::{ReportService, ServiceFailure, ServiceReply},
    statics,
    store::DocumentStore,
};
use anyhow::Context;
use std::{
    fs,
    path::{Path, PathBuf},
    rc::Rc,
    sync::{Arc, mpsc},
    thread,
};

/// A service call waiting to be executed.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Defaults,
    OpenFile(PathBuf),
    Reload,
    Save {
        destination: PathBuf,
        document: ParamValue,
    },
    Run {
        document: ParamValue,
        run_option: String,
    },
}

impl Request {
    pub fn label(&self) -> &'static str {
        match self {
            Request::Defaults => "defaults",
            Request::OpenFile(_) => "open",
            Request::Reload => "reload",
            Request::Save { .. } => "save",
            Request::Run { .. } => "run",
        }
    }

    /// Perform the blocking call.
    pub fn execute(self, service: &dyn ReportService) -> Completion {
        tracing::info!(request = self.label(), "calling report service");
        match self {
            Request::Defaults => Completion::Defaults(service.default_parameters()),
            Request::OpenFile(path) => Completion::Loaded(service.read_parameters_file(&path)),
            Request::Reload => Completion::Loaded(service.reload()),
            Request::Save {
                destination,
                document,
            } => Completion::Saved {
                destination,
                result: service.write_parameters(&document),
            },
            Request::Run {
                document,
                run_option,
            } => Completion::Ran(service.run(&document, &run_option)),
        }
    }
}

/// The outcome of a [`Request`], ready to be applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Defaults(Result<ParamValue, ServiceFailure>),
    /// Open and reload both answer with an optional document.
    Loaded(Result<ServiceReply, ServiceFailure>),
    Saved {
        destination: PathBuf,
        result: Result<Vec<u8>, ServiceFailure>,
    },
    Ran(Result<ServiceReply, ServiceFailure>),
}

pub struct Toolbar {
    bus: Rc<EventBus>,
    store: Rc<DocumentStore>,
}

impl Toolbar {
    pub fn new(bus: Rc<EventBus>, store: Rc<DocumentStore>) -> Self {
        Self { bus, store }
    }

    /// First start of a session: seed the document with the report information defaults and
    /// ask for the service's defaults. `None` once the session is initialized.
    pub fn initialize(&self) -> Option<Request> {
        match self.store.boolean().get(statics::STORE_IS_DEFAULT_CONF) {
            Ok(Some(_)) => return None,
            Ok(None) => {}
            Err(err) => {
                tracing::warn!("unreadable default configuration flag, reinitializing: {err}");
            }
        }
        tracing::info!("initializing default configuration");

        if let Err(err) = self.seed_defaults() {
            tracing::error!("seeding default configuration: {err}");
        }

        self.log(LogRecord::info(statics::MSG_REQUESTING_DEFAULTS));
        Some(Request::Defaults)
    }

    fn seed_defaults(&self) -> Result<(), StoreError> {
        self.store.boolean().set(statics::STORE_IS_DEFAULT_CONF, &true)?;
        self.store
            .set_parameters(&PanelKind::ReportInformation.defaults().into())?;
        self.store
            .string()
            .set(statics::STORE_RUN_OPT, &statics::RUN_OPT_EXECUTE.to_string())
    }

    pub fn open_file(&self, path: PathBuf) -> Request {
        self.log(LogRecord::info(statics::MSG_REQUESTING_FILE_LOAD));
        Request::OpenFile(path)
    }

    pub fn reload(&self) -> Request {
        self.log(LogRecord::info(statics::MSG_REQUESTING_RELOAD));
        Request::Reload
    }

    /// `None` when there is no document to save.
    pub fn save(&self, destination: PathBuf) -> Option<Request> {
        let Some(document) = self.store.parameters() else {
            self.log(LogRecord::info(statics::MSG_PARAMS_REQUIRED));
            return None;
        };
        self.log(LogRecord::info(statics::MSG_REQUESTING_SAVE));
        Some(Request::Save {
            destination,
            document,
        })
    }

    pub fn run(&self) -> Request {
        self.log(LogRecord::info(statics::MSG_REQUESTING_RUN));
        Request::Run {
            document: self.store.parameters().unwrap_or_default(),
            run_option: self.run_option(),
        }
    }

    pub fn run_option(&self) -> String {
        match self.store.string().get(statics::STORE_RUN_OPT) {
            Ok(Some(opt)) => opt,
            Ok(None) => statics::RUN_OPT_EXECUTE.to_string(),
            Err(err) => {
                tracing::warn!("unreadable run option: {err}");
                statics::RUN_OPT_EXECUTE.to_string()
            }
        }
    }

    pub fn set_run_option(&self, option: &str) {
        if let Err(err) = self.store.string().set(statics::STORE_RUN_OPT, &option.to_string()) {
            tracing::error!("storing run option: {err}");
        }
    }

    /// Apply a finished request.
    pub fn complete(&self, completion: Completion) {
        match completion {
            Completion::Defaults(Ok(document)) => {
                if self.store_document(&document) {
                    self.log(LogRecord::info(statics::MSG_DEFAULTS_APPLIED));
                    self.refresh_panels();
                }
            }
            Completion::Defaults(Err(failure)) => {
                self.report_failure(&failure);
                if let Err(err) = self.store.set_parameters(&ParamValue::empty_object()) {
                    tracing::error!("resetting parameter document: {err}");
                }
            }
            Completion::Loaded(Ok(reply)) => {
                self.replay(&reply.logs);
                if let Some(document) = reply.parameters.filter(|p| !p.is_null()) {
                    if self.store_document(&document) {
                        self.refresh_panels();
                    }
                }
            }
            Completion::Saved {
                destination,
                result: Ok(bytes),
            } => match write_file(&destination, &bytes) {
                Ok(()) => {
                    tracing::info!(?destination, "parameters written");
                    self.log(LogRecord::success(statics::MSG_SAVED));
                    self.refresh_panels();
                }
                Err(err) => self.log(LogRecord::error(format!("{err:#}"))),
            },
            Completion::Ran(Ok(reply)) => self.replay(&reply.logs),
            Completion::Loaded(Err(failure))
            | Completion::Saved {
                result: Err(failure),
                ..
            }
            | Completion::Ran(Err(failure)) => self.report_failure(&failure),
        }
    }

    /// Execute `request` inline and apply the result.
    pub fn perform(&self, request: Request, service: &dyn ReportService) {
        self.complete(request.execute(service));
    }

    /// Publish the current document on every panel's refresh topic.
    pub fn refresh_panels(&self) {
        for topic in statics::REFRESH_TOPICS {
            self.bus.publish(topic, Event::Refresh(self.store.parameters()));
        }
    }

    fn store_document(&self, document: &ParamValue) -> bool {
        match self.store.set_parameters(document) {
            Ok(()) => true,
            Err(err) => {
                tracing::error!("storing parameter document: {err}");
                self.log(LogRecord::error(err.to_string()));
                false
            }
        }
    }

    fn replay(&self, logs: &[LogRecord]) {
        for record in logs {
            self.log(record.clone());
        }
    }

    /// Replay the failure's logs, then one ERROR with its best message.
    fn report_failure(&self, failure: &ServiceFailure) {
        tracing::warn!("report service call failed: {failure}");
        self.replay(failure.logs());
        self.log(LogRecord::new(LogLevel::Error, failure.best_message()));
    }

    fn log(&self, record: LogRecord) {
        logger::publish(&self.bus, record);
    }
}

fn write_file(destination: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    fs::write(destination, bytes).with_context(|| format!("writing {destination:?}"))
}

/// Runs requests on short-lived threads and hands completions back to the UI thread.
pub struct Worker {
    service: Arc<dyn ReportService + Send + Sync>,
    tx: mpsc::Sender<Completion>,
    rx: mpsc::Receiver<Completion>,
    in_flight: usize,
}

impl Worker {
    pub fn new(service: Arc<dyn ReportService + Send + Sync>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            service,
            tx,
            rx,
            in_flight: 0,
        }
    }

    /// Start `request`; `wake` runs on the worker thread once the completion is queued.
    pub fn submit(&mut self, request: Request, wake: impl FnOnce() + Send + 'static) {
        let service = Arc::clone(&self.service);
        let tx = self.tx.clone();
        self.in_flight += 1;
        thread::spawn(move || {
            let completion = request.execute(service.as_ref());
            if tx.send(completion).is_err() {
                tracing::debug!("completion dropped, receiver gone");
            }
            wake();
        });
    }

    /// Completions that arrived since the last call.
    pub fn drain(&mut self) -> Vec<Completion> {
        let done: Vec<Completion> = self.rx.try_iter().collect();
        self.in_flight = self.in_flight.saturating_sub(done.len());
        done
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight > 0
    }
}
